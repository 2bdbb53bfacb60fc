use crate::common::ast;

use super::{
    backend::Discipline,
    condition,
    context::RoutineContext,
    error::{Error, FallableInstructions},
    vm,
};

/// Compile `expression` so that its value ends up in `target`.
pub fn construct<D: Discipline>(
    expression: &ast::IzmirExpression,
    target: D::Location,
    context: &mut RoutineContext<D>,
) -> FallableInstructions {
    match expression {
        ast::IzmirExpression::Literal(value) => {
            Ok(vec![context.discipline.load_constant(*value, target)])
        }
        ast::IzmirExpression::Variable(name) => {
            let slot = context.scope.resolve(&name.0);
            Ok(vec![context.discipline.load_variable(slot, target)])
        }
        ast::IzmirExpression::Primitive {
            primitive,
            operands,
        } => construct_primitive(*primitive, operands, target, context),
        ast::IzmirExpression::IfThenElse {
            condition,
            then_branch,
            else_branch,
        } => construct_if_then_else(condition, then_branch, else_branch, target, context),
        ast::IzmirExpression::Call(call) => construct_call(call, target, context),
    }
}

fn construct_primitive<D: Discipline>(
    primitive: ast::IzmirPrimitive,
    operands: &[ast::IzmirExpression],
    target: D::Location,
    context: &mut RoutineContext<D>,
) -> FallableInstructions {
    check_arity(primitive, operands)?;

    let (mut instructions, locations) = construct_operands(operands, context)?;

    instructions.push(match vm::Operation::for_primitive(primitive) {
        Some(operation) => context.discipline.operate(operation, &locations, target),
        None => context.discipline.input(target),
    });

    release_operands(&locations, context);

    Ok(instructions)
}

fn construct_if_then_else<D: Discipline>(
    condition: &ast::IzmirExpression,
    then_branch: &ast::IzmirExpression,
    else_branch: &ast::IzmirExpression,
    target: D::Location,
    context: &mut RoutineContext<D>,
) -> FallableInstructions {
    let else_label = context.create_label("else");
    let end_label = context.create_label("end");

    // both branches deliver to the same target
    let mut instructions = condition::construct_branch_unless(condition, &else_label, context)?;
    instructions.extend(construct(then_branch, target, context)?);
    instructions.push(vm::branch(end_label.clone()));
    instructions.push(vm::label(else_label));
    instructions.extend(construct(else_branch, target, context)?);
    instructions.push(vm::label(end_label));

    Ok(instructions)
}

pub fn construct_call<D: Discipline>(
    call: &ast::IzmirCall,
    target: D::Location,
    context: &mut RoutineContext<D>,
) -> FallableInstructions {
    let (mut instructions, locations) = construct_operands(&call.actuals, context)?;

    instructions.push(context.discipline.call(&call.callee.0, &locations, target));

    release_operands(&locations, context);

    Ok(instructions)
}

/// Compile operands left-to-right, each into a freshly allocated location.
pub fn construct_operands<D: Discipline>(
    operands: &[ast::IzmirExpression],
    context: &mut RoutineContext<D>,
) -> Result<(Vec<vm::VMInstruction>, Vec<D::Location>), Error> {
    let mut instructions = Vec::new();
    let mut locations = Vec::with_capacity(operands.len());

    for operand in operands {
        let location = context.discipline.allocate();
        instructions.extend(construct(operand, location, context)?);
        locations.push(location);
    }

    Ok((instructions, locations))
}

/// Release operand locations, most recent first.
pub fn release_operands<D: Discipline>(locations: &[D::Location], context: &mut RoutineContext<D>) {
    for location in locations.iter().rev() {
        context.discipline.release(*location);
    }
}

pub fn check_arity(
    primitive: ast::IzmirPrimitive,
    operands: &[ast::IzmirExpression],
) -> Result<(), Error> {
    if operands.len() == primitive.arity() {
        Ok(())
    } else {
        Err(Error::UnsupportedConstruct(format!(
            "`{primitive}` applied to {} operand(s), expects {}",
            operands.len(),
            primitive.arity()
        )))
    }
}

#[cfg(test)]
mod tests {
    use crate::codegen::{
        backend::{RegisterDiscipline, StackDiscipline},
        config::{Backend, CompilationConfig},
        vm::{Register, VMInstructionBlock},
    };

    use super::*;

    use crate::common::ast::{IzmirExpression as E, IzmirPrimitive as P};

    fn stack_context() -> RoutineContext<StackDiscipline> {
        RoutineContext::new(String::from("main"), &CompilationConfig::new(Backend::Stack))
    }

    fn register_context() -> RoutineContext<RegisterDiscipline> {
        RoutineContext::new(String::from("main"), &CompilationConfig::new(Backend::Register))
    }

    #[test]
    fn test_literal_construction() {
        let expression = E::Literal(5);

        let stack = construct(&expression, (), &mut stack_context());
        assert!(stack.is_ok_and(
            |instructions| VMInstructionBlock::from(instructions).compile() == "pushconstant 5"
        ));

        let register = construct(&expression, Register(0), &mut register_context());
        assert!(register.is_ok_and(
            |instructions| VMInstructionBlock::from(instructions).compile() == "mov 5, %r0"
        ));
    }

    #[test]
    fn test_primitive_construction() {
        // -(a * 3) + b
        let expression = E::binary(
            P::Plus,
            E::unary(P::UnaryMinus, E::binary(P::Times, E::variable("a"), E::Literal(3))),
            E::variable("b"),
        );

        let expected_stack = [
            "pushvariable @0",
            "pushconstant 3",
            "times",
            "uminus",
            "pushvariable @1",
            "plus",
        ]
        .join("\n");

        let instructions = construct(&expression, (), &mut stack_context()).expect("should compile");
        assert_eq!(VMInstructionBlock::from(instructions).compile(), expected_stack);

        let mut context = register_context();
        let target = context.discipline.allocate();

        let expected_register = [
            "mov @0, %r3",
            "mov 3, %r4",
            "times %r3, %r4, %r2",
            "uminus %r2, %r1",
            "mov @1, %r2",
            "plus %r1, %r2, %r0",
        ]
        .join("\n");

        let instructions = construct(&expression, target, &mut context).expect("should compile");
        assert_eq!(VMInstructionBlock::from(instructions).compile(), expected_register);
        // every temporary has been released
        assert_eq!(context.discipline.allocate(), Register(1));
    }

    #[test]
    fn test_input_construction() {
        let expression = E::binary(P::Minus, E::nullary(P::Input), E::nullary(P::Input));

        let instructions = construct(&expression, (), &mut stack_context()).expect("should compile");

        assert_eq!(
            VMInstructionBlock::from(instructions).compile(),
            ["input", "input", "minus"].join("\n")
        );
    }

    #[test]
    fn test_call_construction() {
        let expression = E::call("max", vec![E::Literal(1), E::variable("x")]);

        let instructions = construct(&expression, (), &mut stack_context()).expect("should compile");
        assert_eq!(
            VMInstructionBlock::from(instructions).compile(),
            ["pushconstant 1", "pushvariable @0", "call max, 2"].join("\n")
        );

        let mut context = register_context();
        let target = context.discipline.allocate();

        let instructions = construct(&expression, target, &mut context).expect("should compile");
        assert_eq!(
            VMInstructionBlock::from(instructions).compile(),
            ["mov 1, %r1", "mov @0, %r2", "call max, %r1, 2, %r0"].join("\n")
        );
    }

    #[test]
    fn test_folded_conditional_expression() {
        // if x < 10 then 1 else 2 end
        let expression = E::if_then_else(
            E::binary(P::Less, E::variable("x"), E::Literal(10)),
            E::Literal(1),
            E::Literal(2),
        );

        let expected = [
            "pushvariable @0",
            "pushconstant 10",
            "bgreaterorequal $else_0",
            "pushconstant 1",
            "b $end_1",
            "$else_0:",
            "pushconstant 2",
            "$end_1:",
        ]
        .join("\n");

        let instructions = construct(&expression, (), &mut stack_context()).expect("should compile");
        assert_eq!(VMInstructionBlock::from(instructions).compile(), expected);
    }

    #[test]
    fn test_wrong_operand_count_is_unsupported() {
        let expression = E::Primitive {
            primitive: P::Plus,
            operands: vec![E::Literal(1)],
        };

        assert!(matches!(
            construct(&expression, (), &mut stack_context()),
            Err(Error::UnsupportedConstruct(_))
        ));
    }
}
