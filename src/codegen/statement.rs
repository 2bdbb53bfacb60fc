use crate::common::ast::{self, IzmirStatement};

use super::{
    backend::Discipline, condition, context::RoutineContext, error::FallableInstructions,
    expression, vm,
};

/// Compile a statement; its instructions leave no value behind.
pub fn construct<D: Discipline>(
    statement: &IzmirStatement,
    context: &mut RoutineContext<D>,
) -> FallableInstructions {
    match statement {
        IzmirStatement::Skip => Ok(Vec::new()),
        IzmirStatement::Block { variable, body } => construct_block(variable, body, context),
        IzmirStatement::Assignment {
            variable,
            expression,
        } => construct_assignment(variable, expression, context),
        IzmirStatement::Print(expression) => {
            with_value(expression, context, |discipline, location| {
                vec![discipline.print(location)]
            })
        }
        IzmirStatement::Sequence(first, second) => {
            let mut instructions = construct(first, context)?;
            instructions.extend(construct(second, context)?);

            Ok(instructions)
        }
        IzmirStatement::IfThenElse {
            condition,
            then_branch,
            else_branch,
        } => construct_if_then_else(condition, then_branch, else_branch, context),
        IzmirStatement::IfThen {
            condition,
            then_branch,
        } => construct_if_then(condition, then_branch, context),
        IzmirStatement::WhileDo { guard, body } => construct_while_do(guard, body, context),
        IzmirStatement::RepeatUntil { body, guard } => construct_repeat_until(body, guard, context),
        IzmirStatement::Return(expression) => {
            with_value(expression, context, |discipline, location| {
                vec![discipline.r#return(location)]
            })
        }
        IzmirStatement::Call(call) => {
            let location = context.discipline.allocate();

            let mut instructions = expression::construct_call(call, location, context)?;
            instructions.extend(context.discipline.discard(location));

            context.discipline.release(location);

            Ok(instructions)
        }
    }
}

/// Compile `expression` into a fresh location, then consume it.
fn with_value<D: Discipline>(
    expression: &ast::IzmirExpression,
    context: &mut RoutineContext<D>,
    consume: impl FnOnce(&D, D::Location) -> Vec<vm::VMInstruction>,
) -> FallableInstructions {
    let location = context.discipline.allocate();

    let mut instructions = expression::construct(expression, location, context)?;
    instructions.extend(consume(&context.discipline, location));

    context.discipline.release(location);

    Ok(instructions)
}

fn construct_block<D: Discipline>(
    variable: &ast::IzmirIdentifier,
    body: &IzmirStatement,
    context: &mut RoutineContext<D>,
) -> FallableInstructions {
    let slot = context.scope.enter_block(&variable.0);

    // block variables start out as 0
    let location = context.discipline.allocate();
    let mut instructions = vec![
        context.discipline.load_constant(0, location),
        context.discipline.store_variable(location, slot),
    ];
    context.discipline.release(location);

    instructions.extend(construct(body, context)?);

    context.scope.leave_block();

    Ok(instructions)
}

fn construct_assignment<D: Discipline>(
    variable: &ast::IzmirIdentifier,
    expression: &ast::IzmirExpression,
    context: &mut RoutineContext<D>,
) -> FallableInstructions {
    let location = context.discipline.allocate();

    let mut instructions = expression::construct(expression, location, context)?;
    let slot = context.scope.resolve(&variable.0);
    instructions.push(context.discipline.store_variable(location, slot));

    context.discipline.release(location);

    Ok(instructions)
}

fn construct_if_then_else<D: Discipline>(
    condition: &ast::IzmirExpression,
    then_branch: &IzmirStatement,
    else_branch: &IzmirStatement,
    context: &mut RoutineContext<D>,
) -> FallableInstructions {
    let else_label = context.create_label("else");
    let end_label = context.create_label("end");

    let mut instructions = condition::construct_branch_unless(condition, &else_label, context)?;
    instructions.extend(construct(then_branch, context)?);
    instructions.push(vm::branch(end_label.clone()));
    instructions.push(vm::label(else_label));
    instructions.extend(construct(else_branch, context)?);
    instructions.push(vm::label(end_label));

    Ok(instructions)
}

fn construct_if_then<D: Discipline>(
    condition: &ast::IzmirExpression,
    then_branch: &IzmirStatement,
    context: &mut RoutineContext<D>,
) -> FallableInstructions {
    let end_label = context.create_label("end");

    let mut instructions = condition::construct_branch_unless(condition, &end_label, context)?;
    instructions.extend(construct(then_branch, context)?);
    instructions.push(vm::label(end_label));

    Ok(instructions)
}

/// Guard tested before every iteration, including the first.
fn construct_while_do<D: Discipline>(
    guard: &ast::IzmirExpression,
    body: &IzmirStatement,
    context: &mut RoutineContext<D>,
) -> FallableInstructions {
    let start_label = context.create_label("while");
    let end_label = context.create_label("done");

    let mut instructions = vec![vm::label(start_label.clone())];
    instructions.extend(condition::construct_branch_unless(guard, &end_label, context)?);
    instructions.extend(construct(body, context)?);
    instructions.push(vm::branch(start_label));
    instructions.push(vm::label(end_label));

    Ok(instructions)
}

/// Body runs once before the guard is first tested; the loop branches
/// back for as long as the guard does not hold.
fn construct_repeat_until<D: Discipline>(
    body: &IzmirStatement,
    guard: &ast::IzmirExpression,
    context: &mut RoutineContext<D>,
) -> FallableInstructions {
    let loop_label = context.create_label("repeat");

    let mut instructions = vec![vm::label(loop_label.clone())];
    instructions.extend(construct(body, context)?);
    instructions.extend(condition::construct_branch_unless(guard, &loop_label, context)?);

    Ok(instructions)
}
