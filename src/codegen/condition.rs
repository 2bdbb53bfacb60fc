//! Lowering of conditions into conditional branches.
//!
//! Every conditional construct jumps away when its condition does not
//! hold, so the branch is emitted on the reversed condition.

use crate::common::ast::{IzmirExpression, IzmirPrimitive};

use super::{
    backend::Discipline,
    context::RoutineContext,
    error::FallableInstructions,
    expression,
    vm::{self, Condition},
};

/// Branch to `label` unless `condition` holds.
pub fn construct_branch_unless<D: Discipline>(
    condition: &IzmirExpression,
    label: &vm::Label,
    context: &mut RoutineContext<D>,
) -> FallableInstructions {
    match condition {
        IzmirExpression::Primitive {
            primitive,
            operands,
        } if context.optimization_rewriting && primitive.is_comparison() => {
            construct_branch_on(primitive.reverse_comparison(), operands, label, context)
        }
        _ => construct_materialized(condition, label, context),
    }
}

/// Fold the comparison into a single conditional branch.
fn construct_branch_on<D: Discipline>(
    comparison: IzmirPrimitive,
    operands: &[IzmirExpression],
    label: &vm::Label,
    context: &mut RoutineContext<D>,
) -> FallableInstructions {
    expression::check_arity(comparison, operands)?;

    let (mut instructions, locations) = expression::construct_operands(operands, context)?;

    instructions.push(context.discipline.branch_if(
        Condition::for_comparison(comparison),
        &locations,
        label.clone(),
    ));

    expression::release_operands(&locations, context);

    Ok(instructions)
}

/// Compute the condition's value, then branch on it being zero
/// (the reversal of `is-nonzero`).
fn construct_materialized<D: Discipline>(
    condition: &IzmirExpression,
    label: &vm::Label,
    context: &mut RoutineContext<D>,
) -> FallableInstructions {
    let location = context.discipline.allocate();

    let mut instructions = expression::construct(condition, location, context)?;
    instructions.push(context.discipline.branch_if(
        Condition::for_comparison(IzmirPrimitive::IsNonzero.reverse_comparison()),
        &[location],
        label.clone(),
    ));

    context.discipline.release(location);

    Ok(instructions)
}
