use tracing::{debug, instrument, trace};

use crate::{
    common::ast,
    izmirvm::{MutableRoutine, RoutineName},
};

use super::{
    backend::Discipline, config::CompilationConfig, context::RoutineContext, error::Error,
    statement, vm,
};

/// Compile a procedure into its own routine.
#[instrument(skip_all, fields(procedure = %procedure.name))]
pub fn construct<D: Discipline>(
    procedure: &ast::IzmirProcedure,
    config: &CompilationConfig,
) -> Result<MutableRoutine, Error> {
    let mut context = RoutineContext::<D>::new(procedure.name.0.clone(), config);

    for formal in &procedure.formals {
        context.scope.add_formal(&formal.0);
    }

    let mut instructions = statement::construct(&procedure.body, &mut context)?;

    // falling off the end returns 0
    if !instructions.last().is_some_and(vm::VMInstruction::is_return) {
        let location = context.discipline.allocate();
        instructions.push(context.discipline.load_constant(0, location));
        instructions.push(context.discipline.r#return(location));
        context.discipline.release(location);
    }

    debug!(
        routine = %context.routine_name,
        instructions = instructions.len(),
        slots = context.scope.slot_count(),
        "compiled procedure"
    );
    trace!("\n{}", vm::VMInstructionBlock::from(instructions.as_slice()).compile());

    let mut routine = MutableRoutine::new(
        RoutineName::Procedure(procedure.name.0.clone()),
        procedure.arity(),
    );
    routine.append(instructions);

    Ok(routine)
}

/// Compile the statement run at program start.
#[instrument(skip_all)]
pub fn construct_main<D: Discipline>(
    main: &ast::IzmirStatement,
    config: &CompilationConfig,
) -> Result<MutableRoutine, Error> {
    let mut context = RoutineContext::<D>::new(String::from("main"), config);

    let instructions = statement::construct(main, &mut context)?;

    debug!(
        routine = %context.routine_name,
        instructions = instructions.len(),
        slots = context.scope.slot_count(),
        "compiled main"
    );
    trace!("\n{}", vm::VMInstructionBlock::from(instructions.as_slice()).compile());

    let mut routine = MutableRoutine::main();
    routine.append(instructions);

    Ok(routine)
}
