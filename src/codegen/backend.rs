//! Emission disciplines.
//!
//! Expression and statement compilation is written once, generic over a
//! [`Discipline`]; the disciplines only differ in how leaves, operations
//! and stores are selected, and in how intermediate values are named.

use super::vm::{self, Condition, Label, Operand, Operation, Register, Slot, VMInstruction, Value};

pub trait Discipline: Default {
    /// Where a compiled expression deposits its value.
    type Location: Copy + std::fmt::Debug;

    /// Reserve a location for an intermediate value.
    fn allocate(&mut self) -> Self::Location;

    /// Give back the most recently allocated location,
    /// once its value has been consumed.
    fn release(&mut self, location: Self::Location);

    fn load_constant(&self, value: Value, target: Self::Location) -> VMInstruction;

    fn load_variable(&self, slot: Slot, target: Self::Location) -> VMInstruction;

    fn store_variable(&self, source: Self::Location, slot: Slot) -> VMInstruction;

    fn operate(
        &self,
        operation: Operation,
        operands: &[Self::Location],
        target: Self::Location,
    ) -> VMInstruction;

    fn input(&self, target: Self::Location) -> VMInstruction;

    fn print(&self, source: Self::Location) -> VMInstruction;

    /// Branch to `label` when `condition` holds on the operands,
    /// consuming them.
    fn branch_if(
        &self,
        condition: Condition,
        operands: &[Self::Location],
        label: Label,
    ) -> VMInstruction;

    fn call(&self, callee: &str, arguments: &[Self::Location], target: Self::Location)
        -> VMInstruction;

    /// Throw away a value nobody is going to consume.
    fn discard(&self, source: Self::Location) -> Vec<VMInstruction>;

    fn r#return(&self, source: Self::Location) -> VMInstruction;
}

// region: stack

/// Values are pushed to, and consumed from, the operand stack;
/// locations carry no information.
#[derive(Debug, Default)]
pub struct StackDiscipline;

impl Discipline for StackDiscipline {
    type Location = ();

    fn allocate(&mut self) {}

    fn release(&mut self, (): ()) {}

    fn load_constant(&self, value: Value, (): ()) -> VMInstruction {
        vm::push_constant(value)
    }

    fn load_variable(&self, slot: Slot, (): ()) -> VMInstruction {
        VMInstruction::PushVariable(slot)
    }

    fn store_variable(&self, (): (), slot: Slot) -> VMInstruction {
        VMInstruction::PopVariable(slot)
    }

    fn operate(&self, operation: Operation, _operands: &[()], (): ()) -> VMInstruction {
        VMInstruction::Operate(operation)
    }

    fn input(&self, (): ()) -> VMInstruction {
        VMInstruction::Input
    }

    fn print(&self, (): ()) -> VMInstruction {
        VMInstruction::Print
    }

    fn branch_if(&self, condition: Condition, _operands: &[()], label: Label) -> VMInstruction {
        VMInstruction::BranchIf(condition, label)
    }

    fn call(&self, callee: &str, arguments: &[()], (): ()) -> VMInstruction {
        vm::call(callee, arguments.len())
    }

    fn discard(&self, (): ()) -> Vec<VMInstruction> {
        vec![VMInstruction::Drop]
    }

    fn r#return(&self, (): ()) -> VMInstruction {
        vm::vm_return()
    }
}

// endregion

// region: register

/// Values live in virtual registers, numbered by a counter which grows
/// on allocation and shrinks on release.
#[derive(Debug, Default)]
pub struct RegisterDiscipline {
    next: Register,
}

impl Discipline for RegisterDiscipline {
    type Location = Register;

    fn allocate(&mut self) -> Register {
        let register = self.next;
        self.next = register.next();

        register
    }

    fn release(&mut self, location: Register) {
        debug_assert_eq!(
            location.next(),
            self.next,
            "registers have to be released in reverse allocation order"
        );

        self.next = location;
    }

    fn load_constant(&self, value: Value, target: Register) -> VMInstruction {
        vm::mov(Operand::Literal(value), Operand::Register(target))
    }

    fn load_variable(&self, slot: Slot, target: Register) -> VMInstruction {
        vm::mov(Operand::Variable(slot), Operand::Register(target))
    }

    fn store_variable(&self, source: Register, slot: Slot) -> VMInstruction {
        vm::mov(Operand::Register(source), Operand::Variable(slot))
    }

    fn operate(&self, operation: Operation, operands: &[Register], target: Register) -> VMInstruction {
        VMInstruction::OperateRegisters(operation, operands.to_vec(), target)
    }

    fn input(&self, target: Register) -> VMInstruction {
        VMInstruction::InputRegister(target)
    }

    fn print(&self, source: Register) -> VMInstruction {
        VMInstruction::PrintRegister(source)
    }

    fn branch_if(&self, condition: Condition, operands: &[Register], label: Label) -> VMInstruction {
        VMInstruction::BranchIfRegisters(condition, operands.to_vec(), label)
    }

    fn call(&self, callee: &str, arguments: &[Register], target: Register) -> VMInstruction {
        // arguments are allocated consecutively; with none, the base is irrelevant
        let first_argument = arguments.first().copied().unwrap_or(target);

        VMInstruction::CallRegisters(callee.to_owned(), first_argument, arguments.len(), target)
    }

    fn discard(&self, _source: Register) -> Vec<VMInstruction> {
        // releasing the register is enough
        vec![]
    }

    fn r#return(&self, source: Register) -> VMInstruction {
        VMInstruction::ReturnRegister(source)
    }
}

// endregion
