//! Routine containers of the Izmir VM.
//!
//! Compiled code is first collected in a [`MutableProgram`] (one
//! [`MutableRoutine`] per procedure, plus the main routine), which can be
//! listed as text or [specialized](MutableProgram::specialize) into an
//! [`ExecutableProgram`] that the interpreter runs.

use std::{collections::HashMap, fmt};

use tracing::{debug, instrument};

use crate::codegen::vm::{self, Condition, Operation, VMInstruction, Value};

use super::error::SpecializationError;

// region: mutable

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutineName {
    Main,
    Procedure(String),
}

impl fmt::Display for RoutineName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::Procedure(name) => write!(f, "{name}"),
        }
    }
}

/// An editable sequence of instructions, label definitions included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutableRoutine {
    pub name: RoutineName,
    pub arity: usize,
    pub instructions: Vec<VMInstruction>,
}

impl MutableRoutine {
    pub const fn new(name: RoutineName, arity: usize) -> Self {
        Self {
            name,
            arity,
            instructions: Vec::new(),
        }
    }

    pub fn main() -> Self {
        Self::new(RoutineName::Main, 0)
    }

    pub fn append(&mut self, instructions: impl IntoIterator<Item = VMInstruction>) {
        self.instructions.extend(instructions);
    }
}

impl fmt::Display for MutableRoutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            RoutineName::Main => writeln!(f, ".main")?,
            RoutineName::Procedure(name) => writeln!(f, ".procedure {name} {}", self.arity)?,
        }

        for instruction in &self.instructions {
            match instruction {
                VMInstruction::Label(_) => writeln!(f, "{instruction}")?,
                _ => writeln!(f, "    {instruction}")?,
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutableProgram {
    pub source_name: String,
    pub procedures: Vec<MutableRoutine>,
    pub main: MutableRoutine,
}

impl MutableProgram {
    pub const fn new(
        source_name: String,
        procedures: Vec<MutableRoutine>,
        main: MutableRoutine,
    ) -> Self {
        Self {
            source_name,
            procedures,
            main,
        }
    }

    /// Textual listing of the program, readable by [`super::reader`].
    pub fn listing(&self) -> String {
        self.to_string()
    }

    /// Resolve labels and callees, and size every routine's frame.
    #[instrument(skip_all, fields(source = %self.source_name))]
    pub fn specialize(&self) -> Result<ExecutableProgram, SpecializationError> {
        let mut callees = HashMap::new();
        for (index, procedure) in self.procedures.iter().enumerate() {
            let name = procedure.name.to_string();
            if callees.insert(name.clone(), (index, procedure.arity)).is_some() {
                return Err(SpecializationError::DuplicateRoutine(name));
            }
        }

        let routines = self
            .procedures
            .iter()
            .chain(std::iter::once(&self.main))
            .map(|routine| specialize_routine(routine, &callees))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(routines = routines.len(), "specialized program");

        Ok(ExecutableProgram {
            main: self.procedures.len(),
            routines,
        })
    }
}

impl fmt::Display for MutableProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# compiled from {}", self.source_name)?;

        for procedure in &self.procedures {
            write!(f, "{procedure}")?;
        }

        write!(f, "{}", self.main)
    }
}

// endregion

// region: executable

/// Index of an instruction inside an executable routine.
pub type Pc = usize;

/// An instruction with its labels, callees and frame locations
/// resolved to indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    PushConstant(Value),
    PushVariable(usize),
    PopVariable(usize),
    Operate(Operation),
    Input,
    Print,
    Drop,
    Branch(Pc),
    BranchIf(Condition, Pc),
    Call {
        routine: usize,
        argument_count: usize,
    },
    Return,

    Move(Source, Destination),
    OperateRegisters(Operation, Vec<usize>, usize),
    InputRegister(usize),
    PrintRegister(usize),
    BranchIfRegisters(Condition, Vec<usize>, Pc),
    CallRegisters {
        routine: usize,
        first_argument: usize,
        argument_count: usize,
        destination: usize,
    },
    ReturnRegister(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Literal(Value),
    Slot(usize),
    Register(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Slot(usize),
    Register(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableRoutine {
    pub name: RoutineName,
    pub arity: usize,
    pub slot_count: usize,
    pub register_count: usize,
    pub code: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableProgram {
    /// Procedures, in definition order, followed by the main routine.
    pub routines: Vec<ExecutableRoutine>,
    /// Index of the main routine.
    pub main: usize,
}

// endregion

// region: specialization

/// Procedure name => (routine index, arity).
type Callees = HashMap<String, (usize, usize)>;

fn specialize_routine(
    routine: &MutableRoutine,
    callees: &Callees,
) -> Result<ExecutableRoutine, SpecializationError> {
    let mut specializer = Specializer {
        routine: routine.name.to_string(),
        labels: HashMap::new(),
        callees,
        slot_count: routine.arity,
        register_count: 0,
    };

    let mut pc = 0;
    for instruction in &routine.instructions {
        if let VMInstruction::Label(label) = instruction {
            if specializer.labels.insert(label, pc).is_some() {
                return Err(SpecializationError::DuplicateLabel {
                    routine: specializer.routine,
                    label: label.clone(),
                });
            }
        } else {
            pc += 1;
        }
    }

    let code = routine
        .instructions
        .iter()
        .filter_map(|instruction| specializer.specialize(instruction).transpose())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ExecutableRoutine {
        name: routine.name.clone(),
        arity: routine.arity,
        slot_count: specializer.slot_count,
        register_count: specializer.register_count,
        code,
    })
}

struct Specializer<'a> {
    routine: String,
    labels: HashMap<&'a vm::Label, Pc>,
    callees: &'a Callees,
    slot_count: usize,
    register_count: usize,
}

impl Specializer<'_> {
    /// Label definitions have no executable counterpart.
    fn specialize(
        &mut self,
        instruction: &VMInstruction,
    ) -> Result<Option<Instruction>, SpecializationError> {
        let specialized = match instruction {
            VMInstruction::Label(_) => return Ok(None),
            VMInstruction::Branch(label) => Instruction::Branch(self.target(label)?),
            VMInstruction::PushConstant(value) => Instruction::PushConstant(*value),
            VMInstruction::PushVariable(slot) => Instruction::PushVariable(self.slot(*slot)),
            VMInstruction::PopVariable(slot) => Instruction::PopVariable(self.slot(*slot)),
            VMInstruction::Operate(operation) => Instruction::Operate(*operation),
            VMInstruction::Input => Instruction::Input,
            VMInstruction::Print => Instruction::Print,
            VMInstruction::Drop => Instruction::Drop,
            VMInstruction::BranchIf(condition, label) => {
                Instruction::BranchIf(*condition, self.target(label)?)
            }
            VMInstruction::Call(callee, argument_count) => Instruction::Call {
                routine: self.callee(callee, *argument_count)?,
                argument_count: *argument_count,
            },
            VMInstruction::Return => Instruction::Return,

            VMInstruction::Move(source, destination) => {
                let source = match source {
                    vm::Operand::Literal(value) => Source::Literal(*value),
                    vm::Operand::Variable(slot) => Source::Slot(self.slot(*slot)),
                    vm::Operand::Register(register) => Source::Register(self.register(*register)),
                };
                if !destination.is_writable() {
                    return Err(SpecializationError::NonWritableDestination {
                        routine: self.routine.clone(),
                        instruction: instruction.to_string(),
                    });
                }
                let destination = match destination {
                    vm::Operand::Variable(slot) => Destination::Slot(self.slot(*slot)),
                    vm::Operand::Register(register) => {
                        Destination::Register(self.register(*register))
                    }
                    vm::Operand::Literal(_) => unreachable!("literals are not writable"),
                };

                Instruction::Move(source, destination)
            }
            VMInstruction::OperateRegisters(operation, sources, destination) => {
                self.check_operand_count(instruction, sources.len(), operation.arity())?;

                Instruction::OperateRegisters(
                    *operation,
                    sources.iter().map(|register| self.register(*register)).collect(),
                    self.register(*destination),
                )
            }
            VMInstruction::InputRegister(register) => {
                Instruction::InputRegister(self.register(*register))
            }
            VMInstruction::PrintRegister(register) => {
                Instruction::PrintRegister(self.register(*register))
            }
            VMInstruction::BranchIfRegisters(condition, registers, label) => {
                self.check_operand_count(instruction, registers.len(), condition.arity())?;

                Instruction::BranchIfRegisters(
                    *condition,
                    registers.iter().map(|register| self.register(*register)).collect(),
                    self.target(label)?,
                )
            }
            VMInstruction::CallRegisters(callee, first_argument, argument_count, destination) => {
                let arguments_end = first_argument
                    .0
                    .checked_add(*argument_count)
                    .ok_or_else(|| SpecializationError::RegisterRange {
                        routine: self.routine.clone(),
                        instruction: instruction.to_string(),
                    })?;
                // the argument window lies inside the frame, even when empty
                self.register_count = self.register_count.max(arguments_end);

                Instruction::CallRegisters {
                    routine: self.callee(callee, *argument_count)?,
                    first_argument: first_argument.0,
                    argument_count: *argument_count,
                    destination: self.register(*destination),
                }
            }
            VMInstruction::ReturnRegister(register) => {
                Instruction::ReturnRegister(self.register(*register))
            }
        };

        Ok(Some(specialized))
    }

    fn slot(&mut self, slot: vm::Slot) -> usize {
        self.slot_count = self.slot_count.max(slot.0 + 1);
        slot.0
    }

    fn register(&mut self, register: vm::Register) -> usize {
        self.register_count = self.register_count.max(register.0 + 1);
        register.0
    }

    fn target(&self, label: &vm::Label) -> Result<Pc, SpecializationError> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| SpecializationError::UndefinedLabel {
                routine: self.routine.clone(),
                label: label.clone(),
            })
    }

    fn callee(&self, callee: &str, argument_count: usize) -> Result<usize, SpecializationError> {
        let &(index, arity) =
            self.callees
                .get(callee)
                .ok_or_else(|| SpecializationError::UnknownCallee {
                    routine: self.routine.clone(),
                    callee: callee.to_owned(),
                })?;

        if arity != argument_count {
            return Err(SpecializationError::ArityMismatch {
                routine: self.routine.clone(),
                callee: callee.to_owned(),
                expected: arity,
                found: argument_count,
            });
        }

        Ok(index)
    }

    fn check_operand_count(
        &self,
        instruction: &VMInstruction,
        found: usize,
        expected: usize,
    ) -> Result<(), SpecializationError> {
        if found == expected {
            Ok(())
        } else {
            Err(SpecializationError::OperandCount {
                routine: self.routine.clone(),
                instruction: instruction.to_string(),
            })
        }
    }
}

// endregion
