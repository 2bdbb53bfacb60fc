//! Abstract instruction vocabulary of the Izmir VM.
//!
//! The vocabulary covers both code generation disciplines:
//! stack instructions work on the implicit operand stack, while
//! register instructions name their operands explicitly.

use crate::common::ast::IzmirPrimitive;

pub type Value = i64;
type Count = usize;

// region: VMInstructionBlock

#[derive(Debug, Default)]
pub struct VMInstructionBlock {
    instructions: Vec<VMInstruction>,
}

impl VMInstructionBlock {
    pub fn compile(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for VMInstructionBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            self.instructions
                .iter()
                .map(|instruction| format!("{instruction}"))
                .collect::<Vec<_>>()
                .join("\n")
        )
    }
}

impl From<Vec<VMInstruction>> for VMInstructionBlock {
    fn from(instructions: Vec<VMInstruction>) -> Self {
        Self { instructions }
    }
}

impl From<&[VMInstruction]> for VMInstructionBlock {
    fn from(instructions: &[VMInstruction]) -> Self {
        Self {
            instructions: instructions.to_vec(),
        }
    }
}

// endregion

// region: VMInstruction utility functions

/// Utility function for the `$label:` pseudo-instruction.
pub const fn label(label: Label) -> VMInstruction {
    VMInstruction::Label(label)
}

/// Utility function for the unconditional `b` VM instruction.
pub const fn branch(label: Label) -> VMInstruction {
    VMInstruction::Branch(label)
}

/// Utility function for the `pushconstant` VM instruction.
pub const fn push_constant(value: Value) -> VMInstruction {
    VMInstruction::PushConstant(value)
}

/// Utility function for the `mov` VM instruction.
pub const fn mov(source: Operand, destination: Operand) -> VMInstruction {
    VMInstruction::Move(source, destination)
}

/// Utility function for the `call` VM instruction (stack discipline).
pub fn call<S: Into<String>>(callee: S, argument_count: usize) -> VMInstruction {
    VMInstruction::Call(callee.into(), argument_count)
}

/// Utility function for the `return` VM instruction (stack discipline).
pub const fn vm_return() -> VMInstruction {
    VMInstruction::Return
}

// endregion

// region: VMInstruction

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VMInstruction {
    Label(Label),
    Branch(Label),

    // stack discipline
    PushConstant(Value),
    PushVariable(Slot),
    PopVariable(Slot),
    Operate(Operation),
    Input,
    Print,
    Drop,
    BranchIf(Condition, Label),
    Call(String, Count),
    Return,

    // register discipline
    Move(Operand, Operand),
    OperateRegisters(Operation, Vec<Register>, Register),
    InputRegister(Register),
    PrintRegister(Register),
    BranchIfRegisters(Condition, Vec<Register>, Label),
    /// Callee, first argument register, argument count, result register.
    CallRegisters(String, Register, Count, Register),
    ReturnRegister(Register),
}

impl VMInstruction {
    pub const fn is_return(&self) -> bool {
        matches!(self, Self::Return | Self::ReturnRegister(_))
    }

    fn as_instruction(&self) -> String {
        match self {
            Self::Label(label) => format!("{label}:"),
            Self::Branch(label) => format!("b {label}"),
            Self::PushConstant(value) => format!("pushconstant {value}"),
            Self::PushVariable(slot) => format!("pushvariable {slot}"),
            Self::PopVariable(slot) => format!("popvariable {slot}"),
            Self::Operate(operation) => operation.to_string(),
            Self::Input => String::from("input"),
            Self::Print => String::from("print"),
            Self::Drop => String::from("drop"),
            Self::BranchIf(condition, label) => format!("b{condition} {label}"),
            Self::Call(callee, argument_count) => format!("call {callee}, {argument_count}"),
            Self::Return => String::from("return"),
            Self::Move(source, destination) => format!("mov {source}, {destination}"),
            Self::OperateRegisters(operation, sources, destination) => {
                format!("{operation} {}, {destination}", join(sources))
            }
            Self::InputRegister(register) => format!("input {register}"),
            Self::PrintRegister(register) => format!("print {register}"),
            Self::BranchIfRegisters(condition, registers, label) => {
                format!("b{condition} {}, {label}", join(registers))
            }
            Self::CallRegisters(callee, first_argument, argument_count, destination) => {
                format!("call {callee}, {first_argument}, {argument_count}, {destination}")
            }
            Self::ReturnRegister(register) => format!("return {register}"),
        }
    }
}

fn join(registers: &[Register]) -> String {
    registers
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl std::fmt::Display for VMInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_instruction())
    }
}

/// Value-producing operations, selected from the primitive applied in the source.
#[derive(Debug, strum::Display, strum::EnumString, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum Operation {
    Plus,
    Minus,
    Times,
    Divided,
    Remainder,
    #[strum(serialize = "uminus")]
    UnaryMinus,
    Equal,
    Different,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Not,
    IsNonzero,
}

impl Operation {
    /// The operation implementing a (non-`input`) primitive.
    pub const fn for_primitive(primitive: IzmirPrimitive) -> Option<Self> {
        let operation = match primitive {
            IzmirPrimitive::Plus => Self::Plus,
            IzmirPrimitive::Minus => Self::Minus,
            IzmirPrimitive::Times => Self::Times,
            IzmirPrimitive::Divided => Self::Divided,
            IzmirPrimitive::Remainder => Self::Remainder,
            IzmirPrimitive::UnaryMinus => Self::UnaryMinus,
            IzmirPrimitive::Equal => Self::Equal,
            IzmirPrimitive::Different => Self::Different,
            IzmirPrimitive::Less => Self::Less,
            IzmirPrimitive::LessOrEqual => Self::LessOrEqual,
            IzmirPrimitive::Greater => Self::Greater,
            IzmirPrimitive::GreaterOrEqual => Self::GreaterOrEqual,
            IzmirPrimitive::LogicalNot => Self::Not,
            IzmirPrimitive::IsNonzero => Self::IsNonzero,
            IzmirPrimitive::Input => return None,
        };

        Some(operation)
    }

    pub const fn arity(self) -> usize {
        match self {
            Self::UnaryMinus | Self::Not | Self::IsNonzero => 1,
            _ => 2,
        }
    }
}

/// Conditions tested by conditional branches. Comparisons consume two
/// values, `z` and `nz` test a single value against zero.
#[derive(Debug, strum::Display, strum::EnumString, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum Condition {
    Equal,
    Different,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    #[strum(serialize = "z")]
    Zero,
    #[strum(serialize = "nz")]
    Nonzero,
}

impl Condition {
    /// The branch condition holding exactly when the comparison does.
    ///
    /// # Panics
    /// Only comparison primitives have a branch condition.
    pub fn for_comparison(comparison: IzmirPrimitive) -> Self {
        match comparison {
            IzmirPrimitive::Equal => Self::Equal,
            IzmirPrimitive::Different => Self::Different,
            IzmirPrimitive::Less => Self::Less,
            IzmirPrimitive::LessOrEqual => Self::LessOrEqual,
            IzmirPrimitive::Greater => Self::Greater,
            IzmirPrimitive::GreaterOrEqual => Self::GreaterOrEqual,
            IzmirPrimitive::LogicalNot => Self::Zero,
            IzmirPrimitive::IsNonzero => Self::Nonzero,
            _ => panic!("`{comparison}` is not a comparison"),
        }
    }

    pub const fn arity(self) -> usize {
        match self {
            Self::Zero | Self::Nonzero => 1,
            _ => 2,
        }
    }
}

/// Index of a variable inside the current routine's frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot(pub usize);

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// A virtual register of the current routine's frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Register(pub usize);

impl Register {
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%r{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label(pub String);

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// Operand of a register-discipline `mov`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Literal(Value),
    Variable(Slot),
    Register(Register),
}

impl Operand {
    /// Whether a value can be stored into the operand.
    pub const fn is_writable(&self) -> bool {
        !matches!(self, Self::Literal(_))
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value}"),
            Self::Variable(slot) => write!(f, "{slot}"),
            Self::Register(register) => write!(f, "{register}"),
        }
    }
}

// endregion
