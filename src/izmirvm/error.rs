use std::fmt;

use crate::codegen::vm;

/// Reasons a mutable program cannot be turned into an executable one.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SpecializationError {
    #[error("routine `{0}` is defined more than once")]
    DuplicateRoutine(String),

    #[error("{routine}: label `{label}` is defined more than once")]
    DuplicateLabel { routine: String, label: vm::Label },

    #[error("{routine}: label `{label}` is not defined")]
    UndefinedLabel { routine: String, label: vm::Label },

    #[error("{routine}: call to unknown procedure `{callee}`")]
    UnknownCallee { routine: String, callee: String },

    #[error("{routine}: `{callee}` expects {expected} argument(s), called with {found}")]
    ArityMismatch {
        routine: String,
        callee: String,
        expected: usize,
        found: usize,
    },

    #[error("{routine}: `{instruction}` does not name the expected number of operands")]
    OperandCount { routine: String, instruction: String },

    #[error("{routine}: `{instruction}` stores into a literal")]
    NonWritableDestination { routine: String, instruction: String },

    #[error("{routine}: `{instruction}` names registers past the end of the frame")]
    RegisterRange { routine: String, instruction: String },
}

/// Failures while executing a program.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("{routine}: division by zero")]
    DivisionByZero { routine: String },

    #[error("input exhausted")]
    InputExhausted,

    #[error("input `{line}` is not an integer")]
    InvalidInput { line: String },

    #[error("unable to read input")]
    Input(#[source] std::io::Error),

    #[error("{routine}: operand stack underflow")]
    StackUnderflow { routine: String },

    #[error("{routine}: reached the end of the procedure without returning")]
    MissingReturn { routine: String },

    #[error("unable to write output")]
    Output(#[from] std::io::Error),
}

/// What went wrong on a line of a routine listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EditStatus {
    #[error("invalid instruction")]
    InvalidInstruction,
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("invalid parameter kind")]
    InvalidParameterKind,
    #[error("too few parameters")]
    TooFewParameters,
    #[error("too many parameters")]
    TooManyParameters,
    #[error("label defined twice")]
    LabelDefinedTwice,
    #[error("instruction outside a routine")]
    InstructionOutsideRoutine,
    #[error("invalid routine header")]
    InvalidRoutineHeader,
    #[error("main routine defined twice")]
    MainDefinedTwice,
    #[error("missing main routine")]
    MissingMain,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub struct RoutineParseError {
    pub file_name: String,
    pub line: usize,
    pub token: String,
    pub status: EditStatus,
}

impl fmt::Display for RoutineParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} near \"{}\": {}",
            self.file_name, self.line, self.token, self.status
        )
    }
}
