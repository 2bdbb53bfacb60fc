use super::vm;

/// List of all errors that could possibly occur during code generation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An AST shape for which no instruction sequence exists.
    #[error("unsupported construct: {0}")]
    UnsupportedConstruct(String),

    #[error("procedure `{0}` is defined more than once")]
    MultipleProcedureDefinitions(String),
}

pub type FallableInstructions = Result<Vec<vm::VMInstruction>, Error>;
