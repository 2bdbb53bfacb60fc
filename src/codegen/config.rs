//! The single configuration value parametrizing a compilation run.

/// Instruction emission discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Backend {
    /// Intermediate values live on the implicit operand stack.
    Stack,
    /// Intermediate values live in numbered virtual registers.
    #[default]
    Register,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilationConfig {
    pub backend: Backend,
    /// Fold comparisons into conditional branches (using comparison
    /// reversal) instead of always materializing a boolean first.
    pub optimization_rewriting: bool,
}

impl CompilationConfig {
    pub const fn new(backend: Backend) -> Self {
        Self {
            backend,
            optimization_rewriting: true,
        }
    }

    pub const fn with_optimization_rewriting(self, optimization_rewriting: bool) -> Self {
        Self {
            optimization_rewriting,
            ..self
        }
    }
}

impl Default for CompilationConfig {
    fn default() -> Self {
        Self::new(Backend::default())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = CompilationConfig::default();

        assert_eq!(config.backend, Backend::Register);
        assert!(config.optimization_rewriting);
    }

    #[test]
    fn test_backend_names() {
        assert_eq!(Backend::from_str("stack").ok(), Some(Backend::Stack));
        assert_eq!(Backend::Register.to_string(), "register");
        assert!(Backend::from_str("accumulator").is_err());
    }
}
