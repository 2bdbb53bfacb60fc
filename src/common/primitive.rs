//! Primitive operators of the Izmir language, and the comparison
//! algebra the code generator relies on for branch lowering.

/// An identifier for an Izmir-language primitive.
///
/// Primitives always produce exactly one value. All of them are pure,
/// except for `input`, which reads a value from the outside world.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, strum::Display, strum::VariantArray)]
#[strum(serialize_all = "snake_case")]
pub enum IzmirPrimitive {
    // arithmetic
    Plus,
    Minus,
    Times,
    Divided,
    Remainder,
    UnaryMinus,

    // boolean
    Equal,
    Different,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    LogicalNot,
    IsNonzero,

    // side-effecting
    Input,
}

impl IzmirPrimitive {
    /// Number of operands the primitive consumes.
    pub const fn arity(self) -> usize {
        match self {
            Self::Input => 0,
            Self::UnaryMinus | Self::LogicalNot | Self::IsNonzero => 1,
            Self::Plus
            | Self::Minus
            | Self::Times
            | Self::Divided
            | Self::Remainder
            | Self::Equal
            | Self::Different
            | Self::Less
            | Self::LessOrEqual
            | Self::Greater
            | Self::GreaterOrEqual => 2,
        }
    }

    /// Whether the primitive is a comparison, i.e. produces a boolean
    /// which can be folded into a conditional branch.
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::Different
                | Self::Less
                | Self::LessOrEqual
                | Self::Greater
                | Self::GreaterOrEqual
                | Self::LogicalNot
                | Self::IsNonzero
        )
    }

    /// Return the comparison computing the logical negation of this one
    /// (e.g. the reverse of `less` is `greater_or_equal`).
    ///
    /// # Panics
    /// Reversing is only defined on comparisons - callers have to
    /// check [`Self::is_comparison`] first.
    pub fn reverse_comparison(self) -> Self {
        match self {
            Self::Equal => Self::Different,
            Self::Different => Self::Equal,
            Self::Less => Self::GreaterOrEqual,
            Self::LessOrEqual => Self::Greater,
            Self::Greater => Self::LessOrEqual,
            Self::GreaterOrEqual => Self::Less,
            Self::LogicalNot => Self::IsNonzero,
            Self::IsNonzero => Self::LogicalNot,
            _ => panic!("cannot reverse non-comparison primitive `{self}`"),
        }
    }
}
