//! Types representing the structure of an Izmir program.
//!
//! Note: all types are prefixed with `Izmir` to avoid potential
//! name collision with VM-level concepts (e.g. Call, Return).
//!
//! Every node owns its children: there is no sharing inside a tree,
//! and trees are never mutated once the parser has built them.

pub use super::primitive::IzmirPrimitive;

/// Integer values manipulated by Izmir programs.
pub type IzmirValue = i64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IzmirProgram {
    /// Name of the source the program was read from (file path or `<stdin>`).
    pub source_name: String,
    pub procedures: Vec<IzmirProcedure>,
    /// Statement executed when the program starts.
    pub main: IzmirStatement,
}

// region: non-terminals

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IzmirProcedure {
    pub name: IzmirIdentifier,
    pub formals: Vec<IzmirIdentifier>,
    pub body: IzmirStatement,
}

impl IzmirProcedure {
    pub fn arity(&self) -> usize {
        self.formals.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IzmirExpression {
    Literal(IzmirValue),
    Variable(IzmirIdentifier),
    IfThenElse {
        condition: Box<IzmirExpression>,
        then_branch: Box<IzmirExpression>,
        else_branch: Box<IzmirExpression>,
    },
    Primitive {
        primitive: IzmirPrimitive,
        operands: Vec<IzmirExpression>,
    },
    Call(IzmirCall),
}

impl IzmirExpression {
    pub fn variable(name: &str) -> Self {
        Self::Variable(IzmirIdentifier::from(name))
    }

    pub const fn nullary(primitive: IzmirPrimitive) -> Self {
        Self::Primitive {
            primitive,
            operands: Vec::new(),
        }
    }

    pub fn unary(primitive: IzmirPrimitive, operand: Self) -> Self {
        Self::Primitive {
            primitive,
            operands: vec![operand],
        }
    }

    pub fn binary(primitive: IzmirPrimitive, left: Self, right: Self) -> Self {
        Self::Primitive {
            primitive,
            operands: vec![left, right],
        }
    }

    pub fn if_then_else(condition: Self, then_branch: Self, else_branch: Self) -> Self {
        Self::IfThenElse {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        }
    }

    pub fn call(callee: &str, actuals: Vec<Self>) -> Self {
        Self::Call(IzmirCall::new(callee, actuals))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IzmirStatement {
    Skip,
    /// Declares `variable` for the extent of `body` only.
    Block {
        variable: IzmirIdentifier,
        body: Box<IzmirStatement>,
    },
    Assignment {
        variable: IzmirIdentifier,
        expression: IzmirExpression,
    },
    Print(IzmirExpression),
    Sequence(Box<IzmirStatement>, Box<IzmirStatement>),
    IfThenElse {
        condition: IzmirExpression,
        then_branch: Box<IzmirStatement>,
        else_branch: Box<IzmirStatement>,
    },
    IfThen {
        condition: IzmirExpression,
        then_branch: Box<IzmirStatement>,
    },
    /// Pre-tested loop (zero or more iterations).
    WhileDo {
        guard: IzmirExpression,
        body: Box<IzmirStatement>,
    },
    /// Post-tested loop (one or more iterations).
    RepeatUntil {
        body: Box<IzmirStatement>,
        guard: IzmirExpression,
    },
    Return(IzmirExpression),
    Call(IzmirCall),
}

impl IzmirStatement {
    pub fn block(variable: &str, body: Self) -> Self {
        Self::Block {
            variable: IzmirIdentifier::from(variable),
            body: Box::new(body),
        }
    }

    pub fn assignment(variable: &str, expression: IzmirExpression) -> Self {
        Self::Assignment {
            variable: IzmirIdentifier::from(variable),
            expression,
        }
    }

    pub fn sequence(first: Self, second: Self) -> Self {
        Self::Sequence(Box::new(first), Box::new(second))
    }

    /// Nest the given statements on the right, the way the parser does;
    /// an empty list becomes `skip`.
    pub fn sequence_of(statements: Vec<Self>) -> Self {
        statements
            .into_iter()
            .rev()
            .reduce(|rest, statement| Self::sequence(statement, rest))
            .unwrap_or(Self::Skip)
    }

    pub fn if_then_else(condition: IzmirExpression, then_branch: Self, else_branch: Self) -> Self {
        Self::IfThenElse {
            condition,
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        }
    }

    pub fn if_then(condition: IzmirExpression, then_branch: Self) -> Self {
        Self::IfThen {
            condition,
            then_branch: Box::new(then_branch),
        }
    }

    pub fn while_do(guard: IzmirExpression, body: Self) -> Self {
        Self::WhileDo {
            guard,
            body: Box::new(body),
        }
    }

    pub fn repeat_until(body: Self, guard: IzmirExpression) -> Self {
        Self::RepeatUntil {
            body: Box::new(body),
            guard,
        }
    }

    pub fn call(callee: &str, actuals: Vec<IzmirExpression>) -> Self {
        Self::Call(IzmirCall::new(callee, actuals))
    }
}

/// A procedure call, usable both as an expression and as a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IzmirCall {
    pub callee: IzmirIdentifier,
    pub actuals: Vec<IzmirExpression>,
}

impl IzmirCall {
    pub fn new(callee: &str, actuals: Vec<IzmirExpression>) -> Self {
        Self {
            callee: IzmirIdentifier::from(callee),
            actuals,
        }
    }
}

// endregion

// region: terminals

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IzmirIdentifier(pub String);

impl From<&str> for IzmirIdentifier {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl std::fmt::Display for IzmirIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// endregion
