//! Logic for parsing raw `Izmir` code
//! into an AST.

use chumsky::prelude::*;
use phf::phf_set;

#[allow(clippy::wildcard_imports)]
use crate::common::ast::*;

use crate::fileio::input::SourceFile;

pub type IzmirParseError = Simple<char>;

static RESERVED_WORDS: phf::Set<&'static str> = phf_set! {
    "begin", "end", "var", "skip", "print", "return", "procedure",
    "if", "then", "else", "while", "do", "repeat", "until",
    "not", "true", "false", "input",
};

/// Parse a whole program (source file).
pub fn parse_program(source_file: &SourceFile) -> Result<IzmirProgram, Vec<IzmirParseError>> {
    let (procedures, main) = program().parse(source_file.content())?;

    Ok(IzmirProgram {
        source_name: source_file.name().to_owned(),
        procedures,
        main,
    })
}

/// Construct the parser for an Izmir program: procedures first,
/// then the main statement.
fn program(
) -> impl Parser<char, (Vec<IzmirProcedure>, IzmirStatement), Error = IzmirParseError> {
    let statements = statements();

    whitespace()
        .ignore_then(procedure(statements.clone()).repeated())
        .then(statements)
        .then_ignore(end())
}

/// Whitespace and `//` line comments.
fn whitespace() -> impl Parser<char, (), Error = IzmirParseError> + Clone {
    let comment = just("//").then(take_until(text::newline().or(end())));

    text::whitespace()
        .then(comment.padded().repeated())
        .ignored()
}

fn keyword(word: &'static str) -> impl Parser<char, (), Error = IzmirParseError> + Clone {
    text::keyword(word).then_ignore(whitespace())
}

fn symbol(symbol: &'static str) -> impl Parser<char, (), Error = IzmirParseError> + Clone {
    just(symbol).ignored().then_ignore(whitespace())
}

fn identifier() -> impl Parser<char, IzmirIdentifier, Error = IzmirParseError> + Clone {
    text::ident()
        .try_map(|name: String, span| {
            if RESERVED_WORDS.contains(name.as_str()) {
                Err(Simple::custom(
                    span,
                    format!("`{name}` is reserved and cannot be used as a name"),
                ))
            } else {
                Ok(IzmirIdentifier(name))
            }
        })
        .then_ignore(whitespace())
}

fn integer() -> impl Parser<char, IzmirValue, Error = IzmirParseError> + Clone {
    text::int(10)
        .try_map(|digits: String, span| {
            digits
                .parse::<IzmirValue>()
                .map_err(|_| Simple::custom(span, "integer literal is out of range"))
        })
        .then_ignore(whitespace())
}

/// A `-` directly followed by digits is a single literal, so that
/// the smallest value can be written.
fn negative_integer() -> impl Parser<char, IzmirValue, Error = IzmirParseError> + Clone {
    just('-')
        .ignore_then(text::int(10))
        .try_map(|digits: String, span| {
            format!("-{digits}")
                .parse::<IzmirValue>()
                .map_err(|_| Simple::custom(span, "integer literal is out of range"))
        })
        .then_ignore(whitespace())
}

fn actuals(
    // NOTE: since this is a part of the (recursive) `expression` parser definition,
    // we have to directly pass expression parser
    expression: impl Parser<char, IzmirExpression, Error = IzmirParseError> + Clone,
) -> impl Parser<char, Vec<IzmirExpression>, Error = IzmirParseError> + Clone {
    expression
        .separated_by(symbol(","))
        .delimited_by(symbol("("), symbol(")"))
}

fn expression() -> impl Parser<char, IzmirExpression, Error = IzmirParseError> + Clone {
    recursive(|expression| {
        let conditional = keyword("if")
            .ignore_then(expression.clone())
            .then_ignore(keyword("then"))
            .then(expression.clone())
            .then_ignore(keyword("else"))
            .then(expression.clone())
            .then_ignore(keyword("end"))
            .map(|((condition, then_branch), else_branch)| {
                IzmirExpression::if_then_else(condition, then_branch, else_branch)
            });

        let call = identifier()
            .then(actuals(expression.clone()))
            .map(|(callee, actuals)| IzmirExpression::Call(IzmirCall { callee, actuals }));

        // since there is possible ambiguity here, order in which the
        // options are listed is important (most specific => least specific)
        let atom = integer()
            .map(IzmirExpression::Literal)
            .or(keyword("true").to(IzmirExpression::Literal(1)))
            .or(keyword("false").to(IzmirExpression::Literal(0)))
            .or(keyword("input").to(IzmirExpression::nullary(IzmirPrimitive::Input)))
            .or(conditional)
            .or(call)
            .or(identifier().map(IzmirExpression::Variable))
            .or(expression.delimited_by(symbol("("), symbol(")")))
            .boxed();

        let unary_operator = symbol("-")
            .to(IzmirPrimitive::UnaryMinus)
            .or(keyword("not").to(IzmirPrimitive::LogicalNot));
        let unary = negative_integer()
            .map(IzmirExpression::Literal)
            .or(unary_operator
                .repeated()
                .then(atom)
                .foldr(IzmirExpression::unary))
            .boxed();

        let product_operator = symbol("*")
            .to(IzmirPrimitive::Times)
            .or(symbol("/").to(IzmirPrimitive::Divided))
            .or(symbol("%").to(IzmirPrimitive::Remainder));
        let product = unary
            .clone()
            .then(product_operator.then(unary).repeated())
            .foldl(|left, (primitive, right)| IzmirExpression::binary(primitive, left, right))
            .boxed();

        let sum_operator = symbol("+")
            .to(IzmirPrimitive::Plus)
            .or(symbol("-").to(IzmirPrimitive::Minus));
        let sum = product
            .clone()
            .then(sum_operator.then(product).repeated())
            .foldl(|left, (primitive, right)| IzmirExpression::binary(primitive, left, right))
            .boxed();

        // longer operators first, so that `<` does not shadow `<=` and `<>`
        let comparison_operator = choice((
            symbol("<=").to(IzmirPrimitive::LessOrEqual),
            symbol("<>").to(IzmirPrimitive::Different),
            symbol(">=").to(IzmirPrimitive::GreaterOrEqual),
            symbol("<").to(IzmirPrimitive::Less),
            symbol(">").to(IzmirPrimitive::Greater),
            symbol("=").to(IzmirPrimitive::Equal),
        ));

        sum.clone()
            .then(comparison_operator.then(sum).or_not())
            .map(|(left, comparison)| match comparison {
                Some((primitive, right)) => IzmirExpression::binary(primitive, left, right),
                None => left,
            })
    })
}

/// `begin [var x, y, ...;] statements end`, one nested block per variable.
fn block(
    statements: impl Parser<char, IzmirStatement, Error = IzmirParseError> + Clone,
) -> impl Parser<char, IzmirStatement, Error = IzmirParseError> + Clone {
    let declarations = keyword("var")
        .ignore_then(identifier().separated_by(symbol(",")).at_least(1))
        .then_ignore(symbol(";"));

    keyword("begin")
        .ignore_then(declarations.or_not())
        .then(statements)
        .then_ignore(keyword("end"))
        .map(|(variables, body)| {
            variables
                .unwrap_or_default()
                .into_iter()
                .rev()
                .fold(body, |body, variable| IzmirStatement::Block {
                    variable,
                    body: Box::new(body),
                })
        })
}

/// A (possibly empty) `;`-separated sequence of statements.
fn statements() -> impl Parser<char, IzmirStatement, Error = IzmirParseError> + Clone {
    recursive(|statements| {
        let expression = expression();

        let skip = keyword("skip").to(IzmirStatement::Skip);

        let conditional = keyword("if")
            .ignore_then(expression.clone())
            .then_ignore(keyword("then"))
            .then(statements.clone())
            .then(keyword("else").ignore_then(statements.clone()).or_not())
            .then_ignore(keyword("end"))
            .map(
                |((condition, then_branch), else_branch)| match else_branch {
                    Some(else_branch) => {
                        IzmirStatement::if_then_else(condition, then_branch, else_branch)
                    }
                    None => IzmirStatement::if_then(condition, then_branch),
                },
            );

        let while_do = keyword("while")
            .ignore_then(expression.clone())
            .then_ignore(keyword("do"))
            .then(statements.clone())
            .then_ignore(keyword("end"))
            .map(|(guard, body)| IzmirStatement::while_do(guard, body));

        let repeat_until = keyword("repeat")
            .ignore_then(statements.clone())
            .then_ignore(keyword("until"))
            .then(expression.clone())
            .map(|(body, guard)| IzmirStatement::repeat_until(body, guard));

        let print = keyword("print")
            .ignore_then(expression.clone())
            .map(IzmirStatement::Print);

        let r#return = keyword("return")
            .ignore_then(expression.clone())
            .map(IzmirStatement::Return);

        let assignment = identifier()
            .then_ignore(symbol(":="))
            .then(expression.clone())
            .map(|(variable, expression)| IzmirStatement::Assignment {
                variable,
                expression,
            });

        let call = identifier()
            .then(actuals(expression))
            .map(|(callee, actuals)| IzmirStatement::Call(IzmirCall { callee, actuals }));

        let statement = choice((
            skip,
            block(statements),
            conditional,
            while_do,
            repeat_until,
            print,
            r#return,
            assignment,
            call,
        ))
        .boxed();

        statement
            .separated_by(symbol(";"))
            .allow_trailing()
            .map(IzmirStatement::sequence_of)
    })
}

fn procedure(
    statements: impl Parser<char, IzmirStatement, Error = IzmirParseError> + Clone,
) -> impl Parser<char, IzmirProcedure, Error = IzmirParseError> {
    let formals = identifier()
        .separated_by(symbol(","))
        .delimited_by(symbol("("), symbol(")"));

    keyword("procedure")
        .ignore_then(identifier())
        .then(formals)
        .then(block(statements))
        .map(|((name, formals), body)| IzmirProcedure {
            name,
            formals,
            body,
        })
}
