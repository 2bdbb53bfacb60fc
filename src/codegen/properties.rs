//! Randomized checks that neither the backend nor the branch rewriting
//! changes what a program prints.

use proptest::prelude::*;

use crate::{
    common::ast::{
        IzmirExpression as E, IzmirIdentifier, IzmirPrimitive as P, IzmirProcedure, IzmirProgram,
        IzmirStatement as S, IzmirValue,
    },
    izmirvm::interpreter,
};

use super::{
    config::{Backend, CompilationConfig},
    construct_program,
};

const VARIABLES: [&str; 3] = ["a", "b", "c"];

fn binary_primitive() -> impl Strategy<Value = P> {
    prop::sample::select(vec![
        P::Plus,
        P::Minus,
        P::Times,
        P::Divided,
        P::Remainder,
        P::Equal,
        P::Different,
        P::Less,
        P::LessOrEqual,
        P::Greater,
        P::GreaterOrEqual,
    ])
}

fn unary_primitive() -> impl Strategy<Value = P> {
    prop::sample::select(vec![P::UnaryMinus, P::LogicalNot, P::IsNonzero])
}

fn expression() -> impl Strategy<Value = E> {
    let leaf = prop_oneof![
        (-20..20_i64).prop_map(E::Literal),
        prop::sample::select(VARIABLES.to_vec()).prop_map(E::variable),
        Just(E::nullary(P::Input)),
    ];

    leaf.prop_recursive(4, 24, 3, |inner| {
        prop_oneof![
            (binary_primitive(), inner.clone(), inner.clone())
                .prop_map(|(primitive, left, right)| E::binary(primitive, left, right)),
            (unary_primitive(), inner.clone())
                .prop_map(|(primitive, operand)| E::unary(primitive, operand)),
            (inner.clone(), inner.clone(), inner.clone()).prop_map(
                |(condition, then_branch, else_branch)| E::if_then_else(
                    condition,
                    then_branch,
                    else_branch
                )
            ),
            (inner.clone(), inner.clone()).prop_map(|(left, right)| E::call("max", vec![left, right])),
            inner.prop_map(|operand| E::call("echo", vec![operand])),
        ]
    })
}

/// Loops count up a block-local `k`, which the body cannot assign.
fn counted_loop(body: S, iterations: IzmirValue, pre_tested: bool) -> S {
    let counter = || E::variable("k");
    let step = S::assignment("k", E::binary(P::Plus, counter(), E::Literal(1)));

    let r#loop = if pre_tested {
        S::while_do(
            E::binary(P::Less, counter(), E::Literal(iterations)),
            S::sequence(body, step),
        )
    } else {
        S::repeat_until(
            S::sequence(body, step),
            E::binary(P::GreaterOrEqual, counter(), E::Literal(iterations)),
        )
    };

    S::block("k", r#loop)
}

fn statement() -> impl Strategy<Value = S> {
    let leaf = prop_oneof![
        (prop::sample::select(VARIABLES.to_vec()), expression())
            .prop_map(|(variable, expression)| S::assignment(variable, expression)),
        expression().prop_map(S::Print),
        expression().prop_map(|argument| S::call("echo", vec![argument])),
        expression().prop_map(S::Return),
        Just(S::Skip),
    ];

    leaf.prop_recursive(4, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(S::sequence_of),
            (expression(), inner.clone(), inner.clone()).prop_map(
                |(condition, then_branch, else_branch)| S::if_then_else(
                    condition,
                    then_branch,
                    else_branch
                )
            ),
            (expression(), inner.clone())
                .prop_map(|(condition, then_branch)| S::if_then(condition, then_branch)),
            (prop::sample::select(VARIABLES.to_vec()), inner.clone())
                .prop_map(|(variable, body)| S::block(variable, body)),
            (inner, 0..3_i64, any::<bool>()).prop_map(|(body, iterations, pre_tested)| {
                counted_loop(body, iterations, pre_tested)
            }),
        ]
    })
}

fn procedure(name: &str, formals: &[&str], body: S) -> IzmirProcedure {
    IzmirProcedure {
        name: IzmirIdentifier::from(name),
        formals: formals.iter().copied().map(IzmirIdentifier::from).collect(),
        body,
    }
}

/// `body` becomes the procedure `run(x)`, which main may call.
fn program(main: S, body: S) -> IzmirProgram {
    let x = || E::variable("x");
    let y = || E::variable("y");

    IzmirProgram {
        source_name: String::from("generated"),
        procedures: vec![
            procedure(
                "max",
                &["x", "y"],
                S::if_then_else(
                    E::binary(P::Greater, x(), y()),
                    S::Return(x()),
                    S::Return(y()),
                ),
            ),
            procedure(
                "echo",
                &["x"],
                S::sequence(S::Print(x()), S::Return(x())),
            ),
            procedure("run", &["x"], body),
        ],
        main,
    }
}

fn execute(
    program: &IzmirProgram,
    config: &CompilationConfig,
    input: &[IzmirValue],
) -> Result<String, String> {
    let executable = construct_program(program, config)
        .map_err(|error| error.to_string())?
        .specialize()
        .map_err(|error| error.to_string())?;

    let mut output = Vec::new();
    // input never runs out
    interpreter::run(&executable, input.iter().copied().cycle(), &mut output)
        .map_err(|error| error.to_string())?;

    String::from_utf8(output).map_err(|error| error.to_string())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    // runtime errors (division by zero) must agree as well
    #[test]
    fn backend_and_rewriting_preserve_output(
        main in statement(),
        body in statement(),
        input in prop::collection::vec(-50..50_i64, 1..6),
    ) {
        let main = S::sequence(S::Print(E::call("run", vec![E::nullary(P::Input)])), main);
        let program = program(main, body);

        let reference = execute(&program, &CompilationConfig::new(Backend::Stack), &input);

        for backend in [Backend::Stack, Backend::Register] {
            for optimization_rewriting in [true, false] {
                let config = CompilationConfig::new(backend)
                    .with_optimization_rewriting(optimization_rewriting);

                prop_assert_eq!(&execute(&program, &config, &input), &reference);
            }
        }
    }

    #[test]
    fn reversed_comparisons_branch_on_the_negation(
        primitive in prop::sample::select(vec![
            P::Equal, P::Different, P::Less, P::LessOrEqual, P::Greater, P::GreaterOrEqual,
        ]),
        left in -5..5_i64,
        right in -5..5_i64,
    ) {
        let condition = E::binary(primitive, E::Literal(left), E::Literal(right));
        let main = S::if_then_else(condition.clone(), S::Print(E::Literal(1)), S::Print(E::Literal(0)));
        let direct = S::Print(condition);

        for backend in [Backend::Stack, Backend::Register] {
            let config = CompilationConfig::new(backend);
            prop_assert_eq!(
                execute(&program(main.clone(), S::Skip), &config, &[0]),
                execute(&program(direct.clone(), S::Skip), &config, &[0])
            );
        }
    }
}
