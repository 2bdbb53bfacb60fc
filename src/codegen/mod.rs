//! Logic for converting parsed `Izmir` code (_AST_)
//! to Izmir VM routines.

use std::collections::HashSet;

use tracing::instrument;

use crate::{common::ast, izmirvm::MutableProgram};

use backend::{Discipline, RegisterDiscipline, StackDiscipline};
use config::{Backend, CompilationConfig};

mod backend;
mod condition;
pub mod config;
mod context;
pub mod error;
mod expression;
mod procedure;
mod statement;
pub mod vm;

#[cfg(test)]
mod properties;

/// Compile a whole program: one routine per procedure, plus main.
///
/// The backend is chosen here, once; everything below is generic
/// over the emission discipline.
#[instrument(skip_all, fields(source = %program.source_name, backend = %config.backend))]
pub fn construct_program(
    program: &ast::IzmirProgram,
    config: &CompilationConfig,
) -> Result<MutableProgram, error::Error> {
    match config.backend {
        Backend::Stack => construct_with::<StackDiscipline>(program, config),
        Backend::Register => construct_with::<RegisterDiscipline>(program, config),
    }
}

fn construct_with<D: Discipline>(
    program: &ast::IzmirProgram,
    config: &CompilationConfig,
) -> Result<MutableProgram, error::Error> {
    let mut names = HashSet::new();
    for procedure in &program.procedures {
        if !names.insert(&procedure.name) {
            return Err(error::Error::MultipleProcedureDefinitions(
                procedure.name.0.clone(),
            ));
        }
    }

    // procedures are independent; the table keeps definition order
    let procedures = program
        .procedures
        .iter()
        .map(|procedure| procedure::construct::<D>(procedure, config))
        .collect::<Result<Vec<_>, _>>()?;

    let main = procedure::construct_main::<D>(&program.main, config)?;

    Ok(MutableProgram::new(
        program.source_name.clone(),
        procedures,
        main,
    ))
}

#[cfg(test)]
mod tests {
    use crate::{
        codegen::vm::VMInstructionBlock,
        common::ast::{IzmirExpression as E, IzmirPrimitive as P, IzmirStatement as S},
        fileio::input::SourceFile,
        izmirvm::interpreter,
        parser,
    };

    use super::*;

    const CONFIGURATIONS: [(Backend, bool); 4] = [
        (Backend::Stack, true),
        (Backend::Stack, false),
        (Backend::Register, true),
        (Backend::Register, false),
    ];

    fn parse(source: &str) -> ast::IzmirProgram {
        parser::parse_program(&SourceFile::new("test.izm", source)).expect("should parse")
    }

    /// Compile and run `program`, returning what it printed.
    fn run(
        program: &ast::IzmirProgram,
        config: &CompilationConfig,
        input: &[ast::IzmirValue],
    ) -> String {
        let executable = construct_program(program, config)
            .expect("should compile")
            .specialize()
            .expect("should specialize");

        let mut output = Vec::new();
        interpreter::run(&executable, input.iter().copied(), &mut output).expect("should run");

        String::from_utf8(output).expect("output should be valid UTF-8")
    }

    /// Run under every backend and rewriting setting, checking they agree.
    fn run_everywhere(source: &str, input: &[ast::IzmirValue]) -> String {
        let program = parse(source);

        let outputs = CONFIGURATIONS.map(|(backend, optimization_rewriting)| {
            run(
                &program,
                &CompilationConfig::new(backend).with_optimization_rewriting(optimization_rewriting),
                input,
            )
        });

        for output in &outputs[1..] {
            assert_eq!(output, &outputs[0]);
        }

        outputs[0].clone()
    }

    fn main_listing(source: &str, config: &CompilationConfig) -> String {
        let program = construct_program(&parse(source), config).expect("should compile");

        VMInstructionBlock::from(program.main.instructions).compile()
    }

    #[test]
    fn test_print_sum() {
        let config = CompilationConfig::new(Backend::Stack);

        assert_eq!(
            main_listing("print(2 + 3)", &config),
            ["pushconstant 2", "pushconstant 3", "plus", "print"].join("\n")
        );
        assert_eq!(run_everywhere("print(2 + 3)", &[]), "5\n");
    }

    #[test]
    fn test_literal_leaves_its_value() {
        for value in [0, 42, -7, i64::MAX] {
            let program = ast::IzmirProgram {
                source_name: String::from("literal"),
                procedures: Vec::new(),
                main: S::Print(E::Literal(value)),
            };

            for (backend, _) in CONFIGURATIONS {
                assert_eq!(
                    run(&program, &CompilationConfig::new(backend), &[]),
                    format!("{value}\n")
                );
            }
        }

        assert_eq!(
            run_everywhere("print -9223372036854775808", &[]),
            "-9223372036854775808\n"
        );
    }

    #[test]
    fn test_conditional_folding() {
        let source = "x := input; if x < 10 then print(1) else print(0) end";

        let folded = main_listing(source, &CompilationConfig::new(Backend::Stack));
        assert!(folded.lines().any(|line| line == "bgreaterorequal $else_0"));
        assert!(!folded.lines().any(|line| line == "less"));

        let naive = main_listing(
            source,
            &CompilationConfig::new(Backend::Stack).with_optimization_rewriting(false),
        );
        assert!(naive.lines().any(|line| line == "less"));
        assert!(naive.lines().any(|line| line == "bz $else_0"));

        for x in -3..15 {
            let expected = if x < 10 { "1\n" } else { "0\n" };
            assert_eq!(run_everywhere(source, &[x]), expected);
        }
    }

    #[test]
    fn test_loop_iteration_counts() {
        // guard initially true: the body still runs once
        assert_eq!(run_everywhere("repeat print 1 until true", &[]), "1\n");
        // guard initially false: the body never runs
        assert_eq!(run_everywhere("while false do print 1 end; print 2", &[]), "2\n");
        assert_eq!(
            run_everywhere("i := 3; while i > 0 do print i; i := i - 1 end", &[]),
            "3\n2\n1\n"
        );
        assert_eq!(
            run_everywhere("i := 0; repeat i := i + 1; print i until i >= 3", &[]),
            "1\n2\n3\n"
        );
    }

    #[test]
    fn test_sequence_order() {
        let source = "print 1; print 2";

        let listing = main_listing(source, &CompilationConfig::new(Backend::Stack));
        assert_eq!(
            listing,
            ["pushconstant 1", "print", "pushconstant 2", "print"].join("\n")
        );
        assert_eq!(run_everywhere(source, &[]), "1\n2\n");
    }

    #[test]
    fn test_recursive_procedure() {
        let source = "
            procedure fact(n) begin
                if n <= 1 then return 1 else return n * fact(n - 1) end
            end

            repeat
                n := input;
                print fact(n)
            until n = 0
        ";

        assert_eq!(run_everywhere(source, &[5, 10, 0]), "120\n3628800\n1\n");
    }

    #[test]
    fn test_procedures_and_blocks() {
        let source = "
            // sum of the first n odd numbers
            procedure odd_sum(n) begin
                var i, sum;
                while i < n do
                    sum := sum + (2 * i + 1);
                    i := i + 1
                end;
                return sum
            end

            procedure show(x, y) begin
                print x; print y
            end

            begin var x;
                print x;
                x := odd_sum(input);
                begin var x; x := 99; show(x, -x) end;
                print x;
                print if x % 2 = 0 then not x else x / 3 end
            end
        ";

        assert_eq!(run_everywhere(source, &[4]), "0\n99\n-99\n16\n0\n");
    }

    #[test]
    fn test_return_in_main_halts() {
        assert_eq!(run_everywhere("print 1; return 0; print 2", &[]), "1\n");
        assert_eq!(
            run_everywhere("while true do print 1; return 0 end; print 2", &[]),
            "1\n"
        );
    }

    #[test]
    fn test_return_from_inside_loops() {
        let source = "
            procedure seven() begin
                while true do return 7 end
            end

            // smallest i with i * i > limit
            procedure root_above(limit) begin
                var i;
                repeat
                    i := i + 1;
                    if i * i > limit then return i end
                until false
            end

            print seven();
            print root_above(input);
            print root_above(0)
        ";

        assert_eq!(run_everywhere(source, &[50]), "7\n8\n1\n");
    }

    #[test]
    fn test_duplicate_procedures_are_rejected() {
        let program = parse(
            "procedure f() begin return 1 end procedure f() begin return 2 end print f()",
        );

        assert!(matches!(
            construct_program(&program, &CompilationConfig::default()),
            Err(error::Error::MultipleProcedureDefinitions(name)) if name == "f"
        ));
    }

    #[test]
    fn test_unsupported_construct_is_an_error() {
        let program = ast::IzmirProgram {
            source_name: String::from("malformed"),
            procedures: Vec::new(),
            main: S::Print(E::Primitive {
                primitive: P::Less,
                operands: vec![E::Literal(1), E::Literal(2), E::Literal(3)],
            }),
        };

        for (backend, optimization_rewriting) in CONFIGURATIONS {
            let config =
                CompilationConfig::new(backend).with_optimization_rewriting(optimization_rewriting);

            assert!(matches!(
                construct_program(&program, &config),
                Err(error::Error::UnsupportedConstruct(_))
            ));
        }
    }
}
