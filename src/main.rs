use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{debug, error, warn};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

use codegen::config::{Backend, CompilationConfig};
use fileio::{input::SourceFile, output};
use izmirvm::{interpreter, reader, MutableProgram};

mod codegen;
mod common;
mod fileio;
mod izmirvm;
mod parser;

/// Compile an Izmir program to Izmir VM code and run it.
#[derive(Parser, Debug)]
#[command(name = "izmirc", version, about, long_about = None)]
struct Cli {
    /// Source file, `-` for the standard input
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Emit stack-discipline code
    #[arg(long, conflicts_with = "register")]
    stack: bool,

    /// Emit register-discipline code (default)
    #[arg(long)]
    register: bool,

    /// Always compute conditions as values, instead of folding
    /// comparisons into conditional branches
    #[arg(long)]
    no_optimization_rewriting: bool,

    /// Print the listing of the compiled program
    #[arg(short, long)]
    print: bool,

    /// Write the listing of the compiled program to FILE
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Do not execute the program
    #[arg(long)]
    dry_run: bool,

    /// FILE is a routine listing, to be run as is
    #[arg(long)]
    routine: bool,

    /// Log compilation details
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> CompilationConfig {
        let backend = if self.stack {
            Backend::Stack
        } else {
            Backend::Register
        };

        CompilationConfig::new(backend).with_optimization_rewriting(!self.no_optimization_rewriting)
    }

    fn reads_source_from_stdin(&self) -> bool {
        self.file == Path::new(fileio::STDIN_PATH)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let source_file = SourceFile::load(&cli.file)
        .with_context(|| format!("unable to load `{}`", cli.file.display()))?;

    let program = if cli.routine {
        reader::read_program(source_file.name(), source_file.content())?
    } else {
        compile(&source_file, &cli.config())?
    };

    if cli.print {
        print!("{}", program.listing());
    }

    if let Some(path) = &cli.output {
        output::generate(&output::OutputFile::new(path.clone(), program.listing()))
            .with_context(|| format!("unable to write `{}`", path.display()))?;
        debug!(path = %path.display(), "wrote listing");
    }

    let executable = program
        .specialize()
        .context("unable to prepare the program for execution")?;

    if cli.dry_run {
        return Ok(());
    }

    let mut stdout = io::stdout().lock();
    if cli.reads_source_from_stdin() {
        warn!("program was read from the standard input, `input` has nothing left to read");
        interpreter::run(&executable, std::iter::empty(), &mut stdout)?;
    } else {
        let input = interpreter::read_values(io::stdin().lock());
        interpreter::run_with_input(&executable, input, &mut stdout)?;
    }
    stdout.flush()?;

    Ok(())
}

fn compile(source_file: &SourceFile, config: &CompilationConfig) -> anyhow::Result<MutableProgram> {
    let program = match parser::parse_program(source_file) {
        Ok(program) => program,
        Err(errors) => {
            let count = errors.len();
            error_report::display(source_file.name(), source_file.content(), errors);
            bail!("{count} syntax error(s) in `{}`", source_file.name());
        }
    };

    codegen::construct_program(&program, config)
        .with_context(|| format!("unable to compile `{}`", source_file.name()))
}

mod error_report {
    use ariadne::{Label, Report, ReportKind, Source};
    use tracing::warn;

    use crate::parser::IzmirParseError;

    pub fn display(file_path: &str, file_content: &str, errors: Vec<IzmirParseError>) {
        for error in errors {
            let report = Report::build(ReportKind::Error, file_path, error.span().start)
                .with_message(error.to_string())
                .with_label(
                    Label::new((file_path, error.span()))
                        .with_message(error.label().unwrap_or("error occurred here")),
                )
                .finish()
                .eprint((file_path, Source::from(file_content)));

            if let Err(report_error) = report {
                warn!(%report_error, "unable to display the syntax error");
            }
        }
    }
}
