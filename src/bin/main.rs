use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
    rc::Rc,
};

use anyhow::{Context as _, Result};
use clap::Parser;
use phase::{
    code_gen::GeneratorConfig,
    context::{Context, FileTypeLoader},
    error::CompileError,
    parser,
    report::DefaultErrorReporter,
    util::fmt::tree,
};
use tracing::{debug, Level};

/// Compiles a Phase source file to PHP.
#[derive(Debug, Parser)]
#[command(name = "phasec", version, about)]
struct Args {
    /// The Phase source file.
    input: PathBuf,

    /// Write the output here instead of to standard output.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Target PHP major version. Types and attributes need 8 or newer.
    #[arg(long, default_value_t = GeneratorConfig::DEFAULT_PHP_VERSION)]
    php_version: u32,

    /// Directory other files' types are resolved from. Defaults to the
    /// directory of the input.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Print the syntax tree instead of PHP.
    #[arg(long)]
    dump_ast: bool,

    /// Log every compilation stage to standard error.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = if args.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the input compiled without any reported error. Output is
/// written even when errors were reported, as long as parsing succeeded.
fn run(args: &Args) -> Result<bool> {
    let src = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let file: Rc<str> = args.input.display().to_string().into();
    let reporter = DefaultErrorReporter::new();
    reporter.add_source(Rc::clone(&file), src.as_str().into());

    let output = if args.dump_ast {
        let Ok(stmts) = parser::parse_source(&src, file, &reporter) else {
            return Ok(false);
        };
        tree::print_program_string(&stmts, None)
    } else {
        let root = args
            .root
            .clone()
            .or_else(|| args.input.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        debug!(root = %root.display(), "resolving types");
        let mut context = Context::new(FileTypeLoader::new(root));
        let config = GeneratorConfig {
            php_version: args.php_version,
        };
        match phase::compile(&src, file, &mut context, &config, &reporter) {
            Ok(php) => php,
            Err(CompileError::Syntax(error)) => {
                debug!(%error, "parsing stopped");
                return Ok(false);
            }
            Err(CompileError::Reported { count, php }) => {
                eprintln!("error: compilation failed with {count} reported error(s)");
                php
            }
        }
    };

    match &args.output {
        Some(path) => fs::write(path, output)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{output}"),
    }
    Ok(!reporter.has_errors())
}
