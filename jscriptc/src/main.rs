use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use jscriptlib::bytecode::{CodecError, FunctionTable};
use jscriptlib::compiler::{Compilation, compile_paths};
use jscriptlib::diagnostic::{Diagnostic, DiagnosticBag};
use jscriptlib::resolver::{
    ARTIFACT_EXTENSION, ResolveErrorKind, default_artifact_path, resolve_sources,
};
use jscriptlib::vm::DEFAULT_ENTRY;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const EXIT_OK: u8 = 0;
const EXIT_IO: u8 = 3;
const EXIT_COMPILE: u8 = 11;
const EXIT_DECODE: u8 = 13;

#[derive(Parser, Debug)]
#[command(name = "jscriptc")]
#[command(about = "Check, build and disassemble JSON-source programs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile without writing an artifact
    Check {
        /// Source file or directory of `.json` units
        path: PathBuf,
    },
    /// Compile to a `.jsc` artifact
    Build {
        path: PathBuf,

        /// Output artifact (default: `<file>.jsc` or `<dir>/output.jsc`)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Entry point that must exist in the built table
        #[arg(long, default_value = DEFAULT_ENTRY)]
        entry: String,
    },
    /// Print the bytecode of a source path or an artifact
    Disasm { path: PathBuf },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    run(cli.command).unwrap_or_else(|code| code)
}

fn run(command: Command) -> Result<ExitCode, ExitCode> {
    match command {
        Command::Check { path } => {
            compile(&path)?;
            println!("ok: {}", path.display());
            Ok(ExitCode::from(EXIT_OK))
        }
        Command::Build {
            path,
            output,
            entry,
        } => build(&path, output, &entry),
        Command::Disasm { path } => disasm(&path),
    }
}

fn build(path: &Path, output: Option<PathBuf>, entry: &str) -> Result<ExitCode, ExitCode> {
    let functions = compile(path)?;
    if !functions.contains(entry) {
        eprintln!("[E-BUILD][build] Entry point '{entry}' not found");
        return Err(ExitCode::from(EXIT_COMPILE));
    }
    let output = output.unwrap_or_else(|| default_artifact_path(path));
    if let Err(e) = functions.save(&output) {
        eprintln!("Failed to write `{}`: {e}", output.display());
        return Err(codec_exit(&e));
    }
    info!(artifact = %output.display(), functions = functions.len(), "artifact written");
    println!("Built: {}", output.display());
    Ok(ExitCode::from(EXIT_OK))
}

fn disasm(path: &Path) -> Result<ExitCode, ExitCode> {
    let is_artifact = path.extension().and_then(|e| e.to_str()) == Some(ARTIFACT_EXTENSION);
    let functions = if is_artifact {
        FunctionTable::load(path).map_err(|e| {
            eprintln!("Failed to decode `{}`: {e}", path.display());
            codec_exit(&e)
        })?
    } else {
        compile(path)?
    };
    print!("{}", functions.disassemble());
    Ok(ExitCode::from(EXIT_OK))
}

/// Resolves and compiles `path`, reporting warnings and diagnostics on stderr.
fn compile(path: &Path) -> Result<FunctionTable, ExitCode> {
    let sources = resolve_sources(path).map_err(|e| {
        eprintln!("{e}");
        match e.kind {
            ResolveErrorKind::NotFound | ResolveErrorKind::Io => ExitCode::from(EXIT_IO),
            ResolveErrorKind::NoSources => ExitCode::from(EXIT_COMPILE),
        }
    })?;
    debug!(units = sources.len(), "compiling");
    match compile_paths(&sources) {
        Ok(Compilation {
            functions,
            warnings,
        }) => {
            print_diags(&warnings);
            Ok(functions)
        }
        Err(diags) => {
            print_diags(&diags);
            eprintln!("{} error(s)", diags.error_count());
            Err(ExitCode::from(EXIT_COMPILE))
        }
    }
}

fn print_diags(diags: &DiagnosticBag) {
    for d in diags.as_slice() {
        print_diag(d);
    }
}

fn print_diag(d: &Diagnostic) {
    let code = if d.is_error() { "E-COMPILE" } else { "W-COMPILE" };
    eprintln!("[{code}][compile] {d}");
}

fn codec_exit(e: &CodecError) -> ExitCode {
    match e {
        CodecError::Io(_) => ExitCode::from(EXIT_IO),
        _ => ExitCode::from(EXIT_DECODE),
    }
}
