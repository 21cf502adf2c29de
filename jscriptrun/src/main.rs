use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use jscriptlib::bytecode::{CodecError, FunctionTable, Value};
use jscriptlib::compiler::compile_paths;
use jscriptlib::resolver::{ResolveErrorKind, resolve_sources};
use jscriptlib::vm::{ArenaMemory, DEFAULT_ENTRY, StdIoHost, Vm, VmConfig};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const EXIT_OK: u8 = 0;
const EXIT_IO: u8 = 3;
const EXIT_COMPILE: u8 = 11;
const EXIT_RUNTIME: u8 = 12;
const EXIT_DECODE: u8 = 13;

#[derive(Parser, Debug)]
#[command(name = "jscriptrun")]
#[command(about = "Run JSON-source programs or compiled .jsc artifacts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a source file or directory and run it
    Run {
        path: PathBuf,
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Run a previously built artifact
    Exec {
        artifact: PathBuf,
        #[command(flatten)]
        opts: RunOpts,
    },
}

#[derive(Args, Debug)]
struct RunOpts {
    /// Fully qualified entry function
    #[arg(long, default_value = DEFAULT_ENTRY)]
    entry: String,

    /// Dump the bytecode to stderr and trace execution
    #[arg(long)]
    debug: bool,

    /// Install the arena memory capability
    #[arg(long)]
    allow_memory: bool,

    /// Arguments handed to the entry as a `string[]`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let debug = match &cli.command {
        Command::Run { opts, .. } | Command::Exec { opts, .. } => opts.debug,
    };
    init_logging(debug);

    let (table, opts) = match cli.command {
        Command::Run { path, opts } => (compile(&path), opts),
        Command::Exec { artifact, opts } => (load(&artifact), opts),
    };
    match table {
        Ok(functions) => execute(&functions, &opts),
        Err(code) => code,
    }
}

fn init_logging(debug: bool) {
    // Per-opcode events are emitted at trace level from the VM runner.
    let default = if debug {
        "debug,jscriptlib::vm=trace"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn compile(path: &Path) -> Result<FunctionTable, ExitCode> {
    let sources = resolve_sources(path).map_err(|e| {
        eprintln!("{e}");
        match e.kind {
            ResolveErrorKind::NotFound | ResolveErrorKind::Io => ExitCode::from(EXIT_IO),
            ResolveErrorKind::NoSources => ExitCode::from(EXIT_COMPILE),
        }
    })?;
    match compile_paths(&sources) {
        Ok(compilation) => {
            for w in compilation.warnings.as_slice() {
                eprintln!("{w}");
            }
            Ok(compilation.functions)
        }
        Err(diags) => {
            for d in diags.as_slice() {
                eprintln!("{d}");
            }
            Err(ExitCode::from(EXIT_COMPILE))
        }
    }
}

fn load(artifact: &Path) -> Result<FunctionTable, ExitCode> {
    FunctionTable::load(artifact).map_err(|e| {
        eprintln!("Failed to load `{}`: {e}", artifact.display());
        match e {
            CodecError::Io(_) => ExitCode::from(EXIT_IO),
            _ => ExitCode::from(EXIT_DECODE),
        }
    })
}

fn execute(functions: &FunctionTable, opts: &RunOpts) -> ExitCode {
    if opts.debug {
        eprint!("{}", functions.disassemble());
    }
    let args = entry_args(functions, opts);

    let config = VmConfig {
        trace: opts.debug,
        ..VmConfig::default()
    };
    let mut host = StdIoHost;
    let mut memory = ArenaMemory::new();
    let mut vm = Vm::new(functions, &mut host).with_config(config);
    if opts.allow_memory {
        vm = vm.with_memory(&mut memory);
    }

    match vm.run(&opts.entry, args) {
        Ok(value) => {
            debug!(result = ?value, "entry returned");
            ExitCode::from(EXIT_OK)
        }
        Err(e) => {
            eprintln!("Runtime error: [{}] {e}", e.kind.code());
            ExitCode::from(EXIT_RUNTIME)
        }
    }
}

/// Trailing CLI arguments reach the entry only when it declares a parameter.
fn entry_args(functions: &FunctionTable, opts: &RunOpts) -> Vec<Value> {
    let takes_args = functions
        .get(&opts.entry)
        .is_some_and(|f| f.param_count == 1);
    if takes_args {
        let items = opts.args.iter().cloned().map(Value::Str).collect();
        return vec![Value::array(items)];
    }
    if !opts.args.is_empty() {
        warn!(entry = %opts.entry, count = opts.args.len(), "entry takes no arguments; ignoring");
    }
    Vec::new()
}
