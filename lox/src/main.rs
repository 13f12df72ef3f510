use std::{fs, path::PathBuf, process::exit};

use clap::Parser;
use lox_vm::{Vm, VmConfig, VmError};
use repr::Repl;
use tracing_subscriber::EnvFilter;

use config::Config;

mod config;
mod repr;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct LoxCli {
    /// The script to run, starts the REPL when omitted
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,
}

fn main() {
    // Logs go to stderr so they never mix with program output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("LOX_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load("lox.toml");
    let cli = LoxCli::parse();

    if let Some(path) = cli.file {
        run_file(path, config.vm);
    } else {
        // Run the repl
        let vm = Vm::new().with_config(config.vm);
        let result = Repl::new(vm, &config.repl).and_then(|mut repl| repl.run());
        if let Err(e) = result {
            eprintln!("Error: {}", e);
            exit(1);
        }
    }
}

fn run_file(path: PathBuf, config: VmConfig) {
    let source = match fs::read_to_string(&path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Could not read file \"{}\": {}", path.display(), e);
            exit(74);
        }
    };

    let mut vm = Vm::new().with_config(config);
    if let Err(err) = vm.interpret(&source) {
        tracing::debug!(path = %path.display(), error = %err, "script failed");
        match err {
            VmError::CompileError => exit(65),
            VmError::RuntimeError(_) => exit(70),
            VmError::Io(e) => {
                eprintln!("{e}");
                exit(74)
            }
        }
    }
}
