use lox_vm::{Vm, VmError};
use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::{CompletionType, Config, EditMode, Editor};
use std::path::PathBuf;

use crate::config::ReplConfig;

pub struct Repl {
    /// One long-lived VM, globals persist between lines
    vm: Vm,
    /// Command history editor
    editor: Editor<(), FileHistory>,
    /// Path to history file
    history_path: PathBuf,
    prompt: String,
}

impl Repl {
    pub fn new(vm: Vm, config: &ReplConfig) -> rustyline::Result<Self> {
        let editor_config = Config::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .edit_mode(EditMode::Emacs)
            .build();

        // Create editor instance
        let mut editor = Editor::with_config(editor_config)?;

        // Load existing history
        let history_path = config.history_path();
        if editor.load_history(&history_path).is_err() {
            tracing::debug!(path = %history_path.display(), "no previous history");
        }

        Ok(Self {
            vm,
            editor,
            history_path,
            prompt: config.prompt.clone(),
        })
    }

    pub fn run(&mut self) -> rustyline::Result<()> {
        println!("Lox REPL v{}", env!("CARGO_PKG_VERSION"));
        println!("Type '.help' for more information.");

        loop {
            match self.editor.readline(&self.prompt) {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }

                    self.editor.add_history_entry(line.as_str())?;
                    if let Err(e) = self.editor.save_history(&self.history_path) {
                        eprintln!("Error saving history: {}", e);
                    }

                    // Handle special commands
                    match input {
                        ".help" => {
                            println!("Available commands:");
                            println!("  .help    Show this help message");
                            println!("  .exit    Exit the REPL");
                            println!("\nUse arrow keys ↑/↓ to navigate history");
                            continue;
                        }
                        ".exit" => break,
                        _ => {}
                    }

                    self.execute_code(&line);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    println!("Error: {}", err);
                    break;
                }
            }
        }

        Ok(())
    }

    // Diagnostics and runtime reports are already on stderr, keep going either way.
    fn execute_code(&mut self, code: &str) {
        match self.vm.interpret(code) {
            Ok(()) | Err(VmError::CompileError) | Err(VmError::RuntimeError(_)) => {}
            Err(VmError::Io(e)) => eprintln!("Error: {}", e),
        }
    }
}
