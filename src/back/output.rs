//! The last step: hand a compiled program to a file, or run it in place.

use std::path::PathBuf;

use derive_more::{Display, From};

use super::vm::{self, MachineError};

/// Where a compiled program ends up.
#[derive(Clone, Debug)]
pub enum OutputMode {
    /// Write the instruction stream to a file.
    File(PathBuf),
    /// Dump the program to stdout, then execute it immediately.
    RunJit,
}

#[derive(Display, From)]
pub enum OutputError {
    #[display("{_0}")]
    Io(std::io::Error),
    #[display("{_0}")]
    Machine(MachineError),
}

impl std::fmt::Debug for OutputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

pub fn write_output(program: &str, mode: &OutputMode) -> Result<(), OutputError> {
    match mode {
        OutputMode::File(path) => {
            std::fs::write(path, program)?;
            Ok(())
        }
        OutputMode::RunJit => {
            println!("\ncompiled program ({:#x} bytes):\n", program.len());
            println!("{program}\n");

            // a harmless suffix; the taps are no-ops.
            let program = format!("{program}?!");

            println!();
            vm::execute_program(&program, &mut std::io::stdout())?;
            println!();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_mode_writes_the_program_verbatim() {
        let path = std::env::temp_dir().join("lscvm-output-test.lscvm");
        write_output("ghMI", &OutputMode::File(path.clone())).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ghMI");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn run_jit_mode_executes() {
        // output goes to the real stdout; this just checks the happy path.
        write_output("ghMI", &OutputMode::RunJit).unwrap();
    }
}
