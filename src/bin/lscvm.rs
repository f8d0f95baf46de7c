//! the LSCVM runner. takes a program file and either executes it or prints
//! the sanitized instruction stream.
//!
//! run with `--help` for more info.

use clap::{Parser, ValueEnum};

use lscvm::back::{execute_program, sanitize};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// the program file
    file: String,
    /// what to do with the program
    #[arg(value_enum, short, long, default_value_t = Mode::Run)]
    mode: Mode,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
enum Mode {
    /// execute the program
    Run,
    /// print the executable form: comments stripped, junk dropped
    Clean,
}

fn main() {
    let args = Args::parse();

    let input = String::from_utf8(std::fs::read(&args.file).expect("file should be readable"))
        .expect("input characters should be utf8");

    match args.mode {
        Mode::Clean => println!("{}", sanitize(&input)),
        Mode::Run => {
            println!();
            let result = execute_program(&input, &mut std::io::stdout());
            println!();

            if let Err(e) = result {
                eprintln!("{e}");
                eprintln!("vm error! exiting...");
                std::process::exit(1);
            }
        }
    }
}
