//! Command-line front end: a REPL over [`cbasic::Interpreter`], or a
//! one-shot file load with `cbasic FILE`.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;

use cbasic::{InterpreterConfig, Interpreter, LineSource, NeverBreak, Output, StdOutput};

#[derive(Parser, Debug)]
#[command(name = "cbasic", version, about = "A Microsoft BASIC 1.1-compatible interactive interpreter")]
struct Args {
    /// Load and run a program file before dropping to the prompt.
    file: Option<PathBuf>,

    /// String heap size in bytes.
    #[arg(long, default_value_t = InterpreterConfig::default().string_space_size)]
    string_space: usize,

    /// Simulated PEEK/POKE address space size in bytes.
    #[arg(long, default_value_t = InterpreterConfig::default().memory_size)]
    memory_size: usize,

    /// Terminal width in columns before an automatic line wrap.
    #[arg(long, default_value_t = InterpreterConfig::default().terminal_width)]
    terminal_width: usize,
}

/// Reads lines from stdin one at a time for `INPUT`/`GET`.
struct StdinSource;

impl LineSource for StdinSource {
    fn read_line(&mut self) -> Option<String> {
        let mut buf = String::new();
        match io::stdin().lock().read_line(&mut buf) {
            Ok(0) => None,
            Ok(_) => Some(buf.trim_end_matches(['\n', '\r']).to_string()),
            Err(_) => None,
        }
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let config = InterpreterConfig {
        memory_size: args.memory_size,
        string_space_size: args.string_space,
        terminal_width: args.terminal_width,
        ..InterpreterConfig::default()
    };

    // No Ctrl-C hook today: `RUN` cannot be interrupted from the CLI.
    // `NeverBreak` is the same stub the test suite uses, so this is a
    // documented limitation rather than dead code (see DESIGN.md).
    let mut interp = Interpreter::new(config, StdOutput, StdinSource, NeverBreak);

    if let Some(path) = &args.file {
        match fs::read_to_string(path) {
            Ok(contents) => {
                for line in contents.lines() {
                    if !line.trim().is_empty() {
                        let _ = interp.execute_line(line);
                    }
                }
            }
            Err(e) => {
                eprintln!("?FILE DATA ERROR ({e})");
                std::process::exit(1);
            }
        }
    }

    print_banner(&interp);
    repl(&mut interp);
}

fn print_banner<O: Output, L: LineSource, B: cbasic::BreakSignal>(interp: &Interpreter<O, L, B>) {
    println!("CBASIC 1.1");
    println!("{} BYTES FREE", interp.strings.available());
    println!("READY.");
}

fn repl<O: Output, L: LineSource, B: cbasic::BreakSignal>(interp: &mut Interpreter<O, L, B>) {
    let stdin = io::stdin();
    loop {
        print!("] ");
        let _ = io::stdout().flush();

        let mut buf = String::new();
        match stdin.lock().read_line(&mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(_) => break,
        }

        let line = buf.trim_end_matches(['\n', '\r']);
        if matches!(line.trim().to_ascii_uppercase().as_str(), "QUIT" | "EXIT" | "BYE" | "SYSTEM") {
            break;
        }

        // `execute_line` prints its own error message on failure; either
        // way the prompt returns.
        let _ = interp.execute_line(line);
        println!("READY.");
    }
}
