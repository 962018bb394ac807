//! REPL (Read-Eval-Print Loop) implementation
//!
//! Input runs inside the worker without stepping its loop; `.loop` steps it
//! explicitly, which is the point of a synchronous worker.

use crate::error::{CliError, CliResult};
use crate::runtime::Runtime;
use boa_engine::JsValue;
use core_types::RunMode;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// What the REPL should do after a dot command.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Run the interactive REPL
pub fn run_repl(runtime: &mut Runtime) -> CliResult<()> {
    let mut editor = DefaultEditor::new()
        .map_err(|e| CliError::Repl(format!("Failed to initialize editor: {}", e)))?;

    println!("sync-worker {}", env!("CARGO_PKG_VERSION"));
    println!("Type JavaScript code, .help for commands, or .exit to quit.");
    println!();

    let mut line_buffer = String::new();
    let mut in_multiline = false;

    loop {
        let prompt = if in_multiline { "... " } else { "> " };

        match editor.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();

                if !in_multiline && trimmed.starts_with('.') {
                    if handle_repl_command(trimmed, runtime) == Flow::Quit {
                        break;
                    }
                    continue;
                }

                if in_multiline {
                    line_buffer.push('\n');
                }
                line_buffer.push_str(&line);

                if !is_input_complete(&line_buffer) {
                    in_multiline = true;
                    continue;
                }
                in_multiline = false;
                let _ = editor.add_history_entry(&line_buffer);

                match runtime.evaluate(&line_buffer) {
                    Ok(value) => println!("{}", format_value(&value)),
                    Err(e) => eprintln!("{}", e),
                }
                line_buffer.clear();

                if let Some(code) = runtime.exit_code() {
                    println!("Worker exited with code {}", code);
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                if in_multiline {
                    println!("^C");
                    line_buffer.clear();
                    in_multiline = false;
                } else {
                    println!("Press Ctrl-D or type .exit to quit");
                }
            }
            Err(ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(err) => {
                return Err(CliError::Repl(format!("Readline error: {}", err)));
            }
        }
    }

    Ok(())
}

/// Handle special REPL commands
fn handle_repl_command(command: &str, runtime: &mut Runtime) -> Flow {
    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    match name {
        ".help" => {
            println!("REPL Commands:");
            println!("  .loop [mode] - Step the loops (default, once, nowait)");
            println!("  .alive       - Show whether the worker loop has pending work");
            println!("  .stop        - Stop the worker");
            println!("  .clear       - Clear the screen");
            println!("  .help        - Show this help message");
            println!("  .exit        - Exit the REPL");
        }
        ".loop" => {
            let mode = match parts.next().map(str::parse::<RunMode>) {
                None => Ok(runtime.mode()),
                Some(parsed) => parsed,
            };
            match mode {
                Ok(mode) => {
                    if let Err(e) = runtime.drive(mode) {
                        eprintln!("{}", e);
                    }
                }
                Err(e) => eprintln!("{}", e),
            }
            if let Some(code) = runtime.exit_code() {
                println!("Worker exited with code {}", code);
                return Flow::Quit;
            }
        }
        ".alive" => match runtime.loop_alive() {
            Ok(alive) => println!("{}", alive),
            Err(e) => eprintln!("{}", e),
        },
        ".stop" => {
            if let Err(e) = runtime.shutdown() {
                eprintln!("{}", e);
            }
            return Flow::Quit;
        }
        ".clear" => {
            print!("\x1B[2J\x1B[1;1H");
        }
        ".exit" => return Flow::Quit,
        _ => {
            println!("Unknown command: {}", command);
            println!("Type .help for available commands");
        }
    }
    Flow::Continue
}

/// Check if the input appears to be complete
///
/// This is a simple heuristic that checks for balanced braces/brackets/parens
fn is_input_complete(input: &str) -> bool {
    let mut brace_count = 0;
    let mut bracket_count = 0;
    let mut paren_count = 0;
    let mut in_string = false;
    let mut string_char = ' ';
    let mut escape_next = false;

    for c in input.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }

        if c == '\\' && in_string {
            escape_next = true;
            continue;
        }

        if !in_string {
            match c {
                '"' | '\'' | '`' => {
                    in_string = true;
                    string_char = c;
                }
                '{' => brace_count += 1,
                '}' => brace_count -= 1,
                '[' => bracket_count += 1,
                ']' => bracket_count -= 1,
                '(' => paren_count += 1,
                ')' => paren_count -= 1,
                _ => {}
            }
        } else if c == string_char {
            in_string = false;
        }
    }

    brace_count <= 0 && bracket_count <= 0 && paren_count <= 0 && !in_string
}

/// Format a JavaScript value for display
pub fn format_value(value: &JsValue) -> String {
    if let Some(s) = value.as_string() {
        return format!("'{}'", s.to_std_string_escaped());
    }
    if let Some(object) = value.as_object() {
        if object.is_callable() {
            return "[Function]".to_string();
        }
    }
    value.display().to_string()
}
