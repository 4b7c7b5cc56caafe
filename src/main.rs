// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! tern - a small C-like scripting language
//!
//! This is the main entry point for the tern CLI/REPL.
//!
//! ## Features
//!
//! - Run a file, an inline snippet or a program piped on stdin
//! - Dump the syntax tree or the compiled bytecode
//! - Interactive REPL with highlighting and history

mod repl;
mod theme;

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use owo_colors::OwoColorize;
use tern_engine::ast::NodeKind;
use tern_engine::builtins;
use tern_engine::vm::{DEFAULT_MAX_FRAMES, DEFAULT_MAX_STACK};
use tern_engine::{Engine, VmConfig};
use tracing_subscriber::EnvFilter;

use theme::Theme;

#[derive(Parser, Debug)]
#[command(
    name = "tern",
    about = "Compile and run tern programs",
    version,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Source file to run
    file: Option<PathBuf>,

    /// Evaluate code from the command line
    #[arg(short = 'e', long = "eval", value_name = "CODE", conflicts_with = "file")]
    eval: Option<String>,

    /// Print the syntax tree instead of running
    #[arg(long)]
    ast: bool,

    /// Print the compiled bytecode before running
    #[arg(long)]
    bytecode: bool,

    /// Parse and analyze only
    #[arg(long)]
    check: bool,

    /// Maximum call depth
    #[arg(long, env = "TERN_MAX_FRAMES", default_value_t = DEFAULT_MAX_FRAMES)]
    max_frames: usize,

    /// Maximum operand stack depth
    #[arg(long, env = "TERN_MAX_STACK", default_value_t = DEFAULT_MAX_STACK)]
    max_stack: usize,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

impl Cli {
    fn vm_config(&self) -> VmConfig {
        VmConfig::new()
            .with_max_frames(self.max_frames)
            .with_max_stack(self.max_stack)
    }

    fn theme(&self) -> Theme {
        let disabled = self.no_color || std::env::var_os("NO_COLOR").is_some();
        Theme::new(!disabled && io::stderr().is_terminal())
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let theme = cli.theme();
    let source = match (&cli.eval, &cli.file) {
        (Some(code), _) => code.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read '{}'", path.display()))?,
        (None, None) if io::stdin().is_terminal() => {
            let mut repl = repl::Repl::new(Engine::with_config(cli.vm_config()), theme)
                .context("failed to initialize the REPL")?;
            repl.run()?;
            return Ok(ExitCode::SUCCESS);
        }
        (None, None) => {
            let mut source = String::new();
            io::stdin()
                .read_to_string(&mut source)
                .context("failed to read program from stdin")?;
            source
        }
    };

    Ok(run(&cli, &source, theme))
}

/// Installs the stderr subscriber. `RUST_LOG` overrides the default filter.
fn init_logging(verbose: bool) {
    let default = if verbose {
        "tern=debug,tern_engine=debug"
    } else {
        "tern=warn,tern_engine=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli, source: &str, theme: Theme) -> ExitCode {
    if cli.ast {
        return match tern_engine::parser::parse(source) {
            Ok(program) => {
                for statement in &program.body {
                    for line in statement.tree() {
                        println!("{}", line);
                    }
                }
                ExitCode::SUCCESS
            }
            Err(e) => report(&tern_engine::Error::from(e), theme),
        };
    }

    let mut engine = Engine::with_config(cli.vm_config());

    if cli.check {
        return match engine.check(source) {
            Ok(()) => {
                eprintln!("{}", "no errors found".style(theme.muted));
                ExitCode::SUCCESS
            }
            Err(e) => report(&e, theme),
        };
    }

    if cli.bytecode {
        match tern_engine::compile(source) {
            Ok(bytecode) => println!("{}", bytecode.disassemble()),
            Err(e) => return report(&e, theme),
        }
    }

    match engine.eval(source) {
        Ok(value) => {
            if cli.eval.is_some() && !value.is_undefined() && echoes_result(source) {
                println!("{}", value);
            }
            ExitCode::SUCCESS
        }
        Err(e) => report(&e, theme),
    }
}

/// Returns true when a program's result should be echoed after it runs.
///
/// A program that ends in a builtin call has already shown its result.
fn echoes_result(source: &str) -> bool {
    let Ok(program) = tern_engine::parser::parse(source) else {
        return false;
    };
    match program.body.last().map(|statement| &statement.kind) {
        Some(NodeKind::Call { callee, .. }) => {
            !callee.ident_name().is_some_and(builtins::is_builtin)
        }
        Some(_) => true,
        None => false,
    }
}

fn report(error: &tern_engine::Error, theme: Theme) -> ExitCode {
    eprintln!("{}", theme.error(&error.to_string()));
    if error.is_internal() {
        eprintln!(
            "{}",
            "this is a bug in tern, please report it".style(theme.muted)
        );
    }
    ExitCode::FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_limits_flow_into_vm_config() {
        let cli = Cli::parse_from(["tern", "--max-frames", "64", "--max-stack", "128", "prog.tn"]);
        assert_eq!(cli.vm_config(), VmConfig::new().with_max_frames(64).with_max_stack(128));
        assert_eq!(cli.file, Some(PathBuf::from("prog.tn")));
    }

    #[test]
    fn test_builtin_call_result_is_not_echoed() {
        assert!(!echoes_result("logprint(5);"));
        assert!(!echoes_result("var x = 2; logprint(x * 3);"));
        assert!(echoes_result("1 + 2;"));
        assert!(echoes_result("function f() { return 1; } f();"));
        assert!(echoes_result("logprint(1); 7;"));
        assert!(!echoes_result(""));
    }

    #[test]
    fn test_eval_conflicts_with_file() {
        assert!(Cli::try_parse_from(["tern", "-e", "1;", "prog.tn"]).is_err());
    }
}
