// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Interactive REPL (Read-Eval-Print Loop) for tern.
//!
//! Every accepted line is compiled onto the end of one growing program, so
//! variables and functions declared earlier stay usable.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use owo_colors::OwoColorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Config, Editor, Helper};
use tern_engine::lexer::{Scanner, TokenKind};
use tern_engine::{Engine, builtins};

use crate::theme::Theme;

const HISTORY_FILE: &str = "history";
const MAX_HISTORY_SIZE: usize = 1000;

const KEYWORDS: &[&str] = &[
    "var", "function", "return", "if", "else", "while", "do", "for",
];
const LITERALS: &[&str] = &["true", "false"];

/// REPL commands that can be executed with a dot prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Exit,
    Clear,
    Version,
    Load,
    Bytecode,
}

impl ReplCommand {
    /// Parse a REPL command from input string
    pub fn parse(input: &str) -> Option<(Self, Option<&str>)> {
        let rest = input.trim().strip_prefix('.')?;
        let mut parts = rest.splitn(2, char::is_whitespace);
        let cmd = parts.next()?.to_lowercase();
        let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

        let cmd = match cmd.as_str() {
            "help" | "h" | "?" => ReplCommand::Help,
            "exit" | "quit" | "q" => ReplCommand::Exit,
            "clear" | "cls" => ReplCommand::Clear,
            "version" | "v" => ReplCommand::Version,
            "load" | "l" => ReplCommand::Load,
            "bytecode" | "bc" => ReplCommand::Bytecode,
            _ => return None,
        };
        Some((cmd, arg))
    }

    /// Get all available commands for help/completion
    pub fn all_commands() -> &'static [(&'static str, &'static str)] {
        &[
            (".help", "Show this help message"),
            (".exit", "Exit the REPL"),
            (".clear", "Clear the screen"),
            (".version", "Show version information"),
            (".load <file>", "Load and run a tern file in this session"),
            (".bytecode", "Disassemble everything compiled so far"),
        ]
    }
}

/// Completion, hints, highlighting and multi-line validation for rustyline
struct TernHelper {
    words: Vec<String>,
    theme: Theme,
}

impl TernHelper {
    fn new(theme: Theme) -> Self {
        let words = KEYWORDS
            .iter()
            .chain(LITERALS)
            .copied()
            .chain(builtins::names())
            .map(String::from)
            .chain(
                ReplCommand::all_commands()
                    .iter()
                    .map(|(cmd, _)| cmd.split_whitespace().next().unwrap_or(cmd).to_string()),
            )
            .collect();

        Self { words, theme }
    }

    /// The rest of the first known word that extends the last word of `line`.
    fn completion_suffix(&self, line: &str) -> Option<&str> {
        let word = &line[Self::word_start(line)..];
        if word.len() < 2 {
            return None;
        }

        self.words
            .iter()
            .find(|w| w.starts_with(word) && w.len() > word.len())
            .map(|w| &w[word.len()..])
    }

    fn word_start(line: &str) -> usize {
        line.rfind(|c: char| !c.is_alphanumeric() && c != '_' && c != '.')
            .map(|i| i + 1)
            .unwrap_or(0)
    }
}

impl Completer for TernHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let word = &line[Self::word_start(&line[..pos])..pos];
        if word.is_empty() {
            return Ok((pos, vec![]));
        }

        let matches = self
            .words
            .iter()
            .filter(|w| w.starts_with(word))
            .map(|w| Pair {
                display: w.clone(),
                replacement: w[word.len()..].to_string(),
            })
            .collect();

        Ok((pos, matches))
    }
}

impl Hinter for TernHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        if pos < line.len() {
            return None;
        }

        self.completion_suffix(line)
            .map(|rest| rest.to_string().style(self.theme.muted).to_string())
    }
}

impl Highlighter for TernHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.trim_start().starts_with('.') {
            return Cow::Owned(line.style(self.theme.accent).to_string());
        }
        Cow::Owned(highlight(line, &self.theme))
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Borrowed(hint)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

/// Colors a line token by token, copying the text between tokens verbatim.
fn highlight(line: &str, theme: &Theme) -> String {
    let mut result = String::with_capacity(line.len() * 2);
    let mut scanner = Scanner::new(line);
    let mut copied = 0;

    loop {
        let token = scanner.next_token();
        if matches!(token.kind, TokenKind::Eof) {
            break;
        }

        let (start, end) = (token.span.start, token.span.end.min(line.len()));
        result.push_str(&line[copied..start]);
        let text = &line[start..end];

        let style = match &token.kind {
            TokenKind::Identifier(name) if builtins::is_builtin(name) => Some(theme.builtin),
            TokenKind::Identifier(_) => None,
            TokenKind::Number(_) => Some(theme.number),
            TokenKind::String(_) | TokenKind::UnterminatedString => Some(theme.string),
            TokenKind::Invalid(_) => Some(theme.error),
            TokenKind::LeftParen
            | TokenKind::RightParen
            | TokenKind::LeftBrace
            | TokenKind::RightBrace => Some(theme.bracket),
            _ if LITERALS.contains(&text) => Some(theme.literal),
            _ if KEYWORDS.contains(&text) => Some(theme.keyword),
            _ if text.chars().all(|c| "+-*/%=<>!&|".contains(c)) => Some(theme.operator),
            _ => None,
        };

        match style {
            Some(style) => result.push_str(&text.style(style).to_string()),
            None => result.push_str(text),
        }
        copied = end;
    }

    result.push_str(&line[copied..]);
    result
}

impl Validator for TernHelper {
    fn validate(&self, ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        let input = ctx.input();

        if !is_balanced(input) {
            return Ok(ValidationResult::Incomplete);
        }

        // A trailing binary operator or separator expects more input
        let trimmed = input.trim_end();
        if trimmed.ends_with(['+', '-', '*', '/', '%', '=', ',', '&', '|', '\\']) {
            return Ok(ValidationResult::Incomplete);
        }

        Ok(ValidationResult::Valid(None))
    }
}

/// Check if parentheses and braces are balanced outside of strings
fn is_balanced(input: &str) -> bool {
    let mut stack = Vec::new();
    let mut in_string = None;
    let mut escape_next = false;

    for c in input.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match in_string {
            Some(_) if c == '\\' => escape_next = true,
            Some(quote) if c == quote => in_string = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => in_string = Some(c),
                '(' => stack.push(')'),
                '{' => stack.push('}'),
                ')' | '}' => {
                    if stack.pop() != Some(c) {
                        // Let the parser report the mismatch
                        return true;
                    }
                }
                _ => {}
            },
        }
    }

    stack.is_empty() && in_string.is_none()
}

impl Helper for TernHelper {}

/// Result of executing a REPL command
enum CommandResult {
    Continue,
    Exit,
}

/// The interactive REPL
pub struct Repl {
    engine: Engine,
    editor: Editor<TernHelper, DefaultHistory>,
    history_path: Option<PathBuf>,
    theme: Theme,
}

impl Repl {
    /// Create a REPL around an engine session
    pub fn new(engine: Engine, theme: Theme) -> rustyline::Result<Self> {
        let config = Config::builder()
            .history_ignore_dups(true)?
            .history_ignore_space(true)
            .max_history_size(MAX_HISTORY_SIZE)?
            .auto_add_history(true)
            .build();

        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(TernHelper::new(theme)));

        let history_path = dirs::data_local_dir().map(|dir| dir.join("tern").join(HISTORY_FILE));
        if let Some(path) = &history_path {
            if let Some(parent) = path.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    tracing::debug!("Cannot create history directory: {}", e);
                }
            }
            if editor.load_history(path).is_err() {
                tracing::debug!("No history loaded from {}", path.display());
            }
        }

        Ok(Self {
            engine,
            editor,
            history_path,
            theme,
        })
    }

    /// Run the REPL main loop
    pub fn run(&mut self) -> rustyline::Result<()> {
        self.print_banner();

        loop {
            let prompt = format!("{} ", "tern>".style(self.theme.prompt));

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    if let Some((cmd, arg)) = ReplCommand::parse(trimmed) {
                        match self.execute_command(cmd, arg) {
                            CommandResult::Continue => continue,
                            CommandResult::Exit => break,
                        }
                    }

                    match self.engine.eval(trimmed) {
                        Ok(_) if !crate::echoes_result(trimmed) => {}
                        result => self.print_result(result),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".style(self.theme.muted));
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "^D".style(self.theme.muted));
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        if let Some(path) = &self.history_path {
            if let Err(e) = self.editor.save_history(path) {
                tracing::warn!("Failed to save history to {}: {}", path.display(), e);
            }
        }
        Ok(())
    }

    fn execute_command(&mut self, cmd: ReplCommand, arg: Option<&str>) -> CommandResult {
        match cmd {
            ReplCommand::Help => self.print_help(),
            ReplCommand::Exit => return CommandResult::Exit,
            ReplCommand::Clear => print!("\x1B[2J\x1B[H"),
            ReplCommand::Version => self.print_version(),
            ReplCommand::Load => match arg {
                Some(path) => {
                    let result = self.engine.eval_file(Path::new(path));
                    self.print_result(result);
                }
                None => eprintln!(
                    "{}: {} requires a file path",
                    "Error".style(self.theme.error),
                    ".load".style(self.theme.accent)
                ),
            },
            ReplCommand::Bytecode => {
                let listing = self.engine.bytecode().disassemble();
                if listing.is_empty() {
                    println!("{}", "nothing compiled yet".style(self.theme.muted));
                } else {
                    println!("{}", listing);
                }
            }
        }
        CommandResult::Continue
    }

    fn print_result(&self, result: tern_engine::Result<tern_engine::Value>) {
        match result {
            Ok(value) => println!("{}", self.theme.value(&value)),
            Err(e) => eprintln!("{}", self.theme.error(&e.to_string())),
        }
    }

    fn print_banner(&self) {
        println!();
        println!(
            "  {} {}",
            "tern".style(self.theme.heading),
            env!("CARGO_PKG_VERSION").style(self.theme.number)
        );
        println!(
            "  {} {} {}",
            "Type".style(self.theme.muted),
            ".help".style(self.theme.accent),
            "for available commands".style(self.theme.muted)
        );
        println!();
    }

    fn print_help(&self) {
        println!();
        println!("{}", "REPL Commands:".style(self.theme.heading));
        println!();
        for (cmd, desc) in ReplCommand::all_commands() {
            println!(
                "  {:16} {}",
                cmd.style(self.theme.accent),
                desc.style(self.theme.muted)
            );
        }
        println!();
        println!("{}", "Keyboard Shortcuts:".style(self.theme.heading));
        println!();
        for (key, desc) in [
            ("Ctrl+C", "Cancel current input"),
            ("Ctrl+D", "Exit REPL"),
            ("Tab", "Autocomplete"),
        ] {
            println!(
                "  {:16} {}",
                key.style(self.theme.number),
                desc.style(self.theme.muted)
            );
        }
        println!();
    }

    fn print_version(&self) {
        println!(
            "{} {}",
            "tern".style(self.theme.heading),
            env!("CARGO_PKG_VERSION").style(self.theme.number)
        );
    }
}
