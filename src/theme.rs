// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Terminal colors for the CLI and REPL.

use owo_colors::{OwoColorize, Style};
use tern_engine::Value;

/// Styles used for every piece of colored output.
///
/// [`Theme::plain`] maps every role to an empty style, which prints text
/// without escape codes.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub error: Style,
    pub accent: Style,
    pub muted: Style,
    pub heading: Style,
    pub prompt: Style,
    pub keyword: Style,
    pub literal: Style,
    pub builtin: Style,
    pub number: Style,
    pub string: Style,
    pub operator: Style,
    pub bracket: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            error: Style::new().red().bold(),
            accent: Style::new().cyan(),
            muted: Style::new().dimmed(),
            heading: Style::new().white().bold(),
            prompt: Style::new().bright_green().bold(),
            keyword: Style::new().magenta().bold(),
            literal: Style::new().blue(),
            builtin: Style::new().cyan(),
            number: Style::new().yellow(),
            string: Style::new().green(),
            operator: Style::new().cyan(),
            bracket: Style::new().yellow(),
        }
    }
}

impl Theme {
    /// A theme that never emits escape codes.
    pub fn plain() -> Self {
        let plain = Style::new();
        Self {
            error: plain,
            accent: plain,
            muted: plain,
            heading: plain,
            prompt: plain,
            keyword: plain,
            literal: plain,
            builtin: plain,
            number: plain,
            string: plain,
            operator: plain,
            bracket: plain,
        }
    }

    /// Picks the colored or plain theme.
    pub fn new(color: bool) -> Self {
        if color { Self::default() } else { Self::plain() }
    }

    /// Formats a value the way the REPL echoes it.
    pub fn value(&self, value: &Value) -> String {
        match value {
            Value::Undefined => value.style(self.muted).to_string(),
            Value::Boolean(_) => value.style(self.literal).to_string(),
            Value::Number(_) => value.style(self.number).to_string(),
            Value::String(s) => format!("'{}'", s).style(self.string).to_string(),
        }
    }

    /// Formats an error report, coloring everything before the first `: `
    /// of each line.
    pub fn error(&self, report: &str) -> String {
        report
            .lines()
            .map(|line| match line.find(": ") {
                Some(split) => {
                    let (kind, rest) = line.split_at(split);
                    format!("{}{}", kind.style(self.error), rest)
                }
                None => line.style(self.error).to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
