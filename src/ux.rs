//! Styled terminal output.
//!
//! All user-facing status lines go through [`Ux`] so that the `--color`
//! choice is honored in one place. Diagnostic output (timings, command
//! traces) uses `tracing` instead and is controlled by `-v`.

use std::fmt::Display;

/// ANSI reset sequence, also written by stream mirrors after styled output.
pub const RESET: &str = "\x1b[0m";

/// A fixed ANSI style prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style(&'static str);

impl Style {
    /// The raw escape sequence starting this style.
    pub fn seq(&self) -> &'static str {
        self.0
    }
}

pub const BANNER: Style = Style("\x1b[95m");
pub const GOOD: Style = Style("\x1b[32m");
pub const BAD: Style = Style("\x1b[91m");
pub const VERY_BAD: Style = Style("\x1b[0m\x1b[41m");
pub const EMPHASIS: Style = Style("\x1b[94m");
pub const WARNING: Style = Style("\x1b[33m");
pub const DIMMED: Style = Style("\x1b[2m");
pub const DEBUG: Style = Style("\x1b[96m");
/// Pass-through tag for a tool's stdout lines.
pub const TOOL_STDOUT: Style = Style("\x1b[90m");
/// Pass-through tag for a tool's stderr lines.
pub const TOOL_STDERR: Style = Style("\x1b[2m\x1b[31m");

/// User-facing output writer for the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct Ux {
    color: bool,
    explain: bool,
}

impl Ux {
    pub fn new(color: bool, explain: bool) -> Self {
        Self { color, explain }
    }

    pub fn color_enabled(&self) -> bool {
        self.color
    }

    /// Wrap `text` in `style` when color output is enabled.
    pub fn style(&self, style: Style, text: impl Display) -> String {
        if self.color {
            format!("{}{}{}", style.seq(), text, RESET)
        } else {
            text.to_string()
        }
    }

    /// Print one prefixed status line per line of `msg` to stdout.
    pub fn status(&self, msg: impl Display) {
        self.write_prefixed(BANNER, &msg.to_string(), false);
    }

    /// Print a warning to stderr.
    pub fn warn(&self, msg: impl Display) {
        self.write_prefixed(WARNING, &self.style(WARNING, msg), true);
    }

    /// Announce a pipeline stage and, unless quieted, its explanation.
    pub fn stage(&self, name: &str, explanation: &str) {
        if !self.explain {
            return;
        }
        self.status(format!("Calling {}...", self.style(EMPHASIS, name)));
        for line in explanation.lines() {
            self.status(self.style(DIMMED, format!("    >>> {}", line.trim())));
        }
    }

    /// Print one step's measured execution time to stdout.
    pub fn timing(&self, name: &str, micros: u128) {
        self.write_prefixed(
            DEBUG,
            &self.style(DEBUG, format!("{name} took {micros} µs")),
            false,
        );
    }

    /// Print a fatal error to stderr, including the exit code about to be used.
    pub fn fatal(&self, code: i32, msg: impl Display) {
        self.write_prefixed(
            VERY_BAD,
            &format!("FATAL: {msg}\n(exiting with code {code})"),
            true,
        );
    }

    fn write_prefixed(&self, style: Style, msg: &str, to_stderr: bool) {
        let prefix = self.style(style, "[FERAT]");
        // An empty message still produces one prefixed line.
        let mut lines = msg.lines();
        let first = lines.next().unwrap_or("");
        let rest = lines;
        if to_stderr {
            eprintln!("{prefix} {first}");
            for line in rest {
                eprintln!("{prefix} {line}");
            }
        } else {
            println!("{prefix} {first}");
            for line in rest {
                println!("{prefix} {line}");
            }
        }
    }
}
