//! Run-time configuration shared across the pipeline.

use std::io::IsTerminal;
use std::time::Duration;

use clap::ValueEnum;

/// When to emit ANSI styling.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorMode {
    /// Color when stdout is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    pub fn enabled(self) -> bool {
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => std::io::stdout().is_terminal(),
        }
    }
}

/// Options applied to every external process run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunConfig {
    /// Wall-clock limit for one child process, `None` for no limit.
    pub timeout: Option<Duration>,
    /// Style mirrored tool output with the pass-through tags.
    pub color: bool,
    /// Mirror tool output to the terminal line by line.
    pub echo: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_color_modes_ignore_the_terminal() {
        assert!(ColorMode::Always.enabled());
        assert!(!ColorMode::Never.enabled());
    }

    #[test]
    fn run_config_defaults_to_silent_unlimited() {
        let config = RunConfig::default();
        assert!(config.timeout.is_none());
        assert!(!config.color);
        assert!(!config.echo);
    }
}
