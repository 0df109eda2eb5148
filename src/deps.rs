//! Discovery of the external solver and checker binaries.
//!
//! All tools are expected as executables in one directory rather than
//! on `PATH`, so a run can be pinned to a specific set of builds.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::PipelineError;
use crate::ux::{Ux, BAD, GOOD};

/// External tools the pipeline drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Ijtihad,
    Kissat,
    Cadical,
    DratTrim,
    LratTrim,
    FeratTools,
}

impl Tool {
    pub const ALL: [Tool; 6] = [
        Tool::Ijtihad,
        Tool::Kissat,
        Tool::Cadical,
        Tool::DratTrim,
        Tool::LratTrim,
        Tool::FeratTools,
    ];

    /// Tools only exercised by the LRAT variant of the pipeline.
    pub const LRAT_ONLY: [Tool; 2] = [Tool::Cadical, Tool::LratTrim];

    pub fn binary(self) -> &'static str {
        match self {
            Tool::Ijtihad => "ijtihad",
            Tool::Kissat => "kissat",
            Tool::Cadical => "cadical",
            Tool::DratTrim => "drat-trim",
            Tool::LratTrim => "lrat-trim",
            Tool::FeratTools => "ferat-tools",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

/// The set of tool binaries expected in one directory.
#[derive(Debug, Clone)]
pub struct Dependencies {
    base_dir: PathBuf,
    tools: Vec<Tool>,
}

impl Dependencies {
    /// The tools a run needs, rooted at `base_dir`. Plain mode skips
    /// the LRAT-only tools.
    pub fn for_mode(base_dir: impl Into<PathBuf>, lrat: bool) -> Self {
        let tools = Tool::ALL
            .iter()
            .copied()
            .filter(|tool| lrat || !Tool::LRAT_ONLY.contains(tool))
            .collect();
        Self {
            base_dir: base_dir.into(),
            tools,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Where one tool's binary is expected.
    pub fn path(&self, tool: Tool) -> PathBuf {
        self.base_dir.join(tool.binary())
    }

    /// Verify every tool, printing one aligned status line each.
    pub fn check(&self, ux: &Ux) -> Result<(), PipelineError> {
        let width = self
            .tools
            .iter()
            .map(|tool| tool.binary().len())
            .max()
            .unwrap_or(0)
            + 2;
        let mut missing = Vec::new();
        for &tool in &self.tools {
            let path = self.path(tool);
            match probe(&path) {
                Ok(()) => {
                    ux.status(format!(
                        "{name:.<width$}: {verdict} (OK)",
                        name = tool.binary(),
                        verdict = ux.style(GOOD, "FOUND"),
                    ));
                    debug!(tool = tool.binary(), path = %path.display(), "dependency found");
                }
                Err(reason) => {
                    ux.status(format!(
                        "{name:.<width$}: {verdict} ({reason})",
                        name = tool.binary(),
                        verdict = ux.style(BAD, "NOT FOUND"),
                    ));
                    missing.push(tool.binary().to_string());
                }
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::DepsNotFound { missing })
        }
    }
}

fn probe(path: &Path) -> Result<(), &'static str> {
    if !path.exists() {
        return Err("does not exist");
    }
    if !path.is_file() {
        return Err("not a file");
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // A failing stat is treated as found, matching the lenient
        // handling of exotic filesystems.
        if let Ok(meta) = path.metadata() {
            if meta.permissions().mode() & 0o111 == 0 {
                return Err("not executable");
            }
        }
    }
    Ok(())
}
