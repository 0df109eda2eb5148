//! Orchestration of the external tools that turn a QBF refutation into
//! a checked FERAT proof.
//!
//! A [`Pipeline`] owns the run-wide options, the expected tool set, and
//! a [`ProcessRunner`], and exposes one method per CLI command. The
//! individual solver and checker steps live in `stages`.

mod stages;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::RunConfig;
use crate::deps::{Dependencies, Tool};
use crate::error::PipelineError;
use crate::subprocess::{CommandSpec, ProcessRunner, RunOutput};
use crate::ux::{Ux, EMPHASIS};

/// Names under which `--profile` reports the step timings.
pub mod profile {
    pub const QBF_SOLVE: &str = "qbf_solve";
    pub const GEN_RAT_PROOF: &str = "gen_rat_proof";
    pub const CHECK_RAT_PROOF: &str = "check_rat_proof";
    pub const CHECK_EXPANSION: &str = "check_expansion";
    pub const GEN_FERAT_PROOF: &str = "gen_ferat_proof";
    pub const SPLIT_FERAT: &str = "split_ferat";
    pub const TOTAL: &str = "total";
}

/// Everything a pipeline run needs to know, resolved from the CLI.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Drive the LRAT tool chain instead of the (D)RAT one.
    pub lrat: bool,
    /// Wall-clock limit per external tool, `None` for no limit.
    pub timeout: Option<Duration>,
    /// Where intermediate files are placed.
    pub tmp_dir: PathBuf,
    /// Leave the intermediate files behind after the run.
    pub keep_tmp: bool,
    /// Directory holding the tool binaries.
    pub deps_dir: PathBuf,
    /// Announce every tool invocation and mirror its output.
    pub echo_commands: bool,
    /// Explain each pipeline stage as it starts.
    pub explain: bool,
    /// Emit ANSI styling.
    pub color: bool,
    /// Report per-step execution times.
    pub profile: bool,
}

/// The FERAT proof pipeline.
pub struct Pipeline {
    runner: Arc<dyn ProcessRunner>,
    options: PipelineOptions,
    ux: Ux,
    deps: Dependencies,
}

impl Pipeline {
    pub fn new(runner: Arc<dyn ProcessRunner>, options: PipelineOptions) -> Self {
        let ux = Ux::new(options.color, options.explain);
        let deps = Dependencies::for_mode(options.deps_dir.clone(), options.lrat);
        Self {
            runner,
            options,
            ux,
            deps,
        }
    }

    /// Verify the tool directory and set up the tmp directory before
    /// any command runs.
    pub fn preflight(&self, command: &str) -> Result<(), PipelineError> {
        if !self.options.deps_dir.is_dir() {
            return Err(PipelineError::DepsDirMissing {
                dir: self.options.deps_dir.clone(),
            });
        }
        create_tmp_dir(&self.options.tmp_dir)?;
        self.ux.stage("init_dependencies", "");
        let checked_in = std::path::absolute(self.deps.base_dir())?;
        self.ux
            .status(format!("Checking in '{}'", checked_in.display()));
        self.deps.check(&self.ux)?;
        self.ux.status(format!(
            "Command chosen is {}",
            self.ux.style(EMPHASIS, command)
        ));
        Ok(())
    }

    /// Produce one FERAT proof per input QBF.
    ///
    /// With several inputs the output must name a directory, and each
    /// proof lands there under the input's stem. A pre-computed
    /// `expansion` skips the QBF solving step and only works for a
    /// single input.
    pub async fn run_generate(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        expansion: Option<&Path>,
    ) -> Result<(), PipelineError> {
        if inputs.len() > 1 {
            if let Some(expansion) = expansion {
                return Err(PipelineError::Usage(format!(
                    "with '--expansion' ('{}') only one input may be given, but {} were supplied",
                    expansion.display(),
                    inputs.len()
                )));
            }
            if self.options.profile {
                return Err(PipelineError::Usage(format!(
                    "profiling needs exactly one input file, but {} were supplied",
                    inputs.len()
                )));
            }
            if !output.is_dir() {
                return Err(PipelineError::Usage(format!(
                    "with multiple input files the output must be a directory, not '{}'",
                    output.display()
                )));
            }
        }
        let targets = output_targets(inputs, output);
        for (qbf, target) in inputs.iter().zip(&targets) {
            self.ux.status("");
            self.ux.status(format!(
                "Processing '{}'",
                self.ux.style(EMPHASIS, qbf.display())
            ));
            self.generate_one(qbf, target, expansion).await?;
        }
        Ok(())
    }

    async fn generate_one(
        &self,
        qbf: &Path,
        output: &Path,
        expansion: Option<&Path>,
    ) -> Result<(), PipelineError> {
        let tmp = &self.options.tmp_dir;
        let out_stem = stem_of(output);
        let rat = tmp.join(format!("{out_stem}.rat"));
        let simple_cnf = tmp.join(format!("{out_stem}-simplified.cnf"));
        let simple_rat = tmp.join(format!("{out_stem}-simplified.rat"));

        let cnf = match expansion {
            Some(expansion) => {
                self.ux.status("Using given expansion");
                expansion.to_path_buf()
            }
            None => {
                let cnf = tmp.join(format!("{out_stem}.cnf"));
                self.solve_qbf(qbf, &cnf).await?;
                cnf
            }
        };
        self.gen_rat_proof(&cnf, &rat).await?;
        let (kept_cnf, kept_rat) = self
            .check_rat_proof(&cnf, &rat, Some(&simple_cnf), Some(&simple_rat))
            .await?;
        self.check_expansion(qbf, &kept_cnf).await?;
        self.gen_ferat_proof(&kept_cnf, &kept_rat, output)
    }

    /// Verify an existing FERAT proof against its QBF.
    pub async fn run_check(&self, qbf: &Path, ferat: &Path) -> Result<(), PipelineError> {
        let tmp = &self.options.tmp_dir;
        let stem = stem_of(qbf);
        let cnf_part = tmp.join(format!("{stem}-fsplit.cnf"));
        let rat_part = tmp.join(format!("{stem}-fsplit.rat"));
        self.split_ferat(ferat, &cnf_part, &rat_part)?;
        self.check_rat_proof(&cnf_part, &rat_part, None, None)
            .await?;
        self.check_expansion(qbf, &cnf_part).await
    }

    /// Remove the tmp directory unless the run asked to keep it.
    pub fn cleanup(&self) {
        if self.options.keep_tmp {
            return;
        }
        let tmp = &self.options.tmp_dir;
        if tmp.is_dir() {
            if let Err(err) = fs::remove_dir_all(tmp) {
                self.ux
                    .warn(format!("Could not remove '{}': {err}", tmp.display()));
            }
        }
    }

    fn run_config(&self) -> RunConfig {
        RunConfig {
            timeout: self.options.timeout,
            color: self.options.color,
            echo: self.options.echo_commands,
        }
    }

    fn tool_spec(&self, tool: Tool) -> CommandSpec {
        CommandSpec::new(self.deps.path(tool).to_string_lossy())
    }

    async fn run_tool(&self, spec: CommandSpec) -> Result<RunOutput, PipelineError> {
        if self.options.echo_commands {
            self.ux.status(format!("Invoking '{spec}'..."));
        }
        Ok(self.runner.run(&spec, &self.run_config()).await?)
    }

    fn report_timing(&self, name: &str, micros: u128) {
        if self.options.profile {
            self.ux.timing(name, micros);
        }
    }
}

/// One output path per input: the inputs' stems under a directory
/// output, or the single named file.
fn output_targets(inputs: &[PathBuf], output: &Path) -> Vec<PathBuf> {
    if output.is_dir() {
        inputs
            .iter()
            .map(|input| output.join(format!("{}.ferat", stem_of(input))))
            .collect()
    } else {
        vec![output.to_path_buf()]
    }
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned()
}

#[cfg(unix)]
fn create_tmp_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o755).create(dir)
}

#[cfg(not(unix))]
fn create_tmp_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}
