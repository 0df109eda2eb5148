//! The individual solver and checker steps of the pipeline.
//!
//! Each stage announces itself, drives one external tool or transcoding
//! pass, interprets the outcome, and reports its duration when
//! profiling is on. Sequencing stays in the [`Pipeline`](super::Pipeline)
//! command methods.

use std::path::{Path, PathBuf};
use std::time::Instant;

use super::{profile, Pipeline};
use crate::deps::Tool;
use crate::error::PipelineError;
use crate::proof;
use crate::ux::GOOD;

const EXPLAIN_SOLVE_QBF: &str = "\
Calling the QBF solver. This step extracts the expanded clauses of the
original QBF as a formula in CNF. (Ijtihad; instrumented by Hadẑić,
Bloem, Shukla, and Seidl in 2022.)";

const EXPLAIN_GEN_RAT_PROOF: &str = "\
Calling a SAT solver on the obtained expansion clauses in CNF to
generate a RAT proof of the formula. (SAT solver Kissat by Biere,
Fazekas, Fleury, and Heisinger, 2020.)";

const EXPLAIN_CHECK_RAT_PROOF: &str = "\
Checking the correctness of the RAT proof, while optimizing it and
trimming the input expansion. (Checker drat-trim by Wetzler, Heule,
and Hunt, 2014.)";

const EXPLAIN_CHECK_EXPANSION: &str = "\
Checking the correctness of the FERAT proof's expansion step using the
original QBF and the expanded CNF clauses. (FERAT-tools by Simader,
and Seidl in 2024)";

const EXPLAIN_GEN_FERAT_PROOF: &str = "\
Merging the expansion of the QBF solver with the RAT proof of the SAT
solver to create a \\forall-Exp+RAT (FERAT) proof.";

const EXPLAIN_SPLIT_FERAT: &str = "Splitting the FERAT proof into its CNF and RAT components.";

impl Pipeline {
    /// Run the QBF solver on `qbf`, logging the expansion into `cnf`.
    ///
    /// Exit code 10 means the QBF is satisfiable, which ends the run
    /// with its own verdict instead of a proof.
    pub(super) async fn solve_qbf(&self, qbf: &Path, cnf: &Path) -> Result<(), PipelineError> {
        self.ux.stage("solve_qbf", EXPLAIN_SOLVE_QBF);
        let work_dir = cnf.parent().unwrap_or(Path::new("."));
        let spec = self
            .tool_spec(Tool::Ijtihad)
            .arg("--wit_per_call=-1")
            .arg("--cex_per_call=-1")
            .arg(format!("--tmp_dir={}/", work_dir.display()))
            .arg(format!("--log_phi={}", cnf.display()))
            .arg(qbf.display().to_string())
            .expect_codes([10, 20]);
        let run = self.run_tool(spec).await?;
        let outcome = if run.code() == Some(10) {
            Err(PipelineError::QbfSat)
        } else {
            self.ux.status(self.ux.style(GOOD, "QBF is UNSAT"));
            Ok(())
        };
        self.report_timing(profile::QBF_SOLVE, run.elapsed_micros());
        outcome
    }

    /// Run a SAT solver on the expansion, producing the proof at `rat`.
    pub(super) async fn gen_rat_proof(&self, cnf: &Path, rat: &Path) -> Result<(), PipelineError> {
        self.ux.stage("gen_rat_proof", EXPLAIN_GEN_RAT_PROOF);
        let tool = if self.options.lrat {
            Tool::Cadical
        } else {
            Tool::Kissat
        };
        let mut spec = self.tool_spec(tool);
        if !self.ux.color_enabled() {
            spec = spec.arg("--no-colors");
        }
        spec = spec.arg("--unsat").arg("--no-binary");
        if self.options.lrat {
            spec = spec.arg("--lrat");
        }
        let spec = spec
            .arg("-q")
            .arg(cnf.display().to_string())
            .arg(rat.display().to_string())
            .expect_codes([10, 20]);
        let run = self.run_tool(spec).await?;
        let outcome = if run.code() == Some(10) {
            Err(PipelineError::ExpansionSat)
        } else {
            self.ux.status(self.ux.style(GOOD, "CNF expansion is UNSAT"));
            Ok(())
        };
        self.report_timing(profile::GEN_RAT_PROOF, run.elapsed_micros());
        outcome
    }

    /// Check the RAT proof against the expansion, letting the trimmer
    /// write simplified versions of both when target paths are given.
    ///
    /// Returns the pair of files the remaining stages should use, which
    /// is the simplified pair when the trimmer produced one.
    pub(super) async fn check_rat_proof(
        &self,
        cnf: &Path,
        rat: &Path,
        simple_cnf: Option<&Path>,
        simple_rat: Option<&Path>,
    ) -> Result<(PathBuf, PathBuf), PipelineError> {
        self.ux.stage("check_rat_proof", EXPLAIN_CHECK_RAT_PROOF);
        let started = Instant::now();
        let result = self.trim_rat_proof(cnf, rat, simple_cnf, simple_rat).await;
        self.report_timing(profile::CHECK_RAT_PROOF, started.elapsed().as_micros());
        result
    }

    async fn trim_rat_proof(
        &self,
        cnf: &Path,
        rat: &Path,
        simple_cnf: Option<&Path>,
        simple_rat: Option<&Path>,
    ) -> Result<(PathBuf, PathBuf), PipelineError> {
        let spec = if self.options.lrat {
            let mut spec = self
                .tool_spec(Tool::LratTrim)
                .arg("--no-binary")
                .arg(cnf.display().to_string())
                .arg(rat.display().to_string());
            if let Some(simple_rat) = simple_rat {
                spec = spec.arg(simple_rat.display().to_string());
            }
            if let Some(simple_cnf) = simple_cnf {
                spec = spec.arg(simple_cnf.display().to_string());
            }
            spec.expect_codes([10, 20])
        } else {
            let mut spec = self
                .tool_spec(Tool::DratTrim)
                .arg(cnf.display().to_string())
                .arg(rat.display().to_string())
                // ASCII parse mode
                .arg("-I");
            if let Some(simple_cnf) = simple_cnf {
                spec = spec.arg("-c").arg(simple_cnf.display().to_string());
            }
            if let Some(simple_rat) = simple_rat {
                spec = spec.arg("-l").arg(simple_rat.display().to_string());
            }
            // drat-trim exits 1 on trivially unsatisfiable input while
            // still reporting a verified proof.
            spec.expect_codes([0, 1])
        };
        let run = self.run_tool(spec).await?;
        if !verified_marker(&run.stdout) {
            return Err(PipelineError::InvalidRatProof);
        }
        self.ux.status(self.ux.style(GOOD, "RAT proof is valid"));

        let mut kept = (cnf.to_path_buf(), rat.to_path_buf());
        let mut missing_simplification = false;
        if let Some(simple_cnf) = simple_cnf {
            if simple_cnf.is_file() {
                proof::prepend_extension_comments(cnf, simple_cnf)?;
                kept.0 = simple_cnf.to_path_buf();
            } else {
                missing_simplification = true;
            }
        }
        if let Some(simple_rat) = simple_rat {
            if simple_rat.is_file() {
                kept.1 = simple_rat.to_path_buf();
            } else {
                missing_simplification = true;
            }
        }
        if missing_simplification {
            self.ux.warn(
                "Trivially unsatisfiable formula or RAT proof, no RAT or CNF \
                 simplification by drat-trim",
            );
        }
        Ok(kept)
    }

    /// Check the expansion step of the proof against the original QBF.
    pub(super) async fn check_expansion(
        &self,
        qbf: &Path,
        cnf: &Path,
    ) -> Result<(), PipelineError> {
        self.ux.stage("check_expansion", EXPLAIN_CHECK_EXPANSION);
        let spec = self
            .tool_spec(Tool::FeratTools)
            .arg(qbf.display().to_string())
            .arg(cnf.display().to_string())
            .expect_codes([10, 20]);
        let run = self.run_tool(spec).await?;
        let outcome = if run.code() != Some(10) {
            Err(PipelineError::InvalidFeratProof)
        } else {
            self.ux.status(format!(
                "{} (expansion is sound)",
                self.ux.style(GOOD, "FERAT proof is valid")
            ));
            Ok(())
        };
        self.report_timing(profile::CHECK_EXPANSION, run.elapsed_micros());
        outcome
    }

    /// Weave the kept expansion and proof into the final FERAT artifact.
    pub(super) fn gen_ferat_proof(
        &self,
        cnf: &Path,
        rat: &Path,
        output: &Path,
    ) -> Result<(), PipelineError> {
        self.ux.stage("gen_ferat_proof", EXPLAIN_GEN_FERAT_PROOF);
        let started = Instant::now();
        let result = proof::merge(cnf, rat, output);
        if result.is_ok() {
            self.ux.status("Generated FERAT proof");
        }
        self.report_timing(profile::GEN_FERAT_PROOF, started.elapsed().as_micros());
        Ok(result?)
    }

    /// Take a FERAT artifact apart into its CNF and proof components.
    pub(super) fn split_ferat(
        &self,
        ferat: &Path,
        cnf: &Path,
        rat: &Path,
    ) -> Result<(), PipelineError> {
        self.ux.stage("split_ferat", EXPLAIN_SPLIT_FERAT);
        let started = Instant::now();
        let result = proof::split(ferat, cnf, rat);
        if result.is_ok() {
            self.ux.status("Split FERAT proof");
        }
        self.report_timing(profile::SPLIT_FERAT, started.elapsed().as_micros());
        result?;
        Ok(())
    }
}

/// Does the checker's report contain the `s VERIFIED` conclusion line?
fn verified_marker(report: &str) -> bool {
    report.lines().any(|line| {
        let mut tokens = line.split_ascii_whitespace();
        matches!(
            (tokens.next(), tokens.next(), tokens.next()),
            (Some(s), Some(verdict), None)
                if s.eq_ignore_ascii_case("s") && verdict.eq_ignore_ascii_case("VERIFIED")
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_verified_marker_is_found_case_insensitively() {
        assert!(verified_marker("c trimming done\ns VERIFIED\n"));
        assert!(verified_marker("  s verified  \n"));
        assert!(!verified_marker("s NOT VERIFIED\n"));
        assert!(!verified_marker("all lines s VERIFIED here\n"));
        assert!(!verified_marker(""));
    }
}
