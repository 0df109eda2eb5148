//! Weaving an expansion CNF together with its refutation proof into a
//! single FERAT artifact, and splitting such an artifact back apart.
//!
//! The two directions are inverses up to the `p cnf` header, which the
//! weaving pass drops and the splitting pass recomputes from the clause
//! lines it finds.

use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::dimacs::{self, classify, LineClass, Tag};
use super::io::{open_input, read_line, write_line, AtomicFile};

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("{}:{line}: {source}", path.display())]
    BadLine {
        path: PathBuf,
        line: u64,
        #[source]
        source: dimacs::BadLiteral,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Weave the expansion CNF and its refutation into one FERAT artifact.
///
/// The CNF's `p` line is dropped, `c x` and `c o` annotations lose
/// their comment marker, other comments pass through untouched, and
/// every remaining line becomes an `e` clause line. The proof is then
/// appended byte for byte. The artifact is written atomically.
pub fn merge(cnf: &Path, proof: &Path, output: &Path) -> Result<(), TranscodeError> {
    let mut reader = open_input(cnf)?;
    let mut writer = BufWriter::new(AtomicFile::create(output)?);

    let mut line = Vec::new();
    while read_line(&mut reader, &mut line)? {
        match classify(&line) {
            LineClass::Problem => {}
            LineClass::TaggedComment { payload, .. } => write_line(&mut writer, payload)?,
            LineClass::Comment => write_line(&mut writer, &line)?,
            LineClass::Expansion { .. } | LineClass::Tagged { .. } | LineClass::Other => {
                writer.write_all(b"e ")?;
                write_line(&mut writer, &line)?;
            }
        }
    }

    let mut proof_reader = open_input(proof)?;
    io::copy(&mut proof_reader, &mut writer)?;

    debug!(artifact = %output.display(), "ferat artifact written");
    commit(writer)
}

/// What the splitting pass recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitStats {
    pub variables: u64,
    pub clauses: u64,
}

/// Split a FERAT artifact back into an expansion CNF and a proof.
///
/// Two passes over the artifact: the first counts `e` clauses and the
/// largest variable mentioned on `e` and `x` lines to rebuild the
/// `p cnf` header, the second distributes lines. `e` lines become CNF
/// clauses, `x` and `o` lines become `c`-prefixed CNF annotations, and
/// everything else goes to the proof verbatim. The header lands right
/// before the first `e` clause, or first in the CNF when there is none.
/// Both outputs are written atomically.
pub fn split(
    ferat: &Path,
    cnf_out: &Path,
    proof_out: &Path,
) -> Result<SplitStats, TranscodeError> {
    let mut reader = open_input(ferat)?;
    let mut line = Vec::new();
    let mut index: u64 = 0;
    let mut clauses: u64 = 0;
    let mut variables: u64 = 0;
    let mut header_at: Option<u64> = None;
    while read_line(&mut reader, &mut line)? {
        match classify(&line) {
            LineClass::Expansion { payload } => {
                clauses += 1;
                if header_at.is_none() {
                    header_at = Some(index);
                }
                variables = variables.max(scan_vars(ferat, index, payload)?);
            }
            LineClass::Tagged {
                tag: Tag::Extension,
                payload,
            } => {
                variables = variables.max(scan_vars(ferat, index, dimacs::after_tag(payload))?);
            }
            _ => {}
        }
        index += 1;
    }
    let header_at = header_at.unwrap_or(0);

    let mut reader = open_input(ferat)?;
    let mut cnf = BufWriter::new(AtomicFile::create(cnf_out)?);
    let mut proof = BufWriter::new(AtomicFile::create(proof_out)?);
    let mut wrote_header = false;
    let mut index: u64 = 0;
    while read_line(&mut reader, &mut line)? {
        if index == header_at {
            writeln!(cnf, "p cnf {variables} {clauses}")?;
            wrote_header = true;
        }
        match classify(&line) {
            LineClass::Expansion { payload } => write_line(&mut cnf, payload)?,
            LineClass::Tagged { payload, .. } => {
                cnf.write_all(b"c ")?;
                write_line(&mut cnf, payload)?;
            }
            _ => write_line(&mut proof, &line)?,
        }
        index += 1;
    }
    if !wrote_header {
        writeln!(cnf, "p cnf {variables} {clauses}")?;
    }

    commit(cnf)?;
    commit(proof)?;
    debug!(
        variables,
        clauses,
        cnf = %cnf_out.display(),
        proof = %proof_out.display(),
        "ferat artifact split"
    );
    Ok(SplitStats { variables, clauses })
}

/// Copy the `c x` annotation comments of `source` to the front of
/// `target`, keeping `target`'s own content after them.
///
/// Trimming checkers drop comments, but the extension-variable mapping
/// they carry is needed downstream, so a trimmed CNF gets them back.
pub fn prepend_extension_comments(source: &Path, target: &Path) -> Result<(), TranscodeError> {
    let mut annotations: Vec<u8> = Vec::new();
    let mut reader = open_input(source)?;
    let mut line = Vec::new();
    while read_line(&mut reader, &mut line)? {
        if matches!(
            classify(&line),
            LineClass::TaggedComment {
                tag: Tag::Extension,
                ..
            }
        ) {
            write_line(&mut annotations, &line)?;
        }
    }

    let mut writer = BufWriter::new(AtomicFile::create(target)?);
    writer.write_all(&annotations)?;
    let mut target_reader = open_input(target)?;
    io::copy(&mut target_reader, &mut writer)?;
    commit(writer)
}

fn scan_vars(path: &Path, index: u64, payload: &[u8]) -> Result<u64, TranscodeError> {
    dimacs::max_var_before_zero(payload).map_err(|source| TranscodeError::BadLine {
        path: path.to_path_buf(),
        line: index + 1,
        source,
    })
}

fn commit(writer: BufWriter<AtomicFile>) -> Result<(), TranscodeError> {
    let file = writer
        .into_inner()
        .map_err(|e| TranscodeError::Io(e.into_error()))?;
    file.commit()?;
    Ok(())
}
