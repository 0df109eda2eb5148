//! # FERAT
//!
//! A pipeline for generating and checking FERAT proofs of false QBFs.
//! Solving the QBF, refuting its expansion, and trimming and checking
//! the resulting proof are delegated to external tools; this crate
//! sequences them and owns the FERAT proof format itself.
//!
//! ## Usage
//!
//! ```bash
//! ferat generate [--expansion expansion.cnf] input.qdimacs proof.ferat
//! ferat check input.qdimacs proof.ferat
//! ```
//!
//! ## Modules
//!
//! - `config` - Color handling and per-process run options
//! - `deps` - Discovery of the external solver and checker binaries
//! - `error` - Pipeline failures and their process exit codes
//! - `pipeline` - Sequencing of the solver and checker stages
//! - `proof` - The FERAT artifact format: merging and splitting
//! - `subprocess` - Tool execution with capture and line mirroring
//! - `ux` - Styled, prefixed terminal output

pub mod config;
pub mod deps;
pub mod error;
pub mod pipeline;
pub mod proof;
pub mod subprocess;
pub mod ux;
