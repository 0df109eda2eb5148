//! Proof artifact handling: the FERAT line grammar, gzip-transparent
//! file access, and the weave/split transcoding passes.

pub mod dimacs;
pub mod io;
pub mod transcode;

pub use transcode::{merge, prepend_extension_comments, split, SplitStats, TranscodeError};
