//! File access for proof artifacts.
//!
//! Inputs are opened through a gzip-transparent reader selected by the
//! two magic bytes, never by file extension. Outputs are written to a
//! temporary file in the target directory and renamed into place, so a
//! failed run never leaves a truncated artifact behind.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use flate2::bufread::MultiGzDecoder;
use tempfile::NamedTempFile;

/// Leading bytes of a gzip member.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Open `path`, decompressing transparently when it starts with the
/// gzip magic. Anything else, including a short or empty file, is read
/// as-is.
pub fn open_input(path: &Path) -> io::Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let head = reader.fill_buf()?;
    if head.starts_with(&GZIP_MAGIC) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

/// Read one line including its terminator. Returns false at EOF.
pub fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<bool> {
    buf.clear();
    Ok(reader.read_until(b'\n', buf)? > 0)
}

/// Write `line`, adding the newline a final unterminated line lacks.
pub fn write_line<W: Write>(writer: &mut W, line: &[u8]) -> io::Result<()> {
    writer.write_all(line)?;
    if !line.ends_with(b"\n") {
        writer.write_all(b"\n")?;
    }
    Ok(())
}

/// An output file that only appears at its target path on [`commit`].
///
/// [`commit`]: AtomicFile::commit
pub struct AtomicFile {
    file: NamedTempFile,
    target: PathBuf,
}

impl AtomicFile {
    pub fn create(target: &Path) -> io::Result<Self> {
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        Ok(Self {
            file: NamedTempFile::new_in(dir)?,
            target: target.to_path_buf(),
        })
    }

    /// Rename the finished file into place.
    pub fn commit(self) -> io::Result<()> {
        self.file.persist(&self.target).map_err(|e| e.error)?;
        Ok(())
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs;
    use std::io::Read;

    fn read_to_string(reader: &mut dyn BufRead) -> String {
        let mut text = String::new();
        reader.read_to_string(&mut text).unwrap();
        text
    }

    #[test]
    fn plain_files_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.cnf");
        fs::write(&path, "p cnf 1 1\n1 0\n").unwrap();
        let mut reader = open_input(&path).unwrap();
        assert_eq!(read_to_string(&mut reader), "p cnf 1 1\n1 0\n");
    }

    #[test]
    fn gzip_files_are_decompressed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("packed.cnf");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"p cnf 1 1\n1 0\n").unwrap();
        fs::write(&path, encoder.finish().unwrap()).unwrap();
        let mut reader = open_input(&path).unwrap();
        assert_eq!(read_to_string(&mut reader), "p cnf 1 1\n1 0\n");
    }

    #[test]
    fn a_lone_magic_byte_is_not_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short");
        fs::write(&path, [0x1f]).unwrap();
        let mut reader = open_input(&path).unwrap();
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, [0x1f]);
    }

    #[test]
    fn empty_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        fs::write(&path, "").unwrap();
        let mut reader = open_input(&path).unwrap();
        assert_eq!(read_to_string(&mut reader), "");
    }

    #[test]
    fn read_line_keeps_terminators() {
        let mut input: &[u8] = b"one\ntwo";
        let mut reader = BufReader::new(&mut input);
        let mut line = Vec::new();
        assert!(read_line(&mut reader, &mut line).unwrap());
        assert_eq!(line, b"one\n");
        assert!(read_line(&mut reader, &mut line).unwrap());
        assert_eq!(line, b"two");
        assert!(!read_line(&mut reader, &mut line).unwrap());
    }

    #[test]
    fn write_line_terminates_unterminated_lines() {
        let mut out = Vec::new();
        write_line(&mut out, b"1 2 0\n").unwrap();
        write_line(&mut out, b"3 0").unwrap();
        assert_eq!(out, b"1 2 0\n3 0\n");
    }

    #[test]
    fn atomic_file_appears_only_after_commit() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("artifact.ferat");
        let mut file = AtomicFile::create(&target).unwrap();
        file.write_all(b"e 1 0\n").unwrap();
        assert!(!target.exists());
        file.commit().unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"e 1 0\n");
    }

    #[test]
    fn dropped_atomic_file_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("artifact.ferat");
        {
            let mut file = AtomicFile::create(&target).unwrap();
            file.write_all(b"partial").unwrap();
        }
        assert!(!target.exists());
    }
}
