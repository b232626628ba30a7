//! Report output sink: a file when `--out` is given, stdout otherwise.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use thaw_core::Error;

/// Boxed report sink.
pub type Output = Box<dyn Write + Send>;

/// Opens the report destination.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be created.
pub fn open(path: Option<&Path>) -> thaw_core::Result<Output> {
    match path {
        Some(path) => {
            let file = File::create(path).map_err(|e| Error::io(path, e))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(io::stdout())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_to_requested_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let mut out = open(Some(&path)).unwrap();
        out.write_all(b"Name,Creation Date\n").unwrap();
        out.flush().unwrap();
        drop(out);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Name,Creation Date\n");
    }

    #[test]
    fn unwritable_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = open(Some(&dir.path().join("missing/report.csv"))).err().unwrap();
        assert!(matches!(err, Error::Io { .. }));
    }
}
