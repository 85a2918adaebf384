//! File access with automatic gzip decompression
//!
//! Plain files are memory-mapped so the OS pages them in lazily as the scan
//! cursor advances. Files ending in `.gz` are decompressed once into memory.
//!
//! # Example
//!
//! ```rust,no_run
//! use nativex::file_reader;
//! use std::io::BufRead;
//!
//! // Automatically detects .gz and decompresses
//! let reader = file_reader::open("words.txt.gz")?;
//!
//! for line in reader.lines() {
//!     let line = line?;
//!     println!("{}", line);
//! }
//! # Ok::<(), std::io::Error>(())
//! ```

use flate2::read::GzDecoder;
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, stdin, BufRead, BufReader, Read};
use std::path::Path;

/// Buffer size for line-oriented reading (128KB)
const BUFFER_SIZE: usize = 128 * 1024;

/// Bytes backing a file stream
#[derive(Debug)]
pub enum FileSource {
    /// Read-only mapping of a plain file
    Mapped(Mmap),
    /// Decompressed (or empty) contents held in memory
    Buffer(Vec<u8>),
}

impl FileSource {
    /// The full contents
    pub fn as_slice(&self) -> &[u8] {
        match self {
            FileSource::Mapped(mmap) => &mmap[..],
            FileSource::Buffer(buf) => buf,
        }
    }

    /// True if the contents were decompressed from gzip or copied in
    pub fn is_buffered(&self) -> bool {
        matches!(self, FileSource::Buffer(_))
    }
}

/// Whether a path names a gzip file (case-insensitive `.gz` extension)
pub fn is_gzip_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

/// Load a file for scanning
///
/// `.gz` files are fully decompressed; zero-length files become an empty
/// buffer (an empty mapping is not portable); anything else is mapped.
///
/// # Errors
///
/// Returns an error if:
/// - The file doesn't exist or is not a regular file
/// - Permission denied
/// - Invalid gzip data (for .gz files)
pub fn load<P: AsRef<Path>>(path: P) -> io::Result<FileSource> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let metadata = file.metadata()?;
    if !metadata.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a regular file", path.display()),
        ));
    }

    if is_gzip_path(path) {
        let mut decoder = GzDecoder::new(file);
        let mut data = Vec::new();
        decoder.read_to_end(&mut data)?;
        return Ok(FileSource::Buffer(data));
    }

    if metadata.len() == 0 {
        return Ok(FileSource::Buffer(Vec::new()));
    }

    // SAFETY: the mapping is read-only; a concurrent truncation by another
    // process is outside what this library can guard against.
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(FileSource::Mapped(mmap))
}

/// Open a file for line-oriented reading with automatic gzip detection
///
/// Special case: path "-" reads from stdin.
pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn BufRead + Send>> {
    let path = path.as_ref();

    if path.to_str() == Some("-") {
        return Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, stdin())));
    }

    let file = File::open(path)?;
    if is_gzip_path(path) {
        let decoder = GzDecoder::new(file);
        Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, decoder)))
    } else {
        Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_plain_file_is_mapped() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "2020-05-05").unwrap();
        file.flush().unwrap();

        let source = load(file.path()).unwrap();
        assert!(!source.is_buffered());
        assert_eq!(source.as_slice(), b"2020-05-05");
    }

    #[test]
    fn test_load_gzip_file() {
        let mut file = NamedTempFile::with_suffix(".GZ").unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        write!(encoder, "compressed text").unwrap();
        file.write_all(&encoder.finish().unwrap()).unwrap();
        file.flush().unwrap();

        let source = load(file.path()).unwrap();
        assert!(source.is_buffered());
        assert_eq!(source.as_slice(), b"compressed text");
    }

    #[test]
    fn test_load_empty_file() {
        let file = NamedTempFile::new().unwrap();
        let source = load(file.path()).unwrap();
        assert!(source.as_slice().is_empty());
    }

    #[test]
    fn test_load_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(dir.path()).is_err());
    }

    #[test]
    fn test_open_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "alpha").unwrap();
        writeln!(file, "beta").unwrap();
        file.flush().unwrap();

        let reader = open(file.path()).unwrap();
        let lines: Vec<String> = reader.lines().collect::<io::Result<Vec<_>>>().unwrap();
        assert_eq!(lines, vec!["alpha", "beta"]);
    }
}
