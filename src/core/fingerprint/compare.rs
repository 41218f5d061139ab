//! Byte-for-byte file comparison.

use super::BLOCK_SIZE;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Check whether two files hold exactly the same bytes
pub fn files_identical(a: &Path, b: &Path) -> io::Result<bool> {
    if fs::metadata(a)?.len() != fs::metadata(b)?.len() {
        return Ok(false);
    }

    let mut left = BufReader::new(File::open(a)?);
    let mut right = BufReader::new(File::open(b)?);
    let mut left_buf = vec![0u8; BLOCK_SIZE];
    let mut right_buf = vec![0u8; BLOCK_SIZE];

    loop {
        let left_read = fill(&mut left, &mut left_buf)?;
        let right_read = fill(&mut right, &mut right_buf)?;
        if left_read != right_read || left_buf[..left_read] != right_buf[..right_read] {
            return Ok(false);
        }
        if left_read == 0 {
            return Ok(true);
        }
    }
}

/// Read until the buffer is full or the reader is exhausted
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn identical_files_match() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.jpg");
        let b = temp_dir.path().join("b.jpg");
        fs::write(&a, vec![1u8; BLOCK_SIZE + 5]).unwrap();
        fs::write(&b, vec![1u8; BLOCK_SIZE + 5]).unwrap();

        assert!(files_identical(&a, &b).unwrap());
    }

    #[test]
    fn same_size_different_bytes_do_not_match() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.jpg");
        let b = temp_dir.path().join("b.jpg");
        fs::write(&a, b"abcd").unwrap();
        fs::write(&b, b"abce").unwrap();

        assert!(!files_identical(&a, &b).unwrap());
    }

    #[test]
    fn different_sizes_do_not_match() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.jpg");
        let b = temp_dir.path().join("b.jpg");
        fs::write(&a, b"abc").unwrap();
        fs::write(&b, b"abcd").unwrap();

        assert!(!files_identical(&a, &b).unwrap());
    }

    #[test]
    fn missing_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.jpg");
        fs::write(&a, b"abc").unwrap();

        assert!(files_identical(&a, &temp_dir.path().join("gone.jpg")).is_err());
    }
}
