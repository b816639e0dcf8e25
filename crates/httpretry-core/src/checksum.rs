//! SHA-256 of finished downloads on disk.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Lowercase hex SHA-256 of everything `reader` yields.
pub fn sha256_reader<R: Read>(reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    io::copy(&mut BufReader::new(reader), &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

pub fn sha256_path(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    sha256_reader(file).with_context(|| format!("read {}", path.display()))
}

/// Compares hex digests, ignoring case and surrounding whitespace.
pub fn verify_hex(expected: &str, actual: &str) -> Result<()> {
    let expected = expected.trim();
    if !expected.eq_ignore_ascii_case(actual.trim()) {
        anyhow::bail!("checksum mismatch: expected {}, got {}", expected, actual);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::EMPTY_SHA256;
    use std::io::Write;

    #[test]
    fn empty_file_digest() {
        let f = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(sha256_path(f.path()).unwrap(), EMPTY_SHA256);
    }

    #[test]
    fn file_digest_matches_download_digest() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"0123456789").unwrap();
        f.flush().unwrap();
        assert_eq!(
            sha256_path(f.path()).unwrap(),
            "84d89877f0d4041efb6bf91a16f0248f2fd573e6af05c19f96bedb9f882f7882"
        );
    }

    #[test]
    fn reader_digest() {
        assert_eq!(
            sha256_reader(&b"ok"[..]).unwrap(),
            "2689367b205c16ce32ed4200942b8b8b1e262dfc70d9bc9fbc77c49699a4f1df"
        );
    }

    #[test]
    fn missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = sha256_path(&dir.path().join("nope")).unwrap_err();
        assert!(format!("{:#}", err).contains("open"));
    }

    #[test]
    fn verify_hex_ignores_case_and_whitespace() {
        verify_hex(&format!(" {} ", EMPTY_SHA256.to_uppercase()), EMPTY_SHA256).unwrap();
        assert!(verify_hex("00", EMPTY_SHA256).is_err());
    }
}
