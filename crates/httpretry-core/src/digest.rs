//! Streaming digest fed with every byte a getter delivers.

use sha2::Digest;

/// Incremental hash whose current value can be read at any time.
pub trait ContentHasher: Send {
    fn update(&mut self, data: &[u8]);

    /// Lowercase hex digest of everything written so far.
    fn hex_digest(&self) -> String;
}

impl<D> ContentHasher for D
where
    D: Digest + Clone + Send,
{
    fn update(&mut self, data: &[u8]) {
        Digest::update(self, data);
    }

    fn hex_digest(&self) -> String {
        hex::encode(self.clone().finalize())
    }
}

/// Hex SHA-256 of the empty input.
pub const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
