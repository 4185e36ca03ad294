//! Content fingerprints for deployed assets and templates.
//!
//! Line endings are normalized before hashing so a file checked out with
//! CRLF on Windows fingerprints the same as its LF template.

use sha2::{Digest, Sha256};

/// Replace every `\r\n` with `\n`.
pub fn normalize_newlines(content: &str) -> std::borrow::Cow<'_, str> {
    if content.contains("\r\n") {
        std::borrow::Cow::Owned(content.replace("\r\n", "\n"))
    } else {
        std::borrow::Cow::Borrowed(content)
    }
}

/// SHA-256 of the newline-normalized UTF-8 bytes, hex encoded.
pub fn content_hash(content: &str) -> String {
    let normalized = normalize_newlines(content);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

/// Short form used as a fallback template version tag.
pub fn short_hash(content: &str) -> String {
    content_hash(content)[..12].to_string()
}
