use sha2::{Digest, Sha256};
use std::fmt::Write;

const DIGEST_CHARS: usize = 12;

/// Short hex tag for an upload, so log lines about one document can be
/// correlated without logging any of its content.
pub fn short_digest(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .take(DIGEST_CHARS / 2)
        .fold(String::with_capacity(DIGEST_CHARS), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
}
