//! Cache key derivation.

use std::fmt::Write as _;
use std::path::Path;

use super::transform::TransformOptions;

/// Longest key emitted before the path portion is replaced by a digest.
pub const MAX_KEY_LEN: usize = 200;

/// Separator between key fields. Never emitted by [`escape_into`].
const FIELD_SEPARATOR: char = '_';

/// Filesystem-safe name of a cache entry.
///
/// Layout: `<dir>_<file>_<width>x<height>_q<quality>.<ext>`, where `<dir>` and
/// `<file>` are the escaped parent directory and file name of the source.
/// Escaping keeps `[A-Za-z0-9.-]` and writes every other byte as `%XX`, so the
/// separator can only occur between fields and the mapping is injective.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for `source` transformed with `options`.
    ///
    /// `options` must already be normalized.
    #[must_use]
    pub fn derive(source: &Path, options: &TransformOptions) -> Self {
        let dir = source.parent().map_or(&[][..], |p| p.as_os_str().as_encoded_bytes());
        let file = source
            .file_name()
            .map_or(&[][..], |f| f.as_encoded_bytes());

        let suffix = format!(
            "{FIELD_SEPARATOR}{}x{}{FIELD_SEPARATOR}q{}.{}",
            options.width,
            options.height,
            options.quality,
            options.format.extension()
        );

        let mut key = String::with_capacity(dir.len() + file.len() + suffix.len() + 1);
        escape_into(&mut key, dir);
        key.push(FIELD_SEPARATOR);
        escape_into(&mut key, file);

        if key.len() + suffix.len() > MAX_KEY_LEN {
            key = digest_path(source);
        }

        key.push_str(&suffix);
        Self(key)
    }

    /// Returns the key as a path segment.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<Path> for CacheKey {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

fn escape_into(out: &mut String, bytes: &[u8]) {
    for &b in bytes {
        if b.is_ascii_alphanumeric() || b == b'.' || b == b'-' {
            out.push(char::from(b));
        } else {
            let _ = write!(out, "%{b:02X}");
        }
    }
}

/// Collision-resistant stand-in for paths too long to embed.
fn digest_path(source: &Path) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(source.as_os_str().as_encoded_bytes());
    format!("sha256-{}", hex::encode(hasher.finalize()))
}
