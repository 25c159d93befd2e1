//! Lock name to file path conversion.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Readable prefix length kept from the sanitized name.
const MAX_BASE_NAME_LENGTH: usize = 40;

/// Digest length in base32 characters (80 bits / 5 bits per char).
const HASH_LENGTH_IN_CHARS: usize = 16;

/// Lowercase base32 alphabet (RFC 4648, lowered for filesystem friendliness).
const BASE32_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz234567";

const EXTENSION: &str = ".lock";

/// Converts a lock name into the path of its lock file under `directory`.
///
/// The file name keeps a readable, sanitized prefix of the lock name
/// (alphanumerics, `-` and `_` pass through, anything else becomes `_`,
/// truncated) and appends a short base32 SHA-256 digest of the raw name.
/// The digest is what actually identifies the lock: distinct names that
/// sanitize to the same prefix, or differ only in case on a case-insensitive
/// filesystem, still map to distinct files, and the mapping is stable across
/// processes and platforms.
pub fn lock_file_path(directory: &Path, name: &str) -> PathBuf {
    // Sanitizing leaves pure ASCII, so byte truncation is safe.
    let base = sanitize(name);
    let prefix_len = base.len().min(MAX_BASE_NAME_LENGTH);
    let digest = short_digest(name.as_bytes());

    let mut file_name = String::with_capacity(prefix_len + 1 + digest.len() + EXTENSION.len());
    file_name.push_str(&base[..prefix_len]);
    if !file_name.is_empty() {
        file_name.push('-');
    }
    file_name.push_str(&digest);
    file_name.push_str(EXTENSION);

    directory.join(file_name)
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

/// First 80 bits of SHA-256, base32 encoded.
fn short_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let hash = hasher.finalize();

    let mut chars = String::with_capacity(HASH_LENGTH_IN_CHARS);
    let mut bit_buffer = 0u32;
    let mut bits_held = 0u32;

    for &byte in hash.iter().take(10) {
        bit_buffer = (bit_buffer << 8) | byte as u32;
        bits_held += 8;
        while bits_held >= 5 {
            bits_held -= 5;
            let index = ((bit_buffer >> bits_held) & 0x1f) as usize;
            chars.push(BASE32_ALPHABET[index] as char);
        }
    }

    chars
}
