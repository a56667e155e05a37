//! Instance and cluster naming.

use std::path::Path;

use sha2::{Digest, Sha256};

/// Longest sanitized instance name (a DNS label).
pub const MAX_NAME_LEN: usize = 63;

/// Longest k3d cluster name handed to the backend.
pub const MAX_CLUSTER_NAME_LEN: usize = 32;

const CLUSTER_HASH_LEN: usize = 8;
const CLUSTER_SUFFIX_LEN: usize = 4;
const RANDOM_SUFFIX_LEN: usize = 4;
const FALLBACK_NAME: &str = "instance";

/// Encode bytes as lowercase hex.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(char::from(HEX[(b >> 4) as usize]));
        out.push(char::from(HEX[(b & 0xf) as usize]));
    }
    out
}

/// Normalize arbitrary text into a DNS-label-like instance name.
///
/// Lower-cases, turns every run outside `[a-z0-9-]` into a single `-`,
/// collapses repeated dashes, trims dashes at both ends and caps the length.
/// An empty result becomes `"instance"`. Idempotent.
#[must_use]
pub fn sanitize_name(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.to_lowercase().chars() {
        let ch = if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            ch
        } else {
            '-'
        };
        if ch == '-' && out.ends_with('-') {
            continue;
        }
        out.push(ch);
    }

    let trimmed = out.trim_matches('-');
    let capped: String = trimmed.chars().take(MAX_NAME_LEN).collect();
    let capped = capped.trim_end_matches('-');
    if capped.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        capped.to_string()
    }
}

/// Generate a fresh instance name from the project directory.
#[must_use]
pub fn generate_name(project_root: &Path) -> String {
    let dir = project_root
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    sanitize_name(&format!("{dir}-{}", random_base36(RANDOM_SUFFIX_LEN)))
}

fn random_base36(len: usize) -> String {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    const ALPHABET: &[u8; 36] = b"abcdefghijklmnopqrstuvwxyz0123456789";

    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u128(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0),
    );
    hasher.write_u64(RandomState::new().build_hasher().finish());
    let mut seed = hasher.finish();

    let mut out = String::with_capacity(len);
    for _ in 0..len {
        #[allow(clippy::cast_possible_truncation)] // modulo 36 always fits
        let idx = (seed % 36) as usize;
        out.push(char::from(ALPHABET[idx]));
        seed /= 36;
    }
    out
}

/// Largest char boundary of `s` at or below `index`.
fn floor_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    (0..=index).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}

/// Smallest char boundary of `s` at or above `index`.
fn ceil_boundary(s: &str, index: usize) -> usize {
    (index..s.len()).find(|&i| s.is_char_boundary(i)).unwrap_or(s.len())
}

/// Bound `name` to `max_len` bytes while keeping it unique.
///
/// Names within the bound are returned unchanged. Longer names become
/// `<truncated-prefix>-<hash>-<suffix>` where the hash is taken over the full
/// name (so differing middles stay distinct) and the suffix is the tail of the
/// last `-` segment. Cuts never split a multibyte character.
#[must_use]
pub fn shorten_cluster_name(name: &str, max_len: usize) -> String {
    if name.len() <= max_len {
        return name.to_string();
    }

    let digest = hex_encode(&Sha256::digest(name.as_bytes()));
    let hash = &digest[..CLUSTER_HASH_LEN];

    let last_segment = name
        .rsplit('-')
        .find(|segment| !segment.is_empty())
        .unwrap_or(name);
    let suffix_start = ceil_boundary(
        last_segment,
        last_segment.len().saturating_sub(CLUSTER_SUFFIX_LEN),
    );
    let suffix = &last_segment[suffix_start..];

    let budget = max_len.saturating_sub(hash.len() + suffix.len() + 2);
    let base = name.trim_end_matches('-');
    let prefix = base[..floor_boundary(base, budget)].trim_end_matches('-');

    let joined = if prefix.is_empty() {
        format!("{hash}-{suffix}")
    } else {
        format!("{prefix}-{hash}-{suffix}")
    };
    // Degenerate bounds smaller than the hash itself.
    joined[..floor_boundary(&joined, max_len)].to_string()
}
