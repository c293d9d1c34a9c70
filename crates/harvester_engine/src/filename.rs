use sha2::{Digest, Sha256};
use url::Url;

const DEFAULT_MEDIA_EXTENSION: &str = ".jpg";
const MAX_EXTENSION_LEN: usize = 5;

/// Deterministic storage key for an external media url:
/// `articles/{scope}/{sha256(url)[..16]}{ext}`.
pub fn media_object_name(scope_key: &str, url: &str) -> String {
    let scope = sanitize_scope(scope_key);
    let hash = short_hash(url, 8);
    let ext = media_extension(url);
    format!("articles/{scope}/{hash}{ext}")
}

/// Extension from the url path, then the upstream `wx_fmt` hint, then `.jpg`.
pub fn media_extension(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return DEFAULT_MEDIA_EXTENSION.to_string();
    };
    let from_path = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|last| last.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| is_plausible_extension(ext));
    let from_query = || {
        parsed
            .query_pairs()
            .find(|(key, _)| key == "wx_fmt")
            .map(|(_, value)| value.to_ascii_lowercase())
            .filter(|ext| is_plausible_extension(ext))
    };
    from_path
        .or_else(from_query)
        .map(|ext| format!(".{ext}"))
        .unwrap_or_else(|| DEFAULT_MEDIA_EXTENSION.to_string())
}

fn is_plausible_extension(ext: &str) -> bool {
    !ext.is_empty() && ext.len() <= MAX_EXTENSION_LEN && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

fn sanitize_scope(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]);
    if cleaned.is_empty() {
        "default".to_string()
    } else {
        cleaned.to_string()
    }
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

/// First `bytes` bytes of the sha256 digest, hex encoded.
pub fn short_hash(input: &str, bytes: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(bytes * 2);
    for byte in digest.iter().take(bytes) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
