//! CLI command implementations.

pub mod create;
pub mod read;
pub mod stat;
pub mod write;

use ugdb_corpus::{CKey, CorpusResult};

/// Encodes a command-line key: NUL-terminated unless `raw`.
pub fn key_bytes(key: &str, raw: bool) -> CorpusResult<Vec<u8>> {
    if raw {
        Ok(key.as_bytes().to_vec())
    } else {
        Ok(CKey::new(key)?.as_bytes().to_vec())
    }
}

/// Renders a value as text when it is printable UTF-8, else as hex.
pub fn render(value: &[u8]) -> String {
    match std::str::from_utf8(value) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => value.iter().map(|b| format!("{b:02x}")).collect(),
    }
}
