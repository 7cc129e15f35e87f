use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Namespace under which every photo key is created.
pub const DEFAULT_KEY_PREFIX: &str = "contactos";

/// Builds object keys of the form `<prefix>/<unix_ms>_<file name>`.
///
/// The millisecond component comes from a per-generator monotonic clock: two
/// keys requested in the same millisecond get consecutive timestamps, so a
/// generator never hands out the same key twice.
#[derive(Debug)]
pub struct KeyGenerator {
    prefix: String,
    last_ms: AtomicI64,
}

impl KeyGenerator {
    /// Create a generator for the given prefix. Surrounding slashes are ignored.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        Self {
            prefix: prefix.trim_matches('/').to_owned(),
            last_ms: AtomicI64::new(0),
        }
    }

    /// The normalized prefix (no surrounding slashes).
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Generate a fresh key for `original_name`.
    pub fn next_key(&self, original_name: &str) -> String {
        let ms = self.next_millis(Utc::now().timestamp_millis());
        self.key_at(ms, original_name)
    }

    /// Deterministic key for a given timestamp and file name.
    pub fn key_at(&self, unix_ms: i64, original_name: &str) -> String {
        let name = sanitize_file_name(original_name);
        if self.prefix.is_empty() {
            format!("{unix_ms}_{name}")
        } else {
            format!("{}/{unix_ms}_{name}", self.prefix)
        }
    }

    /// Whether `key` lives under this generator's prefix.
    pub fn owns(&self, key: &str) -> bool {
        self.prefix.is_empty()
            || key
                .strip_prefix(&self.prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }

    fn next_millis(&self, now_ms: i64) -> i64 {
        let mut prev = self.last_ms.load(Ordering::Relaxed);
        loop {
            let candidate = now_ms.max(prev + 1);
            match self.last_ms.compare_exchange_weak(
                prev,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => prev = actual,
            }
        }
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
///
/// Path separators never survive, so a file name cannot escape the prefix.
/// An empty name becomes `"foto"`.
pub fn sanitize_file_name(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() {
        return "foto".to_owned();
    }
    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
