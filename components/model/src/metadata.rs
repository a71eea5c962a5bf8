use bytes::Bytes;

use crate::status::{Status, StatusCode};

/// Reserved trailer key carrying the status code as a decimal string.
pub const STATUS_CODE_KEY: &str = "rpc-status";

/// Reserved trailer key carrying the optional status description.
pub const STATUS_MESSAGE_KEY: &str = "rpc-message";

/// Keys with this suffix carry binary values; all other keys carry ASCII
/// string values.
pub const BINARY_KEY_SUFFIX: &str = "-bin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Ascii(String),
    Binary(Bytes),
}

impl MetadataValue {
    pub fn as_ascii(&self) -> Option<&str> {
        match self {
            MetadataValue::Ascii(value) => Some(value),
            MetadataValue::Binary(_) => None,
        }
    }

    pub fn as_binary(&self) -> Option<&Bytes> {
        match self {
            MetadataValue::Ascii(_) => None,
            MetadataValue::Binary(value) => Some(value),
        }
    }
}

/// Ordered mapping from lowercase ASCII keys to one or more values.
///
/// Headers and trailers are both represented by this type. Insertion order is
/// preserved, and a key may appear multiple times.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, MetadataValue)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an ASCII value under `key`. The key is normalized to lowercase.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        let key = normalize_key(key);
        debug_assert!(
            !key.ends_with(BINARY_KEY_SUFFIX),
            "Binary keys must use insert_bin"
        );
        self.entries.push((key, MetadataValue::Ascii(value.into())));
    }

    /// Append a binary value under `key`, which must end with `-bin`.
    pub fn insert_bin(&mut self, key: &str, value: Bytes) {
        let key = normalize_key(key);
        debug_assert!(
            key.ends_with(BINARY_KEY_SUFFIX),
            "ASCII keys must use insert"
        );
        self.entries.push((key, MetadataValue::Binary(value)));
    }

    /// First value under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        let key = normalize_key(key);
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// All values under `key`, in insertion order.
    pub fn get_all(&self, key: &str) -> Vec<&MetadataValue> {
        let key = normalize_key(key);
        self.entries
            .iter()
            .filter(|(k, _)| *k == key)
            .map(|(_, v)| v)
            .collect()
    }

    pub fn remove_all(&mut self, key: &str) {
        let key = normalize_key(key);
        self.entries.retain(|(k, _)| *k != key);
    }

    /// Append every entry of `other`, preserving its order.
    pub fn merge(&mut self, other: Metadata) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write `status` into the reserved trailer keys, replacing any stale
    /// copies. The description key is omitted entirely when the status has no
    /// message.
    pub fn set_status(&mut self, status: &Status) {
        self.remove_all(STATUS_CODE_KEY);
        self.remove_all(STATUS_MESSAGE_KEY);
        self.insert(STATUS_CODE_KEY, u8::from(status.code).to_string());
        if let Some(message) = &status.message {
            self.insert(STATUS_MESSAGE_KEY, message.clone());
        }
    }

    /// Parse the status back out of the reserved trailer keys.
    pub fn status(&self) -> Option<Status> {
        let code = self
            .get(STATUS_CODE_KEY)?
            .as_ascii()?
            .parse::<u8>()
            .ok()
            .and_then(|code| StatusCode::try_from(code).ok())?;
        let message = self
            .get(STATUS_MESSAGE_KEY)
            .and_then(|value| value.as_ascii())
            .map(|message| message.to_owned());
        Some(Status { code, message })
    }
}

fn normalize_key(key: &str) -> String {
    debug_assert!(
        key.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'),
        "Metadata keys must be ASCII alphanumerics, '-', '_' or '.'"
    );
    key.to_ascii_lowercase()
}
