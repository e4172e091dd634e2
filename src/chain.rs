// Key-value chain codec
//
// Series and row labels carry an ordered list of (key, value) pairs. Inside the
// engine these stay as `KeyValuePair` lists; they are flattened into a single
// string only where a dataset dimension or row label needs one.

use serde::{Deserialize, Serialize};

/// Separates a key from its value inside one pair.
pub const KEY_DELIMITER: &str = "__🔑__";
/// Separates consecutive pairs.
pub const PAIR_DELIMITER: &str = "__📝__";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct KeyValuePair {
    pub key: String,
    /// Empty when the pair names a column without carrying a value
    /// (e.g. a bare measure name).
    pub value: String,
}

impl KeyValuePair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// A pair that only names a column.
    pub fn key_only(key: impl Into<String>) -> Self {
        Self::new(key, "")
    }
}

/// Flatten pairs into one chain string.
pub fn encode(pairs: &[KeyValuePair]) -> String {
    pairs
        .iter()
        .map(|p| format!("{}{}{}", p.key, KEY_DELIMITER, p.value))
        .collect::<Vec<_>>()
        .join(PAIR_DELIMITER)
}

/// Split a chain string back into pairs.
///
/// Never fails: an empty chain yields no pairs and a segment without a key
/// delimiter is read as a key with an empty value.
pub fn decode(chain: &str) -> Vec<KeyValuePair> {
    if chain.is_empty() {
        return Vec::new();
    }
    chain
        .split(PAIR_DELIMITER)
        .map(|segment| match segment.split_once(KEY_DELIMITER) {
            Some((key, value)) => KeyValuePair::new(key, value),
            None => KeyValuePair::key_only(segment),
        })
        .collect()
}

/// Same as [`decode`] but accepts a missing chain.
pub fn decode_opt(chain: Option<&str>) -> Vec<KeyValuePair> {
    chain.map(decode).unwrap_or_default()
}

/// Append pairs to an existing chain (if any) and re-encode.
///
/// `append_to_chain(b, Some(&encode(a)))` equals `encode(a ++ b)`.
pub fn append_to_chain(new_pairs: &[KeyValuePair], existing: Option<&str>) -> String {
    let mut pairs = decode_opt(existing);
    pairs.extend_from_slice(new_pairs);
    encode(&pairs)
}

/// The measure a series dimension belongs to: the key of its last pair.
pub fn measure_key(chain: &str) -> Option<String> {
    decode(chain).pop().map(|p| p.key)
}

/// The raw value underneath a single-pair label, e.g. `date__🔑__2024-01-01`
/// yields `2024-01-01`. Strings that are not chains come back unchanged.
pub fn undelimited_value(chain: &str) -> String {
    match decode(chain).into_iter().next() {
        Some(pair) if !pair.value.is_empty() => pair.value,
        Some(pair) if !chain.contains(KEY_DELIMITER) => pair.key,
        Some(_) => String::new(),
        None => String::new(),
    }
}
