use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Canonical spelling of a key identifier.
///
/// Keys arrive from two places: the on-screen keyboard used while editing
/// (`"Space"`, `"Esc"`, `"Ctrl"`, `"q"`) and live keydown events during a run
/// (`" "`, `"Escape"`, `"Control"`, `"Q"`). Both are folded to the same
/// lower-case form so a step configured with `"Q"` accepts a press of `"q"`.
pub fn normalize_key(key: &str) -> String {
    if key == " " {
        return " ".to_string();
    }
    let lowered = key.trim().to_lowercase();
    match lowered.as_str() {
        "space" | "spacebar" => " ".to_string(),
        "esc" => "escape".to_string(),
        "ctrl" => "control".to_string(),
        "del" => "delete".to_string(),
        "return" => "enter".to_string(),
        _ => lowered,
    }
}

/// Human label for a normalized key.
pub fn key_label(key: &str) -> &str {
    if key == " " { "Space" } else { key }
}

/// Ordered set of accepted response keys.
///
/// On the wire this is the comma-joined string the keyboard widget wrote
/// (`"a,b"`, `" "` for the space bar); a JSON array is accepted as well.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySet {
    keys: Vec<String>,
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut set = Self::new();
        for key in keys {
            set.insert(key.as_ref());
        }
        set
    }

    /// Parses the comma-joined form. Empty fragments are dropped, a lone
    /// space survives as the space bar.
    pub fn parse(joined: &str) -> Self {
        Self::from_keys(joined.split(',').filter(|k| !k.is_empty()))
    }

    /// Returns false when the key was already present or normalizes to nothing.
    pub fn insert(&mut self, key: &str) -> bool {
        let key = normalize_key(key);
        if key.is_empty() || self.keys.contains(&key) {
            return false;
        }
        self.keys.push(key);
        true
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let key = normalize_key(key);
        let before = self.keys.len();
        self.keys.retain(|k| *k != key);
        before != self.keys.len()
    }

    /// Case-normalized membership test used when matching keydown events.
    pub fn contains(&self, key: &str) -> bool {
        let key = normalize_key(key);
        self.keys.iter().any(|k| *k == key)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn joined(&self) -> String {
        self.keys.join(",")
    }
}

impl fmt::Display for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.keys.is_empty() {
            return f.write_str("None");
        }
        let labels: Vec<&str> = self.keys.iter().map(|k| key_label(k)).collect();
        f.write_str(&labels.join(", "))
    }
}

impl Serialize for KeySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.joined())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum KeySetRepr {
    Joined(String),
    List(Vec<String>),
}

impl<'de> Deserialize<'de> for KeySet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<KeySetRepr>::deserialize(deserializer)? {
            Some(KeySetRepr::Joined(joined)) => KeySet::parse(&joined),
            Some(KeySetRepr::List(keys)) => KeySet::from_keys(keys),
            None => KeySet::new(),
        })
    }
}
