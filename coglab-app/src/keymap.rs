use winit::keyboard::{Key, NamedKey};

/// Browser-style `KeyboardEvent.key` name for a winit logical key.
pub fn key_name(key: &Key) -> Option<String> {
    match key {
        Key::Named(NamedKey::Space) => Some(" ".to_string()),
        Key::Named(named) => Some(format!("{named:?}")),
        Key::Character(text) => Some(text.to_string()),
        _ => None,
    }
}

pub fn is_exit(key: &Key) -> bool {
    matches!(key, Key::Named(NamedKey::Escape))
}
