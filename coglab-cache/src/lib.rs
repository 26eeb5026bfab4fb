//! Process-wide interner for strings that end up rasterized: stimulus text,
//! break and completion messages, file placeholders. The renderer keys its
//! glyph pixmaps by the returned id so each distinct string is laid out once.

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
pub use string_cache::DefaultAtom as Atom;

#[derive(Default)]
struct Interner {
    atoms: Vec<Atom>,
    ids: HashMap<Atom, usize>,
}

lazy_static! {
    static ref TEXT_INTERNER: RwLock<Interner> = RwLock::new(Interner::default());
}

/// Intern a string and return its id. Ids are stable for the process lifetime.
pub fn intern_text(s: &str) -> usize {
    let atom = Atom::from(s);
    if let Some(&id) = TEXT_INTERNER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .ids
        .get(&atom)
    {
        return id;
    }
    let mut interner = TEXT_INTERNER.write().unwrap_or_else(PoisonError::into_inner);
    if let Some(&id) = interner.ids.get(&atom) {
        return id;
    }
    let id = interner.atoms.len();
    interner.atoms.push(atom.clone());
    interner.ids.insert(atom, id);
    id
}

/// Current count of unique texts
pub fn text_count() -> usize {
    TEXT_INTERNER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .atoms
        .len()
}

pub fn get_text(id: usize) -> Option<Atom> {
    TEXT_INTERNER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .atoms
        .get(id)
        .cloned()
}
