// SPDX-License-Identifier: MIT OR Apache-2.0
//! Lexical scopes and identifiers.
//!
//! A [`Scope`] is an immutable node in a parent-linked chain recording which
//! names are visible at some point in a program. Minting a child scope
//! produces fresh [`Ident`] handles; two idents with the same display name
//! from different derivations are distinct, because ident equality is by
//! identity, never by name.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Ident
// ---------------------------------------------------------------------------

/// A unique identifier minted by a [`Scope`], bound to a value at runtime
/// through a `Bindings` chain.
///
/// Cloning an ident preserves its identity.
#[derive(Clone)]
pub struct Ident(Arc<str>);

impl Ident {
    fn mint(name: &str) -> Self {
        Ident(Arc::from(name))
    }

    /// The display name of this identifier.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Ident {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Ident {}

impl Hash for Ident {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as *const u8 as usize).hash(state);
    }
}

impl std::fmt::Debug for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ident({:?}@{:p})", self.name(), Arc::as_ptr(&self.0))
    }
}

impl std::fmt::Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// An immutable lexical scope node.
#[derive(Debug)]
pub struct Scope {
    parent: Option<Arc<Scope>>,
    ids: Vec<Ident>,
}

impl Scope {
    /// Creates a root scope with the given names, returning the scope and
    /// the freshly minted idents in name order.
    pub fn root<I, S>(names: I) -> (Arc<Scope>, Vec<Ident>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::derive(None, names)
    }

    /// Creates a child scope of `parent` with the given names.
    ///
    /// Invariant: for each returned ident, `scope.lookup(name)` resolves to
    /// it, shadowing any same-named ident in an ancestor scope.
    pub fn derive<I, S>(parent: Option<&Arc<Scope>>, names: I) -> (Arc<Scope>, Vec<Ident>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids: Vec<Ident> = names.into_iter().map(|n| Ident::mint(n.as_ref())).collect();
        let scope = Arc::new(Scope {
            parent: parent.cloned(),
            ids: ids.clone(),
        });
        (scope, ids)
    }

    /// Resolves `name` to the ident it references in this scope, searching
    /// this node's idents first and then ancestors.
    pub fn lookup(&self, name: &str) -> Option<Ident> {
        self.ids
            .iter()
            .find(|id| id.name() == name)
            .cloned()
            .or_else(|| self.parent.as_ref()?.lookup(name))
    }

    /// This scope's parent, if any.
    pub fn parent(&self) -> Option<&Arc<Scope>> {
        self.parent.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Identifier syntax
// ---------------------------------------------------------------------------

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

/// Length in bytes of the longest prefix of `s` that is a valid identifier.
pub fn valid_ident_prefix(s: &str) -> usize {
    for (i, c) in s.char_indices() {
        let ok = if i == 0 { is_ident_start(c) } else { is_ident_char(c) };
        if !ok {
            return i;
        }
    }
    s.len()
}

/// Whether all of `s` is a valid identifier.
pub fn is_valid_ident(s: &str) -> bool {
    !s.is_empty() && valid_ident_prefix(s) == s.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_local_then_parent() {
        let (root, _) = Scope::root(["a", "b"]);
        let (child, _) = Scope::derive(Some(&root), ["c"]);
        assert!(child.lookup("c").is_some());
        assert!(child.lookup("a").is_some());
        assert!(child.lookup("missing").is_none());
    }

    #[test]
    fn child_shadows_parent_with_distinct_ident() {
        let (root, root_ids) = Scope::root(["x"]);
        let (child, child_ids) = Scope::derive(Some(&root), ["x"]);

        let via_child = child.lookup("x").unwrap();
        assert_eq!(via_child, child_ids[0]);
        assert_ne!(via_child, root_ids[0]);

        // The parent still resolves to its own ident.
        assert_eq!(root.lookup("x").unwrap(), root_ids[0]);
    }

    #[test]
    fn idents_with_equal_names_are_distinct_values() {
        let (_, ids_a) = Scope::root(["name"]);
        let (_, ids_b) = Scope::root(["name"]);
        assert_eq!(ids_a[0].name(), ids_b[0].name());
        assert_ne!(ids_a[0], ids_b[0]);
    }

    #[test]
    fn ident_clone_preserves_identity() {
        let (_, ids) = Scope::root(["v"]);
        let clone = ids[0].clone();
        assert_eq!(clone, ids[0]);
    }

    #[test]
    fn ident_hash_distinguishes_same_name() {
        use std::collections::HashMap;
        let (_, a) = Scope::root(["k"]);
        let (_, b) = Scope::root(["k"]);
        let mut m = HashMap::new();
        m.insert(a[0].clone(), 1);
        m.insert(b[0].clone(), 2);
        assert_eq!(m.len(), 2);
        assert_eq!(m[&a[0]], 1);
        assert_eq!(m[&b[0]], 2);
    }

    #[test]
    fn ident_prefix_lengths() {
        assert_eq!(valid_ident_prefix("abc"), 3);
        assert_eq!(valid_ident_prefix("a1_b?"), 4);
        assert_eq!(valid_ident_prefix("1abc"), 0);
        assert_eq!(valid_ident_prefix(""), 0);
        assert_eq!(valid_ident_prefix("_x"), 2);
    }

    #[test]
    fn valid_ident_rejects_empty_and_punctuated() {
        assert!(is_valid_ident("snake_case_2"));
        assert!(!is_valid_ident(""));
        assert!(!is_valid_ident("has-dash"));
        assert!(!is_valid_ident("9lead"));
    }
}
