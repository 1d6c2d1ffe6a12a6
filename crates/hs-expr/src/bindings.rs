// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runtime value bindings for scope identifiers.
//!
//! A [`Bindings`] is the runtime counterpart of a `Scope`: an immutable
//! parent-linked map from [`Ident`] to [`Record`]. Bindings are created when
//! config loads, extended when `--loadjson` tables bind, and optionally
//! extended per record. Extension never mutates a parent, so chains are
//! freely shared across workers.

use crate::scope::{Ident, Scope};
use hs_record::Record;
use std::collections::HashMap;
use std::sync::Arc;

/// An immutable set of runtime bindings.
#[derive(Debug, Default)]
pub struct Bindings {
    parent: Option<Arc<Bindings>>,
    binds: HashMap<Ident, Record>,
}

impl Bindings {
    /// Creates a root bindings node.
    pub fn root(binds: HashMap<Ident, Record>) -> Arc<Bindings> {
        Self::derive(None, binds)
    }

    /// Creates a bindings node derived from `parent` with the given binds.
    pub fn derive(parent: Option<&Arc<Bindings>>, binds: HashMap<Ident, Record>) -> Arc<Bindings> {
        Arc::new(Bindings {
            parent: parent.cloned(),
            binds,
        })
    }

    /// Returns the value bound to `id`, searching this node then ancestors.
    pub fn get(&self, id: &Ident) -> Option<&Record> {
        self.binds
            .get(id)
            .or_else(|| self.parent.as_ref()?.get(id))
    }
}

// ---------------------------------------------------------------------------
// Scoped
// ---------------------------------------------------------------------------

/// A scope paired with bindings: the visible names and their values at one
/// point in a program.
///
/// Invariant: every ident reachable by name through the scope should be
/// retrievable through the bindings, or deliberately unbound (in which case
/// evaluation fails with an unbound-variable error).
#[derive(Debug, Clone)]
pub struct Scoped {
    /// Name resolution side.
    pub scope: Arc<Scope>,
    /// Value resolution side.
    pub binds: Arc<Bindings>,
}

impl Scoped {
    /// Resolves a name all the way to its bound value.
    pub fn lookup(&self, name: &str) -> Option<&Record> {
        self.binds.get(&self.scope.lookup(name)?)
    }
}
