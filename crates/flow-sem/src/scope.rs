//! Lexical scope chain used while resolving identifiers.
//!
//! Flow's scoping is shallow: the workflow body is a single root scope
//! seeded with `env`, `for each` introduces one child scope per loop body,
//! and `step` blocks share their enclosing scope (a step is a label, not a
//! binding boundary).

use indexmap::IndexSet;

/// One lexical rib: the set of names bound directly in this scope.
#[derive(Debug, Default)]
struct Rib {
    names: IndexSet<String>,
}

/// A chain of ribs, innermost last. Lookups walk from the end backward.
pub struct ScopeTree {
    ribs: Vec<Rib>,
}

impl ScopeTree {
    pub fn new() -> Self {
        let mut tree = Self {
            ribs: vec![Rib::default()],
        };
        tree.bind("env");
        tree
    }

    pub fn push_scope(&mut self) {
        self.ribs.push(Rib::default());
    }

    pub fn pop_scope(&mut self) {
        self.ribs.pop();
        debug_assert!(!self.ribs.is_empty(), "popped the root scope");
    }

    pub fn bind(&mut self, name: &str) {
        self.ribs
            .last_mut()
            .expect("scope tree always has a root rib")
            .names
            .insert(name.to_string());
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.ribs.iter().rev().any(|rib| rib.names.contains(name))
    }

    /// All names visible from the current scope, innermost first -- used to
    /// build "did you mean ...?" candidate pools for unbound identifiers.
    pub fn visible_names(&self) -> Vec<&str> {
        self.ribs
            .iter()
            .rev()
            .flat_map(|rib| rib.names.iter().map(String::as_str))
            .collect()
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}
