//! The runtime variable scope chain.
//!
//! Same shape as the analyzer's `ScopeTree` but storing values rather than
//! just bindings: a root frame is always present, `for each` pushes and
//! pops a frame per iteration, and `set` rebinds the nearest frame that
//! already holds the name rather than always writing to the innermost one.

use crate::value::Value;
use flow_util::FxHashMap;

pub struct Environment {
    frames: Vec<FxHashMap<String, Value>>,
}

impl Environment {
    pub fn new() -> Self {
        Self {
            frames: vec![FxHashMap::default()],
        }
    }

    pub fn push_scope(&mut self) {
        self.frames.push(FxHashMap::default());
    }

    pub fn pop_scope(&mut self) {
        self.frames.pop();
        debug_assert!(!self.frames.is_empty(), "popped the root frame");
    }

    /// Binds a value in the root frame, used to seed `env`, `request`, and
    /// flattened trigger-payload roots before execution starts.
    pub fn bind_root(&mut self, name: impl Into<String>, value: Value) {
        self.frames[0].insert(name.into(), value);
    }

    /// Implements `set`'s rebind-in-place semantics: updates the nearest
    /// frame that already contains `name`, or inserts into the current
    /// (innermost) frame if the name is new.
    pub fn set(&mut self, name: &str, value: Value) {
        for frame in self.frames.iter_mut().rev() {
            if frame.contains_key(name) {
                frame.insert(name.to_string(), value);
                return;
            }
        }
        self.frames
            .last_mut()
            .expect("environment always has a root frame")
            .insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .cloned()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
