//! Shared foundation types for the Flow language pipeline.
//!
//! Every stage of the pipeline (lexer, parser, analyzer, runtime) reports
//! problems through the same [`diagnostic`] machinery and locates them with
//! the same [`span`] types, so a diagnostic raised during parsing and one
//! raised during analysis render identically.

pub mod diagnostic;
pub mod span;
pub mod suggest;

pub use span::{FileId, Span};

pub use rustc_hash::{FxHashMap, FxHashSet};
