//! Common definitions that are shared between different parts of the backend.

// Use sorted sets and maps for consistent output
pub use std::collections::{BTreeMap as Map, BTreeSet as Set};

/// Symbol names (functions, string globals).
pub type Name = internment::Intern<String>;
