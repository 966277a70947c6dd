//! Generic utility primitives with zero domain knowledge.
//!
//! - `shell` - Shell escaping, quoting and command fragments

pub mod shell;
