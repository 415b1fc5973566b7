//! Test infrastructure for the search sync crate.
//!
//! Provides a small dealership data set (manufacturers, cars, categories and
//! ads) held in an in-memory record source, and the documents and registries
//! built on top of it.

#![allow(dead_code)]

pub mod fixtures;
pub mod harness;

pub use fixtures::*;
pub use harness::*;
