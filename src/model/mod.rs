//! Lookup data model.

pub mod types;
