//! # jakarta-census
//!
//! Counts how much compiled Java code depends on the `javax.*` enterprise
//! namespaces and their `jakarta.*` successors, and works out which
//! namespace renames force other renames.
//!
//! ## Architecture
//!
//! - **namespace**: Ordered table of tracked namespaces and the first-match classifier
//! - **usage**: Per-namespace reference counts with commutative merge
//! - **descriptor**: Field/method descriptor and generic signature grammar
//! - **classfile**: Tagged-variant model of the class-file format
//! - **references**: Every type a single class refers to
//! - **archive**: Archive scanning with nested jar/war/ear/rar recursion and SHA-1 hashing
//! - **report**: Versioned tab-separated reports with a schema registry
//! - **pipeline**: Parallel corpus scans feeding a single report writer
//! - **graph**: Class reference graphs and their JSON files
//! - **closure**: Transitive rename closure over namespaces
//! - **scan**: Archive discovery under input directories
//! - **config**: Flag, environment and default resolution
//! - **timestamp**: Calendar arithmetic for zip times and report names

pub mod archive;
pub mod classfile;
pub mod cli;
pub mod closure;
pub mod config;
pub mod descriptor;
pub mod graph;
pub mod namespace;
pub mod pipeline;
pub mod references;
pub mod report;
pub mod scan;
pub mod timestamp;
pub mod usage;
