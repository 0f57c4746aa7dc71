//! # MODSCOPE
//!
//! Import resolution and dependency-graph analysis for Python package trees.
//!
//! MODSCOPE takes the source files of a package hierarchy, extracts their
//! declarations and import statements, resolves every import (absolute,
//! dot-counted relative, aliased) to a canonical module id and assembles the
//! result into a dependency graph with cycle and inheritance information.
//!
//! ## Pipeline
//!
//! 1. **Source scanner** maps files to canonical module and package ids
//! 2. **Declaration extractor** parses each module with tree-sitter
//! 3. **Import resolver** turns raw import references into module ids
//! 4. **Dependency graph builder** records `imports` and `extends` edges and finds cycles
//! 5. **Symbol classifier** assigns a structural role to every declaration
//!
//! The output is an [`AnalysisReport`](core::AnalysisReport) with a
//! deterministic, order-stable layout.

pub mod config;
pub mod core;
pub mod formatters;
pub mod parsers;
pub mod sources;
