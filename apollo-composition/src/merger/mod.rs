//! Merges validated subgraphs into a supergraph schema.
//!
//! Output positions (object and interface fields, union members, output enums) are merged with a
//! union strategy, and input positions (arguments, input object fields, input enums) with an
//! intersection strategy. Every choice made along the way is recorded in `join` directives, so
//! that the subgraphs can be extracted back from the supergraph.

use apollo_compiler::collections::IndexMap;

pub(crate) mod compose_directive_manager;
pub(crate) mod error_reporter;
pub mod hints;
mod merge_argument;
mod merge_directives;
mod merge_enum;
mod merge_field;
mod merge_type;
#[allow(clippy::module_inception)]
mod merger;

pub(crate) use merger::MergeResult;
pub(crate) use merger::Merger;

/// The elements corresponding to one supergraph element, keyed by subgraph index. A subgraph
/// defining the parent of the element but not the element itself maps to `None`.
pub(crate) type Sources<T> = IndexMap<usize, Option<T>>;
