//! ## Usage
//!
//! This crate composes Apollo Federation subgraph schemas into a supergraph schema and checks
//! that every query expressible against the supergraph API can be planned over the subgraphs.
//!
//! ```ignore
//! use apollo_composition::composition::compose;
//! use apollo_composition::subgraph::Subgraph;
//!
//! let subgraphs = vec![
//!     Subgraph::parse("products", "http://products", products_sdl)?,
//!     Subgraph::parse("reviews", "http://reviews", reviews_sdl)?,
//! ];
//! let supergraph = compose(subgraphs)?;
//! println!("{}", supergraph.schema());
//! ```
//!
//! ## Crate versioning
//!
//! The version number of this crate is **not** that of the Apollo Federation specification being
//! implemented. The federation versions understood by composition are listed in
//! [`link::feature_registry::FeatureRegistry`].

#![warn(
    rustdoc::broken_intra_doc_links,
    unreachable_pub,
    unreachable_patterns,
    unused,
    unused_qualifications,
    dead_code,
    while_true,
    unconditional_panic,
    clippy::all
)]

pub(crate) mod api_schema;
pub mod composition;
pub mod error;
pub mod link;
pub(crate) mod merger;
pub(crate) mod query_graph;
pub mod schema;
pub mod subgraph;
pub mod supergraph;
pub(crate) mod utils;

pub use crate::composition::CompositionOptions;
pub use crate::composition::compose;
pub use crate::composition::compose_with_options;
pub use crate::error::CompositionError;
pub use crate::error::ErrorCode;
pub use crate::merger::hints::HintCode;
pub use crate::merger::hints::HintLevel;
pub use crate::supergraph::CompositionHint;
pub use crate::supergraph::Supergraph;
