mod satisfiability_error;
mod validation_state;
mod validation_traversal;

use std::sync::Arc;

use tracing::debug;

use crate::composition::satisfiability::validation_traversal::ValidationTraversal;
use crate::error::CompositionError;
use crate::query_graph::build_query_graph::build_federated_query_graph;
use crate::query_graph::build_query_graph::build_query_graph;
use crate::supergraph::Merged;
use crate::supergraph::Satisfiable;
use crate::supergraph::Supergraph;

/// The source name of the API schema query graph.
const API_GRAPH_SOURCE: &str = "supergraph";

/// Checks that every query of the supergraph API can be planned over its subgraphs.
///
/// Walks the query graph of the API schema in lock-step with the federated query graph built
/// from the subgraphs extracted from the supergraph, and reports every path of the API graph the
/// subgraphs cannot follow.
#[cfg_attr(
    feature = "snapshot_tracing",
    tracing::instrument(level = "trace", skip_all, name = "validate_satisfiability")
)]
pub fn validate_satisfiability(
    supergraph: Supergraph<Merged>,
    max_validation_subgraph_paths: Option<usize>,
) -> Result<Supergraph<Satisfiable>, Vec<CompositionError>> {
    let api_schema = supergraph.to_api_schema()?;
    let subgraphs = supergraph
        .extract_subgraphs()
        .map_err(|error| vec![error.into()])?;
    let api_schema_query_graph = build_query_graph(API_GRAPH_SOURCE.into(), api_schema.clone())
        .map_err(|error| vec![error.into()])?;
    let federated_query_graph = build_federated_query_graph(supergraph.schema().clone(), &subgraphs)
        .map_err(|error| vec![error.into()])?;

    let (errors, hints) = ValidationTraversal::new(
        Arc::new(api_schema_query_graph),
        Arc::new(federated_query_graph),
        max_validation_subgraph_paths,
    )
    .and_then(|traversal| traversal.validate())
    .map_err(|error| vec![error.into()])?;
    debug!(
        subgraphs = subgraphs.len(),
        errors = errors.len(),
        hints = hints.len(),
        "Validated supergraph satisfiability"
    );
    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(supergraph.into_satisfiable(api_schema, hints))
}
