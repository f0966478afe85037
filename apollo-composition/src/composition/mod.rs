mod satisfiability;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

pub use crate::composition::satisfiability::validate_satisfiability;
use crate::error::CompositionError;
use crate::internal_error;
use crate::link::feature_registry::FeatureRegistry;
use crate::merger::Merger;
use crate::subgraph::Expanded;
use crate::subgraph::Raw;
use crate::subgraph::Subgraph;
use crate::subgraph::Validated;
pub use crate::supergraph::Merged;
pub use crate::supergraph::Satisfiable;
pub use crate::supergraph::Supergraph;
use crate::utils::logging::snapshot;

/// Options of a composition.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompositionOptions {
    /// Whether to check that every query of the supergraph API can be planned over the
    /// subgraphs. Without it, composition stops after merging.
    pub run_satisfiability: bool,
    /// Caps the number of subgraph paths the satisfiability validation holds at once. Defaults to
    /// one million.
    pub max_validation_subgraph_paths: Option<usize>,
    /// The features composition knows.
    #[serde(skip)]
    pub feature_registry: FeatureRegistry,
}

impl Default for CompositionOptions {
    fn default() -> Self {
        Self {
            run_satisfiability: true,
            max_validation_subgraph_paths: None,
            feature_registry: FeatureRegistry::default(),
        }
    }
}

pub fn compose(
    subgraphs: Vec<Subgraph<Raw>>,
) -> Result<Supergraph<Satisfiable>, Vec<CompositionError>> {
    compose_with_options(subgraphs, &CompositionOptions::default())
}

pub fn compose_with_options(
    subgraphs: Vec<Subgraph<Raw>>,
    options: &CompositionOptions,
) -> Result<Supergraph<Satisfiable>, Vec<CompositionError>> {
    debug!(subgraphs = subgraphs.len(), "Composing subgraphs");
    snapshot!(options, "composition options");
    let expanded_subgraphs = expand_subgraphs(subgraphs, &options.feature_registry)?;
    let validated_subgraphs = validate_subgraphs(expanded_subgraphs)?;
    let supergraph = merge_subgraphs(validated_subgraphs, &options.feature_registry)?;
    if !options.run_satisfiability {
        let api_schema = supergraph.to_api_schema()?;
        return Ok(supergraph.into_satisfiable(api_schema, Vec::new()));
    }
    validate_satisfiability(supergraph, options.max_validation_subgraph_paths)
}

/// Apollo Federation allow subgraphs to specify partial schemas (i.e. "import" directives through
/// `@link`). This function will update subgraph schemas with all missing federation definitions.
pub fn expand_subgraphs(
    subgraphs: Vec<Subgraph<Raw>>,
    registry: &FeatureRegistry,
) -> Result<Vec<Subgraph<Expanded>>, Vec<CompositionError>> {
    let mut errors: Vec<CompositionError> = vec![];
    let expanded: Vec<Subgraph<Expanded>> = subgraphs
        .into_iter()
        .map(|s| s.expand_links(registry))
        .filter_map(|r| r.map_err(|e| errors.extend(Vec::from(e))).ok())
        .collect();
    if errors.is_empty() {
        Ok(expanded)
    } else {
        Err(errors)
    }
}

/// Validate subgraph schemas to ensure they satisfy Apollo Federation requirements (e.g. whether
/// `@key` specifies valid `FieldSet`s etc).
pub fn validate_subgraphs(
    subgraphs: Vec<Subgraph<Expanded>>,
) -> Result<Vec<Subgraph<Validated>>, Vec<CompositionError>> {
    let mut errors: Vec<CompositionError> = vec![];
    let validated: Vec<Subgraph<Validated>> = subgraphs
        .into_iter()
        .map(|s| s.validate(true))
        .filter_map(|r| r.map_err(|e| errors.extend(Vec::from(e))).ok())
        .collect();
    if errors.is_empty() {
        Ok(validated)
    } else {
        Err(errors)
    }
}

pub fn merge_subgraphs(
    subgraphs: Vec<Subgraph<Validated>>,
    registry: &FeatureRegistry,
) -> Result<Supergraph<Merged>, Vec<CompositionError>> {
    let result = Merger::new(subgraphs, registry).merge();
    if !result.errors.is_empty() {
        return Err(result.errors);
    }
    let schema = result.supergraph.ok_or_else(|| {
        vec![CompositionError::from(internal_error!(
            "Merging raised no error but produced no supergraph"
        ))]
    })?;
    Ok(Supergraph::new(schema, result.hints))
}
