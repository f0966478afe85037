use std::collections::BTreeSet;
use std::sync::Arc;

use apollo_compiler::collections::IndexMap;
use petgraph::graph::EdgeIndex;

use crate::error::FederationError;
use crate::query_graph::QueryGraph;

/// Whether the conditions of an edge can be collected from where the edge starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConditionResolution {
    Satisfied,
    Unsatisfied,
}

impl ConditionResolution {
    pub(crate) fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }
}

/// Subgraphs that indirect paths must not move to while resolving a condition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub(crate) struct ExcludedDestinations(Arc<BTreeSet<Arc<str>>>);

impl ExcludedDestinations {
    pub(crate) fn contains(&self, destination: &str) -> bool {
        self.0.contains(destination)
    }

    pub(crate) fn add_item(&self, destination: Arc<str>) -> Self {
        if self.0.contains(&destination) {
            return self.clone();
        }
        let mut destinations = (*self.0).clone();
        destinations.insert(destination);
        Self(Arc::new(destinations))
    }
}

/// Conditions being resolved further up the stack. An edge whose conditions are among them can't
/// be taken, or resolving it would loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub(crate) struct ExcludedConditions(Arc<BTreeSet<String>>);

impl ExcludedConditions {
    pub(crate) fn contains(&self, conditions: &str) -> bool {
        self.0.contains(conditions)
    }

    pub(crate) fn add_item(&self, conditions: String) -> Self {
        let mut all = (*self.0).clone();
        all.insert(conditions);
        Self(Arc::new(all))
    }
}

pub(crate) trait ConditionResolver {
    fn resolve(
        &mut self,
        edge: EdgeIndex,
        excluded_destinations: &ExcludedDestinations,
        excluded_conditions: &ExcludedConditions,
    ) -> Result<ConditionResolution, FederationError>;
}

#[derive(Debug, Default)]
pub(crate) struct ConditionResolverCache {
    resolutions:
        IndexMap<(EdgeIndex, ExcludedDestinations, ExcludedConditions), ConditionResolution>,
}

impl ConditionResolverCache {
    pub(crate) fn new() -> Self {
        Default::default()
    }

    fn get(
        &self,
        edge: EdgeIndex,
        excluded_destinations: &ExcludedDestinations,
        excluded_conditions: &ExcludedConditions,
    ) -> Option<ConditionResolution> {
        self.resolutions
            .get(&(
                edge,
                excluded_destinations.clone(),
                excluded_conditions.clone(),
            ))
            .copied()
    }

    fn insert(
        &mut self,
        edge: EdgeIndex,
        excluded_destinations: ExcludedDestinations,
        excluded_conditions: ExcludedConditions,
        resolution: ConditionResolution,
    ) {
        self.resolutions
            .insert((edge, excluded_destinations, excluded_conditions), resolution);
    }

    pub(crate) fn len(&self) -> usize {
        self.resolutions.len()
    }
}

/// A resolver memoizing its resolutions per edge and exclusions, since the same condition is
/// requested over and over during a traversal.
pub(crate) trait CachingConditionResolver {
    fn query_graph(&self) -> &Arc<QueryGraph>;

    fn resolver_cache(&mut self) -> &mut ConditionResolverCache;

    fn resolve_without_cache(
        &mut self,
        edge: EdgeIndex,
        excluded_destinations: &ExcludedDestinations,
        excluded_conditions: &ExcludedConditions,
    ) -> Result<ConditionResolution, FederationError>;
}

impl<T: CachingConditionResolver> ConditionResolver for T {
    fn resolve(
        &mut self,
        edge: EdgeIndex,
        excluded_destinations: &ExcludedDestinations,
        excluded_conditions: &ExcludedConditions,
    ) -> Result<ConditionResolution, FederationError> {
        if self.query_graph().edge_weight(edge)?.conditions.is_none() {
            return Ok(ConditionResolution::Satisfied);
        }
        if let Some(resolution) =
            self.resolver_cache()
                .get(edge, excluded_destinations, excluded_conditions)
        {
            return Ok(resolution);
        }
        let resolution =
            self.resolve_without_cache(edge, excluded_destinations, excluded_conditions)?;
        self.resolver_cache().insert(
            edge,
            excluded_destinations.clone(),
            excluded_conditions.clone(),
            resolution,
        );
        Ok(resolution)
    }
}
