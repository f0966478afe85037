use std::fmt::Display;
use std::sync::Arc;

use apollo_compiler::ast;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;
use either::Either;
use petgraph::graph::EdgeIndex;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use tracing::debug;
use tracing::trace;

use crate::bail;
use crate::composition::satisfiability::validation_state::TransitionOutcome;
use crate::composition::satisfiability::validation_state::ValidationState;
use crate::error::CompositionError;
use crate::error::ErrorCode;
use crate::error::FederationError;
use crate::query_graph::QueryGraph;
use crate::query_graph::QueryGraphEdgeTransition;
use crate::query_graph::condition_resolver::CachingConditionResolver;
use crate::query_graph::condition_resolver::ConditionResolution;
use crate::query_graph::condition_resolver::ConditionResolver;
use crate::query_graph::condition_resolver::ConditionResolverCache;
use crate::query_graph::condition_resolver::ExcludedConditions;
use crate::query_graph::condition_resolver::ExcludedDestinations;
use crate::query_graph::graph_path::PathElement;
use crate::query_graph::graph_path::TransitionGraphPath;
use crate::query_graph::graph_path::TransitionPathWithLazyIndirectPaths;
use crate::schema::field_set::print_selections;
use crate::supergraph::CompositionHint;
use crate::utils::logging::snapshot;

/// The number of subgraph paths the traversal stack may hold when no limit is configured.
pub(super) const DEFAULT_MAX_VALIDATION_SUBGRAPH_PATHS: usize = 1_000_000;

/// The subgraphs the subgraph paths of a state ended in when visiting a supergraph node.
type NodeVisit = IndexSet<Arc<str>>;

pub(super) struct ValidationTraversal {
    condition_resolver: SimpleConditionResolver,
    /// The stack contains all states that aren't terminal.
    stack: Vec<ValidationState>,
    /// For each supergraph node, the visits of the states that were validated from it. A state
    /// whose subgraphs include those of a previous visit adds nothing that visit didn't check.
    previous_visits: IndexMap<NodeIndex, Vec<NodeVisit>>,
    validation_errors: Vec<CompositionError>,
    validation_hints: Vec<CompositionHint>,
    /// The number of subgraph paths held by the states on the stack.
    total_validation_subgraph_paths: usize,
    max_validation_subgraph_paths: usize,
}

impl ValidationTraversal {
    pub(super) fn new(
        api_schema_query_graph: Arc<QueryGraph>,
        federated_query_graph: Arc<QueryGraph>,
        max_validation_subgraph_paths: Option<usize>,
    ) -> Result<Self, FederationError> {
        let mut traversal = Self {
            condition_resolver: SimpleConditionResolver::new(federated_query_graph.clone()),
            stack: Vec::new(),
            previous_visits: IndexMap::default(),
            validation_errors: Vec::new(),
            validation_hints: Vec::new(),
            total_validation_subgraph_paths: 0,
            max_validation_subgraph_paths: max_validation_subgraph_paths
                .unwrap_or(DEFAULT_MAX_VALIDATION_SUBGRAPH_PATHS),
        };
        let root_kinds = api_schema_query_graph
            .root_kinds_to_nodes()
            .map(|roots| roots.keys().copied().collect::<Vec<_>>())
            .unwrap_or_default();
        for root_kind in root_kinds {
            let state = ValidationState::initial(
                api_schema_query_graph.clone(),
                federated_query_graph.clone(),
                root_kind,
            )?;
            if !traversal.push_stack(state) {
                break;
            }
        }
        Ok(traversal)
    }

    /// Pushes the state, unless that makes the stack hold too many subgraph paths, in which case
    /// the error is recorded and `false` returned.
    fn push_stack(&mut self, state: ValidationState) -> bool {
        self.total_validation_subgraph_paths += state.subgraph_path_count();
        self.stack.push(state);
        if self.total_validation_subgraph_paths > self.max_validation_subgraph_paths {
            self.validation_errors
                .push(ErrorCode::MaxValidationSubgraphPathsExceeded.err(
                    format!(
                        "Maximum number of validation subgraph paths exceeded: {}",
                        self.total_validation_subgraph_paths
                    ),
                    vec![],
                ));
            return false;
        }
        true
    }

    fn pop_stack(&mut self) -> Option<ValidationState> {
        let state = self.stack.pop()?;
        self.total_validation_subgraph_paths -= state.subgraph_path_count();
        Some(state)
    }

    /// Walks every path of the supergraph, returning the errors and hints found along the way.
    pub(super) fn validate(
        mut self,
    ) -> Result<(Vec<CompositionError>, Vec<CompositionHint>), FederationError> {
        if self.validation_errors.is_empty() {
            while let Some(state) = self.pop_stack() {
                if !self.handle_state(state)? {
                    break;
                }
            }
        }
        debug!(
            errors = self.validation_errors.len(),
            hints = self.validation_hints.len(),
            visited_nodes = self.previous_visits.len(),
            cached_condition_resolutions = self.condition_resolver.condition_resolver_cache.len(),
            "Satisfiability traversal done"
        );
        Ok((self.validation_errors, self.validation_hints))
    }

    /// Returns `false` when the traversal must stop.
    fn handle_state(&mut self, mut state: ValidationState) -> Result<bool, FederationError> {
        snapshot!("ValidationState", state.to_string(), "Validation state");
        let supergraph_graph = state.supergraph_path().graph().clone();
        let node = state.supergraph_path().tail();
        let current_visit = state.current_subgraph_names()?;
        let previous_visits = self.previous_visits.entry(node).or_default();
        if previous_visits
            .iter()
            .any(|previous_visit| previous_visit.is_subset(&current_visit))
        {
            // A previous visit covered a subset of the current subgraphs; anything validated
            // there is at least as constrained as here.
            trace!("Skipping state already covered by a previous visit");
            return Ok(true);
        }
        previous_visits.push(current_visit);

        let edges: Vec<EdgeIndex> = supergraph_graph.out_edges(node).map(|e| e.id()).collect();
        for edge in edges {
            if let QueryGraphEdgeTransition::FieldCollection { field_name, .. } =
                &supergraph_graph.edge_weight(edge)?.transition
                && field_name.as_str() == "__typename"
            {
                continue;
            }
            match state.validate_transition(
                edge,
                &mut self.condition_resolver,
                &mut self.validation_hints,
            )? {
                TransitionOutcome::Advanced(new_state) => {
                    if !new_state.is_terminal() && !self.push_stack(new_state) {
                        return Ok(false);
                    }
                }
                TransitionOutcome::Vacuous => {}
                TransitionOutcome::Error(error) => self.validation_errors.push(error),
            }
        }
        Ok(true)
    }
}

#[derive(Clone)]
struct ConditionValidationState<'a> {
    /// Selection that belongs to the condition we're validating.
    selection: &'a ast::Selection,
    /// All the possible paths we could be in the subgraph when we reach this state selection.
    /// Shared by the states of sibling selections.
    subgraph_options: Arc<Vec<TransitionPathWithLazyIndirectPaths>>,
}

impl Display for ConditionValidationState<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} <=> [{}]",
            print_selections(std::slice::from_ref(self.selection)),
            self.subgraph_options
                .iter()
                .map(|option| option.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl ConditionValidationState<'_> {
    /// Advances every option with the selection. Returns the states of the sub-selections, or
    /// `None` when no option can collect the selection.
    fn advance(
        &mut self,
        condition_resolver: &mut impl ConditionResolver,
    ) -> Result<Option<Vec<Self>>, FederationError> {
        let (field_name, cast_to, selection_set) = match self.selection {
            ast::Selection::Field(field) => {
                if field.name.as_str() == "__typename" {
                    return Ok(Some(Vec::new()));
                }
                (Some(&field.name), None, &field.selection_set)
            }
            ast::Selection::InlineFragment(fragment) => (
                None,
                fragment.type_condition.as_ref(),
                &fragment.selection_set,
            ),
            ast::Selection::FragmentSpread(_) => {
                bail!("Unexpected fragment spread in condition {self}")
            }
        };

        // A fragment without type condition stays where it is.
        let subgraph_options = if field_name.is_none() && cast_to.is_none() {
            self.subgraph_options.clone()
        } else {
            let mut new_options = Vec::new();
            let mut vacuous = false;
            for option in Arc::make_mut(&mut self.subgraph_options).iter_mut() {
                let parent_type = option
                    .path
                    .graph()
                    .node_type_name(option.path.tail())?
                    .clone();
                let element = match (field_name, cast_to) {
                    (Some(field_name), _) => PathElement::Field {
                        parent_type: &parent_type,
                        field_name,
                    },
                    (None, Some(to_type)) => PathElement::TypeCast { to_type },
                    (None, None) => bail!("Condition selection selects nothing"),
                };
                match option.advance_with_element(element, condition_resolver)? {
                    Either::Left(options) if options.is_empty() => vacuous = true,
                    Either::Left(options) => new_options.extend(options),
                    Either::Right(_) => {}
                }
            }
            if new_options.is_empty() {
                // A cast no option can match leaves nothing under it to collect. Otherwise the
                // selection, and so the whole condition, cannot be collected.
                return Ok(vacuous.then(Vec::new));
            }
            Arc::new(new_options)
        };
        Ok(Some(
            selection_set
                .iter()
                .map(|selection| ConditionValidationState {
                    selection,
                    subgraph_options: subgraph_options.clone(),
                })
                .collect(),
        ))
    }
}

/// A `ConditionResolver` that only validates that the condition can be satisfied, without
/// comparing the various ways it could be.
pub(super) struct SimpleConditionResolver {
    query_graph: Arc<QueryGraph>,
    /// The cache for condition resolution.
    condition_resolver_cache: ConditionResolverCache,
}

impl SimpleConditionResolver {
    pub(super) fn new(query_graph: Arc<QueryGraph>) -> Self {
        SimpleConditionResolver {
            query_graph,
            condition_resolver_cache: ConditionResolverCache::new(),
        }
    }
}

impl CachingConditionResolver for SimpleConditionResolver {
    fn query_graph(&self) -> &Arc<QueryGraph> {
        &self.query_graph
    }

    fn resolver_cache(&mut self) -> &mut ConditionResolverCache {
        &mut self.condition_resolver_cache
    }

    fn resolve_without_cache(
        &mut self,
        edge: EdgeIndex,
        excluded_destinations: &ExcludedDestinations,
        excluded_conditions: &ExcludedConditions,
    ) -> Result<ConditionResolution, FederationError> {
        let edge_weight = self.query_graph.edge_weight(edge)?;
        let Some(conditions) = edge_weight.conditions.clone() else {
            bail!("Edge {edge_weight} has no conditions to resolve");
        };
        let printed_conditions = print_selections(&conditions);
        // The same conditions are being resolved further up, and going through them again would
        // never end.
        if excluded_conditions.contains(&printed_conditions) {
            return Ok(ConditionResolution::Unsatisfied);
        }
        let excluded_conditions = excluded_conditions.add_item(printed_conditions);
        let head = self.query_graph.edge_endpoints(edge)?.0;

        let initial_path = TransitionGraphPath::new(self.query_graph.clone(), head);
        let initial_option = TransitionPathWithLazyIndirectPaths::with_exclusions(
            Arc::new(initial_path),
            excluded_destinations.clone(),
            excluded_conditions,
        );
        let initial_options = Arc::new(vec![initial_option]);

        let mut stack: Vec<ConditionValidationState> = conditions
            .iter()
            .map(|selection| ConditionValidationState {
                selection,
                subgraph_options: initial_options.clone(),
            })
            .collect();
        while let Some(mut state) = stack.pop() {
            trace!("Condition validation state: {state}");
            match state.advance(self)? {
                // That selection of the conditions cannot be collected, so neither can the
                // conditions.
                None => return Ok(ConditionResolution::Unsatisfied),
                Some(new_states) => stack.extend(new_states),
            }
        }
        // Some path was found for every selection of the conditions.
        Ok(ConditionResolution::Satisfied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::feature_registry::FeatureRegistry;
    use crate::query_graph::build_query_graph::build_federated_query_graph;
    use crate::subgraph::Subgraph;
    use crate::subgraph::Validated;

    fn subgraph(name: &str, sdl: &str) -> Subgraph<Validated> {
        Subgraph::parse(name, &format!("http://{name}"), sdl)
            .expect("parses")
            .into_fed2_subgraph()
            .expect("converts to fed2")
            .expand_links(&FeatureRegistry::default())
            .expect("links expand")
            .validate(true)
            .expect("is valid")
    }

    fn federated_graph(subgraphs: &[Subgraph<Validated>]) -> Arc<QueryGraph> {
        let supergraph = apollo_compiler::Schema::parse_and_validate(
            "type Query { start: T } type T { id: ID! onlyInA: Int onlyInB: Int onlyInC: Int }",
            "supergraph.graphql",
        )
        .expect("valid schema");
        Arc::new(build_federated_query_graph(supergraph, subgraphs).expect("graph builds"))
    }

    fn resolve_all_conditions(graph: &Arc<QueryGraph>) -> Vec<(String, ConditionResolution)> {
        let mut resolver = SimpleConditionResolver::new(graph.clone());
        graph
            .graph()
            .edge_indices()
            .filter_map(|edge| {
                let weight = graph.edge_weight(edge).expect("edge exists");
                weight.conditions.as_ref()?;
                let resolution = resolver
                    .resolve(edge, &Default::default(), &Default::default())
                    .expect("resolves");
                let (head, tail) = graph.edge_endpoints(edge).expect("edge exists");
                Some((
                    format!(
                        "{} --[{weight}]--> {}",
                        graph.node_weight(head).expect("node exists"),
                        graph.node_weight(tail).expect("node exists")
                    ),
                    resolution,
                ))
            })
            .collect()
    }

    #[test]
    fn resolves_keys_and_requires() {
        let graph = federated_graph(&[
            subgraph(
                "A",
                r#"
                type Query { start: T! }
                type T @key(fields: "id") { id: ID! onlyInA: Int! }
                "#,
            ),
            subgraph(
                "B",
                r#"
                type T @key(fields: "id") { id: ID! onlyInB: Int! }
                "#,
            ),
            subgraph(
                "C",
                r#"
                type T @key(fields: "id") {
                  id: ID!
                  onlyInB: Int! @external
                  onlyInC: Int! @requires(fields: "onlyInB")
                }
                "#,
            ),
        ]);
        let resolutions = resolve_all_conditions(&graph);
        assert!(!resolutions.is_empty());
        for (edge, resolution) in resolutions {
            assert!(resolution.is_satisfied(), "{edge} should be satisfiable");
        }
    }

    #[test]
    fn requires_on_unreachable_field_is_unsatisfied() {
        let graph = federated_graph(&[
            subgraph(
                "A",
                r#"
                type Query { start: T! }
                type T @key(fields: "id") {
                  id: ID!
                  onlyInB: Int! @external
                  onlyInC: Int! @requires(fields: "onlyInB")
                }
                "#,
            ),
        ]);
        let resolutions = resolve_all_conditions(&graph);
        assert_eq!(resolutions.len(), 1);
        assert_eq!(resolutions[0].1, ConditionResolution::Unsatisfied);
    }
}
