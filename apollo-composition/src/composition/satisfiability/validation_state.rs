use std::fmt::Display;
use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;
use either::Either;
use itertools::Itertools;
use petgraph::graph::EdgeIndex;
use petgraph::visit::EdgeRef;

use crate::bail;
use crate::composition::satisfiability::satisfiability_error::satisfiability_error;
use crate::composition::satisfiability::satisfiability_error::shareable_field_mismatched_runtime_types_hint;
use crate::composition::satisfiability::satisfiability_error::shareable_field_non_intersecting_runtime_types_error;
use crate::ensure;
use crate::error::CompositionError;
use crate::error::FederationError;
use crate::query_graph::QueryGraph;
use crate::query_graph::QueryGraphEdgeTransition;
use crate::query_graph::QueryGraphNodeType;
use crate::query_graph::condition_resolver::ConditionResolver;
use crate::query_graph::graph_path::PathElement;
use crate::query_graph::graph_path::TransitionGraphPath;
use crate::query_graph::graph_path::TransitionPathWithLazyIndirectPaths;
use crate::schema::is_abstract_type;
use crate::schema::possible_runtime_types;
use crate::schema::position::SchemaRootDefinitionKind;
use crate::supergraph::CompositionHint;

/// What a transition of the supergraph path leads to.
pub(super) enum TransitionOutcome {
    /// The subgraphs can follow the transition.
    Advanced(ValidationState),
    /// The transition is a cast to a type no subgraph path can be, so nothing beyond it needs
    /// validating.
    Vacuous,
    /// The subgraphs cannot follow the transition.
    Error(CompositionError),
}

pub(super) struct ValidationState {
    /// Path in the supergraph (i.e. the API schema query graph) corresponding to the current state.
    supergraph_path: TransitionGraphPath,
    /// All the possible paths we could be in the subgraphs (excluding @provides paths).
    subgraph_paths: Vec<TransitionPathWithLazyIndirectPaths>,
}

impl ValidationState {
    pub(super) fn initial(
        api_schema_query_graph: Arc<QueryGraph>,
        federated_query_graph: Arc<QueryGraph>,
        root_kind: SchemaRootDefinitionKind,
    ) -> Result<Self, FederationError> {
        let Some(federated_root_node) = federated_query_graph
            .root_kinds_to_nodes()
            .and_then(|roots| roots.get(&root_kind))
            .copied()
        else {
            bail!(
                "The supergraph shouldn't have a {} root if no subgraphs have one",
                root_kind
            );
        };
        let federated_root_node_weight = federated_query_graph.node_weight(federated_root_node)?;
        ensure!(
            federated_root_node_weight.type_ == QueryGraphNodeType::FederatedRootType(root_kind),
            "Unexpected node type {} for federated query graph root (expected {})",
            federated_root_node_weight.type_,
            QueryGraphNodeType::FederatedRootType(root_kind),
        );
        let initial_subgraph_path =
            TransitionGraphPath::from_graph_root(federated_query_graph.clone(), root_kind)?;
        Ok(Self {
            supergraph_path: TransitionGraphPath::from_graph_root(
                api_schema_query_graph,
                root_kind,
            )?,
            subgraph_paths: federated_query_graph
                .out_edges(federated_root_node)
                .map(|edge_ref| {
                    let path = initial_subgraph_path.add(edge_ref.id())?;
                    Ok::<_, FederationError>(TransitionPathWithLazyIndirectPaths::new(Arc::new(
                        path,
                    )))
                })
                .process_results(|iter| iter.collect())?,
        })
    }

    pub(super) fn supergraph_path(&self) -> &TransitionGraphPath {
        &self.supergraph_path
    }

    pub(super) fn subgraph_path_count(&self) -> usize {
        self.subgraph_paths.len()
    }

    /// Validates that the current state can always be advanced for the provided supergraph edge,
    /// and returns the updated state if so.
    ///
    /// Hints raised along the way are added to `hints`.
    pub(super) fn validate_transition(
        &mut self,
        supergraph_edge: EdgeIndex,
        condition_resolver: &mut impl ConditionResolver,
        hints: &mut Vec<CompositionHint>,
    ) -> Result<TransitionOutcome, FederationError> {
        let graph = self.supergraph_path.graph().clone();
        let edge_weight = graph.edge_weight(supergraph_edge)?;
        ensure!(
            edge_weight.conditions.is_none(),
            "Supergraph edges should not have conditions ({edge_weight})"
        );
        let transition = &edge_weight.transition;
        let element = PathElement::from_transition(transition)?;
        let new_supergraph_path = self.supergraph_path.add(supergraph_edge)?;

        let mut new_subgraph_paths: Vec<TransitionPathWithLazyIndirectPaths> = Vec::new();
        let mut seen_tails = IndexSet::default();
        let mut dead_ends = Vec::new();
        for path in self.subgraph_paths.iter_mut() {
            match path.advance_with_element(element, condition_resolver)? {
                Either::Left(options) if options.is_empty() => {
                    // The cast is to a type none of the subgraphs can return from here, so no
                    // query can reach what follows.
                    return Ok(TransitionOutcome::Vacuous);
                }
                Either::Left(options) => {
                    for option in options {
                        if seen_tails.insert(option.path.tail()) {
                            new_subgraph_paths.push(option);
                        }
                    }
                }
                Either::Right(reasons) => dead_ends.push(reasons),
            }
        }

        if new_subgraph_paths.is_empty() {
            return Ok(TransitionOutcome::Error(satisfiability_error(
                &new_supergraph_path,
                &dead_ends,
            )?));
        }

        let updated_state = Self {
            supergraph_path: new_supergraph_path,
            subgraph_paths: new_subgraph_paths,
        };

        // When a shared field returns an abstract type, every subgraph resolving it should do so
        // with (some of) the same runtime types.
        if let QueryGraphEdgeTransition::FieldCollection {
            parent_type,
            field_name,
            ..
        } = transition
            && updated_state.subgraph_paths.len() > 1
        {
            let return_type = graph.node_type_name(updated_state.supergraph_path.tail())?;
            if is_abstract_type(graph.schema()?, return_type)
                && updated_state.is_shareable_in_some_subgraph(field_name)?
            {
                match updated_state.check_shareable_runtime_types(parent_type, field_name)? {
                    Some(Either::Left(error)) => return Ok(TransitionOutcome::Error(error)),
                    Some(Either::Right(hint)) => hints.push(hint),
                    None => {}
                }
            }
        }

        Ok(TransitionOutcome::Advanced(updated_state))
    }

    /// Whether the supergraph path has reached a type with nothing left to select.
    pub(super) fn is_terminal(&self) -> bool {
        self.supergraph_path
            .graph()
            .graph()
            .edges(self.supergraph_path.tail())
            .next()
            .is_none()
    }

    /// Whether the field the subgraph paths just collected is @shareable in one of their
    /// subgraphs.
    fn is_shareable_in_some_subgraph(&self, field_name: &Name) -> Result<bool, FederationError> {
        for path in &self.subgraph_paths {
            let graph = path.path.graph();
            let Some(last_edge) = path.path.edges().last() else {
                continue;
            };
            if let QueryGraphEdgeTransition::FieldCollection {
                source,
                parent_type,
                ..
            } = &graph.edge_weight(*last_edge)?.transition
                && graph
                    .subgraph_metadata(source)?
                    .is_shareable(parent_type, field_name)
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn check_shareable_runtime_types(
        &self,
        parent_type: &Name,
        field_name: &Name,
    ) -> Result<Option<Either<CompositionError, CompositionHint>>, FederationError> {
        let mut abstract_path_count = 0;
        for path in &self.subgraph_paths {
            let graph = path.path.graph();
            let tail = path.path.tail_node()?;
            let type_name = graph.node_type_name(path.path.tail())?;
            if is_abstract_type(graph.schema_by_source(&tail.source)?, type_name) {
                abstract_path_count += 1;
            }
        }
        if abstract_path_count <= 1 {
            return Ok(None);
        }

        // Starting from the supergraph runtime types ignores @inaccessible ones.
        let supergraph_graph = self.supergraph_path.graph();
        let all_runtime_types: Vec<Name> = possible_runtime_types(
            supergraph_graph.schema()?,
            supergraph_graph.node_type_name(self.supergraph_path.tail())?,
        )
        .into_iter()
        .sorted()
        .collect();
        let mut intersection = all_runtime_types;
        let mut runtime_types_to_subgraphs: IndexMap<Vec<Name>, IndexSet<Arc<str>>> =
            IndexMap::default();
        let mut runtime_types_per_subgraphs: IndexMap<Arc<str>, Vec<Name>> = IndexMap::default();
        let mut has_all_empty = true;
        for path in &self.subgraph_paths {
            let subgraph = path.path.tail_node()?.source.clone();
            let type_names = path.tail_possible_runtime_types()?;
            has_all_empty &= type_names.is_empty();
            intersection.retain(|type_name| type_names.contains(type_name));
            runtime_types_to_subgraphs
                .entry(type_names.clone())
                .or_default()
                .insert(subgraph.clone());
            runtime_types_per_subgraphs.insert(subgraph, type_names);
        }

        // No subgraph defines any runtime type, so every subgraph can only ever resolve the field
        // to null, which is consistent.
        if has_all_empty {
            return Ok(None);
        }
        if intersection.is_empty() {
            return Ok(Some(Either::Left(
                shareable_field_non_intersecting_runtime_types_error(
                    self,
                    parent_type,
                    field_name,
                    &runtime_types_to_subgraphs,
                )?,
            )));
        }
        // Intersecting sets are accepted, but the types outside of the intersection should never
        // be returned.
        if runtime_types_to_subgraphs.len() > 1 {
            return Ok(Some(Either::Right(
                shareable_field_mismatched_runtime_types_hint(
                    self,
                    parent_type,
                    field_name,
                    &intersection,
                    &runtime_types_per_subgraphs,
                )?,
            )));
        }
        Ok(None)
    }

    pub(super) fn current_subgraph_names(&self) -> Result<IndexSet<Arc<str>>, FederationError> {
        self.subgraph_paths
            .iter()
            .map(|path| Ok(path.path.tail_node()?.source.clone()))
            .process_results(|iter| iter.collect())
    }
}

impl Display for ValidationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.supergraph_path.fmt(f)?;
        write!(f, " <=> ")?;
        let mut iter = self.subgraph_paths.iter();
        if let Some(first_path) = iter.next() {
            first_path.fmt(f)?;
            for path in iter {
                write!(f, ", ")?;
                path.fmt(f)?;
            }
        }
        Ok(())
    }
}
