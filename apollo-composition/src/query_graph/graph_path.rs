use std::collections::VecDeque;
use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::ast;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::schema::ExtendedType;
use either::Either;
use itertools::Itertools;
use petgraph::graph::EdgeIndex;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;

use crate::error::FederationError;
use crate::internal_error;
use crate::query_graph::QueryGraph;
use crate::query_graph::QueryGraphEdgeTransition;
use crate::query_graph::QueryGraphNode;
use crate::query_graph::condition_resolver::ConditionResolver;
use crate::query_graph::condition_resolver::ExcludedConditions;
use crate::query_graph::condition_resolver::ExcludedDestinations;
use crate::schema::field_set::field_definition;
use crate::schema::field_set::print_selections;
use crate::schema::is_abstract_type;
use crate::schema::possible_runtime_types;
use crate::schema::position::SchemaRootDefinitionKind;

/// A path in a query graph, made of the edges taken from a head node.
#[derive(Debug, Clone)]
pub(crate) struct TransitionGraphPath {
    graph: Arc<QueryGraph>,
    head: NodeIndex,
    tail: NodeIndex,
    edges: Vec<EdgeIndex>,
}

impl TransitionGraphPath {
    pub(crate) fn new(graph: Arc<QueryGraph>, head: NodeIndex) -> Self {
        Self {
            graph,
            head,
            tail: head,
            edges: Vec::new(),
        }
    }

    pub(crate) fn from_graph_root(
        graph: Arc<QueryGraph>,
        root_kind: SchemaRootDefinitionKind,
    ) -> Result<Self, FederationError> {
        let root = graph
            .root_kinds_to_nodes()
            .and_then(|roots| roots.get(&root_kind))
            .copied()
            .ok_or_else(|| internal_error!("Query graph has no {root_kind} root"))?;
        Ok(Self::new(graph, root))
    }

    pub(crate) fn graph(&self) -> &Arc<QueryGraph> {
        &self.graph
    }

    pub(crate) fn tail(&self) -> NodeIndex {
        self.tail
    }

    pub(crate) fn head_node(&self) -> Result<&QueryGraphNode, FederationError> {
        self.graph.node_weight(self.head)
    }

    pub(crate) fn tail_node(&self) -> Result<&QueryGraphNode, FederationError> {
        self.graph.node_weight(self.tail)
    }

    pub(crate) fn edges(&self) -> &[EdgeIndex] {
        &self.edges
    }

    pub(crate) fn add(&self, edge: EdgeIndex) -> Result<Self, FederationError> {
        let (head, tail) = self.graph.edge_endpoints(edge)?;
        if head != self.tail {
            return Err(internal_error!(
                "Cannot add edge {} to path ending at {}",
                self.graph.edge_weight(edge)?,
                self.tail_node()?
            ));
        }
        let mut edges = self.edges.clone();
        edges.push(edge);
        Ok(Self {
            graph: self.graph.clone(),
            head: self.head,
            tail,
            edges,
        })
    }
}

impl Display for TransitionGraphPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let Some(head) = self.graph.graph().node_weight(self.head) else {
            return Err(std::fmt::Error);
        };
        write!(f, "{head}")?;
        for edge in &self.edges {
            let (Some(weight), Some((_, tail))) = (
                self.graph.graph().edge_weight(*edge),
                self.graph.graph().edge_endpoints(*edge),
            ) else {
                return Err(std::fmt::Error);
            };
            let Some(tail) = self.graph.graph().node_weight(tail) else {
                return Err(std::fmt::Error);
            };
            write!(f, " --[{weight}]--> {tail}")?;
        }
        Ok(())
    }
}

/// An element of an operation a path can be advanced with: the supergraph counterpart of a field
/// or downcast edge, or a selection of a condition.
#[derive(Debug, Clone, Copy)]
pub(crate) enum PathElement<'a> {
    Field {
        parent_type: &'a Name,
        field_name: &'a Name,
    },
    TypeCast {
        to_type: &'a Name,
    },
}

impl<'a> PathElement<'a> {
    pub(crate) fn from_transition(
        transition: &'a QueryGraphEdgeTransition,
    ) -> Result<Self, FederationError> {
        match transition {
            QueryGraphEdgeTransition::FieldCollection {
                parent_type,
                field_name,
                ..
            } => Ok(Self::Field {
                parent_type,
                field_name,
            }),
            QueryGraphEdgeTransition::Downcast { to_type, .. } => Ok(Self::TypeCast { to_type }),
            _ => Err(internal_error!(
                "Unexpected transition {transition} outside of a federated query graph"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub(crate) enum UnadvanceableReason {
    UnsatisfiableKeyCondition,
    UnsatisfiableRequiresCondition,
    NoMatchingTransition,
    UnreachableType,
}

/// Why a path cannot move from one subgraph to another, or stay in its subgraph, for an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Unadvanceable {
    reason: UnadvanceableReason,
    source_subgraph: Arc<str>,
    dest_subgraph: Arc<str>,
    details: String,
}

impl Unadvanceable {
    pub(crate) fn source_subgraph(&self) -> &str {
        &self.source_subgraph
    }

    pub(crate) fn details(&self) -> &str {
        &self.details
    }
}

impl Display for Unadvanceable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}]({}->{}) {}",
            self.reason, self.source_subgraph, self.dest_subgraph, self.details
        )
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Unadvanceables(Arc<Vec<Unadvanceable>>);

impl Unadvanceables {
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Unadvanceable> {
        self.0.iter()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for Unadvanceables {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0.iter().join(", "))
    }
}

/// The paths reachable from the tail of a path without collecting anything, i.e. by only taking
/// @key and root type edges, along with the reasons some subgraphs could not be reached.
#[derive(Debug, Clone)]
struct IndirectPaths {
    paths: Arc<Vec<Arc<TransitionGraphPath>>>,
    dead_ends: Vec<Unadvanceable>,
}

/// A subgraph path whose indirect options are only computed when a direct advance is not enough.
#[derive(Debug, Clone)]
pub(crate) struct TransitionPathWithLazyIndirectPaths {
    pub(crate) path: Arc<TransitionGraphPath>,
    excluded_destinations: ExcludedDestinations,
    excluded_conditions: ExcludedConditions,
    lazily_computed_indirect_paths: Option<IndirectPaths>,
}

impl Display for TransitionPathWithLazyIndirectPaths {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.path.fmt(f)
    }
}

impl TransitionPathWithLazyIndirectPaths {
    pub(crate) fn new(path: Arc<TransitionGraphPath>) -> Self {
        Self::with_exclusions(path, Default::default(), Default::default())
    }

    pub(crate) fn with_exclusions(
        path: Arc<TransitionGraphPath>,
        excluded_destinations: ExcludedDestinations,
        excluded_conditions: ExcludedConditions,
    ) -> Self {
        Self {
            path,
            excluded_destinations,
            excluded_conditions,
            lazily_computed_indirect_paths: None,
        }
    }

    fn derive(&self, path: Arc<TransitionGraphPath>) -> Self {
        Self::with_exclusions(
            path,
            self.excluded_destinations.clone(),
            self.excluded_conditions.clone(),
        )
    }

    /// Advances the path with the element, either directly or after moving to other subgraphs.
    ///
    /// Returns the advanced paths, or the reasons the path cannot be advanced. An empty list of
    /// paths means the element is a type cast that no runtime type reachable from the path can
    /// match, so nothing the path leads to needs validating.
    pub(crate) fn advance_with_element(
        &mut self,
        element: PathElement<'_>,
        condition_resolver: &mut impl ConditionResolver,
    ) -> Result<Either<Vec<Self>, Unadvanceables>, FederationError> {
        let direct = self.advance_directly(&self.path.clone(), element, condition_resolver)?;
        let mut dead_ends = Vec::new();
        let mut options = Vec::new();
        match direct {
            Either::Left(paths) => {
                // Type casts never need other subgraphs: casting from where we are is exactly as
                // good as casting after a move.
                if paths.is_empty() || matches!(element, PathElement::TypeCast { .. }) {
                    return Ok(Either::Left(
                        paths.into_iter().map(|p| self.derive(Arc::new(p))).collect(),
                    ));
                }
                // If the field can be collected directly and is a leaf, there is no point in
                // looking at other subgraphs.
                let graph = self.path.graph().clone();
                let all_leaves = paths
                    .iter()
                    .all(|p| graph.graph().edges(p.tail()).next().is_none());
                options.extend(paths.into_iter().map(|p| self.derive(Arc::new(p))));
                if all_leaves {
                    return Ok(Either::Left(options));
                }
            }
            Either::Right(reasons) => dead_ends.extend(reasons),
        }

        let indirect = self.indirect_paths(condition_resolver)?.clone();
        for path in indirect.paths.iter() {
            match self.advance_directly(path, element, condition_resolver)? {
                Either::Left(paths) => {
                    options.extend(paths.into_iter().map(|p| self.derive(Arc::new(p))))
                }
                Either::Right(reasons) => dead_ends.extend(reasons),
            }
        }
        if !options.is_empty() {
            return Ok(Either::Left(options));
        }

        dead_ends.extend(indirect.dead_ends.iter().cloned());
        if let PathElement::Field {
            parent_type,
            field_name,
        } = element
        {
            let reached: IndexSet<Arc<str>> = indirect
                .paths
                .iter()
                .filter_map(|path| path.tail_node().ok().map(|node| node.source.clone()))
                .collect();
            dead_ends.extend(self.unreachable_subgraphs(&reached, parent_type, field_name)?);
        }
        Ok(Either::Right(Unadvanceables(Arc::new(dead_ends))))
    }

    /// Advances the path by taking an edge of its tail matching the element.
    fn advance_directly(
        &self,
        path: &TransitionGraphPath,
        element: PathElement<'_>,
        condition_resolver: &mut impl ConditionResolver,
    ) -> Result<Either<Vec<TransitionGraphPath>, Vec<Unadvanceable>>, FederationError> {
        let graph = path.graph().clone();
        let tail = path.tail_node()?;
        let source = tail.source.clone();
        let tail_type = graph.node_type_name(path.tail())?.clone();
        let schema = graph.schema_by_source(&source)?;
        let metadata = graph.subgraph_metadata(&source)?;

        match element {
            PathElement::Field {
                parent_type,
                field_name,
            } => {
                let edge = graph.out_edges(path.tail()).find(|edge| {
                    matches!(
                        &edge.weight().transition,
                        QueryGraphEdgeTransition::FieldCollection { field_name: name, .. }
                            if name == field_name
                    )
                });
                let coordinate = format!("{parent_type}.{field_name}");
                let Some(edge) = edge else {
                    let details = if field_definition(schema, &tail_type, field_name).is_some()
                        && metadata.is_external(&tail_type, field_name)
                    {
                        format!("field \"{coordinate}\" is not resolvable because marked @external")
                    } else {
                        format!("cannot find field \"{coordinate}\"")
                    };
                    return Ok(Either::Right(vec![Unadvanceable {
                        reason: UnadvanceableReason::NoMatchingTransition,
                        source_subgraph: source.clone(),
                        dest_subgraph: source,
                        details,
                    }]));
                };
                if let Some(conditions) = &edge.weight().conditions {
                    let resolution = condition_resolver.resolve(
                        edge.id(),
                        &self.excluded_destinations,
                        &self.excluded_conditions,
                    )?;
                    if !resolution.is_satisfied() {
                        let key_field_warning = conditions
                            .iter()
                            .filter_map(|selection| match selection {
                                ast::Selection::Field(field)
                                    if metadata.is_key_field(&tail_type, &field.name)
                                        && metadata.is_external(&tail_type, &field.name) =>
                                {
                                    Some(field.name.clone())
                                }
                                _ => None,
                            })
                            .next()
                            .map(|key_field| {
                                format!(
                                    " (please ensure that this is not due to key field \"{key_field}\" being accidentally marked @external)"
                                )
                            })
                            .unwrap_or_default();
                        return Ok(Either::Right(vec![Unadvanceable {
                            reason: UnadvanceableReason::UnsatisfiableRequiresCondition,
                            source_subgraph: source.clone(),
                            dest_subgraph: source,
                            details: format!(
                                "cannot satisfy @require conditions on field \"{coordinate}\"{key_field_warning}"
                            ),
                        }]));
                    }
                }
                Ok(Either::Left(vec![path.add(edge.id())?]))
            }
            PathElement::TypeCast { to_type } => {
                if tail_type == *to_type {
                    return Ok(Either::Left(vec![path.clone()]));
                }
                let edge = graph.out_edges(path.tail()).find(|edge| {
                    match &edge.weight().transition {
                        QueryGraphEdgeTransition::Downcast { to_type: to, .. } => to == to_type,
                        QueryGraphEdgeTransition::InterfaceObjectFakeDownCast {
                            to_type_name,
                            ..
                        } => to_type_name == to_type,
                        _ => false,
                    }
                });
                match edge {
                    Some(edge) => Ok(Either::Left(vec![path.add(edge.id())?])),
                    // The cast type can't be a runtime type of what the subgraph returns here.
                    None => Ok(Either::Left(Vec::new())),
                }
            }
        }
    }

    fn indirect_paths(
        &mut self,
        condition_resolver: &mut impl ConditionResolver,
    ) -> Result<&IndirectPaths, FederationError> {
        if self.lazily_computed_indirect_paths.is_none() {
            let computed = self.compute_indirect_paths(condition_resolver)?;
            self.lazily_computed_indirect_paths = Some(computed);
        }
        self.lazily_computed_indirect_paths
            .as_ref()
            .ok_or_else(|| internal_error!("Indirect paths unexpectedly missing"))
    }

    /// Breadth-first search over the @key and root type edges, keeping the first path found into
    /// each subgraph.
    fn compute_indirect_paths(
        &self,
        condition_resolver: &mut impl ConditionResolver,
    ) -> Result<IndirectPaths, FederationError> {
        let graph = self.path.graph().clone();
        let start_source = self.path.tail_node()?.source.clone();
        let mut reached_sources: IndexSet<Arc<str>> = IndexSet::default();
        reached_sources.insert(start_source);
        let mut paths = Vec::new();
        let mut dead_ends = Vec::new();
        let mut queue = VecDeque::from([self.path.clone()]);

        while let Some(path) = queue.pop_front() {
            let head_source = path.tail_node()?.source.clone();
            for edge in graph.out_edges(path.tail()) {
                if edge.weight().transition.collect_operation_elements()
                    || matches!(
                        edge.weight().transition,
                        QueryGraphEdgeTransition::SubgraphEnteringTransition
                    )
                {
                    continue;
                }
                let target_source = graph.node_weight(edge.target())?.source.clone();
                if reached_sources.contains(&target_source)
                    || self.excluded_destinations.contains(&target_source)
                {
                    continue;
                }
                if let Some(conditions) = &edge.weight().conditions {
                    // Getting to a subgraph to collect the key needed to get to that subgraph is
                    // pointless.
                    let resolution = condition_resolver.resolve(
                        edge.id(),
                        &self.excluded_destinations.add_item(target_source.clone()),
                        &self.excluded_conditions,
                    )?;
                    if !resolution.is_satisfied() {
                        let type_name = graph.node_type_name(edge.target())?;
                        dead_ends.push(Unadvanceable {
                            reason: UnadvanceableReason::UnsatisfiableKeyCondition,
                            source_subgraph: head_source.clone(),
                            dest_subgraph: target_source.clone(),
                            details: format!(
                                "cannot move to subgraph \"{target_source}\" using @key(fields: \"{}\") of \"{type_name}\", the key field(s) cannot be resolved from subgraph \"{head_source}\"",
                                print_selections(conditions),
                            ),
                        });
                        continue;
                    }
                }
                reached_sources.insert(target_source);
                let new_path = Arc::new(path.add(edge.id())?);
                paths.push(new_path.clone());
                queue.push_back(new_path);
            }
        }

        dead_ends.retain(|dead_end| !reached_sources.contains(&dead_end.dest_subgraph));
        Ok(IndirectPaths {
            paths: Arc::new(paths),
            dead_ends,
        })
    }

    /// Explains why the subgraphs defining the field, but that no indirect path reached, could
    /// not be used.
    fn unreachable_subgraphs(
        &self,
        reached: &IndexSet<Arc<str>>,
        parent_type: &Name,
        field_name: &Name,
    ) -> Result<Vec<Unadvanceable>, FederationError> {
        let graph = self.path.graph();
        let source = self.path.tail_node()?.source.clone();
        let type_name = graph.node_type_name(self.path.tail())?;
        let mut reasons = Vec::new();
        for (other, schema) in graph.sources() {
            if *other == source || reached.contains(other) {
                continue;
            }
            let metadata = graph.subgraph_metadata(other)?;
            let Some(ty @ (ExtendedType::Object(_) | ExtendedType::Interface(_))) =
                schema.types.get(type_name)
            else {
                continue;
            };
            if field_definition(schema, type_name, field_name).is_none()
                || metadata.is_external(type_name, field_name)
            {
                continue;
            }
            let keys = metadata.keys(ty);
            let coordinate = format!("{parent_type}.{field_name}");
            let details = if keys.is_empty() {
                format!(
                    "cannot move to subgraph \"{other}\", which has field \"{coordinate}\", because type \"{type_name}\" has no @key defined in subgraph \"{other}\""
                )
            } else if keys.iter().all(|key| !key.resolvable) {
                format!(
                    "cannot move to subgraph \"{other}\", which has field \"{coordinate}\", because none of the @key defined on type \"{type_name}\" in subgraph \"{other}\" are resolvable (they are all declared with their \"resolvable\" argument set to false)"
                )
            } else {
                // Keys exist: the key edges explain the failure.
                continue;
            };
            reasons.push(Unadvanceable {
                reason: UnadvanceableReason::UnreachableType,
                source_subgraph: source.clone(),
                dest_subgraph: other.clone(),
                details,
            });
        }
        Ok(reasons)
    }

    /// The object types the tail of the path can resolve to, in its subgraph.
    pub(crate) fn tail_possible_runtime_types(&self) -> Result<Vec<Name>, FederationError> {
        let graph = self.path.graph();
        let tail = self.path.tail_node()?;
        let type_name = graph.node_type_name(self.path.tail())?;
        let metadata = graph.subgraph_metadata(&tail.source)?;
        // An @interfaceObject stands for every implementation of its interface.
        let schema = if metadata.is_interface_object(type_name) {
            graph.supergraph_schema()?
        } else {
            graph.schema_by_source(&tail.source)?
        };
        if !is_abstract_type(schema, type_name) && !metadata.is_interface_object(type_name) {
            return Ok(vec![type_name.clone()]);
        }
        Ok(possible_runtime_types(schema, type_name)
            .into_iter()
            .sorted()
            .collect())
    }
}
