use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::validation::Valid;
use petgraph::Direction;
use petgraph::graph::DiGraph;
use petgraph::graph::EdgeIndex;
use petgraph::graph::EdgeReference;
use petgraph::graph::NodeIndex;

use crate::error::FederationError;
use crate::internal_error;
use crate::schema::field_set::print_selections;
use crate::schema::position::SchemaRootDefinitionKind;
use crate::schema::subgraph_metadata::SubgraphMetadata;

pub(crate) mod build_query_graph;
pub(crate) mod condition_resolver;
pub(crate) mod graph_path;

/// The source of the root nodes of a federated query graph. It can never clash with a subgraph
/// name since `_` is not a valid subgraph name.
pub(crate) const FEDERATED_GRAPH_ROOT_SOURCE: &str = "_";

#[derive(Debug, Clone)]
pub(crate) struct QueryGraphNode {
    /// The GraphQL type this node points to.
    pub(crate) type_: QueryGraphNodeType,
    /// An identifier of the underlying schema containing the `type_` this node points to. This is
    /// mainly used in federated query graphs, where the `source` is a subgraph name.
    pub(crate) source: Arc<str>,
    /// @provides works by creating duplicates of the node/type involved in the provides and adding
    /// the provided edges only to those copies. All the nodes copied for a given @provides
    /// application share the same `provide_id`.
    pub(crate) provide_id: Option<u32>,
    /// If present, this node represents a root node of the corresponding kind.
    pub(crate) root_kind: Option<SchemaRootDefinitionKind>,
}

impl Display for QueryGraphNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.type_, self.source)?;
        if let Some(provide_id) = self.provide_id {
            write!(f, "-{provide_id}")?;
        }
        if self.root_kind.is_some() {
            write!(f, "*")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum QueryGraphNodeType {
    /// A named output type of the node's source schema.
    SchemaType(Name),
    FederatedRootType(SchemaRootDefinitionKind),
}

impl QueryGraphNodeType {
    pub(crate) fn type_name(&self) -> Option<&Name> {
        match self {
            Self::SchemaType(name) => Some(name),
            Self::FederatedRootType(_) => None,
        }
    }
}

impl Display for QueryGraphNodeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SchemaType(name) => name.fmt(f),
            Self::FederatedRootType(root_kind) => write!(f, "[{root_kind}]"),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct QueryGraphEdge {
    /// Indicates what kind of edge this is and what the edge does/represents. For instance, if the
    /// edge represents a field, the `transition` will be a `FieldCollection` transition.
    pub(crate) transition: QueryGraphEdgeTransition,
    /// Optional conditions on an edge.
    ///
    /// Conditions are selections that a traversal of the query graph needs to "collect" (traverse
    /// edges with transitions corresponding to those selections) from the edge's head before it
    /// can take the edge. They are the key fields for @key edges, and the required fields for
    /// fields carrying @requires.
    pub(crate) conditions: Option<Arc<Vec<ast::Selection>>>,
}

impl Display for QueryGraphEdge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if matches!(
            self.transition,
            QueryGraphEdgeTransition::SubgraphEnteringTransition
        ) && self.conditions.is_none()
        {
            return Ok(());
        }
        if let Some(conditions) = &self.conditions {
            write!(f, "{} ⊢ {}", print_selections(conditions), self.transition)
        } else {
            self.transition.fmt(f)
        }
    }
}

/// What an edge corresponds to in the underlying GraphQL schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum QueryGraphEdgeTransition {
    /// A field edge, going from (a node for) the field parent type to the field's (base) type.
    FieldCollection {
        /// The name of the schema containing the field.
        source: Arc<str>,
        parent_type: Name,
        field_name: Name,
        /// Whether this field is part of an @provides.
        is_part_of_provides: bool,
    },
    /// A downcast edge, going from an abstract type to one of its possible runtime types.
    Downcast {
        source: Arc<str>,
        from_type: Name,
        to_type: Name,
    },
    /// A key edge (only found in federated query graphs) going from an entity type in a particular
    /// subgraph to the same entity type but in another subgraph. Key transition edges _must_ have
    /// `conditions` corresponding to the key fields.
    KeyResolution,
    /// A root type edge (only found in federated query graphs) going from the query root type of a
    /// subgraph to the query root type of another subgraph. Once a subgraph field returns the
    /// query type, any subgraph can be queried from there.
    RootTypeResolution { root_kind: SchemaRootDefinitionKind },
    /// Only found coming out of the root nodes of federated query graphs: the router is always
    /// free to start querying any of the subgraphs.
    SubgraphEnteringTransition,
    /// A "fake" downcast edge (only found in federated query graphs) going from an
    /// @interfaceObject type to itself, standing for one of the implementations (in the
    /// supergraph) of the corresponding interface. The cast type does not exist in the subgraph
    /// holding the edge, which is why it is only a name.
    InterfaceObjectFakeDownCast {
        source: Arc<str>,
        from_type: Name,
        to_type_name: Name,
    },
}

impl QueryGraphEdgeTransition {
    /// Whether taking the edge collects an element of the operation, as opposed to moving between
    /// subgraphs.
    pub(crate) fn collect_operation_elements(&self) -> bool {
        match self {
            Self::FieldCollection { .. } => true,
            Self::Downcast { .. } => true,
            Self::KeyResolution => false,
            Self::RootTypeResolution { .. } => false,
            Self::SubgraphEnteringTransition => false,
            Self::InterfaceObjectFakeDownCast { .. } => true,
        }
    }
}

impl Display for QueryGraphEdgeTransition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FieldCollection { field_name, .. } => write!(f, "{field_name}"),
            Self::Downcast { to_type, .. } => write!(f, "... on {to_type}"),
            Self::KeyResolution => write!(f, "key()"),
            Self::RootTypeResolution { root_kind } => write!(f, "{root_kind}()"),
            Self::SubgraphEnteringTransition => write!(f, "∅"),
            Self::InterfaceObjectFakeDownCast { to_type_name, .. } => {
                write!(f, "... on {to_type_name}")
            }
        }
    }
}

/// A graph over the types of one schema (the API schema), or of all the subgraphs of a
/// supergraph (a "federated" query graph), whose edges are the ways a query can move from one
/// type to another.
#[derive(Debug)]
pub(crate) struct QueryGraph {
    /// The name of the query graph: the source of an API schema graph, or
    /// [`FEDERATED_GRAPH_ROOT_SOURCE`] for a federated one.
    name: Arc<str>,
    /// Nodes and edges are never removed, so indexes are stable once created.
    graph: DiGraph<QueryGraphNode, QueryGraphEdge>,
    /// The schemas the graph was built from, keyed by the source names found on nodes and edges.
    sources: IndexMap<Arc<str>, Valid<Schema>>,
    /// Federation metadata of each subgraph source. Empty for non-federated graphs.
    subgraph_metadata: IndexMap<Arc<str>, SubgraphMetadata>,
    /// The supergraph the subgraphs of a federated graph were extracted from.
    supergraph_schema: Option<Valid<Schema>>,
    /// Per source, the nodes pointing to each type. @provides copies mean a type can have more
    /// than one node in a source.
    types_to_nodes_by_source: IndexMap<Arc<str>, IndexMap<Name, IndexSet<NodeIndex>>>,
    root_kinds_to_nodes_by_source: IndexMap<Arc<str>, IndexMap<SchemaRootDefinitionKind, NodeIndex>>,
}

impl QueryGraph {
    pub(crate) fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub(crate) fn graph(&self) -> &DiGraph<QueryGraphNode, QueryGraphEdge> {
        &self.graph
    }

    pub(crate) fn node_weight(&self, node: NodeIndex) -> Result<&QueryGraphNode, FederationError> {
        self.graph
            .node_weight(node)
            .ok_or_else(|| internal_error!("Node unexpectedly missing"))
    }

    pub(crate) fn edge_weight(&self, edge: EdgeIndex) -> Result<&QueryGraphEdge, FederationError> {
        self.graph
            .edge_weight(edge)
            .ok_or_else(|| internal_error!("Edge unexpectedly missing"))
    }

    pub(crate) fn edge_endpoints(
        &self,
        edge: EdgeIndex,
    ) -> Result<(NodeIndex, NodeIndex), FederationError> {
        self.graph
            .edge_endpoints(edge)
            .ok_or_else(|| internal_error!("Edge unexpectedly missing"))
    }

    pub(crate) fn out_edges(
        &self,
        node: NodeIndex,
    ) -> impl Iterator<Item = EdgeReference<'_, QueryGraphEdge>> {
        // petgraph walks edges newest first; reversing keeps insertion order.
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .collect();
        edges.reverse();
        edges.into_iter()
    }

    /// The schema of the graph's own source. Only meaningful for non-federated graphs.
    pub(crate) fn schema(&self) -> Result<&Valid<Schema>, FederationError> {
        self.schema_by_source(&self.name)
    }

    pub(crate) fn schema_by_source(&self, source: &str) -> Result<&Valid<Schema>, FederationError> {
        self.sources
            .get(source)
            .ok_or_else(|| internal_error!("Schema for source \"{source}\" unexpectedly missing"))
    }

    pub(crate) fn sources(&self) -> impl Iterator<Item = (&Arc<str>, &Valid<Schema>)> {
        self.sources.iter()
    }

    pub(crate) fn subgraph_metadata(&self, source: &str) -> Result<&SubgraphMetadata, FederationError> {
        self.subgraph_metadata.get(source).ok_or_else(|| {
            internal_error!("Metadata for subgraph \"{source}\" unexpectedly missing")
        })
    }

    pub(crate) fn supergraph_schema(&self) -> Result<&Valid<Schema>, FederationError> {
        self.supergraph_schema
            .as_ref()
            .ok_or_else(|| internal_error!("Query graph \"{}\" has no supergraph", self.name))
    }

    /// The nodes pointing to `type_name` in the graph's own source.
    pub(crate) fn types_to_nodes(&self, type_name: &str) -> Option<&IndexSet<NodeIndex>> {
        self.nodes_for_type_in_source(&self.name, type_name)
    }

    pub(crate) fn nodes_for_type_in_source(
        &self,
        source: &str,
        type_name: &str,
    ) -> Option<&IndexSet<NodeIndex>> {
        self.types_to_nodes_by_source.get(source)?.get(type_name)
    }

    pub(crate) fn root_kinds_to_nodes(&self) -> Option<&IndexMap<SchemaRootDefinitionKind, NodeIndex>> {
        self.root_kinds_to_nodes_by_source.get(&self.name)
    }

    pub(crate) fn root_node_for_source(
        &self,
        source: &str,
        root_kind: SchemaRootDefinitionKind,
    ) -> Option<NodeIndex> {
        self.root_kinds_to_nodes_by_source
            .get(source)?
            .get(&root_kind)
            .copied()
    }

    /// The type name of the node, or an error for federated root nodes.
    pub(crate) fn node_type_name(&self, node: NodeIndex) -> Result<&Name, FederationError> {
        let weight = self.node_weight(node)?;
        weight
            .type_
            .type_name()
            .ok_or_else(|| internal_error!("Unexpected federated root node {weight}"))
    }
}
