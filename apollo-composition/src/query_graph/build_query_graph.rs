use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::FieldDefinition;
use apollo_compiler::validation::Valid;
use petgraph::graph::EdgeIndex;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use strum::IntoEnumIterator;
use tracing::debug;

use crate::error::FederationError;
use crate::internal_error;
use crate::link::federation_spec_definition::FEDERATION_FIELDS_ARGUMENT_NAME;
use crate::query_graph::FEDERATED_GRAPH_ROOT_SOURCE;
use crate::query_graph::QueryGraph;
use crate::query_graph::QueryGraphEdge;
use crate::query_graph::QueryGraphEdgeTransition;
use crate::query_graph::QueryGraphNode;
use crate::query_graph::QueryGraphNodeType;
use crate::schema::directive_optional_string_argument;
use crate::schema::field_set::field_definition;
use crate::schema::field_set::parse_field_set;
use crate::schema::possible_runtime_types;
use crate::schema::position::SchemaRootDefinitionKind;
use crate::schema::subgraph_metadata::SubgraphMetadata;
use crate::subgraph::Subgraph;
use crate::subgraph::Validated;

/// Builds a query graph based on the provided schema (usually an API schema outside of testing).
///
/// Assumes the given schema has been validated.
pub(crate) fn build_query_graph(
    name: Arc<str>,
    schema: Valid<Schema>,
) -> Result<QueryGraph, FederationError> {
    let mut query_graph = QueryGraph::empty(name.clone());
    SchemaQueryGraphBuilder::new(&mut query_graph, name, schema, None).build()?;
    Ok(query_graph)
}

/// Builds a "federated" query graph over the subgraphs of a supergraph.
///
/// A federated query graph is one that is used to reason about queries made by a router against a
/// set of federated subgraph services. Every subgraph contributes its own nodes and edges, which
/// are then linked together by @key and root type edges.
pub(crate) fn build_federated_query_graph(
    supergraph_schema: Valid<Schema>,
    subgraphs: &[Subgraph<Validated>],
) -> Result<QueryGraph, FederationError> {
    let mut query_graph = QueryGraph::empty(FEDERATED_GRAPH_ROOT_SOURCE.into());
    query_graph.supergraph_schema = Some(supergraph_schema);
    for subgraph in subgraphs {
        SchemaQueryGraphBuilder::new(
            &mut query_graph,
            subgraph.name.as_str().into(),
            subgraph.validated_schema().clone(),
            Some(subgraph.metadata()),
        )
        .build()?;
    }
    FederatedQueryGraphBuilder {
        query_graph: &mut query_graph,
        subgraphs,
        next_provide_id: 0,
    }
    .build()?;
    debug!(
        nodes = query_graph.graph.node_count(),
        edges = query_graph.graph.edge_count(),
        "Built federated query graph"
    );
    Ok(query_graph)
}

impl QueryGraph {
    fn empty(name: Arc<str>) -> Self {
        Self {
            name,
            graph: Default::default(),
            sources: Default::default(),
            subgraph_metadata: Default::default(),
            supergraph_schema: None,
            types_to_nodes_by_source: Default::default(),
            root_kinds_to_nodes_by_source: Default::default(),
        }
    }

    fn create_node(
        &mut self,
        source: &Arc<str>,
        type_name: &Name,
        provide_id: Option<u32>,
    ) -> NodeIndex {
        let node = self.graph.add_node(QueryGraphNode {
            type_: QueryGraphNodeType::SchemaType(type_name.clone()),
            source: source.clone(),
            provide_id,
            root_kind: None,
        });
        self.types_to_nodes_by_source
            .entry(source.clone())
            .or_default()
            .entry(type_name.clone())
            .or_default()
            .insert(node);
        node
    }

    /// The node created for the type by the schema builder, as opposed to @provides copies.
    fn main_node(&self, source: &str, type_name: &str) -> Option<NodeIndex> {
        self.nodes_for_type_in_source(source, type_name)?
            .first()
            .copied()
    }

    fn add_edge(
        &mut self,
        head: NodeIndex,
        tail: NodeIndex,
        transition: QueryGraphEdgeTransition,
        conditions: Option<Arc<Vec<ast::Selection>>>,
    ) -> EdgeIndex {
        self.graph.add_edge(
            head,
            tail,
            QueryGraphEdge {
                transition,
                conditions,
            },
        )
    }
}

/// Adds the nodes and edges of a single schema to a query graph.
struct SchemaQueryGraphBuilder<'graph> {
    query_graph: &'graph mut QueryGraph,
    source: Arc<str>,
    schema: Valid<Schema>,
    /// Present when the schema is a subgraph.
    metadata: Option<&'graph SubgraphMetadata>,
    /// Nodes created but whose out edges are not added yet.
    stack: Vec<NodeIndex>,
}

impl<'graph> SchemaQueryGraphBuilder<'graph> {
    fn new(
        query_graph: &'graph mut QueryGraph,
        source: Arc<str>,
        schema: Valid<Schema>,
        metadata: Option<&'graph SubgraphMetadata>,
    ) -> Self {
        Self {
            query_graph,
            source,
            schema,
            metadata,
            stack: Vec::new(),
        }
    }

    fn build(mut self) -> Result<(), FederationError> {
        self.query_graph
            .sources
            .insert(self.source.clone(), self.schema.clone());
        self.query_graph
            .types_to_nodes_by_source
            .insert(self.source.clone(), Default::default());
        self.query_graph
            .root_kinds_to_nodes_by_source
            .insert(self.source.clone(), Default::default());
        if let Some(metadata) = self.metadata {
            self.query_graph
                .subgraph_metadata
                .insert(self.source.clone(), metadata.clone());
        }

        for root_kind in SchemaRootDefinitionKind::iter() {
            let Some(root_type) = self.schema.root_operation(root_kind.into()).cloned() else {
                continue;
            };
            let node = self.add_type_node(&root_type);
            self.query_graph.graph[node].root_kind = Some(root_kind);
            self.query_graph
                .root_kinds_to_nodes_by_source
                .entry(self.source.clone())
                .or_default()
                .insert(root_kind, node);
        }

        // Entities are reachable from other subgraphs through their keys, and @interfaceObject
        // types through the implementations of their interface, even if no field of this subgraph
        // leads to them.
        if let Some(metadata) = self.metadata {
            let entry_points: Vec<Name> = self
                .schema
                .types
                .iter()
                .filter(|(name, ty)| {
                    !ty.is_built_in()
                        && matches!(ty, ExtendedType::Object(_) | ExtendedType::Interface(_))
                        && (!metadata.keys(ty).is_empty() || metadata.is_interface_object(name))
                })
                .map(|(name, _)| name.clone())
                .collect();
            for type_name in &entry_points {
                self.add_type_node(type_name);
            }
        }

        while let Some(node) = self.stack.pop() {
            self.add_out_edges(node)?;
        }
        Ok(())
    }

    fn add_type_node(&mut self, type_name: &Name) -> NodeIndex {
        if let Some(node) = self.query_graph.main_node(&self.source, type_name) {
            return node;
        }
        let node = self.query_graph.create_node(&self.source, type_name, None);
        if matches!(
            self.schema.types.get(type_name),
            Some(ExtendedType::Object(_) | ExtendedType::Interface(_) | ExtendedType::Union(_))
        ) {
            self.stack.push(node);
        }
        node
    }

    fn add_out_edges(&mut self, node: NodeIndex) -> Result<(), FederationError> {
        let type_name = self.query_graph.node_type_name(node)?.clone();
        let (fields, is_abstract): (Vec<Component<FieldDefinition>>, bool) =
            match self.schema.types.get(&type_name) {
                Some(ExtendedType::Object(object)) => {
                    (object.fields.values().cloned().collect(), false)
                }
                Some(ExtendedType::Interface(interface)) => {
                    (interface.fields.values().cloned().collect(), true)
                }
                Some(ExtendedType::Union(_)) => (Vec::new(), true),
                Some(_) => return Ok(()),
                None => return Err(internal_error!("Type \"{type_name}\" unexpectedly missing")),
            };
        for field in &fields {
            self.add_field_edge(node, &type_name, field)?;
        }
        if is_abstract {
            self.add_downcast_edges(node, &type_name);
        }
        Ok(())
    }

    fn add_field_edge(
        &mut self,
        head: NodeIndex,
        parent_type: &Name,
        field: &FieldDefinition,
    ) -> Result<(), FederationError> {
        let mut conditions = None;
        if let Some(metadata) = self.metadata {
            // External fields are only resolvable through the @provides copies.
            if metadata.is_external(parent_type, &field.name) {
                return Ok(());
            }
            if let Some(requires) = field.directives.get(&metadata.directive_names().requires)
                && let Some(fields) =
                    directive_optional_string_argument(requires, &FEDERATION_FIELDS_ARGUMENT_NAME)?
            {
                conditions = Some(Arc::new(parse_conditions(fields)?));
            }
        }
        let tail = self.add_type_node(field.ty.inner_named_type());
        self.query_graph.add_edge(
            head,
            tail,
            QueryGraphEdgeTransition::FieldCollection {
                source: self.source.clone(),
                parent_type: parent_type.clone(),
                field_name: field.name.clone(),
                is_part_of_provides: false,
            },
            conditions,
        );
        Ok(())
    }

    fn add_downcast_edges(&mut self, head: NodeIndex, abstract_type: &Name) {
        for runtime_type in possible_runtime_types(&self.schema, abstract_type) {
            let tail = self.add_type_node(&runtime_type);
            self.query_graph.add_edge(
                head,
                tail,
                QueryGraphEdgeTransition::Downcast {
                    source: self.source.clone(),
                    from_type: abstract_type.clone(),
                    to_type: runtime_type,
                },
                None,
            );
        }
    }
}

fn parse_conditions(fields: &str) -> Result<Vec<ast::Selection>, FederationError> {
    parse_field_set(fields)
        .map_err(|error| internal_error!("Invalid field set \"{fields}\" in subgraph: {error}"))
}

/// Links the per-subgraph parts of a federated query graph together.
struct FederatedQueryGraphBuilder<'graph> {
    query_graph: &'graph mut QueryGraph,
    subgraphs: &'graph [Subgraph<Validated>],
    next_provide_id: u32,
}

impl FederatedQueryGraphBuilder<'_> {
    fn build(mut self) -> Result<(), FederationError> {
        self.handle_keys()?;
        self.handle_root_type_resolutions();
        self.handle_interface_objects()?;
        self.handle_provides()?;
        self.add_federated_root_nodes();
        Ok(())
    }

    /// Adds an edge to the node of an entity in a subgraph from the nodes of that entity in every
    /// other subgraph, for every resolvable key of the entity. Interface entities and
    /// @interfaceObject types can also be reached from the nodes of their implementations.
    fn handle_keys(&mut self) -> Result<(), FederationError> {
        let supergraph_schema = self.query_graph.supergraph_schema()?.clone();
        for subgraph in self.subgraphs {
            let source: Arc<str> = subgraph.name.as_str().into();
            let metadata = subgraph.metadata();
            for (type_name, ty) in &subgraph.validated_schema().types {
                if ty.is_built_in()
                    || !matches!(ty, ExtendedType::Object(_) | ExtendedType::Interface(_))
                {
                    continue;
                }
                let Some(tail) = self.query_graph.main_node(&source, type_name) else {
                    continue;
                };
                let mut entry_types = vec![type_name.clone()];
                if matches!(ty, ExtendedType::Interface(_))
                    || metadata.is_interface_object(type_name)
                {
                    entry_types.extend(possible_runtime_types(&supergraph_schema, type_name));
                }
                for key in metadata.keys(ty).into_iter().filter(|key| key.resolvable) {
                    let conditions = Arc::new(parse_conditions(&key.fields)?);
                    for other in self.subgraphs.iter().filter(|s| s.name != subgraph.name) {
                        for entry_type in &entry_types {
                            let heads: Vec<NodeIndex> = self
                                .query_graph
                                .nodes_for_type_in_source(&other.name, entry_type)
                                .map(|nodes| nodes.iter().copied().collect())
                                .unwrap_or_default();
                            for head in heads {
                                self.query_graph.add_edge(
                                    head,
                                    tail,
                                    QueryGraphEdgeTransition::KeyResolution,
                                    Some(conditions.clone()),
                                );
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// A subgraph field returning the query type can continue in any subgraph.
    fn handle_root_type_resolutions(&mut self) {
        let root_kind = SchemaRootDefinitionKind::Query;
        for subgraph in self.subgraphs {
            let Some(head) = self.query_graph.root_node_for_source(&subgraph.name, root_kind)
            else {
                continue;
            };
            for other in self.subgraphs.iter().filter(|s| s.name != subgraph.name) {
                if let Some(tail) = self.query_graph.root_node_for_source(&other.name, root_kind) {
                    self.query_graph.add_edge(
                        head,
                        tail,
                        QueryGraphEdgeTransition::RootTypeResolution { root_kind },
                        None,
                    );
                }
            }
        }
    }

    fn handle_interface_objects(&mut self) -> Result<(), FederationError> {
        let supergraph_schema = self.query_graph.supergraph_schema()?.clone();
        for subgraph in self.subgraphs {
            let source: Arc<str> = subgraph.name.as_str().into();
            for type_name in subgraph.metadata().interface_objects() {
                let Some(node) = self.query_graph.main_node(&source, type_name) else {
                    continue;
                };
                for implementation in possible_runtime_types(&supergraph_schema, type_name) {
                    self.query_graph.add_edge(
                        node,
                        node,
                        QueryGraphEdgeTransition::InterfaceObjectFakeDownCast {
                            source: source.clone(),
                            from_type: type_name.clone(),
                            to_type_name: implementation,
                        },
                        None,
                    );
                }
            }
        }
        Ok(())
    }

    /// Every field carrying @provides is redirected to a copy of the node of its type, and the
    /// provided fields are added to that copy only.
    fn handle_provides(&mut self) -> Result<(), FederationError> {
        for subgraph in self.subgraphs {
            let source: Arc<str> = subgraph.name.as_str().into();
            let schema = subgraph.validated_schema();
            let provides_name = &subgraph.metadata().directive_names().provides;

            let mut provides = Vec::new();
            for edge in self.query_graph.graph.edge_references() {
                let QueryGraphEdgeTransition::FieldCollection {
                    source: edge_source,
                    parent_type,
                    field_name,
                    ..
                } = &edge.weight().transition
                else {
                    continue;
                };
                if *edge_source != source {
                    continue;
                }
                let Some(field) = field_definition(schema, parent_type, field_name) else {
                    continue;
                };
                if let Some(application) = field.directives.get(provides_name)
                    && let Some(fields) = directive_optional_string_argument(
                        application,
                        &FEDERATION_FIELDS_ARGUMENT_NAME,
                    )?
                {
                    provides.push((edge.source(), field_name.clone(), parse_conditions(fields)?));
                }
            }

            for (head, field_name, selections) in provides {
                let provide_id = self.next_provide_id;
                self.next_provide_id += 1;
                let Some(edge) = self.field_edge(head, &field_name) else {
                    continue;
                };
                let copy = self.redirect_to_copy(edge, provide_id)?;
                self.add_provided_edges(&source, schema, copy, &selections, provide_id)?;
            }
        }
        Ok(())
    }

    fn field_edge(&self, head: NodeIndex, field_name: &Name) -> Option<EdgeIndex> {
        self.query_graph.out_edges(head).find_map(|edge| {
            matches!(
                &edge.weight().transition,
                QueryGraphEdgeTransition::FieldCollection { field_name: name, .. } if name == field_name
            )
            .then(|| edge.id())
        })
    }

    fn downcast_edge(&self, head: NodeIndex, to: &Name) -> Option<EdgeIndex> {
        self.query_graph.out_edges(head).find_map(|edge| {
            matches!(
                &edge.weight().transition,
                QueryGraphEdgeTransition::Downcast { to_type, .. } if to_type == to
            )
            .then(|| edge.id())
        })
    }

    /// Copies the node, with its out edges, and makes the edge point at the copy.
    fn redirect_to_copy(
        &mut self,
        edge: EdgeIndex,
        provide_id: u32,
    ) -> Result<NodeIndex, FederationError> {
        let (head, tail) = self.query_graph.edge_endpoints(edge)?;
        let copy = self.copy_node(tail, provide_id)?;
        // Removing an edge moves the last edge into its index, which is fine since edge indexes
        // are only looked up fresh while building.
        let weight = self
            .query_graph
            .graph
            .remove_edge(edge)
            .ok_or_else(|| internal_error!("Edge unexpectedly missing"))?;
        self.query_graph.graph.add_edge(head, copy, weight);
        Ok(copy)
    }

    fn copy_node(&mut self, node: NodeIndex, provide_id: u32) -> Result<NodeIndex, FederationError> {
        let weight = self.query_graph.node_weight(node)?.clone();
        let type_name = self.query_graph.node_type_name(node)?.clone();
        let copy = self
            .query_graph
            .create_node(&weight.source, &type_name, Some(provide_id));
        let out_edges: Vec<(NodeIndex, QueryGraphEdge)> = self
            .query_graph
            .out_edges(node)
            .map(|edge| {
                // Self loops (fake downcasts) stay on the copy.
                let target = if edge.target() == node {
                    copy
                } else {
                    edge.target()
                };
                (target, edge.weight().clone())
            })
            .collect();
        for (target, weight) in out_edges {
            self.query_graph.graph.add_edge(copy, target, weight);
        }
        Ok(copy)
    }

    fn add_provided_edges(
        &mut self,
        source: &Arc<str>,
        schema: &Schema,
        node: NodeIndex,
        selections: &[ast::Selection],
        provide_id: u32,
    ) -> Result<(), FederationError> {
        let type_name = self.query_graph.node_type_name(node)?.clone();
        for selection in selections {
            match selection {
                ast::Selection::Field(field) => {
                    if let Some(edge) = self.field_edge(node, &field.name) {
                        if !field.selection_set.is_empty() {
                            let copy = self.redirect_to_copy(edge, provide_id)?;
                            self.add_provided_edges(
                                source,
                                schema,
                                copy,
                                &field.selection_set,
                                provide_id,
                            )?;
                        }
                        continue;
                    }
                    let Some(definition) = field_definition(schema, &type_name, &field.name)
                    else {
                        return Err(internal_error!(
                            "Provided field \"{type_name}.{}\" unexpectedly missing",
                            field.name
                        ));
                    };
                    let field_type = definition.ty.inner_named_type();
                    let tail = if field.selection_set.is_empty() {
                        match self.query_graph.main_node(source, field_type) {
                            Some(main) => main,
                            None => self.query_graph.create_node(source, field_type, None),
                        }
                    } else {
                        let copy = self.provided_copy(source, field_type, provide_id)?;
                        self.add_provided_edges(
                            source,
                            schema,
                            copy,
                            &field.selection_set,
                            provide_id,
                        )?;
                        copy
                    };
                    self.query_graph.add_edge(
                        node,
                        tail,
                        QueryGraphEdgeTransition::FieldCollection {
                            source: source.clone(),
                            parent_type: type_name.clone(),
                            field_name: field.name.clone(),
                            is_part_of_provides: true,
                        },
                        None,
                    );
                }
                ast::Selection::InlineFragment(fragment) => {
                    let cast_type = fragment
                        .type_condition
                        .clone()
                        .unwrap_or_else(|| type_name.clone());
                    if cast_type == type_name {
                        self.add_provided_edges(
                            source,
                            schema,
                            node,
                            &fragment.selection_set,
                            provide_id,
                        )?;
                        continue;
                    }
                    let copy = match self.downcast_edge(node, &cast_type) {
                        Some(edge) => self.redirect_to_copy(edge, provide_id)?,
                        None => {
                            let copy = self.provided_copy(source, &cast_type, provide_id)?;
                            self.query_graph.add_edge(
                                node,
                                copy,
                                QueryGraphEdgeTransition::Downcast {
                                    source: source.clone(),
                                    from_type: type_name.clone(),
                                    to_type: cast_type.clone(),
                                },
                                None,
                            );
                            copy
                        }
                    };
                    self.add_provided_edges(
                        source,
                        schema,
                        copy,
                        &fragment.selection_set,
                        provide_id,
                    )?;
                }
                ast::Selection::FragmentSpread(_) => {
                    return Err(internal_error!("Unexpected fragment spread in @provides"));
                }
            }
        }
        Ok(())
    }

    /// A copy of the main node of the type, or a fresh node if the subgraph has none.
    fn provided_copy(
        &mut self,
        source: &Arc<str>,
        type_name: &Name,
        provide_id: u32,
    ) -> Result<NodeIndex, FederationError> {
        match self.query_graph.main_node(source, type_name) {
            Some(main) => self.copy_node(main, provide_id),
            None => Ok(self
                .query_graph
                .create_node(source, type_name, Some(provide_id))),
        }
    }

    fn add_federated_root_nodes(&mut self) {
        let root_source: Arc<str> = FEDERATED_GRAPH_ROOT_SOURCE.into();
        self.query_graph
            .types_to_nodes_by_source
            .insert(root_source.clone(), Default::default());
        for root_kind in SchemaRootDefinitionKind::iter() {
            let subgraph_roots: IndexSet<NodeIndex> = self
                .subgraphs
                .iter()
                .filter_map(|subgraph| {
                    self.query_graph
                        .root_node_for_source(&subgraph.name, root_kind)
                })
                .collect();
            if subgraph_roots.is_empty() {
                continue;
            }
            let root = self.query_graph.graph.add_node(QueryGraphNode {
                type_: QueryGraphNodeType::FederatedRootType(root_kind),
                source: root_source.clone(),
                provide_id: None,
                root_kind: Some(root_kind),
            });
            self.query_graph
                .root_kinds_to_nodes_by_source
                .entry(root_source.clone())
                .or_default()
                .insert(root_kind, root);
            for subgraph_root in subgraph_roots {
                self.query_graph.add_edge(
                    root,
                    subgraph_root,
                    QueryGraphEdgeTransition::SubgraphEnteringTransition,
                    None,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_graph(sdl: &str) -> QueryGraph {
        let schema = Schema::parse_and_validate(sdl, "schema.graphql").expect("valid schema");
        build_query_graph("test".into(), schema).expect("query graph builds")
    }

    fn out_edges_of(graph: &QueryGraph, type_name: &str) -> Vec<String> {
        let node = *graph
            .types_to_nodes(type_name)
            .and_then(|nodes| nodes.first())
            .expect("type has a node");
        graph
            .out_edges(node)
            .map(|edge| {
                let target = graph.node_weight(edge.target()).expect("target exists");
                format!("{} -> {target}", edge.weight())
            })
            .collect()
    }

    #[test]
    fn builds_field_and_downcast_edges() {
        let graph = api_graph(
            r#"
            type Query { t: T, i: I, u: U }
            interface I { id: ID! }
            type T implements I { id: ID!, name: String }
            type S { x: Int }
            union U = T | S
            "#,
        );
        assert_eq!(
            out_edges_of(&graph, "Query"),
            vec!["t -> T(test)", "i -> I(test)", "u -> U(test)"]
        );
        assert_eq!(
            out_edges_of(&graph, "I"),
            vec!["id -> ID(test)", "... on T -> T(test)"]
        );
        assert_eq!(
            out_edges_of(&graph, "U"),
            vec!["... on T -> T(test)", "... on S -> S(test)"]
        );
        let root = graph
            .root_kinds_to_nodes()
            .and_then(|roots| roots.get(&SchemaRootDefinitionKind::Query))
            .copied()
            .expect("query root");
        assert_eq!(graph.node_weight(root).unwrap().to_string(), "Query(test)*");
    }

    #[test]
    fn unreachable_types_have_no_node() {
        let graph = api_graph(
            r#"
            type Query { a: Int }
            type Orphan { b: Int }
            "#,
        );
        assert!(graph.types_to_nodes("Orphan").is_none());
        assert!(graph.types_to_nodes("Int").is_some());
    }
}
