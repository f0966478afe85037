//! Rebuilds subgraph schemas from the `join` directives of a supergraph.
//!
//! Only what query planning cares about is extracted: types and fields each subgraph defines,
//! `@key`, `@external`, `@requires`, `@provides`, `@override`, `@shareable` and
//! `@interfaceObject`. Descriptions and other applied directives are not.

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::ast::Directive;
use apollo_compiler::ast::Type;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::name;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::ComponentName;
use apollo_compiler::schema::DirectiveList;
use apollo_compiler::schema::EnumType;
use apollo_compiler::schema::EnumValueDefinition;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::FieldDefinition;
use apollo_compiler::schema::InputObjectType;
use apollo_compiler::schema::InputValueDefinition;
use apollo_compiler::schema::InterfaceType;
use apollo_compiler::schema::ObjectType;
use apollo_compiler::schema::ScalarType;
use apollo_compiler::schema::UnionType;
use apollo_compiler::validation::Valid;
use tracing::debug;

use crate::error::FederationError;
use crate::internal_error;
use crate::link::LinksMetadata;
use crate::link::feature_registry::FeatureRegistry;
use crate::link::federation_spec_definition::FederationDirectiveNames;
use crate::link::federation_spec_definition::external_directive;
use crate::link::federation_spec_definition::interface_object_directive;
use crate::link::federation_spec_definition::key_directive;
use crate::link::federation_spec_definition::override_directive;
use crate::link::federation_spec_definition::provides_directive;
use crate::link::federation_spec_definition::requires_directive;
use crate::link::federation_spec_definition::shareable_directive;
use crate::link::join_spec_definition::JOIN_EXTERNAL_ARGUMENT_NAME;
use crate::link::join_spec_definition::JOIN_GRAPH_ARGUMENT_NAME;
use crate::link::join_spec_definition::JOIN_INTERFACE_ARGUMENT_NAME;
use crate::link::join_spec_definition::JOIN_IS_INTERFACE_OBJECT_ARGUMENT_NAME;
use crate::link::join_spec_definition::JOIN_KEY_ARGUMENT_NAME;
use crate::link::join_spec_definition::JOIN_MEMBER_ARGUMENT_NAME;
use crate::link::join_spec_definition::JOIN_NAME_ARGUMENT_NAME;
use crate::link::join_spec_definition::JOIN_OVERRIDE_ARGUMENT_NAME;
use crate::link::join_spec_definition::JOIN_OVERRIDE_LABEL_ARGUMENT_NAME;
use crate::link::join_spec_definition::JOIN_PROVIDES_ARGUMENT_NAME;
use crate::link::join_spec_definition::JOIN_REQUIRES_ARGUMENT_NAME;
use crate::link::join_spec_definition::JOIN_RESOLVABLE_ARGUMENT_NAME;
use crate::link::join_spec_definition::JOIN_TYPE_ARGUMENT_NAME;
use crate::link::join_spec_definition::JOIN_URL_ARGUMENT_NAME;
use crate::link::join_spec_definition::JOIN_USED_OVERRIDDEN_ARGUMENT_NAME;
use crate::link::spec::Identity;
use crate::schema::directive_optional_boolean_argument;
use crate::schema::directive_optional_enum_argument;
use crate::schema::directive_optional_string_argument;
use crate::schema::directive_required_string_argument;
use crate::subgraph::Subgraph;
use crate::subgraph::Validated;

/// The names the supergraph gives to the `join` elements.
struct JoinNames {
    graph_enum: Name,
    graph: Name,
    type_: Name,
    field: Name,
    implements: Name,
    union_member: Name,
    enum_value: Name,
}

impl JoinNames {
    fn new(supergraph: &Schema) -> Result<Self, FederationError> {
        let links = LinksMetadata::from_schema(supergraph)?
            .ok_or_else(|| internal_error!("The supergraph does not use @link"))?;
        let join = links
            .for_identity(&Identity::join_identity())
            .ok_or_else(|| internal_error!("The supergraph does not link the join spec"))?;
        Ok(Self {
            graph_enum: join.type_name_in_schema(&name!("Graph")),
            graph: join.directive_name_in_schema(&name!("graph")),
            type_: join.directive_name_in_schema(&name!("type")),
            field: join.directive_name_in_schema(&name!("field")),
            implements: join.directive_name_in_schema(&name!("implements")),
            union_member: join.directive_name_in_schema(&name!("unionMember")),
            enum_value: join.directive_name_in_schema(&name!("enumValue")),
        })
    }
}

/// A subgraph as declared by a `join__Graph` value.
struct GraphInfo {
    value: Name,
    name: String,
    url: String,
}

pub(crate) fn extract_subgraphs(
    supergraph: &Valid<Schema>,
    registry: &FeatureRegistry,
) -> Result<Vec<Subgraph<Validated>>, FederationError> {
    let join = JoinNames::new(supergraph)?;
    let graphs = graphs(supergraph, &join)?;
    let links = LinksMetadata::from_schema(supergraph)?.unwrap_or_default();
    let names = FederationDirectiveNames::defaults();

    let mut subgraphs = Vec::with_capacity(graphs.len());
    for graph in &graphs {
        let mut schema = Schema::new();
        for (type_name, type_) in &supergraph.types {
            if type_.is_built_in() || links.source_link_of_type(type_name).is_some() {
                continue;
            }
            if let Some(extracted) =
                extract_type(type_, &graph.value, &graphs, &join, &names)?
            {
                schema.types.insert(type_name.clone(), extracted);
            }
        }
        let definition = &supergraph.schema_definition;
        let roots = [
            definition.query.clone(),
            definition.mutation.clone(),
            definition.subscription.clone(),
        ]
        .map(|root| root.filter(|root| schema.types.contains_key(&root.name)));
        let [query, mutation, subscription] = roots;
        let extracted_definition = schema.schema_definition.make_mut();
        extracted_definition.query = query;
        extracted_definition.mutation = mutation;
        extracted_definition.subscription = subscription;

        let subgraph = Subgraph::new(&graph.name, &graph.url, schema)
            .into_fed2_subgraph()
            .and_then(|subgraph| subgraph.expand_links(registry))
            .and_then(|subgraph| subgraph.validate(false))
            .map_err(|error| {
                internal_error!(
                    "Extracted subgraph \"{}\" is invalid:\n{error}",
                    graph.name
                )
            })?;
        debug!(
            subgraph = graph.name.as_str(),
            types = subgraph.schema().types.len(),
            "extracted subgraph"
        );
        subgraphs.push(subgraph);
    }
    Ok(subgraphs)
}

fn graphs(supergraph: &Schema, join: &JoinNames) -> Result<Vec<GraphInfo>, FederationError> {
    let Some(ExtendedType::Enum(graph_enum)) = supergraph.types.get(&join.graph_enum) else {
        return Err(internal_error!(
            "The supergraph has no \"{}\" enum",
            join.graph_enum
        ));
    };
    graph_enum
        .values
        .iter()
        .map(|(value, definition)| {
            let application = definition.directives.get(&join.graph).ok_or_else(|| {
                internal_error!("Value \"{value}\" of \"{}\" has no @{}", join.graph_enum, join.graph)
            })?;
            Ok(GraphInfo {
                value: value.clone(),
                name: directive_required_string_argument(application, &JOIN_NAME_ARGUMENT_NAME)?
                    .to_string(),
                url: directive_required_string_argument(application, &JOIN_URL_ARGUMENT_NAME)?
                    .to_string(),
            })
        })
        .collect()
}

fn is_for_graph(application: &Directive, graph: &Name) -> Result<bool, FederationError> {
    Ok(directive_optional_enum_argument(application, &JOIN_GRAPH_ARGUMENT_NAME)?.as_ref()
        == Some(graph))
}

fn extract_type(
    type_: &ExtendedType,
    graph: &Name,
    graphs: &[GraphInfo],
    join: &JoinNames,
    names: &FederationDirectiveNames,
) -> Result<Option<ExtendedType>, FederationError> {
    let mut type_applications = vec![];
    for application in type_.directives().get_all(&join.type_) {
        if is_for_graph(application, graph)? {
            type_applications.push(application);
        }
    }
    if type_applications.is_empty() {
        return Ok(None);
    }
    let name = type_.name().clone();

    let mut directives = DirectiveList::default();
    let mut is_interface_object = false;
    for application in &type_applications {
        if let Some(key) = directive_optional_string_argument(application, &JOIN_KEY_ARGUMENT_NAME)? {
            let resolvable =
                directive_optional_boolean_argument(application, &JOIN_RESOLVABLE_ARGUMENT_NAME)?
                    .unwrap_or(true);
            directives.push(Component::new(key_directive(names, key, resolvable)));
        }
        is_interface_object |= directive_optional_boolean_argument(
            application,
            &JOIN_IS_INTERFACE_OBJECT_ARGUMENT_NAME,
        )?
        .unwrap_or(false);
    }
    if is_interface_object {
        directives.push(Component::new(interface_object_directive(names)));
    }

    let extracted = match type_ {
        ExtendedType::Scalar(_) => ExtendedType::Scalar(Node::new(ScalarType {
            description: None,
            name,
            directives: Default::default(),
        })),
        ExtendedType::Object(_) | ExtendedType::Interface(_) => {
            let (fields, implements_interfaces) = match type_ {
                ExtendedType::Object(object) => (&object.fields, &object.implements_interfaces),
                ExtendedType::Interface(interface) => {
                    (&interface.fields, &interface.implements_interfaces)
                }
                _ => return Ok(None),
            };
            let is_object = is_interface_object || matches!(type_, ExtendedType::Object(_));
            let fields = extract_fields(fields, type_, graph, graphs, join, names, is_object)?;
            // Every field of the type may have been overridden away from this graph.
            if fields.is_empty() {
                return Ok(None);
            }
            let implements_interfaces = if is_interface_object {
                Default::default()
            } else {
                implemented_interfaces(type_, implements_interfaces, graph, join)?
            };
            if is_object {
                ExtendedType::Object(Node::new(ObjectType {
                    description: None,
                    name,
                    implements_interfaces,
                    directives,
                    fields,
                }))
            } else {
                ExtendedType::Interface(Node::new(InterfaceType {
                    description: None,
                    name,
                    implements_interfaces,
                    directives,
                    fields,
                }))
            }
        }
        ExtendedType::Union(union_) => {
            let applications: Vec<_> = type_.directives().get_all(&join.union_member).collect();
            let mut members = IndexSet::default();
            if applications.is_empty() {
                members.extend(union_.members.iter().cloned());
            }
            for application in applications {
                if is_for_graph(application, graph)? {
                    let member =
                        directive_required_string_argument(application, &JOIN_MEMBER_ARGUMENT_NAME)?;
                    members.insert(ComponentName::from(Name::new(member)?));
                }
            }
            ExtendedType::Union(Node::new(UnionType {
                description: None,
                name,
                directives: Default::default(),
                members,
            }))
        }
        ExtendedType::Enum(enum_) => {
            let mut values = IndexMap::default();
            for (value_name, value) in &enum_.values {
                let applications: Vec<_> = value.directives.get_all(&join.enum_value).collect();
                let mut included = applications.is_empty();
                for application in applications {
                    included |= is_for_graph(application, graph)?;
                }
                if included {
                    values.insert(
                        value_name.clone(),
                        Component::new(EnumValueDefinition {
                            description: None,
                            value: value_name.clone(),
                            directives: Default::default(),
                        }),
                    );
                }
            }
            ExtendedType::Enum(Node::new(EnumType {
                description: None,
                name,
                directives: Default::default(),
                values,
            }))
        }
        ExtendedType::InputObject(input) => {
            let mut fields = IndexMap::default();
            for (field_name, field) in &input.fields {
                let Some(join_field) = graph_join_field(&field.directives, graph, join)? else {
                    continue;
                };
                let ty = match join_field.and_then(|application| {
                    directive_optional_string_argument(application, &JOIN_TYPE_ARGUMENT_NAME)
                        .transpose()
                }) {
                    Some(ty) => parse_type(ty?)?,
                    None => field.ty.as_ref().clone(),
                };
                fields.insert(
                    field_name.clone(),
                    Component::new(InputValueDefinition {
                        description: None,
                        name: field_name.clone(),
                        ty: Node::new(ty),
                        default_value: field.default_value.clone(),
                        directives: Default::default(),
                    }),
                );
            }
            ExtendedType::InputObject(Node::new(InputObjectType {
                description: None,
                name,
                directives: Default::default(),
                fields,
            }))
        }
    };
    Ok(Some(extracted))
}

fn implemented_interfaces(
    type_: &ExtendedType,
    all: &IndexSet<ComponentName>,
    graph: &Name,
    join: &JoinNames,
) -> Result<IndexSet<ComponentName>, FederationError> {
    let applications: Vec<_> = type_.directives().get_all(&join.implements).collect();
    if applications.is_empty() {
        return Ok(all.clone());
    }
    let mut implemented = IndexSet::default();
    for application in applications {
        if is_for_graph(application, graph)? {
            let interface =
                directive_required_string_argument(application, &JOIN_INTERFACE_ARGUMENT_NAME)?;
            implemented.insert(ComponentName::from(Name::new(interface)?));
        }
    }
    Ok(implemented)
}

/// The `@join__field` of `graph`. `Some(None)` when the element has no `@join__field` at all,
/// meaning every graph defining the parent type defines it, and `None` when it is not part of
/// `graph`.
fn graph_join_field<'a>(
    directives: &'a ast::DirectiveList,
    graph: &Name,
    join: &JoinNames,
) -> Result<Option<Option<&'a Node<Directive>>>, FederationError> {
    let applications: Vec<_> = directives.get_all(&join.field).collect();
    if applications.is_empty() {
        return Ok(Some(None));
    }
    for application in applications {
        if is_for_graph(application, graph)? {
            return Ok(Some(Some(application)));
        }
    }
    Ok(None)
}

/// How many graphs resolve the field themselves, which decides whether it is extracted as
/// `@shareable`.
fn resolving_graph_count(
    field: &FieldDefinition,
    parent: &ExtendedType,
    graphs: &[GraphInfo],
    join: &JoinNames,
) -> Result<usize, FederationError> {
    let applications: Vec<_> = field.directives.get_all(&join.field).collect();
    if applications.is_empty() {
        let mut count = 0;
        for graph in graphs {
            let mut defines = false;
            for application in parent.directives().get_all(&join.type_) {
                defines |= is_for_graph(application, &graph.value)?;
            }
            count += usize::from(defines);
        }
        return Ok(count);
    }
    let mut count = 0;
    for application in applications {
        let has_graph =
            directive_optional_enum_argument(application, &JOIN_GRAPH_ARGUMENT_NAME)?.is_some();
        let external =
            directive_optional_boolean_argument(application, &JOIN_EXTERNAL_ARGUMENT_NAME)?
                .unwrap_or(false);
        let used_overridden = directive_optional_boolean_argument(
            application,
            &JOIN_USED_OVERRIDDEN_ARGUMENT_NAME,
        )?
        .unwrap_or(false);
        count += usize::from(has_graph && !external && !used_overridden);
    }
    Ok(count)
}

fn extract_fields(
    fields: &IndexMap<Name, Component<FieldDefinition>>,
    parent: &ExtendedType,
    graph: &Name,
    graphs: &[GraphInfo],
    join: &JoinNames,
    names: &FederationDirectiveNames,
    is_object: bool,
) -> Result<IndexMap<Name, Component<FieldDefinition>>, FederationError> {
    let mut extracted = IndexMap::default();
    for (field_name, field) in fields {
        let Some(join_field) = graph_join_field(&field.directives, graph, join)? else {
            continue;
        };
        let mut ty = field.ty.clone();
        let mut directives = ast::DirectiveList::default();
        let mut is_external = false;
        if let Some(application) = join_field {
            if let Some(type_string) =
                directive_optional_string_argument(application, &JOIN_TYPE_ARGUMENT_NAME)?
            {
                ty = parse_type(type_string)?;
            }
            is_external =
                directive_optional_boolean_argument(application, &JOIN_EXTERNAL_ARGUMENT_NAME)?
                    .unwrap_or(false)
                    || directive_optional_boolean_argument(
                        application,
                        &JOIN_USED_OVERRIDDEN_ARGUMENT_NAME,
                    )?
                    .unwrap_or(false);
            if is_external {
                directives.push(Node::new(external_directive(names)));
            }
            if let Some(requires) =
                directive_optional_string_argument(application, &JOIN_REQUIRES_ARGUMENT_NAME)?
            {
                directives.push(Node::new(requires_directive(names, requires)));
            }
            if let Some(provides) =
                directive_optional_string_argument(application, &JOIN_PROVIDES_ARGUMENT_NAME)?
            {
                directives.push(Node::new(provides_directive(names, provides)));
            }
            if let Some(from) =
                directive_optional_string_argument(application, &JOIN_OVERRIDE_ARGUMENT_NAME)?
            {
                let label = directive_optional_string_argument(
                    application,
                    &JOIN_OVERRIDE_LABEL_ARGUMENT_NAME,
                )?;
                directives.push(Node::new(override_directive(names, from, label)));
            }
        }
        if is_object
            && !is_external
            && resolving_graph_count(field, parent, graphs, join)? > 1
        {
            directives.push(Node::new(shareable_directive(names)));
        }
        let arguments = field
            .arguments
            .iter()
            .map(|argument| {
                Node::new(InputValueDefinition {
                    description: None,
                    name: argument.name.clone(),
                    ty: argument.ty.clone(),
                    default_value: argument.default_value.clone(),
                    directives: Default::default(),
                })
            })
            .collect();
        extracted.insert(
            field_name.clone(),
            Component::new(FieldDefinition {
                description: None,
                name: field_name.clone(),
                arguments,
                ty,
                directives,
            }),
        );
    }
    Ok(extracted)
}

/// Parses a type reference as written in `@join__field(type:)`, like `[Int!]!`.
fn parse_type(source: &str) -> Result<Type, FederationError> {
    let source = source.trim();
    if let Some(inner) = source.strip_suffix('!') {
        return Ok(parse_type(inner)?.non_null());
    }
    if let Some(inner) = source
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        return Ok(parse_type(inner)?.list());
    }
    Ok(Type::Named(Name::new(source)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_type_references() {
        assert_eq!(parse_type("Int").unwrap().to_string(), "Int");
        assert_eq!(parse_type("[Int!]!").unwrap().to_string(), "[Int!]!");
        assert_eq!(parse_type("[[String]!]").unwrap().to_string(), "[[String]!]");
        assert!(parse_type("[Int").is_err());
    }
}
