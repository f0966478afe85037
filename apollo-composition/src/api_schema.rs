//! Implements API schema generation.
//!
//! The API schema of a supergraph is what its clients see: the supergraph without the elements
//! of the features it links (`join`, `link`, and every composed feature) and without the
//! elements marked `@inaccessible`.

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::ast::Value;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::name;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::ComponentName;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::FieldDefinition;
use apollo_compiler::schema::InputValueDefinition;
use apollo_compiler::validation::Valid;
use tracing::debug;

use crate::error::CompositionError;
use crate::error::ErrorCode;
use crate::error::FederationError;
use crate::link::LinksMetadata;
use crate::link::spec::Identity;

pub(crate) fn to_api_schema(
    supergraph: &Valid<Schema>,
) -> Result<Valid<Schema>, Vec<CompositionError>> {
    let links = LinksMetadata::from_schema(supergraph)
        .map_err(|error| vec![CompositionError::from(FederationError::from(error))])?
        .unwrap_or_default();
    let inaccessible = Inaccessible::new(supergraph, &links);

    let errors = validate_inaccessible(supergraph, &inaccessible);
    if !errors.is_empty() {
        return Err(errors);
    }

    let mut api_schema = supergraph.clone().into_inner();
    remove_inaccessible_elements(&mut api_schema, &inaccessible);
    remove_core_feature_elements(&mut api_schema, &links);

    let api_schema = api_schema.validate().map_err(|with_errors| {
        with_errors
            .errors
            .iter()
            .map(|diagnostic| {
                ErrorCode::InvalidGraphql.err(
                    format!("[API schema] {}", diagnostic.error),
                    vec![],
                )
            })
            .collect::<Vec<_>>()
    })?;
    debug!(types = api_schema.types.len(), "derived API schema");
    Ok(api_schema)
}

/// Answers whether supergraph elements are `@inaccessible`, under the name the supergraph gives
/// to that directive.
struct Inaccessible {
    name: Option<Name>,
    types: IndexSet<Name>,
}

impl Inaccessible {
    fn new(schema: &Schema, links: &LinksMetadata) -> Self {
        let name = links
            .for_identity(&Identity::inaccessible_identity())
            .map(|link| link.directive_name_in_schema(&name!("inaccessible")));
        let types = match &name {
            Some(name) => schema
                .types
                .iter()
                .filter(|(_, type_)| type_.directives().has(name))
                .map(|(type_name, _)| type_name.clone())
                .collect(),
            None => Default::default(),
        };
        Self { name, types }
    }

    fn has(&self, directives: &ast::DirectiveList) -> bool {
        self.name
            .as_ref()
            .is_some_and(|name| directives.has(name))
    }

    fn is_type(&self, name: &Name) -> bool {
        self.types.contains(name)
    }
}

fn is_required(input: &InputValueDefinition) -> bool {
    input.ty.is_non_null() && input.default_value.is_none()
}

fn validate_inaccessible(schema: &Schema, inaccessible: &Inaccessible) -> Vec<CompositionError> {
    let mut errors = vec![];
    if inaccessible.name.is_none() {
        return errors;
    }
    let mut error = |code: ErrorCode, message: String| errors.push(code.err(message, vec![]));

    if let Some(query) = &schema.schema_definition.query
        && inaccessible.is_type(&query.name)
    {
        error(
            ErrorCode::QueryRootTypeInaccessible,
            format!(
                "Type `{}` is @inaccessible but is the root query type, which must be in the API schema.",
                query.name
            ),
        );
    }

    for (type_name, type_) in &schema.types {
        if type_.is_built_in() || inaccessible.is_type(type_name) {
            continue;
        }
        match type_ {
            ExtendedType::Object(_) | ExtendedType::Interface(_) => {
                let (fields, implements) = match type_ {
                    ExtendedType::Object(object) => {
                        (&object.fields, &object.implements_interfaces)
                    }
                    ExtendedType::Interface(interface) => {
                        (&interface.fields, &interface.implements_interfaces)
                    }
                    _ => continue,
                };
                let mut has_accessible_field = false;
                for (field_name, field) in fields {
                    let coordinate = format!("{type_name}.{field_name}");
                    if inaccessible.has(&field.directives) {
                        for interface in implements {
                            if inaccessible.is_type(&interface.name) {
                                continue;
                            }
                            if let Some(interface_field) =
                                interface_field(schema, &interface.name, field_name)
                                && !inaccessible.has(&interface_field.directives)
                            {
                                error(
                                    ErrorCode::ImplementedByInaccessible,
                                    format!(
                                        "Field `{coordinate}` is @inaccessible but implements the interface field `{}.{field_name}`, which is in the API schema.",
                                        interface.name
                                    ),
                                );
                            }
                        }
                        continue;
                    }
                    has_accessible_field = true;
                    check_reference(&mut error, inaccessible, field.ty.inner_named_type(), &coordinate);
                    for argument in &field.arguments {
                        let argument_coordinate = format!("{coordinate}({}:)", argument.name);
                        check_input_value(
                            &mut error,
                            schema,
                            inaccessible,
                            argument,
                            &argument_coordinate,
                            "Argument",
                            "argument of its field",
                        );
                    }
                }
                if !has_accessible_field {
                    error(
                        ErrorCode::OnlyInaccessibleChildren,
                        format!(
                            "Type `{type_name}` is in the API schema but all of its fields are @inaccessible."
                        ),
                    );
                }
            }
            ExtendedType::Union(union_) => {
                if !union_.members.is_empty()
                    && union_
                        .members
                        .iter()
                        .all(|member| inaccessible.is_type(&member.name))
                {
                    error(
                        ErrorCode::OnlyInaccessibleChildren,
                        format!(
                            "Type `{type_name}` is in the API schema but all of its members are @inaccessible."
                        ),
                    );
                }
            }
            ExtendedType::Enum(enum_) => {
                if enum_
                    .values
                    .values()
                    .all(|value| inaccessible.has(&value.directives))
                {
                    error(
                        ErrorCode::OnlyInaccessibleChildren,
                        format!(
                            "Type `{type_name}` is in the API schema but all of its values are @inaccessible."
                        ),
                    );
                }
            }
            ExtendedType::InputObject(input) => {
                let mut has_accessible_field = false;
                for (field_name, field) in &input.fields {
                    let coordinate = format!("{type_name}.{field_name}");
                    has_accessible_field |= !inaccessible.has(&field.directives);
                    check_input_value(
                        &mut error,
                        schema,
                        inaccessible,
                        field,
                        &coordinate,
                        "Input field",
                        "input field of its type",
                    );
                }
                if !has_accessible_field {
                    error(
                        ErrorCode::OnlyInaccessibleChildren,
                        format!(
                            "Type `{type_name}` is in the API schema but all of its input fields are @inaccessible."
                        ),
                    );
                }
            }
            ExtendedType::Scalar(_) => {}
        }
    }
    errors
}

fn interface_field<'schema>(
    schema: &'schema Schema,
    interface: &Name,
    field_name: &Name,
) -> Option<&'schema Component<FieldDefinition>> {
    match schema.types.get(interface)? {
        ExtendedType::Interface(interface) => interface.fields.get(field_name),
        _ => None,
    }
}

fn check_reference(
    error: &mut impl FnMut(ErrorCode, String),
    inaccessible: &Inaccessible,
    type_name: &Name,
    coordinate: &str,
) {
    if inaccessible.is_type(type_name) {
        error(
            ErrorCode::ReferencedInaccessible,
            format!(
                "Type `{type_name}` is @inaccessible but is referenced by `{coordinate}`, which is in the API schema."
            ),
        );
    }
}

/// Checks an argument or input field: an inaccessible one must be optional, and an accessible
/// one must neither have an inaccessible type nor use inaccessible enum values by default.
fn check_input_value(
    error: &mut impl FnMut(ErrorCode, String),
    schema: &Schema,
    inaccessible: &Inaccessible,
    input: &InputValueDefinition,
    coordinate: &str,
    kind: &str,
    required_description: &str,
) {
    if inaccessible.has(&input.directives) {
        if is_required(input) {
            error(
                ErrorCode::RequiredInaccessible,
                format!(
                    "{kind} `{coordinate}` is @inaccessible but is a required {required_description}."
                ),
            );
        }
        return;
    }
    check_reference(error, inaccessible, input.ty.inner_named_type(), coordinate);
    let (Some(default_value), Some(ExtendedType::Enum(enum_))) = (
        &input.default_value,
        schema.types.get(input.ty.inner_named_type()),
    ) else {
        return;
    };
    let mut used = vec![];
    enum_values_in(default_value, &mut used);
    for value in used {
        if enum_
            .values
            .get(&value)
            .is_some_and(|definition| inaccessible.has(&definition.directives))
        {
            error(
                ErrorCode::DefaultValueUsesInaccessible,
                format!(
                    "Enum value `{}.{value}` is @inaccessible but is used in the default value of `{coordinate}`, which is in the API schema.",
                    enum_.name
                ),
            );
        }
    }
}

fn enum_values_in(value: &Value, values: &mut Vec<Name>) {
    match value {
        Value::Enum(name) => values.push(name.clone()),
        Value::List(items) => items.iter().for_each(|item| enum_values_in(item, values)),
        _ => {}
    }
}

fn remove_inaccessible_elements(schema: &mut Schema, inaccessible: &Inaccessible) {
    if inaccessible.name.is_none() {
        return;
    }
    for type_name in &inaccessible.types {
        schema.types.shift_remove(type_name);
    }
    let definition = schema.schema_definition.make_mut();
    for root in [&mut definition.mutation, &mut definition.subscription] {
        if root
            .as_ref()
            .is_some_and(|root| inaccessible.is_type(&root.name))
        {
            *root = None;
        }
    }

    let retain_fields =
        |fields: &mut IndexMap<Name, Component<FieldDefinition>>| {
            fields.retain(|_, field| !inaccessible.has(&field.directives));
            for field in fields.values_mut() {
                field
                    .make_mut()
                    .arguments
                    .retain(|argument| !inaccessible.has(&argument.directives));
            }
        };
    let retain_interfaces = |interfaces: &mut IndexSet<ComponentName>| {
        interfaces.retain(|interface| !inaccessible.is_type(&interface.name));
    };
    for type_ in schema.types.values_mut() {
        match type_ {
            ExtendedType::Object(object) => {
                let object = object.make_mut();
                retain_fields(&mut object.fields);
                retain_interfaces(&mut object.implements_interfaces);
            }
            ExtendedType::Interface(interface) => {
                let interface = interface.make_mut();
                retain_fields(&mut interface.fields);
                retain_interfaces(&mut interface.implements_interfaces);
            }
            ExtendedType::Union(union_) => {
                union_
                    .make_mut()
                    .members
                    .retain(|member| !inaccessible.is_type(&member.name));
            }
            ExtendedType::Enum(enum_) => {
                enum_
                    .make_mut()
                    .values
                    .retain(|_, value| !inaccessible.has(&value.directives));
            }
            ExtendedType::InputObject(input) => {
                input
                    .make_mut()
                    .fields
                    .retain(|_, field| !inaccessible.has(&field.directives));
            }
            ExtendedType::Scalar(_) => {}
        }
    }
    for definition in schema.directive_definitions.values_mut() {
        definition
            .make_mut()
            .arguments
            .retain(|argument| !inaccessible.has(&argument.directives));
    }
}

/// Removes the types and directives of linked features, and their applications.
fn remove_core_feature_elements(schema: &mut Schema, links: &LinksMetadata) {
    schema
        .types
        .retain(|name, _| links.source_link_of_type(name).is_none());
    schema
        .directive_definitions
        .retain(|name, _| links.source_link_of_directive(name).is_none());
    schema.schema_definition.make_mut().directives.clear();

    let is_kept = |directive: &Node<ast::Directive>| {
        links.source_link_of_directive(&directive.name).is_none()
    };
    let retain_field_directives = |field: &mut Component<FieldDefinition>| {
        let field = field.make_mut();
        field.directives.retain(is_kept);
        for argument in field.arguments.iter_mut() {
            argument.make_mut().directives.retain(is_kept);
        }
    };
    for type_ in schema.types.values_mut() {
        match type_ {
            ExtendedType::Scalar(scalar) => {
                scalar
                    .make_mut()
                    .directives
                    .retain(|directive| is_kept(&directive.node));
            }
            ExtendedType::Object(object) => {
                let object = object.make_mut();
                object.directives.retain(|directive| is_kept(&directive.node));
                object.fields.values_mut().for_each(retain_field_directives);
            }
            ExtendedType::Interface(interface) => {
                let interface = interface.make_mut();
                interface
                    .directives
                    .retain(|directive| is_kept(&directive.node));
                interface.fields.values_mut().for_each(retain_field_directives);
            }
            ExtendedType::Union(union_) => {
                union_
                    .make_mut()
                    .directives
                    .retain(|directive| is_kept(&directive.node));
            }
            ExtendedType::Enum(enum_) => {
                let enum_ = enum_.make_mut();
                enum_.directives.retain(|directive| is_kept(&directive.node));
                for value in enum_.values.values_mut() {
                    value.make_mut().directives.retain(is_kept);
                }
            }
            ExtendedType::InputObject(input) => {
                let input = input.make_mut();
                input.directives.retain(|directive| is_kept(&directive.node));
                for field in input.fields.values_mut() {
                    field.make_mut().directives.retain(is_kept);
                }
            }
        }
    }
}
