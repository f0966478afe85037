use std::fmt;
use std::ops::Range;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::parser::SourceMap;
use apollo_compiler::ast::Directive;
use apollo_compiler::ast::OperationType;
use apollo_compiler::ast::Type;
use apollo_compiler::ast::Value;
use apollo_compiler::parser::LineColumn;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::DirectiveDefinition;
use apollo_compiler::schema::EnumValueDefinition;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::FieldDefinition;
use apollo_compiler::schema::InputValueDefinition;
use apollo_compiler::schema::SchemaDefinition;

use crate::error::FederationError;
use crate::internal_error;
use crate::merger::error_reporter::SourceLocated;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::EnumIter)]
pub(crate) enum SchemaRootDefinitionKind {
    #[strum(to_string = "query")]
    Query,
    #[strum(to_string = "mutation")]
    Mutation,
    #[strum(to_string = "subscription")]
    Subscription,
}

impl From<SchemaRootDefinitionKind> for OperationType {
    fn from(value: SchemaRootDefinitionKind) -> Self {
        match value {
            SchemaRootDefinitionKind::Query => OperationType::Query,
            SchemaRootDefinitionKind::Mutation => OperationType::Mutation,
            SchemaRootDefinitionKind::Subscription => OperationType::Subscription,
        }
    }
}

impl From<OperationType> for SchemaRootDefinitionKind {
    fn from(value: OperationType) -> Self {
        match value {
            OperationType::Query => SchemaRootDefinitionKind::Query,
            OperationType::Mutation => SchemaRootDefinitionKind::Mutation,
            OperationType::Subscription => SchemaRootDefinitionKind::Subscription,
        }
    }
}

/// A schema coordinate, identifying an element that can carry applied directives and a
/// description. Used to address elements across subgraphs and the supergraph, and to name them
/// in diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum SchemaElementPosition {
    Schema,
    Type(Name),
    /// A field of an object or interface type, or of an input object type.
    Field { type_name: Name, field_name: Name },
    FieldArgument {
        type_name: Name,
        field_name: Name,
        argument_name: Name,
    },
    EnumValue { type_name: Name, value: Name },
    Directive(Name),
    DirectiveArgument {
        directive_name: Name,
        argument_name: Name,
    },
}

impl SchemaElementPosition {
    pub(crate) fn field(type_name: &Name, field_name: &Name) -> Self {
        Self::Field {
            type_name: type_name.clone(),
            field_name: field_name.clone(),
        }
    }

    /// The name of the type this element belongs to, if any.
    pub(crate) fn type_name(&self) -> Option<&Name> {
        match self {
            Self::Type(type_name)
            | Self::Field { type_name, .. }
            | Self::FieldArgument { type_name, .. }
            | Self::EnumValue { type_name, .. } => Some(type_name),
            Self::Schema | Self::Directive(_) | Self::DirectiveArgument { .. } => None,
        }
    }
}

impl SchemaElementPosition {
    pub(crate) fn lookup(&self, schema: &Schema) -> Option<SchemaElement> {
        match self {
            Self::Schema => Some(SchemaElement::Schema(schema.schema_definition.clone())),
            Self::Type(name) => schema.types.get(name).cloned().map(SchemaElement::Type),
            Self::Field {
                type_name,
                field_name,
            } => match schema.types.get(type_name)? {
                ExtendedType::Object(object) => {
                    object.fields.get(field_name).cloned().map(SchemaElement::Field)
                }
                ExtendedType::Interface(interface) => interface
                    .fields
                    .get(field_name)
                    .cloned()
                    .map(SchemaElement::Field),
                ExtendedType::InputObject(input) => input
                    .fields
                    .get(field_name)
                    .cloned()
                    .map(SchemaElement::InputField),
                _ => None,
            },
            Self::FieldArgument {
                type_name,
                field_name,
                argument_name,
            } => {
                let field = match schema.types.get(type_name)? {
                    ExtendedType::Object(object) => object.fields.get(field_name)?,
                    ExtendedType::Interface(interface) => interface.fields.get(field_name)?,
                    _ => return None,
                };
                field
                    .arguments
                    .iter()
                    .find(|argument| argument.name == *argument_name)
                    .cloned()
                    .map(SchemaElement::Argument)
            }
            Self::EnumValue { type_name, value } => match schema.types.get(type_name)? {
                ExtendedType::Enum(enum_) => {
                    enum_.values.get(value).cloned().map(SchemaElement::EnumValue)
                }
                _ => None,
            },
            Self::Directive(name) => schema
                .directive_definitions
                .get(name)
                .cloned()
                .map(SchemaElement::Directive),
            Self::DirectiveArgument {
                directive_name,
                argument_name,
            } => schema
                .directive_definitions
                .get(directive_name)?
                .arguments
                .iter()
                .find(|argument| argument.name == *argument_name)
                .cloned()
                .map(SchemaElement::Argument),
        }
    }

    fn element_mut<'schema>(&self, schema: &'schema mut Schema) -> Option<ElementMut<'schema>> {
        match self {
            Self::Schema => Some(ElementMut::Schema(schema.schema_definition.make_mut())),
            Self::Type(name) => schema.types.get_mut(name).map(ElementMut::Type),
            Self::Field {
                type_name,
                field_name,
            } => match schema.types.get_mut(type_name)? {
                ExtendedType::Object(object) => Some(ElementMut::Field(
                    object.make_mut().fields.get_mut(field_name)?.make_mut(),
                )),
                ExtendedType::Interface(interface) => Some(ElementMut::Field(
                    interface.make_mut().fields.get_mut(field_name)?.make_mut(),
                )),
                ExtendedType::InputObject(input) => Some(ElementMut::InputValue(
                    input.make_mut().fields.get_mut(field_name)?.make_mut(),
                )),
                _ => None,
            },
            Self::FieldArgument {
                type_name,
                field_name,
                argument_name,
            } => {
                let field = match schema.types.get_mut(type_name)? {
                    ExtendedType::Object(object) => {
                        object.make_mut().fields.get_mut(field_name)?.make_mut()
                    }
                    ExtendedType::Interface(interface) => {
                        interface.make_mut().fields.get_mut(field_name)?.make_mut()
                    }
                    _ => return None,
                };
                field
                    .arguments
                    .iter_mut()
                    .find(|argument| argument.name == *argument_name)
                    .map(|argument| ElementMut::InputValue(argument.make_mut()))
            }
            Self::EnumValue { type_name, value } => match schema.types.get_mut(type_name)? {
                ExtendedType::Enum(enum_) => Some(ElementMut::EnumValue(
                    enum_.make_mut().values.get_mut(value)?.make_mut(),
                )),
                _ => None,
            },
            Self::Directive(name) => schema
                .directive_definitions
                .get_mut(name)
                .map(|definition| ElementMut::Directive(definition.make_mut())),
            Self::DirectiveArgument {
                directive_name,
                argument_name,
            } => schema
                .directive_definitions
                .get_mut(directive_name)?
                .make_mut()
                .arguments
                .iter_mut()
                .find(|argument| argument.name == *argument_name)
                .map(|argument| ElementMut::InputValue(argument.make_mut())),
        }
    }

    pub(crate) fn set_description(
        &self,
        schema: &mut Schema,
        description: Option<Node<str>>,
    ) -> Result<(), FederationError> {
        match self
            .element_mut(schema)
            .ok_or_else(|| internal_error!("Cannot find \"{self}\" in the supergraph"))?
        {
            ElementMut::Schema(definition) => definition.description = description,
            ElementMut::Type(type_) => match type_ {
                ExtendedType::Scalar(t) => t.make_mut().description = description,
                ExtendedType::Object(t) => t.make_mut().description = description,
                ExtendedType::Interface(t) => t.make_mut().description = description,
                ExtendedType::Union(t) => t.make_mut().description = description,
                ExtendedType::Enum(t) => t.make_mut().description = description,
                ExtendedType::InputObject(t) => t.make_mut().description = description,
            },
            ElementMut::Field(field) => field.description = description,
            ElementMut::InputValue(value) => value.description = description,
            ElementMut::EnumValue(value) => value.description = description,
            ElementMut::Directive(definition) => definition.description = description,
        }
        Ok(())
    }

    pub(crate) fn insert_directive(
        &self,
        schema: &mut Schema,
        directive: Directive,
    ) -> Result<(), FederationError> {
        match self
            .element_mut(schema)
            .ok_or_else(|| internal_error!("Cannot find \"{self}\" in the supergraph"))?
        {
            ElementMut::Schema(definition) => {
                definition.directives.push(Component::new(directive))
            }
            ElementMut::Type(type_) => match type_ {
                ExtendedType::Scalar(t) => t.make_mut().directives.push(Component::new(directive)),
                ExtendedType::Object(t) => t.make_mut().directives.push(Component::new(directive)),
                ExtendedType::Interface(t) => {
                    t.make_mut().directives.push(Component::new(directive))
                }
                ExtendedType::Union(t) => t.make_mut().directives.push(Component::new(directive)),
                ExtendedType::Enum(t) => t.make_mut().directives.push(Component::new(directive)),
                ExtendedType::InputObject(t) => {
                    t.make_mut().directives.push(Component::new(directive))
                }
            },
            ElementMut::Field(field) => field.directives.push(Node::new(directive)),
            ElementMut::InputValue(value) => value.directives.push(Node::new(directive)),
            ElementMut::EnumValue(value) => value.directives.push(Node::new(directive)),
            ElementMut::Directive(_) => {
                return Err(internal_error!("Cannot apply directives to \"{self}\""));
            }
        }
        Ok(())
    }
}

impl SchemaElementPosition {
    /// The position of an argument of this field or directive definition.
    pub(crate) fn argument(&self, argument_name: &Name) -> Option<Self> {
        match self {
            Self::Field {
                type_name,
                field_name,
            } => Some(Self::FieldArgument {
                type_name: type_name.clone(),
                field_name: field_name.clone(),
                argument_name: argument_name.clone(),
            }),
            Self::Directive(directive_name) => Some(Self::DirectiveArgument {
                directive_name: directive_name.clone(),
                argument_name: argument_name.clone(),
            }),
            _ => None,
        }
    }

    pub(crate) fn set_type(&self, schema: &mut Schema, ty: Type) -> Result<(), FederationError> {
        match self.element_mut(schema) {
            Some(ElementMut::Field(field)) => field.ty = ty,
            Some(ElementMut::InputValue(value)) => value.ty = Node::new(ty),
            _ => return Err(internal_error!("Cannot set the type of \"{self}\"")),
        }
        Ok(())
    }

    pub(crate) fn set_default_value(
        &self,
        schema: &mut Schema,
        default_value: Option<Node<Value>>,
    ) -> Result<(), FederationError> {
        match self.element_mut(schema) {
            Some(ElementMut::InputValue(value)) => value.default_value = default_value,
            _ => return Err(internal_error!("Cannot set the default value of \"{self}\"")),
        }
        Ok(())
    }

    /// Appends an argument to this field or directive definition.
    pub(crate) fn insert_argument(
        &self,
        schema: &mut Schema,
        argument: Node<InputValueDefinition>,
    ) -> Result<(), FederationError> {
        match self.element_mut(schema) {
            Some(ElementMut::Field(field)) => field.arguments.push(argument),
            Some(ElementMut::Directive(definition)) => definition.arguments.push(argument),
            _ => return Err(internal_error!("Cannot add arguments to \"{self}\"")),
        }
        Ok(())
    }
}

enum ElementMut<'schema> {
    Schema(&'schema mut SchemaDefinition),
    Type(&'schema mut ExtendedType),
    Field(&'schema mut FieldDefinition),
    InputValue(&'schema mut InputValueDefinition),
    EnumValue(&'schema mut EnumValueDefinition),
    Directive(&'schema mut DirectiveDefinition),
}

/// The element found at a [`SchemaElementPosition`]. Clones are cheap.
#[derive(Clone, Debug)]
pub(crate) enum SchemaElement {
    Schema(Node<SchemaDefinition>),
    Type(ExtendedType),
    Field(Component<FieldDefinition>),
    InputField(Component<InputValueDefinition>),
    Argument(Node<InputValueDefinition>),
    EnumValue(Component<EnumValueDefinition>),
    Directive(Node<DirectiveDefinition>),
}

impl SchemaElement {
    pub(crate) fn description(&self) -> Option<&str> {
        match self {
            Self::Schema(definition) => definition.description.as_deref(),
            Self::Type(type_) => type_.description().map(|d| &**d),
            Self::Field(field) => field.description.as_deref(),
            Self::InputField(field) => field.description.as_deref(),
            Self::Argument(argument) => argument.description.as_deref(),
            Self::EnumValue(value) => value.description.as_deref(),
            Self::Directive(definition) => definition.description.as_deref(),
        }
    }

    /// The directives applied to the element, in application order.
    pub(crate) fn directives(&self) -> Vec<Node<Directive>> {
        match self {
            Self::Schema(definition) => definition
                .directives
                .iter()
                .map(|d| d.node.clone())
                .collect(),
            Self::Type(type_) => type_.directives().iter().map(|d| d.node.clone()).collect(),
            Self::Field(field) => field.directives.iter().cloned().collect(),
            Self::InputField(field) => field.directives.iter().cloned().collect(),
            Self::Argument(argument) => argument.directives.iter().cloned().collect(),
            Self::EnumValue(value) => value.directives.iter().cloned().collect(),
            Self::Directive(_) => vec![],
        }
    }
}

impl SourceLocated for SchemaElement {
    fn source_range(&self, sources: &SourceMap) -> Option<Range<LineColumn>> {
        match self {
            Self::Schema(definition) => definition.source_range(sources),
            Self::Type(type_) => type_.source_range(sources),
            Self::Field(field) => field.source_range(sources),
            Self::InputField(field) => field.source_range(sources),
            Self::Argument(argument) => argument.source_range(sources),
            Self::EnumValue(value) => value.source_range(sources),
            Self::Directive(definition) => definition.source_range(sources),
        }
    }
}

impl fmt::Display for SchemaElementPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema => f.write_str("schema"),
            Self::Type(name) => write!(f, "{name}"),
            Self::Field {
                type_name,
                field_name,
            } => write!(f, "{type_name}.{field_name}"),
            Self::FieldArgument {
                type_name,
                field_name,
                argument_name,
            } => write!(f, "{type_name}.{field_name}({argument_name}:)"),
            Self::EnumValue { type_name, value } => write!(f, "{type_name}.{value}"),
            Self::Directive(name) => write!(f, "@{name}"),
            Self::DirectiveArgument {
                directive_name,
                argument_name,
            } => write!(f, "@{directive_name}({argument_name}:)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use apollo_compiler::name;

    use super::*;

    #[test]
    fn displays_coordinates() {
        let argument = SchemaElementPosition::FieldArgument {
            type_name: name!("T"),
            field_name: name!("f"),
            argument_name: name!("a"),
        };
        assert_eq!(argument.to_string(), "T.f(a:)");
        assert_eq!(
            SchemaElementPosition::DirectiveArgument {
                directive_name: name!("d"),
                argument_name: name!("x"),
            }
            .to_string(),
            "@d(x:)"
        );
        assert_eq!(argument.type_name(), Some(&name!("T")));
    }
}
