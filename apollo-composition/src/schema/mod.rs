//! Helpers over [`apollo_compiler::Schema`] shared by subgraph preparation, the merger and the
//! query graph builders.
use apollo_compiler::Name;
use apollo_compiler::Schema;
use apollo_compiler::ast::Directive;
use apollo_compiler::ast::Value;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::schema::ExtendedType;

use crate::error::FederationError;
use crate::internal_error;

pub mod argument_composition_strategies;
pub(crate) mod field_set;
pub(crate) mod position;
pub(crate) mod subgraph_metadata;

pub(crate) fn directive_optional_string_argument<'doc>(
    application: &'doc Directive,
    name: &Name,
) -> Result<Option<&'doc str>, FederationError> {
    match application.specified_argument_by_name(name) {
        Some(value) => match value.as_ref() {
            Value::String(s) => Ok(Some(s.as_str())),
            Value::Null => Ok(None),
            _ => Err(internal_error!(
                "Argument \"{name}\" of directive \"@{}\" must be a string.",
                application.name
            )),
        },
        None => Ok(None),
    }
}

pub(crate) fn directive_required_string_argument<'doc>(
    application: &'doc Directive,
    name: &Name,
) -> Result<&'doc str, FederationError> {
    directive_optional_string_argument(application, name)?.ok_or_else(|| {
        internal_error!(
            "Required argument \"{name}\" of directive \"@{}\" was not present.",
            application.name
        )
    })
}

pub(crate) fn directive_optional_boolean_argument(
    application: &Directive,
    name: &Name,
) -> Result<Option<bool>, FederationError> {
    match application.specified_argument_by_name(name) {
        Some(value) => match value.as_ref() {
            Value::Boolean(b) => Ok(Some(*b)),
            Value::Null => Ok(None),
            _ => Err(internal_error!(
                "Argument \"{name}\" of directive \"@{}\" must be a boolean.",
                application.name
            )),
        },
        None => Ok(None),
    }
}

pub(crate) fn directive_optional_enum_argument(
    application: &Directive,
    name: &Name,
) -> Result<Option<Name>, FederationError> {
    match application.specified_argument_by_name(name) {
        Some(value) => match value.as_ref() {
            Value::Enum(e) => Ok(Some(e.clone())),
            Value::Null => Ok(None),
            _ => Err(internal_error!(
                "Argument \"{name}\" of directive \"@{}\" must be an enum value.",
                application.name
            )),
        },
        None => Ok(None),
    }
}

pub(crate) fn directive_required_enum_argument(
    application: &Directive,
    name: &Name,
) -> Result<Name, FederationError> {
    directive_optional_enum_argument(application, name)?.ok_or_else(|| {
        internal_error!(
            "Required argument \"{name}\" of directive \"@{}\" was not present.",
            application.name
        )
    })
}

/// The human readable kind of a type, as used in diagnostics.
pub(crate) fn type_kind_description(type_: &ExtendedType) -> &'static str {
    match type_ {
        ExtendedType::Scalar(_) => "Scalar Type",
        ExtendedType::Object(_) => "Object Type",
        ExtendedType::Interface(_) => "Interface Type",
        ExtendedType::Union(_) => "Union Type",
        ExtendedType::Enum(_) => "Enum Type",
        ExtendedType::InputObject(_) => "Input Object Type",
    }
}

/// The object types a value of the given composite type can have at runtime.
pub(crate) fn possible_runtime_types(schema: &Schema, type_name: &Name) -> IndexSet<Name> {
    match schema.types.get(type_name) {
        Some(ExtendedType::Object(_)) => std::iter::once(type_name.clone()).collect(),
        Some(ExtendedType::Interface(_)) => schema
            .types
            .iter()
            .filter_map(|(name, ty)| match ty {
                ExtendedType::Object(object)
                    if object.implements_interfaces.contains(type_name) =>
                {
                    Some(name.clone())
                }
                _ => None,
            })
            .collect(),
        Some(ExtendedType::Union(union_)) => {
            union_.members.iter().map(|m| m.name.clone()).collect()
        }
        _ => Default::default(),
    }
}

/// Types (objects and interfaces) implementing the given interface.
pub(crate) fn interface_implementations(schema: &Schema, interface: &Name) -> IndexSet<Name> {
    schema
        .types
        .iter()
        .filter_map(|(name, ty)| {
            let implements = match ty {
                ExtendedType::Object(o) => &o.implements_interfaces,
                ExtendedType::Interface(i) => &i.implements_interfaces,
                _ => return None,
            };
            implements.contains(interface).then(|| name.clone())
        })
        .collect()
}

pub(crate) fn is_composite_type(schema: &Schema, type_name: &str) -> bool {
    matches!(
        schema.types.get(type_name),
        Some(ExtendedType::Object(_) | ExtendedType::Interface(_) | ExtendedType::Union(_))
    )
}

pub(crate) fn is_abstract_type(schema: &Schema, type_name: &str) -> bool {
    matches!(
        schema.types.get(type_name),
        Some(ExtendedType::Interface(_) | ExtendedType::Union(_))
    )
}

/// The names of every directive applied somewhere in the schema.
pub(crate) fn applied_directive_names(schema: &Schema) -> IndexSet<Name> {
    let mut names: IndexSet<Name> = schema
        .schema_definition
        .directives
        .iter()
        .map(|d| d.name.clone())
        .collect();
    let mut add_all = |directives: &apollo_compiler::ast::DirectiveList| {
        names.extend(directives.iter().map(|d| d.name.clone()));
    };
    let mut type_names = IndexSet::default();
    for type_ in schema.types.values() {
        if type_.is_built_in() {
            continue;
        }
        type_names.extend(type_.directives().iter().map(|d| d.name.clone()));
        match type_ {
            ExtendedType::Object(object) => {
                for field in object.fields.values() {
                    add_all(&field.directives);
                    field.arguments.iter().for_each(|arg| add_all(&arg.directives));
                }
            }
            ExtendedType::Interface(interface) => {
                for field in interface.fields.values() {
                    add_all(&field.directives);
                    field.arguments.iter().for_each(|arg| add_all(&arg.directives));
                }
            }
            ExtendedType::Enum(enum_) => {
                enum_.values.values().for_each(|value| add_all(&value.directives));
            }
            ExtendedType::InputObject(input) => {
                input.fields.values().for_each(|field| add_all(&field.directives));
            }
            ExtendedType::Scalar(_) | ExtendedType::Union(_) => {}
        }
    }
    names.extend(type_names);
    names
}

#[cfg(test)]
mod tests {
    use apollo_compiler::name;

    use super::*;

    #[test]
    fn computes_possible_runtime_types() {
        let schema = Schema::parse(
            r#"
            type Query { i: I u: U }
            interface I { x: Int }
            type A implements I { x: Int }
            type B implements I { x: Int }
            type C { y: Int }
            union U = A | C
            "#,
            "schema.graphql",
        )
        .unwrap();
        let names = |set: IndexSet<Name>| set.into_iter().map(|n| n.to_string()).collect::<Vec<_>>();
        assert_eq!(names(possible_runtime_types(&schema, &name!("I"))), ["A", "B"]);
        assert_eq!(names(possible_runtime_types(&schema, &name!("U"))), ["A", "C"]);
        assert_eq!(names(possible_runtime_types(&schema, &name!("C"))), ["C"]);
        assert!(is_abstract_type(&schema, "U"));
        assert!(!is_composite_type(&schema, "Int"));
    }
}
