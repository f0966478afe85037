//! Parsing and checking of the selections used by `@key`, `@requires` and `@provides`.
use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::FieldDefinition;

/// Why a field set is invalid against a given type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum FieldSetError {
    #[error("{message}")]
    Parse { message: String },
    #[error("Cannot query field \"{field_name}\" on type \"{type_name}\".")]
    UnknownField { type_name: Name, field_name: Name },
    #[error("The field \"{field}\" has no argument \"{argument}\".")]
    UnknownArgument { field: String, argument: Name },
    #[error(
        "Field \"{field}\" argument \"{argument}\" is required, but it was not provided."
    )]
    MissingMandatoryArgument { field: String, argument: Name },
    #[error("Cannot use alias \"{alias}\" in \"{field_name}\": aliases are not currently supported in the used directive")]
    Alias { alias: Name, field_name: Name },
    #[error("{message}")]
    InvalidSelection { message: String },
}

/// Parses a field set, which is a selection set without its enclosing braces.
pub(crate) fn parse_field_set(source: &str) -> Result<Vec<ast::Selection>, FieldSetError> {
    let document = ast::Document::parse(format!("{{ {source} }}"), "field_set.graphql")
        .map_err(|with_errors| FieldSetError::Parse {
            message: with_errors
                .errors
                .iter()
                .next()
                .map(|d| d.error.to_string())
                .unwrap_or_else(|| format!("Invalid field set \"{source}\"")),
        })?;
    document
        .definitions
        .iter()
        .find_map(|definition| match definition {
            ast::Definition::OperationDefinition(operation) => {
                Some(operation.selection_set.clone())
            }
            _ => None,
        })
        .ok_or_else(|| FieldSetError::Parse {
            message: format!("Invalid field set \"{source}\""),
        })
}

pub(crate) fn field_definition<'schema>(
    schema: &'schema Schema,
    type_name: &str,
    field_name: &str,
) -> Option<&'schema Component<FieldDefinition>> {
    match schema.types.get(type_name)? {
        ExtendedType::Object(o) => o.fields.get(field_name),
        ExtendedType::Interface(i) => i.fields.get(field_name),
        _ => None,
    }
}

/// Checks `selections` against `parent_type` in `schema`.
pub(crate) fn validate_field_set(
    schema: &Schema,
    parent_type: &Name,
    selections: &[ast::Selection],
) -> Result<(), FieldSetError> {
    for selection in selections {
        match selection {
            ast::Selection::Field(field) => validate_field(schema, parent_type, field)?,
            ast::Selection::InlineFragment(fragment) => {
                let type_name = fragment
                    .type_condition
                    .clone()
                    .unwrap_or_else(|| parent_type.clone());
                if !super::is_composite_type(schema, &type_name) {
                    return Err(FieldSetError::InvalidSelection {
                        message: format!(
                            "Unknown type \"{type_name}\" used as fragment type condition."
                        ),
                    });
                }
                validate_field_set(schema, &type_name, &fragment.selection_set)?;
            }
            ast::Selection::FragmentSpread(spread) => {
                return Err(FieldSetError::InvalidSelection {
                    message: format!(
                        "Cannot use named fragment \"{}\" in a field set.",
                        spread.fragment_name
                    ),
                });
            }
        }
    }
    Ok(())
}

fn validate_field(
    schema: &Schema,
    parent_type: &Name,
    field: &Node<ast::Field>,
) -> Result<(), FieldSetError> {
    if let Some(alias) = &field.alias {
        return Err(FieldSetError::Alias {
            alias: alias.clone(),
            field_name: field.name.clone(),
        });
    }
    if field.name == "__typename" {
        return if field.selection_set.is_empty() {
            Ok(())
        } else {
            Err(FieldSetError::InvalidSelection {
                message: "Field \"__typename\" must not have a selection since type \"String!\" has no subfields.".to_string(),
            })
        };
    }
    let definition = field_definition(schema, parent_type, &field.name).ok_or_else(|| {
        FieldSetError::UnknownField {
            type_name: parent_type.clone(),
            field_name: field.name.clone(),
        }
    })?;
    let coordinate = format!("{parent_type}.{}", field.name);
    for argument in &field.arguments {
        if definition.argument_by_name(&argument.name).is_none() {
            return Err(FieldSetError::UnknownArgument {
                field: coordinate,
                argument: argument.name.clone(),
            });
        }
    }
    for argument_definition in &definition.arguments {
        let provided = field
            .arguments
            .iter()
            .any(|argument| argument.name == argument_definition.name);
        if !provided
            && argument_definition.ty.is_non_null()
            && argument_definition.default_value.is_none()
        {
            return Err(FieldSetError::MissingMandatoryArgument {
                field: coordinate,
                argument: argument_definition.name.clone(),
            });
        }
    }
    let output_type = definition.ty.inner_named_type();
    let is_composite = super::is_composite_type(schema, output_type);
    match (is_composite, field.selection_set.is_empty()) {
        (true, true) => Err(FieldSetError::InvalidSelection {
            message: format!(
                "Field \"{}\" of type \"{}\" must have a selection of subfields. Did you mean \"{} {{ ... }}\"?",
                field.name, definition.ty, field.name
            ),
        }),
        (false, false) => Err(FieldSetError::InvalidSelection {
            message: format!(
                "Field \"{}\" must not have a selection since type \"{}\" has no subfields.",
                field.name, definition.ty
            ),
        }),
        (true, false) => validate_field_set(schema, output_type, &field.selection_set),
        (false, true) => Ok(()),
    }
}

/// Collects every `(type, field)` pair a field set selects, skipping elements that do not exist
/// in `schema`.
pub(crate) fn collect_target_fields_from_field_set(
    schema: &Schema,
    parent_type: &Name,
    selections: &[ast::Selection],
) -> Vec<(Name, Name)> {
    let mut fields = vec![];
    let mut stack = vec![(parent_type.clone(), selections)];
    while let Some((type_name, selections)) = stack.pop() {
        for selection in selections {
            match selection {
                ast::Selection::Field(field) => {
                    if field.name == "__typename" {
                        continue;
                    }
                    fields.push((type_name.clone(), field.name.clone()));
                    if let Some(definition) = field_definition(schema, &type_name, &field.name) {
                        let output_type = definition.ty.inner_named_type().clone();
                        stack.push((output_type, &field.selection_set));
                    }
                }
                ast::Selection::InlineFragment(fragment) => {
                    let fragment_type = fragment
                        .type_condition
                        .clone()
                        .unwrap_or_else(|| type_name.clone());
                    stack.push((fragment_type, &fragment.selection_set));
                }
                ast::Selection::FragmentSpread(_) => {}
            }
        }
    }
    fields
}

/// Renders selections in the compact single-line form used in `join` directive arguments.
pub(crate) fn print_selections(selections: &[ast::Selection]) -> String {
    selections
        .iter()
        .map(|selection| match selection {
            ast::Selection::Field(field) => {
                let mut out = field.name.to_string();
                if !field.arguments.is_empty() {
                    let args = field
                        .arguments
                        .iter()
                        .map(|arg| format!("{}: {}", arg.name, arg.value))
                        .collect::<Vec<_>>()
                        .join(", ");
                    out.push_str(&format!("({args})"));
                }
                if !field.selection_set.is_empty() {
                    out.push_str(&format!(" {{ {} }}", print_selections(&field.selection_set)));
                }
                out
            }
            ast::Selection::InlineFragment(fragment) => {
                let condition = fragment
                    .type_condition
                    .as_ref()
                    .map(|t| format!(" on {t}"))
                    .unwrap_or_default();
                format!(
                    "...{condition} {{ {} }}",
                    print_selections(&fragment.selection_set)
                )
            }
            ast::Selection::FragmentSpread(spread) => format!("...{}", spread.fragment_name),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
