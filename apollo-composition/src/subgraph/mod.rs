use std::fmt::Display;
use std::fmt::Formatter;

use apollo_compiler::Name;
use apollo_compiler::Schema;
use apollo_compiler::ast::OperationType;
use apollo_compiler::ast::Type;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::name;
use apollo_compiler::schema::ComponentName;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::validation::DiagnosticList;

use crate::error::CompositionError;
use crate::error::ErrorCode;
use crate::error::FederationError;

pub mod typestate;

pub use typestate::Expanded;
pub use typestate::Raw;
pub use typestate::Subgraph;
pub use typestate::Validated;

/// Reserved for the subgraph-less graph of the query graph.
pub(crate) const FEDERATION_RESERVED_SUBGRAPH_NAME: &str = "_";

/// The errors preventing one subgraph from being composed. Messages are prefixed with the
/// subgraph name.
#[derive(Debug, Clone)]
pub struct SubgraphError {
    pub(crate) subgraph: String,
    pub(crate) errors: Vec<CompositionError>,
}

impl SubgraphError {
    pub(crate) fn new(subgraph: impl Into<String>, errors: Vec<CompositionError>) -> Self {
        Self {
            subgraph: subgraph.into(),
            errors,
        }
    }

    pub(crate) fn from_federation_error(
        subgraph: impl Into<String>,
        error: FederationError,
    ) -> Self {
        let subgraph = subgraph.into();
        let errors = vec![error.into_composition_error(&subgraph)];
        Self { subgraph, errors }
    }

    /// Constructing from GraphQL errors.
    pub(crate) fn from_diagnostic_list(
        subgraph: impl Into<String>,
        diagnostics: &DiagnosticList,
    ) -> Self {
        let subgraph = subgraph.into();
        let errors = FederationError::from_diagnostics(diagnostics)
            .into_iter()
            .map(|error| error.into_composition_error(&subgraph))
            .collect();
        Self { subgraph, errors }
    }

    pub fn subgraph(&self) -> &str {
        &self.subgraph
    }

    pub fn errors(&self) -> &[CompositionError] {
        &self.errors
    }

    pub fn to_composition_errors(&self) -> Vec<CompositionError> {
        self.errors.clone()
    }

    /// The `(code, message)` pairs of the errors, mainly for tests.
    pub fn format_errors(&self) -> Vec<(String, String)> {
        self.errors
            .iter()
            .map(|error| (error.code().to_string(), error.message().to_string()))
            .collect()
    }
}

impl Display for SubgraphError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (code, message) in self.format_errors() {
            writeln!(f, "{code}: {message}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SubgraphError {}

impl From<SubgraphError> for Vec<CompositionError> {
    fn from(error: SubgraphError) -> Self {
        error.errors
    }
}

pub(crate) fn validate_subgraph_name(name: &str) -> Result<(), CompositionError> {
    if name == FEDERATION_RESERVED_SUBGRAPH_NAME {
        Err(ErrorCode::InvalidSubgraphName.err(
            format!("[{name}] Invalid name {name} for a subgraph: this name is reserved"),
            vec![],
        ))
    } else if name.is_empty() {
        Err(ErrorCode::InvalidSubgraphName.err(
            "Invalid empty name for a subgraph: subgraph names must be non-empty",
            vec![],
        ))
    } else {
        Ok(())
    }
}

pub(crate) fn default_root_name(operation_type: OperationType) -> Name {
    match operation_type {
        OperationType::Query => name!("Query"),
        OperationType::Mutation => name!("Mutation"),
        OperationType::Subscription => name!("Subscription"),
    }
}

/// Renames every root type to its default name (`Query`, `Mutation`, `Subscription`).
///
/// Rejects subgraphs where a non-root type uses the default name of a root that is renamed, as
/// the supergraph could not tell them apart.
pub(crate) fn normalize_root_types(
    subgraph: &str,
    schema: &mut Schema,
) -> Result<(), Vec<CompositionError>> {
    let mut errors = vec![];
    let mut renames = vec![];
    for operation_type in [
        OperationType::Query,
        OperationType::Mutation,
        OperationType::Subscription,
    ] {
        let Some(root) = schema.root_operation(operation_type).cloned() else {
            continue;
        };
        let default_name = default_root_name(operation_type);
        if root == default_name {
            continue;
        }
        if schema.types.contains_key(&default_name) {
            let (code, kind) = match operation_type {
                OperationType::Query => (ErrorCode::RootQueryUsed, "query"),
                OperationType::Mutation => (ErrorCode::RootMutationUsed, "mutation"),
                OperationType::Subscription => {
                    (ErrorCode::RootSubscriptionUsed, "subscription")
                }
            };
            errors.push(code.err(
                format!(
                    "[{subgraph}] The schema has a type named \"{default_name}\" but it is not set as the {kind} root type (\"{root}\" is instead): this is not supported by federation. If a root type does not use its default name, there should be no other type with that default name."
                ),
                vec![],
            ));
            continue;
        }
        renames.push((operation_type, root, default_name));
    }
    if !errors.is_empty() {
        return Err(errors);
    }
    for (operation_type, from, to) in renames {
        rename_type(schema, &from, &to);
        let definition = schema.schema_definition.make_mut();
        let root = Some(ComponentName::from(to));
        match operation_type {
            OperationType::Query => definition.query = root,
            OperationType::Mutation => definition.mutation = root,
            OperationType::Subscription => definition.subscription = root,
        }
    }
    Ok(())
}

/// Renames an object type and every reference to it from fields and unions. Keeps the position of
/// the type in the schema.
fn rename_type(schema: &mut Schema, from: &Name, to: &Name) {
    let types = std::mem::take(&mut schema.types);
    schema.types = types
        .into_iter()
        .map(|(name, mut type_)| {
            if name == *from {
                if let ExtendedType::Object(object) = &mut type_ {
                    object.make_mut().name = to.clone();
                }
                (to.clone(), type_)
            } else {
                (name, type_)
            }
        })
        .collect::<IndexMap<_, _>>();

    for type_ in schema.types.values_mut() {
        match type_ {
            ExtendedType::Object(object) => {
                for field in object.make_mut().fields.values_mut() {
                    if field.ty.inner_named_type() == from {
                        let ty = renamed_type(&field.ty, from, to);
                        field.make_mut().ty = ty;
                    }
                }
            }
            ExtendedType::Interface(interface) => {
                for field in interface.make_mut().fields.values_mut() {
                    if field.ty.inner_named_type() == from {
                        let ty = renamed_type(&field.ty, from, to);
                        field.make_mut().ty = ty;
                    }
                }
            }
            ExtendedType::Union(union_) => {
                if union_.members.contains(from) {
                    let union_ = union_.make_mut();
                    union_.members = std::mem::take(&mut union_.members)
                        .into_iter()
                        .map(|member| {
                            if member.name == *from {
                                ComponentName::from(to.clone())
                            } else {
                                member
                            }
                        })
                        .collect();
                }
            }
            _ => {}
        }
    }
}

pub(crate) fn renamed_type(ty: &Type, from: &Name, to: &Name) -> Type {
    let rename = |name: &Name| if name == from { to.clone() } else { name.clone() };
    match ty {
        Type::Named(name) => Type::Named(rename(name)),
        Type::NonNullNamed(name) => Type::NonNullNamed(rename(name)),
        Type::List(inner) => Type::List(Box::new(renamed_type(inner, from, to))),
        Type::NonNullList(inner) => Type::NonNullList(Box::new(renamed_type(inner, from, to))),
    }
}
