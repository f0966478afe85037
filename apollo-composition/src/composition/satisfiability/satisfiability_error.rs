use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::schema::ExtendedType;
use itertools::Itertools;
use petgraph::graph::EdgeIndex;

use crate::bail;
use crate::composition::satisfiability::validation_state::ValidationState;
use crate::ensure;
use crate::error::CompositionError;
use crate::error::ErrorCode;
use crate::error::FederationError;
use crate::internal_error;
use crate::merger::hints::HintCode;
use crate::query_graph::QueryGraphEdgeTransition;
use crate::query_graph::graph_path::TransitionGraphPath;
use crate::query_graph::graph_path::Unadvanceables;
use crate::schema::field_set::field_definition;
use crate::schema::is_composite_type;
use crate::schema::position::SchemaRootDefinitionKind;
use crate::supergraph::CompositionHint;
use crate::utils::human_readable::HumanReadableListOptions;
use crate::utils::human_readable::HumanReadableListPrefix;
use crate::utils::human_readable::human_readable_list;
use crate::utils::human_readable::human_readable_subgraph_names;
use crate::utils::human_readable::human_readable_types;

pub(super) fn satisfiability_error(
    unsatisfiable_path: &TransitionGraphPath,
    subgraphs_paths_unadvanceables: &[Unadvanceables],
) -> Result<CompositionError, FederationError> {
    let witness = build_witness_operation(unsatisfiable_path)?;
    let message = format!(
        "The following supergraph API query:\n\
         {witness}\n\
         cannot be satisfied by the subgraphs because:\n\
         {reasons}",
        reasons = display_reasons(subgraphs_paths_unadvanceables),
    );
    Ok(ErrorCode::CompositionSatisfiabilityError.err(message, vec![]))
}

pub(super) fn shareable_field_non_intersecting_runtime_types_error(
    invalid_state: &ValidationState,
    parent_type: &Name,
    field_name: &Name,
    runtime_types_to_subgraphs: &IndexMap<Vec<Name>, IndexSet<Arc<str>>>,
) -> Result<CompositionError, FederationError> {
    let witness = build_witness_operation(invalid_state.supergraph_path())?;
    let type_strings = runtime_types_to_subgraphs
        .iter()
        .map(|(runtime_types, subgraphs)| {
            format!(
                " - in {}, {}",
                human_readable_subgraph_names(subgraphs.iter()),
                human_readable_list(
                    runtime_types
                        .iter()
                        .map(|runtime_type| format!("\"{runtime_type}\"")),
                    HumanReadableListOptions {
                        prefix: Some(HumanReadableListPrefix {
                            singular: "type",
                            plural: "types",
                        }),
                        empty_output: "no runtime type is defined",
                        ..Default::default()
                    }
                )
            )
        })
        .join(";\n");
    let schema = invalid_state.supergraph_path().graph().schema()?;
    let field = field_definition(schema, parent_type, field_name)
        .ok_or_else(|| internal_error!("Field \"{parent_type}.{field_name}\" missing"))?;
    let message = format!(
        "For the following supergraph API query:\n\
        {witness}\n\
        Shared field \"{parent_type}.{field_name}\" return type \"{}\" has a non-intersecting set \
        of possible runtime types across subgraphs. Runtime types in subgraphs are:\n\
        {type_strings}.\n\
        This is not allowed as shared fields must resolve the same way in all subgraphs, and that \
        implies at least some common runtime types between the subgraphs.",
        field.ty.inner_named_type(),
    );
    Ok(ErrorCode::ShareableHasMismatchedRuntimeTypes.err(message, vec![]))
}

pub(super) fn shareable_field_mismatched_runtime_types_hint(
    state: &ValidationState,
    parent_type: &Name,
    field_name: &Name,
    common_runtime_types: &[Name],
    runtime_types_per_subgraphs: &IndexMap<Arc<str>, Vec<Name>>,
) -> Result<CompositionHint, FederationError> {
    let witness = build_witness_operation(state.supergraph_path())?;
    let coordinate = format!("{parent_type}.{field_name}");
    let all_subgraphs = state.current_subgraph_names()?;
    let subgraphs_with_type_not_in_intersection_string = all_subgraphs
        .iter()
        .map(|subgraph| {
            let Some(runtime_types) = runtime_types_per_subgraphs.get(subgraph) else {
                bail!("Unexpectedly no runtime types for path's tail's subgraph");
            };
            let types_to_not_implement = runtime_types
                .iter()
                .filter(|type_name| !common_runtime_types.contains(type_name))
                .collect::<Vec<_>>();
            if types_to_not_implement.is_empty() {
                return Ok::<_, FederationError>(None);
            };
            Ok(Some(format!(
                " - subgraph \"{subgraph}\" should never resolve \"{coordinate}\" to an object of {}",
                human_readable_types(types_to_not_implement.into_iter()),
            )))
        })
        .process_results(|iter| iter.flatten().join(";\n"))?;
    let schema = state.supergraph_path().graph().schema()?;
    let field = field_definition(schema, parent_type, field_name)
        .ok_or_else(|| internal_error!("Field \"{coordinate}\" missing"))?;
    let message = format!(
        "For the following supergraph API query:\n\
        {witness}\n\
        Shared field \"{coordinate}\" return type \"{}\" has different sets of possible runtime \
        types across subgraphs.\n\
        Since a shared field must be resolved the same way in all subgraphs, make sure that {} \
        only resolve \"{coordinate}\" to objects of {}. In particular:\n\
        {subgraphs_with_type_not_in_intersection_string}.\n\
        Otherwise the @shareable contract will be broken.",
        field.ty,
        human_readable_subgraph_names(all_subgraphs.iter()),
        human_readable_types(common_runtime_types.iter()),
    );
    Ok(CompositionHint::new(
        HintCode::InconsistentRuntimeTypesForShareableReturn,
        message,
        vec![],
    ))
}

/// A query reproducing a path of the API schema query graph: one selection per edge, and an
/// ellipsis where a selection is expected but the path stops.
#[derive(Debug)]
pub(super) struct WitnessOperation {
    root_kind: SchemaRootDefinitionKind,
    selection: WitnessSelection,
}

#[derive(Debug)]
enum WitnessSelection {
    Field {
        name: Name,
        arguments: Vec<(Name, Node<ast::Value>)>,
        sub_selection: Option<Box<WitnessSelection>>,
    },
    InlineFragment {
        type_condition: Name,
        sub_selection: Option<Box<WitnessSelection>>,
    },
    /// The path ends on a composite type.
    Ellipsis,
}

impl WitnessSelection {
    fn write_indented(&self, f: &mut Formatter<'_>, indent: usize) -> std::fmt::Result {
        let padding = "  ".repeat(indent);
        let (head, sub_selection) = match self {
            Self::Field {
                name,
                arguments,
                sub_selection,
            } => {
                let arguments = if arguments.is_empty() {
                    String::new()
                } else {
                    format!(
                        "({})",
                        arguments
                            .iter()
                            .map(|(name, value)| format!("{name}: {value}"))
                            .join(", ")
                    )
                };
                (format!("{name}{arguments}"), sub_selection)
            }
            Self::InlineFragment {
                type_condition,
                sub_selection,
            } => (format!("... on {type_condition}"), sub_selection),
            Self::Ellipsis => return writeln!(f, "{padding}..."),
        };
        match sub_selection {
            Some(sub_selection) => {
                writeln!(f, "{padding}{head} {{")?;
                sub_selection.write_indented(f, indent + 1)?;
                writeln!(f, "{padding}}}")
            }
            None => writeln!(f, "{padding}{head}"),
        }
    }
}

impl Display for WitnessOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.root_kind {
            SchemaRootDefinitionKind::Query => writeln!(f, "{{")?,
            root_kind => writeln!(f, "{root_kind} {{")?,
        }
        self.selection.write_indented(f, 1)?;
        write!(f, "}}")
    }
}

pub(super) fn build_witness_operation(
    witness: &TransitionGraphPath,
) -> Result<WitnessOperation, FederationError> {
    let root = witness.head_node()?;
    let Some(root_kind) = root.root_kind else {
        bail!("build_witness_operation: root kind is not set");
    };
    let schema = witness.graph().schema_by_source(&root.source)?;
    ensure!(
        !witness.edges().is_empty(),
        "unsatisfiable_path should contain at least one edge/transition"
    );
    let Some(selection) = build_witness_next_step(schema, witness, witness.edges())? else {
        bail!("build_witness_operation: root selection failed to build");
    };
    Ok(WitnessOperation {
        root_kind,
        selection,
    })
}

// Builds the selection bottom-up.
fn build_witness_next_step(
    schema: &Schema,
    witness: &TransitionGraphPath,
    edges: &[EdgeIndex],
) -> Result<Option<WitnessSelection>, FederationError> {
    let graph = witness.graph();
    let Some((edge, rest)) = edges.split_first() else {
        // The path may stop on a type that is not a leaf. A selection is then needed but we don't
        // have any, which an ellipsis stands for.
        let type_name = graph.node_type_name(witness.tail())?;
        return Ok(is_composite_type(schema, type_name).then_some(WitnessSelection::Ellipsis));
    };
    let sub_selection = build_witness_next_step(schema, witness, rest)?.map(Box::new);
    match &graph.edge_weight(*edge)?.transition {
        QueryGraphEdgeTransition::Downcast { to_type, .. } => {
            ensure!(
                sub_selection.is_some(),
                "build_witness_next_step: inline fragment without selection"
            );
            Ok(Some(WitnessSelection::InlineFragment {
                type_condition: to_type.clone(),
                sub_selection,
            }))
        }
        QueryGraphEdgeTransition::FieldCollection {
            parent_type,
            field_name,
            ..
        } => {
            let field = field_definition(schema, parent_type, field_name).ok_or_else(|| {
                internal_error!("Field \"{parent_type}.{field_name}\" unexpectedly missing")
            })?;
            // Optional arguments are left out.
            let arguments = field
                .arguments
                .iter()
                .filter(|argument| argument.is_required())
                .map(|argument| {
                    Ok::<_, FederationError>((
                        argument.name.clone(),
                        generate_witness_value(schema, &argument.ty)?,
                    ))
                })
                .process_results(|iter| iter.collect())?;
            Ok(Some(WitnessSelection::Field {
                name: field_name.clone(),
                arguments,
                sub_selection,
            }))
        }
        transition => {
            // Witnesses are built from paths of the API schema graph, which have no other edges.
            bail!("Invalid edge {transition} found in supergraph path")
        }
    }
}

fn generate_witness_value(
    schema: &Schema,
    ty: &ast::Type,
) -> Result<Node<ast::Value>, FederationError> {
    // The value is never null, even for a nullable type.
    let value = match ty {
        ast::Type::Named(type_name) | ast::Type::NonNullNamed(type_name) => {
            match schema.types.get(type_name) {
                Some(ExtendedType::Scalar(_)) => match type_name.as_str() {
                    "Int" => ast::Value::Int(0.into()),
                    #[allow(clippy::approx_constant)]
                    "Float" => ast::Value::Float((3.14).into()),
                    "Boolean" => ast::Value::Boolean(true),
                    "String" => ast::Value::String("A string value".to_string()),
                    // Nothing says what format of ID is expected where.
                    "ID" => ast::Value::String("<any id>".to_string()),
                    _ => ast::Value::String("<some value>".to_string()),
                },
                Some(ExtendedType::Enum(enum_type)) => {
                    let Some(first_value) = enum_type.values.keys().next() else {
                        bail!("generate_witness_value: enum type has no values");
                    };
                    ast::Value::Enum(first_value.clone())
                }
                Some(ExtendedType::InputObject(input_object)) => {
                    let fields = input_object
                        .fields
                        .iter()
                        .filter(|(_, field)| field.is_required())
                        .map(|(field_name, field)| {
                            Ok::<_, FederationError>((
                                field_name.clone(),
                                generate_witness_value(schema, &field.ty)?,
                            ))
                        })
                        .process_results(|iter| iter.collect())?;
                    ast::Value::Object(fields)
                }
                _ => bail!("generate_witness_value: unexpected value type \"{type_name}\""),
            }
        }
        ast::Type::List(_) | ast::Type::NonNullList(_) => ast::Value::List(vec![]),
    };
    Ok(Node::new(value))
}

fn display_reasons(reasons: &[Unadvanceables]) -> String {
    let mut by_subgraph: IndexMap<&str, Vec<&str>> = IndexMap::default();
    for unadvanceable in reasons.iter().flat_map(|reason| reason.iter()) {
        by_subgraph
            .entry(unadvanceable.source_subgraph())
            .or_default()
            .push(unadvanceable.details());
    }
    by_subgraph
        .iter()
        .filter_map(|(subgraph, details)| {
            let (first, rest) = details.split_first()?;
            let details = if rest.is_empty() {
                format!(" {first}.")
            } else {
                // Several paths can share the same dead end, and a single "cannot find field"
                // message is enough.
                let all_details: IndexSet<&&str> = details.iter().collect();
                std::iter::once(String::new())
                    .chain(all_details.iter().map(|details| format!("  - {details}.")))
                    .join("\n")
            };
            Some(format!("- from subgraph \"{subgraph}\":{details}"))
        })
        .join("\n")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use insta::assert_snapshot;
    use petgraph::visit::EdgeRef;

    use super::*;
    use crate::query_graph::QueryGraph;
    use crate::query_graph::build_query_graph::build_query_graph;

    fn build_graph_paths(
        query_graph: &Arc<QueryGraph>,
        path: TransitionGraphPath,
        depth_limit: usize,
        paths: &mut Vec<TransitionGraphPath>,
    ) {
        if depth_limit == 0 {
            return;
        }
        paths.push(path.clone());
        for edge in query_graph.out_edges(path.tail()) {
            let new_path = path.add(edge.id()).expect("edge starts at the path's tail");
            build_graph_paths(query_graph, new_path, depth_limit - 1, paths);
        }
    }

    #[test]
    fn builds_witness_operations() {
        let schema = Schema::parse_and_validate(
            r#"
            type Query {
              t: T
              i: I
            }

            interface I {
              id: ID!
            }

            enum E { A B C }

            input MyInput {
              intInput: Int!
              enumInput: E!
              optionalInput: String
            }

            type T implements I {
              id: ID!
              someField(
                numArg: Int!, floatArg: Float!, strArg: String!, boolArg: Boolean!,
                listArg: [Int!]!, enumArg: E!, myInputArg: MyInput!, optionalArg: String
              ): String
            }
            "#,
            "schema.graphql",
        )
        .expect("valid schema");
        let query_graph = Arc::new(build_query_graph("test".into(), schema).expect("builds"));
        let root = TransitionGraphPath::from_graph_root(
            query_graph.clone(),
            SchemaRootDefinitionKind::Query,
        )
        .expect("has a query root");
        let mut paths = Vec::new();
        build_graph_paths(&query_graph, root, 4, &mut paths);
        let result: Vec<_> = paths
            .iter()
            .filter(|path| !path.edges().is_empty())
            .map(|path| {
                let witness = build_witness_operation(path).expect("builds witness");
                format!("{path}: {witness}")
            })
            .collect();
        assert_snapshot!(result.join("\n\n"), @r###"
        Query(test)* --[t]--> T(test): {
          t {
            ...
          }
        }

        Query(test)* --[t]--> T(test) --[id]--> ID(test): {
          t {
            id
          }
        }

        Query(test)* --[t]--> T(test) --[someField]--> String(test): {
          t {
            someField(numArg: 0, floatArg: 3.14, strArg: "A string value", boolArg: true, listArg: [], enumArg: A, myInputArg: {intInput: 0, enumInput: A})
          }
        }

        Query(test)* --[i]--> I(test): {
          i {
            ...
          }
        }

        Query(test)* --[i]--> I(test) --[id]--> ID(test): {
          i {
            id
          }
        }

        Query(test)* --[i]--> I(test) --[... on T]--> T(test): {
          i {
            ... on T {
              ...
            }
          }
        }

        Query(test)* --[i]--> I(test) --[... on T]--> T(test) --[id]--> ID(test): {
          i {
            ... on T {
              id
            }
          }
        }

        Query(test)* --[i]--> I(test) --[... on T]--> T(test) --[someField]--> String(test): {
          i {
            ... on T {
              someField(numArg: 0, floatArg: 3.14, strArg: "A string value", boolArg: true, listArg: [], enumArg: A, myInputArg: {intInput: 0, enumInput: A})
            }
          }
        }
        "###);
    }
}
