use apollo_composition::CompositionOptions;
use pretty_assertions::assert_eq;

use super::ServiceDefinition;
use super::compose_as_fed2_subgraphs;
use super::compose_as_fed2_subgraphs_with_options;
use super::errors;
use super::hints;

fn subgraphs_without_key_in_b() -> [ServiceDefinition<'static>; 2] {
    [
        ServiceDefinition {
            name: "A",
            type_defs: r#"
                type Query {
                    t: T
                }

                type T @key(fields: "id") {
                    id: ID!
                    x: Int
                }
            "#,
        },
        ServiceDefinition {
            name: "B",
            type_defs: r#"
                type T {
                    id: ID! @shareable
                    y: Int
                }
            "#,
        },
    ]
}

#[test]
fn reports_field_unreachable_without_key() {
    let result = compose_as_fed2_subgraphs(&subgraphs_without_key_in_b());
    let errors = errors(&result);
    assert_eq!(errors.len(), 1, "{errors:#?}");
    let (code, message) = &errors[0];
    assert_eq!(code, "COMPOSITION_SATISFIABILITY_ERROR");
    assert!(
        message.starts_with(
            "The following supergraph API query:\n\
             {\n  t {\n    y\n  }\n}\n\
             cannot be satisfied by the subgraphs because:\n"
        ),
        "{message}"
    );
    assert!(message.contains(r#"- from subgraph "A":"#), "{message}");
    assert!(message.contains(r#"cannot find field "T.y""#), "{message}");
}

#[test]
fn skipping_satisfiability_accepts_unreachable_fields() {
    let options = CompositionOptions {
        run_satisfiability: false,
        ..Default::default()
    };
    let supergraph =
        compose_as_fed2_subgraphs_with_options(&subgraphs_without_key_in_b(), &options)
            .expect("composes without satisfiability");
    assert!(supergraph.api_schema().type_field("T", "y").is_ok());
}

#[test]
fn reports_unsatisfiable_requires() {
    let subgraph_a = ServiceDefinition {
        name: "A",
        type_defs: r#"
            type Query {
                t: T
            }

            type T @key(fields: "id") {
                id: ID!
                x: Int @external
                y: Int @requires(fields: "x")
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "B",
        type_defs: r#"
            type T {
                id: ID! @shareable
                x: Int
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    let errors = errors(&result);
    assert!(
        errors
            .iter()
            .all(|(code, _)| code == "COMPOSITION_SATISFIABILITY_ERROR"),
        "{errors:#?}"
    );
    let witnesses: Vec<&str> = errors
        .iter()
        .filter_map(|(_, message)| {
            message
                .strip_prefix("The following supergraph API query:\n")?
                .split("\ncannot be satisfied")
                .next()
        })
        .collect();
    assert!(
        witnesses.contains(&"{\n  t {\n    y\n  }\n}"),
        "{witnesses:#?}"
    );
    assert!(
        witnesses.contains(&"{\n  t {\n    x\n  }\n}"),
        "{witnesses:#?}"
    );
}

#[test]
fn satisfiable_requires_and_keys_compose() {
    let subgraph_a = ServiceDefinition {
        name: "A",
        type_defs: r#"
            type Query {
                t: T
            }

            type T @key(fields: "id") {
                id: ID!
                x: Int @external
                y: Int @requires(fields: "x")
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "B",
        type_defs: r#"
            type T @key(fields: "id") {
                id: ID!
                x: Int
                z: String
            }
        "#,
    };

    let supergraph = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]).expect("composes");
    let api_schema = supergraph.api_schema();
    for field in ["id", "x", "y", "z"] {
        assert!(api_schema.type_field("T", field).is_ok(), "T.{field}");
    }
}

#[test]
fn witness_includes_required_arguments() {
    let subgraph_a = ServiceDefinition {
        name: "A",
        type_defs: r#"
            type Query {
                t(id: ID!, first: Int, filter: Filter!): T
            }

            input Filter {
                name: String!
                limit: Int
            }

            type T @key(fields: "id") {
                id: ID!
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "B",
        type_defs: r#"
            type T {
                id: ID! @shareable
                y: Int
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    let errors = errors(&result);
    assert_eq!(errors.len(), 1, "{errors:#?}");
    let message = &errors[0].1;
    assert!(
        message.starts_with("The following supergraph API query:\n{\n  t(id: \"<any id>\", filter: {"),
        "{message}"
    );
    assert!(message.contains(r#"name: "A string value""#), "{message}");
    assert!(!message.contains("first:"), "{message}");
    assert!(!message.contains("limit:"), "{message}");
}

#[test]
fn errors_on_shared_field_with_non_intersecting_runtime_types() {
    let subgraph_a = ServiceDefinition {
        name: "A",
        type_defs: r#"
            type Query {
                u: U @shareable
            }

            union U = X

            type X {
                x: Int
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "B",
        type_defs: r#"
            type Query {
                u: U @shareable
            }

            union U = Y

            type Y {
                y: Int
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    let errors = errors(&result);
    assert_eq!(errors.len(), 1, "{errors:#?}");
    let (code, message) = &errors[0];
    assert_eq!(code, "SHAREABLE_HAS_MISMATCHED_RUNTIME_TYPES");
    assert!(
        message.contains(
            r#"Shared field "Query.u" return type "U" has a non-intersecting set of possible runtime types across subgraphs."#
        ),
        "{message}"
    );
    assert!(message.contains(r#" - in subgraph "A", type "X""#), "{message}");
    assert!(message.contains(r#" - in subgraph "B", type "Y""#), "{message}");
}

#[test]
fn hints_on_shared_field_with_partially_intersecting_runtime_types() {
    let subgraph_a = ServiceDefinition {
        name: "A",
        type_defs: r#"
            type Query {
                u: U @shareable
            }

            union U = X | Y

            type X @shareable {
                x: Int
            }

            type Y {
                y: Int
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "B",
        type_defs: r#"
            type Query {
                u: U @shareable
            }

            union U = X

            type X @shareable {
                x: Int
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    let hints = hints(&result);
    let runtime_type_hints: Vec<&(String, String)> = hints
        .iter()
        .filter(|(code, _)| code == "INCONSISTENT_RUNTIME_TYPES_FOR_SHAREABLE_RETURN")
        .collect();
    assert_eq!(runtime_type_hints.len(), 1, "{hints:#?}");
    assert!(
        runtime_type_hints[0]
            .1
            .contains(r#"subgraph "A" should never resolve "Query.u" to an object of type "Y""#),
        "{}",
        runtime_type_hints[0].1
    );
}

#[test]
fn stops_when_exceeding_max_validation_subgraph_paths() {
    let subgraph_a = ServiceDefinition {
        name: "A",
        type_defs: r#"
            type Query {
                shared: Int @shareable
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "B",
        type_defs: r#"
            type Query {
                shared: Int @shareable
            }
        "#,
    };

    let options = CompositionOptions {
        max_validation_subgraph_paths: Some(1),
        ..Default::default()
    };
    let result = compose_as_fed2_subgraphs_with_options(&[subgraph_a, subgraph_b], &options);
    assert_eq!(
        errors(&result),
        [(
            "MAX_VALIDATION_SUBGRAPH_PATHS_EXCEEDED".to_owned(),
            "Maximum number of validation subgraph paths exceeded: 2".to_owned()
        )]
    );

    let options = CompositionOptions {
        max_validation_subgraph_paths: Some(2),
        ..Default::default()
    };
    let subgraph_a = ServiceDefinition {
        name: "A",
        type_defs: r#"
            type Query {
                shared: Int @shareable
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "B",
        type_defs: r#"
            type Query {
                shared: Int @shareable
            }
        "#,
    };
    compose_as_fed2_subgraphs_with_options(&[subgraph_a, subgraph_b], &options)
        .expect("composes within the limit");
}
