use pretty_assertions::assert_eq;

use super::ServiceDefinition;
use super::compose_as_fed2_subgraphs;
use super::errors;

#[test]
fn inaccessible_field_is_merged_but_not_in_api_schema() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                q: Int
                secret: String @inaccessible
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type Query {
                q2: Int
            }
        "#,
    };

    let supergraph = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]).expect("composes");
    let secret = supergraph
        .schema()
        .type_field("Query", "secret")
        .expect("Query.secret is in the supergraph");
    assert!(secret.directives.has("inaccessible"));
    assert!(supergraph.api_schema().type_field("Query", "secret").is_err());
    assert!(supergraph.api_schema().type_field("Query", "q").is_ok());
    assert!(supergraph.api_schema().type_field("Query", "q2").is_ok());
}

#[test]
fn inaccessible_in_one_subgraph_applies_to_the_shared_field() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                q: Int
                shared: String @shareable @inaccessible
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type Query {
                shared: String @shareable
            }
        "#,
    };

    let supergraph = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]).expect("composes");
    assert!(supergraph.api_schema().type_field("Query", "shared").is_err());
}

#[test]
fn inaccessible_enum_value_is_removed_from_api_schema() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                e: E
            }

            enum E {
                A
                B @inaccessible
            }
        "#,
    };

    let supergraph = compose_as_fed2_subgraphs(&[subgraph_a]).expect("composes");
    let Some(apollo_compiler::schema::ExtendedType::Enum(e)) = supergraph.api_schema().types.get("E")
    else {
        panic!("E is an enum of the API schema");
    };
    let values: Vec<&str> = e.values.keys().map(|value| value.as_str()).collect();
    assert_eq!(values, ["A"]);
}

#[test]
fn errors_on_inaccessible_type_referenced_by_accessible_field() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                t: T
            }

            type T @inaccessible {
                x: Int
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a]);
    assert_eq!(
        errors(&result),
        [(
            "REFERENCED_INACCESSIBLE".to_owned(),
            "Type `T` is @inaccessible but is referenced by `Query.t`, which is in the API schema."
                .to_owned()
        )]
    );
}

#[test]
fn errors_on_required_inaccessible_argument() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                f(x: Int! @inaccessible): Int
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a]);
    let errors = errors(&result);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, "REQUIRED_INACCESSIBLE");
    assert!(errors[0].1.starts_with("Argument `Query.f(x:)` is @inaccessible"), "{}", errors[0].1);
}

#[test]
fn errors_when_query_root_is_inaccessible() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query @inaccessible {
                q: Int
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a]);
    let errors = errors(&result);
    assert_eq!(
        errors.first(),
        Some(&(
            "QUERY_ROOT_TYPE_INACCESSIBLE".to_owned(),
            "Type `Query` is @inaccessible but is the root query type, which must be in the API schema."
                .to_owned()
        ))
    );
}
