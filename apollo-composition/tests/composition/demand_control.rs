use pretty_assertions::assert_eq;

use super::ServiceDefinition;
use super::compose_as_fed2_subgraphs;
use super::hints;

fn applications(
    supergraph: &apollo_composition::Supergraph<apollo_composition::supergraph::Satisfiable>,
    type_name: &str,
    field_name: &str,
    directive_name: &str,
) -> Vec<String> {
    supergraph
        .schema()
        .type_field(type_name, field_name)
        .expect("field is merged")
        .directives
        .get_all(directive_name)
        .map(|directive| directive.to_string())
        .collect()
}

#[test]
fn cost_and_list_size_reach_the_supergraph() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                expensive: Int @cost(weight: 50)
                items(first: Int): [Item] @listSize(slicingArguments: ["first"])
            }

            type Item @cost(weight: 2) {
                id: ID
            }
        "#,
    };

    let supergraph = compose_as_fed2_subgraphs(&[subgraph_a]).expect("composes");
    assert_eq!(
        applications(&supergraph, "Query", "expensive", "cost"),
        ["@cost(weight: 50)"]
    );
    assert_eq!(
        applications(&supergraph, "Query", "items", "listSize"),
        [r#"@listSize(slicingArguments: ["first"])"#]
    );
    let links: Vec<String> = supergraph
        .schema()
        .schema_definition
        .directives
        .get_all("link")
        .map(|directive| directive.to_string())
        .collect();
    assert!(
        links
            .iter()
            .any(|link| link.contains("https://specs.apollo.dev/cost/v0.1")),
        "{links:?}"
    );
}

#[test]
fn merges_cost_by_taking_the_maximum() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                shared: Int @shareable @cost(weight: 5)
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type Query {
                shared: Int @shareable @cost(weight: 10)
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    assert_eq!(
        hints(&result),
        [(
            "MERGED_NON_REPEATABLE_DIRECTIVE_ARGUMENTS".to_owned(),
            r#"Directive @cost is applied to "Query.shared" in multiple subgraphs with different arguments. Merging strategies used by arguments: { "weight": MAX }"#.to_owned()
        )]
    );
    let supergraph = result.expect("composes");
    assert_eq!(
        applications(&supergraph, "Query", "shared", "cost"),
        ["@cost(weight: 10)"]
    );
}

#[test]
fn merges_list_size_arguments_with_their_own_strategies() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                items: [Int] @shareable @listSize(assumedSize: 10, requireOneSlicingArgument: true)
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type Query {
                items: [Int] @shareable @listSize(assumedSize: 20, requireOneSlicingArgument: false)
            }
        "#,
    };

    let supergraph = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]).expect("composes");
    assert_eq!(
        applications(&supergraph, "Query", "items", "listSize"),
        ["@listSize(assumedSize: 20, requireOneSlicingArgument: false)"]
    );
}

#[test]
fn identical_cost_applications_produce_no_hint() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                shared: Int @shareable @cost(weight: 5)
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type Query {
                shared: Int @shareable @cost(weight: 5)
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    assert!(hints(&result).is_empty());
    let supergraph = result.expect("composes");
    assert_eq!(
        applications(&supergraph, "Query", "shared", "cost"),
        ["@cost(weight: 5)"]
    );
}
