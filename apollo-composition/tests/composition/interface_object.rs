use super::ServiceDefinition;
use super::compose_as_fed2_subgraphs;
use super::errors;

#[test]
fn errors_if_an_interface_has_a_key_but_the_subgraph_does_not_know_all_implementations() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
        type Query {
            iFromA: I
        }

        interface I @key(fields: "id") {
            id: ID!
            x: Int
        }

        type A implements I @key(fields: "id") {
            id: ID!
            x: Int
        }

        type B implements I @key(fields: "id") {
            id: ID!
            x: Int
        }
        "#,
    };

    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
        type Query {
            iFromB: I
        }

        type I @interfaceObject @key(fields: "id") {
            id: ID!
            y: Int
        }
        "#,
    };

    let subgraph_c = ServiceDefinition {
        name: "subgraphC",
        type_defs: r#"
        interface I {
            id: ID!
            x: Int
        }

        type C implements I @key(fields: "id") {
            id: ID!
            x: Int
            w: Int
        }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b, subgraph_c]);
    let errors = errors(&result);
    assert!(
        errors.contains(&(
            "INTERFACE_KEY_MISSING_IMPLEMENTATION_TYPE".to_owned(),
            r#"[subgraphA] Interface type "I" has a resolvable key (@key(fields: "id")) in subgraph "subgraphA" but that subgraph is missing some of the supergraph implementation types of "I". Subgraph "subgraphA" should define type "C" (and have it implement "I")."#.to_owned()
        )),
        "{errors:#?}"
    );
}

#[test]
fn errors_if_interface_object_is_used_with_no_corresponding_interface() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
        type Query {
            iFromA: I
        }

        type I @interfaceObject @key(fields: "id") {
            id: ID!
            x: Int
        }
        "#,
    };

    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
        type Query {
            iFromB: I
        }

        type I @interfaceObject @key(fields: "id") {
            id: ID!
            y: Int
        }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    let codes: Vec<String> = errors(&result).into_iter().map(|(code, _)| code).collect();
    assert!(
        codes.iter().any(|code| code == "INTERFACE_OBJECT_USAGE_ERROR"),
        "{codes:?}"
    );
}
