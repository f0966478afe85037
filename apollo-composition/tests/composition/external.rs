use pretty_assertions::assert_eq;

use super::ServiceDefinition;
use super::compose_as_fed2_subgraphs;
use super::errors;

#[test]
fn errors_on_incompatible_types_with_external() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                T: T! @provides(fields: "f")
            }

            type T @key(fields: "id") {
                id: ID!
                f: String @external
            }
        "#,
    };

    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type T @key(fields: "id") {
                id: ID!
                f: Int @shareable
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    assert_eq!(
        errors(&result),
        [(
            "EXTERNAL_TYPE_MISMATCH".to_owned(),
            r#"Type of field "T.f" is incompatible across subgraphs (where marked @external): it has type "Int" in subgraph "subgraphB" but type "String" in subgraph "subgraphA""#.to_owned()
        )]
    );
}

#[test]
fn errors_on_missing_arguments_to_external_declaration() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                T: T! @provides(fields: "f")
            }

            type T @key(fields: "id") {
                id: ID!
                f: String @external
            }
        "#,
    };

    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type T @key(fields: "id") {
                id: ID!
                f(x: Int): String @shareable
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    assert_eq!(
        errors(&result),
        [(
            "EXTERNAL_ARGUMENT_MISSING".to_owned(),
            r#"Field "T.f" is missing argument "T.f(x:)" in some subgraphs where it is marked @external: argument "T.f(x:)" is declared in subgraph "subgraphB" but not in subgraph "subgraphA" (where "T.f" is @external)."#.to_owned()
        )]
    );
}

#[test]
fn errors_on_incompatible_argument_types_in_external_declaration() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                T: T! @provides(fields: "f")
            }

            type T @key(fields: "id") {
                id: ID!
                f(x: String): String @external
            }
        "#,
    };

    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type T @key(fields: "id") {
                id: ID!
                f(x: Int): String @shareable
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    assert_eq!(
        errors(&result),
        [(
            "EXTERNAL_ARGUMENT_TYPE_MISMATCH".to_owned(),
            r#"Type of argument "T.f(x:)" is incompatible across subgraphs (where "T.f" is marked @external): it has type "Int" in subgraph "subgraphB" but type "String" in subgraph "subgraphA""#.to_owned()
        )]
    );
}

#[test]
fn errors_when_a_field_is_external_everywhere() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                t: T
            }

            type T @key(fields: "id") {
                id: ID!
                f: String @external
                g: Int @requires(fields: "f")
            }
        "#,
    };

    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type T @key(fields: "id") {
                id: ID!
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    assert_eq!(
        errors(&result),
        [(
            "EXTERNAL_MISSING_ON_BASE".to_owned(),
            r#"Field "T.f" is marked @external on all the subgraphs in which it is listed (subgraph "subgraphA")."#.to_owned()
        )]
    );
}

#[test]
fn external_field_with_subtype_composes() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                T: T! @provides(fields: "f")
            }

            type T @key(fields: "id") {
                id: ID!
                f: String! @external
            }
        "#,
    };

    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type T @key(fields: "id") {
                id: ID!
                f: String @shareable
            }
        "#,
    };

    let supergraph = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]).expect("composes");
    let field = supergraph
        .schema()
        .type_field("T", "f")
        .expect("T.f is merged");
    assert_eq!(field.ty.to_string(), "String");
    let join_fields: Vec<String> = field
        .directives
        .get_all("join__field")
        .map(|directive| directive.to_string())
        .collect();
    assert_eq!(
        join_fields,
        [
            "@join__field(graph: SUBGRAPHA, external: true)",
            "@join__field(graph: SUBGRAPHB)",
        ]
    );
}
