use apollo_compiler::Name;
use pretty_assertions::assert_eq;
use rstest::rstest;

use super::ServiceDefinition;
use super::compose_as_fed2_subgraphs;
use super::errors;
use super::hints;

/// A subgraph with a `User` entity, a root field named after the subgraph and a `User` field of
/// the same name carrying `usage`.
fn subgraph_type_defs(
    name: &str,
    link_text: &str,
    compose_text: &str,
    directive_text: &str,
    usage: &str,
) -> String {
    r#"
        extend schema
            @link(url: "https://specs.apollo.dev/link/v1.0")
            <LINK_TEXT>
            <COMPOSE_TEXT>

        <DIRECTIVE_TEXT>
        type Query {
            <NAME>: User
        }

        type User @key(fields: "id") {
            id: Int
            <NAME>: String <USAGE>
        }
    "#
    .replace("<LINK_TEXT>", link_text)
    .replace("<COMPOSE_TEXT>", compose_text)
    .replace("<DIRECTIVE_TEXT>", directive_text)
    .replace("<NAME>", name)
    .replace("<USAGE>", usage)
}

#[test]
fn composes_custom_directive() {
    let type_defs_a = subgraph_type_defs(
        "subgraphA",
        r#"@link(url: "https://specs.custom.dev/foo/v1.0", import: ["@foo"])"#,
        r#"@composeDirective(name: "@foo")"#,
        "directive @foo(name: String!) on FIELD_DEFINITION",
        r#"@foo(name: "a")"#,
    );
    let type_defs_b = subgraph_type_defs("subgraphB", "", "", "", "");

    let supergraph = compose_as_fed2_subgraphs(&[
        ServiceDefinition {
            name: "subgraphA",
            type_defs: &type_defs_a,
        },
        ServiceDefinition {
            name: "subgraphB",
            type_defs: &type_defs_b,
        },
    ])
    .expect("composes");

    let schema = supergraph.schema();
    let definition = schema
        .directive_definitions
        .get(&Name::new_unchecked("foo"))
        .expect("@foo is defined in the supergraph");
    assert_eq!(
        definition.to_string().trim(),
        "directive @foo(name: String!) on FIELD_DEFINITION"
    );
    assert!(
        schema
            .to_string()
            .contains(r#"@link(url: "https://specs.custom.dev/foo/v1.0", import: ["@foo"])"#),
        "Schema does not contain expected @link directive"
    );
    let field = schema.type_field("User", "subgraphA").expect("User.subgraphA");
    let foo: Vec<String> = field
        .directives
        .get_all("foo")
        .map(|directive| directive.to_string())
        .collect();
    assert_eq!(foo, [r#"@foo(name: "a")"#]);
}

#[test]
fn custom_directive_without_compose_directive_is_dropped() {
    let type_defs_a = subgraph_type_defs(
        "subgraphA",
        r#"@link(url: "https://specs.custom.dev/foo/v1.0", import: ["@foo"])"#,
        "",
        "directive @foo(name: String!) on FIELD_DEFINITION",
        r#"@foo(name: "a")"#,
    );
    let type_defs_b = subgraph_type_defs("subgraphB", "", "", "", "");

    let supergraph = compose_as_fed2_subgraphs(&[
        ServiceDefinition {
            name: "subgraphA",
            type_defs: &type_defs_a,
        },
        ServiceDefinition {
            name: "subgraphB",
            type_defs: &type_defs_b,
        },
    ])
    .expect("composes");
    let schema = supergraph.schema();
    assert!(!schema.directive_definitions.contains_key("foo"));
    let field = schema.type_field("User", "subgraphA").expect("User.subgraphA");
    assert!(!field.directives.has("foo"));
}

#[rstest]
#[case("@tag")]
#[case("@inaccessible")]
fn hints_for_default_composed_federation_directives(#[case] directive: &str) {
    let type_defs_a = subgraph_type_defs(
        "subgraphA",
        "",
        &format!("@composeDirective(name: \"{directive}\")"),
        "",
        "",
    );
    let type_defs_b = subgraph_type_defs("subgraphB", "", "", "", "");

    let result = compose_as_fed2_subgraphs(&[
        ServiceDefinition {
            name: "subgraphA",
            type_defs: &type_defs_a,
        },
        ServiceDefinition {
            name: "subgraphB",
            type_defs: &type_defs_b,
        },
    ]);
    assert_eq!(
        hints(&result),
        [(
            "DIRECTIVE_COMPOSITION_INFO".to_owned(),
            format!(
                "Directive \"{directive}\" should not be explicitly manually composed since it is a federation directive composed by default"
            )
        )]
    );
}

#[test]
fn errors_when_name_lacks_leading_at() {
    let type_defs_a = subgraph_type_defs(
        "subgraphA",
        r#"@link(url: "https://specs.custom.dev/foo/v1.0", import: ["@foo"])"#,
        r#"@composeDirective(name: "foo")"#,
        "directive @foo(name: String!) on FIELD_DEFINITION",
        r#"@foo(name: "a")"#,
    );
    let type_defs_b = subgraph_type_defs("subgraphB", "", "", "", "");

    let result = compose_as_fed2_subgraphs(&[
        ServiceDefinition {
            name: "subgraphA",
            type_defs: &type_defs_a,
        },
        ServiceDefinition {
            name: "subgraphB",
            type_defs: &type_defs_b,
        },
    ]);
    assert_eq!(
        errors(&result),
        [(
            "DIRECTIVE_COMPOSITION_ERROR".to_owned(),
            r#"Argument to @composeDirective "foo" in subgraph "subgraphA" must have a leading "@""#
                .to_owned()
        )]
    );
}

#[test]
fn errors_when_directive_is_not_from_a_core_feature() {
    let type_defs_a = subgraph_type_defs(
        "subgraphA",
        "",
        r#"@composeDirective(name: "@foo")"#,
        "directive @foo(name: String!) on FIELD_DEFINITION",
        r#"@foo(name: "a")"#,
    );
    let type_defs_b = subgraph_type_defs("subgraphB", "", "", "", "");

    let result = compose_as_fed2_subgraphs(&[
        ServiceDefinition {
            name: "subgraphA",
            type_defs: &type_defs_a,
        },
        ServiceDefinition {
            name: "subgraphB",
            type_defs: &type_defs_b,
        },
    ]);
    assert_eq!(
        errors(&result),
        [(
            "DIRECTIVE_COMPOSITION_ERROR".to_owned(),
            r#"Directive "@foo" in subgraph "subgraphA" cannot be composed because it is not a member of a core feature"#
                .to_owned()
        )]
    );
}
