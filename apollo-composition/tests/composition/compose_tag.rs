use pretty_assertions::assert_eq;

use super::ServiceDefinition;
use super::compose_as_fed2_subgraphs;

fn tags(directives: &apollo_compiler::ast::DirectiveList) -> Vec<String> {
    directives
        .get_all("tag")
        .map(|directive| directive.to_string())
        .collect()
}

#[test]
fn tags_are_merged_on_every_kind_of_element() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                t: T @tag(name: "on-field")
                e(arg: Int @tag(name: "on-argument")): E
            }

            type T @key(fields: "id") @tag(name: "on-object") {
                id: ID!
            }

            enum E @tag(name: "on-enum") {
                A @tag(name: "on-enum-value")
                B
            }
        "#,
    };

    let supergraph = compose_as_fed2_subgraphs(&[subgraph_a]).expect("composes");
    let schema = supergraph.schema();
    let query_t = schema.type_field("Query", "t").expect("Query.t");
    assert_eq!(tags(&query_t.directives), [r#"@tag(name: "on-field")"#]);
    let query_e = schema.type_field("Query", "e").expect("Query.e");
    let arg = query_e.argument_by_name("arg").expect("Query.e(arg:)");
    assert_eq!(tags(&arg.directives), [r#"@tag(name: "on-argument")"#]);

    let Some(apollo_compiler::schema::ExtendedType::Object(t)) = schema.types.get("T") else {
        panic!("T is an object");
    };
    let t_tags: Vec<String> = t
        .directives
        .get_all("tag")
        .map(|directive| directive.to_string())
        .collect();
    assert_eq!(t_tags, [r#"@tag(name: "on-object")"#]);

    let Some(apollo_compiler::schema::ExtendedType::Enum(e)) = schema.types.get("E") else {
        panic!("E is an enum");
    };
    let e_tags: Vec<String> = e
        .directives
        .get_all("tag")
        .map(|directive| directive.to_string())
        .collect();
    assert_eq!(e_tags, [r#"@tag(name: "on-enum")"#]);
    let value = e.values.get("A").expect("E.A");
    assert_eq!(tags(&value.directives), [r#"@tag(name: "on-enum-value")"#]);
}

#[test]
fn tags_from_different_subgraphs_are_all_kept() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                shared: Int @shareable @tag(name: "a")
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type Query {
                shared: Int @shareable @tag(name: "b") @tag(name: "a")
            }
        "#,
    };

    let supergraph = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]).expect("composes");
    let field = supergraph
        .schema()
        .type_field("Query", "shared")
        .expect("Query.shared");
    assert_eq!(
        tags(&field.directives),
        [r#"@tag(name: "a")"#, r#"@tag(name: "b")"#]
    );
}

#[test]
fn tag_feature_is_linked_in_supergraph() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                q: Int @tag(name: "public")
            }
        "#,
    };

    let supergraph = compose_as_fed2_subgraphs(&[subgraph_a]).expect("composes");
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
            .any(|link| link.contains("https://specs.apollo.dev/tag/v0.3")),
        "{links:?}"
    );
    assert!(supergraph.schema().directive_definitions.contains_key("tag"));
}
