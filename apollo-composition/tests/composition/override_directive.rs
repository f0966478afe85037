use pretty_assertions::assert_eq;
use rstest::rstest;

use super::ServiceDefinition;
use super::compose_as_fed2_subgraphs;
use super::errors;
use super::hints;

fn join_fields(
    supergraph: &apollo_composition::Supergraph<apollo_composition::supergraph::Satisfiable>,
    type_name: &str,
    field_name: &str,
) -> Vec<String> {
    supergraph
        .schema()
        .type_field(type_name, field_name)
        .expect("field is merged")
        .directives
        .get_all("join__field")
        .map(|directive| directive.to_string())
        .collect()
}

#[test]
fn override_whole_field() {
    let subgraph1 = ServiceDefinition {
        name: "Subgraph1",
        type_defs: r#"
            type Query {
                t: T
            }

            type T @key(fields: "k") {
                k: ID
                a: Int @override(from: "Subgraph2")
            }
        "#,
    };
    let subgraph2 = ServiceDefinition {
        name: "Subgraph2",
        type_defs: r#"
            type T @key(fields: "k") {
                k: ID
                a: Int
                b: Int
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph1, subgraph2]);
    assert_eq!(
        hints(&result),
        [(
            "OVERRIDDEN_FIELD_CAN_BE_REMOVED".to_owned(),
            r#"Field "T.a" on subgraph "Subgraph2" is overridden. Consider removing it."#.to_owned()
        )]
    );
    let supergraph = result.expect("composes");
    assert_eq!(
        join_fields(&supergraph, "T", "a"),
        [r#"@join__field(graph: SUBGRAPH1, override: "Subgraph2")"#]
    );
    // The overridden definition is gone from the extracted subgraph.
    let subgraphs = supergraph.extract_subgraphs().expect("extracts");
    let subgraph2 = subgraphs
        .iter()
        .find(|subgraph| subgraph.name == "Subgraph2")
        .expect("Subgraph2 is extracted");
    assert!(subgraph2.schema().type_field("T", "a").is_err());
    assert!(subgraph2.schema().type_field("T", "b").is_ok());
}

#[test]
fn override_field_still_used_in_a_key() {
    let subgraph1 = ServiceDefinition {
        name: "Subgraph1",
        type_defs: r#"
            type Query {
                t: T
            }

            type T @key(fields: "k") {
                k: ID @override(from: "Subgraph2")
                a: Int
            }
        "#,
    };
    let subgraph2 = ServiceDefinition {
        name: "Subgraph2",
        type_defs: r#"
            type T @key(fields: "k") {
                k: ID
                b: Int
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph1, subgraph2]);
    assert_eq!(
        hints(&result),
        [(
            "OVERRIDDEN_FIELD_CAN_BE_REMOVED".to_owned(),
            r#"Field "T.k" on subgraph "Subgraph2" is overridden. It is still used in some federation directive(s) (@key, @requires, and/or @provides) and/or to satisfy interface constraint(s), but consider marking it @external explicitly or removing it along with its references."#.to_owned()
        )]
    );
    let supergraph = result.expect("composes");
    assert_eq!(
        join_fields(&supergraph, "T", "k"),
        [
            r#"@join__field(graph: SUBGRAPH1, override: "Subgraph2")"#,
            "@join__field(graph: SUBGRAPH2, usedOverridden: true)",
        ]
    );
}

#[test]
fn override_from_unknown_subgraph_is_a_hint() {
    let subgraph1 = ServiceDefinition {
        name: "Subgraph1",
        type_defs: r#"
            type Query {
                t: T
            }

            type T @key(fields: "k") {
                k: ID
                a: Int @override(from: "Subgraph3")
            }
        "#,
    };
    let subgraph2 = ServiceDefinition {
        name: "Subgraph2",
        type_defs: r#"
            type T @key(fields: "k") {
                k: ID
                b: Int
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph1, subgraph2]);
    let hints = hints(&result);
    assert_eq!(hints.len(), 1);
    assert_eq!(hints[0].0, "FROM_SUBGRAPH_DOES_NOT_EXIST");
    assert!(
        hints[0]
            .1
            .starts_with(r#"Source subgraph "Subgraph3" for field "T.a" on subgraph "Subgraph1" does not exist."#),
        "{}",
        hints[0].1
    );
}

#[test]
fn override_from_self_errors() {
    let subgraph1 = ServiceDefinition {
        name: "Subgraph1",
        type_defs: r#"
            type Query {
                t: T
            }

            type T @key(fields: "k") {
                k: ID
                a: Int @override(from: "Subgraph1")
            }
        "#,
    };
    let subgraph2 = ServiceDefinition {
        name: "Subgraph2",
        type_defs: r#"
            type T @key(fields: "k") {
                k: ID
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph1, subgraph2]);
    assert_eq!(
        errors(&result),
        [(
            "OVERRIDE_FROM_SELF_ERROR".to_owned(),
            r#"Source and destination subgraphs "Subgraph1" are the same for overridden field "T.a""#.to_owned()
        )]
    );
}

#[test]
fn override_in_both_subgraphs_errors() {
    let subgraph1 = ServiceDefinition {
        name: "Subgraph1",
        type_defs: r#"
            type Query {
                t: T
            }

            type T @key(fields: "k") {
                k: ID
                a: Int @override(from: "Subgraph2")
            }
        "#,
    };
    let subgraph2 = ServiceDefinition {
        name: "Subgraph2",
        type_defs: r#"
            type T @key(fields: "k") {
                k: ID
                a: Int @override(from: "Subgraph1")
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph1, subgraph2]);
    // Neither definition ends up overridden, so the field is also reported as non-shareable.
    assert_eq!(
        errors(&result)[..2],
        [
            (
                "OVERRIDE_SOURCE_HAS_OVERRIDE".to_owned(),
                r#"Field "T.a" on subgraph "Subgraph1" is also marked with directive @override in subgraph "Subgraph2". Only one @override directive is allowed per field."#.to_owned()
            ),
            (
                "OVERRIDE_SOURCE_HAS_OVERRIDE".to_owned(),
                r#"Field "T.a" on subgraph "Subgraph2" is also marked with directive @override in subgraph "Subgraph1". Only one @override directive is allowed per field."#.to_owned()
            ),
        ]
    );
}

#[test]
fn override_collides_with_requires_in_source() {
    let subgraph1 = ServiceDefinition {
        name: "Subgraph1",
        type_defs: r#"
            type Query {
                t: T
            }

            type T @key(fields: "k") {
                k: ID
                a: Int @override(from: "Subgraph2")
            }
        "#,
    };
    let subgraph2 = ServiceDefinition {
        name: "Subgraph2",
        type_defs: r#"
            type T @key(fields: "k") {
                k: ID
                b: Int @external
                a: Int @requires(fields: "b")
            }
        "#,
    };
    let subgraph3 = ServiceDefinition {
        name: "Subgraph3",
        type_defs: r#"
            type T @key(fields: "k") {
                k: ID
                b: Int
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph1, subgraph2, subgraph3]);
    assert_eq!(
        errors(&result).first(),
        Some(&(
            "OVERRIDE_COLLISION_WITH_ANOTHER_DIRECTIVE".to_owned(),
            r#"@override cannot be used on field "T.a" on subgraph "Subgraph1" since "T.a" on "Subgraph2" is marked with directive "@requires""#.to_owned()
        ))
    );
}

#[test]
fn override_on_interface_object_field_errors() {
    let subgraph1 = ServiceDefinition {
        name: "Subgraph1",
        type_defs: r#"
            type Query {
                i1: I
            }

            type I @interfaceObject @key(fields: "k") {
                k: ID
                a: Int @override(from: "Subgraph2")
            }
        "#,
    };
    let subgraph2 = ServiceDefinition {
        name: "Subgraph2",
        type_defs: r#"
            type Query {
                i2: I
            }

            interface I @key(fields: "k") {
                k: ID
                a: Int
            }

            type A implements I @key(fields: "k") {
                k: ID
                a: Int
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph1, subgraph2]);
    assert!(
        errors(&result).contains(&(
            "OVERRIDE_COLLISION_WITH_ANOTHER_DIRECTIVE".to_owned(),
            r#"@override is not yet supported on fields of @interfaceObject types: cannot be used on field "I.a" on subgraph "Subgraph1"."#.to_owned()
        )),
        "{:#?}",
        errors(&result)
    );
}

#[rstest]
#[case::percent("percent(5)")]
#[case::fractional_percent("percent(33.33)")]
#[case::hundred_percent("percent(100)")]
#[case::plain("foo")]
#[case::with_separators("foo:bar-baz/qux.1_2")]
fn progressive_override_with_valid_label(#[case] label: &str) {
    let type_defs = format!(
        r#"
            type Query {{
                t: T
            }}

            type T @key(fields: "k") {{
                k: ID
                a: Int @override(from: "Subgraph2", label: "{label}")
            }}
        "#
    );
    let subgraph1 = ServiceDefinition {
        name: "Subgraph1",
        type_defs: &type_defs,
    };
    let subgraph2 = ServiceDefinition {
        name: "Subgraph2",
        type_defs: r#"
            type T @key(fields: "k") {
                k: ID
                a: Int
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph1, subgraph2]);
    let codes: Vec<String> = hints(&result).into_iter().map(|(code, _)| code).collect();
    assert!(codes.contains(&"OVERRIDE_MIGRATION_IN_PROGRESS".to_owned()));
    let supergraph = result.expect("composes");
    assert_eq!(
        join_fields(&supergraph, "T", "a"),
        [
            format!(
                r#"@join__field(graph: SUBGRAPH1, override: "Subgraph2", overrideLabel: "{label}")"#
            ),
            format!(r#"@join__field(graph: SUBGRAPH2, overrideLabel: "{label}")"#),
        ]
    );
}

#[rstest]
#[case::starts_with_digit("1foo")]
#[case::percent_too_large("percent(101)")]
#[case::percent_too_precise("percent(5.123456789)")]
#[case::with_space("foo bar")]
fn progressive_override_with_invalid_label(#[case] label: &str) {
    let type_defs = format!(
        r#"
            type Query {{
                t: T
            }}

            type T @key(fields: "k") {{
                k: ID
                a: Int @override(from: "Subgraph2", label: "{label}")
            }}
        "#
    );
    let subgraph1 = ServiceDefinition {
        name: "Subgraph1",
        type_defs: &type_defs,
    };
    let subgraph2 = ServiceDefinition {
        name: "Subgraph2",
        type_defs: r#"
            type T @key(fields: "k") {
                k: ID
                a: Int
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph1, subgraph2]);
    assert_eq!(
        errors(&result),
        [(
            "OVERRIDE_LABEL_INVALID".to_owned(),
            format!(
                r#"Invalid @override label "{label}" on field "T.a" on subgraph "Subgraph1": labels must start with a letter and after that may contain alphanumerics, underscores, minuses, colons, periods, or slashes. Alternatively, labels may be of the form "percent(x)" where x is a float between 0-100 inclusive."#
            )
        )]
    );
}

#[test]
#[ignore = "overriding a whole type is not supported"]
fn override_whole_type() {
    let subgraph1 = ServiceDefinition {
        name: "Subgraph1",
        type_defs: r#"
            type Query {
                t: T
            }

            type T @key(fields: "k") @override(from: "Subgraph2") {
                k: ID
                a: Int
            }
        "#,
    };
    let subgraph2 = ServiceDefinition {
        name: "Subgraph2",
        type_defs: r#"
            type T @key(fields: "k") {
                k: ID
                a: Int
            }
        "#,
    };

    let supergraph = compose_as_fed2_subgraphs(&[subgraph1, subgraph2]).expect("composes");
    assert_eq!(
        join_fields(&supergraph, "T", "a"),
        [r#"@join__field(graph: SUBGRAPH1, override: "Subgraph2")"#]
    );
}
