use pretty_assertions::assert_eq;

use super::ServiceDefinition;
use super::compose_as_fed2_subgraphs;
use super::errors;
use super::hints;

#[test]
fn errors_on_mismatched_type_kinds() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                a: T
            }

            type T {
                x: Int
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type Query {
                b: T
            }

            interface T {
                x: Int
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    assert_eq!(
        errors(&result).first(),
        Some(&(
            "TYPE_KIND_MISMATCH".to_owned(),
            r#"Type "T" has mismatched kind: it is defined as Object Type in subgraph "subgraphA" but Interface Type in subgraph "subgraphB""#.to_owned()
        ))
    );
}

#[test]
fn errors_on_incompatible_field_types() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                f: String @shareable
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type Query {
                f: Int @shareable
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    assert_eq!(
        errors(&result),
        [(
            "FIELD_TYPE_MISMATCH".to_owned(),
            r#"Type of field "Query.f" is incompatible across subgraphs: it has type "String" in subgraph "subgraphA" but type "Int" in subgraph "subgraphB""#.to_owned()
        )]
    );
}

#[test]
fn hints_on_compatible_field_types() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                f: String! @shareable
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type Query {
                f: String @shareable
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    let hints = hints(&result);
    assert_eq!(hints.len(), 1);
    assert_eq!(hints[0].0, "INCONSISTENT_BUT_COMPATIBLE_FIELD_TYPE");
    let supergraph = result.expect("composes");
    let field = supergraph
        .schema()
        .type_field("Query", "f")
        .expect("Query.f");
    assert_eq!(field.ty.to_string(), "String");
}

#[test]
fn errors_on_non_shareable_field_resolved_by_multiple_subgraphs() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                f: Int
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type Query {
                f: Int
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    assert_eq!(
        errors(&result),
        [(
            "INVALID_FIELD_SHARING".to_owned(),
            r#"Non-shareable field "Query.f" is resolved from multiple subgraphs: it is resolved from subgraphs "subgraphA" and "subgraphB" and defined as non-shareable in all of them"#.to_owned()
        )]
    );
}

#[test]
fn errors_when_shareable_only_in_some_subgraphs() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                f: Int @shareable
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type Query {
                f: Int
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    assert_eq!(
        errors(&result),
        [(
            "INVALID_FIELD_SHARING".to_owned(),
            r#"Non-shareable field "Query.f" is resolved from multiple subgraphs: it is resolved from subgraphs "subgraphA" and "subgraphB" and defined as non-shareable in subgraph "subgraphB""#.to_owned()
        )]
    );
}

#[test]
fn errors_on_required_argument_missing_in_some_subgraphs() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                f(x: Int!): Int @shareable
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type Query {
                f: Int @shareable
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    assert_eq!(
        errors(&result),
        [(
            "REQUIRED_ARGUMENT_MISSING_IN_SOME_SUBGRAPH".to_owned(),
            r#"Argument "Query.f(x:)" is required in some subgraphs but does not appear in all subgraphs: it is required in subgraph "subgraphA" but does not appear in subgraph "subgraphB""#.to_owned()
        )]
    );
}

#[test]
fn optional_argument_missing_in_some_subgraphs_is_dropped() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                f(x: Int): Int @shareable
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type Query {
                f: Int @shareable
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    assert_eq!(
        hints(&result),
        [(
            "INCONSISTENT_ARGUMENT_PRESENCE".to_owned(),
            r#"Optional argument "Query.f(x:)" will not be included in the supergraph as it does not appear in all subgraphs: it is defined in subgraph "subgraphA" but not in subgraph "subgraphB"."#.to_owned()
        )]
    );
    let supergraph = result.expect("composes");
    let field = supergraph
        .schema()
        .type_field("Query", "f")
        .expect("Query.f");
    assert!(field.arguments.is_empty());
}

#[test]
fn errors_on_inconsistent_enum_used_as_input_and_output() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                f(e: E): E @shareable
            }

            enum E {
                V1
                V2
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type Query {
                f(e: E): E @shareable
            }

            enum E {
                V1
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    assert_eq!(
        errors(&result),
        [(
            "ENUM_VALUE_MISMATCH".to_owned(),
            r#"Enum type "E" is used as both input type (for example, as type of "Query.f(e:)") and output type (for example, as type of "Query.f"), but value "V2" is not defined in all the subgraphs defining "E": "V2" is defined in subgraph "subgraphA" but not in subgraph "subgraphB""#.to_owned()
        )]
    );
}

#[test]
fn output_enum_values_are_unioned() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                a: E
            }

            enum E {
                V1
                V2
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type Query {
                b: E
            }

            enum E {
                V1
                V3
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    let codes: Vec<String> = hints(&result).into_iter().map(|(code, _)| code).collect();
    assert_eq!(
        codes,
        [
            "INCONSISTENT_ENUM_VALUE_FOR_OUTPUT_ENUM",
            "INCONSISTENT_ENUM_VALUE_FOR_OUTPUT_ENUM"
        ]
    );
    let supergraph = result.expect("composes");
    let Some(apollo_compiler::schema::ExtendedType::Enum(e)) = supergraph.schema().types.get("E")
    else {
        panic!("E is an enum");
    };
    let values: Vec<&str> = e.values.keys().map(|value| value.as_str()).collect();
    assert_eq!(values, ["V1", "V2", "V3"]);
}

#[test]
fn errors_on_empty_merged_input_type() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                f(i: I): Int @shareable
            }

            input I {
                a: Int
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type Query {
                f(i: I): Int @shareable
            }

            input I {
                b: Int
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    assert_eq!(
        errors(&result),
        [(
            "EMPTY_MERGED_INPUT_TYPE".to_owned(),
            r#"None of the fields of input object type "I" are consistently defined in all the subgraphs defining that type. As only fields common to all subgraphs are merged, the input object type intersection is empty."#.to_owned()
        )]
    );
}

#[test]
fn enum_only_used_as_argument_type_of_dropped_argument_is_an_output_enum() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                f(e: E): E @shareable
            }

            enum E {
                X
                Y
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type Query {
                f: E @shareable
            }

            enum E {
                X
                Z
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    let codes: Vec<String> = hints(&result).into_iter().map(|(code, _)| code).collect();
    assert_eq!(
        codes,
        [
            "INCONSISTENT_ARGUMENT_PRESENCE",
            "INCONSISTENT_ENUM_VALUE_FOR_OUTPUT_ENUM",
            "INCONSISTENT_ENUM_VALUE_FOR_OUTPUT_ENUM"
        ]
    );
    let supergraph = result.expect("composes");
    let Some(apollo_compiler::schema::ExtendedType::Enum(e)) = supergraph.schema().types.get("E")
    else {
        panic!("E is an enum");
    };
    let values: Vec<&str> = e.values.keys().map(|value| value.as_str()).collect();
    assert_eq!(values, ["X", "Y", "Z"]);
}

#[test]
fn argument_types_merge_to_the_most_restrictive_type() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                f(x: String): String @shareable
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type Query {
                f(x: String!): String @shareable
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    let hints = hints(&result);
    assert_eq!(hints.len(), 1, "{hints:#?}");
    let (code, message) = &hints[0];
    assert_eq!(code, "INCONSISTENT_BUT_COMPATIBLE_ARGUMENT_TYPE");
    assert!(
        message.starts_with(
            r#"Type of argument "Query.f(x:)" is inconsistent but compatible across subgraphs: "#
        ),
        "{message}"
    );
    let supergraph = result.expect("composes");
    let field = supergraph
        .schema()
        .type_field("Query", "f")
        .expect("Query.f");
    let argument = field.argument_by_name("x").expect("Query.f(x:)");
    assert_eq!(argument.ty.to_string(), "String!");
}

#[test]
fn default_value_defined_in_some_subgraphs_is_dropped() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                f(x: Int = 1): Int @shareable
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type Query {
                f(x: Int): Int @shareable
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    let hints = hints(&result);
    assert_eq!(hints.len(), 1, "{hints:#?}");
    let (code, message) = &hints[0];
    assert_eq!(code, "INCONSISTENT_DEFAULT_VALUE_PRESENCE");
    assert!(
        message.starts_with(
            r#"Argument "Query.f(x:)" has a default value in only some subgraphs: "#
        ),
        "{message}"
    );
    assert!(
        message.contains(r#"has default value 1 in subgraph "subgraphA""#),
        "{message}"
    );
    let supergraph = result.expect("composes");
    let field = supergraph
        .schema()
        .type_field("Query", "f")
        .expect("Query.f");
    let argument = field.argument_by_name("x").expect("Query.f(x:)");
    assert!(argument.default_value.is_none());
}

#[test]
fn errors_on_incompatible_default_values() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                f(x: Int = 1): Int @shareable
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type Query {
                f(x: Int = 2): Int @shareable
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    let errors = errors(&result);
    let (code, message) = errors.first().expect("an error");
    assert_eq!(code, "FIELD_ARGUMENT_DEFAULT_MISMATCH");
    assert!(
        message.starts_with(
            r#"Argument "Query.f(x:)" has incompatible default values across subgraphs: it has "#
        ),
        "{message}"
    );
    assert!(message.contains("default value 1"), "{message}");
    assert!(message.contains("default value 2"), "{message}");
}

#[test]
fn input_enum_values_are_intersected() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                f(e: E): Int @shareable
            }

            enum E {
                X
                Y
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type Query {
                f(e: E): Int @shareable
            }

            enum E {
                X
                Z
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    let hints = hints(&result);
    let codes: Vec<&str> = hints.iter().map(|(code, _)| code.as_str()).collect();
    assert_eq!(
        codes,
        [
            "INCONSISTENT_ENUM_VALUE_FOR_INPUT_ENUM",
            "INCONSISTENT_ENUM_VALUE_FOR_INPUT_ENUM"
        ]
    );
    assert!(
        hints[0].1.starts_with(
            r#"Value "Y" of enum type "E" will not be part of the supergraph as it is not defined in all the subgraphs defining "E": "#
        ),
        "{}",
        hints[0].1
    );
    let supergraph = result.expect("composes");
    let Some(apollo_compiler::schema::ExtendedType::Enum(e)) = supergraph.schema().types.get("E")
    else {
        panic!("E is an enum");
    };
    let values: Vec<&str> = e.values.keys().map(|value| value.as_str()).collect();
    assert_eq!(values, ["X"]);
}

#[test]
fn errors_on_empty_merged_enum_type() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                f(e: E): Int @shareable
            }

            enum E {
                Y
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type Query {
                f(e: E): Int @shareable
            }

            enum E {
                Z
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    let errors = errors(&result);
    assert!(
        errors.contains(&(
            "EMPTY_MERGED_ENUM_TYPE".to_owned(),
            r#"None of the values of enum type "E" are defined consistently in all the subgraphs defining that type. As only values common to all subgraphs are merged, this would result in an empty type."#.to_owned()
        )),
        "{errors:#?}"
    );
}

#[test]
fn hints_on_type_that_is_an_entity_in_some_subgraphs_only() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                t: T
            }

            type T @key(fields: "id") {
                id: ID!
                a: Int @shareable
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type Query {
                other: T
            }

            type T {
                id: ID! @shareable
                a: Int @shareable
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    let hints = hints(&result);
    let entity_hints: Vec<&(String, String)> = hints
        .iter()
        .filter(|(code, _)| code == "INCONSISTENT_ENTITY")
        .collect();
    assert_eq!(entity_hints.len(), 1, "{hints:#?}");
    assert!(
        entity_hints[0].1.starts_with(
            r#"Type "T" is declared as an entity (has a @key applied) in some but not all defining subgraphs: "#
        ),
        "{}",
        entity_hints[0].1
    );
}

#[test]
fn input_field_missing_in_some_subgraphs_is_dropped() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                f(i: I): Int @shareable
            }

            input I {
                a: Int
                b: Int
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type Query {
                f(i: I): Int @shareable
            }

            input I {
                a: Int
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    let hints = hints(&result);
    assert_eq!(hints.len(), 1, "{hints:#?}");
    let (code, message) = &hints[0];
    assert_eq!(code, "INCONSISTENT_INPUT_OBJECT_FIELD");
    assert!(
        message.starts_with(
            r#"Input object field "b" will not be added to "I" in the supergraph as it does not appear in all subgraphs: "#
        ),
        "{message}"
    );
    let supergraph = result.expect("composes");
    let Some(apollo_compiler::schema::ExtendedType::InputObject(input)) =
        supergraph.schema().types.get("I")
    else {
        panic!("I is an input object");
    };
    let fields: Vec<&str> = input.fields.keys().map(|name| name.as_str()).collect();
    assert_eq!(fields, ["a"]);
}

#[test]
fn errors_on_interface_field_missing_in_implementation() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                i: I
            }

            interface I {
                x: Int
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            interface I {
                y: Int
            }

            type T implements I {
                y: Int
            }
        "#,
    };

    let result = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]);
    assert_eq!(
        errors(&result).first(),
        Some(&(
            "INTERFACE_FIELD_NO_IMPLEM".to_owned(),
            r#"Interface field "I.x" is declared in subgraph "subgraphA" but type "T", which implements "I" only in subgraph "subgraphB" does not have field "x"."#.to_owned()
        ))
    );
}
