use pretty_assertions::assert_eq;
use rstest::rstest;

use super::ServiceDefinition;
use super::compose_as_fed2_subgraphs;
use super::hints;

/// Applies each usage to the shared `T.f` field of its own subgraph, composes, and returns the
/// applications of `directive` on the merged field.
fn merged_applications(directive: &str, usages: &[&str]) -> (Vec<String>, Vec<String>) {
    let type_defs: Vec<String> = usages
        .iter()
        .enumerate()
        .map(|(index, usage)| {
            format!(
                r#"
                type Query {{
                    t{index}: T
                }}

                type T @key(fields: "k") {{
                    k: ID
                    f: [String] @shareable {usage}
                }}
                "#
            )
        })
        .collect();
    let names: Vec<String> = (0..usages.len()).map(|index| format!("subgraph{index}")).collect();
    let services: Vec<ServiceDefinition<'_>> = names
        .iter()
        .zip(&type_defs)
        .map(|(name, type_defs)| ServiceDefinition { name, type_defs })
        .collect();

    let result = compose_as_fed2_subgraphs(&services);
    let hint_codes = hints(&result).into_iter().map(|(code, _)| code).collect();
    let supergraph = result.expect("composes");
    let applications = supergraph
        .schema()
        .type_field("T", "f")
        .expect("T.f is merged")
        .directives
        .get_all(directive)
        .map(|application| application.to_string())
        .collect();
    (applications, hint_codes)
}

#[rstest]
#[case::cost_max(
    "cost",
    &["@cost(weight: 3)", "@cost(weight: 7)", "@cost(weight: 5)"],
    "@cost(weight: 7)"
)]
#[case::requires_scopes_union(
    "requiresScopes",
    &[r#"@requiresScopes(scopes: [["a"], ["b"]])"#, r#"@requiresScopes(scopes: [["b"], ["c"]])"#],
    r#"@requiresScopes(scopes: [["a"], ["b"], ["c"]])"#
)]
#[case::policy_union(
    "policy",
    &[r#"@policy(policies: [["p1"]])"#, r#"@policy(policies: [["p2"]])"#],
    r#"@policy(policies: [["p1"], ["p2"]])"#
)]
#[case::list_size_nullable_max(
    "listSize",
    &["@listSize(assumedSize: 10)", "@listSize(assumedSize: 42)"],
    "@listSize(assumedSize: 42)"
)]
#[case::list_size_nullable_union(
    "listSize",
    &[r#"@listSize(sizedFields: ["a"])"#, r#"@listSize(sizedFields: ["b", "a"])"#],
    r#"@listSize(sizedFields: ["a", "b"])"#
)]
fn merges_arguments_with_their_strategy(
    #[case] directive: &str,
    #[case] usages: &[&str],
    #[case] expected: &str,
) {
    let (applications, hint_codes) = merged_applications(directive, usages);
    assert_eq!(applications, [expected]);
    assert!(
        hint_codes.contains(&"MERGED_NON_REPEATABLE_DIRECTIVE_ARGUMENTS".to_owned()),
        "{hint_codes:?}"
    );
}

#[test]
fn same_arguments_everywhere_need_no_strategy() {
    let (applications, hint_codes) =
        merged_applications("cost", &["@cost(weight: 3)", "@cost(weight: 3)"]);
    assert_eq!(applications, ["@cost(weight: 3)"]);
    assert!(
        !hint_codes.contains(&"MERGED_NON_REPEATABLE_DIRECTIVE_ARGUMENTS".to_owned()),
        "{hint_codes:?}"
    );
}

#[test]
fn application_in_a_single_subgraph_is_kept_as_is() {
    let (applications, _) = merged_applications("cost", &["@cost(weight: 3)", ""]);
    assert_eq!(applications, ["@cost(weight: 3)"]);
}
