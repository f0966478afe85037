use std::ops::Range;
use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::parser::SourceMap;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::name;
use apollo_compiler::parser::LineColumn;
use apollo_compiler::schema::DirectiveDefinition;
use tracing::debug;

use crate::error::ErrorCode;
use crate::link::Import;
use crate::link::Link;
use crate::link::federation_spec_definition::FEDERATION_NAME_ARGUMENT_NAME;
use crate::link::spec::APOLLO_SPEC_DOMAIN;
use crate::link::spec::Identity;
use crate::merger::Sources;
use crate::merger::error_reporter::ErrorReporter;
use crate::merger::error_reporter::Mismatch;
use crate::merger::error_reporter::SourceLocated;
use crate::merger::hints::HintCode;
use crate::schema::directive_optional_string_argument;
use crate::subgraph::Subgraph;
use crate::subgraph::Validated;
use crate::supergraph::CompositionHint;
use crate::utils::suggestion::did_you_mean;
use crate::utils::suggestion::suggestion_list;

/// Apollo directives that are always composed, making `@composeDirective` on them redundant.
const DEFAULT_COMPOSED_DIRECTIVES: [Name; 5] = [
    name!("tag"),
    name!("inaccessible"),
    name!("authenticated"),
    name!("requiresScopes"),
    name!("policy"),
];

/// Decides which custom directives named by `@composeDirective` make it to the supergraph, and
/// with which definition.
#[derive(Debug, Default)]
pub(crate) struct ComposeDirectiveManager {
    /// Per subgraph index, the names (as in that subgraph) of the directives to compose.
    merge_directives: IndexMap<usize, IndexSet<Name>>,
    /// Keyed by the name the directive has in the subgraphs composing it.
    latest_directive_definitions: IndexMap<Name, Node<DirectiveDefinition>>,
    /// The highest linked version of each composed feature.
    latest_features: IndexMap<Identity, Arc<Link>>,
    /// Per feature, the composed directives by original name, with their name in the schema.
    directives_for_feature: IndexMap<Identity, IndexMap<Name, Name>>,
}

#[derive(Clone, Debug)]
struct MergeDirectiveItem {
    subgraph: usize,
    definition: Node<DirectiveDefinition>,
    link: Arc<Link>,
    import: Option<Arc<Import>>,
}

impl MergeDirectiveItem {
    fn identity(&self) -> &Identity {
        &self.link.url.identity
    }

    /// The name of the directive in its specification.
    fn original_directive_name(&self) -> Name {
        if let Some(import) = &self.import {
            return import.element.clone();
        }
        let spec_name = self.link.spec_name_in_schema();
        if self.definition.name == *spec_name {
            return self.link.url.identity.name.clone();
        }
        self.definition
            .name
            .strip_prefix(&format!("{spec_name}__"))
            .and_then(|name| Name::new(name).ok())
            .unwrap_or_else(|| self.definition.name.clone())
    }

    fn aliased_directive_name(&self) -> &Name {
        &self.definition.name
    }
}

impl SourceLocated for MergeDirectiveItem {
    fn source_range(&self, sources: &SourceMap) -> Option<Range<LineColumn>> {
        self.definition.line_column_range(sources)
    }
}

impl ComposeDirectiveManager {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The non-Apollo features with composed directives, each with the composed directives as
    /// original name to name in the supergraph.
    pub(crate) fn all_composed_core_features(&self) -> Vec<(Arc<Link>, IndexMap<Name, Name>)> {
        self.latest_features
            .iter()
            .filter(|(identity, _)| identity.domain != APOLLO_SPEC_DOMAIN)
            .map(|(identity, link)| {
                (
                    Arc::clone(link),
                    self.directives_for_feature
                        .get(identity)
                        .cloned()
                        .unwrap_or_default(),
                )
            })
            .collect()
    }

    pub(crate) fn directive_exists_in_supergraph(&self, directive_name: &Name) -> bool {
        self.latest_directive_definitions.contains_key(directive_name)
    }

    /// The definition coming from the subgraph linking the latest version of the directive's
    /// feature.
    pub(crate) fn get_latest_directive_definition(
        &self,
        directive_name: &Name,
    ) -> Option<&Node<DirectiveDefinition>> {
        self.latest_directive_definitions.get(directive_name)
    }

    pub(crate) fn should_compose_directive(&self, subgraph: usize, directive_name: &Name) -> bool {
        self.merge_directives
            .get(&subgraph)
            .is_some_and(|names| names.contains(directive_name))
    }

    pub(crate) fn validate(
        &mut self,
        subgraphs: &[Subgraph<Validated>],
        error_reporter: &mut ErrorReporter,
    ) {
        let mut wont_merge_features: IndexSet<Identity> = IndexSet::default();
        let mut wont_merge_directive_names: IndexSet<Name> = IndexSet::default();
        let mut items: Vec<MergeDirectiveItem> = vec![];

        let mut tag_names: IndexMap<Name, Vec<&str>> = IndexMap::default();
        let mut inaccessible_names: IndexMap<Name, Vec<&str>> = IndexMap::default();
        for subgraph in subgraphs {
            let names = subgraph.metadata().directive_names();
            tag_names
                .entry(names.tag.clone())
                .or_default()
                .push(&subgraph.name);
            inaccessible_names
                .entry(names.inaccessible.clone())
                .or_default()
                .push(&subgraph.name);
        }

        for (index, subgraph) in subgraphs.iter().enumerate() {
            let schema = subgraph.schema();
            let metadata = subgraph.metadata();
            let applications = schema
                .schema_definition
                .directives
                .get_all(&metadata.directive_names().compose_directive);
            for application in applications {
                let name = directive_optional_string_argument(
                    application,
                    &FEDERATION_NAME_ARGUMENT_NAME,
                )
                .ok()
                .flatten()
                .unwrap_or_default();
                if name.is_empty() {
                    error_reporter.add_error(ErrorCode::DirectiveCompositionError.err(
                        format!(
                            "Argument to @composeDirective in subgraph \"{}\" cannot be NULL or an empty String",
                            subgraph.name
                        ),
                        vec![],
                    ));
                    continue;
                }
                let Some(directive_name) = name.strip_prefix('@') else {
                    error_reporter.add_error(ErrorCode::DirectiveCompositionError.err(
                        format!(
                            "Argument to @composeDirective \"{name}\" in subgraph \"{}\" must have a leading \"@\"",
                            subgraph.name
                        ),
                        vec![],
                    ));
                    continue;
                };
                let Some(definition) = schema.directive_definitions.get(directive_name) else {
                    let suggestions = suggestion_list(
                        name,
                        schema
                            .directive_definitions
                            .keys()
                            .map(|directive| format!("@{directive}")),
                    );
                    error_reporter.add_error(ErrorCode::DirectiveCompositionError.err(
                        format!(
                            "Could not find matching directive definition for argument to @composeDirective \"{name}\" in subgraph \"{}\".{}",
                            subgraph.name,
                            did_you_mean(suggestions),
                        ),
                        vec![],
                    ));
                    continue;
                };
                let Some(linked) = metadata.links().source_link_of_directive(&definition.name)
                else {
                    error_reporter.add_error(ErrorCode::DirectiveCompositionError.err(
                        format!(
                            "Directive \"{name}\" in subgraph \"{}\" cannot be composed because it is not a member of a core feature",
                            subgraph.name
                        ),
                        vec![],
                    ));
                    continue;
                };
                let item = MergeDirectiveItem {
                    subgraph: index,
                    definition: definition.clone(),
                    link: linked.link,
                    import: linked.import,
                };

                if item.identity().domain == APOLLO_SPEC_DOMAIN {
                    if DEFAULT_COMPOSED_DIRECTIVES.contains(&item.original_directive_name()) {
                        error_reporter.add_hint(CompositionHint::new(
                            HintCode::DirectiveCompositionInfo,
                            format!(
                                "Directive \"{name}\" should not be explicitly manually composed since it is a federation directive composed by default"
                            ),
                            error_reporter.location(index, &item),
                        ));
                    } else {
                        error_reporter.add_error(ErrorCode::DirectiveCompositionError.err(
                            format!(
                                "Composing federation directive \"{name}\" in subgraph \"{}\" is not supported",
                                subgraph.name
                            ),
                            vec![],
                        ));
                    }
                    continue;
                }
                let conflict = inaccessible_names
                    .get(&definition.name)
                    .map(|names| ("@inaccessible", names))
                    .or_else(|| {
                        tag_names
                            .get(&definition.name)
                            .map(|names| ("@tag", names))
                    });
                if let Some((federation_directive, conflicting_subgraphs)) = conflict {
                    error_reporter.add_error(ErrorCode::DirectiveCompositionError.err(
                        format!(
                            "Directive \"{name}\" in subgraph \"{}\" cannot be composed because it conflicts with automatically composed federation directive \"{federation_directive}\". Conflict exists in subgraph(s): ({})",
                            subgraph.name,
                            conflicting_subgraphs.join(","),
                        ),
                        vec![],
                    ));
                    continue;
                }
                items.push(item);
            }
        }

        self.resolve_feature_versions(subgraphs, &items, &mut wont_merge_features, error_reporter);

        // The same name must mean the same directive of the same feature everywhere.
        let mut by_directive_name: IndexMap<&Name, Vec<&MergeDirectiveItem>> =
            IndexMap::default();
        let mut by_original_name: IndexMap<(Identity, Name), Vec<&MergeDirectiveItem>> =
            IndexMap::default();
        for item in &items {
            by_directive_name
                .entry(item.aliased_directive_name())
                .or_default()
                .push(item);
            by_original_name
                .entry((item.identity().clone(), item.original_directive_name()))
                .or_default()
                .push(item);
        }
        for (name, items) in &by_directive_name {
            if !all_equal(items, |item| item.original_directive_name()) {
                wont_merge_directive_names.insert((*name).clone());
                error_reporter.add_error(ErrorCode::DirectiveCompositionError.err(
                    format!(
                        "Composed directive \"@{name}\" does not refer to the same directive in every subgraph"
                    ),
                    vec![],
                ));
            }
            if !all_equal(items, |item| item.identity().clone()) {
                wont_merge_directive_names.insert((*name).clone());
                error_reporter.add_error(ErrorCode::DirectiveCompositionError.err(
                    format!(
                        "Composed directive \"@{name}\" is not linked by the same core feature in every subgraph"
                    ),
                    vec![],
                ));
            }
        }

        // An exported directive must be exported under the same name everywhere.
        for ((identity, original_name), items) in &by_original_name {
            if !all_equal(items, |item| item.aliased_directive_name().clone()) {
                for item in items {
                    wont_merge_directive_names.insert(item.aliased_directive_name().clone());
                }
                let sources: Sources<MergeDirectiveItem> = (0..subgraphs.len())
                    .map(|index| {
                        let item = items.iter().find(|item| item.subgraph == index);
                        (index, item.map(|item| (*item).clone()))
                    })
                    .collect();
                error_reporter.report_mismatch_error(
                    ErrorCode::DirectiveCompositionError,
                    "Composed directive is not named consistently in all subgraphs",
                    Mismatch::new(None, &sources, |item, _| {
                        Some(format!("\"@{}\"", item.aliased_directive_name()))
                    }),
                );
                continue;
            }
            let alias = items[0].aliased_directive_name();
            let named_differently = subgraphs.iter().enumerate().any(|(index, subgraph)| {
                if items.iter().any(|item| item.subgraph == index) {
                    return false;
                }
                subgraph
                    .metadata()
                    .links()
                    .for_identity(identity)
                    .is_some_and(|link| {
                        link.imports.iter().any(|import| {
                            import.is_directive
                                && import.element == *original_name
                                && import.imported_name() != alias
                        })
                    })
            });
            if named_differently {
                error_reporter.add_hint(CompositionHint::new(
                    HintCode::DirectiveCompositionWarn,
                    format!(
                        "Composed directive \"@{alias}\" is named differently in a subgraph that doesn't export it. Consistent naming will be required to export it."
                    ),
                    vec![],
                ));
            }
        }

        for item in &items {
            if wont_merge_features.contains(item.identity())
                || wont_merge_directive_names.contains(item.aliased_directive_name())
            {
                continue;
            }
            self.merge_directives
                .entry(item.subgraph)
                .or_default()
                .insert(item.aliased_directive_name().clone());
            self.directives_for_feature
                .entry(item.identity().clone())
                .or_default()
                .insert(
                    item.original_directive_name(),
                    item.aliased_directive_name().clone(),
                );
        }
        for name in &wont_merge_directive_names {
            self.latest_directive_definitions.shift_remove(name);
        }
        self.latest_features
            .retain(|identity, _| self.directives_for_feature.contains_key(identity));
        debug!(
            composed_features = self.latest_features.len(),
            composed_directives = self.latest_directive_definitions.len(),
            "validated @composeDirective applications"
        );
    }

    /// Picks, per feature with composed directives, the highest version linked by a subgraph
    /// composing it. Composing subgraphs must agree on the major version; other subgraphs
    /// linking another major version only get a hint.
    fn resolve_feature_versions(
        &mut self,
        subgraphs: &[Subgraph<Validated>],
        items: &[MergeDirectiveItem],
        wont_merge_features: &mut IndexSet<Identity>,
        error_reporter: &mut ErrorReporter,
    ) {
        let mut linked_versions: IndexMap<Identity, Vec<u32>> = IndexMap::default();
        for subgraph in subgraphs {
            for link in subgraph.metadata().links().all_links() {
                if link.url.identity.domain == APOLLO_SPEC_DOMAIN {
                    continue;
                }
                linked_versions
                    .entry(link.url.identity.clone())
                    .or_default()
                    .push(link.url.version.major);
            }
        }

        for (identity, majors) in &linked_versions {
            let composing: Vec<&MergeDirectiveItem> = items
                .iter()
                .filter(|item| item.identity() == identity)
                .collect();
            if !all_equal(&composing, |item| item.link.url.version.major) {
                wont_merge_features.insert(identity.clone());
                error_reporter.add_error(ErrorCode::DirectiveCompositionError.err(
                    format!(
                        "Core feature \"{identity}\" requested to be merged has major version mismatch across subgraphs"
                    ),
                    vec![],
                ));
                continue;
            }
            if !all_equal(majors, |major| *major) {
                error_reporter.add_hint(CompositionHint::new(
                    HintCode::DirectiveCompositionInfo,
                    format!(
                        "Non-composed core feature \"{identity}\" has major version mismatch across subgraphs"
                    ),
                    vec![],
                ));
            }

            let mut latest: Option<&MergeDirectiveItem> = None;
            for item in &composing {
                if latest.is_none_or(|latest| item.link.url.version > latest.link.url.version) {
                    latest = Some(*item);
                }
            }
            let Some(latest) = latest else {
                continue;
            };
            self.latest_features
                .insert(identity.clone(), Arc::clone(&latest.link));

            // Each directive takes its definition from the highest version composing it.
            let mut definitions: IndexMap<&Name, &MergeDirectiveItem> = IndexMap::default();
            for item in composing {
                let entry = definitions
                    .entry(item.aliased_directive_name())
                    .or_insert(item);
                if item.link.url.version > entry.link.url.version {
                    *entry = item;
                }
            }
            for (name, item) in definitions {
                self.latest_directive_definitions
                    .insert(name.clone(), item.definition.clone());
            }
        }
    }
}

fn all_equal<'a, T: 'a, V: PartialEq>(
    items: impl IntoIterator<Item = &'a T>,
    select: impl Fn(&'a T) -> V,
) -> bool {
    let mut items = items.into_iter();
    let Some(first) = items.next() else {
        return true;
    };
    let first = select(first);
    items.all(|item| select(item) == first)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::link::feature_registry::FeatureRegistry;

    fn subgraph(name: &str, schema_extension: &str, definitions: &str) -> Subgraph<Validated> {
        let sdl = format!(
            r#"
            extend schema
              @link(url: "https://specs.apollo.dev/link/v1.0")
              @link(url: "https://specs.apollo.dev/federation/v2.1", import: ["@key", "@composeDirective"])
              {schema_extension}

            {definitions}
            type Query {{ {name}: Int }}
            "#
        );
        Subgraph::parse(name, &format!("http://{name}"), &sdl)
            .unwrap()
            .expand_links(&FeatureRegistry::default())
            .unwrap()
            .validate(true)
            .unwrap()
    }

    fn validate(subgraphs: &[Subgraph<Validated>]) -> (ComposeDirectiveManager, ErrorReporter) {
        let mut reporter = ErrorReporter::new(
            subgraphs.iter().map(|s| s.name.clone()).collect(),
            subgraphs.iter().map(|s| s.schema().sources.clone()).collect(),
        );
        let mut manager = ComposeDirectiveManager::new();
        manager.validate(subgraphs, &mut reporter);
        (manager, reporter)
    }

    #[test]
    fn composes_imported_directive() {
        let a = subgraph(
            "a",
            r#"@link(url: "https://specs.custom.dev/foo/v1.0", import: ["@foo"])
               @composeDirective(name: "@foo")"#,
            "directive @foo(name: String!) on FIELD_DEFINITION",
        );
        let b = subgraph("b", "", "");
        let (manager, reporter) = validate(&[a, b]);
        assert!(!reporter.has_errors());
        assert!(manager.should_compose_directive(0, &name!("foo")));
        assert!(!manager.should_compose_directive(1, &name!("foo")));
        assert!(manager.directive_exists_in_supergraph(&name!("foo")));
        let features = manager.all_composed_core_features();
        assert_eq!(features.len(), 1);
        assert_eq!(
            features[0].0.url.to_string(),
            "https://specs.custom.dev/foo/v1.0"
        );
        assert_eq!(features[0].1.get("foo").map(|n| n.as_str()), Some("foo"));
    }

    #[test]
    fn namespaced_directive_keeps_its_original_name() {
        let a = subgraph(
            "a",
            r#"@link(url: "https://specs.custom.dev/foo/v1.0")
               @composeDirective(name: "@foo__bar")"#,
            "directive @foo__bar(name: String!) on FIELD_DEFINITION",
        );
        let (manager, reporter) = validate(&[a]);
        assert!(!reporter.has_errors());
        let features = manager.all_composed_core_features();
        assert_eq!(
            features[0].1.get("bar").map(|n| n.as_str()),
            Some("foo__bar")
        );
    }

    #[test]
    fn keeps_the_definition_of_the_latest_composing_version() {
        let a = subgraph(
            "a",
            r#"@link(url: "https://specs.custom.dev/foo/v1.0", import: ["@foo"])
               @composeDirective(name: "@foo")"#,
            "directive @foo(name: String!) on FIELD_DEFINITION",
        );
        let b = subgraph(
            "b",
            r#"@link(url: "https://specs.custom.dev/foo/v1.4", import: ["@foo"])
               @composeDirective(name: "@foo")"#,
            "directive @foo(name: String!, age: Int) on FIELD_DEFINITION",
        );
        let (manager, reporter) = validate(&[a, b]);
        assert!(!reporter.has_errors());
        let definition = manager
            .get_latest_directive_definition(&name!("foo"))
            .unwrap();
        assert_eq!(definition.arguments.len(), 2);
        assert_eq!(
            manager.all_composed_core_features()[0].0.url.version.to_string(),
            "1.4"
        );
    }

    #[test]
    fn rejects_major_version_mismatch_between_composing_subgraphs() {
        let a = subgraph(
            "a",
            r#"@link(url: "https://specs.custom.dev/foo/v1.0", import: ["@foo"])
               @composeDirective(name: "@foo")"#,
            "directive @foo(name: String!) on FIELD_DEFINITION",
        );
        let b = subgraph(
            "b",
            r#"@link(url: "https://specs.custom.dev/foo/v2.0", import: ["@foo"])
               @composeDirective(name: "@foo")"#,
            "directive @foo(name: String!) on FIELD_DEFINITION",
        );
        let (manager, reporter) = validate(&[a, b]);
        let (errors, _) = reporter.into_errors_and_hints();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].message(),
            r#"Core feature "https://specs.custom.dev/foo" requested to be merged has major version mismatch across subgraphs"#
        );
        assert!(!manager.should_compose_directive(0, &name!("foo")));
        assert!(manager.all_composed_core_features().is_empty());
    }

    #[test]
    fn rejects_directives_outside_core_features() {
        let a = subgraph(
            "a",
            r#"@composeDirective(name: "@foo")"#,
            "directive @foo(name: String!) on FIELD_DEFINITION",
        );
        let (_, reporter) = validate(&[a]);
        let (errors, _) = reporter.into_errors_and_hints();
        assert_eq!(
            errors[0].message(),
            r#"Directive "@foo" in subgraph "a" cannot be composed because it is not a member of a core feature"#
        );
    }

    #[test]
    fn suggests_close_directive_names() {
        let a = subgraph(
            "a",
            r#"@link(url: "https://specs.custom.dev/foo/v1.0", import: ["@foo"])
               @composeDirective(name: "@fooz")"#,
            "directive @foo(name: String!) on FIELD_DEFINITION",
        );
        let (_, reporter) = validate(&[a]);
        let (errors, _) = reporter.into_errors_and_hints();
        assert_eq!(
            errors[0].message(),
            r#"Could not find matching directive definition for argument to @composeDirective "@fooz" in subgraph "a". Did you mean "@foo"?"#
        );
    }
}
