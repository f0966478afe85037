use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::validation::Valid;
use tracing::debug;

use crate::error::CompositionError;
use crate::error::ErrorCode;
use crate::error::FederationError;
use crate::link::DEFAULT_LINK_NAME;
use crate::link::Link;
use crate::link::LinksMetadata;
use crate::link::feature_registry::FeatureDefinition;
use crate::link::feature_registry::FeatureRegistry;
use crate::link::federation_spec_definition::FEDERATION_FIELDS_ARGUMENT_NAME;
use crate::link::federation_spec_definition::LATEST_FEDERATION_VERSION;
use crate::link::federation_spec_definition::federation_feature;
use crate::link::federation_spec_definition::federation_link_importing_everything;
use crate::link::link_spec_definition::LINK_VERSION;
use crate::link::link_spec_definition::link_directive;
use crate::link::spec::Identity;
use crate::link::spec::Url;
use crate::link::spec::Version;
use crate::schema::directive_optional_string_argument;
use crate::schema::field_set::parse_field_set;
use crate::schema::field_set::validate_field_set;
use crate::schema::is_composite_type;
use crate::schema::subgraph_metadata::SubgraphMetadata;
use crate::subgraph::SubgraphError;
use crate::subgraph::normalize_root_types;
use crate::subgraph::validate_subgraph_name;

#[derive(Clone, Debug)]
pub struct Raw {
    schema: Schema,
}

#[derive(Clone, Debug)]
pub struct Expanded {
    schema: Schema,
    metadata: SubgraphMetadata,
}

#[derive(Clone, Debug)]
pub struct Validated {
    schema: Valid<Schema>,
    metadata: SubgraphMetadata,
}

trait SubgraphMetadataState {
    fn metadata(&self) -> &SubgraphMetadata;
    fn schema(&self) -> &Schema;
}

impl SubgraphMetadataState for Expanded {
    fn metadata(&self) -> &SubgraphMetadata {
        &self.metadata
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}

impl SubgraphMetadataState for Validated {
    fn metadata(&self) -> &SubgraphMetadata {
        &self.metadata
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}

/// A subgraph represents a schema and its associated metadata. Subgraphs are updated through the
/// composition pipeline, such as when links are expanded or root types are renamed. These state
/// transitions use the [typestate pattern](https://cliffle.com/blog/rust-typestate).
///
/// ```text
///   (expand)     (validate)
/// Raw ──► Expanded ──► Validated
///            ▲             │
///            └─────────────┘
///             (invalidate)
///  ```
///
/// Subgraph states and their invariants:
/// - `Raw`: The initial state, containing a raw schema. This provides no guarantees about the
///   schema, other than that it can be parsed.
/// - `Expanded`: The definitions of every linked feature element have been added and subgraph
///   metadata has been computed.
/// - `Validated`: Root types use their default names, field sets are valid, and the schema is
///   valid GraphQL.
#[derive(Clone, Debug)]
pub struct Subgraph<S> {
    pub name: String,
    pub url: String,
    pub state: S,
}

impl Subgraph<Raw> {
    pub fn new(name: &str, url: &str, schema: Schema) -> Subgraph<Raw> {
        Subgraph {
            name: name.to_string(),
            url: url.to_string(),
            state: Raw { schema },
        }
    }

    pub fn parse(
        name: &str,
        url: &str,
        schema_str: &str,
    ) -> Result<Subgraph<Raw>, SubgraphError> {
        let schema = Schema::builder()
            .adopt_orphan_extensions()
            .parse(schema_str, name)
            .build()
            .map_err(|with_errors| {
                SubgraphError::from_diagnostic_list(name, &with_errors.errors)
            })?;

        Ok(Self::new(name, url, schema))
    }

    pub fn schema(&self) -> &Schema {
        &self.state.schema
    }

    /// Adds a `@link` to the latest federation version, importing every federation directive,
    /// unless the schema already links federation.
    pub fn into_fed2_subgraph(self) -> Result<Self, SubgraphError> {
        let links = schema_links(&self.state.schema)
            .map_err(|e| SubgraphError::from_federation_error(&self.name, e.into()))?;
        if links
            .for_identity(&Identity::federation_identity())
            .is_some()
        {
            return Ok(self);
        }
        let mut schema = self.state.schema;
        add_federation_link(&mut schema, &federation_feature(), LATEST_FEDERATION_VERSION);
        Ok(Subgraph {
            name: self.name,
            url: self.url,
            state: Raw { schema },
        })
    }

    /// Adds the definitions of every element of the features the schema links (federation, link,
    /// and any feature the registry knows), leaving the definitions the schema already has alone.
    pub fn expand_links(
        self,
        registry: &FeatureRegistry,
    ) -> Result<Subgraph<Expanded>, SubgraphError> {
        let name = self.name;
        let mut schema = self.state.schema;
        let to_subgraph_error =
            |error: FederationError| SubgraphError::from_federation_error(&name, error);

        let mut links = schema_links(&schema).map_err(|e| to_subgraph_error(e.into()))?;
        let federation = registry.federation().ok_or_else(|| {
            to_subgraph_error(FederationError::internal(
                "federation is not a registered feature",
            ))
        })?;
        if links
            .for_identity(&Identity::federation_identity())
            .is_none()
        {
            // Without a federation link, every directive of the first federation 2 version is
            // available under its own name.
            let link = add_federation_link(&mut schema, federation, Version::new(2, 0));
            links.add(Arc::new(link)).map_err(|e| to_subgraph_error(e.into()))?;
        }
        let federation_link = links
            .for_identity(&Identity::federation_identity())
            .ok_or_else(|| {
                to_subgraph_error(FederationError::internal("missing federation link"))
            })?;
        let linked_version = federation_link.url.version;
        if federation.find_version(&linked_version).is_none() {
            return Err(to_subgraph_error(FederationError::UnknownFederationLinkVersion {
                message: format!(
                    "Invalid version v{linked_version} for the federation feature in @link directive on schema"
                ),
            }));
        }

        let link_link = links
            .for_identity(&Identity::link_identity())
            .unwrap_or_else(|| {
                Arc::new(Link::new(Url {
                    identity: Identity::link_identity(),
                    version: LINK_VERSION,
                }))
            });
        let mut federation_version = linked_version;
        for link in std::iter::once(&link_link).chain(links.all_links()) {
            let Some(feature) = registry.get(&link.url.identity) else {
                continue;
            };
            if feature.find_version(&link.url.version).is_none() {
                return Err(to_subgraph_error(FederationError::InvalidLinkDirectiveUsage {
                    message: format!(
                        "Schema uses unknown version v{} of the {} spec",
                        link.url.version, link.url.identity.name
                    ),
                }));
            }
            feature.add_definitions_to(&mut schema, link);
            if let Some(minimum) = registry.minimum_federation_version(&link.url)
                && minimum > federation_version
            {
                federation_version = minimum;
            }
        }
        if federation_version != linked_version {
            debug!(
                subgraph = name.as_str(),
                from = %linked_version,
                to = %federation_version,
                "implicitly upgrading federation version"
            );
        }

        let metadata = SubgraphMetadata::new(&schema, links, federation_link, federation_version);
        Ok(Subgraph {
            name,
            url: self.url,
            state: Expanded { schema, metadata },
        })
    }
}

impl Subgraph<Expanded> {
    /// Checks the subgraph can take part in composition: its name, root type names, `@key`,
    /// `@provides` and `@requires` field sets, and GraphQL validity.
    pub fn validate(
        self,
        rename_root_types: bool,
    ) -> Result<Subgraph<Validated>, SubgraphError> {
        let Subgraph { name, url, state } = self;
        let Expanded {
            mut schema,
            mut metadata,
        } = state;

        if let Err(error) = validate_subgraph_name(&name) {
            return Err(SubgraphError::new(name, vec![error]));
        }
        if rename_root_types {
            normalize_root_types(&name, &mut schema)
                .map_err(|errors| SubgraphError::new(&name, errors))?;
            metadata = SubgraphMetadata::new(
                &schema,
                metadata.links().clone(),
                Arc::clone(metadata.federation_link()),
                metadata.federation_version(),
            );
        }

        let schema = schema.validate().map_err(|with_errors| {
            SubgraphError::from_diagnostic_list(&name, &with_errors.errors)
        })?;

        let errors = validate_field_sets(&name, &schema, &metadata);
        if !errors.is_empty() {
            return Err(SubgraphError::new(name, errors));
        }

        Ok(Subgraph {
            name,
            url,
            state: Validated { schema, metadata },
        })
    }
}

impl Subgraph<Validated> {
    pub fn validated_schema(&self) -> &Valid<Schema> {
        &self.state.schema
    }

    pub fn invalidate(self) -> Subgraph<Expanded> {
        Subgraph {
            name: self.name,
            url: self.url,
            state: Expanded {
                schema: self.state.schema.into_inner(),
                metadata: self.state.metadata,
            },
        }
    }
}

#[allow(private_bounds)]
impl<S: SubgraphMetadataState> Subgraph<S> {
    pub(crate) fn metadata(&self) -> &SubgraphMetadata {
        self.state.metadata()
    }

    pub fn schema(&self) -> &Schema {
        self.state.schema()
    }
}

fn schema_links(schema: &Schema) -> Result<LinksMetadata, crate::link::LinkError> {
    match LinksMetadata::from_schema(schema)? {
        Some(links) => Ok(links),
        None => LinksMetadata::from_implicit_link_applications(schema),
    }
}

/// Applies a federation `@link` importing every directive of `version`, returning the link.
fn add_federation_link(
    schema: &mut Schema,
    federation: &FeatureDefinition,
    version: Version,
) -> Link {
    let link = federation_link_importing_everything(federation, version);
    let imports: Vec<Name> = link
        .imports
        .iter()
        .map(|import| import.element.clone())
        .collect();
    let application = link_directive(&DEFAULT_LINK_NAME, &link.url, &imports, None);
    schema
        .schema_definition
        .make_mut()
        .directives
        .push(Component::new(application));
    link
}

/// Checks the `@key`, `@provides` and `@requires` selections of a subgraph.
fn validate_field_sets(
    subgraph: &str,
    schema: &Schema,
    metadata: &SubgraphMetadata,
) -> Vec<CompositionError> {
    let names = metadata.directive_names();
    let mut errors = vec![];
    for (type_name, type_) in &schema.types {
        let fields = match type_ {
            ExtendedType::Object(object) => &object.fields,
            ExtendedType::Interface(interface) => &interface.fields,
            _ => continue,
        };
        for key in type_.directives().get_all(&names.key) {
            if let Err(message) = check_field_set(schema, type_name, key) {
                errors.push(ErrorCode::KeyInvalidFields.err(
                    format!(
                        "[{subgraph}] On type \"{type_name}\", for {}: {message}",
                        key.serialize().no_indent(),
                    ),
                    vec![],
                ));
            }
        }
        for (field_name, field) in fields {
            for requires in field.directives.get_all(&names.requires) {
                if let Err(message) = check_field_set(schema, type_name, requires) {
                    errors.push(ErrorCode::RequiresInvalidFields.err(
                        format!(
                            "[{subgraph}] On field \"{type_name}.{field_name}\", for {}: {message}",
                            requires.serialize().no_indent(),
                        ),
                        vec![],
                    ));
                }
            }
            let returned_type = field.ty.inner_named_type();
            for provides in field.directives.get_all(&names.provides) {
                let result = if is_composite_type(schema, returned_type) {
                    check_field_set(schema, returned_type, provides)
                } else {
                    Err(format!(
                        "field has type \"{}\" which is not a Composite Type",
                        field.ty
                    ))
                };
                if let Err(message) = result {
                    errors.push(ErrorCode::ProvidesInvalidFields.err(
                        format!(
                            "[{subgraph}] On field \"{type_name}.{field_name}\", for {}: {message}",
                            provides.serialize().no_indent(),
                        ),
                        vec![],
                    ));
                }
            }
        }
    }
    errors
}

fn check_field_set(
    schema: &Schema,
    type_name: &Name,
    application: &ast::Directive,
) -> Result<(), String> {
    let fields =
        directive_optional_string_argument(application, &FEDERATION_FIELDS_ARGUMENT_NAME)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "missing required argument \"fields\"".to_string())?;
    let selections = parse_field_set(fields).map_err(|e| e.to_string())?;
    validate_field_set(schema, type_name, &selections).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use apollo_compiler::name;
    use pretty_assertions::assert_eq;

    use super::*;

    fn expand(sdl: &str) -> Subgraph<Expanded> {
        Subgraph::parse("S", "http://s", sdl)
            .expect("valid schema")
            .expand_links(&FeatureRegistry::default())
            .expect("expands subgraph")
    }

    fn directive_names(subgraph: &Subgraph<Expanded>) -> Vec<String> {
        let mut names = subgraph
            .schema()
            .directive_definitions
            .keys()
            .map(|name| name.to_string())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    #[test]
    fn injects_missing_directive_definitions_fed_2_0() {
        let subgraph = expand(
            r#"
                extend schema @link(url: "https://specs.apollo.dev/federation/v2.0")

                type Query {
                    s: String
                }"#,
        );
        assert_eq!(
            directive_names(&subgraph),
            vec![
                "deprecated",
                "federation__extends",
                "federation__external",
                "federation__inaccessible",
                "federation__key",
                "federation__override",
                "federation__provides",
                "federation__requires",
                "federation__shareable",
                "federation__tag",
                "include",
                "link",
                "skip",
                "specifiedBy",
            ]
        );
        assert!(subgraph.schema().types.contains_key("federation__FieldSet"));
        assert!(subgraph.schema().types.contains_key("link__Import"));
    }

    #[test]
    fn injects_imported_definitions_under_their_imported_names() {
        let subgraph = expand(
            r#"
                extend schema @link(url: "https://specs.apollo.dev/federation/v2.1", import: ["@key", { name: "@shareable", as: "@share" }])

                type Query {
                    s: String @share
                }"#,
        );
        let names = directive_names(&subgraph);
        assert!(names.contains(&"key".to_string()));
        assert!(names.contains(&"share".to_string()));
        assert!(names.contains(&"federation__composeDirective".to_string()));
        assert_eq!(subgraph.metadata().directive_names().shareable, "share");
        assert!(
            subgraph
                .metadata()
                .is_shareable(&name!("Query"), &name!("s"))
        );
    }

    #[test]
    fn keeps_user_definitions() {
        let subgraph = expand(
            r#"
                extend schema @link(url: "https://specs.apollo.dev/federation/v2.0", import: ["@key"])

                directive @key(fields: federation__FieldSet!, resolvable: Boolean = true) repeatable on OBJECT | INTERFACE

                type Query {
                    s: String
                }"#,
        );
        assert_eq!(
            subgraph.schema().directive_definitions["key"]
                .to_string()
                .trim(),
            "directive @key(fields: federation__FieldSet!, resolvable: Boolean = true) repeatable on OBJECT | INTERFACE"
        );
    }

    #[test]
    fn treats_subgraphs_without_federation_link_as_federation_2() {
        let subgraph = expand(
            r#"
                type Query {
                    s: String @shareable
                }"#,
        );
        assert_eq!(
            subgraph.metadata().linked_federation_version(),
            Version::new(2, 0)
        );
        assert!(subgraph.schema().directive_definitions.contains_key("shareable"));
    }

    #[test]
    fn upgrades_federation_version_implied_by_other_links() {
        let subgraph = expand(
            r#"
                extend schema
                  @link(url: "https://specs.apollo.dev/federation/v2.3", import: ["@key"])
                  @link(url: "https://specs.apollo.dev/cost/v0.1", import: ["@cost"])

                type Query {
                    s: Int @cost(weight: 5)
                }"#,
        );
        assert_eq!(
            subgraph.metadata().linked_federation_version(),
            Version::new(2, 3)
        );
        assert_eq!(subgraph.metadata().federation_version(), Version::new(2, 9));
        assert!(subgraph.schema().directive_definitions.contains_key("cost"));
    }

    #[test]
    fn rejects_unknown_federation_versions() {
        let error = Subgraph::parse(
            "S",
            "http://s",
            r#"
                extend schema @link(url: "https://specs.apollo.dev/federation/v2.99")
                type Query { s: String }
            "#,
        )
        .unwrap()
        .expand_links(&FeatureRegistry::default())
        .unwrap_err();
        assert_eq!(
            error.format_errors(),
            [(
                "UNKNOWN_FEDERATION_LINK_VERSION".to_string(),
                "[S] Invalid version v2.99 for the federation feature in @link directive on schema"
                    .to_string()
            )]
        );
    }

    #[test]
    fn into_fed2_subgraph_imports_everything() {
        let subgraph = Subgraph::parse("S", "http://s", "type Query { s: String }")
            .unwrap()
            .into_fed2_subgraph()
            .unwrap()
            .expand_links(&FeatureRegistry::default())
            .unwrap();
        assert_eq!(
            subgraph.metadata().linked_federation_version(),
            LATEST_FEDERATION_VERSION
        );
        assert_eq!(subgraph.metadata().directive_names().key, "key");
        assert!(subgraph.schema().directive_definitions.contains_key("listSize"));
    }

    #[test]
    fn validation_renames_root_types() {
        let subgraph = Subgraph::parse(
            "S",
            "http://s",
            r#"
                schema { query: MyQuery }
                type MyQuery { products: [Product] }
                type Product @key(fields: "id") { id: ID! }
            "#,
        )
        .unwrap()
        .into_fed2_subgraph()
        .unwrap()
        .expand_links(&FeatureRegistry::default())
        .unwrap()
        .validate(true)
        .expect("valid subgraph");
        assert!(subgraph.schema().types.contains_key("Query"));
        assert!(!subgraph.schema().types.contains_key("MyQuery"));
    }

    #[test]
    fn validation_reports_invalid_field_sets() {
        let error = Subgraph::parse(
            "S",
            "http://s",
            r#"
                type Query { products: [Product] @provides(fields: "nope") }
                type Product @key(fields: "upc") {
                  id: ID!
                  weight: Int @requires(fields: "size(scale: 1)")
                  size(unit: String): Int @external
                }
            "#,
        )
        .unwrap()
        .into_fed2_subgraph()
        .unwrap()
        .expand_links(&FeatureRegistry::default())
        .unwrap()
        .validate(true)
        .unwrap_err();
        let codes = error
            .format_errors()
            .into_iter()
            .map(|(code, _)| code)
            .collect::<Vec<_>>();
        assert_eq!(
            codes,
            [
                "PROVIDES_INVALID_FIELDS",
                "KEY_INVALID_FIELDS",
                "REQUIRES_INVALID_FIELDS"
            ]
        );
        assert_eq!(
            error.format_errors()[1].1,
            r#"[S] On type "Product", for @key(fields: "upc"): Cannot query field "upc" on type "Product"."#
        );
    }

    #[test]
    fn validation_reports_graphql_errors() {
        let error = Subgraph::parse("subgraphA", "http://a", "type Query { a: A }")
            .unwrap()
            .into_fed2_subgraph()
            .unwrap()
            .expand_links(&FeatureRegistry::default())
            .unwrap()
            .validate(true)
            .unwrap_err();
        assert_eq!(error.errors()[0].code(), ErrorCode::InvalidGraphql);
        assert!(error.errors()[0].message().starts_with("[subgraphA] "));
    }
}
