use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Schema;
use apollo_compiler::ast::Directive;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::schema::ExtendedType;

use crate::link::Link;
use crate::link::LinksMetadata;
use crate::link::federation_spec_definition::FEDERATION_FIELDS_ARGUMENT_NAME;
use crate::link::federation_spec_definition::FEDERATION_RESOLVABLE_ARGUMENT_NAME;
use crate::link::federation_spec_definition::FederationDirectiveNames;
use crate::link::spec::Version;
use crate::schema::directive_optional_boolean_argument;
use crate::schema::directive_optional_string_argument;
use crate::schema::field_set::collect_target_fields_from_field_set;
use crate::schema::field_set::parse_field_set;
use crate::schema::interface_implementations;
use crate::schema::position::SchemaElementPosition;

/// A `@key` application, read through the subgraph's name for `@key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeyDirective {
    pub(crate) fields: String,
    pub(crate) resolvable: bool,
}

/// Federation facts about the elements of one subgraph schema, resolved through the names its
/// federation `@link` gives to federation directives.
#[derive(Debug, Clone)]
pub(crate) struct SubgraphMetadata {
    links: LinksMetadata,
    federation_link: Arc<Link>,
    directive_names: FederationDirectiveNames,
    /// The federation version the subgraph behaves as, which may be above the linked one.
    federation_version: Version,
    /// Fields marked `@external`, directly or through their parent type.
    external_fields: IndexSet<SchemaElementPosition>,
    /// Fields selected by some `@provides`.
    provided_fields: IndexSet<SchemaElementPosition>,
    key_fields: IndexSet<SchemaElementPosition>,
    required_fields: IndexSet<SchemaElementPosition>,
    shareable_fields: IndexSet<SchemaElementPosition>,
    /// Fields implementing a field of an interface their type implements.
    interface_fields: IndexSet<SchemaElementPosition>,
    interface_objects: IndexSet<Name>,
}

impl SubgraphMetadata {
    pub(crate) fn new(
        schema: &Schema,
        links: LinksMetadata,
        federation_link: Arc<Link>,
        federation_version: Version,
    ) -> Self {
        let directive_names = FederationDirectiveNames::from_link(&federation_link);
        let mut metadata = Self {
            links,
            federation_link,
            directive_names,
            federation_version,
            external_fields: Default::default(),
            provided_fields: Default::default(),
            key_fields: Default::default(),
            required_fields: Default::default(),
            shareable_fields: Default::default(),
            interface_fields: Default::default(),
            interface_objects: Default::default(),
        };
        metadata.collect(schema);
        metadata
    }

    fn collect(&mut self, schema: &Schema) {
        let names = self.directive_names.clone();
        for (type_name, type_) in &schema.types {
            let (fields, implements) = match type_ {
                ExtendedType::Object(object) => {
                    (&object.fields, &object.implements_interfaces)
                }
                ExtendedType::Interface(interface) => {
                    (&interface.fields, &interface.implements_interfaces)
                }
                _ => continue,
            };
            let directives = type_.directives();
            if directives.has(&names.interface_object) {
                self.interface_objects.insert(type_name.clone());
            }
            let type_is_external = directives.has(&names.external);
            let type_is_shareable = directives.has(&names.shareable);

            for key in directives.get_all(&names.key) {
                self.key_fields
                    .extend(Self::selected_fields(schema, type_name, key));
            }

            for (field_name, field) in fields {
                let position = SchemaElementPosition::field(type_name, field_name);
                if type_is_external || field.directives.has(&names.external) {
                    self.external_fields.insert(position.clone());
                }
                if type_is_shareable || field.directives.has(&names.shareable) {
                    self.shareable_fields.insert(position.clone());
                }
                if implements.iter().any(|interface| {
                    crate::schema::field_set::field_definition(schema, interface, field_name)
                        .is_some()
                }) {
                    self.interface_fields.insert(position);
                }
                for requires in field.directives.get_all(&names.requires) {
                    self.required_fields
                        .extend(Self::selected_fields(schema, type_name, requires));
                }
                let returned_type = field.ty.inner_named_type();
                for provides in field.directives.get_all(&names.provides) {
                    for provided in Self::selected_fields(schema, returned_type, provides) {
                        // Providing an interface field provides it on every implementation.
                        if let SchemaElementPosition::Field {
                            type_name,
                            field_name,
                        } = &provided
                        {
                            for implementation in interface_implementations(schema, type_name) {
                                self.provided_fields.insert(SchemaElementPosition::field(
                                    &implementation,
                                    field_name,
                                ));
                            }
                        }
                        self.provided_fields.insert(provided);
                    }
                }
            }
        }
        // Key fields are shareable by nature.
        let key_fields = self.key_fields.clone();
        self.shareable_fields.extend(key_fields);
    }

    fn selected_fields(
        schema: &Schema,
        type_name: &Name,
        application: &Directive,
    ) -> Vec<SchemaElementPosition> {
        let Ok(Some(fields)) =
            directive_optional_string_argument(application, &FEDERATION_FIELDS_ARGUMENT_NAME)
        else {
            return vec![];
        };
        let Ok(selections) = parse_field_set(fields) else {
            return vec![];
        };
        collect_target_fields_from_field_set(schema, type_name, &selections)
            .into_iter()
            .map(|(type_name, field_name)| SchemaElementPosition::Field {
                type_name,
                field_name,
            })
            .collect()
    }

    pub(crate) fn links(&self) -> &LinksMetadata {
        &self.links
    }

    pub(crate) fn federation_link(&self) -> &Arc<Link> {
        &self.federation_link
    }

    pub(crate) fn directive_names(&self) -> &FederationDirectiveNames {
        &self.directive_names
    }

    pub(crate) fn federation_version(&self) -> Version {
        self.federation_version
    }

    pub(crate) fn linked_federation_version(&self) -> Version {
        self.federation_link.url.version
    }

    pub(crate) fn is_external(&self, type_name: &Name, field_name: &Name) -> bool {
        self.external_fields
            .contains(&SchemaElementPosition::field(type_name, field_name))
    }

    pub(crate) fn is_provided(&self, type_name: &Name, field_name: &Name) -> bool {
        self.provided_fields
            .contains(&SchemaElementPosition::field(type_name, field_name))
    }

    /// External and not provided anywhere: the subgraph never resolves the field.
    pub(crate) fn is_fully_external(&self, type_name: &Name, field_name: &Name) -> bool {
        self.is_external(type_name, field_name) && !self.is_provided(type_name, field_name)
    }

    /// External but provided by some `@provides`.
    pub(crate) fn is_partially_external(&self, type_name: &Name, field_name: &Name) -> bool {
        self.is_external(type_name, field_name) && self.is_provided(type_name, field_name)
    }

    pub(crate) fn is_key_field(&self, type_name: &Name, field_name: &Name) -> bool {
        self.key_fields
            .contains(&SchemaElementPosition::field(type_name, field_name))
    }

    pub(crate) fn is_shareable(&self, type_name: &Name, field_name: &Name) -> bool {
        self.shareable_fields
            .contains(&SchemaElementPosition::field(type_name, field_name))
    }

    /// Whether the subgraph relies on the field for a key, a requirement, a provide or an
    /// interface it implements.
    pub(crate) fn is_field_used(&self, type_name: &Name, field_name: &Name) -> bool {
        let position = SchemaElementPosition::field(type_name, field_name);
        self.key_fields.contains(&position)
            || self.required_fields.contains(&position)
            || self.provided_fields.contains(&position)
            || self.interface_fields.contains(&position)
    }

    pub(crate) fn is_interface_object(&self, type_name: &str) -> bool {
        self.interface_objects.contains(type_name)
    }

    pub(crate) fn interface_objects(&self) -> impl Iterator<Item = &Name> {
        self.interface_objects.iter()
    }

    /// The `@key`s applied to a type, in application order.
    pub(crate) fn keys(&self, type_: &ExtendedType) -> Vec<KeyDirective> {
        type_
            .directives()
            .get_all(&self.directive_names.key)
            .filter_map(|application| {
                let fields = directive_optional_string_argument(
                    application,
                    &FEDERATION_FIELDS_ARGUMENT_NAME,
                )
                .ok()
                .flatten()?;
                let resolvable = directive_optional_boolean_argument(
                    application,
                    &FEDERATION_RESOLVABLE_ARGUMENT_NAME,
                )
                .ok()
                .flatten()
                .unwrap_or(true);
                Some(KeyDirective {
                    fields: fields.to_string(),
                    resolvable,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use apollo_compiler::name;

    use super::*;
    use crate::link::feature_registry::FeatureRegistry;
    use crate::link::federation_spec_definition::federation_link_importing_everything;

    fn metadata(sdl: &str) -> (Schema, SubgraphMetadata) {
        let schema = Schema::builder()
            .adopt_orphan_extensions()
            .parse(sdl, "subgraph.graphql")
            .build()
            .unwrap();
        let registry = FeatureRegistry::default();
        let federation = registry.federation().unwrap();
        let link = Arc::new(federation_link_importing_everything(
            federation,
            Version::new(2, 3),
        ));
        let metadata =
            SubgraphMetadata::new(&schema, Default::default(), link, Version::new(2, 3));
        (schema, metadata)
    }

    #[test]
    fn collects_field_facts() {
        let (schema, metadata) = metadata(
            r#"
            type Query { products: [Product] @provides(fields: "name") }
            interface Node { id: ID! }
            type Product implements Node @key(fields: "id sku") {
              id: ID!
              sku: String
              name: String @external
              price: Int @external
              weight: Int @requires(fields: "price")
              reviews: [String] @shareable
            }
            type Inventory @interfaceObject @key(fields: "id") { id: ID! }
            "#,
        );
        let product = name!("Product");
        assert!(metadata.is_key_field(&product, &name!("sku")));
        assert!(metadata.is_shareable(&product, &name!("id")));
        assert!(metadata.is_shareable(&product, &name!("reviews")));
        assert!(!metadata.is_shareable(&product, &name!("weight")));
        assert!(metadata.is_partially_external(&product, &name!("name")));
        assert!(metadata.is_fully_external(&product, &name!("price")));
        assert!(metadata.is_field_used(&product, &name!("price")));
        assert!(metadata.is_field_used(&product, &name!("id")));
        assert!(!metadata.is_field_used(&product, &name!("reviews")));
        assert!(metadata.is_interface_object("Inventory"));
        assert_eq!(
            metadata.keys(&schema.types["Product"]),
            [KeyDirective {
                fields: "id sku".to_string(),
                resolvable: true
            }]
        );
    }
}
