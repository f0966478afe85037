//! The registry of core features composition knows about.
//!
//! A feature is a `@link`able specification: a set of directive and type definitions, published
//! in versions. Composition needs to know a feature's definitions to add them to subgraphs that
//! link the feature without defining its elements, to merge the feature's directives into the
//! supergraph, and to know which federation version a feature version implies.
//!
//! The registry is an explicit value passed down to composition, rather than global state, so
//! that tests (and tools embedding composition) can register their own features.
use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast::Type;
use apollo_compiler::ast::Value;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::name;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::DirectiveDefinition;
use apollo_compiler::schema::DirectiveLocation;
use apollo_compiler::schema::EnumType;
use apollo_compiler::schema::EnumValueDefinition;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::InputObjectType;
use apollo_compiler::schema::InputValueDefinition;
use apollo_compiler::schema::ScalarType;
use apollo_compiler::ty;

use crate::link::Link;
use crate::link::Purpose;
use crate::link::federation_spec_definition::federation_feature;
use crate::link::join_spec_definition::join_feature;
use crate::link::link_spec_definition::link_feature;
use crate::link::spec::Identity;
use crate::link::spec::Url;
use crate::link::spec::Version;
use crate::schema::argument_composition_strategies::ArgumentCompositionStrategy;

#[derive(Clone, Debug)]
pub struct DirectiveArgumentSpecification {
    pub name: Name,
    /// The argument type, using the feature's own (unprefixed) names for the feature's types.
    pub ty: Type,
    pub default_value: Option<Value>,
    pub composition_strategy: Option<ArgumentCompositionStrategy>,
    /// The first version of the feature defining this argument.
    pub since: Version,
}

impl DirectiveArgumentSpecification {
    pub fn new(name: Name, ty: Type) -> Self {
        Self {
            name,
            ty,
            default_value: None,
            composition_strategy: None,
            since: Version::new(0, 0),
        }
    }

    pub fn since(mut self, version: Version) -> Self {
        self.since = version;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_strategy(mut self, strategy: ArgumentCompositionStrategy) -> Self {
        self.composition_strategy = Some(strategy);
        self
    }
}

/// What happens to applications of a directive when subgraphs are merged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DirectiveComposition {
    /// The directive is a composition instruction and never reaches the supergraph.
    None,
    /// Applications are merged into the supergraph, where the directive is defined by the given
    /// feature version.
    Merged { supergraph_feature: Url },
    /// Applications are recorded in the supergraph as `@join__directive`.
    JoinDirective,
}

#[derive(Clone, Debug)]
pub struct DirectiveSpecification {
    pub name: Name,
    pub arguments: Vec<DirectiveArgumentSpecification>,
    pub repeatable: bool,
    pub locations: Vec<DirectiveLocation>,
    pub composition: DirectiveComposition,
    /// The first version of the feature defining this directive.
    pub since: Version,
}

impl DirectiveSpecification {
    pub fn new(name: Name, locations: &[DirectiveLocation]) -> Self {
        Self {
            name,
            arguments: vec![],
            repeatable: false,
            locations: locations.to_vec(),
            composition: DirectiveComposition::None,
            since: Version::new(0, 0),
        }
    }

    pub fn argument(mut self, argument: DirectiveArgumentSpecification) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }

    pub fn composed(mut self, composition: DirectiveComposition) -> Self {
        self.composition = composition;
        self
    }

    pub fn since(mut self, version: Version) -> Self {
        self.since = version;
        self
    }

    pub fn argument_strategy(&self, argument: &str) -> Option<ArgumentCompositionStrategy> {
        self.arguments
            .iter()
            .find(|arg| arg.name == argument)
            .and_then(|arg| arg.composition_strategy)
    }
}

#[derive(Clone, Debug)]
pub enum TypeSpecificationKind {
    Scalar,
    Enum(Vec<(Name, Option<&'static str>)>),
    InputObject(Vec<(Name, Type)>),
}

#[derive(Clone, Debug)]
pub struct TypeSpecification {
    pub name: Name,
    pub kind: TypeSpecificationKind,
    pub since: Version,
}

impl TypeSpecification {
    pub fn scalar(name: Name) -> Self {
        Self {
            name,
            kind: TypeSpecificationKind::Scalar,
            since: Version::new(0, 0),
        }
    }

    pub fn since(mut self, version: Version) -> Self {
        self.since = version;
        self
    }
}

#[derive(Clone, Debug)]
pub struct FeatureVersion {
    pub version: Version,
    /// The federation version a subgraph linking this feature version needs at least.
    pub minimum_federation_version: Option<Version>,
}

#[derive(Clone, Debug)]
pub struct FeatureDefinition {
    pub identity: Identity,
    pub purpose: Option<Purpose>,
    pub versions: Vec<FeatureVersion>,
    pub directives: Vec<DirectiveSpecification>,
    pub types: Vec<TypeSpecification>,
}

impl FeatureDefinition {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            purpose: None,
            versions: vec![],
            directives: vec![],
            types: vec![],
        }
    }

    pub fn version(mut self, version: Version, minimum_federation_version: Option<Version>) -> Self {
        self.versions.push(FeatureVersion {
            version,
            minimum_federation_version,
        });
        self
    }

    pub fn directive(mut self, directive: DirectiveSpecification) -> Self {
        self.directives.push(directive);
        self
    }

    pub fn type_(mut self, type_: TypeSpecification) -> Self {
        self.types.push(type_);
        self
    }

    pub fn purpose(mut self, purpose: Purpose) -> Self {
        self.purpose = Some(purpose);
        self
    }

    pub fn find_version(&self, version: &Version) -> Option<&FeatureVersion> {
        self.versions.iter().find(|v| v.version == *version)
    }

    pub fn latest_version(&self) -> Option<&FeatureVersion> {
        self.versions.iter().max_by_key(|v| v.version)
    }

    pub fn url(&self, version: Version) -> Url {
        Url {
            identity: self.identity.clone(),
            version,
        }
    }

    pub fn directive_spec(&self, name_in_spec: &str) -> Option<&DirectiveSpecification> {
        self.directives.iter().find(|d| d.name == name_in_spec)
    }

    pub fn directives_at(&self, version: Version) -> impl Iterator<Item = &DirectiveSpecification> {
        self.directives.iter().filter(move |d| d.since <= version)
    }

    pub fn types_at(&self, version: Version) -> impl Iterator<Item = &TypeSpecification> {
        self.types.iter().filter(move |t| t.since <= version)
    }

    /// Builds the definition a directive of this feature has in `version`, named as `link` (if
    /// any) makes it named in a schema.
    pub fn directive_definition(
        &self,
        spec: &DirectiveSpecification,
        link: Option<&Link>,
        version: Version,
    ) -> Node<DirectiveDefinition> {
        let name = link
            .map(|link| link.directive_name_in_schema(&spec.name))
            .unwrap_or_else(|| spec.name.clone());
        let arguments = spec
            .arguments
            .iter()
            .filter(|arg| arg.since <= version)
            .map(|arg| {
                Node::new(InputValueDefinition {
                    description: None,
                    name: arg.name.clone(),
                    ty: Node::new(self.type_in_schema(&arg.ty, link)),
                    default_value: arg.default_value.clone().map(Node::new),
                    directives: Default::default(),
                })
            })
            .collect();
        Node::new(DirectiveDefinition {
            description: None,
            name,
            arguments,
            repeatable: spec.repeatable,
            locations: spec.locations.clone(),
        })
    }

    /// Builds the definition of a type of this feature.
    pub fn type_definition(&self, spec: &TypeSpecification, link: Option<&Link>) -> ExtendedType {
        let name = self.type_name(&spec.name, link);
        match &spec.kind {
            TypeSpecificationKind::Scalar => ExtendedType::Scalar(Node::new(ScalarType {
                description: None,
                name,
                directives: Default::default(),
            })),
            TypeSpecificationKind::Enum(values) => ExtendedType::Enum(Node::new(EnumType {
                description: None,
                name,
                directives: Default::default(),
                values: values
                    .iter()
                    .map(|(value, description)| {
                        (
                            value.clone(),
                            Component::new(EnumValueDefinition {
                                description: description.map(|d| d.into()),
                                value: value.clone(),
                                directives: Default::default(),
                            }),
                        )
                    })
                    .collect(),
            })),
            TypeSpecificationKind::InputObject(fields) => {
                ExtendedType::InputObject(Node::new(InputObjectType {
                    description: None,
                    name,
                    directives: Default::default(),
                    fields: fields
                        .iter()
                        .map(|(field, ty)| {
                            (
                                field.clone(),
                                Component::new(InputValueDefinition {
                                    description: None,
                                    name: field.clone(),
                                    ty: Node::new(self.type_in_schema(ty, link)),
                                    default_value: None,
                                    directives: Default::default(),
                                }),
                            )
                        })
                        .collect(),
                }))
            }
        }
    }

    /// Adds the definitions of every element of the feature in the version `link` links, keeping
    /// the definitions `schema` already has.
    pub(crate) fn add_definitions_to(&self, schema: &mut Schema, link: &Link) {
        let version = link.url.version;
        for spec in self.types_at(version) {
            let definition = self.type_definition(spec, Some(link));
            schema
                .types
                .entry(definition.name().clone())
                .or_insert(definition);
        }
        for spec in self.directives_at(version) {
            let definition = self.directive_definition(spec, Some(link), version);
            schema
                .directive_definitions
                .entry(definition.name.clone())
                .or_insert(definition);
        }
    }

    fn type_name(&self, name_in_spec: &Name, link: Option<&Link>) -> Name {
        match link {
            Some(link) => link.type_name_in_schema(name_in_spec),
            None => name_in_spec.clone(),
        }
    }

    /// Renames the references to this feature's types found in `ty`.
    fn type_in_schema(&self, ty: &Type, link: Option<&Link>) -> Type {
        let rename = |name: &Name| {
            if self.types.iter().any(|t| t.name == *name) {
                self.type_name(name, link)
            } else {
                name.clone()
            }
        };
        match ty {
            Type::Named(name) => Type::Named(rename(name)),
            Type::NonNullNamed(name) => Type::NonNullNamed(rename(name)),
            Type::List(inner) => Type::List(Box::new(self.type_in_schema(inner, link))),
            Type::NonNullList(inner) => {
                Type::NonNullList(Box::new(self.type_in_schema(inner, link)))
            }
        }
    }
}

/// The explicit, immutable set of features composition knows.
#[derive(Clone, Debug)]
pub struct FeatureRegistry {
    features: IndexMap<Identity, FeatureDefinition>,
}

impl Default for FeatureRegistry {
    fn default() -> Self {
        Self {
            features: Default::default(),
        }
        .with_feature(link_feature())
        .with_feature(join_feature())
        .with_feature(federation_feature())
        .with_feature(inaccessible_feature())
        .with_feature(tag_feature())
        .with_feature(authenticated_feature())
        .with_feature(requires_scopes_feature())
        .with_feature(policy_feature())
        .with_feature(cost_feature())
    }
}

impl FeatureRegistry {
    /// Registers (or replaces) a feature.
    pub fn with_feature(mut self, feature: FeatureDefinition) -> Self {
        self.features.insert(feature.identity.clone(), feature);
        self
    }

    pub fn get(&self, identity: &Identity) -> Option<&FeatureDefinition> {
        self.features.get(identity)
    }

    pub fn federation(&self) -> Option<&FeatureDefinition> {
        self.get(&Identity::federation_identity())
    }

    /// The federation version a subgraph linking `url` implicitly requires, if the registry knows
    /// that feature version.
    pub fn minimum_federation_version(&self, url: &Url) -> Option<Version> {
        self.get(&url.identity)?
            .find_version(&url.version)?
            .minimum_federation_version
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureDefinition> {
        self.features.values()
    }
}

pub(crate) const ALL_TYPE_SYSTEM_LOCATIONS: [DirectiveLocation; 10] = [
    DirectiveLocation::FieldDefinition,
    DirectiveLocation::Object,
    DirectiveLocation::Interface,
    DirectiveLocation::Union,
    DirectiveLocation::ArgumentDefinition,
    DirectiveLocation::Scalar,
    DirectiveLocation::Enum,
    DirectiveLocation::EnumValue,
    DirectiveLocation::InputObject,
    DirectiveLocation::InputFieldDefinition,
];

pub(crate) const AUTHORIZATION_LOCATIONS: [DirectiveLocation; 5] = [
    DirectiveLocation::FieldDefinition,
    DirectiveLocation::Object,
    DirectiveLocation::Interface,
    DirectiveLocation::Scalar,
    DirectiveLocation::Enum,
];

/// Applications are merged into the supergraph, where `feature` is linked at `major.minor`.
pub(crate) fn merged_as(feature: &str, major: u32, minor: u32) -> DirectiveComposition {
    DirectiveComposition::Merged {
        supergraph_feature: Url {
            identity: Identity::apollo(Name::new_unchecked(feature)),
            version: Version::new(major, minor),
        },
    }
}

pub(crate) fn inaccessible_directive() -> DirectiveSpecification {
    DirectiveSpecification::new(name!("inaccessible"), &ALL_TYPE_SYSTEM_LOCATIONS)
}

pub(crate) fn tag_directive() -> DirectiveSpecification {
    DirectiveSpecification::new(name!("tag"), &ALL_TYPE_SYSTEM_LOCATIONS)
        .argument(DirectiveArgumentSpecification::new(name!("name"), ty!(String!)))
        .repeatable()
}

pub(crate) fn authenticated_directive() -> DirectiveSpecification {
    DirectiveSpecification::new(name!("authenticated"), &AUTHORIZATION_LOCATIONS)
}

pub(crate) fn requires_scopes_directive() -> DirectiveSpecification {
    DirectiveSpecification::new(name!("requiresScopes"), &AUTHORIZATION_LOCATIONS).argument(
        DirectiveArgumentSpecification::new(name!("scopes"), ty!([[Scope!]!]!))
            .with_strategy(ArgumentCompositionStrategy::Union),
    )
}

pub(crate) fn policy_directive() -> DirectiveSpecification {
    DirectiveSpecification::new(name!("policy"), &AUTHORIZATION_LOCATIONS).argument(
        DirectiveArgumentSpecification::new(name!("policies"), ty!([[Policy!]!]!))
            .with_strategy(ArgumentCompositionStrategy::Union),
    )
}

pub(crate) fn cost_directive() -> DirectiveSpecification {
    DirectiveSpecification::new(
        name!("cost"),
        &[
            DirectiveLocation::ArgumentDefinition,
            DirectiveLocation::Enum,
            DirectiveLocation::FieldDefinition,
            DirectiveLocation::InputFieldDefinition,
            DirectiveLocation::Object,
            DirectiveLocation::Scalar,
        ],
    )
    .argument(
        DirectiveArgumentSpecification::new(name!("weight"), ty!(Int!))
            .with_strategy(ArgumentCompositionStrategy::Max),
    )
}

pub(crate) fn list_size_directive() -> DirectiveSpecification {
    DirectiveSpecification::new(name!("listSize"), &[DirectiveLocation::FieldDefinition])
        .argument(
            DirectiveArgumentSpecification::new(name!("assumedSize"), ty!(Int))
                .with_strategy(ArgumentCompositionStrategy::NullableMax),
        )
        .argument(
            DirectiveArgumentSpecification::new(name!("slicingArguments"), ty!([String!]))
                .with_strategy(ArgumentCompositionStrategy::NullableUnion),
        )
        .argument(
            DirectiveArgumentSpecification::new(name!("sizedFields"), ty!([String!]))
                .with_strategy(ArgumentCompositionStrategy::NullableUnion),
        )
        .argument(
            DirectiveArgumentSpecification::new(name!("requireOneSlicingArgument"), ty!(Boolean))
                .with_default(Value::Boolean(true))
                .with_strategy(ArgumentCompositionStrategy::NullableAnd),
        )
}

fn inaccessible_feature() -> FeatureDefinition {
    FeatureDefinition::new(Identity::inaccessible_identity())
        .version(Version::new(0, 1), Some(Version::new(1, 0)))
        .version(Version::new(0, 2), Some(Version::new(2, 0)))
        .directive(inaccessible_directive().composed(merged_as("inaccessible", 0, 2)))
}

fn tag_feature() -> FeatureDefinition {
    FeatureDefinition::new(Identity::tag_identity())
        .version(Version::new(0, 1), Some(Version::new(1, 0)))
        .version(Version::new(0, 2), Some(Version::new(1, 0)))
        .version(Version::new(0, 3), Some(Version::new(2, 0)))
        .directive(tag_directive().composed(merged_as("tag", 0, 3)))
}

fn authenticated_feature() -> FeatureDefinition {
    FeatureDefinition::new(Identity::apollo(name!("authenticated")))
        .purpose(Purpose::Security)
        .version(Version::new(0, 1), Some(Version::new(2, 5)))
        .directive(authenticated_directive().composed(merged_as("authenticated", 0, 1)))
}

fn requires_scopes_feature() -> FeatureDefinition {
    FeatureDefinition::new(Identity::apollo(name!("requiresScopes")))
        .purpose(Purpose::Security)
        .version(Version::new(0, 1), Some(Version::new(2, 5)))
        .directive(requires_scopes_directive().composed(merged_as("requiresScopes", 0, 1)))
        .type_(TypeSpecification::scalar(name!("Scope")))
}

fn policy_feature() -> FeatureDefinition {
    FeatureDefinition::new(Identity::apollo(name!("policy")))
        .purpose(Purpose::Security)
        .version(Version::new(0, 1), Some(Version::new(2, 6)))
        .directive(policy_directive().composed(merged_as("policy", 0, 1)))
        .type_(TypeSpecification::scalar(name!("Policy")))
}

fn cost_feature() -> FeatureDefinition {
    FeatureDefinition::new(Identity::apollo(name!("cost")))
        .version(Version::new(0, 1), Some(Version::new(2, 9)))
        .directive(cost_directive().composed(merged_as("cost", 0, 1)))
        .directive(list_size_directive().composed(merged_as("cost", 0, 1)))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn default_registry_knows_feature_versions() {
        let registry = FeatureRegistry::default();
        let cost: Url = "https://specs.apollo.dev/cost/v0.1".parse().unwrap();
        assert_eq!(
            registry.minimum_federation_version(&cost),
            Some(Version::new(2, 9))
        );
        let unknown: Url = "https://specs.custom.dev/foo/v1.0".parse().unwrap();
        assert_eq!(registry.minimum_federation_version(&unknown), None);
        assert_eq!(
            registry
                .federation()
                .and_then(|f| f.latest_version())
                .map(|v| v.version),
            Some(Version::new(2, 9))
        );
    }

    #[test]
    fn builds_definitions_renamed_by_link() {
        let registry = FeatureRegistry::default();
        let feature = registry
            .get(&Identity::apollo(name!("requiresScopes")))
            .unwrap();
        let link = Link::new(feature.url(Version::new(0, 1)));
        let spec = feature.directive_spec("requiresScopes").unwrap();
        assert_eq!(
            feature
                .directive_definition(spec, Some(&link), Version::new(0, 1))
                .to_string(),
            "directive @requiresScopes(scopes: [[requiresScopes__Scope!]!]!) on FIELD_DEFINITION | OBJECT | INTERFACE | SCALAR | ENUM"
        );
        assert_eq!(
            feature.type_definition(&feature.types[0], Some(&link)).name(),
            "requiresScopes__Scope"
        );
        assert_eq!(
            spec.argument_strategy("scopes"),
            Some(ArgumentCompositionStrategy::Union)
        );
    }

    #[test]
    fn registers_custom_features() {
        let identity = Identity {
            domain: "https://specs.custom.dev".to_string(),
            name: name!("custom"),
        };
        let registry = FeatureRegistry::default().with_feature(
            FeatureDefinition::new(identity.clone())
                .version(Version::new(1, 0), None)
                .directive(DirectiveSpecification::new(
                    name!("custom"),
                    &[DirectiveLocation::Object],
                )),
        );
        assert!(registry.get(&identity).is_some());
    }
}
