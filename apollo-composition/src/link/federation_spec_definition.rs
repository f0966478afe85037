use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast::Argument;
use apollo_compiler::ast::Directive;
use apollo_compiler::ast::Value;
use apollo_compiler::name;
use apollo_compiler::schema::DirectiveLocation;
use apollo_compiler::ty;

use crate::link::Import;
use crate::link::Link;
use crate::link::feature_registry::DirectiveArgumentSpecification;
use crate::link::feature_registry::DirectiveSpecification;
use crate::link::feature_registry::FeatureDefinition;
use crate::link::feature_registry::TypeSpecification;
use crate::link::feature_registry::authenticated_directive;
use crate::link::feature_registry::cost_directive;
use crate::link::feature_registry::inaccessible_directive;
use crate::link::feature_registry::list_size_directive;
use crate::link::feature_registry::merged_as;
use crate::link::feature_registry::policy_directive;
use crate::link::feature_registry::requires_scopes_directive;
use crate::link::feature_registry::tag_directive;
use crate::link::spec::Identity;
use crate::link::spec::Version;

pub(crate) const FEDERATION_KEY_DIRECTIVE_NAME_IN_SPEC: Name = name!("key");
pub(crate) const FEDERATION_REQUIRES_DIRECTIVE_NAME_IN_SPEC: Name = name!("requires");
pub(crate) const FEDERATION_PROVIDES_DIRECTIVE_NAME_IN_SPEC: Name = name!("provides");
pub(crate) const FEDERATION_EXTERNAL_DIRECTIVE_NAME_IN_SPEC: Name = name!("external");
pub(crate) const FEDERATION_SHAREABLE_DIRECTIVE_NAME_IN_SPEC: Name = name!("shareable");
pub(crate) const FEDERATION_OVERRIDE_DIRECTIVE_NAME_IN_SPEC: Name = name!("override");
pub(crate) const FEDERATION_EXTENDS_DIRECTIVE_NAME_IN_SPEC: Name = name!("extends");
pub(crate) const FEDERATION_TAG_DIRECTIVE_NAME_IN_SPEC: Name = name!("tag");
pub(crate) const FEDERATION_INACCESSIBLE_DIRECTIVE_NAME_IN_SPEC: Name = name!("inaccessible");
pub(crate) const FEDERATION_COMPOSE_DIRECTIVE_NAME_IN_SPEC: Name = name!("composeDirective");
pub(crate) const FEDERATION_INTERFACE_OBJECT_DIRECTIVE_NAME_IN_SPEC: Name =
    name!("interfaceObject");
pub(crate) const FEDERATION_FIELD_SET_TYPE_NAME_IN_SPEC: Name = name!("FieldSet");

pub(crate) const FEDERATION_FIELDS_ARGUMENT_NAME: Name = name!("fields");
pub(crate) const FEDERATION_RESOLVABLE_ARGUMENT_NAME: Name = name!("resolvable");
pub(crate) const FEDERATION_FROM_ARGUMENT_NAME: Name = name!("from");
pub(crate) const FEDERATION_OVERRIDE_LABEL_ARGUMENT_NAME: Name = name!("label");
pub(crate) const FEDERATION_NAME_ARGUMENT_NAME: Name = name!("name");

/// The latest federation version composition supports.
pub(crate) const LATEST_FEDERATION_VERSION: Version = Version::new(2, 9);

fn v2(minor: u32) -> Version {
    Version::new(2, minor)
}

pub(crate) fn federation_feature() -> FeatureDefinition {
    let mut feature = FeatureDefinition::new(Identity::federation_identity());
    for minor in 0..=LATEST_FEDERATION_VERSION.minor {
        feature = feature.version(v2(minor), Some(v2(minor)));
    }
    feature
        .directive(
            DirectiveSpecification::new(
                FEDERATION_KEY_DIRECTIVE_NAME_IN_SPEC,
                &[DirectiveLocation::Object, DirectiveLocation::Interface],
            )
            .argument(DirectiveArgumentSpecification::new(
                FEDERATION_FIELDS_ARGUMENT_NAME,
                ty!(FieldSet!),
            ))
            .argument(
                DirectiveArgumentSpecification::new(
                    FEDERATION_RESOLVABLE_ARGUMENT_NAME,
                    ty!(Boolean),
                )
                .with_default(Value::Boolean(true)),
            )
            .repeatable(),
        )
        .directive(
            DirectiveSpecification::new(
                FEDERATION_REQUIRES_DIRECTIVE_NAME_IN_SPEC,
                &[DirectiveLocation::FieldDefinition],
            )
            .argument(DirectiveArgumentSpecification::new(
                FEDERATION_FIELDS_ARGUMENT_NAME,
                ty!(FieldSet!),
            )),
        )
        .directive(
            DirectiveSpecification::new(
                FEDERATION_PROVIDES_DIRECTIVE_NAME_IN_SPEC,
                &[DirectiveLocation::FieldDefinition],
            )
            .argument(DirectiveArgumentSpecification::new(
                FEDERATION_FIELDS_ARGUMENT_NAME,
                ty!(FieldSet!),
            )),
        )
        .directive(
            DirectiveSpecification::new(
                FEDERATION_EXTERNAL_DIRECTIVE_NAME_IN_SPEC,
                &[DirectiveLocation::Object, DirectiveLocation::FieldDefinition],
            )
            .argument(DirectiveArgumentSpecification::new(name!("reason"), ty!(String))),
        )
        .directive(
            DirectiveSpecification::new(
                FEDERATION_SHAREABLE_DIRECTIVE_NAME_IN_SPEC,
                &[DirectiveLocation::Object, DirectiveLocation::FieldDefinition],
            )
            .repeatable(),
        )
        .directive(
            DirectiveSpecification::new(
                FEDERATION_OVERRIDE_DIRECTIVE_NAME_IN_SPEC,
                &[DirectiveLocation::FieldDefinition],
            )
            .argument(DirectiveArgumentSpecification::new(
                FEDERATION_FROM_ARGUMENT_NAME,
                ty!(String!),
            ))
            .argument(
                DirectiveArgumentSpecification::new(
                    FEDERATION_OVERRIDE_LABEL_ARGUMENT_NAME,
                    ty!(String),
                )
                .since(v2(7)),
            ),
        )
        .directive(DirectiveSpecification::new(
            FEDERATION_EXTENDS_DIRECTIVE_NAME_IN_SPEC,
            &[DirectiveLocation::Object, DirectiveLocation::Interface],
        ))
        .directive(tag_directive().composed(merged_as("tag", 0, 3)))
        .directive(inaccessible_directive().composed(merged_as("inaccessible", 0, 2)))
        .directive(
            DirectiveSpecification::new(
                FEDERATION_COMPOSE_DIRECTIVE_NAME_IN_SPEC,
                &[DirectiveLocation::Schema],
            )
            .argument(DirectiveArgumentSpecification::new(
                FEDERATION_NAME_ARGUMENT_NAME,
                ty!(String!),
            ))
            .repeatable()
            .since(v2(1)),
        )
        .directive(
            DirectiveSpecification::new(
                FEDERATION_INTERFACE_OBJECT_DIRECTIVE_NAME_IN_SPEC,
                &[DirectiveLocation::Object],
            )
            .since(v2(3)),
        )
        .directive(
            authenticated_directive()
                .composed(merged_as("authenticated", 0, 1))
                .since(v2(5)),
        )
        .directive(
            requires_scopes_directive()
                .composed(merged_as("requiresScopes", 0, 1))
                .since(v2(5)),
        )
        .directive(
            policy_directive()
                .composed(merged_as("policy", 0, 1))
                .since(v2(6)),
        )
        .directive(cost_directive().composed(merged_as("cost", 0, 1)).since(v2(9)))
        .directive(
            list_size_directive()
                .composed(merged_as("cost", 0, 1))
                .since(v2(9)),
        )
        .type_(TypeSpecification::scalar(FEDERATION_FIELD_SET_TYPE_NAME_IN_SPEC))
        .type_(TypeSpecification::scalar(name!("Scope")).since(v2(5)))
        .type_(TypeSpecification::scalar(name!("Policy")).since(v2(6)))
}

/// The names federation directives have in one subgraph, as dictated by its federation `@link`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FederationDirectiveNames {
    pub key: Name,
    pub requires: Name,
    pub provides: Name,
    pub external: Name,
    pub shareable: Name,
    pub override_: Name,
    pub extends: Name,
    pub tag: Name,
    pub inaccessible: Name,
    pub compose_directive: Name,
    pub interface_object: Name,
    pub field_set: Name,
}

impl FederationDirectiveNames {
    pub(crate) fn from_link(link: &Link) -> Self {
        Self {
            key: link.directive_name_in_schema(&FEDERATION_KEY_DIRECTIVE_NAME_IN_SPEC),
            requires: link.directive_name_in_schema(&FEDERATION_REQUIRES_DIRECTIVE_NAME_IN_SPEC),
            provides: link.directive_name_in_schema(&FEDERATION_PROVIDES_DIRECTIVE_NAME_IN_SPEC),
            external: link.directive_name_in_schema(&FEDERATION_EXTERNAL_DIRECTIVE_NAME_IN_SPEC),
            shareable: link
                .directive_name_in_schema(&FEDERATION_SHAREABLE_DIRECTIVE_NAME_IN_SPEC),
            override_: link.directive_name_in_schema(&FEDERATION_OVERRIDE_DIRECTIVE_NAME_IN_SPEC),
            extends: link.directive_name_in_schema(&FEDERATION_EXTENDS_DIRECTIVE_NAME_IN_SPEC),
            tag: link.directive_name_in_schema(&FEDERATION_TAG_DIRECTIVE_NAME_IN_SPEC),
            inaccessible: link
                .directive_name_in_schema(&FEDERATION_INACCESSIBLE_DIRECTIVE_NAME_IN_SPEC),
            compose_directive: link
                .directive_name_in_schema(&FEDERATION_COMPOSE_DIRECTIVE_NAME_IN_SPEC),
            interface_object: link
                .directive_name_in_schema(&FEDERATION_INTERFACE_OBJECT_DIRECTIVE_NAME_IN_SPEC),
            field_set: link.type_name_in_schema(&FEDERATION_FIELD_SET_TYPE_NAME_IN_SPEC),
        }
    }

    /// The names used by subgraphs extracted from a supergraph, which import every directive.
    pub(crate) fn defaults() -> Self {
        Self {
            key: FEDERATION_KEY_DIRECTIVE_NAME_IN_SPEC,
            requires: FEDERATION_REQUIRES_DIRECTIVE_NAME_IN_SPEC,
            provides: FEDERATION_PROVIDES_DIRECTIVE_NAME_IN_SPEC,
            external: FEDERATION_EXTERNAL_DIRECTIVE_NAME_IN_SPEC,
            shareable: FEDERATION_SHAREABLE_DIRECTIVE_NAME_IN_SPEC,
            override_: FEDERATION_OVERRIDE_DIRECTIVE_NAME_IN_SPEC,
            extends: FEDERATION_EXTENDS_DIRECTIVE_NAME_IN_SPEC,
            tag: FEDERATION_TAG_DIRECTIVE_NAME_IN_SPEC,
            inaccessible: FEDERATION_INACCESSIBLE_DIRECTIVE_NAME_IN_SPEC,
            compose_directive: FEDERATION_COMPOSE_DIRECTIVE_NAME_IN_SPEC,
            interface_object: FEDERATION_INTERFACE_OBJECT_DIRECTIVE_NAME_IN_SPEC,
            field_set: FEDERATION_FIELD_SET_TYPE_NAME_IN_SPEC,
        }
    }
}

fn string_argument(name: Name, value: &str) -> Node<Argument> {
    Node::new(Argument {
        name,
        value: Node::new(Value::String(value.to_string())),
    })
}

pub(crate) fn key_directive(
    names: &FederationDirectiveNames,
    fields: &str,
    resolvable: bool,
) -> Directive {
    let mut arguments = vec![string_argument(FEDERATION_FIELDS_ARGUMENT_NAME, fields)];
    if !resolvable {
        arguments.push(Node::new(Argument {
            name: FEDERATION_RESOLVABLE_ARGUMENT_NAME,
            value: Node::new(Value::Boolean(false)),
        }));
    }
    Directive {
        name: names.key.clone(),
        arguments,
    }
}

pub(crate) fn requires_directive(names: &FederationDirectiveNames, fields: &str) -> Directive {
    Directive {
        name: names.requires.clone(),
        arguments: vec![string_argument(FEDERATION_FIELDS_ARGUMENT_NAME, fields)],
    }
}

pub(crate) fn provides_directive(names: &FederationDirectiveNames, fields: &str) -> Directive {
    Directive {
        name: names.provides.clone(),
        arguments: vec![string_argument(FEDERATION_FIELDS_ARGUMENT_NAME, fields)],
    }
}

pub(crate) fn external_directive(names: &FederationDirectiveNames) -> Directive {
    Directive {
        name: names.external.clone(),
        arguments: vec![],
    }
}

pub(crate) fn shareable_directive(names: &FederationDirectiveNames) -> Directive {
    Directive {
        name: names.shareable.clone(),
        arguments: vec![],
    }
}

pub(crate) fn interface_object_directive(names: &FederationDirectiveNames) -> Directive {
    Directive {
        name: names.interface_object.clone(),
        arguments: vec![],
    }
}

pub(crate) fn override_directive(
    names: &FederationDirectiveNames,
    from: &str,
    label: Option<&str>,
) -> Directive {
    let mut arguments = vec![string_argument(FEDERATION_FROM_ARGUMENT_NAME, from)];
    if let Some(label) = label {
        arguments.push(string_argument(FEDERATION_OVERRIDE_LABEL_ARGUMENT_NAME, label));
    }
    Directive {
        name: names.override_.clone(),
        arguments,
    }
}

/// A federation `@link` importing every directive of `version` under its own name.
pub(crate) fn federation_link_importing_everything(
    feature: &FeatureDefinition,
    version: Version,
) -> Link {
    let mut link = Link::new(feature.url(version));
    link.imports = feature
        .directives_at(version)
        .map(|directive| {
            Arc::new(Import {
                element: directive.name.clone(),
                is_directive: true,
                alias: None,
            })
        })
        .collect();
    link
}
