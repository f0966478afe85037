use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast::Argument;
use apollo_compiler::ast::Directive;
use apollo_compiler::ast::Value;
use apollo_compiler::name;
use apollo_compiler::schema::DirectiveLocation;
use apollo_compiler::ty;

use crate::link::DEFAULT_IMPORT_SCALAR_NAME;
use crate::link::DEFAULT_LINK_NAME;
use crate::link::DEFAULT_PURPOSE_ENUM_NAME;
use crate::link::Purpose;
use crate::link::feature_registry::DirectiveArgumentSpecification;
use crate::link::feature_registry::DirectiveSpecification;
use crate::link::feature_registry::FeatureDefinition;
use crate::link::feature_registry::TypeSpecification;
use crate::link::feature_registry::TypeSpecificationKind;
use crate::link::spec::Identity;
use crate::link::spec::Url;
use crate::link::spec::Version;

pub(crate) const LINK_VERSION: Version = Version::new(1, 0);

pub(crate) fn link_feature() -> FeatureDefinition {
    FeatureDefinition::new(Identity::link_identity())
        .version(LINK_VERSION, Some(Version::new(2, 0)))
        .directive(
            DirectiveSpecification::new(DEFAULT_LINK_NAME, &[DirectiveLocation::Schema])
                .argument(DirectiveArgumentSpecification::new(name!("url"), ty!(String)))
                .argument(DirectiveArgumentSpecification::new(name!("as"), ty!(String)))
                .argument(DirectiveArgumentSpecification::new(name!("for"), ty!(Purpose)))
                .argument(DirectiveArgumentSpecification::new(name!("import"), ty!([Import])))
                .repeatable(),
        )
        .type_(TypeSpecification::scalar(DEFAULT_IMPORT_SCALAR_NAME))
        .type_(TypeSpecification {
            name: DEFAULT_PURPOSE_ENUM_NAME,
            kind: TypeSpecificationKind::Enum(vec![
                (
                    name!("SECURITY"),
                    Some("`SECURITY` features provide metadata necessary to securely resolve fields."),
                ),
                (
                    name!("EXECUTION"),
                    Some("`EXECUTION` features provide metadata necessary for operation execution."),
                ),
            ]),
            since: Version::new(0, 0),
        })
}

/// Builds a `@link` application, importing the given directives (without their `@`).
pub(crate) fn link_directive(
    link_name: &Name,
    url: &Url,
    imports: &[Name],
    purpose: Option<Purpose>,
) -> Directive {
    let mut arguments = vec![Node::new(Argument {
        name: name!("url"),
        value: Node::new(Value::String(url.to_string())),
    })];
    if !imports.is_empty() {
        arguments.push(Node::new(Argument {
            name: name!("import"),
            value: Node::new(Value::List(
                imports
                    .iter()
                    .map(|import| Node::new(Value::String(format!("@{import}"))))
                    .collect(),
            )),
        }));
    }
    if let Some(purpose) = purpose {
        arguments.push(Node::new(Argument {
            name: name!("for"),
            value: Node::new(Value::Enum(Name::new_unchecked(&purpose.to_string()))),
        }));
    }
    Directive {
        name: link_name.clone(),
        arguments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_directive_round_trips_through_link_parsing() {
        let url: Url = "https://specs.apollo.dev/cost/v0.1".parse().unwrap();
        let directive = link_directive(
            &DEFAULT_LINK_NAME,
            &url,
            &[name!("cost"), name!("listSize")],
            None,
        );
        assert_eq!(
            directive.to_string(),
            r#"@link(url: "https://specs.apollo.dev/cost/v0.1", import: ["@cost", "@listSize"])"#
        );
        let link = crate::link::Link::from_directive_application(&directive).unwrap();
        assert_eq!(link.url, url);
        assert_eq!(link.imports.len(), 2);
    }
}
