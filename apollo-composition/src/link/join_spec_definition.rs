use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast::Argument;
use apollo_compiler::ast::Directive;
use apollo_compiler::ast::Value;
use apollo_compiler::name;
use apollo_compiler::schema::DirectiveLocation;
use apollo_compiler::ty;

use crate::link::feature_registry::DirectiveArgumentSpecification;
use crate::link::feature_registry::DirectiveSpecification;
use crate::link::feature_registry::FeatureDefinition;
use crate::link::feature_registry::TypeSpecification;
use crate::link::feature_registry::TypeSpecificationKind;
use crate::link::spec::Identity;
use crate::link::spec::Version;

pub(crate) const JOIN_GRAPH_ENUM_NAME: Name = name!("join__Graph");
pub(crate) const JOIN_GRAPH_DIRECTIVE_NAME: Name = name!("join__graph");
pub(crate) const JOIN_TYPE_DIRECTIVE_NAME: Name = name!("join__type");
pub(crate) const JOIN_FIELD_DIRECTIVE_NAME: Name = name!("join__field");
pub(crate) const JOIN_IMPLEMENTS_DIRECTIVE_NAME: Name = name!("join__implements");
pub(crate) const JOIN_UNION_MEMBER_DIRECTIVE_NAME: Name = name!("join__unionMember");
pub(crate) const JOIN_ENUM_VALUE_DIRECTIVE_NAME: Name = name!("join__enumValue");
pub(crate) const JOIN_DIRECTIVE_DIRECTIVE_NAME: Name = name!("join__directive");

pub(crate) const JOIN_NAME_ARGUMENT_NAME: Name = name!("name");
pub(crate) const JOIN_URL_ARGUMENT_NAME: Name = name!("url");
pub(crate) const JOIN_GRAPH_ARGUMENT_NAME: Name = name!("graph");
pub(crate) const JOIN_GRAPHS_ARGUMENT_NAME: Name = name!("graphs");
pub(crate) const JOIN_KEY_ARGUMENT_NAME: Name = name!("key");
pub(crate) const JOIN_EXTENSION_ARGUMENT_NAME: Name = name!("extension");
pub(crate) const JOIN_RESOLVABLE_ARGUMENT_NAME: Name = name!("resolvable");
pub(crate) const JOIN_IS_INTERFACE_OBJECT_ARGUMENT_NAME: Name = name!("isInterfaceObject");
pub(crate) const JOIN_REQUIRES_ARGUMENT_NAME: Name = name!("requires");
pub(crate) const JOIN_PROVIDES_ARGUMENT_NAME: Name = name!("provides");
pub(crate) const JOIN_TYPE_ARGUMENT_NAME: Name = name!("type");
pub(crate) const JOIN_EXTERNAL_ARGUMENT_NAME: Name = name!("external");
pub(crate) const JOIN_OVERRIDE_ARGUMENT_NAME: Name = name!("override");
pub(crate) const JOIN_USED_OVERRIDDEN_ARGUMENT_NAME: Name = name!("usedOverridden");
pub(crate) const JOIN_OVERRIDE_LABEL_ARGUMENT_NAME: Name = name!("overrideLabel");
pub(crate) const JOIN_INTERFACE_ARGUMENT_NAME: Name = name!("interface");
pub(crate) const JOIN_MEMBER_ARGUMENT_NAME: Name = name!("member");
pub(crate) const JOIN_ARGS_ARGUMENT_NAME: Name = name!("args");

const V0_3: Version = Version::new(0, 3);
const V0_4: Version = Version::new(0, 4);
const V0_5: Version = Version::new(0, 5);

/// The `join` version a supergraph uses, chosen from the highest federation version used by its
/// subgraphs.
pub(crate) fn join_version_for_federation_version(federation_version: Version) -> Version {
    if federation_version >= Version::new(2, 8) {
        V0_5
    } else if federation_version >= Version::new(2, 7) {
        V0_4
    } else {
        V0_3
    }
}

pub(crate) fn join_feature() -> FeatureDefinition {
    let graph = ty!(Graph);
    let graph_non_null = ty!(Graph!);
    FeatureDefinition::new(Identity::join_identity())
        .purpose(crate::link::Purpose::Execution)
        .version(V0_3, Some(Version::new(2, 0)))
        .version(V0_4, Some(Version::new(2, 7)))
        .version(V0_5, Some(Version::new(2, 8)))
        .directive(
            DirectiveSpecification::new(name!("enumValue"), &[DirectiveLocation::EnumValue])
                .argument(DirectiveArgumentSpecification::new(
                    JOIN_GRAPH_ARGUMENT_NAME,
                    graph_non_null.clone(),
                ))
                .repeatable(),
        )
        .directive(
            DirectiveSpecification::new(
                name!("field"),
                &[
                    DirectiveLocation::FieldDefinition,
                    DirectiveLocation::InputFieldDefinition,
                ],
            )
            .argument(DirectiveArgumentSpecification::new(
                JOIN_GRAPH_ARGUMENT_NAME,
                graph.clone(),
            ))
            .argument(DirectiveArgumentSpecification::new(
                JOIN_REQUIRES_ARGUMENT_NAME,
                ty!(FieldSet),
            ))
            .argument(DirectiveArgumentSpecification::new(
                JOIN_PROVIDES_ARGUMENT_NAME,
                ty!(FieldSet),
            ))
            .argument(DirectiveArgumentSpecification::new(
                JOIN_TYPE_ARGUMENT_NAME,
                ty!(String),
            ))
            .argument(DirectiveArgumentSpecification::new(
                JOIN_EXTERNAL_ARGUMENT_NAME,
                ty!(Boolean),
            ))
            .argument(DirectiveArgumentSpecification::new(
                JOIN_OVERRIDE_ARGUMENT_NAME,
                ty!(String),
            ))
            .argument(DirectiveArgumentSpecification::new(
                JOIN_USED_OVERRIDDEN_ARGUMENT_NAME,
                ty!(Boolean),
            ))
            .argument(
                DirectiveArgumentSpecification::new(JOIN_OVERRIDE_LABEL_ARGUMENT_NAME, ty!(String))
                    .since(V0_4),
            )
            .argument(
                DirectiveArgumentSpecification::new(
                    name!("contextArguments"),
                    ty!([ContextArgument!]),
                )
                .since(V0_5),
            )
            .repeatable(),
        )
        .directive(
            DirectiveSpecification::new(name!("graph"), &[DirectiveLocation::EnumValue])
                .argument(DirectiveArgumentSpecification::new(
                    JOIN_NAME_ARGUMENT_NAME,
                    ty!(String!),
                ))
                .argument(DirectiveArgumentSpecification::new(
                    JOIN_URL_ARGUMENT_NAME,
                    ty!(String!),
                )),
        )
        .directive(
            DirectiveSpecification::new(
                name!("implements"),
                &[DirectiveLocation::Object, DirectiveLocation::Interface],
            )
            .argument(DirectiveArgumentSpecification::new(
                JOIN_GRAPH_ARGUMENT_NAME,
                graph_non_null.clone(),
            ))
            .argument(DirectiveArgumentSpecification::new(
                JOIN_INTERFACE_ARGUMENT_NAME,
                ty!(String!),
            ))
            .repeatable(),
        )
        .directive(
            DirectiveSpecification::new(
                name!("type"),
                &[
                    DirectiveLocation::Object,
                    DirectiveLocation::Interface,
                    DirectiveLocation::Union,
                    DirectiveLocation::Enum,
                    DirectiveLocation::InputObject,
                    DirectiveLocation::Scalar,
                ],
            )
            .argument(DirectiveArgumentSpecification::new(
                JOIN_GRAPH_ARGUMENT_NAME,
                graph_non_null.clone(),
            ))
            .argument(DirectiveArgumentSpecification::new(
                JOIN_KEY_ARGUMENT_NAME,
                ty!(FieldSet),
            ))
            .argument(
                DirectiveArgumentSpecification::new(JOIN_EXTENSION_ARGUMENT_NAME, ty!(Boolean!))
                    .with_default(Value::Boolean(false)),
            )
            .argument(
                DirectiveArgumentSpecification::new(JOIN_RESOLVABLE_ARGUMENT_NAME, ty!(Boolean!))
                    .with_default(Value::Boolean(true)),
            )
            .argument(
                DirectiveArgumentSpecification::new(
                    JOIN_IS_INTERFACE_OBJECT_ARGUMENT_NAME,
                    ty!(Boolean!),
                )
                .with_default(Value::Boolean(false)),
            )
            .repeatable(),
        )
        .directive(
            DirectiveSpecification::new(name!("unionMember"), &[DirectiveLocation::Union])
                .argument(DirectiveArgumentSpecification::new(
                    JOIN_GRAPH_ARGUMENT_NAME,
                    graph_non_null,
                ))
                .argument(DirectiveArgumentSpecification::new(
                    JOIN_MEMBER_ARGUMENT_NAME,
                    ty!(String!),
                ))
                .repeatable(),
        )
        .directive(
            DirectiveSpecification::new(
                name!("directive"),
                &[
                    DirectiveLocation::Schema,
                    DirectiveLocation::Object,
                    DirectiveLocation::Interface,
                    DirectiveLocation::FieldDefinition,
                ],
            )
            .argument(DirectiveArgumentSpecification::new(
                JOIN_GRAPHS_ARGUMENT_NAME,
                ty!([Graph!]),
            ))
            .argument(DirectiveArgumentSpecification::new(
                JOIN_NAME_ARGUMENT_NAME,
                ty!(String!),
            ))
            .argument(DirectiveArgumentSpecification::new(
                JOIN_ARGS_ARGUMENT_NAME,
                ty!(DirectiveArguments),
            ))
            .repeatable()
            .since(V0_4),
        )
        .type_(TypeSpecification::scalar(name!("FieldSet")))
        .type_(TypeSpecification {
            name: name!("Graph"),
            kind: TypeSpecificationKind::Enum(vec![]),
            since: V0_3,
        })
        .type_(TypeSpecification::scalar(name!("DirectiveArguments")).since(V0_4))
        .type_(TypeSpecification::scalar(name!("FieldValue")).since(V0_5))
        .type_(TypeSpecification {
            name: name!("ContextArgument"),
            kind: TypeSpecificationKind::InputObject(vec![
                (name!("name"), ty!(String!)),
                (name!("type"), ty!(String!)),
                (name!("context"), ty!(String!)),
                (name!("selection"), ty!(FieldValue!)),
            ]),
            since: V0_5,
        })
}

fn argument(name: Name, value: Value) -> Node<Argument> {
    Node::new(Argument {
        name,
        value: Node::new(value),
    })
}

fn enum_value(name: &Name) -> Value {
    Value::Enum(name.clone())
}

/// Builds the `join` directive applications recorded in a supergraph. Graphs are referred to by
/// their `join__Graph` enum value.
#[derive(Clone, Copy, Debug)]
pub(crate) struct JoinSpec {
    pub(crate) version: Version,
}

/// The arguments of a `@join__field` application. `None`/`false` arguments are omitted.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct JoinFieldArguments {
    pub(crate) graph: Option<Name>,
    pub(crate) requires: Option<String>,
    pub(crate) provides: Option<String>,
    pub(crate) type_: Option<String>,
    pub(crate) external: bool,
    pub(crate) override_: Option<String>,
    pub(crate) used_overridden: bool,
    pub(crate) override_label: Option<String>,
}

impl JoinSpec {
    pub(crate) fn supports_join_directive(&self) -> bool {
        self.version >= V0_4
    }

    pub(crate) fn graph_directive(&self, name: &str, url: &str) -> Directive {
        Directive {
            name: JOIN_GRAPH_DIRECTIVE_NAME,
            arguments: vec![
                argument(JOIN_NAME_ARGUMENT_NAME, Value::String(name.to_string())),
                argument(JOIN_URL_ARGUMENT_NAME, Value::String(url.to_string())),
            ],
        }
    }

    pub(crate) fn type_directive(
        &self,
        graph: &Name,
        key: Option<&str>,
        extension: bool,
        resolvable: bool,
        is_interface_object: bool,
    ) -> Directive {
        let mut arguments = vec![argument(JOIN_GRAPH_ARGUMENT_NAME, enum_value(graph))];
        if let Some(key) = key {
            arguments.push(argument(
                JOIN_KEY_ARGUMENT_NAME,
                Value::String(key.to_string()),
            ));
        }
        if extension {
            arguments.push(argument(JOIN_EXTENSION_ARGUMENT_NAME, Value::Boolean(true)));
        }
        if !resolvable {
            arguments.push(argument(
                JOIN_RESOLVABLE_ARGUMENT_NAME,
                Value::Boolean(false),
            ));
        }
        if is_interface_object {
            arguments.push(argument(
                JOIN_IS_INTERFACE_OBJECT_ARGUMENT_NAME,
                Value::Boolean(true),
            ));
        }
        Directive {
            name: JOIN_TYPE_DIRECTIVE_NAME,
            arguments,
        }
    }

    pub(crate) fn field_directive(&self, args: &JoinFieldArguments) -> Directive {
        let mut arguments = vec![];
        if let Some(graph) = &args.graph {
            arguments.push(argument(JOIN_GRAPH_ARGUMENT_NAME, enum_value(graph)));
        }
        let strings = [
            (JOIN_REQUIRES_ARGUMENT_NAME, &args.requires),
            (JOIN_PROVIDES_ARGUMENT_NAME, &args.provides),
            (JOIN_TYPE_ARGUMENT_NAME, &args.type_),
        ];
        for (name, value) in strings {
            if let Some(value) = value {
                arguments.push(argument(name, Value::String(value.clone())));
            }
        }
        if args.external {
            arguments.push(argument(JOIN_EXTERNAL_ARGUMENT_NAME, Value::Boolean(true)));
        }
        if let Some(override_) = &args.override_ {
            arguments.push(argument(
                JOIN_OVERRIDE_ARGUMENT_NAME,
                Value::String(override_.clone()),
            ));
        }
        if args.used_overridden {
            arguments.push(argument(
                JOIN_USED_OVERRIDDEN_ARGUMENT_NAME,
                Value::Boolean(true),
            ));
        }
        if let Some(label) = &args.override_label
            && self.version >= V0_4
        {
            arguments.push(argument(
                JOIN_OVERRIDE_LABEL_ARGUMENT_NAME,
                Value::String(label.clone()),
            ));
        }
        Directive {
            name: JOIN_FIELD_DIRECTIVE_NAME,
            arguments,
        }
    }

    pub(crate) fn implements_directive(&self, graph: &Name, interface: &str) -> Directive {
        Directive {
            name: JOIN_IMPLEMENTS_DIRECTIVE_NAME,
            arguments: vec![
                argument(JOIN_GRAPH_ARGUMENT_NAME, enum_value(graph)),
                argument(
                    JOIN_INTERFACE_ARGUMENT_NAME,
                    Value::String(interface.to_string()),
                ),
            ],
        }
    }

    pub(crate) fn union_member_directive(&self, graph: &Name, member: &str) -> Directive {
        Directive {
            name: JOIN_UNION_MEMBER_DIRECTIVE_NAME,
            arguments: vec![
                argument(JOIN_GRAPH_ARGUMENT_NAME, enum_value(graph)),
                argument(JOIN_MEMBER_ARGUMENT_NAME, Value::String(member.to_string())),
            ],
        }
    }

    pub(crate) fn enum_value_directive(&self, graph: &Name) -> Directive {
        Directive {
            name: JOIN_ENUM_VALUE_DIRECTIVE_NAME,
            arguments: vec![argument(JOIN_GRAPH_ARGUMENT_NAME, enum_value(graph))],
        }
    }

    /// Records a directive application from some subgraphs as `@join__directive`.
    pub(crate) fn directive_directive(
        &self,
        graphs: &[Name],
        directive: &Directive,
    ) -> Directive {
        let args = directive
            .arguments
            .iter()
            .map(|arg| (arg.name.clone(), arg.value.clone()))
            .collect();
        Directive {
            name: JOIN_DIRECTIVE_DIRECTIVE_NAME,
            arguments: vec![
                argument(
                    JOIN_GRAPHS_ARGUMENT_NAME,
                    Value::List(graphs.iter().map(|g| Node::new(enum_value(g))).collect()),
                ),
                argument(
                    JOIN_NAME_ARGUMENT_NAME,
                    Value::String(directive.name.to_string()),
                ),
                argument(JOIN_ARGS_ARGUMENT_NAME, Value::Object(args)),
            ],
        }
    }
}
