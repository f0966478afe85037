use std::ops::Range;

use apollo_compiler::Name;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::parser::LineColumn;
use apollo_compiler::parser::SourceMap;
use apollo_compiler::schema::ComponentName;
use apollo_compiler::schema::ExtendedType;

use crate::error::ErrorCode;
use crate::error::FederationError;
use crate::internal_error;
use crate::link::federation_spec_definition::FEDERATION_FIELDS_ARGUMENT_NAME;
use crate::link::federation_spec_definition::FEDERATION_RESOLVABLE_ARGUMENT_NAME;
use crate::merger::Merger;
use crate::merger::Sources;
use crate::merger::error_reporter::Mismatch;
use crate::merger::error_reporter::SourceLocated;
use crate::merger::hints::HintCode;
use crate::merger::merge_field::fields_of;
use crate::schema::directive_optional_boolean_argument;
use crate::schema::directive_optional_string_argument;
use crate::schema::position::SchemaElementPosition;
use crate::schema::possible_runtime_types;
use crate::utils::human_readable::human_readable_types;

/// A subgraph type along with a yes/no fact the accessor of a mismatch cannot compute alone.
#[derive(Clone)]
struct FlaggedType {
    type_: ExtendedType,
    flag: bool,
}

impl SourceLocated for FlaggedType {
    fn source_range(&self, sources: &SourceMap) -> Option<Range<LineColumn>> {
        self.type_.source_range(sources)
    }
}

impl Merger {
    /// Records in `@join__type` which subgraphs define the type, with one application per key.
    pub(super) fn add_join_type(
        &mut self,
        name: &Name,
        sources: &Sources<ExtendedType>,
    ) -> Result<(), FederationError> {
        let mut applications = vec![];
        for (index, type_) in sources {
            let Some(type_) = type_ else {
                continue;
            };
            let metadata = self.subgraphs[*index].metadata();
            let names = metadata.directive_names();
            let graph = &self.join_spec_names[*index];
            let is_interface_object = metadata.is_interface_object(name);
            let keys: Vec<_> = type_.directives().get_all(&names.key).collect();
            if keys.is_empty() {
                applications.push(self.join_spec.type_directive(
                    graph,
                    None,
                    false,
                    true,
                    is_interface_object,
                ));
                continue;
            }
            let extends = type_.directives().has(&names.extends);
            for key in keys {
                let fields =
                    directive_optional_string_argument(key, &FEDERATION_FIELDS_ARGUMENT_NAME)?;
                let resolvable =
                    directive_optional_boolean_argument(key, &FEDERATION_RESOLVABLE_ARGUMENT_NAME)?
                        .unwrap_or(true);
                let extension = extends || key.origin.extension_id().is_some();
                applications.push(self.join_spec.type_directive(
                    graph,
                    fields,
                    extension,
                    resolvable,
                    is_interface_object,
                ));
            }
        }
        let position = SchemaElementPosition::Type(name.clone());
        for application in applications {
            position.insert_directive(&mut self.merged, application)?;
        }
        Ok(())
    }

    pub(super) fn merge_scalar(&mut self, name: &Name) -> Result<(), FederationError> {
        let sources = self.type_sources(name);
        self.add_join_type(name, &sources)
    }

    pub(super) fn merge_input(&mut self, name: &Name) -> Result<(), FederationError> {
        let sources = self.type_sources(name);
        self.add_join_type(name, &sources)?;
        self.merge_input_fields(name, &sources)
    }

    /// Unions take the union of their members, each recorded with `@join__unionMember`.
    pub(super) fn merge_union(&mut self, name: &Name) -> Result<(), FederationError> {
        let sources = self.type_sources(name);
        self.add_join_type(name, &sources)?;

        let mut members: IndexSet<Name> = IndexSet::default();
        let mut applications = vec![];
        for (index, type_) in &sources {
            let Some(ExtendedType::Union(union_)) = type_ else {
                continue;
            };
            for member in &union_.members {
                members.insert(member.name.clone());
                applications.push(
                    self.join_spec
                        .union_member_directive(&self.join_spec_names[*index], &member.name),
                );
            }
        }
        let Some(ExtendedType::Union(merged)) = self.merged.types.get_mut(name) else {
            return Err(internal_error!("Merged type \"{name}\" should be a union"));
        };
        let merged = merged.make_mut();
        for member in &members {
            merged.members.insert(ComponentName::from(member.clone()));
        }
        let position = SchemaElementPosition::Type(name.clone());
        for application in applications {
            position.insert_directive(&mut self.merged, application)?;
        }

        let Some(supergraph_type) = self.merged.types.get(name).cloned() else {
            return Ok(());
        };
        for member in &members {
            let is_missing_somewhere = sources.values().flatten().any(|type_| match type_ {
                ExtendedType::Union(union_) => !union_.members.contains(member),
                _ => false,
            });
            if !is_missing_somewhere {
                continue;
            }
            self.error_reporter.report_mismatch_hint(
                HintCode::InconsistentUnionMember,
                &format!(
                    "Union type \"{name}\" includes member type \"{member}\" in some but not all defining subgraphs: "
                ),
                Mismatch::new(Some(&supergraph_type), &sources, |type_, _| {
                    let has_member = match type_ {
                        ExtendedType::Union(union_) => union_.members.contains(member),
                        _ => false,
                    };
                    Some(if has_member { "yes" } else { "no" }.to_string())
                })
                .printers(
                    |_, subgraphs| {
                        format!("\"{member}\" is defined in {}", subgraphs.unwrap_or(""))
                    },
                    |_, subgraphs| format!(" but not in {subgraphs}"),
                ),
            );
        }
        Ok(())
    }

    pub(super) fn merge_object(&mut self, name: &Name) -> Result<(), FederationError> {
        let sources = self.type_sources(name);
        self.add_join_type(name, &sources)?;
        let is_entity = self.hint_on_inconsistent_entity(name, &sources);
        let is_value_type = !is_entity && !self.is_root_type(name);
        let is_subscription = self
            .merged
            .schema_definition
            .subscription
            .as_ref()
            .is_some_and(|root| root.name == *name);

        let fields = self.field_sources(&sources);
        if fields.is_empty() {
            // Only possible for a root type left without merged fields.
            self.merged.types.shift_remove(name);
            self.merged_type_names.shift_remove(name);
            return Ok(());
        }
        for (field_name, field_sources) in &fields {
            let position = SchemaElementPosition::field(name, field_name);
            self.add_field_shallow(name, field_sources)?;
            if is_value_type {
                self.hint_on_inconsistent_value_type_field(
                    name,
                    &sources,
                    field_name,
                    "non-entity object",
                );
            }
            let context = self.validate_override(field_sources, &position)?;
            if is_subscription {
                self.validate_subscription_field(field_sources, name, field_name);
            }
            self.merge_field(field_sources, &position, &context)?;
            self.validate_field_sharing(field_sources, &position, &context);
        }
        Ok(())
    }

    pub(super) fn merge_interface(&mut self, name: &Name) -> Result<(), FederationError> {
        let sources = self.type_sources(name);
        self.add_join_type(name, &sources)?;
        let has_key = self.validate_interface_keys(name, &sources);
        self.validate_interface_objects(name, &sources);

        let fields = self.field_sources(&sources);
        for (field_name, field_sources) in &fields {
            let position = SchemaElementPosition::field(name, field_name);
            self.add_field_shallow(name, field_sources)?;
            if !has_key {
                self.hint_on_inconsistent_value_type_field(
                    name,
                    &sources,
                    field_name,
                    "interface",
                );
            }
            let context = self.validate_override(field_sources, &position)?;
            self.merge_field(field_sources, &position, &context)?;
        }
        Ok(())
    }

    /// Hints when only some of the subgraphs defining an object type declare a `@key` on it.
    /// Returns whether the type is an entity.
    fn hint_on_inconsistent_entity(
        &mut self,
        name: &Name,
        sources: &Sources<ExtendedType>,
    ) -> bool {
        let flagged: Sources<FlaggedType> = sources
            .iter()
            .map(|(index, type_)| {
                let key = &self.subgraphs[*index].metadata().directive_names().key;
                let flagged = type_.as_ref().map(|type_| FlaggedType {
                    flag: type_.directives().has(key),
                    type_: type_.clone(),
                });
                (*index, flagged)
            })
            .collect();
        let as_entity = flagged.values().flatten().filter(|t| t.flag).count();
        let as_value = flagged.values().flatten().filter(|t| !t.flag).count();
        if as_entity > 0 && as_value > 0 {
            let Some(supergraph_type) = self.merged.types.get(name).cloned() else {
                return true;
            };
            let supergraph = FlaggedType {
                type_: supergraph_type,
                flag: false,
            };
            self.error_reporter.report_mismatch_hint(
                HintCode::InconsistentEntity,
                &format!(
                    "Type \"{name}\" is declared as an entity (has a @key applied) in some but not all defining subgraphs: "
                ),
                Mismatch::new(Some(&supergraph), &flagged, |type_, _| {
                    Some(if type_.flag { "yes" } else { "no" }.to_string())
                })
                .printers(
                    |_, subgraphs| format!("it has no @key in {}", subgraphs.unwrap_or("")),
                    |_, subgraphs| format!(" but has some @key in {subgraphs}"),
                ),
            );
        }
        as_entity > 0
    }

    fn hint_on_inconsistent_value_type_field(
        &mut self,
        name: &Name,
        sources: &Sources<ExtendedType>,
        field_name: &Name,
        type_description: &str,
    ) {
        let has_field = |type_: &ExtendedType| {
            fields_of(type_).is_some_and(|fields| fields.contains_key(field_name))
        };
        if sources.values().flatten().all(has_field) {
            return;
        }
        let Some(supergraph_type) = self.merged.types.get(name).cloned() else {
            return;
        };
        let code = if type_description == "interface" {
            HintCode::InconsistentInterfaceValueTypeField
        } else {
            HintCode::InconsistentObjectValueTypeField
        };
        self.error_reporter.report_mismatch_hint(
            code,
            &format!(
                "Field \"{name}.{field_name}\" of {type_description} type \"{name}\" is defined in some but not all subgraphs that define \"{name}\": "
            ),
            Mismatch::new(Some(&supergraph_type), sources, |type_, _| {
                Some(if has_field(type_) { "yes" } else { "no" }.to_string())
            })
            .printers(
                |_, subgraphs| {
                    format!(
                        "\"{name}.{field_name}\" is defined in {}",
                        subgraphs.unwrap_or("")
                    )
                },
                |_, subgraphs| format!(" but not in {subgraphs}"),
            ),
        );
    }

    /// A subgraph with a resolvable `@key` on an interface must define every implementation of
    /// the interface. Returns whether any subgraph has a key on the interface.
    fn validate_interface_keys(&mut self, name: &Name, sources: &Sources<ExtendedType>) -> bool {
        let supergraph_implementations = possible_runtime_types(&self.merged, name);
        let mut has_key = false;
        for (index, type_) in sources {
            let Some(type_ @ ExtendedType::Interface(_)) = type_ else {
                continue;
            };
            let subgraph = &self.subgraphs[*index];
            let keys = subgraph.metadata().keys(type_);
            has_key |= !keys.is_empty();
            let Some(resolvable_key) = type_
                .directives()
                .get_all(&subgraph.metadata().directive_names().key)
                .find(|key| {
                    directive_optional_boolean_argument(key, &FEDERATION_RESOLVABLE_ARGUMENT_NAME)
                        .ok()
                        .flatten()
                        .unwrap_or(true)
                })
            else {
                continue;
            };
            let subgraph_implementations = possible_runtime_types(subgraph.schema(), name);
            let missing: Vec<&Name> = supergraph_implementations
                .iter()
                .filter(|implementation| !subgraph_implementations.contains(*implementation))
                .collect();
            if missing.is_empty() {
                continue;
            }
            let subgraph_name = &subgraph.name;
            let locations = self.error_reporter.location(*index, resolvable_key);
            self.error_reporter
                .add_error(ErrorCode::InterfaceKeyMissingImplementationType.err(
                    format!(
                        "[{subgraph_name}] Interface type \"{name}\" has a resolvable key ({}) in subgraph \"{subgraph_name}\" but that subgraph is missing some of the supergraph implementation types of \"{name}\". Subgraph \"{subgraph_name}\" should define {} (and have {} implement \"{name}\").",
                        resolvable_key.serialize(),
                        human_readable_types(missing.iter()),
                        if missing.len() > 1 { "them" } else { "it" },
                    ),
                    locations,
                ));
        }
        has_key
    }

    /// A subgraph declaring an interface as `@interfaceObject` cannot define its implementations.
    fn validate_interface_objects(&mut self, name: &Name, sources: &Sources<ExtendedType>) {
        let supergraph_implementations = possible_runtime_types(&self.merged, name);
        for (index, type_) in sources {
            let subgraph = &self.subgraphs[*index];
            if type_.is_none() || !subgraph.metadata().is_interface_object(name) {
                continue;
            }
            let defined: Vec<&Name> = supergraph_implementations
                .iter()
                .filter(|implementation| subgraph.schema().types.contains_key(*implementation))
                .collect();
            if defined.is_empty() {
                continue;
            }
            let subgraph_name = &subgraph.name;
            let locations = type_
                .as_ref()
                .map(|type_| self.error_reporter.location(*index, type_))
                .unwrap_or_default();
            self.error_reporter
                .add_error(ErrorCode::InterfaceObjectUsageError.err(
                    format!(
                        "[{subgraph_name}] Interface type \"{name}\" is defined as an @interfaceObject in subgraph \"{subgraph_name}\" so that subgraph should not define any of the implementation types of \"{name}\", but it defines {}",
                        human_readable_types(defined.iter()),
                    ),
                    locations,
                ));
        }
    }
}
