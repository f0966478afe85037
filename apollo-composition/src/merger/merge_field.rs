use std::sync::LazyLock;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::FieldDefinition;
use apollo_compiler::schema::InputValueDefinition;
use regex::Regex;

use crate::bail;
use crate::error::ErrorCode;
use crate::error::FederationError;
use crate::link::federation_spec_definition::FEDERATION_FIELDS_ARGUMENT_NAME;
use crate::link::federation_spec_definition::FEDERATION_FROM_ARGUMENT_NAME;
use crate::link::federation_spec_definition::FEDERATION_OVERRIDE_LABEL_ARGUMENT_NAME;
use crate::link::join_spec_definition::JoinFieldArguments;
use crate::merger::Merger;
use crate::merger::Sources;
use crate::merger::error_reporter::Mismatch;
use crate::merger::hints::HintCode;
use crate::merger::merge_argument::argument_of;
use crate::merger::merge_argument::same_type;
use crate::schema::directive_optional_string_argument;
use crate::schema::field_set::field_definition;
use crate::schema::position::SchemaElementPosition;
use crate::supergraph::CompositionHint;
use crate::utils::human_readable::human_readable_subgraph_names;
use crate::utils::human_readable::human_readable_types;
use crate::utils::suggestion::did_you_mean;
use crate::utils::suggestion::suggestion_list;

static OVERRIDE_LABEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9_\-:./]*$").expect("Invalid regex pattern")
});

/// A percentage between 0 and 100 with up to 8 decimals.
static OVERRIDE_PERCENT_LABEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^percent\((\d{1,2}(\.\d{1,8})?|100)\)$").expect("Invalid regex pattern")
});

/// What validating `@override` on a field found out about each subgraph.
#[derive(Debug, Default)]
pub(super) struct FieldMergeContext {
    used_overridden: IndexSet<usize>,
    unused_overridden: IndexSet<usize>,
    override_with_unknown_target: IndexSet<usize>,
    override_labels: IndexMap<usize, String>,
}

impl FieldMergeContext {
    pub(super) fn is_used_overridden(&self, index: usize) -> bool {
        self.used_overridden.contains(&index)
    }

    pub(super) fn is_unused_overridden(&self, index: usize) -> bool {
        self.unused_overridden.contains(&index)
    }

    fn has_override_with_unknown_target(&self, index: usize) -> bool {
        self.override_with_unknown_target.contains(&index)
    }

    fn override_label(&self, index: usize) -> Option<&str> {
        self.override_labels.get(&index).map(String::as_str)
    }

    fn has_used_overridden_or_label(&self) -> bool {
        !self.used_overridden.is_empty() || !self.override_labels.is_empty()
    }
}

/// The instance of a field in one subgraph, as seen by `@override` validation.
struct OverrideCandidate {
    index: usize,
    is_interface_field: bool,
    is_interface_object: bool,
    /// Fields of `@interfaceObject` types standing in for a field the subgraph lacks.
    interface_object_fields: Vec<Name>,
    override_directive: Option<Node<apollo_compiler::ast::Directive>>,
}

impl Merger {
    /// The fields of a type across the subgraphs defining it, in the order they are first seen.
    pub(super) fn field_sources(
        &self,
        type_sources: &Sources<ExtendedType>,
    ) -> IndexMap<Name, Sources<Component<FieldDefinition>>> {
        let mut field_names: IndexSet<Name> = IndexSet::default();
        for type_ in type_sources.values().flatten() {
            if let Some(fields) = fields_of(type_) {
                field_names.extend(fields.keys().cloned());
            }
        }
        field_names
            .into_iter()
            .map(|field_name| {
                let sources = type_sources
                    .iter()
                    .map(|(index, type_)| {
                        let field = type_
                            .as_ref()
                            .and_then(fields_of)
                            .and_then(|fields| fields.get(&field_name))
                            .cloned();
                        (*index, field)
                    })
                    .collect();
                (field_name, sources)
            })
            .collect()
    }

    /// Adds the field to the supergraph type, with the type of its first definition.
    pub(super) fn add_field_shallow(
        &mut self,
        type_name: &Name,
        sources: &Sources<Component<FieldDefinition>>,
    ) -> Result<(), FederationError> {
        let Some(first) = sources.values().flatten().next() else {
            bail!("No sources for a field of \"{type_name}\"");
        };
        let field = Component::new(FieldDefinition {
            description: None,
            name: first.name.clone(),
            arguments: vec![],
            ty: first.ty.clone(),
            directives: Default::default(),
        });
        match self.merged.types.get_mut(type_name) {
            Some(ExtendedType::Object(object)) => {
                object.make_mut().fields.insert(field.name.clone(), field);
            }
            Some(ExtendedType::Interface(interface)) => {
                interface.make_mut().fields.insert(field.name.clone(), field);
            }
            _ => bail!("Cannot add fields to \"{type_name}\""),
        }
        Ok(())
    }

    /// Merges one object or interface field whose shallow definition is in the supergraph.
    pub(super) fn merge_field(
        &mut self,
        sources: &Sources<Component<FieldDefinition>>,
        position: &SchemaElementPosition,
        context: &FieldMergeContext,
    ) -> Result<(), FederationError> {
        let SchemaElementPosition::Field {
            type_name,
            field_name,
        } = position
        else {
            bail!("\"{position}\" is not a field");
        };
        let defining: Vec<usize> = sources
            .iter()
            .filter(|(_, field)| field.is_some())
            .map(|(index, _)| *index)
            .collect();
        if defining
            .iter()
            .all(|index| self.is_external(*index, type_name, field_name))
        {
            let locations = self.error_reporter.locations(sources);
            self.error_reporter.add_error(ErrorCode::ExternalMissingOnBase.err(
                format!(
                    "Field \"{position}\" is marked @external on all the subgraphs in which it is listed ({}).",
                    self.subgraph_names_of(&defining)
                ),
                locations,
            ));
            return Ok(());
        }

        let without_external = self.validate_and_filter_external(sources, type_name, field_name);
        let arguments = self.add_arguments_shallow(&without_external, position)?;
        self.merge_arguments(&without_external, position, &arguments)?;
        let all_types_equal = self.merge_type_reference(&without_external, position, false)?;
        if self.needs_join_field(sources, type_name, field_name, all_types_equal, context) {
            self.add_join_field(sources, position, all_types_equal, context)?;
        }
        if defining
            .iter()
            .any(|index| self.is_external(*index, type_name, field_name))
        {
            self.validate_external_fields(sources, position)?;
        }
        Ok(())
    }

    /// Replaces external definitions by `None`, erroring on the merged directives applied to
    /// them. External definitions are validated against the merged field afterwards.
    fn validate_and_filter_external(
        &mut self,
        sources: &Sources<Component<FieldDefinition>>,
        type_name: &Name,
        field_name: &Name,
    ) -> Sources<Component<FieldDefinition>> {
        let mut filtered = Sources::default();
        for (index, field) in sources {
            let Some(field) = field else {
                filtered.insert(*index, None);
                continue;
            };
            if !self.is_external(*index, type_name, field_name) {
                filtered.insert(*index, Some(field.clone()));
                continue;
            }
            filtered.insert(*index, None);
            for directive in field.directives.iter() {
                if !self.is_merged_directive_application(*index, &directive.name) {
                    continue;
                }
                let locations = self.error_reporter.location(*index, directive);
                self.error_reporter
                    .add_error(ErrorCode::MergedDirectiveApplicationOnExternal.err(
                        format!(
                            "[{}] Cannot apply merged directive {} to external field \"{type_name}.{field_name}\"",
                            self.names[*index],
                            directive.serialize(),
                        ),
                        locations,
                    ));
            }
        }
        filtered
    }

    /// Whether applications of the directive in the subgraph are copied to the supergraph.
    /// Built-in directives are allowed on external fields.
    fn is_merged_directive_application(&self, index: usize, directive_name: &Name) -> bool {
        self.directive_names_in_supergraph[index]
            .get(directive_name)
            .is_some_and(|in_supergraph| {
                in_supergraph != "deprecated" && in_supergraph != "specifiedBy"
            })
    }

    fn needs_join_field(
        &self,
        sources: &Sources<Component<FieldDefinition>>,
        type_name: &Name,
        field_name: &Name,
        all_types_equal: bool,
        context: &FieldMergeContext,
    ) -> bool {
        if !all_types_equal || context.has_used_overridden_or_label() {
            return true;
        }
        // A join__field can be omitted when every subgraph with the parent type resolves the field
        // without any federation directive on it.
        sources.iter().any(|(index, field)| match field {
            Some(field) if !context.is_unused_overridden(*index) => {
                let names = self.subgraphs[*index].metadata().directive_names();
                self.is_external(*index, type_name, field_name)
                    || field.directives.has(&names.provides)
                    || field.directives.has(&names.requires)
            }
            _ => true,
        })
    }

    fn add_join_field(
        &mut self,
        sources: &Sources<Component<FieldDefinition>>,
        position: &SchemaElementPosition,
        all_types_equal: bool,
        context: &FieldMergeContext,
    ) -> Result<(), FederationError> {
        let SchemaElementPosition::Field {
            type_name,
            field_name,
        } = position
        else {
            bail!("\"{position}\" is not a field");
        };
        let mut applications = vec![];
        for (index, field) in sources {
            let Some(field) = field else {
                continue;
            };
            let override_label = context.override_label(*index);
            if context.is_unused_overridden(*index) && override_label.is_none() {
                continue;
            }
            let names = self.subgraphs[*index].metadata().directive_names();
            let field_set = |directive_name: &Name| -> Result<Option<String>, FederationError> {
                match field.directives.get(directive_name) {
                    Some(directive) => Ok(directive_optional_string_argument(
                        directive,
                        &FEDERATION_FIELDS_ARGUMENT_NAME,
                    )?
                    .map(str::to_string)),
                    None => Ok(None),
                }
            };
            let override_ = match field.directives.get(&names.override_) {
                Some(directive) => {
                    directive_optional_string_argument(directive, &FEDERATION_FROM_ARGUMENT_NAME)?
                        .map(str::to_string)
                }
                None => None,
            };
            applications.push(self.join_spec.field_directive(&JoinFieldArguments {
                graph: Some(self.join_spec_names[*index].clone()),
                requires: field_set(&names.requires)?,
                provides: field_set(&names.provides)?,
                type_: (!all_types_equal).then(|| field.ty.to_string()),
                external: self.is_external(*index, type_name, field_name),
                override_,
                used_overridden: context.is_used_overridden(*index),
                override_label: override_label.map(str::to_string),
            }));
        }
        for application in applications {
            position.insert_directive(&mut self.merged, application)?;
        }
        Ok(())
    }

    /// Checks the external definitions of a field are compatible with its merged definition:
    /// same type, and every merged argument declared with the same type and default.
    fn validate_external_fields(
        &mut self,
        sources: &Sources<Component<FieldDefinition>>,
        position: &SchemaElementPosition,
    ) -> Result<(), FederationError> {
        let SchemaElementPosition::Field {
            type_name,
            field_name,
        } = position
        else {
            bail!("\"{position}\" is not a field");
        };
        let Some(merged) = field_definition(&self.merged, type_name, field_name).cloned() else {
            return Ok(());
        };

        let mut has_invalid_types = false;
        let mut invalid_args_presence: IndexSet<Name> = IndexSet::default();
        let mut invalid_args_types: IndexSet<Name> = IndexSet::default();
        let mut invalid_args_defaults: IndexSet<Name> = IndexSet::default();
        for (index, field) in sources {
            let Some(field) = field else {
                continue;
            };
            if !self.is_external(*index, type_name, field_name) {
                continue;
            }
            // External definitions may use a subtype of the merged type.
            if !(same_or_subtype(self, &merged.ty, &field.ty)?) {
                has_invalid_types = true;
            }
            for merged_argument in &merged.arguments {
                let Some(argument) = field
                    .arguments
                    .iter()
                    .find(|a| a.name == merged_argument.name)
                else {
                    invalid_args_presence.insert(merged_argument.name.clone());
                    continue;
                };
                if !(same_or_subtype(self, &argument.ty, &merged_argument.ty)?) {
                    invalid_args_types.insert(merged_argument.name.clone());
                }
                if argument.default_value != merged_argument.default_value {
                    invalid_args_defaults.insert(merged_argument.name.clone());
                }
            }
        }

        let merged_field = merged.clone();
        if has_invalid_types {
            self.error_reporter.report_mismatch_error(
                ErrorCode::ExternalTypeMismatch,
                &format!(
                    "Type of field \"{position}\" is incompatible across subgraphs (where marked @external): it has "
                ),
                Mismatch::new(Some(&merged_field), sources, |field, _| {
                    Some(format!("type \"{}\"", field.ty))
                }),
            );
        }
        let argument_sources = |argument_name: &Name| -> Sources<Node<InputValueDefinition>> {
            sources
                .iter()
                .map(|(index, field)| {
                    let argument = field
                        .as_ref()
                        .and_then(|field| argument_of(field, argument_name));
                    (*index, argument)
                })
                .collect()
        };
        for argument_name in invalid_args_presence {
            let Some(argument_position) = position.argument(&argument_name) else {
                continue;
            };
            let Some(merged_argument) = argument_of(&merged, &argument_name) else {
                continue;
            };
            let sources = argument_sources(&argument_name);
            let coordinate = argument_position.to_string();
            self.error_reporter.report_mismatch_error_with_specifics(
                ErrorCode::ExternalArgumentMissing,
                &format!(
                    "Field \"{position}\" is missing argument \"{argument_position}\" in some subgraphs where it is marked @external: "
                ),
                Mismatch::new(Some(&merged_argument), &sources, |_, _| {
                    Some(format!("argument \"{coordinate}\""))
                })
                .printers(
                    |elt, subgraphs| format!("{elt} is declared in {}", subgraphs.unwrap_or("")),
                    |_, subgraphs| {
                        format!(" but not in {subgraphs} (where \"{position}\" is @external).")
                    },
                )
                .include_missing_sources(),
            );
        }
        for argument_name in invalid_args_types {
            let Some(merged_argument) = argument_of(&merged, &argument_name) else {
                continue;
            };
            let sources = argument_sources(&argument_name);
            self.error_reporter.report_mismatch_error(
                ErrorCode::ExternalArgumentTypeMismatch,
                &format!(
                    "Type of argument \"{position}({argument_name}:)\" is incompatible across subgraphs (where \"{position}\" is marked @external): it has "
                ),
                Mismatch::new(Some(&merged_argument), &sources, |argument, _| {
                    Some(format!("type \"{}\"", argument.ty))
                }),
            );
        }
        for argument_name in invalid_args_defaults {
            let Some(merged_argument) = argument_of(&merged, &argument_name) else {
                continue;
            };
            let sources = argument_sources(&argument_name);
            self.error_reporter.report_mismatch_error(
                ErrorCode::ExternalArgumentDefaultMismatch,
                &format!(
                    "Argument \"{position}({argument_name}:)\" has incompatible defaults across subgraphs (where \"{position}\" is marked @external): it has "
                ),
                Mismatch::new(Some(&merged_argument), &sources, |argument, _| {
                    Some(match &argument.default_value {
                        Some(value) => format!("default value {value}"),
                        None => "no default value".to_string(),
                    })
                }),
            );
        }
        Ok(())
    }

    /// Validates the `@override` applications on a field and works out which subgraphs are
    /// overridden.
    pub(super) fn validate_override(
        &mut self,
        sources: &Sources<Component<FieldDefinition>>,
        position: &SchemaElementPosition,
    ) -> Result<FieldMergeContext, FederationError> {
        let mut context = FieldMergeContext::default();
        let SchemaElementPosition::Field {
            type_name,
            field_name,
        } = position
        else {
            bail!("\"{position}\" is not a field");
        };

        let mut candidates: IndexMap<String, OverrideCandidate> = IndexMap::default();
        for (index, subgraph) in self.subgraphs.iter().enumerate() {
            let metadata = subgraph.metadata();
            let candidate = match sources.get(&index).and_then(Option::as_ref) {
                Some(field) => OverrideCandidate {
                    index,
                    is_interface_field: matches!(
                        subgraph.schema().types.get(type_name),
                        Some(ExtendedType::Interface(_))
                    ),
                    is_interface_object: metadata.is_interface_object(type_name),
                    interface_object_fields: vec![],
                    override_directive: field
                        .directives
                        .get(&metadata.directive_names().override_)
                        .cloned(),
                },
                None => {
                    let interface_object_fields = self
                        .fields_abstracted_by_interface_objects(index, type_name, field_name);
                    if interface_object_fields.is_empty() {
                        continue;
                    }
                    OverrideCandidate {
                        index,
                        is_interface_field: false,
                        is_interface_object: false,
                        interface_object_fields,
                        override_directive: None,
                    }
                }
            };
            candidates.insert(subgraph.name.clone(), candidate);
        }
        let with_override: Vec<String> = candidates
            .iter()
            .filter(|(_, candidate)| candidate.override_directive.is_some())
            .map(|(name, _)| name.clone())
            .collect();

        for subgraph_name in &with_override {
            let Some(candidate) = candidates.get(subgraph_name) else {
                continue;
            };
            let Some(directive) = &candidate.override_directive else {
                continue;
            };
            let index = candidate.index;
            let locations = self.error_reporter.location(index, directive);
            if candidate.is_interface_field {
                self.error_reporter.add_error(ErrorCode::OverrideOnInterface.err(
                    format!(
                        "@override cannot be used on field \"{position}\" on subgraph \"{subgraph_name}\": @override is not supported on interface type fields."
                    ),
                    locations,
                ));
                continue;
            }
            if candidate.is_interface_object {
                self.error_reporter
                    .add_error(ErrorCode::OverrideCollisionWithAnotherDirective.err(
                        format!(
                            "@override is not yet supported on fields of @interfaceObject types: cannot be used on field \"{position}\" on subgraph \"{subgraph_name}\"."
                        ),
                        locations,
                    ));
                continue;
            }

            let source_name =
                directive_optional_string_argument(directive, &FEDERATION_FROM_ARGUMENT_NAME)?
                    .unwrap_or_default()
                    .to_string();
            let label = directive_optional_string_argument(
                directive,
                &FEDERATION_OVERRIDE_LABEL_ARGUMENT_NAME,
            )?
            .map(str::to_string);

            let Some(from_index) = self.names.iter().position(|name| *name == source_name) else {
                context.override_with_unknown_target.insert(index);
                let suggestions = suggestion_list(&source_name, &self.names);
                self.error_reporter.add_hint(CompositionHint::new(
                    HintCode::FromSubgraphDoesNotExist,
                    format!(
                        "Source subgraph \"{source_name}\" for field \"{position}\" on subgraph \"{subgraph_name}\" does not exist.{}",
                        did_you_mean(suggestions)
                    ),
                    locations,
                ));
                continue;
            };
            if source_name == *subgraph_name {
                self.error_reporter.add_error(ErrorCode::OverrideFromSelfError.err(
                    format!(
                        "Source and destination subgraphs \"{source_name}\" are the same for overridden field \"{position}\""
                    ),
                    locations,
                ));
                continue;
            }
            if with_override.contains(&source_name) {
                self.error_reporter.add_error(ErrorCode::OverrideSourceHasOverride.err(
                    format!(
                        "Field \"{position}\" on subgraph \"{subgraph_name}\" is also marked with directive @override in subgraph \"{source_name}\". Only one @override directive is allowed per field."
                    ),
                    locations,
                ));
                continue;
            }
            let Some(source_candidate) = candidates.get(&source_name) else {
                self.error_reporter.add_hint(CompositionHint::new(
                    HintCode::OverrideDirectiveCanBeRemoved,
                    format!(
                        "Field \"{position}\" on subgraph \"{subgraph_name}\" no longer exists in the from subgraph. The @override directive can be removed."
                    ),
                    locations,
                ));
                continue;
            };
            if !source_candidate.interface_object_fields.is_empty() {
                let abstracting_types =
                    human_readable_types(source_candidate.interface_object_fields.iter());
                self.error_reporter.add_error(ErrorCode::InterfaceObjectUsageError.err(
                    format!(
                        "Invalid @override on field \"{position}\" of subgraph \"{subgraph_name}\": source subgraph \"{source_name}\" does not have field \"{position}\" but abstract it in {abstracting_types} and overriding abstracted fields is not supported."
                    ),
                    locations,
                ));
                continue;
            }

            if let Some((conflicting, in_subgraph)) =
                self.override_conflict(index, from_index, sources, type_name, field_name)
            {
                self.error_reporter
                    .add_error(ErrorCode::OverrideCollisionWithAnotherDirective.err(
                        format!(
                            "@override cannot be used on field \"{position}\" on subgraph \"{subgraph_name}\" since \"{position}\" on \"{in_subgraph}\" is marked with directive \"@{conflicting}\""
                        ),
                        locations,
                    ));
                continue;
            }

            let from_metadata = self.subgraphs[from_index].metadata();
            if self.is_external(from_index, type_name, field_name) {
                self.error_reporter.add_hint(CompositionHint::new(
                    HintCode::OverrideDirectiveCanBeRemoved,
                    format!(
                        "Field \"{position}\" on subgraph \"{subgraph_name}\" is not resolved anymore by the from subgraph (it is marked \"@external\" in \"{source_name}\"). The @override directive can be removed."
                    ),
                    locations.clone(),
                ));
            } else if from_metadata.is_field_used(type_name, field_name) {
                context.used_overridden.insert(from_index);
                self.error_reporter.add_hint(CompositionHint::new(
                    HintCode::OverriddenFieldCanBeRemoved,
                    format!(
                        "Field \"{position}\" on subgraph \"{source_name}\" is overridden. It is still used in some federation directive(s) (@key, @requires, and/or @provides) and/or to satisfy interface constraint(s), but consider marking it @external explicitly or removing it along with its references."
                    ),
                    locations.clone(),
                ));
            } else {
                context.unused_overridden.insert(from_index);
                self.error_reporter.add_hint(CompositionHint::new(
                    HintCode::OverriddenFieldCanBeRemoved,
                    format!(
                        "Field \"{position}\" on subgraph \"{source_name}\" is overridden. Consider removing it."
                    ),
                    locations.clone(),
                ));
            }

            let Some(label) = label else {
                continue;
            };
            if OVERRIDE_LABEL_REGEX.is_match(&label)
                || OVERRIDE_PERCENT_LABEL_REGEX.is_match(&label)
            {
                context.override_labels.insert(index, label.clone());
                context.override_labels.insert(from_index, label.clone());
            } else {
                self.error_reporter.add_error(ErrorCode::OverrideLabelInvalid.err(
                    format!(
                        "Invalid @override label \"{label}\" on field \"{position}\" on subgraph \"{subgraph_name}\": labels must start with a letter and after that may contain alphanumerics, underscores, minuses, colons, periods, or slashes. Alternatively, labels may be of the form \"percent(x)\" where x is a float between 0-100 inclusive."
                    ),
                    locations.clone(),
                ));
            }
            let message = if context.is_used_overridden(from_index) {
                format!(
                    "Field \"{position}\" on subgraph \"{source_name}\" is currently being migrated via progressive @override. It is still used in some federation directive(s) (@key, @requires, and/or @provides) and/or to satisfy interface constraint(s). Once the migration is complete, consider marking it @external explicitly or removing it along with its references."
                )
            } else {
                format!(
                    "Field \"{position}\" is currently being migrated with progressive @override. Once the migration is complete, remove the field from subgraph \"{source_name}\"."
                )
            };
            self.error_reporter.add_hint(CompositionHint::new(
                HintCode::OverrideMigrationInProgress,
                message,
                locations,
            ));
        }
        Ok(context)
    }

    /// The directive that prevents overriding a field: `@requires` or `@provides` on the
    /// overridden field, or `@external` on the overriding one. Returns the directive name and the
    /// subgraph it is applied in.
    fn override_conflict(
        &self,
        index: usize,
        from_index: usize,
        sources: &Sources<Component<FieldDefinition>>,
        type_name: &Name,
        field_name: &Name,
    ) -> Option<(Name, String)> {
        let from_names = self.subgraphs[from_index].metadata().directive_names();
        if let Some(from_field) = sources.get(&from_index).and_then(Option::as_ref) {
            for directive_name in [&from_names.requires, &from_names.provides] {
                if from_field.directives.has(directive_name) {
                    return Some((directive_name.clone(), self.names[from_index].clone()));
                }
            }
        }
        if self.is_external(index, type_name, field_name) {
            let names = self.subgraphs[index].metadata().directive_names();
            return Some((names.external.clone(), self.names[index].clone()));
        }
        None
    }

    /// The `@interfaceObject` types of a subgraph that stand in for the field of an object type
    /// the subgraph does not define.
    pub(super) fn fields_abstracted_by_interface_objects(
        &self,
        index: usize,
        type_name: &Name,
        field_name: &Name,
    ) -> Vec<Name> {
        let subgraph = &self.subgraphs[index];
        if subgraph.schema().types.contains_key(type_name) {
            return vec![];
        }
        let Some(ExtendedType::Object(object)) = self.merged.types.get(type_name) else {
            return vec![];
        };
        object
            .implements_interfaces
            .iter()
            .filter(|itf| {
                subgraph.metadata().is_interface_object(&itf.name)
                    && field_definition(subgraph.schema(), &itf.name, field_name).is_some()
            })
            .map(|itf| itf.name.clone())
            .collect()
    }

    /// Errors when more than one subgraph resolves a field and one of them does not mark it
    /// `@shareable`.
    pub(super) fn validate_field_sharing(
        &mut self,
        sources: &Sources<Component<FieldDefinition>>,
        position: &SchemaElementPosition,
        context: &FieldMergeContext,
    ) {
        let SchemaElementPosition::Field {
            type_name,
            field_name,
        } = position
        else {
            return;
        };
        let mut shareable: Vec<(usize, String)> = vec![];
        let mut non_shareable: Vec<(usize, String)> = vec![];
        let mut resolving: Vec<String> = vec![];
        let mut locations = vec![];
        let mut categorize = |index: usize, parent: &Name, subgraph_name: String| {
            let metadata = self.subgraphs[index].metadata();
            if metadata.is_fully_external(parent, field_name) {
                return;
            }
            resolving.push(subgraph_name.clone());
            if let Some(field) = field_definition(self.subgraphs[index].schema(), parent, field_name)
            {
                locations.extend(self.error_reporter.location(index, field));
            }
            if metadata.is_shareable(parent, field_name) {
                shareable.push((index, subgraph_name));
            } else {
                non_shareable.push((index, subgraph_name));
            }
        };
        for index in 0..self.subgraphs.len() {
            let has_field = sources.get(&index).is_some_and(Option::is_some);
            let overridden = context.is_unused_overridden(index)
                && !context.has_override_with_unknown_target(index);
            if !has_field || overridden {
                for itf in self.fields_abstracted_by_interface_objects(index, type_name, field_name)
                {
                    let subgraph_name = format!(
                        "{} (through @interfaceObject field \"{itf}.{field_name}\")",
                        self.names[index]
                    );
                    categorize(index, &itf, subgraph_name);
                }
                continue;
            }
            categorize(index, type_name, self.names[index].clone());
        }

        if non_shareable.is_empty() || (shareable.is_empty() && non_shareable.len() == 1) {
            return;
        }
        let non_shareables = if shareable.is_empty() {
            "all of them".to_string()
        } else {
            human_readable_subgraph_names(
                non_shareable.iter().map(|(_, name)| name),
            )
        };
        let extra_hint = non_shareable
            .iter()
            .find(|(index, _)| context.has_override_with_unknown_target(*index))
            .map(|(_, name)| {
                format!(
                    " (please note that \"{position}\" has an @override directive in \"{name}\" that targets an unknown subgraph so this could be due to misspelling the @override(from:) argument)"
                )
            })
            .unwrap_or_default();
        self.error_reporter.add_error(ErrorCode::InvalidFieldSharing.err(
            format!(
                "Non-shareable field \"{position}\" is resolved from multiple subgraphs: it is resolved from {} and defined as non-shareable in {non_shareables}{extra_hint}",
                human_readable_subgraph_names(resolving.iter()),
            ),
            locations,
        ));
    }

    /// Fields of the subscription root cannot be shared: a subscription is served by a single
    /// subgraph.
    pub(super) fn validate_subscription_field(
        &mut self,
        sources: &Sources<Component<FieldDefinition>>,
        type_name: &Name,
        field_name: &Name,
    ) {
        for (index, field) in sources {
            let Some(field) = field else {
                continue;
            };
            if self.subgraphs[*index]
                .metadata()
                .is_shareable(type_name, field_name)
            {
                let locations = self.error_reporter.location(*index, field);
                self.error_reporter.add_error(ErrorCode::InvalidFieldSharing.err(
                    format!(
                        "Fields on root level subscription object cannot be marked as shareable: field \"{type_name}.{field_name}\" is shareable in subgraph \"{}\"",
                        self.names[*index]
                    ),
                    locations,
                ));
            }
        }
    }

    /// Merges the fields of an input object type. Only the fields defined in every subgraph
    /// defining the type are kept, unless they are `@inaccessible`.
    pub(super) fn merge_input_fields(
        &mut self,
        type_name: &Name,
        type_sources: &Sources<ExtendedType>,
    ) -> Result<(), FederationError> {
        let mut field_names: IndexSet<Name> = IndexSet::default();
        for type_ in type_sources.values().flatten() {
            if let ExtendedType::InputObject(input) = type_ {
                field_names.extend(input.fields.keys().cloned());
            }
        }

        let mut kept = 0;
        for field_name in field_names {
            let position = SchemaElementPosition::field(type_name, &field_name);
            let sources: Sources<Node<InputValueDefinition>> = type_sources
                .iter()
                .map(|(index, type_)| {
                    let field = match type_ {
                        Some(ExtendedType::InputObject(input)) => {
                            input.fields.get(&field_name).map(|f| f.node.clone())
                        }
                        _ => None,
                    };
                    (*index, field)
                })
                .collect();
            let is_inaccessible = sources.iter().any(|(index, field)| {
                field.as_ref().is_some_and(|field| {
                    self.inaccessible_name_in(*index)
                        .is_some_and(|name| field.directives.has(name))
                })
            });
            let missing_in: Vec<usize> = sources
                .iter()
                .filter(|(_, field)| field.is_none())
                .map(|(index, _)| *index)
                .collect();
            if !is_inaccessible && !missing_in.is_empty() {
                let required_in: Vec<usize> = sources
                    .iter()
                    .filter(|(_, field)| field.as_ref().is_some_and(|f| f.is_required()))
                    .map(|(index, _)| *index)
                    .collect();
                if !required_in.is_empty() {
                    let locations = self.error_reporter.locations(&sources);
                    self.error_reporter.add_error(
                        ErrorCode::RequiredInputFieldMissingInSomeSubgraph.err(
                            format!(
                                "Input object field \"{position}\" is required in some subgraphs but does not appear in all subgraphs: it is required in {} but does not appear in {}",
                                self.subgraph_names_of(&required_in),
                                self.subgraph_names_of(&missing_in),
                            ),
                            locations,
                        ),
                    );
                } else {
                    let supergraph_element = sources.values().flatten().next().cloned();
                    self.error_reporter.report_mismatch_hint(
                        HintCode::InconsistentInputObjectField,
                        &format!(
                            "Input object field \"{field_name}\" will not be added to \"{type_name}\" in the supergraph as it does not appear in all subgraphs: "
                        ),
                        Mismatch::new(supergraph_element.as_ref(), &sources, |_, _| {
                            Some("yes".to_string())
                        })
                        .printers(
                            |_, subgraphs| format!("it is defined in {}", subgraphs.unwrap_or("")),
                            |_, subgraphs| format!(" but not in {subgraphs}"),
                        )
                        .include_missing_sources(),
                    );
                }
                continue;
            }

            let Some(first) = sources.values().flatten().next() else {
                continue;
            };
            let mut field = (**first).clone();
            field.description = None;
            field.default_value = None;
            field.directives = Default::default();
            let Some(ExtendedType::InputObject(input)) = self.merged.types.get_mut(type_name)
            else {
                bail!("Cannot add fields to \"{type_name}\"");
            };
            input
                .make_mut()
                .fields
                .insert(field_name.clone(), Component::new(field));
            kept += 1;

            let all_types_equal = self.merge_type_reference(&sources, &position, true)?;
            self.merge_default_value(&sources, &position, "Input field")?;
            if !all_types_equal || !missing_in.is_empty() {
                for (index, field) in &sources {
                    let Some(field) = field else {
                        continue;
                    };
                    let application = self.join_spec.field_directive(&JoinFieldArguments {
                        graph: Some(self.join_spec_names[*index].clone()),
                        type_: (!all_types_equal).then(|| field.ty.to_string()),
                        ..Default::default()
                    });
                    position.insert_directive(&mut self.merged, application)?;
                }
            }
        }

        if kept == 0 {
            let locations = self.error_reporter.locations(type_sources);
            self.error_reporter.add_error(ErrorCode::EmptyMergedInputType.err(
                format!(
                    "None of the fields of input object type \"{type_name}\" are consistently defined in all the subgraphs defining that type. As only fields common to all subgraphs are merged, the input object type intersection is empty."
                ),
                locations,
            ));
        }
        Ok(())
    }
}

pub(super) fn fields_of(
    type_: &ExtendedType,
) -> Option<&IndexMap<Name, Component<FieldDefinition>>> {
    match type_ {
        ExtendedType::Object(object) => Some(&object.fields),
        ExtendedType::Interface(interface) => Some(&interface.fields),
        _ => None,
    }
}

/// Whether `sub` is `super_` or one of its strict subtypes in the supergraph.
fn same_or_subtype(
    merger: &Merger,
    super_: &apollo_compiler::ast::Type,
    sub: &apollo_compiler::ast::Type,
) -> Result<bool, FederationError> {
    Ok(same_type(super_, sub)
        || merger.is_strict_subtype(super_, sub)?)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("foo", true)]
    #[case("foo:bar/baz.qux-1_2", true)]
    #[case("1foo", false)]
    #[case("foo bar", false)]
    fn validates_override_labels(#[case] label: &str, #[case] valid: bool) {
        assert_eq!(OVERRIDE_LABEL_REGEX.is_match(label), valid);
    }

    #[rstest]
    #[case("percent(0)", true)]
    #[case("percent(5.5)", true)]
    #[case("percent(100)", true)]
    #[case("percent(12.123456789)", false)]
    #[case("percent(101)", false)]
    fn validates_percent_override_labels(#[case] label: &str, #[case] valid: bool) {
        assert_eq!(OVERRIDE_PERCENT_LABEL_REGEX.is_match(label), valid);
    }
}
