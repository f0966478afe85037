use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast::Argument;
use apollo_compiler::ast::Directive;
use apollo_compiler::ast::DirectiveLocation;
use apollo_compiler::ast::Value;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::schema::DirectiveDefinition;
use apollo_compiler::schema::ExtendedType;
use tracing::trace;

use crate::bail;
use crate::error::ErrorCode;
use crate::error::FederationError;
use crate::merger::Merger;
use crate::merger::Sources;
use crate::merger::error_reporter::Mismatch;
use crate::merger::hints::HintCode;
use crate::schema::argument_composition_strategies::ArgumentCompositionStrategy;
use crate::schema::position::SchemaElement;
use crate::schema::position::SchemaElementPosition;
use crate::supergraph::CompositionHint;
use crate::utils::human_readable::human_readable_subgraph_names;

/// Directives every GraphQL schema defines.
const BUILT_IN_DIRECTIVES: [&str; 5] = ["skip", "include", "deprecated", "specifiedBy", "oneOf"];

/// The applications of a directive sharing the same arguments, along with the graphs applying
/// them. Each group becomes one `@join__directive`.
struct JoinDirectiveGroup {
    graphs: Vec<Name>,
    directive: Directive,
}

impl Merger {
    /// Adds the definitions of composed directives and of executable directives defined in every
    /// subgraph.
    pub(super) fn merge_directive_definitions(&mut self) -> Result<(), FederationError> {
        let mut composed: IndexSet<Name> = IndexSet::default();
        let mut executable: IndexSet<Name> = IndexSet::default();
        for (index, subgraph) in self.subgraphs.iter().enumerate() {
            let links = subgraph.metadata().links();
            for (name, definition) in &subgraph.schema().directive_definitions {
                if self
                    .compose_directive_manager
                    .should_compose_directive(index, name)
                {
                    composed.insert(name.clone());
                    continue;
                }
                if BUILT_IN_DIRECTIVES.contains(&name.as_str())
                    || links.source_link_of_directive(name).is_some()
                    || !definition.locations.iter().any(is_executable_location)
                {
                    continue;
                }
                executable.insert(name.clone());
            }
        }

        for name in composed {
            let Some(definition) = self
                .compose_directive_manager
                .get_latest_directive_definition(&name)
            else {
                continue;
            };
            self.merged
                .directive_definitions
                .entry(name)
                .or_insert_with(|| definition.clone());
        }
        for name in executable {
            if self.merged.directive_definitions.contains_key(&name) {
                continue;
            }
            self.merge_executable_directive_definition(&name)?;
        }
        Ok(())
    }

    /// Keeps an executable directive only when all subgraphs define it, with the locations all
    /// subgraphs agree on. It is repeatable only if repeatable everywhere.
    fn merge_executable_directive_definition(
        &mut self,
        name: &Name,
    ) -> Result<(), FederationError> {
        let sources: Sources<Node<DirectiveDefinition>> = self
            .subgraphs
            .iter()
            .enumerate()
            .map(|(index, subgraph)| {
                (
                    index,
                    subgraph.schema().directive_definitions.get(name).cloned(),
                )
            })
            .collect();
        let Some(first) = sources.values().flatten().next().cloned() else {
            return Ok(());
        };

        if sources.values().any(Option::is_none) {
            self.error_reporter.report_mismatch_hint(
                HintCode::InconsistentExecutableDirectivePresence,
                &format!(
                    "Executable directive \"@{name}\" will not be part of the supergraph as it does not appear in all subgraphs: "
                ),
                Mismatch::new(Some(&first), &sources, |_, _| Some("yes".to_string()))
                    .printers(
                        |_, subgraphs| format!("it is defined in {}", subgraphs.unwrap_or("")),
                        |_, subgraphs| format!(" but not in {subgraphs}"),
                    )
                    .include_missing_sources(),
            );
            return Ok(());
        }

        let mut locations = executable_locations(&first);
        for definition in sources.values().flatten() {
            let in_definition = executable_locations(definition);
            locations.retain(|location| in_definition.contains(location));
        }
        if locations.is_empty() {
            let source_locations = self.error_reporter.locations(&sources);
            self.error_reporter.add_hint(CompositionHint::new(
                HintCode::NoExecutableDirectiveLocationsIntersection,
                format!(
                    "Executable directive \"@{name}\" has no location that is common to all subgraphs: it will not be part of the supergraph."
                ),
                source_locations,
            ));
            return Ok(());
        }

        let repeatable = sources
            .values()
            .flatten()
            .all(|definition| definition.repeatable);
        let merged = Node::new(DirectiveDefinition {
            description: None,
            name: name.clone(),
            arguments: vec![],
            repeatable,
            locations: locations.clone(),
        });
        self.merged
            .directive_definitions
            .insert(name.clone(), merged.clone());

        if !repeatable {
            self.error_reporter.report_mismatch_hint(
                HintCode::InconsistentExecutableDirectiveRepeatable,
                &format!(
                    "Executable directive \"@{name}\" will not be marked repeatable in the supergraph as it is inconsistently marked repeatable in subgraphs: "
                ),
                Mismatch::new(Some(&merged), &sources, |definition, _| {
                    Some(definition.repeatable.to_string())
                })
                .printers(
                    |_, subgraphs| format!("it is not repeatable in {}", subgraphs.unwrap_or("")),
                    |_, subgraphs| format!(" but is repeatable in {subgraphs}"),
                ),
            );
        }

        let mut by_locations: IndexMap<String, Vec<&str>> = IndexMap::default();
        for (index, definition) in &sources {
            let Some(definition) = definition else {
                continue;
            };
            by_locations
                .entry(locations_string(&executable_locations(definition)))
                .or_default()
                .push(self.names[*index].as_str());
        }
        if by_locations.len() > 1 {
            let described: Vec<String> = by_locations
                .iter()
                .map(|(locations, subgraphs)| {
                    format!(
                        "\"{locations}\" in {}",
                        human_readable_subgraph_names(subgraphs.iter())
                    )
                })
                .collect();
            let source_locations = self.error_reporter.locations(&sources);
            self.error_reporter.add_hint(CompositionHint::new(
                HintCode::InconsistentExecutableDirectiveLocations,
                format!(
                    "Executable directive \"@{name}\" has inconsistent locations across subgraphs and will use \"{}\" (intersection of all subgraphs) in the supergraph, but has: {}.",
                    locations_string(&locations),
                    described.join(" and "),
                ),
                source_locations,
            ));
        }

        let position = SchemaElementPosition::Directive(name.clone());
        let arguments = self.add_arguments_shallow(&sources, &position)?;
        self.merge_arguments(&sources, &position, &arguments)?;
        self.merged_executable_directives.insert(name.clone());
        trace!(directive = %name, repeatable, "merged executable directive definition");
        Ok(())
    }

    /// Merges the description and the applied directives of every element of the supergraph.
    ///
    /// This runs once all elements exist, so that elements removed while merging (enum values,
    /// input fields) are skipped.
    pub(super) fn merge_descriptions_and_applied_directives(
        &mut self,
    ) -> Result<(), FederationError> {
        for position in self.merged_positions() {
            let sources = self.element_sources(&position);
            self.merge_description(&sources, &position)?;
            if !matches!(
                position,
                SchemaElementPosition::Directive(_)
                    | SchemaElementPosition::DirectiveArgument { .. }
            ) {
                self.merge_applied_directives(&sources, &position)?;
            }
        }
        Ok(())
    }

    fn merged_positions(&self) -> Vec<SchemaElementPosition> {
        let mut positions = vec![SchemaElementPosition::Schema];
        for (type_name, type_) in &self.merged.types {
            if !self.merged_type_names.contains(type_name) {
                continue;
            }
            positions.push(SchemaElementPosition::Type(type_name.clone()));
            match type_ {
                ExtendedType::Object(_) | ExtendedType::Interface(_) => {
                    let fields = match type_ {
                        ExtendedType::Object(object) => &object.fields,
                        ExtendedType::Interface(interface) => &interface.fields,
                        _ => continue,
                    };
                    for (field_name, field) in fields {
                        let field_position = SchemaElementPosition::field(type_name, field_name);
                        positions.push(field_position.clone());
                        for argument in &field.arguments {
                            positions.extend(field_position.argument(&argument.name));
                        }
                    }
                }
                ExtendedType::InputObject(input) => {
                    positions.extend(
                        input
                            .fields
                            .keys()
                            .map(|field_name| SchemaElementPosition::field(type_name, field_name)),
                    );
                }
                ExtendedType::Enum(enum_) => {
                    positions.extend(enum_.values.keys().map(|value| {
                        SchemaElementPosition::EnumValue {
                            type_name: type_name.clone(),
                            value: value.clone(),
                        }
                    }));
                }
                ExtendedType::Scalar(_) | ExtendedType::Union(_) => {}
            }
        }
        for name in &self.merged_executable_directives {
            let position = SchemaElementPosition::Directive(name.clone());
            positions.push(position.clone());
            if let Some(definition) = self.merged.directive_definitions.get(name) {
                for argument in &definition.arguments {
                    positions.extend(position.argument(&argument.name));
                }
            }
        }
        positions
    }

    /// The element at `position` in each subgraph defining its parent. External fields and their
    /// arguments are left out, as they do not contribute to the supergraph element.
    fn element_sources(&self, position: &SchemaElementPosition) -> Sources<SchemaElement> {
        self.subgraphs
            .iter()
            .enumerate()
            .filter_map(|(index, subgraph)| {
                if let Some(type_name) = position.type_name()
                    && !subgraph.schema().types.contains_key(type_name)
                {
                    return None;
                }
                let is_external = match position {
                    SchemaElementPosition::Field {
                        type_name,
                        field_name,
                    }
                    | SchemaElementPosition::FieldArgument {
                        type_name,
                        field_name,
                        ..
                    } => self.is_external(index, type_name, field_name),
                    _ => false,
                };
                let element = position
                    .lookup(subgraph.schema())
                    .filter(|_| !is_external);
                Some((index, element))
            })
            .collect()
    }

    /// Uses the description most subgraphs agree on, ignoring empty ones. Ties go to the first
    /// subgraph.
    pub(super) fn merge_description(
        &mut self,
        sources: &Sources<SchemaElement>,
        position: &SchemaElementPosition,
    ) -> Result<(), FederationError> {
        let mut descriptions: IndexMap<String, usize> = IndexMap::default();
        for element in sources.values().flatten() {
            if let Some(description) = element.description() {
                *descriptions
                    .entry(description.trim().to_string())
                    .or_default() += 1;
            }
        }
        // we don't want to raise a hint if a description is ""
        descriptions.shift_remove("");

        let mut chosen: Option<(&String, usize)> = None;
        for (description, count) in &descriptions {
            if chosen.is_none_or(|(_, best)| *count > best) {
                chosen = Some((description, *count));
            }
        }
        let Some((description, _)) = chosen else {
            return Ok(());
        };
        position.set_description(&mut self.merged, Some(Node::new_str(description)))?;
        if descriptions.len() < 2 {
            return Ok(());
        }

        let Some(supergraph_element) = position.lookup(&self.merged) else {
            return Ok(());
        };
        let element = match position {
            SchemaElementPosition::Schema => "The schema definition".to_string(),
            _ => format!("Element \"{position}\""),
        };
        self.error_reporter.report_mismatch_hint(
            HintCode::InconsistentDescription,
            &format!("{element} has inconsistent descriptions across the subgraphs. "),
            Mismatch::new(Some(&supergraph_element), sources, |element, _| {
                element
                    .description()
                    .map(|description| description.trim().to_string())
            })
            .printers(
                |description, subgraphs| {
                    format!(
                        "The supergraph will use description (from {}):\n{}",
                        subgraphs.unwrap_or("undefined"),
                        description_string(description, "  ")
                    )
                },
                |description, subgraphs| {
                    format!(
                        "\nIn {subgraphs}, the description is:\n{}",
                        description_string(description, "  ")
                    )
                },
            )
            .ignore(|element| element.description().is_none())
            .no_end_of_message_dot(),
        );
        Ok(())
    }

    /// Copies to the supergraph element the applications of the directives reaching the
    /// supergraph, under their supergraph name.
    fn merge_applied_directives(
        &mut self,
        sources: &Sources<SchemaElement>,
        position: &SchemaElementPosition,
    ) -> Result<(), FederationError> {
        let mut by_name: IndexMap<Name, Vec<(usize, Node<Directive>)>> = IndexMap::default();
        for (index, element) in sources {
            let Some(element) = element else {
                continue;
            };
            let names = &self.directive_names_in_supergraph[*index];
            for mut application in element.directives() {
                let Some(name_in_supergraph) = names.get(&application.name) else {
                    continue;
                };
                if application.name != *name_in_supergraph {
                    application.make_mut().name = name_in_supergraph.clone();
                }
                by_name
                    .entry(name_in_supergraph.clone())
                    .or_default()
                    .push((*index, application));
            }
        }

        for (name, applications) in by_name {
            if self
                .merged_federation_directives
                .get(&name)
                .is_some_and(|info| info.as_join_directive)
            {
                self.add_join_directive_directives(position, &applications)?;
                continue;
            }
            let Some(definition) = self.merged.directive_definitions.get(&name).cloned() else {
                bail!("Directive \"@{name}\" is applied in subgraphs but not defined in the supergraph");
            };
            if definition.repeatable {
                let mut distinct: Vec<(String, Node<Directive>)> = vec![];
                for (_, application) in applications {
                    let arguments = arguments_string(&application, &definition);
                    if distinct.iter().all(|(seen, _)| *seen != arguments) {
                        distinct.push((arguments, application));
                    }
                }
                for (_, application) in distinct {
                    position.insert_directive(&mut self.merged, (*application).clone())?;
                }
            } else {
                self.merge_non_repeatable_directive(position, &definition, &applications)?;
            }
        }
        Ok(())
    }

    /// Merges the applications of a non-repeatable directive into one. Arguments with a
    /// composition strategy are merged with it; without any strategy, the most used arguments
    /// win.
    fn merge_non_repeatable_directive(
        &mut self,
        position: &SchemaElementPosition,
        definition: &Node<DirectiveDefinition>,
        applications: &[(usize, Node<Directive>)],
    ) -> Result<(), FederationError> {
        let name = &definition.name;
        let Some((_, first)) = applications.first() else {
            return Ok(());
        };
        let argument_strings: Vec<String> = applications
            .iter()
            .map(|(_, application)| arguments_string(application, definition))
            .collect();
        if argument_strings.iter().all(|s| *s == argument_strings[0]) {
            return position.insert_directive(&mut self.merged, (**first).clone());
        }

        let strategies: Vec<(Name, ArgumentCompositionStrategy)> = self
            .merged_federation_directives
            .get(name)
            .map(|info| {
                info.specification
                    .arguments
                    .iter()
                    .filter_map(|argument| {
                        Some((argument.name.clone(), argument.composition_strategy?))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let locations: Vec<_> = applications
            .iter()
            .flat_map(|(index, application)| self.error_reporter.location(*index, application))
            .collect();
        if !strategies.is_empty() {
            for (argument_name, strategy) in &strategies {
                let Some(argument) = definition
                    .arguments
                    .iter()
                    .find(|argument| argument.name == *argument_name)
                else {
                    continue;
                };
                if let Err(supported) = strategy.is_type_supported(&argument.ty) {
                    self.error_reporter.add_error(ErrorCode::DirectiveCompositionError.err(
                        format!(
                            "Invalid composition strategy {strategy} for argument @{name}({argument_name}:) of type {}; {strategy} only supports {supported}",
                            argument.ty
                        ),
                        vec![],
                    ));
                    return Ok(());
                }
            }

            let mut merged = Directive {
                name: name.clone(),
                arguments: vec![],
            };
            for argument in &definition.arguments {
                let values: Vec<Value> = applications
                    .iter()
                    .filter_map(|(_, application)| {
                        application.specified_argument_by_name(&argument.name)
                    })
                    .map(|value| (**value).clone())
                    .collect();
                let Some(first_value) = values.first() else {
                    continue;
                };
                let strategy = strategies
                    .iter()
                    .find(|(argument_name, _)| *argument_name == argument.name)
                    .map(|(_, strategy)| strategy);
                let value = match strategy {
                    Some(strategy) => strategy.merge_values(&values)?,
                    None => first_value.clone(),
                };
                merged.arguments.push(Node::new(Argument {
                    name: argument.name.clone(),
                    value: Node::new(value),
                }));
            }
            position.insert_directive(&mut self.merged, merged)?;

            let used: Vec<String> = strategies
                .iter()
                .map(|(argument_name, strategy)| format!("\"{argument_name}\": {strategy}"))
                .collect();
            self.error_reporter.add_hint(CompositionHint::new(
                HintCode::MergedNonRepeatableDirectiveArguments,
                format!(
                    "Directive @{name} is applied to \"{position}\" in multiple subgraphs with different arguments. Merging strategies used by arguments: {{ {} }}",
                    used.join(", ")
                ),
                locations,
            ));
            return Ok(());
        }

        let mut counts: IndexMap<&str, usize> = IndexMap::default();
        for arguments in &argument_strings {
            *counts.entry(arguments.as_str()).or_default() += 1;
        }
        let mut most_used: Option<(&str, usize)> = None;
        for (arguments, count) in &counts {
            if most_used.is_none_or(|(_, best)| *count > best) {
                most_used = Some((*arguments, *count));
            }
        }
        let Some(chosen) = most_used
            .and_then(|(arguments, _)| argument_strings.iter().position(|s| s == arguments))
            .and_then(|i| applications.get(i))
            .map(|(_, application)| application.clone())
        else {
            return Ok(());
        };
        position.insert_directive(&mut self.merged, (*chosen).clone())?;

        let sources: Sources<Node<Directive>> = applications
            .iter()
            .map(|(index, application)| (*index, Some(application.clone())))
            .collect();
        self.error_reporter.report_mismatch_hint(
            HintCode::InconsistentNonRepeatableDirectiveArguments,
            &format!(
                "Non-repeatable directive @{name} is applied to \"{position}\" in multiple subgraphs but with incompatible arguments. "
            ),
            Mismatch::new(Some(&chosen), &sources, |application, _| {
                Some(arguments_string(application, definition))
            })
            .printers(
                |arguments, subgraphs| {
                    format!(
                        "The supergraph will use {} (from {}), but found ",
                        describe_arguments(arguments),
                        subgraphs.unwrap_or("")
                    )
                },
                |arguments, subgraphs| {
                    format!("{} in {subgraphs}", describe_arguments(arguments))
                },
            ),
        );
        Ok(())
    }

    /// Records the applications of a directive of a feature that is not merged as
    /// `@join__directive`, one per set of arguments with the graphs applying it.
    fn add_join_directive_directives(
        &mut self,
        position: &SchemaElementPosition,
        applications: &[(usize, Node<Directive>)],
    ) -> Result<(), FederationError> {
        if !self.join_spec.supports_join_directive() {
            return Ok(());
        }
        let mut groups: IndexMap<String, JoinDirectiveGroup> = IndexMap::default();
        for (index, application) in applications {
            let mut arguments: Vec<String> = application
                .arguments
                .iter()
                .map(|argument| format!("{}: {}", argument.name, argument.value))
                .collect();
            arguments.sort();
            groups
                .entry(arguments.join(", "))
                .or_insert_with(|| JoinDirectiveGroup {
                    graphs: vec![],
                    directive: (**application).clone(),
                })
                .graphs
                .push(self.join_spec_names[*index].clone());
        }
        for group in groups.into_values() {
            let directive = self
                .join_spec
                .directive_directive(&group.graphs, &group.directive);
            position.insert_directive(&mut self.merged, directive)?;
        }
        Ok(())
    }
}

fn is_executable_location(location: &DirectiveLocation) -> bool {
    matches!(
        location,
        DirectiveLocation::Query
            | DirectiveLocation::Mutation
            | DirectiveLocation::Subscription
            | DirectiveLocation::Field
            | DirectiveLocation::FragmentDefinition
            | DirectiveLocation::FragmentSpread
            | DirectiveLocation::InlineFragment
            | DirectiveLocation::VariableDefinition
    )
}

fn executable_locations(definition: &DirectiveDefinition) -> Vec<DirectiveLocation> {
    definition
        .locations
        .iter()
        .filter(|location| is_executable_location(location))
        .cloned()
        .collect()
}

fn locations_string(locations: &[DirectiveLocation]) -> String {
    locations
        .iter()
        .map(|location| location.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The arguments of an application, defaults included, as `{name: value, ...}`. Empty when the
/// directive takes no argument.
fn arguments_string(application: &Directive, definition: &DirectiveDefinition) -> String {
    let arguments: Vec<String> = definition
        .arguments
        .iter()
        .filter_map(|argument| {
            let value = application
                .specified_argument_by_name(&argument.name)
                .or(argument.default_value.as_ref())?;
            Some(format!("{}: {value}", argument.name))
        })
        .collect();
    if arguments.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", arguments.join(", "))
    }
}

fn describe_arguments(arguments: &str) -> String {
    if arguments.is_empty() {
        "no arguments".to_string()
    } else {
        format!("arguments {arguments}")
    }
}

pub(super) fn description_string(to_indent: &str, indentation: &str) -> String {
    format!(
        "{indentation}\"\"\"\n{indentation}{}\n{indentation}\"\"\"",
        to_indent.replace('\n', &format!("\n{indentation}"))
    )
}
