use apollo_compiler::Name;
use apollo_compiler::ast::Type;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::EnumValueDefinition;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::FieldDefinition;

use crate::error::ErrorCode;
use crate::error::FederationError;
use crate::error::SubgraphLocation;
use crate::internal_error;
use crate::merger::Merger;
use crate::merger::Sources;
use crate::merger::error_reporter::Mismatch;
use crate::merger::hints::HintCode;
use crate::schema::position::SchemaElementPosition;
use crate::supergraph::CompositionHint;
use crate::utils::logging::snapshot;

/// A position an enum is used in, reported in errors about the enum.
#[derive(Debug, Clone)]
pub(crate) struct EnumExample {
    coordinate: String,
    locations: Vec<SubgraphLocation>,
}

/// How an enum type is used across all subgraphs, which decides how its values are merged.
#[derive(Debug, Clone)]
pub(crate) enum EnumTypeUsage {
    /// Only as the type of arguments and input fields: values are intersected.
    Input(EnumExample),
    /// Only as the type of output fields: values are united.
    Output(EnumExample),
    /// Both: all subgraphs must define the same values.
    Both {
        input: EnumExample,
        output: EnumExample,
    },
}

impl EnumTypeUsage {
    fn record(usage: Option<Self>, example: EnumExample, is_input: bool) -> Self {
        match (usage, is_input) {
            (None, true) => Self::Input(example),
            (None, false) => Self::Output(example),
            (Some(Self::Input(input)), false) => Self::Both {
                input,
                output: example,
            },
            (Some(Self::Output(output)), true) => Self::Both {
                input: example,
                output,
            },
            (Some(usage), _) => usage,
        }
    }
}

fn output_fields(
    type_: &ExtendedType,
) -> Option<&IndexMap<Name, Component<FieldDefinition>>> {
    match type_ {
        ExtendedType::Object(object) => Some(&object.fields),
        ExtendedType::Interface(interface) => Some(&interface.fields),
        _ => None,
    }
}

impl Merger {
    /// Finds, for every enum type, whether it is used in input positions, output positions or
    /// both, keeping the first example of each.
    ///
    /// Only positions that made it into the supergraph count, so this runs once fields,
    /// arguments and input fields are merged.
    pub(super) fn collect_enum_usages(&mut self) {
        let mut usages = vec![];
        for (index, subgraph) in self.subgraphs.iter().enumerate() {
            let schema = subgraph.schema();
            let is_enum = |ty: &Type| {
                matches!(
                    schema.types.get(ty.inner_named_type()),
                    Some(ExtendedType::Enum(_))
                )
            };
            for (type_name, type_) in &schema.types {
                if type_.is_built_in() {
                    continue;
                }
                let Some(merged_type) = self.merged.types.get(type_name) else {
                    continue;
                };
                match (type_, merged_type) {
                    (ExtendedType::InputObject(input), ExtendedType::InputObject(merged)) => {
                        for (field_name, field) in &input.fields {
                            if merged.fields.contains_key(field_name) && is_enum(&field.ty) {
                                usages.push((
                                    field.ty.inner_named_type().clone(),
                                    EnumExample {
                                        coordinate: format!("{type_name}.{field_name}"),
                                        locations: self.error_reporter.location(index, field),
                                    },
                                    true,
                                ));
                            }
                        }
                    }
                    _ => {
                        // Interface objects are objects in subgraphs but interfaces in the
                        // supergraph.
                        let (Some(fields), Some(merged_fields)) =
                            (output_fields(type_), output_fields(merged_type))
                        else {
                            continue;
                        };
                        for (field_name, field) in fields {
                            let Some(merged_field) = merged_fields.get(field_name) else {
                                continue;
                            };
                            if is_enum(&field.ty) {
                                usages.push((
                                    field.ty.inner_named_type().clone(),
                                    EnumExample {
                                        coordinate: format!("{type_name}.{field_name}"),
                                        locations: self.error_reporter.location(index, field),
                                    },
                                    false,
                                ));
                            }
                            for argument in &field.arguments {
                                let survives = merged_field
                                    .arguments
                                    .iter()
                                    .any(|merged| merged.name == argument.name);
                                if survives && is_enum(&argument.ty) {
                                    usages.push((
                                        argument.ty.inner_named_type().clone(),
                                        EnumExample {
                                            coordinate: format!(
                                                "{type_name}.{field_name}({}:)",
                                                argument.name
                                            ),
                                            locations: self
                                                .error_reporter
                                                .location(index, argument),
                                        },
                                        true,
                                    ));
                                }
                            }
                        }
                    }
                }
            }
        }
        for (enum_name, example, is_input) in usages {
            let usage = self.enum_usages.get(&enum_name).cloned();
            self.enum_usages
                .insert(enum_name, EnumTypeUsage::record(usage, example, is_input));
        }
        snapshot!(
            "EnumTypeUsages",
            format!("{:?}", self.enum_usages),
            "collected enum usages"
        );
    }

    /// Merges the values of an enum type according to how the enum is used.
    pub(super) fn merge_enum(&mut self, name: &Name) -> Result<(), FederationError> {
        let sources = self.type_sources(name);
        self.add_join_type(name, &sources)?;

        let usage = match self.enum_usages.get(name) {
            Some(usage) => usage.clone(),
            None => {
                let locations = self.error_reporter.locations(&sources);
                self.error_reporter.add_hint(CompositionHint::new(
                    HintCode::UnusedEnumType,
                    format!(
                        "Enum type \"{name}\" is defined but unused. It will be included in the supergraph with all the values appearing in any subgraph (\"as if\" it was only used as an output type)."
                    ),
                    locations,
                ));
                EnumTypeUsage::Output(EnumExample {
                    coordinate: String::new(),
                    locations: vec![],
                })
            }
        };

        let mut values: IndexSet<Name> = IndexSet::default();
        for type_ in sources.values().flatten() {
            if let ExtendedType::Enum(enum_) = type_ {
                values.extend(enum_.values.keys().cloned());
            }
        }
        let Some(ExtendedType::Enum(merged)) = self.merged.types.get_mut(name) else {
            return Err(internal_error!("Merged type \"{name}\" should be an enum"));
        };
        let merged = merged.make_mut();
        for value in &values {
            merged.values.insert(
                value.clone(),
                Component::new(EnumValueDefinition {
                    description: None,
                    value: value.clone(),
                    directives: Default::default(),
                }),
            );
        }

        for value in &values {
            self.merge_enum_value(name, &sources, value, &usage)?;
        }

        let is_empty = match self.merged.types.get(name) {
            Some(ExtendedType::Enum(merged)) => merged.values.is_empty(),
            _ => false,
        };
        if is_empty {
            let locations = self.error_reporter.locations(&sources);
            self.error_reporter.add_error(ErrorCode::EmptyMergedEnumType.err(
                format!(
                    "None of the values of enum type \"{name}\" are defined consistently in all the subgraphs defining that type. As only values common to all subgraphs are merged, this would result in an empty type."
                ),
                locations,
            ));
        }
        Ok(())
    }

    fn merge_enum_value(
        &mut self,
        name: &Name,
        sources: &Sources<ExtendedType>,
        value: &Name,
        usage: &EnumTypeUsage,
    ) -> Result<(), FederationError> {
        let has_value = |type_: &ExtendedType| match type_ {
            ExtendedType::Enum(enum_) => enum_.values.contains_key(value),
            _ => false,
        };
        let position = SchemaElementPosition::EnumValue {
            type_name: name.clone(),
            value: value.clone(),
        };

        let mut applications = vec![];
        let mut is_inaccessible = false;
        for (index, type_) in sources {
            let Some(ExtendedType::Enum(enum_)) = type_ else {
                continue;
            };
            let Some(value_definition) = enum_.values.get(value) else {
                continue;
            };
            applications.push(
                self.join_spec
                    .enum_value_directive(&self.join_spec_names[*index]),
            );
            is_inaccessible |= self
                .inaccessible_name_in(*index)
                .is_some_and(|inaccessible| value_definition.directives.has(inaccessible));
        }
        for application in applications {
            position.insert_directive(&mut self.merged, application)?;
        }

        let Some(supergraph_type) = self.merged.types.get(name).cloned() else {
            return Ok(());
        };
        let is_missing_somewhere = sources.values().flatten().any(|type_| !has_value(type_));
        let accessor = |type_: &ExtendedType, _: bool| {
            Some(if has_value(type_) { "yes" } else { "no" }.to_string())
        };
        let supergraph_printer = |_: &str, subgraphs: Option<&str>| {
            format!("\"{value}\" is defined in {}", subgraphs.unwrap_or(""))
        };
        let other_printer = |_: &str, subgraphs: &str| format!(" but not in {subgraphs}");

        match usage {
            EnumTypeUsage::Output(_) => {
                if is_missing_somewhere {
                    self.error_reporter.report_mismatch_hint(
                        HintCode::InconsistentEnumValueForOutputEnum,
                        &format!(
                            "Value \"{value}\" of enum type \"{name}\" has been added to the supergraph but is only defined in a subset of the subgraphs defining \"{name}\": "
                        ),
                        Mismatch::new(Some(&supergraph_type), sources, accessor)
                            .printers(supergraph_printer, other_printer),
                    );
                }
                return Ok(());
            }
            _ if is_inaccessible || !is_missing_somewhere => return Ok(()),
            EnumTypeUsage::Both { input, output } => {
                let mut extra_locations = input.locations.clone();
                extra_locations.extend(output.locations.iter().cloned());
                self.error_reporter.report_mismatch_error_with_specifics(
                    ErrorCode::EnumValueMismatch,
                    &format!(
                        "Enum type \"{name}\" is used as both input type (for example, as type of \"{}\") and output type (for example, as type of \"{}\"), but value \"{value}\" is not defined in all the subgraphs defining \"{name}\": ",
                        input.coordinate, output.coordinate,
                    ),
                    Mismatch::new(Some(&supergraph_type), sources, accessor)
                        .printers(supergraph_printer, other_printer)
                        .extra_locations(extra_locations),
                );
            }
            EnumTypeUsage::Input(_) => {
                self.error_reporter.report_mismatch_hint(
                    HintCode::InconsistentEnumValueForInputEnum,
                    &format!(
                        "Value \"{value}\" of enum type \"{name}\" will not be part of the supergraph as it is not defined in all the subgraphs defining \"{name}\": "
                    ),
                    Mismatch::new(Some(&supergraph_type), sources, accessor)
                        .printers(supergraph_printer, other_printer),
                );
            }
        }

        if let Some(ExtendedType::Enum(merged)) = self.merged.types.get_mut(name) {
            merged.make_mut().values.shift_remove(value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example(coordinate: &str) -> EnumExample {
        EnumExample {
            coordinate: coordinate.to_string(),
            locations: vec![],
        }
    }

    #[test]
    fn usage_in_both_positions_keeps_first_examples() {
        let usage = EnumTypeUsage::record(None, example("Query.a"), false);
        let usage = EnumTypeUsage::record(Some(usage), example("Query.b"), false);
        let usage = EnumTypeUsage::record(Some(usage), example("Query.a(x:)"), true);
        let usage = EnumTypeUsage::record(Some(usage), example("Input.f"), true);
        let EnumTypeUsage::Both { input, output } = usage else {
            panic!("expected the enum to be used in both positions");
        };
        assert_eq!(input.coordinate, "Query.a(x:)");
        assert_eq!(output.coordinate, "Query.a");
    }
}
