use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast::Type;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::DirectiveDefinition;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::FieldDefinition;
use apollo_compiler::schema::InputValueDefinition;

use crate::bail;
use crate::error::ErrorCode;
use crate::error::FederationError;
use crate::merger::Merger;
use crate::merger::Sources;
use crate::merger::error_reporter::Mismatch;
use crate::merger::error_reporter::SourceLocated;
use crate::merger::hints::HintCode;
use crate::schema::position::SchemaElementPosition;

/// A schema element with a type, whose type is merged across subgraphs.
pub(super) trait TypedElement: SourceLocated + Clone {
    fn ty(&self) -> &Type;

    /// A copy of this element with another type.
    fn with_type(&self, ty: Type) -> Self;
}

impl TypedElement for Component<FieldDefinition> {
    fn ty(&self) -> &Type {
        &self.ty
    }

    fn with_type(&self, ty: Type) -> Self {
        let mut field = self.clone();
        field.make_mut().ty = ty;
        field
    }
}

impl TypedElement for Node<InputValueDefinition> {
    fn ty(&self) -> &Type {
        &self.ty
    }

    fn with_type(&self, ty: Type) -> Self {
        let mut value = self.clone();
        value.make_mut().ty = Node::new(ty);
        value
    }
}

/// A field or directive definition, whose arguments are merged across subgraphs.
pub(super) trait HasArguments: SourceLocated + Clone {
    fn arguments(&self) -> &[Node<InputValueDefinition>];

    fn argument(&self, name: &Name) -> Option<Node<InputValueDefinition>> {
        self.arguments()
            .iter()
            .find(|argument| argument.name == *name)
            .cloned()
    }
}

impl HasArguments for Component<FieldDefinition> {
    fn arguments(&self) -> &[Node<InputValueDefinition>] {
        &self.arguments
    }
}

impl HasArguments for Node<DirectiveDefinition> {
    fn arguments(&self) -> &[Node<InputValueDefinition>] {
        &self.arguments
    }
}

impl Merger {
    /// Merges the types of an element and sets the result on the supergraph element.
    ///
    /// Output positions get the most general of the compatible types, and input positions the
    /// most specific one. Returns whether all subgraphs use the exact same type.
    pub(super) fn merge_type_reference<T: TypedElement>(
        &mut self,
        sources: &Sources<T>,
        position: &SchemaElementPosition,
        is_input_position: bool,
    ) -> Result<bool, FederationError> {
        let mut present = sources.values().flatten();
        let Some(first) = present.next() else {
            bail!("No type sources provided for merging {position}");
        };
        let mut typ = first.ty();
        let mut has_subtypes = false;
        let mut has_incompatible = false;
        for source in present {
            let source_type = source.ty();
            if same_type(typ, source_type) {
                continue;
            } else if self.is_strict_subtype(typ, source_type)? {
                has_subtypes = true;
                if is_input_position {
                    typ = source_type;
                }
            } else if self.is_strict_subtype(source_type, typ)? {
                has_subtypes = true;
                if !is_input_position {
                    typ = source_type;
                }
            } else {
                has_incompatible = true;
            }
        }
        let merged_type = typ.clone();
        position.set_type(&mut self.merged, merged_type.clone())?;

        let is_argument = matches!(
            position,
            SchemaElementPosition::FieldArgument { .. }
                | SchemaElementPosition::DirectiveArgument { .. }
        );
        let element_kind = if is_argument { "argument" } else { "field" };
        let supergraph_element = first.with_type(merged_type);
        if has_incompatible {
            let code = if is_argument {
                ErrorCode::FieldArgumentTypeMismatch
            } else {
                ErrorCode::FieldTypeMismatch
            };
            self.error_reporter.report_mismatch_error(
                code,
                &format!(
                    "Type of {element_kind} \"{position}\" is incompatible across subgraphs: it has "
                ),
                Mismatch::new(Some(&supergraph_element), sources, |element, _| {
                    Some(format!("type \"{}\"", element.ty()))
                }),
            );
            Ok(false)
        } else if has_subtypes {
            let code = if is_argument {
                HintCode::InconsistentButCompatibleArgumentType
            } else {
                HintCode::InconsistentButCompatibleFieldType
            };
            let type_class = if is_input_position {
                "supertype"
            } else {
                "subtype"
            };
            let coordinate = position.to_string();
            self.error_reporter.report_mismatch_hint(
                code,
                &format!(
                    "Type of {element_kind} \"{position}\" is inconsistent but compatible across subgraphs: "
                ),
                Mismatch::new(Some(&supergraph_element), sources, |element, _| {
                    Some(element.ty().to_string())
                })
                .printers(
                    |elt, subgraphs| {
                        format!(
                            "will use type \"{elt}\" (from {}) in supergraph but \"{coordinate}\" has ",
                            subgraphs.unwrap_or("undefined")
                        )
                    },
                    |elt, subgraphs| format!("{type_class} \"{elt}\" in {subgraphs}"),
                ),
            );
            Ok(false)
        } else {
            Ok(true)
        }
    }

    /// Whether `potential_subtype` can be used where `potential_supertype` is expected, without
    /// being the same type. Lists must be lists on both sides.
    pub(super) fn is_strict_subtype(
        &self,
        potential_supertype: &Type,
        potential_subtype: &Type,
    ) -> Result<bool, FederationError> {
        match (potential_subtype, potential_supertype) {
            (Type::List(inner_sub), Type::List(inner_super))
            | (Type::NonNullList(inner_sub), Type::NonNullList(inner_super)) => {
                self.is_strict_subtype(inner_super, inner_sub)
            }
            (Type::NonNullList(inner_sub), Type::List(inner_super)) => Ok(same_type(
                inner_super,
                inner_sub,
            ) || self.is_strict_subtype(inner_super, inner_sub)?),
            (Type::List(_), _) | (Type::NonNullList(_), _) => Ok(false),
            (Type::NonNullNamed(sub), Type::Named(super_)) if sub == super_ => Ok(true),
            (Type::Named(sub), Type::Named(super_))
            | (Type::NonNullNamed(sub), Type::Named(super_))
            | (Type::NonNullNamed(sub), Type::NonNullNamed(super_)) => {
                self.is_named_type_subtype(super_, sub)
            }
            _ => Ok(false),
        }
    }

    fn is_named_type_subtype(
        &self,
        potential_supertype: &Name,
        potential_subtype: &Name,
    ) -> Result<bool, FederationError> {
        if potential_subtype == potential_supertype {
            return Ok(false);
        }
        let Some(subtype_def) = self.merged.types.get(potential_subtype) else {
            bail!("Cannot find type '{potential_subtype}' in the supergraph");
        };
        let Some(supertype_def) = self.merged.types.get(potential_supertype) else {
            bail!("Cannot find type '{potential_supertype}' in the supergraph");
        };
        Ok(match (subtype_def, supertype_def) {
            (ExtendedType::Object(object), ExtendedType::Interface(_)) => {
                object.implements_interfaces.contains(potential_supertype)
            }
            (ExtendedType::Interface(interface), ExtendedType::Interface(_)) => {
                interface.implements_interfaces.contains(potential_supertype)
            }
            (ExtendedType::Object(_), ExtendedType::Union(union_)) => {
                union_.members.contains(potential_subtype)
            }
            _ => false,
        })
    }

    /// Adds the arguments of a field or directive, keeping only the ones all subgraphs defining
    /// it define. Returns the names of the kept arguments.
    pub(super) fn add_arguments_shallow<T: HasArguments>(
        &mut self,
        sources: &Sources<T>,
        position: &SchemaElementPosition,
    ) -> Result<Vec<Name>, FederationError> {
        let mut argument_names: IndexSet<Name> = IndexSet::default();
        for field in sources.values().flatten() {
            argument_names.extend(field.arguments().iter().map(|argument| argument.name.clone()));
        }

        let mut kept = vec![];
        for argument_name in argument_names {
            let Some(argument_position) = position.argument(&argument_name) else {
                bail!("Cannot add arguments to \"{position}\"");
            };
            let argument_sources: Sources<Node<InputValueDefinition>> = sources
                .iter()
                .filter_map(|(index, field)| Some((*index, field.as_ref()?)))
                .map(|(index, field)| (index, field.argument(&argument_name)))
                .collect();
            let missing_in: Vec<usize> = argument_sources
                .iter()
                .filter(|(_, argument)| argument.is_none())
                .map(|(index, _)| *index)
                .collect();
            if missing_in.is_empty() {
                let Some(first) = argument_sources.values().flatten().next() else {
                    continue;
                };
                let mut argument = (**first).clone();
                argument.description = None;
                argument.default_value = None;
                argument.directives = Default::default();
                position.insert_argument(&mut self.merged, Node::new(argument))?;
                kept.push(argument_name);
                continue;
            }

            let required_in: Vec<usize> = argument_sources
                .iter()
                .filter(|(_, argument)| argument.as_ref().is_some_and(|a| a.is_required()))
                .map(|(index, _)| *index)
                .collect();
            if !required_in.is_empty() {
                let locations = self.error_reporter.locations(&argument_sources);
                self.error_reporter.add_error(
                    ErrorCode::RequiredArgumentMissingInSomeSubgraph.err(
                        format!(
                            "Argument \"{argument_position}\" is required in some subgraphs but does not appear in all subgraphs: it is required in {} but does not appear in {}",
                            self.subgraph_names_of(&required_in),
                            self.subgraph_names_of(&missing_in),
                        ),
                        locations,
                    ),
                );
            } else {
                let supergraph_element = argument_sources.values().flatten().next().cloned();
                self.error_reporter.report_mismatch_hint(
                    HintCode::InconsistentArgumentPresence,
                    &format!(
                        "Optional argument \"{argument_position}\" will not be included in the supergraph as it does not appear in all subgraphs: "
                    ),
                    Mismatch::new(supergraph_element.as_ref(), &argument_sources, |_, _| {
                        Some("yes".to_string())
                    })
                    .printers(
                        |_, subgraphs| format!("it is defined in {}", subgraphs.unwrap_or("")),
                        |_, subgraphs| format!(" but not in {subgraphs}"),
                    )
                    .include_missing_sources(),
                );
            }
        }
        Ok(kept)
    }

    /// Merges the kept arguments of a field or directive.
    pub(super) fn merge_arguments<T: HasArguments>(
        &mut self,
        sources: &Sources<T>,
        position: &SchemaElementPosition,
        argument_names: &[Name],
    ) -> Result<(), FederationError> {
        for argument_name in argument_names {
            let Some(argument_position) = position.argument(argument_name) else {
                continue;
            };
            let argument_sources: Sources<Node<InputValueDefinition>> = sources
                .iter()
                .map(|(index, field)| {
                    (
                        *index,
                        field.as_ref().and_then(|field| field.argument(argument_name)),
                    )
                })
                .collect();
            self.merge_argument(&argument_sources, &argument_position)?;
        }
        Ok(())
    }

    pub(super) fn merge_argument(
        &mut self,
        sources: &Sources<Node<InputValueDefinition>>,
        position: &SchemaElementPosition,
    ) -> Result<(), FederationError> {
        self.merge_type_reference(sources, position, true)?;
        self.merge_default_value(sources, position, "Argument")
    }

    /// Sets the default value all subgraphs agree on. A default only some subgraphs define is
    /// dropped with a hint; different defaults are an error.
    pub(super) fn merge_default_value(
        &mut self,
        sources: &Sources<Node<InputValueDefinition>>,
        position: &SchemaElementPosition,
        kind: &str,
    ) -> Result<(), FederationError> {
        let mut merged_default = None;
        let mut has_seen_source = false;
        let mut is_inconsistent = false;
        let mut is_incompatible = false;
        for source in sources.values().flatten() {
            match (&merged_default, &source.default_value) {
                (None, source_default) => {
                    if has_seen_source && source_default.is_some() {
                        is_inconsistent = true;
                    }
                    merged_default = source_default.clone();
                }
                (Some(merged), source_default) => {
                    if source_default.as_ref() != Some(merged) {
                        is_inconsistent = true;
                        if source_default.is_some() {
                            is_incompatible = true;
                        }
                    }
                }
            }
            has_seen_source = true;
        }

        let Some(first) = sources.values().flatten().next() else {
            return Ok(());
        };
        if is_incompatible {
            let code = if kind == "Argument" {
                ErrorCode::FieldArgumentDefaultMismatch
            } else {
                ErrorCode::InputFieldDefaultMismatch
            };
            let supergraph_element = with_default_value(first, merged_default.clone());
            self.error_reporter.report_mismatch_error(
                code,
                &format!(
                    "{kind} \"{position}\" has incompatible default values across subgraphs: it has "
                ),
                Mismatch::new(Some(&supergraph_element), sources, |element, _| {
                    element
                        .default_value
                        .as_ref()
                        .map(|value| format!("default value {value}"))
                })
                .ignore(|element| element.default_value.is_none()),
            );
        } else if is_inconsistent {
            merged_default = None;
            let supergraph_element = with_default_value(first, None);
            let coordinate = position.to_string();
            self.error_reporter.report_mismatch_hint(
                HintCode::InconsistentDefaultValuePresence,
                &format!("{kind} \"{position}\" has a default value in only some subgraphs: "),
                Mismatch::new(Some(&supergraph_element), sources, |element, _| {
                    element.default_value.as_ref().map(|value| value.to_string())
                })
                .printers(
                    |_, subgraphs| {
                        format!(
                            "will not use a default in the supergraph (there is no default in {})",
                            subgraphs.unwrap_or("")
                        )
                    },
                    |elt, subgraphs| {
                        format!("; \"{coordinate}\" has default value {elt} in {subgraphs}")
                    },
                ),
            );
        }
        position.set_default_value(&mut self.merged, merged_default)
    }
}

pub(super) fn same_type(dest_type: &Type, source_type: &Type) -> bool {
    match (dest_type, source_type) {
        (Type::Named(n1), Type::Named(n2)) | (Type::NonNullNamed(n1), Type::NonNullNamed(n2)) => {
            n1 == n2
        }
        (Type::List(inner1), Type::List(inner2))
        | (Type::NonNullList(inner1), Type::NonNullList(inner2)) => same_type(inner1, inner2),
        _ => false,
    }
}

pub(super) fn argument_of(
    field: &FieldDefinition,
    name: &Name,
) -> Option<Node<InputValueDefinition>> {
    field
        .arguments
        .iter()
        .find(|argument| argument.name == *name)
        .cloned()
}

fn with_default_value(
    value: &Node<InputValueDefinition>,
    default_value: Option<Node<apollo_compiler::ast::Value>>,
) -> Node<InputValueDefinition> {
    let mut value = value.clone();
    value.make_mut().default_value = default_value;
    value
}
