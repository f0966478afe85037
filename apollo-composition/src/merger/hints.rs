use serde::Serialize;

/// How much attention a hint deserves. Hints never fail composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum HintLevel {
    Warn = 60,
    Info = 40,
    Debug = 20,
}

impl HintLevel {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
        }
    }
}

pub(crate) struct HintCodeDefinition {
    pub(crate) level: HintLevel,
    pub(crate) description: &'static str,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum_macros::Display,
    strum_macros::IntoStaticStr,
    strum_macros::EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HintCode {
    InconsistentButCompatibleFieldType,
    InconsistentButCompatibleArgumentType,
    InconsistentDefaultValuePresence,
    InconsistentEntity,
    InconsistentObjectValueTypeField,
    InconsistentInterfaceValueTypeField,
    InconsistentInputObjectField,
    InconsistentUnionMember,
    InconsistentEnumValueForInputEnum,
    InconsistentEnumValueForOutputEnum,
    InconsistentExecutableDirectivePresence,
    NoExecutableDirectiveLocationsIntersection,
    InconsistentExecutableDirectiveRepeatable,
    InconsistentExecutableDirectiveLocations,
    InconsistentDescription,
    InconsistentArgumentPresence,
    FromSubgraphDoesNotExist,
    OverriddenFieldCanBeRemoved,
    OverrideDirectiveCanBeRemoved,
    OverrideMigrationInProgress,
    UnusedEnumType,
    InconsistentNonRepeatableDirectiveArguments,
    MergedNonRepeatableDirectiveArguments,
    DirectiveCompositionInfo,
    DirectiveCompositionWarn,
    InconsistentRuntimeTypesForShareableReturn,
    ImplicitlyUpgradedFederationVersion,
}

impl HintCode {
    pub fn code(&self) -> &'static str {
        self.into()
    }

    pub fn level(&self) -> HintLevel {
        self.definition().level
    }

    pub fn description(&self) -> &'static str {
        self.definition().description
    }

    pub(crate) fn definition(&self) -> HintCodeDefinition {
        let (level, description) = match self {
            Self::InconsistentButCompatibleFieldType => (
                HintLevel::Info,
                "Indicates that a field does not have the exact same types in all subgraphs, but that the types are \"compatible\" (2 types are compatible if one is a non-nullable version of the other, a list version, a subtype, or a combination of the former).",
            ),
            Self::InconsistentButCompatibleArgumentType => (
                HintLevel::Info,
                "Indicates that an argument of an execution directive definition does not have the exact same type in all subgraphs, but that the types are \"compatible\".",
            ),
            Self::InconsistentDefaultValuePresence => (
                HintLevel::Warn,
                "Indicates that an argument definition (of a field/input field/directive definition) has a default value in only some of the subgraphs that define the argument.",
            ),
            Self::InconsistentEntity => (
                HintLevel::Info,
                "Indicates that an object is declared as an entity (has a `@key`) in only some of the subgraphs in which the object is defined.",
            ),
            Self::InconsistentObjectValueTypeField => (
                HintLevel::Debug,
                "Indicates that a field of an object \"value type\" (has no `@key` in any subgraph) is not defined in all the subgraphs that declare the type.",
            ),
            Self::InconsistentInterfaceValueTypeField => (
                HintLevel::Debug,
                "Indicates that a field of an interface \"value type\" (has no `@key` in any subgraph) is not defined in all the subgraphs that declare the type.",
            ),
            Self::InconsistentInputObjectField => (
                HintLevel::Warn,
                "Indicates that a field of an input object type definition is only defined in a subset of the subgraphs that declare the input object.",
            ),
            Self::InconsistentUnionMember => (
                HintLevel::Debug,
                "Indicates that a member of a union type definition is only defined in a subset of the subgraphs that declare the union.",
            ),
            Self::InconsistentEnumValueForInputEnum => (
                HintLevel::Warn,
                "Indicates that a value of an enum type definition (that is only used as an Input type) has not been merged into the supergraph because it is defined in only a subset of the subgraphs that declare the enum.",
            ),
            Self::InconsistentEnumValueForOutputEnum => (
                HintLevel::Debug,
                "Indicates that a value of an enum type definition (that is only used as an Output type, or is unused) has been merged in the supergraph but is defined in only a subset of the subgraphs that declare the enum.",
            ),
            Self::InconsistentExecutableDirectivePresence => (
                HintLevel::Warn,
                "Indicates that an executable directive definition is declared in only some of the subgraphs.",
            ),
            Self::NoExecutableDirectiveLocationsIntersection => (
                HintLevel::Warn,
                "Indicates that, for an executable directive definition, no location for it appears in all subgraphs.",
            ),
            Self::InconsistentExecutableDirectiveRepeatable => (
                HintLevel::Warn,
                "Indicates that an executable directive definition is marked repeatable in only a subset of the subgraphs (and will not be repeatable in the supergraph).",
            ),
            Self::InconsistentExecutableDirectiveLocations => (
                HintLevel::Warn,
                "Indicates that an executable directive definition is declared with inconsistent locations across subgraphs (and will use the intersection of all locations in the supergraph).",
            ),
            Self::InconsistentDescription => (
                HintLevel::Warn,
                "Indicates that an element has a description in more than one subgraph, and the descriptions are not equal.",
            ),
            Self::InconsistentArgumentPresence => (
                HintLevel::Warn,
                "Indicates that an optional argument (of a field or directive definition) is not present in all subgraphs and will not be part of the supergraph.",
            ),
            Self::FromSubgraphDoesNotExist => (
                HintLevel::Warn,
                "Source subgraph specified by @override directive does not exist",
            ),
            Self::OverriddenFieldCanBeRemoved => (
                HintLevel::Info,
                "Field has been overridden by another subgraph. Consider removing.",
            ),
            Self::OverrideDirectiveCanBeRemoved => (
                HintLevel::Info,
                "Field with @override directive no longer exists in source subgraph, the directive can be safely removed",
            ),
            Self::OverrideMigrationInProgress => (
                HintLevel::Info,
                "Field is currently being migrated with progressive @override. Once the migration is complete, remove the field from the original subgraph.",
            ),
            Self::UnusedEnumType => (
                HintLevel::Debug,
                "Indicates that an enum type is defined in some subgraphs but is unused (no field/argument references it). All the values from subgraphs defining that enum will be included in the supergraph.",
            ),
            Self::InconsistentNonRepeatableDirectiveArguments => (
                HintLevel::Warn,
                "A non-repeatable directive is applied to a schema element in different subgraphs but with arguments that are different.",
            ),
            Self::MergedNonRepeatableDirectiveArguments => (
                HintLevel::Info,
                "A non-repeatable directive has been applied to a schema element in different subgraphs with different arguments and the arguments values were merged using the directive configured strategies.",
            ),
            Self::DirectiveCompositionInfo => (
                HintLevel::Info,
                "Indicates that an issue was detected when composing custom directives.",
            ),
            Self::DirectiveCompositionWarn => (
                HintLevel::Warn,
                "Indicates that an issue was detected when composing custom directives.",
            ),
            Self::InconsistentRuntimeTypesForShareableReturn => (
                HintLevel::Warn,
                "Indicates that a @shareable field returns different sets of runtime types in the different subgraphs in which it is defined.",
            ),
            Self::ImplicitlyUpgradedFederationVersion => (
                HintLevel::Info,
                "Indicates that a directive requires a higher federation version than is explicitly linked. In this case, the supergraph uses the federation version required by the directive.",
            ),
        };
        HintCodeDefinition { level, description }
    }
}
