use std::fmt::Display;
use std::fmt::Formatter;
use std::ops::Range;

use apollo_compiler::InvalidNameError;
use apollo_compiler::parser::LineColumn;
use apollo_compiler::validation::DiagnosticList;

/// Create an internal error.
///
/// # Example
/// ```rust
/// use apollo_composition::internal_error;
/// use apollo_composition::error::FederationError;
/// # fn may_be_none() -> Option<()> { None }
///
/// const NAME: &str = "the thing";
/// let result: Result<(), FederationError> = may_be_none()
///     .ok_or_else(|| internal_error!("Expected {NAME} to be Some"));
/// ```
#[macro_export]
macro_rules! internal_error {
    ( $( $arg:tt )+ ) => {
        $crate::error::FederationError::internal(format!( $( $arg )+ ))
    }
}

/// Break out of the current function, returning an internal error.
///
/// # Example
/// ```rust
/// use apollo_composition::bail;
/// use apollo_composition::error::FederationError;
/// # fn may_be_none() -> Option<()> { None }
///
/// fn example() -> Result<(), FederationError> {
///     bail!("Something went horribly wrong");
///     unreachable!()
/// }
/// #
/// # _ = example();
/// ```
#[macro_export]
macro_rules! bail {
    ( $( $arg:tt )+ ) => {
        return Err($crate::internal_error!( $( $arg )+ ).into())
    }
}

/// A safe assertion: in debug mode, it panicks on failure, and in production, it returns an
/// internal error.
///
/// Treat this as an assertion. It must only be used for conditions that *should never happen*
/// in normal operation.
#[macro_export]
macro_rules! ensure {
    ( $expr:expr, $( $arg:tt )+ ) => {
        #[cfg(debug_assertions)]
        {
            if false {
                return Err($crate::error::FederationError::internal("ensure!() must be used in a function that returns a Result").into());
            }
            assert!($expr, $( $arg )+);
        }

        #[cfg(not(debug_assertions))]
        if !$expr {
            $crate::bail!( $( $arg )+ );
        }
    }
}

/// A location in the source text of one subgraph.
#[derive(Debug, Clone)]
pub struct SubgraphLocation {
    /// Name of the subgraph the location points into.
    pub subgraph: String,
    pub range: Range<LineColumn>,
}

impl Display for SubgraphLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {}:{}",
            self.subgraph, self.range.start.line, self.range.start.column
        )
    }
}

/// Errors that indicate a bug in composition rather than a problem with its input, plus the few
/// failures that happen before any subgraph is known (invalid `@link`, unparseable SDL).
#[derive(Debug, Clone, thiserror::Error)]
pub enum FederationError {
    #[error(
        "An internal error has occurred, please report this bug to Apollo.\n\nDetails: {message}"
    )]
    Internal { message: String },
    #[error("{message}")]
    InvalidGraphQL {
        message: String,
        locations: Vec<Range<LineColumn>>,
    },
    #[error("{message}")]
    InvalidLinkDirectiveUsage { message: String },
    #[error("{message}")]
    UnknownFederationLinkVersion { message: String },
    #[error("{message}")]
    InvalidSubgraphName { message: String },
}

impl FederationError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub(crate) fn from_diagnostics(errors: &DiagnosticList) -> Vec<Self> {
        errors
            .iter()
            .map(|d| Self::InvalidGraphQL {
                message: d.error.to_string(),
                locations: d.line_column_range().into_iter().collect(),
            })
            .collect()
    }

    /// Attach this error to a subgraph, turning it into a user-facing composition error.
    pub(crate) fn into_composition_error(self, subgraph: &str) -> CompositionError {
        let prefixed = |message: &str| format!("[{subgraph}] {message}");
        match self {
            Self::Internal { message } => ErrorCode::Internal.err(message, vec![]),
            Self::InvalidGraphQL { message, locations } => ErrorCode::InvalidGraphql.err(
                prefixed(&message),
                locations
                    .into_iter()
                    .map(|range| SubgraphLocation {
                        subgraph: subgraph.to_string(),
                        range,
                    })
                    .collect(),
            ),
            Self::InvalidLinkDirectiveUsage { message } => {
                ErrorCode::InvalidLinkDirectiveUsage.err(prefixed(&message), vec![])
            }
            Self::UnknownFederationLinkVersion { message } => {
                ErrorCode::UnknownFederationLinkVersion.err(prefixed(&message), vec![])
            }
            Self::InvalidSubgraphName { message } => {
                ErrorCode::InvalidSubgraphName.err(message, vec![])
            }
        }
    }
}

impl From<InvalidNameError> for FederationError {
    fn from(error: InvalidNameError) -> Self {
        Self::internal(error.to_string())
    }
}

impl From<FederationError> for CompositionError {
    fn from(error: FederationError) -> Self {
        match error {
            FederationError::Internal { message } => ErrorCode::Internal.err(message, vec![]),
            FederationError::InvalidGraphQL { message, .. } => {
                ErrorCode::InvalidGraphql.err(message, vec![])
            }
            FederationError::InvalidLinkDirectiveUsage { message } => {
                ErrorCode::InvalidLinkDirectiveUsage.err(message, vec![])
            }
            FederationError::UnknownFederationLinkVersion { message } => {
                ErrorCode::UnknownFederationLinkVersion.err(message, vec![])
            }
            FederationError::InvalidSubgraphName { message } => {
                ErrorCode::InvalidSubgraphName.err(message, vec![])
            }
        }
    }
}

macro_rules! composition_errors {
    ( $( $(#[$doc:meta])* $variant:ident => $code:ident, )+ ) => {
        /// A user-facing composition error. Every variant carries a message and the subgraph
        /// locations it refers to; the stable identifier tools key off is [`ErrorCode`].
        #[derive(Debug, Clone, thiserror::Error)]
        pub enum CompositionError {
            $(
                $(#[$doc])*
                #[error("{message}")]
                $variant {
                    message: String,
                    locations: Vec<SubgraphLocation>,
                },
            )+
        }

        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            strum_macros::Display,
            strum_macros::IntoStaticStr,
            strum_macros::EnumIter,
        )]
        #[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
        pub enum ErrorCode {
            $( $code, )+
        }

        impl CompositionError {
            pub fn code(&self) -> ErrorCode {
                match self {
                    $( Self::$variant { .. } => ErrorCode::$code, )+
                }
            }

            pub fn message(&self) -> &str {
                match self {
                    $( Self::$variant { message, .. } => message, )+
                }
            }

            pub fn locations(&self) -> &[SubgraphLocation] {
                match self {
                    $( Self::$variant { locations, .. } => locations, )+
                }
            }
        }

        impl ErrorCode {
            pub fn err(
                self,
                message: impl Into<String>,
                locations: Vec<SubgraphLocation>,
            ) -> CompositionError {
                let message = message.into();
                match self {
                    $( Self::$code => CompositionError::$variant { message, locations }, )+
                }
            }
        }
    };
}

composition_errors! {
    /// A type is defined with different kinds (object, interface, ...) in different subgraphs.
    TypeKindMismatch => TypeKindMismatch,
    InvalidFieldSharing => InvalidFieldSharing,
    FieldTypeMismatch => FieldTypeMismatch,
    FieldArgumentTypeMismatch => FieldArgumentTypeMismatch,
    FieldArgumentDefaultMismatch => FieldArgumentDefaultMismatch,
    InputFieldDefaultMismatch => InputFieldDefaultMismatch,
    RequiredArgumentMissingInSomeSubgraph => RequiredArgumentMissingInSomeSubgraph,
    RequiredInputFieldMissingInSomeSubgraph => RequiredInputFieldMissingInSomeSubgraph,
    EmptyMergedInputType => EmptyMergedInputType,
    EmptyMergedEnumType => EmptyMergedEnumType,
    EnumValueMismatch => EnumValueMismatch,
    ExternalMissingOnBase => ExternalMissingOnBase,
    ExternalTypeMismatch => ExternalTypeMismatch,
    ExternalArgumentMissing => ExternalArgumentMissing,
    ExternalArgumentTypeMismatch => ExternalArgumentTypeMismatch,
    ExternalArgumentDefaultMismatch => ExternalArgumentDefaultMismatch,
    MergedDirectiveApplicationOnExternal => MergedDirectiveApplicationOnExternal,
    InterfaceKeyMissingImplementationType => InterfaceKeyMissingImplementationType,
    InterfaceObjectUsageError => InterfaceObjectUsageError,
    InterfaceFieldNoImplem => InterfaceFieldNoImplem,
    OverrideOnInterface => OverrideOnInterface,
    OverrideFromSelfError => OverrideFromSelfError,
    OverrideSourceHasOverride => OverrideSourceHasOverride,
    OverrideCollisionWithAnotherDirective => OverrideCollisionWithAnotherDirective,
    OverrideLabelInvalid => OverrideLabelInvalid,
    KeyInvalidFields => KeyInvalidFields,
    ProvidesInvalidFields => ProvidesInvalidFields,
    RequiresInvalidFields => RequiresInvalidFields,
    NoQueries => NoQueries,
    DirectiveCompositionError => DirectiveCompositionError,
    LinkImportNameMismatch => LinkImportNameMismatch,
    InvalidSubgraphName => InvalidSubgraphName,
    RootQueryUsed => RootQueryUsed,
    RootMutationUsed => RootMutationUsed,
    RootSubscriptionUsed => RootSubscriptionUsed,
    /// The input (or the merged supergraph) is not valid GraphQL.
    InvalidGraphQL => InvalidGraphql,
    InvalidLinkDirectiveUsage => InvalidLinkDirectiveUsage,
    UnknownFederationLinkVersion => UnknownFederationLinkVersion,
    ReferencedInaccessible => ReferencedInaccessible,
    OnlyInaccessibleChildren => OnlyInaccessibleChildren,
    RequiredInaccessible => RequiredInaccessible,
    ImplementedByInaccessible => ImplementedByInaccessible,
    DefaultValueUsesInaccessible => DefaultValueUsesInaccessible,
    QueryRootTypeInaccessible => QueryRootTypeInaccessible,
    /// A query expressible against the supergraph API cannot be planned over the subgraphs.
    SatisfiabilityError => CompositionSatisfiabilityError,
    ShareableHasMismatchedRuntimeTypes => ShareableHasMismatchedRuntimeTypes,
    MaxValidationSubgraphPathsExceeded => MaxValidationSubgraphPathsExceeded,
    InternalError => Internal,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        self.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_screaming_snake_case() {
        assert_eq!(ErrorCode::TypeKindMismatch.code(), "TYPE_KIND_MISMATCH");
        assert_eq!(
            ErrorCode::CompositionSatisfiabilityError.code(),
            "COMPOSITION_SATISFIABILITY_ERROR"
        );
        assert_eq!(ErrorCode::InvalidGraphql.code(), "INVALID_GRAPHQL");
        assert_eq!(
            ErrorCode::RequiredArgumentMissingInSomeSubgraph.to_string(),
            "REQUIRED_ARGUMENT_MISSING_IN_SOME_SUBGRAPH"
        );
    }

    #[test]
    fn error_code_builds_matching_variant() {
        let error = ErrorCode::OverrideFromSelfError.err("oops", vec![]);
        assert!(matches!(error, CompositionError::OverrideFromSelfError { .. }));
        assert_eq!(error.code(), ErrorCode::OverrideFromSelfError);
        assert_eq!(error.message(), "oops");
        assert_eq!(error.to_string(), "oops");
    }
}
