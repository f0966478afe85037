//! The supergraph produced by composition, first merged and then proven satisfiable.

mod extract;

use std::fmt::Display;
use std::fmt::Formatter;

use apollo_compiler::Schema;
use apollo_compiler::validation::Valid;

use crate::api_schema;
use crate::error::CompositionError;
use crate::error::FederationError;
use crate::error::SubgraphLocation;
use crate::link::feature_registry::FeatureRegistry;
use crate::merger::hints::HintCode;
use crate::merger::hints::HintLevel;
use crate::subgraph::Subgraph;
use crate::subgraph::Validated;

/// A non-fatal observation made during composition.
#[derive(Debug, Clone)]
pub struct CompositionHint {
    code: HintCode,
    message: String,
    locations: Vec<SubgraphLocation>,
}

impl CompositionHint {
    pub(crate) fn new(
        code: HintCode,
        message: impl Into<String>,
        locations: Vec<SubgraphLocation>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            locations,
        }
    }

    /// The stable identifier of the hint, like `INCONSISTENT_DESCRIPTION`.
    pub fn code(&self) -> &'static str {
        self.code.code()
    }

    pub fn hint_code(&self) -> HintCode {
        self.code
    }

    pub fn level(&self) -> HintLevel {
        self.code.level()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn locations(&self) -> &[SubgraphLocation] {
        &self.locations
    }
}

impl Display for CompositionHint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]: {}", self.code(), self.message)
    }
}

/// A supergraph whose subgraphs merged without errors, but that has not been checked for
/// satisfiability.
#[derive(Debug, Clone)]
pub struct Merged {
    schema: Valid<Schema>,
    hints: Vec<CompositionHint>,
}

/// A supergraph in which every query of its API can be planned over the subgraphs.
#[derive(Debug, Clone)]
pub struct Satisfiable {
    schema: Valid<Schema>,
    api_schema: Valid<Schema>,
    hints: Vec<CompositionHint>,
}

trait SupergraphState {
    fn schema(&self) -> &Valid<Schema>;
    fn hints(&self) -> &[CompositionHint];
}

impl SupergraphState for Merged {
    fn schema(&self) -> &Valid<Schema> {
        &self.schema
    }

    fn hints(&self) -> &[CompositionHint] {
        &self.hints
    }
}

impl SupergraphState for Satisfiable {
    fn schema(&self) -> &Valid<Schema> {
        &self.schema
    }

    fn hints(&self) -> &[CompositionHint] {
        &self.hints
    }
}

#[derive(Debug, Clone)]
pub struct Supergraph<S> {
    state: S,
}

impl Supergraph<Merged> {
    pub(crate) fn new(schema: Valid<Schema>, hints: Vec<CompositionHint>) -> Self {
        Self {
            state: Merged { schema, hints },
        }
    }

    /// Marks the supergraph satisfiable, adding the hints raised while validating it.
    pub(crate) fn into_satisfiable(
        self,
        api_schema: Valid<Schema>,
        hints: Vec<CompositionHint>,
    ) -> Supergraph<Satisfiable> {
        let Merged {
            schema,
            hints: mut all_hints,
        } = self.state;
        all_hints.extend(hints);
        Supergraph {
            state: Satisfiable {
                schema,
                api_schema,
                hints: all_hints,
            },
        }
    }
}

impl Supergraph<Satisfiable> {
    /// The schema clients of the supergraph see.
    pub fn api_schema(&self) -> &Valid<Schema> {
        &self.state.api_schema
    }
}

#[allow(private_bounds)]
impl<S: SupergraphState> Supergraph<S> {
    pub fn schema(&self) -> &Valid<Schema> {
        self.state.schema()
    }

    pub fn hints(&self) -> &[CompositionHint] {
        self.state.hints()
    }

    /// Derives the API schema: the supergraph without its `join`/`link` machinery, federation
    /// directives and `@inaccessible` elements.
    pub fn to_api_schema(&self) -> Result<Valid<Schema>, Vec<CompositionError>> {
        api_schema::to_api_schema(self.schema())
    }

    /// Rebuilds, from the `join` directives, the federation-relevant part of every subgraph the
    /// supergraph was composed from.
    pub fn extract_subgraphs(&self) -> Result<Vec<Subgraph<Validated>>, FederationError> {
        extract::extract_subgraphs(self.schema(), &FeatureRegistry::default())
    }
}
