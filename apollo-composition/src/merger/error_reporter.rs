use std::ops::Range;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::parser::SourceMap;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::parser::LineColumn;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::ComponentName;
use apollo_compiler::schema::ExtendedType;

use crate::error::CompositionError;
use crate::error::ErrorCode;
use crate::error::SubgraphLocation;
use crate::merger::Sources;
use crate::merger::hints::HintCode;
use crate::supergraph::CompositionHint;
use crate::utils::human_readable::JoinStringsOptions;
use crate::utils::human_readable::human_readable_subgraph_names;
use crate::utils::human_readable::join_strings;

/// A schema element whose position in its source text can be looked up.
pub(crate) trait SourceLocated {
    fn source_range(&self, sources: &SourceMap) -> Option<Range<LineColumn>>;
}

impl<T> SourceLocated for Node<T> {
    fn source_range(&self, sources: &SourceMap) -> Option<Range<LineColumn>> {
        self.line_column_range(sources)
    }
}

impl<T> SourceLocated for Component<T> {
    fn source_range(&self, sources: &SourceMap) -> Option<Range<LineColumn>> {
        self.node.line_column_range(sources)
    }
}

impl SourceLocated for ComponentName {
    fn source_range(&self, sources: &SourceMap) -> Option<Range<LineColumn>> {
        self.name.source_range(sources)
    }
}

impl SourceLocated for Name {
    fn source_range(&self, sources: &SourceMap) -> Option<Range<LineColumn>> {
        self.location()?.line_column_range(sources)
    }
}

impl SourceLocated for ExtendedType {
    fn source_range(&self, sources: &SourceMap) -> Option<Range<LineColumn>> {
        match self {
            ExtendedType::Scalar(node) => node.line_column_range(sources),
            ExtendedType::Object(node) => node.line_column_range(sources),
            ExtendedType::Interface(node) => node.line_column_range(sources),
            ExtendedType::Union(node) => node.line_column_range(sources),
            ExtendedType::Enum(node) => node.line_column_range(sources),
            ExtendedType::InputObject(node) => node.line_column_range(sources),
        }
    }
}

type Accessor<'a, T> = Box<dyn Fn(&T, bool) -> Option<String> + 'a>;
type SupergraphPrinter<'a> = Box<dyn Fn(&str, Option<&str>) -> String + 'a>;
type OtherPrinter<'a> = Box<dyn Fn(&str, &str) -> String + 'a>;

/// One element as it appears in the supergraph and in every subgraph, and how to describe the
/// values it takes.
///
/// The accessor turns an element into the value compared across subgraphs; its boolean argument
/// tells whether the element is the supergraph one. Subgraphs are bucketed by value, the bucket
/// of the supergraph value comes first, and each bucket is rendered by a printer given the value
/// and the names of the subgraphs in the bucket.
pub(crate) struct Mismatch<'a, T> {
    supergraph_element: Option<&'a T>,
    sources: &'a Sources<T>,
    accessor: Accessor<'a, T>,
    supergraph_printer: SupergraphPrinter<'a>,
    other_printer: OtherPrinter<'a>,
    ignore: Option<Box<dyn Fn(&T) -> bool + 'a>>,
    include_missing_sources: bool,
    extra_locations: Vec<SubgraphLocation>,
    no_end_of_message_dot: bool,
}

impl<'a, T: SourceLocated> Mismatch<'a, T> {
    pub(crate) fn new(
        supergraph_element: Option<&'a T>,
        sources: &'a Sources<T>,
        accessor: impl Fn(&T, bool) -> Option<String> + 'a,
    ) -> Self {
        Self {
            supergraph_element,
            sources,
            accessor: Box::new(accessor),
            supergraph_printer: Box::new(|elt, names| match names {
                Some(names) => format!("{elt} in {names}"),
                None => elt.to_string(),
            }),
            other_printer: Box::new(|elt, names| format!("{elt} in {names}")),
            ignore: None,
            include_missing_sources: false,
            extra_locations: vec![],
            no_end_of_message_dot: false,
        }
    }

    pub(crate) fn printers(
        mut self,
        supergraph_printer: impl Fn(&str, Option<&str>) -> String + 'a,
        other_printer: impl Fn(&str, &str) -> String + 'a,
    ) -> Self {
        self.supergraph_printer = Box::new(supergraph_printer);
        self.other_printer = Box::new(other_printer);
        self
    }

    /// Skips the subgraph elements matching `ignore`.
    pub(crate) fn ignore(mut self, ignore: impl Fn(&T) -> bool + 'a) -> Self {
        self.ignore = Some(Box::new(ignore));
        self
    }

    /// Subgraphs without the element are bucketed under the empty value.
    pub(crate) fn include_missing_sources(mut self) -> Self {
        self.include_missing_sources = true;
        self
    }

    pub(crate) fn extra_locations(mut self, locations: Vec<SubgraphLocation>) -> Self {
        self.extra_locations = locations;
        self
    }

    pub(crate) fn no_end_of_message_dot(mut self) -> Self {
        self.no_end_of_message_dot = true;
        self
    }
}

/// Collects the errors and hints of one composition.
#[derive(Debug, Default)]
pub(crate) struct ErrorReporter {
    names: Vec<String>,
    source_maps: Vec<SourceMap>,
    errors: Vec<CompositionError>,
    hints: Vec<CompositionHint>,
}

impl ErrorReporter {
    /// `names` and `source_maps` are indexed by subgraph index.
    pub(crate) fn new(names: Vec<String>, source_maps: Vec<SourceMap>) -> Self {
        Self {
            names,
            source_maps,
            errors: vec![],
            hints: vec![],
        }
    }

    pub(crate) fn add_error(&mut self, error: CompositionError) {
        self.errors.push(error);
    }

    pub(crate) fn add_hint(&mut self, hint: CompositionHint) {
        self.hints.push(hint);
    }

    pub(crate) fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub(crate) fn into_errors_and_hints(self) -> (Vec<CompositionError>, Vec<CompositionHint>) {
        (self.errors, self.hints)
    }

    pub(crate) fn subgraph_name(&self, index: usize) -> &str {
        self.names.get(index).map(String::as_str).unwrap_or("")
    }

    /// The location of `element`, an element of the subgraph at `index`.
    pub(crate) fn location<T: SourceLocated>(
        &self,
        index: usize,
        element: &T,
    ) -> Vec<SubgraphLocation> {
        let Some(source_map) = self.source_maps.get(index) else {
            return vec![];
        };
        element
            .source_range(source_map)
            .map(|range| SubgraphLocation {
                subgraph: self.subgraph_name(index).to_string(),
                range,
            })
            .into_iter()
            .collect()
    }

    pub(crate) fn locations<T: SourceLocated>(&self, sources: &Sources<T>) -> Vec<SubgraphLocation> {
        sources
            .iter()
            .filter_map(|(index, element)| Some((*index, element.as_ref()?)))
            .flat_map(|(index, element)| self.location(index, element))
            .collect()
    }

    /// Reports an error of the form
    /// `{message}{value} in {subgraphs} but {other value} in {other subgraphs} and ...`.
    pub(crate) fn report_mismatch_error<T: SourceLocated>(
        &mut self,
        code: ErrorCode,
        message: &str,
        mismatch: Mismatch<'_, T>,
    ) {
        let Some((distribution, locations)) = self.distribution(&mismatch) else {
            return;
        };
        let (joined, _) = join_strings(
            distribution.iter(),
            JoinStringsOptions {
                separator: " and ",
                first_separator: Some(" but "),
                last_separator: Some(" and "),
                output_length_limit: usize::MAX,
            },
        );
        self.add_error(code.err(format!("{message}{joined}"), locations));
    }

    /// Like [`ErrorReporter::report_mismatch_error`], but the printers are expected to say how
    /// the first clause relates to the others.
    pub(crate) fn report_mismatch_error_with_specifics<T: SourceLocated>(
        &mut self,
        code: ErrorCode,
        message: &str,
        mismatch: Mismatch<'_, T>,
    ) {
        let Some((distribution, locations)) = self.distribution(&mismatch) else {
            return;
        };
        let message = format!("{message}{}", Self::join_distribution(&distribution));
        self.add_error(code.err(message, locations));
    }

    pub(crate) fn report_mismatch_hint<T: SourceLocated>(
        &mut self,
        code: HintCode,
        message: &str,
        mismatch: Mismatch<'_, T>,
    ) {
        let Some((distribution, locations)) = self.distribution(&mismatch) else {
            return;
        };
        let end = if mismatch.no_end_of_message_dot {
            ""
        } else {
            "."
        };
        self.add_hint(CompositionHint::new(
            code,
            format!("{message}{}{end}", Self::join_distribution(&distribution)),
            locations,
        ));
    }

    fn join_distribution(distribution: &[String]) -> String {
        let Some((first, rest)) = distribution.split_first() else {
            return String::new();
        };
        let (rest, _) = join_strings(
            rest.iter(),
            JoinStringsOptions {
                separator: " and ",
                first_separator: None,
                last_separator: Some(" and "),
                output_length_limit: usize::MAX,
            },
        );
        format!("{first}{rest}")
    }

    /// Renders every bucket of subgraphs sharing a value, starting with the bucket of the
    /// supergraph value. Returns `None` when all subgraphs agree.
    fn distribution<T: SourceLocated>(
        &self,
        mismatch: &Mismatch<'_, T>,
    ) -> Option<(Vec<String>, Vec<SubgraphLocation>)> {
        let mut buckets: IndexMap<String, Vec<&str>> = IndexMap::default();
        let mut locations = vec![];
        for (index, element) in mismatch.sources {
            let name = self.subgraph_name(*index);
            let Some(element) = element else {
                if mismatch.include_missing_sources {
                    buckets.entry(String::new()).or_default().push(name);
                }
                continue;
            };
            if mismatch.ignore.as_ref().is_some_and(|ignore| ignore(element)) {
                continue;
            }
            let value = (mismatch.accessor)(element, false).unwrap_or_default();
            buckets.entry(value).or_default().push(name);
            locations.extend(self.location(*index, element));
        }
        if buckets.len() < 2 {
            return None;
        }
        let supergraph_value = mismatch
            .supergraph_element
            .and_then(|element| (mismatch.accessor)(element, true))
            .unwrap_or_default();

        let mut distribution = vec![];
        let like_supergraph = buckets
            .get(&supergraph_value)
            .map(|names| human_readable_subgraph_names(names.iter()));
        distribution.push((mismatch.supergraph_printer)(
            &supergraph_value,
            like_supergraph.as_deref(),
        ));
        for (value, names) in &buckets {
            if *value == supergraph_value {
                continue;
            }
            distribution.push((mismatch.other_printer)(
                value,
                &human_readable_subgraph_names(names.iter()),
            ));
        }
        locations.extend(mismatch.extra_locations.iter().cloned());
        Some((distribution, locations))
    }
}

#[cfg(test)]
mod tests {
    use apollo_compiler::Schema;
    use apollo_compiler::name;
    use pretty_assertions::assert_eq;

    use super::*;

    fn reporter() -> ErrorReporter {
        ErrorReporter::new(
            vec!["A".to_string(), "B".to_string(), "C".to_string()],
            vec![],
        )
    }

    fn sources(values: &[Option<&str>]) -> Sources<Name> {
        values
            .iter()
            .enumerate()
            .map(|(index, value)| (index, value.map(Name::new_unchecked)))
            .collect()
    }

    #[test]
    fn reports_mismatch_errors() {
        let mut reporter = reporter();
        let sources = sources(&[Some("Object"), Some("Interface"), Some("Object")]);
        let supergraph = name!("Object");
        reporter.report_mismatch_error(
            ErrorCode::TypeKindMismatch,
            "Type \"T\" has mismatched kind: it is defined as ",
            Mismatch::new(Some(&supergraph), &sources, |elt, _| Some(format!("{elt} Type"))),
        );
        let (errors, hints) = reporter.into_errors_and_hints();
        assert!(hints.is_empty());
        assert_eq!(
            errors[0].message(),
            r#"Type "T" has mismatched kind: it is defined as Object Type in subgraphs "A" and "C" but Interface Type in subgraph "B""#
        );
    }

    #[test]
    fn consistent_values_are_not_reported() {
        let mut reporter = reporter();
        let sources = sources(&[Some("x"), None, Some("x")]);
        reporter.report_mismatch_error(
            ErrorCode::FieldTypeMismatch,
            "mismatch: ",
            Mismatch::new(None, &sources, |elt, _| Some(elt.to_string())),
        );
        assert!(!reporter.has_errors());
    }

    #[test]
    fn reports_mismatch_hints_with_missing_sources() {
        let mut reporter = reporter();
        let sources = sources(&[Some("V"), None, Some("V")]);
        let supergraph = name!("V");
        reporter.report_mismatch_hint(
            HintCode::InconsistentUnionMember,
            "Union type \"U\" includes member type \"V\" in some but not all defining subgraphs: ",
            Mismatch::new(Some(&supergraph), &sources, |_, _| Some("yes".to_string()))
                .printers(
                    |_, names| format!("it is defined in {}", names.unwrap_or_default()),
                    |_, names| format!(" but not in {names}"),
                )
                .include_missing_sources(),
        );
        let (_, hints) = reporter.into_errors_and_hints();
        assert_eq!(
            hints[0].message(),
            r#"Union type "U" includes member type "V" in some but not all defining subgraphs: it is defined in subgraphs "A" and "C" but not in subgraph "B"."#
        );
        assert_eq!(hints[0].hint_code(), HintCode::InconsistentUnionMember);
    }

    #[test]
    fn locates_elements_in_their_subgraph() {
        let schema = Schema::parse("type Query {\n  x: Int\n}\n", "a.graphql").unwrap();
        let reporter = ErrorReporter::new(vec!["A".to_string()], vec![schema.sources.clone()]);
        let query = &schema.types["Query"];
        let locations = reporter.location(0, query);
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].subgraph, "A");
        assert_eq!(locations[0].range.start.line, 1);
    }
}
