mod compose_directive;
mod compose_inaccessible;
mod compose_tag;
mod compose_validation;
mod demand_control;
mod directive_argument_merge_strategies;
mod external;
mod interface_object;
mod override_directive;
mod satisfiability;
mod supergraph_reversibility;

pub(crate) mod test_helpers {
    use apollo_composition::CompositionOptions;
    use apollo_composition::compose_with_options;
    use apollo_composition::error::CompositionError;
    use apollo_composition::subgraph::Raw;
    use apollo_composition::subgraph::Subgraph;
    use apollo_composition::supergraph::Satisfiable;
    use apollo_composition::supergraph::Supergraph;

    pub(crate) struct ServiceDefinition<'a> {
        pub(crate) name: &'a str,
        pub(crate) type_defs: &'a str,
    }

    /// Composes a set of subgraphs as if they had the latest federation 2 spec link in them.
    /// Also, all federation directives are automatically imported.
    pub(crate) fn compose_as_fed2_subgraphs(
        service_list: &[ServiceDefinition<'_>],
    ) -> Result<Supergraph<Satisfiable>, Vec<CompositionError>> {
        compose_as_fed2_subgraphs_with_options(service_list, &CompositionOptions::default())
    }

    pub(crate) fn compose_as_fed2_subgraphs_with_options(
        service_list: &[ServiceDefinition<'_>],
        options: &CompositionOptions,
    ) -> Result<Supergraph<Satisfiable>, Vec<CompositionError>> {
        let mut subgraphs = Vec::new();
        let mut errors = Vec::new();
        for service in service_list {
            let result = Subgraph::parse(
                service.name,
                &format!("http://{}", service.name),
                service.type_defs,
            );
            match result {
                Ok(subgraph) => {
                    subgraphs.push(subgraph);
                }
                Err(err) => {
                    errors.extend(err.to_composition_errors());
                }
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let mut fed2_subgraphs: Vec<Subgraph<Raw>> = Vec::new();
        for subgraph in subgraphs {
            match subgraph.into_fed2_subgraph() {
                Ok(subgraph) => fed2_subgraphs.push(subgraph),
                Err(err) => errors.extend(err.to_composition_errors()),
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        compose_with_options(fed2_subgraphs, options)
    }

    /// The `(code, message)` of every error of a failed composition.
    pub(crate) fn errors<S>(
        result: &Result<Supergraph<S>, Vec<CompositionError>>,
    ) -> Vec<(String, String)> {
        match result {
            Ok(_) => panic!("Expected an error, but got a successful composition"),
            Err(err) => err
                .iter()
                .map(|e| (e.code().code().to_string(), e.to_string()))
                .collect(),
        }
    }

    /// The `(code, message)` of every hint of a successful composition.
    pub(crate) fn hints(
        result: &Result<Supergraph<Satisfiable>, Vec<CompositionError>>,
    ) -> Vec<(String, String)> {
        match result {
            Ok(supergraph) => supergraph
                .hints()
                .iter()
                .map(|h| (h.code().to_string(), h.message().to_string()))
                .collect(),
            Err(errors) => panic!("Expected a successful composition, but got {errors:?}"),
        }
    }
}

pub(crate) use test_helpers::ServiceDefinition;
pub(crate) use test_helpers::compose_as_fed2_subgraphs;
pub(crate) use test_helpers::compose_as_fed2_subgraphs_with_options;
pub(crate) use test_helpers::errors;
pub(crate) use test_helpers::hints;
