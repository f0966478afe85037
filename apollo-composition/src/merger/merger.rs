use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::ast::OperationType;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::name;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::ComponentName;
use apollo_compiler::schema::EnumType;
use apollo_compiler::schema::EnumValueDefinition;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::InputObjectType;
use apollo_compiler::schema::InterfaceType;
use apollo_compiler::schema::ObjectType;
use apollo_compiler::schema::ScalarType;
use apollo_compiler::schema::UnionType;
use apollo_compiler::validation::Valid;
use tracing::debug;
use tracing::trace;

use crate::error::CompositionError;
use crate::error::ErrorCode;
use crate::error::FederationError;
use crate::internal_error;
use crate::link::DEFAULT_LINK_NAME;
use crate::link::Import;
use crate::link::Link;
use crate::link::Purpose;
use crate::link::federation_spec_definition::FEDERATION_FIELDS_ARGUMENT_NAME;
use crate::link::feature_registry::DirectiveComposition;
use crate::link::feature_registry::DirectiveSpecification;
use crate::link::feature_registry::FeatureRegistry;
use crate::link::join_spec_definition::JOIN_GRAPH_ENUM_NAME;
use crate::link::join_spec_definition::JoinSpec;
use crate::link::join_spec_definition::join_version_for_federation_version;
use crate::link::link_spec_definition::LINK_VERSION;
use crate::link::link_spec_definition::link_directive;
use crate::link::spec::Identity;
use crate::link::spec::Url;
use crate::link::spec::Version;
use crate::merger::Sources;
use crate::merger::compose_directive_manager::ComposeDirectiveManager;
use crate::merger::error_reporter::ErrorReporter;
use crate::merger::error_reporter::Mismatch;
use crate::merger::hints::HintCode;
use crate::merger::merge_enum::EnumTypeUsage;
use crate::schema::applied_directive_names;
use crate::schema::directive_optional_string_argument;
use crate::schema::field_set::FieldSetError;
use crate::schema::field_set::field_definition;
use crate::schema::field_set::parse_field_set;
use crate::schema::field_set::validate_field_set;
use crate::schema::is_composite_type;
use crate::schema::type_kind_description;
use crate::subgraph::Subgraph;
use crate::subgraph::Validated;
use crate::supergraph::CompositionHint;
use crate::utils::human_readable::human_readable_subgraph_names;

/// Directives that are always copied from subgraphs to the supergraph.
const BUILT_IN_MERGED_DIRECTIVES: [Name; 2] = [name!("deprecated"), name!("specifiedBy")];

/// A directive of a registered feature whose applications reach the supergraph.
#[derive(Debug, Clone)]
pub(crate) struct MergedDirectiveInfo {
    pub(crate) specification: DirectiveSpecification,
    /// Applications are recorded as `@join__directive` instead of being merged.
    pub(crate) as_join_directive: bool,
}

/// What a merge produces. The supergraph is only present when merging raised no error.
#[derive(Debug)]
pub(crate) struct MergeResult {
    pub(crate) supergraph: Option<Valid<Schema>>,
    pub(crate) errors: Vec<CompositionError>,
    pub(crate) hints: Vec<CompositionHint>,
}

pub(crate) struct Merger {
    pub(super) subgraphs: Vec<Subgraph<Validated>>,
    pub(super) names: Vec<String>,
    pub(super) registry: FeatureRegistry,
    pub(super) error_reporter: ErrorReporter,
    pub(super) merged: Schema,
    pub(super) compose_directive_manager: ComposeDirectiveManager,
    pub(super) join_spec: JoinSpec,
    /// The `join__Graph` value of each subgraph.
    pub(super) join_spec_names: Vec<Name>,
    pub(super) latest_federation_version_used: Version,
    /// Directives of registered features reaching the supergraph, by name in the supergraph.
    pub(super) merged_federation_directives: IndexMap<Name, MergedDirectiveInfo>,
    /// For each subgraph, the directives whose applications are copied to the supergraph, as
    /// name in the subgraph to name in the supergraph.
    pub(super) directive_names_in_supergraph: Vec<IndexMap<Name, Name>>,
    pub(super) enum_usages: IndexMap<Name, EnumTypeUsage>,
    /// The types merged from subgraphs, as opposed to the ones coming from linked features.
    pub(super) merged_type_names: IndexSet<Name>,
    /// Executable directive definitions kept in the supergraph.
    pub(super) merged_executable_directives: IndexSet<Name>,
}

impl Merger {
    pub(crate) fn new(subgraphs: Vec<Subgraph<Validated>>, registry: &FeatureRegistry) -> Self {
        let names: Vec<String> = subgraphs.iter().map(|s| s.name.clone()).collect();
        let source_maps = subgraphs
            .iter()
            .map(|s| s.schema().sources.clone())
            .collect();
        let mut error_reporter = ErrorReporter::new(names.clone(), source_maps);

        let latest_federation_version_used = subgraphs
            .iter()
            .map(|s| s.metadata().federation_version())
            .max()
            .unwrap_or(Version::new(2, 0));
        for subgraph in &subgraphs {
            let linked = subgraph.metadata().linked_federation_version();
            let implied = subgraph.metadata().federation_version();
            if implied > linked {
                error_reporter.add_hint(CompositionHint::new(
                    HintCode::ImplicitlyUpgradedFederationVersion,
                    format!(
                        "Subgraph {} has been implicitly upgraded from federation v{linked} to v{implied}",
                        subgraph.name
                    ),
                    vec![],
                ));
            }
        }
        let join_spec = JoinSpec {
            version: join_version_for_federation_version(latest_federation_version_used),
        };
        let join_spec_names = join_graph_enum_values(&names);
        let subgraph_count = subgraphs.len();

        let mut merger = Self {
            subgraphs,
            names,
            registry: registry.clone(),
            error_reporter,
            merged: Schema::new(),
            compose_directive_manager: ComposeDirectiveManager::new(),
            join_spec,
            join_spec_names,
            latest_federation_version_used,
            merged_federation_directives: Default::default(),
            directive_names_in_supergraph: vec![Default::default(); subgraph_count],
            enum_usages: Default::default(),
            merged_type_names: Default::default(),
            merged_executable_directives: Default::default(),
        };
        merger.collect_merged_federation_directives();
        merger
    }

    #[cfg_attr(
        feature = "snapshot_tracing",
        tracing::instrument(level = "trace", skip_all, name = "Merger::merge")
    )]
    pub(crate) fn merge(mut self) -> MergeResult {
        self.compose_directive_manager
            .validate(&self.subgraphs, &mut self.error_reporter);
        if self.error_reporter.has_errors() {
            return self.into_result(None);
        }

        if let Err(error) = self.merge_into_supergraph() {
            self.error_reporter.add_error(error.into());
        }
        if self.error_reporter.has_errors() {
            return self.into_result(None);
        }

        match std::mem::replace(&mut self.merged, Schema::new()).validate() {
            Ok(supergraph) => {
                debug!(
                    subgraphs = self.subgraphs.len(),
                    types = supergraph.types.len(),
                    "merged supergraph"
                );
                self.into_result(Some(supergraph))
            }
            Err(with_errors) => {
                for diagnostic in with_errors.errors.iter() {
                    self.error_reporter.add_error(ErrorCode::InvalidGraphql.err(
                        format!("[supergraph] {}", diagnostic.error),
                        vec![],
                    ));
                }
                self.into_result(None)
            }
        }
    }

    fn into_result(self, supergraph: Option<Valid<Schema>>) -> MergeResult {
        let (errors, hints) = self.error_reporter.into_errors_and_hints();
        MergeResult {
            supergraph,
            errors,
            hints,
        }
    }

    fn merge_into_supergraph(&mut self) -> Result<(), FederationError> {
        self.prepare_supergraph()?;
        self.add_core_features()?;
        self.add_types_shallow();
        self.merge_implements()?;

        let type_names: Vec<(Name, ExtendedType)> = self
            .merged
            .types
            .iter()
            .filter(|(name, _)| self.merged_type_names.contains(*name))
            .map(|(name, type_)| (name.clone(), type_.clone()))
            .collect();
        for (name, type_) in &type_names {
            if let ExtendedType::Union(_) = type_ {
                self.merge_union(name)?;
            }
        }
        self.merge_schema_definition()?;
        for (name, type_) in &type_names {
            match type_ {
                ExtendedType::Scalar(_) => self.merge_scalar(name)?,
                ExtendedType::InputObject(_) => self.merge_input(name)?,
                _ => {}
            }
        }
        for (name, type_) in &type_names {
            match type_ {
                ExtendedType::Object(_) => self.merge_object(name)?,
                ExtendedType::Interface(_) => self.merge_interface(name)?,
                _ => {}
            }
        }
        self.merge_directive_definitions()?;
        self.collect_enum_usages();
        for (name, type_) in &type_names {
            if let ExtendedType::Enum(_) = type_ {
                self.merge_enum(name)?;
            }
        }

        self.validate_query_root();
        self.merge_descriptions_and_applied_directives()?;
        self.add_missing_interface_object_fields_to_implementations()?;
        if !self.error_reporter.has_errors() {
            self.post_merge_validations()?;
        }
        Ok(())
    }

    /// Links the `link` and `join` features and defines one `join__Graph` value per subgraph.
    fn prepare_supergraph(&mut self) -> Result<(), FederationError> {
        let link_link = Link::new(Url {
            identity: Identity::link_identity(),
            version: LINK_VERSION,
        });
        let join_link = Link::new(Url {
            identity: Identity::join_identity(),
            version: self.join_spec.version,
        });
        let schema_definition = self.merged.schema_definition.make_mut();
        schema_definition.directives.push(Component::new(link_directive(
            &DEFAULT_LINK_NAME,
            &link_link.url,
            &[],
            None,
        )));
        schema_definition.directives.push(Component::new(link_directive(
            &DEFAULT_LINK_NAME,
            &join_link.url,
            &[],
            Some(Purpose::Execution),
        )));

        for link in [&link_link, &join_link] {
            let feature = self
                .registry
                .get(&link.url.identity)
                .ok_or_else(|| internal_error!("Unregistered feature {}", link.url))?;
            feature.add_definitions_to(&mut self.merged, link);
        }

        let Some(ExtendedType::Enum(graph_enum)) = self.merged.types.get_mut(&JOIN_GRAPH_ENUM_NAME)
        else {
            return Err(internal_error!("Missing {JOIN_GRAPH_ENUM_NAME} enum"));
        };
        let graph_enum = graph_enum.make_mut();
        for (index, subgraph) in self.subgraphs.iter().enumerate() {
            let value = self.join_spec_names[index].clone();
            graph_enum.values.insert(
                value.clone(),
                Component::new(EnumValueDefinition {
                    description: None,
                    value,
                    directives: ast::DirectiveList(vec![Node::new(
                        self.join_spec.graph_directive(&subgraph.name, &subgraph.url),
                    )]),
                }),
            );
        }
        Ok(())
    }

    /// Finds the directives of registered features applied in subgraphs, and which supergraph
    /// directive each subgraph name stands for.
    fn collect_merged_federation_directives(&mut self) {
        for (index, subgraph) in self.subgraphs.iter().enumerate() {
            let applied = applied_directive_names(subgraph.schema());
            let links = subgraph.metadata().links();
            for feature in self.registry.iter() {
                let link = if feature.identity == Identity::federation_identity() {
                    Some(Arc::clone(subgraph.metadata().federation_link()))
                } else {
                    links.for_identity(&feature.identity)
                };
                let Some(link) = link else {
                    continue;
                };
                for spec in feature.directives_at(link.url.version) {
                    let as_join_directive = match &spec.composition {
                        DirectiveComposition::None => continue,
                        DirectiveComposition::Merged { .. } => false,
                        DirectiveComposition::JoinDirective => true,
                    };
                    let name_in_subgraph = link.directive_name_in_schema(&spec.name);
                    if !applied.contains(&name_in_subgraph) {
                        continue;
                    }
                    let specification = self.supergraph_specification(spec);
                    let name_in_supergraph = specification.name.clone();
                    self.directive_names_in_supergraph[index]
                        .insert(name_in_subgraph, name_in_supergraph.clone());
                    self.merged_federation_directives
                        .entry(name_in_supergraph)
                        .or_insert(MergedDirectiveInfo {
                            specification,
                            as_join_directive,
                        });
                }
            }
            for name in BUILT_IN_MERGED_DIRECTIVES {
                self.directive_names_in_supergraph[index].insert(name.clone(), name);
            }
        }
    }

    /// The specification of a merged directive in the feature it is linked from in supergraphs.
    fn supergraph_specification(&self, spec: &DirectiveSpecification) -> DirectiveSpecification {
        match &spec.composition {
            DirectiveComposition::Merged { supergraph_feature } => self
                .registry
                .get(&supergraph_feature.identity)
                .and_then(|feature| feature.directive_spec(&spec.name))
                .cloned()
                .unwrap_or_else(|| spec.clone()),
            _ => spec.clone(),
        }
    }

    /// Links the features of merged directives and of `@composeDirective` directives, and adds
    /// the definitions of the merged directives.
    fn add_core_features(&mut self) -> Result<(), FederationError> {
        let mut by_feature: IndexMap<Url, Vec<DirectiveSpecification>> = IndexMap::default();
        for info in self.merged_federation_directives.values() {
            if info.as_join_directive {
                continue;
            }
            let DirectiveComposition::Merged { supergraph_feature } =
                &info.specification.composition
            else {
                continue;
            };
            by_feature
                .entry(supergraph_feature.clone())
                .or_default()
                .push(info.specification.clone());
        }

        for (url, specs) in by_feature {
            let feature = self
                .registry
                .get(&url.identity)
                .ok_or_else(|| internal_error!("Unregistered feature {url}"))?;
            let mut link = Link::new(url.clone());
            link.purpose = feature.purpose;
            let imports: Vec<Name> = specs
                .iter()
                .filter(|spec| spec.name != url.identity.name)
                .map(|spec| spec.name.clone())
                .collect();
            link.imports = imports
                .iter()
                .map(|name| {
                    Arc::new(Import {
                        element: name.clone(),
                        is_directive: true,
                        alias: None,
                    })
                })
                .collect();
            self.merged
                .schema_definition
                .make_mut()
                .directives
                .push(Component::new(link_directive(
                    &DEFAULT_LINK_NAME,
                    &url,
                    &imports,
                    feature.purpose,
                )));
            for type_spec in feature.types_at(url.version) {
                let definition = feature.type_definition(type_spec, Some(&link));
                self.merged
                    .types
                    .entry(definition.name().clone())
                    .or_insert(definition);
            }
            for spec in &specs {
                let definition = feature.directive_definition(spec, Some(&link), url.version);
                self.merged
                    .directive_definitions
                    .insert(definition.name.clone(), definition);
            }
            trace!(feature = %url, directives = specs.len(), "linked merged feature");
        }

        for (link, directives) in self.compose_directive_manager.all_composed_core_features() {
            let application = custom_link_directive(&link, &directives);
            self.merged
                .schema_definition
                .make_mut()
                .directives
                .push(Component::new(application));
        }
        for (index, subgraph) in self.subgraphs.iter().enumerate() {
            for name in applied_directive_names(subgraph.schema()) {
                if self
                    .compose_directive_manager
                    .should_compose_directive(index, &name)
                {
                    self.directive_names_in_supergraph[index].insert(name.clone(), name);
                }
            }
        }
        Ok(())
    }

    /// Adds every merged type, without its content, checking all subgraphs agree on its kind.
    fn add_types_shallow(&mut self) {
        let mut mismatched: IndexSet<Name> = IndexSet::default();
        let mut interface_objects: IndexMap<Name, bool> = IndexMap::default();
        for subgraph in &self.subgraphs {
            for (name, type_) in &subgraph.schema().types {
                if !Self::is_merged_type(&self.registry, subgraph, name, type_) {
                    continue;
                }
                let is_interface_object = subgraph.metadata().is_interface_object(name);
                let expected = if is_interface_object {
                    empty_interface(name)
                } else {
                    empty_type_like(type_)
                };
                match self.merged.types.get(name) {
                    Some(existing) => {
                        if std::mem::discriminant(existing) != std::mem::discriminant(&expected)
                        {
                            mismatched.insert(name.clone());
                        }
                    }
                    None => {
                        self.merged.types.insert(name.clone(), expected);
                        self.merged_type_names.insert(name.clone());
                    }
                }
                let all_interface_objects = interface_objects.entry(name.clone()).or_insert(true);
                *all_interface_objects &= is_interface_object;
            }
        }

        for name in mismatched {
            let sources: Sources<ExtendedType> = self
                .subgraphs
                .iter()
                .enumerate()
                .filter_map(|(index, subgraph)| {
                    Some((index, Some(subgraph.schema().types.get(&name)?.clone())))
                })
                .collect();
            let interface_object_subgraphs: IndexSet<usize> = self
                .subgraphs
                .iter()
                .enumerate()
                .filter(|(_, subgraph)| subgraph.metadata().is_interface_object(&name))
                .map(|(index, _)| index)
                .collect();
            let Some(supergraph_type) = self.merged.types.get(&name).cloned() else {
                continue;
            };
            // The accessor cannot tell interface objects apart, so pre-compute descriptions.
            let descriptions: IndexMap<usize, &str> = sources
                .iter()
                .filter_map(|(index, type_)| {
                    let type_ = type_.as_ref()?;
                    Some((
                        *index,
                        if interface_object_subgraphs.contains(index) {
                            "Interface Object Type (Object Type with @interfaceObject)"
                        } else {
                            type_kind_description(type_)
                        },
                    ))
                })
                .collect();
            let kinds: Sources<KindedType> = sources
                .iter()
                .map(|(index, type_)| {
                    (
                        *index,
                        type_.as_ref().map(|type_| KindedType {
                            type_: type_.clone(),
                            kind: descriptions.get(index).copied().unwrap_or_default(),
                        }),
                    )
                })
                .collect();
            let supergraph = KindedType {
                kind: type_kind_description(&supergraph_type),
                type_: supergraph_type,
            };
            self.error_reporter.report_mismatch_error(
                ErrorCode::TypeKindMismatch,
                &format!("Type \"{name}\" has mismatched kind: it is defined as "),
                Mismatch::new(Some(&supergraph), &kinds, |type_, _| {
                    Some(type_.kind.to_string())
                }),
            );
        }

        for (name, all_interface_objects) in interface_objects {
            if !all_interface_objects {
                continue;
            }
            let subgraphs = self
                .subgraphs
                .iter()
                .filter(|s| s.metadata().is_interface_object(&name))
                .map(|s| s.name.as_str());
            let locations = self
                .subgraphs
                .iter()
                .enumerate()
                .filter_map(|(index, s)| Some((index, s.schema().types.get(&name)?)))
                .flat_map(|(index, type_)| self.error_reporter.location(index, type_))
                .collect();
            self.error_reporter.add_error(ErrorCode::InterfaceObjectUsageError.err(
                format!(
                    "Type \"{name}\" is declared with @interfaceObject in all the subgraphs in which it is defined (it is defined in {} but should be defined as an interface in at least one subgraph)",
                    human_readable_subgraph_names(subgraphs)
                ),
                locations,
            ));
        }
    }

    /// Whether the type is merged, rather than defined by a registered feature or part of
    /// federation's own subgraph plumbing.
    fn is_merged_type(
        registry: &FeatureRegistry,
        subgraph: &Subgraph<Validated>,
        name: &Name,
        type_: &ExtendedType,
    ) -> bool {
        if type_.is_built_in()
            || name.starts_with("link__")
            || ["_Any", "_Service", "_Entity"].contains(&name.as_str())
        {
            return false;
        }
        subgraph
            .metadata()
            .links()
            .source_link_of_type(name)
            .is_none_or(|linked| registry.get(&linked.link.url.identity).is_none())
    }

    /// Copies the interfaces each subgraph declares an object or interface implements, recording
    /// the subgraphs in `@join__implements`.
    fn merge_implements(&mut self) -> Result<(), FederationError> {
        for name in self.merged_type_names.clone() {
            let mut implemented: Vec<(usize, Name)> = vec![];
            for (index, subgraph) in self.subgraphs.iter().enumerate() {
                let interfaces = match subgraph.schema().types.get(&name) {
                    Some(ExtendedType::Object(object)) => &object.implements_interfaces,
                    Some(ExtendedType::Interface(interface)) => &interface.implements_interfaces,
                    _ => continue,
                };
                implemented.extend(interfaces.iter().map(|itf| (index, itf.name.clone())));
            }
            if implemented.is_empty() {
                continue;
            }
            let join_spec = self.join_spec;
            let directives: Vec<_> = implemented
                .iter()
                .map(|(index, itf)| {
                    join_spec.implements_directive(&self.join_spec_names[*index], itf)
                })
                .collect();
            match self.merged.types.get_mut(&name) {
                Some(ExtendedType::Object(object)) => {
                    let object = object.make_mut();
                    for (_, itf) in &implemented {
                        object
                            .implements_interfaces
                            .insert(ComponentName::from(itf.clone()));
                    }
                    for directive in directives {
                        object.directives.push(Component::new(directive));
                    }
                }
                Some(ExtendedType::Interface(interface)) => {
                    let interface = interface.make_mut();
                    for (_, itf) in &implemented {
                        interface
                            .implements_interfaces
                            .insert(ComponentName::from(itf.clone()));
                    }
                    for directive in directives {
                        interface.directives.push(Component::new(directive));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Sets the root operation types used by any subgraph. Subgraph roots have their default
    /// names at this point.
    fn merge_schema_definition(&mut self) -> Result<(), FederationError> {
        for operation in [
            OperationType::Query,
            OperationType::Mutation,
            OperationType::Subscription,
        ] {
            let root = self.subgraphs.iter().find_map(|subgraph| {
                let definition = &subgraph.schema().schema_definition;
                match operation {
                    OperationType::Query => definition.query.clone(),
                    OperationType::Mutation => definition.mutation.clone(),
                    OperationType::Subscription => definition.subscription.clone(),
                }
            });
            let Some(root) = root else {
                continue;
            };
            if !self.merged.types.contains_key(&root.name) {
                continue;
            }
            let root = Some(ComponentName::from(root.name.clone()));
            let definition = self.merged.schema_definition.make_mut();
            match operation {
                OperationType::Query => definition.query = root,
                OperationType::Mutation => definition.mutation = root,
                OperationType::Subscription => definition.subscription = root,
            }
        }
        Ok(())
    }

    pub(super) fn is_root_type(&self, name: &Name) -> bool {
        let definition = &self.merged.schema_definition;
        [
            &definition.query,
            &definition.mutation,
            &definition.subscription,
        ]
        .into_iter()
        .flatten()
        .any(|root| root.name == *name)
    }

    fn validate_query_root(&mut self) {
        let has_query = self
            .merged
            .schema_definition
            .query
            .as_ref()
            .is_some_and(|query| self.merged.types.contains_key(&query.name));
        if !has_query {
            self.error_reporter.add_error(ErrorCode::NoQueries.err(
                "No queries found in any subgraph: a supergraph must have a query root type.",
                vec![],
            ));
        }
    }

    /// Adds to object types the fields of their interfaces that no subgraph defines on them but
    /// that some subgraph resolves through an `@interfaceObject`. Those fields get a
    /// `@join__field` without graph.
    fn add_missing_interface_object_fields_to_implementations(
        &mut self,
    ) -> Result<(), FederationError> {
        let mut additions = vec![];
        for (type_name, type_) in &self.merged.types {
            let ExtendedType::Object(object) = type_ else {
                continue;
            };
            for itf in &object.implements_interfaces {
                let Some(ExtendedType::Interface(interface)) = self.merged.types.get(&itf.name)
                else {
                    continue;
                };
                for (field_name, field) in &interface.fields {
                    if object.fields.contains_key(field_name)
                        || !self.is_field_provided_by_an_interface_object(field_name, &itf.name)
                    {
                        continue;
                    }
                    additions.push((type_name.clone(), field.clone()));
                }
            }
        }
        for (type_name, field) in additions {
            let Some(ExtendedType::Object(object)) = self.merged.types.get_mut(&type_name) else {
                continue;
            };
            let mut field = (**field).clone();
            field.description = None;
            field.directives = ast::DirectiveList(vec![Node::new(
                self.join_spec.field_directive(&Default::default()),
            )]);
            for argument in field.arguments.iter_mut() {
                let argument = argument.make_mut();
                argument.description = None;
                argument.directives = Default::default();
            }
            object
                .make_mut()
                .fields
                .entry(field.name.clone())
                .or_insert_with(|| Component::new(field));
        }
        Ok(())
    }

    pub(super) fn is_field_provided_by_an_interface_object(
        &self,
        field_name: &Name,
        interface_name: &Name,
    ) -> bool {
        self.subgraphs.iter().any(|subgraph| {
            let metadata = subgraph.metadata();
            metadata.is_interface_object(interface_name)
                && field_definition(subgraph.schema(), interface_name, field_name).is_some()
                && !metadata.is_external(interface_name, field_name)
        })
    }

    /// Checks what can only be checked on the whole supergraph: interface fields are
    /// implemented, and every `@requires` still selects valid fields.
    fn post_merge_validations(&mut self) -> Result<(), FederationError> {
        let mut errors = vec![];
        for (type_name, type_) in &self.merged.types {
            let (fields, implements) = match type_ {
                ExtendedType::Object(object) => (&object.fields, &object.implements_interfaces),
                ExtendedType::Interface(interface) => {
                    (&interface.fields, &interface.implements_interfaces)
                }
                _ => continue,
            };
            for itf in implements {
                let Some(ExtendedType::Interface(interface)) = self.merged.types.get(&itf.name)
                else {
                    continue;
                };
                for field_name in interface.fields.keys() {
                    if fields.contains_key(field_name) {
                        continue;
                    }
                    let with_field: Vec<usize> = (0..self.subgraphs.len())
                        .filter(|index| {
                            field_definition(self.subgraphs[*index].schema(), &itf.name, field_name)
                                .is_some()
                        })
                        .collect();
                    let implementing: Vec<usize> = (0..self.subgraphs.len())
                        .filter(|index| {
                            match self.subgraphs[*index].schema().types.get(type_name) {
                                Some(ExtendedType::Object(o)) => {
                                    o.implements_interfaces.contains(&itf.name)
                                }
                                Some(ExtendedType::Interface(i)) => {
                                    i.implements_interfaces.contains(&itf.name)
                                }
                                _ => false,
                            }
                        })
                        .collect();
                    let mut locations = vec![];
                    for index in &with_field {
                        if let Some(field) =
                            field_definition(self.subgraphs[*index].schema(), &itf.name, field_name)
                        {
                            locations.extend(self.error_reporter.location(*index, field));
                        }
                    }
                    for index in &implementing {
                        if let Some(type_) = self.subgraphs[*index].schema().types.get(type_name) {
                            locations.extend(self.error_reporter.location(*index, type_));
                        }
                    }
                    errors.push(ErrorCode::InterfaceFieldNoImplem.err(
                        format!(
                            "Interface field \"{}.{field_name}\" is declared in {} but type \"{type_name}\", which implements \"{}\" only in {} does not have field \"{field_name}\".",
                            itf.name,
                            self.subgraph_names_of(&with_field),
                            itf.name,
                            self.subgraph_names_of(&implementing),
                        ),
                        locations,
                    ));
                }
            }
        }

        for (index, subgraph) in self.subgraphs.iter().enumerate() {
            let requires_name = &subgraph.metadata().directive_names().requires;
            for (type_name, type_) in &subgraph.schema().types {
                let fields = match type_ {
                    ExtendedType::Object(object) => &object.fields,
                    ExtendedType::Interface(interface) => &interface.fields,
                    _ => continue,
                };
                for (field_name, field) in fields {
                    for requires in field.directives.get_all(requires_name) {
                        if !is_composite_type(&self.merged, type_name) {
                            return Err(internal_error!(
                                "Merged type {type_name} should exist and be composite"
                            ));
                        }
                        let Some(selection) = directive_optional_string_argument(
                            requires,
                            &FEDERATION_FIELDS_ARGUMENT_NAME,
                        )?
                        else {
                            continue;
                        };
                        let selections = parse_field_set(selection)
                            .map_err(|e| internal_error!("Invalid @requires selection: {e}"))?;
                        let Err(error) = validate_field_set(&self.merged, type_name, &selections)
                        else {
                            continue;
                        };
                        let (coordinate, argument, is_missing) = match &error {
                            FieldSetError::UnknownArgument { field, argument } => {
                                (field.as_str(), argument.as_str(), true)
                            }
                            FieldSetError::MissingMandatoryArgument { field, argument } => {
                                (field.as_str(), argument.as_str(), false)
                            }
                            _ => {
                                return Err(internal_error!(
                                    "Unexpected error for {} evaluated on the supergraph: {error}",
                                    requires.serialize()
                                ));
                            }
                        };
                        let incompatible: Vec<usize> = self
                            .subgraphs
                            .iter()
                            .enumerate()
                            .filter(|(other, _)| *other != index)
                            .filter(|(_, other)| {
                                let Some((parent, name)) = coordinate.split_once('.') else {
                                    return false;
                                };
                                let Some(field) = field_definition(other.schema(), parent, name)
                                else {
                                    return false;
                                };
                                let other_argument =
                                    field.arguments.iter().find(|a| a.name == argument);
                                if is_missing {
                                    other_argument.is_none()
                                } else {
                                    other_argument.is_some_and(|a| {
                                        a.ty.is_non_null() && a.default_value.is_none()
                                    })
                                }
                            })
                            .map(|(other, _)| other)
                            .collect();
                        let mut locations = self.error_reporter.location(index, field);
                        if let Some((parent, name)) = coordinate.split_once('.') {
                            for other in &incompatible {
                                if let Some(field) =
                                    field_definition(self.subgraphs[*other].schema(), parent, name)
                                {
                                    locations.extend(self.error_reporter.location(*other, field));
                                }
                            }
                        }
                        let subgraphs = self.subgraph_names_of(&incompatible);
                        let reason = if is_missing {
                            format!(
                                "cannot provide a value for argument \"{argument}\" of field \"{coordinate}\" as argument \"{argument}\" is not defined in {subgraphs}"
                            )
                        } else {
                            format!(
                                "no value provided for argument \"{argument}\" of field \"{coordinate}\" but a value is mandatory as \"{argument}\" is required in {subgraphs}"
                            )
                        };
                        errors.push(ErrorCode::RequiresInvalidFields.err(
                            format!(
                                "[{}] On field \"{type_name}.{field_name}\", for {}: {reason}",
                                subgraph.name,
                                requires.serialize(),
                            ),
                            locations,
                        ));
                    }
                }
            }
        }
        for error in errors {
            self.error_reporter.add_error(error);
        }
        Ok(())
    }

    pub(super) fn subgraph_names_of(&self, indices: &[usize]) -> String {
        human_readable_subgraph_names(indices.iter().map(|index| self.names[*index].as_str()))
    }

    /// The definitions of a type in the subgraphs defining it with the given kind. Interfaces
    /// also accept objects marked `@interfaceObject`.
    pub(super) fn type_sources(&self, name: &Name) -> Sources<ExtendedType> {
        let merged_kind = self.merged.types.get(name).map(std::mem::discriminant);
        self.subgraphs
            .iter()
            .enumerate()
            .filter_map(|(index, subgraph)| {
                let type_ = subgraph.schema().types.get(name)?;
                let is_interface_object = subgraph.metadata().is_interface_object(name);
                let kind = if is_interface_object {
                    std::mem::discriminant(&empty_interface(name))
                } else {
                    std::mem::discriminant(type_)
                };
                (Some(kind) == merged_kind).then(|| (index, Some(type_.clone())))
            })
            .collect()
    }

    pub(super) fn is_external(&self, index: usize, type_name: &Name, field_name: &Name) -> bool {
        self.subgraphs[index]
            .metadata()
            .is_external(type_name, field_name)
    }

    /// The name of `@inaccessible` in the subgraph, if its applications reach the supergraph.
    pub(super) fn inaccessible_name_in(&self, index: usize) -> Option<&Name> {
        self.directive_names_in_supergraph[index]
            .iter()
            .find(|(_, in_supergraph)| in_supergraph.as_str() == "inaccessible")
            .map(|(in_subgraph, _)| in_subgraph)
    }
}

/// Pairs a type with the kind it is described as in type kind mismatch errors.
#[derive(Clone)]
struct KindedType {
    type_: ExtendedType,
    kind: &'static str,
}

impl crate::merger::error_reporter::SourceLocated for KindedType {
    fn source_range(
        &self,
        sources: &apollo_compiler::parser::SourceMap,
    ) -> Option<std::ops::Range<apollo_compiler::parser::LineColumn>> {
        self.type_.source_range(sources)
    }
}

/// Builds the `@link` of a non-Apollo feature with composed directives, importing them under
/// their supergraph name.
fn custom_link_directive(
    link: &Link,
    directives: &IndexMap<Name, Name>,
) -> apollo_compiler::ast::Directive {
    use apollo_compiler::ast::Argument;
    use apollo_compiler::ast::Value;

    let imports = directives
        .iter()
        .map(|(original, in_supergraph)| {
            if original == in_supergraph {
                Node::new(Value::String(format!("@{original}")))
            } else {
                Node::new(Value::Object(vec![
                    (name!("name"), Node::new(Value::String(format!("@{original}")))),
                    (name!("as"), Node::new(Value::String(format!("@{in_supergraph}")))),
                ]))
            }
        })
        .collect();
    apollo_compiler::ast::Directive {
        name: DEFAULT_LINK_NAME,
        arguments: vec![
            Node::new(Argument {
                name: name!("url"),
                value: Node::new(Value::String(link.url.to_string())),
            }),
            Node::new(Argument {
                name: name!("import"),
                value: Node::new(Value::List(imports)),
            }),
        ],
    }
}

/// The `join__Graph` values: upper-cased subgraph names, deduplicated with a numeric suffix.
pub(crate) fn join_graph_enum_values(names: &[String]) -> Vec<Name> {
    let mut used: IndexMap<String, usize> = IndexMap::default();
    let mut values = vec![];
    for name in names {
        let mut value: String = name
            .to_uppercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        if value.starts_with(|c: char| c.is_ascii_digit()) || value.is_empty() {
            value.insert(0, '_');
        }
        let count = used.entry(value.clone()).or_default();
        *count += 1;
        if *count > 1 {
            value = format!("{value}_{}", *count - 1);
        }
        values.push(Name::new_unchecked(&value));
    }
    values
}

fn empty_interface(name: &Name) -> ExtendedType {
    ExtendedType::Interface(Node::new(InterfaceType {
        description: None,
        name: name.clone(),
        implements_interfaces: Default::default(),
        directives: Default::default(),
        fields: Default::default(),
    }))
}

/// A type of the same kind and name as `type_`, without content.
fn empty_type_like(type_: &ExtendedType) -> ExtendedType {
    let name = type_.name().clone();
    match type_ {
        ExtendedType::Scalar(_) => ExtendedType::Scalar(Node::new(ScalarType {
            description: None,
            name,
            directives: Default::default(),
        })),
        ExtendedType::Object(_) => ExtendedType::Object(Node::new(ObjectType {
            description: None,
            name,
            implements_interfaces: Default::default(),
            directives: Default::default(),
            fields: Default::default(),
        })),
        ExtendedType::Interface(_) => empty_interface(&name),
        ExtendedType::Union(_) => ExtendedType::Union(Node::new(UnionType {
            description: None,
            name,
            directives: Default::default(),
            members: Default::default(),
        })),
        ExtendedType::Enum(_) => ExtendedType::Enum(Node::new(EnumType {
            description: None,
            name,
            directives: Default::default(),
            values: Default::default(),
        })),
        ExtendedType::InputObject(_) => ExtendedType::InputObject(Node::new(InputObjectType {
            description: None,
            name,
            directives: Default::default(),
            fields: Default::default(),
        })),
    }
}
