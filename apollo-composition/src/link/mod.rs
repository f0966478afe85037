use std::fmt;
use std::str;
use std::sync::Arc;

use apollo_compiler::InvalidNameError;
use apollo_compiler::Name;
use apollo_compiler::Schema;
use apollo_compiler::ast::Directive;
use apollo_compiler::ast::Value;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::name;
use thiserror::Error;

use crate::error::FederationError;
use crate::link::spec::Identity;
use crate::link::spec::Url;

pub mod feature_registry;
pub(crate) mod federation_spec_definition;
pub(crate) mod join_spec_definition;
pub(crate) mod link_spec_definition;
pub mod spec;

pub const DEFAULT_LINK_NAME: Name = name!("link");
pub const DEFAULT_IMPORT_SCALAR_NAME: Name = name!("Import");
pub const DEFAULT_PURPOSE_ENUM_NAME: Name = name!("Purpose");

#[derive(Error, Debug, PartialEq)]
pub enum LinkError {
    #[error(transparent)]
    InvalidName(#[from] InvalidNameError),
    #[error("Invalid use of @link in schema: {0}")]
    BootstrapError(String),
}

impl From<LinkError> for FederationError {
    fn from(value: LinkError) -> Self {
        FederationError::InvalidLinkDirectiveUsage {
            message: value.to_string(),
        }
    }
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum Purpose {
    Security,
    Execution,
}

impl Purpose {
    pub fn from_value(value: &Value) -> Result<Purpose, LinkError> {
        if let Value::Enum(value) = value {
            value.parse::<Purpose>()
        } else {
            Err(LinkError::BootstrapError(
                "invalid `purpose` value, should be an enum".to_string(),
            ))
        }
    }
}

impl str::FromStr for Purpose {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SECURITY" => Ok(Purpose::Security),
            "EXECUTION" => Ok(Purpose::Execution),
            _ => Err(LinkError::BootstrapError(format!(
                "invalid/unrecognized `purpose` value '{s}'"
            ))),
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Purpose::Security => f.write_str("SECURITY"),
            Purpose::Execution => f.write_str("EXECUTION"),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Import {
    /// The name of the element that is being imported.
    ///
    /// Note that this will never start with '@': whether or not this is the name of a directive is
    /// entirely reflected by the value of `is_directive`.
    pub element: Name,

    /// Whether the imported element is a directive (if it is not, then it is an imported type).
    pub is_directive: bool,

    /// The optional alias under which the element is imported.
    pub alias: Option<Name>,
}

impl Import {
    pub fn from_value(value: &Value) -> Result<Import, LinkError> {
        match value {
            Value::String(str) => {
                if let Some(directive_name) = str.strip_prefix('@') {
                    Ok(Import { element: Name::new(directive_name)?, is_directive: true, alias: None })
                } else {
                    Ok(Import { element: Name::new(str)?, is_directive: false, alias: None })
                }
            }
            Value::Object(fields) => {
                let mut name: Option<&str> = None;
                let mut alias: Option<&str> = None;
                for (k, v) in fields {
                    match k.as_str() {
                        "name" => {
                            name = Some(v.as_str().ok_or_else(|| {
                                LinkError::BootstrapError("invalid value for `name` field in @link(import:) argument: must be a string".to_string())
                            })?)
                        }
                        "as" => {
                            alias = Some(v.as_str().ok_or_else(|| {
                                LinkError::BootstrapError("invalid value for `as` field in @link(import:) argument: must be a string".to_string())
                            })?)
                        }
                        _ => return Err(LinkError::BootstrapError(format!("unknown field `{k}` in @link(import:) argument"))),
                    }
                }
                let Some(element) = name else {
                    return Err(LinkError::BootstrapError("invalid entry in @link(import:) argument, missing mandatory `name` field".to_string()));
                };
                if let Some(directive_name) = element.strip_prefix('@') {
                    let alias = match alias {
                        Some(alias_str) => match alias_str.strip_prefix('@') {
                            Some(alias_str) => Some(Name::new(alias_str)?),
                            None => return Err(LinkError::BootstrapError(format!("invalid alias '{alias_str}' for import name '{element}': should start with '@' since the imported name does"))),
                        },
                        None => None,
                    };
                    Ok(Import { element: Name::new(directive_name)?, is_directive: true, alias })
                } else {
                    if let Some(alias) = alias
                        && alias.starts_with('@')
                    {
                        return Err(LinkError::BootstrapError(format!("invalid alias '{alias}' for import name '{element}': should not start with '@' (or, if {element} is a directive, then the name should start with '@')")));
                    }
                    Ok(Import {
                        element: Name::new(element)?,
                        is_directive: false,
                        alias: alias.map(Name::new).transpose()?,
                    })
                }
            }
            _ => Err(LinkError::BootstrapError("invalid sub-value for @link(import:) argument: values should be either strings or input object values of the form { name: \"<importedElement>\", as: \"<alias>\" }.".to_string())),
        }
    }

    pub fn imported_name(&self) -> &Name {
        self.alias.as_ref().unwrap_or(&self.element)
    }

    pub fn element_display_name(&self) -> impl fmt::Display + '_ {
        DisplayName {
            name: &self.element,
            is_directive: self.is_directive,
        }
    }

    pub fn imported_display_name(&self) -> impl fmt::Display + '_ {
        DisplayName {
            name: self.imported_name(),
            is_directive: self.is_directive,
        }
    }
}

/// Adds an `@` in front of directive names.
struct DisplayName<'s> {
    name: &'s str,
    is_directive: bool,
}

impl fmt::Display for DisplayName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_directive {
            f.write_str("@")?;
        }
        f.write_str(self.name)
    }
}

impl fmt::Display for Import {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.alias.is_some() {
            write!(
                f,
                r#"{{ name: "{}", as: "{}" }}"#,
                self.element_display_name(),
                self.imported_display_name()
            )
        } else {
            write!(f, r#""{}""#, self.imported_display_name())
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Link {
    pub url: Url,
    pub spec_alias: Option<Name>,
    pub imports: Vec<Arc<Import>>,
    pub purpose: Option<Purpose>,
}

impl Link {
    /// A link with no alias and no imports: every element is namespaced by the spec name.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            spec_alias: None,
            imports: vec![],
            purpose: None,
        }
    }

    pub fn spec_name_in_schema(&self) -> &Name {
        self.spec_alias.as_ref().unwrap_or(&self.url.identity.name)
    }

    /// The name a directive of this spec has in the schema: its imported name, the spec name
    /// for a directive named like its spec, or the `spec__name` namespaced form.
    pub fn directive_name_in_schema(&self, name: &Name) -> Name {
        if let Some(import) = self
            .imports
            .iter()
            .find(|i| i.is_directive && i.element == *name)
        {
            import.imported_name().clone()
        } else if name == self.url.identity.name.as_str() {
            self.spec_name_in_schema().clone()
        } else {
            Name::new_unchecked(&format!("{}__{}", self.spec_name_in_schema(), name))
        }
    }

    /// Like [`Link::directive_name_in_schema`], minus the special case for a name matching the
    /// spec name.
    pub fn type_name_in_schema(&self, name: &Name) -> Name {
        if let Some(import) = self
            .imports
            .iter()
            .find(|i| !i.is_directive && i.element == *name)
        {
            import.imported_name().clone()
        } else {
            Name::new_unchecked(&format!("{}__{}", self.spec_name_in_schema(), name))
        }
    }

    pub fn from_directive_application(directive: &Directive) -> Result<Link, LinkError> {
        let url = directive
            .specified_argument_by_name("url")
            .ok_or_else(|| {
                LinkError::BootstrapError("the `url` argument for @link is mandatory".to_string())
            })?
            .as_str()
            .ok_or_else(|| {
                LinkError::BootstrapError(
                    "the `url` argument for @link must be a String".to_string(),
                )
            })?;
        let url: Url = url.parse::<Url>().map_err(|e| {
            LinkError::BootstrapError(format!("invalid `url` argument (reason: {e})"))
        })?;

        let spec_alias = directive
            .specified_argument_by_name("as")
            .and_then(|arg| arg.as_str())
            .map(Name::new)
            .transpose()?;
        let purpose = directive
            .specified_argument_by_name("for")
            .map(|value| Purpose::from_value(value))
            .transpose()?;

        let imports = directive
            .specified_argument_by_name("import")
            .and_then(|arg| arg.as_list())
            .unwrap_or(&[])
            .iter()
            .map(|value| Ok(Arc::new(Import::from_value(value)?)))
            .collect::<Result<Vec<Arc<Import>>, LinkError>>()?;

        Ok(Link {
            url,
            spec_alias,
            imports,
            purpose,
        })
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let imported_types: Vec<String> = self
            .imports
            .iter()
            .map(|import| import.to_string())
            .collect();
        let imports = if imported_types.is_empty() {
            String::new()
        } else {
            format!(r#", import: [{}]"#, imported_types.join(", "))
        };
        let alias = self
            .spec_alias
            .as_ref()
            .map(|a| format!(r#", as: "{a}""#))
            .unwrap_or_default();
        let purpose = self
            .purpose
            .as_ref()
            .map(|p| format!(r#", for: {p}"#))
            .unwrap_or_default();
        write!(f, r#"@link(url: "{}"{alias}{imports}{purpose})"#, self.url)
    }
}

#[derive(Debug)]
pub struct LinkedElement {
    pub link: Arc<Link>,
    pub import: Option<Arc<Import>>,
}

/// Every `@link` of a schema, indexed the ways lookups need.
#[derive(Clone, Default, Eq, PartialEq, Debug)]
pub struct LinksMetadata {
    pub(crate) links: Vec<Arc<Link>>,
    pub(crate) by_identity: IndexMap<Identity, Arc<Link>>,
    pub(crate) by_name_in_schema: IndexMap<Name, Arc<Link>>,
    pub(crate) types_by_imported_name: IndexMap<Name, (Arc<Link>, Arc<Import>)>,
    pub(crate) directives_by_imported_name: IndexMap<Name, (Arc<Link>, Arc<Import>)>,
}

impl LinksMetadata {
    /// Collects the `@link` applications of the schema definition. Returns `None` when the schema
    /// does not link the `link` spec itself.
    pub fn from_schema(schema: &Schema) -> Result<Option<Self>, LinkError> {
        let directives = &schema.schema_definition.directives;
        // The bootstrap `@link` is the one linking the link spec, possibly under an alias.
        let bootstrap_name = directives.iter().find_map(|directive| {
            let link = Link::from_directive_application(directive).ok()?;
            let is_bootstrap = link.url.identity == Identity::link_identity()
                && *link.spec_name_in_schema() == directive.name;
            is_bootstrap.then(|| directive.name.clone())
        });
        let Some(bootstrap_name) = bootstrap_name else {
            return Ok(None);
        };

        let mut metadata = LinksMetadata::default();
        for application in directives.get_all(&bootstrap_name) {
            let link = Arc::new(Link::from_directive_application(application)?);
            metadata.add(link)?;
        }
        Ok(Some(metadata))
    }

    /// Collects the `@link` applications of a schema that uses `@link` without linking the link
    /// spec itself, as most subgraphs do.
    pub(crate) fn from_implicit_link_applications(schema: &Schema) -> Result<Self, LinkError> {
        let mut metadata = LinksMetadata::default();
        for application in schema
            .schema_definition
            .directives
            .get_all(&DEFAULT_LINK_NAME)
        {
            metadata.add(Arc::new(Link::from_directive_application(application)?))?;
        }
        Ok(metadata)
    }

    pub(crate) fn add(&mut self, link: Arc<Link>) -> Result<(), LinkError> {
        if self.by_identity.contains_key(&link.url.identity) {
            return Err(LinkError::BootstrapError(format!(
                "duplicate @link inclusion of specification \"{}\"",
                link.url.identity
            )));
        }
        let name_in_schema = link.spec_name_in_schema().clone();
        if let Some(other) = self.by_name_in_schema.get(&name_in_schema) {
            return Err(LinkError::BootstrapError(format!(
                "name conflict: {} and {} are imported under the same name (consider using the `@link(as:)` argument to disambiguate)",
                other.url, link.url,
            )));
        }
        for import in &link.imports {
            let imported_name = import.imported_name().clone();
            let by_name = if import.is_directive {
                &mut self.directives_by_imported_name
            } else {
                &mut self.types_by_imported_name
            };
            if let Some((other, _)) = by_name.get(&imported_name) {
                return Err(LinkError::BootstrapError(format!(
                    "name conflict: both {} and {} import {}",
                    other.url,
                    link.url,
                    import.imported_display_name()
                )));
            }
            by_name.insert(imported_name, (Arc::clone(&link), Arc::clone(import)));
        }
        self.by_identity
            .insert(link.url.identity.clone(), Arc::clone(&link));
        self.by_name_in_schema
            .insert(name_in_schema, Arc::clone(&link));
        self.links.push(link);
        Ok(())
    }

    pub fn all_links(&self) -> &[Arc<Link>] {
        self.links.as_ref()
    }

    pub fn for_identity(&self, identity: &Identity) -> Option<Arc<Link>> {
        self.by_identity.get(identity).cloned()
    }

    pub fn source_link_of_type(&self, type_name: &Name) -> Option<LinkedElement> {
        // For types, it's either an imported name or it must be fully qualified
        if let Some((link, import)) = self.types_by_imported_name.get(type_name) {
            return Some(LinkedElement {
                link: Arc::clone(link),
                import: Some(Arc::clone(import)),
            });
        }
        type_name.split_once("__").and_then(|(spec_name, _)| {
            self.by_name_in_schema
                .get(spec_name)
                .map(|link| LinkedElement {
                    link: Arc::clone(link),
                    import: None,
                })
        })
    }

    pub fn source_link_of_directive(&self, directive_name: &Name) -> Option<LinkedElement> {
        // For directives, it can be either:
        //   1. be an imported name,
        //   2. be the "imported" name of a linked spec (special case of a directive named like the
        //      spec),
        //   3. or it must be fully qualified.
        if let Some((link, import)) = self.directives_by_imported_name.get(directive_name) {
            return Some(LinkedElement {
                link: Arc::clone(link),
                import: Some(Arc::clone(import)),
            });
        }

        if let Some(link) = self.by_name_in_schema.get(directive_name) {
            return Some(LinkedElement {
                link: Arc::clone(link),
                import: None,
            });
        }

        directive_name.split_once("__").and_then(|(spec_name, _)| {
            self.by_name_in_schema
                .get(spec_name)
                .map(|link| LinkedElement {
                    link: Arc::clone(link),
                    import: None,
                })
        })
    }
}
