//! Representation of `@link` specification urls, identities and versions.
use std::fmt;
use std::str;

use apollo_compiler::Name;
use apollo_compiler::name;
use thiserror::Error;

use crate::error::FederationError;

pub const APOLLO_SPEC_DOMAIN: &str = "https://specs.apollo.dev";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpecError {
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<SpecError> for FederationError {
    fn from(value: SpecError) -> Self {
        FederationError::InvalidLinkDirectiveUsage {
            message: value.to_string(),
        }
    }
}

/// The identity of a `@link`ed specification: its domain plus its name. Two urls pointing to
/// different versions of the same specification share their identity.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Identity {
    /// For instance, `"https://specs.apollo.dev"`.
    pub domain: String,

    /// For instance, `"federation"`.
    pub name: Name,
}

impl fmt::Display for Identity {
    /// ```
    /// # use apollo_composition::link::spec::Identity;
    /// use apollo_compiler::name;
    /// assert_eq!(
    ///     Identity::apollo(name!("federation")).to_string(),
    ///     "https://specs.apollo.dev/federation"
    /// )
    /// ```
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.domain, self.name)
    }
}

impl Identity {
    /// The identity of a specification published under the Apollo domain.
    pub fn apollo(name: Name) -> Identity {
        Identity {
            domain: APOLLO_SPEC_DOMAIN.to_string(),
            name,
        }
    }

    pub fn link_identity() -> Identity {
        Self::apollo(name!("link"))
    }

    pub fn federation_identity() -> Identity {
        Self::apollo(name!("federation"))
    }

    pub fn join_identity() -> Identity {
        Self::apollo(name!("join"))
    }

    pub fn inaccessible_identity() -> Identity {
        Self::apollo(name!("inaccessible"))
    }

    pub fn tag_identity() -> Identity {
        Self::apollo(name!("tag"))
    }
}

/// The version of a `@link` specification, in the form of a major and minor version numbers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl fmt::Display for Version {
    /// ```
    /// # use apollo_composition::link::spec::Version;
    /// assert_eq!(Version::new(2, 3).to_string(), "2.3")
    /// ```
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl str::FromStr for Version {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s.split_once('.').ok_or(SpecError::ParseError(
            "version number is missing a dot (.)".to_string(),
        ))?;

        let major = major.parse::<u32>().map_err(|_| {
            SpecError::ParseError(format!("invalid major version number '{major}'"))
        })?;
        let minor = minor.parse::<u32>().map_err(|_| {
            SpecError::ParseError(format!("invalid minor version number '{minor}'"))
        })?;

        Ok(Version { major, minor })
    }
}

impl Version {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Whether this version satisfies the provided `required` version.
    ///
    /// ```
    /// # use apollo_composition::link::spec::Version;
    /// assert!(Version::new(1, 2).satisfies(&Version::new(1, 0)));
    /// assert!(!Version::new(2, 0).satisfies(&Version::new(1, 9)));
    /// assert!(!Version::new(0, 9).satisfies(&Version::new(0, 8)));
    /// ```
    pub fn satisfies(&self, required: &Version) -> bool {
        if self.major == 0 {
            self == required
        } else {
            self.major == required.major && self.minor >= required.minor
        }
    }

    /// Whether two versions can be used interchangeably by composition, i.e. whether the newest one
    /// satisfies the oldest one.
    pub fn is_compatible_with(&self, other: &Version) -> bool {
        if self >= other {
            self.satisfies(other)
        } else {
            other.satisfies(self)
        }
    }
}

/// A `@link` specification url, which identifies a specific version of a specification.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Url {
    pub identity: Identity,
    pub version: Version,
}

impl fmt::Display for Url {
    /// ```
    /// # use apollo_composition::link::spec::*;
    /// use apollo_compiler::name;
    /// assert_eq!(
    ///     Url { identity: Identity::apollo(name!("federation")), version: Version::new(2, 3) }
    ///         .to_string(),
    ///     "https://specs.apollo.dev/federation/v2.3"
    /// )
    /// ```
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/v{}", self.identity, self.version)
    }
}

impl str::FromStr for Url {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = url::Url::parse(s)
            .map_err(|e| SpecError::ParseError(format!("invalid specification url: {e}")))?;
        let mut segments = url.path_segments().ok_or(SpecError::ParseError(
            "invalid `@link` specification url".to_string(),
        ))?;
        let version = segments.next_back().ok_or(SpecError::ParseError(
            "invalid `@link` specification url: missing specification version".to_string(),
        ))?;
        let Some(version) = version.strip_prefix('v') else {
            return Err(SpecError::ParseError("invalid `@link` specification url: the last element of the path should be the version starting with a 'v'".to_string()));
        };
        let version = version.parse::<Version>()?;
        // Spec names are not checked to be valid GraphQL names: urls with dashes exist in the
        // wild. Such a spec can only be used through explicit imports.
        let name = segments
            .next_back()
            .filter(|segment| !segment.is_empty())
            .map(Name::new_unchecked)
            .ok_or(SpecError::ParseError(
                "invalid `@link` specification url: missing specification name".to_string(),
            ))?;
        let scheme = url.scheme();
        if !scheme.starts_with("http") {
            return Err(SpecError::ParseError(
                "invalid `@link` specification url: only http(s) urls are supported currently"
                    .to_string(),
            ));
        }
        let host = url.host_str().ok_or(SpecError::ParseError(
            "invalid `@link` specification url".to_string(),
        ))?;
        let path_remainder = segments.collect::<Vec<&str>>();
        let domain = if path_remainder.is_empty() {
            format!("{scheme}://{host}")
        } else {
            format!("{scheme}://{host}/{}", path_remainder.join("/"))
        };
        Ok(Url {
            identity: Identity { domain, name },
            version,
        })
    }
}
