//! Package URL (`pkg:type/namespace/name@version?qualifiers#subpath`) parsing

use lspkg_errors::PackageManagerError;
use std::collections::BTreeMap;
use std::fmt;

/// A parsed, percent-decoded package URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageUrl {
    pub package_type: String,
    pub namespace: Option<String>,
    pub name: String,
    pub version: Option<String>,
    pub qualifiers: BTreeMap<String, String>,
    pub subpath: Option<String>,
}

impl PackageUrl {
    /// Parse a package URL such as `pkg:npm/%40vue/language-server@2.0.28`.
    ///
    /// # Errors
    ///
    /// Returns `PackageManagerError::InvalidConfiguration` when the scheme,
    /// type or name is missing.
    pub fn parse(input: &str) -> Result<Self, PackageManagerError> {
        let invalid = |what: &str| {
            PackageManagerError::invalid_configuration(format!("{what} in package URL `{input}`"))
        };

        let rest = input
            .strip_prefix("pkg:")
            .ok_or_else(|| invalid("missing `pkg:` scheme"))?
            .trim_start_matches('/');

        let (rest, subpath) = match rest.split_once('#') {
            Some((rest, subpath)) => (rest, Some(subpath.trim_matches('/'))),
            None => (rest, None),
        };
        let (rest, qualifiers) = match rest.split_once('?') {
            Some((rest, qualifiers)) => (rest, parse_qualifiers(qualifiers)),
            None => (rest, BTreeMap::new()),
        };

        // A version `@` only counts after the last path separator, which
        // keeps unencoded npm scopes (`@vue/...`) in the namespace.
        let last_slash = rest.rfind('/').unwrap_or(0);
        let (path, version) = match rest.rfind('@') {
            Some(at) if at > last_slash => (&rest[..at], Some(decode(&rest[at + 1..]))),
            _ => (rest, None),
        };

        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() < 2 {
            return Err(invalid("missing type or name"));
        }
        let package_type = segments.remove(0).to_ascii_lowercase();
        let name = segments.pop().map(decode).ok_or_else(|| invalid("missing name"))?;
        let namespace = if segments.is_empty() {
            None
        } else {
            Some(segments.into_iter().map(decode).collect::<Vec<_>>().join("/"))
        };

        Ok(Self {
            package_type,
            namespace,
            name,
            version: version.filter(|v| !v.is_empty()),
            qualifiers,
            subpath: subpath.filter(|s| !s.is_empty()).map(decode),
        })
    }

    /// Namespace and name joined with `/` (`@vue/language-server`)
    #[must_use]
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!("{namespace}/{}", self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for PackageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pkg:{}/{}", self.package_type, self.qualified_name())?;
        if let Some(version) = &self.version {
            write!(f, "@{version}")?;
        }
        Ok(())
    }
}

fn decode(segment: &str) -> String {
    urlencoding::decode(segment).map_or_else(|_| segment.to_string(), |s| s.into_owned())
}

fn parse_qualifiers(raw: &str) -> BTreeMap<String, String> {
    raw.split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.to_ascii_lowercase(), decode(value)))
        .collect()
}
