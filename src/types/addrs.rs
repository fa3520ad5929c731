//! Provider source addresses and resource target addresses.
use std::fmt;
use std::str::FromStr;

use crate::constants::{DEFAULT_REGISTRY_HOST, LEGACY_NAMESPACE, PREDECESSOR_REGISTRY_HOST};

use super::errors::{Error, ErrorKind, Result};

/// Fully-qualified provider source address: `hostname/namespace/type`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Provider {
    hostname: String,
    namespace: String,
    type_name: String,
}

fn valid_part(s: &str, allow_dots: bool) -> bool {
    !s.is_empty()
        && !s.starts_with('-')
        && !s.ends_with('-')
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || (allow_dots && (c == '.' || c == ':')))
}

impl Provider {
    /// Build an address from already-validated parts.
    ///
    /// # Errors
    /// Returns `ErrorKind::Parse` when any part contains characters not allowed in a source address.
    pub fn new(hostname: &str, namespace: &str, type_name: &str) -> Result<Self> {
        let hostname = hostname.to_ascii_lowercase();
        let namespace = namespace.to_ascii_lowercase();
        let type_name = type_name.to_ascii_lowercase();
        if !valid_part(&hostname, true) {
            return Err(Error::new(ErrorKind::Parse, format!("invalid provider hostname {hostname:?}")));
        }
        if !valid_part(&namespace, false) {
            return Err(Error::new(ErrorKind::Parse, format!("invalid provider namespace {namespace:?}")));
        }
        if !valid_part(&type_name, false) {
            return Err(Error::new(ErrorKind::Parse, format!("invalid provider type {type_name:?}")));
        }
        Ok(Self {
            hostname,
            namespace,
            type_name,
        })
    }

    /// Parse a source string. One part defaults both hostname and namespace;
    /// two parts default the hostname.
    ///
    /// # Errors
    /// Returns `ErrorKind::Parse` for empty strings, more than three parts, or invalid parts.
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [ty] => Self::new(DEFAULT_REGISTRY_HOST, LEGACY_NAMESPACE, ty),
            [ns, ty] => Self::new(DEFAULT_REGISTRY_HOST, ns, ty),
            [host, ns, ty] => Self::new(host, ns, ty),
            _ => Err(Error::new(
                ErrorKind::Parse,
                format!("invalid provider source address {s:?}: must have the form hostname/namespace/type"),
            )),
        }
    }

    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Short form that omits the default registry host.
    #[must_use]
    pub fn for_display(&self) -> String {
        if self.hostname == DEFAULT_REGISTRY_HOST {
            format!("{}/{}", self.namespace, self.type_name)
        } else {
            self.to_string()
        }
    }

    /// True for `registry.terraform.io/hashicorp/*`.
    #[must_use]
    pub fn is_predecessor_default(&self) -> bool {
        self.hostname == PREDECESSOR_REGISTRY_HOST && self.namespace == LEGACY_NAMESPACE
    }

    #[must_use]
    pub fn with_hostname(&self, hostname: &str) -> Self {
        Self {
            hostname: hostname.to_ascii_lowercase(),
            namespace: self.namespace.clone(),
            type_name: self.type_name.clone(),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.hostname, self.namespace, self.type_name)
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A resource or module address used with `-target` / `-exclude`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Target(String);

impl Target {
    /// # Errors
    /// Returns `ErrorKind::Parse` for empty addresses or addresses containing whitespace.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s.chars().any(char::is_whitespace) || s.starts_with('.') || s.ends_with('.') {
            return Err(Error::new(ErrorKind::Parse, format!("invalid target address {s:?}")));
        }
        Ok(Self(s.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if `address` is this target or nested beneath it.
    #[must_use]
    pub fn contains(&self, address: &str) -> bool {
        address == self.0
            || address
                .strip_prefix(self.0.as_str())
                .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('['))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
