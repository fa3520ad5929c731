//! In-memory model of the provider dependency lock file.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::constants::DEFAULT_REGISTRY_HOST;
use crate::types::addrs::Provider;
use crate::types::errors::{Error, ErrorKind, Result};

/// Package integrity hash in `scheme:value` form (`h1:...`, `zh:...`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash(String);

impl Hash {
    /// # Errors
    /// Returns `ErrorKind::Parse` if the string lacks a scheme prefix or a value.
    pub fn parse(s: &str) -> Result<Self> {
        let (scheme, value) = s
            .split_once(':')
            .ok_or_else(|| Error::new(ErrorKind::Parse, format!("hash {s:?} has no scheme prefix")))?;
        if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::new(ErrorKind::Parse, format!("hash {s:?} has an invalid scheme")));
        }
        if value.is_empty() || value.chars().any(char::is_whitespace) {
            return Err(Error::new(ErrorKind::Parse, format!("hash {s:?} has an invalid value")));
        }
        Ok(Self(s.to_string()))
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        self.0.split_once(':').map_or("", |(s, _)| s)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Exact selected provider version: `MAJOR.MINOR.PATCH[-PRERELEASE]`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || Error::new(ErrorKind::Parse, format!("invalid version {s:?}: must be an exact version such as \"1.2.3\""));
        let (core, pre) = match s.split_once('-') {
            Some((c, p)) if !p.is_empty() => (c, Some(p.to_string())),
            Some(_) => return Err(bad()),
            None => (s, None),
        };
        let nums: Vec<u64> = core
            .split('.')
            .map(|p| if p.is_empty() { Err(bad()) } else { p.parse::<u64>().map_err(|_| bad()) })
            .collect::<Result<_>>()?;
        match nums.as_slice() {
            [major, minor, patch] => Ok(Self {
                major: *major,
                minor: *minor,
                patch: *patch,
                pre,
            }),
            _ => Err(bad()),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(p) = &self.pre {
            write!(f, "-{p}")?;
        }
        Ok(())
    }
}

/// Lock entry for one provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderLock {
    addr: Provider,
    version: Version,
    constraints: Option<String>,
    hashes: Vec<Hash>,
}

impl ProviderLock {
    /// Hashes are sorted and de-duplicated.
    #[must_use]
    pub fn new(addr: Provider, version: Version, constraints: Option<String>, hashes: Vec<Hash>) -> Self {
        let hashes: BTreeSet<Hash> = hashes.into_iter().collect();
        Self {
            addr,
            version,
            constraints,
            hashes: hashes.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn provider(&self) -> &Provider {
        &self.addr
    }

    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    #[must_use]
    pub fn constraints(&self) -> Option<&str> {
        self.constraints.as_deref()
    }

    #[must_use]
    pub fn hashes(&self) -> &[Hash] {
        &self.hashes
    }

    /// True if every hash of `other` is also recorded here.
    #[must_use]
    pub fn contains_all(&self, other: &ProviderLock) -> bool {
        other.hashes.iter().all(|h| self.hashes.binary_search(h).is_ok())
    }
}

/// Provider lock set plus the transient override markers.
#[derive(Clone, Debug, Default)]
pub struct Locks {
    providers: BTreeMap<Provider, ProviderLock>,
    overridden: BTreeSet<Provider>,
}

impl Locks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    #[must_use]
    pub fn provider(&self, addr: &Provider) -> Option<&ProviderLock> {
        self.providers.get(addr)
    }

    /// Entries ordered by provider address.
    #[must_use]
    pub fn all_providers(&self) -> &BTreeMap<Provider, ProviderLock> {
        &self.providers
    }

    /// Insert or replace the entry for `addr`, returning the stored entry.
    pub fn set_provider(
        &mut self,
        addr: Provider,
        version: Version,
        constraints: Option<String>,
        hashes: Vec<Hash>,
    ) -> &ProviderLock {
        let lock = ProviderLock::new(addr.clone(), version, constraints, hashes);
        self.providers.insert(addr.clone(), lock);
        &self.providers[&addr]
    }

    pub fn remove_provider(&mut self, addr: &Provider) -> Option<ProviderLock> {
        self.providers.remove(addr)
    }

    /// Mark `addr` as exempt from hash verification for this process only.
    pub fn set_provider_overridden(&mut self, addr: Provider) {
        self.overridden.insert(addr);
    }

    #[must_use]
    pub fn provider_is_overridden(&self, addr: &Provider) -> bool {
        self.overridden.contains(addr)
    }

    #[must_use]
    pub fn overridden_providers(&self) -> &BTreeSet<Provider> {
        &self.overridden
    }

    /// Same providers with the same versions and hashes. Constraints and
    /// override markers are not compared.
    #[must_use]
    pub fn equal(&self, other: &Locks) -> bool {
        self.providers.len() == other.providers.len()
            && self.providers.iter().all(|(addr, mine)| {
                other
                    .providers
                    .get(addr)
                    .is_some_and(|theirs| mine.version == theirs.version && mine.hashes == theirs.hashes)
            })
    }

    /// Same set of provider addresses, ignoring versions and hashes.
    #[must_use]
    pub fn equal_provider_address(&self, other: &Locks) -> bool {
        self.providers.keys().eq(other.providers.keys())
    }

    /// Add `registry.opentofu.org/hashicorp/*` entries for every
    /// `registry.terraform.io/hashicorp/*` entry that has no counterpart yet.
    ///
    /// The new entry keeps version and constraints but no hashes, because the
    /// two registries do not publish byte-identical packages. Old entries stay
    /// in place. Returns the applied `old -> new` mapping; it is empty when
    /// nothing needed migrating, so repeated calls are no-ops.
    pub fn upgrade_from_predecessor_project(&mut self) -> BTreeMap<Provider, Provider> {
        let mut changes = BTreeMap::new();
        let candidates: Vec<ProviderLock> = self
            .providers
            .values()
            .filter(|l| l.addr.is_predecessor_default())
            .cloned()
            .collect();
        for old in candidates {
            let new_addr = old.addr.with_hostname(DEFAULT_REGISTRY_HOST);
            if self.providers.contains_key(&new_addr) {
                continue;
            }
            self.set_provider(new_addr.clone(), old.version.clone(), old.constraints.clone(), Vec::new());
            changes.insert(old.addr, new_addr);
        }
        changes
    }
}
