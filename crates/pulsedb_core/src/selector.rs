//! Store selection.

use std::fmt;

/// Which store an operation targets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StoreSelector {
    /// The configured local store.
    #[default]
    Local,
    /// The configured remote store.
    Remote,
    /// A store opened through the resolver.
    Url(String),
}

impl StoreSelector {
    /// Parses an optional selector string.
    ///
    /// `None` and `"local"` select the local store, `"remote"` the remote
    /// one; anything else is taken as a store URL.
    pub fn parse(selector: Option<&str>) -> Self {
        match selector.map(str::trim) {
            None | Some("") | Some("local") => StoreSelector::Local,
            Some("remote") => StoreSelector::Remote,
            Some(url) => StoreSelector::Url(url.to_string()),
        }
    }
}

impl From<Option<&str>> for StoreSelector {
    fn from(selector: Option<&str>) -> Self {
        Self::parse(selector)
    }
}

impl From<&str> for StoreSelector {
    fn from(selector: &str) -> Self {
        Self::parse(Some(selector))
    }
}

impl fmt::Display for StoreSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreSelector::Local => f.write_str("local"),
            StoreSelector::Remote => f.write_str("remote"),
            StoreSelector::Url(url) => f.write_str(url),
        }
    }
}
