use crate::{IsolationLevel, truncate_long};
use std::{
    borrow::Cow,
    collections::{BTreeMap, btree_map},
    env,
};
use thiserror::Error;
use url::Url;

/// Failures while resolving or parsing a [`Configuration`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("No connection configuration named `{name}`")]
    NotFound { name: String },
    #[error("Malformed connection url `{url}`: {reason}")]
    Malformed { url: String, reason: String },
    #[error("Configuration is meant for the `{found}` driver, expected `{expected}`")]
    DriverMismatch {
        expected: &'static str,
        found: String,
    },
}

/// Language of the user facing messages attached to session errors.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    #[default]
    English,
    Portuguese,
}

impl Locale {
    pub fn connection_failed(&self) -> &'static str {
        match self {
            Locale::English => "Could not connect to the database",
            Locale::Portuguese => "Não foi possível se conectar ao banco de dados",
        }
    }
}

/// Everything a session needs to reach a database. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    driver: Cow<'static, str>,
    connection_string: String,
    isolation_level: IsolationLevel,
    locale: Locale,
}

impl Configuration {
    /// Configuration for `driver` using a backend specific connection string.
    ///
    /// Transactions default to [`IsolationLevel::ReadCommitted`].
    pub fn new(driver: impl Into<Cow<'static, str>>, connection_string: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            connection_string: connection_string.into(),
            isolation_level: IsolationLevel::default(),
            locale: Locale::default(),
        }
    }

    /// Parse a `driver://connection-string` url.
    ///
    /// The scheme selects the driver, everything after `://` (percent decoded) is the
    /// connection string handed to it. `:memory:` hosts are accepted as in SQLite.
    pub fn from_url(url: &str) -> Result<Self, ConfigurationError> {
        let malformed = |reason: &str| ConfigurationError::Malformed {
            url: truncate_long!(url).to_string(),
            reason: reason.to_owned(),
        };
        let Some((scheme, rest)) = url.split_once("://") else {
            return Err(malformed("expected `<driver>://<connection string>`"));
        };
        if rest.is_empty() {
            return Err(malformed("the connection string is empty"));
        }
        let probe = match rest.strip_prefix(":memory:") {
            Some(tail) => format!("{}://localhost{}", scheme, tail),
            None => url.to_owned(),
        };
        let parsed = Url::parse(&probe).map_err(|e| malformed(&e.to_string()))?;
        let connection_string =
            urlencoding::decode(rest).map_err(|e| malformed(&e.to_string()))?;
        Ok(Self::new(
            parsed.scheme().to_owned(),
            connection_string.into_owned(),
        ))
    }

    pub fn with_isolation_level(mut self, isolation_level: IsolationLevel) -> Self {
        self.isolation_level = isolation_level;
        self
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Level used when a transaction is started without an explicit one.
    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Fails unless this configuration targets the driver named `expected`.
    pub fn expect_driver(&self, expected: &'static str) -> Result<(), ConfigurationError> {
        if self.driver.eq_ignore_ascii_case(expected) {
            Ok(())
        } else {
            Err(ConfigurationError::DriverMismatch {
                expected,
                found: self.driver.to_string(),
            })
        }
    }
}

/// Named configurations, the explicit replacement for a process wide lookup table.
#[derive(Default, Debug, Clone)]
pub struct ConfigurationRegistry {
    entries: BTreeMap<String, Configuration>,
}

impl ConfigurationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, configuration: Configuration) -> &mut Self {
        let name = name.into();
        if self.entries.insert(name.clone(), configuration).is_some() {
            log::warn!("Connection configuration `{}` was replaced", name);
        }
        self
    }

    /// Build a registry from `(name, url)` pairs.
    pub fn from_urls<N, U>(
        pairs: impl IntoIterator<Item = (N, U)>,
    ) -> Result<Self, ConfigurationError>
    where
        N: Into<String>,
        U: AsRef<str>,
    {
        let mut result = Self::new();
        for (name, url) in pairs {
            result.insert(name, Configuration::from_url(url.as_ref())?);
        }
        Ok(result)
    }

    /// Collect every `<prefix><NAME>=<url>` pair from an iterator of variables.
    ///
    /// Names are lowercased, so `KEEL_DB_MAIN` is resolved as `main`.
    pub fn from_vars(
        prefix: &str,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, ConfigurationError> {
        Self::from_urls(vars.into_iter().filter_map(|(key, value)| {
            key.strip_prefix(prefix)
                .filter(|name| !name.is_empty())
                .map(|name| (name.to_ascii_lowercase(), value))
        }))
    }

    /// [`ConfigurationRegistry::from_vars`] over the process environment.
    pub fn from_env(prefix: &str) -> Result<Self, ConfigurationError> {
        Self::from_vars(prefix, env::vars())
    }

    pub fn resolve(&self, name: &str) -> Result<&Configuration, ConfigurationError> {
        self.entries
            .get(name)
            .ok_or_else(|| ConfigurationError::NotFound {
                name: name.to_owned(),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Configuration> {
        self.entries.iter()
    }
}
