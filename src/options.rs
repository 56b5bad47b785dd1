use std::str::FromStr;
use std::time::Duration;

use log::LevelFilter;
use url::Url;

use crate::error::Error;
use crate::logger::LogSettings;

bitflags::bitflags! {
    /// Flags passed to `cdb2_open`, controlling how the connection target is
    /// resolved.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ConnectionFlags: u32 {
        /// Read results of writes made inside the current transaction.
        const READ_INTRANS_RESULTS = 2;

        /// Treat the tier argument as a machine name and connect to it
        /// directly instead of consulting the database discovery service.
        const DIRECT_CPU = 4;

        /// Connect to a random node of the cluster.
        const RANDOM = 8;

        /// Connect to a random node in the local datacenter, falling back to
        /// any node.
        const RANDOMROOM = 16;

        /// Connect only within the local datacenter.
        const ROOM = 32;
    }
}

/// Options for connecting to a Comdb2 database.
///
/// Built either programmatically or by parsing a URL of the form
///
/// ```text
/// comdb2://mydb?tier=prod&tz=US/Eastern
/// ```
///
/// A connection is opened to a tier by name, or to one specific host via
/// [`host`][ConnectOptions::host]; the two are mutually exclusive.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub(crate) database: String,
    pub(crate) tier: String,
    pub(crate) host: Option<String>,
    pub(crate) flags: ConnectionFlags,
    pub(crate) autocommit: bool,
    pub(crate) timezone: Option<String>,
    pub(crate) log_settings: LogSettings,
}

impl ConnectOptions {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            tier: "default".to_owned(),
            host: None,
            flags: ConnectionFlags::empty(),
            autocommit: false,
            timezone: Some("UTC".to_owned()),
            log_settings: LogSettings::default(),
        }
    }

    /// Set the tier to connect to; `"default"` if never called.
    pub fn tier(mut self, tier: impl Into<String>) -> Self {
        self.tier = tier.into();
        self
    }

    /// Connect directly to one machine, bypassing tier discovery. Cannot be
    /// combined with a non-default [`tier`][ConnectOptions::tier].
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn flags(mut self, flags: ConnectionFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Whether the DB-API layer runs in autocommit mode (no implicit
    /// transactions). Off by default: statements run inside a transaction
    /// and nothing is visible until `commit`. The low-level [`Handle`] is
    /// unaffected by this setting.
    ///
    /// [`Handle`]: crate::Handle
    pub fn autocommit(mut self, autocommit: bool) -> Self {
        self.autocommit = autocommit;
        self
    }

    /// The timezone name sent to the server right after connecting, and used
    /// to stamp naive datetime parameters. Defaults to `"UTC"`; pass `None`
    /// to leave the server's default in place.
    pub fn timezone(mut self, timezone: Option<String>) -> Self {
        self.timezone = timezone;
        self
    }

    /// Log executed statements at the given verbosity.
    pub fn log_statements(mut self, level: LevelFilter) -> Self {
        self.log_settings.statements_level = level;
        self
    }

    /// Log statements slower than `duration` at the given verbosity.
    pub fn log_slow_statements(mut self, level: LevelFilter, duration: Duration) -> Self {
        self.log_settings.slow_statements_level = level;
        self.log_settings.slow_statements_duration = duration;
        self
    }

    pub fn get_database(&self) -> &str {
        &self.database
    }

    pub fn get_tier(&self) -> &str {
        &self.tier
    }

    pub fn get_host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn get_autocommit(&self) -> bool {
        self.autocommit
    }

    pub fn get_timezone(&self) -> Option<&str> {
        self.timezone.as_deref()
    }
}

impl FromStr for ConnectOptions {
    type Err = Error;

    fn from_str(url: &str) -> Result<Self, Self::Err> {
        let url: Url = url.parse().map_err(|e: url::ParseError| {
            Error::ParseConnectOptions(e.into())
        })?;

        if url.scheme() != "comdb2" {
            return Err(Error::ParseConnectOptions(
                format!("unsupported URL scheme {:?}", url.scheme()).into(),
            ));
        }

        let database = url.host_str().ok_or_else(|| {
            Error::ParseConnectOptions("connection URL is missing a database name".into())
        })?;

        let mut options = ConnectOptions::new(database);

        for (key, value) in url.query_pairs() {
            match &*key {
                "tier" => {
                    options = options.tier(&*value);
                }

                "host" => {
                    options = options.host(&*value);
                }

                "autocommit" => {
                    let autocommit = value.parse::<bool>().map_err(|_| {
                        Error::ParseConnectOptions(
                            format!("invalid value {value:?} for `autocommit`").into(),
                        )
                    })?;
                    options = options.autocommit(autocommit);
                }

                "tz" | "timezone" => {
                    options = options.timezone(Some(value.into_owned()));
                }

                _ => {
                    return Err(Error::ParseConnectOptions(
                        format!("unknown connection URL parameter {key:?}").into(),
                    ));
                }
            }
        }

        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_url() {
        let options: ConnectOptions = "comdb2://testdb".parse().unwrap();
        assert_eq!(options.get_database(), "testdb");
        assert_eq!(options.get_tier(), "default");
        // transactions are the default; autocommit is opt-in
        assert!(!options.get_autocommit());
        assert_eq!(options.get_timezone(), Some("UTC"));
    }

    #[test]
    fn parses_query_parameters() {
        let options: ConnectOptions =
            "comdb2://testdb?tier=prod&autocommit=true&tz=US/Eastern"
                .parse()
                .unwrap();
        assert_eq!(options.get_tier(), "prod");
        assert!(options.get_autocommit());
        assert_eq!(options.get_timezone(), Some("US/Eastern"));
    }

    #[test]
    fn rejects_unknown_parameters_and_schemes() {
        assert!("comdb2://testdb?nope=1".parse::<ConnectOptions>().is_err());
        assert!("mysql://testdb".parse::<ConnectOptions>().is_err());
    }
}
