//! Connection configuration resolution.
//!
//! Callers may describe a connection in two ways at once: an ordered list of
//! values in the legacy slot order (username, password, host, port, database,
//! collection, auth source) and a set of named values. [`ConnectionArgs::resolve`]
//! merges both over the built-in defaults into one immutable
//! [`ConnectionConfig`]:
//!
//! 1. defaults,
//! 2. positional values, each overwriting its slot whatever it holds,
//! 3. named values that are not [`ConfigValue::Absent`].
//!
//! The port is then coerced to an integer and an unset auth source falls back
//! to the database name.

use std::{collections::BTreeMap, fmt, str::FromStr, time::Duration};

use tracing::{trace, warn};
use zeroize::Zeroizing;

use crate::{
    constants::{
        DEFAULT_COLLECTION,
        DEFAULT_DATABASE,
        DEFAULT_HOST,
        DEFAULT_PORT,
        DEFAULT_USERNAME,
        SERVER_SELECTION_TIMEOUT,
    },
    Result,
    ShelterError,
};

/// One configurable connection setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigKey {
    /// Login name
    Username,
    /// Login secret
    Password,
    /// Server host name or address
    Host,
    /// Server port
    Port,
    /// Database holding the collection
    Database,
    /// Collection the accessor operates on
    Collection,
    /// Database the credentials are validated against
    AuthSource,
}

impl ConfigKey {
    /// Slot order of the legacy positional calling convention.
    pub const LEGACY_ORDER: [Self; 7] = [
        Self::Username,
        Self::Password,
        Self::Host,
        Self::Port,
        Self::Database,
        Self::Collection,
        Self::AuthSource,
    ];

    /// Returns the keyword name of the setting.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Password => "password",
            Self::Host => "host",
            Self::Port => "port",
            Self::Database => "database",
            Self::Collection => "collection",
            Self::AuthSource => "auth_source",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for ConfigKey {
    type Err = ShelterError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "username" => Ok(Self::Username),
            "password" => Ok(Self::Password),
            "host" => Ok(Self::Host),
            "port" => Ok(Self::Port),
            "database" => Ok(Self::Database),
            "collection" => Ok(Self::Collection),
            "auth_source" | "authSource" => Ok(Self::AuthSource),
            other => {
                Err(ShelterError::ConfigError {
                    message: format!("unknown connection setting '{}'", other),
                })
            },
        }
    }
}

/// A raw, not yet validated setting value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigValue {
    /// A textual value
    Text(String),
    /// An integral value
    Integer(i64),
    /// The explicit "not supplied" marker
    #[default]
    Absent,
}

impl ConfigValue {
    /// Returns true for the explicit absent marker.
    pub const fn is_absent(&self) -> bool { matches!(self, Self::Absent) }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self { Self::Text(value.to_owned()) }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self { Self::Text(value) }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self { Self::Integer(value) }
}

impl From<u16> for ConfigValue {
    fn from(value: u16) -> Self { Self::Integer(i64::from(value)) }
}

impl<T> From<Option<T>> for ConfigValue
where
    T: Into<Self>,
{
    fn from(value: Option<T>) -> Self { value.map_or(Self::Absent, Into::into) }
}

/// Unresolved constructor arguments in both calling conventions.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionArgs {
    /// Values in [`ConfigKey::LEGACY_ORDER`].
    positional: Vec<ConfigValue>,
    /// Keyword values, applied in insertion order.
    named:      Vec<(ConfigKey, ConfigValue)>,
}

impl fmt::Debug for ConnectionArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let named: Vec<&str> = self.named.iter().map(|&(key, _)| key.as_str()).collect();
        f.debug_struct("ConnectionArgs")
            .field("positional", &self.positional.len())
            .field("named", &named)
            .finish()
    }
}

impl ConnectionArgs {
    /// Creates an empty argument set; resolving it yields the defaults.
    pub fn new() -> Self { Self::default() }

    /// Appends the next legacy positional value.
    pub fn positional<V>(mut self, value: V) -> Self
    where
        V: Into<ConfigValue>,
    {
        self.positional.push(value.into());
        self
    }

    /// Sets a named value. Named values win over positional ones unless absent.
    pub fn named<V>(mut self, key: ConfigKey, value: V) -> Self
    where
        V: Into<ConfigValue>,
    {
        self.named.push((key, value.into()));
        self
    }

    /// Merges the arguments over the defaults into a validated configuration.
    pub fn resolve(&self) -> Result<ConnectionConfig> {
        let mut slots = default_slots();

        if self.positional.len() > ConfigKey::LEGACY_ORDER.len() {
            warn!(
                "Ignoring {} positional connection arguments beyond the auth_source slot",
                self.positional.len().saturating_sub(ConfigKey::LEGACY_ORDER.len())
            );
        }
        for (&key, value) in ConfigKey::LEGACY_ORDER.iter().zip(&self.positional) {
            slots.insert(key, value.clone());
        }
        for &(key, ref value) in &self.named {
            if !value.is_absent() {
                slots.insert(key, value.clone());
            }
        }

        let username = required_text(take(&mut slots, ConfigKey::Username), ConfigKey::Username)?;
        let password = required_text(take(&mut slots, ConfigKey::Password), ConfigKey::Password)?;
        let host = required_text(take(&mut slots, ConfigKey::Host), ConfigKey::Host)?;
        let port = coerce_port(take(&mut slots, ConfigKey::Port))?;
        let database = required_text(take(&mut slots, ConfigKey::Database), ConfigKey::Database)?;
        let collection = required_text(take(&mut slots, ConfigKey::Collection), ConfigKey::Collection)?;
        let auth_source = optional_text(take(&mut slots, ConfigKey::AuthSource)).unwrap_or_else(|| database.clone());

        let config = ConnectionConfig {
            username,
            password: Password::new(password),
            host,
            port,
            database,
            collection,
            auth_source,
            server_selection_timeout: SERVER_SELECTION_TIMEOUT,
        };
        trace!("Resolved connection configuration: {}", config);
        Ok(config)
    }
}

/// Built-in defaults. The password has none and must be supplied.
fn default_slots() -> BTreeMap<ConfigKey, ConfigValue> {
    BTreeMap::from([
        (ConfigKey::Username, ConfigValue::from(DEFAULT_USERNAME)),
        (ConfigKey::Password, ConfigValue::Absent),
        (ConfigKey::Host, ConfigValue::from(DEFAULT_HOST)),
        (ConfigKey::Port, ConfigValue::Integer(DEFAULT_PORT)),
        (ConfigKey::Database, ConfigValue::from(DEFAULT_DATABASE)),
        (ConfigKey::Collection, ConfigValue::from(DEFAULT_COLLECTION)),
        (ConfigKey::AuthSource, ConfigValue::Absent),
    ])
}

fn take(slots: &mut BTreeMap<ConfigKey, ConfigValue>, key: ConfigKey) -> ConfigValue {
    slots.remove(&key).unwrap_or_default()
}

fn optional_text(value: ConfigValue) -> Option<String> {
    match value {
        ConfigValue::Text(text) if !text.is_empty() => Some(text),
        ConfigValue::Integer(number) => Some(number.to_string()),
        ConfigValue::Text(_) | ConfigValue::Absent => None,
    }
}

fn required_text(value: ConfigValue, key: ConfigKey) -> Result<String> {
    optional_text(value).ok_or_else(|| {
        ShelterError::ConfigError {
            message: format!("missing required connection setting '{}'", key),
        }
    })
}

fn coerce_port(value: ConfigValue) -> Result<u16> {
    let invalid = |shown: String| {
        ShelterError::ConfigError {
            message: format!("port must be an integer between 0 and 65535, got {}", shown),
        }
    };
    match value {
        ConfigValue::Integer(number) => u16::try_from(number).map_err(|_| invalid(number.to_string())),
        ConfigValue::Text(text) => text.trim().parse::<u16>().map_err(|_| invalid(format!("'{}'", text))),
        ConfigValue::Absent => Err(invalid("nothing".to_owned())),
    }
}

/// A login secret. Redacted in `Debug` output and wiped from memory on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(Zeroizing<String>);

impl Password {
    /// Wraps a secret.
    pub fn new(secret: String) -> Self { Self(Zeroizing::new(secret)) }

    /// Returns the secret for handing to the driver.
    pub fn expose(&self) -> &str { self.0.as_str() }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("Password(***)") }
}

/// A fully resolved, immutable connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(
    clippy::field_scoped_visibility_modifiers,
    reason = "fields need to be pub(crate) for internal access"
)]
pub struct ConnectionConfig {
    pub(crate) username:                 String,
    pub(crate) password:                 Password,
    pub(crate) host:                     String,
    pub(crate) port:                     u16,
    pub(crate) database:                 String,
    pub(crate) collection:               String,
    pub(crate) auth_source:              String,
    pub(crate) server_selection_timeout: Duration,
}

impl ConnectionConfig {
    /// Login name.
    pub fn username(&self) -> &str { &self.username }

    /// Login secret.
    pub const fn password(&self) -> &Password { &self.password }

    /// Server host.
    pub fn host(&self) -> &str { &self.host }

    /// Server port.
    pub const fn port(&self) -> u16 { self.port }

    /// Database holding the collection.
    pub fn database(&self) -> &str { &self.database }

    /// Collection the accessor operates on.
    pub fn collection(&self) -> &str { &self.collection }

    /// Database the credentials are validated against.
    pub fn auth_source(&self) -> &str { &self.auth_source }

    /// Upper bound on server selection during connection.
    pub const fn server_selection_timeout(&self) -> Duration { self.server_selection_timeout }
}

impl fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mongodb://{}@{}:{}/{}.{}?authSource={}",
            self.username, self.host, self.port, self.database, self.collection, self.auth_source
        )
    }
}
