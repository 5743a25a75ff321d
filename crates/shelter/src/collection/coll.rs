use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, trace};

use crate::{
    store::{DocumentStore, MongoStore},
    ConnectionArgs,
    ConnectionConfig,
    Result,
    ShelterError,
};

/// CRUD access to the shelter's animal collection.
///
/// An `AnimalShelter` owns a live, verified handle to one collection and layers
/// an application-level record number (`rec_num`) over it: every document
/// created through the accessor receives the next integer after the highest
/// `rec_num` already stored, starting at 1.
///
/// Construction resolves the connection arguments, opens an authenticated
/// session and pings the database, so a value of this type always refers to a
/// reachable store.
///
/// # Record numbering and concurrency
///
/// Each created document takes its `rec_num` from a counter kept by the store
/// next to the collection. The counter is raised to the highest stored
/// `rec_num` and incremented in one atomic step, so numbers are never reused
/// after a delete and stay distinct across accessors and processes sharing
/// the collection. Within one accessor an async mutex additionally keeps the
/// numbers of a single `create` list consecutive.
///
/// # Example
///
/// ```no_run
/// use futures::TryStreamExt as _;
/// use shelter::{bson::doc, AnimalShelter, ConfigKey, ConnectionArgs};
///
/// # async fn example() -> shelter::Result<()> {
/// let args = ConnectionArgs::new()
///     .positional("aacuser")
///     .named(ConfigKey::Password, std::env::var("SHELTER_PASSWORD").unwrap_or_default())
///     .named(ConfigKey::Host, "db.internal");
/// let shelter = AnimalShelter::connect(&args).await?;
///
/// shelter.create(doc! { "name": "Rex", "animal_type": "Dog" }).await?;
/// let dogs: Vec<_> = shelter
///     .read(Some(doc! { "animal_type": "Dog" }))
///     .await?
///     .try_collect()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
#[allow(
    clippy::field_scoped_visibility_modifiers,
    reason = "fields need to be pub(crate) for internal access"
)]
pub struct AnimalShelter {
    /// The configuration the session was opened with.
    pub(crate) config:    ConnectionConfig,
    /// The verified store handle.
    pub(crate) store:     Arc<dyn DocumentStore>,
    /// Keeps one `create` call's numbers and inserts together.
    pub(crate) numbering: Mutex<()>,
}

impl AnimalShelter {
    /// Resolves `args`, connects to MongoDB and verifies the session.
    ///
    /// # Errors
    ///
    /// - `ShelterError::ConfigError` if the arguments do not resolve (for
    ///   example, no password was supplied or the port is not an integer).
    /// - `ShelterError::ConnectionFailed` if the client cannot be created or the
    ///   liveness ping fails, wrapping the driver's error.
    pub async fn connect(args: &ConnectionArgs) -> Result<Self> {
        let config = args.resolve()?;
        let store = MongoStore::connect(&config).await?;
        Ok(Self::from_parts(Arc::new(store), config))
    }

    /// Builds an accessor over an already constructed store, verifying it with
    /// a ping first.
    ///
    /// # Errors
    ///
    /// Returns `ShelterError::ConnectionFailed` wrapping the ping failure.
    pub async fn with_store(store: Arc<dyn DocumentStore>, config: ConnectionConfig) -> Result<Self> {
        trace!("Verifying store for {}", config);
        store.ping().await.map_err(|e| {
            error!("Liveness check failed for {}: {}", config, e);
            ShelterError::connection(e)
        })?;
        Ok(Self::from_parts(store, config))
    }

    fn from_parts(store: Arc<dyn DocumentStore>, config: ConnectionConfig) -> Self {
        debug!("Animal shelter accessor ready on {}", config);
        Self {
            config,
            store,
            numbering: Mutex::new(()),
        }
    }

    /// Returns the resolved connection configuration.
    pub const fn config(&self) -> &ConnectionConfig { &self.config }

    /// Returns the name of the collection this accessor operates on.
    pub fn name(&self) -> &str { self.config.collection() }
}
