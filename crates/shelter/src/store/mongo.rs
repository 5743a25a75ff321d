use async_trait::async_trait;
use futures::TryStreamExt as _;
use mongodb::{
    bson::{doc, Bson, Document},
    options::{
        AuthMechanism,
        ClientOptions,
        Credential,
        FindOneAndUpdateOptions,
        FindOptions,
        ReturnDocument,
        ServerAddress,
        UpdateOptions,
    },
    Client,
    Collection,
};
use tracing::{debug, error, trace};

use crate::{
    constants::{APP_NAME, COUNTERS_COLLECTION, COUNTER_VALUE_FIELD, ID_FIELD},
    ConnectionConfig,
    Result,
    ShelterError,
};
use super::{DocumentStore, DocumentStream, FindSpec, InsertOutcome};

/// A [`DocumentStore`] bound to one collection on a MongoDB server.
///
/// The driver's `Client` owns a connection pool and is safe to share across
/// tasks; this type adds no locking of its own.
#[derive(Debug, Clone)]
pub struct MongoStore {
    /// Driver handle for the whole deployment.
    client:     Client,
    /// Database the liveness check runs against.
    database:   String,
    /// Collection all CRUD traffic targets.
    collection: Collection<Document>,
    /// Sequence counters, one document per counted collection and name.
    counters:   Collection<Document>,
}

impl MongoStore {
    /// Opens an authenticated session for `config` and verifies it with a ping.
    ///
    /// The client authenticates with SCRAM-SHA-256 against the configured auth
    /// source and gives up on server selection after the configured timeout.
    /// The ping runs before this returns, so bad credentials and unreachable
    /// hosts fail here rather than on first use.
    ///
    /// # Errors
    ///
    /// Returns `ShelterError::ConnectionFailed` wrapping the driver error when
    /// the client cannot be built or the ping fails.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        trace!("Connecting to {}", config);
        let store = Self::open(config).map_err(|e| {
            error!("Failed to create MongoDB client for {}: {}", config, e);
            ShelterError::connection(e)
        })?;
        store.ping().await.map_err(|e| {
            error!("MongoDB liveness check failed for {}: {}", config, e);
            ShelterError::connection(e)
        })?;
        debug!("Connected to {}", config);
        Ok(store)
    }

    /// Builds the client without touching the network.
    fn open(config: &ConnectionConfig) -> Result<Self> {
        let credential = Credential::builder()
            .username(config.username().to_owned())
            .password(config.password().expose().to_owned())
            .source(config.auth_source().to_owned())
            .mechanism(AuthMechanism::ScramSha256)
            .build();
        let options = ClientOptions::builder()
            .hosts(vec![ServerAddress::Tcp {
                host: config.host().to_owned(),
                port: Some(config.port()),
            }])
            .credential(credential)
            .server_selection_timeout(config.server_selection_timeout())
            .app_name(APP_NAME.to_owned())
            .build();
        let client = Client::with_options(options)?;
        let database = client.database(config.database());
        let collection = database.collection::<Document>(config.collection());
        let counters = database.collection::<Document>(COUNTERS_COLLECTION);
        Ok(Self {
            client,
            database: config.database().to_owned(),
            collection,
            counters,
        })
    }

    /// Returns the underlying driver client.
    pub const fn client(&self) -> &Client { &self.client }

    /// Counter documents are keyed by `<collection>.<counter>` so collections
    /// sharing a database keep separate sequences.
    fn counter_filter(&self, counter: &str) -> Document {
        let mut filter = Document::new();
        filter.insert(ID_FIELD, format!("{}.{}", self.collection.name(), counter));
        filter
    }
}

/// Reads the value field of a counter document.
fn counter_of(doc: &Document) -> Result<i64> {
    match doc.get(COUNTER_VALUE_FIELD) {
        Some(&Bson::Int64(n)) => Ok(n),
        Some(&Bson::Int32(n)) => Ok(i64::from(n)),
        other => {
            Err(ShelterError::InvalidRecordNumber {
                value: other.map_or_else(|| "nothing".to_owned(), ToString::to_string),
            })
        },
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn ping(&self) -> Result<()> {
        self.client.database(&self.database).run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn find(&self, filter: Document, spec: FindSpec) -> Result<DocumentStream> {
        let mut options = FindOptions::default();
        options.projection = spec.projection;
        options.sort = spec.sort;
        options.limit = spec.limit;

        let cursor = self.collection.find(filter).with_options(options).await?;
        Ok(Box::pin(cursor.map_err(ShelterError::from)))
    }

    async fn insert_one(&self, document: Document) -> Result<InsertOutcome> {
        let result = self.collection.insert_one(document).await?;
        // No write concern is configured, so the server default (w: 1) applies.
        Ok(InsertOutcome {
            acknowledged: true,
            inserted_id:  Some(result.inserted_id),
        })
    }

    async fn update_many(&self, filter: Document, update: Document) -> Result<u64> {
        let result = self.collection.update_many(filter, update).await?;
        Ok(result.modified_count)
    }

    async fn delete_many(&self, filter: Document) -> Result<u64> {
        let result = self.collection.delete_many(filter).await?;
        Ok(result.deleted_count)
    }

    async fn counter_value(&self, counter: &str) -> Result<Option<i64>> {
        let found = self.counters.find_one(self.counter_filter(counter)).await?;
        found.as_ref().map(counter_of).transpose()
    }

    async fn advance_counter(&self, counter: &str, floor: i64) -> Result<i64> {
        let filter = self.counter_filter(counter);

        let mut at_least = Document::new();
        at_least.insert(COUNTER_VALUE_FIELD, floor);
        let mut raise = Document::new();
        raise.insert("$max", at_least);
        let mut upsert = UpdateOptions::default();
        upsert.upsert = Some(true);
        self.counters
            .update_one(filter.clone(), raise)
            .with_options(upsert)
            .await?;

        let mut by_one = Document::new();
        by_one.insert(COUNTER_VALUE_FIELD, 1_i64);
        let mut increment = Document::new();
        increment.insert("$inc", by_one);
        let mut options = FindOneAndUpdateOptions::default();
        options.upsert = Some(true);
        options.return_document = Some(ReturnDocument::After);
        let updated = self
            .counters
            .find_one_and_update(filter, increment)
            .with_options(options)
            .await?
            .ok_or_else(|| {
                ShelterError::Internal {
                    message: format!("counter {} was not returned after increment", counter),
                }
            })?;
        let value = counter_of(&updated)?;
        trace!("Counter {} advanced to {}", counter, value);
        Ok(value)
    }
}
