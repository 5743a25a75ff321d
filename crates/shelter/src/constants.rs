//! Constants for field names, connection defaults and driver settings.
//!
//! Centralised here so the resolver, the accessor and the stores agree on the
//! same names.

use std::time::Duration;

/// Field holding the store-assigned document identifier.
pub const ID_FIELD: &str = "_id";

/// Field holding the application-assigned record number.
pub const REC_NUM_FIELD: &str = "rec_num";

/// Collection holding the per-collection sequence counters.
pub const COUNTERS_COLLECTION: &str = "counters";

/// Field of a counter document holding the last value handed out.
pub const COUNTER_VALUE_FIELD: &str = "seq";

/// First record number handed out in an empty collection.
pub const FIRST_REC_NUM: i64 = 1;

/// Default login name.
pub const DEFAULT_USERNAME: &str = "aacuser";

/// Default server host (loopback).
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default MongoDB port.
pub const DEFAULT_PORT: i64 = 27017;

/// Default database name.
pub const DEFAULT_DATABASE: &str = "aac";

/// Default collection name.
pub const DEFAULT_COLLECTION: &str = "animals";

/// How long the driver may spend selecting a server before giving up.
pub const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(8);

/// Application name reported to the server in the connection handshake.
pub const APP_NAME: &str = "shelter-dbms";
