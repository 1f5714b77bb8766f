//! MongoDB storage backend using the official MongoDB async driver.
//!
//! Two pieces live here:
//!
//! - [`MongoConnectionManager`] owns the single process-wide client. The
//!   client is created on first use (or eagerly at startup), verified with a
//!   `ping`, and then reused by every request. A failed connection attempt
//!   leaves nothing cached, so the next call starts over.
//! - [`MongoOrderRepository`] implements [`OrderRepository`] on top of it.
//!
//! # Storage model
//!
//! Orders are stored in one collection (name from configuration) with
//! MongoDB's `_id` as the identifier and camelCase field names:
//!
//! ```json
//! { "_id": ObjectId, "pizza": "...", "size": "mediana", "contactInfo": "...",
//!   "status": "pendiente", "createdAt": Date, "updatedAt": Date }
//! ```
//!
//! Timestamps are stored as native BSON dates so that `createdAt` sorts
//! chronologically.

use crate::config::MongoConfig;
use crate::core::error::{ApiResult, StorageError};
use crate::core::order::{Order, OrderDocument, OrderId, OrderStatus, OrderUpdate, PizzaSize};
use crate::core::service::{LIST_LIMIT, OrderFilter, OrderRepository, UpdateOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{self, Document, doc};
use mongodb::options::{
    Acknowledgment, ClientOptions, ServerApi, ServerApiVersion, WriteConcern,
};
use mongodb::{Client, Collection, Database};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

const BACKEND: &str = "MongoDB";

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(10);
pub const MAX_POOL_SIZE: u32 = 10;
pub const MIN_POOL_SIZE: u32 = 1;
pub const MAX_IDLE_TIME: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Connection manager
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct MongoHandle {
    client: Client,
    database: Database,
}

/// Owner of the cached MongoDB client
///
/// Construct once at process start, share through an `Arc`.
///
/// ```rust,ignore
/// let manager = Arc::new(MongoConnectionManager::new(config.mongodb.clone()));
/// manager.connect().await?;                  // optional warm-up
/// let repo = MongoOrderRepository::new(manager.clone());
/// // ...
/// manager.close().await;                     // at shutdown
/// ```
pub struct MongoConnectionManager {
    config: MongoConfig,
    handle: RwLock<Option<MongoHandle>>,
}

impl MongoConnectionManager {
    pub fn new(config: MongoConfig) -> Self {
        Self {
            config,
            handle: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &MongoConfig {
        &self.config
    }

    /// Whether a verified handle is currently cached
    pub async fn is_connected(&self) -> bool {
        self.handle.read().await.is_some()
    }

    /// Return the cached database handle, opening and verifying a new
    /// connection if none is cached
    pub async fn connect(&self) -> Result<Database, StorageError> {
        if let Some(handle) = self.handle.read().await.as_ref() {
            tracing::trace!("reusing cached MongoDB connection");
            return Ok(handle.database.clone());
        }

        let mut cached = self.handle.write().await;
        if let Some(handle) = cached.as_ref() {
            return Ok(handle.database.clone());
        }

        tracing::info!(database = %self.config.database, "opening MongoDB connection");
        match self.open().await {
            Ok(handle) => {
                let database = handle.database.clone();
                *cached = Some(handle);
                tracing::info!("connected to MongoDB");
                Ok(database)
            }
            Err(e) => {
                *cached = None;
                tracing::error!("{}", e);
                Err(e)
            }
        }
    }

    /// Typed handle on the configured orders collection
    pub async fn collection<T>(&self) -> Result<Collection<T>, StorageError>
    where
        T: Send + Sync,
    {
        let database = self.connect().await?;
        Ok(database.collection::<T>(&self.config.collection))
    }

    /// Release the cached client; no-op when nothing is cached
    pub async fn close(&self) {
        let handle = self.handle.write().await.take();
        if let Some(handle) = handle {
            handle.client.shutdown().await;
            tracing::info!("MongoDB connection closed");
        }
    }

    async fn open(&self) -> Result<MongoHandle, StorageError> {
        let mut options = ClientOptions::parse(&self.config.uri)
            .await
            .map_err(connection_error)?;

        options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
        options.server_api = Some(
            ServerApi::builder()
                .version(ServerApiVersion::V1)
                .strict(true)
                .deprecation_errors(true)
                .build(),
        );
        // Options given in the connection string win over these defaults
        options.connect_timeout.get_or_insert(CONNECT_TIMEOUT);
        options.server_selection_timeout.get_or_insert(SERVER_SELECTION_TIMEOUT);
        options.max_pool_size.get_or_insert(MAX_POOL_SIZE);
        options.min_pool_size.get_or_insert(MIN_POOL_SIZE);
        options.max_idle_time.get_or_insert(MAX_IDLE_TIME);
        options.retry_reads.get_or_insert(true);
        options.retry_writes.get_or_insert(true);
        options
            .write_concern
            .get_or_insert_with(|| WriteConcern::builder().w(Acknowledgment::Majority).build());

        let client = Client::with_options(options).map_err(connection_error)?;
        let database = client.database(&self.config.database);

        let ping = tokio::time::timeout(
            CONNECT_TIMEOUT + SERVER_SELECTION_TIMEOUT,
            database.run_command(doc! { "ping": 1 }),
        )
        .await;

        match ping {
            Ok(Ok(_)) => Ok(MongoHandle { client, database }),
            Ok(Err(e)) => {
                client.shutdown().await;
                Err(connection_error(e))
            }
            Err(_) => {
                client.shutdown().await;
                Err(StorageError::Connection {
                    backend: BACKEND,
                    message: "liveness check timed out".to_string(),
                })
            }
        }
    }
}

fn connection_error(e: mongodb::error::Error) -> StorageError {
    StorageError::Connection {
        backend: BACKEND,
        message: e.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Stored representation
// ---------------------------------------------------------------------------

/// Order as stored in the collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    pizza: String,
    size: PizzaSize,
    contact_info: String,
    status: OrderStatus,
    created_at: bson::DateTime,
    updated_at: bson::DateTime,
}

impl From<OrderDocument> for OrderRecord {
    fn from(document: OrderDocument) -> Self {
        Self {
            id: None,
            pizza: document.pizza,
            size: document.size,
            contact_info: document.contact_info,
            status: document.status,
            created_at: to_bson_date(document.created_at),
            updated_at: to_bson_date(document.updated_at),
        }
    }
}

impl TryFrom<OrderRecord> for Order {
    type Error = StorageError;

    fn try_from(record: OrderRecord) -> Result<Self, Self::Error> {
        let id = record.id.ok_or_else(|| StorageError::Integrity {
            message: "stored order has no _id".to_string(),
        })?;

        Ok(Order {
            id: OrderId::from(id),
            pizza: record.pizza,
            size: record.size,
            contact_info: record.contact_info,
            status: record.status,
            created_at: from_bson_date(record.created_at)?,
            updated_at: from_bson_date(record.updated_at)?,
        })
    }
}

fn to_bson_date(dt: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(dt.timestamp_millis())
}

fn from_bson_date(dt: bson::DateTime) -> Result<DateTime<Utc>, StorageError> {
    DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis()).ok_or_else(|| {
        StorageError::Integrity {
            message: format!("timestamp out of range: {}", dt.timestamp_millis()),
        }
    })
}

/// Newest first; ObjectIds break ties between orders stamped in the same
/// millisecond, matching the in-memory repository
fn list_sort() -> Document {
    doc! { "createdAt": -1, "_id": -1 }
}

/// Translate an exact-match filter into a query document
///
/// Returns `None` when the filter can never match (an `id` that is not an
/// ObjectId).
fn filter_document(filter: &OrderFilter) -> Option<Document> {
    let mut query = Document::new();
    for (field, value) in filter.iter() {
        match field {
            "id" | "_id" => {
                let oid = value.parse::<OrderId>().ok()?.object_id();
                query.insert("_id", oid);
            }
            _ => {
                query.insert(field, value);
            }
        }
    }
    Some(query)
}

// ---------------------------------------------------------------------------
// MongoOrderRepository
// ---------------------------------------------------------------------------

/// [`OrderRepository`] backed by a MongoDB collection
#[derive(Clone)]
pub struct MongoOrderRepository {
    manager: Arc<MongoConnectionManager>,
}

impl MongoOrderRepository {
    pub fn new(manager: Arc<MongoConnectionManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<MongoConnectionManager> {
        &self.manager
    }

    async fn collection<T: Send + Sync + DeserializeOwned>(
        &self,
    ) -> Result<Collection<T>, StorageError> {
        self.manager.collection::<T>().await
    }
}

#[async_trait]
impl OrderRepository for MongoOrderRepository {
    async fn create(&self, document: OrderDocument) -> ApiResult<Order> {
        let mut record = OrderRecord::from(document);

        let result = self
            .collection::<OrderRecord>()
            .await?
            .insert_one(&record)
            .await
            .map_err(|e| StorageError::operation("create", e))?;

        let id = result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| StorageError::Integrity {
                message: format!("unexpected inserted id {}", result.inserted_id),
            })?;
        record.id = Some(id);

        tracing::debug!(id = %id, "order inserted");
        Ok(Order::try_from(record)?)
    }

    async fn list_all(&self, filter: &OrderFilter) -> ApiResult<Vec<Order>> {
        let Some(query) = filter_document(filter) else {
            return Ok(Vec::new());
        };

        let records: Vec<OrderRecord> = self
            .collection::<OrderRecord>()
            .await?
            .find(query)
            .sort(list_sort())
            .limit(LIST_LIMIT as i64)
            .await
            .map_err(|e| StorageError::operation("list", e))?
            .try_collect()
            .await
            .map_err(|e| StorageError::operation("list", e))?;

        let orders = records
            .into_iter()
            .map(Order::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(orders)
    }

    async fn get_by_id(&self, id: &str) -> ApiResult<Option<Order>> {
        let id: OrderId = id.parse()?;

        let record = self
            .collection::<OrderRecord>()
            .await?
            .find_one(doc! { "_id": id.object_id() })
            .await
            .map_err(|e| StorageError::operation("fetch", e))?;

        Ok(record.map(Order::try_from).transpose()?)
    }

    async fn update_status(&self, id: &str, update: OrderUpdate) -> ApiResult<UpdateOutcome> {
        let id: OrderId = id.parse()?;

        let result = self
            .collection::<OrderRecord>()
            .await?
            .update_one(
                doc! { "_id": id.object_id() },
                doc! { "$set": {
                    "status": update.status.as_str(),
                    "updatedAt": to_bson_date(update.updated_at),
                } },
            )
            .await
            .map_err(|e| StorageError::operation("update", e))?;

        Ok(UpdateOutcome {
            matched: result.matched_count > 0,
            modified: result.modified_count,
        })
    }

    async fn delete(&self, id: &str) -> ApiResult<u64> {
        let id: OrderId = id.parse()?;

        let result = self
            .collection::<OrderRecord>()
            .await?
            .delete_one(doc! { "_id": id.object_id() })
            .await
            .map_err(|e| StorageError::operation("delete", e))?;

        Ok(result.deleted_count)
    }
}
