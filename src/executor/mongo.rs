use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::{
    bson::{self, doc, Bson, Document as BsonDocument},
    Client, Database,
};
use tracing::{debug, info};

use crate::{
    catalog::BackendKind,
    executor::{AggregateOptions, DocumentClient, ExecutionError},
    value::DataValue,
};

/// MongoDB driver for the document panels.
///
/// The client discovers servers lazily, so `connect` only parses the URI;
/// the first command is what reaches the server.
pub struct MongoDocumentClient {
    client: Client,
    database: Database,
    name: String,
}

impl MongoDocumentClient {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, ExecutionError> {
        let client = Client::with_uri_str(uri).await.map_err(connection)?;
        info!(database, "document client configured");
        Ok(Self { database: client.database(database), client, name: database.to_string() })
    }
}

fn connection(error: mongodb::error::Error) -> ExecutionError {
    ExecutionError::connection(BackendKind::Document, error)
}

fn backend(error: mongodb::error::Error) -> ExecutionError {
    ExecutionError::backend(BackendKind::Document, error)
}

#[async_trait]
impl DocumentClient for MongoDocumentClient {
    fn database(&self) -> &str {
        &self.name
    }

    async fn aggregate(
        &self,
        collection: &str,
        stages: &[DataValue],
        options: &AggregateOptions,
    ) -> Result<Vec<DataValue>, ExecutionError> {
        let pipeline = stages.iter().map(to_stage).collect::<Result<Vec<_>, _>>()?;
        debug!(collection, stages = pipeline.len(), allow_disk_use = options.allow_disk_use, "aggregating on server");

        let mut cursor = self
            .database
            .collection::<BsonDocument>(collection)
            .aggregate(pipeline)
            .allow_disk_use(options.allow_disk_use)
            .await
            .map_err(backend)?;

        let mut documents = Vec::new();
        while cursor.advance().await.map_err(backend)? {
            let current = cursor.deserialize_current().map_err(backend)?;
            documents.push(from_bson(Bson::Document(current)));
        }
        Ok(documents)
    }

    async fn list_collections(&self) -> Result<Vec<String>, ExecutionError> {
        self.database.list_collection_names().await.map_err(connection)
    }

    async fn estimated_document_count(&self, collection: &str) -> Result<u64, ExecutionError> {
        self.database
            .collection::<BsonDocument>(collection)
            .estimated_document_count()
            .await
            .map_err(backend)
    }

    async fn storage_size(&self) -> Result<u64, ExecutionError> {
        let stats = self.database.run_command(doc! { "dbStats": 1 }).await.map_err(backend)?;
        Ok(stats.get("storageSize").and_then(bson_to_u64).unwrap_or(0))
    }

    async fn server_version(&self) -> Result<Option<String>, ExecutionError> {
        let info = self.client.database("admin").run_command(doc! { "buildInfo": 1 }).await.map_err(backend)?;
        Ok(info.get_str("version").ok().map(str::to_string))
    }
}

fn to_stage(stage: &DataValue) -> Result<BsonDocument, ExecutionError> {
    match to_bson(stage) {
        Bson::Document(doc) => Ok(doc),
        other => Err(ExecutionError::Unsupported(format!("pipeline stage must be a document, got {other}"))),
    }
}

/// Bound pipeline value to BSON. Dates become midnight UTC datetimes.
pub fn to_bson(value: &DataValue) -> Bson {
    match value {
        DataValue::Null => Bson::Null,
        DataValue::Bool(b) => Bson::Boolean(*b),
        DataValue::Int(i) => Bson::Int64(*i),
        DataValue::Float(f) => Bson::Double(*f),
        DataValue::Text(s) => Bson::String(s.clone()),
        DataValue::Date(d) => {
            let millis = d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp_millis()).unwrap_or_default();
            Bson::DateTime(bson::DateTime::from_millis(millis))
        }
        DataValue::Timestamp(ts) => Bson::DateTime(bson::DateTime::from_millis(ts.timestamp_millis())),
        DataValue::Array(items) => Bson::Array(items.iter().map(to_bson).collect()),
        DataValue::Document(fields) => {
            Bson::Document(fields.iter().map(|(k, v)| (k.clone(), to_bson(v))).collect())
        }
    }
}

/// Server value to the shared value model. Object ids and decimals come back
/// as text; decimals that parse as floats become floats.
pub fn from_bson(value: Bson) -> DataValue {
    match value {
        Bson::Null | Bson::Undefined => DataValue::Null,
        Bson::Boolean(b) => DataValue::Bool(b),
        Bson::Int32(i) => DataValue::Int(i64::from(i)),
        Bson::Int64(i) => DataValue::Int(i),
        Bson::Double(f) => DataValue::Float(f),
        Bson::String(s) => DataValue::Text(s),
        Bson::DateTime(dt) => DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis())
            .map(DataValue::Timestamp)
            .unwrap_or(DataValue::Null),
        Bson::ObjectId(oid) => DataValue::Text(oid.to_hex()),
        Bson::Decimal128(d) => {
            let text = d.to_string();
            text.parse::<f64>().map(DataValue::Float).unwrap_or(DataValue::Text(text))
        }
        Bson::Array(items) => DataValue::Array(items.into_iter().map(from_bson).collect()),
        Bson::Document(doc) => DataValue::Document(doc.into_iter().map(|(k, v)| (k, from_bson(v))).collect()),
        other => DataValue::Text(other.to_string()),
    }
}

fn bson_to_u64(value: &Bson) -> Option<u64> {
    match value {
        Bson::Int32(i) => u64::try_from(*i).ok(),
        Bson::Int64(i) => u64::try_from(*i).ok(),
        Bson::Double(f) if *f >= 0.0 => Some(*f as u64),
        _ => None,
    }
}
