use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::MySqlPool;
use tokio::sync::{oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{Document, RecordStore, Snapshot, SnapshotEvent, SnapshotSender, StoreError, Subscription};
use crate::model::{EmployeeId, EmployeePatch, EmployeeRecord};

/// Document collection kept in a MySQL table with a JSON column.
///
/// Listeners poll the table every `poll_interval`, and immediately after a
/// write made through this store, and emit a snapshot whenever the document
/// set differs from the last one they delivered.
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
    table: String,
    poll_interval: Duration,
    writes: WriteSignal,
}

/// Counter bumped after every local write. Listeners hold a receiver, so a
/// write that lands while a listener is busy fetching is seen on its next wait.
#[derive(Clone)]
struct WriteSignal(Arc<watch::Sender<u64>>);

impl WriteSignal {
    fn new() -> Self {
        let (sender, _) = watch::channel(0);
        Self(Arc::new(sender))
    }

    fn bump(&self) {
        self.0.send_modify(|writes| *writes = writes.wrapping_add(1));
    }

    fn listen(&self) -> watch::Receiver<u64> {
        self.0.subscribe()
    }
}

/// Collection names end up in SQL text, so only plain identifiers are allowed.
pub fn is_valid_collection_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

fn transport(err: sqlx::Error) -> StoreError {
    StoreError::Transport(err.to_string())
}

impl MySqlStore {
    pub fn new(
        pool: MySqlPool,
        collection: &str,
        poll_interval: Duration,
    ) -> Result<Self, StoreError> {
        if !is_valid_collection_name(collection) {
            return Err(StoreError::InvalidCollection(collection.to_string()));
        }
        Ok(Self {
            pool,
            table: collection.to_string(),
            poll_interval,
            writes: WriteSignal::new(),
        })
    }

    /// Create the backing table when it does not exist yet.
    pub async fn ensure_collection(&self) -> Result<(), StoreError> {
        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id VARCHAR(64) NOT NULL PRIMARY KEY,
                document JSON NOT NULL,
                created_at TIMESTAMP(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6),
                updated_at TIMESTAMP(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6)
                    ON UPDATE CURRENT_TIMESTAMP(6)
            )
            "#,
            self.table
        );
        sqlx::query(&sql).execute(&self.pool).await.map_err(|e| {
            error!(error = %e, table = %self.table, "Failed to create collection table");
            transport(e)
        })?;
        info!(table = %self.table, "Collection table ready");
        Ok(())
    }
}

async fn fetch_snapshot(pool: &MySqlPool, table: &str) -> Result<Snapshot, StoreError> {
    let sql = format!(
        "SELECT id, CAST(document AS CHAR) AS document FROM {} ORDER BY created_at, id",
        table
    );
    let rows = sqlx::query_as::<_, (String, String)>(&sql)
        .fetch_all(pool)
        .await
        .map_err(transport)?;

    let documents = rows
        .into_iter()
        .map(|(id, body)| {
            let data = match serde_json::from_str::<Value>(&body) {
                Ok(Value::Object(fields)) => fields,
                Ok(_) | Err(_) => {
                    warn!(document_id = %id, "Stored document is not a JSON object");
                    Map::new()
                }
            };
            Document {
                id: EmployeeId::new(id),
                data,
            }
        })
        .collect();

    Ok(Snapshot { documents })
}

async fn poll_collection(
    pool: MySqlPool,
    table: String,
    poll_interval: Duration,
    writes: WriteSignal,
    mut written: watch::Receiver<u64>,
    sender: SnapshotSender,
    mut stop: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last: Option<Snapshot> = None;

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = ticker.tick() => {}
            // The store's own signal is held in `writes`, so this never errors.
            _ = written.changed() => {}
        }

        match fetch_snapshot(&pool, &table).await {
            Ok(snapshot) => {
                if last.as_ref() == Some(&snapshot) {
                    continue;
                }
                debug!(table = %table, documents = snapshot.documents.len(), "Collection changed");
                if sender.send(SnapshotEvent::Snapshot(snapshot.clone())).is_err() {
                    break;
                }
                last = Some(snapshot);
            }
            Err(err) => {
                warn!(error = %err, table = %table, "Listener failed");
                let _ = sender.send(SnapshotEvent::Error(err));
                break;
            }
        }
    }

    drop(writes);
    debug!(table = %table, "Listener stopped");
}

#[async_trait]
impl RecordStore for MySqlStore {
    /// Spawns the polling listener, so it must be called inside a tokio runtime.
    fn subscribe(&self) -> Subscription {
        let (stop_tx, stop_rx) = oneshot::channel();
        let (sender, subscription) = Subscription::channel(move || {
            let _ = stop_tx.send(());
        });

        tokio::spawn(poll_collection(
            self.pool.clone(),
            self.table.clone(),
            self.poll_interval,
            self.writes.clone(),
            self.writes.listen(),
            sender,
            stop_rx,
        ));

        subscription
    }

    async fn create(&self, record: &EmployeeRecord) -> Result<EmployeeId, StoreError> {
        let id = EmployeeId::new(Uuid::new_v4().to_string());
        let body = serde_json::to_string(record)?;
        let sql = format!(
            "INSERT INTO {} (id, document) VALUES (?, CAST(? AS JSON))",
            self.table
        );

        sqlx::query(&sql)
            .bind(id.as_str())
            .bind(body)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, table = %self.table, "Failed to insert document");
                transport(e)
            })?;

        self.writes.bump();
        Ok(id)
    }

    async fn update(&self, id: &EmployeeId, patch: &EmployeePatch) -> Result<(), StoreError> {
        let fields = serde_json::to_string(&patch.to_fields()?)?;
        let sql = format!(
            "UPDATE {} SET document = JSON_MERGE_PATCH(document, CAST(? AS JSON)) WHERE id = ?",
            self.table
        );
        debug!(sql = %sql, employee_id = %id, "Merging document");

        let result = sqlx::query(&sql)
            .bind(fields)
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, employee_id = %id, "Failed to update document");
                transport(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.clone()));
        }

        self.writes.bump();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_names_must_be_plain_identifiers() {
        assert!(is_valid_collection_name("employees"));
        assert!(is_valid_collection_name("employees_2025"));
        assert!(!is_valid_collection_name(""));
        assert!(!is_valid_collection_name("9employees"));
        assert!(!is_valid_collection_name("employees; DROP TABLE x"));
        assert!(!is_valid_collection_name("emp-loyees"));
        assert!(!is_valid_collection_name(&"a".repeat(65)));
    }

    #[tokio::test]
    async fn write_before_wait_is_not_lost() {
        let writes = WriteSignal::new();
        let mut written = writes.listen();

        writes.bump();
        tokio::time::timeout(Duration::from_millis(100), written.changed())
            .await
            .expect("write went unnoticed")
            .unwrap();

        assert!(
            tokio::time::timeout(Duration::from_millis(20), written.changed())
                .await
                .is_err()
        );
    }
}
