//! The materializer: change application plus observer registry.

use crate::error::{MaterializeError, MaterializeResult};
use crate::store::RelationalStore;
use offgrid_oplog::CellChange;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use tracing::{debug, warn};

/// The locally known shape of one replicated table.
///
/// Replicated tables carry a `TEXT PRIMARY KEY` column named `id` holding
/// the row identifier; `columns` lists the replicated value columns.
#[derive(Debug, Clone)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Replicated columns, excluding `id`.
    pub columns: Vec<String>,
}

impl TableSchema {
    /// Creates a schema entry.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<&str>) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(String::from).collect(),
        }
    }
}

/// Notification delivered to subscribers after changes are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    /// Tables whose materialized rows changed.
    pub tables: BTreeSet<String>,
}

type Callback = Arc<dyn Fn(&ChangeNotification) + Send + Sync>;
type Registry = RwLock<HashMap<u64, Callback>>;

/// Cancellation handle returned by [`Materializer::subscribe`].
///
/// Cancellation is explicit; dropping the handle leaves the subscription
/// active, so it can outlive any particular UI scope.
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Cancels the subscription. Returns false if it was already gone.
    pub fn cancel(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.write().unwrap().remove(&self.id).is_some(),
            None => false,
        }
    }
}

/// Applies merged changes to the storage collaborator and fans them out
/// to subscribed query consumers.
pub struct Materializer {
    store: Arc<dyn RelationalStore>,
    /// table → replicated columns the local schema knows.
    schema: HashMap<String, HashSet<String>>,
    callbacks: Arc<Registry>,
    next_id: AtomicU64,
}

impl Materializer {
    /// Creates a materializer over a store with the locally known schema.
    ///
    /// Table and column names must be plain identifiers; anything else is
    /// rejected here rather than interpolated into SQL later.
    pub fn new(
        store: Arc<dyn RelationalStore>,
        tables: Vec<TableSchema>,
    ) -> MaterializeResult<Self> {
        let mut schema = HashMap::new();
        for table in tables {
            validate_identifier(&table.name)?;
            let mut columns = HashSet::new();
            for column in table.columns {
                validate_identifier(&column)?;
                columns.insert(column);
            }
            schema.insert(table.name, columns);
        }
        Ok(Self {
            store,
            schema,
            callbacks: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        })
    }

    /// Applies a change set, then notifies subscribers.
    ///
    /// Cells targeting tables or columns missing from the local schema
    /// are skipped silently — the records stay in the log, and a later
    /// schema migration will materialize them on replay.
    pub fn apply_changes(&self, changes: &[CellChange]) -> MaterializeResult<()> {
        let mut touched = BTreeSet::new();

        for change in changes {
            let Some(columns) = self.schema.get(&change.table) else {
                debug!(table = %change.table, "skipping change for unknown table");
                continue;
            };

            if change.column == offgrid_types::TOMBSTONE_COLUMN {
                self.store.execute(
                    &format!("DELETE FROM {} WHERE id = ?1", change.table),
                    &[change.row.to_string().into()],
                )?;
                touched.insert(change.table.clone());
                continue;
            }

            if !columns.contains(&change.column) {
                debug!(
                    table = %change.table,
                    column = %change.column,
                    "skipping change for unknown column"
                );
                continue;
            }

            self.store.execute(
                &format!(
                    "INSERT INTO {table} (id, {column}) VALUES (?1, ?2)
                     ON CONFLICT(id) DO UPDATE SET {column} = excluded.{column}",
                    table = change.table,
                    column = change.column,
                ),
                &[change.row.to_string().into(), change.value.clone()],
            )?;
            touched.insert(change.table.clone());
        }

        if !touched.is_empty() {
            self.notify(&ChangeNotification { tables: touched });
        }
        Ok(())
    }

    /// Registers a change observer; returns its cancellation handle.
    pub fn subscribe(&self, callback: Callback) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.callbacks.write().unwrap().insert(id, callback);
        Subscription {
            id,
            registry: Arc::downgrade(&self.callbacks),
        }
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.callbacks.read().unwrap().len()
    }

    fn notify(&self, notification: &ChangeNotification) {
        let callbacks = self.callbacks.read().unwrap();
        for callback in callbacks.values() {
            // One panicking observer must not starve the others.
            if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback(notification);
            }))
            .is_err()
            {
                warn!("change subscriber panicked");
            }
        }
    }
}

fn validate_identifier(name: &str) -> MaterializeResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.chars().next().is_some_and(|c| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(MaterializeError::Schema(format!(
            "invalid identifier: {name:?}"
        )))
    }
}
