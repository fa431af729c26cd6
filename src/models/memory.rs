//! In-memory resource model, used by tests and the JSON export gateway.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Resource, ResourceModel};

/// A resource model backed by a plain vector.
#[derive(Debug, Default)]
pub struct InMemoryModel {
    rows: Mutex<Vec<Resource>>,
    edit_count: AtomicUsize,
}

impl InMemoryModel {
    pub fn seeded(rows: Vec<Resource>) -> Self {
        Self {
            rows: Mutex::new(rows),
            edit_count: AtomicUsize::new(0),
        }
    }

    /// Current rows, cloned.
    pub async fn snapshot(&self) -> Vec<Resource> {
        self.rows.lock().await.clone()
    }

    /// How many `edit` calls were persisted.
    pub fn edits(&self) -> usize {
        self.edit_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ResourceModel for InMemoryModel {
    async fn find_all(&self) -> anyhow::Result<Vec<Resource>> {
        Ok(self.rows.lock().await.clone())
    }

    async fn edit(&self, id: &str, changes: HashMap<String, String>) -> anyhow::Result<()> {
        let mut rows = self.rows.lock().await;
        let row = rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| anyhow::anyhow!("no resource with id {id}"))?;
        for (field, value) in changes {
            row.fields.insert(field, Some(value));
        }
        self.edit_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
