//! In-memory document store
//!
//! Behaves like a single-region DynamoDB: tables declare key attributes,
//! items are upserted by key and returned with sorted attribute names. Used
//! for local development and tests.

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use databridge_common::{BridgeError, Result, Row, Value};

use super::DocumentStore;

struct TableData {
    key_attributes: Vec<String>,
    items: Vec<Row>,
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    tables: DashMap<String, TableData>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or reset) a table keyed by `key_attributes`
    pub fn create_table(&self, name: &str, key_attributes: &[&str]) {
        debug!(table = name, "Creating table");
        self.tables.insert(
            name.to_string(),
            TableData {
                key_attributes: key_attributes.iter().map(|k| (*k).to_string()).collect(),
                items: Vec::new(),
            },
        );
    }

    pub fn delete_table(&self, name: &str) -> bool {
        self.tables.remove(name).is_some()
    }

    /// Insert `item`, replacing any item with the same key
    pub fn put_item(&self, table: &str, item: Row) -> Result<()> {
        let mut data = self
            .tables
            .get_mut(table)
            .ok_or_else(|| BridgeError::TableNotFound(table.to_string()))?;

        let key = key_of(&item, &data.key_attributes)?;
        let item = sorted(item);
        let existing = data
            .items
            .iter()
            .position(|i| key_of(i, &data.key_attributes).ok().as_ref() == Some(&key));
        match existing {
            Some(index) => data.items[index] = item,
            None => data.items.push(item),
        }
        Ok(())
    }
}

fn key_of(item: &Row, key_attributes: &[String]) -> Result<Vec<Value>> {
    key_attributes
        .iter()
        .map(|attr| {
            item.get(attr).cloned().ok_or_else(|| {
                BridgeError::InvalidRequest(format!("item is missing key attribute '{}'", attr))
            })
        })
        .collect()
}

fn sorted(mut item: Row) -> Row {
    item.columns.sort_by(|a, b| a.name.cmp(&b.name));
    item
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.tables.iter().map(|t| t.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn scan(&self, table: &str, limit: Option<usize>) -> Result<Vec<Row>> {
        let data = self
            .tables
            .get(table)
            .ok_or_else(|| BridgeError::TableNotFound(table.to_string()))?;
        let take = limit.unwrap_or(usize::MAX);
        Ok(data.items.iter().take(take).cloned().collect())
    }

    async fn key_attributes(&self, table: &str) -> Result<Vec<String>> {
        self.tables
            .get(table)
            .map(|t| t.key_attributes.clone())
            .ok_or_else(|| BridgeError::TableNotFound(table.to_string()))
    }
}
