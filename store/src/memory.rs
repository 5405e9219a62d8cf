//! In-process `KeyValueStore`, optionally seeded from and persisted to a JSON
//! snapshot on the local filesystem.

use crate::kv::{
    Item, Key, KeyValueStore, KvError, PutCondition, ScanPage, ScanRequest, Update, UpdateAction,
};
use crate::metrics_defs::KV_OPERATIONS;
use crate::page_token::PageToken;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::counter;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::ops::Bound;
use std::path::Path;

pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(thiserror::Error, Debug)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Kv(#[from] KvError),
}

struct Table {
    key_attribute: String,
    // ordered so that page tokens can resume after the last evaluated key
    items: BTreeMap<String, Item>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotTable {
    key_attribute: String,
    items: Vec<Item>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    tables: BTreeMap<String, SnapshotTable>,
}

pub struct InMemoryStore {
    tables: RwLock<HashMap<String, Table>>,
    page_size: usize,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl InMemoryStore {
    pub fn new(page_size: usize) -> Self {
        InMemoryStore {
            tables: RwLock::new(HashMap::new()),
            page_size: page_size.max(1),
        }
    }

    /// Creates `name` if it does not exist yet. Existing tables keep their items.
    pub fn create_table(&self, name: &str, key_attribute: &str) {
        self.tables
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Table {
                key_attribute: key_attribute.to_string(),
                items: BTreeMap::new(),
            });
    }

    pub fn item_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .get(table)
            .map(|t| t.items.len())
            .unwrap_or(0)
    }

    /// Loads every table in the snapshot, replacing items with the same key.
    /// Returns the number of items loaded.
    pub fn load_snapshot(&self, path: &Path) -> Result<usize, SnapshotError> {
        let reader = BufReader::new(File::open(path)?);
        let snapshot: Snapshot = serde_json::from_reader(reader)?;

        let mut tables = self.tables.write();
        let mut loaded = 0;
        for (name, snapshot_table) in snapshot.tables {
            let table = tables.entry(name.clone()).or_insert_with(|| Table {
                key_attribute: snapshot_table.key_attribute.clone(),
                items: BTreeMap::new(),
            });
            for item in snapshot_table.items {
                let key = key_of(&name, &table.key_attribute, &item)?;
                table.items.insert(key, item);
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    /// Writes all tables to `path` through a temporary sibling file.
    pub fn store_snapshot(&self, path: &Path) -> Result<(), SnapshotError> {
        let snapshot = {
            let tables = self.tables.read();
            Snapshot {
                tables: tables
                    .iter()
                    .map(|(name, table)| {
                        (
                            name.clone(),
                            SnapshotTable {
                                key_attribute: table.key_attribute.clone(),
                                items: table.items.values().cloned().collect(),
                            },
                        )
                    })
                    .collect(),
            }
        };

        let tmp_path = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            serde_json::to_writer(&mut writer, &snapshot)?;
            writer.flush()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

fn key_of(table: &str, key_attribute: &str, item: &Item) -> Result<String, KvError> {
    match item.get(key_attribute) {
        Some(Value::String(key)) if !key.is_empty() => Ok(key.clone()),
        _ => Err(KvError::MissingKey {
            table: table.to_string(),
            attribute: key_attribute.to_string(),
        }),
    }
}

fn check_key(table_name: &str, table: &Table, key: &Key) -> Result<(), KvError> {
    if key.attribute != table.key_attribute {
        return Err(KvError::MissingKey {
            table: table_name.to_string(),
            attribute: table.key_attribute.clone(),
        });
    }
    Ok(())
}

fn apply(key: &Key, mut item: Item, update: &Update) -> Result<Item, KvError> {
    for action in update.actions() {
        match action {
            UpdateAction::SetIfNotExists(attribute, value) => {
                item.entry(attribute.clone())
                    .or_insert_with(|| value.clone());
            }
            UpdateAction::Add(attribute, by) => {
                let current = match item.get(attribute) {
                    None | Some(Value::Null) => 0,
                    Some(value) => value.as_i64().ok_or_else(|| KvError::NotNumeric {
                        key: key.value.clone(),
                        attribute: attribute.clone(),
                    })?,
                };
                item.insert(attribute.clone(), Value::from(current + by));
            }
        }
    }
    Ok(item)
}

fn project(item: &Item, projection: Option<&Vec<String>>) -> Item {
    match projection {
        None => item.clone(),
        Some(attributes) => attributes
            .iter()
            .filter_map(|a| item.get(a).map(|v| (a.clone(), v.clone())))
            .collect(),
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get_item(&self, table: &str, key: &Key) -> Result<Option<Item>, KvError> {
        counter!(KV_OPERATIONS, "op" => "get").increment(1);
        let tables = self.tables.read();
        let t = tables
            .get(table)
            .ok_or_else(|| KvError::TableNotFound(table.to_string()))?;
        check_key(table, t, key)?;
        Ok(t.items.get(&key.value).cloned())
    }

    async fn put_item(
        &self,
        table: &str,
        item: Item,
        condition: PutCondition,
    ) -> Result<(), KvError> {
        counter!(KV_OPERATIONS, "op" => "put").increment(1);
        let mut tables = self.tables.write();
        let t = tables
            .get_mut(table)
            .ok_or_else(|| KvError::TableNotFound(table.to_string()))?;
        let key = key_of(table, &t.key_attribute, &item)?;

        if condition == PutCondition::IfNotExists && t.items.contains_key(&key) {
            return Err(KvError::ConditionFailed { key });
        }
        t.items.insert(key, item);
        Ok(())
    }

    async fn update_item(&self, table: &str, key: &Key, update: &Update) -> Result<Item, KvError> {
        counter!(KV_OPERATIONS, "op" => "update").increment(1);
        // The write lock is held across read and write, which makes the update atomic.
        let mut tables = self.tables.write();
        let t = tables
            .get_mut(table)
            .ok_or_else(|| KvError::TableNotFound(table.to_string()))?;
        check_key(table, t, key)?;

        let current = t.items.get(&key.value).cloned().unwrap_or_else(|| {
            let mut fresh = Item::new();
            fresh.insert(key.attribute.clone(), Value::String(key.value.clone()));
            fresh
        });
        let updated = apply(key, current, update)?;
        t.items.insert(key.value.clone(), updated.clone());
        Ok(updated)
    }

    async fn delete_item(&self, table: &str, key: &Key) -> Result<(), KvError> {
        counter!(KV_OPERATIONS, "op" => "delete").increment(1);
        let mut tables = self.tables.write();
        let t = tables
            .get_mut(table)
            .ok_or_else(|| KvError::TableNotFound(table.to_string()))?;
        check_key(table, t, key)?;
        t.items.remove(&key.value);
        Ok(())
    }

    async fn scan(&self, table: &str, request: &ScanRequest) -> Result<ScanPage, KvError> {
        counter!(KV_OPERATIONS, "op" => "scan").increment(1);
        let start = match &request.page_token {
            Some(token) => Bound::Excluded(token.last_key()?),
            None => Bound::Unbounded,
        };
        let limit = request.limit.unwrap_or(self.page_size).max(1);

        let tables = self.tables.read();
        let t = tables
            .get(table)
            .ok_or_else(|| KvError::TableNotFound(table.to_string()))?;

        let mut range = t
            .items
            .range::<String, _>((start, Bound::Unbounded))
            .peekable();
        let mut items = Vec::new();
        let mut last_key = None;
        let mut evaluated = 0;

        while evaluated < limit {
            let Some((key, item)) = range.next() else {
                break;
            };
            evaluated += 1;
            last_key = Some(key);
            if request.filter.as_ref().is_none_or(|f| f.matches(item)) {
                items.push(project(item, request.projection.as_ref()));
            }
        }

        let next_page_token = match (range.peek(), last_key) {
            (Some(_), Some(key)) => Some(PageToken::from_last_key(key)),
            _ => None,
        };

        Ok(ScanPage {
            items,
            next_page_token,
        })
    }
}
