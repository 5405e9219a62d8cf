//! The key-value capability every repository is written against.
//!
//! Items are JSON objects; each table has a single string key attribute.

use crate::page_token::{PageToken, PageTokenError};
use async_trait::async_trait;
use serde_json::Value;
use shared::error::{Classify, ErrorKind};

pub type Item = serde_json::Map<String, Value>;

#[derive(thiserror::Error, Debug)]
pub enum KvError {
    #[error("table not found: {0}")]
    TableNotFound(String),
    #[error("item in table {table} is missing key attribute {attribute}")]
    MissingKey { table: String, attribute: String },
    #[error("conditional check failed for {key}")]
    ConditionFailed { key: String },
    #[error("attribute {attribute} of {key} is not numeric")]
    NotNumeric { key: String, attribute: String },
    #[error("invalid page token: {0}")]
    InvalidPageToken(#[from] PageTokenError),
    #[error("backend error: {0}")]
    Backend(String),
}

impl Classify for KvError {
    fn kind(&self) -> ErrorKind {
        match self {
            KvError::ConditionFailed { .. } => ErrorKind::Validation,
            KvError::InvalidPageToken(_) => ErrorKind::MalformedInput,
            KvError::Backend(_) => ErrorKind::Upstream,
            KvError::TableNotFound(_) | KvError::MissingKey { .. } | KvError::NotNumeric { .. } => {
                ErrorKind::Internal
            }
        }
    }

    fn code(&self) -> Option<&'static str> {
        match self {
            KvError::ConditionFailed { .. } => Some("conditional_check_failed"),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Key {
    pub attribute: String,
    pub value: String,
}

impl Key {
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Key {
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PutCondition {
    #[default]
    Always,
    /// Reject the put when an item with the same key exists.
    IfNotExists,
}

#[derive(Clone, Debug, PartialEq)]
pub enum UpdateAction {
    SetIfNotExists(String, Value),
    /// Atomic numeric add; a missing attribute counts as zero.
    Add(String, i64),
}

/// An update expression applied atomically to one item, creating it if absent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Update {
    actions: Vec<UpdateAction>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_if_not_exists(
        mut self,
        attribute: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.actions
            .push(UpdateAction::SetIfNotExists(attribute.into(), value.into()));
        self
    }

    pub fn add(mut self, attribute: impl Into<String>, by: i64) -> Self {
        self.actions.push(UpdateAction::Add(attribute.into(), by));
        self
    }

    pub fn actions(&self) -> &[UpdateAction] {
        &self.actions
    }
}

/// Server-side scan filter.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    /// The attribute is a list containing the value.
    Contains(String, Value),
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(attribute.into(), value.into())
    }

    pub fn contains(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Contains(attribute.into(), value.into())
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut filters) => {
                filters.push(other);
                Filter::And(filters)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    pub fn matches(&self, item: &Item) -> bool {
        match self {
            Filter::Eq(attribute, value) => item.get(attribute) == Some(value),
            Filter::Contains(attribute, value) => match item.get(attribute) {
                Some(Value::Array(values)) => values.contains(value),
                _ => false,
            },
            Filter::And(filters) => filters.iter().all(|f| f.matches(item)),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanRequest {
    pub filter: Option<Filter>,
    /// Attributes to return; all attributes when `None`.
    pub projection: Option<Vec<String>>,
    pub page_token: Option<PageToken>,
    /// Maximum number of items evaluated (before filtering) for this page.
    pub limit: Option<usize>,
}

impl ScanRequest {
    pub fn filtered(filter: Filter) -> Self {
        ScanRequest {
            filter: Some(filter),
            ..Default::default()
        }
    }

    pub fn with_projection(mut self, attributes: &[&str]) -> Self {
        self.projection = Some(attributes.iter().map(|a| a.to_string()).collect());
        self
    }

    pub fn with_page_token(mut self, page_token: Option<PageToken>) -> Self {
        self.page_token = page_token;
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanPage {
    pub items: Vec<Item>,
    pub next_page_token: Option<PageToken>,
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_item(&self, table: &str, key: &Key) -> Result<Option<Item>, KvError>;

    async fn put_item(&self, table: &str, item: Item, condition: PutCondition)
    -> Result<(), KvError>;

    /// Applies `update` atomically and returns the item as stored afterwards.
    async fn update_item(&self, table: &str, key: &Key, update: &Update) -> Result<Item, KvError>;

    async fn delete_item(&self, table: &str, key: &Key) -> Result<(), KvError>;

    async fn scan(&self, table: &str, request: &ScanRequest) -> Result<ScanPage, KvError>;
}

/// Scans every page of `table` and returns all matching items.
pub async fn scan_all(
    kv: &dyn KeyValueStore,
    table: &str,
    mut request: ScanRequest,
) -> Result<Vec<Item>, KvError> {
    let mut items = Vec::new();
    loop {
        let page = kv.scan(table, &request).await?;
        items.extend(page.items);
        match page.next_page_token {
            Some(token) => request.page_token = Some(token),
            None => break,
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(value: Value) -> Item {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_filter_matches() {
        let row = item(json!({
            "object_type": "company",
            "project_count": 3,
            "acl": ["alice", "bob"],
        }));

        assert!(Filter::eq("object_type", "company").matches(&row));
        assert!(!Filter::eq("object_type", "project").matches(&row));
        assert!(Filter::eq("project_count", 3).matches(&row));
        assert!(Filter::contains("acl", "bob").matches(&row));
        assert!(!Filter::contains("object_type", "company").matches(&row));

        let both = Filter::eq("object_type", "company").and(Filter::contains("acl", "alice"));
        assert!(both.matches(&row));
        let either_fails = both.and(Filter::eq("project_count", 4));
        assert!(!either_fails.matches(&row));
    }

    #[test]
    fn test_update_builder_keeps_order() {
        let update = Update::new()
            .add("project_count", 1)
            .set_if_not_exists("company_name", "Acme");
        assert_eq!(
            update.actions(),
            &[
                UpdateAction::Add("project_count".into(), 1),
                UpdateAction::SetIfNotExists("company_name".into(), json!("Acme")),
            ]
        );
    }
}
