use crate::errors::HandlerError;
use crate::event::{ChangeEventBatch, ChangeEventRecord, EventAction, StreamChange};
use crate::handler::ChangeHandler;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use store::errors::StoreError;

pub type Calls = Arc<Mutex<Vec<&'static str>>>;

/// Appends its name to a shared call log, optionally failing afterwards.
pub struct RecordingHandler {
    name: &'static str,
    calls: Calls,
    fail: bool,
}

impl RecordingHandler {
    pub fn new(name: &'static str) -> (Self, Calls) {
        let calls = Calls::default();
        (Self::sharing(name, &calls), calls)
    }

    pub fn sharing(name: &'static str, calls: &Calls) -> Self {
        RecordingHandler {
            name,
            calls: calls.clone(),
            fail: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl ChangeHandler for RecordingHandler {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn handle(&self, _record: &ChangeEventRecord) -> Result<(), HandlerError> {
        self.calls.lock().unwrap().push(self.name);
        if self.fail {
            return Err(StoreError::not_found("test", self.name).into());
        }
        Ok(())
    }
}

pub fn arn_for(table: &str) -> String {
    format!("arn:aws:dynamodb:us-east-1:123456789012:table/{table}/stream/2020-03-02T05:49:58.779")
}

pub fn record_for(table: &str, action: EventAction) -> ChangeEventRecord {
    ChangeEventRecord {
        event_id: "test-event".to_string(),
        event_action: action,
        source_arn: arn_for(table),
        change: StreamChange::default(),
    }
}

pub fn batch_of(records: &[ChangeEventRecord]) -> ChangeEventBatch {
    ChangeEventBatch {
        records: records
            .iter()
            .map(|record| serde_json::to_value(record).unwrap())
            .collect(),
    }
}
