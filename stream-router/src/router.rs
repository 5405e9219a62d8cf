use crate::errors::RouterError;
use crate::event::{ChangeEventBatch, ChangeEventRecord, EventAction};
use crate::handler::ChangeHandler;
use crate::metrics_defs::{EVENTS_FAILED, EVENTS_RECEIVED, EVENTS_UNROUTED, HANDLER_DURATION};
use serde::Serialize;
use shared::error::Classify;
use shared::{counter, histogram};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Extracts the table name from a stream ARN such as
/// `arn:aws:dynamodb:us-east-1:123456789012:table/cla-dev-signatures/stream/2020-03-02T05:49:58.779`.
pub fn table_from_source_arn(arn: &str) -> Result<&str, RouterError> {
    let malformed = || RouterError::MalformedSource(arn.to_string());
    let parts: Vec<&str> = arn.splitn(6, ':').collect();
    let resource = parts.get(5).ok_or_else(malformed)?;
    resource
        .split('/')
        .nth(1)
        .filter(|table| !table.is_empty())
        .ok_or_else(malformed)
}

/// Handlers per (table, action), in registration order. Built once and
/// handed to the router; never mutated afterwards.
#[derive(Default)]
pub struct Registrations {
    handlers: HashMap<String, HashMap<EventAction, Vec<Arc<dyn ChangeHandler>>>>,
}

impl Registrations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        table: impl Into<String>,
        action: EventAction,
        handler: Arc<dyn ChangeHandler>,
    ) -> Self {
        self.handlers
            .entry(table.into())
            .or_default()
            .entry(action)
            .or_default()
            .push(handler);
        self
    }

    pub fn handlers_for(&self, table: &str, action: EventAction) -> &[Arc<dyn ChangeHandler>] {
        self.handlers
            .get(table)
            .and_then(|actions| actions.get(&action))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub received: usize,
    /// Records that ran at least one handler to completion.
    pub handled: usize,
    pub unrouted: usize,
    pub failed: usize,
}

/// Routes change events to the handlers registered for their source table and action.
#[derive(Clone)]
pub struct ChangeEventRouter {
    registrations: Arc<Registrations>,
}

impl ChangeEventRouter {
    pub fn new(registrations: Registrations) -> Self {
        Self {
            registrations: Arc::new(registrations),
        }
    }

    /// Runs the handlers for the record in registration order and stops at the
    /// first failure. Returns the number of handlers invoked.
    pub async fn dispatch(&self, record: &ChangeEventRecord) -> Result<usize, RouterError> {
        let table = table_from_source_arn(&record.source_arn)?;
        let handlers = self.registrations.handlers_for(table, record.event_action);

        for handler in handlers {
            tracing::debug!(
                handler = handler.name(),
                table,
                action = %record.event_action,
                "calling change handler"
            );
            let started = Instant::now();
            let result = handler.handle(record).await;
            histogram!(HANDLER_DURATION, "handler" => handler.name())
                .record(started.elapsed().as_secs_f64());

            result.map_err(|source| RouterError::Handler {
                handler: handler.name(),
                source,
            })?;
        }
        Ok(handlers.len())
    }

    /// Entry point for a single record of the change stream.
    pub async fn process_change_event(
        &self,
        record: &ChangeEventRecord,
    ) -> Result<usize, RouterError> {
        counter!(EVENTS_RECEIVED, "action" => record.event_action.as_str()).increment(1);
        let result = self.dispatch(record).await;
        match &result {
            Ok(0) => counter!(EVENTS_UNROUTED).increment(1),
            Ok(_) => {}
            Err(e) => counter!(EVENTS_FAILED, "kind" => e.kind().as_str()).increment(1),
        }
        result
    }

    /// Processes every record of the batch. A record that fails to decode or
    /// to dispatch is logged and does not stop the rest of the batch.
    pub async fn process_batch(&self, batch: &ChangeEventBatch) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for (index, raw) in batch.records.iter().enumerate() {
            summary.received += 1;
            let record = match ChangeEventRecord::from_value(raw.clone()) {
                Ok(record) => record,
                Err(source) => {
                    let e = RouterError::MalformedRecord(source);
                    counter!(EVENTS_FAILED, "kind" => e.kind().as_str()).increment(1);
                    summary.failed += 1;
                    tracing::error!(index, error = %e, "skipping undecodable change event");
                    continue;
                }
            };
            match self.process_change_event(&record).await {
                Ok(0) => summary.unrouted += 1,
                Ok(_) => summary.handled += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(
                        event_id = %record.event_id,
                        source_arn = %record.source_arn,
                        error = %e,
                        "error occurred while processing change event"
                    );
                }
            }
        }
        tracing::info!(
            received = summary.received,
            handled = summary.handled,
            failed = summary.failed,
            "processed change event batch"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{RecordingHandler, batch_of, record_for};
    use serde_json::json;
    use shared::error::ErrorKind;

    const TABLE: &str = "cla-test-signatures";

    #[test]
    fn test_table_from_source_arn() {
        let arn = "arn:aws:dynamodb:us-east-1:395594542180:table/cla-dev-signatures/stream/2020-03-02T05:49:58.779";
        assert_eq!(table_from_source_arn(arn).unwrap(), "cla-dev-signatures");

        for malformed in [
            "",
            "arn:aws:dynamodb:us-east-1",
            "arn:aws:dynamodb:us-east-1:395594542180",
            "arn:aws:dynamodb:us-east-1:395594542180:table",
            "arn:aws:dynamodb:us-east-1:395594542180:table/",
        ] {
            let err = table_from_source_arn(malformed).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedInput, "{malformed}");
        }
    }

    #[tokio::test]
    async fn test_handlers_run_in_registration_order() {
        let (first, calls) = RecordingHandler::new("first");
        let second = RecordingHandler::sharing("second", &calls);
        let router = ChangeEventRouter::new(
            Registrations::new()
                .register(TABLE, EventAction::Modify, Arc::new(first))
                .register(TABLE, EventAction::Modify, Arc::new(second)),
        );

        let invoked = router
            .dispatch(&record_for(TABLE, EventAction::Modify))
            .await
            .unwrap();
        assert_eq!(invoked, 2);
        assert_eq!(*calls.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_fail_fast() {
        let (first, calls) = RecordingHandler::new("first");
        let failing = RecordingHandler::sharing("failing", &calls).failing();
        let last = RecordingHandler::sharing("last", &calls);
        let router = ChangeEventRouter::new(
            Registrations::new()
                .register(TABLE, EventAction::Modify, Arc::new(first))
                .register(TABLE, EventAction::Modify, Arc::new(failing))
                .register(TABLE, EventAction::Modify, Arc::new(last)),
        );

        let err = router
            .dispatch(&record_for(TABLE, EventAction::Modify))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::Handler { handler: "failing", .. }));
        assert_eq!(*calls.lock().unwrap(), vec!["first", "failing"]);
    }

    #[tokio::test]
    async fn test_unregistered_pair_is_noop() {
        let (handler, calls) = RecordingHandler::new("modify-only");
        let router = ChangeEventRouter::new(
            Registrations::new().register(TABLE, EventAction::Modify, Arc::new(handler)),
        );

        assert_eq!(
            router.dispatch(&record_for(TABLE, EventAction::Insert)).await.unwrap(),
            0
        );
        assert_eq!(
            router
                .dispatch(&record_for("cla-test-users", EventAction::Modify))
                .await
                .unwrap(),
            0
        );
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_source_invokes_nothing() {
        let (handler, calls) = RecordingHandler::new("any");
        let router = ChangeEventRouter::new(
            Registrations::new().register(TABLE, EventAction::Modify, Arc::new(handler)),
        );

        let mut record = record_for(TABLE, EventAction::Modify);
        record.source_arn = "arn:aws:dynamodb".to_string();
        let err = router.dispatch(&record).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_continues_after_failure() {
        let (failing, calls) = RecordingHandler::new("failing");
        let ok = RecordingHandler::sharing("ok", &calls);
        let router = ChangeEventRouter::new(
            Registrations::new()
                .register(TABLE, EventAction::Remove, Arc::new(failing.failing()))
                .register(TABLE, EventAction::Insert, Arc::new(ok)),
        );

        let mut malformed = record_for(TABLE, EventAction::Insert);
        malformed.source_arn = "bogus".to_string();
        let batch = batch_of(&[
            record_for(TABLE, EventAction::Remove),
            malformed,
            record_for(TABLE, EventAction::Insert),
            record_for(TABLE, EventAction::Modify),
        ]);

        let summary = router.process_batch(&batch).await;
        assert_eq!(
            summary,
            BatchSummary {
                received: 4,
                handled: 1,
                unrouted: 1,
                failed: 2,
            }
        );
        assert_eq!(*calls.lock().unwrap(), vec!["failing", "ok"]);
    }

    #[tokio::test]
    async fn test_undecodable_records_are_skipped() {
        let (handler, calls) = RecordingHandler::new("insert");
        let router = ChangeEventRouter::new(
            Registrations::new().register(TABLE, EventAction::Insert, Arc::new(handler)),
        );

        let mut batch = batch_of(&[record_for(TABLE, EventAction::Insert)]);
        batch.records.insert(0, json!({"eventID": "no-arn", "eventName": "INSERT"}));
        batch.records.insert(
            1,
            json!({"eventID": "odd", "eventName": "TRUNCATE", "eventSourceARN": "x"}),
        );

        let summary = router.process_batch(&batch).await;
        assert_eq!(
            summary,
            BatchSummary {
                received: 3,
                handled: 1,
                unrouted: 0,
                failed: 2,
            }
        );
        assert_eq!(*calls.lock().unwrap(), vec!["insert"]);
    }
}
