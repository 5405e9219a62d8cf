//! Keeps the per-company project count in step with corporate signatures.

use crate::errors::HandlerError;
use crate::event::ChangeEventRecord;
use crate::handler::ChangeHandler;
use async_trait::async_trait;
use std::sync::Arc;
use store::counter_store::CounterStore;
use store::signatures::{ReferenceType, Signature, SignatureType};

/// True for a company CCLA going from unsigned to signed.
pub fn is_signing_edge(before: &Signature, after: &Signature) -> bool {
    after.signature_type == SignatureType::Ccla
        && after.signature_reference_type == ReferenceType::Company
        && after.signature_signed
        && !before.signature_signed
}

pub struct CompanyProjectCountHandler {
    counters: Arc<CounterStore>,
}

impl CompanyProjectCountHandler {
    pub fn new(counters: Arc<CounterStore>) -> Self {
        CompanyProjectCountHandler { counters }
    }
}

#[async_trait]
impl ChangeHandler for CompanyProjectCountHandler {
    fn name(&self) -> &'static str {
        "company_project_count"
    }

    // Replayed events increment again; there is no de-duplication by event id.
    async fn handle(&self, record: &ChangeEventRecord) -> Result<(), HandlerError> {
        let before: Option<Signature> = record
            .before_image()
            .map_err(|source| HandlerError::Image { image: "old", source })?;
        let after: Option<Signature> = record
            .after_image()
            .map_err(|source| HandlerError::Image { image: "new", source })?;

        let (Some(before), Some(after)) = (before, after) else {
            tracing::debug!(event_id = %record.event_id, "skipping event without both images");
            return Ok(());
        };

        if !is_signing_edge(&before, &after) {
            return Ok(());
        }

        let metric = self
            .counters
            .increment_project_count(
                &after.signature_reference_id,
                &after.signature_reference_name,
            )
            .await?;
        tracing::info!(
            company_id = %after.signature_reference_id,
            project_count = metric.project_count,
            "incremented company project count"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventAction, Image, StreamAttribute};
    use crate::router::{ChangeEventRouter, Registrations};
    use crate::router::BatchSummary;
    use crate::testutils::{batch_of, record_for};
    use serde_json::json;
    use crate::default_registrations;
    use store::Stores;
    use store::config::TableNames;
    use store::types::CompanyMetric;

    fn signature_image(signed: bool, sig_type: &str, ref_type: &str, ref_id: &str) -> Image {
        Image::from([
            ("signature_id".to_string(), StreamAttribute::String("s1".into())),
            ("signature_signed".to_string(), StreamAttribute::Bool(signed)),
            ("signature_type".to_string(), StreamAttribute::String(sig_type.into())),
            (
                "signature_reference_type".to_string(),
                StreamAttribute::String(ref_type.into()),
            ),
            (
                "signature_reference_id".to_string(),
                StreamAttribute::String(ref_id.into()),
            ),
            (
                "signature_reference_name".to_string(),
                StreamAttribute::String("Acme".into()),
            ),
            (
                "signature_acl".to_string(),
                StreamAttribute::StringSet(vec!["manager".into()]),
            ),
        ])
    }

    fn modify(
        tables: &TableNames,
        before: Option<Image>,
        after: Option<Image>,
    ) -> ChangeEventRecord {
        let mut record = record_for(&tables.signatures, EventAction::Modify);
        record.change.old_image = before;
        record.change.new_image = after;
        record
    }

    fn setup() -> (TableNames, Stores, ChangeEventRouter) {
        let tables = TableNames::for_stage("test");
        let (_, stores) = Stores::in_memory(&tables, 10);
        let router =
            ChangeEventRouter::new(default_registrations(&tables, stores.counters.clone()));
        (tables, stores, router)
    }

    #[tokio::test]
    async fn test_signing_edge_creates_company_metric() {
        let (tables, stores, router) = setup();
        let record = modify(
            &tables,
            Some(signature_image(false, "ccla", "company", "X")),
            Some(signature_image(true, "ccla", "company", "X")),
        );

        router.dispatch(&record).await.unwrap();

        let metric = stores.counters.get_company_metric("X").await.unwrap();
        assert_eq!(metric.id, "company#X");
        assert_eq!(metric.project_count, 1);
        assert_eq!(metric.company_name, "Acme");
    }

    #[tokio::test]
    async fn test_only_signing_edges_count() {
        let (tables, stores, router) = setup();
        let edge = || {
            modify(
                &tables,
                Some(signature_image(false, "ccla", "company", "X")),
                Some(signature_image(true, "ccla", "company", "X")),
            )
        };
        let events = vec![
            edge(),
            // already signed
            modify(
                &tables,
                Some(signature_image(true, "ccla", "company", "X")),
                Some(signature_image(true, "ccla", "company", "X")),
            ),
            // unsigned
            modify(
                &tables,
                Some(signature_image(true, "ccla", "company", "X")),
                Some(signature_image(false, "ccla", "company", "X")),
            ),
            // individual CLA
            modify(
                &tables,
                Some(signature_image(false, "cla", "company", "X")),
                Some(signature_image(true, "cla", "company", "X")),
            ),
            // user reference
            modify(
                &tables,
                Some(signature_image(false, "ccla", "user", "X")),
                Some(signature_image(true, "ccla", "user", "X")),
            ),
            // missing before image
            modify(&tables, None, Some(signature_image(true, "ccla", "company", "X"))),
            // replay of the first edge
            edge(),
        ];

        for event in &events {
            router.dispatch(event).await.unwrap();
        }

        let metric = stores.counters.get_company_metric("X").await.unwrap();
        assert_eq!(metric.project_count, 2);
    }

    #[tokio::test]
    async fn test_concurrent_edges_are_not_lost() {
        let (tables, stores, router) = setup();
        let record = modify(
            &tables,
            Some(signature_image(false, "ccla", "company", "Y")),
            Some(signature_image(true, "ccla", "company", "Y")),
        );

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..25 {
            let router = router.clone();
            let record = record.clone();
            tasks.spawn(async move { router.dispatch(&record).await });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }

        let metric: CompanyMetric = stores.counters.get_company_metric("Y").await.unwrap();
        assert_eq!(metric.project_count, 25);
    }

    #[tokio::test]
    async fn test_undecodable_image_is_malformed() {
        let tables = TableNames::for_stage("test");
        let (_, stores) = Stores::in_memory(&tables, 10);
        let handler = CompanyProjectCountHandler::new(stores.counters.clone());
        let mut after = signature_image(true, "ccla", "company", "X");
        after.insert(
            "signature_signed".to_string(),
            StreamAttribute::String("yes".into()),
        );
        let record = modify(
            &tables,
            Some(signature_image(false, "ccla", "company", "X")),
            Some(after),
        );

        let err = handler.handle(&record).await.unwrap_err();
        assert!(matches!(err, HandlerError::Image { image: "new", .. }));

        // registered under the signatures table only
        let router = ChangeEventRouter::new(Registrations::new());
        assert_eq!(router.dispatch(&record).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_binary_attribute_record_does_not_drop_batch() {
        let (tables, stores, router) = setup();
        let edge = modify(
            &tables,
            Some(signature_image(false, "ccla", "company", "X")),
            Some(signature_image(true, "ccla", "company", "X")),
        );
        let mut batch = batch_of(&[edge.clone(), edge]);
        batch.records[1]["dynamodb"]["NewImage"]["blob"] = json!({"B": "aGVsbG8="});
        batch.records.push(json!({"eventID": "no-arn", "eventName": "MODIFY"}));

        let summary = router.process_batch(&batch).await;
        assert_eq!(
            summary,
            BatchSummary {
                received: 3,
                handled: 2,
                unrouted: 0,
                failed: 1,
            }
        );
        let metric = stores.counters.get_company_metric("X").await.unwrap();
        assert_eq!(metric.project_count, 2);
    }

    #[tokio::test]
    async fn test_null_reference_name_still_counts() {
        let (tables, stores, router) = setup();
        let mut after = signature_image(true, "ccla", "company", "X");
        after.insert(
            "signature_reference_name".to_string(),
            StreamAttribute::Null(true),
        );
        let record = modify(
            &tables,
            Some(signature_image(false, "ccla", "company", "X")),
            Some(after),
        );

        let summary = router.process_batch(&batch_of(&[record])).await;
        assert_eq!(summary.handled, 1);
        let metric = stores.counters.get_company_metric("X").await.unwrap();
        assert_eq!(metric.project_count, 1);
        assert_eq!(metric.company_name, "");
    }
}
