//! CV date maintenance.
//!
//! `customDate2` and `customDate3` on a candidate hold the time its most
//! recent CV arrived. These jobs fill them from file attachments and keep
//! them current from the event subscription.

use serde_json::json;
use std::time::Duration;

use crate::client::BullhornClient;
use crate::error::BullhornResult;
use crate::jobs::{JobContext, JobOutcome, CANDIDATE};
use crate::pagination::FILE_ATTACHMENT_PAGE_SIZE;
use crate::query::{Predicate, SearchQuery};
use crate::runner::BatchSummary;
use crate::types::{Candidate, EntityEvent, FileAttachment};

/// Subscription reporting candidate file changes.
pub const CV_SUBSCRIPTION: &str = "CandidateFileAlert";
/// Events requested per poll.
pub const MAX_EVENTS: u32 = 100;
/// Wait between polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

const ATTACHMENT_FIELDS: &str = "id,type,dateAdded";

/// Newest positive `dateAdded` among `files`.
pub fn newest_date_added(files: &[FileAttachment]) -> Option<i64> {
    files
        .iter()
        .filter_map(|file| file.date_added)
        .filter(|date| *date > 0)
        .max()
}

async fn newest_attachment(client: &BullhornClient, candidate_id: i64) -> BullhornResult<Option<i64>> {
    let files: Vec<FileAttachment> = client
        .to_many_all(
            CANDIDATE,
            candidate_id,
            "fileAttachments",
            ATTACHMENT_FIELDS,
            FILE_ATTACHMENT_PAGE_SIZE,
        )
        .await?;
    Ok(newest_date_added(&files))
}

// ========== Last CV Added ==========

/// Live test candidates whose `customDate2` may be behind.
pub fn last_cv_added_query() -> SearchQuery {
    let predicate = Predicate::not_deleted()
        .and(Predicate::not_archived())
        .and(Predicate::test_candidate());
    SearchQuery::new(predicate, "id,customDate2").sort("id")
}

/// Move `customDate2` forward to the newest attachment date.
pub async fn last_cv_added(ctx: &JobContext) -> BullhornResult<JobOutcome> {
    let client = ctx.client();
    let candidates = client
        .search_all::<Candidate>(CANDIDATE, &last_cv_added_query())
        .await?;
    tracing::info!(fetched = candidates.len(), "Checking last CV date");

    let summary = ctx
        .sequential()
        .run(candidates.records, |candidate| advance_last_cv(client, candidate))
        .await?;
    Ok(JobOutcome::Completed(summary))
}

async fn advance_last_cv(client: &BullhornClient, candidate: Candidate) -> BullhornResult<()> {
    let Some(newest) = newest_attachment(client, candidate.id).await? else {
        tracing::debug!(candidate = candidate.id, "No dated attachments");
        return Ok(());
    };
    if candidate.custom_date2.is_some_and(|current| newest <= current) {
        return Ok(());
    }
    client
        .update_entity(CANDIDATE, candidate.id, &json!({ "customDate2": newest }))
        .await?;
    tracing::info!(candidate = candidate.id, date = newest, "customDate2 updated");
    Ok(())
}

// ========== Backfill ==========

/// Live candidates with no CV date yet.
pub fn backfill_query() -> SearchQuery {
    let predicate = Predicate::not_deleted()
        .and(Predicate::not_archived())
        .and(Predicate::not_new_lead())
        .and(Predicate::missing("customDate3"));
    SearchQuery::new(predicate, "id").sort("id")
}

/// Write the newest attachment date into `customDate3`.
pub async fn backfill_cv_date(ctx: &JobContext) -> BullhornResult<JobOutcome> {
    let client = ctx.client();
    let candidates = client
        .search_all::<Candidate>(CANDIDATE, &backfill_query())
        .await?;
    tracing::info!(fetched = candidates.len(), "Backfilling CV dates");

    let summary = ctx
        .fan_out()
        .run(candidates.records, |candidate| backfill_candidate(client, candidate))
        .await?;
    Ok(JobOutcome::Completed(summary))
}

async fn backfill_candidate(client: &BullhornClient, candidate: Candidate) -> BullhornResult<()> {
    match newest_attachment(client, candidate.id).await? {
        Some(newest) => {
            client
                .update_entity(CANDIDATE, candidate.id, &json!({ "customDate3": newest }))
                .await?;
            tracing::info!(candidate = candidate.id, date = newest, "customDate3 set");
        }
        None => tracing::debug!(candidate = candidate.id, "No dated attachments"),
    }
    Ok(())
}

// ========== Event Polling ==========

/// Candidate id and timestamp for an event that reports a CV change.
pub fn cv_update(event: &EntityEvent) -> Option<(i64, i64)> {
    if !event.is_update_of(CANDIDATE, "description") {
        return None;
    }
    Some((event.entity_id?, event.event_timestamp?))
}

/// Poll once and apply the CV updates found.
pub async fn poll_once(client: &BullhornClient) -> BullhornResult<BatchSummary> {
    let events = client.poll_events(CV_SUBSCRIPTION, MAX_EVENTS).await?;
    let mut summary = BatchSummary::default();
    if !events.is_empty() {
        tracing::info!(events = events.len(), "Events received");
    }

    for (candidate, timestamp) in events.iter().filter_map(cv_update) {
        summary.started += 1;
        match client
            .update_entity(CANDIDATE, candidate, &json!({ "customDate3": timestamp }))
            .await
        {
            Ok(_) => {
                summary.succeeded += 1;
                tracing::info!(candidate, date = timestamp, "CV date updated from event");
            }
            Err(error) if error.is_fatal() => return Err(error),
            Err(error) => {
                summary.failed += 1;
                tracing::error!(candidate, error = %error, "Failed to apply CV event");
            }
        }
    }
    Ok(summary)
}

/// Poll every `interval` until stop is requested. Poll errors are logged
/// and the loop carries on; fatal errors end it.
pub async fn poll_cv_updates(ctx: &JobContext, interval: Duration) -> BullhornResult<JobOutcome> {
    let stop = ctx.stop();
    let mut total = BatchSummary::default();

    while !stop.should_stop() {
        match poll_once(ctx.client()).await {
            Ok(summary) => {
                total.started += summary.started;
                total.succeeded += summary.succeeded;
                total.failed += summary.failed;
            }
            Err(error) if error.is_fatal() => return Err(error),
            Err(error) => {
                tracing::error!(error = %error, code = error.error_code(), "Poll failed");
            }
        }

        tokio::select! {
            _ = stop.stopped() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    total.stopped = true;
    Ok(JobOutcome::Completed(total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{HttpMethod, HttpResponse, MockHttpTransport};
    use crate::jobs::testing::{body, context};
    use std::sync::Arc;

    fn empty_ok() -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: Default::default(),
            body: String::new(),
        }
    }

    fn attachment(date: Option<i64>) -> FileAttachment {
        FileAttachment {
            id: 1,
            kind: Some("Resume".to_string()),
            date_added: date,
        }
    }

    #[test]
    fn test_newest_date_added_ignores_missing_and_zero() {
        let files = vec![
            attachment(Some(5)),
            attachment(None),
            attachment(Some(0)),
            attachment(Some(9)),
        ];
        assert_eq!(newest_date_added(&files), Some(9));
        assert_eq!(newest_date_added(&[attachment(None)]), None);
    }

    #[test]
    fn test_backfill_query() {
        assert_eq!(
            backfill_query().predicate.as_str(),
            "isDeleted:0 AND !status:Archive AND !status:\"New Lead\" AND -customDate3:[* TO *]"
        );
    }

    #[test]
    fn test_last_cv_added_query_skips_deleted_and_archived() {
        assert_eq!(
            last_cv_added_query().predicate.as_str(),
            "isDeleted:0 AND !status:Archive AND customText37:Yes"
        );
    }

    #[test]
    fn test_cv_update_filter() {
        let event: EntityEvent = serde_json::from_value(json!({
            "entityName": "Candidate",
            "entityId": 4,
            "entityEventType": "UPDATED",
            "eventTimestamp": 1700,
            "updatedProperties": ["description", "status"]
        }))
        .unwrap();
        assert_eq!(cv_update(&event), Some((4, 1700)));

        let inserted: EntityEvent = serde_json::from_value(json!({
            "entityName": "Candidate",
            "entityId": 4,
            "entityEventType": "INSERTED",
            "eventTimestamp": 1700,
            "updatedProperties": ["description"]
        }))
        .unwrap();
        assert_eq!(cv_update(&inserted), None);
    }

    #[tokio::test]
    async fn test_last_cv_added_only_moves_forward() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(
            200,
            &json!({"total": 2, "data": [{"id": 1, "customDate2": 500}, {"id": 2, "customDate2": 100}]}),
        );
        transport.queue_json_response(200, &json!({"data": []}));
        // Candidate 1: newest attachment older than customDate2.
        transport.queue_json_response(200, &json!({"data": [{"id": 10, "dateAdded": 400}]}));
        transport.queue_json_response(200, &json!({"data": []}));
        // Candidate 2: newer attachment.
        transport.queue_json_response(200, &json!({"data": [{"id": 11, "dateAdded": 300}]}));
        transport.queue_json_response(200, &json!({"data": []}));
        transport.queue_json_response(200, &json!({"changedEntityId": 2}));
        let ctx = context(transport.clone());

        last_cv_added(&ctx).await.unwrap();

        let updates: Vec<_> = transport
            .get_requests()
            .into_iter()
            .filter(|r| r.method == HttpMethod::Post)
            .collect();
        assert_eq!(updates.len(), 1);
        assert!(updates[0].url.contains("entity/Candidate/2?"));
        assert_eq!(body(&updates[0]), json!({"customDate2": 300}));
    }

    #[tokio::test]
    async fn test_backfill_writes_newest_date() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(200, &json!({"total": 1, "data": [{"id": 3}]}));
        transport.queue_json_response(200, &json!({"data": []}));
        transport.queue_json_response(
            200,
            &json!({"data": [{"id": 1, "dateAdded": 20}, {"id": 2, "dateAdded": 90}]}),
        );
        transport.queue_json_response(200, &json!({"data": []}));
        transport.queue_json_response(200, &json!({"changedEntityId": 3}));
        let ctx = context(transport.clone());

        let outcome = backfill_cv_date(&ctx).await.unwrap();

        assert!(matches!(outcome, JobOutcome::Completed(s) if s.succeeded == 1));
        let last = transport.get_last_request().unwrap();
        assert_eq!(body(&last), json!({"customDate3": 90}));
    }

    #[tokio::test]
    async fn test_poll_once_applies_description_updates() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(
            200,
            &json!({"requestId": 1, "events": [
                {"entityName": "Candidate", "entityId": 8, "entityEventType": "UPDATED",
                 "eventTimestamp": 1234, "updatedProperties": ["description"]},
                {"entityName": "Candidate", "entityId": 9, "entityEventType": "UPDATED",
                 "eventTimestamp": 1235, "updatedProperties": ["status"]}
            ]}),
        );
        transport.queue_json_response(200, &json!({"changedEntityId": 8}));
        let ctx = context(transport.clone());

        let summary = poll_once(ctx.client()).await.unwrap();

        assert_eq!(summary.succeeded, 1);
        let last = transport.get_last_request().unwrap();
        assert!(last.url.contains("entity/Candidate/8?"));
        assert_eq!(body(&last), json!({"customDate3": 1234}));
    }

    #[tokio::test]
    async fn test_poll_loop_survives_errors_and_stops() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(500, &json!({"errorMessage": "boom"}));
        transport.set_default_response(empty_ok());
        let ctx = context(transport.clone());

        let stop = ctx.stop().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            stop.request_stop();
        });

        let outcome = tokio::time::timeout(
            Duration::from_secs(2),
            poll_cv_updates(&ctx, Duration::from_millis(5)),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(matches!(outcome, JobOutcome::Completed(s) if s.stopped));
        assert!(transport.get_requests().len() >= 2);
    }
}
