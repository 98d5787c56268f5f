//! Swap `date1` and `date2` on candidate custom objects.
//!
//! A candidate is marked `customText26 = Processing` while its objects are
//! being rewritten and `Yes` once done. Both values drop out of the search:
//! swapping is its own inverse, so a candidate left in `Processing` by a
//! crash must not be picked up again and is reported instead.

use serde_json::json;

use crate::client::BullhornClient;
use crate::error::BullhornResult;
use crate::jobs::{JobContext, JobOutcome, CANDIDATE};
use crate::pagination::{CUSTOM_OBJECT_PAGE_SIZE, SEARCH_PAGE_SIZE};
use crate::prompt::{Prompter, CONTINUE_QUESTION};
use crate::query::{Predicate, SearchQuery};
use crate::types::{Candidate, CustomObject};

/// Objects owned by the marketing integration keep their dates.
pub const HEREFISH: &str = "Herefish";

const SEARCH_FIELDS: &str = "id,customObject1s(id,date1,date2,text2,text3)";
const OBJECT_FIELDS: &str = "id,date1,date2,text2,text3";

/// Candidates not yet processed.
pub fn query() -> SearchQuery {
    let predicate = Predicate::not_deleted()
        .and(Predicate::not_archived())
        .and(Predicate::not_updated())
        .and(Predicate::not_processing());
    SearchQuery::new(predicate, SEARCH_FIELDS).sort("id")
}

/// Candidates a previous run stopped on part way through.
pub fn interrupted_query() -> SearchQuery {
    let predicate = Predicate::not_deleted()
        .and(Predicate::not_archived())
        .and(Predicate::field("customText26", "processing"));
    SearchQuery::new(predicate, "id").sort("id")
}

/// Update that swaps the two dates of `object`. `None` for objects that
/// keep their dates or have no id.
pub fn swap_payload(object: &CustomObject) -> Option<serde_json::Value> {
    if object.text3.as_deref() == Some(HEREFISH) {
        return None;
    }
    let id = object.id?;
    Some(json!({
        "customObject1s": [{ "id": id, "date1": object.date2, "date2": object.date1 }],
        "customText26": "Processing",
    }))
}

/// Run the job.
pub async fn swap_dates(ctx: &JobContext, prompter: &dyn Prompter) -> BullhornResult<JobOutcome> {
    let client = ctx.client();
    let candidates = client.search_all::<Candidate>(CANDIDATE, &query()).await?;
    tracing::info!(
        total = ?candidates.total,
        fetched = candidates.len(),
        "Candidates to process"
    );

    if !prompter.confirm(CONTINUE_QUESTION).await? {
        return Ok(JobOutcome::Declined);
    }

    let summary = ctx
        .sequential()
        .run(candidates.records, |candidate| swap_candidate(client, candidate))
        .await?;

    report_interrupted(client).await?;
    Ok(JobOutcome::Completed(summary))
}

/// Warn about candidates left in `Processing`; their objects may be partly
/// swapped and need checking by hand.
async fn report_interrupted(client: &BullhornClient) -> BullhornResult<()> {
    let interrupted = client
        .search::<Candidate>(CANDIDATE, &interrupted_query(), 0, SEARCH_PAGE_SIZE)
        .await?;
    if !interrupted.data.is_empty() {
        let ids: Vec<i64> = interrupted.data.iter().map(|c| c.id).collect();
        tracing::warn!(
            total = ?interrupted.total,
            ids = ?ids,
            "Candidates left in Processing need manual review"
        );
    }
    Ok(())
}

async fn swap_candidate(client: &BullhornClient, candidate: Candidate) -> BullhornResult<()> {
    let objects: Vec<CustomObject> = client
        .to_many_all(
            CANDIDATE,
            candidate.id,
            "customObject1s",
            OBJECT_FIELDS,
            CUSTOM_OBJECT_PAGE_SIZE,
        )
        .await?;

    let mut swapped = 0;
    for payload in objects.iter().filter_map(swap_payload) {
        client.update_entity(CANDIDATE, candidate.id, &payload).await?;
        swapped += 1;
    }

    client
        .update_entity(CANDIDATE, candidate.id, &json!({ "customText26": "Yes" }))
        .await?;
    tracing::info!(candidate = candidate.id, swapped, "Dates swapped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{HttpMethod, MockHttpTransport};
    use crate::jobs::testing::{body, context};
    use crate::prompt::MockPrompter;
    use std::sync::Arc;

    #[test]
    fn test_herefish_objects_keep_dates() {
        let object = CustomObject {
            id: Some(1),
            date1: Some(10),
            date2: Some(20),
            text3: Some("Herefish".to_string()),
            ..Default::default()
        };
        assert!(swap_payload(&object).is_none());
    }

    #[test]
    fn test_swap_payload_keeps_missing_dates_explicit() {
        let object = CustomObject {
            id: Some(4),
            date1: Some(10),
            ..Default::default()
        };
        assert_eq!(
            swap_payload(&object).unwrap(),
            json!({
                "customObject1s": [{"id": 4, "date1": null, "date2": 10}],
                "customText26": "Processing"
            })
        );
    }

    #[test]
    fn test_query() {
        let params = query().params(0, 200);
        assert_eq!(
            params[0].1,
            "isDeleted:0 AND !status:Archive AND !customText26:yes AND !customText26:processing"
        );
        assert_eq!(
            interrupted_query().predicate.as_str(),
            "isDeleted:0 AND !status:Archive AND customText26:processing"
        );
    }

    #[tokio::test]
    async fn test_swaps_and_marks_candidate() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(200, &json!({"total": 1, "data": [{"id": 7}]}));
        transport.queue_json_response(200, &json!({"total": 1, "data": []}));
        transport.queue_json_response(
            200,
            &json!({"data": [
                {"id": 1, "date1": 100, "date2": 200, "text3": "Herefish"},
                {"id": 2, "date1": 300, "date2": 400, "text3": "Other"}
            ]}),
        );
        transport.queue_json_response(200, &json!({"data": []}));
        transport.queue_json_response(200, &json!({"changedEntityId": 7, "changeType": "UPDATE"}));
        transport.queue_json_response(200, &json!({"changedEntityId": 7, "changeType": "UPDATE"}));
        transport.queue_json_response(200, &json!({"total": 1, "data": [{"id": 3}]}));
        let ctx = context(transport.clone());
        let prompter = MockPrompter::new();
        prompter.answer("y");

        let outcome = swap_dates(&ctx, &prompter).await.unwrap();

        let JobOutcome::Completed(summary) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(summary.succeeded, 1);

        let updates: Vec<_> = transport
            .get_requests()
            .into_iter()
            .filter(|r| r.method == HttpMethod::Post)
            .collect();
        assert_eq!(updates.len(), 2);
        assert_eq!(
            body(&updates[0]),
            json!({
                "customObject1s": [{"id": 2, "date1": 400, "date2": 300}],
                "customText26": "Processing"
            })
        );
        assert_eq!(body(&updates[1]), json!({"customText26": "Yes"}));
        assert!(updates[1].url.contains("entity/Candidate/7?"));

        let report = transport.get_last_request().unwrap();
        assert_eq!(report.method, HttpMethod::Get);
        assert!(report.url.contains("customText26%3Aprocessing"));
    }

    #[tokio::test]
    async fn test_declined_makes_no_updates() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(200, &json!({"total": 1, "data": [{"id": 7}]}));
        transport.queue_json_response(200, &json!({"data": []}));
        let ctx = context(transport.clone());
        let prompter = MockPrompter::new();
        prompter.answer("n");

        let outcome = swap_dates(&ctx, &prompter).await.unwrap();

        assert_eq!(outcome, JobOutcome::Declined);
        assert_eq!(transport.get_requests().len(), 2);
    }
}
