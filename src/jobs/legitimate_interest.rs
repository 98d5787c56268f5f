//! Legitimate Interest records.
//!
//! Every live candidate should carry a `customObject1s` entry whose `text2`
//! is "Legitimate Interest", dated from when the candidate was added.

use chrono::NaiveDate;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::client::BullhornClient;
use crate::error::{ApiError, BullhornError, BullhornResult, ConfigurationError};
use crate::jobs::{JobContext, JobOutcome, CANDIDATE};
use crate::pagination::CUSTOM_OBJECT_PAGE_SIZE;
use crate::prompt::{Prompter, CONTINUE_QUESTION};
use crate::query::{Predicate, SearchQuery};
use crate::types::{Candidate, CustomObject};

/// `text2` value identifying the record, compared case-insensitively.
pub const LEGITIMATE_INTEREST: &str = "Legitimate Interest";

/// Candidates added on or after this date are checked.
pub const DEFAULT_SINCE: &str = "2025-01-01";

/// [`DEFAULT_SINCE`] as a date.
pub fn default_since() -> BullhornResult<NaiveDate> {
    DEFAULT_SINCE.parse().map_err(|e: chrono::ParseError| {
        BullhornError::Configuration(ConfigurationError::InvalidValue {
            field: "since".to_string(),
            message: e.to_string(),
        })
    })
}

/// Whether `object` is a Legitimate Interest record.
pub fn is_legitimate_interest(object: &CustomObject) -> bool {
    object
        .text2
        .as_deref()
        .is_some_and(|text| text.trim().eq_ignore_ascii_case(LEGITIMATE_INTEREST))
}

/// New Legitimate Interest record dated `date_added`.
pub fn legitimate_interest_object(date_added: i64) -> CustomObject {
    CustomObject {
        text1: Some("Recruitment".to_string()),
        text2: Some(LEGITIMATE_INTEREST.to_string()),
        date1: Some(date_added),
        text3: Some("Herefish".to_string()),
        text_block1: Some("Added by API".to_string()),
        ..Default::default()
    }
}

async fn custom_objects(
    client: &BullhornClient,
    candidate_id: i64,
    fields: &str,
) -> BullhornResult<Vec<CustomObject>> {
    client
        .to_many_all(
            CANDIDATE,
            candidate_id,
            "customObject1s",
            fields,
            CUSTOM_OBJECT_PAGE_SIZE,
        )
        .await
}

// ========== Add ==========

/// Live candidates added since `since`.
pub fn add_query(since: NaiveDate) -> SearchQuery {
    let predicate = Predicate::not_deleted()
        .and(Predicate::not_archived())
        .and(Predicate::date_added_since(since));
    SearchQuery::new(
        predicate,
        "id,dateAdded,customObject1s(id,date1,date2,text2,text3)",
    )
    .sort("id")
}

/// Add a Legitimate Interest record to candidates that lack one.
pub async fn add_legitimate_interest(
    ctx: &JobContext,
    prompter: &dyn Prompter,
    since: NaiveDate,
) -> BullhornResult<JobOutcome> {
    let client = ctx.client();
    let candidates = client
        .search_all::<Candidate>(CANDIDATE, &add_query(since))
        .await?;
    tracing::info!(
        total = ?candidates.total,
        fetched = candidates.len(),
        since = %since,
        "Candidates to check"
    );

    if !prompter.confirm(CONTINUE_QUESTION).await? {
        return Ok(JobOutcome::Declined);
    }

    let added = AtomicUsize::new(0);
    let added = &added;
    let summary = ctx
        .fan_out()
        .run(candidates.records, |candidate| {
            ensure_legitimate_interest(client, candidate, added)
        })
        .await?;

    let added = added.load(Ordering::SeqCst);
    tracing::info!(
        added,
        already_present = summary.succeeded - added,
        failed = summary.failed,
        "Legitimate Interest records added"
    );
    Ok(JobOutcome::Completed(summary))
}

/// Add the record when missing, counting additions in `added`.
///
/// The create is not idempotent, so after a transient failure the
/// candidate's records are listed again before another create is sent.
async fn ensure_legitimate_interest(
    client: &BullhornClient,
    candidate: Candidate,
    added: &AtomicUsize,
) -> BullhornResult<()> {
    let policy = client.calls().policy();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let objects = custom_objects(client, candidate.id, "id,date1,date2,text2,text3").await?;
        if objects.iter().any(is_legitimate_interest) {
            if attempt == 1 {
                tracing::debug!(candidate = candidate.id, "Legitimate Interest already present");
            } else {
                added.fetch_add(1, Ordering::SeqCst);
                tracing::info!(candidate = candidate.id, "Legitimate Interest added");
            }
            return Ok(());
        }

        let date_added = candidate.date_added.ok_or_else(|| ApiError::InvalidRecord {
            id: candidate.id,
            message: "dateAdded missing".to_string(),
        })?;
        let payload = json!({ "customObject1s": [legitimate_interest_object(date_added)] });

        match client.create_on_entity(CANDIDATE, candidate.id, &payload).await {
            Ok(_) => {
                added.fetch_add(1, Ordering::SeqCst);
                tracing::info!(candidate = candidate.id, "Legitimate Interest added");
                return Ok(());
            }
            Err(error) if error.is_transient() && attempt < policy.max_transient_attempts => {
                let delay = error
                    .retry_after()
                    .unwrap_or_else(|| policy.backoff(attempt));
                tracing::warn!(
                    candidate = candidate.id,
                    error = %error,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Create failed, re-checking before retry"
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => return Err(error),
        }
    }
}

// ========== Update Date Added ==========

/// Live candidates.
pub fn update_query() -> SearchQuery {
    let predicate = Predicate::not_deleted().and(Predicate::not_archived());
    SearchQuery::new(predicate, "id,customObject1s(id,date1,dateAdded,text2)").sort("id")
}

/// Payloads copying `date1` into `dateAdded` on Legitimate Interest
/// records where they differ.
pub fn date_added_updates(objects: &[CustomObject]) -> Vec<serde_json::Value> {
    objects
        .iter()
        .filter(|object| is_legitimate_interest(object))
        .filter_map(|object| {
            let id = object.id?;
            let date1 = object.date1?;
            (object.date_added != Some(date1)).then(|| {
                json!({ "customObject1s": [{ "id": id, "dateAdded": date1 }] })
            })
        })
        .collect()
}

/// Align `dateAdded` with `date1` on every Legitimate Interest record.
pub async fn update_legitimate_interest_date_added(
    ctx: &JobContext,
    prompter: &dyn Prompter,
) -> BullhornResult<JobOutcome> {
    let client = ctx.client();
    let candidates = client
        .search_all::<Candidate>(CANDIDATE, &update_query())
        .await?;
    tracing::info!(fetched = candidates.len(), "Candidates to check");

    if !prompter.confirm(CONTINUE_QUESTION).await? {
        return Ok(JobOutcome::Declined);
    }

    let summary = ctx
        .fan_out()
        .run(candidates.records, |candidate| align_date_added(client, candidate))
        .await?;
    Ok(JobOutcome::Completed(summary))
}

async fn align_date_added(client: &BullhornClient, candidate: Candidate) -> BullhornResult<()> {
    let objects = custom_objects(client, candidate.id, "id,date1,dateAdded,text2").await?;
    for payload in date_added_updates(&objects) {
        client.update_entity(CANDIDATE, candidate.id, &payload).await?;
    }
    Ok(())
}
