//! Domain records returned by the REST API.
//!
//! Timestamps are epoch milliseconds. Every field is optional because the
//! API only returns what was asked for in `fields`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One page of a list or search response.
#[derive(Clone, Debug, Deserialize)]
pub struct ListPage<T> {
    /// Total matching records, when the endpoint reports it.
    #[serde(default)]
    pub total: Option<u64>,
    /// Records on this page. Absent or empty means there are no more.
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> ListPage<T> {
    pub fn new(total: Option<u64>, data: Vec<T>) -> Self {
        Self { total, data }
    }
}

/// Candidate.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: i64,
    #[serde(default)]
    pub date_added: Option<i64>,
    #[serde(default)]
    pub custom_date2: Option<i64>,
    #[serde(default)]
    pub custom_date3: Option<i64>,
    #[serde(default)]
    pub custom_text26: Option<String>,
    /// Inline `customObject1s` association, when requested.
    #[serde(default, rename = "customObject1s")]
    pub custom_objects: Option<ListPage<CustomObject>>,
}

impl std::fmt::Display for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Candidate {}", self.id)
    }
}

/// `customObject1s` entry attached to a candidate.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date1: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date2: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_block1: Option<String>,
}

/// File attached to a candidate.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    pub id: i64,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub date_added: Option<i64>,
}

/// Event from an entity subscription.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityEvent {
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub event_timestamp: Option<i64>,
    #[serde(default)]
    pub entity_name: Option<String>,
    #[serde(default)]
    pub entity_id: Option<i64>,
    #[serde(default)]
    pub entity_event_type: Option<String>,
    #[serde(default)]
    pub updated_properties: Vec<String>,
    #[serde(default)]
    pub event_metadata: HashMap<String, serde_json::Value>,
}

impl EntityEvent {
    /// Whether this event reports `property` changing on an updated entity
    /// of type `entity`.
    pub fn is_update_of(&self, entity: &str, property: &str) -> bool {
        self.entity_name.as_deref() == Some(entity)
            && self.entity_event_type.as_deref() == Some("UPDATED")
            && self.updated_properties.iter().any(|p| p == property)
    }
}

/// Response of an event subscription poll. An empty body means no events.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsPage {
    #[serde(default)]
    pub request_id: Option<i64>,
    #[serde(default)]
    pub events: Vec<EntityEvent>,
}
