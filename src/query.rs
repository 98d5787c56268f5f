//! Search query building.
//!
//! Predicates are Lucene-style strings; URL encoding happens when the query
//! is attached to a request.

use chrono::NaiveDate;

/// Lucene-style search predicate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Predicate(String);

impl Predicate {
    /// Raw predicate text.
    pub fn raw(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// `field:value`.
    pub fn field(name: &str, value: impl std::fmt::Display) -> Self {
        Self(format!("{}:{}", name, value))
    }

    /// `!field:value`.
    pub fn not_field(name: &str, value: impl std::fmt::Display) -> Self {
        Self(format!("!{}:{}", name, value))
    }

    pub fn not_deleted() -> Self {
        Self::field("isDeleted", 0)
    }

    pub fn not_archived() -> Self {
        Self::not_field("status", "Archive")
    }

    pub fn not_new_lead() -> Self {
        Self::not_field("status", "\"New Lead\"")
    }

    /// `customText26` is not yet `yes`.
    pub fn not_updated() -> Self {
        Self::not_field("customText26", "yes")
    }

    /// `customText26` is not `processing`.
    pub fn not_processing() -> Self {
        Self::not_field("customText26", "processing")
    }

    pub fn date_added_since(date: NaiveDate) -> Self {
        Self(format!("dateAdded:[{} TO *]", date.format("%Y-%m-%d")))
    }

    pub fn owner(owner_id: i64) -> Self {
        Self::field("owner.id", owner_id)
    }

    pub fn id(id: i64) -> Self {
        Self::field("id", id)
    }

    /// Candidates flagged for test runs.
    pub fn test_candidate() -> Self {
        Self::field("customText37", "Yes")
    }

    /// `field` has no value.
    pub fn missing(name: &str) -> Self {
        Self(format!("-{}:[* TO *]", name))
    }

    pub fn and(self, other: Predicate) -> Self {
        Self(format!("{} AND {}", self.0, other.0))
    }

    pub fn or(self, other: Predicate) -> Self {
        Self(format!("{} OR {}", self.0, other.0))
    }

    /// Wrap in parentheses.
    pub fn group(self) -> Self {
        Self(format!("({})", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A search: predicate, fields and sort key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchQuery {
    pub predicate: Predicate,
    pub fields: String,
    pub sort: Option<String>,
}

impl SearchQuery {
    pub fn new(predicate: Predicate, fields: impl Into<String>) -> Self {
        Self {
            predicate,
            fields: fields.into(),
            sort: None,
        }
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// Query parameters for one page.
    pub fn params(&self, start: u32, count: u32) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("query", self.predicate.to_string()),
            ("fields", self.fields.clone()),
        ];
        if let Some(sort) = &self.sort {
            params.push(("sort", sort.clone()));
        }
        params.push(("start", start.to_string()));
        params.push(("count", count.to_string()));
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_dates_predicate() {
        let predicate = Predicate::not_deleted()
            .and(Predicate::not_archived())
            .and(Predicate::not_updated())
            .or(Predicate::not_processing());
        assert_eq!(
            predicate.as_str(),
            "isDeleted:0 AND !status:Archive AND !customText26:yes OR !customText26:processing"
        );
    }

    #[test]
    fn test_date_added_since() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(
            Predicate::date_added_since(date).as_str(),
            "dateAdded:[2025-01-01 TO *]"
        );
    }

    #[test]
    fn test_group_and_missing() {
        let predicate = Predicate::missing("customDate3").and(
            Predicate::owner(17).or(Predicate::id(165183)).group(),
        );
        assert_eq!(
            predicate.to_string(),
            "-customDate3:[* TO *] AND (owner.id:17 OR id:165183)"
        );
    }

    #[test]
    fn test_params() {
        let query = SearchQuery::new(Predicate::test_candidate(), "id,customDate2").sort("id");
        let params = query.params(200, 200);
        assert_eq!(
            params,
            vec![
                ("query", "customText37:Yes".to_string()),
                ("fields", "id,customDate2".to_string()),
                ("sort", "id".to_string()),
                ("start", "200".to_string()),
                ("count", "200".to_string()),
            ]
        );
    }
}
