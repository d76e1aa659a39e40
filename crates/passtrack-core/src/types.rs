//! Core types for the pass tracker

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

/// Longest identifier accepted for passes and accounts
const MAX_ID_LEN: usize = 128;

fn validate_id(raw: &str) -> Result<(), &'static str> {
    if raw.is_empty() {
        return Err("must not be empty");
    }
    if raw.len() > MAX_ID_LEN {
        return Err("too long");
    }
    if raw.trim() != raw {
        return Err("must not have surrounding whitespace");
    }
    if raw.chars().any(char::is_control) {
        return Err("must not contain control characters");
    }
    Ok(())
}

/// Identifier of a mountain pass, e.g. `alpe-dhuez`
///
/// Pass ids are opaque slugs; the only constraints are that they are
/// non-empty, printable and free of surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PassId(String);

impl PassId {
    /// Validate and wrap a pass id
    pub fn new(raw: impl Into<String>) -> Result<Self, TrackerError> {
        let raw = raw.into();
        validate_id(&raw).map_err(|why| TrackerError::InvalidPassId(format!("{raw:?} {why}")))?;
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PassId {
    type Error = TrackerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PassId> for String {
    fn from(id: PassId) -> Self {
        id.0
    }
}

impl FromStr for PassId {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for PassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authenticated account id
///
/// Absence of an identity (`Option<Identity>::None`) means the tracker runs
/// in local-only mode.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn new(raw: impl Into<String>) -> Result<Self, TrackerError> {
        let raw = raw.into();
        validate_id(&raw)
            .map_err(|why| TrackerError::InvalidIdentity(format!("{raw:?} {why}")))?;
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identity {
    type Error = TrackerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identity> for String {
    fn from(id: Identity) -> Self {
        id.0
    }
}

impl FromStr for Identity {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two kinds of per-account records kept in sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Conquests,
    Favorites,
}

impl RecordType {
    pub const ALL: [RecordType; 2] = [RecordType::Conquests, RecordType::Favorites];
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::Conquests => write!(f, "conquests"),
            RecordType::Favorites => write!(f, "favorites"),
        }
    }
}

/// Today's date in UTC, the granularity used for `date_completed`
pub fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

/// A pass the user has ridden
///
/// At most one record exists per `(identity, pass_id)`; all stores treat
/// writes as upserts on that key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConquestRecord {
    pub pass_id: PassId,
    /// Serialized as `YYYY-MM-DD`
    pub date_completed: NaiveDate,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_completed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_activity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_activity_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_from_external: Option<bool>,
}

impl ConquestRecord {
    /// A bare record for `pass_id` completed on `date`
    pub fn new(pass_id: PassId, date_completed: NaiveDate) -> Self {
        Self {
            pass_id,
            date_completed,
            photos: Vec::new(),
            personal_notes: None,
            time_completed: None,
            external_activity_id: None,
            external_activity_url: None,
            synced_from_external: None,
        }
    }

    /// A bare record for `pass_id` completed today (UTC)
    pub fn completed_today(pass_id: PassId) -> Self {
        Self::new(pass_id, today())
    }

    pub fn with_photos(mut self, photos: Vec<String>) -> Self {
        self.photos = photos;
        self
    }

    pub fn is_external(&self) -> bool {
        self.synced_from_external.unwrap_or(false)
    }

    /// Copy activity metadata onto this record and mark it as imported
    pub fn apply_activity(&mut self, activity: &ExternalActivity) {
        self.date_completed = activity.date;
        if activity.time_completed.is_some() {
            self.time_completed = activity.time_completed.clone();
        }
        self.external_activity_id = Some(activity.id.clone());
        self.external_activity_url = activity.url.clone();
        self.synced_from_external = Some(true);
    }
}

/// A pass the user has starred
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRecord {
    pub pass_id: PassId,
}

/// Free-form fields a user may edit on an existing conquest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConquestDetails {
    pub personal_notes: Option<String>,
    pub time_completed: Option<String>,
}

/// A ride recorded by an external tracking service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalActivity {
    /// Activity id on the external service
    pub id: String,
    pub url: Option<String>,
    pub date: NaiveDate,
    pub time_completed: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_id_validation() {
        assert!(PassId::new("alpe-dhuez").is_ok());
        assert!(PassId::new("").is_err());
        assert!(PassId::new(" stelvio").is_err());
        assert!(PassId::new("a\u{1f}b").is_err());
        assert!(PassId::new("x".repeat(MAX_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_identity_parse_and_display() {
        let id: Identity = "user-42".parse().unwrap();
        assert_eq!(id.to_string(), "user-42");
        assert!(matches!(
            Identity::new("\n"),
            Err(TrackerError::InvalidIdentity(_))
        ));
    }

    #[test]
    fn test_conquest_record_json_shape() {
        let pass = PassId::new("mont-ventoux").unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 7, 14).unwrap();
        let record = ConquestRecord::new(pass, date).with_photos(vec!["a.jpg".into()]);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["passId"], "mont-ventoux");
        assert_eq!(json["dateCompleted"], "2024-07-14");
        assert_eq!(json["photos"][0], "a.jpg");
        assert!(json.get("personalNotes").is_none());
    }

    #[test]
    fn test_conquest_record_rejects_invalid_pass_id() {
        let json = r#"{"passId":"","dateCompleted":"2024-07-14"}"#;
        assert!(serde_json::from_str::<ConquestRecord>(json).is_err());
    }

    #[test]
    fn test_conquest_record_defaults_missing_fields() {
        let json = r#"{"passId":"galibier","dateCompleted":"2023-06-01"}"#;
        let record: ConquestRecord = serde_json::from_str(json).unwrap();
        assert!(record.photos.is_empty());
        assert!(!record.is_external());
    }

    #[test]
    fn test_apply_activity_marks_external() {
        let pass = PassId::new("stelvio").unwrap();
        let mut record = ConquestRecord::completed_today(pass);
        record.time_completed = Some("01:10:00".into());
        let activity = ExternalActivity {
            id: "981".into(),
            url: Some("https://tracker.example/activities/981".into()),
            date: NaiveDate::from_ymd_opt(2022, 8, 2).unwrap(),
            time_completed: None,
        };
        record.apply_activity(&activity);

        assert!(record.is_external());
        assert_eq!(record.date_completed, activity.date);
        assert_eq!(record.time_completed.as_deref(), Some("01:10:00"));
        assert_eq!(record.external_activity_id.as_deref(), Some("981"));
    }

    #[test]
    fn test_record_type_display() {
        assert_eq!(RecordType::Conquests.to_string(), "conquests");
        assert_eq!(RecordType::Favorites.to_string(), "favorites");
    }
}
