//! # Domain models for the diary
//!
//! | Type | Represents |
//! |------|-----------|
//! | [`Identity`] | The signed-in account as reported by the auth backend (`id`, `email`). Read-only here. |
//! | [`Category`] | One of the five fixed entry categories, with display metadata. |
//! | [`DiaryEntry`] | A journal entry owned by exactly one identity. |
//! | [`EntryDraft`] / [`EntryPatch`] | User input for creating / partially updating an entry. |
//! | [`Profile`] | The one-to-one profile row (`username`, `avatar_url`). |
//!
//! The `*Row` types mirror the remote table columns (snake_case, `user_id`) and
//! convert to and from the client-facing types; they never leave this crate.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::Row;
use crate::error::{DiaryError, Result};

/// Opaque user handle owned by the auth backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
}

impl Identity {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }

    /// Local part of the email address, used as the default username.
    pub fn email_local_part(&self) -> &str {
        self.email.split('@').next().unwrap_or_default()
    }
}

/// Entry category.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Dream,
    Travel,
    Home,
    Work,
    #[default]
    Personal,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Dream,
        Category::Travel,
        Category::Home,
        Category::Work,
        Category::Personal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Dream => "Dream",
            Category::Travel => "Travel",
            Category::Home => "Home",
            Category::Work => "Work",
            Category::Personal => "Personal",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Category::Dream => "✨",
            Category::Travel => "✈️",
            Category::Home => "🏠",
            Category::Work => "💼",
            Category::Personal => "📝",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Category::Dream => "Record your dreams and aspirations",
            Category::Travel => "Document your adventures",
            Category::Home => "Memories from home",
            Category::Work => "Professional life journal",
            Category::Personal => "Your personal thoughts",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = DiaryError;

    /// Case-insensitive, so route parameters like `travel` resolve.
    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DiaryError::validation(format!("Unknown category: {s}")))
    }
}

/// A diary entry as held by the Entry Store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: Category,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub image_url: Option<String>,
}

impl DiaryEntry {
    /// Case-insensitive substring match over title and content.
    pub fn matches(&self, needle_lowercase: &str) -> bool {
        self.title.to_lowercase().contains(needle_lowercase)
            || self.content.to_lowercase().contains(needle_lowercase)
    }
}

/// User input for a new entry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntryDraft {
    pub title: String,
    pub content: String,
    pub category: Category,
    pub image_url: Option<String>,
}

impl EntryDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>, category: Category) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            category,
            image_url: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_text("Title", &self.title)?;
        require_text("Content", &self.content)
    }
}

/// Partial update; `None` leaves a field untouched.
///
/// `image_url: Some(None)` clears the image.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntryPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<Category>,
    pub image_url: Option<Option<String>>,
}

impl EntryPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.category.is_none()
            && self.image_url.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            require_text("Title", title)?;
        }
        if let Some(content) = &self.content {
            require_text("Content", content)?;
        }
        if self.is_empty() {
            return Err(DiaryError::validation("Nothing to update"));
        }
        Ok(())
    }

    /// Column changes for the remote update, stamped with `updated_at`.
    pub(crate) fn to_changes(&self, now: DateTime<Utc>) -> Row {
        let mut row = Row::new();
        if let Some(title) = &self.title {
            row.insert("title".into(), title.clone().into());
        }
        if let Some(content) = &self.content {
            row.insert("content".into(), content.clone().into());
        }
        if let Some(category) = &self.category {
            row.insert("category".into(), category.as_str().into());
        }
        if let Some(image_url) = &self.image_url {
            row.insert(
                "image_url".into(),
                image_url.clone().map_or(serde_json::Value::Null, Into::into),
            );
        }
        row.insert("updated_at".into(), now.to_rfc3339().into());
        row
    }
}

impl From<&DiaryEntry> for EntryDraft {
    fn from(entry: &DiaryEntry) -> Self {
        Self {
            title: entry.title.clone(),
            content: entry.content.clone(),
            category: entry.category,
            image_url: entry.image_url.clone(),
        }
    }
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DiaryError::validation(format!("{field} is required")));
    }
    Ok(())
}

/// One-to-one profile of an identity.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

impl Profile {
    /// Username, falling back to the email local part.
    pub fn display_name<'a>(&'a self, identity: &'a Identity) -> &'a str {
        self.username
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| identity.email_local_part())
    }
}

/// Remote shape of an entry row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct EntryRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub category: Category,
    #[serde(default)]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntryRow {
    pub fn into_entry(self) -> DiaryEntry {
        DiaryEntry {
            id: self.id,
            title: self.title,
            content: self.content,
            category: self.category,
            created_at: self.created_at,
            updated_at: self.updated_at,
            image_url: self.image_url,
        }
    }
}

/// Insert payload; the backend assigns `id`.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct NewEntryRow<'a> {
    pub user_id: &'a str,
    pub title: &'a str,
    pub content: &'a str,
    pub category: Category,
    pub image_url: Option<&'a str>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Remote shape of a profile row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct ProfileRow {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl ProfileRow {
    pub fn into_profile(self) -> Profile {
        Profile {
            id: self.id,
            username: self.username,
            avatar_url: self.avatar_url,
        }
    }
}

/// Serialise a value into a row object.
pub(crate) fn to_row<T: Serialize>(value: &T) -> Result<Row> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(DiaryError::remote("Row payload is not an object")),
        Err(e) => Err(DiaryError::remote(format!("Failed to encode row: {e}"))),
    }
}

/// Deserialise a row object into a typed row.
pub(crate) fn from_row<T: for<'de> Deserialize<'de>>(row: Row) -> Result<T> {
    serde_json::from_value(serde_json::Value::Object(row))
        .map_err(|e| DiaryError::remote(format!("Malformed row: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_is_case_insensitive() {
        assert_eq!("travel".parse::<Category>().unwrap(), Category::Travel);
        assert_eq!("Dream".parse::<Category>().unwrap(), Category::Dream);
        assert!(matches!(
            "Holiday".parse::<Category>(),
            Err(DiaryError::Validation(_))
        ));
    }

    #[test]
    fn test_draft_requires_title_and_content() {
        assert!(EntryDraft::new("Paris", "trip", Category::Travel)
            .validate()
            .is_ok());
        assert!(EntryDraft::new("  ", "trip", Category::Travel)
            .validate()
            .is_err());
        assert!(EntryDraft::new("Paris", "", Category::Travel)
            .validate()
            .is_err());
    }

    #[test]
    fn test_patch_changes_only_set_fields() {
        let now = Utc::now();
        let patch = EntryPatch {
            title: Some("Rome".into()),
            image_url: Some(None),
            ..Default::default()
        };
        let changes = patch.to_changes(now);
        assert_eq!(changes["title"], "Rome");
        assert!(changes["image_url"].is_null());
        assert!(!changes.contains_key("content"));
        assert!(!changes.contains_key("category"));
        assert!(changes.contains_key("updated_at"));
    }

    #[test]
    fn test_empty_patch_is_rejected() {
        assert!(EntryPatch::default().validate().is_err());
    }

    #[test]
    fn test_entry_row_decodes_backend_json() {
        let row = serde_json::json!({
            "id": "e1",
            "user_id": "u1",
            "title": "Paris",
            "content": "trip",
            "category": "Travel",
            "image_url": null,
            "created_at": "2024-05-01T10:00:00+00:00",
            "updated_at": "2024-05-01T10:00:00Z"
        });
        let serde_json::Value::Object(row) = row else {
            unreachable!()
        };
        let entry = from_row::<EntryRow>(row).unwrap().into_entry();
        assert_eq!(entry.category, Category::Travel);
        assert!(entry.image_url.is_none());
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let identity = Identity::new("u1", "ana@example.com");
        let profile = Profile {
            id: "u1".into(),
            ..Default::default()
        };
        assert_eq!(profile.display_name(&identity), "ana");
    }
}
