//! Complaint entity.
//!
//! A complaint embeds its audit timeline, media pointers, upvoter set, and
//! merge linkage as JSON columns; the typed accessors below are the only
//! supported way to read them.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Complaint category. Caretakers carry one of these as a specialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "kebab-case")]
pub enum ComplaintCategory {
    #[sea_orm(string_value = "plumbing")]
    Plumbing,
    #[sea_orm(string_value = "electrical")]
    Electrical,
    #[sea_orm(string_value = "cleanliness")]
    Cleanliness,
    #[sea_orm(string_value = "internet")]
    Internet,
    #[sea_orm(string_value = "furniture")]
    Furniture,
    #[sea_orm(string_value = "other")]
    Other,
}

/// Complaint priority.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, Default,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "kebab-case")]
pub enum ComplaintPriority {
    #[sea_orm(string_value = "low")]
    Low,
    #[sea_orm(string_value = "medium")]
    #[default]
    Medium,
    #[sea_orm(string_value = "high")]
    High,
    #[sea_orm(string_value = "emergency")]
    Emergency,
}

/// Complaint lifecycle status.
///
/// `Merged` is only ever entered through the merge operation, never through
/// a plain status update.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, Default,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "kebab-case")]
pub enum ComplaintStatus {
    #[sea_orm(string_value = "reported")]
    #[default]
    Reported,
    #[sea_orm(string_value = "assigned")]
    Assigned,
    #[sea_orm(string_value = "in-progress")]
    InProgress,
    #[sea_orm(string_value = "resolved")]
    Resolved,
    #[sea_orm(string_value = "closed")]
    Closed,
    #[sea_orm(string_value = "merged")]
    Merged,
}

impl ComplaintStatus {
    /// Bucket rank for the management view: unresolved work surfaces first.
    #[must_use]
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Reported => 0,
            Self::Assigned => 1,
            Self::InProgress => 2,
            Self::Resolved => 3,
            Self::Closed => 4,
            Self::Merged => 5,
        }
    }

    /// Whether the record has reached a soft end of its lifecycle.
    ///
    /// Terminal records keep their caretaker and priority; only deletion
    /// removes them.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }
}

/// One entry of the append-only audit timeline embedded in a complaint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub status: ComplaintStatus,
    pub timestamp: DateTime<Utc>,
    pub updated_by: String,
    pub comment: String,
}

/// Complaint model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "complaint")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The reporting student. Immutable after creation.
    #[sea_orm(indexed)]
    pub student_id: String,

    pub category: ComplaintCategory,

    pub priority: ComplaintPriority,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    /// Opaque media URLs attached at creation.
    #[sea_orm(column_type = "JsonBinary")]
    pub media: Json,

    /// Whether non-owning students see this in the community feed.
    #[sea_orm(default_value = false)]
    pub is_public: bool,

    /// Location tag, copied from the student's profile at creation and
    /// never re-derived.
    pub hostel: String,
    pub block: String,
    pub room_number: String,

    pub status: ComplaintStatus,

    /// Set when this record is a duplicate folded into a primary.
    #[sea_orm(nullable, indexed)]
    pub merged_into: Option<String>,

    /// Ids of duplicates folded into this record (set semantics).
    #[sea_orm(column_type = "JsonBinary")]
    pub merged_issues: Json,

    /// Display name of the assigned caretaker.
    #[sea_orm(nullable)]
    pub caretaker: Option<String>,

    /// Assigned caretaker's user id.
    #[sea_orm(nullable, indexed)]
    pub caretaker_id: Option<String>,

    /// Append-only audit trail, never empty.
    #[sea_orm(column_type = "JsonBinary")]
    pub timeline: Json,

    /// Upvoter user ids (set semantics, toggle membership).
    #[sea_orm(column_type = "JsonBinary")]
    pub upvotes: Json,

    pub created_at: DateTime<Utc>,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Decode the audit timeline.
    #[must_use]
    pub fn timeline_entries(&self) -> Vec<TimelineEntry> {
        serde_json::from_value(self.timeline.clone()).unwrap_or_default()
    }

    /// Decode the merged duplicate ids.
    #[must_use]
    pub fn merged_issue_ids(&self) -> BTreeSet<String> {
        serde_json::from_value(self.merged_issues.clone()).unwrap_or_default()
    }

    /// Decode the upvoter ids.
    #[must_use]
    pub fn upvoter_ids(&self) -> BTreeSet<String> {
        serde_json::from_value(self.upvotes.clone()).unwrap_or_default()
    }

    /// Decode the attached media URLs.
    #[must_use]
    pub fn media_urls(&self) -> Vec<String> {
        serde_json::from_value(self.media.clone()).unwrap_or_default()
    }
}

/// Encode timeline entries for storage.
#[must_use]
pub fn timeline_json(entries: &[TimelineEntry]) -> Json {
    serde_json::to_value(entries).unwrap_or_else(|_| Json::Array(Vec::new()))
}

/// Encode an id set for storage.
#[must_use]
pub fn id_set_json(ids: &BTreeSet<String>) -> Json {
    serde_json::to_value(ids).unwrap_or_else(|_| Json::Array(Vec::new()))
}

/// Encode media URLs for storage.
#[must_use]
pub fn media_json(urls: &[String]) -> Json {
    serde_json::to_value(urls).unwrap_or_else(|_| Json::Array(Vec::new()))
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::StudentId",
        to = "super::user::Column::Id"
    )]
    Student,

    #[sea_orm(belongs_to = "Entity", from = "Column::MergedInto", to = "Column::Id")]
    Primary,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
