//! User entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::complaint::ComplaintCategory;

/// Top-level account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[sea_orm(string_value = "student")]
    Student,
    #[sea_orm(string_value = "management")]
    Management,
}

/// Sub-role held by approved management accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum ManagementRole {
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "subadmin")]
    Subadmin,
    #[sea_orm(string_value = "caretaker")]
    Caretaker,
}

/// User model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Login email, stored lowercased.
    #[sea_orm(unique)]
    pub email: String,

    /// Argon2 password hash.
    pub password_hash: String,

    pub role: UserRole,

    /// Hostel name (students only).
    #[sea_orm(nullable)]
    pub hostel: Option<String>,

    /// Hostel block (students only).
    #[sea_orm(nullable)]
    pub block: Option<String>,

    /// Room number (students only).
    #[sea_orm(nullable)]
    pub room_number: Option<String>,

    /// Students are approved on signup; management accounts await an admin.
    #[sea_orm(default_value = false)]
    pub is_approved: bool,

    #[sea_orm(default_value = false)]
    pub is_admin: bool,

    /// Assigned management sub-role, if any.
    #[sea_orm(nullable)]
    pub management_role: Option<ManagementRole>,

    /// Complaint category a caretaker handles.
    #[sea_orm(nullable)]
    pub specialization: Option<ComplaintCategory>,

    /// Currently valid refresh token, rotated on every refresh.
    #[sea_orm(nullable)]
    pub refresh_token: Option<String>,

    pub created_at: chrono::DateTime<chrono::Utc>,

    #[sea_orm(nullable)]
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
