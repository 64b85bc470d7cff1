//! Complaint endpoints.

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use hostelhub_common::AppResult;
use hostelhub_core::{
    visibility::ManagementTab, AssignInput, CreateComplaintInput, MergeInput,
};
use hostelhub_db::entities::{
    complaint::{self, ComplaintCategory, ComplaintPriority, ComplaintStatus, TimelineEntry},
    user,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{extractors::Caller, middleware::AppState, response::ApiResponse};

/// Create complaint router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_complaint))
        .route("/", get(management_complaints))
        .route("/my", get(my_complaints))
        .route("/public", get(public_complaints))
        .route("/merge", post(merge_complaints))
        .route("/delete-bulk", post(bulk_delete))
        .route("/cleanup", post(cleanup_resolved))
        .route("/{id}", delete(delete_complaint))
        .route("/{id}/assign", put(assign_caretaker))
        .route("/{id}/accept", put(accept_issue))
        .route("/{id}/status", put(update_status))
        .route("/{id}/priority", put(update_priority))
        .route("/{id}/upvote", post(toggle_upvote))
}

/// Minimal reporter info attached to annotated views.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReporterInfo {
    pub email: String,
    pub block: Option<String>,
    pub room_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostel: Option<String>,
}

impl ReporterInfo {
    /// The fields the community feed exposes.
    fn for_feed(user: &user::Model) -> Self {
        Self {
            email: user.email.clone(),
            block: user.block.clone(),
            room_number: user.room_number.clone(),
            hostel: None,
        }
    }

    /// The fields the management dashboard exposes.
    fn for_management(user: &user::Model) -> Self {
        Self {
            email: user.email.clone(),
            block: user.block.clone(),
            room_number: user.room_number.clone(),
            hostel: user.hostel.clone(),
        }
    }
}

/// Complaint response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintResponse {
    pub id: String,
    pub student: String,
    pub category: ComplaintCategory,
    pub priority: ComplaintPriority,
    pub description: String,
    pub media: Vec<String>,
    pub is_public: bool,
    pub hostel: String,
    pub block: String,
    pub room_number: String,
    pub status: ComplaintStatus,
    pub merged_into: Option<String>,
    pub merged_issues: Vec<String>,
    pub caretaker: Option<String>,
    pub caretaker_id: Option<String>,
    pub timeline: Vec<TimelineEntry>,
    pub upvotes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporter: Option<ReporterInfo>,
}

impl From<complaint::Model> for ComplaintResponse {
    fn from(record: complaint::Model) -> Self {
        Self {
            student: record.student_id.clone(),
            category: record.category,
            priority: record.priority,
            description: record.description.clone(),
            media: record.media_urls(),
            is_public: record.is_public,
            hostel: record.hostel.clone(),
            block: record.block.clone(),
            room_number: record.room_number.clone(),
            status: record.status,
            merged_into: record.merged_into.clone(),
            merged_issues: record.merged_issue_ids().into_iter().collect(),
            caretaker: record.caretaker.clone(),
            caretaker_id: record.caretaker_id.clone(),
            timeline: record.timeline_entries(),
            upvotes: record.upvoter_ids().into_iter().collect(),
            created_at: record.created_at,
            updated_at: record.updated_at,
            reporter: None,
            id: record.id,
        }
    }
}

/// List response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintListResponse {
    pub complaints: Vec<ComplaintResponse>,
    pub total: u64,
}

/// Create complaint request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateComplaintRequest {
    pub category: String,
    pub priority: Option<String>,
    pub description: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub media: Vec<String>,
}

/// Raise a new complaint.
async fn create_complaint(
    Caller(caller): Caller,
    State(state): State<AppState>,
    Json(req): Json<CreateComplaintRequest>,
) -> AppResult<ApiResponse<ComplaintResponse>> {
    let record = state
        .complaint_service
        .create(
            &caller,
            CreateComplaintInput {
                category: req.category,
                priority: req.priority,
                description: req.description,
                is_public: req.is_public,
                media: req.media,
            },
        )
        .await?;

    info!(complaint_id = %record.id, student_id = %record.student_id, "Complaint raised");

    Ok(ApiResponse::ok(ComplaintResponse::from(record)))
}

/// The caller's own complaints.
async fn my_complaints(
    Caller(caller): Caller,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<ComplaintListResponse>> {
    let complaints: Vec<ComplaintResponse> = state
        .complaint_service
        .list_own(&caller)
        .await?
        .into_iter()
        .map(ComplaintResponse::from)
        .collect();
    let total = complaints.len() as u64;

    Ok(ApiResponse::ok(ComplaintListResponse { complaints, total }))
}

/// The community feed of public complaints.
async fn public_complaints(
    Caller(caller): Caller,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<ComplaintListResponse>> {
    let complaints: Vec<ComplaintResponse> = state
        .complaint_service
        .list_public(&caller)
        .await?
        .into_iter()
        .map(|(record, reporter)| {
            let mut response = ComplaintResponse::from(record);
            response.reporter = reporter.as_ref().map(ReporterInfo::for_feed);
            response
        })
        .collect();
    let total = complaints.len() as u64;

    Ok(ApiResponse::ok(ComplaintListResponse { complaints, total }))
}

/// Management list query.
#[derive(Debug, Deserialize)]
pub struct ManagementQuery {
    /// `issues` (default) or `resolved`.
    pub tab: Option<String>,
}

/// The management dashboard view.
async fn management_complaints(
    Caller(caller): Caller,
    State(state): State<AppState>,
    Query(query): Query<ManagementQuery>,
) -> AppResult<ApiResponse<ComplaintListResponse>> {
    let tab = match query.tab.as_deref() {
        Some(value) => ManagementTab::parse(value)?,
        None => ManagementTab::Issues,
    };

    let complaints: Vec<ComplaintResponse> = state
        .complaint_service
        .list_for_management(&caller, tab)
        .await?
        .into_iter()
        .map(|(record, reporter)| {
            let mut response = ComplaintResponse::from(record);
            response.reporter = reporter.as_ref().map(ReporterInfo::for_management);
            response
        })
        .collect();
    let total = complaints.len() as u64;

    Ok(ApiResponse::ok(ComplaintListResponse { complaints, total }))
}

/// Assign request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub caretaker: String,
    pub caretaker_id: Option<String>,
}

/// Assign a caretaker to a complaint.
async fn assign_caretaker(
    Caller(caller): Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AssignRequest>,
) -> AppResult<ApiResponse<ComplaintResponse>> {
    info!(complaint_id = %id, caretaker = %req.caretaker, "Assigning caretaker");

    let record = state
        .complaint_service
        .assign(
            &caller,
            &id,
            AssignInput {
                caretaker: req.caretaker,
                caretaker_id: req.caretaker_id,
            },
        )
        .await?;

    Ok(ApiResponse::ok(ComplaintResponse::from(record)))
}

/// A caretaker claims an unclaimed complaint.
async fn accept_issue(
    Caller(caller): Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ComplaintResponse>> {
    info!(complaint_id = %id, caller_id = %caller.id(), "Accepting complaint");

    let record = state.complaint_service.accept_issue(&caller, &id).await?;
    Ok(ApiResponse::ok(ComplaintResponse::from(record)))
}

/// Status update request.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
    pub comment: Option<String>,
}

/// Update a complaint's status, cascading to merged duplicates.
async fn update_status(
    Caller(caller): Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> AppResult<ApiResponse<ComplaintResponse>> {
    info!(complaint_id = %id, status = %req.status, "Updating complaint status");

    let record = state
        .complaint_service
        .update_status(&caller, &id, &req.status, req.comment)
        .await?;

    Ok(ApiResponse::ok(ComplaintResponse::from(record)))
}

/// Priority update request.
#[derive(Debug, Deserialize)]
pub struct PriorityRequest {
    pub priority: String,
    pub comment: Option<String>,
}

/// Update a complaint's priority.
async fn update_priority(
    Caller(caller): Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PriorityRequest>,
) -> AppResult<ApiResponse<ComplaintResponse>> {
    info!(complaint_id = %id, priority = %req.priority, "Updating complaint priority");

    let record = state
        .complaint_service
        .update_priority(&caller, &id, &req.priority, req.comment)
        .await?;

    Ok(ApiResponse::ok(ComplaintResponse::from(record)))
}

/// Merge request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    pub primary_id: String,
    pub duplicate_ids: Vec<String>,
}

/// Fold duplicate complaints into a primary.
async fn merge_complaints(
    Caller(caller): Caller,
    State(state): State<AppState>,
    Json(req): Json<MergeRequest>,
) -> AppResult<ApiResponse<ComplaintResponse>> {
    info!(
        primary_id = %req.primary_id,
        duplicates = req.duplicate_ids.len(),
        "Merging complaints"
    );

    let record = state
        .complaint_service
        .merge(
            &caller,
            MergeInput {
                primary_id: req.primary_id,
                duplicate_ids: req.duplicate_ids,
            },
        )
        .await?;

    Ok(ApiResponse::ok(ComplaintResponse::from(record)))
}

/// Upvote response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpvoteResponse {
    pub upvotes: Vec<String>,
}

/// Toggle the caller's upvote.
async fn toggle_upvote(
    Caller(caller): Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<UpvoteResponse>> {
    let record = state.complaint_service.toggle_upvote(&caller, &id).await?;

    Ok(ApiResponse::ok(UpvoteResponse {
        upvotes: record.upvoter_ids().into_iter().collect(),
    }))
}

/// Confirmation response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationResponse {
    pub message: String,
}

/// Hard-delete one complaint.
async fn delete_complaint(
    Caller(caller): Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ConfirmationResponse>> {
    info!(complaint_id = %id, caller_id = %caller.id(), "Deleting complaint");

    state.complaint_service.delete(&caller, &id).await?;

    Ok(ApiResponse::ok(ConfirmationResponse {
        message: "Complaint deleted".to_string(),
    }))
}

/// Bulk delete request.
#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<String>,
}

/// Hard-delete every listed complaint that still exists.
async fn bulk_delete(
    Caller(caller): Caller,
    State(state): State<AppState>,
    Json(req): Json<BulkDeleteRequest>,
) -> AppResult<ApiResponse<ConfirmationResponse>> {
    info!(count = req.ids.len(), caller_id = %caller.id(), "Bulk deleting complaints");

    let removed = state.complaint_service.bulk_delete(&caller, &req.ids).await?;

    Ok(ApiResponse::ok(ConfirmationResponse {
        message: format!("Deleted {removed} complaint(s)"),
    }))
}

/// Cleanup response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    pub message: String,
    pub count: u64,
}

/// Purge all terminal-state complaints.
async fn cleanup_resolved(
    Caller(caller): Caller,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<CleanupResponse>> {
    info!(caller_id = %caller.id(), "Cleaning up terminal complaints");

    let count = state.complaint_service.cleanup_resolved(&caller).await?;

    Ok(ApiResponse::ok(CleanupResponse {
        message: format!("Removed {count} complaint(s)"),
        count,
    }))
}
