//! Complaint service: lifecycle engine, merge coordinator, and bulk
//! maintenance.
//!
//! Every operation takes the caller's [`CallerContext`] and fails with
//! `Forbidden` before touching the store when the role does not permit it.
//! Timeline entries are append-only; mutations never rewrite history.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use hostelhub_common::{AppError, AppResult, IdGenerator};
use hostelhub_db::{
    entities::{
        complaint::{
            self, id_set_json, media_json, timeline_json, ComplaintCategory, ComplaintPriority,
            ComplaintStatus, TimelineEntry,
        },
        user,
    },
    repositories::{ComplaintRepository, ComplaintScope, UserRepository},
};
use sea_orm::{ActiveEnum, ActiveValue::Set};

use crate::caller::CallerContext;
use crate::services::visibility::{self, ManagementTab};

const MAX_DESCRIPTION_LEN: usize = 4000;

/// Whether the lifecycle engine permits a direct status transition.
///
/// Management may move a complaint between any of the working states,
/// including reopening resolved work. `Merged` is reserved for the merge
/// coordinator: it can neither be entered nor left through a plain status
/// update (duplicates inherit their outcome from the primary).
#[must_use]
pub const fn transition_permitted(from: ComplaintStatus, to: ComplaintStatus) -> bool {
    !matches!(from, ComplaintStatus::Merged) && !matches!(to, ComplaintStatus::Merged)
}

/// Input for raising a complaint.
#[derive(Debug, Clone)]
pub struct CreateComplaintInput {
    /// Category wire value, validated against the closed set.
    pub category: String,
    /// Priority wire value; defaults to medium when absent.
    pub priority: Option<String>,
    /// Free-text description.
    pub description: String,
    /// Whether the complaint appears in the community feed.
    pub is_public: bool,
    /// Opaque media URLs.
    pub media: Vec<String>,
}

/// Input for assigning a caretaker.
#[derive(Debug, Clone)]
pub struct AssignInput {
    /// Caretaker display name.
    pub caretaker: String,
    /// Caretaker user id, when the client knows it.
    pub caretaker_id: Option<String>,
}

/// Input for merging duplicate complaints under a primary.
#[derive(Debug, Clone)]
pub struct MergeInput {
    /// The surviving primary complaint.
    pub primary_id: String,
    /// The duplicates to fold into it.
    pub duplicate_ids: Vec<String>,
}

/// A complaint paired with minimal reporter info for annotated views.
pub type AnnotatedComplaint = (complaint::Model, Option<user::Model>);

/// Service for the complaint lifecycle.
#[derive(Clone)]
pub struct ComplaintService {
    complaint_repo: ComplaintRepository,
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

impl ComplaintService {
    /// Create a new complaint service.
    #[must_use]
    pub const fn new(complaint_repo: ComplaintRepository, user_repo: UserRepository) -> Self {
        Self {
            complaint_repo,
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    // ========== Creation and views ==========

    /// Raise a new complaint. The location tag is copied from the student's
    /// profile here and never re-derived afterwards.
    pub async fn create(
        &self,
        caller: &CallerContext,
        input: CreateComplaintInput,
    ) -> AppResult<complaint::Model> {
        let CallerContext::Student {
            id: student_id,
            hostel,
            block,
            room_number,
        } = caller
        else {
            return Err(AppError::Forbidden(
                "Only students can raise complaints".to_string(),
            ));
        };

        let description = input.description.trim();
        if description.is_empty() {
            return Err(AppError::Validation("Description is required".to_string()));
        }
        if description.len() > MAX_DESCRIPTION_LEN {
            return Err(AppError::Validation("Description too long".to_string()));
        }

        let category = parse_category(&input.category)?;
        let priority = match input.priority.as_deref() {
            Some(value) => parse_priority(value)?,
            None => ComplaintPriority::default(),
        };

        let now = Utc::now();
        let opening_entry = TimelineEntry {
            status: ComplaintStatus::Reported,
            timestamp: now,
            updated_by: student_id.clone(),
            comment: "Complaint reported".to_string(),
        };

        let model = complaint::ActiveModel {
            id: Set(self.id_gen.generate()),
            student_id: Set(student_id.clone()),
            category: Set(category),
            priority: Set(priority),
            description: Set(description.to_string()),
            media: Set(media_json(&input.media)),
            is_public: Set(input.is_public),
            hostel: Set(hostel.clone()),
            block: Set(block.clone()),
            room_number: Set(room_number.clone()),
            status: Set(ComplaintStatus::Reported),
            merged_into: Set(None),
            merged_issues: Set(id_set_json(&BTreeSet::new())),
            caretaker: Set(None),
            caretaker_id: Set(None),
            timeline: Set(timeline_json(&[opening_entry])),
            upvotes: Set(id_set_json(&BTreeSet::new())),
            created_at: Set(now),
            updated_at: Set(None),
        };

        self.complaint_repo.create(model).await
    }

    /// The caller's own complaints, newest first. Students only.
    pub async fn list_own(&self, caller: &CallerContext) -> AppResult<Vec<complaint::Model>> {
        let scope = visibility::own_scope(caller)?;
        self.complaint_repo.find_scoped(&scope).await
    }

    /// The community feed, annotated with minimal reporter info.
    pub async fn list_public(&self, caller: &CallerContext) -> AppResult<Vec<AnnotatedComplaint>> {
        let scope = visibility::public_feed_scope(caller)?;
        let records = self.complaint_repo.find_scoped(&scope).await?;
        self.with_reporters(records).await
    }

    /// The management dashboard view for the requested tab.
    pub async fn list_for_management(
        &self,
        caller: &CallerContext,
        tab: ManagementTab,
    ) -> AppResult<Vec<AnnotatedComplaint>> {
        let scope = visibility::management_scope(caller, tab)?;
        let mut records = self.complaint_repo.find_scoped(&scope).await?;

        // The oversight view buckets unresolved work first; personal
        // caretaker views stay purely newest-first.
        if scope == ComplaintScope::All {
            visibility::bucket_by_status(&mut records);
        }

        self.with_reporters(records).await
    }

    // ========== Lifecycle transitions ==========

    /// Assign a caretaker. Forces the status to `assigned`.
    pub async fn assign(
        &self,
        caller: &CallerContext,
        complaint_id: &str,
        input: AssignInput,
    ) -> AppResult<complaint::Model> {
        let updated_by = require_management(caller)?;
        let record = self.complaint_repo.get_by_id(complaint_id).await?;
        ensure_mutable(&record)?;

        self.apply_assignment(record, input.caretaker, input.caretaker_id, updated_by)
            .await
    }

    /// A caretaker claims an unclaimed complaint for themselves.
    pub async fn accept_issue(
        &self,
        caller: &CallerContext,
        complaint_id: &str,
    ) -> AppResult<complaint::Model> {
        let CallerContext::Caretaker { id: staff_id, .. } = caller else {
            return Err(AppError::Forbidden(
                "Only caretakers can accept issues".to_string(),
            ));
        };

        let record = self.complaint_repo.get_by_id(complaint_id).await?;
        if record.status != ComplaintStatus::Reported {
            return Err(AppError::BadRequest(
                "Only unclaimed complaints can be accepted".to_string(),
            ));
        }

        let staff = self.user_repo.get_by_id(staff_id).await?;
        self.apply_assignment(record, staff.email, Some(staff_id.clone()), staff_id)
            .await
    }

    async fn apply_assignment(
        &self,
        record: complaint::Model,
        caretaker: String,
        caretaker_id: Option<String>,
        updated_by: &str,
    ) -> AppResult<complaint::Model> {
        let entry = TimelineEntry {
            status: ComplaintStatus::Assigned,
            timestamp: Utc::now(),
            updated_by: updated_by.to_string(),
            comment: format!("Assigned to caretaker: {caretaker}"),
        };

        let timeline = appended(&record, entry);
        let mut model: complaint::ActiveModel = record.into();
        model.caretaker = Set(Some(caretaker));
        model.caretaker_id = Set(caretaker_id);
        model.status = Set(ComplaintStatus::Assigned);
        model.timeline = Set(timeline);
        model.updated_at = Set(Some(Utc::now()));

        self.complaint_repo.save(model).await
    }

    /// Update the status. Resolving or closing a primary cascades the same
    /// status to every merged duplicate, atomically.
    pub async fn update_status(
        &self,
        caller: &CallerContext,
        complaint_id: &str,
        new_status: &str,
        comment: Option<String>,
    ) -> AppResult<complaint::Model> {
        let updated_by = require_management(caller)?;
        let new_status = parse_status(new_status)?;
        if new_status == ComplaintStatus::Merged {
            return Err(AppError::BadRequest(
                "The merged status can only be set by merging".to_string(),
            ));
        }

        let record = self.complaint_repo.get_by_id(complaint_id).await?;
        if !transition_permitted(record.status, new_status) {
            return Err(AppError::BadRequest(
                "Merged complaints are managed through their primary".to_string(),
            ));
        }

        let now = Utc::now();
        let comment = comment
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| format!("Status updated to {}", new_status.to_value()));

        // Cascade: duplicates of a resolved/closed primary inherit its
        // outcome. Dangling references simply no longer resolve.
        let mut cascaded = Vec::new();
        if new_status.is_terminal() {
            let duplicate_ids: Vec<String> = record.merged_issue_ids().into_iter().collect();
            for duplicate in self.complaint_repo.find_by_ids(&duplicate_ids).await? {
                let entry = TimelineEntry {
                    status: new_status,
                    timestamp: now,
                    updated_by: updated_by.to_string(),
                    comment: format!(
                        "Status updated to {} with primary complaint {}",
                        new_status.to_value(),
                        record.id
                    ),
                };
                let timeline = appended(&duplicate, entry);
                let mut model: complaint::ActiveModel = duplicate.into();
                model.status = Set(new_status);
                model.timeline = Set(timeline);
                model.updated_at = Set(Some(now));
                cascaded.push(model);
            }
        }

        let entry = TimelineEntry {
            status: new_status,
            timestamp: now,
            updated_by: updated_by.to_string(),
            comment,
        };
        let timeline = appended(&record, entry);
        let mut model: complaint::ActiveModel = record.into();
        model.status = Set(new_status);
        model.timeline = Set(timeline);
        model.updated_at = Set(Some(now));

        if cascaded.is_empty() {
            self.complaint_repo.save(model).await
        } else {
            self.complaint_repo.save_group(model, cascaded).await
        }
    }

    /// Update the priority. The status is untouched; the timeline records
    /// the old and new values.
    pub async fn update_priority(
        &self,
        caller: &CallerContext,
        complaint_id: &str,
        new_priority: &str,
        comment: Option<String>,
    ) -> AppResult<complaint::Model> {
        let updated_by = require_management(caller)?;
        let new_priority = parse_priority(new_priority)?;

        let record = self.complaint_repo.get_by_id(complaint_id).await?;
        ensure_mutable(&record)?;

        let old_priority = record.priority;
        let comment = comment.filter(|c| !c.trim().is_empty()).unwrap_or_else(|| {
            format!(
                "Priority changed from {} to {}",
                old_priority.to_value(),
                new_priority.to_value()
            )
        });

        let entry = TimelineEntry {
            // The current status remains in effect.
            status: record.status,
            timestamp: Utc::now(),
            updated_by: updated_by.to_string(),
            comment,
        };
        let timeline = appended(&record, entry);
        let mut model: complaint::ActiveModel = record.into();
        model.priority = Set(new_priority);
        model.timeline = Set(timeline);
        model.updated_at = Set(Some(Utc::now()));

        self.complaint_repo.save(model).await
    }

    // ========== Merging ==========

    /// Fold duplicate complaints into a primary.
    ///
    /// Duplicates are marked `merged` and pointed at the primary; the
    /// primary accumulates their ids as a set union. Merging is a
    /// single-level star: chains are rejected before any write.
    pub async fn merge(
        &self,
        caller: &CallerContext,
        input: MergeInput,
    ) -> AppResult<complaint::Model> {
        let updated_by = require_management(caller)?;
        if input.duplicate_ids.is_empty() {
            return Err(AppError::BadRequest(
                "At least one duplicate is required".to_string(),
            ));
        }

        let primary = self.complaint_repo.get_by_id(&input.primary_id).await?;
        if primary.merged_into.is_some() {
            return Err(AppError::BadRequest(
                "Cannot merge into a complaint that is itself merged".to_string(),
            ));
        }

        let requested: BTreeSet<String> = input.duplicate_ids.into_iter().collect();
        if requested.contains(&primary.id) {
            return Err(AppError::BadRequest(
                "A complaint cannot be merged into itself".to_string(),
            ));
        }

        let requested: Vec<String> = requested.into_iter().collect();
        let found = self.complaint_repo.find_by_ids(&requested).await?;

        let now = Utc::now();
        let mut merged_set = primary.merged_issue_ids();
        let mut duplicates = Vec::new();

        for duplicate in found {
            match duplicate.merged_into.as_deref() {
                // Re-merging an existing duplicate of this primary is a
                // no-op thanks to set semantics.
                Some(existing) if existing == primary.id => {
                    merged_set.insert(duplicate.id);
                    continue;
                }
                Some(_) => {
                    return Err(AppError::BadRequest(format!(
                        "Complaint {} is already merged into another complaint",
                        duplicate.id
                    )));
                }
                None => {}
            }
            if !duplicate.merged_issue_ids().is_empty() {
                return Err(AppError::BadRequest(format!(
                    "Complaint {} has duplicates of its own and cannot be merged",
                    duplicate.id
                )));
            }

            let entry = TimelineEntry {
                status: ComplaintStatus::Merged,
                timestamp: now,
                updated_by: updated_by.to_string(),
                comment: format!("Merged into complaint {}", primary.id),
            };
            let timeline = appended(&duplicate, entry);
            merged_set.insert(duplicate.id.clone());

            let mut model: complaint::ActiveModel = duplicate.into();
            model.status = Set(ComplaintStatus::Merged);
            model.merged_into = Set(Some(primary.id.clone()));
            model.timeline = Set(timeline);
            model.updated_at = Set(Some(now));
            duplicates.push(model);
        }

        // Everything requested was already merged here (or no longer
        // exists); nothing to write.
        if duplicates.is_empty() {
            return Ok(primary);
        }

        let entry = TimelineEntry {
            status: primary.status,
            timestamp: now,
            updated_by: updated_by.to_string(),
            comment: format!("Merged {} duplicate complaint(s)", duplicates.len()),
        };
        let timeline = appended(&primary, entry);
        let mut model: complaint::ActiveModel = primary.into();
        model.merged_issues = Set(id_set_json(&merged_set));
        model.timeline = Set(timeline);
        model.updated_at = Set(Some(now));

        self.complaint_repo.save_group(model, duplicates).await
    }

    // ========== Community signal ==========

    /// Toggle the caller's upvote on a complaint.
    pub async fn toggle_upvote(
        &self,
        caller: &CallerContext,
        complaint_id: &str,
    ) -> AppResult<complaint::Model> {
        let record = self.complaint_repo.get_by_id(complaint_id).await?;

        let mut upvoters = record.upvoter_ids();
        let caller_id = caller.id().to_string();
        if !upvoters.remove(&caller_id) {
            upvoters.insert(caller_id);
        }

        let mut model: complaint::ActiveModel = record.into();
        model.upvotes = Set(id_set_json(&upvoters));
        model.updated_at = Set(Some(Utc::now()));

        self.complaint_repo.save(model).await
    }

    // ========== Bulk maintenance ==========

    /// Hard-delete one complaint, whatever its status.
    pub async fn delete(&self, caller: &CallerContext, complaint_id: &str) -> AppResult<()> {
        require_admin_level(caller)?;
        self.complaint_repo.delete_by_id(complaint_id).await
    }

    /// Hard-delete every listed id that still exists; missing ids are
    /// skipped. Returns the number removed.
    pub async fn bulk_delete(&self, caller: &CallerContext, ids: &[String]) -> AppResult<u64> {
        require_admin_level(caller)?;
        self.complaint_repo.delete_many(ids).await
    }

    /// Purge all terminal-state complaints (resolved, closed, merged).
    /// Returns the number removed.
    pub async fn cleanup_resolved(&self, caller: &CallerContext) -> AppResult<u64> {
        require_admin_level(caller)?;
        self.complaint_repo.delete_terminal().await
    }

    // ========== Helpers ==========

    async fn with_reporters(
        &self,
        records: Vec<complaint::Model>,
    ) -> AppResult<Vec<AnnotatedComplaint>> {
        let reporter_ids: Vec<String> = records
            .iter()
            .map(|r| r.student_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let reporters: HashMap<String, user::Model> = self
            .user_repo
            .find_by_ids(&reporter_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        Ok(records
            .into_iter()
            .map(|record| {
                let reporter = reporters.get(&record.student_id).cloned();
                (record, reporter)
            })
            .collect())
    }
}

fn require_management(caller: &CallerContext) -> AppResult<&str> {
    match caller {
        CallerContext::Admin { id }
        | CallerContext::SubAdmin { id }
        | CallerContext::Caretaker { id, .. } => Ok(id),
        CallerContext::Student { .. } => Err(AppError::Forbidden(
            "Management role required".to_string(),
        )),
    }
}

fn require_admin_level(caller: &CallerContext) -> AppResult<&str> {
    match caller {
        CallerContext::Admin { id } | CallerContext::SubAdmin { id } => Ok(id),
        CallerContext::Student { .. } | CallerContext::Caretaker { .. } => Err(
            AppError::Forbidden("Admin role required".to_string()),
        ),
    }
}

/// Resolved and closed complaints freeze their caretaker and priority;
/// merged duplicates are managed through their primary.
fn ensure_mutable(record: &complaint::Model) -> AppResult<()> {
    if record.status == ComplaintStatus::Merged {
        return Err(AppError::BadRequest(
            "Merged complaints are managed through their primary".to_string(),
        ));
    }
    if record.status.is_terminal() {
        return Err(AppError::BadRequest(
            "Resolved or closed complaints can no longer be modified".to_string(),
        ));
    }
    Ok(())
}

fn appended(record: &complaint::Model, entry: TimelineEntry) -> serde_json::Value {
    let mut entries = record.timeline_entries();
    entries.push(entry);
    timeline_json(&entries)
}

fn parse_category(value: &str) -> AppResult<ComplaintCategory> {
    ComplaintCategory::try_from_value(&value.to_string())
        .map_err(|_| AppError::BadRequest(format!("Invalid category: {value}")))
}

fn parse_priority(value: &str) -> AppResult<ComplaintPriority> {
    ComplaintPriority::try_from_value(&value.to_string())
        .map_err(|_| AppError::BadRequest(format!("Invalid priority: {value}")))
}

fn parse_status(value: &str) -> AppResult<ComplaintStatus> {
    ComplaintStatus::try_from_value(&value.to_string())
        .map_err(|_| AppError::BadRequest(format!("Invalid status: {value}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn student() -> CallerContext {
        CallerContext::Student {
            id: "stu1".to_string(),
            hostel: "North".to_string(),
            block: "A".to_string(),
            room_number: "101".to_string(),
        }
    }

    fn admin() -> CallerContext {
        CallerContext::Admin {
            id: "adm1".to_string(),
        }
    }

    fn caretaker() -> CallerContext {
        CallerContext::Caretaker {
            id: "staff1".to_string(),
            specialization: Some(ComplaintCategory::Plumbing),
        }
    }

    fn service_with(db: Arc<DatabaseConnection>) -> ComplaintService {
        ComplaintService::new(
            ComplaintRepository::new(Arc::clone(&db)),
            UserRepository::new(db),
        )
    }

    fn mock_complaint(id: &str, status: ComplaintStatus) -> complaint::Model {
        let opening = TimelineEntry {
            status: ComplaintStatus::Reported,
            timestamp: Utc::now() - Duration::hours(1),
            updated_by: "stu1".to_string(),
            comment: "Complaint reported".to_string(),
        };
        complaint::Model {
            id: id.to_string(),
            student_id: "stu1".to_string(),
            category: ComplaintCategory::Plumbing,
            priority: ComplaintPriority::Medium,
            description: "Leaking tap".to_string(),
            media: serde_json::json!([]),
            is_public: false,
            hostel: "North".to_string(),
            block: "A".to_string(),
            room_number: "101".to_string(),
            status,
            merged_into: None,
            merged_issues: serde_json::json!([]),
            caretaker: None,
            caretaker_id: None,
            timeline: timeline_json(&[opening]),
            upvotes: serde_json::json!([]),
            created_at: Utc::now() - Duration::hours(1),
            updated_at: None,
        }
    }

    fn empty_db() -> Arc<DatabaseConnection> {
        Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection())
    }

    // ===== Transition table =====

    #[test]
    fn test_transition_table_is_permissive_between_working_states() {
        use ComplaintStatus::{Assigned, Closed, InProgress, Reported, Resolved};
        for from in [Reported, Assigned, InProgress, Resolved, Closed] {
            for to in [Reported, Assigned, InProgress, Resolved, Closed] {
                assert!(transition_permitted(from, to));
            }
        }
    }

    #[test]
    fn test_transition_table_fences_off_merged() {
        assert!(!transition_permitted(
            ComplaintStatus::Reported,
            ComplaintStatus::Merged
        ));
        assert!(!transition_permitted(
            ComplaintStatus::Merged,
            ComplaintStatus::Reported
        ));
    }

    // ===== Creation =====

    #[tokio::test]
    async fn test_create_requires_student() {
        let service = service_with(empty_db());
        let input = CreateComplaintInput {
            category: "plumbing".to_string(),
            priority: None,
            description: "Leaking tap".to_string(),
            is_public: false,
            media: Vec::new(),
        };

        let err = service.create(&admin(), input).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_category() {
        let service = service_with(empty_db());
        let input = CreateComplaintInput {
            category: "astrology".to_string(),
            priority: None,
            description: "Leaking tap".to_string(),
            is_public: false,
            media: Vec::new(),
        };

        let err = service.create(&student(), input).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_blank_description() {
        let service = service_with(empty_db());
        let input = CreateComplaintInput {
            category: "plumbing".to_string(),
            priority: None,
            description: "   ".to_string(),
            is_public: false,
            media: Vec::new(),
        };

        let err = service.create(&student(), input).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_persists_reported_complaint() {
        let created = mock_complaint("c1", ComplaintStatus::Reported);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[created.clone()]])
                .into_connection(),
        );
        let service = service_with(db);

        let input = CreateComplaintInput {
            category: "plumbing".to_string(),
            priority: Some("high".to_string()),
            description: "Leaking tap".to_string(),
            is_public: true,
            media: vec!["https://cdn.example/tap.jpg".to_string()],
        };

        let result = service.create(&student(), input).await.unwrap();
        assert_eq!(result.status, ComplaintStatus::Reported);
        assert_eq!(result.timeline_entries().len(), 1);
    }

    // ===== Assignment =====

    #[tokio::test]
    async fn test_assign_forbidden_for_students() {
        let service = service_with(empty_db());
        let input = AssignInput {
            caretaker: "Ravi".to_string(),
            caretaker_id: None,
        };

        let err = service.assign(&student(), "c1", input).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_assign_forces_assigned_status() {
        let reported = mock_complaint("c1", ComplaintStatus::Reported);
        let mut assigned = mock_complaint("c1", ComplaintStatus::Assigned);
        assigned.caretaker = Some("Ravi".to_string());
        assigned.caretaker_id = Some("staff1".to_string());

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[reported]])
                .append_query_results([[assigned.clone()]])
                .into_connection(),
        );
        let service = service_with(db);

        let input = AssignInput {
            caretaker: "Ravi".to_string(),
            caretaker_id: Some("staff1".to_string()),
        };
        let result = service.assign(&admin(), "c1", input).await.unwrap();

        assert_eq!(result.status, ComplaintStatus::Assigned);
        assert_eq!(result.caretaker.as_deref(), Some("Ravi"));
    }

    #[tokio::test]
    async fn test_assign_rejects_resolved_complaint() {
        let resolved = mock_complaint("c1", ComplaintStatus::Resolved);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[resolved]])
                .into_connection(),
        );
        let service = service_with(db);

        let input = AssignInput {
            caretaker: "Ravi".to_string(),
            caretaker_id: None,
        };
        let err = service.assign(&admin(), "c1", input).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_assign_missing_complaint_is_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<complaint::Model>::new()])
                .into_connection(),
        );
        let service = service_with(db);

        let input = AssignInput {
            caretaker: "Ravi".to_string(),
            caretaker_id: None,
        };
        let err = service.assign(&admin(), "nope", input).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_accept_issue_assigns_the_calling_caretaker() {
        let reported = mock_complaint("c1", ComplaintStatus::Reported);
        let staff = user::Model {
            id: "staff1".to_string(),
            email: "staff1@example.com".to_string(),
            password_hash: "$argon2$x".to_string(),
            role: user::UserRole::Management,
            hostel: None,
            block: None,
            room_number: None,
            is_approved: true,
            is_admin: false,
            management_role: Some(user::ManagementRole::Caretaker),
            specialization: Some(ComplaintCategory::Plumbing),
            refresh_token: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        let mut accepted = mock_complaint("c1", ComplaintStatus::Assigned);
        accepted.caretaker = Some("staff1@example.com".to_string());
        accepted.caretaker_id = Some("staff1".to_string());

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[reported]])
                .append_query_results([[staff]])
                .append_query_results([[accepted.clone()]])
                .into_connection(),
        );
        let service = service_with(db);

        let result = service.accept_issue(&caretaker(), "c1").await.unwrap();
        assert_eq!(result.caretaker_id.as_deref(), Some("staff1"));
    }

    #[tokio::test]
    async fn test_accept_issue_rejects_claimed_complaint() {
        let claimed = mock_complaint("c1", ComplaintStatus::Assigned);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[claimed]])
                .into_connection(),
        );
        let service = service_with(db);

        let err = service.accept_issue(&caretaker(), "c1").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    // ===== Status updates =====

    #[tokio::test]
    async fn test_update_status_rejects_unknown_value() {
        let service = service_with(empty_db());
        let err = service
            .update_status(&admin(), "c1", "fixed", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_update_status_rejects_direct_merge() {
        let service = service_with(empty_db());
        let err = service
            .update_status(&admin(), "c1", "merged", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_update_status_forbidden_for_students() {
        let service = service_with(empty_db());
        let err = service
            .update_status(&student(), "c1", "resolved", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_update_status_rejects_merged_record() {
        let mut merged = mock_complaint("c1", ComplaintStatus::Merged);
        merged.merged_into = Some("c0".to_string());
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[merged]])
                .into_connection(),
        );
        let service = service_with(db);

        let err = service
            .update_status(&admin(), "c1", "resolved", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_update_status_without_duplicates_saves_single_record() {
        let record = mock_complaint("c1", ComplaintStatus::Assigned);
        let updated = mock_complaint("c1", ComplaintStatus::InProgress);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[record]])
                .append_query_results([[updated.clone()]])
                .into_connection(),
        );
        let service = service_with(db);

        let result = service
            .update_status(&admin(), "c1", "in-progress", Some("On it".to_string()))
            .await
            .unwrap();
        assert_eq!(result.status, ComplaintStatus::InProgress);
    }

    #[tokio::test]
    async fn test_resolve_cascades_to_merged_duplicates() {
        let mut primary = mock_complaint("c1", ComplaintStatus::InProgress);
        primary.merged_issues = serde_json::json!(["c2", "c3"]);
        let dup_a = mock_complaint("c2", ComplaintStatus::Merged);
        let dup_b = mock_complaint("c3", ComplaintStatus::Merged);

        let resolved_a = mock_complaint("c2", ComplaintStatus::Resolved);
        let resolved_b = mock_complaint("c3", ComplaintStatus::Resolved);
        let mut resolved_primary = mock_complaint("c1", ComplaintStatus::Resolved);
        resolved_primary.merged_issues = serde_json::json!(["c2", "c3"]);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                // get_by_id
                .append_query_results([[primary]])
                // find_by_ids for the cascade set
                .append_query_results([[dup_a, dup_b]])
                // transactional updates: duplicates first, then primary
                .append_query_results([[resolved_a]])
                .append_query_results([[resolved_b]])
                .append_query_results([[resolved_primary.clone()]])
                .into_connection(),
        );
        let service = service_with(db);

        let result = service
            .update_status(&admin(), "c1", "resolved", None)
            .await
            .unwrap();

        assert_eq!(result.status, ComplaintStatus::Resolved);
        assert_eq!(
            result.merged_issue_ids(),
            ["c2".to_string(), "c3".to_string()].into_iter().collect()
        );
    }

    #[tokio::test]
    async fn test_resolve_with_dangling_duplicates_skips_them() {
        let mut primary = mock_complaint("c1", ComplaintStatus::InProgress);
        primary.merged_issues = serde_json::json!(["gone"]);
        let resolved_primary = mock_complaint("c1", ComplaintStatus::Resolved);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[primary]])
                // No duplicates resolve any more.
                .append_query_results([Vec::<complaint::Model>::new()])
                // Only the primary itself is written.
                .append_query_results([[resolved_primary]])
                .into_connection(),
        );
        let service = service_with(db);

        let result = service
            .update_status(&admin(), "c1", "resolved", None)
            .await
            .unwrap();
        assert_eq!(result.status, ComplaintStatus::Resolved);
    }

    // ===== Priority updates =====

    #[tokio::test]
    async fn test_update_priority_rejects_unknown_value() {
        let service = service_with(empty_db());
        let err = service
            .update_priority(&admin(), "c1", "critical", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_update_priority_is_frozen_after_resolution() {
        let resolved = mock_complaint("c1", ComplaintStatus::Resolved);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[resolved]])
                .into_connection(),
        );
        let service = service_with(db);

        let err = service
            .update_priority(&admin(), "c1", "high", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_update_priority_keeps_status() {
        let record = mock_complaint("c1", ComplaintStatus::Assigned);
        let mut updated = mock_complaint("c1", ComplaintStatus::Assigned);
        updated.priority = ComplaintPriority::Emergency;

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[record]])
                .append_query_results([[updated.clone()]])
                .into_connection(),
        );
        let service = service_with(db);

        let result = service
            .update_priority(&admin(), "c1", "emergency", None)
            .await
            .unwrap();
        assert_eq!(result.status, ComplaintStatus::Assigned);
        assert_eq!(result.priority, ComplaintPriority::Emergency);
    }

    // ===== Merging =====

    #[tokio::test]
    async fn test_merge_requires_duplicates() {
        let service = service_with(empty_db());
        let err = service
            .merge(
                &admin(),
                MergeInput {
                    primary_id: "c1".to_string(),
                    duplicate_ids: Vec::new(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_merge_rejects_missing_primary() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<complaint::Model>::new()])
                .into_connection(),
        );
        let service = service_with(db);

        let err = service
            .merge(
                &admin(),
                MergeInput {
                    primary_id: "nope".to_string(),
                    duplicate_ids: vec!["c2".to_string()],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_merge_rejects_self_merge() {
        let primary = mock_complaint("c1", ComplaintStatus::Reported);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[primary]])
                .into_connection(),
        );
        let service = service_with(db);

        let err = service
            .merge(
                &admin(),
                MergeInput {
                    primary_id: "c1".to_string(),
                    duplicate_ids: vec!["c1".to_string()],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_merge_rejects_merged_primary() {
        let mut primary = mock_complaint("c1", ComplaintStatus::Merged);
        primary.merged_into = Some("c0".to_string());
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[primary]])
                .into_connection(),
        );
        let service = service_with(db);

        let err = service
            .merge(
                &admin(),
                MergeInput {
                    primary_id: "c1".to_string(),
                    duplicate_ids: vec!["c2".to_string()],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_merge_rejects_chained_duplicate() {
        let primary = mock_complaint("c1", ComplaintStatus::Reported);
        let mut chained = mock_complaint("c2", ComplaintStatus::Merged);
        chained.merged_into = Some("c9".to_string());

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[primary]])
                .append_query_results([[chained]])
                .into_connection(),
        );
        let service = service_with(db);

        let err = service
            .merge(
                &admin(),
                MergeInput {
                    primary_id: "c1".to_string(),
                    duplicate_ids: vec!["c2".to_string()],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_merge_rejects_duplicate_that_is_a_primary() {
        let primary = mock_complaint("c1", ComplaintStatus::Reported);
        let mut other_primary = mock_complaint("c2", ComplaintStatus::Reported);
        other_primary.merged_issues = serde_json::json!(["c5"]);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[primary]])
                .append_query_results([[other_primary]])
                .into_connection(),
        );
        let service = service_with(db);

        let err = service
            .merge(
                &admin(),
                MergeInput {
                    primary_id: "c1".to_string(),
                    duplicate_ids: vec!["c2".to_string()],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_merge_marks_duplicates_and_unions_primary() {
        let primary = mock_complaint("c1", ComplaintStatus::Reported);
        let dup_a = mock_complaint("c2", ComplaintStatus::Reported);
        let dup_b = mock_complaint("c3", ComplaintStatus::Reported);

        let mut merged_a = mock_complaint("c2", ComplaintStatus::Merged);
        merged_a.merged_into = Some("c1".to_string());
        let mut merged_b = mock_complaint("c3", ComplaintStatus::Merged);
        merged_b.merged_into = Some("c1".to_string());
        let mut merged_primary = mock_complaint("c1", ComplaintStatus::Reported);
        merged_primary.merged_issues = serde_json::json!(["c2", "c3"]);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[primary]])
                .append_query_results([[dup_a, dup_b]])
                .append_query_results([[merged_a]])
                .append_query_results([[merged_b]])
                .append_query_results([[merged_primary.clone()]])
                .into_connection(),
        );
        let service = service_with(db);

        let result = service
            .merge(
                &admin(),
                MergeInput {
                    primary_id: "c1".to_string(),
                    duplicate_ids: vec!["c2".to_string(), "c3".to_string()],
                },
            )
            .await
            .unwrap();

        assert!(result.merged_into.is_none());
        assert_eq!(
            result.merged_issue_ids(),
            ["c2".to_string(), "c3".to_string()].into_iter().collect()
        );
    }

    #[tokio::test]
    async fn test_remerging_existing_duplicate_writes_nothing() {
        let mut primary = mock_complaint("c1", ComplaintStatus::Reported);
        primary.merged_issues = serde_json::json!(["c2"]);
        let mut existing = mock_complaint("c2", ComplaintStatus::Merged);
        existing.merged_into = Some("c1".to_string());

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[primary.clone()]])
                .append_query_results([[existing]])
                .into_connection(),
        );
        let service = service_with(db);

        let result = service
            .merge(
                &admin(),
                MergeInput {
                    primary_id: "c1".to_string(),
                    duplicate_ids: vec!["c2".to_string()],
                },
            )
            .await
            .unwrap();

        // No write happened; the primary is returned as-is.
        assert_eq!(result, primary);
    }

    // ===== Upvotes =====

    #[tokio::test]
    async fn test_toggle_upvote_adds_then_removes() {
        let record = mock_complaint("c1", ComplaintStatus::Reported);
        let mut upvoted = mock_complaint("c1", ComplaintStatus::Reported);
        upvoted.upvotes = serde_json::json!(["stu1"]);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[record.clone()]])
                .append_query_results([[upvoted.clone()]])
                .into_connection(),
        );
        let service = service_with(db);

        let result = service.toggle_upvote(&student(), "c1").await.unwrap();
        assert!(result.upvoter_ids().contains("stu1"));

        // Toggling again removes the vote.
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[upvoted]])
                .append_query_results([[record]])
                .into_connection(),
        );
        let service = service_with(db);

        let result = service.toggle_upvote(&student(), "c1").await.unwrap();
        assert!(result.upvoter_ids().is_empty());
    }

    // ===== Bulk maintenance =====

    #[tokio::test]
    async fn test_delete_requires_admin_level() {
        let service = service_with(empty_db());
        let err = service.delete(&caretaker(), "c1").await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_delete_missing_complaint_is_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );
        let service = service_with(db);

        let err = service.delete(&admin(), "nope").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_bulk_delete_returns_best_effort_count() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 2,
                }])
                .into_connection(),
        );
        let service = service_with(db);

        let removed = service
            .bulk_delete(
                &admin(),
                &["c1".to_string(), "c2".to_string(), "gone".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(removed, 2);
    }

    #[tokio::test]
    async fn test_cleanup_targets_only_terminal_statuses() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 3,
                }])
                .into_connection(),
        );
        let service = service_with(Arc::clone(&db));

        let removed = service.cleanup_resolved(&admin()).await.unwrap();
        assert_eq!(removed, 3);

        drop(service);
        let db = Arc::try_unwrap(db).unwrap();
        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("resolved"));
        assert!(log.contains("closed"));
        assert!(log.contains("merged"));
        assert!(!log.contains("reported"));
    }

    #[tokio::test]
    async fn test_cleanup_forbidden_for_caretakers() {
        let service = service_with(empty_db());
        let err = service.cleanup_resolved(&caretaker()).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    // ===== Views =====

    #[tokio::test]
    async fn test_list_own_is_student_only() {
        let service = service_with(empty_db());
        let err = service.list_own(&admin()).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_list_for_management_buckets_admin_view() {
        let resolved = mock_complaint("c1", ComplaintStatus::Resolved);
        let reported = mock_complaint("c2", ComplaintStatus::Reported);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                // Repository returns newest-first; resolved is newer here.
                .append_query_results([[resolved, reported]])
                // Reporter lookup.
                .append_query_results([Vec::<user::Model>::new()])
                .into_connection(),
        );
        let service = service_with(db);

        let records = service
            .list_for_management(&admin(), ManagementTab::Issues)
            .await
            .unwrap();

        let ids: Vec<&str> = records.iter().map(|(r, _)| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c1"]);
    }

    #[tokio::test]
    async fn test_list_public_annotates_reporters() {
        let mut record = mock_complaint("c1", ComplaintStatus::Reported);
        record.is_public = true;
        let reporter = user::Model {
            id: "stu1".to_string(),
            email: "stu1@example.com".to_string(),
            password_hash: "$argon2$x".to_string(),
            role: user::UserRole::Student,
            hostel: Some("North".to_string()),
            block: Some("A".to_string()),
            room_number: Some("101".to_string()),
            is_approved: true,
            is_admin: false,
            management_role: None,
            specialization: None,
            refresh_token: None,
            created_at: Utc::now(),
            updated_at: None,
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[record]])
                .append_query_results([[reporter]])
                .into_connection(),
        );
        let service = service_with(db);

        let records = service.list_public(&student()).await.unwrap();
        assert_eq!(records.len(), 1);
        let (_, reporter) = &records[0];
        assert_eq!(
            reporter.as_ref().map(|u| u.email.as_str()),
            Some("stu1@example.com")
        );
    }
}
