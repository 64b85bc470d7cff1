//! Visibility filter.
//!
//! Pure translation of (caller, requested view) into a [`ComplaintScope`];
//! no I/O happens here. The repository turns the scope into a query
//! predicate, and the service applies the management-view ordering.

use hostelhub_common::{AppError, AppResult};
use hostelhub_db::entities::complaint;
use hostelhub_db::repositories::ComplaintScope;

use crate::caller::CallerContext;

/// The two management dashboard tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagementTab {
    /// Open work: everything for admins, the working set for caretakers.
    Issues,
    /// Resolution history.
    Resolved,
}

impl ManagementTab {
    /// Parse the `tab` query parameter.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "issues" => Ok(Self::Issues),
            "resolved" => Ok(Self::Resolved),
            other => Err(AppError::BadRequest(format!("Unknown tab: {other}"))),
        }
    }
}

/// Scope for the "my issues" view. Students only.
pub fn own_scope(caller: &CallerContext) -> AppResult<ComplaintScope> {
    match caller {
        CallerContext::Student { id, .. } => Ok(ComplaintScope::Own {
            student_id: id.clone(),
        }),
        CallerContext::Admin { .. }
        | CallerContext::SubAdmin { .. }
        | CallerContext::Caretaker { .. } => Err(AppError::Forbidden(
            "Only students have a personal complaint list".to_string(),
        )),
    }
}

/// Scope for the community feed. Students only.
pub fn public_feed_scope(caller: &CallerContext) -> AppResult<ComplaintScope> {
    match caller {
        CallerContext::Student { .. } => Ok(ComplaintScope::PublicFeed),
        CallerContext::Admin { .. }
        | CallerContext::SubAdmin { .. }
        | CallerContext::Caretaker { .. } => Err(AppError::Forbidden(
            "The community feed is a student view".to_string(),
        )),
    }
}

/// Scope for the management dashboard.
pub fn management_scope(caller: &CallerContext, tab: ManagementTab) -> AppResult<ComplaintScope> {
    match caller {
        CallerContext::Student { .. } => Err(AppError::Forbidden(
            "Management role required".to_string(),
        )),
        // Admins see everything for oversight; the tab only affects
        // caretakers, whose views are personal.
        CallerContext::Admin { .. } | CallerContext::SubAdmin { .. } => Ok(ComplaintScope::All),
        CallerContext::Caretaker { id, specialization } => match tab {
            ManagementTab::Issues => Ok(ComplaintScope::CaretakerOpen {
                caretaker_id: id.clone(),
                specialization: *specialization,
            }),
            ManagementTab::Resolved => Ok(ComplaintScope::CaretakerResolved {
                caretaker_id: id.clone(),
            }),
        },
    }
}

/// Bucket the management "all issues" view by status precedence so
/// unresolved work surfaces first. The sort is stable, so newest-first
/// ordering is preserved within a bucket.
pub fn bucket_by_status(records: &mut [complaint::Model]) {
    records.sort_by_key(|record| record.status.precedence());
}
