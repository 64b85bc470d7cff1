//! Complaint repository.
//!
//! The repository owns the translation of role-scoped views into query
//! predicates and the single-transaction group write used by merge and
//! cascade updates. Business rules live in the service layer.

use std::sync::Arc;

use crate::entities::{
    complaint::{self, ComplaintCategory, ComplaintStatus},
    Complaint,
};
use hostelhub_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};

/// The slice of complaint records a caller is entitled to see.
///
/// Computed by the visibility filter from a caller context; translated here
/// into a query predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComplaintScope {
    /// Records reported by one student.
    Own {
        /// The reporting student's user id.
        student_id: String,
    },
    /// The community feed: records marked public.
    PublicFeed,
    /// Everything, for admin oversight.
    All,
    /// A caretaker's working set: unclaimed work in their specialty plus
    /// whatever is already assigned to them and not yet resolved.
    CaretakerOpen {
        /// The caretaker's user id.
        caretaker_id: String,
        /// The caretaker's specialty, if one has been assigned.
        specialization: Option<ComplaintCategory>,
    },
    /// A caretaker's personal resolution history.
    CaretakerResolved {
        /// The caretaker's user id.
        caretaker_id: String,
    },
}

impl ComplaintScope {
    fn condition(&self) -> Condition {
        match self {
            Self::Own { student_id } => {
                Condition::all().add(complaint::Column::StudentId.eq(student_id.as_str()))
            }
            Self::PublicFeed => Condition::all().add(complaint::Column::IsPublic.eq(true)),
            Self::All => Condition::all(),
            Self::CaretakerOpen {
                caretaker_id,
                specialization,
            } => {
                // Union, not intersection: a caretaker must not lose sight
                // of in-flight assignments outside their specialty.
                let assigned = Condition::all()
                    .add(complaint::Column::CaretakerId.eq(caretaker_id.as_str()))
                    .add(complaint::Column::Status.ne(ComplaintStatus::Resolved));

                let mut cond = Condition::any().add(assigned);
                if let Some(category) = specialization {
                    cond = cond.add(
                        Condition::all()
                            .add(complaint::Column::Status.eq(ComplaintStatus::Reported))
                            .add(complaint::Column::Category.eq(*category)),
                    );
                }
                cond
            }
            Self::CaretakerResolved { caretaker_id } => Condition::all()
                .add(complaint::Column::CaretakerId.eq(caretaker_id.as_str()))
                .add(complaint::Column::Status.eq(ComplaintStatus::Resolved)),
        }
    }
}

/// Complaint repository for database operations.
#[derive(Clone)]
pub struct ComplaintRepository {
    db: Arc<DatabaseConnection>,
}

impl ComplaintRepository {
    /// Create a new complaint repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert a new complaint.
    pub async fn create(&self, model: complaint::ActiveModel) -> AppResult<complaint::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a complaint by ID, failing if absent.
    pub async fn get_by_id(&self, id: &str) -> AppResult<complaint::Model> {
        Complaint::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound(format!("Complaint {id} not found")))
    }

    /// Records visible under a scope, newest first.
    pub async fn find_scoped(&self, scope: &ComplaintScope) -> AppResult<Vec<complaint::Model>> {
        Complaint::find()
            .filter(scope.condition())
            .order_by_desc(complaint::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Records matching a set of IDs. IDs that no longer resolve are simply
    /// absent from the result.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<complaint::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        Complaint::find()
            .filter(complaint::Column::Id.is_in(ids.iter().map(String::as_str)))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Persist changes to an existing complaint.
    pub async fn save(&self, model: complaint::ActiveModel) -> AppResult<complaint::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Apply one lifecycle event to a record set atomically.
    ///
    /// All secondary rows and the primary row are written inside a single
    /// transaction so a crash cannot leave duplicates marked merged while
    /// the primary forgot them (or a cascade half-applied).
    pub async fn save_group(
        &self,
        primary: complaint::ActiveModel,
        secondaries: Vec<complaint::ActiveModel>,
    ) -> AppResult<complaint::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        for model in secondaries {
            model
                .update(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        let saved = primary
            .update(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(saved)
    }

    /// Hard-delete one complaint. Fails if the id does not resolve.
    pub async fn delete_by_id(&self, id: &str) -> AppResult<()> {
        let result = Complaint::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Complaint {id} not found")));
        }

        Ok(())
    }

    /// Hard-delete every id present; missing ids are skipped. Returns the
    /// number of records removed.
    pub async fn delete_many(&self, ids: &[String]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = Complaint::delete_many()
            .filter(complaint::Column::Id.is_in(ids.iter().map(String::as_str)))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Hard-delete every terminal-state record (resolved, closed, merged).
    /// Returns the number of records removed.
    pub async fn delete_terminal(&self) -> AppResult<u64> {
        let result = Complaint::delete_many()
            .filter(complaint::Column::Status.is_in([
                ComplaintStatus::Resolved,
                ComplaintStatus::Closed,
                ComplaintStatus::Merged,
            ]))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }
}
