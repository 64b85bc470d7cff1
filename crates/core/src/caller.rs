//! Caller context.
//!
//! Every authenticated request is reduced to one of these variants before
//! any domain logic runs. Authorization is an exhaustive `match` over the
//! union, so a new role cannot be added without revisiting every decision
//! point.

use hostelhub_db::entities::{
    complaint::ComplaintCategory,
    user::{self, ManagementRole, UserRole},
};

/// A verified caller, reduced to the facts authorization cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerContext {
    /// A resident student.
    Student {
        /// User id.
        id: String,
        /// Hostel name from the student's profile.
        hostel: String,
        /// Block from the student's profile.
        block: String,
        /// Room number from the student's profile.
        room_number: String,
    },
    /// A management account with full administrative rights.
    Admin {
        /// User id.
        id: String,
    },
    /// A management account with administrative rights short of staff
    /// management.
    SubAdmin {
        /// User id.
        id: String,
    },
    /// Maintenance staff scoped to a specialty.
    Caretaker {
        /// User id.
        id: String,
        /// The complaint category this caretaker handles, if assigned.
        specialization: Option<ComplaintCategory>,
    },
}

impl CallerContext {
    /// Derive a context from a verified user row.
    ///
    /// Returns `None` for accounts that hold no role yet: unapproved
    /// management accounts and approved ones without a management role.
    /// Students missing profile location fields are also rejected, since
    /// complaint creation depends on them.
    #[must_use]
    pub fn from_user(user: &user::Model) -> Option<Self> {
        match user.role {
            UserRole::Student => Some(Self::Student {
                id: user.id.clone(),
                hostel: user.hostel.clone()?,
                block: user.block.clone()?,
                room_number: user.room_number.clone()?,
            }),
            UserRole::Management => {
                if !user.is_approved {
                    return None;
                }
                match user.management_role {
                    Some(ManagementRole::Admin) => Some(Self::Admin {
                        id: user.id.clone(),
                    }),
                    Some(ManagementRole::Subadmin) => Some(Self::SubAdmin {
                        id: user.id.clone(),
                    }),
                    Some(ManagementRole::Caretaker) => Some(Self::Caretaker {
                        id: user.id.clone(),
                        specialization: user.specialization,
                    }),
                    // Legacy rows may carry the admin flag without a
                    // management role.
                    None if user.is_admin => Some(Self::Admin {
                        id: user.id.clone(),
                    }),
                    None => None,
                }
            }
        }
    }

    /// The caller's user id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Student { id, .. }
            | Self::Admin { id }
            | Self::SubAdmin { id }
            | Self::Caretaker { id, .. } => id,
        }
    }

    /// Whether this caller holds a management role.
    #[must_use]
    pub const fn is_management(&self) -> bool {
        match self {
            Self::Student { .. } => false,
            Self::Admin { .. } | Self::SubAdmin { .. } | Self::Caretaker { .. } => true,
        }
    }

    /// Whether this caller may perform destructive maintenance (deletion,
    /// cleanup) and staff administration.
    #[must_use]
    pub const fn is_admin_level(&self) -> bool {
        match self {
            Self::Admin { .. } | Self::SubAdmin { .. } => true,
            Self::Student { .. } | Self::Caretaker { .. } => false,
        }
    }
}
