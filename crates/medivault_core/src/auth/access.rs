//! Role permissions and the authenticated caller.

use crate::model::user::{Role, UserId};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Operation class gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Permission {
    BookAppointment,
    RequestCancellation,
    ManageOwnAppointments,
    ManageAllAppointments,
    WritePrescription,
    DispensePrescription,
    OrderLabTest,
    ProcessLabTest,
    ViewReports,
    ManageUsers,
}

impl Permission {
    pub const ALL: [Permission; 10] = [
        Permission::BookAppointment,
        Permission::RequestCancellation,
        Permission::ManageOwnAppointments,
        Permission::ManageAllAppointments,
        Permission::WritePrescription,
        Permission::DispensePrescription,
        Permission::OrderLabTest,
        Permission::ProcessLabTest,
        Permission::ViewReports,
        Permission::ManageUsers,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BookAppointment => "book_appointment",
            Self::RequestCancellation => "request_cancellation",
            Self::ManageOwnAppointments => "manage_own_appointments",
            Self::ManageAllAppointments => "manage_all_appointments",
            Self::WritePrescription => "write_prescription",
            Self::DispensePrescription => "dispense_prescription",
            Self::OrderLabTest => "order_lab_test",
            Self::ProcessLabTest => "process_lab_test",
            Self::ViewReports => "view_reports",
            Self::ManageUsers => "manage_users",
        }
    }
}

/// Returns whether `role` grants `permission`. Admin holds everything.
pub fn role_allows(role: Role, permission: Permission) -> bool {
    use Permission::*;
    match role {
        Role::Admin => true,
        Role::Patient => matches!(permission, BookAppointment | RequestCancellation),
        Role::Doctor => matches!(
            permission,
            ManageOwnAppointments | WritePrescription | OrderLabTest
        ),
        Role::Pharmacist => matches!(permission, DispensePrescription),
        Role::LabTechnician => matches!(permission, ProcessLabTest),
    }
}

/// Permissions granted to `role`, in declaration order.
pub fn permissions_for(role: Role) -> Vec<Permission> {
    Permission::ALL
        .into_iter()
        .filter(|permission| role_allows(role, *permission))
        .collect()
}

/// Denied permission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDenied {
    pub role: Role,
    pub permission: Permission,
}

impl Display for AccessDenied {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "role `{}` lacks permission `{}`",
            self.role.as_str(),
            self.permission.as_str()
        )
    }
}

impl Error for AccessDenied {}

/// Authenticated caller resolved from a session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn can(&self, permission: Permission) -> bool {
        role_allows(self.role, permission)
    }

    /// Fails with [`AccessDenied`] unless the role grants `permission`.
    pub fn require(&self, permission: Permission) -> Result<(), AccessDenied> {
        if self.can(permission) {
            Ok(())
        } else {
            Err(AccessDenied {
                role: self.role,
                permission,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{permissions_for, role_allows, Permission, Principal};
    use crate::model::user::Role;
    use uuid::Uuid;

    #[test]
    fn admin_holds_every_permission() {
        assert_eq!(permissions_for(Role::Admin).len(), Permission::ALL.len());
    }

    #[test]
    fn clinical_roles_are_disjoint() {
        assert!(role_allows(Role::Doctor, Permission::WritePrescription));
        assert!(!role_allows(Role::Pharmacist, Permission::WritePrescription));
        assert!(role_allows(Role::Pharmacist, Permission::DispensePrescription));
        assert!(!role_allows(Role::Doctor, Permission::DispensePrescription));
        assert!(role_allows(Role::LabTechnician, Permission::ProcessLabTest));
        assert!(!role_allows(Role::Patient, Permission::OrderLabTest));
        assert_eq!(
            permissions_for(Role::Patient),
            vec![Permission::BookAppointment, Permission::RequestCancellation]
        );
    }

    #[test]
    fn require_reports_role_and_permission() {
        let principal = Principal::new(Uuid::new_v4(), Role::Pharmacist);
        let err = principal
            .require(Permission::ViewReports)
            .expect_err("pharmacist cannot view reports");
        assert_eq!(err.role, Role::Pharmacist);
        assert_eq!(err.permission, Permission::ViewReports);
        assert!(err.to_string().contains("view_reports"));
        assert!(!principal.is_admin());
    }
}
