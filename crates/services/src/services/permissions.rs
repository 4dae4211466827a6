//! Role capabilities and the single authorization path.
//!
//! The role set is closed and every check funnels through [`authorize`] /
//! [`require`] plus the per-project composition in [`project_access`]. Route
//! handlers never compare role values directly.

use db::models::{project_member::ProjectMember, user::Role};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use ts_rs::TS;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
    ViewProjects,
    EditTasks,
    ManageProjects,
    ManageDocuments,
    ManageUsers,
    ManageMembers,
    RequestSuggestions,
    ViewLeaderboard,
}

#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("role '{role}' lacks the '{capability}' capability")]
    Denied { role: Role, capability: Capability },
    #[error("no access to this project")]
    NoProjectAccess,
}

const ALL: &[Capability] = &[
    Capability::ViewProjects,
    Capability::EditTasks,
    Capability::ManageProjects,
    Capability::ManageDocuments,
    Capability::ManageUsers,
    Capability::ManageMembers,
    Capability::RequestSuggestions,
    Capability::ViewLeaderboard,
];

const MANAGER: &[Capability] = &[
    Capability::ViewProjects,
    Capability::EditTasks,
    Capability::ManageDocuments,
    Capability::RequestSuggestions,
    Capability::ViewLeaderboard,
];

const CLIENT: &[Capability] = &[Capability::ViewProjects, Capability::ViewLeaderboard];

/// The static role -> capability table.
pub fn capabilities(role: Role) -> &'static [Capability] {
    match role {
        Role::Owner | Role::Admin => ALL,
        Role::Manager => MANAGER,
        Role::Client => CLIENT,
    }
}

pub fn authorize(role: Role, capability: Capability) -> bool {
    capabilities(role).contains(&capability)
}

pub fn require(role: Role, capability: Capability) -> Result<(), PermissionError> {
    if authorize(role, capability) {
        Ok(())
    } else {
        Err(PermissionError::Denied { role, capability })
    }
}

/// What a user may do with one specific project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum ProjectAccess {
    None,
    View,
    Edit,
}

/// Compose the role table with project ownership and membership.
///
/// Owners and admins edit every project. Managers are scoped to projects
/// they created or belong to, editing only where the membership grants it.
/// Clients see the projects they belong to and edit nothing.
pub fn project_access(
    role: Role,
    is_project_owner: bool,
    membership: Option<&ProjectMember>,
) -> ProjectAccess {
    match role {
        Role::Owner | Role::Admin => ProjectAccess::Edit,
        Role::Manager => {
            if is_project_owner {
                ProjectAccess::Edit
            } else {
                match membership {
                    Some(m) if m.can_edit => ProjectAccess::Edit,
                    Some(_) => ProjectAccess::View,
                    None => ProjectAccess::None,
                }
            }
        }
        Role::Client => {
            if is_project_owner || membership.is_some() {
                ProjectAccess::View
            } else {
                ProjectAccess::None
            }
        }
    }
}

pub fn require_project_view(access: ProjectAccess) -> Result<(), PermissionError> {
    if access >= ProjectAccess::View {
        Ok(())
    } else {
        Err(PermissionError::NoProjectAccess)
    }
}

pub fn require_project_edit(access: ProjectAccess) -> Result<(), PermissionError> {
    if access >= ProjectAccess::Edit {
        Ok(())
    } else {
        Err(PermissionError::NoProjectAccess)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn membership(can_edit: bool) -> ProjectMember {
        ProjectMember {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            can_edit,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn owner_and_admin_hold_every_capability() {
        for capability in ALL {
            assert!(authorize(Role::Owner, *capability));
            assert!(authorize(Role::Admin, *capability));
        }
    }

    #[test]
    fn manager_cannot_administer_users_or_projects() {
        assert!(authorize(Role::Manager, Capability::EditTasks));
        assert!(authorize(Role::Manager, Capability::RequestSuggestions));
        assert!(!authorize(Role::Manager, Capability::ManageUsers));
        assert!(!authorize(Role::Manager, Capability::ManageProjects));
        assert!(!authorize(Role::Manager, Capability::ManageMembers));
    }

    #[test]
    fn client_is_read_only() {
        assert!(authorize(Role::Client, Capability::ViewProjects));
        assert!(authorize(Role::Client, Capability::ViewLeaderboard));
        assert!(!authorize(Role::Client, Capability::EditTasks));
        assert!(!authorize(Role::Client, Capability::ManageDocuments));
        assert!(!authorize(Role::Client, Capability::RequestSuggestions));
    }

    #[test]
    fn require_reports_the_missing_capability() {
        let err = require(Role::Client, Capability::EditTasks).unwrap_err();
        assert!(err.to_string().contains("client"));
        assert!(err.to_string().contains("edit_tasks"));
    }

    #[test]
    fn admins_edit_projects_they_never_joined() {
        assert_eq!(
            project_access(Role::Admin, false, None),
            ProjectAccess::Edit
        );
    }

    #[test]
    fn manager_access_follows_membership_grant() {
        assert_eq!(
            project_access(Role::Manager, false, None),
            ProjectAccess::None
        );
        assert_eq!(
            project_access(Role::Manager, false, Some(&membership(false))),
            ProjectAccess::View
        );
        assert_eq!(
            project_access(Role::Manager, false, Some(&membership(true))),
            ProjectAccess::Edit
        );
        assert_eq!(
            project_access(Role::Manager, true, None),
            ProjectAccess::Edit
        );
    }

    #[test]
    fn client_membership_grants_view_at_most() {
        assert_eq!(
            project_access(Role::Client, false, Some(&membership(true))),
            ProjectAccess::View
        );
        assert_eq!(
            project_access(Role::Client, false, None),
            ProjectAccess::None
        );
        assert!(require_project_edit(project_access(
            Role::Client,
            false,
            Some(&membership(true))
        ))
        .is_err());
    }

    #[test]
    fn access_levels_order_none_view_edit() {
        assert!(ProjectAccess::None < ProjectAccess::View);
        assert!(ProjectAccess::View < ProjectAccess::Edit);
        assert!(require_project_view(ProjectAccess::Edit).is_ok());
    }
}
