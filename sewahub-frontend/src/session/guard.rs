use crate::models::Role;
use crate::session::state::{Session, SessionStatus};
use crate::session::synchronizer::SIGNED_OUT_PATH;

/// Sections of the site with their own access rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    /// Any signed-in user (dashboard, profile).
    Member,
    Provider,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    /// Session not hydrated yet; render a loading state.
    Pending,
    Redirect(&'static str),
}

pub fn decide(session: &Session, area: Area) -> Access {
    let user = match (session.status(), session.user()) {
        (SessionStatus::Unknown, _) => return Access::Pending,
        (SessionStatus::Authenticated, Some(user)) => user,
        _ => return Access::Redirect(SIGNED_OUT_PATH),
    };

    match (area, user.role) {
        (Area::Member, _) | (Area::Provider, Role::Provider) | (Area::Admin, Role::Admin) => {
            Access::Allow
        }
        // Admin pages never reveal themselves to other roles.
        (Area::Admin, _) => Access::Redirect(SIGNED_OUT_PATH),
        (Area::Provider, role) => Access::Redirect(role.landing_path()),
    }
}
