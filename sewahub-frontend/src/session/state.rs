use crate::models::User;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Not hydrated yet.
    Unknown,
    Authenticated,
    Anonymous,
}

/// The client's current belief about who is signed in.
///
/// Fields are private so that `Authenticated` can only ever be paired with
/// both a token and a user.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    status: SessionStatus,
    token: Option<String>,
    user: Option<User>,
    generation: u64,
}

impl Session {
    pub(crate) fn unknown() -> Self {
        Self {
            status: SessionStatus::Unknown,
            token: None,
            user: None,
            generation: 0,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    /// Bumped by every operation that changes who is signed in. In-flight
    /// results stamped with an older generation are discarded.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn authenticate(&mut self, token: String, user: User) {
        self.status = SessionStatus::Authenticated;
        self.token = Some(token);
        self.user = Some(user);
        self.generation += 1;
    }

    pub(crate) fn clear(&mut self) {
        self.status = SessionStatus::Anonymous;
        self.token = None;
        self.user = None;
        self.generation += 1;
    }

    /// Replaces the user of an authenticated session; the token is kept.
    pub(crate) fn replace_user(&mut self, user: User) -> bool {
        if self.status != SessionStatus::Authenticated {
            return false;
        }
        self.user = Some(user);
        true
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("status", &self.status)
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .field("user", &self.user)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Serializable view handed to API consumers; never includes the token.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            status: session.status,
            user: session.user.clone(),
        }
    }
}

/// Broadcast to subscribers alongside state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { user_id: String },
    /// Explicit logout; consumers should navigate to `redirect_to`.
    LoggedOut { redirect_to: &'static str },
    /// The API rejected the token during a refresh.
    Expired,
    UserUpdated { user_id: String },
}
