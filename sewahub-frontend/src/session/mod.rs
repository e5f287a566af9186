//! Client-side session state: who is signed in, kept consistent between
//! memory, the credential store, and the identity API.

pub mod guard;
pub mod identity;
pub mod state;
pub mod store;
pub mod synchronizer;

pub use guard::{decide, Access, Area};
pub use identity::IdentitySource;
pub use state::{Session, SessionEvent, SessionStatus, SessionView};
pub use store::{CookieSessionStore, CredentialStore, MemoryCredentialStore};
pub use synchronizer::{RefreshOutcome, SessionSynchronizer, SIGNED_OUT_PATH};
