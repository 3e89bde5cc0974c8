use super::record::SessionRecord;
use crate::error::Result;

/// Trait for session storage backends
pub trait SessionStore: Send + Sync {
    /// Load a session by name. Missing sessions yield
    /// [`AgentError::SessionNotFound`](crate::error::AgentError::SessionNotFound).
    fn load(&self, name: &str) -> Result<SessionRecord>;

    /// Persist a session. Sets `created_at` on first save and always
    /// refreshes `updated_at`.
    fn save(&self, record: &mut SessionRecord) -> Result<()>;

    /// All stored sessions, most recently updated first
    fn list(&self) -> Result<Vec<SessionRecord>>;

    /// Remove a session. Guarding the active session is the caller's job.
    fn delete(&self, name: &str) -> Result<()>;
}
