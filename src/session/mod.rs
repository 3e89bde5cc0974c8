mod filesystem;
mod manager;
mod record;
mod storage;

pub use filesystem::FilesystemSessionStore;
pub use manager::{session_base_dir, SessionManager};
pub use record::{sanitize_name, SessionRecord, DEFAULT_SESSION_NAME};
pub use storage::SessionStore;
