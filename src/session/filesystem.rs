use super::record::{sanitize_name, SessionRecord};
use super::storage::SessionStore;
use crate::error::{AgentError, Result};
use chrono::Utc;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One pretty-printed JSON file per session, named `<slug>.json`.
pub struct FilesystemSessionStore {
    dir: PathBuf,
}

impl FilesystemSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            AgentError::Session(format!(
                "failed to create session dir {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_name(name)))
    }
}

impl SessionStore for FilesystemSessionStore {
    fn load(&self, name: &str) -> Result<SessionRecord> {
        let path = self.path_for(name);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AgentError::SessionNotFound(sanitize_name(name)));
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content).map_err(|e| {
            AgentError::Session(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    fn save(&self, record: &mut SessionRecord) -> Result<()> {
        if record.name.trim().is_empty() {
            return Err(AgentError::Session("session name is required".to_string()));
        }

        let now = Utc::now();
        if record.created_at.is_none() {
            record.created_at = Some(now);
        }
        record.updated_at = Some(now);

        let path = self.path_for(&record.name);
        let content = serde_json::to_string_pretty(record)?;
        write_private(&path, content.as_bytes())?;
        debug!(session = %record.name, path = %path.display(), "session saved");
        Ok(())
    }

    fn list(&self) -> Result<Vec<SessionRecord>> {
        let mut sessions: Vec<SessionRecord> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| {
                let parsed = fs::read_to_string(&path)
                    .map_err(AgentError::from)
                    .and_then(|content| Ok(serde_json::from_str::<SessionRecord>(&content)?));
                match parsed {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping unreadable session file");
                        None
                    }
                }
            })
            .collect();

        // Most recent first
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    fn delete(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.path_for(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(AgentError::SessionNotFound(sanitize_name(name)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Write a file readable only by the owner.
pub(crate) fn write_private(path: &Path, content: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        file.write_all(content)?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        fs::write(path, content)?;
        Ok(())
    }
}
