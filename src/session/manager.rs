use super::record::{archive_file_name, sanitize_name, summary_file_name, SessionRecord};
use super::storage::SessionStore;
use super::filesystem::write_private;
use crate::compaction::{self, CompactionPolicy, Summarize};
use crate::conversation::Conversation;
use crate::error::{AgentError, Result};
use crate::tools::ActiveArchive;
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Tracks the active session and its archive and summary files.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    base_dir: PathBuf,
    active: SessionRecord,
    archive: ActiveArchive,
}

impl SessionManager {
    /// Open `name` as the active session, creating and saving it when it does
    /// not exist yet.
    pub fn open(
        store: Arc<dyn SessionStore>,
        base_dir: impl Into<PathBuf>,
        name: &str,
        model: &str,
        system_prompt: &str,
    ) -> Result<Self> {
        let base_dir = base_dir.into();
        let active = load_or_create(store.as_ref(), name, model, system_prompt)?;
        let archive = ActiveArchive::new(Some(base_dir.join(archive_file(&active))));

        Ok(Self {
            store,
            base_dir,
            active,
            archive,
        })
    }

    /// Shared handle to the active archive path, kept current across switches.
    pub fn archive_handle(&self) -> ActiveArchive {
        self.archive.clone()
    }

    pub fn current_name(&self) -> &str {
        &self.active.name
    }

    pub fn active(&self) -> &SessionRecord {
        &self.active
    }

    /// Model recorded for the active session, if any.
    pub fn active_model(&self) -> Option<&str> {
        Some(self.active.model.as_str()).filter(|m| !m.trim().is_empty())
    }

    /// Conversation stored in the active session.
    pub fn restore(&self, fallback_prompt: &str) -> Conversation {
        self.active.to_conversation(fallback_prompt)
    }

    /// Make `name` the active session. Returns `false` when it already is.
    pub fn switch(&mut self, name: &str, model: &str, system_prompt: &str) -> Result<bool> {
        let slug = sanitize_name(name);
        if slug == self.active.name {
            return Ok(false);
        }

        self.active = load_or_create(self.store.as_ref(), &slug, model, system_prompt)?;
        self.archive.set(Some(self.archive_path()));
        info!(session = %slug, "switched session");
        Ok(true)
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let slug = sanitize_name(name);
        if slug == self.active.name {
            return Err(AgentError::ActiveSessionDelete(slug));
        }
        self.store.delete(&slug)?;
        info!(session = %slug, "deleted session");
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<SessionRecord>> {
        self.store.list()
    }

    /// Snapshot the conversation into the active session and persist it.
    pub fn save_from(&mut self, conversation: &Conversation, model: &str) -> Result<()> {
        self.active.update_from(conversation, model);
        self.store.save(&mut self.active)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn archive_path(&self) -> PathBuf {
        self.base_dir.join(archive_file(&self.active))
    }

    pub fn summary_path(&self) -> PathBuf {
        let file = self
            .active
            .summary_file
            .clone()
            .unwrap_or_else(|| summary_file_name(&self.active.name));
        self.base_dir.join(file)
    }

    /// Append a transcript under a timestamped header. Empty input is ignored.
    pub fn append_archive(&self, transcript: &str) -> Result<()> {
        if transcript.is_empty() {
            return Ok(());
        }

        let path = self.archive_path();
        ensure_parent(&path)?;

        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&path)?;

        let header = format!("\n---\nCompaction at {}\n---\n", Local::now().to_rfc3339());
        file.write_all(format!("{}{}\n", header, transcript).as_bytes())?;
        Ok(())
    }

    /// Replace the summary file with the latest summary.
    pub fn write_summary(&self, summary: &str) -> Result<()> {
        let path = self.summary_path();
        ensure_parent(&path)?;
        write_private(&path, summary.as_bytes())
    }

    /// Compact the conversation and persist the result.
    ///
    /// Nothing is touched unless summarization succeeds. The summary is
    /// written before the archive is appended, so a failed write never leaves
    /// a duplicate archive block behind. Callers must not run two compactions
    /// of the same session concurrently.
    pub async fn compact(
        &mut self,
        conversation: &mut Conversation,
        summarizer: &dyn Summarize,
        policy: &CompactionPolicy,
        model: &str,
    ) -> Result<()> {
        let hint = self.archive_path().display().to_string();
        let outcome = compaction::compact(conversation, summarizer, policy, &hint).await?;

        self.write_summary(&outcome.summary)?;
        self.append_archive(&outcome.transcript)?;
        conversation.replace(outcome.messages)?;
        self.save_from(conversation, model)?;

        info!(session = %self.active.name, messages = conversation.len(), "context compacted");
        Ok(())
    }
}

fn archive_file(record: &SessionRecord) -> String {
    record
        .archive_file
        .clone()
        .unwrap_or_else(|| archive_file_name(&record.name))
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn load_or_create(
    store: &dyn SessionStore,
    name: &str,
    model: &str,
    system_prompt: &str,
) -> Result<SessionRecord> {
    let slug = sanitize_name(name);
    match store.load(&slug) {
        Ok(record) => Ok(record),
        Err(AgentError::SessionNotFound(_)) => {
            let mut record = SessionRecord::new(&slug, model, system_prompt);
            store.save(&mut record)?;
            info!(session = %slug, "created session");
            Ok(record)
        }
        Err(e) => Err(e),
    }
}

/// Session directory for a project:
/// `~/.mcpilot/sessions/<slug of the project directory name>`.
pub fn session_base_dir(project_path: Option<&str>) -> Result<PathBuf> {
    let project = match project_path.map(str::trim) {
        Some(path) if !path.is_empty() && path != "." => PathBuf::from(path),
        _ => std::env::current_dir()?,
    };
    let absolute = if project.is_absolute() {
        project
    } else {
        std::env::current_dir()?.join(project)
    };

    let project_name = absolute
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let home = dirs::home_dir()
        .ok_or_else(|| AgentError::Session("could not determine home directory".to_string()))?;

    Ok(home
        .join(".mcpilot")
        .join("sessions")
        .join(sanitize_name(&project_name)))
}
