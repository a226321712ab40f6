//! Local session cache
//!
//! Keeps the session id (and the preferred level) between runs so follow-up
//! chat questions reach the same backend session.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Level;

const SESSION_FILE: &str = "session_id";
const LEVEL_FILE: &str = "level";

/// File-backed store for the session id and level preference
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<data_dir>/tutor`
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("tutor"))
    }

    pub fn open_default() -> Result<Self> {
        Self::default_dir()
            .map(Self::new)
            .ok_or_else(|| anyhow!("Could not determine a data directory for the session cache"))
    }

    /// Stored session id; unreadable or empty files count as absent
    pub async fn load(&self) -> Option<String> {
        let path = self.dir.join(SESSION_FILE);
        match fs::read_to_string(&path).await {
            Ok(content) => {
                let id = content.trim();
                (!id.is_empty()).then(|| id.to_string())
            }
            Err(e) => {
                debug!("No stored session at {:?}: {}", path, e);
                None
            }
        }
    }

    /// Stored session id, or a freshly generated and stored one
    pub async fn load_or_create(&self) -> Result<String> {
        if let Some(id) = self.load().await {
            return Ok(id);
        }
        self.reset().await
    }

    /// Replace the stored session id with a new one
    pub async fn reset(&self) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.store(&id).await?;
        info!("Started new session {}", id);
        Ok(id)
    }

    /// Record a session id, e.g. one issued by the backend
    pub async fn store(&self, id: &str) -> Result<()> {
        self.write(SESSION_FILE, id).await
    }

    /// Stored level preference, ignored unless it is a valid level
    pub async fn load_level(&self) -> Option<Level> {
        let content = fs::read_to_string(self.dir.join(LEVEL_FILE)).await.ok()?;
        match content.parse::<Level>() {
            Ok(level) => Some(level),
            Err(e) => {
                warn!("Ignoring stored level: {}", e);
                None
            }
        }
    }

    pub async fn store_level(&self, level: Level) -> Result<()> {
        self.write(LEVEL_FILE, &level.get().to_string()).await
    }

    async fn write(&self, name: &str, contents: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.dir.join(name);
        fs::write(&path, contents)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}
