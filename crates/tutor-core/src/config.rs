//! Configuration
//!
//! Loaded from `<config_dir>/tutor/config.toml`; every field is optional.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Environment variable overriding `base_url`
pub const BACKEND_URL_ENV: &str = "TUTOR_BACKEND_URL";

/// Largest image accepted for analysis (10 MiB)
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Backend endpoint paths
pub mod endpoints {
    pub const ANALYZE: &str = "/api/v1/tutor/analyze";
    pub const ANALYZE_IMAGE: &str = "/api/v1/tutor/analyze-image";
    pub const CHAT: &str = "/api/v1/tutor/chat";
    pub const HEALTH: &str = "/api/v1/health";
}

/// Description of one comprehension level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelDefinition {
    pub level: u8,
    pub label: &'static str,
    pub description: &'static str,
}

pub const LEVEL_DEFINITIONS: [LevelDefinition; 5] = [
    LevelDefinition {
        level: 1,
        label: "기초",
        description: "가장 쉬운 설명과 기본 단어만 사용",
    },
    LevelDefinition {
        level: 2,
        label: "초급",
        description: "간단한 문장 구조와 일상 어휘 사용",
    },
    LevelDefinition {
        level: 3,
        label: "중급",
        description: "표준적인 설명과 일반적인 어휘 사용",
    },
    LevelDefinition {
        level: 4,
        label: "고급",
        description: "상세한 설명과 다양한 어휘 사용",
    },
    LevelDefinition {
        level: 5,
        label: "심화",
        description: "전문적인 설명과 고급 어휘 사용",
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LevelError {
    #[error("level must be between {min} and {max}, got {0}", min = Level::MIN, max = Level::MAX)]
    OutOfRange(u8),
    #[error("invalid level '{0}'")]
    NotANumber(String),
}

/// Comprehension level, 1 (easiest) to 5
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Level(u8);

impl Level {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX)
            .contains(&value)
            .then_some(Self(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn definition(self) -> &'static LevelDefinition {
        &LEVEL_DEFINITIONS[usize::from(self.0 - Self::MIN)]
    }

    pub fn label(self) -> &'static str {
        self.definition().label
    }
}

impl Default for Level {
    fn default() -> Self {
        Self(3)
    }
}

impl TryFrom<u8> for Level {
    type Error = LevelError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(LevelError::OutOfRange(value))
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        level.0
    }
}

impl FromStr for Level {
    type Err = LevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u8 = s
            .trim()
            .parse()
            .map_err(|_| LevelError::NotANumber(s.to_string()))?;
        Self::try_from(value)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.label())
    }
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TutorConfig {
    /// Backend base URL, without a trailing path
    pub base_url: String,
    /// Default comprehension level
    pub level: Level,
    /// Longest silence allowed between reads of a response; the backend's
    /// heartbeats keep long analyses alive. Expiry is a transport failure.
    #[serde(alias = "request_timeout_secs")]
    pub read_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            level: Level::default(),
            read_timeout_secs: 60,
            connect_timeout_secs: 10,
        }
    }
}

impl TutorConfig {
    /// `<config_dir>/tutor/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tutor").join("config.toml"))
    }

    /// Load from the default location, then apply environment overrides
    pub fn load() -> Result<Self> {
        let config = match Self::default_path() {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };
        Ok(config.with_backend_url(std::env::var(BACKEND_URL_ENV).ok()))
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Replace `base_url` when an override is present and non-empty
    pub fn with_backend_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        self
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Full URL for an endpoint path
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}
