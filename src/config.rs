use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::UploadError;

pub const DEFAULT_CONFIG_FILE: &str = "scan-upload.json";
pub const DEFAULT_S3_URL: &str = "https://s3.us.archive.org";
pub const DEFAULT_METADATA_URL: &str = "https://archive.org";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

const ACCESS_KEY_ENV: &str = "IA_ACCESS_KEY";
const SECRET_KEY_ENV: &str = "IA_SECRET_KEY";

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub workbook: String,
    pub base_dir: String,
    #[serde(default)]
    pub sheet_segment: Option<String>,
    #[serde(default)]
    pub sheet_paths: BTreeMap<String, String>,
    #[serde(default)]
    pub credentials: Option<Credentials>,
    #[serde(default)]
    pub s3_url: Option<String>,
    #[serde(default)]
    pub metadata_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Credentials {
    pub access: String,
    pub secret: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetPaths {
    default: Option<Utf8PathBuf>,
    overrides: BTreeMap<String, Utf8PathBuf>,
}

impl SheetPaths {
    pub fn fixed(segment: impl Into<Utf8PathBuf>) -> Self {
        Self {
            default: Some(segment.into()),
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_override(
        mut self,
        sheet: impl Into<String>,
        segment: impl Into<Utf8PathBuf>,
    ) -> Self {
        self.overrides.insert(sheet.into(), segment.into());
        self
    }

    /// Override for the sheet, else the fixed segment, else the sheet name.
    pub fn segment_for(&self, sheet: &str) -> Utf8PathBuf {
        self.overrides
            .get(sheet)
            .or(self.default.as_ref())
            .cloned()
            .unwrap_or_else(|| Utf8PathBuf::from(sheet))
    }
}

#[derive(Debug, Clone)]
pub struct Endpoints {
    pub s3_url: String,
    pub metadata_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            s3_url: DEFAULT_S3_URL.to_string(),
            metadata_url: DEFAULT_METADATA_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub workbook: Utf8PathBuf,
    pub base_dir: Utf8PathBuf,
    pub sheets: SheetPaths,
    pub credentials: Option<Credentials>,
    pub endpoints: Endpoints,
    pub timeout: Duration,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, UploadError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(UploadError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| UploadError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| UploadError::ConfigParse(err.to_string()))?;

        let mut resolved = Self::resolve_config(config)?;
        resolved.credentials = env_credentials(
            resolved.credentials,
            std::env::var(ACCESS_KEY_ENV).ok(),
            std::env::var(SECRET_KEY_ENV).ok(),
        );
        Ok(resolved)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, UploadError> {
        if config.workbook.trim().is_empty() {
            return Err(UploadError::InvalidConfig("workbook must not be empty".to_string()));
        }
        if config.base_dir.trim().is_empty() {
            return Err(UploadError::InvalidConfig("base_dir must not be empty".to_string()));
        }

        let home = BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
        let base_dir = expand_home(config.base_dir.trim(), home.as_deref())?;

        let mut sheets = match config.sheet_segment {
            Some(segment) => SheetPaths::fixed(segment),
            None => SheetPaths::default(),
        };
        for (sheet, segment) in config.sheet_paths {
            sheets = sheets.with_override(sheet, segment);
        }

        let endpoints = Endpoints {
            s3_url: config
                .s3_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_S3_URL.to_string()),
            metadata_url: config
                .metadata_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_METADATA_URL.to_string()),
        };

        Ok(ResolvedConfig {
            workbook: Utf8PathBuf::from(config.workbook.trim()),
            base_dir,
            sheets,
            credentials: config.credentials,
            endpoints,
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        })
    }
}

pub fn expand_home(path: &str, home: Option<&Path>) -> Result<Utf8PathBuf, UploadError> {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return Ok(Utf8PathBuf::from(path)),
    };
    let home = home.ok_or_else(|| {
        UploadError::InvalidConfig("unable to resolve home directory".to_string())
    })?;
    let home = Utf8PathBuf::from_path_buf(home.to_path_buf())
        .map_err(|_| UploadError::InvalidConfig("non-utf8 home directory".to_string()))?;
    if rest.is_empty() {
        Ok(home)
    } else {
        Ok(home.join(rest))
    }
}

/// Credentials from the environment win when both keys are set.
pub fn env_credentials(
    configured: Option<Credentials>,
    access: Option<String>,
    secret: Option<String>,
) -> Option<Credentials> {
    match (access, secret) {
        (Some(access), Some(secret)) if !access.trim().is_empty() && !secret.trim().is_empty() => {
            Some(Credentials {
                access: access.trim().to_string(),
                secret: secret.trim().to_string(),
            })
        }
        _ => configured,
    }
}
