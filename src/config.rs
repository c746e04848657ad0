use crate::constants::*;
use crate::error::{HarvestError, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Optional on-disk settings. Secrets never live here; they come from the environment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub locale: Option<String>,
    pub api_base: Option<String>,
    pub refresh_pages: Option<u32>,
    pub include_festival: Option<bool>,
    pub max_rate_limit_retries: Option<u32>,
    pub output: OutputFileConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputFileConfig {
    pub dir: Option<PathBuf>,
    pub index_file: Option<String>,
    pub rollup_file: Option<String>,
    pub detail_dir: Option<String>,
    pub views_file: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            HarvestError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: FileConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Locations of the four persisted artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub dir: PathBuf,
    pub index: PathBuf,
    pub rollup: PathBuf,
    pub detail_dir: PathBuf,
    pub views: PathBuf,
}

impl OutputPaths {
    /// Default file names rooted at `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            index: dir.join(INDEX_FILE),
            rollup: dir.join(ROLLUP_FILE),
            detail_dir: dir.join(DETAIL_DIR),
            views: dir.join(VIEWS_FILE),
            dir,
        }
    }

    /// Same file names under a different directory.
    pub fn rebased(&self, dir: PathBuf) -> Self {
        let rebase = |p: &Path| match p.file_name() {
            Some(name) => dir.join(name),
            None => dir.clone(),
        };
        Self {
            index: rebase(&self.index),
            rollup: rebase(&self.rollup),
            detail_dir: rebase(&self.detail_dir),
            views: rebase(&self.views),
            dir,
        }
    }

    fn from_file_config(dir: PathBuf, output: &OutputFileConfig) -> Self {
        let name = |custom: &Option<String>, default: &str| {
            dir.join(custom.as_deref().unwrap_or(default))
        };
        Self {
            index: name(&output.index_file, INDEX_FILE),
            rollup: name(&output.rollup_file, ROLLUP_FILE),
            detail_dir: name(&output.detail_dir, DETAIL_DIR),
            views: name(&output.views_file, VIEWS_FILE),
            dir,
        }
    }
}

/// Artifact locations from `SETLISTFM_OUT_DIR` (via `lookup`), then the file, then the default.
pub fn output_paths<F>(file: &FileConfig, lookup: F) -> OutputPaths
where
    F: Fn(&str) -> Option<String>,
{
    let dir = lookup(ENV_OUT_DIR)
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .or_else(|| file.output.dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR));
    OutputPaths::from_file_config(dir, &file.output)
}

/// Everything one harvest run needs, resolved once at startup.
#[derive(Clone)]
pub struct HarvestConfig {
    pub api_key: String,
    pub username: String,
    pub locale: String,
    pub api_base: String,
    pub full_rescan: bool,
    pub refresh_pages: u32,
    pub include_festival: bool,
    /// `None` keeps retrying rate-limited requests forever.
    pub max_rate_limit_retries: Option<u32>,
    pub output: OutputPaths,
}

impl fmt::Debug for HarvestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarvestConfig")
            .field("api_key", &"<redacted>")
            .field("username", &self.username)
            .field("locale", &self.locale)
            .field("api_base", &self.api_base)
            .field("full_rescan", &self.full_rescan)
            .field("refresh_pages", &self.refresh_pages)
            .field("include_festival", &self.include_festival)
            .field("max_rate_limit_retries", &self.max_rate_limit_retries)
            .field("output", &self.output)
            .finish()
    }
}

fn truthy(value: &str) -> bool {
    let v = value.trim();
    v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes")
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| HarvestError::Config(format!("{} must be a non-negative integer, got '{}'", name, value)))
}

impl HarvestConfig {
    /// Resolve settings from the process environment layered over `file`.
    pub fn from_env(file: FileConfig) -> Result<Self> {
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Environment values (via `lookup`) win over file values, which win over defaults.
    pub fn resolve<F>(file: FileConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get(ENV_API_KEY)
            .ok_or_else(|| HarvestError::Config(format!("{} not set", ENV_API_KEY)))?;
        let username = get(ENV_USERNAME)
            .ok_or_else(|| HarvestError::Config(format!("{} not set", ENV_USERNAME)))?;
        let output = output_paths(&file, &lookup);

        let locale = get(ENV_LOCALE)
            .or(file.locale)
            .unwrap_or_else(|| DEFAULT_LOCALE.to_string());
        let api_base = get(ENV_API_BASE)
            .or(file.api_base)
            .unwrap_or_else(|| SETLISTFM_API_BASE.to_string());

        let refresh_pages = match get(ENV_REFRESH_PAGES) {
            Some(v) => parse_number(ENV_REFRESH_PAGES, &v)?,
            None => file.refresh_pages.unwrap_or(DEFAULT_REFRESH_PAGES),
        };
        let max_rate_limit_retries = match get(ENV_MAX_RETRIES) {
            Some(v) => Some(parse_number(ENV_MAX_RETRIES, &v)?),
            None => file.max_rate_limit_retries,
        };
        let include_festival = get(ENV_INCLUDE_FESTIVAL)
            .map(|v| truthy(&v))
            .or(file.include_festival)
            .unwrap_or(true);
        let full_rescan = get(ENV_FULL_RESCAN).map(|v| truthy(&v)).unwrap_or(false);

        Ok(Self {
            api_key,
            username,
            locale,
            api_base,
            full_rescan,
            refresh_pages,
            include_festival,
            max_rate_limit_retries,
            output,
        })
    }

    /// Repoint every artifact at `dir`, keeping configured file names.
    pub fn with_out_dir(mut self, dir: PathBuf) -> Self {
        self.output = self.output.rebased(dir);
        self
    }
}
