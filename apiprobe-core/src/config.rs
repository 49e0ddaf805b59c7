use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::GenerationMode;

const DEFAULT_APIPROBE_TOML: &str = include_str!("default_apiprobe.toml");

/// Where the active configuration was loaded from.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ConfigSource {
    Repo,
    Home,
    #[default]
    Default,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProbeConfig {
    #[serde(default)]
    version: Option<u32>,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub fuzzing: FuzzingConfig,
    #[serde(default)]
    pub stateful: StatefulConfig,
    #[serde(skip)]
    source: ConfigSource,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            version: Some(1),
            generation: GenerationConfig::default(),
            fuzzing: FuzzingConfig::default(),
            stateful: StatefulConfig::default(),
            source: ConfigSource::Default,
        }
    }
}

impl ProbeConfig {
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    fn with_source(mut self, source: ConfigSource) -> Self {
        self.source = source;
        self
    }
}

/// Settings of the coverage phase.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    #[serde(default = "default_modes")]
    pub modes: Vec<GenerationMode>,
    #[serde(default = "default_true")]
    pub duplicate_query_parameters: bool,
    #[serde(default)]
    pub duplicate_header_parameters: bool,
    /// Methods tried as unexpected; empty means the built-in set.
    #[serde(default)]
    pub unexpected_methods: Vec<String>,
    #[serde(default = "default_max_reference_depth")]
    pub max_reference_depth: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            modes: default_modes(),
            duplicate_query_parameters: true,
            duplicate_header_parameters: false,
            unexpected_methods: Vec::new(),
            max_reference_depth: default_max_reference_depth(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FuzzingConfig {
    #[serde(default = "default_cases")]
    pub cases: usize,
    #[serde(default)]
    pub seed: u64,
}

impl Default for FuzzingConfig {
    fn default() -> Self {
        Self {
            cases: default_cases(),
            seed: 0,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StatefulConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default)]
    pub seed: u64,
}

impl Default for StatefulConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            seed: 0,
        }
    }
}

fn default_modes() -> Vec<GenerationMode> {
    vec![GenerationMode::Positive, GenerationMode::Negative]
}

fn default_true() -> bool {
    true
}

fn default_max_reference_depth() -> usize {
    8
}

fn default_cases() -> usize {
    32
}

fn default_max_steps() -> usize {
    10
}

pub fn default_apiprobe_toml() -> &'static str {
    DEFAULT_APIPROBE_TOML
}

pub fn load_config() -> Result<ProbeConfig, String> {
    load_config_with_env(std::env::current_dir(), home_config_path())
}

pub fn load_config_from(start_dir: &Path, home_config: Option<&Path>) -> Result<ProbeConfig, String> {
    if let Some(path) = find_repo_config(start_dir) {
        return load_config_from_path(&path).map(|config| config.with_source(ConfigSource::Repo));
    }
    if let Some(path) = home_config.filter(|path| path.exists()) {
        return load_config_from_path(path).map(|config| config.with_source(ConfigSource::Home));
    }
    parse_config(DEFAULT_APIPROBE_TOML).map(|config| config.with_source(ConfigSource::Default))
}

fn load_config_with_env(
    cwd: Result<PathBuf, std::io::Error>,
    home_config: Option<PathBuf>,
) -> Result<ProbeConfig, String> {
    let cwd = cwd.map_err(|error| format!("failed to read cwd: {error}"))?;
    load_config_from(&cwd, home_config.as_deref())
}

fn load_config_from_path(path: &Path) -> Result<ProbeConfig, String> {
    let contents = fs::read_to_string(path)
        .map_err(|error| format!("failed to read config '{}': {error}", path.display()))?;
    parse_config(&contents).map_err(|error| format!("invalid config '{}': {error}", path.display()))
}

pub fn parse_config(contents: &str) -> Result<ProbeConfig, String> {
    let config: ProbeConfig = toml::from_str(contents).map_err(|error| format!("{error}"))?;
    let version = config.version.unwrap_or(1);
    if version != 1 {
        return Err(format!("unsupported config version {version}"));
    }
    if config.generation.modes.is_empty() {
        return Err("generation.modes must not be empty".to_string());
    }
    Ok(config)
}

fn find_repo_config(start_dir: &Path) -> Option<PathBuf> {
    let git_root = find_git_root(start_dir)?;
    let mut current = Some(start_dir);
    while let Some(dir) = current {
        let candidate = dir.join("apiprobe.toml");
        if candidate.is_file() {
            return Some(candidate);
        }
        if dir == git_root {
            break;
        }
        current = dir.parent();
    }
    None
}

fn find_git_root(start_dir: &Path) -> Option<PathBuf> {
    let mut current = Some(start_dir);
    while let Some(dir) = current {
        if dir.join(".git").exists() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

fn home_config_path() -> Option<PathBuf> {
    home_config_path_from(std::env::var_os("HOME"))
}

fn home_config_path_from(home: Option<std::ffi::OsString>) -> Option<PathBuf> {
    let home = home?;
    Some(PathBuf::from(home).join(".config").join("apiprobe.toml"))
}
