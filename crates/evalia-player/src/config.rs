use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use evalia_session::clock::ClockConfig;
use evalia_session::integrity::IntegrityConfig;

/// Current config version. Bump this when adding fields or changing shape.
/// Each bump requires a corresponding entry in [`migrate`].
const CURRENT_VERSION: u32 = 1;

const APP_DIR: &str = "com.evalia.player";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Schema version. Missing or 0 = pre-versioned config.
    #[serde(default)]
    pub config_version: u32,
    /// Backend endpoint that receives submissions as JSON.
    pub submit_url: String,
    pub learner_id: String,
    /// Where drafts are kept. Defaults to the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drafts_dir: Option<PathBuf>,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "default_submit_timeout_secs")]
    pub submit_timeout_secs: u64,
    #[serde(default)]
    pub integrity: IntegrityConfig,
    #[serde(default)]
    pub clock: ClockConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_submit_timeout_secs() -> u64 {
    30
}

impl PlayerConfig {
    pub fn new(submit_url: impl Into<String>, learner_id: impl Into<String>) -> Self {
        Self {
            config_version: CURRENT_VERSION,
            submit_url: submit_url.into(),
            learner_id: learner_id.into(),
            drafts_dir: None,
            log_format: LogFormat::default(),
            submit_timeout_secs: default_submit_timeout_secs(),
            integrity: IntegrityConfig::default(),
            clock: ClockConfig::default(),
        }
    }

    pub fn drafts_dir(&self) -> eyre::Result<PathBuf> {
        if let Some(dir) = &self.drafts_dir {
            return Ok(dir.clone());
        }
        let base = dirs::data_dir().ok_or_else(|| eyre::eyre!("no data directory found"))?;
        Ok(base.join(APP_DIR).join("drafts"))
    }
}

pub fn config_dir() -> eyre::Result<PathBuf> {
    let base = dirs::config_dir().ok_or_else(|| eyre::eyre!("no config directory found"))?;
    Ok(base.join(APP_DIR))
}

pub fn has_config(dir: &Path) -> bool {
    dir.join("config.json").exists()
}

pub fn load_config(dir: &Path) -> eyre::Result<PlayerConfig> {
    let path = dir.join("config.json");
    let contents = std::fs::read_to_string(&path)
        .map_err(|e| eyre::eyre!("failed to read config at {}: {e}", path.display()))?;

    // Parse as raw JSON so migrations run before deserializing.
    let json: serde_json::Value = serde_json::from_str(&contents)?;
    let on_disk_version = json
        .get("config_version")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);

    let migrated = migrate(json, on_disk_version)?;
    let config: PlayerConfig = serde_json::from_value(migrated)?;
    config
        .integrity
        .validate()
        .map_err(|e| eyre::eyre!("{}: {e}", path.display()))?;
    Ok(config)
}

/// Run sequential migrations from `from_version` up to [`CURRENT_VERSION`].
fn migrate(mut json: serde_json::Value, from_version: u64) -> eyre::Result<serde_json::Value> {
    if from_version > u64::from(CURRENT_VERSION) {
        return Err(eyre::eyre!(
            "config_version {from_version} is newer than this build supports ({CURRENT_VERSION}). \
             Please update evalia-player."
        ));
    }

    // v0 → v1: `endpoint` became `submit_url`, the flat `tab_switch_limit`
    // moved under `integrity`.
    if from_version < 1 {
        let obj = json
            .as_object_mut()
            .ok_or_else(|| eyre::eyre!("config is not a JSON object"))?;
        if let Some(endpoint) = obj.remove("endpoint") {
            obj.entry("submit_url").or_insert(endpoint);
        }
        if let Some(limit) = obj.remove("tab_switch_limit") {
            let integrity = obj
                .entry("integrity")
                .or_insert_with(|| serde_json::Value::Object(Default::default()));
            if let Some(integrity) = integrity.as_object_mut() {
                integrity.entry("force_after_tab_switches").or_insert(limit);
            }
        }
        obj.insert("config_version".to_string(), serde_json::Value::Number(1.into()));
        tracing::info!("migrated config v0 → v1 (renamed endpoint, nested integrity)");
    }

    Ok(json)
}

pub fn save_config(dir: &Path, config: &PlayerConfig) -> eyre::Result<()> {
    std::fs::create_dir_all(dir)?;

    // Always write the current version, regardless of what was loaded.
    let mut stamped = config.clone();
    stamped.config_version = CURRENT_VERSION;

    let path = dir.join("config.json");
    let json = serde_json::to_string_pretty(&stamped)?;

    let tmp_path = dir.join("config.json.tmp");
    std::fs::write(&tmp_path, json.as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp_path, &path)?;

    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
