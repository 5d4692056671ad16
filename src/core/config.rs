use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Root configuration structure for deckhand.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeckhandConfig {
    #[serde(default)]
    pub target: TargetConfig,

    #[serde(default)]
    pub rollout: RolloutConfig,

    #[serde(default)]
    pub migrations: MigrationsConfig,
}

/// The deploy target: registry, cluster, and manifest coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default = "default_account_id")]
    pub account_id: String,

    #[serde(default = "default_repository")]
    pub repository: String,

    #[serde(default = "default_cluster")]
    pub cluster: String,

    #[serde(default = "default_image_tag")]
    pub image_tag: String,

    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,

    /// Override the Deployment name resolved from the manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,

    /// Override the Service name resolved from the manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    /// Override the pod label selector resolved from the manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_selector: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloutConfig {
    #[serde(default = "default_rollout_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationsConfig {
    #[serde(default = "default_versions_dir")]
    pub versions_dir: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            account_id: default_account_id(),
            repository: default_repository(),
            cluster: default_cluster(),
            image_tag: default_image_tag(),
            manifest_path: default_manifest_path(),
            deployment: None,
            service: None,
            pod_selector: None,
        }
    }
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_rollout_timeout_secs(),
        }
    }
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            versions_dir: default_versions_dir(),
        }
    }
}

// =============================================================================
// Default value functions (match current hardcoded behavior)
// =============================================================================

fn default_region() -> String {
    "ap-northeast-2".to_string()
}

/// The AWS documentation placeholder. `doctor` warns until it is replaced.
fn default_account_id() -> String {
    "123456789012".to_string()
}

fn default_repository() -> String {
    "library-api".to_string()
}

fn default_cluster() -> String {
    "library-cluster".to_string()
}

fn default_image_tag() -> String {
    "latest".to_string()
}

fn default_manifest_path() -> String {
    "k8s/deployment.yaml".to_string()
}

fn default_rollout_timeout_secs() -> u64 {
    300
}

fn default_versions_dir() -> String {
    "alembic/versions".to_string()
}

impl TargetConfig {
    /// Registry host the image is pushed to and Docker logs in against.
    pub fn registry_host(&self) -> String {
        format!("{}.dkr.ecr.{}.amazonaws.com", self.account_id, self.region)
    }

    /// Local image reference produced by the build step.
    pub fn local_image(&self) -> String {
        format!("{}:{}", self.repository, self.image_tag)
    }

    /// Fully qualified remote image reference.
    pub fn remote_image(&self) -> String {
        format!(
            "{}/{}:{}",
            self.registry_host(),
            self.repository,
            self.image_tag
        )
    }

    pub fn manifest_path_expanded(&self) -> String {
        shellexpand::tilde(&self.manifest_path).to_string()
    }

    /// Every scalar must be a well-formed identifier for the tool consuming it.
    pub fn validate(&self) -> Result<()> {
        let checks: [(&str, &str, &str, &str); 5] = [
            (
                "target.region",
                self.region.as_str(),
                r"^[a-z]{2,3}(-[a-z]+)+-\d$",
                "must look like an AWS region (e.g. ap-northeast-2)",
            ),
            (
                "target.account_id",
                self.account_id.as_str(),
                r"^[0-9]{12}$",
                "must be a 12-digit AWS account id",
            ),
            (
                "target.repository",
                self.repository.as_str(),
                r"^[a-z0-9]+(?:[._-][a-z0-9]+)*(?:/[a-z0-9]+(?:[._-][a-z0-9]+)*)*$",
                "must be a valid ECR repository name",
            ),
            (
                "target.cluster",
                self.cluster.as_str(),
                r"^[0-9A-Za-z][A-Za-z0-9_-]{0,99}$",
                "must be a valid EKS cluster name",
            ),
            (
                "target.image_tag",
                self.image_tag.as_str(),
                r"^[A-Za-z0-9_][A-Za-z0-9._-]{0,127}$",
                "must be a valid image tag",
            ),
        ];

        for (key, value, pattern, problem) in checks {
            let re = Regex::new(pattern).map_err(|e| Error::internal_unexpected(e.to_string()))?;
            if !re.is_match(value) {
                return Err(Error::config_invalid_value(
                    key,
                    Some(value.to_string()),
                    problem,
                ));
            }
        }

        if self.manifest_path.trim().is_empty() {
            return Err(Error::config_invalid_value(
                "target.manifest_path",
                None,
                "must not be empty",
            ));
        }

        Ok(())
    }
}

impl MigrationsConfig {
    pub fn versions_dir_expanded(&self) -> String {
        shellexpand::tilde(&self.versions_dir).to_string()
    }
}

// =============================================================================
// Loading functions
// =============================================================================

/// Base deckhand config directory (universal ~/.config/deckhand/ unless
/// DECKHAND_CONFIG_DIR overrides it).
pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("DECKHAND_CONFIG_DIR") {
        return Ok(PathBuf::from(dir));
    }

    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected("APPDATA environment variable not set on Windows")
        })?;
        Ok(PathBuf::from(appdata).join("deckhand"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected("HOME environment variable not set on Unix-like system")
        })?;
        Ok(PathBuf::from(home).join(".config").join("deckhand"))
    }
}

/// Global deckhand.json config file path
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("deckhand.json"))
}

/// Load config, merging the file with built-in defaults.
/// If deckhand.json is missing or invalid, silently returns built-in defaults.
pub fn load() -> DeckhandConfig {
    load_strict().unwrap_or_default()
}

/// Load config, reporting read/parse failures instead of swallowing them.
/// A missing file is not an error; the built-in defaults apply.
pub fn load_strict() -> Result<DeckhandConfig> {
    let path = config_file()?;

    if !path.exists() {
        return Ok(DeckhandConfig::default());
    }

    let content = fs::read_to_string(&path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    serde_json::from_str(&content)
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))
}

/// Save config to deckhand.json (creates if missing).
pub fn save(config: &DeckhandConfig) -> Result<()> {
    let raw = serde_json::to_value(config)
        .map_err(|e| Error::internal_json(e.to_string(), Some("serialize config".to_string())))?;
    save_raw(&raw)
}

fn save_raw(raw: &Value) -> Result<()> {
    let path = config_file()?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("create {}", parent.display())))
        })?;
    }

    let content = serde_json::to_string_pretty(raw)
        .map_err(|e| Error::internal_json(e.to_string(), Some("serialize config".to_string())))?;

    fs::write(&path, content).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("write {}", path.display())))
    })?;

    Ok(())
}

/// Set a value at a JSON pointer path in deckhand.json, returning the
/// resulting typed config. The write is rejected when the result no longer
/// deserializes.
pub fn set_value(pointer: &str, value: Value) -> Result<DeckhandConfig> {
    let path = config_file()?;

    let mut raw: Value = if path.exists() {
        let content = fs::read_to_string(&path).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))?
    } else {
        Value::Object(serde_json::Map::new())
    };

    insert_at_pointer(&mut raw, pointer, value)?;

    let parsed: DeckhandConfig = serde_json::from_value(raw.clone())
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))?;

    save_raw(&raw)?;

    Ok(parsed)
}

fn insert_at_pointer(root: &mut Value, pointer: &str, value: Value) -> Result<()> {
    let invalid = || {
        Error::validation_invalid_argument(
            "pointer",
            format!(
                "'{}' is not a usable JSON pointer (expected e.g. /target/image_tag)",
                pointer
            ),
            None,
            None,
        )
    };

    let Some(trimmed) = pointer.strip_prefix('/') else {
        return Err(invalid());
    };

    let mut tokens: Vec<&str> = trimmed.split('/').collect();
    let Some(last) = tokens.pop() else {
        return Err(invalid());
    };
    if last.is_empty() || tokens.iter().any(|t| t.is_empty()) {
        return Err(invalid());
    }

    let mut current = root;
    for token in tokens {
        let obj = current.as_object_mut().ok_or_else(invalid)?;
        current = obj
            .entry(token.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }

    let obj = current.as_object_mut().ok_or_else(invalid)?;
    obj.insert(last.to_string(), value);
    Ok(())
}

/// Check if deckhand.json exists
pub fn config_exists() -> bool {
    config_file().map(|p| p.exists()).unwrap_or(false)
}

/// Delete deckhand.json (reset to defaults)
pub fn reset_config() -> Result<bool> {
    let path = config_file()?;

    if path.exists() {
        fs::remove_file(&path).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("delete {}", path.display())))
        })?;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Get the path to deckhand.json (for display purposes)
pub fn config_path() -> Result<String> {
    Ok(config_file()?.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_references_compose_from_target_scalars() {
        let target = TargetConfig::default();
        assert_eq!(
            target.registry_host(),
            "123456789012.dkr.ecr.ap-northeast-2.amazonaws.com"
        );
        assert_eq!(target.local_image(), "library-api:latest");
        assert_eq!(
            target.remote_image(),
            "123456789012.dkr.ecr.ap-northeast-2.amazonaws.com/library-api:latest"
        );
    }

    #[test]
    fn default_target_validates() {
        assert!(TargetConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_malformed_account_id() {
        let target = TargetConfig {
            account_id: "12345".to_string(),
            ..Default::default()
        };
        let err = target.validate().unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_value");
    }

    #[test]
    fn validate_rejects_uppercase_repository() {
        let target = TargetConfig {
            repository: "Library-API".to_string(),
            ..Default::default()
        };
        assert!(target.validate().is_err());
    }

    #[test]
    fn insert_at_pointer_creates_intermediate_objects() {
        let mut raw = Value::Object(serde_json::Map::new());
        insert_at_pointer(&mut raw, "/target/image_tag", Value::String("v2".into())).unwrap();
        assert_eq!(raw["target"]["image_tag"], "v2");
    }

    #[test]
    fn insert_at_pointer_rejects_relative_paths() {
        let mut raw = Value::Object(serde_json::Map::new());
        let err = insert_at_pointer(&mut raw, "target/image_tag", Value::Null).unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
    }

    #[test]
    fn set_value_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        env::set_var("DECKHAND_CONFIG_DIR", dir.path());

        let cfg = set_value("/target/image_tag", Value::String("v9".into())).unwrap();
        assert_eq!(cfg.target.image_tag, "v9");
        // Untouched fields keep their defaults
        assert_eq!(cfg.target.region, "ap-northeast-2");

        let reloaded = load_strict().unwrap();
        assert_eq!(reloaded.target.image_tag, "v9");

        assert!(reset_config().unwrap());
        assert!(!config_exists());

        env::remove_var("DECKHAND_CONFIG_DIR");
    }
}
