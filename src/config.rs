use crate::dashboard::DEFAULT_AGE_BINS;
use crate::error::StoreError;
use crate::matcher::DEFAULT_MATCH_THRESHOLD;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "settings.json";
pub const WORKSPACE_ENV: &str = "ROSTERD_WORKSPACE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub match_threshold: f64,
    pub audit_admin_logins: bool,
    pub usage_log: bool,
    pub age_histogram_bins: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            audit_admin_logins: true,
            usage_log: true,
            age_histogram_bins: DEFAULT_AGE_BINS,
        }
    }
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_u64_range(v: &Value, key: &str, min: u64, max: u64) -> Result<u64, String> {
    let n = v
        .as_u64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

impl Settings {
    /// Missing file means defaults. A file that does not parse is reported
    /// and replaced by defaults so a bad edit cannot lock the workspace.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        let mut settings: Settings = match serde_json::from_str(&text) {
            Ok(s) => s,
            Err(e) => {
                warn!("ignoring unreadable {}: {}", path.to_string_lossy(), e);
                return Ok(Self::default());
            }
        };
        // out-of-range values saved by hand fall back field by field
        let defaults = Self::default();
        if !(settings.match_threshold > 0.0 && settings.match_threshold <= 1.0) {
            settings.match_threshold = defaults.match_threshold;
        }
        if !(1..=50).contains(&settings.age_histogram_bins) {
            settings.age_histogram_bins = defaults.age_histogram_bins;
        }
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(self).map_err(|e| StoreError::Io {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".writing");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, text).map_err(|e| StoreError::io(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))
    }

    /// Apply a partial update. Nothing changes unless every key is valid.
    pub fn apply_patch(&mut self, patch: &Map<String, Value>) -> Result<(), String> {
        let mut next = self.clone();
        for (k, v) in patch {
            match k.as_str() {
                "matchThreshold" => {
                    let t = v
                        .as_f64()
                        .ok_or_else(|| format!("{} must be a number", k))?;
                    if !(t > 0.0 && t <= 1.0) {
                        return Err(format!("{} must be in (0, 1]", k));
                    }
                    next.match_threshold = t;
                }
                "auditAdminLogins" => next.audit_admin_logins = parse_bool(v, k)?,
                "usageLog" => next.usage_log = parse_bool(v, k)?,
                "ageHistogramBins" => {
                    next.age_histogram_bins = parse_u64_range(v, k, 1, 50)? as usize;
                }
                _ => return Err(format!("unknown setting: {}", k)),
            }
        }
        *self = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    fn patch(v: Value) -> Map<String, Value> {
        v.as_object().cloned().expect("object")
    }

    #[test]
    fn missing_and_partial_files_use_defaults() {
        let dir = temp_dir("rosterd-settings-load");
        let path = dir.join(SETTINGS_FILE);
        assert_eq!(Settings::load(&path).expect("load"), Settings::default());

        std::fs::write(&path, r#"{"usageLog": false, "ageHistogramBins": 400}"#).expect("write");
        let s = Settings::load(&path).expect("load");
        assert!(!s.usage_log);
        assert_eq!(s.age_histogram_bins, DEFAULT_AGE_BINS);
        assert_eq!(s.match_threshold, 0.5);

        std::fs::write(&path, "{not json").expect("write");
        assert_eq!(Settings::load(&path).expect("load"), Settings::default());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn save_then_load() {
        let dir = temp_dir("rosterd-settings-save");
        let path = dir.join(SETTINGS_FILE);
        let mut s = Settings::default();
        s.apply_patch(&patch(json!({"matchThreshold": 0.75, "auditAdminLogins": false})))
            .expect("patch");
        s.save(&path).expect("save");
        assert_eq!(Settings::load(&path).expect("load"), s);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn invalid_patch_changes_nothing() {
        let mut s = Settings::default();
        for bad in [
            json!({"matchThreshold": 0}),
            json!({"matchThreshold": 1.5}),
            json!({"ageHistogramBins": 0}),
            json!({"usageLog": "yes"}),
            json!({"usageLog": false, "colour": "red"}),
        ] {
            assert!(s.apply_patch(&patch(bad)).is_err());
        }
        assert_eq!(s, Settings::default());
    }
}
