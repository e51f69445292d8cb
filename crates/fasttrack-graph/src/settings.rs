//! Project settings stored in `.fasttrack/settings.json`.
//!
//! Every field has a default, so a partial or empty file is valid.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub complexity: ComplexitySettings,
    pub stale_code: StaleCodeSettings,
    pub scan: ScanSettings,
    pub developer: DeveloperSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ComplexitySettings {
    /// Blocks at or above this complexity are flagged.
    pub threshold: u32,
}

impl Default for ComplexitySettings {
    fn default() -> Self {
        Self { threshold: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StaleCodeSettings {
    /// AI blocks untouched for this many days are stale.
    pub days: u32,
}

impl Default for StaleCodeSettings {
    fn default() -> Self {
        Self { days: 30 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanSettings {
    /// Directory names skipped while scanning, on top of `.gitignore`.
    pub ignore: Vec<String>,
    /// Inserted spans shorter than this many characters are ignored.
    pub insertion_threshold: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            ignore: ["node_modules", "target", "dist", ".git", "__pycache__", ".fasttrack"]
                .into_iter()
                .map(String::from)
                .collect(),
            insertion_threshold: 10,
        }
    }
}

/// The developer credited with `authored` edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeveloperSettings {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Default for DeveloperSettings {
    fn default() -> Self {
        Self {
            id: "default-developer".to_string(),
            name: "Developer".to_string(),
            email: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "staleCode": { "days": 7 } }"#).unwrap();
        assert_eq!(settings.stale_code.days, 7);
        assert_eq!(settings.complexity.threshold, 10);
        assert_eq!(settings.developer.id, "default-developer");
    }

    #[test]
    fn test_settings_wire_names() {
        let value = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(value["complexity"]["threshold"], 10);
        assert_eq!(value["staleCode"]["days"], 30);
        assert_eq!(value["scan"]["insertionThreshold"], 10);
    }
}
