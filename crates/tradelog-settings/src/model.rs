use serde::{Deserialize, Serialize};

/// Branding shown in the journal header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub primary_text: String,
    /// Tailwind colour class, e.g. `text-pink-500`.
    pub primary_color: String,
    pub secondary_text: String,
    pub secondary_color: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            primary_text: "Cute".to_string(),
            primary_color: "text-pink-500".to_string(),
            secondary_text: "Workstation".to_string(),
            secondary_color: "text-white".to_string(),
        }
    }
}

impl Settings {
    /// Shallow merge: every field set in `patch` replaces the current value.
    pub fn merge(&mut self, patch: &SettingsPatch) {
        if let Some(text) = &patch.primary_text {
            self.primary_text = text.clone();
        }
        if let Some(color) = &patch.primary_color {
            self.primary_color = color.clone();
        }
        if let Some(text) = &patch.secondary_text {
            self.secondary_text = text.clone();
        }
        if let Some(color) = &patch.secondary_color {
            self.secondary_color = color.clone();
        }
    }

    pub fn merged(mut self, patch: &SettingsPatch) -> Self {
        self.merge(patch);
        self
    }
}

/// Partial update; `None` fields are left untouched.
///
/// Persisted records are read back through this type too, so a record with
/// missing or unknown fields still hydrates whatever it does contain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_color: Option<String>,
}

impl SettingsPatch {
    pub fn primary_text(mut self, text: impl Into<String>) -> Self {
        self.primary_text = Some(text.into());
        self
    }

    pub fn primary_color(mut self, color: impl Into<String>) -> Self {
        self.primary_color = Some(color.into());
        self
    }

    pub fn secondary_text(mut self, text: impl Into<String>) -> Self {
        self.secondary_text = Some(text.into());
        self
    }

    pub fn secondary_color(mut self, color: impl Into<String>) -> Self {
        self.secondary_color = Some(color.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_only_replaces_present_fields() {
        let merged = Settings::default().merged(&SettingsPatch::default().primary_text("Foo"));
        assert_eq!(merged.primary_text, "Foo");
        assert_eq!(merged.primary_color, "text-pink-500");
        assert_eq!(merged.secondary_text, "Workstation");
        assert_eq!(merged.secondary_color, "text-white");
    }

    #[test]
    fn serializes_with_camel_case_names() {
        let json = serde_json::to_value(Settings::default()).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "primaryText": "Cute",
                "primaryColor": "text-pink-500",
                "secondaryText": "Workstation",
                "secondaryColor": "text-white",
            })
        );
    }

    #[test]
    fn patch_tolerates_partial_and_unknown_fields() {
        let patch: SettingsPatch =
            serde_json::from_str(r#"{"secondaryText":"Desk","legacyFlag":true}"#).expect("parse");
        assert_eq!(patch, SettingsPatch::default().secondary_text("Desk"));
        assert!(!patch.is_empty());
        assert!(SettingsPatch::default().is_empty());
    }
}
