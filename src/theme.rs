//! Theme settings: named theme, custom palette, recently used palettes.

use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use ts_rs::TS;

use crate::prefs::{PreferenceKey, PreferenceStore, SaveOutcome};

/// How many custom palettes the history keeps, newest first.
pub const MAX_RECENT_COLORS: usize = 5;

static HEX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#?([0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("static hex pattern"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ThemeError {
    #[error("`{0}` is not a hex color (#rgb or #rrggbb)")]
    InvalidColor(String),
    #[error("unknown theme `{0}`")]
    UnknownTheme(String),
    #[error("custom theme selected without a custom palette")]
    MissingCustomColors,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum ThemeName {
    Light,
    Dark,
    #[default]
    System,
    Custom,
}

impl FromStr for ThemeName {
    type Err = ThemeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(ThemeName::Light),
            "dark" => Ok(ThemeName::Dark),
            "system" => Ok(ThemeName::System),
            "custom" => Ok(ThemeName::Custom),
            other => Err(ThemeError::UnknownTheme(other.to_string())),
        }
    }
}

/// Normalize a hex color to lowercase `#rrggbb`.
pub fn normalize_hex(raw: &str) -> Result<String, ThemeError> {
    let caps = HEX_RE
        .captures(raw.trim())
        .ok_or_else(|| ThemeError::InvalidColor(raw.to_string()))?;
    let digits = caps[1].to_ascii_lowercase();
    if digits.len() == 3 {
        Ok(digits.chars().fold(String::from("#"), |mut acc, c| {
            acc.push(c);
            acc.push(c);
            acc
        }))
    } else {
        Ok(format!("#{digits}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct ColorTriple {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
}

impl ColorTriple {
    pub fn new(primary: &str, secondary: &str, accent: &str) -> Result<Self, ThemeError> {
        Ok(Self {
            primary: normalize_hex(primary)?,
            secondary: normalize_hex(secondary)?,
            accent: normalize_hex(accent)?,
        })
    }

    fn from_value(value: &Value) -> Option<Self> {
        let raw: ColorTriple = serde_json::from_value(value.clone()).ok()?;
        ColorTriple::new(&raw.primary, &raw.secondary, &raw.accent).ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct ThemeSettings {
    pub theme: ThemeName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub custom_colors: Option<ColorTriple>,
    #[serde(default)]
    pub recent_custom_colors: Vec<ColorTriple>,
}

impl ThemeSettings {
    /// Switch to a named theme. `Custom` needs a palette on record.
    pub fn select(&mut self, theme: ThemeName) -> Result<(), ThemeError> {
        if theme == ThemeName::Custom && self.custom_colors.is_none() {
            return Err(ThemeError::MissingCustomColors);
        }
        self.theme = theme;
        Ok(())
    }

    /// Activate a custom palette and record it in the history.
    pub fn apply_custom(&mut self, colors: ColorTriple) {
        self.push_recent(colors.clone());
        self.custom_colors = Some(colors);
        self.theme = ThemeName::Custom;
    }

    pub fn push_recent(&mut self, colors: ColorTriple) {
        self.recent_custom_colors.retain(|existing| existing != &colors);
        self.recent_custom_colors.insert(0, colors);
        self.recent_custom_colors.truncate(MAX_RECENT_COLORS);
    }

    /// Lenient decode of a stored payload. Unknown theme names become
    /// `system`, invalid palettes are dropped, history is deduplicated and capped.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            if !value.is_null() {
                debug!(target: "matrix_prefs", event = "theme_coerced", reason = "not_an_object");
            }
            return ThemeSettings::default();
        };

        let mut theme = match obj.get("theme").and_then(Value::as_str) {
            Some(name) => name.parse().unwrap_or_else(|_| {
                debug!(target: "matrix_prefs", event = "theme_coerced", reason = "unknown_theme", theme = %name);
                ThemeName::System
            }),
            None => ThemeName::System,
        };

        let custom_colors = obj.get("custom_colors").and_then(|raw| {
            let parsed = ColorTriple::from_value(raw);
            if parsed.is_none() && !raw.is_null() {
                debug!(target: "matrix_prefs", event = "theme_coerced", reason = "invalid_custom_colors");
            }
            parsed
        });
        if theme == ThemeName::Custom && custom_colors.is_none() {
            theme = ThemeName::System;
        }

        let mut settings = ThemeSettings {
            theme,
            custom_colors,
            recent_custom_colors: Vec::new(),
        };
        if let Some(Value::Array(history)) = obj.get("recent_custom_colors") {
            // Oldest first so the newest ends up at the front.
            for entry in history.iter().rev() {
                if let Some(colors) = ColorTriple::from_value(entry) {
                    settings.push_recent(colors);
                }
            }
        }
        settings
    }
}

pub async fn load_theme(store: &PreferenceStore, owner_id: &str) -> ThemeSettings {
    let value = store
        .get_preference(owner_id, &PreferenceKey::theme_settings(), Value::Null)
        .await;
    ThemeSettings::from_value(&value)
}

pub async fn save_theme(
    store: &PreferenceStore,
    owner_id: &str,
    settings: &ThemeSettings,
) -> SaveOutcome {
    store
        .set_typed(owner_id, &PreferenceKey::theme_settings(), settings)
        .await
}
