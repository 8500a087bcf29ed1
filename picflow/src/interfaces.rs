//! Boundaries to host services the core does not implement.
//!
//! The core only needs message lookup for notifications and a way to hand
//! package management to the host. Both are traits the host supplies.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Looks up user-facing messages.
pub trait Translator: Send + Sync {
    /// Returns the message for `key`, with `${name}` placeholders filled
    /// from `args`.
    fn translate(&self, key: &str, args: &HashMap<String, String>) -> String;
}

/// Returns keys verbatim. Used when the host supplies no translations.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyTranslator;

impl Translator for KeyTranslator {
    fn translate(&self, key: &str, _args: &HashMap<String, String>) -> String {
        key.to_string()
    }
}

/// Translates from an in-memory table, falling back to the key.
#[derive(Debug, Clone, Default)]
pub struct TableTranslator {
    messages: HashMap<String, String>,
}

impl TableTranslator {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a message.
    #[must_use]
    pub fn with_message(mut self, key: impl Into<String>, message: impl Into<String>) -> Self {
        self.messages.insert(key.into(), message.into());
        self
    }
}

impl Translator for TableTranslator {
    fn translate(&self, key: &str, args: &HashMap<String, String>) -> String {
        let Some(template) = self.messages.get(key) else {
            return key.to_string();
        };
        args.iter().fold(template.clone(), |msg, (name, value)| {
            msg.replace(&format!("${{{name}}}"), value)
        })
    }
}

/// Options passed to the package installer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallOptions {
    /// Package registry URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    /// Proxy URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// Extra environment for the install process.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// What an install, update or uninstall did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallOutcome {
    /// Whether the operation succeeded.
    pub success: bool,
    /// The packages affected.
    pub packages: Vec<String>,
    /// Installer output on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

/// Installs, updates and removes plugin packages on behalf of the runtime.
#[async_trait]
pub trait PluginInstaller: Send + Sync {
    /// Installs `packages`.
    async fn install(&self, packages: &[String], options: &InstallOptions) -> InstallOutcome;

    /// Updates `packages`.
    async fn update(&self, packages: &[String], options: &InstallOptions) -> InstallOutcome;

    /// Removes `packages`.
    async fn uninstall(&self, packages: &[String], options: &InstallOptions) -> InstallOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_translator() {
        assert_eq!(KeyTranslator.translate("UPLOAD_FAILED", &HashMap::new()), "UPLOAD_FAILED");
    }

    #[test]
    fn test_table_translator_fills_placeholders() {
        let translator = TableTranslator::new().with_message("UPLOAD_FAILED", "Upload to ${uploader} failed");
        let args = HashMap::from([("uploader".to_string(), "github".to_string())]);

        assert_eq!(translator.translate("UPLOAD_FAILED", &args), "Upload to github failed");
        assert_eq!(translator.translate("MISSING", &args), "MISSING");
    }

    #[test]
    fn test_install_options_serde() {
        let options: InstallOptions =
            serde_json::from_value(serde_json::json!({"registry": "https://registry.example"})).unwrap();
        assert_eq!(options.registry.as_deref(), Some("https://registry.example"));
        assert!(options.env.is_empty());
    }
}
