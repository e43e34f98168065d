//! Resolver configuration.

use serde::{Deserialize, Serialize};

/// Settings that affect how PROTO sources are split and resolved.
///
/// Deserializes from JSON; missing keys take their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Prefix substituted for `webots://`.
    pub mirror_base: String,
    /// A source containing this text has a templated body.
    pub template_marker: String,
    /// Extensions of quoted paths rewritten to absolute URLs.
    pub asset_extensions: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            mirror_base: "https://raw.githubusercontent.com/cyberbotics/webots/R2022b/".to_string(),
            template_marker: "template language: handlebars".to_string(),
            asset_extensions: ["jpg", "jpeg", "png", "hdr", "obj", "stl", "dae", "wav", "mp3"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl ResolverConfig {
    /// True if `path` ends in one of the asset extensions.
    pub fn is_asset(&self, path: &str) -> bool {
        path.rsplit_once('.')
            .is_some_and(|(_, ext)| self.asset_extensions.iter().any(|e| e == ext))
    }
}
