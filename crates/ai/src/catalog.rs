//! Tool catalog.
//!
//! Names, descriptions, backend modes and default models for every tool,
//! plus the translation language list. Loaded once from embedded JSON.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::ToolKind;

// ============================================================================
// Tool Catalog (Static JSON)
// ============================================================================

/// Static tool catalog loaded from embedded JSON.
static TOOL_CATALOG: Lazy<ToolCatalog> = Lazy::new(|| {
    let json = include_str!("tool_catalog.json");
    serde_json::from_str(json).expect("Failed to parse tool_catalog.json")
});

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCatalog {
    app_name: String,
    chat_model: String,
    tools: HashMap<ToolKind, ToolCatalogEntry>,
    image_aspect_ratio: String,
    translation_languages: Vec<String>,
    default_target_language: String,
}

#[derive(Debug, Deserialize)]
struct ToolCatalogEntry {
    name: String,
    description: String,
    mode: String,
    model: String,
}

/// Tool info for catalog listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub kind: ToolKind,
    pub name: String,
    pub description: String,
    /// `grounded`, `structured` or `image`.
    pub mode: String,
    pub model: String,
}

/// Full catalog view returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogResponse {
    pub app_name: String,
    pub chat_model: String,
    pub tools: Vec<ToolInfo>,
    pub translation_languages: Vec<String>,
    pub default_target_language: String,
}

/// Catalog info for one tool.
pub fn tool_info(kind: ToolKind) -> Option<ToolInfo> {
    TOOL_CATALOG.tools.get(&kind).map(|entry| ToolInfo {
        kind,
        name: entry.name.clone(),
        description: entry.description.clone(),
        mode: entry.mode.clone(),
        model: entry.model.clone(),
    })
}

/// All tools in display order.
pub fn list_tools() -> Vec<ToolInfo> {
    ToolKind::ALL.into_iter().filter_map(tool_info).collect()
}

/// Default model for a tool.
pub fn default_model(kind: ToolKind) -> Option<&'static str> {
    TOOL_CATALOG.tools.get(&kind).map(|entry| entry.model.as_str())
}

pub fn default_chat_model() -> &'static str {
    &TOOL_CATALOG.chat_model
}

pub fn image_aspect_ratio() -> &'static str {
    &TOOL_CATALOG.image_aspect_ratio
}

pub fn app_name() -> &'static str {
    &TOOL_CATALOG.app_name
}

pub fn translation_languages() -> &'static [String] {
    &TOOL_CATALOG.translation_languages
}

pub fn default_target_language() -> &'static str {
    &TOOL_CATALOG.default_target_language
}

pub fn catalog() -> CatalogResponse {
    CatalogResponse {
        app_name: app_name().to_string(),
        chat_model: default_chat_model().to_string(),
        tools: list_tools(),
        translation_languages: translation_languages().to_vec(),
        default_target_language: default_target_language().to_string(),
    }
}
