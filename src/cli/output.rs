//! CLI output: error mapping and presentation of command results.

use crate::config::GenrelayConfig;
use crate::error::ApiError;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::json;

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::Provider(failure) => format!(
            "Generation failed [{}{}]: {}",
            failure.kind,
            if failure.is_retryable() { ", retryable" } else { "" },
            failure.message
        ),
        other => other.to_string(),
    }
}

pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::ConfigError(format!("Failed to encode output: {}", e)))
}

fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

/// One row of the providers view, in chain order
#[derive(Debug, Clone, Serialize)]
pub struct ProviderRow {
    pub name: String,
    pub enabled: bool,
    pub target: String,
    pub model: String,
    pub timeout_secs: Option<u64>,
    pub problem: Option<String>,
}

pub fn provider_rows(config: &GenrelayConfig) -> Vec<ProviderRow> {
    let openai = &config.providers.openai;
    let external = &config.providers.external;
    vec![
        ProviderRow {
            name: "openai".to_string(),
            enabled: openai.enabled,
            target: openai.base_url.clone(),
            model: openai.model.clone(),
            timeout_secs: Some(openai.timeout_secs),
            problem: openai.validate().err(),
        },
        ProviderRow {
            name: "external".to_string(),
            enabled: external.is_configured(),
            target: if external.endpoint.is_empty() {
                "(not configured)".to_string()
            } else {
                external.endpoint.clone()
            },
            model: external.model.clone().unwrap_or_else(|| "-".to_string()),
            timeout_secs: Some(external.timeout_secs),
            problem: external.validate().err(),
        },
        ProviderRow {
            name: "stub".to_string(),
            enabled: config.fallback.allow_stub_fallback,
            target: "(local)".to_string(),
            model: "-".to_string(),
            timeout_secs: None,
            problem: None,
        },
    ]
}

pub fn format_providers_text(config: &GenrelayConfig) -> String {
    let mut out = format!("{}\n\n", format_section_heading("Providers"));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Provider", "Enabled", "Target", "Model", "Timeout", "Status"]);
    for row in provider_rows(config) {
        let status = match (&row.problem, row.enabled) {
            (Some(problem), _) => format!("{}", problem.red()),
            (None, true) => format!("{}", "ok".green()),
            (None, false) => format!("{}", "off".dimmed()),
        };
        table.add_row(vec![
            row.name,
            if row.enabled { "yes" } else { "no" }.to_string(),
            row.target,
            row.model,
            row.timeout_secs
                .map(|t| format!("{}s", t))
                .unwrap_or_else(|| "-".to_string()),
            status,
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out
}

pub fn format_providers_json(config: &GenrelayConfig) -> Result<String, ApiError> {
    let rows = provider_rows(config);
    to_pretty_json(&json!({
        "providers": rows,
        "allowStubFallback": config.fallback.allow_stub_fallback,
    }))
}
