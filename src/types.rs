//! Core domain types: generation requests, their fingerprints, and provider results.

use serde::{Deserialize, Serialize};

/// Request fingerprint (hex-encoded BLAKE3 digest of the ordered parameter values)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn default_language() -> String {
    "ko".to_string()
}

fn default_country() -> String {
    "KR".to_string()
}

fn default_time_range() -> String {
    "24h".to_string()
}

fn default_max_items() -> u32 {
    5
}

fn default_summary_level() -> String {
    "standard".to_string()
}

fn default_factcheck_mode() -> String {
    "strict".to_string()
}

/// Content-generation request: a subject keyword plus locale and style parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub keyword: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default = "default_time_range")]
    pub time_range: String,
    #[serde(default = "default_max_items")]
    pub max_items: u32,
    #[serde(default = "default_summary_level")]
    pub summary_level: String,
    #[serde(default = "default_factcheck_mode")]
    pub factcheck_mode: String,
}

impl GenerationRequest {
    /// Request with default locale and style parameters.
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            language: default_language(),
            country: default_country(),
            time_range: default_time_range(),
            max_items: default_max_items(),
            summary_level: default_summary_level(),
            factcheck_mode: default_factcheck_mode(),
        }
    }

    pub fn with_max_items(mut self, max_items: u32) -> Self {
        self.max_items = max_items;
        self
    }

    /// Ordered concatenation of every parameter value. Equal keys mean equivalent requests.
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}",
            self.keyword,
            self.language,
            self.country,
            self.time_range,
            self.max_items,
            self.summary_level,
            self.factcheck_mode
        )
    }

    pub fn fingerprint(&self) -> Fingerprint {
        let digest = blake3::hash(self.cache_key().as_bytes());
        Fingerprint(hex::encode(digest.as_bytes()))
    }

    /// Check the request can be sent to a provider at all.
    pub fn validate(&self, max_items_limit: u32) -> Result<(), String> {
        if self.keyword.trim().is_empty() {
            return Err("keyword must not be blank".to_string());
        }
        if self.max_items == 0 || self.max_items > max_items_limit {
            return Err(format!(
                "max_items must be between 1 and {} (got {})",
                max_items_limit, self.max_items
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSource {
    pub publisher: String,
    pub url: String,
    pub source_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemTimestamps {
    pub published_at: String,
    pub collected_at: String,
    pub last_verified_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub claim_text: String,
    pub verdict: String,
    #[serde(default)]
    pub evidence_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Factcheck {
    pub status: String,
    pub confidence: f64,
    #[serde(default)]
    pub confidence_reasons: Vec<String>,
    #[serde(default)]
    pub claims: Vec<Claim>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trend {
    pub trend_score: i32,
    pub velocity: f64,
    pub region_rank: i32,
}

/// One generated content item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub item_id: String,
    pub title: String,
    pub snippet: String,
    pub source: ItemSource,
    pub timestamps: ItemTimestamps,
    pub factcheck: Factcheck,
    pub trend: Trend,
}

/// Summary block accompanying the item list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub brief: String,
    pub analyst_note: String,
    #[serde(default)]
    pub risk_flags: Vec<String>,
}

/// Usage accounting attached to every result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub provider_calls: u32,
    pub latency_ms: u64,
    pub cache_hit: bool,
}

/// Output of a provider (or of the fallback chain on its behalf)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub items: Vec<ContentItem>,
    pub summary: Summary,
    pub usage: Usage,
    /// Name of the adapter that produced this result
    pub provider: String,
    /// Set when the terminal stand-in produced the result
    #[serde(default)]
    pub degraded: bool,
}

impl GenerationResult {
    pub fn with_cache_hit(mut self, cache_hit: bool) -> Self {
        self.usage.cache_hit = cache_hit;
        self
    }
}
