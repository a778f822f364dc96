//! OpenSearch index creation settings.
//!
//! Mappings are supplied per collection; this module only owns the default
//! index settings every freshly built index is created with.

use serde_json::{json, Value};

/// Default settings for every physical index.
///
/// # Sharding Configuration
///
/// - 1 primary shard
/// - 1 replica for redundancy
///
/// Reference datasets are small and rebuilt wholesale, so a single shard is
/// enough; `refresh_interval` stays at the engine default.
pub fn default_settings() -> Value {
    json!({
        "number_of_shards": 1,
        "number_of_replicas": 1,
        "max_result_window": 100000
    })
}

/// Build the index creation body from the default settings and a mapping.
///
/// # Arguments
///
/// * `mapping` - The collection's document mapping
pub fn index_body(mapping: &Value) -> Value {
    json!({
        "settings": default_settings(),
        "mappings": mapping
    })
}
