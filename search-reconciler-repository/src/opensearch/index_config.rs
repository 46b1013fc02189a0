//! OpenSearch index configuration and mappings.
//!
//! This module defines the index settings and mappings for the conversation
//! search index.

use serde_json::{json, Value};

/// Default alias every read and write goes through.
pub const DEFAULT_INDEX_ALIAS: &str = "conversations";

/// Configuration for the search index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// The alias name for the search index (used for all operations).
    pub alias: String,
    /// The version number for the index (e.g., 0 for "conversations_v0").
    pub version: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX_ALIAS, 0)
    }
}

impl IndexConfig {
    /// Create a new index configuration.
    ///
    /// # Arguments
    ///
    /// * `alias` - The index alias name
    /// * `version` - The version number
    pub fn new(alias: impl Into<String>, version: u32) -> Self {
        Self {
            alias: alias.into(),
            version,
        }
    }

    /// The concrete index name behind the alias.
    pub fn versioned_name(&self) -> String {
        get_versioned_index_name(&self.alias, self.version)
    }

    /// The configuration of the next index version, under the same alias.
    pub fn next_version(&self) -> Self {
        Self::new(self.alias.clone(), self.version + 1)
    }
}

/// Get the versioned index name.
///
/// # Returns
///
/// The versioned index name (e.g., "conversations_v0")
pub fn get_versioned_index_name(alias: &str, version: u32) -> String {
    format!("{}_v{}", alias, version)
}

/// Get the index settings and mappings for the conversation search index.
///
/// - **resource_path**, **access_paths**, ids and enum fields are keywords,
///   used only for exact filtering
/// - **conversation_name** carries one text sub-field per language, each with
///   a raw keyword for exact matches
/// - **last_message.updated_at** is the primary sort key
pub fn get_index_settings() -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        },
        "mappings": {
            "properties": {
                "resource_path": {
                    "type": "keyword"
                },
                "conversation_id": {
                    "type": "keyword"
                },
                "conversation_name": {
                    "properties": {
                        "english": {
                            "type": "text",
                            "fields": {
                                "raw": {
                                    "type": "keyword"
                                }
                            }
                        },
                        "japanese": {
                            "type": "text",
                            "fields": {
                                "raw": {
                                    "type": "keyword"
                                }
                            }
                        }
                    }
                },
                "conversation_type": {
                    "type": "keyword"
                },
                "owner": {
                    "type": "keyword"
                },
                "user_ids": {
                    "type": "keyword"
                },
                "course_ids": {
                    "type": "keyword"
                },
                "access_paths": {
                    "type": "keyword"
                },
                "is_replied": {
                    "type": "boolean"
                },
                "last_message": {
                    "properties": {
                        "updated_at": {
                            "type": "date"
                        }
                    }
                }
            }
        }
    })
}

/// Body of the create-index request: settings, mappings and, when
/// `attach_alias` is set, the alias.
pub fn get_create_index_body(config: &IndexConfig, attach_alias: bool) -> Value {
    let mut body = get_index_settings();
    if attach_alias {
        body["aliases"] = json!({ config.alias.as_str(): {} });
    }
    body
}
