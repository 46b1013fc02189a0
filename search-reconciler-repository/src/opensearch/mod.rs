//! OpenSearch implementation of the search backend.
//!
//! This module provides a concrete implementation of `SearchBackend`
//! using OpenSearch, together with the conversation index mapping.

mod index_config;
mod provider;

pub use index_config::{
    get_create_index_body, get_index_settings, get_versioned_index_name, IndexConfig,
    DEFAULT_INDEX_ALIAS,
};
pub use provider::OpenSearchProvider;
