//! Upstream collaborator interfaces.
//!
//! Every collaborator is a narrow, batched, constructor-injected dependency.
//! None of them promises one record per requested id: a missing id is
//! simply absent from the result.

mod records;

use async_trait::async_trait;

use crate::errors::UpstreamError;

pub use records::{ConversationRecord, EnrollmentRecord, LocationRecord, MemberRecord};

/// Source of truth for conversations.
#[async_trait]
pub trait ConversationSource: Send + Sync {
    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<ConversationRecord>, UpstreamError>;
}

/// Conversation membership, keyed by conversation id.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn get_by_ids(
        &self,
        conversation_ids: &[String],
    ) -> Result<Vec<MemberRecord>, UpstreamError>;
}

/// Course enrollments, keyed by student id.
#[async_trait]
pub trait EnrollmentDirectory: Send + Sync {
    async fn get_by_ids(&self, student_ids: &[String]) -> Result<Vec<EnrollmentRecord>, UpstreamError>;
}

/// Resolved location access paths, keyed by location id.
#[async_trait]
pub trait LocationDirectory: Send + Sync {
    async fn get_by_ids(&self, location_ids: &[String]) -> Result<Vec<LocationRecord>, UpstreamError>;
}

/// Feature flag lookups.
#[async_trait]
pub trait FeatureFlags: Send + Sync {
    async fn is_enabled(&self, flag: &str) -> Result<bool, UpstreamError>;
}

/// Flag provider with every flag switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFeatureFlags;

#[async_trait]
impl FeatureFlags for NoFeatureFlags {
    async fn is_enabled(&self, _flag: &str) -> Result<bool, UpstreamError> {
        Ok(false)
    }
}
