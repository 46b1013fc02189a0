//! Assembly of conversation index documents from the upstream collaborators.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use search_reconciler_shared::{ConversationDocument, IndexDocument, LastMessage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::collaborators::{
    ConversationRecord, ConversationSource, EnrollmentDirectory, IdentityDirectory,
    LocationDirectory,
};
use crate::errors::ReconcileError;

/// Builds complete index documents by joining the canonical conversations
/// with membership, enrollment and location data.
///
/// Assembly is all-or-nothing: if any collaborator call fails, no document
/// is returned. Each collaborator is called at most once per invocation,
/// with the distinct keys of all requested conversations.
///
/// When a collaborator returns several records for one key, the first one
/// is used and the rest are ignored. Membership is the exception: members
/// from every record of a conversation are merged.
pub struct SourceAssembler {
    conversations: Arc<dyn ConversationSource>,
    identity: Arc<dyn IdentityDirectory>,
    enrollment: Arc<dyn EnrollmentDirectory>,
    locations: Arc<dyn LocationDirectory>,
}

impl SourceAssembler {
    pub fn new(
        conversations: Arc<dyn ConversationSource>,
        identity: Arc<dyn IdentityDirectory>,
        enrollment: Arc<dyn EnrollmentDirectory>,
        locations: Arc<dyn LocationDirectory>,
    ) -> Self {
        Self {
            conversations,
            identity,
            enrollment,
            locations,
        }
    }

    /// Assemble one document per requested id that still exists.
    ///
    /// Documents come back in request order. Ids missing from the canonical
    /// source are omitted without error.
    #[instrument(skip(self, ids, cancel), fields(requested = ids.len()))]
    pub async fn assemble(
        &self,
        ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<IndexDocument>, ReconcileError> {
        let ids = distinct(ids.iter().map(String::as_str));
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let records = until_cancelled(cancel, async {
            self.conversations
                .get_by_ids(&ids)
                .await
                .map_err(|e| ReconcileError::upstream("conversations", e))
        })
        .await?;

        let mut by_id: HashMap<&str, &ConversationRecord> = HashMap::with_capacity(records.len());
        for record in &records {
            by_id.entry(record.conversation_id.as_str()).or_insert(record);
        }

        let found: Vec<&ConversationRecord> = ids
            .iter()
            .filter_map(|id| by_id.get(id.as_str()).copied())
            .collect();
        if found.is_empty() {
            debug!("No requested conversation exists");
            return Ok(Vec::new());
        }

        let conversation_ids = distinct(found.iter().map(|r| r.conversation_id.as_str()));
        let student_ids = distinct(found.iter().filter_map(|r| r.student_id.as_deref()));
        let location_ids = distinct(
            found
                .iter()
                .flat_map(|r| r.location_ids.iter().map(String::as_str)),
        );

        let (members, enrollments, locations) = until_cancelled(cancel, async {
            tokio::try_join!(
                async {
                    if conversation_ids.is_empty() {
                        return Ok(Vec::new());
                    }
                    self.identity
                        .get_by_ids(&conversation_ids)
                        .await
                        .map_err(|e| ReconcileError::upstream("identity", e))
                },
                async {
                    if student_ids.is_empty() {
                        return Ok(Vec::new());
                    }
                    self.enrollment
                        .get_by_ids(&student_ids)
                        .await
                        .map_err(|e| ReconcileError::upstream("enrollment", e))
                },
                async {
                    if location_ids.is_empty() {
                        return Ok(Vec::new());
                    }
                    self.locations
                        .get_by_ids(&location_ids)
                        .await
                        .map_err(|e| ReconcileError::upstream("location", e))
                },
            )
        })
        .await?;

        let mut members_by_conversation: HashMap<&str, Vec<String>> = HashMap::new();
        for record in &members {
            let merged = members_by_conversation
                .entry(record.conversation_id.as_str())
                .or_default();
            for user_id in &record.user_ids {
                if !merged.contains(user_id) {
                    merged.push(user_id.clone());
                }
            }
        }

        let mut courses_by_student: HashMap<&str, &[String]> = HashMap::new();
        for record in &enrollments {
            courses_by_student
                .entry(record.student_id.as_str())
                .or_insert(record.course_ids.as_slice());
        }

        let mut path_by_location: HashMap<&str, &str> = HashMap::new();
        for record in &locations {
            path_by_location
                .entry(record.location_id.as_str())
                .or_insert(record.access_path.as_str());
        }

        let documents: Vec<IndexDocument> = found
            .into_iter()
            .map(|record| {
                let course_ids = record
                    .student_id
                    .as_deref()
                    .and_then(|student| courses_by_student.get(student))
                    .map(|courses| courses.to_vec())
                    .unwrap_or_default();

                let access_paths = distinct(
                    record
                        .location_ids
                        .iter()
                        .filter_map(|location| path_by_location.get(location.as_str()).copied()),
                );

                let document = ConversationDocument {
                    conversation_id: record.conversation_id.clone(),
                    conversation_name_english: record.name.clone(),
                    conversation_name_japanese: record.name.clone(),
                    course_ids,
                    user_ids: members_by_conversation
                        .remove(record.conversation_id.as_str())
                        .unwrap_or_default(),
                    last_message: LastMessage {
                        updated_at: record.last_message_at,
                    },
                    is_replied: record.is_replied,
                    owner: record.owner.clone(),
                    conversation_type: record.conversation_type.clone(),
                    access_paths,
                };
                IndexDocument::new(record.resource_path.clone(), document)
            })
            .collect();

        debug!(
            assembled = documents.len(),
            students = student_ids.len(),
            locations = location_ids.len(),
            "Assembled conversation documents"
        );
        Ok(documents)
    }
}

/// Distinct values in first-seen order.
fn distinct<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(*value))
        .map(str::to_string)
        .collect()
}

async fn until_cancelled<T>(
    cancel: &CancellationToken,
    work: impl Future<Output = Result<T, ReconcileError>>,
) -> Result<T, ReconcileError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ReconcileError::cancelled("assembly cancelled")),
        result = work => result,
    }
}
