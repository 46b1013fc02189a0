//! Query body construction for conversation searches.

use search_reconciler_shared::{ConversationFilter, TENANT_FIELD};
use serde_json::{json, Map, Value};

const NAME_FIELDS: [&str; 2] = ["conversation_name.english", "conversation_name.japanese"];

/// Build the search request body for a filter.
///
/// The tenant term is always the first filter clause; no other input can
/// remove it. Results are ordered by last message time then conversation id,
/// both descending, which is the order [`SearchAfter`] cursors follow.
///
/// [`SearchAfter`]: search_reconciler_shared::SearchAfter
pub fn build_search_body(filter: &ConversationFilter) -> Value {
    let mut clauses = vec![json!({ "term": { TENANT_FIELD: filter.tenant.as_str() } })];

    if !filter.access_paths.is_empty() {
        clauses.push(json!({ "terms": { "access_paths": filter.access_paths } }));
    }
    if let Some(replied) = filter.replied {
        clauses.push(json!({ "term": { "is_replied": replied } }));
    }
    if !filter.owners.is_empty() {
        clauses.push(json!({ "terms": { "owner": filter.owners } }));
    }
    if !filter.course_ids.is_empty() {
        clauses.push(json!({ "terms": { "course_ids": filter.course_ids } }));
    }
    if !filter.conversation_types.is_empty() {
        clauses.push(json!({ "terms": { "conversation_type": filter.conversation_types } }));
    }

    let mut must = Vec::new();
    let mut must_not = Vec::new();

    if let Some(name) = &filter.name {
        must.push(json!({
            "multi_match": {
                "query": name,
                "fields": NAME_FIELDS,
                "operator": "and",
                "type": "most_fields"
            }
        }));
    }

    if let (Some(member_id), Some(joined)) = (&filter.member_id, filter.joined) {
        let membership = json!({ "terms": { "user_ids": [member_id] } });
        if joined {
            must.push(membership);
        } else {
            must_not.push(membership);
        }
    }

    let mut bool_query = Map::new();
    bool_query.insert("filter".to_string(), Value::Array(clauses));
    if !must.is_empty() {
        bool_query.insert("must".to_string(), Value::Array(must));
    }
    if !must_not.is_empty() {
        bool_query.insert("must_not".to_string(), Value::Array(must_not));
    }

    let mut body = json!({
        "query": { "bool": bool_query },
        "size": filter.limit,
        "sort": [
            { "last_message.updated_at": { "order": "desc" } },
            { "conversation_id": { "order": "desc" } }
        ]
    });

    if let Some(cursor) = &filter.search_after {
        body["search_after"] = json!([cursor.last_message_at_ms, cursor.conversation_id]);
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_reconciler_shared::{SearchAfter, TenantId};

    fn filter() -> ConversationFilter {
        ConversationFilter::for_tenant(TenantId::new("org-1"))
    }

    #[test]
    fn test_tenant_term_is_always_first() {
        let body = build_search_body(&filter());

        let clauses = body["query"]["bool"]["filter"].as_array().unwrap();
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0], json!({ "term": { "resource_path": "org-1" } }));
        assert!(body["query"]["bool"].get("must").is_none());
        assert!(body["query"]["bool"].get("must_not").is_none());
        assert!(body.get("search_after").is_none());
        assert_eq!(body["size"], 20);
    }

    #[test]
    fn test_full_filter() {
        let mut filter = filter()
            .with_name("some name")
            .with_access_paths(vec!["orgloc/loc1/loc3".to_string(), "orgloc/loc1/loc2".to_string()]);
        filter.member_id = Some("some id".to_string());
        filter.joined = Some(true);
        filter.replied = Some(false);
        filter.owners = vec!["school 1".to_string()];
        filter.conversation_types = vec!["student conv".to_string()];
        filter.course_ids = vec!["course 1".to_string()];

        let body = build_search_body(&filter);

        assert_eq!(
            body["query"]["bool"],
            json!({
                "filter": [
                    { "term": { "resource_path": "org-1" } },
                    { "terms": { "access_paths": ["orgloc/loc1/loc3", "orgloc/loc1/loc2"] } },
                    { "term": { "is_replied": false } },
                    { "terms": { "owner": ["school 1"] } },
                    { "terms": { "course_ids": ["course 1"] } },
                    { "terms": { "conversation_type": ["student conv"] } }
                ],
                "must": [
                    {
                        "multi_match": {
                            "query": "some name",
                            "fields": ["conversation_name.english", "conversation_name.japanese"],
                            "operator": "and",
                            "type": "most_fields"
                        }
                    },
                    { "terms": { "user_ids": ["some id"] } }
                ]
            })
        );
    }

    #[test]
    fn test_not_joined_excludes_member() {
        let mut filter = filter();
        filter.member_id = Some("user-1".to_string());
        filter.joined = Some(false);

        let body = build_search_body(&filter);

        assert_eq!(
            body["query"]["bool"]["must_not"],
            json!([{ "terms": { "user_ids": ["user-1"] } }])
        );
        assert!(body["query"]["bool"].get("must").is_none());
    }

    #[test]
    fn test_member_without_join_status_is_ignored() {
        let mut filter = filter();
        filter.member_id = Some("user-1".to_string());

        let body = build_search_body(&filter);

        assert!(body["query"]["bool"].get("must").is_none());
        assert!(body["query"]["bool"].get("must_not").is_none());
    }

    #[test]
    fn test_paging() {
        let filter = filter().with_limit(100).with_search_after(SearchAfter {
            last_message_at_ms: 1_635_403_773_651,
            conversation_id: "some id".to_string(),
        });

        let body = build_search_body(&filter);

        assert_eq!(body["size"], 100);
        assert_eq!(body["search_after"], json!([1_635_403_773_651_i64, "some id"]));
        assert_eq!(
            body["sort"],
            json!([
                { "last_message.updated_at": { "order": "desc" } },
                { "conversation_id": { "order": "desc" } }
            ])
        );
    }
}
