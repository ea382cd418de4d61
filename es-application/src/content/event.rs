use chrono::{DateTime, Utc};
use es_macros::event;
use serde_json::{Map, Value};

#[event]
pub enum ContentEvent {
    #[event(event_type = "CONTENT_CREATED_V1")]
    Created {
        content: Map<String, Value>,
        content_type: String,
    },
    #[event(event_type = "CONTENT_FIELD_UPDATED_V1")]
    FieldUpdated {
        field_name: String,
        before_value: Value,
        after_value: Value,
        created_by_id: String,
        created_by_name: String,
        updated_at: DateTime<Utc>,
    },
    #[event(event_type = "CONTENT_FIELD_COMMENT_ADDED_V1")]
    FieldCommentAdded {
        field_name: String,
        comment: String,
        created_by_id: String,
        created_by_name: String,
    },
}
