//! Message shapes and batch (de)serialization (spec §4.6).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CodecError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateData {
    pub id: i64,
    #[serde(rename = "parentId")]
    pub parent_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nowatch: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unbound: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateData {
    #[serde(rename = "varId")]
    pub var_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VarIdData {
    #[serde(rename = "varId")]
    pub var_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorData {
    #[serde(rename = "varId", default, skip_serializing_if = "Option::is_none")]
    pub var_id: Option<i64>,
    pub code: String,
    pub description: String,
}

/// One wire message: `{"type": ..., "data": ...}` (spec §4.6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Message {
    Create(CreateData),
    Destroy(VarIdData),
    Update(UpdateData),
    Watch(VarIdData),
    Unwatch(VarIdData),
    Error(ErrorData),
}

impl Message {
    pub fn error(var_id: Option<i64>, code: impl Into<String>, description: impl Into<String>) -> Message {
        Message::Error(ErrorData {
            var_id,
            code: code.into(),
            description: description.into(),
        })
    }
}

/// One entry of an incoming batch frame: either the `{"userEvent": bool}`
/// sentinel or an ordinary message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum BatchEntry {
    UserEventFlag {
        #[serde(rename = "userEvent")]
        user_event: bool,
    },
    Msg(Message),
}

/// A decoded incoming WebSocket frame: either one bare message object or a
/// JSON array, optionally led by the `userEvent` sentinel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum Frame {
    Batch(Vec<BatchEntry>),
    Single(Message),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedBatch {
    pub user_event: bool,
    pub messages: Vec<Message>,
}

pub fn decode_frame(raw: &str) -> Result<DecodedBatch, CodecError> {
    let frame: Frame =
        serde_json::from_str(raw).map_err(|e| CodecError::BadMessage(e.to_string()))?;
    Ok(match frame {
        Frame::Single(msg) => DecodedBatch {
            user_event: false,
            messages: vec![msg],
        },
        Frame::Batch(entries) => {
            let mut user_event = false;
            let mut messages = Vec::with_capacity(entries.len());
            for (i, entry) in entries.into_iter().enumerate() {
                match entry {
                    BatchEntry::UserEventFlag { user_event: flag } if i == 0 => {
                        user_event = flag;
                    }
                    BatchEntry::UserEventFlag { user_event: flag } => {
                        // Tolerate a stray sentinel anywhere, but only position
                        // 0 is meaningful per spec; later ones are dropped.
                        let _ = flag;
                    }
                    BatchEntry::Msg(msg) => messages.push(msg),
                }
            }
            DecodedBatch { user_event, messages }
        }
    })
}

/// Encodes an outbound batch: a single object if there is exactly one
/// message, otherwise a JSON array (spec §4.8 flush algorithm, step 3).
pub fn encode_messages(messages: &[Message]) -> Result<String, CodecError> {
    let value = if messages.len() == 1 {
        serde_json::to_value(&messages[0])
    } else {
        serde_json::to_value(messages)
    }
    .map_err(|e| CodecError::BadMessage(e.to_string()))?;
    serde_json::to_string(&value).map_err(|e| CodecError::BadMessage(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_messages() -> Vec<Message> {
        vec![
            Message::Create(CreateData {
                id: 7,
                parent_id: 1,
                value: None,
                properties: Some(BTreeMap::from([("path".to_string(), "contacts".to_string())])),
                nowatch: None,
                unbound: None,
            }),
            Message::Update(UpdateData {
                var_id: 7,
                value: Some(json!({"obj": -1})),
                properties: None,
            }),
            Message::Watch(VarIdData { var_id: 7 }),
            Message::Unwatch(VarIdData { var_id: 7 }),
            Message::Destroy(VarIdData { var_id: 7 }),
            Message::error(Some(7), "not-found", "no such variable"),
        ]
    }

    #[test]
    fn single_message_round_trips() {
        for msg in sample_messages() {
            let encoded = encode_messages(std::slice::from_ref(&msg)).unwrap();
            let decoded = decode_frame(&encoded).unwrap();
            assert_eq!(decoded.messages, vec![msg]);
            assert!(!decoded.user_event);
        }
    }

    #[test]
    fn batch_round_trips() {
        let messages = sample_messages();
        let encoded = encode_messages(&messages).unwrap();
        let decoded = decode_frame(&encoded).unwrap();
        assert_eq!(decoded.messages, messages);
    }

    #[test]
    fn user_event_sentinel_is_parsed_from_position_zero() {
        let raw = r#"[{"userEvent":true},{"type":"watch","data":{"varId":1}}]"#;
        let decoded = decode_frame(raw).unwrap();
        assert!(decoded.user_event);
        assert_eq!(decoded.messages, vec![Message::Watch(VarIdData { var_id: 1 })]);
    }

    #[test]
    fn user_event_only_frame_flushes_with_no_messages() {
        let raw = r#"[{"userEvent":true}]"#;
        let decoded = decode_frame(raw).unwrap();
        assert!(decoded.user_event);
        assert!(decoded.messages.is_empty());
    }
}
