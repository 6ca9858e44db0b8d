//! Frames sent back by the consumer.

use crate::{DispatchError, DispatchResult};
use serde::Deserialize;

/// An acknowledgment from the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerFrame {
    /// `{"type":"ack","id":"..."}`; the id may be omitted.
    Ack { id: Option<String> },
    /// `{"action":"commit"}` or `{"type":"commit"}` from older consumers.
    /// Acknowledges the oldest in-flight event.
    Commit,
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: Option<String>,
    action: Option<String>,
    id: Option<String>,
}

impl ConsumerFrame {
    pub fn parse(text: &str) -> DispatchResult<Self> {
        let raw: RawFrame = serde_json::from_str(text)?;
        match (raw.kind.as_deref(), raw.action.as_deref()) {
            (Some("ack"), _) => Ok(Self::Ack { id: raw.id }),
            (Some("commit"), _) | (_, Some("commit")) => Ok(Self::Commit),
            _ => Err(DispatchError::UnsupportedFrame(text.to_string())),
        }
    }

    /// The id to acknowledge, if the frame named one.
    pub fn ack_id(&self) -> Option<&str> {
        match self {
            Self::Ack { id } => id.as_deref(),
            Self::Commit => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ack_with_id() {
        let frame = ConsumerFrame::parse(r#"{"type":"ack","id":"abc"}"#).unwrap();
        assert_eq!(frame.ack_id(), Some("abc"));
    }

    #[test]
    fn test_parse_ack_without_id() {
        let frame = ConsumerFrame::parse(r#"{"type":"ack"}"#).unwrap();
        assert_eq!(frame, ConsumerFrame::Ack { id: None });
    }

    #[test]
    fn test_parse_legacy_commit() {
        assert_eq!(
            ConsumerFrame::parse(r#"{"action":"commit"}"#).unwrap(),
            ConsumerFrame::Commit
        );
        assert_eq!(
            ConsumerFrame::parse(r#"{"type":"commit"}"#).unwrap(),
            ConsumerFrame::Commit
        );
    }

    #[test]
    fn test_parse_rejects_other_frames() {
        assert!(matches!(
            ConsumerFrame::parse(r#"{"type":"message"}"#),
            Err(DispatchError::UnsupportedFrame(_))
        ));
        assert!(matches!(ConsumerFrame::parse("not json"), Err(DispatchError::Json(_))));
    }
}
