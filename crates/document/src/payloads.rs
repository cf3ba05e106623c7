/// Request and response bodies of the translation REST surface.
use serde::{Deserialize, Serialize};

use crate::{CompletedParagraphs, DocumentError, Result, UserRef, VersionType};

/// `POST /documents/{id}/versions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVersionRequest {
    pub version_type: VersionType,
    pub content: String,
}

/// Body of `save` and `complete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub content: String,
    pub completed_paragraphs: Vec<usize>,
}

impl SaveRequest {
    pub fn new(content: impl Into<String>, completed: &CompletedParagraphs) -> Self {
        Self {
            content: content.into(),
            completed_paragraphs: completed.to_vec(),
        }
    }
}

/// `POST /translation-work/{id}/handover`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoverRequest {
    pub memo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms: Option<String>,
}

impl HandoverRequest {
    /// Fails on a blank memo. A blank terms note counts as absent.
    pub fn new(memo: impl Into<String>, terms: Option<String>) -> Result<Self> {
        let memo = memo.into().trim().to_string();
        if memo.is_empty() {
            return Err(DocumentError::EmptyMemo);
        }
        let terms = terms
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Ok(Self { memo, terms })
    }

    pub fn validate(&self) -> Result<()> {
        if self.memo.trim().is_empty() {
            Err(DocumentError::EmptyMemo)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }
}

/// Error body returned with non-success statuses. Conflicts carry the
/// current lease holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holder: Option<UserRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handover_requires_memo() {
        assert_eq!(HandoverRequest::new("  ", None), Err(DocumentError::EmptyMemo));
        let request = HandoverRequest::new(" chapter 3 left ", Some(" ".into())).unwrap();
        assert_eq!(request.memo, "chapter 3 left");
        assert_eq!(request.terms, None);
    }

    #[test]
    fn test_save_request_shape() {
        let completed: CompletedParagraphs = [3, 1].into_iter().collect();
        let json = serde_json::to_value(SaveRequest::new("<p>x</p>", &completed)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "content": "<p>x</p>", "completedParagraphs": [1, 3] })
        );
    }

    #[test]
    fn test_handover_omits_missing_terms() {
        let request = HandoverRequest::new("memo", None).unwrap();
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({ "memo": "memo" })
        );
    }
}
