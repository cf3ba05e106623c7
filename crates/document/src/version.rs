use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DocumentError, DocumentId, Result, VersionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionType {
    Original,
    AiDraft,
    ManualTranslation,
    Final,
}

impl VersionType {
    /// Editable pane precedence, highest first.
    pub const EDIT_PRECEDENCE: [VersionType; 3] = [
        VersionType::ManualTranslation,
        VersionType::AiDraft,
        VersionType::Original,
    ];

    /// Namespace used when segmenting content of this type.
    pub fn namespace(self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::AiDraft => "ai-draft",
            Self::ManualTranslation => "manual",
            Self::Final => "final",
        }
    }
}

/// Immutable version record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentVersion {
    pub id: VersionId,
    pub document_id: DocumentId,
    pub version_number: u32,
    pub version_type: VersionType,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl DocumentVersion {
    pub fn new(
        document_id: DocumentId,
        version_number: u32,
        version_type: VersionType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: VersionId::new(),
            document_id,
            version_number,
            version_type,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Highest numbered version of one type.
pub fn latest_of(versions: &[DocumentVersion], version_type: VersionType) -> Option<&DocumentVersion> {
    versions
        .iter()
        .filter(|v| v.version_type == version_type)
        .max_by_key(|v| v.version_number)
}

/// Version the editable pane operates on:
/// MANUAL_TRANSLATION, then AI_DRAFT, then ORIGINAL.
pub fn select_editable_version(versions: &[DocumentVersion]) -> Option<&DocumentVersion> {
    VersionType::EDIT_PRECEDENCE
        .iter()
        .find_map(|t| latest_of(versions, *t))
}

/// Versions shown in the panes of one editing screen.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionSet {
    pub original: DocumentVersion,
    /// Absent documents get a two-pane layout.
    pub ai_draft: Option<DocumentVersion>,
    pub editable: DocumentVersion,
}

impl VersionSet {
    pub fn resolve(document_id: &DocumentId, versions: &[DocumentVersion]) -> Result<Self> {
        let editable = select_editable_version(versions)
            .ok_or_else(|| DocumentError::VersionNotFound(document_id.clone()))?;
        if editable.content.trim().is_empty() {
            return Err(DocumentError::EmptyDocument(document_id.clone()));
        }
        let original = latest_of(versions, VersionType::Original)
            .unwrap_or(editable)
            .clone();
        Ok(Self {
            original,
            ai_draft: latest_of(versions, VersionType::AiDraft).cloned(),
            editable: editable.clone(),
        })
    }

    pub fn pane_count(&self) -> usize {
        if self.ai_draft.is_some() {
            3
        } else {
            2
        }
    }
}
