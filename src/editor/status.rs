//! 저장 상태 값
//!
//! 컨트롤러 경계에서 모든 저장 실패는 에러가 아니라 상태 값으로 바뀌어 UI에 전달됩니다.

use serde::Serialize;

use crate::error::VersionError;

/// 실패 종류. UI가 차단형 알림과 비차단형 표시를 구분하는 데 씁니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// 문서가 사라짐 (차단형 알림)
    NotFound,
    /// 저장소 실패 (재시도 가능)
    Persistence,
    /// 계보 검증 실패
    Validation,
    /// 같은 문서의 다른 저장이 진행 중
    InProgress,
    /// 연결된 문서가 없음
    NotBound,
}

impl FailureKind {
    /// 사용자가 확인해야 진행할 수 있는 실패인지
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::NotFound | Self::Validation)
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Persistence | Self::InProgress)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveFailure {
    pub kind: FailureKind,
    pub message: String,
    pub document_id: Option<String>,
}

impl SaveFailure {
    pub fn in_progress(document_id: &str) -> Self {
        Self {
            kind: FailureKind::InProgress,
            message: "a save is already in progress for this document".to_string(),
            document_id: Some(document_id.to_string()),
        }
    }

    pub fn not_bound() -> Self {
        Self {
            kind: FailureKind::NotBound,
            message: "no document is bound to the editor".to_string(),
            document_id: None,
        }
    }

    pub fn from_version_error(document_id: &str, err: &VersionError) -> Self {
        let kind = match err {
            VersionError::NotFound(_) => FailureKind::NotFound,
            VersionError::Persistence(_) => FailureKind::Persistence,
            VersionError::Validation(_) => FailureKind::Validation,
        };
        Self {
            kind,
            message: err.to_string(),
            document_id: Some(document_id.to_string()),
        }
    }
}

/// 명시적 저장(Save / Save as New Version)의 상태
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving {
        document_id: String,
    },
    Saved {
        document_id: String,
        version: i64,
        at: String,
    },
    Failed(SaveFailure),
}

impl SaveStatus {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }

    pub fn failure(&self) -> Option<&SaveFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// 자동 저장 표시기. 실패해도 모달로 띄우지 않는 비차단형 상태입니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AutoSaveStatus {
    #[default]
    Idle,
    /// 저장되지 않은 편집이 있고 타이머가 돌고 있음
    Pending,
    Saving,
    Saved {
        at: String,
    },
    Failed {
        message: String,
    },
}
