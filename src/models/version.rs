use serde::{Deserialize, Serialize};

use super::Document;

/// 저장소에 넘기는 새 버전 레코드.
///
/// 버전 번호와 제목은 `VersionStore`가 부모를 읽은 뒤 계산해서 채웁니다.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub project_id: String,
    pub parent_id: String,
    pub base_title: String,
    pub title: String,
    pub version: i64,
    pub content: String,
}

/// 버전 목록 화면용 요약 (내용 제외)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentVersionSummary {
    pub id: String,
    pub title: String,
    pub version: i64,
    pub parent_version_id: Option<String>,
    pub created_at: String,
    pub modified_at: String,
}

impl From<&Document> for DocumentVersionSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            title: doc.title.clone(),
            version: doc.version,
            parent_version_id: doc.parent_version_id.clone(),
            created_at: doc.created_at.clone(),
            modified_at: doc.modified_at.clone(),
        }
    }
}
