use serde::{Deserialize, Serialize};

/// 버전 관리되는 문서 한 건: `documents` 테이블 한 행에 대응합니다.
///
/// 같은 `(project_id, base_title)`을 공유하는 문서들이 하나의 계보(lineage)를 이룹니다.
/// 계보의 루트는 `version = 1`, `parent_version_id = None`이고,
/// 그 외 버전은 부모 버전보다 정확히 1 큰 번호를 가집니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub id: String,
    /// 소속 프로젝트. 문서는 프로젝트 사이를 이동하지 않습니다.
    pub project_id: String,
    /// 계보 이름. 계보 안의 모든 버전에서 동일합니다.
    pub base_title: String,
    /// 표시용 제목 (루트가 아니면 `"{base_title} v{version}"`)
    pub title: String,
    pub version: i64,
    pub parent_version_id: Option<String>,
    /// 직렬화된 리치 텍스트. 코어는 내용을 해석하지 않습니다.
    pub content: String,
    pub created_at: String,
    pub modified_at: String,
}

impl Document {
    pub fn is_root(&self) -> bool {
        self.parent_version_id.is_none()
    }

    /// 같은 계보에 속하는지 확인합니다.
    pub fn shares_lineage(&self, other: &Document) -> bool {
        self.project_id == other.project_id && self.base_title == other.base_title
    }
}

/// 루트가 아닌 버전의 표시 제목을 만듭니다.
pub fn version_title(base_title: &str, version: i64) -> String {
    format!("{} v{}", base_title, version)
}

/// 새 계보(버전 1) 생성 요청: `POST /api/v1/documents`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDocumentRequest {
    pub project_id: String,
    pub title: Option<String>,
    pub content: Option<String>,
}

/// 제자리 저장(in-place save) 패치: `PATCH /api/v1/documents/{id}`
///
/// None인 필드는 변경하지 않습니다. `version`과 `parent_version_id`는 절대 바뀌지 않습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPatch {
    pub content: Option<String>,
    pub title: Option<String>,
}

impl DocumentPatch {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            title: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.title.is_none()
    }
}

/// 새 버전 생성 요청: `POST /api/v1/documents/{id}/versions`
#[derive(Debug, Clone, Deserialize)]
pub struct BranchRequest {
    pub content: String,
}

/// `GET /api/v1/documents?project_id=...`
#[derive(Debug, Default, Deserialize)]
pub struct ListDocumentsQuery {
    pub project_id: Option<String>,
}
