//! # 버전(Version) 라우트 핸들러
//!
//! ## 엔드포인트
//! - `GET  /api/v1/documents/{id}/versions` → 문서가 속한 계보 전체 (버전 오름차순)
//! - `POST /api/v1/documents/{id}/versions` → `{id}`를 부모로 새 버전 분기
//!
//! 분기는 부모의 저장된 내용을 건드리지 않습니다.
//! 이미 후속 버전이 있는 부모에서 분기하면 409 Conflict입니다.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use super::documents::AppState;
use crate::{
    error::AppError,
    models::{BranchRequest, Document, DocumentVersionSummary},
};

pub async fn list_document_versions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let lineage = state.versions.lineage(&id).await?;
    let head = lineage.last().map(|d| d.id.clone());
    let versions: Vec<DocumentVersionSummary> = lineage.iter().map(Into::into).collect();
    Ok(Json(json!({ "versions": versions, "head": head })))
}

/// 요청 본문의 `content`로 새 버전을 만듭니다. 성공 시 HTTP 201 Created.
pub async fn create_version(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<BranchRequest>,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let parent = state.versions.load(&id).await?;
    let document = state
        .versions
        .branch(&parent.project_id, &parent.id, &req.content)
        .await?;
    Ok((StatusCode::CREATED, Json(document)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_state;

    #[tokio::test]
    async fn branch_and_list_lineage() {
        let state = test_state();
        let v1 = state
            .versions
            .create_root("p1", Some("Essay"), "Draft")
            .await
            .unwrap();

        let (status, Json(v2)) = create_version(
            State(state.clone()),
            Path(v1.id.clone()),
            Json(BranchRequest {
                content: "Second draft".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(v2.version, 2);
        assert_eq!(v2.title, "Essay v2");

        let Json(body) = list_document_versions(State(state.clone()), Path(v1.id.clone()))
            .await
            .unwrap();
        let versions = body["versions"].as_array().unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0]["version"], 1);
        assert_eq!(versions[1]["parent_version_id"], v1.id.as_str());
        assert_eq!(body["head"], v2.id.as_str());
        assert!(versions[0].get("content").is_none());
    }

    #[tokio::test]
    async fn stale_parent_is_a_conflict() {
        let state = test_state();
        let v1 = state
            .versions
            .create_root("p1", Some("Essay"), "Draft")
            .await
            .unwrap();
        state.versions.branch("p1", &v1.id, "v2").await.unwrap();

        let err = create_version(
            State(state),
            Path(v1.id),
            Json(BranchRequest {
                content: "again".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn unknown_parent_is_not_found() {
        let err = list_document_versions(State(test_state()), Path("nope".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }
}
