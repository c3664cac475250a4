//! # 문서(Document) 라우트 핸들러
//!
//! 계보 루트 생성, 조회, 제자리 저장, 삭제를 처리하는 HTTP 핸들러 함수들입니다.
//!
//! ## 엔드포인트
//! - `GET    /api/v1/documents?project_id=` → 문서 목록 조회 (최근 수정 순)
//! - `POST   /api/v1/documents`             → 새 계보(버전 1) 생성
//! - `GET    /api/v1/documents/{id}`        → 단일 문서 조회
//! - `PATCH  /api/v1/documents/{id}`        → 제자리 저장 (버전 번호 유지)
//! - `DELETE /api/v1/documents/{id}`        → 문서 삭제
//!
//! 모든 쓰기는 `VersionStore`를 거칩니다. 핸들러는 `VersionError`를 `?`로 올려보내고
//! `AppError`의 `From` 구현이 HTTP 상태 코드로 바꿉니다.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{
    db::DocumentStore,
    error::AppError,
    models::*,
    services::{pagination::PageGeometry, version_store::VersionStore},
};

/// 애플리케이션 공유 상태
///
/// 모든 요청 핸들러가 `State(state): State<AppState>`로 접근합니다.
/// Axum의 State Extractor는 요청마다 clone하므로 무거운 값은 `Arc`로 감쌉니다.
#[derive(Clone)]
pub struct AppState {
    /// 버전 계보 관리 (내부에 저장소 트레이트 객체를 들고 있음)
    pub versions: Arc<VersionStore>,
    /// 페이지 레이아웃 계산에 쓰는 100% 기준 페이지 기하
    pub geometry: PageGeometry,
}

/// `GET /documents`: 문서 목록을 조회합니다.
///
/// `project_id` 쿼리가 있으면 해당 프로젝트의 문서만 반환합니다.
pub async fn list_documents(
    State(state): State<AppState>,
    Query(query): Query<ListDocumentsQuery>,
) -> Result<Json<Value>, AppError> {
    let documents = state
        .versions
        .store()
        .list_documents(query.project_id.as_deref())
        .await?;
    Ok(Json(json!({ "documents": documents })))
}

/// `GET /documents/{id}`: 단일 문서를 조회합니다.
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, AppError> {
    let document = state.versions.load(&id).await?;
    Ok(Json(document))
}

/// `POST /documents`: 새 계보의 루트(버전 1)를 생성합니다.
///
/// 제목이 없으면 "Untitled", "Untitled 2", ... 중 비어 있는 이름을 씁니다.
/// 성공 시 HTTP 201 Created와 생성된 문서를 반환합니다.
pub async fn create_document(
    State(state): State<AppState>,
    Json(req): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let project_id = req.project_id.trim();
    if project_id.is_empty() {
        return Err(AppError::BadRequest("project_id is required".to_string()));
    }

    let document = state
        .versions
        .create_root(
            project_id,
            req.title.as_deref(),
            req.content.as_deref().unwrap_or(""),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(document)))
}

/// `PATCH /documents/{id}`: 현재 버전을 제자리 저장합니다.
///
/// 요청 본문에 포함된 필드(`content`, `title`)만 덮어씁니다.
/// `version`과 `parent_version_id`는 바뀌지 않습니다.
pub async fn update_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<DocumentPatch>,
) -> Result<Json<Document>, AppError> {
    if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(AppError::BadRequest("title must not be empty".to_string()));
    }
    let document = state.versions.save_in_place(&id, &patch).await?;
    Ok(Json(document))
}

/// `DELETE /documents/{id}`: 계보의 최신 버전을 삭제합니다.
///
/// 후속 버전이 있는 버전은 409 Conflict입니다.
/// 성공 시 HTTP 204 No Content를 반환합니다.
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.versions.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
