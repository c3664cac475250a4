//! # 라우트 핸들러 모듈
//!
//! HTTP 요청을 처리하는 핸들러 함수들을 모아둔 모듈입니다.
//!
//! 각 하위 모듈:
//! - `documents`: 문서 생성/조회/제자리 저장/삭제 핸들러와 `AppState`
//! - `versions`: 계보 조회와 새 버전 분기
//! - `layout`: 페이지 레이아웃 계산
//! - `health`: 서버 상태 확인 (헬스체크)

pub mod documents;
pub mod health;
pub mod layout;
pub mod versions;

use axum::{routing::get, Router};

pub use documents::*;
pub use health::*;
pub use layout::*;
pub use versions::*;

/// `/api/v1` 아래에 붙는 API 라우터
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/documents", get(list_documents).post(create_document))
        .route(
            "/documents/{id}",
            get(get_document)
                .patch(update_document)
                .delete(delete_document),
        )
        .route(
            "/documents/{id}/versions",
            get(list_document_versions).post(create_version),
        )
        .route("/layout", get(get_layout))
        .route("/health", get(health_check))
        .with_state(state)
}
