//! # 에러 처리 모듈
//!
//! 계층마다 하나씩 에러 타입을 둡니다.
//! - `StoreError`: 저장소(영속화 협력자)가 실패한 경우
//! - `VersionError`: 버전 계보 연산(`VersionStore`)의 실패 분류
//! - `AppError`: HTTP 경계. `IntoResponse`로 JSON 에러 응답이 됩니다.
//!
//! 에디터 코어는 이 에러들을 `Err`로 흘려보내지 않고
//! 컨트롤러 경계에서 `SaveStatus` 값으로 바꿉니다 (`editor::status` 참고).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// 저장소 호출 실패
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// 같은 계보에서 이미 할당된 버전 번호로 쓰려고 한 경우
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// 버전 계보 연산의 실패 분류
#[derive(Debug, Error)]
pub enum VersionError {
    /// 참조한 문서/버전이 더 이상 존재하지 않음 (동시 삭제 등)
    #[error("Document not found: {0}")]
    NotFound(String),

    /// 저장소 쓰기/읽기 실패. 재시도 가능.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// 계보 규칙 위반 (오래된 부모에서 분기, 잠긴 제목 변경 등)
    #[error("Validation error: {0}")]
    Validation(String),
}

/// HTTP 핸들러가 반환하는 에러
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Resource not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => AppError::Database(e),
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<VersionError> for AppError {
    fn from(err: VersionError) -> Self {
        match err {
            VersionError::NotFound(_) => AppError::NotFound,
            VersionError::Persistence(e) => e.into(),
            // 후속 버전이 있는 버전에 대한 쓰기는 현재 상태와의 충돌로 취급합니다.
            VersionError::Validation(msg) => AppError::Conflict(msg),
        }
    }
}

impl IntoResponse for AppError {
    /// 내부 에러(Database, IO, Internal)는 로그에만 자세히 남기고
    /// 클라이언트에는 일반 메시지만 반환합니다.
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            AppError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Io(ref e) => {
                tracing::error!("IO error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "io_error",
                    "An IO error occurred".to_string(),
                )
            }
            AppError::Conflict(ref msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_errors_map_to_http_statuses() {
        let not_found: AppError = VersionError::NotFound("doc".into()).into();
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let stale: AppError = VersionError::Validation("stale parent".into()).into();
        assert_eq!(stale.into_response().status(), StatusCode::CONFLICT);

        let down: AppError =
            VersionError::Persistence(StoreError::Unavailable("offline".into())).into();
        assert_eq!(down.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
