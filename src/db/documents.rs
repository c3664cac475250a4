//! # 문서 데이터베이스 쿼리 모듈
//!
//! `documents` 테이블에 대한 생성/조회/제자리 저장/삭제 쿼리입니다.
//! 모든 함수는 `async`이며 `SqlitePool`을 빌려서(borrow) 사용합니다.
//! 버전 번호 할당과 계보 조회는 `versions` 모듈에 있습니다.

use super::now_timestamp;
use crate::error::StoreError;
use crate::models::*;
use sqlx::SqlitePool;

/// 모든 SELECT가 공유하는 컬럼 목록 (`Document`의 필드 순서와 같음)
pub(crate) const DOCUMENT_COLUMNS: &str =
    "id, project_id, base_title, title, version, parent_version_id, content, created_at, modified_at";

/// 문서 목록을 조회합니다. 최근 수정된 문서가 먼저 옵니다.
///
/// `project_id`가 None이면 모든 프로젝트의 문서를 반환합니다.
pub async fn list_documents(
    pool: &SqlitePool,
    project_id: Option<&str>,
) -> Result<Vec<Document>, StoreError> {
    let docs = if let Some(pid) = project_id {
        sqlx::query_as::<_, Document>(&format!(
            "SELECT {} FROM documents WHERE project_id = ? ORDER BY modified_at DESC",
            DOCUMENT_COLUMNS
        ))
        .bind(pid)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as::<_, Document>(&format!(
            "SELECT {} FROM documents ORDER BY modified_at DESC",
            DOCUMENT_COLUMNS
        ))
        .fetch_all(pool)
        .await?
    };

    Ok(docs)
}

/// ID로 단일 문서를 조회합니다.
///
/// - `Ok(Some(Document))`: 문서를 찾은 경우
/// - `Ok(None)`: 해당 ID의 문서가 없는 경우
pub async fn get_document(pool: &SqlitePool, id: &str) -> Result<Option<Document>, StoreError> {
    let doc = sqlx::query_as::<_, Document>(&format!(
        "SELECT {} FROM documents WHERE id = ?",
        DOCUMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(doc)
}

/// 새 계보의 루트(버전 1) 문서를 생성합니다.
///
/// `base_title`과 `title`은 같은 값으로 시작합니다.
pub async fn create_document(
    pool: &SqlitePool,
    project_id: &str,
    title: &str,
    content: &str,
) -> Result<Document, StoreError> {
    let id = uuid::Uuid::now_v7().to_string();
    let now = now_timestamp();

    sqlx::query(
        r#"
        INSERT INTO documents (id, project_id, base_title, title, version, parent_version_id,
                               content, created_at, modified_at)
        VALUES (?, ?, ?, ?, 1, NULL, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(project_id)
    .bind(title)
    .bind(title)
    .bind(content)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .map_err(super::classify_write_error)?;

    get_document(pool, &id)
        .await?
        .ok_or_else(|| StoreError::Unavailable("Failed to retrieve created document".to_string()))
}

/// 현재 버전의 내용/제목을 덮어씁니다 (제자리 저장).
///
/// 패치에 포함된 필드만 바꾸고 `modified_at`을 갱신합니다.
/// `version`, `parent_version_id`, `base_title`은 건드리지 않습니다.
///
/// - `Ok(None)`: 해당 ID의 문서가 없음
pub async fn save_in_place(
    pool: &SqlitePool,
    id: &str,
    patch: &DocumentPatch,
) -> Result<Option<Document>, StoreError> {
    let now = now_timestamp();

    // 패치에 있는 필드만 SET 절에 넣습니다.
    let mut query = String::from("UPDATE documents SET modified_at = ?");
    let mut bindings: Vec<&str> = vec![now.as_str()];

    if let Some(content) = &patch.content {
        query.push_str(", content = ?");
        bindings.push(content.as_str());
    }

    if let Some(title) = &patch.title {
        query.push_str(", title = ?");
        bindings.push(title.as_str());
    }

    query.push_str(" WHERE id = ?");
    bindings.push(id);

    let mut query_builder = sqlx::query(&query);
    for binding in bindings {
        query_builder = query_builder.bind(binding);
    }

    let result = query_builder.execute(pool).await?;
    if result.rows_affected() == 0 {
        return Ok(None);
    }

    get_document(pool, id).await
}

/// 문서를 삭제합니다.
///
/// 이 문서에서 분기된 버전이 있으면 외래 키 위반으로 `StoreError::Conflict`입니다.
pub async fn delete_document(pool: &SqlitePool, id: &str) -> Result<bool, StoreError> {
    let result = sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(super::classify_write_error)?;

    Ok(result.rows_affected() > 0)
}
