use super::documents::{get_document, DOCUMENT_COLUMNS};
use super::now_timestamp;
use crate::error::StoreError;
use crate::models::{Document, NewVersion};
use sqlx::SqlitePool;

/// 새 버전 레코드를 삽입합니다.
///
/// 버전 번호는 호출자가 계산해서 넘깁니다. 같은 계보에 같은 번호가 이미 있으면
/// 유니크 인덱스 위반이 `StoreError::Conflict`로 돌아옵니다.
pub async fn create_version(pool: &SqlitePool, new: &NewVersion) -> Result<Document, StoreError> {
    let id = uuid::Uuid::now_v7().to_string();
    let now = now_timestamp();

    sqlx::query(
        r#"
        INSERT INTO documents (id, project_id, base_title, title, version, parent_version_id,
                               content, created_at, modified_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&new.project_id)
    .bind(&new.base_title)
    .bind(&new.title)
    .bind(new.version)
    .bind(&new.parent_id)
    .bind(&new.content)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .map_err(super::classify_write_error)?;

    get_document(pool, &id)
        .await?
        .ok_or_else(|| StoreError::Unavailable("Failed to retrieve created version".to_string()))
}

/// 한 계보의 모든 버전을 버전 번호 오름차순으로 조회합니다.
pub async fn list_versions(
    pool: &SqlitePool,
    project_id: &str,
    base_title: &str,
) -> Result<Vec<Document>, StoreError> {
    let versions = sqlx::query_as::<_, Document>(&format!(
        "SELECT {} FROM documents WHERE project_id = ? AND base_title = ? ORDER BY version ASC",
        DOCUMENT_COLUMNS
    ))
    .bind(project_id)
    .bind(base_title)
    .fetch_all(pool)
    .await?;

    Ok(versions)
}
