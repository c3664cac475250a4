//! # 데이터베이스 접근 계층 (Data Access Layer)
//!
//! 문서 영속화 협력자의 계약(`DocumentStore`)과 두 가지 구현을 둡니다.
//! - `SqliteStore`: `documents`/`versions` 모듈의 SQL 쿼리를 사용하는 SQLite 구현
//! - `MemoryStore`: 프로세스 안의 키-값 저장소 구현
//!
//! 코어(`VersionStore`, 에디터 컨트롤러)는 트레이트 객체(`Arc<dyn DocumentStore>`)만 봅니다.

pub mod documents;
pub mod memory;
pub mod versions;

pub use memory::MemoryStore;

use crate::error::StoreError;
use crate::models::{Document, DocumentPatch, NewVersion};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// 문서 영속화 협력자 계약
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 새 계보의 루트(버전 1)를 만듭니다.
    async fn create_document(
        &self,
        project_id: &str,
        title: &str,
        content: &str,
    ) -> Result<Document, StoreError>;

    async fn load_document(&self, id: &str) -> Result<Option<Document>, StoreError>;

    /// `Ok(None)`이면 해당 ID가 없습니다.
    async fn save_in_place(
        &self,
        id: &str,
        patch: &DocumentPatch,
    ) -> Result<Option<Document>, StoreError>;

    /// 번호가 이미 할당되어 있으면 `StoreError::Conflict`
    async fn create_version(&self, new: &NewVersion) -> Result<Document, StoreError>;

    /// 버전 번호 오름차순
    async fn list_versions(
        &self,
        project_id: &str,
        base_title: &str,
    ) -> Result<Vec<Document>, StoreError>;

    /// 최근 수정 순
    async fn list_documents(&self, project_id: Option<&str>) -> Result<Vec<Document>, StoreError>;

    /// 자식 버전이 남아 있으면 `StoreError::Conflict`
    async fn delete_document(&self, id: &str) -> Result<bool, StoreError>;
}

/// 저장소가 기록하는 타임스탬프 형식 (`2026-02-16T12:00:00.000Z`)
pub fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// 쓰기 실패 중 유니크 인덱스/외래 키 위반을 `Conflict`로 분류합니다.
pub(crate) fn classify_write_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(ref db_err)
            if db_err.is_unique_violation() || db_err.is_foreign_key_violation() =>
        {
            StoreError::Conflict(db_err.message().to_string())
        }
        other => StoreError::Database(other),
    }
}

/// SQLite 기반 `DocumentStore`
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 연결 풀을 만들고 마이그레이션을 실행합니다.
    ///
    /// `sqlite::memory:`는 연결마다 별도 DB가 생기므로 연결 하나만 유지합니다.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let in_memory = database_url.contains(":memory:");
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn create_document(
        &self,
        project_id: &str,
        title: &str,
        content: &str,
    ) -> Result<Document, StoreError> {
        documents::create_document(&self.pool, project_id, title, content).await
    }

    async fn load_document(&self, id: &str) -> Result<Option<Document>, StoreError> {
        documents::get_document(&self.pool, id).await
    }

    async fn save_in_place(
        &self,
        id: &str,
        patch: &DocumentPatch,
    ) -> Result<Option<Document>, StoreError> {
        documents::save_in_place(&self.pool, id, patch).await
    }

    async fn create_version(&self, new: &NewVersion) -> Result<Document, StoreError> {
        versions::create_version(&self.pool, new).await
    }

    async fn list_versions(
        &self,
        project_id: &str,
        base_title: &str,
    ) -> Result<Vec<Document>, StoreError> {
        versions::list_versions(&self.pool, project_id, base_title).await
    }

    async fn list_documents(&self, project_id: Option<&str>) -> Result<Vec<Document>, StoreError> {
        documents::list_documents(&self.pool, project_id).await
    }

    async fn delete_document(&self, id: &str) -> Result<bool, StoreError> {
        documents::delete_document(&self.pool, id).await
    }
}
