//! 테스트 전용 협력자: 장애를 주입할 수 있는 저장소 래퍼와 라우트 상태

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::db::{DocumentStore, MemoryStore};
use crate::error::StoreError;
use crate::models::{Document, DocumentPatch, NewVersion};
use crate::routes::AppState;
use crate::services::pagination::PageGeometry;
use crate::services::version_store::VersionStore;

/// 메모리 저장소 위의 라우트 상태
pub fn test_state() -> AppState {
    AppState {
        versions: Arc::new(VersionStore::new(Arc::new(MemoryStore::new()))),
        geometry: PageGeometry::default(),
    }
}

/// `MemoryStore`를 감싸고 쓰기 경로(`save_in_place`, `create_version`)에 장애를 넣습니다.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    write_delay: Mutex<Option<Duration>>,
    fail_next: AtomicBool,
    preempt: Mutex<Option<NewVersion>>,
    preempt_root: Mutex<Option<(String, String)>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    save_calls: AtomicUsize,
    version_calls: AtomicUsize,
}

/// `hold_writes`가 돌려주는 관문. 풀리기 전까지 쓰기가 대기합니다.
pub struct WriteGate {
    semaphore: Arc<Semaphore>,
}

impl WriteGate {
    pub fn release(&self) {
        self.semaphore.close();
    }
}

impl Drop for WriteGate {
    fn drop(&mut self) {
        self.semaphore.close();
    }
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 모든 쓰기를 `delay`만큼 늦춥니다.
    pub fn delay_writes(&self, delay: Duration) {
        *self.write_delay.lock() = Some(delay);
    }

    /// 다음 쓰기 한 번을 `StoreError::Unavailable`로 실패시킵니다.
    pub fn fail_next_write(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// 다음 `create_version` 직전에 다른 작성자가 `version`을 먼저 쓴 것처럼 만듭니다.
    pub fn preempt_next_version(&self, version: NewVersion) {
        *self.preempt.lock() = Some(version);
    }

    /// 다음 `create_document` 직전에 다른 요청이 같은 제목의 루트를 먼저 만든 것처럼 만듭니다.
    pub fn preempt_next_root(&self, project_id: &str, title: &str) {
        *self.preempt_root.lock() = Some((project_id.to_string(), title.to_string()));
    }

    /// 관문이 풀릴 때까지 쓰기를 붙잡습니다.
    pub fn hold_writes(&self) -> WriteGate {
        let semaphore = Arc::new(Semaphore::new(0));
        *self.gate.lock() = Some(semaphore.clone());
        WriteGate { semaphore }
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn version_calls(&self) -> usize {
        self.version_calls.load(Ordering::SeqCst)
    }

    async fn before_write(&self) -> Result<(), StoreError> {
        let gate = self.gate.lock().clone();
        if let Some(semaphore) = gate {
            // 관문이 닫히면(release) acquire가 에러로 끝나고 쓰기가 진행됩니다.
            if let Ok(permit) = semaphore.acquire().await {
                permit.forget();
            }
        }

        let delay = *self.write_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn create_document(
        &self,
        project_id: &str,
        title: &str,
        content: &str,
    ) -> Result<Document, StoreError> {
        let preempted = self.preempt_root.lock().take();
        if let Some((other_project, other_title)) = preempted {
            self.inner
                .create_document(&other_project, &other_title, "")
                .await?;
        }
        self.inner.create_document(project_id, title, content).await
    }

    async fn load_document(&self, id: &str) -> Result<Option<Document>, StoreError> {
        self.inner.load_document(id).await
    }

    async fn save_in_place(
        &self,
        id: &str,
        patch: &DocumentPatch,
    ) -> Result<Option<Document>, StoreError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.before_write().await?;
        self.inner.save_in_place(id, patch).await
    }

    async fn create_version(&self, new: &NewVersion) -> Result<Document, StoreError> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        self.before_write().await?;
        let preempted = self.preempt.lock().take();
        if let Some(other) = preempted {
            self.inner.create_version(&other).await?;
        }
        self.inner.create_version(new).await
    }

    async fn list_versions(
        &self,
        project_id: &str,
        base_title: &str,
    ) -> Result<Vec<Document>, StoreError> {
        self.inner.list_versions(project_id, base_title).await
    }

    async fn list_documents(&self, project_id: Option<&str>) -> Result<Vec<Document>, StoreError> {
        self.inner.list_documents(project_id).await
    }

    async fn delete_document(&self, id: &str) -> Result<bool, StoreError> {
        self.inner.delete_document(id).await
    }
}
