//! # 버전 계보 관리 (VersionStore)
//!
//! 문서 계보에 대한 두 가지 쓰기를 구분합니다.
//! - 제자리 저장(`save_in_place`): 현재 버전의 내용/제목만 덮어씀. 버전 번호는 그대로.
//! - 분기(`branch`): 부모 버전 + 1 번호로 새 레코드를 만듦. 부모는 건드리지 않음.
//!
//! ## 분기 동시성
//! "부모 읽기 → 다음 번호 계산 → 쓰기"는 같은 계보의 다른 분기와 원자적으로 실행됩니다.
//! 프로세스 안에서는 계보별 비동기 Mutex로 직렬화하고,
//! 프로세스 밖의 경쟁은 저장소의 유니크 제약(`StoreError::Conflict`)으로 잡아 다시 검사합니다.
//! 계보 안의 번호는 선형이므로, 이미 후속 버전이 있는 버전에서의 분기는 `Validation` 에러입니다.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::db::DocumentStore;
use crate::error::{StoreError, VersionError};
use crate::models::{version_title, Document, DocumentPatch, NewVersion};

/// 유니크 제약 충돌 후 다시 시도하는 최대 횟수
const MAX_BRANCH_ATTEMPTS: usize = 3;

/// 제목 없이 만든 문서의 기본 이름
const UNTITLED: &str = "Untitled";

/// 자동으로 고른 제목이 동시에 선점되었을 때 다시 고르는 최대 횟수
const MAX_UNTITLED_ATTEMPTS: usize = 5;

type LineageKey = (String, String);

pub struct VersionStore {
    store: Arc<dyn DocumentStore>,
    lineage_locks: Mutex<HashMap<LineageKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl VersionStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            lineage_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// ID로 문서를 읽습니다. 없으면 `NotFound`.
    pub async fn load(&self, id: &str) -> Result<Document, VersionError> {
        self.store
            .load_document(id)
            .await?
            .ok_or_else(|| VersionError::NotFound(id.to_string()))
    }

    /// 새 계보의 루트(버전 1)를 만듭니다.
    ///
    /// 제목이 비어 있으면 프로젝트 안에서 겹치지 않는 "Untitled", "Untitled 2", ...를 고릅니다.
    /// 고른 이름을 다른 요청이 먼저 가져가면 다음 빈 이름으로 다시 시도합니다.
    pub async fn create_root(
        &self,
        project_id: &str,
        title: Option<&str>,
        content: &str,
    ) -> Result<Document, VersionError> {
        if let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) {
            return match self.store.create_document(project_id, title, content).await {
                Ok(doc) => Ok(self.root_created(project_id, doc)),
                Err(StoreError::Conflict(_)) => Err(VersionError::Validation(format!(
                    "a document named '{}' already exists in this project",
                    title
                ))),
                Err(e) => Err(e.into()),
            };
        }

        let mut last_conflict = None;
        for attempt in 1..=MAX_UNTITLED_ATTEMPTS {
            let candidate = self.next_untitled(project_id).await?;
            match self.store.create_document(project_id, &candidate, content).await {
                Ok(doc) => return Ok(self.root_created(project_id, doc)),
                Err(StoreError::Conflict(msg)) => {
                    tracing::debug!(attempt, title = %candidate, "untitled name taken concurrently, retrying");
                    last_conflict = Some(StoreError::Conflict(msg));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(VersionError::Persistence(last_conflict.unwrap_or_else(|| {
            StoreError::Conflict("no free untitled name".to_string())
        })))
    }

    fn root_created(&self, project_id: &str, doc: Document) -> Document {
        tracing::info!(document_id = %doc.id, project_id, title = %doc.title, "lineage created");
        doc
    }

    async fn next_untitled(&self, project_id: &str) -> Result<String, VersionError> {
        let taken: Vec<String> = self
            .store
            .list_documents(Some(project_id))
            .await?
            .into_iter()
            .map(|d| d.base_title)
            .filter(|t| t.starts_with(UNTITLED))
            .collect();

        if !taken.iter().any(|t| t == UNTITLED) {
            return Ok(UNTITLED.to_string());
        }
        let next = (2..)
            .map(|n| format!("{} {}", UNTITLED, n))
            .find(|candidate| !taken.contains(candidate))
            .unwrap_or_else(|| UNTITLED.to_string());
        Ok(next)
    }

    /// 현재 버전을 제자리에서 덮어씁니다.
    ///
    /// `version`과 `parent_version_id`는 바뀌지 않습니다.
    /// 이미 후속 버전이 있는 버전은 고정되어 있으므로 `Validation` 에러입니다.
    pub async fn save_in_place(
        &self,
        document_id: &str,
        patch: &DocumentPatch,
    ) -> Result<Document, VersionError> {
        let current = self.load(document_id).await?;
        if patch.is_empty() {
            return Ok(current);
        }

        let key = lineage_key(&current);
        let lock = self.lineage_lock(&key);
        let result = {
            let _guard = lock.lock().await;
            self.save_latest_locked(&current, patch).await
        };
        drop(lock);
        self.release_lineage_lock(&key);

        let doc = result?;
        tracing::debug!(
            document_id,
            version = doc.version,
            bytes = doc.content.len(),
            "saved in place"
        );
        Ok(doc)
    }

    async fn save_latest_locked(
        &self,
        current: &Document,
        patch: &DocumentPatch,
    ) -> Result<Document, VersionError> {
        self.ensure_latest(current).await?;
        self.store
            .save_in_place(&current.id, patch)
            .await?
            .ok_or_else(|| VersionError::NotFound(current.id.clone()))
    }

    /// 계보의 최신 버전을 삭제합니다.
    ///
    /// 후속 버전이 있는 버전을 지우면 계보 번호에 구멍이 생기므로 `Validation` 에러입니다.
    /// 최신 버전을 지우면 바로 앞 버전이 다시 최신이 됩니다.
    pub async fn delete(&self, document_id: &str) -> Result<Document, VersionError> {
        let current = self.load(document_id).await?;

        let key = lineage_key(&current);
        let lock = self.lineage_lock(&key);
        let result = {
            let _guard = lock.lock().await;
            self.delete_latest_locked(&current).await
        };
        drop(lock);
        self.release_lineage_lock(&key);

        match &result {
            Ok(doc) => tracing::info!(document_id, version = doc.version, "version deleted"),
            Err(e) => tracing::warn!(document_id, error = %e, "delete failed"),
        }
        result
    }

    async fn delete_latest_locked(&self, current: &Document) -> Result<Document, VersionError> {
        self.ensure_latest(current).await?;
        if !self.store.delete_document(&current.id).await? {
            return Err(VersionError::NotFound(current.id.clone()));
        }
        Ok(current.clone())
    }

    /// 계보 잠금 안에서 호출합니다. `doc`보다 높은 번호가 있으면 `Validation`.
    async fn ensure_latest(&self, doc: &Document) -> Result<(), VersionError> {
        let lineage = self
            .store
            .list_versions(&doc.project_id, &doc.base_title)
            .await?;
        match lineage.iter().find(|d| d.version > doc.version) {
            Some(newer) => Err(VersionError::Validation(format!(
                "version {} of '{}' is superseded by version {}",
                doc.version, doc.base_title, newer.version
            ))),
            None => Ok(()),
        }
    }

    /// 부모 버전에서 새 버전을 분기합니다.
    ///
    /// 새 버전은 `parent.version + 1` 번호, `"{base_title} v{n}"` 제목,
    /// 그리고 전달받은 `content`를 가집니다. 부모의 내용은 그대로 남습니다.
    pub async fn branch(
        &self,
        project_id: &str,
        parent_document_id: &str,
        content: &str,
    ) -> Result<Document, VersionError> {
        let parent = self.load(parent_document_id).await?;
        if parent.project_id != project_id {
            return Err(VersionError::Validation(format!(
                "document {} belongs to project {}, not {}",
                parent.id, parent.project_id, project_id
            )));
        }

        let key = lineage_key(&parent);
        let lock = self.lineage_lock(&key);
        let result = {
            let _guard = lock.lock().await;
            self.branch_locked(parent_document_id, content).await
        };
        drop(lock);
        self.release_lineage_lock(&key);

        match &result {
            Ok(doc) => tracing::info!(
                document_id = %doc.id,
                parent_id = parent_document_id,
                version = doc.version,
                "new version branched"
            ),
            Err(e) => tracing::warn!(parent_id = parent_document_id, error = %e, "branch failed"),
        }
        result
    }

    async fn branch_locked(
        &self,
        parent_document_id: &str,
        content: &str,
    ) -> Result<Document, VersionError> {
        let mut last_conflict = None;

        for attempt in 1..=MAX_BRANCH_ATTEMPTS {
            // 잠금을 얻는 동안 부모가 삭제되었을 수 있으므로 다시 읽습니다.
            let parent = self.load(parent_document_id).await?;
            let next_version = parent.version + 1;

            let lineage = self
                .store
                .list_versions(&parent.project_id, &parent.base_title)
                .await?;
            if let Some(successor) = lineage.iter().find(|d| d.version >= next_version) {
                return Err(VersionError::Validation(format!(
                    "version {} of '{}' is stale: version {} already exists",
                    parent.version, parent.base_title, successor.version
                )));
            }

            let new = NewVersion {
                project_id: parent.project_id.clone(),
                parent_id: parent.id.clone(),
                base_title: parent.base_title.clone(),
                title: version_title(&parent.base_title, next_version),
                version: next_version,
                content: content.to_string(),
            };

            match self.store.create_version(&new).await {
                Ok(doc) => return Ok(doc),
                Err(StoreError::Conflict(msg)) => {
                    tracing::debug!(attempt, %msg, "version number taken concurrently, re-checking");
                    last_conflict = Some(StoreError::Conflict(msg));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(VersionError::Persistence(last_conflict.unwrap_or_else(|| {
            StoreError::Conflict("version allocation kept conflicting".to_string())
        })))
    }

    fn lineage_lock(&self, key: &LineageKey) -> Arc<tokio::sync::Mutex<()>> {
        self.lineage_locks
            .lock()
            .entry(key.clone())
            .or_default()
            .clone()
    }

    /// 아무도 쓰지 않는 계보 잠금을 맵에서 지웁니다.
    fn release_lineage_lock(&self, key: &LineageKey) {
        let mut locks = self.lineage_locks.lock();
        if locks.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(key);
        }
    }

    /// 계보의 모든 버전 (버전 번호 오름차순)
    pub async fn list_versions(
        &self,
        project_id: &str,
        base_title: &str,
    ) -> Result<Vec<Document>, VersionError> {
        Ok(self.store.list_versions(project_id, base_title).await?)
    }

    /// 문서가 속한 계보 전체를 조회합니다.
    pub async fn lineage(&self, document_id: &str) -> Result<Vec<Document>, VersionError> {
        let doc = self.load(document_id).await?;
        self.list_versions(&doc.project_id, &doc.base_title).await
    }

    /// 문서가 속한 계보의 최신 버전
    pub async fn head(&self, document_id: &str) -> Result<Document, VersionError> {
        self.lineage(document_id)
            .await?
            .pop()
            .ok_or_else(|| VersionError::NotFound(document_id.to_string()))
    }
}

fn lineage_key(doc: &Document) -> LineageKey {
    (doc.project_id.clone(), doc.base_title.clone())
}

/// 계보 불변식 위반
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineageViolation {
    #[error("lineage is empty")]
    Empty,

    #[error("root {id} must be version 1 without a parent")]
    BadRoot { id: String },

    #[error("{id} belongs to a different lineage")]
    ForeignDocument { id: String },

    #[error("expected version {expected}, found {found}")]
    Gap { expected: i64, found: i64 },

    #[error("version {version} ({id}) does not point at its predecessor")]
    BrokenParent { id: String, version: i64 },
}

/// 버전 번호 오름차순으로 나열된 계보가 불변식을 지키는지 검사합니다.
///
/// 루트는 부모 없는 버전 1이고, 이후 버전은 빈 번호 없이 1씩 증가하며,
/// 각 버전의 부모는 바로 앞 번호의 버전이어야 합니다.
pub fn verify_lineage(versions: &[Document]) -> Result<(), LineageViolation> {
    let root = versions.first().ok_or(LineageViolation::Empty)?;
    if root.version != 1 || !root.is_root() {
        return Err(LineageViolation::BadRoot {
            id: root.id.clone(),
        });
    }

    for (prev, doc) in versions.iter().zip(versions.iter().skip(1)) {
        if !doc.shares_lineage(root) {
            return Err(LineageViolation::ForeignDocument { id: doc.id.clone() });
        }
        if doc.version != prev.version + 1 {
            return Err(LineageViolation::Gap {
                expected: prev.version + 1,
                found: doc.version,
            });
        }
        if doc.parent_version_id.as_deref() != Some(prev.id.as_str()) {
            return Err(LineageViolation::BrokenParent {
                id: doc.id.clone(),
                version: doc.version,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, SqliteStore};
    use crate::testing::FlakyStore;

    fn memory_versions() -> VersionStore {
        VersionStore::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn save_then_reload() {
        let versions = memory_versions();
        let v1 = versions.create_root("p1", Some("Essay"), "Hello").await.unwrap();

        versions
            .save_in_place(&v1.id, &DocumentPatch::content("Hello world"))
            .await
            .unwrap();

        let reloaded = versions.load(&v1.id).await.unwrap();
        assert_eq!(reloaded.content, "Hello world");
        assert_eq!(reloaded.version, 1);
    }

    #[tokio::test]
    async fn branch_allocates_next_version_without_touching_parent() {
        let versions = memory_versions();
        let v1 = versions.create_root("p1", Some("Essay"), "Draft").await.unwrap();

        let v2 = versions.branch("p1", &v1.id, "Draft").await.unwrap();
        assert_eq!(v2.version, 2);
        assert_eq!(v2.parent_version_id.as_deref(), Some(v1.id.as_str()));
        assert_eq!(v2.content, "Draft");
        assert_eq!(v2.base_title, "Essay");
        assert_eq!(v2.title, "Essay v2");
        assert_ne!(v2.id, v1.id);

        let v3 = versions.branch("p1", &v2.id, "Edited").await.unwrap();
        assert_eq!(v3.title, "Essay v3");

        assert_eq!(versions.load(&v1.id).await.unwrap().content, "Draft");
        assert_eq!(versions.load(&v2.id).await.unwrap().content, "Draft");
        assert_eq!(versions.head(&v1.id).await.unwrap().id, v3.id);
    }

    #[tokio::test]
    async fn lineage_stays_monotonic_over_many_branches() {
        let versions = VersionStore::new(Arc::new(
            SqliteStore::connect("sqlite::memory:").await.unwrap(),
        ));
        let mut current = versions.create_root("p1", Some("Essay"), "0").await.unwrap();
        for i in 1..6 {
            current = versions
                .branch("p1", &current.id, &i.to_string())
                .await
                .unwrap();
        }

        let lineage = versions.lineage(&current.id).await.unwrap();
        assert_eq!(lineage.len(), 6);
        assert_eq!(verify_lineage(&lineage), Ok(()));
        let numbers: Vec<i64> = lineage.iter().map(|d| d.version).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn branching_a_superseded_version_is_rejected() {
        let versions = memory_versions();
        let v1 = versions.create_root("p1", Some("Essay"), "Draft").await.unwrap();
        versions.branch("p1", &v1.id, "second").await.unwrap();

        let err = versions.branch("p1", &v1.id, "third").await.unwrap_err();
        assert!(matches!(err, VersionError::Validation(_)));
        assert_eq!(versions.lineage(&v1.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_branches_on_one_parent_never_share_a_number() {
        let store = Arc::new(FlakyStore::new());
        store.delay_writes(std::time::Duration::from_millis(20));
        let versions = Arc::new(VersionStore::new(store.clone()));
        let v1 = versions.create_root("p1", Some("Essay"), "Draft").await.unwrap();

        let a = tokio::spawn({
            let versions = versions.clone();
            let id = v1.id.clone();
            async move { versions.branch("p1", &id, "from a").await }
        });
        let b = tokio::spawn({
            let versions = versions.clone();
            let id = v1.id.clone();
            async move { versions.branch("p1", &id, "from b").await }
        });
        let results = [a.await.unwrap(), b.await.unwrap()];

        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(succeeded, 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(VersionError::Validation(_)))));

        let lineage = versions.lineage(&v1.id).await.unwrap();
        assert_eq!(verify_lineage(&lineage), Ok(()));
        assert_eq!(lineage.len(), 2);
    }

    #[tokio::test]
    async fn conflict_from_another_writer_is_rechecked() {
        let store = Arc::new(FlakyStore::new());
        let versions = VersionStore::new(store.clone());
        let v1 = versions.create_root("p1", Some("Essay"), "Draft").await.unwrap();

        // 다른 프로세스가 같은 번호를 먼저 써 버린 상황
        store.preempt_next_version(NewVersion {
            project_id: "p1".into(),
            parent_id: v1.id.clone(),
            base_title: "Essay".into(),
            title: "Essay v2".into(),
            version: 2,
            content: "elsewhere".into(),
        });

        let err = versions.branch("p1", &v1.id, "mine").await.unwrap_err();
        assert!(matches!(err, VersionError::Validation(_)));
        let lineage = versions.lineage(&v1.id).await.unwrap();
        assert_eq!(lineage.len(), 2);
        assert_eq!(lineage[1].content, "elsewhere");
    }

    #[tokio::test]
    async fn missing_documents_are_not_found() {
        let versions = memory_versions();
        let err = versions
            .save_in_place("gone", &DocumentPatch::content("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, VersionError::NotFound(_)));

        let err = versions.branch("p1", "gone", "x").await.unwrap_err();
        assert!(matches!(err, VersionError::NotFound(_)));
    }

    #[tokio::test]
    async fn branch_rejects_foreign_project() {
        let versions = memory_versions();
        let v1 = versions.create_root("p1", Some("Essay"), "").await.unwrap();
        let err = versions.branch("p2", &v1.id, "").await.unwrap_err();
        assert!(matches!(err, VersionError::Validation(_)));
    }

    #[tokio::test]
    async fn write_failures_surface_as_persistence_errors() {
        let store = Arc::new(FlakyStore::new());
        let versions = VersionStore::new(store.clone());
        let v1 = versions.create_root("p1", Some("Essay"), "Draft").await.unwrap();

        store.fail_next_write();
        let err = versions
            .save_in_place(&v1.id, &DocumentPatch::content("lost"))
            .await
            .unwrap_err();
        assert!(matches!(err, VersionError::Persistence(_)));
        assert_eq!(versions.load(&v1.id).await.unwrap().content, "Draft");
    }

    #[tokio::test]
    async fn untitled_documents_get_distinct_names() {
        let versions = memory_versions();
        let a = versions.create_root("p1", None, "").await.unwrap();
        let b = versions.create_root("p1", Some("  "), "").await.unwrap();
        let c = versions.create_root("p1", None, "").await.unwrap();
        assert_eq!(a.title, "Untitled");
        assert_eq!(b.title, "Untitled 2");
        assert_eq!(c.title, "Untitled 3");

        let err = versions.create_root("p1", Some("Untitled"), "").await.unwrap_err();
        assert!(matches!(err, VersionError::Validation(_)));
    }

    #[tokio::test]
    async fn superseded_versions_cannot_be_saved_in_place() {
        let versions = memory_versions();
        let v1 = versions.create_root("p1", Some("Essay"), "Draft").await.unwrap();
        let v2 = versions.branch("p1", &v1.id, "Draft").await.unwrap();

        let err = versions
            .save_in_place(&v1.id, &DocumentPatch::content("rewritten"))
            .await
            .unwrap_err();
        assert!(matches!(err, VersionError::Validation(_)));
        assert_eq!(versions.load(&v1.id).await.unwrap().content, "Draft");

        // 최신 버전은 계속 저장할 수 있습니다.
        let saved = versions
            .save_in_place(&v2.id, &DocumentPatch::content("rewritten"))
            .await
            .unwrap();
        assert_eq!(saved.content, "rewritten");
    }

    #[tokio::test]
    async fn only_the_latest_version_can_be_deleted() {
        let versions = VersionStore::new(Arc::new(
            SqliteStore::connect("sqlite::memory:").await.unwrap(),
        ));
        let v1 = versions.create_root("p1", Some("Essay"), "Draft").await.unwrap();
        let v2 = versions.branch("p1", &v1.id, "second").await.unwrap();

        let err = versions.delete(&v1.id).await.unwrap_err();
        assert!(matches!(err, VersionError::Validation(_)));
        let lineage = versions.lineage(&v2.id).await.unwrap();
        assert_eq!(lineage.len(), 2);
        assert_eq!(verify_lineage(&lineage), Ok(()));

        // 같은 이름의 루트를 다시 만들어 계보에 섞을 수 없습니다.
        let err = versions.create_root("p1", Some("Essay"), "").await.unwrap_err();
        assert!(matches!(err, VersionError::Validation(_)));

        versions.delete(&v2.id).await.unwrap();
        let lineage = versions.lineage(&v1.id).await.unwrap();
        assert_eq!(verify_lineage(&lineage), Ok(()));
        assert_eq!(versions.head(&v1.id).await.unwrap().id, v1.id);

        // 앞 버전이 다시 최신이 되어 분기와 저장이 가능합니다.
        let again = versions.branch("p1", &v1.id, "retry").await.unwrap();
        assert_eq!(again.version, 2);
        assert_eq!(verify_lineage(&versions.lineage(&v1.id).await.unwrap()), Ok(()));

        let err = versions.delete("gone").await.unwrap_err();
        assert!(matches!(err, VersionError::NotFound(_)));
    }

    #[tokio::test]
    async fn untitled_name_taken_concurrently_moves_to_the_next_one() {
        let store = Arc::new(FlakyStore::new());
        let versions = VersionStore::new(store.clone());

        store.preempt_next_root("p1", "Untitled");
        let doc = versions.create_root("p1", None, "").await.unwrap();
        assert_eq!(doc.title, "Untitled 2");
    }

    #[test]
    fn verify_lineage_reports_the_first_violation() {
        fn doc(id: &str, version: i64, parent: Option<&str>) -> Document {
            Document {
                id: id.into(),
                project_id: "p".into(),
                base_title: "T".into(),
                title: "T".into(),
                version,
                parent_version_id: parent.map(String::from),
                content: String::new(),
                created_at: String::new(),
                modified_at: String::new(),
            }
        }

        assert_eq!(verify_lineage(&[]), Err(LineageViolation::Empty));
        assert_eq!(
            verify_lineage(&[doc("a", 2, None)]),
            Err(LineageViolation::BadRoot { id: "a".into() })
        );
        assert_eq!(
            verify_lineage(&[doc("a", 1, None), doc("c", 3, Some("a"))]),
            Err(LineageViolation::Gap { expected: 2, found: 3 })
        );
        assert_eq!(
            verify_lineage(&[doc("a", 1, None), doc("b", 2, Some("x"))]),
            Err(LineageViolation::BrokenParent {
                id: "b".into(),
                version: 2
            })
        );
        assert_eq!(
            verify_lineage(&[doc("a", 1, None), doc("b", 2, Some("a"))]),
            Ok(())
        );
    }
}
