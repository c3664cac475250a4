use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{now_timestamp, DocumentStore};
use crate::error::StoreError;
use crate::models::{Document, DocumentPatch, NewVersion};

/// 프로세스 안의 키-값 저장소. 문서 ID가 키입니다.
///
/// 로컬 저장소만 쓰는 데스크톱 빌드와 테스트에서 사용합니다.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lineage_has_version(
        documents: &HashMap<String, Document>,
        project_id: &str,
        base_title: &str,
        version: i64,
    ) -> bool {
        documents.values().any(|d| {
            d.project_id == project_id && d.base_title == base_title && d.version == version
        })
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_document(
        &self,
        project_id: &str,
        title: &str,
        content: &str,
    ) -> Result<Document, StoreError> {
        let mut documents = self.documents.lock();
        if Self::lineage_has_version(&documents, project_id, title, 1) {
            return Err(StoreError::Conflict(format!(
                "document '{}' already exists in project {}",
                title, project_id
            )));
        }

        let now = now_timestamp();
        let doc = Document {
            id: uuid::Uuid::now_v7().to_string(),
            project_id: project_id.to_string(),
            base_title: title.to_string(),
            title: title.to_string(),
            version: 1,
            parent_version_id: None,
            content: content.to_string(),
            created_at: now.clone(),
            modified_at: now,
        };
        documents.insert(doc.id.clone(), doc.clone());
        Ok(doc)
    }

    async fn load_document(&self, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.documents.lock().get(id).cloned())
    }

    async fn save_in_place(
        &self,
        id: &str,
        patch: &DocumentPatch,
    ) -> Result<Option<Document>, StoreError> {
        let mut documents = self.documents.lock();
        let Some(doc) = documents.get_mut(id) else {
            return Ok(None);
        };

        if let Some(content) = &patch.content {
            doc.content = content.clone();
        }
        if let Some(title) = &patch.title {
            doc.title = title.clone();
        }
        doc.modified_at = now_timestamp();

        Ok(Some(doc.clone()))
    }

    async fn create_version(&self, new: &NewVersion) -> Result<Document, StoreError> {
        let mut documents = self.documents.lock();
        if Self::lineage_has_version(&documents, &new.project_id, &new.base_title, new.version) {
            return Err(StoreError::Conflict(format!(
                "version {} of '{}' already exists",
                new.version, new.base_title
            )));
        }

        let now = now_timestamp();
        let doc = Document {
            id: uuid::Uuid::now_v7().to_string(),
            project_id: new.project_id.clone(),
            base_title: new.base_title.clone(),
            title: new.title.clone(),
            version: new.version,
            parent_version_id: Some(new.parent_id.clone()),
            content: new.content.clone(),
            created_at: now.clone(),
            modified_at: now,
        };
        documents.insert(doc.id.clone(), doc.clone());
        Ok(doc)
    }

    async fn list_versions(
        &self,
        project_id: &str,
        base_title: &str,
    ) -> Result<Vec<Document>, StoreError> {
        let mut versions: Vec<Document> = self
            .documents
            .lock()
            .values()
            .filter(|d| d.project_id == project_id && d.base_title == base_title)
            .cloned()
            .collect();
        versions.sort_by_key(|d| d.version);
        Ok(versions)
    }

    async fn list_documents(&self, project_id: Option<&str>) -> Result<Vec<Document>, StoreError> {
        let mut docs: Vec<Document> = self
            .documents
            .lock()
            .values()
            .filter(|d| project_id.map_or(true, |pid| d.project_id == pid))
            .cloned()
            .collect();
        // 같은 밀리초에 수정된 문서는 ID(UUIDv7) 역순으로 정렬합니다.
        docs.sort_by(|a, b| {
            b.modified_at
                .cmp(&a.modified_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(docs)
    }

    async fn delete_document(&self, id: &str) -> Result<bool, StoreError> {
        let mut documents = self.documents.lock();
        // SQLite 스키마의 parent_version_id 외래 키와 같은 규칙
        if documents
            .values()
            .any(|d| d.parent_version_id.as_deref() == Some(id))
        {
            return Err(StoreError::Conflict(format!(
                "document {} still has child versions",
                id
            )));
        }
        Ok(documents.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn root_titles_are_unique_per_project() {
        let store = MemoryStore::new();
        store.create_document("p1", "Essay", "").await.unwrap();
        store.create_document("p2", "Essay", "").await.unwrap();

        let err = store.create_document("p1", "Essay", "").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn versions_with_children_cannot_be_deleted() {
        let store = MemoryStore::new();
        let root = store.create_document("p1", "Essay", "").await.unwrap();
        let child = store
            .create_version(&NewVersion {
                project_id: "p1".into(),
                parent_id: root.id.clone(),
                base_title: "Essay".into(),
                title: "Essay v2".into(),
                version: 2,
                content: String::new(),
            })
            .await
            .unwrap();

        let err = store.delete_document(&root.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(store.delete_document(&child.id).await.unwrap());
        assert!(store.delete_document(&root.id).await.unwrap());
        assert!(!store.delete_document(&root.id).await.unwrap());
    }

    #[tokio::test]
    async fn save_in_place_keeps_version_and_parent() {
        let store = MemoryStore::new();
        let root = store.create_document("p1", "Essay", "Hello").await.unwrap();

        let patch = DocumentPatch {
            content: Some("Hello world".into()),
            title: Some("Renamed".into()),
        };
        let saved = store.save_in_place(&root.id, &patch).await.unwrap().unwrap();

        assert_eq!(saved.content, "Hello world");
        assert_eq!(saved.title, "Renamed");
        assert_eq!(saved.base_title, "Essay");
        assert_eq!(saved.version, 1);
        assert_eq!(saved.created_at, root.created_at);
    }
}
