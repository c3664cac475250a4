//! # 에디터 동기화 컨트롤러 (EditorSyncController)
//!
//! 편집 화면에 표시된 내용을 활성 문서의 `content`와 맞추고,
//! 명시적 저장(Save / Save as New Version)을 `VersionStore`로 중개합니다.
//!
//! ## 규칙
//! - 활성 문서 변경은 ID로 판단합니다. 같은 ID를 다시 불러오면 아무것도 바꾸지 않습니다.
//! - 다른 문서로 바뀌면 화면의 현재 직렬화 내용과 비교해서 다를 때만 화면에 밀어 넣습니다.
//! - 저장 실패 시 화면 내용은 절대 되돌리지 않습니다.
//! - 저장 중에는 같은 문서의 잠금을 잡고 있어 다른 저장 요청은 `InProgress`로 즉시 거절됩니다.
//! - 저장이 끝났을 때 연결이 이미 바뀌었다면 결과를 새 연결에 적용하지 않습니다.
//!
//! 어떤 문서가 연결되었는지는 이 컨트롤러만 바꿉니다.

use std::sync::Arc;

use serde::Serialize;

use crate::editor::lock::SaveLocks;
use crate::editor::state::EditorState;
use crate::editor::status::{FailureKind, SaveFailure, SaveStatus};
use crate::editor::surface::Surface;
use crate::models::{Document, DocumentPatch};
use crate::services::version_store::VersionStore;

/// `load_document` 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// 같은 문서가 이미 연결되어 있어 아무것도 하지 않음
    AlreadyBound,
    /// 새로 연결함. `content_pushed`는 화면 내용을 바꿨는지 여부
    Bound { content_pushed: bool },
}

pub struct EditorSyncController {
    surface: Arc<dyn Surface>,
    state: EditorState,
    versions: Arc<VersionStore>,
    locks: SaveLocks,
    version_control: bool,
}

impl EditorSyncController {
    pub fn new(
        surface: Arc<dyn Surface>,
        state: EditorState,
        versions: Arc<VersionStore>,
        locks: SaveLocks,
        version_control: bool,
    ) -> Self {
        Self {
            surface,
            state,
            versions,
            locks,
            version_control,
        }
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn status(&self) -> SaveStatus {
        self.state.save_status()
    }

    /// 외부 코디네이터가 문서를 화면에 불러오라고 명령합니다.
    pub fn load_document(&self, document: Document) -> SyncOutcome {
        if self.state.is_bound_to(&document.id) {
            tracing::trace!(document_id = %document.id, "document already bound");
            return SyncOutcome::AlreadyBound;
        }

        let content_pushed = self.surface.serialized_content() != document.content;
        let document_id = document.id.clone();
        let incoming = content_pushed.then(|| document.content.clone());

        // 화면에 내용을 넣기 전에 연결을 바꿔야 이어지는 내용 변경 이벤트가 새 문서 기준으로 처리됩니다.
        // 내용을 넣는 동안에는 연결이 동기화 전이라 자동 저장이 화면을 읽지 않습니다.
        let epoch = if content_pushed {
            self.state.bind_unsynced(document)
        } else {
            self.state.bind(Some(document))
        };
        self.state.set_save_status(SaveStatus::Idle);
        if let Some(content) = incoming {
            self.surface.set_serialized_content(&content);
            self.state.mark_synced(epoch);
        }

        tracing::info!(document_id = %document_id, content_pushed, "document bound to editor");
        SyncOutcome::Bound { content_pushed }
    }

    /// ID로 문서를 읽어서 불러옵니다.
    pub async fn open(&self, document_id: &str) -> Result<SyncOutcome, SaveFailure> {
        match self.versions.load(document_id).await {
            Ok(document) => Ok(self.load_document(document)),
            Err(err) => {
                tracing::warn!(document_id, error = %err, "failed to open document");
                Err(SaveFailure::from_version_error(document_id, &err))
            }
        }
    }

    /// 연결을 끊습니다. 화면 내용은 그대로 둡니다.
    pub fn unbind(&self) {
        if let Some(id) = self.state.active_document_id() {
            tracing::info!(document_id = %id, "document unbound from editor");
        }
        self.state.bind(None);
        self.state.set_save_status(SaveStatus::Idle);
    }

    /// 버전 관리 중에는 제목을 바꿀 수 없습니다.
    pub fn title_editable(&self) -> bool {
        !self.version_control && self.state.active_document().is_some()
    }

    pub fn is_saving(&self) -> bool {
        self.state
            .active_document_id()
            .is_some_and(|id| self.locks.is_held(&id))
    }

    /// 현재 화면 내용을 연결된 버전에 제자리 저장합니다.
    pub async fn save(&self) -> SaveStatus {
        let Some(document) = self.state.active_document() else {
            return SaveStatus::Failed(SaveFailure::not_bound());
        };
        let patch = DocumentPatch::content(self.surface.serialized_content());
        self.persist_in_place(document, patch, "save").await
    }

    /// 제목을 바꿉니다. 버전 관리가 켜져 있으면 거절합니다.
    pub async fn rename(&self, title: &str) -> SaveStatus {
        let Some(document) = self.state.active_document() else {
            return SaveStatus::Failed(SaveFailure::not_bound());
        };
        let title = title.trim();
        if self.version_control || title.is_empty() {
            let message = if self.version_control {
                "the title of a versioned document is read-only"
            } else {
                "title must not be empty"
            };
            return SaveStatus::Failed(SaveFailure {
                kind: FailureKind::Validation,
                message: message.to_string(),
                document_id: Some(document.id),
            });
        }
        let patch = DocumentPatch {
            content: None,
            title: Some(title.to_string()),
        };
        self.persist_in_place(document, patch, "rename").await
    }

    async fn persist_in_place(
        &self,
        document: Document,
        patch: DocumentPatch,
        action: &'static str,
    ) -> SaveStatus {
        let Some(_token) = self.locks.try_acquire(&document.id) else {
            tracing::debug!(document_id = %document.id, action, "rejected, save in progress");
            return SaveStatus::Failed(SaveFailure::in_progress(&document.id));
        };
        self.state.set_save_status(SaveStatus::Saving {
            document_id: document.id.clone(),
        });

        let status = match self.versions.save_in_place(&document.id, &patch).await {
            Ok(saved) => {
                tracing::info!(document_id = %saved.id, version = saved.version, action, "saved in place");
                let status = SaveStatus::Saved {
                    document_id: saved.id.clone(),
                    version: saved.version,
                    at: saved.modified_at.clone(),
                };
                if !self.state.refresh_active(&saved) {
                    return self.discard_stale(&document.id, status);
                }
                status
            }
            Err(err) => {
                tracing::warn!(document_id = %document.id, action, error = %err, "save failed");
                let status = SaveStatus::Failed(SaveFailure::from_version_error(&document.id, &err));
                if !self.state.is_bound_to(&document.id) {
                    return self.discard_stale(&document.id, status);
                }
                status
            }
        };
        self.state.set_save_status(status.clone());
        status
    }

    /// 현재 화면 내용으로 새 버전을 만들고, 성공하면 새 버전으로 연결을 옮깁니다.
    ///
    /// 부모 버전의 저장된 내용은 바뀌지 않습니다.
    pub async fn save_as_new_version(&self) -> SaveStatus {
        let Some(parent) = self.state.active_document() else {
            return SaveStatus::Failed(SaveFailure::not_bound());
        };
        let Some(_token) = self.locks.try_acquire(&parent.id) else {
            tracing::debug!(document_id = %parent.id, "branch rejected, save in progress");
            return SaveStatus::Failed(SaveFailure::in_progress(&parent.id));
        };
        self.state.set_save_status(SaveStatus::Saving {
            document_id: parent.id.clone(),
        });

        let content = self.surface.serialized_content();
        let status = match self
            .versions
            .branch(&parent.project_id, &parent.id, &content)
            .await
        {
            Ok(created) => {
                let status = SaveStatus::Saved {
                    document_id: created.id.clone(),
                    version: created.version,
                    at: created.modified_at.clone(),
                };
                let created_id = created.id.clone();
                if !self.state.rebind_from(&parent.id, created) {
                    return self.discard_stale(&parent.id, status);
                }
                tracing::info!(parent_id = %parent.id, document_id = %created_id, "editor rebound to new version");
                status
            }
            Err(err) => {
                let status = SaveStatus::Failed(SaveFailure::from_version_error(&parent.id, &err));
                if !self.state.is_bound_to(&parent.id) {
                    return self.discard_stale(&parent.id, status);
                }
                status
            }
        };
        self.state.set_save_status(status.clone());
        status
    }

    /// 연결이 바뀐 뒤 끝난 저장의 결과. 공유 상태에는 반영하지 않습니다.
    fn discard_stale(&self, document_id: &str, status: SaveStatus) -> SaveStatus {
        tracing::debug!(document_id, "binding changed while saving, completion not applied");
        status
    }
}
