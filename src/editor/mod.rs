//! # 에디터 동기화 코어
//!
//! 편집 화면 하나를 둘러싼 구성 요소들입니다.
//!
//! ```text
//! Surface ──이벤트──▶ SelectionTracker ──(150ms)──▶ EditorState.selection
//!    │      └──────▶ AutoSaveScheduler ──(1.5s)──▶ VersionStore::save_in_place
//!    │
//!    └──◀ EditorSyncController ──save/branch──▶ VersionStore
//!                    └──bind──▶ EditorState.active
//! ```
//!
//! `EditorSession`이 이것들을 한 번에 묶고, 닫을 때 자동 저장을 비운 뒤 모두 해제합니다.

pub mod autosave;
pub mod debounce;
pub mod lock;
pub mod selection;
pub mod state;
pub mod status;
pub mod surface;
pub mod sync;

use std::sync::Arc;

pub use autosave::{AutoSaveOutcome, AutoSavePolicy, AutoSaveScheduler};
pub use lock::{SaveLocks, SaveToken};
pub use selection::SelectionTracker;
pub use state::{EditorState, SelectionState};
pub use status::{AutoSaveStatus, FailureKind, SaveFailure, SaveStatus};
pub use surface::{MemorySurface, SelectionRange, SelectionSnapshot, Surface, SurfaceEvent};
pub use sync::{EditorSyncController, SyncOutcome};

use crate::config::EditorConfig;
use crate::models::Document;
use crate::services::version_store::VersionStore;

/// 편집 화면 하나에 대한 에디터 세션
pub struct EditorSession {
    state: EditorState,
    controller: EditorSyncController,
    selection: SelectionTracker,
    autosave: AutoSaveScheduler,
}

impl EditorSession {
    /// 공유 상태와 저장 잠금을 만들고 컨트롤러와 두 추적기를 화면에 연결합니다.
    ///
    /// tokio 런타임 안에서 호출해야 합니다.
    pub fn start(
        surface: Arc<dyn Surface>,
        versions: Arc<VersionStore>,
        config: &EditorConfig,
    ) -> Self {
        let state = EditorState::new();
        let locks = SaveLocks::new();

        let controller = EditorSyncController::new(
            surface.clone(),
            state.clone(),
            versions.clone(),
            locks.clone(),
            config.version_control,
        );
        let selection = SelectionTracker::new(state.clone(), config.selection_debounce);
        let autosave = AutoSaveScheduler::new(state.clone(), versions, locks, config.autosave);

        selection.bind(surface.clone());
        autosave.bind(surface);
        tracing::debug!(
            selection_debounce_ms = config.selection_debounce.as_millis() as u64,
            autosave_debounce_ms = config.autosave.debounce.as_millis() as u64,
            version_control = config.version_control,
            "editor session started"
        );

        Self {
            state,
            controller,
            selection,
            autosave,
        }
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn controller(&self) -> &EditorSyncController {
        &self.controller
    }

    pub fn selection(&self) -> &SelectionTracker {
        &self.selection
    }

    pub fn autosave(&self) -> &AutoSaveScheduler {
        &self.autosave
    }

    /// 다른 문서로 전환합니다. 현재 문서의 미저장 편집을 먼저 자동 저장으로 비웁니다.
    pub async fn switch_to(&self, document: Document) -> SyncOutcome {
        if !self.state.is_bound_to(&document.id) && self.state.active_document().is_some() {
            let outcome = self.autosave.flush().await;
            tracing::debug!(?outcome, "auto-save flushed before switching documents");
        }
        self.controller.load_document(document)
    }

    /// 남은 편집을 저장하고 모든 연결을 해제합니다.
    pub async fn close(self) -> AutoSaveOutcome {
        let outcome = self.autosave.flush().await;
        self.autosave.unbind();
        self.selection.unbind();
        self.controller.unbind();
        tracing::debug!(?outcome, "editor session closed");
        outcome
    }
}
