//! # 에디터 공유 상태 컨테이너
//!
//! 활성 문서, 선택 스냅샷, 저장 상태를 한 곳에 모읍니다.
//! 각 값은 `tokio::sync::watch` 채널이라 구독자는 `changed()`로 알림을 받고,
//! 모든 서브시스템은 클로저에 값을 붙잡아 두지 않고 접근자로 최신 값을 읽습니다.
//!
//! 어떤 문서가 연결되었는지(binding)는 `EditorSyncController`만 바꿉니다.
//! 그래서 `bind`는 크레이트 내부에만 공개됩니다.
//!
//! 연결이 바뀔 때마다 `epoch`가 1씩 늘어납니다. 새 문서의 내용을 화면에 넣는 동안에는
//! 연결이 "동기화 전"으로 표시되어, 화면에 남은 이전 문서의 내용이 새 문서로 저장되지 않습니다.
//! epoch와 동기화 표시는 활성 문서 채널의 잠금 안에서 함께 바뀌고 함께 읽힙니다.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::editor::status::{AutoSaveStatus, SaveStatus};
use crate::editor::surface::SelectionSnapshot;
use crate::models::Document;

/// 게시된 선택 스냅샷. `seq`는 게시할 때마다 1씩 늘어납니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub seq: u64,
    pub snapshot: SelectionSnapshot,
}

/// 한 시점의 연결 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveBinding {
    pub document: Option<Document>,
    pub epoch: u64,
    /// 화면이 이 문서의 내용을 들고 있는지. 내용을 넣는 중이면 false
    pub synced: bool,
}

struct Channels {
    active: watch::Sender<Option<Document>>,
    epoch: AtomicU64,
    synced: AtomicBool,
    selection: watch::Sender<SelectionState>,
    save: watch::Sender<SaveStatus>,
    autosave: watch::Sender<AutoSaveStatus>,
}

#[derive(Clone)]
pub struct EditorState {
    channels: Arc<Channels>,
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorState {
    pub fn new() -> Self {
        let (active, _) = watch::channel(None);
        let (selection, _) = watch::channel(SelectionState::default());
        let (save, _) = watch::channel(SaveStatus::Idle);
        let (autosave, _) = watch::channel(AutoSaveStatus::Idle);
        Self {
            channels: Arc::new(Channels {
                active,
                epoch: AtomicU64::new(0),
                synced: AtomicBool::new(true),
                selection,
                save,
                autosave,
            }),
        }
    }

    // ── 활성 문서 ──

    pub fn active_document(&self) -> Option<Document> {
        self.channels.active.borrow().clone()
    }

    pub fn active_document_id(&self) -> Option<String> {
        self.channels.active.borrow().as_ref().map(|d| d.id.clone())
    }

    pub fn is_bound_to(&self, document_id: &str) -> bool {
        self.channels
            .active
            .borrow()
            .as_ref()
            .is_some_and(|d| d.id == document_id)
    }

    pub fn watch_active(&self) -> watch::Receiver<Option<Document>> {
        self.channels.active.subscribe()
    }

    /// 활성 문서와 epoch, 동기화 표시를 한 번에 읽습니다.
    pub fn active_binding(&self) -> ActiveBinding {
        let active = self.channels.active.borrow();
        ActiveBinding {
            document: active.clone(),
            epoch: self.channels.epoch.load(Ordering::SeqCst),
            synced: self.channels.synced.load(Ordering::SeqCst),
        }
    }

    pub fn binding_epoch(&self) -> u64 {
        let _active = self.channels.active.borrow();
        self.channels.epoch.load(Ordering::SeqCst)
    }

    /// 화면이 이미 이 문서의 내용을 들고 있을 때의 연결
    pub(crate) fn bind(&self, document: Option<Document>) -> u64 {
        self.replace_binding(document, true)
    }

    /// 화면에 내용을 넣기 전의 연결. 내용을 넣은 뒤 `mark_synced`를 호출합니다.
    pub(crate) fn bind_unsynced(&self, document: Document) -> u64 {
        self.replace_binding(Some(document), false)
    }

    /// `epoch`가 아직 현재 연결일 때만 동기화 완료로 표시합니다.
    pub(crate) fn mark_synced(&self, epoch: u64) -> bool {
        let _active = self.channels.active.borrow();
        if self.channels.epoch.load(Ordering::SeqCst) != epoch {
            return false;
        }
        self.channels.synced.store(true, Ordering::SeqCst);
        true
    }

    fn replace_binding(&self, document: Option<Document>, synced: bool) -> u64 {
        let mut epoch = 0;
        self.channels.active.send_modify(|current| {
            epoch = self.channels.epoch.fetch_add(1, Ordering::SeqCst) + 1;
            self.channels.synced.store(synced, Ordering::SeqCst);
            *current = document;
        });
        epoch
    }

    /// 같은 문서가 아직 연결되어 있을 때만 레코드를 갱신합니다. 갱신했으면 true.
    pub(crate) fn refresh_active(&self, document: &Document) -> bool {
        self.channels.active.send_if_modified(|current| match current {
            Some(bound) if bound.id == document.id => {
                *bound = document.clone();
                true
            }
            _ => false,
        })
    }

    /// `expected_id`가 아직 연결되어 있을 때만 `document`로 갈아 끼웁니다.
    ///
    /// 화면 내용은 그대로 새 문서의 것이 되므로 동기화 표시는 바꾸지 않습니다.
    pub(crate) fn rebind_from(&self, expected_id: &str, document: Document) -> bool {
        self.channels.active.send_if_modified(|current| {
            let still_bound = current.as_ref().is_some_and(|b| b.id == expected_id);
            if still_bound {
                self.channels.epoch.fetch_add(1, Ordering::SeqCst);
                *current = Some(document);
            }
            still_bound
        })
    }

    // ── 선택 ──

    pub fn selection(&self) -> SelectionState {
        self.channels.selection.borrow().clone()
    }

    pub fn watch_selection(&self) -> watch::Receiver<SelectionState> {
        self.channels.selection.subscribe()
    }

    pub(crate) fn publish_selection(&self, snapshot: SelectionSnapshot) -> u64 {
        let mut seq = 0;
        self.channels.selection.send_modify(|state| {
            state.seq += 1;
            state.snapshot = snapshot;
            seq = state.seq;
        });
        seq
    }

    // ── 저장 상태 ──

    pub fn save_status(&self) -> SaveStatus {
        self.channels.save.borrow().clone()
    }

    pub fn watch_save_status(&self) -> watch::Receiver<SaveStatus> {
        self.channels.save.subscribe()
    }

    pub(crate) fn set_save_status(&self, status: SaveStatus) {
        self.channels.save.send_replace(status);
    }

    pub fn autosave_status(&self) -> AutoSaveStatus {
        self.channels.autosave.borrow().clone()
    }

    pub fn watch_autosave_status(&self) -> watch::Receiver<AutoSaveStatus> {
        self.channels.autosave.subscribe()
    }

    pub(crate) fn set_autosave_status(&self, status: AutoSaveStatus) {
        self.channels.autosave.send_replace(status);
    }
}
