//! # 자동 저장 스케줄러 (AutoSaveScheduler)
//!
//! 편집 화면의 내용 변경 이벤트를 모아서 조용한 구간(`debounce`)이 지나면 한 번 제자리 저장합니다.
//! 계속 입력 중이어도 첫 미저장 편집에서 `max_wait`가 지나면 저장합니다.
//!
//! 정책:
//! - 명시적 저장과 같은 `VersionStore::save_in_place` 경로를 씁니다. 새 버전은 만들지 않습니다.
//! - 실패하면 비차단형 상태(`AutoSaveStatus::Failed`)만 남깁니다.
//!   타이머로 혼자 재시도하지 않고, 다음 내용 변경 이벤트가 다시 예약합니다.
//! - 같은 문서의 저장 잠금을 다른 저장이 잡고 있으면 디바운스 타이머를 다시 겁니다.
//! - 화면 내용이 연결된 레코드의 내용과 같으면 쓰지 않습니다.
//! - 컨트롤러가 새 문서의 내용을 화면에 넣는 중이거나, 화면을 읽는 사이에 연결이 바뀌면
//!   쓰지 않고 디바운스 타이머를 다시 겁니다. 화면의 내용은 읽은 시점의 연결에만 저장됩니다.
//!
//! 예약된 저장은 타이머 만료 시점에 별도 태스크로 분리됩니다.
//! 그 뒤에 들어온 입력은 진행 중인 저장을 취소하지 않고 다음 저장을 예약합니다.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::Instant;

use crate::editor::debounce::Debouncer;
use crate::editor::lock::SaveLocks;
use crate::editor::state::EditorState;
use crate::editor::status::{AutoSaveStatus, SaveFailure};
use crate::editor::surface::{Subscription, Surface, SurfaceEvent};
use crate::models::{Document, DocumentPatch};
use crate::services::version_store::VersionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoSavePolicy {
    /// 마지막 편집 후 이만큼 조용하면 저장
    pub debounce: Duration,
    /// 첫 미저장 편집 후 늦어도 이만큼 지나면 저장
    pub max_wait: Duration,
}

impl Default for AutoSavePolicy {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1500),
            max_wait: Duration::from_millis(10_000),
        }
    }
}

/// 자동 저장 한 번의 결과
#[derive(Debug, Clone, PartialEq)]
pub enum AutoSaveOutcome {
    Saved(Document),
    /// 화면 내용이 이미 저장된 내용과 같음
    Unchanged,
    /// 다른 저장이 잠금을 잡고 있거나 화면이 새 문서를 불러오는 중이라 다시 예약함
    Busy,
    Failed(SaveFailure),
    /// 연결된 화면이나 문서가 없음
    Detached,
}

struct Binding {
    surface: Arc<dyn Surface>,
    debouncer: Debouncer,
    first_dirty_at: Option<Instant>,
    _subscription: Subscription,
}

#[derive(Default)]
struct SchedulerInner {
    binding: Option<Binding>,
    generation: u64,
}

struct Shared {
    state: EditorState,
    versions: Arc<VersionStore>,
    locks: SaveLocks,
    policy: AutoSavePolicy,
    runtime: Handle,
    inner: Mutex<SchedulerInner>,
}

pub struct AutoSaveScheduler {
    shared: Arc<Shared>,
}

impl AutoSaveScheduler {
    pub fn new(
        state: EditorState,
        versions: Arc<VersionStore>,
        locks: SaveLocks,
        policy: AutoSavePolicy,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state,
                versions,
                locks,
                policy,
                runtime: Handle::current(),
                inner: Mutex::new(SchedulerInner::default()),
            }),
        }
    }

    pub fn bind(&self, surface: Arc<dyn Surface>) {
        self.unbind();

        let weak = Arc::downgrade(&self.shared);
        let mut inner = self.shared.inner.lock();
        inner.generation += 1;
        let generation = inner.generation;

        let subscription = surface.subscribe(Arc::new(move |event: SurfaceEvent| {
            if event == SurfaceEvent::ContentChanged {
                on_content_changed(&weak, generation);
            }
        }));
        inner.binding = Some(Binding {
            surface,
            debouncer: Debouncer::new(self.shared.policy.debounce, self.shared.runtime.clone()),
            first_dirty_at: None,
            _subscription: subscription,
        });
    }

    /// 연결을 끊습니다. 대기 중인 예약은 취소되고, 이미 시작된 저장은 끝까지 진행됩니다.
    pub fn unbind(&self) {
        let binding = {
            let mut inner = self.shared.inner.lock();
            inner.generation += 1;
            inner.binding.take()
        };
        if let Some(mut binding) = binding {
            if binding.debouncer.cancel() {
                tracing::debug!("pending auto-save cancelled on unbind");
            }
            if matches!(self.shared.state.autosave_status(), AutoSaveStatus::Pending) {
                self.shared.state.set_autosave_status(AutoSaveStatus::Idle);
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.shared
            .inner
            .lock()
            .binding
            .as_ref()
            .is_some_and(|b| b.debouncer.is_pending())
    }

    /// 대기 중인 타이머를 취소하고 지금 바로 저장합니다.
    pub async fn flush(&self) -> AutoSaveOutcome {
        let generation = {
            let mut inner = self.shared.inner.lock();
            let generation = inner.generation;
            match inner.binding.as_mut() {
                Some(binding) => {
                    binding.debouncer.cancel();
                }
                None => return AutoSaveOutcome::Detached,
            }
            generation
        };
        run_autosave(self.shared.clone(), generation).await
    }
}

impl Drop for AutoSaveScheduler {
    fn drop(&mut self) {
        self.unbind();
    }
}

fn on_content_changed(shared: &Weak<Shared>, generation: u64) {
    let Some(strong) = shared.upgrade() else {
        return;
    };
    let mut inner = strong.inner.lock();
    if inner.generation != generation {
        return;
    }
    let Some(binding) = inner.binding.as_mut() else {
        return;
    };

    let now = Instant::now();
    let first_dirty = *binding.first_dirty_at.get_or_insert(now);
    let deadline = (now + strong.policy.debounce).min(first_dirty + strong.policy.max_wait);
    arm(&strong, shared, binding, generation, deadline);
    tracing::trace!(
        dirty_for_ms = now.duration_since(first_dirty).as_millis() as u64,
        "auto-save scheduled"
    );
}

/// 편집으로 예약할 때 `deadline` = min(지금 + debounce, 첫 편집 + max_wait)
fn arm(
    shared: &Shared,
    weak: &Weak<Shared>,
    binding: &mut Binding,
    generation: u64,
    deadline: Instant,
) {
    shared.state.set_autosave_status(AutoSaveStatus::Pending);
    let weak = weak.clone();
    binding.debouncer.schedule_at(deadline, move || {
        let Some(shared) = weak.upgrade() else {
            return;
        };
        let runtime = shared.runtime.clone();
        runtime.spawn(async move {
            run_autosave(shared, generation).await;
        });
    });
}

async fn run_autosave(shared: Arc<Shared>, generation: u64) -> AutoSaveOutcome {
    let surface = {
        let inner = shared.inner.lock();
        match inner.binding.as_ref() {
            Some(binding) if inner.generation == generation => binding.surface.clone(),
            _ => return AutoSaveOutcome::Detached,
        }
    };
    let binding = shared.state.active_binding();
    let Some(document) = binding.document else {
        clear_dirty(&shared, generation);
        if matches!(shared.state.autosave_status(), AutoSaveStatus::Pending) {
            shared.state.set_autosave_status(AutoSaveStatus::Idle);
        }
        return AutoSaveOutcome::Detached;
    };
    if !binding.synced {
        tracing::debug!(document_id = %document.id, "surface still loading, auto-save re-armed");
        rearm(&shared, generation);
        return AutoSaveOutcome::Busy;
    }

    let content = surface.serialized_content();
    if shared.state.binding_epoch() != binding.epoch {
        tracing::debug!(document_id = %document.id, "binding changed while reading, auto-save re-armed");
        rearm(&shared, generation);
        return AutoSaveOutcome::Busy;
    }
    if content == document.content {
        clear_dirty(&shared, generation);
        if matches!(shared.state.autosave_status(), AutoSaveStatus::Pending) {
            shared.state.set_autosave_status(AutoSaveStatus::Idle);
        }
        tracing::trace!(document_id = %document.id, "auto-save skipped, content unchanged");
        return AutoSaveOutcome::Unchanged;
    }

    let Some(_token) = shared.locks.try_acquire(&document.id) else {
        tracing::debug!(document_id = %document.id, "save in progress, auto-save re-armed");
        rearm(&shared, generation);
        return AutoSaveOutcome::Busy;
    };

    clear_dirty(&shared, generation);
    shared.state.set_autosave_status(AutoSaveStatus::Saving);

    let result = shared
        .versions
        .save_in_place(&document.id, &DocumentPatch::content(content))
        .await;

    let still_bound = shared.state.is_bound_to(&document.id);
    match result {
        Ok(saved) => {
            shared.state.refresh_active(&saved);
            if still_bound {
                shared.state.set_autosave_status(AutoSaveStatus::Saved {
                    at: saved.modified_at.clone(),
                });
            } else {
                settle_stale_status(&shared.state);
                tracing::debug!(
                    document_id = %saved.id,
                    "auto-save finished after the binding changed, active record left alone"
                );
            }
            tracing::debug!(document_id = %saved.id, version = saved.version, "auto-saved");
            AutoSaveOutcome::Saved(saved)
        }
        Err(err) => {
            tracing::warn!(document_id = %document.id, error = %err, "auto-save failed");
            let failure = SaveFailure::from_version_error(&document.id, &err);
            if still_bound {
                shared.state.set_autosave_status(AutoSaveStatus::Failed {
                    message: failure.message.clone(),
                });
            } else {
                settle_stale_status(&shared.state);
            }
            AutoSaveOutcome::Failed(failure)
        }
    }
}

/// 연결이 바뀐 뒤 끝난 저장은 새 문서의 표시기에 결과를 남기지 않습니다.
fn settle_stale_status(state: &EditorState) {
    if matches!(state.autosave_status(), AutoSaveStatus::Saving) {
        state.set_autosave_status(AutoSaveStatus::Idle);
    }
}

fn clear_dirty(shared: &Shared, generation: u64) {
    let mut inner = shared.inner.lock();
    if inner.generation != generation {
        return;
    }
    if let Some(binding) = inner.binding.as_mut() {
        binding.first_dirty_at = None;
    }
}

/// 다시 걸 때는 `max_wait`와 상관없이 한 번의 디바운스 구간을 기다립니다.
fn rearm(shared: &Arc<Shared>, generation: u64) {
    let weak = Arc::downgrade(shared);
    let mut inner = shared.inner.lock();
    if inner.generation != generation {
        return;
    }
    if let Some(binding) = inner.binding.as_mut() {
        let deadline = Instant::now() + shared.policy.debounce;
        arm(shared, &weak, binding, generation, deadline);
    }
}
