//! # 선택 추적기 (SelectionTracker)
//!
//! 편집 화면의 선택/내용 변경 이벤트를 받아 후행 디바운스(기본 150ms)를 거친 뒤
//! 선택 스냅샷을 공유 상태에 게시합니다.
//!
//! - 이벤트가 올 때마다 타이머를 다시 겁니다. 조용한 구간이 끝났을 때의 최종 상태만 게시됩니다.
//! - 연결(bind) 직후에는 기다리지 않고 한 번 바로 게시합니다.
//! - 연결 해제 후에는 대기 중이던 게시가 절대 실행되지 않습니다.
//!
//! 화면 리스너는 추적기 내부 상태를 `Weak`으로만 참조합니다. 화면이 추적기를 살려두지 않습니다.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;

use crate::editor::debounce::Debouncer;
use crate::editor::state::EditorState;
use crate::editor::surface::{SelectionSnapshot, Subscription, Surface, SurfaceEvent};

/// 선택 게시 디바운스 기본값
pub const DEFAULT_SELECTION_DEBOUNCE: Duration = Duration::from_millis(150);

struct Binding {
    surface: Arc<dyn Surface>,
    debouncer: Debouncer,
    _subscription: Subscription,
}

#[derive(Default)]
struct TrackerInner {
    binding: Option<Binding>,
    /// bind/unbind마다 증가. 이전 연결에서 예약된 타이머를 걸러냅니다.
    generation: u64,
}

pub struct SelectionTracker {
    state: EditorState,
    delay: Duration,
    runtime: Handle,
    inner: Arc<Mutex<TrackerInner>>,
}

impl SelectionTracker {
    /// 현재 tokio 런타임에서 타이머를 돌립니다.
    pub fn new(state: EditorState, delay: Duration) -> Self {
        Self {
            state,
            delay,
            runtime: Handle::current(),
            inner: Arc::new(Mutex::new(TrackerInner::default())),
        }
    }

    /// 화면에 연결합니다. 이미 연결되어 있으면 먼저 해제합니다.
    pub fn bind(&self, surface: Arc<dyn Surface>) {
        self.unbind();

        let weak = Arc::downgrade(&self.inner);
        let mut inner = self.inner.lock();
        inner.generation += 1;
        let generation = inner.generation;

        let listener_state = self.state.clone();
        let subscription = surface.subscribe(Arc::new(move |event: SurfaceEvent| {
            on_surface_event(&weak, &listener_state, generation, event);
        }));

        let snapshot = SelectionSnapshot::normalize(surface.current_selection());
        let seq = self.state.publish_selection(snapshot);
        tracing::debug!(seq, "selection published on bind");

        inner.binding = Some(Binding {
            surface,
            debouncer: Debouncer::new(self.delay, self.runtime.clone()),
            _subscription: subscription,
        });
    }

    /// 연결을 끊고 대기 중인 게시를 취소합니다.
    pub fn unbind(&self) {
        let binding = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            inner.binding.take()
        };
        if let Some(mut binding) = binding {
            if binding.debouncer.cancel() {
                tracing::debug!("pending selection publish cancelled");
            }
        }
    }

    pub fn is_bound(&self) -> bool {
        self.inner.lock().binding.is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.inner
            .lock()
            .binding
            .as_ref()
            .is_some_and(|b| b.debouncer.is_pending())
    }
}

impl Drop for SelectionTracker {
    fn drop(&mut self) {
        self.unbind();
    }
}

fn on_surface_event(
    inner: &Weak<Mutex<TrackerInner>>,
    state: &EditorState,
    generation: u64,
    event: SurfaceEvent,
) {
    let Some(strong) = inner.upgrade() else {
        return;
    };
    let mut guard = strong.lock();
    if guard.generation != generation {
        return;
    }
    let Some(binding) = guard.binding.as_mut() else {
        return;
    };

    tracing::trace!(?event, "selection debounce reset");
    let weak = inner.clone();
    let state = state.clone();
    binding
        .debouncer
        .schedule(move || publish_current(&weak, &state, generation));
}

/// 타이머가 만료된 시점의 선택을 읽어 게시합니다.
fn publish_current(inner: &Weak<Mutex<TrackerInner>>, state: &EditorState, generation: u64) {
    let Some(strong) = inner.upgrade() else {
        return;
    };
    let guard = strong.lock();
    if guard.generation != generation {
        return;
    }
    let Some(binding) = guard.binding.as_ref() else {
        return;
    };

    let snapshot = SelectionSnapshot::normalize(binding.surface.current_selection());
    let has_selection = !snapshot.is_empty();
    let seq = state.publish_selection(snapshot);
    tracing::debug!(seq, has_selection, "selection published");
}
