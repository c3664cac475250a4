//! # 편집 화면(Surface) 협력자
//!
//! 코어가 편집 화면을 관찰하거나 바꾸는 지점만 트레이트로 정의합니다.
//! 서식 엔진(굵게/목록 등)은 화면 쪽 책임이고, 코어는 직렬화된 내용을 불투명한 문자열로 다룹니다.
//!
//! 이벤트 구독은 `Subscription` 값으로 돌려받고, 값을 drop하면 구독이 해제됩니다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// 문서 모델 안의 선택 범위 (문자 단위 오프셋)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectionRange {
    pub from: usize,
    pub to: usize,
}

impl SelectionRange {
    pub fn is_collapsed(&self) -> bool {
        self.from == self.to
    }
}

/// 현재 선택 상태의 스냅샷. 저장되지 않고 다음 스냅샷이 나오면 바로 대체됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSnapshot {
    pub text: Option<String>,
    /// 하위 작업에 구조를 유지해서 넘기기 위한 HTML
    pub html: Option<String>,
    pub range: Option<SelectionRange>,
}

impl SelectionSnapshot {
    /// "선택 없음" (모든 필드가 비어 있음)
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.text.as_deref().map_or(true, str::is_empty)
            || self.range.map_or(true, |r| r.is_collapsed())
    }

    /// 화면이 보고한 선택을 게시용 값으로 바꿉니다. 비었거나 접힌 선택은 "선택 없음"입니다.
    pub fn normalize(reported: Option<SelectionSnapshot>) -> Self {
        match reported {
            Some(snapshot) if !snapshot.is_empty() => snapshot,
            _ => Self::none(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceEvent {
    SelectionChanged,
    ContentChanged,
}

pub type SurfaceListener = Arc<dyn Fn(SurfaceEvent) + Send + Sync>;

/// 편집 화면 협력자 계약
pub trait Surface: Send + Sync {
    fn serialized_content(&self) -> String;

    fn set_serialized_content(&self, content: &str);

    /// 선택이 없으면 None
    fn current_selection(&self) -> Option<SelectionSnapshot>;

    /// 이벤트 구독. 반환된 `Subscription`을 drop하면 해제됩니다.
    fn subscribe(&self, listener: SurfaceListener) -> Subscription;
}

type ListenerTable = Mutex<Vec<(u64, SurfaceListener)>>;

/// 화면 구현이 내장해서 쓰는 리스너 테이블
#[derive(Default)]
pub struct EventHub {
    listeners: Arc<ListenerTable>,
    next_id: AtomicU64,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: SurfaceListener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, listener));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// 등록 순서대로 리스너를 호출합니다.
    ///
    /// 리스너 호출 중에는 테이블 잠금을 잡지 않으므로 리스너가 구독/해제를 해도 됩니다.
    pub fn emit(&self, event: SurfaceEvent) {
        let listeners: Vec<SurfaceListener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

/// 이벤트 구독 핸들
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    listeners: Weak<ListenerTable>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

#[derive(Debug, Default)]
struct SurfaceModel {
    content: String,
    selection: Option<SelectionRange>,
    external_sets: usize,
}

/// 화면 없이 동작하는 편집 화면.
///
/// 내용을 일반 텍스트로 들고 있고, 사용자 입력을 흉내 내는 메서드를 제공합니다.
/// 외부에서 내용을 밀어 넣으면(`set_serialized_content`) 실제 에디터처럼
/// `ContentChanged`를 발생시킵니다.
#[derive(Default)]
pub struct MemorySurface {
    model: Mutex<SurfaceModel>,
    hub: EventHub,
}

impl MemorySurface {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            model: Mutex::new(SurfaceModel {
                content: content.into(),
                ..Default::default()
            }),
            hub: EventHub::new(),
        }
    }

    /// 커서 위치(선택이 있으면 선택 끝, 없으면 문서 끝)에 글자를 입력합니다.
    ///
    /// 선택은 입력한 글자 뒤로 접힙니다.
    pub fn type_text(&self, text: &str) {
        {
            let mut model = self.model.lock();
            let char_len = model.content.chars().count();
            let at = model.selection.map_or(char_len, |r| r.to.min(char_len));
            let byte_at = byte_offset(&model.content, at);
            model.content.insert_str(byte_at, text);
            let cursor = at + text.chars().count();
            model.selection = Some(SelectionRange {
                from: cursor,
                to: cursor,
            });
        }
        self.hub.emit(SurfaceEvent::ContentChanged);
        self.hub.emit(SurfaceEvent::SelectionChanged);
    }

    /// 사용자가 내용 전체를 바꾼 것처럼 동작합니다.
    pub fn replace_content(&self, content: &str) {
        {
            let mut model = self.model.lock();
            model.content = content.to_string();
            model.selection = None;
        }
        self.hub.emit(SurfaceEvent::ContentChanged);
    }

    /// 문자 오프셋으로 선택합니다. 범위는 내용 길이에 맞춰 잘립니다.
    pub fn select(&self, from: usize, to: usize) {
        {
            let mut model = self.model.lock();
            let len = model.content.chars().count();
            let (from, to) = (from.min(to).min(len), to.max(from).min(len));
            model.selection = Some(SelectionRange { from, to });
        }
        self.hub.emit(SurfaceEvent::SelectionChanged);
    }

    pub fn clear_selection(&self) {
        self.model.lock().selection = None;
        self.hub.emit(SurfaceEvent::SelectionChanged);
    }

    /// `set_serialized_content`가 호출된 횟수
    pub fn external_sets(&self) -> usize {
        self.model.lock().external_sets
    }

    pub fn listener_count(&self) -> usize {
        self.hub.listener_count()
    }
}

impl Surface for MemorySurface {
    fn serialized_content(&self) -> String {
        self.model.lock().content.clone()
    }

    fn set_serialized_content(&self, content: &str) {
        {
            let mut model = self.model.lock();
            model.content = content.to_string();
            model.selection = None;
            model.external_sets += 1;
        }
        self.hub.emit(SurfaceEvent::ContentChanged);
    }

    fn current_selection(&self) -> Option<SelectionSnapshot> {
        let model = self.model.lock();
        let range = model.selection?;
        let text: String = model
            .content
            .chars()
            .skip(range.from)
            .take(range.to - range.from)
            .collect();
        let html = format!("<p>{}</p>", escape_html(&text));
        Some(SelectionSnapshot {
            text: Some(text),
            html: Some(html),
            range: Some(range),
        })
    }

    fn subscribe(&self, listener: SurfaceListener) -> Subscription {
        self.hub.subscribe(listener)
    }
}

fn byte_offset(s: &str, char_index: usize) -> usize {
    s.char_indices()
        .nth(char_index)
        .map_or(s.len(), |(byte, _)| byte)
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn dropping_a_subscription_unsubscribes() {
        let surface = MemorySurface::new("abc");
        let count = Arc::new(AtomicUsize::new(0));
        let sub = surface.subscribe({
            let count = count.clone();
            Arc::new(move |_: SurfaceEvent| {
                count.fetch_add(1, Ordering::SeqCst);
            })
        });

        surface.select(0, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        drop(sub);
        surface.select(0, 2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(surface.listener_count(), 0);
    }

    #[test]
    fn selection_reports_text_html_and_range() {
        let surface = MemorySurface::new("a <b> c");
        surface.select(2, 5);
        let snapshot = surface.current_selection().unwrap();
        assert_eq!(snapshot.text.as_deref(), Some("<b>"));
        assert_eq!(snapshot.html.as_deref(), Some("<p>&lt;b&gt;</p>"));
        assert_eq!(snapshot.range, Some(SelectionRange { from: 2, to: 5 }));
    }

    #[test]
    fn typing_collapses_the_selection() {
        let surface = MemorySurface::new("héllo");
        surface.select(0, 5);
        surface.type_text("!");
        assert_eq!(surface.serialized_content(), "héllo!");
        let normalized = SelectionSnapshot::normalize(surface.current_selection());
        assert_eq!(normalized, SelectionSnapshot::none());
    }

    #[test]
    fn external_sets_are_counted_and_emit_content_changes() {
        let surface = MemorySurface::new("");
        let events = Arc::new(Mutex::new(Vec::new()));
        let _sub = surface.subscribe({
            let events = events.clone();
            Arc::new(move |e: SurfaceEvent| events.lock().push(e))
        });

        surface.set_serialized_content("<p>hi</p>");
        assert_eq!(surface.external_sets(), 1);
        assert_eq!(*events.lock(), vec![SurfaceEvent::ContentChanged]);
    }
}
