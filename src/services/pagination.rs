//! # 페이지 레이아웃 계산
//!
//! 하나로 이어진 문서를 인쇄용 여러 페이지처럼 보여주기 위한 순수 계산입니다.
//! 입력은 `(측정된 내용 높이, 확대 비율, 페이지 기하)` 세 가지뿐이고,
//! 같은 입력이면 언제 몇 번을 호출하든 같은 결과가 나옵니다.
//!
//! ```text
//! ┌────────┐  ← 0
//! │ page 1 │
//! │     1  │  ← 페이지 번호 오프셋 (페이지 하단 - 0.6 × 여백)
//! └────────┘  ← page_height
//!  ~~~~~~~~   ← 페이지 구분선 오프셋 (간격의 한가운데)
//! ┌────────┐  ← page_height + gap
//! │ page 2 │
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// 허용하는 확대 비율 범위 (%)
pub const MIN_ZOOM: f64 = 10.0;
pub const MAX_ZOOM: f64 = 500.0;
pub const DEFAULT_ZOOM: f64 = 100.0;

/// 한 레이아웃이 가질 수 있는 최대 페이지 수. 그보다 긴 내용은 이 값에서 멈춥니다.
pub const MAX_PAGES: usize = 10_000;

/// 페이지 수가 정확히 나누어떨어질 때 부동소수점 오차로 한 페이지가 더 생기지 않게 합니다.
const PAGE_EPSILON: f64 = 1e-9;

/// 100% 배율 기준의 페이지 기하 (단위: CSS 픽셀)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub page_width: f64,
    pub page_height: f64,
    /// 좌우 여백
    pub margin_x: f64,
    /// 상하 여백
    pub margin_y: f64,
    /// 페이지 사이 간격
    pub page_gap: f64,
}

impl Default for PageGeometry {
    /// US Letter (8.5in × 11in, 96 DPI), 1인치 여백
    fn default() -> Self {
        Self {
            page_width: 816.0,
            page_height: 1056.0,
            margin_x: 96.0,
            margin_y: 96.0,
            page_gap: 24.0,
        }
    }
}

impl PageGeometry {
    /// 한 페이지에 들어가는 내용 높이 (100% 기준)
    pub fn content_height(&self) -> f64 {
        (self.page_height - 2.0 * self.margin_y).max(1.0)
    }
}

/// 확대 비율을 허용 범위로 맞춥니다. 숫자가 아니면 100%로 봅니다.
pub fn clamp_zoom(zoom_percent: f64) -> f64 {
    if zoom_percent.is_finite() {
        zoom_percent.clamp(MIN_ZOOM, MAX_ZOOM)
    } else {
        DEFAULT_ZOOM
    }
}

/// 계산된 페이지 레이아웃. 저장되지 않는 파생 값입니다.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageLayout {
    pub page_count: usize,
    /// 페이지 n과 n+1 사이 구분선의 세로 오프셋 (n = 1..page_count-1)
    pub page_breaks: Vec<f64>,
    /// 페이지 n 번호 표시의 세로 오프셋 (n = 1..=page_count)
    pub page_numbers: Vec<f64>,
    /// 현재 배율의 페이지 높이
    pub page_height: f64,
    /// 현재 배율의 페이지 간격
    pub page_gap: f64,
    /// 적용된(범위 조정된) 배율
    pub zoom: f64,
}

impl PageLayout {
    /// 모든 페이지와 간격을 합친 전체 스크롤 높이
    pub fn canvas_height(&self) -> f64 {
        let pages = self.page_count as f64;
        pages * self.page_height + (pages - 1.0) * self.page_gap
    }

    /// 세로 오프셋이 가리키는 페이지 번호 (1부터). 페이지 뒤 간격은 그 페이지에 속합니다.
    pub fn page_at(&self, offset: f64) -> usize {
        let stride = self.page_height + self.page_gap;
        if !offset.is_finite() || offset <= 0.0 || stride <= 0.0 {
            return 1;
        }
        let page = (offset / stride).floor() as usize + 1;
        page.min(self.page_count)
    }
}

/// 내용을 담는 데 필요한 페이지 수. `MAX_PAGES` 제한을 적용하기 전의 값입니다.
pub fn required_pages(content_height: f64, zoom_percent: f64, geometry: &PageGeometry) -> f64 {
    let scale = clamp_zoom(zoom_percent) / 100.0;
    let page_content_height = geometry.content_height() * scale;
    let measured = if content_height.is_finite() {
        content_height.max(0.0)
    } else {
        0.0
    };
    ((measured / page_content_height) - PAGE_EPSILON).ceil().max(1.0)
}

/// 레이아웃을 처음부터 계산합니다.
///
/// - `content_height`: 현재 배율로 렌더링된 내용의 측정 높이
/// - `zoom_percent`: 확대 비율 (%), `MIN_ZOOM..=MAX_ZOOM`으로 조정됨
///
/// 페이지 수는 `MAX_PAGES`에서 멈춥니다.
pub fn compute_layout(content_height: f64, zoom_percent: f64, geometry: &PageGeometry) -> PageLayout {
    let zoom = clamp_zoom(zoom_percent);
    let scale = zoom / 100.0;

    let page_height = geometry.page_height * scale;
    let page_gap = geometry.page_gap * scale;
    let margin_y = geometry.margin_y * scale;

    let pages = required_pages(content_height, zoom, geometry);
    let page_count = pages.min(MAX_PAGES as f64) as usize;

    let page_breaks = (1..page_count)
        .map(|n| {
            let n = n as f64;
            n * page_height + (n - 1.0) * page_gap + page_gap / 2.0
        })
        .collect();

    let page_numbers = (1..=page_count)
        .map(|n| {
            let n = n as f64;
            n * page_height + (n - 1.0) * page_gap - 0.6 * margin_y
        })
        .collect();

    PageLayout {
        page_count,
        page_breaks,
        page_numbers,
        page_height,
        page_gap,
        zoom,
    }
}

/// 미리보기 화면의 현재 입력을 들고, 입력이 바뀔 때마다 레이아웃을 새로 계산해 알립니다.
///
/// 이전 레이아웃은 기억하지 않습니다. 저장하는 것은 입력값뿐입니다.
pub struct PreviewLayout {
    geometry: PageGeometry,
    content_height: f64,
    zoom: f64,
    tx: watch::Sender<PageLayout>,
}

impl PreviewLayout {
    pub fn new(geometry: PageGeometry) -> Self {
        let initial = compute_layout(0.0, DEFAULT_ZOOM, &geometry);
        let (tx, _rx) = watch::channel(initial);
        Self {
            geometry,
            content_height: 0.0,
            zoom: DEFAULT_ZOOM,
            tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PageLayout> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> PageLayout {
        self.tx.borrow().clone()
    }

    pub fn set_content_height(&mut self, content_height: f64) {
        self.content_height = content_height;
        self.recompute();
    }

    pub fn set_zoom(&mut self, zoom_percent: f64) {
        self.zoom = clamp_zoom(zoom_percent);
        self.recompute();
    }

    pub fn set_geometry(&mut self, geometry: PageGeometry) {
        self.geometry = geometry;
        self.recompute();
    }

    fn recompute(&self) {
        let layout = compute_layout(self.content_height, self.zoom, &self.geometry);
        self.tx.send_if_modified(|current| {
            if *current == layout {
                return false;
            }
            tracing::debug!(
                pages = layout.page_count,
                zoom = layout.zoom,
                "preview layout recomputed"
            );
            *current = layout;
            true
        });
    }
}
