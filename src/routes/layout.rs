//! # 페이지 레이아웃 라우트
//!
//! - `GET /api/v1/layout?content_height=2400&zoom=100` → 페이지 수와 구분선/번호 오프셋
//!
//! 서버는 상태를 갖지 않습니다. 같은 쿼리는 항상 같은 응답입니다.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use super::documents::AppState;
use crate::{
    error::AppError,
    services::pagination::{compute_layout, required_pages, PageLayout, DEFAULT_ZOOM, MAX_PAGES},
};

#[derive(Debug, Deserialize)]
pub struct LayoutQuery {
    /// 현재 배율로 측정된 내용 높이
    pub content_height: f64,
    /// 확대 비율 (%). 없으면 100
    pub zoom: Option<f64>,
}

pub async fn get_layout(
    State(state): State<AppState>,
    Query(query): Query<LayoutQuery>,
) -> Result<Json<PageLayout>, AppError> {
    if !query.content_height.is_finite() {
        return Err(AppError::BadRequest(
            "content_height must be a finite number".to_string(),
        ));
    }
    let zoom = query.zoom.unwrap_or(DEFAULT_ZOOM);
    if required_pages(query.content_height, zoom, &state.geometry) > MAX_PAGES as f64 {
        return Err(AppError::BadRequest(format!(
            "content_height needs more than {MAX_PAGES} pages"
        )));
    }
    Ok(Json(compute_layout(query.content_height, zoom, &state.geometry)))
}
