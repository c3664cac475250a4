//! # 서비스 계층
//!
//! HTTP와 에디터 양쪽에서 쓰는 도메인 로직입니다.
//! - `version_store`: 문서 버전 계보 (제자리 저장, 분기, 계보 검증)
//! - `pagination`: 인쇄용 페이지 레이아웃 계산

pub mod pagination;
pub mod version_store;

pub use pagination::{compute_layout, PageGeometry, PageLayout, PreviewLayout};
pub use version_store::{verify_lineage, LineageViolation, VersionStore};
