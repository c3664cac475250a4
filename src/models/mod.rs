//! # 데이터 모델 모듈
//!
//! - `document`: 버전 관리되는 문서와 요청 구조체
//! - `version`: 새 버전 레코드와 버전 목록 요약

pub mod document;
pub mod version;

pub use document::*;
pub use version::*;
