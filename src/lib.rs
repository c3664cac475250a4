//! # Folio
//!
//! 리치 텍스트 문서 작성 워크스페이스의 코어 라이브러리입니다.
//!
//! - `services::version_store`: 문서 버전 계보 (제자리 저장 vs 새 버전 분기)
//! - `editor`: 편집 화면과 활성 문서의 동기화, 선택 추적, 자동 저장
//! - `services::pagination`: 인쇄용 페이지 레이아웃 계산
//! - `db`: 영속화 협력자 (`DocumentStore`)와 SQLite/메모리 구현
//! - `routes`: 문서/버전/레이아웃 HTTP API (바이너리가 사용)

pub mod config;
pub mod db;
pub mod editor;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

#[cfg(test)]
mod testing;
