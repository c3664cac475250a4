//! # 애플리케이션 설정(Configuration) 모듈
//!
//! 환경변수에서 서버와 에디터 설정값을 읽어옵니다.
//! `.env` 파일이나 시스템 환경변수에서 값을 가져옵니다.
//!
//! 서버 설정 (`Config::from_env`):
//! - `DATABASE_URL`: SQLite 데이터베이스 경로 (필수)
//! - `HOST`: 서버 바인딩 주소
//! - `PORT`: 서버 포트 번호
//!
//! 에디터 세션 설정 (`EditorConfig::from_env`). 서버는 쓰지 않고,
//! 편집 화면을 띄워 `EditorSession::start`를 호출하는 쪽에서 읽습니다:
//! - `SELECTION_DEBOUNCE_MS`: 선택 게시 디바운스 (기본 150)
//! - `AUTOSAVE_DEBOUNCE_MS`: 자동 저장 디바운스 (기본 1500)
//! - `AUTOSAVE_MAX_WAIT_MS`: 자동 저장 최대 대기 (기본 10000)
//! - `VERSION_CONTROL`: 버전 관리 사용 여부 (기본 true)

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::editor::autosave::AutoSavePolicy;
use crate::editor::selection::DEFAULT_SELECTION_DEBOUNCE;

/// 애플리케이션 전체 설정을 담는 구조체
///
/// 서버 시작 시 환경변수에서 한 번 읽어온 후 공유됩니다.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite 데이터베이스 URL (예: "sqlite:data/folio.db")
    pub database_url: String,
    /// 서버가 바인딩할 호스트 주소 (기본값: "0.0.0.0")
    pub host: String,
    /// 서버 포트 번호 (기본값: 3000)
    pub port: u16,
}

/// 에디터 세션 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditorConfig {
    pub selection_debounce: Duration,
    pub autosave: AutoSavePolicy,
    /// 켜져 있으면 제목을 바꿀 수 없습니다.
    pub version_control: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            selection_debounce: DEFAULT_SELECTION_DEBOUNCE,
            autosave: AutoSavePolicy::default(),
            version_control: true,
        }
    }
}

impl Config {
    /// 환경변수에서 설정값을 읽어 Config 인스턴스를 생성합니다.
    ///
    /// # 에러
    /// `DATABASE_URL`은 필수이며, 없으면 에러가 발생합니다.
    /// 나머지 설정은 기본값이 있고, 값을 해석할 수 없을 때도 기본값을 씁니다.
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("PORT").unwrap_or(3000),
        })
    }
}

impl EditorConfig {
    /// 환경변수에서 에디터 세션 설정을 읽습니다. 없거나 해석할 수 없는 값은 기본값을 씁니다.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            selection_debounce: millis_var("SELECTION_DEBOUNCE_MS")
                .unwrap_or(defaults.selection_debounce),
            autosave: AutoSavePolicy {
                debounce: millis_var("AUTOSAVE_DEBOUNCE_MS").unwrap_or(defaults.autosave.debounce),
                max_wait: millis_var("AUTOSAVE_MAX_WAIT_MS").unwrap_or(defaults.autosave.max_wait),
            },
            version_control: env::var("VERSION_CONTROL")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.version_control),
        }
    }
}

fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok()?.trim().parse().ok()
}

fn millis_var(key: &str) -> Option<Duration> {
    parse_var::<u64>(key).map(Duration::from_millis)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editor_defaults() {
        let config = EditorConfig::default();
        assert_eq!(config.selection_debounce, Duration::from_millis(150));
        assert_eq!(config.autosave.debounce, Duration::from_millis(1500));
        assert_eq!(config.autosave.max_wait, Duration::from_millis(10_000));
        assert!(config.version_control);
    }

    #[test]
    fn editor_config_reads_the_environment() {
        env::set_var("AUTOSAVE_DEBOUNCE_MS", "250");
        env::set_var("VERSION_CONTROL", "off");
        env::set_var("SELECTION_DEBOUNCE_MS", "not a number");
        let config = EditorConfig::from_env();
        env::remove_var("AUTOSAVE_DEBOUNCE_MS");
        env::remove_var("VERSION_CONTROL");
        env::remove_var("SELECTION_DEBOUNCE_MS");

        assert_eq!(config.autosave.debounce, Duration::from_millis(250));
        assert_eq!(config.autosave.max_wait, Duration::from_millis(10_000));
        assert!(!config.version_control);
        assert_eq!(config.selection_debounce, DEFAULT_SELECTION_DEBOUNCE);
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
