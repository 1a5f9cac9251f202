//! # imgwarden-core
//!
//! imgwarden 구성요소가 공유하는 기반 크레이트입니다.
//!
//! - [`types`]: 인벤토리, 워크로드, 파인딩 도메인 타입
//! - [`error`]: 도메인별 에러 계층
//! - [`config`]: `imgwarden.toml` 파싱과 환경변수 오버라이드
//! - [`metrics`]: 메트릭 이름 상수와 설명 등록
//!
//! 외부 서비스 호출이나 상관 분석 로직은 포함하지 않습니다.

pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, ScanError, SourceError, WardenError};

// 설정
pub use config::WardenConfig;

// 도메인 타입
pub use types::{
    Finding, ImageRecord, Inventory, ObservedWorkload, RepositoryRecord, Severity, UNTAGGED,
};
