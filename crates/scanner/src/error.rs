//! 스캐너 에러 타입
//!
//! [`ScannerError`]는 스캐너 크레이트 내에서 발생할 수 있는 모든 에러를 나타냅니다.
//! `From<ScannerError> for WardenError` 구현을 통해 `?` 연산자로
//! 상위 에러 타입으로 자연스럽게 전파됩니다.
//!
//! # 에러 카테고리
//!
//! - **소스 접근 불가**: `SourceUnavailable`, `Timeout`, `UnknownContext`, `Io`, `Parse`
//! - **페이지네이션**: `Pagination`
//! - **설정**: `Config`
//! - **상태**: `AlreadyScanning`
//!
//! 형식이 잘못된 개별 레코드는 에러가 아닙니다. 경고 로그와 카운터만 남기고 건너뜁니다.

use imgwarden_core::error::{ConfigError, ScanError, SourceError, WardenError};

/// 스캐너 도메인 에러
///
/// 설정/상태 에러를 제외한 모든 변형은 스캔 주기를 중단시키며,
/// 해당 주기의 스냅샷은 게시되지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    /// 외부 소스에 접근할 수 없음
    #[error("{source_name} unavailable: {reason}")]
    SourceUnavailable {
        /// 소스 이름 (inventory, workloads, findings)
        source_name: String,
        /// 실패 사유
        reason: String,
    },

    /// 외부 호출 기한 초과
    #[error("{source_name} call timed out after {timeout_secs}s")]
    Timeout {
        /// 소스 이름
        source_name: String,
        /// 적용된 기한 (초)
        timeout_secs: u64,
    },

    /// 커서 기반 페이지네이션 실패
    #[error("pagination failed after {pages} page(s): {reason}")]
    Pagination {
        /// 실패 전까지 성공한 페이지 수
        pages: usize,
        /// 실패 사유
        reason: String,
    },

    /// 알 수 없는 클러스터 컨텍스트
    #[error("cluster context '{0}' does not exist")]
    UnknownContext(String),

    /// 소스 문서 파싱 실패
    #[error("parse error: {path}: {reason}")]
    Parse {
        /// 문서 경로
        path: String,
        /// 파싱 실패 사유
        reason: String,
    },

    /// 파일 I/O 에러
    #[error("io error: {path}: {source}")]
    Io {
        /// 관련 파일 경로
        path: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },

    /// 이전 스캔 주기가 아직 진행 중
    #[error("a scan cycle is already in progress")]
    AlreadyScanning,

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl ScannerError {
    /// 주기를 중단시키는 소스 에러인지 여부
    pub fn is_source_failure(&self) -> bool {
        !matches!(self, Self::Config { .. } | Self::AlreadyScanning)
    }
}

impl From<ScannerError> for WardenError {
    fn from(err: ScannerError) -> Self {
        match err {
            ScannerError::SourceUnavailable {
                source_name,
                reason,
            } => WardenError::Source(SourceError::Unavailable {
                source_name,
                reason,
            }),
            ScannerError::Timeout {
                source_name,
                timeout_secs,
            } => WardenError::Source(SourceError::Timeout {
                source_name,
                timeout_secs,
            }),
            ScannerError::Pagination { pages, reason } => {
                WardenError::Source(SourceError::Pagination { pages, reason })
            }
            ScannerError::UnknownContext(context) => WardenError::Source(SourceError::Unavailable {
                source_name: "workloads".to_owned(),
                reason: format!("cluster context '{context}' does not exist"),
            }),
            ScannerError::Parse { path, reason } => WardenError::Source(SourceError::Unavailable {
                source_name: path,
                reason: format!("parse error: {reason}"),
            }),
            ScannerError::Io { path, source } => WardenError::Source(SourceError::Unavailable {
                source_name: path,
                reason: format!("io error: {source}"),
            }),
            ScannerError::AlreadyScanning => WardenError::Scan(ScanError::AlreadyRunning),
            ScannerError::Config { field, reason } => {
                WardenError::Config(ConfigError::InvalidValue { field, reason })
            }
        }
    }
}
