//! 스캐너 설정
//!
//! [`ScannerConfig`]는 core의 [`WardenConfig`](imgwarden_core::config::WardenConfig)에서
//! 스캔 주기에 필요한 값만 추려 타입이 있는 형태로 보관합니다.
//!
//! # 사용 예시
//!
//! ```
//! use imgwarden_scanner::{ScanDepth, ScanTarget, ScannerConfigBuilder};
//!
//! let config = ScannerConfigBuilder::new()
//!     .target(ScanTarget::Eks)
//!     .depth(ScanDepth::Full)
//!     .contexts(vec!["preprod".to_owned()])
//!     .build()
//!     .unwrap();
//! assert_eq!(config.page_size, 100);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use imgwarden_core::config::{MAX_PAGE_SIZE, WardenConfig};

use crate::error::ScannerError;

/// 스캔 대상
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanTarget {
    /// 레지스트리 전체 (CRITICAL/HIGH 활성 파인딩)
    #[default]
    Ecr,
    /// 클러스터에 배포된 이미지만
    Eks,
}

impl ScanTarget {
    /// 문자열에서 스캔 대상을 파싱합니다 (대소문자 무시).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ecr" => Some(Self::Ecr),
            "eks" => Some(Self::Eks),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ecr => "ecr",
            Self::Eks => "eks",
        }
    }
}

impl fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 파인딩 조회 깊이
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanDepth {
    /// 첫 페이지만 조회 (커서 무시)
    #[default]
    Short,
    /// 커서가 없어질 때까지 모든 페이지 조회
    Full,
}

impl ScanDepth {
    /// 문자열에서 스캔 깊이를 파싱합니다 (대소문자 무시).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "short" => Some(Self::Short),
            "full" => Some(Self::Full),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for ScanDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 스캐너 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// 스캔 대상
    pub target: ScanTarget,
    /// 파인딩 조회 깊이
    pub depth: ScanDepth,
    /// 레지스트리 ID (ECR 대상에서 필수)
    pub registry_id: String,
    /// 소유 팀 태그 키
    pub owner_tag_key: String,
    /// 워크로드를 수집할 클러스터 컨텍스트 (EKS 대상에서 필수)
    pub contexts: Vec<String>,
    /// 파인딩 페이지 크기 (1-100)
    pub page_size: u32,
    /// 외부 호출 기한 (초)
    pub query_timeout_secs: u64,
    /// 연속 모드 주기 간격 (초)
    pub interval_secs: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            target: ScanTarget::Ecr,
            depth: ScanDepth::Short,
            registry_id: String::new(),
            owner_tag_key: "Team".to_owned(),
            contexts: Vec::new(),
            page_size: MAX_PAGE_SIZE,
            query_timeout_secs: 30,
            interval_secs: 3600,
        }
    }
}

impl ScannerConfig {
    /// core 설정에서 스캐너 설정을 생성합니다.
    ///
    /// 알 수 없는 대상/깊이 문자열은 기본값으로 대체됩니다.
    /// core의 `validate()`가 먼저 호출되었다면 발생하지 않습니다.
    pub fn from_core(core: &WardenConfig) -> Self {
        Self {
            target: ScanTarget::from_str_loose(&core.scan.target).unwrap_or_default(),
            depth: ScanDepth::from_str_loose(&core.scan.depth).unwrap_or_default(),
            registry_id: core.registry.registry_id.clone(),
            owner_tag_key: core.registry.owner_tag_key.clone(),
            contexts: core.cluster.contexts.clone(),
            page_size: core.findings.page_size,
            query_timeout_secs: core.findings.query_timeout_secs,
            interval_secs: core.scan.interval_secs,
        }
    }

    /// 설정 값의 유효성을 검증합니다.
    ///
    /// # 검증 규칙
    ///
    /// - `page_size`: 1-100
    /// - `query_timeout_secs`: 0보다 커야 함
    /// - `interval_secs`: 0이면 [`Scanner::run_periodic`](crate::Scanner::run_periodic)이 루프를 시작하지 않음
    /// - `owner_tag_key`: 비어있으면 안 됨
    /// - ECR 대상: `registry_id` 필수
    /// - EKS 대상: 비어있지 않은 컨텍스트 하나 이상
    pub fn validate(&self) -> Result<(), ScannerError> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(config_err("page_size", format!("must be 1-{MAX_PAGE_SIZE}")));
        }

        if self.query_timeout_secs == 0 {
            return Err(config_err("query_timeout_secs", "must be greater than 0"));
        }

        if self.owner_tag_key.is_empty() {
            return Err(config_err("owner_tag_key", "must not be empty"));
        }

        match self.target {
            ScanTarget::Ecr if self.registry_id.is_empty() => Err(config_err(
                "registry_id",
                "registry id is required for the ecr target",
            )),
            ScanTarget::Eks
                if self.contexts.is_empty() || self.contexts.iter().any(|c| c.is_empty()) =>
            {
                Err(config_err(
                    "contexts",
                    "at least one non-empty cluster context is required for the eks target",
                ))
            }
            _ => Ok(()),
        }
    }
}

fn config_err(field: &str, reason: impl Into<String>) -> ScannerError {
    ScannerError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

/// [`ScannerConfig`] 빌더
///
/// 빌드 시 유효성 검증을 수행합니다.
#[derive(Default)]
pub struct ScannerConfigBuilder {
    config: ScannerConfig,
}

impl ScannerConfigBuilder {
    /// 기본값을 가진 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(mut self, target: ScanTarget) -> Self {
        self.config.target = target;
        self
    }

    pub fn depth(mut self, depth: ScanDepth) -> Self {
        self.config.depth = depth;
        self
    }

    pub fn registry_id(mut self, registry_id: impl Into<String>) -> Self {
        self.config.registry_id = registry_id.into();
        self
    }

    pub fn owner_tag_key(mut self, key: impl Into<String>) -> Self {
        self.config.owner_tag_key = key.into();
        self
    }

    pub fn contexts(mut self, contexts: Vec<String>) -> Self {
        self.config.contexts = contexts;
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.config.page_size = page_size;
        self
    }

    pub fn query_timeout_secs(mut self, secs: u64) -> Self {
        self.config.query_timeout_secs = secs;
        self
    }

    pub fn interval_secs(mut self, secs: u64) -> Self {
        self.config.interval_secs = secs;
        self
    }

    /// 설정을 검증하고 빌드합니다.
    ///
    /// # Errors
    ///
    /// 유효성 검증 실패 시 `ScannerError::Config` 반환
    pub fn build(self) -> Result<ScannerConfig, ScannerError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
