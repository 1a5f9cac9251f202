//! 설정 관리 -- imgwarden.toml 파싱 및 런타임 설정
//!
//! [`WardenConfig`]는 모든 구성요소의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`IMGWARDEN_SCAN_TARGET=eks` 형식)
//! 3. 설정 파일 (`imgwarden.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), imgwarden_core::error::WardenError> {
//! use imgwarden_core::config::WardenConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = WardenConfig::load("imgwarden.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = WardenConfig::parse("[scan]\ntarget = \"eks\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, WardenError};

/// 파인딩 API 한 페이지의 최대 레코드 수
pub const MAX_PAGE_SIZE: u32 = 100;

/// imgwarden 통합 설정
///
/// `imgwarden.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WardenConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 레지스트리 인벤토리 설정
    #[serde(default)]
    pub registry: RegistryConfig,
    /// 클러스터 워크로드 설정
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// 파인딩 소스 설정
    #[serde(default)]
    pub findings: FindingsConfig,
    /// 스캔 주기 설정
    #[serde(default)]
    pub scan: ScanConfig,
    /// 리포트 출력 설정
    #[serde(default)]
    pub report: ReportConfig,
    /// 메트릭 노출 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl WardenConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, WardenError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, WardenError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                WardenError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                WardenError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, WardenError> {
        toml::from_str(toml_str).map_err(|e| {
            WardenError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `IMGWARDEN_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "IMGWARDEN_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "IMGWARDEN_GENERAL_LOG_FORMAT");

        // Registry
        override_string(
            &mut self.registry.registry_id,
            "IMGWARDEN_REGISTRY_REGISTRY_ID",
        );
        override_string(
            &mut self.registry.owner_tag_key,
            "IMGWARDEN_REGISTRY_OWNER_TAG_KEY",
        );
        override_string(
            &mut self.registry.inventory_path,
            "IMGWARDEN_REGISTRY_INVENTORY_PATH",
        );

        // Cluster
        override_csv(&mut self.cluster.contexts, "IMGWARDEN_CLUSTER_CONTEXTS");
        override_string(
            &mut self.cluster.workloads_path,
            "IMGWARDEN_CLUSTER_WORKLOADS_PATH",
        );

        // Findings
        override_string(
            &mut self.findings.findings_path,
            "IMGWARDEN_FINDINGS_FINDINGS_PATH",
        );
        override_u32(&mut self.findings.page_size, "IMGWARDEN_FINDINGS_PAGE_SIZE");
        override_u64(
            &mut self.findings.query_timeout_secs,
            "IMGWARDEN_FINDINGS_QUERY_TIMEOUT_SECS",
        );

        // Scan
        override_string(&mut self.scan.target, "IMGWARDEN_SCAN_TARGET");
        override_string(&mut self.scan.depth, "IMGWARDEN_SCAN_DEPTH");
        override_u64(&mut self.scan.interval_secs, "IMGWARDEN_SCAN_INTERVAL_SECS");
        override_bool(&mut self.scan.serve, "IMGWARDEN_SCAN_SERVE");

        // Report
        override_string(&mut self.report.output, "IMGWARDEN_REPORT_OUTPUT");
        override_string(&mut self.report.format, "IMGWARDEN_REPORT_FORMAT");

        // Metrics
        override_bool(&mut self.metrics.enabled, "IMGWARDEN_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "IMGWARDEN_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "IMGWARDEN_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), WardenError> {
        check_one_of(
            "general.log_level",
            &self.general.log_level,
            &["trace", "debug", "info", "warn", "error"],
        )?;
        check_one_of(
            "general.log_format",
            &self.general.log_format,
            &["json", "pretty"],
        )?;
        check_one_of("scan.target", &self.scan.target, &["ecr", "eks"])?;
        check_one_of("scan.depth", &self.scan.depth, &["short", "full"])?;
        check_one_of("report.format", &self.report.format, &["table", "csv"])?;

        if self.report.output.is_empty() {
            return Err(invalid("report.output", "must be 'stdout' or a file path"));
        }

        if self.findings.page_size == 0 || self.findings.page_size > MAX_PAGE_SIZE {
            return Err(invalid(
                "findings.page_size",
                &format!("must be 1-{MAX_PAGE_SIZE}"),
            ));
        }

        if self.findings.query_timeout_secs == 0 {
            return Err(invalid(
                "findings.query_timeout_secs",
                "must be greater than 0",
            ));
        }

        if self.scan.serve && self.scan.interval_secs == 0 {
            return Err(invalid(
                "scan.interval_secs",
                "must be greater than 0 in serve mode",
            ));
        }

        if self.scan.target == "ecr" && self.registry.registry_id.is_empty() {
            return Err(invalid(
                "registry.registry_id",
                "registry id is required when scan.target is 'ecr'",
            ));
        }

        if self.scan.target == "eks"
            && (self.cluster.contexts.is_empty()
                || self.cluster.contexts.iter().any(|c| c.is_empty()))
        {
            return Err(invalid(
                "cluster.contexts",
                "at least one non-empty context is required when scan.target is 'eks'",
            ));
        }

        if self.registry.owner_tag_key.is_empty() {
            return Err(invalid("registry.owner_tag_key", "must not be empty"));
        }

        if self.metrics.enabled && self.metrics.endpoint != "/metrics" {
            return Err(invalid(
                "metrics.endpoint",
                "only '/metrics' is currently supported",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> WardenError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
    .into()
}

fn check_one_of(field: &str, value: &str, valid: &[&str]) -> Result<(), WardenError> {
    if valid.contains(&value) {
        Ok(())
    } else {
        Err(invalid(
            field,
            &format!("must be one of: {}", valid.join(", ")),
        ))
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 레지스트리 인벤토리 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// 스캔할 레지스트리 ID (계정 ID 등)
    pub registry_id: String,
    /// 파인딩 소유 팀을 나타내는 리포지토리 태그 키
    pub owner_tag_key: String,
    /// 인벤토리 JSON 문서 경로
    pub inventory_path: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            registry_id: String::new(),
            owner_tag_key: "Team".to_owned(),
            inventory_path: "inventory.json".to_owned(),
        }
    }
}

/// 클러스터 워크로드 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// 조회할 클러스터 컨텍스트 목록
    pub contexts: Vec<String>,
    /// 워크로드 JSON 문서 경로
    pub workloads_path: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            contexts: vec!["preprod".to_owned()],
            workloads_path: "workloads.json".to_owned(),
        }
    }
}

/// 파인딩 소스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FindingsConfig {
    /// 파인딩 JSON 문서 경로
    pub findings_path: String,
    /// 페이지당 최대 레코드 수 (1-100)
    pub page_size: u32,
    /// 외부 호출 한 번의 기한 (초)
    pub query_timeout_secs: u64,
}

impl Default for FindingsConfig {
    fn default() -> Self {
        Self {
            findings_path: "findings.json".to_owned(),
            page_size: MAX_PAGE_SIZE,
            query_timeout_secs: 30,
        }
    }
}

/// 스캔 주기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// 스캔 대상 (ecr, eks)
    pub target: String,
    /// 스캔 깊이 (short, full)
    pub depth: String,
    /// 연속 모드 주기 간격 (초)
    pub interval_secs: u64,
    /// 연속 모드(메트릭 서버) 여부
    pub serve: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            target: "ecr".to_owned(),
            depth: "short".to_owned(),
            interval_secs: 3600,
            serve: false,
        }
    }
}

/// 리포트 출력 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// 출력 대상 (stdout 또는 파일 경로)
    pub output: String,
    /// 출력 형식 (table, csv)
    pub format: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: "stdout".to_owned(),
            format: "table".to_owned(),
        }
    }
}

/// 메트릭 노출 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// HTTP 노출 활성화 여부 (serve 모드에서만 사용)
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9090,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val.split(',').map(|s| s.trim().to_owned()).collect();
    }
}
