//! 외부 소스 추상화
//!
//! 스캐너는 세 가지 외부 협력자에 의존합니다.
//!
//! ```text
//!   InventorySource ──► Vec<RepositoryRecord>
//!   WorkloadSource  ──► Vec<ObservedWorkload>   (컨텍스트 단위)
//!   FindingsSource  ──► FindingPage             (커서 기반 페이지)
//! ```
//!
//! 운영 환경에서는 클라우드 SDK 클라이언트가, 로컬 실행과 테스트에서는
//! [`file`] 모듈의 JSON 문서 기반 구현이 이 trait들을 구현합니다.
//! 모든 trait은 `Send + Sync + 'static`이므로 백그라운드 태스크 간에 공유할 수 있습니다.

pub mod file;
pub mod image_ref;

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use imgwarden_core::types::{ObservedWorkload, RepositoryRecord, Severity};

use crate::error::ScannerError;

/// 활성 파인딩 상태 값
pub const STATUS_ACTIVE: &str = "ACTIVE";

/// 레지스트리 인벤토리 소스
pub trait InventorySource: Send + Sync + 'static {
    /// 레지스트리의 전체 리포지토리와 이미지를 반환합니다.
    ///
    /// # Errors
    ///
    /// 레지스트리에 접근할 수 없으면 `ScannerError::SourceUnavailable`
    fn list_repositories(
        &self,
    ) -> impl Future<Output = Result<Vec<RepositoryRecord>, ScannerError>> + Send;
}

/// 클러스터 워크로드 소스
pub trait WorkloadSource: Send + Sync + 'static {
    /// 지정된 컨텍스트에서 실행 중인 컨테이너 단위 워크로드를 반환합니다.
    ///
    /// # Errors
    ///
    /// - 존재하지 않는 컨텍스트: `ScannerError::UnknownContext`
    /// - 클러스터 접근 불가: `ScannerError::SourceUnavailable`
    fn list_workloads(
        &self,
        context: &str,
    ) -> impl Future<Output = Result<Vec<ObservedWorkload>, ScannerError>> + Send;

    /// 지금까지 형식 오류로 건너뛴 워크로드 레코드의 누적 수
    fn malformed_records(&self) -> u64 {
        0
    }
}

/// 보안 파인딩 소스
pub trait FindingsSource: Send + Sync + 'static {
    /// 필터 조건에 맞는 파인딩 한 페이지를 반환합니다.
    ///
    /// `query.cursor`가 `Some`이면 이전 페이지의 이어지는 결과를 요청합니다.
    fn list_findings(
        &self,
        query: &FindingQuery,
    ) -> impl Future<Output = Result<FindingPage, ScannerError>> + Send;
}

/// 파인딩 필터 조건
///
/// 모든 조건은 `EQUALS` 비교이며 AND로 결합됩니다.
/// 같은 스코프의 모든 페이지 요청은 동일한 필터를 재사용합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_digest: Option<String>,
    /// 허용 심각도 (비어있으면 전체)
    #[serde(default)]
    pub severities: Vec<Severity>,
    /// 파인딩 상태
    pub status: String,
}

impl FindingFilter {
    /// 원시 레코드가 필터 조건을 만족하는지 확인합니다.
    pub fn matches(&self, raw: &RawFinding) -> bool {
        fn eq(expected: &Option<String>, actual: Option<&str>) -> bool {
            match expected {
                Some(e) => actual == Some(e.as_str()),
                None => true,
            }
        }

        if raw.status.as_deref() != Some(self.status.as_str()) {
            return false;
        }

        if !self.severities.is_empty() {
            let severity = raw.severity.as_deref().and_then(Severity::from_wire_str);
            match severity {
                Some(s) if self.severities.contains(&s) => {}
                _ => return false,
            }
        }

        if let Some(tag) = &self.image_tag {
            if !raw.image_tags.iter().any(|t| t == tag) {
                return false;
            }
        }

        eq(&self.registry_id, raw.registry.as_deref())
            && eq(&self.repository, raw.repository_name.as_deref())
            && eq(&self.image_digest, raw.image_digest.as_deref())
    }
}

/// 파인딩 페이지 요청
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindingQuery {
    pub filter: FindingFilter,
    /// 페이지당 최대 결과 수
    pub max_results: u32,
    /// 이어받기 커서
    pub cursor: Option<String>,
}

/// 파인딩 페이지 응답
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingPage {
    pub findings: Vec<RawFinding>,
    /// 다음 페이지 커서 (`None`이면 마지막 페이지)
    pub next_cursor: Option<String>,
}

/// 파인딩 소스가 반환하는 원시 레코드
///
/// 모든 필드는 선택적입니다. [`Finding`](imgwarden_core::types::Finding)으로의
/// 변환과 형식 검증은 집계기가 담당합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawFinding {
    pub title: Option<String>,
    pub severity: Option<String>,
    pub status: Option<String>,
    pub fix_available: Option<String>,
    pub registry: Option<String>,
    pub repository_name: Option<String>,
    pub image_tags: Vec<String>,
    pub image_digest: Option<String>,
    pub vulnerable_packages: Vec<RawPackage>,
}

/// 취약 패키지 정보
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawPackage {
    pub package_manager: Option<String>,
    pub remediation: Option<String>,
}

/// 외부 호출에 기한을 적용합니다.
///
/// 기한을 넘기면 `ScannerError::Timeout`을 반환합니다.
pub async fn with_deadline<T>(
    source_name: &str,
    timeout_secs: u64,
    call: impl Future<Output = Result<T, ScannerError>>,
) -> Result<T, ScannerError> {
    match tokio::time::timeout(Duration::from_secs(timeout_secs), call).await {
        Ok(result) => result,
        Err(_) => Err(ScannerError::Timeout {
            source_name: source_name.to_owned(),
            timeout_secs,
        }),
    }
}
