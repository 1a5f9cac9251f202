//! 파인딩 집계 -- 스코프별 필터링과 커서 기반 페이지네이션
//!
//! # 스코프
//!
//! | 스코프 | 필터 |
//! |---|---|
//! | `Registry` | 레지스트리 ID, 심각도 ∈ {CRITICAL, HIGH}, 상태 ACTIVE |
//! | `RepositoryTag` | 리포지토리 이름, 이미지 태그, 상태 ACTIVE |
//! | `ImageDigest` | 이미지 다이제스트, 상태 ACTIVE |
//!
//! # 깊이
//!
//! - `Short`: 첫 페이지만 조회합니다. 소스가 커서를 반환해도 추가 요청은 없습니다.
//! - `Full`: 커서가 없어질 때까지 같은 필터로 계속 조회하며 순서대로 이어붙입니다.
//!
//! 조회 실패는 해당 스코프 전체의 실패입니다. 일부 페이지만 담긴 결과는 반환하지 않으며,
//! [`FindingAggregator::collect_into`]의 누적 버퍼에 이미 담긴 다른 스코프의 파인딩은
//! 그대로 남습니다.

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, info, warn};

use imgwarden_core::types::{Finding, Severity, UNTAGGED};

use crate::config::ScanDepth;
use crate::error::ScannerError;
use crate::source::{
    FindingFilter, FindingQuery, FindingsSource, RawFinding, STATUS_ACTIVE, with_deadline,
};

const SOURCE_NAME: &str = "findings";

/// 파인딩 조회 스코프
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FindingScope {
    /// 레지스트리 전체의 CRITICAL/HIGH 활성 파인딩
    Registry { registry_id: String },
    /// 특정 리포지토리 태그의 활성 파인딩
    RepositoryTag { repository: String, tag: String },
    /// 특정 이미지 다이제스트의 활성 파인딩
    ///
    /// 스캔 주기에서는 만들지 않는 라이브러리 전용 스코프입니다.
    /// [`Inventory::find_by_digest`](imgwarden_core::types::Inventory::find_by_digest)로
    /// 찾은 이미지를 직접 조회할 때 사용합니다.
    ImageDigest { digest: String },
}

impl FindingScope {
    /// 스코프에 대응하는 필터 조건을 만듭니다.
    pub fn filter(&self) -> FindingFilter {
        match self {
            Self::Registry { registry_id } => FindingFilter {
                registry_id: Some(registry_id.clone()),
                severities: vec![Severity::Critical, Severity::High],
                status: STATUS_ACTIVE.to_owned(),
                ..Default::default()
            },
            Self::RepositoryTag { repository, tag } => FindingFilter {
                repository: Some(repository.clone()),
                image_tag: Some(tag.clone()),
                status: STATUS_ACTIVE.to_owned(),
                ..Default::default()
            },
            Self::ImageDigest { digest } => FindingFilter {
                image_digest: Some(digest.clone()),
                status: STATUS_ACTIVE.to_owned(),
                ..Default::default()
            },
        }
    }
}

impl fmt::Display for FindingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry { registry_id } => write!(f, "registry:{registry_id}"),
            Self::RepositoryTag { repository, tag } => write!(f, "{repository}:{tag}"),
            Self::ImageDigest { digest } => write!(f, "digest:{digest}"),
        }
    }
}

/// 한 스코프 집계 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationStats {
    /// 요청한 페이지 수
    pub pages: usize,
    /// 수집한 파인딩 수
    pub collected: usize,
    /// 형식 오류로 건너뛴 레코드 수
    pub malformed: usize,
}

impl AggregationStats {
    pub fn merge(&mut self, other: AggregationStats) {
        self.pages += other.pages;
        self.collected += other.collected;
        self.malformed += other.malformed;
    }
}

/// 파인딩 집계기
#[derive(Debug, Clone)]
pub struct FindingAggregator {
    depth: ScanDepth,
    page_size: u32,
    timeout_secs: u64,
}

impl FindingAggregator {
    pub fn new(depth: ScanDepth, page_size: u32, timeout_secs: u64) -> Self {
        Self {
            depth,
            page_size,
            timeout_secs,
        }
    }

    pub fn depth(&self) -> ScanDepth {
        self.depth
    }

    /// 스코프의 파인딩을 새 벡터로 수집합니다.
    pub async fn collect<F: FindingsSource>(
        &self,
        source: &F,
        scope: &FindingScope,
    ) -> Result<Vec<Finding>, ScannerError> {
        let mut findings = Vec::new();
        self.collect_into(source, scope, &mut findings).await?;
        Ok(findings)
    }

    /// 스코프의 파인딩을 누적 버퍼 끝에 이어붙입니다.
    ///
    /// 실패하면 이 스코프의 파인딩은 하나도 추가되지 않으며 버퍼의 기존 내용은 유지됩니다.
    ///
    /// # Errors
    ///
    /// - 첫 페이지 조회 실패: 소스 에러 그대로 (`SourceUnavailable`, `Timeout` 등)
    /// - 이후 페이지 조회 실패 또는 커서 반복: `ScannerError::Pagination`
    pub async fn collect_into<F: FindingsSource>(
        &self,
        source: &F,
        scope: &FindingScope,
        out: &mut Vec<Finding>,
    ) -> Result<AggregationStats, ScannerError> {
        let filter = scope.filter();
        let scope_tag = match scope {
            FindingScope::RepositoryTag { tag, .. } => Some(tag.as_str()),
            _ => None,
        };

        let mut stats = AggregationStats::default();
        let mut collected = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen_cursors = HashSet::new();

        loop {
            let query = FindingQuery {
                filter: filter.clone(),
                max_results: self.page_size,
                cursor: cursor.clone(),
            };

            let page = match with_deadline(
                SOURCE_NAME,
                self.timeout_secs,
                source.list_findings(&query),
            )
            .await
            {
                Ok(page) => page,
                Err(e) if stats.pages == 0 => return Err(e),
                Err(e) => {
                    return Err(ScannerError::Pagination {
                        pages: stats.pages,
                        reason: e.to_string(),
                    });
                }
            };
            stats.pages += 1;

            debug!(
                scope = %scope,
                page = stats.pages,
                records = page.findings.len(),
                has_more = page.next_cursor.is_some(),
                "findings page received"
            );

            for raw in &page.findings {
                match convert_finding(raw, scope_tag) {
                    Some(finding) => collected.push(finding),
                    None => {
                        warn!(
                            scope = %scope,
                            title = raw.title.as_deref().unwrap_or(""),
                            "skipping malformed finding record"
                        );
                        stats.malformed += 1;
                    }
                }
            }

            if self.depth == ScanDepth::Short {
                break;
            }

            match page.next_cursor.filter(|c| !c.is_empty()) {
                None => break,
                Some(next) => {
                    if !seen_cursors.insert(next.clone()) {
                        return Err(ScannerError::Pagination {
                            pages: stats.pages,
                            reason: format!("cursor '{next}' did not advance"),
                        });
                    }
                    cursor = Some(next);
                }
            }
        }

        stats.collected = collected.len();
        out.append(&mut collected);

        info!(
            scope = %scope,
            depth = %self.depth,
            pages = stats.pages,
            findings = stats.collected,
            malformed = stats.malformed,
            "findings collected"
        );
        Ok(stats)
    }
}

/// 원시 레코드를 [`Finding`]으로 변환합니다.
///
/// 제목, 심각도, 리포지토리, 취약 패키지(패키지 관리자 포함) 중 하나라도 없으면 `None`입니다.
/// `scope_tag`가 주어지면 이미지 태그로 사용하고, 아니면 레코드의 첫 태그를 사용합니다.
pub fn convert_finding(raw: &RawFinding, scope_tag: Option<&str>) -> Option<Finding> {
    let title = non_empty(raw.title.as_deref())?;
    let severity = non_empty(raw.severity.as_deref())?;
    let repository = non_empty(raw.repository_name.as_deref())?;
    let package = raw.vulnerable_packages.first()?;
    let package_manager = non_empty(package.package_manager.as_deref())?;

    let image_tag = scope_tag
        .or_else(|| raw.image_tags.iter().map(String::as_str).find(|t| !t.is_empty()))
        .unwrap_or(UNTAGGED);

    Some(Finding {
        title: title.to_owned(),
        severity: severity.to_owned(),
        fix_available: raw.fix_available.clone().unwrap_or_default(),
        remediation: package.remediation.clone().unwrap_or_default(),
        package_manager: package_manager.to_owned(),
        repository: repository.to_owned(),
        image_tag: image_tag.to_owned(),
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
