//! 심각도 스냅샷 -- (팀, 리포지토리, 태그, 패키지 관리자)별 심각도 카운터
//!
//! [`SeveritySnapshot`]은 스캔 주기마다 다시 만들어지는 시점 스냅샷입니다.
//! 재구성은 항상 "모든 카운터를 0으로 초기화한 뒤 증가"하는 순서를 따르므로,
//! 이전 주기에만 있던 레이블 조합은 사라지지 않고 0으로 남습니다.
//!
//! 스냅샷은 전역 상태가 아니라 `Arc<SeveritySnapshot>`으로 오케스트레이터와
//! 노출 경로가 공유합니다. 레이블 맵은 `RwLock`, 개별 카운터는 원자적입니다.
//!
//! [`SnapshotPublisher`]는 스냅샷을 호출자가 소유한 `metrics::Recorder`의
//! 게이지로 복사합니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use metrics::Recorder;
use tracing::debug;

use imgwarden_core::metrics as m;
use imgwarden_core::types::{Finding, Inventory, Severity};

/// 스냅샷 레이블 조합
///
/// 정렬 순서는 필드 순서(팀, 리포지토리, 태그, 패키지 관리자)를 따릅니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotLabels {
    pub team: String,
    pub repository: String,
    pub tag: String,
    pub package_manager: String,
}

impl SnapshotLabels {
    pub fn new(
        team: impl Into<String>,
        repository: impl Into<String>,
        tag: impl Into<String>,
        package_manager: impl Into<String>,
    ) -> Self {
        Self {
            team: team.into(),
            repository: repository.into(),
            tag: tag.into(),
            package_manager: package_manager.into(),
        }
    }
}

/// 심각도별 개수 (읽기용 값 타입)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeverityCounts {
    pub critical: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
    pub informational: u64,
}

impl SeverityCounts {
    pub fn get(&self, severity: Severity) -> u64 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::Informational => self.informational,
        }
    }

    /// 다섯 버킷의 합
    pub fn total(&self) -> u64 {
        self.critical + self.high + self.medium + self.low + self.informational
    }
}

/// 레이블 조합 하나의 원자적 카운터
#[derive(Debug, Default)]
struct SeverityCounters {
    critical: AtomicU64,
    high: AtomicU64,
    medium: AtomicU64,
    low: AtomicU64,
    informational: AtomicU64,
}

impl SeverityCounters {
    fn slot(&self, severity: Severity) -> &AtomicU64 {
        match severity {
            Severity::Critical => &self.critical,
            Severity::High => &self.high,
            Severity::Medium => &self.medium,
            Severity::Low => &self.low,
            Severity::Informational => &self.informational,
        }
    }

    fn increment(&self, severity: Severity) {
        self.slot(severity).fetch_add(1, Ordering::Relaxed);
    }

    fn reset(&self) {
        for severity in Severity::ALL {
            self.slot(severity).store(0, Ordering::Relaxed);
        }
    }

    fn load(&self) -> SeverityCounts {
        SeverityCounts {
            critical: self.critical.load(Ordering::Relaxed),
            high: self.high.load(Ordering::Relaxed),
            medium: self.medium.load(Ordering::Relaxed),
            low: self.low.load(Ordering::Relaxed),
            informational: self.informational.load(Ordering::Relaxed),
        }
    }
}

/// 재구성 결과 요약
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildSummary {
    /// 재구성 후 전체 레이블 조합 수 (0인 조합 포함)
    pub tuples: usize,
    /// 카운트된 파인딩 수
    pub counted: usize,
    /// 알 수 없는 심각도로 제외된 파인딩 수
    pub ignored: usize,
}

/// 심각도 스냅샷
#[derive(Debug)]
pub struct SeveritySnapshot {
    owner_tag_key: String,
    entries: RwLock<HashMap<SnapshotLabels, Arc<SeverityCounters>>>,
}

impl SeveritySnapshot {
    /// 소유 팀 태그 키로 빈 스냅샷을 생성합니다.
    pub fn new(owner_tag_key: impl Into<String>) -> Self {
        Self {
            owner_tag_key: owner_tag_key.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn owner_tag_key(&self) -> &str {
        &self.owner_tag_key
    }

    /// 파인딩으로 스냅샷을 재구성합니다.
    ///
    /// 1. 기존 모든 레이블 조합의 카운터를 0으로 초기화
    /// 2. 파인딩마다 인벤토리 소유 태그로 팀을 해석 (없으면 빈 문자열)
    /// 3. 심각도 버킷 증가. 알 수 없는 심각도는 무시
    pub fn rebuild(&self, inventory: &Inventory, findings: &[Finding]) -> RebuildSummary {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            for counters in entries.values() {
                counters.reset();
            }
        }

        let mut summary = RebuildSummary::default();
        for finding in findings {
            let Some(severity) = finding.severity_bucket() else {
                debug!(
                    title = %finding.title,
                    severity = %finding.severity,
                    "unknown severity, not counted"
                );
                summary.ignored += 1;
                continue;
            };

            let labels = SnapshotLabels::new(
                inventory.owner_of(&finding.repository, &self.owner_tag_key),
                finding.repository.as_str(),
                finding.image_tag.as_str(),
                finding.package_manager.as_str(),
            );
            self.counters_for(labels).increment(severity);
            summary.counted += 1;
        }

        summary.tuples = self.len();
        summary
    }

    fn counters_for(&self, labels: SnapshotLabels) -> Arc<SeverityCounters> {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(counters) = entries.get(&labels) {
                return Arc::clone(counters);
            }
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(entries.entry(labels).or_default())
    }

    /// 레이블 조합의 현재 값을 반환합니다.
    pub fn get(&self, labels: &SnapshotLabels) -> Option<SeverityCounts> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(labels).map(|c| c.load())
    }

    /// 전체 레이블 조합과 값을 정렬된 순서로 반환합니다.
    pub fn entries(&self) -> Vec<(SnapshotLabels, SeverityCounts)> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<_> = entries
            .iter()
            .map(|(labels, counters)| (labels.clone(), counters.load()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 스냅샷을 레코더 게이지로 게시
///
/// 전역 레코더를 사용하지 않고, 생성 시 받은 레코더에만 기록합니다.
#[derive(Clone)]
pub struct SnapshotPublisher {
    recorder: Arc<dyn Recorder + Send + Sync>,
}

impl SnapshotPublisher {
    /// 레코더를 받아 게시자를 만들고 메트릭 설명을 등록합니다.
    pub fn new(recorder: Arc<dyn Recorder + Send + Sync>) -> Self {
        let publisher = Self { recorder };
        publisher.with_recorder(m::describe_all);
        publisher
    }

    /// 소유한 레코더를 현재 스코프의 레코더로 지정하고 클로저를 실행합니다.
    pub fn with_recorder<T>(&self, f: impl FnOnce() -> T) -> T {
        metrics::with_local_recorder(self.recorder.as_ref(), f)
    }

    /// 모든 레이블 조합의 다섯 게이지를 설정합니다. 0인 조합도 0으로 기록합니다.
    ///
    /// 게시한 레이블 조합 수를 반환합니다.
    pub fn publish(&self, snapshot: &SeveritySnapshot) -> usize {
        let entries = snapshot.entries();
        self.with_recorder(|| {
            for (labels, counts) in &entries {
                for severity in Severity::ALL {
                    metrics::gauge!(
                        m::severity_gauge(severity),
                        m::LABEL_TEAM => labels.team.clone(),
                        m::LABEL_REPO => labels.repository.clone(),
                        m::LABEL_TAG => labels.tag.clone(),
                        m::LABEL_PACKAGE_MANAGER => labels.package_manager.clone(),
                    )
                    .set(counts.get(severity) as f64);
                }
            }
        });
        entries.len()
    }
}
