//! 스캔 오케스트레이터 -- 주기 단위 스캔 흐름 관리
//!
//! [`Scanner`]는 한 번의 스캔 주기를 다음 순서로 실행합니다.
//!
//! ```text
//! InventorySource ──► Inventory
//!                        │
//!        ┌───────────────┴────────────────┐
//!        │ ecr                            │ eks
//!        ▼                                ▼
//!  Registry 스코프            WorkloadSource (컨텍스트별)
//!        │                                │
//!        │                           Correlator ──► DeployedMap
//!        │                                │
//!        │                     (repo, tag)마다 RepositoryTag 스코프
//!        └───────────────┬────────────────┘
//!                        ▼
//!               FindingAggregator ──► Vec<Finding>
//!                        │
//!               SeveritySnapshot::rebuild
//!                        │
//!               SnapshotPublisher::publish ──► gauges
//! ```
//!
//! 소스 에러가 발생하면 주기 전체가 실패하며 스냅샷은 재구성도 게시도 되지 않습니다.
//! 연속 모드에서는 실패를 기록하고 다음 주기까지 이전 스냅샷을 유지합니다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use imgwarden_core::metrics as m;
use imgwarden_core::types::{Finding, Inventory};

use crate::config::{ScanTarget, ScannerConfig};
use crate::correlate::{Correlator, DeployedMap};
use crate::error::ScannerError;
use crate::findings::{AggregationStats, FindingAggregator, FindingScope};
use crate::snapshot::{RebuildSummary, SeveritySnapshot, SnapshotPublisher};
use crate::source::{FindingsSource, InventorySource, WorkloadSource, with_deadline};

/// 스캐너 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// 대기 중
    Idle,
    /// 주기 실행 중
    Scanning(ScanTarget),
    /// 스냅샷 게시 완료
    Published,
}

/// 한 스캔 주기의 결과
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// 주기 식별자
    pub cycle_id: String,
    pub target: ScanTarget,
    /// 배포 여부가 반영된 인벤토리
    pub inventory: Inventory,
    /// 배포 맵 (ecr 대상에서는 비어있음)
    pub deployed: DeployedMap,
    /// 수집 순서대로의 파인딩
    pub findings: Vec<Finding>,
    pub stats: AggregationStats,
    pub snapshot: RebuildSummary,
    pub duration: Duration,
}

/// 주기 종료 시 상태를 정리하는 가드
///
/// 게시 전에 주기가 실패하거나 취소되면 상태를 `Idle`로 되돌립니다.
struct CycleGuard<'a> {
    state: &'a Mutex<ScanState>,
    published: bool,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        let next = if self.published {
            ScanState::Published
        } else {
            ScanState::Idle
        };
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }
}

/// 스캔 오케스트레이터
pub struct Scanner<I, W, F> {
    config: ScannerConfig,
    inventory_source: I,
    workload_source: W,
    findings_source: F,
    correlator: Correlator,
    aggregator: FindingAggregator,
    snapshot: Arc<SeveritySnapshot>,
    publisher: SnapshotPublisher,
    state: Mutex<ScanState>,
    cycles_completed: AtomicU64,
    cycles_failed: AtomicU64,
    findings_collected: AtomicU64,
    findings_pages: AtomicU64,
    malformed_findings: AtomicU64,
}

impl<I, W, F> Scanner<I, W, F>
where
    I: InventorySource,
    W: WorkloadSource,
    F: FindingsSource,
{
    /// 현재 상태를 반환합니다.
    pub fn state(&self) -> ScanState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ScanState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// 노출 경로와 공유하는 스냅샷
    pub fn snapshot(&self) -> Arc<SeveritySnapshot> {
        Arc::clone(&self.snapshot)
    }

    /// 게시까지 완료된 주기 수
    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed.load(Ordering::Relaxed)
    }

    /// 실패한 주기 수
    pub fn cycles_failed(&self) -> u64 {
        self.cycles_failed.load(Ordering::Relaxed)
    }

    fn begin_cycle(&self) -> Result<CycleGuard<'_>, ScannerError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*state, ScanState::Scanning(_)) {
            return Err(ScannerError::AlreadyScanning);
        }
        *state = ScanState::Scanning(self.config.target);
        Ok(CycleGuard {
            state: &self.state,
            published: false,
        })
    }

    /// 스캔 주기 한 번을 실행하고 스냅샷을 게시합니다.
    ///
    /// # Errors
    ///
    /// - 이미 주기가 진행 중: `ScannerError::AlreadyScanning`
    /// - 인벤토리/워크로드/파인딩 소스 실패: 해당 소스 에러 (스냅샷은 변경되지 않음)
    pub async fn run_cycle(&self) -> Result<CycleReport, ScannerError> {
        let mut guard = self.begin_cycle()?;
        let cycle_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();

        info!(
            cycle_id = %cycle_id,
            target = %self.config.target,
            depth = %self.config.depth,
            "scan cycle started"
        );

        let collected = self.collect(&cycle_id).await;
        let duration = started.elapsed();

        let (inventory, deployed, findings, stats) = match collected {
            Ok(parts) => parts,
            Err(e) => {
                self.cycles_failed.fetch_add(1, Ordering::Relaxed);
                self.record_cycle_metrics(duration, None);
                warn!(
                    cycle_id = %cycle_id,
                    error = %e,
                    elapsed_ms = duration.as_millis() as u64,
                    "scan cycle failed, snapshot not published"
                );
                return Err(e);
            }
        };

        let summary = self.snapshot.rebuild(&inventory, &findings);
        let published = self.publisher.publish(&self.snapshot);
        guard.published = true;

        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
        self.record_cycle_metrics(duration, Some(&inventory));

        info!(
            cycle_id = %cycle_id,
            findings = findings.len(),
            pages = stats.pages,
            malformed = stats.malformed,
            tuples = published,
            ignored = summary.ignored,
            elapsed_ms = duration.as_millis() as u64,
            "scan cycle published"
        );

        Ok(CycleReport {
            cycle_id,
            target: self.config.target,
            inventory,
            deployed,
            findings,
            stats,
            snapshot: summary,
            duration,
        })
    }

    async fn collect(
        &self,
        cycle_id: &str,
    ) -> Result<(Inventory, DeployedMap, Vec<Finding>, AggregationStats), ScannerError> {
        let timeout = self.config.query_timeout_secs;
        let repositories = with_deadline(
            "inventory",
            timeout,
            self.inventory_source.list_repositories(),
        )
        .await?;
        let mut inventory = Inventory::new(repositories);
        debug!(
            cycle_id,
            repositories = inventory.repository_count(),
            images = inventory.image_count(),
            "inventory listed"
        );

        let mut findings = Vec::new();
        let mut stats = AggregationStats::default();

        let deployed = match self.config.target {
            ScanTarget::Ecr => {
                let scope = FindingScope::Registry {
                    registry_id: self.config.registry_id.clone(),
                };
                stats.merge(self.collect_scope(&scope, &mut findings).await?);
                DeployedMap::new()
            }
            ScanTarget::Eks => {
                let mut workloads = Vec::new();
                for context in &self.config.contexts {
                    let mut listed = with_deadline(
                        "workloads",
                        timeout,
                        self.workload_source.list_workloads(context),
                    )
                    .await?;
                    debug!(cycle_id, context = %context, workloads = listed.len(), "workloads listed");
                    workloads.append(&mut listed);
                }

                let deployed = self.correlator.correlate(&mut inventory, &workloads);
                for (repository, tag) in deployed.targets() {
                    let scope = FindingScope::RepositoryTag {
                        repository: repository.to_owned(),
                        tag: tag.to_owned(),
                    };
                    stats.merge(self.collect_scope(&scope, &mut findings).await?);
                }
                deployed
            }
        };

        Ok((inventory, deployed, findings, stats))
    }

    async fn collect_scope(
        &self,
        scope: &FindingScope,
        findings: &mut Vec<Finding>,
    ) -> Result<AggregationStats, ScannerError> {
        let result = self
            .aggregator
            .collect_into(&self.findings_source, scope, findings)
            .await;
        if let Ok(stats) = &result {
            self.findings_pages
                .fetch_add(stats.pages as u64, Ordering::Relaxed);
            self.findings_collected
                .fetch_add(stats.collected as u64, Ordering::Relaxed);
            self.malformed_findings
                .fetch_add(stats.malformed as u64, Ordering::Relaxed);
        }
        result
    }

    /// 운영 메트릭을 레코더에 기록합니다.
    ///
    /// `inventory`가 `Some`이면 성공한 주기입니다.
    fn record_cycle_metrics(&self, duration: Duration, inventory: Option<&Inventory>) {
        let target = self.config.target.as_str();
        let completed = self.cycles_completed();
        let failed = self.cycles_failed();
        let collected = self.findings_collected.load(Ordering::Relaxed);
        let pages = self.findings_pages.load(Ordering::Relaxed);
        let malformed_findings = self.malformed_findings.load(Ordering::Relaxed);
        let malformed_workloads = self.workload_source.malformed_records();

        self.publisher.with_recorder(|| {
            metrics::counter!(m::SCAN_CYCLES_COMPLETED_TOTAL, m::LABEL_TARGET => target)
                .absolute(completed);
            metrics::counter!(m::SCAN_CYCLES_FAILED_TOTAL, m::LABEL_TARGET => target)
                .absolute(failed);
            metrics::histogram!(m::SCAN_CYCLE_DURATION_SECONDS).record(duration.as_secs_f64());
            metrics::counter!(m::FINDINGS_COLLECTED_TOTAL).absolute(collected);
            metrics::counter!(m::FINDINGS_PAGES_TOTAL).absolute(pages);
            metrics::counter!(m::MALFORMED_RECORDS_TOTAL, "kind" => "finding")
                .absolute(malformed_findings);
            metrics::counter!(m::MALFORMED_RECORDS_TOTAL, "kind" => "workload")
                .absolute(malformed_workloads);

            if let Some(inventory) = inventory {
                metrics::gauge!(m::DEPLOYED_IMAGES).set(inventory.deployed_image_count() as f64);
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs_f64())
                    .unwrap_or_default();
                metrics::gauge!(m::LAST_SUCCESSFUL_CYCLE_TIMESTAMP).set(now);
            }
        });
    }

    /// 연속 모드: 주기 실행, 게시, `interval_secs` 대기를 취소될 때까지 반복합니다.
    ///
    /// 실패한 주기는 기록만 하고 이전 스냅샷을 유지한 채 다음 주기로 넘어갑니다.
    /// 주기가 성공할 때마다 `on_cycle`이 호출됩니다.
    /// `interval_secs`가 0이면 주기를 실행하지 않고 바로 반환합니다.
    pub async fn run_periodic(
        &self,
        cancel: CancellationToken,
        mut on_cycle: impl FnMut(&CycleReport) + Send,
    ) {
        if self.config.interval_secs == 0 {
            warn!("interval_secs is 0, periodic scan loop not started");
            return;
        }
        let interval = Duration::from_secs(self.config.interval_secs);
        info!(
            interval_secs = self.config.interval_secs,
            target = %self.config.target,
            "periodic scan loop started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.run_cycle() => match result {
                    Ok(report) => on_cycle(&report),
                    Err(e) => warn!(
                        error = %e,
                        failed_cycles = self.cycles_failed(),
                        "keeping previous snapshot until next cycle"
                    ),
                },
            }

            self.set_state(ScanState::Idle);

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!(
            completed = self.cycles_completed(),
            failed = self.cycles_failed(),
            "periodic scan loop stopped"
        );
    }
}

/// [`Scanner`] 빌더
pub struct ScannerBuilder<I, W, F> {
    config: ScannerConfig,
    inventory_source: I,
    workload_source: W,
    findings_source: F,
    correlator: Option<Correlator>,
    publisher: Option<SnapshotPublisher>,
}

impl<I, W, F> ScannerBuilder<I, W, F>
where
    I: InventorySource,
    W: WorkloadSource,
    F: FindingsSource,
{
    /// 세 소스로 새 빌더를 생성합니다.
    pub fn new(inventory_source: I, workload_source: W, findings_source: F) -> Self {
        Self {
            config: ScannerConfig::default(),
            inventory_source,
            workload_source,
            findings_source,
            correlator: None,
            publisher: None,
        }
    }

    pub fn config(mut self, config: ScannerConfig) -> Self {
        self.config = config;
        self
    }

    /// 상관 분석기를 지정합니다 (기본: 인덱스 매처).
    pub fn correlator(mut self, correlator: Correlator) -> Self {
        self.correlator = Some(correlator);
        self
    }

    /// 스냅샷 게시자를 지정합니다.
    ///
    /// 지정하지 않으면 아무것도 기록하지 않는 레코더를 사용합니다.
    pub fn publisher(mut self, publisher: SnapshotPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// 설정을 검증하고 스캐너를 빌드합니다.
    pub fn build(self) -> Result<Scanner<I, W, F>, ScannerError> {
        self.config.validate()?;

        let aggregator = FindingAggregator::new(
            self.config.depth,
            self.config.page_size,
            self.config.query_timeout_secs,
        );
        let snapshot = Arc::new(SeveritySnapshot::new(self.config.owner_tag_key.clone()));
        let publisher = self
            .publisher
            .unwrap_or_else(|| SnapshotPublisher::new(Arc::new(metrics::NoopRecorder)));

        Ok(Scanner {
            config: self.config,
            inventory_source: self.inventory_source,
            workload_source: self.workload_source,
            findings_source: self.findings_source,
            correlator: self.correlator.unwrap_or_default(),
            aggregator,
            snapshot,
            publisher,
            state: Mutex::new(ScanState::Idle),
            cycles_completed: AtomicU64::new(0),
            cycles_failed: AtomicU64::new(0),
            findings_collected: AtomicU64::new(0),
            findings_pages: AtomicU64::new(0),
            malformed_findings: AtomicU64::new(0),
        })
    }
}
