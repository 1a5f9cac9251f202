//! 스캔 주기 통합 테스트
//!
//! JSON 픽스처 기반 소스로 인벤토리 → 상관 분석 → 파인딩 집계 → 스냅샷 게시
//! 전체 흐름을 검증합니다.

use std::path::PathBuf;
use std::sync::Arc;

use imgwarden_core::metrics as m;
use imgwarden_core::types::Inventory;
use imgwarden_scanner::{
    FileFindingsSource, FileInventorySource, FileWorkloadSource, FindingAggregator, FindingScope,
    InventorySource, ScanDepth, ScanState, ScanTarget, Scanner, ScannerBuilder,
    ScannerConfigBuilder, ScannerError, SnapshotLabels, SnapshotPublisher, WorkloadSource,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

type FileScanner = Scanner<FileInventorySource, FileWorkloadSource, FileFindingsSource>;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn build_scanner(target: ScanTarget, contexts: &[&str]) -> (FileScanner, PrometheusHandle) {
    let config = ScannerConfigBuilder::new()
        .target(target)
        .depth(ScanDepth::Full)
        .registry_id("424851304182")
        .contexts(contexts.iter().map(|c| (*c).to_owned()).collect())
        .page_size(2)
        .build()
        .unwrap();

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    let scanner = ScannerBuilder::new(
        FileInventorySource::new(fixture_path("inventory.json")),
        FileWorkloadSource::new(fixture_path("workloads.json")),
        FileFindingsSource::new(fixture_path("findings.json")),
    )
    .config(config)
    .publisher(SnapshotPublisher::new(Arc::new(recorder)))
    .build()
    .unwrap();

    (scanner, handle)
}

#[tokio::test]
async fn eks_cycle_correlates_and_counts_deployed_images() {
    let (scanner, _handle) = build_scanner(ScanTarget::Eks, &["preprod"]);

    let report = scanner.run_cycle().await.unwrap();

    // payments:v1 과 search:2.0 (워크로드는 latest로 참조) 이 배포됨
    let targets: Vec<(&str, &str)> = report.deployed.targets().collect();
    assert_eq!(targets, vec![("payments", "v1"), ("search", "2.0")]);
    assert_eq!(report.inventory.deployed_image_count(), 2);

    // payments:v1 3건 (알 수 없는 심각도 포함) + search:2.0 2건, 형식 오류 1건 제외
    assert_eq!(report.findings.len(), 5);
    assert_eq!(report.stats.malformed, 1);
    assert_eq!(report.snapshot.ignored, 1);
    assert_eq!(report.snapshot.tuples, 3);

    let snapshot = scanner.snapshot();
    let payments = snapshot
        .get(&SnapshotLabels::new("core", "payments", "v1", "NPM"))
        .unwrap();
    assert_eq!(payments.critical, 1);
    assert_eq!(payments.high, 1);

    let search_os = snapshot
        .get(&SnapshotLabels::new("discovery", "search", "2.0", "OS"))
        .unwrap();
    assert_eq!(search_os.low, 1);
    assert_eq!(scanner.state(), ScanState::Published);
}

#[tokio::test]
async fn eks_cycle_collects_every_context() {
    let (scanner, _handle) = build_scanner(ScanTarget::Eks, &["preprod", "prod"]);

    let report = scanner.run_cycle().await.unwrap();

    let payments_tags: Vec<&str> = report
        .deployed
        .tags("payments")
        .unwrap()
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(payments_tags, vec!["v1", "v2"]);
    assert_eq!(report.findings.len(), 6);
    assert!(report.findings.iter().any(|f| f.title.contains("zlib")));
    assert!(!report.deployed.contains_repository("legacy-batch"));
}

#[tokio::test]
async fn ecr_cycle_reports_registry_critical_and_high() {
    let (scanner, _handle) = build_scanner(ScanTarget::Ecr, &[]);

    let report = scanner.run_cycle().await.unwrap();

    assert!(report.deployed.is_empty());
    assert_eq!(report.findings.len(), 4);
    assert!(
        report
            .findings
            .iter()
            .all(|f| f.severity == "CRITICAL" || f.severity == "HIGH")
    );
    // page_size 2로 5건(형식 오류 포함)을 받으려면 3페이지
    assert_eq!(report.stats.pages, 3);
}

#[tokio::test]
async fn published_metrics_are_rendered() {
    let (scanner, handle) = build_scanner(ScanTarget::Eks, &["preprod", "prod"]);
    scanner.run_cycle().await.unwrap();

    let rendered = handle.render();
    assert!(rendered.contains(m::CRITICAL_VULNS));
    assert!(rendered.contains(m::INFORMATIONAL_VULNS));
    assert!(rendered.contains("team=\"core\""));
    assert!(rendered.contains("packagemanager=\"PIP\""));
    assert!(rendered.contains(m::SCAN_CYCLES_COMPLETED_TOTAL));
    assert!(rendered.contains(m::DEPLOYED_IMAGES));
}

#[tokio::test]
async fn unknown_context_aborts_cycle() {
    let (scanner, _handle) = build_scanner(ScanTarget::Eks, &["preprod", "staging"]);

    let err = scanner.run_cycle().await.unwrap_err();

    assert!(matches!(err, ScannerError::UnknownContext(ref ctx) if ctx == "staging"));
    assert!(scanner.snapshot().is_empty());
    assert_eq!(scanner.state(), ScanState::Idle);
}

#[tokio::test]
async fn missing_inventory_file_is_source_failure() {
    let config = ScannerConfigBuilder::new()
        .registry_id("424851304182")
        .build()
        .unwrap();
    let scanner = ScannerBuilder::new(
        FileInventorySource::new(fixture_path("missing.json")),
        FileWorkloadSource::new(fixture_path("workloads.json")),
        FileFindingsSource::new(fixture_path("findings.json")),
    )
    .config(config)
    .build()
    .unwrap();

    let err = scanner.run_cycle().await.unwrap_err();
    assert!(err.is_source_failure());
    assert_eq!(scanner.cycles_failed(), 1);
}

#[tokio::test]
async fn malformed_workloads_are_counted_by_source() {
    let source = FileWorkloadSource::new(fixture_path("workloads.json"));
    let workloads = source.list_workloads("prod").await.unwrap();
    assert_eq!(workloads.len(), 1);
    assert_eq!(source.malformed_records(), 1);
}

#[tokio::test]
async fn digest_lookup_feeds_image_digest_scope() {
    let inventory = Inventory::new(
        FileInventorySource::new(fixture_path("inventory.json"))
            .list_repositories()
            .await
            .unwrap(),
    );
    let reference = "424851304182.dkr.ecr.eu-central-1.amazonaws.com/payments@sha256:1111111111111111111111111111111111111111111111111111111111111111";
    let (repo, image) = inventory.find_by_digest(reference).unwrap();
    assert_eq!(repo.name, "payments");
    assert_eq!(image.tag, "v1");

    let aggregator = FindingAggregator::new(ScanDepth::Full, 100, 30);
    let scope = FindingScope::ImageDigest {
        digest: image.digest.clone(),
    };
    let findings = aggregator
        .collect(&FileFindingsSource::new(fixture_path("findings.json")), &scope)
        .await
        .unwrap();

    assert_eq!(findings.len(), 2);
    assert!(findings.iter().all(|f| f.image_tag == "v1"));
}
