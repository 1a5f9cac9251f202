//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 스캐너는 이 상수를 사용하여 `metrics::gauge!()`, `metrics::counter!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `imgwarden_`
//! - 심각도 게이지: `imgwarden_{severity}_vulns`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! 전역 레코더는 설치하지 않습니다. 호출자는 소유한 레코더를
//! `metrics::with_local_recorder()`로 지정한 뒤 매크로를 호출합니다.

use crate::types::Severity;

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 소유 팀 레이블 키
pub const LABEL_TEAM: &str = "team";

/// 리포지토리 레이블 키
pub const LABEL_REPO: &str = "repo";

/// 이미지 태그 레이블 키
pub const LABEL_TAG: &str = "tag";

/// 패키지 관리자 레이블 키
pub const LABEL_PACKAGE_MANAGER: &str = "packagemanager";

/// 스캔 대상 레이블 키 (ecr, eks)
pub const LABEL_TARGET: &str = "target";

// ─── 심각도 스냅샷 게이지 ─────────────────────────────────────────

/// 치명적 취약점 수 (gauge, labels: team, repo, tag, packagemanager)
pub const CRITICAL_VULNS: &str = "imgwarden_critical_vulns";

/// 높은 취약점 수 (gauge)
pub const HIGH_VULNS: &str = "imgwarden_high_vulns";

/// 중간 취약점 수 (gauge)
pub const MEDIUM_VULNS: &str = "imgwarden_medium_vulns";

/// 낮은 취약점 수 (gauge)
pub const LOW_VULNS: &str = "imgwarden_low_vulns";

/// 정보성 취약점 수 (gauge)
pub const INFORMATIONAL_VULNS: &str = "imgwarden_informational_vulns";

// ─── 스캔 주기 메트릭 ──────────────────────────────────────────────

/// 완료된 스캔 주기 수 (counter, label: target)
pub const SCAN_CYCLES_COMPLETED_TOTAL: &str = "imgwarden_scan_cycles_completed_total";

/// 실패한 스캔 주기 수 (counter, label: target)
pub const SCAN_CYCLES_FAILED_TOTAL: &str = "imgwarden_scan_cycles_failed_total";

/// 스캔 주기 소요 시간 (histogram, 초)
pub const SCAN_CYCLE_DURATION_SECONDS: &str = "imgwarden_scan_cycle_duration_seconds";

/// 마지막 성공 주기 시각 (gauge, Unix epoch)
pub const LAST_SUCCESSFUL_CYCLE_TIMESTAMP: &str = "imgwarden_last_successful_cycle_timestamp";

/// 수집된 파인딩 수 (counter)
pub const FINDINGS_COLLECTED_TOTAL: &str = "imgwarden_findings_collected_total";

/// 조회한 파인딩 페이지 수 (counter)
pub const FINDINGS_PAGES_TOTAL: &str = "imgwarden_findings_pages_total";

/// 형식이 잘못되어 건너뛴 레코드 수 (counter, label: kind)
pub const MALFORMED_RECORDS_TOTAL: &str = "imgwarden_malformed_records_total";

/// 배포된 것으로 표시된 이미지 수 (gauge)
pub const DEPLOYED_IMAGES: &str = "imgwarden_deployed_images";

/// 빌드 정보 (gauge, 항상 1, label: version)
pub const BUILD_INFO: &str = "imgwarden_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 스캔 주기 소요 시간 히스토그램 버킷 (초)
///
/// 파인딩 API 페이지네이션 포함, 1s ~ 30m 범위
pub const SCAN_CYCLE_DURATION_BUCKETS: [f64; 9] =
    [1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0];

/// 심각도에 대응하는 게이지 이름을 반환합니다.
pub fn severity_gauge(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => CRITICAL_VULNS,
        Severity::High => HIGH_VULNS,
        Severity::Medium => MEDIUM_VULNS,
        Severity::Low => LOW_VULNS,
        Severity::Informational => INFORMATIONAL_VULNS,
    }
}

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 현재 스코프의 레코더(로컬 레코더 포함)에 HELP 텍스트를 설정합니다.
/// 레코더가 없으면 아무 일도 하지 않습니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_gauge!(CRITICAL_VULNS, "Number of Critical Vulnerabilities");
    describe_gauge!(HIGH_VULNS, "Number of High Vulnerabilities");
    describe_gauge!(MEDIUM_VULNS, "Number of Medium Vulnerabilities");
    describe_gauge!(LOW_VULNS, "Number of Low Vulnerabilities");
    describe_gauge!(
        INFORMATIONAL_VULNS,
        "Number of Informational Vulnerabilities"
    );

    describe_counter!(
        SCAN_CYCLES_COMPLETED_TOTAL,
        "Total number of scan cycles that published a snapshot"
    );
    describe_counter!(
        SCAN_CYCLES_FAILED_TOTAL,
        "Total number of scan cycles aborted before publication"
    );
    describe_histogram!(
        SCAN_CYCLE_DURATION_SECONDS,
        "Time to complete a single scan cycle in seconds"
    );
    describe_gauge!(
        LAST_SUCCESSFUL_CYCLE_TIMESTAMP,
        "Unix timestamp of the last published snapshot"
    );
    describe_counter!(
        FINDINGS_COLLECTED_TOTAL,
        "Total number of findings collected from the findings source"
    );
    describe_counter!(
        FINDINGS_PAGES_TOTAL,
        "Total number of findings pages requested"
    );
    describe_counter!(
        MALFORMED_RECORDS_TOTAL,
        "Total number of workload or finding records skipped as malformed"
    );
    describe_gauge!(
        DEPLOYED_IMAGES,
        "Number of registry images observed running in the cluster"
    );
    describe_gauge!(BUILD_INFO, "Build information (always 1, with version label)");
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        CRITICAL_VULNS,
        HIGH_VULNS,
        MEDIUM_VULNS,
        LOW_VULNS,
        INFORMATIONAL_VULNS,
        SCAN_CYCLES_COMPLETED_TOTAL,
        SCAN_CYCLES_FAILED_TOTAL,
        SCAN_CYCLE_DURATION_SECONDS,
        LAST_SUCCESSFUL_CYCLE_TIMESTAMP,
        FINDINGS_COLLECTED_TOTAL,
        FINDINGS_PAGES_TOTAL,
        MALFORMED_RECORDS_TOTAL,
        DEPLOYED_IMAGES,
        BUILD_INFO,
    ];

    #[test]
    fn all_metrics_start_with_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("imgwarden_"),
                "Metric '{}' does not start with 'imgwarden_' prefix",
                name
            );
        }
    }

    #[test]
    fn every_severity_has_distinct_gauge() {
        let mut names: Vec<&str> = Severity::ALL.iter().map(|s| severity_gauge(*s)).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 5);
    }

    #[test]
    fn describe_all_does_not_panic() {
        // describe_all() should not panic even without a recorder installed
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        let labels = [
            LABEL_TEAM,
            LABEL_REPO,
            LABEL_TAG,
            LABEL_PACKAGE_MANAGER,
            LABEL_TARGET,
        ];
        for label in &labels {
            assert_eq!(label.to_lowercase(), *label);
        }
    }

    #[test]
    fn scan_cycle_duration_buckets_are_sorted() {
        let buckets = SCAN_CYCLE_DURATION_BUCKETS;
        for i in 1..buckets.len() {
            assert!(
                buckets[i] > buckets[i - 1],
                "Bucket values must be in ascending order"
            );
        }
    }
}
