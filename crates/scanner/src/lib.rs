//! # imgwarden-scanner
//!
//! 레지스트리 인벤토리와 실행 중 워크로드를 다이제스트로 상관 분석하고,
//! 스코프별 보안 파인딩을 페이지 단위로 집계하여 심각도 스냅샷으로 게시합니다.
//!
//! # Module Structure
//!
//! - [`error`]: 도메인 에러 타입 (`ScannerError`)
//! - [`config`]: 스캐너 설정 (`ScannerConfig`, 빌더, `ScanTarget`, `ScanDepth`)
//! - [`source`]: 외부 소스 trait과 JSON 문서 기반 구현, 이미지 참조 파싱
//! - [`correlate`]: 배포 상관 분석 (`Correlator`, `DigestMatcher`, `DeployedMap`)
//! - [`findings`]: 파인딩 집계 (`FindingScope`, `FindingAggregator`)
//! - [`snapshot`]: 심각도 스냅샷 (`SeveritySnapshot`, `SnapshotPublisher`)
//! - [`scanner`]: 오케스트레이터 (`Scanner`, `ScannerBuilder`, `CycleReport`)
//!
//! # Architecture
//!
//! ```text
//! Inventory ──► Correlator ──► (repository, tag) ──► FindingAggregator
//!                                                          │
//!                                                   Vec<Finding>
//!                                                          │
//!                                   SeveritySnapshot ◄─────┘
//!                                          │
//!                                   SnapshotPublisher ──► Recorder
//! ```

pub mod config;
pub mod correlate;
pub mod error;
pub mod findings;
pub mod scanner;
pub mod snapshot;
pub mod source;

// --- Public API Re-exports ---

// Scanner (main orchestrator)
pub use scanner::{CycleReport, ScanState, Scanner, ScannerBuilder};

// Configuration
pub use config::{ScanDepth, ScanTarget, ScannerConfig, ScannerConfigBuilder};

// Error
pub use error::ScannerError;

// Correlation
pub use correlate::{Correlator, DeployedMap, DigestMatcher, IndexedMatcher, LinearMatcher};

// Findings
pub use findings::{AggregationStats, FindingAggregator, FindingScope};

// Snapshot
pub use snapshot::{
    RebuildSummary, SeverityCounts, SeveritySnapshot, SnapshotLabels, SnapshotPublisher,
};

// Sources
pub use source::file::{FileFindingsSource, FileInventorySource, FileWorkloadSource};
pub use source::image_ref::{ImageReference, RawContainerStatus, RawPod, parse_image_reference};
pub use source::{
    FindingFilter, FindingPage, FindingQuery, FindingsSource, InventorySource, RawFinding,
    RawPackage, WorkloadSource,
};
