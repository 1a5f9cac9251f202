//! JSON 문서 기반 소스 구현
//!
//! 클라우드 SDK 없이 전체 스캔 주기를 실행할 수 있도록 디스크의 JSON 문서를
//! 소스로 사용합니다. 매 호출마다 파일을 다시 읽으므로 주기 사이에 문서를
//! 갱신하면 다음 주기에 반영됩니다.
//!
//! # 문서 형식
//!
//! - 인벤토리: `[{"name", "arn", "images": [{"digest", "tag"}], "tags": {..}}]`
//! - 워크로드: `{"contexts": {"<context>": [{"name", "namespace", "container_statuses": [..]}]}}`
//! - 파인딩: `[RawFinding, ..]` (필터 적용 후 `page_size` 단위로 잘라 반환)

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use imgwarden_core::types::{ImageRecord, ObservedWorkload, RepositoryRecord};

use super::image_ref::{RawPod, workloads_from_pod};
use super::{FindingPage, FindingQuery, FindingsSource, InventorySource, RawFinding, WorkloadSource};
use crate::error::ScannerError;

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ScannerError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ScannerError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
    serde_json::from_str(&content).map_err(|e| ScannerError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    name: String,
    #[serde(default)]
    arn: String,
    #[serde(default)]
    images: Vec<RawImage>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawImage {
    #[serde(default)]
    digest: String,
    #[serde(default)]
    tag: Option<String>,
}

/// 인벤토리 JSON 문서 소스
#[derive(Debug, Clone)]
pub struct FileInventorySource {
    path: PathBuf,
}

impl FileInventorySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl InventorySource for FileInventorySource {
    async fn list_repositories(&self) -> Result<Vec<RepositoryRecord>, ScannerError> {
        let raw: Vec<RawRepository> = read_json(&self.path).await?;
        let mut repositories = Vec::with_capacity(raw.len());

        for repo in raw {
            let mut record = RepositoryRecord::new(repo.name, repo.arn);
            record.tags = repo.tags;

            let mut seen = HashSet::new();
            for image in repo.images {
                if image.digest.is_empty() {
                    warn!(repository = %record.name, "skipping image without digest");
                    continue;
                }
                if !seen.insert(image.digest.clone()) {
                    debug!(
                        repository = %record.name,
                        digest = %image.digest,
                        "duplicate digest in repository, keeping first entry"
                    );
                    continue;
                }
                record.images.push(ImageRecord::new(image.digest, image.tag));
            }
            repositories.push(record);
        }

        debug!(
            path = %self.path.display(),
            repositories = repositories.len(),
            "inventory loaded"
        );
        Ok(repositories)
    }
}

#[derive(Debug, Default, Deserialize)]
struct WorkloadDocument {
    #[serde(default)]
    contexts: BTreeMap<String, Vec<RawPod>>,
}

/// 워크로드 JSON 문서 소스
///
/// 문서에 없는 컨텍스트를 요청하면 `ScannerError::UnknownContext`를 반환합니다.
#[derive(Debug)]
pub struct FileWorkloadSource {
    path: PathBuf,
    malformed: AtomicU64,
}

impl FileWorkloadSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            malformed: AtomicU64::new(0),
        }
    }
}

impl WorkloadSource for FileWorkloadSource {
    async fn list_workloads(&self, context: &str) -> Result<Vec<ObservedWorkload>, ScannerError> {
        let document: WorkloadDocument = read_json(&self.path).await?;
        let pods = document
            .contexts
            .get(context)
            .ok_or_else(|| ScannerError::UnknownContext(context.to_owned()))?;

        let mut workloads = Vec::new();
        for pod in pods {
            let (mut converted, skipped) = workloads_from_pod(pod);
            workloads.append(&mut converted);
            self.malformed.fetch_add(skipped, Ordering::Relaxed);
        }

        debug!(context, pods = pods.len(), workloads = workloads.len(), "workloads loaded");
        Ok(workloads)
    }

    fn malformed_records(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }
}

/// 파인딩 JSON 문서 소스
///
/// 커서는 필터 적용 결과에서의 오프셋(10진수 문자열)입니다.
#[derive(Debug, Clone)]
pub struct FileFindingsSource {
    path: PathBuf,
}

impl FileFindingsSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FindingsSource for FileFindingsSource {
    async fn list_findings(&self, query: &FindingQuery) -> Result<FindingPage, ScannerError> {
        let all: Vec<RawFinding> = read_json(&self.path).await?;

        let offset = match &query.cursor {
            Some(cursor) => cursor.parse::<usize>().map_err(|_| {
                ScannerError::SourceUnavailable {
                    source_name: "findings".to_owned(),
                    reason: format!("invalid continuation cursor '{cursor}'"),
                }
            })?,
            None => 0,
        };

        let matching: Vec<RawFinding> = all
            .into_iter()
            .filter(|f| query.filter.matches(f))
            .collect();
        let page_size = usize::try_from(query.max_results.max(1)).unwrap_or(usize::MAX);
        let end = offset.saturating_add(page_size).min(matching.len());
        let findings = matching
            .get(offset..end)
            .map(<[RawFinding]>::to_vec)
            .unwrap_or_default();
        let next_cursor = (end < matching.len()).then(|| end.to_string());

        Ok(FindingPage {
            findings,
            next_cursor,
        })
    }
}
