//! 파인딩 페이지네이션 시나리오 테스트

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use imgwarden_scanner::{
    FindingAggregator, FindingPage, FindingQuery, FindingScope, FindingsSource, RawFinding,
    RawPackage, ScanDepth, ScannerError,
};

/// 고정된 페이지 목록을 커서 순서대로 반환하는 소스
struct FixedPages {
    pages: Vec<FindingPage>,
    calls: AtomicUsize,
}

impl FixedPages {
    fn new(pages: Vec<FindingPage>) -> Self {
        Self {
            pages,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl FindingsSource for FixedPages {
    async fn list_findings(&self, query: &FindingQuery) -> Result<FindingPage, ScannerError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let index = match query.cursor.as_deref() {
            None => 0,
            Some(cursor) => cursor
                .strip_prefix("page-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| ScannerError::SourceUnavailable {
                    source_name: "findings".to_owned(),
                    reason: format!("bad cursor {cursor}"),
                })?,
        };
        Ok(self.pages.get(index).cloned().unwrap_or_default())
    }
}

fn finding(title: &str) -> RawFinding {
    RawFinding {
        title: Some(title.to_owned()),
        severity: Some("HIGH".to_owned()),
        status: Some("ACTIVE".to_owned()),
        repository_name: Some("payments".to_owned()),
        image_tags: vec!["v1".to_owned()],
        vulnerable_packages: vec![RawPackage {
            package_manager: Some("NPM".to_owned()),
            remediation: None,
        }],
        ..Default::default()
    }
}

fn three_plus_two() -> Vec<FindingPage> {
    vec![
        FindingPage {
            findings: vec![finding("f1"), finding("f2"), finding("f3")],
            next_cursor: Some("page-1".to_owned()),
        },
        FindingPage {
            findings: vec![finding("f4"), finding("f5")],
            next_cursor: None,
        },
    ]
}

fn scope() -> FindingScope {
    FindingScope::RepositoryTag {
        repository: "payments".to_owned(),
        tag: "v1".to_owned(),
    }
}

#[tokio::test]
async fn full_mode_three_plus_two_pages_yields_five_without_duplicates() {
    let source = FixedPages::new(three_plus_two());
    let aggregator = FindingAggregator::new(ScanDepth::Full, 100, 30);

    let findings = aggregator.collect(&source, &scope()).await.unwrap();

    assert_eq!(findings.len(), 5);
    assert_eq!(source.calls(), 2);
    let mut titles: Vec<&str> = findings.iter().map(|f| f.title.as_str()).collect();
    titles.dedup();
    assert_eq!(titles, vec!["f1", "f2", "f3", "f4", "f5"]);
}

#[tokio::test]
async fn short_mode_never_issues_more_than_one_query() {
    let source = FixedPages::new(three_plus_two());
    let aggregator = FindingAggregator::new(ScanDepth::Short, 100, 30);

    let findings = aggregator.collect(&source, &scope()).await.unwrap();

    assert_eq!(findings.len(), 3);
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn full_mode_is_idempotent_across_runs() {
    let source = FixedPages::new(three_plus_two());
    let aggregator = FindingAggregator::new(ScanDepth::Full, 100, 30);

    let first = aggregator.collect(&source, &scope()).await.unwrap();
    let second = aggregator.collect(&source, &scope()).await.unwrap();

    assert_eq!(first.len(), second.len());
    assert_eq!(first, second);
}

/// 요청마다 미리 정해진 응답을 꺼내는 소스
struct Sequenced {
    responses: Mutex<VecDeque<Result<FindingPage, ScannerError>>>,
}

impl FindingsSource for Sequenced {
    async fn list_findings(&self, _query: &FindingQuery) -> Result<FindingPage, ScannerError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(FindingPage::default()))
    }
}

#[tokio::test]
async fn cursor_failure_keeps_findings_from_earlier_scopes() {
    let source = Sequenced {
        responses: Mutex::new(VecDeque::from([
            Ok(FindingPage {
                findings: vec![finding("earlier")],
                next_cursor: None,
            }),
            Ok(FindingPage {
                findings: vec![finding("partial")],
                next_cursor: Some("page-1".to_owned()),
            }),
            Err(ScannerError::Timeout {
                source_name: "findings".to_owned(),
                timeout_secs: 30,
            }),
        ])),
    };
    let aggregator = FindingAggregator::new(ScanDepth::Full, 100, 30);
    let mut accumulated = Vec::new();

    aggregator
        .collect_into(&source, &scope(), &mut accumulated)
        .await
        .unwrap();
    let err = aggregator
        .collect_into(&source, &scope(), &mut accumulated)
        .await
        .unwrap_err();

    assert!(matches!(err, ScannerError::Pagination { pages: 1, .. }));
    assert_eq!(accumulated.len(), 1);
    assert_eq!(accumulated[0].title, "earlier");
}
