//! 도메인 타입 -- 인벤토리, 워크로드, 파인딩
//!
//! 레지스트리 인벤토리(리포지토리/이미지), 클러스터에서 관찰된 워크로드,
//! 보안 파인딩을 표현하는 공유 데이터 모델입니다.
//! 로직은 최소한으로 유지하며, 상관 분석과 집계는 `imgwarden-scanner`가 담당합니다.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 태그가 없는 이미지에 부여하는 센티넬 태그
pub const UNTAGGED: &str = "untagged";

/// 심각도 레벨
///
/// 파인딩 소스가 보고하는 다섯 가지 심각도 버킷입니다.
/// `Ord` 구현으로 비교가 가능합니다 (`Informational < Low < Medium < High < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// 정보성
    #[default]
    Informational,
    /// 낮음
    Low,
    /// 중간
    Medium,
    /// 높음
    High,
    /// 치명적
    Critical,
}

impl Severity {
    /// 모든 심각도 (높은 순)
    pub const ALL: [Severity; 5] = [
        Self::Critical,
        Self::High,
        Self::Medium,
        Self::Low,
        Self::Informational,
    ];

    /// 파인딩 소스의 대문자 레이블을 파싱합니다.
    ///
    /// 다섯 개의 레이블만 정확히 일치해야 합니다. 약어나 소문자는 `None`입니다.
    pub fn from_wire_str(s: &str) -> Option<Self> {
        match s {
            "INFORMATIONAL" => Some(Self::Informational),
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            "CRITICAL" => Some(Self::Critical),
            _ => None,
        }
    }

    /// 파인딩 소스에서 사용하는 대문자 레이블을 반환합니다.
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Self::Informational => "INFORMATIONAL",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire_str())
    }
}

/// 레지스트리 이미지 레코드
///
/// 소유 리포지토리 내에서 `digest`는 유일합니다.
/// `deployed`는 상관 분석기만 변경합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// 콘텐츠 다이제스트 (예: `sha256:...`)
    pub digest: String,
    /// 사람이 읽는 태그 (없으면 [`UNTAGGED`])
    pub tag: String,
    /// 실행 중인 워크로드에서 관찰되었는지 여부
    #[serde(default)]
    pub deployed: bool,
}

impl ImageRecord {
    /// 다이제스트와 선택적 태그로 이미지 레코드를 생성합니다.
    pub fn new(digest: impl Into<String>, tag: Option<String>) -> Self {
        let tag = tag
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNTAGGED.to_owned());
        Self {
            digest: digest.into(),
            tag,
            deployed: false,
        }
    }
}

/// 레지스트리 리포지토리 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    /// 리포지토리 이름 (스캔 주기 내 유일)
    pub name: String,
    /// 리소스 식별자 (ARN 등)
    #[serde(default)]
    pub arn: String,
    /// 이미지 목록 (레지스트리 반환 순서 유지)
    #[serde(default)]
    pub images: Vec<ImageRecord>,
    /// 소유권 태그 (예: `Team` -> `payments`)
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl RepositoryRecord {
    /// 이름으로 빈 리포지토리를 생성합니다.
    pub fn new(name: impl Into<String>, arn: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arn: arn.into(),
            images: Vec::new(),
            tags: BTreeMap::new(),
        }
    }

    /// 이미지를 추가합니다.
    pub fn with_image(mut self, image: ImageRecord) -> Self {
        self.images.push(image);
        self
    }

    /// 소유권 태그를 추가합니다.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// 레지스트리 인벤토리
///
/// 한 스캔 주기 동안 알려진 전체 리포지토리와 이미지입니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory {
    repositories: Vec<RepositoryRecord>,
}

impl Inventory {
    /// 리포지토리 목록으로 인벤토리를 생성합니다.
    pub fn new(repositories: Vec<RepositoryRecord>) -> Self {
        Self { repositories }
    }

    pub fn repositories(&self) -> &[RepositoryRecord] {
        &self.repositories
    }

    /// 상관 분석기 전용 가변 접근
    pub fn repositories_mut(&mut self) -> &mut [RepositoryRecord] {
        &mut self.repositories
    }

    pub fn repository_count(&self) -> usize {
        self.repositories.len()
    }

    pub fn image_count(&self) -> usize {
        self.repositories.iter().map(|r| r.images.len()).sum()
    }

    /// `deployed`로 표시된 이미지 수를 반환합니다.
    pub fn deployed_image_count(&self) -> usize {
        self.repositories
            .iter()
            .flat_map(|r| r.images.iter())
            .filter(|i| i.deployed)
            .count()
    }

    /// 이름으로 리포지토리를 검색합니다.
    pub fn find_repository(&self, name: &str) -> Option<&RepositoryRecord> {
        self.repositories.iter().find(|r| r.name == name)
    }

    /// 리포지토리의 소유자 태그 값을 반환합니다.
    ///
    /// 리포지토리나 태그가 없으면 빈 문자열을 반환합니다.
    pub fn owner_of(&self, repository: &str, tag_key: &str) -> &str {
        self.find_repository(repository)
            .and_then(|r| r.tags.get(tag_key))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// 이미지 참조(`name@sha256:...`)의 다이제스트로 레지스트리 전체를 검색합니다.
    ///
    /// `@`가 없는 입력은 다이제스트 자체로 취급합니다.
    /// 반환값은 (리포지토리 레코드, 이미지 레코드)입니다.
    ///
    /// 스캔 주기에서는 호출하지 않는 라이브러리 전용 API입니다. 단일 이미지 조회는
    /// 스캐너 크레이트의 `FindingScope::ImageDigest`와 함께 사용합니다.
    pub fn find_by_digest(&self, reference: &str) -> Option<(&RepositoryRecord, &ImageRecord)> {
        let digest = match reference.split_once('@') {
            Some((_, d)) => d,
            None => reference,
        };
        if digest.is_empty() {
            return None;
        }
        self.repositories.iter().find_map(|repo| {
            repo.images
                .iter()
                .find(|img| img.digest == digest)
                .map(|img| (repo, img))
        })
    }
}

/// 클러스터에서 관찰된 워크로드 (컨테이너 단위)
///
/// 매 상관 분석 주기마다 현재 클러스터 상태에서 다시 만들어집니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedWorkload {
    /// 파드 이름
    pub name: String,
    /// 네임스페이스
    pub namespace: String,
    /// 컨테이너 이미지 참조
    pub image: String,
    /// 해석된 콘텐츠 다이제스트
    pub digest: String,
    /// 이미지 참조의 태그
    pub tag: String,
    /// 이미지 참조의 리포지토리 이름
    pub repository: String,
}

impl fmt::Display for ObservedWorkload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({}:{} {})",
            self.namespace, self.name, self.repository, self.tag, self.digest
        )
    }
}

/// 단일 보안 파인딩
///
/// 실행마다 조회되는 읽기 전용 사실이며, 식별자 기준 중복 제거를 하지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// 제목 (보통 CVE ID 포함)
    pub title: String,
    /// 소스가 보고한 심각도 문자열 (대문자)
    pub severity: String,
    /// 수정 가능 여부 (YES, NO, PARTIAL)
    pub fix_available: String,
    /// 조치 방법
    pub remediation: String,
    /// 패키지 관리자 분류 (NPM, OS, PIP 등)
    pub package_manager: String,
    /// 리포지토리 이름
    pub repository: String,
    /// 이미지 태그
    pub image_tag: String,
}

impl Finding {
    /// 심각도 버킷을 반환합니다. 알 수 없는 값이면 `None`입니다.
    pub fn severity_bucket(&self) -> Option<Severity> {
        Severity::from_wire_str(&self.severity)
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}:{})",
            self.severity, self.title, self.repository, self.image_tag
        )
    }
}
