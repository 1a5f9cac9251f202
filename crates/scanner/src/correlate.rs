//! 배포 상관 분석 -- 인벤토리 이미지와 실행 중 워크로드를 다이제스트로 매칭
//!
//! 이미지는 같은 리포지토리 이름을 가진 워크로드 중 하나 이상의 다이제스트와
//! 정확히 일치할 때만 배포된 것으로 표시됩니다. 태그만 같거나 다이제스트가
//! 부분 일치하는 경우는 매칭되지 않습니다.
//!
//! 매칭 단계는 [`DigestMatcher`] trait으로 추상화되어 있습니다.
//!
//! - [`LinearMatcher`]: 중첩 순회, O(리포지토리 × 이미지 × 워크로드). 기준 구현
//! - [`IndexedMatcher`]: 리포지토리 → 다이제스트 집합 인덱스, O(이미지 + 워크로드). 기본값
//!
//! 두 구현은 관찰 가능한 결과가 동일합니다.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use imgwarden_core::types::{Inventory, ObservedWorkload, RepositoryRecord};

/// 다이제스트 매칭 전략
pub trait DigestMatcher: Send + Sync {
    /// 매처 이름 (로그/벤치마크용)
    fn name(&self) -> &'static str;

    /// 각 이미지의 배포 여부를 계산합니다.
    ///
    /// 반환값 `flags[i][j]`는 `repositories[i].images[j]`의 배포 여부입니다.
    fn match_images(
        &self,
        repositories: &[RepositoryRecord],
        workloads: &[ObservedWorkload],
    ) -> Vec<Vec<bool>>;
}

/// 중첩 순회 매처
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearMatcher;

impl DigestMatcher for LinearMatcher {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn match_images(
        &self,
        repositories: &[RepositoryRecord],
        workloads: &[ObservedWorkload],
    ) -> Vec<Vec<bool>> {
        repositories
            .iter()
            .map(|repo| {
                repo.images
                    .iter()
                    .map(|image| {
                        workloads
                            .iter()
                            .any(|w| w.repository == repo.name && w.digest == image.digest)
                    })
                    .collect()
            })
            .collect()
    }
}

/// 인덱스 기반 매처
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexedMatcher;

impl DigestMatcher for IndexedMatcher {
    fn name(&self) -> &'static str {
        "indexed"
    }

    fn match_images(
        &self,
        repositories: &[RepositoryRecord],
        workloads: &[ObservedWorkload],
    ) -> Vec<Vec<bool>> {
        let mut index: HashMap<&str, HashSet<&str>> = HashMap::new();
        for w in workloads {
            index
                .entry(w.repository.as_str())
                .or_default()
                .insert(w.digest.as_str());
        }

        repositories
            .iter()
            .map(|repo| {
                let digests = index.get(repo.name.as_str());
                repo.images
                    .iter()
                    .map(|image| digests.is_some_and(|d| d.contains(image.digest.as_str())))
                    .collect()
            })
            .collect()
    }
}

/// 배포 맵 -- 리포지토리 → 현재 배포된 태그 집합
///
/// 같은 리포지토리의 두 태그가 동시에 배포되어 있으면 둘 다 보관됩니다.
/// 태그는 매칭된 인벤토리 이미지의 태그입니다 (다이제스트가 기준).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeployedMap {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl DeployedMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 배포된 (리포지토리, 태그)를 추가합니다.
    pub fn insert(&mut self, repository: impl Into<String>, tag: impl Into<String>) {
        self.entries
            .entry(repository.into())
            .or_default()
            .insert(tag.into());
    }

    /// 리포지토리의 배포 태그 집합
    pub fn tags(&self, repository: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(repository)
    }

    pub fn contains_repository(&self, repository: &str) -> bool {
        self.entries.contains_key(repository)
    }

    /// 리포지토리 수
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 모든 (리포지토리, 태그) 쌍을 정렬된 순서로 순회합니다.
    pub fn targets(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(repo, tags)| tags.iter().map(move |tag| (repo.as_str(), tag.as_str())))
    }

    /// (리포지토리, 태그) 쌍의 수
    pub fn target_count(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }
}

/// 배포 상관 분석기
pub struct Correlator {
    matcher: Box<dyn DigestMatcher>,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new(Box::new(IndexedMatcher))
    }
}

impl Correlator {
    pub fn new(matcher: Box<dyn DigestMatcher>) -> Self {
        Self { matcher }
    }

    pub fn matcher_name(&self) -> &'static str {
        self.matcher.name()
    }

    /// 인벤토리의 모든 이미지에 `deployed`를 설정하고 배포 맵을 만듭니다.
    ///
    /// 매칭된 이미지는 `true`, 나머지는 모두 `false`가 됩니다 (이전 값과 무관).
    pub fn correlate(
        &self,
        inventory: &mut Inventory,
        workloads: &[ObservedWorkload],
    ) -> DeployedMap {
        let flags = self.matcher.match_images(inventory.repositories(), workloads);
        let mut deployed = DeployedMap::new();

        for (repo, repo_flags) in inventory.repositories_mut().iter_mut().zip(flags) {
            for (image, matched) in repo.images.iter_mut().zip(repo_flags) {
                image.deployed = matched;
                if matched {
                    deployed.insert(repo.name.clone(), image.tag.clone());
                }
            }
        }

        debug!(
            matcher = self.matcher.name(),
            workloads = workloads.len(),
            deployed_repositories = deployed.len(),
            deployed_targets = deployed.target_count(),
            "correlation complete"
        );
        deployed
    }
}

#[cfg(test)]
mod tests {
    use imgwarden_core::types::ImageRecord;
    use proptest::prelude::*;

    use super::*;

    fn workload(repository: &str, digest: &str, tag: &str) -> ObservedWorkload {
        ObservedWorkload {
            name: format!("{repository}-pod"),
            namespace: "default".to_owned(),
            image: format!("{repository}:{tag}"),
            digest: digest.to_owned(),
            tag: tag.to_owned(),
            repository: repository.to_owned(),
        }
    }

    fn payments_inventory() -> Inventory {
        Inventory::new(vec![
            RepositoryRecord::new("payments", "arn:payments")
                .with_image(ImageRecord::new("sha256:digestA", Some("v1".to_owned())))
                .with_image(ImageRecord::new("sha256:digestB", Some("v2".to_owned()))),
        ])
    }

    #[test]
    fn payments_scenario_marks_only_matching_digest() {
        let matchers: Vec<Box<dyn DigestMatcher>> =
            vec![Box::new(LinearMatcher), Box::new(IndexedMatcher)];
        for matcher in matchers {
            let correlator = Correlator::new(matcher);
            let mut inventory = payments_inventory();
            let workloads = vec![workload("payments", "sha256:digestA", "v1")];

            let deployed = correlator.correlate(&mut inventory, &workloads);

            let images = &inventory.repositories()[0].images;
            assert!(images[0].deployed);
            assert!(!images[1].deployed);
            assert_eq!(deployed.len(), 1);
            let tags: Vec<&str> = deployed
                .tags("payments")
                .unwrap()
                .iter()
                .map(String::as_str)
                .collect();
            assert_eq!(tags, vec!["v1"]);
        }
    }

    #[test]
    fn tag_only_match_is_not_deployed() {
        let mut inventory = payments_inventory();
        // 태그는 같지만 다이제스트가 다름
        let workloads = vec![workload("payments", "sha256:other", "v1")];
        let deployed = Correlator::default().correlate(&mut inventory, &workloads);
        assert!(deployed.is_empty());
        assert_eq!(inventory.deployed_image_count(), 0);
    }

    #[test]
    fn partial_digest_is_not_a_match() {
        let mut inventory = payments_inventory();
        let workloads = vec![workload("payments", "sha256:digest", "v1")];
        let deployed = Correlator::default().correlate(&mut inventory, &workloads);
        assert!(deployed.is_empty());
    }

    #[test]
    fn same_digest_in_other_repository_is_not_a_match() {
        let mut inventory = payments_inventory();
        let workloads = vec![workload("search", "sha256:digestA", "v1")];
        let deployed = Correlator::default().correlate(&mut inventory, &workloads);
        assert!(!deployed.contains_repository("payments"));
        assert!(!inventory.repositories()[0].images[0].deployed);
    }

    #[test]
    fn previously_deployed_flag_is_cleared() {
        let mut inventory = payments_inventory();
        inventory.repositories_mut()[0].images[1].deployed = true;
        let workloads = vec![workload("payments", "sha256:digestA", "v1")];
        Correlator::default().correlate(&mut inventory, &workloads);
        assert!(!inventory.repositories()[0].images[1].deployed);
    }

    #[test]
    fn two_deployed_tags_are_both_kept() {
        let mut inventory = payments_inventory();
        let workloads = vec![
            workload("payments", "sha256:digestA", "v1"),
            workload("payments", "sha256:digestB", "v2"),
        ];
        let deployed = Correlator::default().correlate(&mut inventory, &workloads);
        let targets: Vec<(&str, &str)> = deployed.targets().collect();
        assert_eq!(targets, vec![("payments", "v1"), ("payments", "v2")]);
        assert_eq!(deployed.target_count(), 2);
    }

    #[test]
    fn deployed_map_uses_inventory_tag() {
        let mut inventory = payments_inventory();
        // 워크로드는 latest로 참조하지만 다이제스트는 v1 이미지
        let workloads = vec![workload("payments", "sha256:digestA", "latest")];
        let deployed = Correlator::default().correlate(&mut inventory, &workloads);
        assert!(deployed.tags("payments").unwrap().contains("v1"));
    }

    #[test]
    fn empty_workloads_clear_everything() {
        let mut inventory = payments_inventory();
        let deployed = Correlator::default().correlate(&mut inventory, &[]);
        assert!(deployed.is_empty());
        assert_eq!(inventory.deployed_image_count(), 0);
    }

    #[test]
    fn default_correlator_uses_indexed_matcher() {
        assert_eq!(Correlator::default().matcher_name(), "indexed");
    }

    fn arb_repositories() -> impl Strategy<Value = Vec<RepositoryRecord>> {
        prop::collection::vec(
            (0u8..4, prop::collection::vec(0u8..6, 0..5)),
            0..5,
        )
        .prop_map(|repos| {
            repos
                .into_iter()
                .enumerate()
                .map(|(i, (name, digests))| {
                    let mut record = RepositoryRecord::new(format!("repo-{name}-{i}"), "");
                    for (j, d) in digests.into_iter().enumerate() {
                        record = record.with_image(ImageRecord::new(
                            format!("sha256:{d}"),
                            Some(format!("t{j}")),
                        ));
                    }
                    record
                })
                .collect()
        })
    }

    fn arb_workloads() -> impl Strategy<Value = Vec<ObservedWorkload>> {
        prop::collection::vec((0u8..4, 0usize..5, 0u8..6), 0..10).prop_map(|ws| {
            ws.into_iter()
                .map(|(name, idx, d)| {
                    workload(&format!("repo-{name}-{idx}"), &format!("sha256:{d}"), "any")
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn linear_and_indexed_agree(
            repositories in arb_repositories(),
            workloads in arb_workloads(),
        ) {
            let linear = LinearMatcher.match_images(&repositories, &workloads);
            let indexed = IndexedMatcher.match_images(&repositories, &workloads);
            prop_assert_eq!(linear, indexed);
        }

        #[test]
        fn deployed_iff_workload_with_same_repository_and_digest(
            repositories in arb_repositories(),
            workloads in arb_workloads(),
        ) {
            let mut inventory = Inventory::new(repositories);
            let deployed = Correlator::default().correlate(&mut inventory, &workloads);

            for repo in inventory.repositories() {
                for image in &repo.images {
                    let expected = workloads
                        .iter()
                        .any(|w| w.repository == repo.name && w.digest == image.digest);
                    prop_assert_eq!(image.deployed, expected);
                }
                let any_deployed = repo.images.iter().any(|i| i.deployed);
                prop_assert_eq!(deployed.contains_repository(&repo.name), any_deployed);
            }
        }
    }
}
