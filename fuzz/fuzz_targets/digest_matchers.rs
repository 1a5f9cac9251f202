#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use imgwarden_core::types::{ImageRecord, ObservedWorkload, RepositoryRecord};
use imgwarden_scanner::{DigestMatcher, IndexedMatcher, LinearMatcher};

/// 퍼저용 구조적 입력 (다이제스트는 작은 공간에서 골라 충돌을 유도)
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    repositories: Vec<Vec<u8>>,
    workloads: Vec<(u8, u8)>,
}

fn digest(n: u8) -> String {
    format!("sha256:{:02x}", n % 16)
}

fuzz_target!(|input: FuzzInput| {
    let repositories: Vec<RepositoryRecord> = input
        .repositories
        .iter()
        .take(8)
        .enumerate()
        .map(|(r, images)| {
            images.iter().take(8).fold(
                RepositoryRecord::new(format!("repo-{r}"), format!("arn:repo-{r}")),
                |repo, d| repo.with_image(ImageRecord::new(digest(*d), None)),
            )
        })
        .collect();

    let workloads: Vec<ObservedWorkload> = input
        .workloads
        .iter()
        .take(32)
        .map(|(r, d)| ObservedWorkload {
            name: "pod".to_owned(),
            namespace: "default".to_owned(),
            image: String::new(),
            digest: digest(*d),
            tag: "latest".to_owned(),
            repository: format!("repo-{}", r % 8),
        })
        .collect();

    let linear = LinearMatcher.match_images(&repositories, &workloads);
    let indexed = IndexedMatcher.match_images(&repositories, &workloads);
    assert_eq!(linear, indexed);
});
