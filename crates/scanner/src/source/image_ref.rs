//! 컨테이너 이미지 참조 파싱
//!
//! 파드의 컨테이너 상태(`image`, `imageID`)를 [`ObservedWorkload`]로 변환합니다.
//!
//! ```text
//! image   = 424851304182.dkr.ecr.eu-central-1.amazonaws.com/team/payments:v1
//! imageID = docker-pullable://424851304182.dkr...com/team/payments@sha256:ab12...
//!
//! repository = team/payments     (레지스트리 호스트 제거)
//! tag        = v1                (마지막 경로 세그먼트의 ':' 뒤, 없으면 untagged)
//! digest     = sha256:ab12...    ('@' 뒤, '@'가 없으면 imageID 전체)
//! ```

use serde::{Deserialize, Serialize};
use tracing::warn;

use imgwarden_core::types::{ObservedWorkload, UNTAGGED};

/// 워크로드 소스가 반환하는 원시 파드 레코드
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawPod {
    pub name: String,
    pub namespace: String,
    pub container_statuses: Vec<RawContainerStatus>,
}

/// 원시 컨테이너 상태
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawContainerStatus {
    pub image: String,
    pub image_id: String,
}

/// 파싱된 이미지 참조
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub repository: String,
    pub tag: String,
    pub digest: String,
}

/// 이미지 이름과 이미지 ID를 파싱합니다.
///
/// 이미지 이름이나 다이제스트가 비어있으면 `None`을 반환합니다.
pub fn parse_image_reference(image: &str, image_id: &str) -> Option<ImageReference> {
    let image = image.trim();
    let image_id = image_id.trim();

    let digest = match image_id.split_once('@') {
        Some((_, d)) => d,
        None => image_id,
    };
    if digest.is_empty() {
        return None;
    }

    // 이미지 이름에 다이제스트가 붙은 경우(name@sha256:...) 이름 부분만 사용
    let name_and_tag = match image.split_once('@') {
        Some((name, _)) => name,
        None => image,
    };
    if name_and_tag.is_empty() {
        return None;
    }

    let (path, last) = match name_and_tag.rsplit_once('/') {
        Some((path, last)) => (Some(path), last),
        None => (None, name_and_tag),
    };
    let (last_name, tag) = match last.rsplit_once(':') {
        Some((n, t)) if !t.is_empty() => (n, t),
        Some((n, _)) => (n, UNTAGGED),
        None => (last, UNTAGGED),
    };
    if last_name.is_empty() {
        return None;
    }

    let repository = match path {
        Some(path) => {
            let mut segments: Vec<&str> = path.split('/').collect();
            if segments.first().is_some_and(|s| is_registry_host(s)) {
                segments.remove(0);
            }
            segments.push(last_name);
            segments.join("/")
        }
        None => last_name.to_owned(),
    };

    Some(ImageReference {
        repository,
        tag: tag.to_owned(),
        digest: digest.to_owned(),
    })
}

fn is_registry_host(segment: &str) -> bool {
    segment.contains('.') || segment.contains(':') || segment == "localhost"
}

/// 파드의 모든 컨테이너 상태를 워크로드로 변환합니다.
///
/// 형식이 잘못된 컨테이너 상태는 경고 후 건너뜁니다.
/// 반환값은 (워크로드 목록, 건너뛴 레코드 수)입니다.
pub fn workloads_from_pod(pod: &RawPod) -> (Vec<ObservedWorkload>, u64) {
    let mut workloads = Vec::with_capacity(pod.container_statuses.len());
    let mut skipped = 0;

    for status in &pod.container_statuses {
        match parse_image_reference(&status.image, &status.image_id) {
            Some(reference) => workloads.push(ObservedWorkload {
                name: pod.name.clone(),
                namespace: pod.namespace.clone(),
                image: status.image.clone(),
                digest: reference.digest,
                tag: reference.tag,
                repository: reference.repository,
            }),
            None => {
                warn!(
                    pod = %pod.name,
                    namespace = %pod.namespace,
                    image = %status.image,
                    image_id = %status.image_id,
                    "skipping container status without resolvable image digest"
                );
                skipped += 1;
            }
        }
    }

    (workloads, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ECR_HOST: &str = "424851304182.dkr.ecr.eu-central-1.amazonaws.com";

    #[test]
    fn parses_ecr_reference_with_digest() {
        let image = format!("{ECR_HOST}/payments:v1");
        let image_id = format!("docker-pullable://{ECR_HOST}/payments@sha256:abc");
        let reference = parse_image_reference(&image, &image_id).unwrap();
        assert_eq!(reference.repository, "payments");
        assert_eq!(reference.tag, "v1");
        assert_eq!(reference.digest, "sha256:abc");
    }

    #[test]
    fn keeps_nested_repository_path() {
        let image = format!("{ECR_HOST}/team/payments/api:2.3.1");
        let reference = parse_image_reference(&image, "sha256:def").unwrap();
        assert_eq!(reference.repository, "team/payments/api");
        assert_eq!(reference.tag, "2.3.1");
        // '@'가 없으면 imageID 전체가 다이제스트
        assert_eq!(reference.digest, "sha256:def");
    }

    #[test]
    fn missing_tag_becomes_untagged() {
        let reference = parse_image_reference("nginx", "nginx@sha256:1").unwrap();
        assert_eq!(reference.repository, "nginx");
        assert_eq!(reference.tag, UNTAGGED);

        let reference =
            parse_image_reference(&format!("{ECR_HOST}/payments@sha256:1"), "x@sha256:1").unwrap();
        assert_eq!(reference.repository, "payments");
        assert_eq!(reference.tag, UNTAGGED);
    }

    #[test]
    fn registry_port_is_not_a_tag() {
        let reference = parse_image_reference("localhost:5000/payments", "sha256:9").unwrap();
        assert_eq!(reference.repository, "payments");
        assert_eq!(reference.tag, UNTAGGED);
    }

    #[test]
    fn docker_hub_namespace_is_kept() {
        let reference = parse_image_reference("bitnami/redis:7.2", "sha256:7").unwrap();
        assert_eq!(reference.repository, "bitnami/redis");
        assert_eq!(reference.tag, "7.2");
    }

    #[test]
    fn empty_digest_or_image_is_malformed() {
        assert!(parse_image_reference("payments:v1", "").is_none());
        assert!(parse_image_reference("payments:v1", "payments@").is_none());
        assert!(parse_image_reference("", "sha256:1").is_none());
        assert!(parse_image_reference(":v1", "sha256:1").is_none());
    }

    #[test]
    fn every_container_status_yields_a_workload() {
        let pod = RawPod {
            name: "payments-7d9f".to_owned(),
            namespace: "prod".to_owned(),
            container_statuses: vec![
                RawContainerStatus {
                    image: format!("{ECR_HOST}/payments:v1"),
                    image_id: format!("{ECR_HOST}/payments@sha256:a"),
                },
                RawContainerStatus {
                    image: format!("{ECR_HOST}/envoy:1.29"),
                    image_id: format!("{ECR_HOST}/envoy@sha256:b"),
                },
                RawContainerStatus {
                    image: format!("{ECR_HOST}/init:latest"),
                    image_id: String::new(),
                },
            ],
        };

        let (workloads, skipped) = workloads_from_pod(&pod);
        assert_eq!(workloads.len(), 2);
        assert_eq!(skipped, 1);
        assert_eq!(workloads[0].repository, "payments");
        assert_eq!(workloads[1].repository, "envoy");
        assert!(workloads.iter().all(|w| w.namespace == "prod"));
    }
}
