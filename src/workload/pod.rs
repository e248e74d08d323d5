use k8s_openapi::api::core::v1::{Container, ContainerPort, Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::ResourceExt;

use crate::api::v1::springboot::SpringBoot;

/// How an observed pod differs from the one we want
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodDrift {
    InSync,
    /// Only the image changed; images are mutable on a live pod
    Image,
    /// A field the API server refuses to update changed, the pod must be replaced
    Immutable,
}

pub fn create_desired_pod(springboot: &SpringBoot, oref: &OwnerReference) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(springboot.pod_name()),
            namespace: springboot.namespace(),
            labels: Some(springboot.labels()),
            owner_references: Some(vec![oref.clone()]),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: springboot.container_name(),
                image: Some(springboot.spec.image.clone()),
                ports: Some(vec![ContainerPort {
                    name: Some("http".to_string()),
                    container_port: springboot.spec.port,
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn pod_drift(existing: &Pod, desired: &Pod) -> PodDrift {
    let (Some(existing_spec), Some(desired_spec)) = (existing.spec.as_ref(), desired.spec.as_ref()) else {
        return PodDrift::Immutable;
    };
    if existing_spec.containers.len() != desired_spec.containers.len() {
        return PodDrift::Immutable;
    }

    let mut drift = PodDrift::InSync;
    for (have, want) in existing_spec.containers.iter().zip(&desired_spec.containers) {
        if have.name != want.name || container_ports(have) != container_ports(want) {
            return PodDrift::Immutable;
        }
        if have.image != want.image {
            drift = PodDrift::Image;
        }
    }
    drift
}

fn container_ports(container: &Container) -> Vec<i32> {
    let mut ports: Vec<i32> = container
        .ports
        .iter()
        .flatten()
        .map(|p| p.container_port)
        .collect();
    ports.sort_unstable();
    ports
}

/// The phase reported by the kubelet, if any
pub fn pod_phase(pod: &Pod) -> Option<String> {
    pod.status.as_ref().and_then(|s| s.phase.clone())
}
