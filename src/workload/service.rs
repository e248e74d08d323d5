use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;

use crate::api::v1::springboot::SpringBoot;

pub const SERVICE_PORT: i32 = 80;

/// NodePort service fronting the application pod. The node port itself is left to the API server.
pub fn create_desired_service(springboot: &SpringBoot, oref: &OwnerReference) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(springboot.service_name()),
            namespace: springboot.namespace(),
            labels: Some(springboot.labels()),
            owner_references: Some(vec![oref.clone()]),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("NodePort".to_string()),
            selector: Some(springboot.selector()),
            ports: Some(vec![ServicePort {
                name: Some("http".to_string()),
                port: SERVICE_PORT,
                target_port: Some(IntOrString::Int(springboot.spec.port)),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}
