use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::api::conditions_schema;
use crate::util::errors::StdError;

pub static SPRINGBOOT_FINALIZER: &str = "springboots.spring.yujiangjun.github.com";

pub const API_VERSION: &str = "spring.yujiangjun.github.com/v1";
pub const KIND: &str = "SpringBoot";

pub const MANAGED_BY: &str = "springboot-operator";

/// Generate the Kubernetes wrapper struct `SpringBoot` from our Spec and Status struct
///
/// This provides a hook for generating the CRD yaml (in crdgen.rs)
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(
    kind = "SpringBoot",
    group = "spring.yujiangjun.github.com",
    version = "v1",
    namespaced
)]
#[kube(status = "SpringBootStatus", shortname = "sb")]
#[kube(
    printcolumn = r#"{"name":"Image", "type":"string", "jsonPath":".spec.image"}"#,
    printcolumn = r#"{"name":"Port", "type":"integer", "jsonPath":".spec.port"}"#,
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.pod_phase"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct SpringBootSpec {
    /// Placeholder field, not interpreted by the controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foo: Option<String>,
    /// Container image run in the application pod
    pub image: String,
    /// Port the application container listens on
    #[serde(default = "default_port")]
    pub port: i32,
}

fn default_port() -> i32 {
    8080
}

/// The status object of `SpringBoot`
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
pub struct SpringBootStatus {
    #[serde(default)]
    #[schemars(schema_with = "conditions_schema")]
    pub conditions: Vec<Condition>,
    pub observed_generation: Option<i64>,
    pub pod_name: Option<String>,
    pub service_name: Option<String>,
    pub pod_phase: Option<String>,
}

impl SpringBootSpec {
    /// Rejects specs the API server would accept but a pod could never run
    pub fn validate(&self) -> Result<(), StdError> {
        if self.image.trim().is_empty() {
            return Err(StdError::InvalidArgument("spec.image must not be empty".to_string()));
        }
        if !(1..=65535).contains(&self.port) {
            return Err(StdError::InvalidArgument(format!(
                "spec.port must be between 1 and 65535, got {}",
                self.port
            )));
        }
        Ok(())
    }
}

impl SpringBoot {
    pub fn pod_name(&self) -> String {
        format!("{}-pod", self.name_any())
    }

    pub fn service_name(&self) -> String {
        format!("{}-svc", self.name_any())
    }

    pub fn container_name(&self) -> String {
        format!("{}-c", self.name_any())
    }

    /// Labels stamped on every derived object; `app` doubles as the service selector
    pub fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("app".to_string(), self.name_any()),
            ("app.kubernetes.io/name".to_string(), self.name_any()),
            ("app.kubernetes.io/managed-by".to_string(), MANAGED_BY.to_string()),
        ])
    }

    pub fn selector(&self) -> BTreeMap<String, String> {
        BTreeMap::from([("app".to_string(), self.name_any())])
    }
}
