use crate::api::v1::springboot::{
    SpringBoot, SpringBootStatus, API_VERSION, KIND, MANAGED_BY, SPRINGBOOT_FINALIZER,
};
use crate::util::config::Config;
use crate::util::errors::{Error, ErrorWithRequeue, Result, StdError};
use crate::util::metrics::Metrics;
use crate::util::status::{condition, set_status_condition, READY_CONDITION};
use crate::workload::pod::{create_desired_pod, pod_drift, pod_phase, PodDrift};
use crate::workload::service::create_desired_service;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Pod, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams, ResourceExt},
    client::Client,
    runtime::{
        controller::{Action, Controller},
        events::{Event, EventType, Recorder, Reporter},
        finalizer::{self, finalizer, Event as Finalizer},
        watcher,
    },
    Resource,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::{sync::RwLock, time::Duration};
use tracing::*;

pub const FIELD_MANAGER: &str = "springboot-controller";

/// Periodic resync when nothing changes
const RESYNC_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Short requeue while a replaced pod comes back
const RECREATE_INTERVAL: Duration = Duration::from_secs(5);
const ERROR_REQUEUE: Duration = Duration::from_secs(60);

impl SpringBoot {
    // Reconcile (for non-finalizer related changes)
    async fn reconcile(&self, ctx: Arc<Context>) -> Result<Action> {
        let client = ctx.client.clone();
        let name = self.name_any();
        let ns = self
            .namespace()
            .ok_or_else(|| StdError::MetadataMissing(format!("namespace of SpringBoot {name}")))?;
        let springboots: Api<SpringBoot> = Api::namespaced(client.clone(), &ns);

        if let Err(e) = self.spec.validate() {
            warn!("SpringBoot '{}' has an invalid spec: {}", name, e);
            let (status, changed) = self.invalid_status(e.to_string());
            if changed {
                patch_status(&springboots, &name, status).await?;
            }
            // a spec edit retriggers us
            return Ok(Action::await_change());
        }

        let oref = self.controller_owner_ref(&()).ok_or_else(|| {
            Error::ErrorWithRequeue(ErrorWithRequeue::new(
                StdError::MetadataMissing(format!("uid of SpringBoot {name}")),
                RESYNC_INTERVAL,
            ))
        })?;

        let services: Api<Service> = Api::namespaced(client.clone(), &ns);
        let service_name = self.service_name();
        services
            .patch(
                &service_name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(&create_desired_service(self, &oref)),
            )
            .await?;
        debug!("Service '{}' applied", service_name);

        let pods: Api<Pod> = Api::namespaced(client.clone(), &ns);
        let pod_name = self.pod_name();
        let desired_pod = create_desired_pod(self, &oref);

        let (phase, recreating) = match pods.get_opt(&pod_name).await? {
            None => {
                info!("Creating Pod '{}'", pod_name);
                let created = pods.create(&PostParams::default(), &desired_pod).await?;
                (pod_phase(&created), false)
            }
            Some(existing) if existing.metadata.deletion_timestamp.is_some() => {
                debug!("Pod '{}' is terminating, waiting before recreating it", pod_name);
                (None, true)
            }
            Some(existing) => match pod_drift(&existing, &desired_pod) {
                PodDrift::InSync => {
                    debug!("Pod '{}' is up to date", pod_name);
                    (pod_phase(&existing), false)
                }
                PodDrift::Image => {
                    info!("Updating image of Pod '{}' to {}", pod_name, self.spec.image);
                    let patched = pods
                        .patch(
                            &pod_name,
                            &PatchParams::apply(FIELD_MANAGER).force(),
                            &Patch::Apply(&desired_pod),
                        )
                        .await?;
                    (pod_phase(&patched), false)
                }
                PodDrift::Immutable => {
                    info!("Deleting Pod '{}' to recreate it with the new port", pod_name);
                    pods.delete(&pod_name, &DeleteParams::default()).await?;
                    self.publish(
                        &ctx,
                        EventType::Normal,
                        "PodRecreating",
                        format!("Replacing `{pod_name}` after an immutable spec change"),
                        "Recreating",
                    )
                    .await?;
                    (None, true)
                }
            },
        };

        let (status, changed) = self.observed_status(phase, recreating);
        if changed {
            patch_status(&springboots, &name, status).await?;
        } else {
            debug!("Status of SpringBoot '{}' is current", name);
        }

        if recreating {
            Ok(Action::requeue(RECREATE_INTERVAL))
        } else {
            Ok(Action::requeue(RESYNC_INTERVAL))
        }
    }

    // Finalizer cleanup (the object was deleted, ensure nothing is orphaned)
    async fn cleanup(&self, ctx: Arc<Context>) -> Result<Action> {
        // Pod and Service carry our owner reference, the garbage collector removes them
        self.publish(
            &ctx,
            EventType::Normal,
            "DeleteRequested",
            format!("Delete `{}`", self.name_any()),
            "Deleting",
        )
        .await?;
        Ok(Action::await_change())
    }

    async fn publish(
        &self,
        ctx: &Context,
        type_: EventType,
        reason: &str,
        note: String,
        action: &str,
    ) -> Result<()> {
        let recorder = ctx.diagnostics.read().await.recorder(ctx.client.clone());
        recorder
            .publish(
                &Event {
                    type_,
                    reason: reason.into(),
                    note: Some(note),
                    action: action.into(),
                    secondary: None,
                },
                &self.object_ref(&()),
            )
            .await?;
        Ok(())
    }

    /// Status for the observed pod, and whether it differs from the stored one
    fn observed_status(&self, phase: Option<String>, recreating: bool) -> (SpringBootStatus, bool) {
        let pod_name = self.pod_name();
        let ready = !recreating && phase.as_deref() == Some("Running");
        let (reason, message) = if recreating {
            ("PodRecreating", format!("Pod {pod_name} is being replaced"))
        } else if ready {
            ("PodRunning", format!("Pod {pod_name} is running"))
        } else {
            (
                "PodPending",
                format!("Pod {pod_name} is {}", phase.as_deref().unwrap_or("not yet scheduled")),
            )
        };

        let (conditions, conditions_changed) = self.merged_conditions(ready, reason, message);
        let mut status = self.status.clone().unwrap_or_default();
        status.conditions = conditions;
        status.observed_generation = self.metadata.generation;
        status.pod_name = Some(pod_name);
        status.service_name = Some(self.service_name());
        status.pod_phase = phase;

        let changed = self.status_changed(&status, conditions_changed);
        (status, changed)
    }

    fn invalid_status(&self, message: String) -> (SpringBootStatus, bool) {
        let (conditions, conditions_changed) = self.merged_conditions(false, "InvalidSpec", message);
        let mut status = self.status.clone().unwrap_or_default();
        status.conditions = conditions;
        status.observed_generation = self.metadata.generation;

        let changed = self.status_changed(&status, conditions_changed);
        (status, changed)
    }

    fn merged_conditions(&self, ready: bool, reason: &str, message: String) -> (Vec<Condition>, bool) {
        let current = self.status.as_ref().map(|s| s.conditions.as_slice()).unwrap_or_default();
        set_status_condition(
            current,
            condition(READY_CONDITION, ready, reason, message, self.metadata.generation),
        )
    }

    fn status_changed(&self, next: &SpringBootStatus, conditions_changed: bool) -> bool {
        let Some(current) = self.status.as_ref() else {
            return true;
        };
        conditions_changed
            || current.observed_generation != next.observed_generation
            || current.pod_name != next.pod_name
            || current.service_name != next.service_name
            || current.pod_phase != next.pod_phase
    }
}

async fn patch_status(api: &Api<SpringBoot>, name: &str, status: SpringBootStatus) -> Result<()> {
    let new_status = Patch::Apply(json!({
        "apiVersion": API_VERSION,
        "kind": KIND,
        "status": status,
    }));
    let ps = PatchParams::apply(FIELD_MANAGER).force();
    api.patch_status(name, &ps, &new_status).await?;
    Ok(())
}

/// State shared between the controller and the web server
#[derive(Clone)]
pub struct State {
    /// Diagnostics populated by the reconciler
    diagnostics: Arc<RwLock<Diagnostics>>,
    /// Metrics registry
    registry: prometheus::Registry,
    metrics: Metrics,
}

/// State wrapper around the controller outputs for the web server
impl State {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = prometheus::Registry::default();
        let metrics = Metrics::default().register(&registry)?;
        Ok(Self {
            diagnostics: Arc::default(),
            registry,
            metrics,
        })
    }

    /// Metrics getter
    pub fn metrics(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// State getter
    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }

    // Create a Controller Context that can update State
    pub fn to_context(&self, client: Client) -> Arc<Context> {
        Arc::new(Context {
            client,
            metrics: self.metrics.clone(),
            diagnostics: self.diagnostics.clone(),
        })
    }
}

// Context for our reconciler
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Diagnostics read by the web server
    pub diagnostics: Arc<RwLock<Diagnostics>>,
    /// Prometheus metrics
    pub metrics: Metrics,
}

#[instrument(skip(ctx, springboot), fields(name = %springboot.name_any(), namespace = %springboot.namespace().unwrap_or_default()))]
pub async fn reconcile(springboot: Arc<SpringBoot>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = ctx.metrics.count_and_measure(&springboot);
    ctx.diagnostics.write().await.last_event = Utc::now();

    let ns = springboot
        .namespace()
        .ok_or_else(|| StdError::MetadataMissing("SpringBoot is namespace scoped".to_string()))?;
    let springboots: Api<SpringBoot> = Api::namespaced(ctx.client.clone(), &ns);

    info!("Reconciling SpringBoot \"{}\" in {}", springboot.name_any(), ns);
    finalizer(&springboots, SPRINGBOOT_FINALIZER, springboot, |event| async {
        match event {
            Finalizer::Apply(springboot) => springboot.reconcile(ctx.clone()).await,
            Finalizer::Cleanup(springboot) => springboot.cleanup(ctx.clone()).await,
        }
    })
    .await
    .map_err(|e| Error::StdError(StdError::FinalizerError(Box::new(e))))
}

/// Reconcile the SpringBoot identified by `namespace`/`name`.
///
/// A missing object has been deleted and needs no further work. Any other lookup
/// failure is returned so the caller retries instead of assuming a deletion.
///
/// `run` does not go through here: the `Controller` hands `reconcile` objects from its
/// reflector cache and never schedules keys whose object is gone, which gives the same
/// not-found behaviour. This entry point serves callers that only hold a key.
pub async fn reconcile_key(namespace: &str, name: &str, ctx: Arc<Context>) -> Result<Action> {
    let springboots: Api<SpringBoot> = Api::namespaced(ctx.client.clone(), namespace);
    match springboots.get_opt(name).await? {
        Some(springboot) => reconcile(Arc::new(springboot), ctx).await,
        None => {
            info!("SpringBoot {}/{} is deleted", namespace, name);
            Ok(Action::await_change())
        }
    }
}

/// Diagnostics to be exposed by the web server
#[derive(Clone, Serialize)]
pub struct Diagnostics {
    pub last_event: DateTime<Utc>,
    #[serde(skip)]
    pub reporter: Reporter,
}
impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            last_event: Utc::now(),
            reporter: FIELD_MANAGER.into(),
        }
    }
}
impl Diagnostics {
    fn recorder(&self, client: Client) -> Recorder {
        Recorder::new(client, self.reporter.clone())
    }
}

fn error_policy(springboot: Arc<SpringBoot>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed: {:?}", error);
    ctx.metrics.reconcile_failure(&springboot, error);
    Action::requeue(requeue_after(error))
}

/// Backoff for a failed reconcile, honouring durations carried through the finalizer
fn requeue_after(error: &Error) -> Duration {
    match error {
        Error::ErrorWithRequeue(e) => e.duration,
        Error::StdError(StdError::FinalizerError(inner)) => match inner.as_ref() {
            finalizer::Error::ApplyFailed(e) | finalizer::Error::CleanupFailed(e) => requeue_after(e),
            _ => ERROR_REQUEUE,
        },
        Error::StdError(_) => ERROR_REQUEUE,
    }
}

fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    <K as Resource>::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Initialize the controller and shared state (given the crd is installed)
pub async fn run(state: State, client: Client, config: Config) {
    let namespace = config.watch_namespace.as_deref();
    let springboots = scoped_api::<SpringBoot>(&client, namespace);

    if let Err(e) = springboots.list(&ListParams::default().limit(1)).await {
        error!("CRD is not queryable; {e:?}. Is the CRD installed?");
        info!("Installation: cargo run --bin crdgen | kubectl apply -f -");
        std::process::exit(1);
    }

    info!(
        "Watching SpringBoots in {}",
        namespace.unwrap_or("all namespaces")
    );

    let owned = watcher::Config::default().labels(&format!("app.kubernetes.io/managed-by={MANAGED_BY}"));
    Controller::new(springboots, watcher::Config::default().any_semantic())
        .owns(scoped_api::<Pod>(&client, namespace), owned.clone())
        .owns(scoped_api::<Service>(&client, namespace), owned)
        .shutdown_on_signal()
        .run(reconcile, error_policy, state.to_context(client))
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("reconciled {}", obj.name),
                Err(e) => debug!("reconcile error: {}", e),
            }
        })
        .await;
}
