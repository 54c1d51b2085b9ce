//! `restart_pods` and `scale_deployment`.
//!
//! Pods are restarted by deleting them and letting their controller recreate
//! them. Deployments are scaled through the `scale` subresource.

use insight_core::config::{KubeMode, KubernetesConfig};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use serde::{Deserialize, Serialize};

use super::BatchReport;
use crate::error::{ExecutorError, Result};

pub async fn connect(cfg: &KubernetesConfig) -> Result<kube::Client> {
    let config = match cfg.mode {
        KubeMode::Incluster => {
            kube::Config::incluster().map_err(|e| ExecutorError::KubeConfig(e.to_string()))?
        }
        KubeMode::Kubeconfig => {
            let options = KubeConfigOptions::default();
            let loaded = match &cfg.kubeconfig_path {
                Some(path) => {
                    let kubeconfig = Kubeconfig::read_from(path)
                        .map_err(|e| ExecutorError::KubeConfig(e.to_string()))?;
                    kube::Config::from_custom_kubeconfig(kubeconfig, &options).await
                }
                None => kube::Config::from_kubeconfig(&options).await,
            };
            loaded.map_err(|e| ExecutorError::KubeConfig(e.to_string()))?
        }
    };
    tracing::debug!(cluster = %config.cluster_url, "kubernetes client configured");
    Ok(kube::Client::try_from(config)?)
}

// ---------------------------------------------------------------------------
// restart_pods
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PodTarget {
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Deserialize)]
struct RestartParams {
    #[serde(default)]
    pods: Vec<PodTarget>,
}

#[derive(Debug, Serialize)]
pub struct PodOutcome {
    pub pod: String,
    pub namespace: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Params: `{ "pods": [{ "name": "web-1", "namespace": "default" }] }`.
pub fn parse_restart(params: &serde_json::Value) -> Result<Vec<PodTarget>> {
    let parsed: RestartParams = serde_json::from_value(params.clone())
        .map_err(|e| ExecutorError::params("restart_pods", e))?;
    Ok(parsed.pods)
}

pub async fn restart_pods(
    client: &kube::Client,
    targets: Vec<PodTarget>,
) -> Result<serde_json::Value> {
    let mut outcomes = Vec::with_capacity(targets.len());
    for target in targets {
        let pods: Api<Pod> = Api::namespaced(client.clone(), &target.namespace);
        let deleted = pods
            .delete(&target.name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| e.to_string());
        if let Err(e) = &deleted {
            tracing::warn!(pod = %target.name, namespace = %target.namespace, error = %e, "pod delete failed");
        }
        outcomes.push((target, deleted));
    }
    pod_report(outcomes)
}

pub fn pod_report(
    outcomes: Vec<(PodTarget, std::result::Result<(), String>)>,
) -> Result<serde_json::Value> {
    let details = outcomes
        .into_iter()
        .map(|(target, outcome)| PodOutcome {
            pod: target.name,
            namespace: target.namespace,
            success: outcome.is_ok(),
            error: outcome.err(),
        })
        .collect();
    BatchReport::new(details, |d: &PodOutcome| d.success).into_value()
}

// ---------------------------------------------------------------------------
// scale_deployment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScaleTarget {
    pub deployment: String,
    pub namespace: String,
    pub replicas: i32,
}

/// Params: `{ "deployment": "web", "namespace": "default", "replicas": 3 }`.
pub fn parse_scale(params: &serde_json::Value) -> Result<ScaleTarget> {
    let target: ScaleTarget = serde_json::from_value(params.clone())
        .map_err(|e| ExecutorError::params("scale_deployment", e))?;
    if target.replicas < 0 {
        return Err(ExecutorError::params(
            "scale_deployment",
            format!("replicas must be >= 0, got {}", target.replicas),
        ));
    }
    Ok(target)
}

/// A failed patch fails the action; there is only one target.
pub async fn scale_deployment(
    client: &kube::Client,
    target: ScaleTarget,
) -> Result<serde_json::Value> {
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), &target.namespace);
    let patch = serde_json::json!({ "spec": { "replicas": target.replicas } });
    deployments
        .patch_scale(&target.deployment, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(serde_json::json!({
        "success": true,
        "deployment": target.deployment,
        "namespace": target.namespace,
        "replicas": target.replicas,
    }))
}
