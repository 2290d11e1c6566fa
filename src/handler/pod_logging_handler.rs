use k8s_openapi::api::core::v1::Pod;
use tracing::info;

use super::Handler;
use crate::Resource;
use crate::Result;

/// Logs every Pod transition it is handed. Stateless, so trivially idempotent.
#[derive(Debug, Default, Clone)]
pub struct PodLoggingHandler;

impl PodLoggingHandler {
    pub fn new() -> Self {
        Self
    }
}

/// `(resource_version, node_name, phase)` with `-` for absent fields.
pub(crate) fn pod_summary(pod: &Pod) -> (String, String, String) {
    let version = pod.resource_version().unwrap_or("-").to_string();
    let node = pod
        .spec
        .as_ref()
        .and_then(|spec| spec.node_name.clone())
        .unwrap_or_else(|| "-".to_string());
    let phase = pod
        .status
        .as_ref()
        .and_then(|status| status.phase.clone())
        .unwrap_or_else(|| "-".to_string());
    (version, node, phase)
}

#[async_trait::async_trait]
impl Handler<Pod> for PodLoggingHandler {
    async fn init(&self) -> Result<()> {
        info!("PodLoggingHandler.init");
        Ok(())
    }

    async fn object_created(
        &self,
        obj: &Pod,
    ) -> Result<()> {
        let (version, node, phase) = pod_summary(obj);
        info!(
            pod = obj.name().unwrap_or("-"),
            namespace = obj.namespace().unwrap_or("-"),
            resource_version = %version,
            node_name = %node,
            phase = %phase,
            "PodLoggingHandler.object_created"
        );
        Ok(())
    }

    async fn object_updated(
        &self,
        old: &Pod,
        new: &Pod,
    ) -> Result<()> {
        let (old_version, _, old_phase) = pod_summary(old);
        let (new_version, node, new_phase) = pod_summary(new);
        info!(
            pod = new.name().unwrap_or("-"),
            namespace = new.namespace().unwrap_or("-"),
            "PodLoggingHandler.object_updated: version {} -> {}, phase {} -> {}, node {}",
            old_version,
            new_version,
            old_phase,
            new_phase,
            node
        );
        Ok(())
    }

    async fn object_deleted(
        &self,
        key: &str,
        last_known: Option<Pod>,
    ) -> Result<()> {
        let last_version = last_known.as_ref().and_then(|pod| pod.resource_version().map(str::to_string));
        info!(%key, ?last_version, "PodLoggingHandler.object_deleted");
        Ok(())
    }
}
