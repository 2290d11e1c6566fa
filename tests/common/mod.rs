use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::api::core::v1::PodSpec;
use k8s_openapi::api::core::v1::PodStatus;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use parking_lot::Mutex;
use pod_reconciler::source::DeletedObject;
use pod_reconciler::source::ObjectList;
use pod_reconciler::source::RemoteCollection;
use pod_reconciler::source::WatchEvent;
use pod_reconciler::source::WatchStream;
use pod_reconciler::ControllerConfig;
use pod_reconciler::Handler;
use pod_reconciler::Pipeline;
use pod_reconciler::PipelineBuilder;
use pod_reconciler::Resource;
use pod_reconciler::Result;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio_stream::wrappers::UnboundedReceiverStream;

pub const NAMESPACE: &str = "idc-demo-dev";
pub const WAIT: Duration = Duration::from_secs(10);

pub fn pod(
    name: &str,
    version: u64,
    node: &str,
    phase: &str,
) -> Pod {
    Pod {
        metadata: ObjectMeta {
            namespace: Some(NAMESPACE.to_string()),
            name: Some(name.to_string()),
            resource_version: Some(version.to_string()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            node_name: Some(node.to_string()),
            ..Default::default()
        }),
        status: Some(PodStatus {
            phase: Some(phase.to_string()),
            ..Default::default()
        }),
    }
}

pub fn key(name: &str) -> String {
    format!("{}/{}", NAMESPACE, name)
}

type Feed = mpsc::UnboundedSender<Result<WatchEvent<Pod>>>;

#[derive(Default)]
struct ClusterState {
    version: u64,
    pods: BTreeMap<String, Pod>,
    /// Every change with the version it produced
    history: Vec<(u64, WatchEvent<Pod>)>,
    watchers: Vec<Feed>,
}

/// In-memory Pod API with resumable watches.
///
/// A watch opened at version `v` first replays every change newer than `v`,
/// then follows live changes until `interrupt_watches` drops it.
#[derive(Default)]
pub struct MemoryPods {
    state: Mutex<ClusterState>,
}

impl MemoryPods {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn apply(
        &self,
        name: &str,
        node: &str,
        phase: &str,
    ) -> Pod {
        let mut state = self.state.lock();
        state.version += 1;
        let obj = pod(name, state.version, node, phase);
        let event = if state.pods.insert(name.to_string(), obj.clone()).is_some() {
            WatchEvent::Modified(obj.clone())
        } else {
            WatchEvent::Added(obj.clone())
        };
        Self::publish(&mut state, event);
        obj
    }

    pub fn delete(
        &self,
        name: &str,
    ) {
        let mut state = self.state.lock();
        if let Some(mut obj) = state.pods.remove(name) {
            state.version += 1;
            obj.metadata.resource_version = Some(state.version.to_string());
            Self::publish(&mut state, WatchEvent::Deleted(DeletedObject::Live(obj)));
        }
    }

    /// Ends every open watch stream.
    pub fn interrupt_watches(&self) {
        self.state.lock().watchers.clear();
    }

    fn publish(
        state: &mut ClusterState,
        event: WatchEvent<Pod>,
    ) {
        let version = state.version;
        state.history.push((version, event.clone()));
        state.watchers.retain(|feed| feed.send(Ok(event.clone())).is_ok());
    }
}

#[async_trait::async_trait]
impl RemoteCollection<Pod> for MemoryPods {
    fn scope(&self) -> String {
        NAMESPACE.to_string()
    }

    async fn list(&self) -> Result<ObjectList<Pod>> {
        let state = self.state.lock();
        Ok(ObjectList::new(
            state.pods.values().cloned().collect(),
            Some(state.version.to_string()),
        ))
    }

    async fn watch(
        &self,
        resource_version: Option<String>,
    ) -> Result<WatchStream<Pod>> {
        let since: u64 = resource_version.and_then(|v| v.parse().ok()).unwrap_or(0);
        let (tx, rx) = mpsc::unbounded_channel();

        let mut state = self.state.lock();
        for (version, event) in &state.history {
            if *version > since {
                let _ = tx.send(Ok(event.clone()));
            }
        }
        state.watchers.push(tx);

        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Created { key: String, version: String },
    Updated { key: String, from: String, to: String },
    Deleted { key: String },
}

/// Forwards every handler call to a channel.
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<Observed>,
}

impl ChannelHandler {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Observed>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }

    fn send(
        &self,
        observed: Observed,
    ) -> Result<()> {
        // Receiver dropped at the end of a test
        let _ = self.tx.send(observed);
        Ok(())
    }
}

fn pod_key(obj: &Pod) -> String {
    format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name().unwrap_or_default())
}

fn version(obj: &Pod) -> String {
    obj.resource_version().unwrap_or_default().to_string()
}

#[async_trait::async_trait]
impl Handler<Pod> for ChannelHandler {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn object_created(
        &self,
        obj: &Pod,
    ) -> Result<()> {
        self.send(Observed::Created {
            key: pod_key(obj),
            version: version(obj),
        })
    }

    async fn object_updated(
        &self,
        old: &Pod,
        new: &Pod,
    ) -> Result<()> {
        self.send(Observed::Updated {
            key: pod_key(new),
            from: version(old),
            to: version(new),
        })
    }

    async fn object_deleted(
        &self,
        key: &str,
        _last_known: Option<Pod>,
    ) -> Result<()> {
        self.send(Observed::Deleted { key: key.to_string() })
    }
}

pub fn config(workers: usize) -> ControllerConfig {
    let mut config = ControllerConfig::default();
    config.source.api_server_url = "https://127.0.0.1:6443".to_string();
    config.source.kubeconfig = "/dev/null".into();
    config.source.namespace = NAMESPACE.to_string();
    config.queue.workers = workers;
    config.retry.relist.base_delay_ms = 10;
    config.retry.relist.max_delay_ms = 100;
    config.validate().expect("valid test config")
}

pub fn pipeline(
    source: Arc<MemoryPods>,
    handler: Arc<ChannelHandler>,
    workers: usize,
    shutdown_rx: watch::Receiver<()>,
) -> Pipeline<Pod, ChannelHandler> {
    PipelineBuilder::new(config(workers), shutdown_rx)
        .source(source)
        .handler(handler)
        .build()
        .expect("pipeline builds")
}

pub async fn next_observed(rx: &mut mpsc::UnboundedReceiver<Observed>) -> Observed {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for handler call")
        .expect("handler channel closed")
}
