use std::path::Path;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::api::WatchParams;
use kube::config::KubeConfigOptions;
use kube::config::Kubeconfig;
use kube::Api;
use kube::Client;
use kube::Config;
use tracing::debug;
use tracing::info;

use super::DeletedObject;
use super::ObjectList;
use super::RemoteCollection;
use super::WatchEvent;
use super::WatchStream;
use crate::Result;
use crate::SourceError;

/// Pods of a single namespace, listed and watched through the Kubernetes API.
pub struct KubePodCollection {
    api: Api<Pod>,
    namespace: String,
}

impl KubePodCollection {
    /// Builds a client from an explicit API server URL and a kubeconfig file.
    ///
    /// The URL overrides whatever cluster endpoint the kubeconfig names.
    pub async fn connect(
        api_server_url: &str,
        kubeconfig_path: &Path,
        namespace: &str,
    ) -> Result<Self> {
        let connect_err = |reason: String| SourceError::Connect {
            endpoint: api_server_url.to_string(),
            reason,
        };

        let kubeconfig = Kubeconfig::read_from(kubeconfig_path)
            .map_err(|e| connect_err(format!("read kubeconfig {}: {}", kubeconfig_path.display(), e)))?;
        let mut config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| connect_err(e.to_string()))?;
        config.cluster_url = api_server_url
            .parse::<http::Uri>()
            .map_err(|e| connect_err(format!("invalid url: {}", e)))?;

        let client = Client::try_from(config).map_err(|e| connect_err(e.to_string()))?;
        info!(endpoint = api_server_url, namespace, "kubernetes client ready");

        Ok(Self::from_client(client, namespace))
    }

    pub fn from_client(
        client: Client,
        namespace: &str,
    ) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            namespace: namespace.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl RemoteCollection<Pod> for KubePodCollection {
    fn scope(&self) -> String {
        self.namespace.clone()
    }

    async fn list(&self) -> Result<ObjectList<Pod>> {
        let list = self
            .api
            .list(&ListParams::default())
            .await
            .map_err(|e| SourceError::List(e.to_string()))?;

        debug!(
            namespace = %self.namespace,
            count = list.items.len(),
            resource_version = ?list.metadata.resource_version,
            "listed pods"
        );
        Ok(ObjectList::new(list.items, list.metadata.resource_version))
    }

    async fn watch(
        &self,
        resource_version: Option<String>,
    ) -> Result<WatchStream<Pod>> {
        let version = resource_version.unwrap_or_else(|| "0".to_string());
        let stream = self
            .api
            .watch(&WatchParams::default(), &version)
            .await
            .map_err(|e| SourceError::Watch(e.to_string()))?;

        Ok(stream
            .map(|event| -> Result<WatchEvent<Pod>> {
                match event {
                    Ok(kube::api::WatchEvent::Added(pod)) => Ok(WatchEvent::Added(pod)),
                    Ok(kube::api::WatchEvent::Modified(pod)) => Ok(WatchEvent::Modified(pod)),
                    Ok(kube::api::WatchEvent::Deleted(pod)) => Ok(WatchEvent::Deleted(DeletedObject::Live(pod))),
                    Ok(kube::api::WatchEvent::Bookmark(bookmark)) => {
                        Ok(WatchEvent::Bookmark(bookmark.metadata.resource_version))
                    }
                    Ok(kube::api::WatchEvent::Error(status)) => {
                        Err(SourceError::StreamInterrupted(format!("{:?}", status)).into())
                    }
                    Err(e) => Err(SourceError::StreamInterrupted(e.to_string()).into()),
                }
            })
            .boxed())
    }
}
