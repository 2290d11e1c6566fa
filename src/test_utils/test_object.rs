use crate::Resource;

/// Minimal resource used by unit tests.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TestObject {
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub resource_version: Option<String>,
    pub payload: String,
}

impl TestObject {
    pub fn new(
        namespace: &str,
        name: &str,
        version: u64,
    ) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            name: Some(name.to_string()),
            resource_version: Some(version.to_string()),
            payload: String::new(),
        }
    }

    pub fn cluster_scoped(
        name: &str,
        version: u64,
    ) -> Self {
        Self {
            namespace: None,
            name: Some(name.to_string()),
            resource_version: Some(version.to_string()),
            payload: String::new(),
        }
    }

    pub fn with_payload(
        mut self,
        payload: &str,
    ) -> Self {
        self.payload = payload.to_string();
        self
    }

    /// Numeric version; 0 when absent or opaque.
    pub fn version(&self) -> u64 {
        self.resource_version
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

impl Resource for TestObject {
    fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn resource_version(&self) -> Option<&str> {
        self.resource_version.as_deref()
    }
}
