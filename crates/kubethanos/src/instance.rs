//! Pod snapshot used by the selection pipeline.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use serde::{Deserialize, Serialize};

/// Read-only view of a pod as listed from the cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub namespace: String,
    pub name: String,
    pub uid: Option<String>,
    pub resource_version: Option<String>,
    /// Set once the API server has accepted a delete for the pod.
    pub deletion_timestamp: Option<DateTime<Utc>>,
    pub labels: BTreeMap<String, String>,
}

impl Instance {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    #[must_use]
    pub fn terminating_since(mut self, at: DateTime<Utc>) -> Self {
        self.deletion_timestamp = Some(at);
        self
    }

    pub fn is_terminating(&self) -> bool {
        self.deletion_timestamp.is_some()
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl From<&Pod> for Instance {
    fn from(pod: &Pod) -> Self {
        let meta = &pod.metadata;
        Self {
            namespace: meta.namespace.clone().unwrap_or_default(),
            name: meta.name.clone().unwrap_or_default(),
            uid: meta.uid.clone(),
            resource_version: meta.resource_version.clone(),
            deletion_timestamp: meta.deletion_timestamp.as_ref().map(|t| t.0),
            labels: meta.labels.clone().unwrap_or_default(),
        }
    }
}

impl From<Pod> for Instance {
    fn from(pod: Pod) -> Self {
        Self::from(&pod)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use kube::core::ObjectMeta;

    #[test]
    fn test_from_pod_copies_identity_and_deletion_state() {
        let deleted_at = Utc::now();
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("api-7f9c".to_string()),
                namespace: Some("prod".to_string()),
                uid: Some("1234".to_string()),
                resource_version: Some("42".to_string()),
                deletion_timestamp: Some(Time(deleted_at)),
                labels: Some(BTreeMap::from([("app".to_string(), "api".to_string())])),
                ..ObjectMeta::default()
            },
            ..Pod::default()
        };

        let instance = Instance::from(&pod);
        assert_eq!(instance.namespace, "prod");
        assert_eq!(instance.name, "api-7f9c");
        assert_eq!(instance.uid.as_deref(), Some("1234"));
        assert_eq!(instance.resource_version.as_deref(), Some("42"));
        assert!(instance.is_terminating());
        assert_eq!(instance.labels.get("app").map(String::as_str), Some("api"));
        assert_eq!(instance.to_string(), "prod/api-7f9c");
    }

    #[test]
    fn test_running_pod_is_not_terminating() {
        let instance = Instance::from(Pod::default());
        assert!(!instance.is_terminating());
        assert!(instance.name.is_empty());
    }
}
