//! Kubernetes events for killed pods.

use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;

use crate::instance::Instance;

/// Component name used as the event source.
pub const EVENT_COMPONENT: &str = "kubethanos";

/// Event type recorded for a killed pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Normal,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("Normal"),
        }
    }
}

impl From<EventKind> for EventType {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Normal => EventType::Normal,
        }
    }
}

/// Sink for events attached to a Kubernetes object.
#[async_trait]
pub trait EventEmitter: Send + Sync {
    async fn record_event(
        &self,
        reference: &ObjectReference,
        kind: EventKind,
        reason: &str,
        message: &str,
    ) -> Result<(), kube::Error>;
}

/// Build the core/v1 object reference for a pod.
pub fn object_reference(instance: &Instance) -> Result<ObjectReference, String> {
    if instance.name.is_empty() {
        return Err("pod has no name".to_string());
    }
    if instance.namespace.is_empty() {
        return Err(format!("pod {} has no namespace", instance.name));
    }

    Ok(ObjectReference {
        api_version: Some("v1".to_string()),
        kind: Some("Pod".to_string()),
        name: Some(instance.name.clone()),
        namespace: Some(instance.namespace.clone()),
        uid: instance.uid.clone(),
        resource_version: instance.resource_version.clone(),
        field_path: None,
    })
}

/// [`EventEmitter`] that publishes through the kube-runtime event recorder.
#[derive(Clone)]
pub struct KubeEventEmitter {
    recorder: Recorder,
}

impl KubeEventEmitter {
    /// Create an emitter reporting as `kubethanos`; `instance` is usually the pod name.
    #[must_use]
    pub fn new(client: Client, instance: Option<String>) -> Self {
        let reporter = Reporter {
            controller: EVENT_COMPONENT.to_string(),
            instance,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventEmitter for KubeEventEmitter {
    async fn record_event(
        &self,
        reference: &ObjectReference,
        kind: EventKind,
        reason: &str,
        message: &str,
    ) -> Result<(), kube::Error> {
        let event = Event {
            type_: kind.into(),
            reason: reason.to_string(),
            note: Some(message.to_string()),
            action: reason.to_string(),
            secondary: None,
        };
        self.recorder.publish(&event, reference).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_reference_for_pod() {
        let instance = Instance::new("prod", "api-0").with_uid("abc");
        let reference = object_reference(&instance).unwrap();
        assert_eq!(reference.kind.as_deref(), Some("Pod"));
        assert_eq!(reference.api_version.as_deref(), Some("v1"));
        assert_eq!(reference.namespace.as_deref(), Some("prod"));
        assert_eq!(reference.name.as_deref(), Some("api-0"));
        assert_eq!(reference.uid.as_deref(), Some("abc"));
    }

    #[test]
    fn test_event_kind_maps_to_normal() {
        assert_eq!(EventKind::Normal.to_string(), "Normal");
        assert!(matches!(EventType::from(EventKind::Normal), EventType::Normal));
    }

    #[test]
    fn test_object_reference_requires_identity() {
        assert!(object_reference(&Instance::new("prod", "")).is_err());
        assert!(object_reference(&Instance::new("", "api-0")).is_err());
    }
}
