use chrono::Utc;
use k8s_openapi::api::core::v1::{Event, Node, Pod};

use remedy_cluster::{NodeInfo, PodInfo};
use remedy_core::{ClusterId, RemediationEvent};

/// Convert a core/v1 Event into the engine's event type.
///
/// `Warning` events get severity `warning`, everything else `info`. The
/// event's repeat count and object name are kept in the data map.
pub fn event_from_kube(cluster_id: &ClusterId, ev: &Event) -> RemediationEvent {
    let event_type = ev.type_.clone().unwrap_or_else(|| "Normal".to_owned());
    let severity = if event_type == "Warning" {
        "warning"
    } else {
        "info"
    };
    let source = ev
        .source
        .as_ref()
        .and_then(|s| s.component.clone())
        .or_else(|| ev.reporting_component.clone())
        .unwrap_or_default();
    let timestamp = ev
        .last_timestamp
        .as_ref()
        .map(|t| t.0)
        .or_else(|| ev.event_time.as_ref().map(|t| t.0))
        .or_else(|| ev.first_timestamp.as_ref().map(|t| t.0))
        .unwrap_or_else(Utc::now);

    let involved = &ev.involved_object;
    let mut event = RemediationEvent::new(event_type, cluster_id.clone())
        .with_resource(
            involved.kind.clone().unwrap_or_default(),
            involved.namespace.clone().unwrap_or_default(),
            involved.name.clone().unwrap_or_default(),
        )
        .with_reason(ev.reason.clone().unwrap_or_default())
        .with_message(ev.message.clone().unwrap_or_default())
        .with_severity(severity)
        .with_source(source);
    event.timestamp = timestamp;

    if let Some(count) = ev.count {
        event = event.with_data("count", count);
    }
    if let Some(name) = &ev.metadata.name {
        event = event.with_data("event_name", name.clone());
    }
    event
}

pub fn pod_info(pod: &Pod) -> PodInfo {
    PodInfo {
        name: pod.metadata.name.clone().unwrap_or_default(),
        namespace: pod.metadata.namespace.clone().unwrap_or_default(),
        node_name: pod.spec.as_ref().and_then(|s| s.node_name.clone()),
        owner_kinds: pod
            .metadata
            .owner_references
            .iter()
            .flatten()
            .map(|o| o.kind.clone())
            .collect(),
    }
}

pub fn node_info(node: &Node) -> NodeInfo {
    NodeInfo {
        name: node.metadata.name.clone().unwrap_or_default(),
        unschedulable: node
            .spec
            .as_ref()
            .and_then(|s| s.unschedulable)
            .unwrap_or(false),
        labels: node.metadata.labels.clone().unwrap_or_default(),
    }
}
