//! Joins side-channel label series onto resource-request series so the
//! saved artifacts are self-contained for billing.

use std::collections::HashMap;

use meter_core::sample::{Series, LABEL_GPU_MACHINE, LABEL_GPU_PRODUCT, LABEL_POD_CLASS};

/// Copies GPU product and machine labels from node-label series onto
/// each GPU request series scheduled on that node.
pub fn merge_node_labels(gpu_series: &mut [Series], node_labels: &[Series]) {
    let mut by_node: HashMap<&str, &Series> = HashMap::new();
    for labels in node_labels {
        if let Some(node) = labels.label("node") {
            by_node.insert(node, labels);
        }
    }

    for series in gpu_series.iter_mut() {
        let Some(node) = series.label("node") else {
            continue;
        };
        let Some(labels) = by_node.get(node) else {
            log::warn!("no GPU labels for node {}", node);
            continue;
        };
        for key in [LABEL_GPU_PRODUCT, LABEL_GPU_MACHINE] {
            if let Some(value) = labels.label(key) {
                series.metric.insert(key.to_string(), value.to_string());
            }
        }
    }
}

/// Copies the class label from pod-label series onto every resource
/// series of the same pod.
pub fn merge_pod_labels(series: &mut [Series], pod_labels: &[Series]) {
    let mut by_pod: HashMap<(&str, &str), &str> = HashMap::new();
    for labels in pod_labels {
        if let (Some(namespace), Some(pod), Some(class)) = (
            labels.label("namespace"),
            labels.label("pod"),
            labels.label(LABEL_POD_CLASS),
        ) {
            by_pod.insert((namespace, pod), class);
        }
    }

    for series in series.iter_mut() {
        let key = match (series.label("namespace"), series.label("pod")) {
            (Some(namespace), Some(pod)) => (namespace, pod),
            _ => continue,
        };
        if let Some(class) = by_pod.get(&key) {
            let class = class.to_string();
            series.metric.insert(LABEL_POD_CLASS.to_string(), class);
        }
    }
}
