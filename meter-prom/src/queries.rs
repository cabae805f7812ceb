//! Canonical range queries for one collection run. Unschedulable pods
//! and pods not yet bound to a node are excluded at the source so they
//! never reach billing.

pub const CPU_REQUEST: &str = r#"kube_pod_resource_request{resource="cpu", node!=""} unless on(pod, namespace) kube_pod_status_unschedulable"#;

pub const MEMORY_REQUEST: &str = r#"kube_pod_resource_request{resource="memory", node!=""} unless on(pod, namespace) kube_pod_status_unschedulable"#;

pub const GPU_REQUEST: &str = r#"kube_pod_resource_request{resource=~"nvidia.com.*", node!=""} unless on(pod, namespace) kube_pod_status_unschedulable"#;

/// Node labels for GPU nodes, joined onto GPU series by node name.
pub const GPU_NODE_LABELS: &str = r#"kube_node_labels{label_nvidia_com_gpu_product!=""}"#;

/// Pod labels for class-based billing, joined onto series by pod.
pub const CLASS_POD_LABELS: &str = r#"kube_pod_labels{label_nerc_mghpcc_org_class!=""}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_queries_exclude_unbound_and_unschedulable_pods() {
        for query in [CPU_REQUEST, MEMORY_REQUEST, GPU_REQUEST] {
            assert!(query.contains(r#"node!="""#));
            assert!(query.contains("unless on(pod, namespace) kube_pod_status_unschedulable"));
        }
        assert!(CPU_REQUEST.contains(r#"resource="cpu""#));
        assert!(MEMORY_REQUEST.contains(r#"resource="memory""#));
        assert!(GPU_REQUEST.contains(r#"resource=~"nvidia.com.*""#));
    }
}
