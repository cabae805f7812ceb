//! Drives classification and outage adjustment over condensed pods to
//! produce the per-pod report and the per-entity invoices.

use std::collections::{BTreeMap, HashSet};

use crate::catalog::SuCatalog;
use crate::invoice::{classify_snapshot, duration_hours, PodReportRow, ProjectInvoice};
use crate::outage::{subtract_ignore_windows, IgnoreWindow};
use crate::processor::CondensedPod;
use crate::sample::PodKey;

/// One report row per billable segment of every condensed interval,
/// ordered by pod key then by time.
pub fn pod_report(
    condensed: &BTreeMap<PodKey, CondensedPod>,
    catalog: &SuCatalog,
    windows: &[IgnoreWindow],
) -> Vec<PodReportRow> {
    let mut rows = Vec::new();
    for (key, pod) in condensed {
        for interval in &pod.intervals {
            let service_unit = classify_snapshot(&interval.snapshot, catalog);
            for segment in subtract_ignore_windows(interval.start, interval.duration, windows) {
                rows.push(PodReportRow::new(
                    key,
                    &interval.snapshot,
                    segment,
                    service_unit.clone(),
                ));
            }
        }
    }
    rows
}

/// Accumulates invoices keyed by namespace.
pub fn namespace_invoices(
    condensed: &BTreeMap<PodKey, CondensedPod>,
    catalog: &SuCatalog,
    windows: &[IgnoreWindow],
) -> BTreeMap<String, ProjectInvoice> {
    let mut invoices = BTreeMap::new();
    for (key, pod) in condensed {
        add_pod_usage(&mut invoices, key.namespace.clone(), pod, catalog, windows);
    }
    invoices
}

/// Accumulates invoices covering only the namespaces enrolled in
/// class-based billing, split into one entity per class label:
/// `namespace:class`, or `namespace:noclass` for pods without a label.
/// Unenrolled namespaces are omitted entirely; their usage belongs to
/// the namespace invoice alone.
pub fn class_invoices(
    condensed: &BTreeMap<PodKey, CondensedPod>,
    catalog: &SuCatalog,
    windows: &[IgnoreWindow],
    class_namespaces: &HashSet<String>,
) -> BTreeMap<String, ProjectInvoice> {
    let mut invoices = BTreeMap::new();
    for (key, pod) in condensed {
        if !class_namespaces.contains(&key.namespace) {
            continue;
        }
        let class = pod.class_label.as_deref().unwrap_or("noclass");
        let entity = format!("{}:{}", key.namespace, class);
        add_pod_usage(&mut invoices, entity, pod, catalog, windows);
    }
    invoices
}

fn add_pod_usage(
    invoices: &mut BTreeMap<String, ProjectInvoice>,
    entity: String,
    pod: &CondensedPod,
    catalog: &SuCatalog,
    windows: &[IgnoreWindow],
) {
    let invoice = invoices
        .entry(entity.clone())
        .or_insert_with(|| ProjectInvoice::new(entity));
    for interval in &pod.intervals {
        let service_unit = classify_snapshot(&interval.snapshot, catalog);
        for segment in subtract_ignore_windows(interval.start, interval.duration, windows) {
            invoice.add_usage(
                &service_unit.su_type,
                service_unit.su_count,
                duration_hours(segment.duration),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::catalog::SU_UNKNOWN_GPU;
    use crate::invoice::tests::{test_catalog, GPU_A100, SU_A100, SU_CPU, WHOLE_GPU};
    use crate::invoice::Resource;
    use crate::processor::{CondensedPod, UsageInterval};
    use crate::sample::Snapshot;

    const STEP: i64 = 60;

    fn cpu_snapshot(cpu: Decimal, mem_bytes: u64) -> Snapshot {
        Snapshot {
            cpu_request: Some(cpu),
            memory_request: Some(Decimal::from(mem_bytes)),
            ..Snapshot::default()
        }
    }

    fn interval(start: i64, duration: i64, snapshot: Snapshot) -> UsageInterval {
        UsageInterval {
            start,
            duration,
            snapshot,
        }
    }

    fn pod(intervals: Vec<UsageInterval>) -> CondensedPod {
        CondensedPod {
            class_label: None,
            intervals,
        }
    }

    const GIB: u64 = 1 << 30;

    fn two_cpu_pods() -> BTreeMap<PodKey, CondensedPod> {
        let mut condensed = BTreeMap::new();
        condensed.insert(
            PodKey::new("namespace1", "pod1"),
            pod(vec![
                interval(0, STEP, cpu_snapshot(dec!(10), GIB)),
                interval(60, STEP, cpu_snapshot(dec!(15), GIB)),
                interval(120, STEP, cpu_snapshot(dec!(20), GIB)),
            ]),
        );
        condensed.insert(
            PodKey::new("namespace1", "pod2"),
            pod(vec![
                interval(0, STEP, cpu_snapshot(dec!(30), GIB)),
                interval(60, STEP, cpu_snapshot(dec!(35), GIB)),
                interval(120, STEP, cpu_snapshot(dec!(40), GIB)),
            ]),
        );
        condensed
    }

    #[test]
    fn report_classifies_each_interval_independently() {
        let rows = pod_report(&two_cpu_pods(), &test_catalog(), &[]);
        assert_eq!(rows.len(), 6);
        let counts: Vec<Decimal> = rows.iter().map(|r| r.service_unit.su_count).collect();
        assert_eq!(
            counts,
            vec![dec!(10), dec!(15), dec!(20), dec!(30), dec!(35), dec!(40)]
        );
        for row in &rows {
            assert_eq!(row.service_unit.su_type, SU_CPU);
            assert_eq!(row.service_unit.determining_resource, Resource::Cpu);
            assert_eq!(row.end - row.start, STEP);
        }
    }

    #[test]
    fn namespace_invoice_sums_su_hours_across_pods() {
        let invoices = namespace_invoices(&two_cpu_pods(), &test_catalog(), &[]);
        assert_eq!(invoices.len(), 1);
        // (10+15+20+30+35+40) SU for one minute each.
        let expected = Decimal::from(150) * duration_hours(STEP);
        assert_eq!(invoices["namespace1"].hours_for(SU_CPU), expected);
    }

    #[test]
    fn unrecognized_whole_gpu_bills_as_unknown_gpu() {
        let mut condensed = BTreeMap::new();
        let snapshot = Snapshot {
            cpu_request: Some(dec!(8)),
            memory_request: Some(Decimal::from(64 * GIB)),
            gpu_request: Some(dec!(1)),
            gpu_type: Some("Imagination-GPU".to_string()),
            gpu_resource: Some(WHOLE_GPU.to_string()),
            ..Snapshot::default()
        };
        condensed.insert(
            PodKey::new("namespace1", "pod1"),
            pod(vec![interval(0, 3600, snapshot)]),
        );
        let rows = pod_report(&condensed, &test_catalog(), &[]);
        assert_eq!(rows[0].service_unit.su_type, SU_UNKNOWN_GPU);
        assert_eq!(rows[0].service_unit.su_count, dec!(1));
        assert_eq!(rows[0].service_unit.determining_resource, Resource::Gpu);

        let invoices = namespace_invoices(&condensed, &test_catalog(), &[]);
        assert_eq!(invoices["namespace1"].hours_for(SU_UNKNOWN_GPU), dec!(1));
    }

    #[test]
    fn covering_ignore_window_removes_the_entity_pair() {
        let mut condensed = BTreeMap::new();
        condensed.insert(
            PodKey::new("namespace1", "pod1"),
            pod(vec![interval(0, 3600, cpu_snapshot(dec!(1), 4 * GIB))]),
        );
        let window = IgnoreWindow {
            start: Utc.timestamp_opt(0, 0).unwrap(),
            end: Utc.timestamp_opt(7200, 0).unwrap(),
        };
        let invoices = namespace_invoices(&condensed, &test_catalog(), &[window]);
        let invoice = &invoices["namespace1"];
        assert_eq!(invoice.hours_for(SU_CPU), Decimal::ZERO);
        assert!(invoice
            .invoice_rows(&report_metadata(), &crate::invoice::tests::test_rates())
            .is_empty());
    }

    #[test]
    fn interior_ignore_window_splits_report_rows() {
        let mut condensed = BTreeMap::new();
        condensed.insert(
            PodKey::new("namespace1", "pod1"),
            pod(vec![interval(0, 3600, cpu_snapshot(dec!(2), 4 * GIB))]),
        );
        let window = IgnoreWindow {
            start: Utc.timestamp_opt(900, 0).unwrap(),
            end: Utc.timestamp_opt(1800, 0).unwrap(),
        };
        let rows = pod_report(&condensed, &test_catalog(), &[window]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].start, 0);
        assert_eq!(rows[0].end, 900);
        assert_eq!(rows[1].start, 1800);
        assert_eq!(rows[1].end, 3600);
        // Both halves keep the parent interval's classification.
        assert_eq!(rows[0].service_unit, rows[1].service_unit);

        // 2 SU for the billable 0.25 h + 0.5 h.
        let invoices = namespace_invoices(&condensed, &test_catalog(), &[window]);
        assert_eq!(invoices["namespace1"].hours_for(SU_CPU), dec!(1.5));
    }

    #[test]
    fn class_billing_splits_enrolled_namespaces_only() {
        let mut condensed = BTreeMap::new();
        condensed.insert(
            PodKey::new("classroom", "pod1"),
            CondensedPod {
                class_label: Some("class-alpha".to_string()),
                intervals: vec![interval(0, 3600, cpu_snapshot(dec!(1), 4 * GIB))],
            },
        );
        condensed.insert(
            PodKey::new("classroom", "pod2"),
            pod(vec![interval(0, 3600, cpu_snapshot(dec!(2), 4 * GIB))]),
        );
        condensed.insert(
            PodKey::new("research", "pod3"),
            CondensedPod {
                class_label: Some("class-alpha".to_string()),
                intervals: vec![interval(0, 3600, cpu_snapshot(dec!(4), 4 * GIB))],
            },
        );

        let mut class_namespaces = HashSet::new();
        class_namespaces.insert("classroom".to_string());
        let invoices = class_invoices(&condensed, &test_catalog(), &[], &class_namespaces);
        assert_eq!(
            invoices.keys().collect::<Vec<_>>(),
            vec!["classroom:class-alpha", "classroom:noclass"]
        );
        assert_eq!(invoices["classroom:class-alpha"].hours_for(SU_CPU), dec!(1));
        assert_eq!(invoices["classroom:noclass"].hours_for(SU_CPU), dec!(2));
    }

    #[test]
    fn class_invoice_omits_unenrolled_namespaces() {
        // Usage outside the class list belongs on the namespace invoice
        // alone; repeating it here would double-report it.
        let mut condensed = BTreeMap::new();
        condensed.insert(
            PodKey::new("research", "pod1"),
            pod(vec![interval(0, 3600, cpu_snapshot(dec!(1), 4 * GIB))]),
        );
        condensed.insert(
            PodKey::new("classroom", "pod2"),
            CondensedPod {
                class_label: Some("math-201".to_string()),
                intervals: vec![interval(0, 3600, cpu_snapshot(dec!(1), 4 * GIB))],
            },
        );

        let mut class_namespaces = HashSet::new();
        class_namespaces.insert("classroom".to_string());
        let invoices = class_invoices(&condensed, &test_catalog(), &[], &class_namespaces);
        assert_eq!(
            invoices.keys().collect::<Vec<_>>(),
            vec!["classroom:math-201"]
        );
        assert!(!invoices.contains_key("research"));

        // The namespace invoice still carries everything.
        let by_namespace = namespace_invoices(&condensed, &test_catalog(), &[]);
        assert_eq!(by_namespace["research"].hours_for(SU_CPU), dec!(1));
    }

    #[test]
    fn gpu_invoice_hours_accumulate_per_su_type() {
        let mut condensed = BTreeMap::new();
        let snapshot = Snapshot {
            cpu_request: Some(dec!(24)),
            memory_request: Some(Decimal::from(74 * GIB)),
            gpu_request: Some(dec!(1)),
            gpu_type: Some(GPU_A100.to_string()),
            gpu_resource: Some(WHOLE_GPU.to_string()),
            ..Snapshot::default()
        };
        condensed.insert(
            PodKey::new("namespace2", "pod1"),
            pod(vec![
                interval(0, 43_200, snapshot.clone()),
                interval(43_200, 43_200, snapshot),
            ]),
        );
        let invoices = namespace_invoices(&condensed, &test_catalog(), &[]);
        assert_eq!(invoices["namespace2"].hours_for(SU_A100), dec!(24));
    }

    fn report_metadata() -> crate::invoice::ReportMetadata {
        crate::invoice::ReportMetadata {
            report_month: "2023-01".to_string(),
            report_start: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            report_end: Utc.with_ymd_and_hms(2023, 1, 31, 0, 0, 0).unwrap(),
            cluster_name: "test-cluster".to_string(),
            generated_at: Utc.with_ymd_and_hms(2023, 2, 1, 0, 0, 0).unwrap(),
        }
    }
}
