use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Pods that requested a GPU we cannot identify.
pub const SU_UNKNOWN_GPU: &str = "Unknown GPU";
/// Pods on a partitioned (MIG) slice of a GPU; never billed at finer
/// granularity than this.
pub const SU_UNKNOWN_MIG_GPU: &str = "Unknown MIG GPU";
/// Pods in states we cannot bill meaningfully (no CPU or memory request).
pub const SU_UNKNOWN: &str = "Unknown";

/// The resource bundle that equals one unit of a service unit type.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SuProfile {
    pub vcpus: Decimal,
    pub ram_gib: Decimal,
    /// Non-GPU profiles may carry a negative sentinel here so the GPU
    /// multiplier can never dominate the classification.
    pub gpus: Decimal,
}

/// Classification configuration supplied by the deployment: which service
/// unit types exist, what one unit of each is worth in resources, and how
/// GPU labels map onto them. The engine itself only knows the three
/// sentinel "unknown" types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuCatalog {
    /// Name of the base CPU service unit, the only type billed fractionally.
    pub cpu_su: String,
    /// Service unit type -> resource profile.
    pub definitions: HashMap<String, SuProfile>,
    /// GPU product label -> service unit type, for whole-device requests.
    #[serde(default)]
    pub whole_gpu_models: HashMap<String, String>,
    /// Resource name -> service unit type, for full-device passthrough
    /// resources that name the device directly.
    #[serde(default)]
    pub passthrough_gpu_resources: HashMap<String, String>,
    /// GPU product labels that support partitioned (MIG) allocation.
    #[serde(default)]
    pub mig_capable_models: HashSet<String>,
    /// The resource name that denotes a whole-GPU request.
    #[serde(default = "default_whole_gpu_resource")]
    pub whole_gpu_resource: String,
}

fn default_whole_gpu_resource() -> String {
    "nvidia.com/gpu".to_string()
}

impl SuCatalog {
    /// Resource profile for a service unit type. Falls back to the fixed
    /// sentinel profiles when the catalog does not define the type.
    pub fn profile(&self, su_type: &str) -> SuProfile {
        if let Some(profile) = self.definitions.get(su_type) {
            return *profile;
        }
        match su_type {
            SU_UNKNOWN_GPU | SU_UNKNOWN_MIG_GPU => SuProfile {
                vcpus: Decimal::from(8),
                ram_gib: Decimal::from(64),
                gpus: Decimal::ONE,
            },
            _ => SuProfile {
                vcpus: Decimal::ONE,
                ram_gib: Decimal::ONE,
                gpus: Decimal::ZERO,
            },
        }
    }

    /// Rejects profiles that would divide by zero during classification.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (name, profile) in &self.definitions {
            if profile.vcpus <= Decimal::ZERO || profile.ram_gib <= Decimal::ZERO {
                return Err(CoreError::DegenerateProfile(name.clone()));
            }
        }
        Ok(())
    }
}

/// True for the service unit types owned by the engine rather than the
/// catalog; these carry no rate and bill at zero.
pub fn is_sentinel(su_type: &str) -> bool {
    matches!(su_type, SU_UNKNOWN | SU_UNKNOWN_GPU | SU_UNKNOWN_MIG_GPU)
}

/// Hourly prices per service unit type.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Rates(pub HashMap<String, Decimal>);

impl Rates {
    pub fn rate_for(&self, su_type: &str) -> Decimal {
        self.0.get(su_type).copied().unwrap_or(Decimal::ZERO)
    }

    /// Every billable catalog type needs a price before any invoice math
    /// runs; sentinel types are exempt.
    pub fn validate(&self, catalog: &SuCatalog) -> Result<(), CoreError> {
        for name in catalog.definitions.keys() {
            if !is_sentinel(name) && !self.0.contains_key(name) {
                return Err(CoreError::MissingRate(name.clone()));
            }
        }
        Ok(())
    }
}
