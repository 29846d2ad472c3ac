use crate::api::v1alpha1::ConfigMapReference;
use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const STATE_DEPLOYED: &str = "deployed";
pub const STATE_FAILED: &str = "failed";

/// Generate the Kubernetes wrapper struct `ContractVersion` from our Spec and Status struct
///
/// A ContractVersion is a single-network deployment instance. All source
/// text and references are captured at fan-out time; the spec never changes
/// afterwards.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(
    kind = "ContractVersion",
    group = "kontract.expedio.xyz",
    version = "v1alpha1",
    namespaced
)]
#[kube(status = "ContractVersionStatus", shortname = "contractversion")]
#[serde(rename_all = "camelCase")]
pub struct ContractVersionSpec {
    pub contract_name: String,
    pub network_ref: String,
    pub wallet_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_strategy_ref: Option<String>,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foundry_config: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub init_params: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_modules: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub local_modules: Vec<ConfigMapReference>,
}

/// The status object of `ContractVersion`
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContractVersionStatus {
    /// Address harvested from the deploy Job's logs
    #[serde(default)]
    pub contract_address: String,

    /// Transaction hash harvested from the deploy Job's logs
    #[serde(default)]
    pub transaction_hash: String,

    /// Set once, on the first reconcile that observes the Job succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_time: Option<DateTime<Utc>>,

    /// "" | "deployed" | "failed"
    #[serde(default)]
    pub state: String,
}

impl ContractVersionStatus {
    pub fn is_terminal(&self) -> bool {
        self.state == STATE_DEPLOYED || self.state == STATE_FAILED
    }
}
