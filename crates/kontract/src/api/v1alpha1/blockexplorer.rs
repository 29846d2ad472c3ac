use crate::api::v1alpha1::SecretKeyRef;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Generate the Kubernetes wrapper struct `BlockExplorer` from our Spec and Status struct
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(
    kind = "BlockExplorer",
    group = "kontract.expedio.xyz",
    version = "v1alpha1",
    namespaced
)]
#[kube(status = "BlockExplorerStatus", shortname = "blockexplorer")]
#[serde(rename_all = "camelCase")]
pub struct BlockExplorerSpec {
    /// ExplorerName is the name of the block explorer (e.g., Etherscan)
    pub explorer_name: String,

    /// SecretRef names the Secret and the keys for the REST endpoint and
    /// API token
    pub secret_ref: SecretKeyRef,
}

/// The status object of `BlockExplorer`, maintained by the periodic health loop
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BlockExplorerStatus {
    #[serde(default)]
    pub healthy: bool,

    #[serde(default)]
    pub api_endpoint: String,
}
