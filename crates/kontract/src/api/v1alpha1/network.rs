use crate::api::v1alpha1::LocalObjectRef;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub static NETWORK_FINALIZER: &str = "kontract.expedio.xyz/network-cleanup";

/// Networks whose `networkName` equals this value get a local ephemeral
/// chain materialized next to them.
pub const LOCAL_CHAIN_NETWORK_NAME: &str = "anvil";

/// Generate the Kubernetes wrapper struct `Network` from our Spec and Status struct
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(kind = "Network", group = "kontract.expedio.xyz", version = "v1alpha1", namespaced)]
#[kube(status = "NetworkStatus", shortname = "network")]
#[serde(rename_all = "camelCase")]
pub struct NetworkSpec {
    /// NetworkName is the name of the blockchain network (e.g., EthereumMainnet)
    pub network_name: String,

    /// ChainID is the unique identifier for the blockchain network
    #[serde(rename = "chainID")]
    pub chain_id: i64,

    /// RPCProviderRef references the RPCProvider used to reach the chain
    #[serde(rename = "rpcProviderRef")]
    pub rpc_provider_ref: LocalObjectRef,

    /// BlockExplorerRef references the BlockExplorer used to verify contracts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_explorer_ref: Option<LocalObjectRef>,
}

/// The status object of `Network`
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    /// Endpoint URL of the referenced RPC provider
    #[serde(default)]
    pub rpc_endpoint: String,

    /// Endpoint URL of the referenced block explorer
    #[serde(default)]
    pub block_explorer_endpoint: String,

    /// AND of the referenced providers' health
    #[serde(default)]
    pub healthy: bool,
}
