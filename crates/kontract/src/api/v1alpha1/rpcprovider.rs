use crate::api::v1alpha1::SecretKeyRef;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Generate the Kubernetes wrapper struct `RPCProvider` from our Spec and Status struct
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(
    kind = "RPCProvider",
    group = "kontract.expedio.xyz",
    version = "v1alpha1",
    namespaced
)]
#[kube(status = "RPCProviderStatus", shortname = "rpcprovider")]
#[serde(rename_all = "camelCase")]
pub struct RPCProviderSpec {
    /// ProviderName is the name of the RPC provider (e.g., Infura)
    pub provider_name: String,

    /// SecretRef names the Secret and the keys for the endpoint URL and
    /// optional API token
    pub secret_ref: SecretKeyRef,

    /// Timeout for RPC calls, e.g. "10s"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

/// The status object of `RPCProvider`, maintained by the periodic health loop
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RPCProviderStatus {
    /// Whether the last probe within the tick window succeeded
    #[serde(default)]
    pub healthy: bool,

    /// The endpoint URL as of the last probe (never includes the token)
    #[serde(default)]
    pub api_endpoint: String,
}
