use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Generate the Kubernetes wrapper struct `ContractProxy` from our Spec and Status struct
///
/// ContractProxies are declarations only; nothing reconciles them yet.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(
    kind = "ContractProxy",
    group = "kontract.expedio.xyz",
    version = "v1alpha1",
    namespaced
)]
#[kube(status = "ContractProxyStatus", shortname = "contractproxy")]
#[serde(rename_all = "camelCase")]
pub struct ContractProxySpec {
    /// ProxyType defines the type of proxy (e.g., Transparent)
    pub proxy_type: String,

    pub network_ref: String,
    pub wallet_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_strategy_ref: Option<String>,

    /// References the implementation contract
    pub implementation_ref: String,

    /// References the ProxyAdmin managing this proxy
    pub proxy_admin_ref: String,
}

/// The status object of `ContractProxy`
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContractProxyStatus {
    /// Address of the proxy contract on the blockchain
    #[serde(default)]
    pub proxy_address: String,
}
