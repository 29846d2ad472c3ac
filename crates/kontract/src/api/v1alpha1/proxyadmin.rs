use crate::api::v1alpha1::LocalObjectRef;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Generate the Kubernetes wrapper struct `ProxyAdmin` from our Spec and Status struct
///
/// ProxyAdmins are declarations only; nothing reconciles them yet.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(kind = "ProxyAdmin", group = "kontract.expedio.xyz", version = "v1alpha1", namespaced)]
#[kube(status = "ProxyAdminStatus", shortname = "proxyadmin")]
#[serde(rename_all = "camelCase")]
pub struct ProxyAdminSpec {
    pub network_ref: String,
    pub wallet_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_strategy_ref: Option<String>,

    /// Address of the admin contract on the blockchain
    pub admin_address: String,
}

/// The status object of `ProxyAdmin`
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProxyAdminStatus {
    /// Proxies managed by this ProxyAdmin
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contract_proxy_refs: Vec<LocalObjectRef>,
}
