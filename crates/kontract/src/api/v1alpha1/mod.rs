use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub mod action;
pub mod blockexplorer;
pub mod contract;
pub mod contractproxy;
pub mod contractversion;
pub mod eventhook;
pub mod gasstrategy;
pub mod network;
pub mod proxyadmin;
pub mod rpcprovider;
pub mod wallet;

pub use action::Action;
pub use blockexplorer::BlockExplorer;
pub use contract::Contract;
pub use contractproxy::ContractProxy;
pub use contractversion::ContractVersion;
pub use eventhook::EventHook;
pub use gasstrategy::GasStrategy;
pub use network::Network;
pub use proxyadmin::ProxyAdmin;
pub use rpcprovider::RPCProvider;
pub use wallet::Wallet;

/// apiVersion stamped into server-side apply patches.
pub const API_VERSION: &str = "kontract.expedio.xyz/v1alpha1";

/// Names the keys for an API endpoint and an optional API token inside a
/// Secret in the same namespace. The key names are caller-chosen; the
/// operator only dereferences them.
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeyRef {
    /// Name of the Secret
    pub name: String,
    /// Key within the Secret that holds the endpoint URL
    pub api_endpoint: String,
    /// Key within the Secret that holds the API token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Reference to a ConfigMap by name.
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapReference {
    pub name: String,
}

/// Reference to a single key inside a ConfigMap.
#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapKeyRef {
    pub name: String,
    pub key: String,
}

/// Reference to another object in the same namespace by name.
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocalObjectRef {
    pub name: String,
}
