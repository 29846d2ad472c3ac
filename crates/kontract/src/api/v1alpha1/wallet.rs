use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Optional import settings for a Wallet
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportFromSpec {
    /// References a Secret that already contains the wallet's key pair
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<String>,
}

/// Generate the Kubernetes wrapper struct `Wallet` from our Spec and Status struct
///
/// This provides a hook for generating the CRD yaml (in crdgen)
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(kind = "Wallet", group = "kontract.expedio.xyz", version = "v1alpha1", namespaced)]
#[kube(status = "WalletStatus", shortname = "wallet")]
#[serde(rename_all = "camelCase")]
pub struct WalletSpec {
    /// WalletType specifies the type of wallet (e.g., EOA, Contract)
    pub wallet_type: String,

    /// NetworkRef references the Network resource where this wallet is used
    pub network_ref: String,

    /// ImportFrom specifies the details for importing an existing wallet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_from: Option<ImportFromSpec>,
}

/// The status object of `Wallet`
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalletStatus {
    /// The checksummed account address derived from the key pair
    #[serde(default)]
    pub public_key: String,

    /// Name of the Secret holding the key pair
    #[serde(default)]
    pub secret_ref: String,
}
