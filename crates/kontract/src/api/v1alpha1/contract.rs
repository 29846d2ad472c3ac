use crate::api::v1alpha1::{ConfigMapKeyRef, ConfigMapReference};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Generate the Kubernetes wrapper struct `Contract` from our Spec and Status struct
///
/// A Contract is the deployment template: on every spec generation it fans
/// out into one ContractVersion per referenced network.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(kind = "Contract", group = "kontract.expedio.xyz", version = "v1alpha1", namespaced)]
#[kube(status = "ContractStatus", shortname = "contract")]
#[serde(rename_all = "camelCase")]
pub struct ContractSpec {
    /// ContractName is the name of the smart contract
    pub contract_name: String,

    /// Networks this contract is deployed to
    pub network_refs: Vec<String>,

    /// WalletRef references the Wallet that signs deployment transactions
    pub wallet_ref: String,

    /// GasStrategyRef references the GasStrategy for gas price management
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_strategy_ref: Option<String>,

    /// Constructor parameters passed to the contract at deployment
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub init_params: Vec<String>,

    /// External module identifiers installed by the builder (e.g. git refs)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_modules: Vec<String>,

    /// ConfigMaps whose keys are mounted as local source modules
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub local_modules: Vec<ConfigMapReference>,

    /// Contract source, inline or from a ConfigMap key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_ref: Option<ConfigMapKeyRef>,

    /// Test source, inline or from a ConfigMap key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_ref: Option<ConfigMapKeyRef>,

    /// Deploy script, inline or from a ConfigMap key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_ref: Option<ConfigMapKeyRef>,

    /// foundry.toml contents, inline or from a ConfigMap key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foundry_config: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foundry_config_ref: Option<ConfigMapKeyRef>,

    /// Import indicates the contract already exists on chain
    #[serde(default)]
    pub import: bool,

    /// Address of the contract to import, required when `import` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_contract_address: Option<String>,
}

/// The status object of `Contract`
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContractStatus {
    /// Name stem of the most recent fan-out, `<contract>-version-<generation>`
    #[serde(default)]
    pub current_version: String,
}
