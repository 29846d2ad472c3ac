use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Generate the Kubernetes wrapper struct `GasStrategy` from our Spec and Status struct
///
/// GasStrategies are declarations only; nothing reconciles them yet.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(kind = "GasStrategy", group = "kontract.expedio.xyz", version = "v1alpha1", namespaced)]
#[kube(status = "GasStrategyStatus", shortname = "gasstrategy")]
#[serde(rename_all = "camelCase")]
pub struct GasStrategySpec {
    /// Strategy for picking gas prices (e.g., fixed, oracle)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_type: Option<String>,

    /// Upper bound on the gas price, in wei
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_gas_price: Option<String>,

    /// Priority fee per gas, in wei
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_fee: Option<String>,
}

/// The status object of `GasStrategy`
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GasStrategyStatus {}
