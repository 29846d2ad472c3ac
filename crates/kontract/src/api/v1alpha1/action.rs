use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A parameter passed to the contract function
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActionParameter {
    pub name: String,
    pub value: String,
}

/// Generate the Kubernetes wrapper struct `Action` from our Spec and Status struct
///
/// Actions are declarations only; nothing reconciles them yet.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(kind = "Action", group = "kontract.expedio.xyz", version = "v1alpha1", namespaced)]
#[kube(status = "ActionStatus", shortname = "action")]
#[serde(rename_all = "camelCase")]
pub struct ActionSpec {
    /// ActionType defines the type of action (e.g., invoke, query, upgrade, test)
    pub action_type: String,

    pub contract_ref: String,
    pub wallet_ref: String,
    pub network_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_strategy_ref: Option<String>,

    /// Contract function to execute, for invoke or test actions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ActionParameter>,

    /// Optional cron schedule for recurring actions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
}

/// The status object of `Action`
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActionStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_execution: Option<DateTime<Utc>>,

    #[serde(default)]
    pub transaction_hash: String,

    /// Result of the last execution (e.g., Success, Failure)
    #[serde(default)]
    pub result: String,
}
