use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Optional conditions to filter events
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
}

/// Generate the Kubernetes wrapper struct `EventHook` from our Spec and Status struct
///
/// EventHooks are declarations only; nothing reconciles them yet.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(kind = "EventHook", group = "kontract.expedio.xyz", version = "v1alpha1", namespaced)]
#[kube(status = "EventHookStatus", shortname = "eventhook")]
#[serde(rename_all = "camelCase")]
pub struct EventHookSpec {
    /// Event that triggers the hook (e.g., BlockMined, ContractEvent)
    pub event_type: String,

    pub contract_ref: String,

    /// Action to trigger when the event fires
    pub action_ref: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<EventFilter>,
}

/// The status object of `EventHook`
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventHookStatus {}
