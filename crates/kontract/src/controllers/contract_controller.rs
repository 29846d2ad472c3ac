use crate::api::v1alpha1::contract::{Contract, ContractStatus};
use crate::api::v1alpha1::contractversion::{ContractVersion, ContractVersionSpec};
use crate::api::v1alpha1::{ConfigMapKeyRef, API_VERSION};
use crate::controllers::state::{Context, State};
use crate::util::errors::{self, Error, Result, StdError};
use chrono::Utc;
use futures::StreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{
    api::{Api, ListParams, Patch, PatchParams, PostParams, ResourceExt},
    client::Client,
    runtime::{
        controller::{Action, Controller},
        events::{Event, EventType},
        watcher::{self, Config},
    },
    Resource,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::*;

pub const FIELD_MANAGER: &str = "kontract-contract-controller";

/// An inline-or-referenced source field. The inline form wins when both are
/// set.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Inline(String),
    Ref(ConfigMapKeyRef),
    Absent,
}

impl Source {
    pub fn from_spec(inline: Option<&String>, reference: Option<&ConfigMapKeyRef>) -> Source {
        if let Some(text) = inline.filter(|t| !t.is_empty()) {
            return Source::Inline(text.clone());
        }
        if let Some(r) = reference {
            return Source::Ref(r.clone());
        }
        Source::Absent
    }

    /// Resolve to the effective text. A missing ConfigMap is transient; a
    /// missing key inside an existing ConfigMap is a configuration error.
    pub async fn resolve(&self, cms: &Api<ConfigMap>) -> Result<Option<String>> {
        match self {
            Source::Inline(text) => Ok(Some(text.clone())),
            Source::Absent => Ok(None),
            Source::Ref(r) => {
                let cm = cms.get(&r.name).await.map_err(Error::kube)?;
                extract_key(cm.data.as_ref(), &r.name, &r.key).map(Some)
            }
        }
    }
}

pub fn extract_key(
    data: Option<&BTreeMap<String, String>>,
    cm_name: &str,
    key: &str,
) -> Result<String> {
    data.and_then(|d| d.get(key))
        .cloned()
        .ok_or_else(|| {
            Error::StdError(StdError::MetadataMissing(format!(
                "key {key} not found in ConfigMap {cm_name}"
            )))
        })
}

pub fn contract_version_name(contract: &str, network: &str, generation: i64) -> String {
    format!("{contract}-{network}-version-{generation}")
}

pub fn current_version_name(contract: &str, generation: i64) -> String {
    format!("{contract}-version-{generation}")
}

/// The plain text captured into each fanned-out ContractVersion.
#[derive(Debug, Default)]
pub struct ResolvedSources {
    pub code: Option<String>,
    pub test: Option<String>,
    pub script: Option<String>,
    pub foundry_config: Option<String>,
}

impl Contract {
    async fn resolve_sources(&self, cms: &Api<ConfigMap>) -> Result<ResolvedSources> {
        Ok(ResolvedSources {
            code: Source::from_spec(self.spec.code.as_ref(), self.spec.code_ref.as_ref())
                .resolve(cms)
                .await?,
            test: Source::from_spec(self.spec.test.as_ref(), self.spec.test_ref.as_ref())
                .resolve(cms)
                .await?,
            script: Source::from_spec(self.spec.script.as_ref(), self.spec.script_ref.as_ref())
                .resolve(cms)
                .await?,
            foundry_config: Source::from_spec(
                self.spec.foundry_config.as_ref(),
                self.spec.foundry_config_ref.as_ref(),
            )
            .resolve(cms)
            .await?,
        })
    }

    async fn reconcile(&self, ctx: Arc<Context>) -> Result<Action> {
        let client = ctx.client.clone();
        let ns = self.namespace().unwrap();
        let name = self.name_any();
        let recorder = ctx.diagnostics.read().await.recorder(client.clone());
        let cms: Api<ConfigMap> = Api::namespaced(client.clone(), &ns);

        // Resolve every inline-or-ref source up front; the versions capture
        // plain text only.
        let ResolvedSources {
            code,
            test,
            script,
            foundry_config,
        } = match self.resolve_sources(&cms).await {
            Ok(sources) => sources,
            Err(Error::StdError(StdError::MetadataMissing(msg))) => {
                // The user has to edit the spec or the ConfigMap; editing
                // either re-triggers this reconcile.
                warn!("Contract \"{}\": {}", name, msg);
                recorder
                    .publish(
                        &Event {
                            type_: EventType::Warning,
                            reason: "SourceKeyMissing".into(),
                            note: Some(msg),
                            action: "Resolving".into(),
                            secondary: None,
                        },
                        &self.object_ref(&()),
                    )
                    .await
                    .map_err(Error::kube)?;
                // The fix may be an edit to the referenced ConfigMap, which
                // this controller does not watch; check back periodically.
                return Ok(Action::requeue(Duration::from_secs(5 * 60)));
            }
            Err(e) => return Err(e),
        };

        if code.as_deref().unwrap_or_default().is_empty()
            && script.as_deref().unwrap_or_default().is_empty()
        {
            warn!("Contract \"{}\" has neither code nor script; nothing to deploy", name);
            recorder
                .publish(
                    &Event {
                        type_: EventType::Warning,
                        reason: "MissingCodeAndScript".into(),
                        note: Some("Contract has neither code nor script to deploy".into()),
                        action: "Resolving".into(),
                        secondary: None,
                    },
                    &self.object_ref(&()),
                )
                .await
                .map_err(Error::kube)?;
            return Ok(Action::await_change());
        }

        // One ContractVersion per network per spec generation; AlreadyExists
        // makes the fan-out idempotent.
        let generation = self.metadata.generation.unwrap_or(1);
        let versions: Api<ContractVersion> = Api::namespaced(client.clone(), &ns);
        for network_ref in &self.spec.network_refs {
            let version_name = contract_version_name(&name, network_ref, generation);
            let mut version = ContractVersion::new(
                &version_name,
                ContractVersionSpec {
                    contract_name: self.spec.contract_name.clone(),
                    network_ref: network_ref.clone(),
                    wallet_ref: self.spec.wallet_ref.clone(),
                    gas_strategy_ref: self.spec.gas_strategy_ref.clone(),
                    code: code.clone().unwrap_or_default(),
                    test: test.clone().filter(|t| !t.is_empty()),
                    script: script.clone().filter(|s| !s.is_empty()),
                    foundry_config: foundry_config.clone().filter(|c| !c.is_empty()),
                    init_params: self.spec.init_params.clone(),
                    external_modules: self.spec.external_modules.clone(),
                    local_modules: self.spec.local_modules.clone(),
                },
            );
            version.metadata.namespace = Some(ns.clone());
            version.metadata.owner_references = self.controller_owner_ref(&()).map(|oref| vec![oref]);

            match versions.create(&PostParams::default(), &version).await {
                Ok(_) => info!("Created ContractVersion \"{}\"", version_name),
                Err(kube::Error::Api(err)) if err.code == 409 => {
                    debug!("ContractVersion \"{}\" already exists", version_name)
                }
                Err(e) => return Err(Error::kube(e)),
            }
        }

        let contracts: Api<Contract> = Api::namespaced(client.clone(), &ns);
        let new_status = Patch::Apply(json!({
            "apiVersion": API_VERSION,
            "kind": "Contract",
            "status": ContractStatus {
                current_version: current_version_name(&name, generation),
            }
        }));
        let ps = PatchParams::apply(FIELD_MANAGER).force();
        contracts
            .patch_status(&name, &ps, &new_status)
            .await
            .map_err(Error::kube)?;

        Ok(Action::await_change())
    }
}

pub async fn reconcile(contract: Arc<Contract>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = ctx.metrics.count_and_measure("contract");
    ctx.diagnostics.write().await.last_event = Utc::now();

    let ns = contract.namespace().unwrap(); // contract is namespace scoped
    info!("Reconciling Contract \"{}\" in {}", contract.name_any(), ns);

    contract.reconcile(ctx).await
}

fn error_policy(contract: Arc<Contract>, error: &errors::Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed: {:?}", error);
    ctx.metrics.reconcile_failure(&contract.name_any(), error);
    if let errors::Error::ErrorWithRequeue(e) = error {
        return Action::requeue(e.duration);
    }
    Action::requeue(Duration::from_secs(5 * 60))
}

/// Initialize the controller (given the crd is installed)
pub async fn run(state: State, client: Client) {
    let contracts = Api::<Contract>::all(client.clone());
    if let Err(e) = contracts.list(&ListParams::default().limit(1)).await {
        error!("Contract CRD is not queryable; {e:?}. Is the CRD installed?");
        info!("Installation: cargo run --bin crdgen | kubectl apply -f -");
        std::process::exit(1);
    }

    Controller::new(contracts, Config::default().any_semantic())
        .owns(
            Api::<ContractVersion>::all(client.clone()),
            watcher::Config::default(),
        )
        .shutdown_on_signal()
        .run(reconcile, error_policy, state.to_context(client))
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_wins_over_reference() {
        let inline = "contract C {}".to_string();
        let reference = ConfigMapKeyRef {
            name: "sources".to_string(),
            key: "code".to_string(),
        };
        assert_eq!(
            Source::from_spec(Some(&inline), Some(&reference)),
            Source::Inline(inline.clone())
        );
    }

    #[test]
    fn empty_inline_falls_back_to_reference() {
        let inline = String::new();
        let reference = ConfigMapKeyRef {
            name: "sources".to_string(),
            key: "code".to_string(),
        };
        assert!(matches!(
            Source::from_spec(Some(&inline), Some(&reference)),
            Source::Ref(_)
        ));
        assert_eq!(Source::from_spec(None, None), Source::Absent);
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let mut data = BTreeMap::new();
        data.insert("code".to_string(), "contract C {}".to_string());

        assert_eq!(extract_key(Some(&data), "sources", "code").unwrap(), "contract C {}");
        let err = extract_key(Some(&data), "sources", "script").unwrap_err();
        assert!(matches!(err, Error::StdError(StdError::MetadataMissing(_))));
        assert!(extract_key(None, "sources", "code").is_err());
    }

    #[test]
    fn version_names_are_deterministic() {
        assert_eq!(contract_version_name("token", "sepolia", 3), "token-sepolia-version-3");
        assert_eq!(current_version_name("token", 3), "token-version-3");
    }
}
