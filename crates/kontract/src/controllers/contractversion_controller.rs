use crate::api::v1alpha1::blockexplorer::BlockExplorer;
use crate::api::v1alpha1::contractversion::{
    ContractVersion, ContractVersionStatus, STATE_DEPLOYED, STATE_FAILED,
};
use crate::api::v1alpha1::network::Network;
use crate::api::v1alpha1::rpcprovider::RPCProvider;
use crate::api::v1alpha1::wallet::Wallet;
use crate::api::v1alpha1::API_VERSION;
use crate::controllers::deploy_job::{self, DeployTarget, SecretKeySource};
use crate::controllers::state::{Context, State};
use crate::util::configmaps;
use crate::util::errors::{self, Error, ErrorWithRequeue, Result, StdError};
use crate::util::keys::PRIVATE_KEY_KEY;
use crate::util::logs::{extract_contract_address, extract_transaction_hash};
use chrono::Utc;
use futures::StreamExt;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Pod, Secret};
use kube::{
    api::{Api, ListParams, LogParams, Patch, PatchParams, PostParams, ResourceExt},
    client::Client,
    runtime::{
        controller::{Action, Controller},
        events::{Event, EventType, Recorder},
        watcher::{self, Config},
    },
    Resource,
};
use serde_json::json;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::*;

pub const FIELD_MANAGER: &str = "kontract-contractversion-controller";

impl ContractVersion {
    async fn reconcile(&self, ctx: Arc<Context>) -> Result<Action> {
        let client = ctx.client.clone();
        let ns = self.namespace().unwrap();
        let name = self.name_any();

        // Terminal states are stable; nothing to converge.
        if let Some(status) = &self.status {
            if status.is_terminal() {
                debug!("ContractVersion \"{}\" is {}, nothing to do", name, status.state);
                return Ok(Action::await_change());
            }
        }

        let recorder = ctx.diagnostics.read().await.recorder(client.clone());

        // Resolve the reference chain. A missing reference is transient: the
        // owner may simply not have reconciled yet.
        let networks: Api<Network> = Api::namespaced(client.clone(), &ns);
        let network = self
            .require(&recorder, "Network", networks.get_opt(&self.spec.network_ref).await)
            .await?;

        let providers: Api<RPCProvider> = Api::namespaced(client.clone(), &ns);
        let provider = self
            .require(
                &recorder,
                "RPCProvider",
                providers.get_opt(&network.spec.rpc_provider_ref.name).await,
            )
            .await?;

        let secrets: Api<Secret> = Api::namespaced(client.clone(), &ns);
        self.require(
            &recorder,
            "Secret",
            secrets.get_opt(&provider.spec.secret_ref.name).await,
        )
        .await?;

        let wallets: Api<Wallet> = Api::namespaced(client.clone(), &ns);
        let wallet = self
            .require(&recorder, "Wallet", wallets.get_opt(&self.spec.wallet_ref).await)
            .await?;

        // An empty wallet secret ref is a configuration problem the user has
        // to fix; do not spin on it.
        let wallet_secret = match wallet.status.as_ref().map(|s| s.secret_ref.clone()) {
            Some(secret_ref) if !secret_ref.is_empty() => secret_ref,
            _ => {
                warn!(
                    "Wallet \"{}\" has no secret reference yet; deployment of \"{}\" is blocked",
                    self.spec.wallet_ref, name
                );
                recorder
                    .publish(
                        &Event {
                            type_: EventType::Warning,
                            reason: "WalletSecretMissing".into(),
                            note: Some(format!(
                                "Wallet `{}` has an empty status.secretRef",
                                self.spec.wallet_ref
                            )),
                            action: "Deploying".into(),
                            secondary: None,
                        },
                        &self.object_ref(&()),
                    )
                    .await
                    .map_err(Error::kube)?;
                // Wallet status changes do not trigger this controller, so
                // poll instead of waiting forever.
                return Ok(Action::requeue(Duration::from_secs(60)));
            }
        };
        self.require(&recorder, "Secret", secrets.get_opt(&wallet_secret).await)
            .await?;

        let explorer = match &network.spec.block_explorer_ref {
            Some(explorer_ref) => {
                let explorers: Api<BlockExplorer> = Api::namespaced(client.clone(), &ns);
                Some(
                    self.require(
                        &recorder,
                        "BlockExplorer",
                        explorers.get_opt(&explorer_ref.name).await,
                    )
                    .await?,
                )
            }
            None => None,
        };

        // Materialize the source ConfigMap; unchanged data is left alone.
        let cms: Api<ConfigMap> = Api::namespaced(client.clone(), &ns);
        let source_cm = deploy_job::source_config_map(self);
        configmaps::create_or_update_config_map(&cms, &source_cm).await?;

        // Local module ConfigMaps contribute one mounted file per key.
        let mut local_modules = Vec::new();
        for module in &self.spec.local_modules {
            let cm = self
                .require(&recorder, "ConfigMap", cms.get_opt(&module.name).await)
                .await?;
            let keys: Vec<String> = cm.data.unwrap_or_default().keys().cloned().collect();
            local_modules.push((module.name.clone(), keys));
        }

        let target = DeployTarget {
            chain_id: network.spec.chain_id,
            rpc_url: Some(SecretKeySource {
                secret: provider.spec.secret_ref.name.clone(),
                key: provider.spec.secret_ref.api_endpoint.clone(),
            }),
            rpc_token: provider.spec.secret_ref.api_key.clone().map(|key| SecretKeySource {
                secret: provider.spec.secret_ref.name.clone(),
                key,
            }),
            wallet_private_key: Some(SecretKeySource {
                secret: wallet_secret,
                key: PRIVATE_KEY_KEY.to_string(),
            }),
            explorer_url: explorer.as_ref().map(|e| SecretKeySource {
                secret: e.spec.secret_ref.name.clone(),
                key: e.spec.secret_ref.api_endpoint.clone(),
            }),
            explorer_token: explorer.as_ref().and_then(|e| {
                e.spec.secret_ref.api_key.clone().map(|key| SecretKeySource {
                    secret: e.spec.secret_ref.name.clone(),
                    key,
                })
            }),
            local_modules,
        };

        let jobs: Api<Job> = Api::namespaced(client.clone(), &ns);
        let job_name = deploy_job::job_name(&name);
        let Some(found) = jobs.get_opt(&job_name).await.map_err(Error::kube)? else {
            let job = deploy_job::deploy_job(self, &target)?;
            info!("Creating a new Job \"{}\" in {}", job_name, ns);
            jobs.create(&PostParams::default(), &job)
                .await
                .map_err(Error::kube)?;
            return Ok(Action::requeue(Duration::from_secs(10)));
        };

        let job_status = found.status.unwrap_or_default();
        if job_status.succeeded.unwrap_or(0) > 0 {
            self.mark_deployed(&client, &recorder, &ns, &name, &job_name).await?;
            Ok(Action::await_change())
        } else if job_status.failed.unwrap_or(0) > 0 {
            self.mark_failed(&client, &recorder, &ns, &name).await?;
            Ok(Action::await_change())
        } else {
            // Still running or pending
            Ok(Action::requeue(Duration::from_secs(10)))
        }
    }

    /// Resolve a `get_opt` result, turning None into a transient error with
    /// a warning event naming the missing kind.
    async fn require<K>(
        &self,
        recorder: &Recorder,
        kind: &str,
        fetched: kube::Result<Option<K>>,
    ) -> Result<K> {
        match fetched.map_err(Error::kube)? {
            Some(obj) => Ok(obj),
            None => {
                warn!(
                    "ContractVersion \"{}\" is waiting for a missing {}",
                    self.name_any(),
                    kind
                );
                let _ = recorder
                    .publish(
                        &Event {
                            type_: EventType::Warning,
                            reason: format!("{kind}Missing"),
                            note: Some(format!("Referenced {kind} not found")),
                            action: "Deploying".into(),
                            secondary: None,
                        },
                        &self.object_ref(&()),
                    )
                    .await;
                Err(Error::ErrorWithRequeue(ErrorWithRequeue::new(
                    StdError::MetadataMissing(format!("referenced {kind} not found")),
                    Duration::from_secs(15),
                )))
            }
        }
    }

    // Harvest the deployment result from the Job's pod logs and finish.
    async fn mark_deployed(
        &self,
        client: &Client,
        recorder: &Recorder,
        ns: &str,
        name: &str,
        job_name: &str,
    ) -> Result<()> {
        let pods: Api<Pod> = Api::namespaced(client.clone(), ns);
        let selector = ListParams::default().labels(&format!("job-name={job_name}"));
        let pod_list = pods.list(&selector).await.map_err(Error::kube)?;

        let logs = match pod_list.items.first() {
            Some(pod) => pods
                .logs(&pod.name_any(), &LogParams::default())
                .await
                .map_err(Error::kube)?,
            None => {
                warn!("no pods found for Job \"{}\"; cannot harvest logs", job_name);
                String::new()
            }
        };

        let contract_address = extract_contract_address(&logs).unwrap_or_default();
        let transaction_hash = extract_transaction_hash(&logs).unwrap_or_default();

        // deploymentTime is written once; later reconciles keep the original
        let deployment_time = self
            .status
            .as_ref()
            .and_then(|s| s.deployment_time)
            .unwrap_or_else(Utc::now);

        self.write_status(
            client,
            ns,
            name,
            ContractVersionStatus {
                contract_address: contract_address.clone(),
                transaction_hash,
                deployment_time: Some(deployment_time),
                state: STATE_DEPLOYED.to_string(),
            },
        )
        .await?;

        info!(
            "ContractVersion \"{}\" deployed, contractAddress {}",
            name, contract_address
        );
        recorder
            .publish(
                &Event {
                    type_: EventType::Normal,
                    reason: "Deployed".into(),
                    note: Some(format!("Contract deployed at `{contract_address}`")),
                    action: "Deploying".into(),
                    secondary: None,
                },
                &self.object_ref(&()),
            )
            .await
            .map_err(Error::kube)?;
        Ok(())
    }

    async fn mark_failed(&self, client: &Client, recorder: &Recorder, ns: &str, name: &str) -> Result<()> {
        self.write_status(
            client,
            ns,
            name,
            ContractVersionStatus {
                state: STATE_FAILED.to_string(),
                ..Default::default()
            },
        )
        .await?;

        warn!("ContractVersion \"{}\" failed to deploy", name);
        recorder
            .publish(
                &Event {
                    type_: EventType::Warning,
                    reason: "DeployFailed".into(),
                    note: Some("Deploy Job exhausted its restart policy".into()),
                    action: "Deploying".into(),
                    secondary: None,
                },
                &self.object_ref(&()),
            )
            .await
            .map_err(Error::kube)?;
        Ok(())
    }

    async fn write_status(
        &self,
        client: &Client,
        ns: &str,
        name: &str,
        status: ContractVersionStatus,
    ) -> Result<()> {
        let versions: Api<ContractVersion> = Api::namespaced(client.clone(), ns);
        let new_status = Patch::Apply(json!({
            "apiVersion": API_VERSION,
            "kind": "ContractVersion",
            "status": status
        }));
        let ps = PatchParams::apply(FIELD_MANAGER).force();
        versions
            .patch_status(name, &ps, &new_status)
            .await
            .map_err(Error::kube)?;
        Ok(())
    }
}

pub async fn reconcile(version: Arc<ContractVersion>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = ctx.metrics.count_and_measure("contractversion");
    ctx.diagnostics.write().await.last_event = Utc::now();

    let ns = version.namespace().unwrap(); // version is namespace scoped
    info!("Reconciling ContractVersion \"{}\" in {}", version.name_any(), ns);

    version.reconcile(ctx).await
}

fn error_policy(version: Arc<ContractVersion>, error: &errors::Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed: {:?}", error);
    ctx.metrics.reconcile_failure(&version.name_any(), error);
    if let errors::Error::ErrorWithRequeue(e) = error {
        return Action::requeue(e.duration);
    }
    Action::requeue(Duration::from_secs(5 * 60))
}

/// Initialize the controller (given the crd is installed)
pub async fn run(state: State, client: Client) {
    let versions = Api::<ContractVersion>::all(client.clone());
    if let Err(e) = versions.list(&ListParams::default().limit(1)).await {
        error!("ContractVersion CRD is not queryable; {e:?}. Is the CRD installed?");
        info!("Installation: cargo run --bin crdgen | kubectl apply -f -");
        std::process::exit(1);
    }

    Controller::new(versions, Config::default().any_semantic())
        .owns(Api::<Job>::all(client.clone()), watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, state.to_context(client))
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()))
        .await;
}
