use crate::api::v1alpha1::blockexplorer::BlockExplorer;
use crate::api::v1alpha1::network::{Network, NetworkStatus, LOCAL_CHAIN_NETWORK_NAME, NETWORK_FINALIZER};
use crate::api::v1alpha1::rpcprovider::RPCProvider;
use crate::api::v1alpha1::wallet::{Wallet, WalletStatus};
use crate::api::v1alpha1::API_VERSION;
use crate::controllers::anvil;
use crate::controllers::state::{Context, State};
use crate::util::errors::{self, Error, Result};
use crate::util::finalizers;
use chrono::Utc;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Pod, Secret, Service};
use kube::{
    api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams, ResourceExt},
    client::Client,
    runtime::{
        controller::{Action, Controller},
        events::{Event, EventType},
        watcher::Config,
    },
    Resource,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::*;

pub const FIELD_MANAGER: &str = "kontract-network-controller";

/// Get-then-create; an object that already exists is success.
async fn ensure_exists<K>(api: &Api<K>, name: &str, desired: &K) -> Result<()>
where
    K: kube::Resource + Clone + DeserializeOwned + Serialize + Debug,
{
    match api.get(name).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(err)) if err.code == 404 => {
            api.create(&PostParams::default(), desired)
                .await
                .map_err(Error::kube)?;
            info!("Created \"{}\"", name);
            Ok(())
        }
        Err(e) => Err(Error::kube(e)),
    }
}

async fn delete_if_found<K>(api: &Api<K>, name: &str) -> Result<()>
where
    K: kube::Resource + Clone + DeserializeOwned + Debug,
{
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            info!("Deleted \"{}\"", name);
            Ok(())
        }
        Err(kube::Error::Api(err)) if err.code == 404 => Ok(()),
        Err(e) => Err(Error::kube(e)),
    }
}

impl Network {
    async fn reconcile(&self, ctx: Arc<Context>) -> Result<Action> {
        let client = ctx.client.clone();
        let ns = self.namespace().unwrap();
        let name = self.name_any();
        let networks: Api<Network> = Api::namespaced(client.clone(), &ns);

        if self.metadata.deletion_timestamp.is_some() {
            if finalizers::has_finalizer(self, NETWORK_FINALIZER) {
                self.cleanup(ctx.clone()).await?;
                finalizers::remove_finalizer(&networks, self, NETWORK_FINALIZER).await?;
            }
            return Ok(Action::await_change());
        }

        if self.spec.network_name == LOCAL_CHAIN_NETWORK_NAME {
            // The finalizer must be persisted before the first side effect so
            // a crash between the two cannot orphan the auxiliary objects.
            finalizers::ensure_finalizer(&networks, self, NETWORK_FINALIZER).await?;
            self.ensure_local_chain(&ctx).await?;
        }

        // Health aggregation over the referenced providers
        let recorder = ctx.diagnostics.read().await.recorder(client.clone());
        let providers: Api<RPCProvider> = Api::namespaced(client.clone(), &ns);
        let provider = match providers
            .get_opt(&self.spec.rpc_provider_ref.name)
            .await
            .map_err(Error::kube)?
        {
            Some(provider) => provider,
            None => {
                warn!(
                    "Network \"{}\" references missing RPCProvider \"{}\"",
                    name, self.spec.rpc_provider_ref.name
                );
                recorder
                    .publish(
                        &Event {
                            type_: EventType::Warning,
                            reason: "RPCProviderMissing".into(),
                            note: Some(format!(
                                "RPCProvider `{}` not found",
                                self.spec.rpc_provider_ref.name
                            )),
                            action: "Reconciling".into(),
                            secondary: None,
                        },
                        &self.object_ref(&()),
                    )
                    .await
                    .map_err(Error::kube)?;
                return Ok(Action::requeue(Duration::from_secs(15)));
            }
        };

        let rpc_status = provider.status.unwrap_or_default();
        let mut status = NetworkStatus {
            rpc_endpoint: rpc_status.api_endpoint,
            block_explorer_endpoint: String::new(),
            healthy: rpc_status.healthy,
        };

        if let Some(explorer_ref) = &self.spec.block_explorer_ref {
            let explorers: Api<BlockExplorer> = Api::namespaced(client.clone(), &ns);
            match explorers.get_opt(&explorer_ref.name).await.map_err(Error::kube)? {
                Some(explorer) => {
                    let explorer_status = explorer.status.unwrap_or_default();
                    status.block_explorer_endpoint = explorer_status.api_endpoint;
                    status.healthy = status.healthy && explorer_status.healthy;
                }
                None => {
                    warn!(
                        "Network \"{}\" references missing BlockExplorer \"{}\"",
                        name, explorer_ref.name
                    );
                    recorder
                        .publish(
                            &Event {
                                type_: EventType::Warning,
                                reason: "BlockExplorerMissing".into(),
                                note: Some(format!("BlockExplorer `{}` not found", explorer_ref.name)),
                                action: "Reconciling".into(),
                                secondary: None,
                            },
                            &self.object_ref(&()),
                        )
                        .await
                        .map_err(Error::kube)?;
                    return Ok(Action::requeue(Duration::from_secs(15)));
                }
            }
        }

        let new_status = Patch::Apply(json!({
            "apiVersion": API_VERSION,
            "kind": "Network",
            "status": status
        }));
        let ps = PatchParams::apply(FIELD_MANAGER).force();
        networks
            .patch_status(&name, &ps, &new_status)
            .await
            .map_err(Error::kube)?;

        // Provider health changes do not produce Network events; refresh the
        // aggregate on a timer.
        Ok(Action::requeue(Duration::from_secs(60)))
    }

    /// Materialize the local ephemeral chain and its access objects. Every
    /// step is get-then-create; none of the objects are owned by the Network.
    async fn ensure_local_chain(&self, ctx: &Arc<Context>) -> Result<()> {
        let client = ctx.client.clone();
        let ns = self.namespace().unwrap();

        let pods: Api<Pod> = Api::namespaced(client.clone(), &ns);
        ensure_exists(&pods, anvil::ANVIL_POD_NAME, &anvil::anvil_pod(&ns, self.spec.chain_id)).await?;

        let services: Api<Service> = Api::namespaced(client.clone(), &ns);
        ensure_exists(&services, anvil::ANVIL_SERVICE_NAME, &anvil::anvil_service(&ns)).await?;

        let secrets: Api<Secret> = Api::namespaced(client.clone(), &ns);
        ensure_exists(&secrets, anvil::ANVIL_RPC_SECRET_NAME, &anvil::anvil_rpc_secret(&ns)).await?;

        let providers: Api<RPCProvider> = Api::namespaced(client.clone(), &ns);
        ensure_exists(
            &providers,
            anvil::ANVIL_RPC_PROVIDER_NAME,
            &anvil::anvil_rpc_provider(&ns),
        )
        .await?;

        ensure_exists(
            &secrets,
            anvil::ANVIL_WALLET_SECRET_NAME,
            &anvil::anvil_wallet_secret(&ns)?,
        )
        .await?;

        // The wallet points back at this Network by name; the cycle is fine
        // because teardown is finalizer-driven, not ownership-driven.
        let wallets: Api<Wallet> = Api::namespaced(client.clone(), &ns);
        ensure_exists(
            &wallets,
            anvil::ANVIL_WALLET_NAME,
            &anvil::anvil_wallet(&ns, &self.name_any()),
        )
        .await?;

        // The key material is fixed, so the wallet status is written here
        // directly instead of going through the Wallet controller's
        // generation path.
        let wallet = wallets.get(anvil::ANVIL_WALLET_NAME).await.map_err(Error::kube)?;
        let populated = wallet
            .status
            .as_ref()
            .map(|s| !s.public_key.is_empty() && !s.secret_ref.is_empty())
            .unwrap_or(false);
        if !populated {
            let new_status = Patch::Apply(json!({
                "apiVersion": API_VERSION,
                "kind": "Wallet",
                "status": WalletStatus {
                    public_key: anvil::anvil_wallet_address()?,
                    secret_ref: anvil::ANVIL_WALLET_SECRET_NAME.to_string(),
                }
            }));
            let ps = PatchParams::apply(FIELD_MANAGER).force();
            wallets
                .patch_status(anvil::ANVIL_WALLET_NAME, &ps, &new_status)
                .await
                .map_err(Error::kube)?;
        }

        Ok(())
    }

    // Finalizer cleanup: the auxiliary set is enumerated explicitly because
    // none of it is owner-referenced to the Network.
    async fn cleanup(&self, ctx: Arc<Context>) -> Result<()> {
        let client = ctx.client.clone();
        let ns = self.namespace().unwrap();

        let pods: Api<Pod> = Api::namespaced(client.clone(), &ns);
        delete_if_found(&pods, anvil::ANVIL_POD_NAME).await?;

        let services: Api<Service> = Api::namespaced(client.clone(), &ns);
        delete_if_found(&services, anvil::ANVIL_SERVICE_NAME).await?;

        let wallets: Api<Wallet> = Api::namespaced(client.clone(), &ns);
        delete_if_found(&wallets, anvil::ANVIL_WALLET_NAME).await?;

        let providers: Api<RPCProvider> = Api::namespaced(client.clone(), &ns);
        delete_if_found(&providers, anvil::ANVIL_RPC_PROVIDER_NAME).await?;

        let secrets: Api<Secret> = Api::namespaced(client.clone(), &ns);
        delete_if_found(&secrets, anvil::ANVIL_WALLET_SECRET_NAME).await?;
        delete_if_found(&secrets, anvil::ANVIL_RPC_SECRET_NAME).await?;

        let recorder = ctx.diagnostics.read().await.recorder(client.clone());
        let _ = recorder
            .publish(
                &Event {
                    type_: EventType::Normal,
                    reason: "LocalChainRemoved".into(),
                    note: Some(format!("Removed local chain objects for `{}`", self.name_any())),
                    action: "Deleting".into(),
                    secondary: None,
                },
                &self.object_ref(&()),
            )
            .await;
        Ok(())
    }
}

pub async fn reconcile(network: Arc<Network>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = ctx.metrics.count_and_measure("network");
    ctx.diagnostics.write().await.last_event = Utc::now();

    let ns = network.namespace().unwrap(); // network is namespace scoped
    info!("Reconciling Network \"{}\" in {}", network.name_any(), ns);

    network.reconcile(ctx).await
}

fn error_policy(network: Arc<Network>, error: &errors::Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed: {:?}", error);
    ctx.metrics.reconcile_failure(&network.name_any(), error);
    if let errors::Error::ErrorWithRequeue(e) = error {
        return Action::requeue(e.duration);
    }
    Action::requeue(Duration::from_secs(5 * 60))
}

/// Initialize the controller (given the crd is installed)
pub async fn run(state: State, client: Client) {
    let networks = Api::<Network>::all(client.clone());
    if let Err(e) = networks.list(&ListParams::default().limit(1)).await {
        error!("Network CRD is not queryable; {e:?}. Is the CRD installed?");
        info!("Installation: cargo run --bin crdgen | kubectl apply -f -");
        std::process::exit(1);
    }

    Controller::new(networks, Config::default().any_semantic())
        .shutdown_on_signal()
        .run(reconcile, error_policy, state.to_context(client))
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()))
        .await;
}
