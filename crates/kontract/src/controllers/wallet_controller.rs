use crate::api::v1alpha1::wallet::{Wallet, WalletStatus};
use crate::api::v1alpha1::API_VERSION;
use crate::controllers::state::{Context, State};
use crate::util::errors::{self, Error, Result, StdError};
use crate::util::keys::{EthereumKeyPair, PUBLIC_KEY_KEY};
use crate::util::secrets;
use chrono::Utc;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    api::{Api, ListParams, ObjectMeta, Patch, PatchParams, PostParams, ResourceExt},
    client::Client,
    runtime::{
        controller::{Action, Controller},
        events::{Event, EventType},
        watcher::{self, Config},
    },
    Resource,
};
use serde_json::json;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::*;

pub const FIELD_MANAGER: &str = "kontract-wallet-controller";

impl Wallet {
    // Reconcile: ensure a Secret holding a key pair exists and status points at it
    async fn reconcile(&self, ctx: Arc<Context>) -> Result<Action> {
        let client = ctx.client.clone();
        let ns = self.namespace().unwrap();
        let name = self.name_any();
        let secrets_api: Api<Secret> = Api::namespaced(client.clone(), &ns);

        // Once both status fields are populated the wallet is immutable;
        // regeneration never occurs.
        if let Some(status) = &self.status {
            if !status.public_key.is_empty() && !status.secret_ref.is_empty() {
                debug!("Wallet \"{}\" already created, publicKey {}", name, status.public_key);
                return Ok(Action::await_change());
            }
        }

        let recorder = ctx.diagnostics.read().await.recorder(client.clone());

        let import_ref = self
            .spec
            .import_from
            .as_ref()
            .and_then(|i| i.secret_ref.clone())
            .filter(|s| !s.is_empty());

        if let Some(secret_name) = import_ref {
            // Import path: the referenced Secret must already carry a publicKey
            let existing = secrets_api.get(&secret_name).await.map_err(Error::kube)?;
            let public_key = secrets::value(&existing, PUBLIC_KEY_KEY).ok_or_else(|| {
                Error::StdError(StdError::MetadataMissing(format!(
                    "publicKey not found in the secret: {secret_name}"
                )))
            })?;

            self.write_status(&client, &ns, &name, &public_key, &secret_name)
                .await?;
            info!(
                "Wallet \"{}\" imported, publicKey {}, secretRef {}",
                name, public_key, secret_name
            );
            recorder
                .publish(
                    &Event {
                        type_: EventType::Normal,
                        reason: "WalletImported".into(),
                        note: Some(format!("Imported key pair from Secret `{secret_name}`")),
                        action: "Importing".into(),
                        secondary: None,
                    },
                    &self.object_ref(&()),
                )
                .await
                .map_err(Error::kube)?;
        } else {
            let secret_name = format!("{name}-wallet-secret");

            let public_key = match secrets_api.get(&secret_name).await {
                Ok(existing) => {
                    // A previous reconcile created the Secret but lost the
                    // status write; the stored key pair stays authoritative.
                    secrets::value(&existing, PUBLIC_KEY_KEY).ok_or_else(|| {
                        Error::StdError(StdError::MetadataMissing(format!(
                            "publicKey not found in the secret: {secret_name}"
                        )))
                    })?
                }
                Err(kube::Error::Api(err)) if err.code == 404 => {
                    let pair = EthereumKeyPair::generate()?;
                    let secret = Secret {
                        metadata: ObjectMeta {
                            name: Some(secret_name.clone()),
                            namespace: Some(ns.clone()),
                            owner_references: self.controller_owner_ref(&()).map(|oref| vec![oref]),
                            labels: Some(
                                [
                                    ("app.kubernetes.io/name".to_string(), "kontract".to_string()),
                                    ("app.kubernetes.io/component".to_string(), "wallet".to_string()),
                                ]
                                .into_iter()
                                .collect(),
                            ),
                            ..Default::default()
                        },
                        data: Some(pair.to_secret_data()),
                        ..Default::default()
                    };
                    secrets_api
                        .create(&PostParams::default(), &secret)
                        .await
                        .map_err(Error::kube)?;
                    info!("Secret created, Secret.Name {}", secret_name);
                    pair.address()
                }
                Err(e) => return Err(Error::kube(e)),
            };

            self.write_status(&client, &ns, &name, &public_key, &secret_name)
                .await?;
            info!(
                "Wallet \"{}\" created, publicKey {}, secretRef {}",
                name, public_key, secret_name
            );
            recorder
                .publish(
                    &Event {
                        type_: EventType::Normal,
                        reason: "WalletCreated".into(),
                        note: Some(format!("Generated key pair in Secret `{secret_name}`")),
                        action: "Creating".into(),
                        secondary: None,
                    },
                    &self.object_ref(&()),
                )
                .await
                .map_err(Error::kube)?;
        }

        Ok(Action::await_change())
    }

    async fn write_status(
        &self,
        client: &Client,
        ns: &str,
        name: &str,
        public_key: &str,
        secret_ref: &str,
    ) -> Result<()> {
        let wallets: Api<Wallet> = Api::namespaced(client.clone(), ns);
        let new_status = Patch::Apply(json!({
            "apiVersion": API_VERSION,
            "kind": "Wallet",
            "status": WalletStatus {
                public_key: public_key.to_string(),
                secret_ref: secret_ref.to_string(),
            }
        }));
        let ps = PatchParams::apply(FIELD_MANAGER).force();
        wallets
            .patch_status(name, &ps, &new_status)
            .await
            .map_err(Error::kube)?;
        Ok(())
    }
}

pub async fn reconcile(wallet: Arc<Wallet>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = ctx.metrics.count_and_measure("wallet");
    ctx.diagnostics.write().await.last_event = Utc::now();

    let ns = wallet.namespace().unwrap(); // wallet is namespace scoped
    info!("Reconciling Wallet \"{}\" in {}", wallet.name_any(), ns);

    wallet.reconcile(ctx).await
}

fn error_policy(wallet: Arc<Wallet>, error: &errors::Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed: {:?}", error);
    ctx.metrics.reconcile_failure(&wallet.name_any(), error);
    if let errors::Error::ErrorWithRequeue(e) = error {
        return Action::requeue(e.duration);
    }
    Action::requeue(Duration::from_secs(5 * 60))
}

/// Initialize the controller (given the crd is installed)
pub async fn run(state: State, client: Client) {
    let wallets = Api::<Wallet>::all(client.clone());
    if let Err(e) = wallets.list(&ListParams::default().limit(1)).await {
        error!("Wallet CRD is not queryable; {e:?}. Is the CRD installed?");
        info!("Installation: cargo run --bin crdgen | kubectl apply -f -");
        std::process::exit(1);
    }

    Controller::new(wallets, Config::default().any_semantic())
        .owns(Api::<Secret>::all(client.clone()), watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, state.to_context(client))
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()))
        .await;
}
