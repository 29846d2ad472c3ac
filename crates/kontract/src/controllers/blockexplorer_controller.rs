use crate::api::v1alpha1::blockexplorer::{BlockExplorer, BlockExplorerStatus};
use crate::api::v1alpha1::API_VERSION;
use crate::controllers::state::{Context, State};
use crate::util::errors::{self, Error, Result, StdError};
use crate::util::secrets;
use chrono::Utc;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    api::{Api, ListParams, Patch, PatchParams, ResourceExt},
    client::Client,
    runtime::{
        controller::{Action, Controller},
        events::{Event, EventType},
        watcher::Config,
    },
    Resource,
};
use serde_json::json;
use std::sync::Arc;
use tokio::time::{Duration, MissedTickBehavior};
use tracing::*;

pub const FIELD_MANAGER: &str = "kontract-blockexplorer-controller";

/// Explorer rate limits are tight; probe far less often than RPC providers.
pub const PROBE_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

// Event-driven reconcile is a no-op: BlockExplorer state is maintained
// entirely by the periodic health loop.
pub async fn reconcile(explorer: Arc<BlockExplorer>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = ctx.metrics.count_and_measure("blockexplorer");
    ctx.diagnostics.write().await.last_event = Utc::now();
    debug!(
        "Reconciling BlockExplorer \"{}\" in {}",
        explorer.name_any(),
        explorer.namespace().unwrap()
    );
    Ok(Action::await_change())
}

fn error_policy(explorer: Arc<BlockExplorer>, error: &errors::Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed: {:?}", error);
    ctx.metrics.reconcile_failure(&explorer.name_any(), error);
    Action::requeue(Duration::from_secs(5 * 60))
}

/// Etherscan-compatible block reward query against a block old enough to
/// exist on any network.
pub fn probe_url(endpoint: &str, token: &str) -> String {
    format!(
        "{}?module=block&action=getblockreward&blockno=2165403&apikey={}",
        endpoint.trim_end_matches('/'),
        token
    )
}

/// An explorer body counts as healthy when status is "1" and message is OK.
pub fn is_valid_explorer_response(body: &serde_json::Value) -> bool {
    let status_ok = body.get("status").and_then(serde_json::Value::as_str) == Some("1");
    let message_ok = body
        .get("message")
        .and_then(serde_json::Value::as_str)
        .map(|m| m.to_uppercase() == "OK")
        .unwrap_or(false);
    status_ok && message_ok
}

async fn probe(http: &reqwest::Client, url: &str) -> Result<()> {
    let resp = http
        .get(url)
        .send()
        .await
        .map_err(|e| Error::StdError(StdError::HttpError(e.to_string())))?;

    if resp.status() != reqwest::StatusCode::OK {
        return Err(Error::StdError(StdError::HttpError(format!(
            "received non-200 response: {}",
            resp.status().as_u16()
        ))));
    }

    let body: serde_json::Value = resp
        .json()
        .await
        .map_err(|e| Error::StdError(StdError::HttpError(e.to_string())))?;
    if !is_valid_explorer_response(&body) {
        return Err(Error::StdError(StdError::HttpError(format!(
            "invalid explorer response: {body}"
        ))));
    }
    Ok(())
}

async fn check_all_explorers(client: &Client, http: &reqwest::Client, ctx: &Arc<Context>) {
    let explorers = Api::<BlockExplorer>::all(client.clone());
    let list = match explorers.list(&ListParams::default()).await {
        Ok(list) => list,
        Err(e) => {
            error!("unable to list BlockExplorers: {}", e);
            return;
        }
    };

    for explorer in list.items {
        let name = explorer.name_any();
        let ns = explorer.namespace().unwrap_or_default();
        let recorder = ctx.diagnostics.read().await.recorder(client.clone());
        let secrets_api: Api<Secret> = Api::namespaced(client.clone(), &ns);

        let secret = match secrets_api.get(&explorer.spec.secret_ref.name).await {
            Ok(secret) => secret,
            Err(e) => {
                error!("BlockExplorer ({}) - unable to fetch Secret: {}", name, e);
                ctx.metrics.probe_failure("blockexplorer", &name);
                update_status(client, &explorer, false, "").await;
                continue;
            }
        };

        let endpoint = secrets::value(&secret, &explorer.spec.secret_ref.api_endpoint);
        let token = explorer
            .spec
            .secret_ref
            .api_key
            .as_deref()
            .and_then(|key| secrets::value(&secret, key));

        let (Some(endpoint), Some(token)) = (
            endpoint.filter(|e| !e.is_empty()),
            token.filter(|t| !t.is_empty()),
        ) else {
            error!("BlockExplorer ({}) - missing required data in Secret", name);
            update_status(client, &explorer, false, "").await;
            continue;
        };

        info!("BlockExplorer ({}) - Performing API health check", name);
        match probe(http, &probe_url(&endpoint, &token)).await {
            Ok(()) => update_status(client, &explorer, true, &endpoint).await,
            Err(e) => {
                error!("BlockExplorer ({}) - API health check failed: {}", name, e);
                ctx.metrics.probe_failure("blockexplorer", &name);
                let _ = recorder
                    .publish(
                        &Event {
                            type_: EventType::Warning,
                            reason: "APIHealthCheckFailed".into(),
                            note: Some("API health check failed".into()),
                            action: "Probing".into(),
                            secondary: None,
                        },
                        &explorer.object_ref(&()),
                    )
                    .await;
                update_status(client, &explorer, false, "").await;
            }
        }
    }
}

async fn update_status(client: &Client, explorer: &BlockExplorer, healthy: bool, api_endpoint: &str) {
    let name = explorer.name_any();
    let ns = explorer.namespace().unwrap_or_default();
    let api: Api<BlockExplorer> = Api::namespaced(client.clone(), &ns);

    let new_status = Patch::Apply(json!({
        "apiVersion": API_VERSION,
        "kind": "BlockExplorer",
        "status": BlockExplorerStatus {
            healthy,
            api_endpoint: api_endpoint.to_string(),
        }
    }));
    let ps = PatchParams::apply(FIELD_MANAGER).force();
    if let Err(e) = api.patch_status(&name, &ps, &new_status).await {
        error!("BlockExplorer ({}) - unable to update status: {}", name, e);
    }
}

/// Background loop probing every BlockExplorer in the cluster.
pub async fn health_loop(client: Client, ctx: Arc<Context>) {
    let http = reqwest::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .build()
        .expect("failed to build probe http client");

    let mut ticker = tokio::time::interval(PROBE_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        check_all_explorers(&client, &http, &ctx).await;
    }
}

/// Initialize the controller and the health loop (given the crd is installed)
pub async fn run(state: State, client: Client) {
    let explorers = Api::<BlockExplorer>::all(client.clone());
    if let Err(e) = explorers.list(&ListParams::default().limit(1)).await {
        error!("BlockExplorer CRD is not queryable; {e:?}. Is the CRD installed?");
        info!("Installation: cargo run --bin crdgen | kubectl apply -f -");
        std::process::exit(1);
    }

    let ctx = state.to_context(client.clone());
    let controller = Controller::new(explorers, Config::default().any_semantic())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx.clone())
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()));

    tokio::select! {
        _ = controller => {},
        _ = health_loop(client, ctx) => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn probe_url_is_etherscan_compatible() {
        assert_eq!(
            probe_url("https://api.etherscan.io/api/", "KEY"),
            "https://api.etherscan.io/api?module=block&action=getblockreward&blockno=2165403&apikey=KEY"
        );
    }

    #[test]
    fn ok_response_is_valid() {
        assert!(is_valid_explorer_response(&json!({
            "status": "1", "message": "OK", "result": {}
        })));
        // message casing is not significant
        assert!(is_valid_explorer_response(&json!({
            "status": "1", "message": "Ok", "result": {}
        })));
    }

    #[test]
    fn notok_or_zero_status_is_invalid() {
        assert!(!is_valid_explorer_response(&json!({
            "status": "0", "message": "NOTOK", "result": "Invalid API Key"
        })));
        assert!(!is_valid_explorer_response(&json!({
            "status": "1", "message": "NOTOK"
        })));
        assert!(!is_valid_explorer_response(&json!({"result": "0x10"})));
    }
}
