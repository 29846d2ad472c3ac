use crate::api::v1alpha1::rpcprovider::{RPCProvider, RPCProviderStatus};
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

pub const FIELD_MANAGER: &str = "kontract-rpcprovider-controller";

/// Cadence of the background health loop.
pub const PROBE_INTERVAL: Duration = Duration::from_secs(60);
/// Deadline for a single probe request.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Canonical JSON-RPC envelope used as a synthetic blockchain operation.
const PROBE_BODY: &str = r#"{"jsonrpc":"2.0","method":"eth_blockNumber","params":[],"id":1}"#;

// Event-driven reconcile is a no-op: RPCProvider state is maintained
// entirely by the periodic health loop.
pub async fn reconcile(provider: Arc<RPCProvider>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = ctx.metrics.count_and_measure("rpcprovider");
    ctx.diagnostics.write().await.last_event = Utc::now();
    debug!(
        "Reconciling RPCProvider \"{}\" in {}",
        provider.name_any(),
        provider.namespace().unwrap()
    );
    Ok(Action::await_change())
}

fn error_policy(provider: Arc<RPCProvider>, error: &errors::Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed: {:?}", error);
    ctx.metrics.reconcile_failure(&provider.name_any(), error);
    Action::requeue(Duration::from_secs(5 * 60))
}

/// The probe target: URL with the token appended as a path segment when set.
pub fn probe_url(url: &str, token: Option<&str>) -> String {
    let base = url.trim_end_matches('/');
    match token {
        Some(token) if !token.is_empty() => format!("{base}/{token}"),
        _ => base.to_string(),
    }
}

/// A JSON-RPC body counts as healthy when it carries a `result` member.
pub fn is_valid_rpc_response(body: &serde_json::Value) -> bool {
    body.get("result").is_some()
}

async fn probe(http: &reqwest::Client, url: &str) -> Result<()> {
    let resp = http
        .post(url)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(PROBE_BODY)
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
    if !is_valid_rpc_response(&body) {
        return Err(Error::StdError(StdError::HttpError(format!(
            "invalid JSON-RPC response: {body}"
        ))));
    }
    Ok(())
}

async fn check_all_providers(client: &Client, http: &reqwest::Client, ctx: &Arc<Context>) {
    let providers = Api::<RPCProvider>::all(client.clone());
    let list = match providers.list(&ListParams::default()).await {
        Ok(list) => list,
        Err(e) => {
            error!("unable to list RPCProviders: {}", e);
            return;
        }
    };

    for provider in list.items {
        let name = provider.name_any();
        let ns = provider.namespace().unwrap_or_default();
        let recorder = ctx.diagnostics.read().await.recorder(client.clone());
        let secrets_api: Api<Secret> = Api::namespaced(client.clone(), &ns);

        let secret = match secrets_api.get(&provider.spec.secret_ref.name).await {
            Ok(secret) => secret,
            Err(e) => {
                error!("RPCProvider ({}) - unable to fetch Secret: {}", name, e);
                ctx.metrics.probe_failure("rpcprovider", &name);
                let _ = recorder
                    .publish(
                        &Event {
                            type_: EventType::Warning,
                            reason: "SecretFetchFailed".into(),
                            note: Some("Unable to fetch Secret for RPCProvider".into()),
                            action: "Probing".into(),
                            secondary: None,
                        },
                        &provider.object_ref(&()),
                    )
                    .await;
                update_status(client, &provider, false, "").await;
                continue;
            }
        };

        let url = secrets::value(&secret, &provider.spec.secret_ref.api_endpoint);
        let token = provider
            .spec
            .secret_ref
            .api_key
            .as_deref()
            .and_then(|key| secrets::value(&secret, key));

        let Some(url) = url.filter(|u| !u.is_empty()) else {
            error!("RPCProvider ({}) - missing required data in Secret", name);
            update_status(client, &provider, false, "").await;
            continue;
        };

        info!("RPCProvider ({}) - Performing periodic API health check", name);
        let target = probe_url(&url, token.as_deref());
        match probe(http, &target).await {
            Ok(()) => update_status(client, &provider, true, &url).await,
            Err(e) => {
                error!("RPCProvider ({}) - API health check failed: {}", name, e);
                ctx.metrics.probe_failure("rpcprovider", &name);
                let _ = recorder
                    .publish(
                        &Event {
                            type_: EventType::Warning,
                            reason: "APIHealthCheckFailed".into(),
                            note: Some("API health check failed".into()),
                            action: "Probing".into(),
                            secondary: None,
                        },
                        &provider.object_ref(&()),
                    )
                    .await;
                update_status(client, &provider, false, &url).await;
            }
        }
    }
}

// The status subresource is rewritten every tick; the endpoint never
// includes the token.
async fn update_status(client: &Client, provider: &RPCProvider, healthy: bool, api_endpoint: &str) {
    let name = provider.name_any();
    let ns = provider.namespace().unwrap_or_default();
    let api: Api<RPCProvider> = Api::namespaced(client.clone(), &ns);

    let new_status = Patch::Apply(json!({
        "apiVersion": API_VERSION,
        "kind": "RPCProvider",
        "status": RPCProviderStatus {
            healthy,
            api_endpoint: api_endpoint.to_string(),
        }
    }));
    let ps = PatchParams::apply(FIELD_MANAGER).force();
    if let Err(e) = api.patch_status(&name, &ps, &new_status).await {
        error!("RPCProvider ({}) - unable to update status: {}", name, e);
    }
}

/// Background loop probing every RPCProvider in the cluster.
pub async fn health_loop(client: Client, ctx: Arc<Context>) {
    let http = reqwest::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .build()
        .expect("failed to build probe http client");

    let mut ticker = tokio::time::interval(PROBE_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // interval fires immediately; the first probe happens one tick in
    ticker.tick().await;

    loop {
        ticker.tick().await;
        check_all_providers(&client, &http, &ctx).await;
    }
}

/// Initialize the controller and the health loop (given the crd is installed)
pub async fn run(state: State, client: Client) {
    let providers = Api::<RPCProvider>::all(client.clone());
    if let Err(e) = providers.list(&ListParams::default().limit(1)).await {
        error!("RPCProvider CRD is not queryable; {e:?}. Is the CRD installed?");
        info!("Installation: cargo run --bin crdgen | kubectl apply -f -");
        std::process::exit(1);
    }

    let ctx = state.to_context(client.clone());
    let controller = Controller::new(providers, Config::default().any_semantic())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx.clone())
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()));

    // The ticker loop never returns; it is dropped when the controller
    // stream completes on shutdown.
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
    fn probe_url_appends_token_as_path_segment() {
        assert_eq!(
            probe_url("https://mainnet.infura.io/v3/", Some("abc123")),
            "https://mainnet.infura.io/v3/abc123"
        );
    }

    #[test]
    fn probe_url_without_token_only_trims() {
        assert_eq!(probe_url("http://anvil:8545/", None), "http://anvil:8545");
        assert_eq!(probe_url("http://anvil:8545", Some("")), "http://anvil:8545");
    }

    #[test]
    fn rpc_body_with_result_is_valid() {
        assert!(is_valid_rpc_response(&json!({
            "jsonrpc": "2.0", "id": 1, "result": "0x10"
        })));
    }

    #[test]
    fn rpc_error_body_is_invalid() {
        assert!(!is_valid_rpc_response(&json!({
            "jsonrpc": "2.0", "id": 1,
            "error": {"code": -32601, "message": "method not found"}
        })));
    }
}
