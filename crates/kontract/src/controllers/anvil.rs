//! Builders for the auxiliary objects backing a local ephemeral chain.
//!
//! None of these carry owner references to the Network that materializes
//! them; teardown is driven explicitly by the Network finalizer.

use crate::api::v1alpha1::rpcprovider::{RPCProvider, RPCProviderSpec};
use crate::api::v1alpha1::wallet::{Wallet, WalletSpec};
use crate::api::v1alpha1::SecretKeyRef;
use crate::controllers::deploy_job::BUILDER_IMAGE;
use crate::util::errors::Result;
use crate::util::keys::EthereumKeyPair;
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, Pod, PodSpec, Secret, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

pub const ANVIL_POD_NAME: &str = "anvil-pod";
pub const ANVIL_SERVICE_NAME: &str = "anvil-service";
pub const ANVIL_RPC_PROVIDER_NAME: &str = "anvil";
pub const ANVIL_RPC_SECRET_NAME: &str = "anvil-rpc-secret";
pub const ANVIL_WALLET_NAME: &str = "anvil-wallet";
pub const ANVIL_WALLET_SECRET_NAME: &str = "anvil-wallet-secret";
pub const ANVIL_PORT: i32 = 8545;

/// Key within the rpc Secret holding the chain URL.
pub const ANVIL_RPC_URL_KEY: &str = "url";

/// anvil's fixed developer account #0, funded at genesis on every run.
pub const ANVIL_DEV_PRIVATE_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

fn labels() -> BTreeMap<String, String> {
    [("app".to_string(), "anvil".to_string())].into_iter().collect()
}

/// In-cluster DNS of the chain service.
pub fn service_url(namespace: &str) -> String {
    format!("http://{ANVIL_SERVICE_NAME}.{namespace}.svc.cluster.local:{ANVIL_PORT}")
}

pub fn anvil_pod(namespace: &str, chain_id: i64) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(ANVIL_POD_NAME.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: "anvil".to_string(),
                image: Some(BUILDER_IMAGE.to_string()),
                command: Some(vec!["anvil".to_string()]),
                args: Some(vec![
                    "--host".to_string(),
                    "0.0.0.0".to_string(),
                    "--port".to_string(),
                    ANVIL_PORT.to_string(),
                    "--chain-id".to_string(),
                    chain_id.to_string(),
                ]),
                ports: Some(vec![ContainerPort {
                    container_port: ANVIL_PORT,
                    ..Default::default()
                }]),
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn anvil_service(namespace: &str) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(ANVIL_SERVICE_NAME.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(labels()),
            ports: Some(vec![ServicePort {
                port: ANVIL_PORT,
                target_port: Some(IntOrString::Int(ANVIL_PORT)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn anvil_rpc_secret(namespace: &str) -> Secret {
    let mut string_data = BTreeMap::new();
    string_data.insert(ANVIL_RPC_URL_KEY.to_string(), service_url(namespace));
    Secret {
        metadata: ObjectMeta {
            name: Some(ANVIL_RPC_SECRET_NAME.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels()),
            ..Default::default()
        },
        string_data: Some(string_data),
        ..Default::default()
    }
}

pub fn anvil_rpc_provider(namespace: &str) -> RPCProvider {
    let mut provider = RPCProvider::new(
        ANVIL_RPC_PROVIDER_NAME,
        RPCProviderSpec {
            provider_name: ANVIL_RPC_PROVIDER_NAME.to_string(),
            secret_ref: SecretKeyRef {
                name: ANVIL_RPC_SECRET_NAME.to_string(),
                api_endpoint: ANVIL_RPC_URL_KEY.to_string(),
                api_key: None,
            },
            timeout: Some("10s".to_string()),
        },
    );
    provider.metadata.namespace = Some(namespace.to_string());
    provider.metadata.labels = Some(labels());
    provider
}

pub fn anvil_wallet(namespace: &str, network_name: &str) -> Wallet {
    let mut wallet = Wallet::new(
        ANVIL_WALLET_NAME,
        WalletSpec {
            wallet_type: "EOA".to_string(),
            network_ref: network_name.to_string(),
            import_from: None,
        },
    );
    wallet.metadata.namespace = Some(namespace.to_string());
    wallet.metadata.labels = Some(labels());
    wallet
}

pub fn anvil_wallet_secret(namespace: &str) -> Result<Secret> {
    let pair = EthereumKeyPair::from_private_key_hex(ANVIL_DEV_PRIVATE_KEY)?;
    Ok(Secret {
        metadata: ObjectMeta {
            name: Some(ANVIL_WALLET_SECRET_NAME.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels()),
            ..Default::default()
        },
        data: Some(pair.to_secret_data()),
        ..Default::default()
    })
}

/// Address of the deterministic developer account.
pub fn anvil_wallet_address() -> Result<String> {
    Ok(EthereumKeyPair::from_private_key_hex(ANVIL_DEV_PRIVATE_KEY)?.address())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pod_runs_the_chain_binary_on_the_declared_port() {
        let pod = anvil_pod("default", 31337);
        let spec = pod.spec.unwrap();
        let container = &spec.containers[0];
        assert_eq!(container.command.as_deref(), Some(&["anvil".to_string()][..]));
        let args = container.args.clone().unwrap();
        assert!(args.windows(2).any(|w| w == ["--host", "0.0.0.0"]));
        assert!(args.windows(2).any(|w| w == ["--chain-id", "31337"]));
        assert_eq!(container.ports.as_ref().unwrap()[0].container_port, 8545);
    }

    #[test]
    fn service_selects_the_chain_pod() {
        let service = anvil_service("default");
        let spec = service.spec.unwrap();
        assert_eq!(spec.selector, anvil_pod("default", 1).metadata.labels);
        assert_eq!(spec.ports.unwrap()[0].port, 8545);
    }

    #[test]
    fn rpc_secret_carries_the_incluster_url() {
        let secret = anvil_rpc_secret("chains");
        let url = secret.string_data.unwrap().remove(ANVIL_RPC_URL_KEY).unwrap();
        assert_eq!(url, "http://anvil-service.chains.svc.cluster.local:8545");
    }

    #[test]
    fn rpc_provider_points_at_the_rpc_secret() {
        let provider = anvil_rpc_provider("default");
        assert_eq!(provider.spec.secret_ref.name, ANVIL_RPC_SECRET_NAME);
        assert_eq!(provider.spec.secret_ref.api_endpoint, ANVIL_RPC_URL_KEY);
        assert!(provider.spec.secret_ref.api_key.is_none());
    }

    #[test]
    fn wallet_secret_holds_the_dev_account() {
        let secret = anvil_wallet_secret("default").unwrap();
        let data = secret.data.unwrap();
        assert_eq!(
            String::from_utf8(data["privateKey"].0.clone()).unwrap(),
            ANVIL_DEV_PRIVATE_KEY
        );
        assert_eq!(
            String::from_utf8(data["publicKey"].0.clone()).unwrap(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
    }
}
