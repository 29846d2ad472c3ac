#[cfg(test)]
mod tests {
    use crate::api::v1alpha1::network::{Network, NetworkSpec};
    use crate::api::v1alpha1::wallet::{ImportFromSpec, Wallet, WalletSpec};
    use crate::api::v1alpha1::{contract::Contract, contract::ContractSpec, LocalObjectRef};
    use crate::controllers::{
        anvil, contract_controller, network_controller, wallet_controller, State,
    };

    use k8s_openapi::api::core::v1::{Pod, Secret, Service};
    use kube::api::{Api, DeleteParams, ObjectMeta, Patch, PatchParams, PostParams};
    use kube::Client;
    use std::sync::Arc;

    #[tokio::test]
    #[ignore = "uses k8s current-context"]
    async fn integration_wallet_generation_populates_secret_and_status() {
        let client = Client::try_default().await.unwrap();
        let ctx = State::default().to_context(client.clone());

        let wallet = Wallet {
            metadata: ObjectMeta {
                name: Some("w1".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: WalletSpec {
                wallet_type: "EOA".to_string(),
                network_ref: "sepolia".to_string(),
                import_from: None,
            },
            status: None,
        };

        let wallets: Api<Wallet> = Api::namespaced(client.clone(), "default");
        let ssapply = PatchParams::apply("ctrltest").force();
        wallets.patch("w1", &ssapply, &Patch::Apply(&wallet)).await.unwrap();
        let wallet = wallets.get("w1").await.unwrap();

        wallet_controller::reconcile(Arc::new(wallet), ctx).await.unwrap();

        let secrets: Api<Secret> = Api::namespaced(client.clone(), "default");
        let secret = secrets.get("w1-wallet-secret").await.unwrap();
        let data = secret.data.unwrap();
        let private_key = String::from_utf8(data["privateKey"].0.clone()).unwrap();
        let public_key = String::from_utf8(data["publicKey"].0.clone()).unwrap();
        assert_eq!(private_key.len(), 64);
        assert_eq!(public_key.len(), 42);
        assert!(public_key.starts_with("0x"));

        let output = wallets.get("w1").await.unwrap();
        let status = output.status.unwrap();
        assert_eq!(status.public_key, public_key);
        assert_eq!(status.secret_ref, "w1-wallet-secret");
    }

    #[tokio::test]
    #[ignore = "uses k8s current-context"]
    async fn integration_wallet_import_without_public_key_errors() {
        let client = Client::try_default().await.unwrap();
        let ctx = State::default().to_context(client.clone());

        // a secret lacking the publicKey key
        let secrets: Api<Secret> = Api::namespaced(client.clone(), "default");
        let bad_secret = Secret {
            metadata: ObjectMeta {
                name: Some("incomplete-import".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            string_data: Some(
                [("privateKey".to_string(), "deadbeef".to_string())]
                    .into_iter()
                    .collect(),
            ),
            ..Default::default()
        };
        let _ = secrets.create(&PostParams::default(), &bad_secret).await;

        let wallet = Wallet {
            metadata: ObjectMeta {
                name: Some("w2".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: WalletSpec {
                wallet_type: "EOA".to_string(),
                network_ref: "sepolia".to_string(),
                import_from: Some(ImportFromSpec {
                    secret_ref: Some("incomplete-import".to_string()),
                }),
            },
            status: None,
        };
        let wallets: Api<Wallet> = Api::namespaced(client.clone(), "default");
        let ssapply = PatchParams::apply("ctrltest").force();
        wallets.patch("w2", &ssapply, &Patch::Apply(&wallet)).await.unwrap();
        let wallet = wallets.get("w2").await.unwrap();

        let result = wallet_controller::reconcile(Arc::new(wallet), ctx).await;
        assert!(result.is_err());

        // status stays empty and no derived secret appears
        let output = wallets.get("w2").await.unwrap();
        assert!(output.status.is_none());
        assert!(secrets.get("w2-wallet-secret").await.is_err());
    }

    #[tokio::test]
    #[ignore = "uses k8s current-context"]
    async fn integration_contract_fans_out_per_network() {
        let client = Client::try_default().await.unwrap();
        let ctx = State::default().to_context(client.clone());

        let contract = Contract {
            metadata: ObjectMeta {
                name: Some("c".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: ContractSpec {
                contract_name: "Counter".to_string(),
                network_refs: vec!["net-a".to_string(), "net-b".to_string()],
                wallet_ref: "w1".to_string(),
                code: Some("contract C {}".to_string()),
                ..Default::default()
            },
            status: None,
        };
        let contracts: Api<Contract> = Api::namespaced(client.clone(), "default");
        let ssapply = PatchParams::apply("ctrltest").force();
        contracts.patch("c", &ssapply, &Patch::Apply(&contract)).await.unwrap();
        let contract = contracts.get("c").await.unwrap();
        let generation = contract.metadata.generation.unwrap();

        contract_controller::reconcile(Arc::new(contract), ctx).await.unwrap();

        let versions: Api<crate::api::v1alpha1::ContractVersion> =
            Api::namespaced(client.clone(), "default");
        for network in ["net-a", "net-b"] {
            let version = versions
                .get(&format!("c-{network}-version-{generation}"))
                .await
                .unwrap();
            assert_eq!(version.spec.network_ref, network);
            assert_eq!(version.spec.code, "contract C {}");
            let owner = &version.metadata.owner_references.unwrap()[0];
            assert_eq!(owner.kind, "Contract");
            assert_eq!(owner.name, "c");
        }

        let output = contracts.get("c").await.unwrap();
        assert_eq!(
            output.status.unwrap().current_version,
            format!("c-version-{generation}")
        );
    }

    #[tokio::test]
    #[ignore = "uses k8s current-context"]
    async fn integration_anvil_network_tears_down_cleanly() {
        let client = Client::try_default().await.unwrap();
        let state = State::default();

        let network = Network {
            metadata: ObjectMeta {
                name: Some("local".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: NetworkSpec {
                network_name: "anvil".to_string(),
                chain_id: 31337,
                rpc_provider_ref: LocalObjectRef {
                    name: "anvil".to_string(),
                },
                block_explorer_ref: None,
            },
            status: None,
        };
        let networks: Api<Network> = Api::namespaced(client.clone(), "default");
        let ssapply = PatchParams::apply("ctrltest").force();
        networks.patch("local", &ssapply, &Patch::Apply(&network)).await.unwrap();
        let network = networks.get("local").await.unwrap();

        let ctx = state.to_context(client.clone());
        network_controller::reconcile(Arc::new(network), ctx.clone()).await.unwrap();

        let pods: Api<Pod> = Api::namespaced(client.clone(), "default");
        let services: Api<Service> = Api::namespaced(client.clone(), "default");
        let secrets: Api<Secret> = Api::namespaced(client.clone(), "default");
        assert!(pods.get(anvil::ANVIL_POD_NAME).await.is_ok());
        assert!(services.get(anvil::ANVIL_SERVICE_NAME).await.is_ok());
        assert!(secrets.get(anvil::ANVIL_WALLET_SECRET_NAME).await.is_ok());

        // the fixed developer wallet is populated without the wallet controller
        let wallets: Api<Wallet> = Api::namespaced(client.clone(), "default");
        let dev_wallet = wallets.get(anvil::ANVIL_WALLET_NAME).await.unwrap();
        assert_eq!(
            dev_wallet.status.unwrap().public_key,
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );

        // deletion runs the finalizer path and removes the auxiliary set
        networks.delete("local", &DeleteParams::default()).await.unwrap();
        let deleting = networks.get("local").await.unwrap();
        assert!(deleting.metadata.deletion_timestamp.is_some());
        network_controller::reconcile(Arc::new(deleting), ctx).await.unwrap();

        assert!(pods.get(anvil::ANVIL_POD_NAME).await.is_err());
        assert!(services.get(anvil::ANVIL_SERVICE_NAME).await.is_err());
        assert!(secrets.get(anvil::ANVIL_WALLET_SECRET_NAME).await.is_err());
        assert!(secrets.get(anvil::ANVIL_RPC_SECRET_NAME).await.is_err());
        assert!(wallets.get(anvil::ANVIL_WALLET_NAME).await.is_err());
        assert!(networks.get("local").await.is_err(), "finalizer must not block deletion");
    }

    #[test]
    fn anvil_aux_object_names_are_stable() {
        // the finalizer teardown enumerates these names; they are part of
        // the operator's contract with itself
        assert_eq!(anvil::ANVIL_POD_NAME, "anvil-pod");
        assert_eq!(anvil::ANVIL_SERVICE_NAME, "anvil-service");
        assert_eq!(anvil::ANVIL_RPC_PROVIDER_NAME, "anvil");
        assert_eq!(anvil::ANVIL_WALLET_NAME, "anvil-wallet");
        assert_eq!(wallet_controller::FIELD_MANAGER, "kontract-wallet-controller");
    }
}
