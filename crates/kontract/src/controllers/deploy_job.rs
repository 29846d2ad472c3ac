//! Pure builders for the deploy Job and its source ConfigMap.
//!
//! The builder image is a black-box batch worker: it consumes the declared
//! environment and file mounts and reports results as marker lines on
//! stdout (see `util::logs`).

use crate::api::v1alpha1::contractversion::ContractVersion;
use crate::util::errors::{Error, Result, StdError};
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, EnvVar, EnvVarSource, PodSpec, PodTemplateSpec,
    SecretKeySelector, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

pub const BUILDER_IMAGE: &str = "docker.io/expedio/foundry:latest";

/// Working directory baked into the builder image; all source mounts land
/// under it.
pub const BUILDER_HOME: &str = "/home/foundryuser/expedio-kontract-deployer";

const SOURCE_VOLUME: &str = "contract-code";

/// A named key inside a Secret, wired into the Job as an env var source.
#[derive(Debug, Clone)]
pub struct SecretKeySource {
    pub secret: String,
    pub key: String,
}

/// Everything the Job needs beyond the ContractVersion spec itself, resolved
/// from the reference chain by the controller.
#[derive(Debug, Clone, Default)]
pub struct DeployTarget {
    pub chain_id: i64,
    pub rpc_url: Option<SecretKeySource>,
    pub rpc_token: Option<SecretKeySource>,
    pub wallet_private_key: Option<SecretKeySource>,
    pub explorer_url: Option<SecretKeySource>,
    pub explorer_token: Option<SecretKeySource>,
    /// (ConfigMap name, keys) per local module, keys in stable order
    pub local_modules: Vec<(String, Vec<String>)>,
}

pub fn source_config_map_name(contract_version: &str) -> String {
    format!("{contract_version}-contract")
}

pub fn job_name(contract_version: &str) -> String {
    format!("contract-deploy-{contract_version}")
}

/// The ConfigMap carrying all resolved source text for one deployment.
pub fn source_config_map(cv: &ContractVersion) -> ConfigMap {
    let mut data = BTreeMap::new();
    data.insert("code".to_string(), cv.spec.code.clone());
    if let Some(test) = cv.spec.test.as_ref().filter(|t| !t.is_empty()) {
        data.insert("tests".to_string(), test.clone());
    }
    if let Some(script) = cv.spec.script.as_ref().filter(|s| !s.is_empty()) {
        data.insert("script".to_string(), script.clone());
    }
    if let Some(config) = cv.spec.foundry_config.as_ref().filter(|c| !c.is_empty()) {
        data.insert("foundry.toml".to_string(), config.clone());
    }

    ConfigMap {
        metadata: ObjectMeta {
            name: Some(source_config_map_name(&cv.name_any())),
            namespace: cv.namespace(),
            owner_references: cv.controller_owner_ref(&()).map(|oref| vec![oref]),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    }
}

fn secret_env(name: &str, source: &SecretKeySource) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: source.secret.clone(),
                key: source.key.clone(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn literal_env(name: &str, value: String) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value),
        ..Default::default()
    }
}

/// Compose the deploy Job. Env entries whose source is absent are omitted.
pub fn deploy_job(cv: &ContractVersion, target: &DeployTarget) -> Result<Job> {
    let contract_name = &cv.spec.contract_name;
    let source_cm = source_config_map_name(&cv.name_any());

    let mut mounts = vec![VolumeMount {
        name: SOURCE_VOLUME.to_string(),
        mount_path: format!("{BUILDER_HOME}/src/{contract_name}.sol"),
        sub_path: Some("code".to_string()),
        ..Default::default()
    }];
    if cv.spec.test.as_ref().filter(|t| !t.is_empty()).is_some() {
        mounts.push(VolumeMount {
            name: SOURCE_VOLUME.to_string(),
            mount_path: format!("{BUILDER_HOME}/test/{contract_name}.t.sol"),
            sub_path: Some("tests".to_string()),
            ..Default::default()
        });
    }
    if cv.spec.script.as_ref().filter(|s| !s.is_empty()).is_some() {
        mounts.push(VolumeMount {
            name: SOURCE_VOLUME.to_string(),
            mount_path: format!("{BUILDER_HOME}/script/script.s.sol"),
            sub_path: Some("script".to_string()),
            ..Default::default()
        });
    }
    if cv.spec.foundry_config.as_ref().filter(|c| !c.is_empty()).is_some() {
        mounts.push(VolumeMount {
            name: SOURCE_VOLUME.to_string(),
            mount_path: format!("{BUILDER_HOME}/foundry.toml"),
            sub_path: Some("foundry.toml".to_string()),
            ..Default::default()
        });
    }

    let mut volumes = vec![Volume {
        name: SOURCE_VOLUME.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: source_cm,
            ..Default::default()
        }),
        ..Default::default()
    }];

    // Every key of a local module ConfigMap mounts as its own file under
    // src/<module>/.
    for (module, keys) in &target.local_modules {
        for key in keys {
            mounts.push(VolumeMount {
                name: module.clone(),
                mount_path: format!("{BUILDER_HOME}/src/{module}/{key}"),
                sub_path: Some(key.clone()),
                ..Default::default()
            });
        }
        volumes.push(Volume {
            name: module.clone(),
            config_map: Some(ConfigMapVolumeSource {
                name: module.clone(),
                ..Default::default()
            }),
            ..Default::default()
        });
    }

    let mut env = Vec::new();
    if let Some(rpc_url) = &target.rpc_url {
        env.push(secret_env("RPC_URL", rpc_url));
    }
    if let Some(rpc_token) = &target.rpc_token {
        env.push(secret_env("RPC_KEY", rpc_token));
    }
    if let Some(wallet_key) = &target.wallet_private_key {
        env.push(secret_env("WALLET_PRV_KEY", wallet_key));
    }
    env.push(literal_env("CONTRACT_NAME", contract_name.clone()));
    env.push(literal_env("CHAIN_ID", target.chain_id.to_string()));
    env.push(literal_env(
        "EXTERNAL_MODULES",
        cv.spec.external_modules.join(" "),
    ));
    env.push(literal_env(
        "LOCAL_MODULES",
        target
            .local_modules
            .iter()
            .map(|(module, _)| module.as_str())
            .collect::<Vec<_>>()
            .join(" "),
    ));
    if let Some(explorer_url) = &target.explorer_url {
        env.push(secret_env("ETHERSCAN_API_URL", explorer_url));
    }
    if let Some(explorer_token) = &target.explorer_token {
        env.push(secret_env("ETHERSCAN_API_KEY", explorer_token));
    }
    if !cv.spec.init_params.is_empty() {
        let init_params = serde_json::to_string(&cv.spec.init_params)
            .map_err(|e| Error::StdError(StdError::JsonSerializationError(e)))?;
        env.push(literal_env("INIT_PARAMS", init_params));
    }

    Ok(Job {
        metadata: ObjectMeta {
            name: Some(job_name(&cv.name_any())),
            namespace: cv.namespace(),
            owner_references: cv.controller_owner_ref(&()).map(|oref| vec![oref]),
            ..Default::default()
        },
        spec: Some(JobSpec {
            template: PodTemplateSpec {
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: "foundry".to_string(),
                        image: Some(BUILDER_IMAGE.to_string()),
                        env: Some(env),
                        volume_mounts: Some(mounts),
                        ..Default::default()
                    }],
                    volumes: Some(volumes),
                    restart_policy: Some("OnFailure".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::v1alpha1::contractversion::ContractVersionSpec;
    use crate::util::keys::PRIVATE_KEY_KEY;
    use kube::api::ObjectMeta;

    fn version(spec: ContractVersionSpec) -> ContractVersion {
        let mut cv = ContractVersion::new("token-sepolia-version-1", spec);
        cv.metadata = ObjectMeta {
            name: Some("token-sepolia-version-1".to_string()),
            namespace: Some("default".to_string()),
            uid: Some("deadbeef".to_string()),
            ..Default::default()
        };
        cv
    }

    fn base_spec() -> ContractVersionSpec {
        ContractVersionSpec {
            contract_name: "Token".to_string(),
            network_ref: "sepolia".to_string(),
            wallet_ref: "deployer".to_string(),
            code: "contract Token {}".to_string(),
            ..Default::default()
        }
    }

    fn base_target() -> DeployTarget {
        DeployTarget {
            chain_id: 11155111,
            rpc_url: Some(SecretKeySource {
                secret: "rpc-secret".to_string(),
                key: "url".to_string(),
            }),
            wallet_private_key: Some(SecretKeySource {
                secret: "deployer-wallet-secret".to_string(),
                key: PRIVATE_KEY_KEY.to_string(),
            }),
            ..Default::default()
        }
    }

    fn env_names(job: &Job) -> Vec<String> {
        job.spec.as_ref().unwrap().template.spec.as_ref().unwrap().containers[0]
            .env
            .clone()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect()
    }

    #[test]
    fn minimal_job_omits_optional_env() {
        let job = deploy_job(&version(base_spec()), &base_target()).unwrap();
        assert_eq!(
            env_names(&job),
            vec![
                "RPC_URL",
                "WALLET_PRV_KEY",
                "CONTRACT_NAME",
                "CHAIN_ID",
                "EXTERNAL_MODULES",
                "LOCAL_MODULES"
            ]
        );
    }

    #[test]
    fn explorer_and_init_params_are_wired_when_present() {
        let mut spec = base_spec();
        spec.init_params = vec!["1000000".to_string(), "Token".to_string()];
        let mut target = base_target();
        target.rpc_token = Some(SecretKeySource {
            secret: "rpc-secret".to_string(),
            key: "token".to_string(),
        });
        target.explorer_url = Some(SecretKeySource {
            secret: "etherscan".to_string(),
            key: "url".to_string(),
        });
        target.explorer_token = Some(SecretKeySource {
            secret: "etherscan".to_string(),
            key: "apikey".to_string(),
        });

        let job = deploy_job(&version(spec), &target).unwrap();
        let names = env_names(&job);
        for expected in ["RPC_KEY", "ETHERSCAN_API_URL", "ETHERSCAN_API_KEY", "INIT_PARAMS"] {
            assert!(names.contains(&expected.to_string()), "missing {expected}");
        }

        let env = job.spec.unwrap().template.spec.unwrap().containers[0]
            .env
            .clone()
            .unwrap();
        let init = env.iter().find(|e| e.name == "INIT_PARAMS").unwrap();
        assert_eq!(init.value.as_deref(), Some(r#"["1000000","Token"]"#));
        let chain = env.iter().find(|e| e.name == "CHAIN_ID").unwrap();
        assert_eq!(chain.value.as_deref(), Some("11155111"));
    }

    #[test]
    fn mounts_follow_the_builder_layout() {
        let mut spec = base_spec();
        spec.test = Some("contract TokenTest {}".to_string());
        spec.script = Some("contract Deploy {}".to_string());
        spec.foundry_config = Some("[profile.default]".to_string());

        let job = deploy_job(&version(spec), &base_target()).unwrap();
        let pod = job.spec.unwrap().template.spec.unwrap();
        let paths: Vec<String> = pod.containers[0]
            .volume_mounts
            .clone()
            .unwrap()
            .into_iter()
            .map(|m| m.mount_path)
            .collect();
        assert_eq!(
            paths,
            vec![
                "/home/foundryuser/expedio-kontract-deployer/src/Token.sol",
                "/home/foundryuser/expedio-kontract-deployer/test/Token.t.sol",
                "/home/foundryuser/expedio-kontract-deployer/script/script.s.sol",
                "/home/foundryuser/expedio-kontract-deployer/foundry.toml",
            ]
        );
        assert_eq!(pod.restart_policy.as_deref(), Some("OnFailure"));
    }

    #[test]
    fn local_modules_mount_each_key_as_a_file() {
        let mut target = base_target();
        target.local_modules = vec![(
            "openzeppelin".to_string(),
            vec!["ERC20.sol".to_string(), "Ownable.sol".to_string()],
        )];

        let job = deploy_job(&version(base_spec()), &target).unwrap();
        let pod = job.spec.unwrap().template.spec.unwrap();
        let mounts = pod.containers[0].volume_mounts.clone().unwrap();
        assert!(mounts.iter().any(|m| {
            m.mount_path == "/home/foundryuser/expedio-kontract-deployer/src/openzeppelin/ERC20.sol"
                && m.sub_path.as_deref() == Some("ERC20.sol")
        }));
        let volumes = pod.volumes.unwrap();
        assert!(volumes
            .iter()
            .any(|v| v.name == "openzeppelin" && v.config_map.is_some()));

        let env = pod.containers[0].env.clone().unwrap();
        let local = env.iter().find(|e| e.name == "LOCAL_MODULES").unwrap();
        assert_eq!(local.value.as_deref(), Some("openzeppelin"));
    }

    #[test]
    fn source_config_map_carries_only_present_sources() {
        let mut spec = base_spec();
        spec.script = Some("script".to_string());
        let cm = source_config_map(&version(spec));
        assert_eq!(cm.metadata.name.as_deref(), Some("token-sepolia-version-1-contract"));
        let data = cm.data.unwrap();
        assert_eq!(
            data.keys().collect::<Vec<_>>(),
            vec!["code", "script"]
        );
    }
}
