use crate::util::errors::{Error, Result};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, Patch, PatchParams, PostParams};
use serde_json::json;

/// Create the ConfigMap if it does not exist, or update its data when the
/// desired data differs from what is stored. Equal data is left untouched so
/// repeated reconciles do not amplify writes.
pub async fn create_or_update_config_map(api: &Api<ConfigMap>, desired: &ConfigMap) -> Result<()> {
    let name = desired.metadata.name.clone().unwrap_or_default();

    let existing = match api.get(&name).await {
        Ok(cm) => cm,
        Err(kube::Error::Api(err)) if err.code == 404 => {
            api.create(&PostParams::default(), desired)
                .await
                .map_err(Error::kube)?;
            return Ok(());
        }
        Err(e) => return Err(Error::kube(e)),
    };

    if !data_differs(&existing, desired) {
        return Ok(());
    }

    let patch = json!({ "data": desired.data });
    api.patch(&name, &PatchParams::default(), &Patch::Merge(patch))
        .await
        .map_err(Error::kube)?;
    Ok(())
}

pub fn data_differs(existing: &ConfigMap, desired: &ConfigMap) -> bool {
    existing.data != desired.data
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn cm(data: &[(&str, &str)]) -> ConfigMap {
        ConfigMap {
            data: Some(
                data.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..Default::default()
        }
    }

    #[test]
    fn equal_data_is_not_a_diff() {
        let a = cm(&[("code", "contract C {}")]);
        let b = cm(&[("code", "contract C {}")]);
        assert!(!data_differs(&a, &b));
    }

    #[test]
    fn changed_value_is_a_diff() {
        let a = cm(&[("code", "contract C {}")]);
        let b = cm(&[("code", "contract D {}")]);
        assert!(data_differs(&a, &b));
    }

    #[test]
    fn added_key_is_a_diff() {
        let a = cm(&[("code", "contract C {}")]);
        let b = cm(&[("code", "contract C {}"), ("tests", "t")]);
        assert!(data_differs(&a, &b));
    }
}
