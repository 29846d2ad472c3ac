use crate::util::errors::{Error, Result};
use kube::api::{Api, Patch, PatchParams};
use kube::Resource;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::fmt::Debug;

pub fn has_finalizer<K: Resource>(obj: &K, finalizer: &str) -> bool {
    obj.meta()
        .finalizers
        .as_ref()
        .map(|fs| fs.iter().any(|f| f == finalizer))
        .unwrap_or(false)
}

/// Append `finalizer` to the object's finalizer list and persist it.
/// No-op when already present.
pub async fn ensure_finalizer<K>(api: &Api<K>, obj: &K, finalizer: &str) -> Result<()>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    if has_finalizer(obj, finalizer) {
        return Ok(());
    }
    let name = obj.meta().name.clone().unwrap_or_default();
    let mut finalizers = obj.meta().finalizers.clone().unwrap_or_default();
    finalizers.push(finalizer.to_string());

    let patch = json!({ "metadata": { "finalizers": finalizers } });
    api.patch(&name, &PatchParams::default(), &Patch::Merge(patch))
        .await
        .map_err(Error::kube)?;
    Ok(())
}

/// Drop `finalizer` from the object's finalizer list and persist it.
pub async fn remove_finalizer<K>(api: &Api<K>, obj: &K, finalizer: &str) -> Result<()>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    if !has_finalizer(obj, finalizer) {
        return Ok(());
    }
    let name = obj.meta().name.clone().unwrap_or_default();
    let finalizers: Vec<String> = obj
        .meta()
        .finalizers
        .clone()
        .unwrap_or_default()
        .into_iter()
        .filter(|f| f != finalizer)
        .collect();

    let patch = json!({ "metadata": { "finalizers": finalizers } });
    api.patch(&name, &PatchParams::default(), &Patch::Merge(patch))
        .await
        .map_err(Error::kube)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::api::ObjectMeta;

    fn cm_with_finalizers(finalizers: Option<Vec<&str>>) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some("cm".into()),
                finalizers: finalizers.map(|fs| fs.into_iter().map(String::from).collect()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn detects_present_finalizer() {
        let cm = cm_with_finalizers(Some(vec!["a", "b"]));
        assert!(has_finalizer(&cm, "a"));
        assert!(!has_finalizer(&cm, "c"));
    }

    #[test]
    fn absent_list_has_no_finalizers() {
        let cm = cm_with_finalizers(None);
        assert!(!has_finalizer(&cm, "a"));
    }
}
