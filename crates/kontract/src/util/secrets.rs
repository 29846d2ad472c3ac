use k8s_openapi::api::core::v1::Secret;

/// Look up a key in the Secret's data and decode it as UTF-8. Returns None
/// when the key is absent or not valid UTF-8.
pub fn value(secret: &Secret, key: &str) -> Option<String> {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .and_then(|bytes| String::from_utf8(bytes.0.clone()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    #[test]
    fn reads_utf8_value() {
        let mut data = BTreeMap::new();
        data.insert("url".to_string(), ByteString(b"https://rpc.example".to_vec()));
        let secret = Secret {
            data: Some(data),
            ..Default::default()
        };
        assert_eq!(value(&secret, "url").as_deref(), Some("https://rpc.example"));
        assert_eq!(value(&secret, "token"), None);
    }

    #[test]
    fn empty_secret_has_no_values() {
        let secret = Secret::default();
        assert_eq!(value(&secret, "url"), None);
    }
}
