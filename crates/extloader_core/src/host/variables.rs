//! String runtime variables shared with the host and its extensions.

use std::collections::BTreeMap;

/// Key used for the runtime name.
pub const RUNTIME_NAME_KEY: &str = "runtime_name";
/// Key used for the hosted application id.
pub const APP_ID_KEY: &str = "app_id";
/// Key used for the encoded bundle of the latest service request.
pub const ENCODED_BUNDLE_KEY: &str = "encoded_bundle";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeVariables {
    values: BTreeMap<String, String>,
}

impl RuntimeVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(key.into(), value.into())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Replaces the whole set: previous keys absent from `other` are dropped.
    pub fn replace_all(&mut self, other: &RuntimeVariables) {
        self.values.clear();
        self.values
            .extend(other.values.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::RuntimeVariables;

    #[test]
    fn replace_all_drops_stale_keys() {
        let mut current = RuntimeVariables::new()
            .with("runtime_name", "wrt-service")
            .with("encoded_bundle", "old");
        let update = RuntimeVariables::new().with("runtime_name", "wrt-service");

        current.replace_all(&update);

        assert_eq!(current.get("runtime_name"), Some("wrt-service"));
        assert_eq!(current.get("encoded_bundle"), None);
        assert_eq!(current.len(), 1);
    }
}
