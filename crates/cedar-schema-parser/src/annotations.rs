/// An ordered, key-deduplicated annotation map. Order matches the order
/// keys first appeared in the source; a repeated key updates the existing
/// entry's value in place rather than moving it to the end.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Annotations(Vec<(String, String)>);

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `key`. Matches the "duplicate keys keep the
    /// last" rule while preserving source key order.
    pub fn insert(&mut self, key: String, value: String) {
        if let Some(existing) = self.0.iter_mut().find(|(k, _)| *k == key) {
            existing.1 = value;
        } else {
            self.0.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_key_keeps_last_value_but_original_position() {
        let mut a = Annotations::new();
        a.insert("doc".into(), "first".into());
        a.insert("since".into(), "v1".into());
        a.insert("doc".into(), "second".into());
        assert_eq!(a.get("doc"), Some("second"));
        assert_eq!(a.keys().collect::<Vec<_>>(), vec!["doc", "since"]);
    }
}
