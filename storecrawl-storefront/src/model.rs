//! Crawl results and the developer lookup built during search.
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Metadata extracted from one app page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub app_name: String,
    /// Store identifier with its `id` prefix, e.g. `id363590051`.
    pub app_id: String,
    pub app_url: String,
    /// Supported devices, e.g. `iPhone`, `iPad`.
    pub app_targets: Vec<String>,
    pub app_languages: Vec<String>,
}

/// Developer slug → developer URL, in the order slugs were first seen.
///
/// Inserting a known slug replaces its URL without moving it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanyDirectory {
    entries: Vec<(String, String)>,
}

impl CompanyDirectory {
    pub fn insert(&mut self, name: impl Into<String>, url: impl Into<String>) {
        let name = name.into();
        let url = url.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = url,
            None => self.entries.push((name, url)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, url)| url.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for CompanyDirectory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, url) in &self.entries {
            map.serialize_entry(name, url)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reinsert_updates_in_place() {
        let mut dir = CompanyDirectory::default();
        dir.insert("netflix-inc", "https://apps.apple.com/us/developer/netflix-inc/id1");
        dir.insert("sony", "https://apps.apple.com/us/developer/sony/id2");
        dir.insert("netflix-inc", "https://apps.apple.com/us/developer/netflix-inc/id3");

        assert_eq!(dir.len(), 2);
        assert_eq!(dir.names().collect::<Vec<_>>(), vec!["netflix-inc", "sony"]);
        assert_eq!(
            dir.get("netflix-inc"),
            Some("https://apps.apple.com/us/developer/netflix-inc/id3")
        );
    }

    #[test]
    fn serializes_as_ordered_object() {
        let mut dir = CompanyDirectory::default();
        dir.insert("b", "u1");
        dir.insert("a", "u2");
        assert_eq!(serde_json::to_string(&dir).unwrap(), r#"{"b":"u1","a":"u2"}"#);
    }
}
