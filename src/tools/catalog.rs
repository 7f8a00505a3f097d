//! JSON file catalogs (cold-call templates, objection patterns).

use std::collections::BTreeMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Load every `*.json` file in `dir`, keyed by `key_of`.
///
/// A missing directory yields an empty catalog. Files that fail to read or
/// parse are logged and skipped.
pub fn load_json_dir<T, F>(dir: &Path, key_of: F) -> BTreeMap<String, T>
where
    T: DeserializeOwned,
    F: Fn(&T) -> String,
{
    let mut entries = BTreeMap::new();

    let read_dir = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) => {
            debug!("Catalog directory {} not readable: {}", dir.display(), e);
            return entries;
        }
    };

    for entry in read_dir.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        let parsed = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str::<T>(&raw).map_err(|e| e.to_string()));

        match parsed {
            Ok(item) => {
                entries.insert(key_of(&item), item);
            }
            Err(e) => warn!("Error loading {}: {}", path.display(), e),
        }
    }

    debug!("Loaded {} entries from {}", entries.len(), dir.display());
    entries
}

/// Replace each `{key}` in `text` with its value.
pub fn fill_placeholders<'a, I>(text: &str, values: I) -> String
where
    I: IntoIterator<Item = (&'a str, String)>,
{
    values.into_iter().fold(text.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{}}}", key), &value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Item {
        name: String,
    }

    #[test]
    fn test_load_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), r#"{"name": "alpha"}"#).unwrap();
        std::fs::write(dir.path().join("b.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("c.txt"), r#"{"name": "ignored"}"#).unwrap();

        let items: BTreeMap<String, Item> = load_json_dir(dir.path(), |i: &Item| i.name.clone());
        assert_eq!(items.keys().collect::<Vec<_>>(), vec!["alpha"]);
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let items: BTreeMap<String, Item> =
            load_json_dir(Path::new("/nonexistent/reva/catalog"), |i: &Item| i.name.clone());
        assert!(items.is_empty());
    }

    #[test]
    fn test_fill_placeholders() {
        let out = fill_placeholders(
            "Hi {name}, about {place}. {unknown}",
            [("name", "Ana".to_string()), ("place", "Reno".to_string())],
        );
        assert_eq!(out, "Hi Ana, about Reno. {unknown}");
    }
}
