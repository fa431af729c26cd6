//! CMS JSON export gateway.
//!
//! Loads a JSON export (`posts`, `posts_meta`, `tags`, `users` arrays) into
//! in-memory models, and writes edited fields back over the original
//! document so unrelated keys round-trip untouched.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde_json::Value;

use super::{CmsModels, InMemoryModel, Resource};

/// A loaded export plus the in-memory models the job runs against.
pub struct JsonExport {
    doc: Value,
    pub posts: Arc<InMemoryModel>,
    pub posts_meta: Arc<InMemoryModel>,
    pub tags: Arc<InMemoryModel>,
    pub users: Arc<InMemoryModel>,
}

impl JsonExport {
    /// Load an export file. Missing model arrays are treated as empty.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading export {}", path.display()))?;
        let doc: Value = serde_json::from_str(&raw)
            .with_context(|| format!("parsing export {}", path.display()))?;

        let posts = Arc::new(InMemoryModel::seeded(resources_of(&doc, "posts")));
        let posts_meta = Arc::new(InMemoryModel::seeded(resources_of(&doc, "posts_meta")));
        let tags = Arc::new(InMemoryModel::seeded(resources_of(&doc, "tags")));
        let users = Arc::new(InMemoryModel::seeded(resources_of(&doc, "users")));

        Ok(Self {
            doc,
            posts,
            posts_meta,
            tags,
            users,
        })
    }

    /// The gateway handles for the orchestrator.
    pub fn models(&self) -> CmsModels {
        CmsModels {
            posts: self.posts.clone(),
            post_meta: self.posts_meta.clone(),
            tags: self.tags.clone(),
            users: self.users.clone(),
        }
    }

    /// Overlay the (possibly edited) model state onto the original document
    /// and write it out.
    pub async fn write(&self, path: &Path) -> anyhow::Result<()> {
        let mut doc = self.doc.clone();
        let models = [
            ("posts", &self.posts),
            ("posts_meta", &self.posts_meta),
            ("tags", &self.tags),
            ("users", &self.users),
        ];
        for (key, model) in models {
            overlay(&mut doc, key, model.snapshot().await);
        }

        let out = serde_json::to_string_pretty(&doc)?;
        std::fs::write(path, out)
            .with_context(|| format!("writing export {}", path.display()))?;
        Ok(())
    }
}

/// Pull the scalar string fields of every object in `doc[key]`.
fn resources_of(doc: &Value, key: &str) -> Vec<Resource> {
    let Some(items) = doc.get(key).and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let object = item.as_object()?;
            let id = match object.get("id") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => return None,
            };
            let mut resource = Resource::new(id);
            for (field, value) in object {
                if field == "id" {
                    continue;
                }
                match value {
                    Value::String(s) => {
                        resource.fields.insert(field.clone(), Some(s.clone()));
                    }
                    Value::Null => {
                        resource.fields.insert(field.clone(), None);
                    }
                    _ => {}
                }
            }
            Some(resource)
        })
        .collect()
}

/// Write each resource's fields back into the matching object of `doc[key]`.
fn overlay(doc: &mut Value, key: &str, rows: Vec<Resource>) {
    let Some(items) = doc.get_mut(key).and_then(Value::as_array_mut) else {
        return;
    };

    for row in rows {
        let target = items.iter_mut().find(|item| {
            match item.get("id") {
                Some(Value::String(s)) => *s == row.id,
                Some(Value::Number(n)) => n.to_string() == row.id,
                _ => false,
            }
        });
        let Some(Value::Object(object)) = target else {
            continue;
        };
        for (field, value) in row.fields {
            let json_value = match value {
                Some(s) => Value::String(s),
                None => Value::Null,
            };
            object.insert(field, json_value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceModel;
    use std::collections::HashMap;

    fn sample_export() -> Value {
        serde_json::json!({
            "posts": [
                {
                    "id": "p1",
                    "title": "Hello",
                    "feature_image": "https://cdn.example.com/a.png",
                    "lexical": "{\"src\":\"https://cdn.example.com/a.png\"}",
                    "published": true,
                    "word_count": 120
                }
            ],
            "posts_meta": [{"id": 7, "og_image": null}],
            "tags": [],
            "users": [{"id": "u1", "profile_image": "https://cdn.example.com/me.jpg"}]
        })
    }

    #[tokio::test]
    async fn load_edit_write_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        std::fs::write(&path, sample_export().to_string()).unwrap();

        let export = JsonExport::load(&path).unwrap();
        let posts = export.posts.snapshot().await;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].get("feature_image"), Some("https://cdn.example.com/a.png"));

        // Numeric ids are carried as strings.
        let meta = export.posts_meta.snapshot().await;
        assert_eq!(meta[0].id, "7");
        assert_eq!(meta[0].get("og_image"), None);

        let mut changes = HashMap::new();
        changes.insert(
            "feature_image".to_string(),
            "__GHOST_URL__/content/images/a.png".to_string(),
        );
        export.posts.edit("p1", changes).await.unwrap();

        let out = dir.path().join("out.json");
        export.write(&out).await.unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(
            written["posts"][0]["feature_image"],
            "__GHOST_URL__/content/images/a.png"
        );
        // Non-string fields survive untouched.
        assert_eq!(written["posts"][0]["published"], true);
        assert_eq!(written["posts"][0]["word_count"], 120);
    }

    #[test]
    fn missing_arrays_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        std::fs::write(&path, "{}").unwrap();

        let export = JsonExport::load(&path).unwrap();
        assert!(matches!(export.doc, Value::Object(_)));
    }
}
