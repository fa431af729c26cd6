//! Narrow gateway to the CMS data models.
//!
//! The CMS owns its persistence; the inliner only needs to enumerate
//! resources, read fields, and persist edited fields. Posts come from a
//! `findAll`-style listing, the other models from a paged listing with
//! `limit: all` - both collapse to `find_all` on this seam.

pub mod json;
pub mod memory;

pub use json::JsonExport;
pub use memory::InMemoryModel;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

/// One CMS resource instance: an id plus its readable fields.
///
/// Fields hold `None` where the CMS stores NULL.
#[derive(Debug, Clone)]
pub struct Resource {
    pub id: String,
    pub fields: HashMap<String, Option<String>>,
}

impl Resource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: HashMap::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: Option<&str>) -> Self {
        self.fields
            .insert(name.to_string(), value.map(|v| v.to_string()));
        self
    }

    /// Read a field; `None` for both missing and NULL values.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|v| v.as_deref())
    }
}

/// Enumeration + persistence surface of one CMS model.
#[async_trait]
pub trait ResourceModel: Send + Sync {
    /// Every resource of this model (internal context, no pagination cap).
    async fn find_all(&self) -> anyhow::Result<Vec<Resource>>;

    /// Persist changed fields for one resource.
    async fn edit(&self, id: &str, changes: HashMap<String, String>) -> anyhow::Result<()>;
}

/// The four models the inliner walks.
#[derive(Clone)]
pub struct CmsModels {
    pub posts: Arc<dyn ResourceModel>,
    pub post_meta: Arc<dyn ResourceModel>,
    pub tags: Arc<dyn ResourceModel>,
    pub users: Arc<dyn ResourceModel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_get_treats_null_and_missing_alike() {
        let resource = Resource::new("r1")
            .with_field("feature_image", Some("https://cdn/x.png"))
            .with_field("og_image", None);

        assert_eq!(resource.get("feature_image"), Some("https://cdn/x.png"));
        assert_eq!(resource.get("og_image"), None);
        assert_eq!(resource.get("twitter_image"), None);
    }
}
