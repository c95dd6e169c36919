//! Installed model records

use serde::{Deserialize, Serialize};

/// One installed model as reported by `ollama list`
///
/// Records are rebuilt from scratch on every inventory refresh. `full_name` is
/// always derived from `name` and `tag` and is the only identifier used to
/// address a model in later operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RecordFields")]
pub struct ModelRecord {
    name: String,
    tag: String,
    full_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    id: String,
    size: String,
    modified_date: String,
}

/// Wire shape accepted when reading records back; `full_name` is re-derived
#[derive(Deserialize)]
struct RecordFields {
    name: String,
    #[serde(default)]
    tag: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    size: String,
    #[serde(default)]
    modified_date: String,
}

impl From<RecordFields> for ModelRecord {
    fn from(fields: RecordFields) -> Self {
        ModelRecord::new(fields.name, fields.tag, fields.size, fields.modified_date)
            .with_id(fields.id)
    }
}

/// `name` if `tag` is empty, else `name:tag`
pub fn derive_full_name(name: &str, tag: &str) -> String {
    if tag.is_empty() {
        name.to_string()
    } else {
        format!("{}:{}", name, tag)
    }
}

impl ModelRecord {
    pub fn new(
        name: impl Into<String>,
        tag: impl Into<String>,
        size: impl Into<String>,
        modified_date: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let tag = tag.into();
        let full_name = derive_full_name(&name, &tag);
        Self {
            name,
            tag,
            full_name,
            id: String::new(),
            size: size.into(),
            modified_date: modified_date.into(),
        }
    }

    /// Attach the daemon's short model digest
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Short digest, empty when the listing had no ID column
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Size exactly as reported, e.g. `4.7 GB`
    pub fn size(&self) -> &str {
        &self.size
    }

    /// Modification date exactly as reported, e.g. `2 weeks ago`
    pub fn modified_date(&self) -> &str {
        &self.modified_date
    }
}

/// Serialize a refreshed inventory as the List payload
pub fn records_to_payload(records: &[ModelRecord]) -> String {
    serde_json::to_string(records).unwrap_or_else(|_| "[]".to_string())
}

/// Read a List payload back into records
pub fn records_from_payload(payload: &str) -> serde_json::Result<Vec<ModelRecord>> {
    serde_json::from_str(payload)
}
