use std::collections::BTreeMap;

use rivulet_api::{AttributeTemplate, PluginError};
use serde::Deserialize;

/// Body layout for `update` / `upsert` operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertMode {
    DocAsUpsert,
    ScriptedUpsert,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PutSearchBulkConfig {
    /// Base URL of the backend, e.g. `http://localhost:9200`.
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_response_timeout")]
    pub response_timeout_secs: u64,
    /// Attribute holding the document identifier. May be unset only when
    /// every record uses the `index` operation (auto-generated ids).
    #[serde(default)]
    pub id_attribute: Option<String>,
    pub index: AttributeTemplate,
    /// Document type label. Omitted from action lines when it renders empty.
    #[serde(default)]
    pub doc_type: Option<AttributeTemplate>,
    /// One of `index`, `update`, `upsert`, `delete` (case-insensitive).
    #[serde(default = "default_operation")]
    pub operation: AttributeTemplate,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Script object (JSON text) for `scripted_upsert`.
    #[serde(default)]
    pub script: Option<AttributeTemplate>,
    #[serde(default)]
    pub upsert_option: Option<UpsertMode>,
    /// Character set of record content, e.g. `UTF-8` or `ISO-8859-1`.
    #[serde(default = "default_charset")]
    pub charset: AttributeTemplate,
    /// Extra query parameters appended to the `_bulk` URL.
    #[serde(default)]
    pub query_params: BTreeMap<String, String>,
}

fn default_connect_timeout() -> u64 {
    5
}
fn default_response_timeout() -> u64 {
    15
}
fn default_operation() -> AttributeTemplate {
    AttributeTemplate::parse("index")
}
fn default_charset() -> AttributeTemplate {
    AttributeTemplate::parse("UTF-8")
}
fn default_batch_size() -> usize {
    100
}

impl PutSearchBulkConfig {
    /// Checks that must pass before the processor may be scheduled.
    ///
    /// The operation may reference attributes, so only a literal operation
    /// can be checked against a missing identifier attribute here; the rest
    /// is caught per record.
    pub fn validate(&self) -> Result<(), PluginError> {
        if self.url.trim().is_empty() {
            return Err(PluginError::config("url must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(PluginError::config("batch_size must be a positive integer"));
        }

        let id_attribute_missing = self
            .id_attribute
            .as_deref()
            .is_none_or(|attr| attr.trim().is_empty());
        if id_attribute_missing {
            if let Some(op) = self.operation.as_literal() {
                if matches!(op.to_ascii_lowercase().as_str(), "update" | "upsert" | "delete" | "") {
                    return Err(PluginError::config(
                        "if id_attribute is not set, operation must evaluate to \"index\"",
                    ));
                }
            }
        }

        if let Some(label) = self.charset.as_literal() {
            if encoding_rs::Encoding::for_label(label.trim().as_bytes()).is_none() {
                return Err(PluginError::config(format!("unknown charset '{label}'")));
            }
        }

        let script_blank = self
            .script
            .as_ref()
            .is_none_or(|script| script.source().trim().is_empty());
        if self.upsert_option == Some(UpsertMode::ScriptedUpsert) && script_blank {
            return Err(PluginError::config(
                "if upsert_option is set to \"scripted_upsert\", a script must be provided",
            ));
        }

        Ok(())
    }
}
