//! Bulk writer for Elasticsearch-compatible search backends.
//!
//! Each trigger takes up to `batch_size` records, encodes them as one
//! newline-delimited `_bulk` payload and routes every record to `success`,
//! `failure` or `retry` from the backend's answer.

pub mod client;
pub mod config;
pub mod processor;
pub mod request;
pub mod response;

use rivulet_api::FlowProcessor;

pub use config::{PutSearchBulkConfig, UpsertMode};
pub use processor::{PutSearchBulk, REL_FAILURE, REL_RETRY, REL_SUCCESS};

// ---------------------------------------------------------------------------
// FFI exports for dynamic (.so) loading
// ---------------------------------------------------------------------------

rivulet_api::qs_abi_version_fn!();
rivulet_api::qs_destroy_fn!(qs_destroy_processor, rivulet_api::FlowProcessor);

/// # Safety
///
/// `config_json_ptr` must point to `config_json_len` bytes of UTF-8 JSON.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn qs_create_processor(
    config_json_ptr: *const u8,
    config_json_len: usize,
) -> rivulet_api::PluginCreateResult {
    let config: PutSearchBulkConfig =
        match unsafe { rivulet_api::parse_plugin_config(config_json_ptr, config_json_len) } {
            Ok(c) => c,
            Err(e) => return rivulet_api::plugin_err(e.to_string()),
        };
    match PutSearchBulk::from_config(config) {
        Ok(p) => rivulet_api::plugin_ok(Box::new(p) as Box<dyn FlowProcessor>),
        Err(e) => rivulet_api::plugin_err(e.to_string()),
    }
}
