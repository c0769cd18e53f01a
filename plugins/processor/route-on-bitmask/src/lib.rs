//! Routes each record to one output per rule whose mask is fully set in an
//! integer attribute of the record.
//!
//! Rules come from the static `rules` table and from dynamic properties
//! (`name = mask`). Records with no usable value go to `failure`; records
//! matching nothing go to `unmatched`.

pub mod config;
pub mod registry;
pub mod router;

use rivulet_api::FlowProcessor;

pub use config::{MaskValue, RouteOnBitmaskConfig};
pub use registry::{REL_FAILURE, REL_UNMATCHED, RuleError, RuleRegistry};
pub use router::{Decision, RouteOnBitmask, decide};

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
    let config: RouteOnBitmaskConfig =
        match unsafe { rivulet_api::parse_plugin_config(config_json_ptr, config_json_len) } {
            Ok(c) => c,
            Err(e) => return rivulet_api::plugin_err(e.to_string()),
        };
    match RouteOnBitmask::from_config(config) {
        Ok(p) => rivulet_api::plugin_ok(Box::new(p) as Box<dyn FlowProcessor>),
        Err(e) => rivulet_api::plugin_err(e.to_string()),
    }
}
