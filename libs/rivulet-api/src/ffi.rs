use crate::PluginError;

// ════════════════════════════════════════════════════════════════
//  Plugin FFI
// ════════════════════════════════════════════════════════════════

/// Result of `qs_create_processor`.
///
/// Host and plugins are built by the same compiler from one workspace,
/// so passing Rust trait objects through this struct is sound.
#[repr(C)]
pub struct PluginCreateResult {
    /// On success: `Box<Box<dyn FlowProcessor>>` (double-boxed for a thin pointer).
    /// On failure: null.
    pub plugin_ptr: *mut (),
    /// On failure: `Box<String>` with the error message.
    /// On success: null.
    pub error_ptr: *mut (),
}

// Safety: only moved between host and plugin during creation.
unsafe impl Send for PluginCreateResult {}

/// Signature of the `qs_create_processor` symbol exported by plugins.
pub type CreatePluginFn =
    unsafe extern "C" fn(config_json_ptr: *const u8, config_json_len: usize) -> PluginCreateResult;

/// Plugin helper: successful creation.
pub fn plugin_ok<T: ?Sized>(val: Box<T>) -> PluginCreateResult {
    // Box<dyn Trait> is a fat pointer; Box<Box<dyn Trait>> is thin and fits *mut ().
    let boxed: Box<Box<T>> = Box::new(val);
    PluginCreateResult {
        plugin_ptr: Box::into_raw(boxed) as *mut (),
        error_ptr: std::ptr::null_mut(),
    }
}

/// Plugin helper: failed creation.
pub fn plugin_err(error: String) -> PluginCreateResult {
    let boxed: Box<String> = Box::new(error);
    PluginCreateResult {
        plugin_ptr: std::ptr::null_mut(),
        error_ptr: Box::into_raw(boxed) as *mut (),
    }
}

/// Generates the `qs_destroy_*` function of a plugin.
///
/// ```ignore
/// qs_destroy_fn!(qs_destroy_processor, FlowProcessor);
/// ```
#[macro_export]
macro_rules! qs_destroy_fn {
    ($fn_name:ident, $trait_ty:path) => {
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $fn_name(ptr: *mut ()) {
            if !ptr.is_null() {
                let _ = unsafe { Box::from_raw(ptr as *mut Box<dyn $trait_ty>) };
            }
        }
    };
}

// ════════════════════════════════════════════════════════════════
//  ABI Version
// ════════════════════════════════════════════════════════════════

/// ABI version of the plugin interface.
///
/// Bump whenever `FlowProcessor`, `ProcessSession`, `FlowRecord` or the
/// FFI signatures change in a binary-incompatible way.
pub const QS_ABI_VERSION: u32 = 1;

/// Signature of the `qs_abi_version` symbol exported by plugins.
pub type AbiVersionFn = unsafe extern "C" fn() -> u32;

/// Exports the `qs_abi_version` symbol. Call once at the plugin crate root.
#[macro_export]
macro_rules! qs_abi_version_fn {
    () => {
        #[unsafe(no_mangle)]
        pub extern "C" fn qs_abi_version() -> u32 {
            $crate::QS_ABI_VERSION
        }
    };
}

// ════════════════════════════════════════════════════════════════
//  FFI Config Parsing
// ════════════════════════════════════════════════════════════════

/// Deserialize plugin config from an FFI pointer + length.
///
/// # Safety
/// `config_json_ptr` must point to `config_json_len` valid bytes.
pub unsafe fn parse_plugin_config<T: serde::de::DeserializeOwned>(
    config_json_ptr: *const u8,
    config_json_len: usize,
) -> Result<T, PluginError> {
    let json_bytes = unsafe { std::slice::from_raw_parts(config_json_ptr, config_json_len) };
    let json_str = std::str::from_utf8(json_bytes)
        .map_err(|e| PluginError::config(format!("invalid UTF-8 config: {e}")))?;
    serde_json::from_str(json_str)
        .map_err(|e| PluginError::config(format!("invalid config JSON: {e}")))
}

/// Deserialize optional plugin config.
/// Returns `T::default()` if the pointer is null or the length is 0.
///
/// # Safety
/// If `config_json_ptr` is not null it must point to `config_json_len` valid bytes.
pub unsafe fn parse_plugin_config_opt<T: Default + serde::de::DeserializeOwned>(
    config_json_ptr: *const u8,
    config_json_len: usize,
) -> Result<T, PluginError> {
    if config_json_ptr.is_null() || config_json_len == 0 {
        return Ok(T::default());
    }
    unsafe { parse_plugin_config(config_json_ptr, config_json_len) }
}
