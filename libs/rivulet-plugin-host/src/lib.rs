//! Loads processor plugins from shared libraries.

use std::future::Future;
use std::pin::Pin;

use libloading::{Library, Symbol};

use rivulet_api::{
    AbiVersionFn, CreatePluginFn, FlowProcessor, PluginCreateResult, PluginError, ProcessSession,
    QS_ABI_VERSION, Relationship, Scheduling,
};

const CREATE_SYMBOL: &[u8] = b"qs_create_processor";

// ════════════════════════════════════════════════════════════════
//  Generic plugin loading
// ════════════════════════════════════════════════════════════════

/// Open a plugin library, check its ABI version, call `create_symbol` with
/// the JSON configuration and take ownership of the returned `Box<T>`.
///
/// Returns (inner, library). Drop order matters: inner first.
///
/// # Safety
/// `create_symbol` must produce a `Box<Box<T>>` for the same `T`.
unsafe fn load_plugin<T: ?Sized>(
    plugin_path: &str,
    create_symbol: &[u8],
    config_json: &str,
) -> Result<(Box<T>, Library), PluginError> {
    let lib = unsafe { Library::new(plugin_path) }
        .map_err(|e| PluginError::config(format!("failed to load plugin '{plugin_path}': {e}")))?;

    let version_fn: Symbol<AbiVersionFn> = unsafe { lib.get(b"qs_abi_version") }.map_err(|_| {
        PluginError::config(format!(
            "plugin '{plugin_path}' does not export 'qs_abi_version'. Rebuild the plugin."
        ))
    })?;
    let plugin_version = unsafe { version_fn() };
    if plugin_version != QS_ABI_VERSION {
        return Err(PluginError::config(format!(
            "ABI version mismatch for plugin '{plugin_path}': \
             plugin has version {plugin_version}, host expects {QS_ABI_VERSION}. \
             Rebuild the plugin."
        )));
    }

    let create_fn: Symbol<CreatePluginFn> = unsafe { lib.get(create_symbol) }.map_err(|e| {
        let sym = String::from_utf8_lossy(create_symbol);
        PluginError::config(format!("symbol '{sym}' not found in '{plugin_path}': {e}"))
    })?;

    let result: PluginCreateResult = unsafe { create_fn(config_json.as_ptr(), config_json.len()) };

    if !result.error_ptr.is_null() {
        let error = unsafe { *Box::from_raw(result.error_ptr as *mut String) };
        return Err(PluginError::config(format!("plugin '{plugin_path}' error: {error}")));
    }
    if result.plugin_ptr.is_null() {
        return Err(PluginError::config(format!("plugin '{plugin_path}' returned null")));
    }

    let inner: Box<T> = unsafe { *Box::from_raw(result.plugin_ptr as *mut Box<T>) };
    Ok((inner, lib))
}

// ════════════════════════════════════════════════════════════════
//  Processor wrapper
// ════════════════════════════════════════════════════════════════

/// A `FlowProcessor` living in a dynamically loaded library.
///
/// Keeps the library mapped for as long as the processor exists.
pub struct PluginFlowProcessor {
    inner: Option<Box<dyn FlowProcessor>>,
    _lib: Library,
}

impl PluginFlowProcessor {
    /// Load `plugin_path` and create its processor from `config_json`.
    /// A rejected configuration comes back as a `Config` error.
    pub fn load(plugin_path: &str, config_json: &str) -> Result<Self, PluginError> {
        let (inner, lib) =
            unsafe { load_plugin::<dyn FlowProcessor>(plugin_path, CREATE_SYMBOL, config_json)? };
        tracing::debug!(plugin = plugin_path, "processor plugin loaded");
        Ok(Self { inner: Some(inner), _lib: lib })
    }

    #[inline]
    fn get(&self) -> Result<&(dyn FlowProcessor + '_), PluginError> {
        self.inner
            .as_ref()
            .map(|b| &**b)
            .ok_or_else(|| PluginError::logic("PluginFlowProcessor already dropped"))
    }
}

impl Drop for PluginFlowProcessor {
    fn drop(&mut self) {
        // Drop inner first, while _lib (and the vtable) are still mapped.
        self.inner.take();
    }
}

impl FlowProcessor for PluginFlowProcessor {
    fn relationships(&self) -> Vec<Relationship> {
        self.get().map(|inner| inner.relationships()).unwrap_or_default()
    }

    fn on_trigger<'a>(
        &'a self,
        session: &'a mut dyn ProcessSession,
    ) -> Pin<Box<dyn Future<Output = Result<Scheduling, PluginError>> + Send + 'a>> {
        match self.get() {
            Ok(inner) => inner.on_trigger(session),
            Err(e) => Box::pin(async move { Err(e) }),
        }
    }

    fn on_dynamic_property(&self, name: &str, value: Option<&str>) -> Result<(), PluginError> {
        self.get()?.on_dynamic_property(name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_is_a_config_error() {
        let err = PluginFlowProcessor::load("/nonexistent/librivulet_missing.so", "{}")
            .err()
            .unwrap();
        assert_eq!(err.kind(), rivulet_api::ErrorKind::Config);
        assert!(err.message().contains("librivulet_missing"));
    }

    #[cfg(unix)]
    #[test]
    fn released_processor_reports_logic_errors() {
        let lib: Library = libloading::os::unix::Library::this().into();
        let processor = PluginFlowProcessor { inner: None, _lib: lib };

        let err = processor.on_dynamic_property("rule", Some("1")).unwrap_err();
        assert_eq!(err.kind(), rivulet_api::ErrorKind::Logic);
        assert!(processor.relationships().is_empty());
    }
}
