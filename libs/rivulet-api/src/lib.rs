//! Plugin contract shared by the host and every processor plugin.

pub mod error;
pub mod ffi;
pub mod memory;
pub mod processor;
pub mod record;
pub mod relationship;
pub mod session;
pub mod template;

pub use error::{ErrorKind, PluginError};
pub use ffi::{
    AbiVersionFn, CreatePluginFn, PluginCreateResult, QS_ABI_VERSION,
    parse_plugin_config, parse_plugin_config_opt, plugin_err, plugin_ok,
};
pub use memory::{MemorySession, SendEvent};
pub use processor::{FlowProcessor, Scheduling};
pub use record::FlowRecord;
pub use relationship::Relationship;
pub use session::ProcessSession;
pub use template::AttributeTemplate;
