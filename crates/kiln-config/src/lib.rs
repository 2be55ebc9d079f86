pub mod base;
pub mod descriptor;
pub mod discovery;
pub mod environment;
pub mod error;
pub mod loaders;
pub mod merge;
pub mod paths;
pub mod pipeline;
pub mod proxy;
pub mod settings;
pub mod value;

// Re-export main types
pub use base::{base_config, style_options};
pub use descriptor::{plugin_names, ConfigDescriptor, Entry, OutputOptions, PluginSpec, ResolveOptions};
pub use environment::{Environment, NODE_ENV};
pub use error::*;
pub use loaders::{css_loaders, sfc_options, style_rule_list, style_rules, StyleLang, StyleOptions};
pub use merge::{merge, ConfigMerger, Overlay, HOT_CLIENT_ENTRY};
pub use paths::{posix_join, PathPolicy};
pub use pipeline::{PipelineRule, RuleSet, StyleOutput, TransformKind, TransformStep};
pub use proxy::{ProxyContext, ProxyEntry, ProxyOptions, ProxyRule, ProxyTable};
pub use settings::{BuildSettings, BundlerSettings, DevSettings, ProjectConfig, TestSettings};
pub use value::{merge_values, ConfigValue};

// Re-export discovery
pub use discovery::{discover, ConfigDiscovery};
