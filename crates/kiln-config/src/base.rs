//! Environment-independent descriptor every overlay starts from.

use std::path::Path;

use indexmap::IndexMap;
use serde_json::json;

use crate::descriptor::{ConfigDescriptor, Entry, OutputOptions, ResolveOptions};
use crate::environment::Environment;
use crate::loaders::{sfc_options, StyleOptions};
use crate::paths::PathPolicy;
use crate::pipeline::{PipelineRule, TransformKind, TransformStep};
use crate::settings::ProjectConfig;

pub const APP_ENTRY_NAME: &str = "app";
pub const APP_ENTRY: &str = "./src/main.js";

/// Inlined below this many bytes, emitted as a file above it.
pub const URL_INLINE_LIMIT: u64 = 10_000;

/// Style options for `environment`.
///
/// Base rules, SFC options and the environment overlays all derive from this
/// so they agree on extraction.
pub fn style_options(project: &ProjectConfig, environment: Environment) -> StyleOptions {
    let source_map = match environment {
        Environment::Production => project.build.production_source_map,
        Environment::Development | Environment::Testing => project.dev.css_source_map,
    };
    StyleOptions::for_environment(environment, source_map)
}

pub fn base_config(project: &ProjectConfig, environment: Environment, root: &Path) -> ConfigDescriptor {
    let src = root.join("src");
    let policy = project.path_policy();
    let is_debug = environment.is_debug();
    let public_path = if is_debug {
        &project.dev.assets_public_path
    } else {
        &project.build.assets_public_path
    };

    let mut rules = vec![
        PipelineRule::new(
            r"\.(js|vue)$",
            vec![TransformStep::new(TransformKind::Lint).with_option("formatter", "friendly")],
        )
        .enforce_pre()
        .include([src.clone()])
        .exclude([root.join("lib")]),
        PipelineRule::new(
            r"\.vue$",
            vec![TransformStep {
                kind: TransformKind::SingleFileComponent,
                options: object_options(sfc_options(&style_options(project, environment))),
            }],
        ),
        PipelineRule::new(r"\.js$", vec![TransformStep::new(TransformKind::Transpile)])
            .include([src.clone(), root.join("test")]),
    ];
    rules.extend(url_rules(&policy, is_debug));

    ConfigDescriptor {
        entry: IndexMap::from([(
            APP_ENTRY_NAME.to_string(),
            Entry::Single(APP_ENTRY.to_string()),
        )]),
        output: OutputOptions {
            dir: root.join(&project.build.assets_root),
            filename_template: "[name].js".to_string(),
            chunk_filename_template: None,
            public_path_template: Some(public_path.clone()),
        },
        resolve: ResolveOptions {
            extensions: vec![".js".into(), ".vue".into(), ".json".into()],
            aliases: IndexMap::from([
                ("vue$".to_string(), "vue/dist/vue.esm.js".to_string()),
                ("@".to_string(), src.to_string_lossy().into_owned()),
            ]),
        },
        rules,
        plugins: Vec::new(),
        devtool: None,
    }
}

fn url_rules(policy: &PathPolicy, is_debug: bool) -> Vec<PipelineRule> {
    [
        (r"\.(png|jpe?g|gif|svg)(\?.*)?$", "img"),
        (r"\.(mp4|webm|ogg|mp3|wav|flac|aac)(\?.*)?$", "media"),
        (r"\.(woff2?|eot|ttf|otf)(\?.*)?$", "fonts"),
    ]
    .into_iter()
    .map(|(test, dir)| {
        let name = policy.assets_path(&format!("{dir}/[name].[hash:7].[ext]"), is_debug);
        PipelineRule::new(
            test,
            vec![TransformStep::new(TransformKind::EmitAssetUrl)
                .with_option("limit", URL_INLINE_LIMIT)
                .with_option("name", name)],
        )
    })
    .collect()
}

fn object_options(value: serde_json::Value) -> IndexMap<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map.into_iter().collect(),
        other => IndexMap::from([("value".to_string(), other)]),
    }
}

/// Compile-time constant definitions, as the define plugin expects them.
pub(crate) fn define_options(env: &IndexMap<String, String>) -> serde_json::Value {
    json!({ "process.env": env })
}
