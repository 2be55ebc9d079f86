//! Laws of the overlay merge, checked over generated inputs.

use indexmap::IndexMap;
use kiln_config::{
    merge, merge_values, ConfigDescriptor, ConfigValue, Entry, Overlay, OutputOptions,
    PluginSpec, ResolveOptions,
};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::path::PathBuf;

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i32>().prop_map(Value::from),
        "[a-z]{0,6}".prop_map(Value::from),
    ]
}

fn tree() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,3}", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

fn mapping_with_prefix(prefix: &'static str) -> impl Strategy<Value = ConfigValue> {
    prop::collection::btree_map("[a-z]{1,3}", tree(), 0..5).prop_map(move |map| {
        ConfigValue::from(Value::Object(
            map.into_iter()
                .map(|(k, v)| (format!("{prefix}{k}"), v))
                .collect(),
        ))
    })
}

prop_compose! {
    fn descriptor()(
        entries in prop::collection::btree_map("[a-z]{1,5}", prop::collection::vec("[a-z./]{1,8}", 1..3), 1..3),
        filename in "[a-z\\[\\]]{1,10}\\.js",
        chunk in prop::option::of("[a-z]{1,6}\\.js"),
        extensions in prop::collection::vec("\\.[a-z]{1,4}", 0..4),
        plugins in prop::collection::vec(("[a-z-]{1,8}", prop::option::of(any::<u16>())), 0..4),
        devtool in prop::option::of("[a-z-]{1,12}"),
    ) -> ConfigDescriptor {
        ConfigDescriptor {
            entry: entries
                .into_iter()
                .map(|(name, mut modules)| {
                    let entry = if modules.len() == 1 {
                        Entry::Single(modules.remove(0))
                    } else {
                        Entry::Many(modules)
                    };
                    (name, entry)
                })
                .collect(),
            output: OutputOptions {
                dir: PathBuf::from("dist"),
                filename_template: filename,
                chunk_filename_template: chunk,
                public_path_template: None,
            },
            resolve: ResolveOptions { extensions, aliases: IndexMap::new() },
            rules: Vec::new(),
            plugins: plugins
                .into_iter()
                .map(|(name, option)| match option {
                    Some(n) => PluginSpec::with_options(&name, json!({ "n": n })),
                    None => PluginSpec::new(&name),
                })
                .collect(),
            devtool,
        }
    }
}

proptest! {
    #[test]
    fn empty_overlay_is_identity_on_trees(base in mapping_with_prefix("")) {
        prop_assert_eq!(merge_values(&base, &ConfigValue::empty()), base);
    }

    #[test]
    fn empty_overlay_is_identity_on_descriptors(base in descriptor()) {
        prop_assert_eq!(merge(&base, &Overlay::empty()).unwrap(), base);
    }

    #[test]
    fn disjoint_overlays_associate(
        base in mapping_with_prefix(""),
        a in mapping_with_prefix("a_"),
        b in mapping_with_prefix("b_"),
    ) {
        let left = merge_values(&merge_values(&base, &a), &b);
        let right = merge_values(&base, &merge_values(&a, &b));
        prop_assert_eq!(left, right);
    }

    #[test]
    fn sequences_keep_base_then_overlay(
        base in prop::collection::vec(tree(), 0..5),
        overlay in prop::collection::vec(tree(), 0..5),
    ) {
        let merged = merge_values(
            &ConfigValue::from(Value::Array(base.clone())),
            &ConfigValue::from(Value::Array(overlay.clone())),
        );
        let expected: Vec<Value> = base.into_iter().chain(overlay).collect();
        prop_assert_eq!(Value::from(merged), Value::Array(expected));
    }

    #[test]
    fn merge_never_mutates_inputs(base in mapping_with_prefix(""), overlay in mapping_with_prefix("")) {
        let base_before = base.clone();
        let overlay_before = overlay.clone();
        let _ = merge_values(&base, &overlay);
        prop_assert_eq!(base, base_before);
        prop_assert_eq!(overlay, overlay_before);
    }
}

fn sample_descriptor() -> ConfigDescriptor {
    ConfigDescriptor {
        entry: IndexMap::from([("app".to_string(), Entry::Single("./src/main.js".into()))]),
        output: OutputOptions {
            dir: PathBuf::from("dist"),
            filename_template: "[name].js".into(),
            chunk_filename_template: None,
            public_path_template: Some("/".into()),
        },
        resolve: ResolveOptions {
            extensions: vec![".js".into()],
            aliases: IndexMap::new(),
        },
        rules: Vec::new(),
        plugins: vec![PluginSpec::new("define")],
        devtool: Some("source-map".into()),
    }
}

#[test]
fn descriptor_overlays_associate() {
    let base = sample_descriptor();
    let a = Overlay::from_json(json!({ "output": { "filenameTemplate": "app.js" } })).unwrap();
    let b = Overlay::from_json(json!({ "plugins": [{ "name": "html" }] })).unwrap();

    let stepwise = merge(&merge(&base, &a).unwrap(), &b).unwrap();
    let folded = merge(&base, &a.then(&b)).unwrap();
    assert_eq!(stepwise, folded);
    assert_eq!(stepwise.output.filename_template, "app.js");
}

#[test]
fn plugin_lists_concatenate_base_first() {
    let base = sample_descriptor();
    let overlay = Overlay::from_json(json!({
        "resolve": { "extensions": [".vue"] },
        "plugins": [{ "name": "hot-module-replacement" }]
    }))
    .unwrap();

    let merged = merge(&base, &overlay).unwrap();
    assert_eq!(merged.resolve.extensions, vec![".js", ".vue"]);
    let names: Vec<_> = merged.plugins.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["define", "hot-module-replacement"]);
}

#[test]
fn explicit_null_clears_and_omission_inherits() {
    let base = sample_descriptor();

    let inherited = merge(&base, &Overlay::from_json(json!({ "output": {} })).unwrap()).unwrap();
    assert_eq!(inherited.devtool.as_deref(), Some("source-map"));
    assert_eq!(inherited.output.public_path_template.as_deref(), Some("/"));

    let cleared = merge(
        &base,
        &Overlay::from_json(json!({ "devtool": null, "output": { "publicPathTemplate": null } }))
            .unwrap(),
    )
    .unwrap();
    assert_eq!(cleared.devtool, None);
    assert_eq!(cleared.output.public_path_template, None);
}

#[test]
fn entry_shape_change_replaces() {
    let base = sample_descriptor();
    let overlay =
        Overlay::from_json(json!({ "entry": { "app": ["./hot", "./src/main.js"] } })).unwrap();
    let merged = merge(&base, &overlay).unwrap();
    assert_eq!(
        merged.entry["app"],
        Entry::Many(vec!["./hot".into(), "./src/main.js".into()])
    );
}
