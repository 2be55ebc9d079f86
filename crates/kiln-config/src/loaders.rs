//! Style transform chains for standalone style files and single-file
//! components.
//!
//! Every chain is `normalize-css → [preprocess] → extract-or-inline`. The
//! extract flag is taken once from [`StyleOptions`] so all rules built from
//! the same options agree on it.

use indexmap::IndexMap;
use serde_json::{json, Value};

use crate::environment::Environment;
use crate::pipeline::{PipelineRule, StyleOutput, TransformKind, TransformStep};

/// Runtime injector used when styles are inlined (and as the extract fallback).
pub const STYLE_INJECTOR: &str = "vue-style-loader";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StyleOptions {
    pub source_map: bool,
    pub extract: bool,
    pub minimize: bool,
}

impl StyleOptions {
    /// Extraction and minification only happen for production.
    pub fn for_environment(environment: Environment, source_map: bool) -> Self {
        Self {
            source_map,
            extract: environment == Environment::Production,
            minimize: !environment.is_debug(),
        }
    }

    pub fn output(&self) -> StyleOutput {
        StyleOutput::from_extract(self.extract)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleLang {
    Css,
    Postcss,
    Less,
    Sass,
    Scss,
    Stylus,
    Styl,
}

impl StyleLang {
    pub const ALL: [StyleLang; 7] = [
        StyleLang::Css,
        StyleLang::Postcss,
        StyleLang::Less,
        StyleLang::Sass,
        StyleLang::Scss,
        StyleLang::Stylus,
        StyleLang::Styl,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            StyleLang::Css => "css",
            StyleLang::Postcss => "postcss",
            StyleLang::Less => "less",
            StyleLang::Sass => "sass",
            StyleLang::Scss => "scss",
            StyleLang::Stylus => "stylus",
            StyleLang::Styl => "styl",
        }
    }

    /// Preprocessor dialect and whether it uses the indented syntax.
    fn preprocessor(self) -> Option<(&'static str, bool)> {
        match self {
            StyleLang::Css | StyleLang::Postcss => None,
            StyleLang::Less => Some(("less", false)),
            StyleLang::Sass => Some(("sass", true)),
            StyleLang::Scss => Some(("sass", false)),
            StyleLang::Stylus | StyleLang::Styl => Some(("stylus", false)),
        }
    }
}

fn style_chain(lang: StyleLang, options: &StyleOptions) -> Vec<TransformStep> {
    let mut steps = vec![TransformStep::new(TransformKind::NormalizeCss)
        .with_option("sourceMap", options.source_map)
        .with_option("minimize", options.minimize)];

    if let Some((dialect, indented)) = lang.preprocessor() {
        let mut step = TransformStep::new(TransformKind::Preprocess {
            lang: dialect.to_string(),
        })
        .with_option("sourceMap", options.source_map);
        if indented {
            step = step.with_option("indentedSyntax", true);
        }
        steps.push(step);
    }

    let terminal = TransformStep::new(TransformKind::ExtractOrInline {
        mode: options.output(),
    });
    steps.push(match options.output() {
        StyleOutput::Extract => terminal.with_option("fallback", STYLE_INJECTOR),
        StyleOutput::Inline => terminal.with_option("injector", STYLE_INJECTOR),
    });
    steps
}

/// Transform chains keyed by style language.
pub fn css_loaders(options: &StyleOptions) -> IndexMap<StyleLang, Vec<TransformStep>> {
    StyleLang::ALL
        .iter()
        .map(|lang| (*lang, style_chain(*lang, options)))
        .collect()
}

/// One rule per style language, matching `\.<ext>$`.
pub fn style_rules(options: &StyleOptions) -> IndexMap<StyleLang, PipelineRule> {
    css_loaders(options)
        .into_iter()
        .map(|(lang, steps)| {
            let test = format!(r"\.{}$", lang.extension());
            (lang, PipelineRule::new(test, steps))
        })
        .collect()
}

/// [`style_rules`] flattened in declaration order.
pub fn style_rule_list(options: &StyleOptions) -> Vec<PipelineRule> {
    style_rules(options).into_values().collect()
}

/// Options handed to the single-file-component transform.
pub fn sfc_options(options: &StyleOptions) -> Value {
    let loaders: serde_json::Map<String, Value> = css_loaders(options)
        .into_iter()
        .map(|(lang, steps)| {
            let steps = serde_json::to_value(steps).unwrap_or(Value::Null);
            (lang.extension().to_string(), steps)
        })
        .collect();

    json!({
        "loaders": loaders,
        "transformToRequire": {
            "video": "src",
            "source": "src",
            "img": "src",
            "image": "xlink:href",
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_every_language_in_order() {
        let rules = style_rules(&StyleOptions::default());
        let exts: Vec<_> = rules.keys().map(|l| l.extension()).collect();
        assert_eq!(exts, vec!["css", "postcss", "less", "sass", "scss", "stylus", "styl"]);
        assert_eq!(rules[&StyleLang::Less].test, r"\.less$");
    }

    #[test]
    fn inline_rules_end_with_injection() {
        let options = StyleOptions {
            source_map: true,
            extract: false,
            minimize: false,
        };
        for rule in style_rule_list(&options) {
            assert_eq!(rule.style_output(), Some(StyleOutput::Inline));
        }
    }

    #[test]
    fn extracted_rules_end_with_artifact_step() {
        let options = StyleOptions {
            source_map: false,
            extract: true,
            minimize: true,
        };
        for rule in style_rule_list(&options) {
            assert_eq!(rule.style_output(), Some(StyleOutput::Extract));
        }
    }

    #[test]
    fn chain_order_is_normalize_preprocess_terminal() {
        let options = StyleOptions::default();
        let chain = &css_loaders(&options)[&StyleLang::Sass];
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[0].kind, TransformKind::NormalizeCss);
        assert_eq!(
            chain[1].kind,
            TransformKind::Preprocess {
                lang: "sass".to_string()
            }
        );
        assert_eq!(chain[1].options["indentedSyntax"], true);
        assert!(matches!(chain[2].kind, TransformKind::ExtractOrInline { .. }));

        let plain = &css_loaders(&options)[&StyleLang::Css];
        assert_eq!(plain.len(), 2);
    }

    #[test]
    fn scss_is_not_indented() {
        let chain = &css_loaders(&StyleOptions::default())[&StyleLang::Scss];
        assert!(!chain[1].options.contains_key("indentedSyntax"));
    }

    #[test]
    fn environment_decides_extraction() {
        assert!(StyleOptions::for_environment(Environment::Production, false).extract);
        assert!(!StyleOptions::for_environment(Environment::Development, true).extract);
        assert!(!StyleOptions::for_environment(Environment::Testing, true).extract);
    }

    #[test]
    fn sfc_options_share_the_extract_flag() {
        let options = StyleOptions::for_environment(Environment::Production, false);
        let sfc = sfc_options(&options);
        let less = sfc["loaders"]["less"].as_array().unwrap();
        assert_eq!(less.last().unwrap()["kind"]["mode"], "extract");
        assert_eq!(sfc["transformToRequire"]["image"], "xlink:href");
    }
}
