//! oxc-backed JavaScript minifier.

use std::collections::HashSet;

use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::semantic::Scoping;
use oxc::span::SourceType;

use crate::cache::NameCache;
use crate::traits::{Minify, MinifyError, MinifyOptions};

/// Minifier using oxc for compression, nested-scope mangling and codegen.
///
/// Scripts are parsed as classic (non-module) scripts, so top-level bindings
/// are globals and are only renamed through the shared [`NameCache`].
#[derive(Debug, Default)]
pub struct OxcMinifier;

impl OxcMinifier {
    /// Create a new oxc minifier.
    pub fn new() -> Self {
        Self
    }
}

impl Minify for OxcMinifier {
    fn name(&self) -> &'static str {
        "oxc"
    }

    fn minify(&self, source: &str, options: &MinifyOptions) -> Result<String, MinifyError> {
        let allocator = Allocator::default();
        let source_type = SourceType::default();

        let ret = Parser::new(&allocator, source, source_type).parse();
        if let Some(first) = ret.errors.first() {
            return Err(MinifyError::ParseError {
                count: ret.errors.len(),
                message: first.to_string(),
            });
        }
        if ret.panicked {
            return Err(MinifyError::Panicked);
        }

        let mut program = ret.program;
        let minifier_options = MinifierOptions {
            // Root-scope names are renamed through the cache, never by oxc.
            mangle: Some(MangleOptions {
                top_level: Some(false),
                ..MangleOptions::default()
            }),
            compress: Some(CompressOptions::smallest()),
        };
        let ret = Minifier::new(minifier_options).minify(&allocator, &mut program);

        let mut scoping = ret.scoping;
        if options.mangle_top_level {
            if let Some(scoping) = scoping.as_mut() {
                let renamed = mangle_top_level(scoping, &options.name_cache);
                tracing::debug!("Mangled {} top-level bindings", renamed);
            }
        }

        let code = Codegen::new()
            .with_options(CodegenOptions {
                minify: true,
                comments: CommentOptions::disabled(),
                ..CodegenOptions::default()
            })
            .with_scoping(scoping)
            .build(&program)
            .code;

        Ok(code)
    }
}

/// Rename root-scope bindings through the shared cache.
///
/// Returns the number of bindings renamed.
fn mangle_top_level(scoping: &mut Scoping, cache: &NameCache) -> usize {
    let mut taken: HashSet<String> = scoping.symbol_names().map(str::to_string).collect();
    taken.extend(
        scoping
            .root_unresolved_references()
            .keys()
            .map(|name| name.to_string()),
    );

    let root = scoping.root_scope_id();
    let mut bindings: Vec<_> = scoping
        .get_bindings(root)
        .values()
        .map(|&symbol_id| (scoping.symbol_name(symbol_id).to_string(), symbol_id))
        .collect();
    bindings.sort_by(|a, b| a.0.cmp(&b.0));

    let mut renamed = 0;
    for (original, symbol_id) in bindings {
        if let Some(mangled) = cache.resolve(&original, &taken) {
            if mangled != original {
                scoping.set_symbol_name(symbol_id, mangled.as_str().into());
                renamed += 1;
            }
        }
    }

    renamed
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHART_SCRIPT: &str = r#"
function renderChart(target) {
    target.textContent = 'chart';
}
renderChart(document.body);
renderChart(document.head);
"#;

    #[test]
    fn minifies_script() {
        let source = "// comment\nconsole.log( 'hello' ,  'world' );\n";

        let minified = OxcMinifier::new()
            .minify(source, &MinifyOptions::default())
            .unwrap();

        assert!(minified.contains("console.log"));
        assert!(!minified.contains("comment"));
        assert!(minified.len() < source.len());
    }

    #[test]
    fn reports_parse_errors() {
        let result = OxcMinifier::new().minify("function (", &MinifyOptions::default());

        assert!(matches!(result, Err(MinifyError::ParseError { .. })));
    }

    #[test]
    fn mangles_top_level_through_cache() {
        let options = MinifyOptions::default();

        let minified = OxcMinifier::new().minify(CHART_SCRIPT, &options).unwrap();

        let mangled = options.name_cache.get("renderChart").unwrap();
        assert!(!minified.contains("renderChart"));
        assert!(minified.contains(&format!("function {}(", mangled)));
    }

    #[test]
    fn shared_cache_keeps_manglings_consistent() {
        let options = MinifyOptions::default();
        let minifier = OxcMinifier::new();

        let first = minifier.minify(CHART_SCRIPT, &options.clone()).unwrap();
        let second = minifier.minify(CHART_SCRIPT, &options.clone()).unwrap();

        assert_eq!(first, second);
        assert_eq!(options.name_cache.len(), 1);
    }

    #[test]
    fn distinct_top_level_names_get_distinct_cache_entries() {
        let options = MinifyOptions::default();
        let minifier = OxcMinifier::new();

        let first = minifier
            .minify("function alpha(x){x.id=1}alpha(document.body);", &options)
            .unwrap();
        let second = minifier
            .minify("function beta(x){x.id=2}beta(document.body);", &options)
            .unwrap();

        let alpha = options.name_cache.get("alpha").unwrap();
        let beta = options.name_cache.get("beta").unwrap();
        assert_ne!(alpha, beta);
        assert!(first.contains(&format!("function {}(", alpha)));
        assert!(second.contains(&format!("function {}(", beta)));
        assert_eq!(options.name_cache.len(), 2);
    }

    #[test]
    fn keeps_top_level_vars_as_globals() {
        let options = MinifyOptions::default();

        let minified = OxcMinifier::new()
            .minify("var chart = 1;\nvar other = chart + 1;\nconsole.log(other);", &options)
            .unwrap();

        assert!(options.name_cache.get("chart").is_some());
        assert!(options.name_cache.get("other").is_some());
        assert!(minified.contains("var "));
        assert!(!minified.contains("console.log(2)"));
    }

    #[test]
    fn keeps_top_level_names_without_mangling() {
        let options = MinifyOptions {
            mangle_top_level: false,
            ..Default::default()
        };

        let minified = OxcMinifier::new().minify(CHART_SCRIPT, &options).unwrap();

        assert!(minified.contains("renderChart"));
        assert!(options.name_cache.is_empty());
    }
}
