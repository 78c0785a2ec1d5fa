//! wasm-bindgen exports.
//!
//! This module exposes the type stripper to JavaScript via `wasm-bindgen`.
//! The underlying logic lives in the `mints` crate.

use wasm_bindgen::prelude::*;

use mints::{StripConfig as StripConfigInner, span::LineIndex};

/// Configuration options for type stripping.
#[derive(Debug, Clone, Copy, Default, serde::Deserialize, tsify::Tsify)]
#[tsify(from_wasm_abi)]
pub struct StripConfig {
    /// Emit `const enum` declarations as regular enums instead of inlining them
    #[serde(default)]
    pub preserve_const_enums: bool,
    /// Keep type-only exports as comments
    #[serde(default)]
    pub preserve_exports: bool,
    /// Keep ordinary comments
    #[serde(default)]
    pub preserve_comments: bool,
    /// Keep `@ts-ignore` / `@ts-expect-error` comments
    #[serde(default)]
    pub preserve_ts_ignore: bool,
}

impl From<StripConfig> for StripConfigInner {
    fn from(val: StripConfig) -> Self {
        StripConfigInner {
            preserve_const_enums: val.preserve_const_enums,
            preserve_exports: val.preserve_exports,
            preserve_comments: val.preserve_comments,
            preserve_ts_ignore: val.preserve_ts_ignore,
        }
    }
}

/// A warning raised while stripping.
#[derive(Debug, Clone, serde::Serialize, tsify::Tsify)]
pub struct Diagnostic {
    /// Stable kind code, e.g. `parse-error`.
    pub code: String,
    pub message: String,
    /// Start byte offset in the input.
    pub start: usize,
    /// End byte offset in the input.
    pub end: usize,
    /// One-based line of `start`.
    pub line: usize,
    /// One-based byte column of `start`.
    pub column: usize,
}

/// Output from the wasm API.
#[derive(Debug, Clone, serde::Serialize, tsify::Tsify)]
#[tsify(into_wasm_abi)]
pub struct TransformOutput {
    /// The stripped JavaScript source.
    pub code: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// Strip TypeScript syntax from `code`.
#[wasm_bindgen]
pub fn transform(code: String, config: StripConfig) -> Result<TransformOutput, JsValue> {
    console_error_panic_hook::set_once();

    let res = mints::transform(&code, &config.into())
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    let index = LineIndex::new(&code);
    let diagnostics = res
        .diagnostics
        .iter()
        .map(|d| {
            let (line, column) = index.line_col(d.span.start);
            Diagnostic {
                code: d.kind.code().to_string(),
                message: d.message.clone(),
                start: d.span.start,
                end: d.span.end,
                line: line + 1,
                column: column + 1,
            }
        })
        .collect();
    Ok(TransformOutput {
        code: res.code,
        diagnostics,
    })
}
