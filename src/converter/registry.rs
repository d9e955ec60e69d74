//!
//! Ordered converter registry.
//!
//! Built once at startup and shared with the request path by handle. Selection
//! walks the list front to back, so more specific families must come before
//! general ones (Qwen3-Coder before Qwen3). Passthrough is always last.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use serde_json::Value;

use super::format::ToolCallFormat;
use super::sanitizer::ContentSanitizer;

/* --- types ----------------------------------------------------------------------------------- */

///
/// Converter registry with the sanitizer settings shared by all converters.
#[derive(Debug, Clone)]
pub struct ConverterRegistry {
    /** formats in selection order, Passthrough last */
    formats: Vec<ToolCallFormat>,
    /** think-tag cleanup applied after markup removal */
    sanitizer: ContentSanitizer,
}

/* --- constants ------------------------------------------------------------------------------ */

/** Default selection order, most specific family first */
pub const DEFAULT_ORDER: [ToolCallFormat; 7] = [
    ToolCallFormat::Qwen3Coder,
    ToolCallFormat::Qwen3,
    ToolCallFormat::Devstral,
    ToolCallFormat::Glm,
    ToolCallFormat::Claude,
    ToolCallFormat::OpenAi,
    ToolCallFormat::Passthrough,
];

/* --- start of code -------------------------------------------------------------------------- */

impl ConverterRegistry {
    ///
    /// Registry with the default family order.
    pub fn new(sanitizer: ContentSanitizer) -> Self {
        Self::with_formats(DEFAULT_ORDER, sanitizer)
    }

    ///
    /// Registry with a caller-chosen order.
    ///
    /// Passthrough is moved to (or appended at) the end whatever the input says.
    pub fn with_formats(formats: impl IntoIterator<Item = ToolCallFormat>, sanitizer: ContentSanitizer) -> Self {
        let mut ordered: Vec<ToolCallFormat> = Vec::new();
        for format in formats {
            if format != ToolCallFormat::Passthrough && !ordered.contains(&format) {
                ordered.push(format);
            }
        }
        ordered.push(ToolCallFormat::Passthrough);
        Self { formats: ordered, sanitizer }
    }

    ///
    /// Add a format just before Passthrough.
    ///
    /// A format already present is moved rather than duplicated.
    pub fn register(&mut self, format: ToolCallFormat) {
        let at = self.formats.len() - 1;
        self.register_at(at, format);
    }

    ///
    /// Insert a format at `index`, clamped so Passthrough stays last.
    pub fn register_at(&mut self, index: usize, format: ToolCallFormat) {
        if format == ToolCallFormat::Passthrough {
            return;
        }
        self.formats.retain(|f| *f != format);
        let at = index.min(self.formats.len() - 1);
        self.formats.insert(at, format);
        tracing::debug!("Registered {} converter at position {}", format, at);
    }

    pub fn formats(&self) -> &[ToolCallFormat] {
        &self.formats
    }

    pub fn sanitizer(&self) -> ContentSanitizer {
        self.sanitizer
    }

    ///
    /// Select the converter for a model name.
    ///
    /// An empty name goes straight to Passthrough without probing.
    pub fn select(&self, model: &str) -> ToolCallFormat {
        if model.is_empty() {
            return ToolCallFormat::Passthrough;
        }
        let selected =
            self.formats.iter().copied().find(|f| f.matches(model)).unwrap_or(ToolCallFormat::Passthrough);
        tracing::debug!("Model '{}' uses the {} converter", model, selected);
        selected
    }

    ///
    /// The `model` field of a response body, when it is a non-empty string.
    pub fn detect_model<'a>(&self, body: &'a Value) -> Option<&'a str> {
        body.get("model").and_then(Value::as_str).filter(|m| !m.is_empty())
    }

    ///
    /// Every model pattern in selection order, paired with its format.
    pub fn supported_models(&self) -> Vec<(ToolCallFormat, &'static str)> {
        self.formats
            .iter()
            .flat_map(|format| format.model_patterns().iter().map(move |pattern| (*format, *pattern)))
            .collect()
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new(ContentSanitizer::default())
    }
}

/* --- tests ----------------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_by_family() {
        let registry = ConverterRegistry::default();
        assert_eq!(registry.select("glm-4.5-air"), ToolCallFormat::Glm);
        assert_eq!(registry.select("qwen3-coder-30b"), ToolCallFormat::Qwen3Coder);
        assert_eq!(registry.select("Qwen3-8B"), ToolCallFormat::Qwen3);
        assert_eq!(registry.select("jan-nano-128k"), ToolCallFormat::Qwen3);
        assert_eq!(registry.select("mistralai/devstral-small"), ToolCallFormat::Devstral);
        assert_eq!(registry.select("claude-3-5-sonnet"), ToolCallFormat::Claude);
        assert_eq!(registry.select("gpt-4o-mini"), ToolCallFormat::OpenAi);
        assert_eq!(registry.select("llama-3.1-8b"), ToolCallFormat::Passthrough);
        assert_eq!(registry.select(""), ToolCallFormat::Passthrough);
    }

    #[test]
    fn test_general_format_first_shadows_specific_one() {
        let registry = ConverterRegistry::with_formats(
            [ToolCallFormat::Qwen3, ToolCallFormat::Qwen3Coder],
            ContentSanitizer::default(),
        );
        assert_eq!(registry.select("qwen3-coder-30b"), ToolCallFormat::Qwen3);
    }

    #[test]
    fn test_passthrough_always_last() {
        let mut registry = ConverterRegistry::with_formats(
            [ToolCallFormat::Passthrough, ToolCallFormat::Glm],
            ContentSanitizer::default(),
        );
        assert_eq!(registry.formats(), &[ToolCallFormat::Glm, ToolCallFormat::Passthrough]);

        registry.register(ToolCallFormat::Devstral);
        registry.register_at(99, ToolCallFormat::Claude);
        registry.register_at(0, ToolCallFormat::Passthrough);
        assert_eq!(
            registry.formats(),
            &[ToolCallFormat::Glm, ToolCallFormat::Devstral, ToolCallFormat::Claude, ToolCallFormat::Passthrough]
        );
    }

    #[test]
    fn test_register_at_moves_existing_format() {
        let mut registry = ConverterRegistry::default();
        registry.register_at(0, ToolCallFormat::Glm);
        assert_eq!(registry.formats()[0], ToolCallFormat::Glm);
        assert_eq!(registry.formats().len(), DEFAULT_ORDER.len());
    }

    #[test]
    fn test_detect_model() {
        let registry = ConverterRegistry::default();
        assert_eq!(registry.detect_model(&json!({"model": "glm-4"})), Some("glm-4"));
        assert_eq!(registry.detect_model(&json!({"model": ""})), None);
        assert_eq!(registry.detect_model(&json!({"choices": []})), None);
    }

    #[test]
    fn test_supported_models_follow_selection_order() {
        let registry = ConverterRegistry::default();
        let models = registry.supported_models();
        assert_eq!(models.first(), Some(&(ToolCallFormat::Qwen3Coder, ".*qwen3[-_]coder.*")));
        assert!(models.iter().all(|(format, _)| *format != ToolCallFormat::Passthrough));
    }
}
