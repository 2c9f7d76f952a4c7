//! Model identifier classification.

use workbench_core::ProviderKind;

/// Prefix marking the hosted Gemini family.
const GEMINI_MARKER: &str = "gemini";

/// A model identifier tagged with the provider it routes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelRoute {
    Gemini(String),
    /// Hosted catalog keyed by the full `vendor/model` string.
    OpenRouter(String),
    Local(String),
}

impl ModelRoute {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Gemini(_) => ProviderKind::Gemini,
            Self::OpenRouter(_) => ProviderKind::OpenRouter,
            Self::Local(_) => ProviderKind::Local,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Self::Gemini(m) | Self::OpenRouter(m) | Self::Local(m) => m,
        }
    }
}

/// Classify a model identifier.
///
/// Rules, in order: a `gemini` prefix routes to Gemini; a `/` routes to
/// OpenRouter; anything else, including an empty identifier, routes to the
/// local server (using `default_model` when empty).
pub fn classify(model_id: Option<&str>, default_model: &str) -> ModelRoute {
    let model = model_id.map(str::trim).unwrap_or_default();

    if model.is_empty() {
        ModelRoute::Local(default_model.to_string())
    } else if model.starts_with(GEMINI_MARKER) {
        ModelRoute::Gemini(model.to_string())
    } else if model.contains('/') {
        ModelRoute::OpenRouter(model.to_string())
    } else {
        ModelRoute::Local(model.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: &str = "deepseek-r1:latest";

    #[test]
    fn test_gemini_prefix() {
        assert_eq!(
            classify(Some("gemini-1.5-flash"), DEFAULT),
            ModelRoute::Gemini("gemini-1.5-flash".into())
        );
    }

    #[test]
    fn test_prefix_wins_over_separator() {
        assert_eq!(classify(Some("gemini/pro"), DEFAULT).kind(), ProviderKind::Gemini);
    }

    #[test]
    fn test_catalog_model() {
        assert_eq!(
            classify(Some("deepseek/llama-3:free"), DEFAULT),
            ModelRoute::OpenRouter("deepseek/llama-3:free".into())
        );
        assert_eq!(
            classify(Some("google/gemini-pro"), DEFAULT).kind(),
            ProviderKind::OpenRouter
        );
    }

    #[test]
    fn test_local_model() {
        assert_eq!(
            classify(Some("llama3:latest"), DEFAULT),
            ModelRoute::Local("llama3:latest".into())
        );
    }

    #[test]
    fn test_empty_uses_default() {
        for empty in [None, Some(""), Some("   ")] {
            assert_eq!(classify(empty, DEFAULT), ModelRoute::Local(DEFAULT.into()));
        }
    }

    #[test]
    fn test_marker_is_case_sensitive() {
        assert_eq!(classify(Some("Gemini-pro"), DEFAULT).kind(), ProviderKind::Local);
    }
}
