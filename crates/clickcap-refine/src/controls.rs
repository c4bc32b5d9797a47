use serde::{Deserialize, Serialize};

/// Sentiment the rewritten caption should carry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    /// Upbeat phrasing.
    Positive,
    /// Neutral phrasing.
    #[default]
    Natural,
    /// Downbeat phrasing.
    Negative,
}

/// Style controls consumed by the refiner.
///
/// # Examples
///
/// ```
/// use clickcap_refine::{Controls, Sentiment};
///
/// let controls = Controls {
///     length: Some(30),
///     sentiment: Sentiment::Positive,
///     ..Default::default()
/// };
/// assert_eq!(controls.language, "English");
/// assert!(!controls.imagination);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controls {
    /// Word budget for the rewritten caption.
    #[serde(default)]
    pub length: Option<usize>,
    /// Sentiment of the rewritten caption.
    #[serde(default)]
    pub sentiment: Sentiment,
    /// Output language.
    #[serde(default = "default_language")]
    pub language: String,
    /// Whether the model may embellish beyond the given facts.
    #[serde(default)]
    pub imagination: bool,
}

fn default_language() -> String {
    "English".to_string()
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            length: None,
            sentiment: Sentiment::Natural,
            language: default_language(),
            imagination: false,
        }
    }
}
