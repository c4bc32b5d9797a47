//! Best-effort knowledge lookup for caption subjects.

use serde::Deserialize;

use crate::error::RefineError;

const SUMMARY_ENDPOINT: &str = "https://en.wikipedia.org/api/rest_v1/page/summary";

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "of", "with", "on", "in", "and", "or", "is", "are", "there", "this", "that",
    "its", "it", "at", "to", "next", "near", "by", "over", "under",
];

/// Pick the lookup subject out of a caption.
///
/// The word following the first article wins; when the caption has no
/// article, the longest content word does. Purely heuristic, good enough
/// for a best-effort lookup.
pub fn caption_subject(caption: &str) -> String {
    let words: Vec<String> = caption
        .split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect();

    for (i, word) in words.iter().enumerate() {
        if matches!(word.as_str(), "a" | "an" | "the") && i + 1 < words.len() {
            return words[i + 1].clone();
        }
    }

    words
        .iter()
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .max_by_key(|w| w.len())
        .cloned()
        .unwrap_or_default()
}

#[derive(Deserialize)]
struct Summary {
    extract: Option<String>,
}

/// Fetch the Wikipedia summary extract for a title.
///
/// A missing article returns `Ok(None)`; only transport failures are errors.
pub fn lookup_summary(
    client: &reqwest::blocking::Client,
    title: &str,
) -> Result<Option<String>, RefineError> {
    if title.is_empty() {
        return Ok(None);
    }

    let response = client
        .get(format!("{SUMMARY_ENDPOINT}/{title}"))
        .send()?;
    if !response.status().is_success() {
        log::debug!("no wiki summary for {title:?}");
        return Ok(None);
    }

    let summary: Summary = response.json()?;
    Ok(summary.extract)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_follows_the_first_article() {
        assert_eq!(caption_subject("a man riding a horse"), "man");
        assert_eq!(caption_subject("The Eiffel Tower at night"), "eiffel");
    }

    #[test]
    fn subject_falls_back_to_the_longest_content_word() {
        assert_eq!(caption_subject("red bicycle leaning on wall"), "bicycle");
    }

    #[test]
    fn subject_of_empty_caption_is_empty() {
        assert_eq!(caption_subject(""), "");
        assert_eq!(caption_subject("   "), "");
    }

    #[test]
    fn subject_strips_punctuation() {
        assert_eq!(caption_subject("a dog, sleeping."), "dog");
    }
}
