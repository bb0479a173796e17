pub mod language;

use lingua::LanguageDetector;
use regex::Regex;

pub use language::{engine_code_for, UNKNOWN_TAG};

/// A contiguous span of input text attributed to a single detected language.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageBlock {
    pub text: String,
    pub language_tag: String,
}

/// Splits cleaned input text into language-homogeneous, word-count-bounded
/// blocks. Chunks shorter than `min_words` are merged before detection runs,
/// because detection on tiny fragments is unreliable.
pub struct Segmenter {
    detector: LanguageDetector,
    sentence_re: Regex,
    word_re: Regex,
    min_words: usize,
}

pub const DEFAULT_MIN_WORDS: usize = 5;

impl Segmenter {
    pub fn new(min_words: usize) -> Self {
        Self {
            detector: language::build_detector(),
            // Runs of characters up to and including strong punctuation,
            // plus a trailing remainder with no terminal punctuation.
            sentence_re: Regex::new(r"(?s).*?[.!?;:…]+(?:\s+|$)|.+$").unwrap(),
            word_re: Regex::new(r"\b\w+\b").unwrap(),
            min_words,
        }
    }

    /// Normalize raw input: drop blank lines, trim each line, join with
    /// single spaces. Whitespace collapse only, no semantic rewriting.
    pub fn clean_text(text: &str) -> String {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn count_words(&self, text: &str) -> usize {
        self.word_re.find_iter(text).count()
    }

    /// Split normalized text into ordered language blocks. Adjacent blocks
    /// never share a tag, and block order equals text order.
    pub fn split(&self, text: &str) -> Vec<LanguageBlock> {
        let prepared = self.prepare_chunks(text);

        let mut blocks: Vec<LanguageBlock> = Vec::new();
        let mut last_tag: Option<String> = None;
        let mut current: Vec<String> = Vec::new();

        for chunk in prepared {
            let tag = language::detect_tag(&self.detector, &chunk);
            match &last_tag {
                Some(last) if *last != tag => {
                    blocks.push(LanguageBlock {
                        text: current.join(" "),
                        language_tag: last.clone(),
                    });
                    current = vec![chunk];
                }
                _ => current.push(chunk),
            }
            last_tag = Some(tag);
        }

        if let (Some(tag), false) = (last_tag, current.is_empty()) {
            blocks.push(LanguageBlock {
                text: current.join(" "),
                language_tag: tag,
            });
        }

        blocks
    }

    /// Stage before language detection: sentences accumulated until each
    /// chunk reaches `min_words`. A short leftover is appended to the
    /// previous chunk when one exists.
    pub fn prepare_chunks(&self, text: &str) -> Vec<String> {
        let sentences: Vec<&str> = self
            .sentence_re
            .find_iter(text)
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty())
            .collect();

        let mut prepared: Vec<String> = Vec::new();
        let mut buf = String::new();
        for sentence in sentences {
            if buf.is_empty() {
                buf.push_str(sentence);
            } else {
                buf.push(' ');
                buf.push_str(sentence);
            }
            if self.count_words(&buf) >= self.min_words {
                prepared.push(std::mem::take(&mut buf));
            }
        }
        if !buf.is_empty() {
            match prepared.last_mut() {
                Some(last) if self.count_words(&buf) < self.min_words => {
                    last.push(' ');
                    last.push_str(&buf);
                }
                _ => prepared.push(buf),
            }
        }
        prepared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clean_text_collapses_lines() {
        let input = "  First line.  \n\n  Second line.\n\t\nThird.";
        assert_eq!(
            Segmenter::clean_text(input),
            "First line. Second line. Third."
        );
    }

    #[test]
    fn test_count_words_unicode() {
        let seg = Segmenter::new(DEFAULT_MIN_WORDS);
        assert_eq!(seg.count_words("héllo wörld, c'est déjà ça"), 6);
        assert_eq!(seg.count_words(""), 0);
    }

    #[test]
    fn test_five_one_word_sentences_make_one_chunk() {
        let seg = Segmenter::new(5);
        let chunks = seg.prepare_chunks("One. Two. Three. Four. Five.");
        assert_eq!(chunks, vec!["One. Two. Three. Four. Five.".to_string()]);
    }

    #[test]
    fn test_short_leftover_merges_into_previous_chunk() {
        let seg = Segmenter::new(5);
        let chunks = seg.prepare_chunks("Alpha beta gamma delta epsilon. Tail.");
        assert_eq!(
            chunks,
            vec!["Alpha beta gamma delta epsilon. Tail.".to_string()]
        );
    }

    #[test]
    fn test_short_text_without_previous_chunk_stands_alone() {
        let seg = Segmenter::new(5);
        let chunks = seg.prepare_chunks("Just two.");
        assert_eq!(chunks, vec!["Just two.".to_string()]);
    }

    #[test]
    fn test_remainder_without_punctuation_is_kept() {
        let seg = Segmenter::new(5);
        let chunks = seg.prepare_chunks("A full sentence lives right here. trailing words no stop");
        let joined = chunks.join(" ");
        assert!(joined.ends_with("trailing words no stop"));
    }

    #[test]
    fn test_split_single_language_yields_one_block() {
        let seg = Segmenter::new(5);
        let text = "The weather is lovely today. We should go for a long walk in the park.";
        let blocks = seg.split(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language_tag, "en");
        assert_eq!(blocks[0].text, text);
    }

    #[test]
    fn test_split_reconstructs_normalized_text() {
        let seg = Segmenter::new(5);
        let text = "Good morning everyone, welcome aboard! Bonjour à tous, bienvenue à bord du train. Nous partirons dans quelques minutes. Please keep your tickets ready for inspection.";
        let blocks = seg.split(text);
        let reconstructed = blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(reconstructed, text);
    }

    #[test]
    fn test_split_no_adjacent_blocks_share_tag() {
        let seg = Segmenter::new(5);
        let text = "The quick brown fox jumps over the lazy dog. Le rapide renard brun saute par-dessus le chien paresseux du village. The story continues in plain English for a while longer.";
        let blocks = seg.split(text);
        for pair in blocks.windows(2) {
            assert_ne!(pair[0].language_tag, pair[1].language_tag);
        }
    }

    #[test]
    fn test_split_empty_text_yields_nothing() {
        let seg = Segmenter::new(5);
        assert!(seg.split("").is_empty());
    }
}
