// Black-box tests of text segmentation: cleaning, chunking and
// language-block assembly as seen through the public API.

use kokoro_backend::domain::segment::{Segmenter, DEFAULT_MIN_WORDS, UNKNOWN_TAG};
use pretty_assertions::assert_eq;

fn segmenter() -> Segmenter {
    Segmenter::new(DEFAULT_MIN_WORDS)
}

#[test]
fn cleaning_preserves_sentence_text() {
    let raw = "  First line.  \n\n   Second line!\n\tThird?  ";
    assert_eq!(
        Segmenter::clean_text(raw),
        "First line. Second line! Third?"
    );
}

#[test]
fn blocks_cover_the_whole_input_in_order() {
    let text = Segmenter::clean_text(
        "The quick brown fox jumps over the lazy dog. \
         It was the best of times, it was the worst of times. \
         All happy families are alike in their own way.",
    );
    let blocks = segmenter().split(&text);

    assert!(!blocks.is_empty());
    let rebuilt = blocks
        .iter()
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    assert_eq!(rebuilt, text);
}

#[test]
fn adjacent_blocks_always_differ_in_language() {
    let text = "This is a plain English sentence about the weather today. \
                Hoy hace mucho calor en la ciudad y vamos a la playa. \
                The afternoon was long and quiet in the old house.";
    let blocks = segmenter().split(&Segmenter::clean_text(text));

    for pair in blocks.windows(2) {
        assert_ne!(pair[0].language_tag, pair[1].language_tag);
    }
}

#[test]
fn single_language_text_is_one_block() {
    let text = "The meeting starts at nine in the morning. \
                Please bring the quarterly report with you. \
                Coffee will be served in the main hall.";
    let blocks = segmenter().split(&Segmenter::clean_text(text));

    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].language_tag, "en");
}

#[test]
fn tiny_fragments_are_coalesced_before_detection() {
    // Ten one-word sentences; none reaches the word minimum alone, so
    // they must merge rather than produce ten unreliable detections
    let text = "One. Two. Three. Four. Five. Six. Seven. Eight. Nine. Ten.";
    let chunks = segmenter().prepare_chunks(text);

    assert_eq!(chunks.len(), 2);
    for chunk in &chunks {
        assert!(segmenter().count_words(chunk) >= DEFAULT_MIN_WORDS);
    }
}

#[test]
fn trailing_short_fragment_merges_backward() {
    let text = "The quick brown fox jumps over the lazy sleeping dog. Yes.";
    let chunks = segmenter().prepare_chunks(text);

    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].ends_with("Yes."));
}

#[test]
fn text_without_terminal_punctuation_is_not_dropped() {
    let text = "a trailing remainder with no punctuation at all";
    let blocks = segmenter().split(text);

    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].text, text);
}

#[test]
fn empty_and_blank_input_yield_no_blocks() {
    assert!(segmenter().split("").is_empty());
    assert!(segmenter().split("   \n \t ").is_empty());
}

#[test]
fn nondetectable_text_gets_the_unknown_tag() {
    // Digits and punctuation only: lingua has nothing to work with
    let blocks = segmenter().split("12345 67890 24680 13579 11111.");
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].language_tag, UNKNOWN_TAG);
}
