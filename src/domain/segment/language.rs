use lingua::{Language, LanguageDetector, LanguageDetectorBuilder};

/// Tag used when detection fails; downstream maps it to the default engine code.
pub const UNKNOWN_TAG: &str = "unknown";

/// Languages the detector discriminates between. Kept aligned with the
/// engine codes the voice catalog can actually serve.
const DETECTABLE: [Language; 9] = [
    Language::English,
    Language::Spanish,
    Language::French,
    Language::German,
    Language::Italian,
    Language::Portuguese,
    Language::Hindi,
    Language::Japanese,
    Language::Chinese,
];

pub fn build_detector() -> LanguageDetector {
    LanguageDetectorBuilder::from_languages(&DETECTABLE).build()
}

/// Detect the language of a text fragment as an ISO 639-1 tag.
/// Detection failure degrades to [`UNKNOWN_TAG`], never an error.
pub fn detect_tag(detector: &LanguageDetector, text: &str) -> String {
    match detector.detect_language_of(text) {
        Some(language) => iso_tag(language).to_string(),
        None => UNKNOWN_TAG.to_string(),
    }
}

fn iso_tag(language: Language) -> &'static str {
    match language {
        Language::English => "en",
        Language::Spanish => "es",
        Language::French => "fr",
        Language::German => "de",
        Language::Italian => "it",
        Language::Portuguese => "pt",
        Language::Hindi => "hi",
        Language::Japanese => "ja",
        Language::Chinese => "zh",
    }
}

/// Map a detected ISO tag to the single-character engine language code.
/// Unsupported or unknown tags fall back to American English ('a'); the
/// warn log keeps genuinely unsupported input diagnosable.
pub fn engine_code_for(tag: &str) -> char {
    match tag {
        "en" => 'a',
        "en-gb" => 'b',
        "es" => 'e',
        "fr" => 'f',
        "hi" => 'h',
        "it" => 'i',
        "ja" => 'j',
        "pt" => 'p',
        "zh" | "zh-cn" | "zh-tw" => 'z',
        other => {
            tracing::warn!(tag = other, "No engine language for tag, using default");
            'a'
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_tag_english() {
        let detector = build_detector();
        let tag = detect_tag(
            &detector,
            "The quick brown fox jumps over the lazy dog near the river bank.",
        );
        assert_eq!(tag, "en");
    }

    #[test]
    fn test_detect_tag_french() {
        let detector = build_detector();
        let tag = detect_tag(
            &detector,
            "Le rapide renard brun saute par-dessus le chien paresseux.",
        );
        assert_eq!(tag, "fr");
    }

    #[test]
    fn test_engine_code_mapping() {
        assert_eq!(engine_code_for("en"), 'a');
        assert_eq!(engine_code_for("fr"), 'f');
        assert_eq!(engine_code_for("pt"), 'p');
        assert_eq!(engine_code_for("zh"), 'z');
    }

    #[test]
    fn test_unsupported_tags_use_default() {
        assert_eq!(engine_code_for("unknown"), 'a');
        assert_eq!(engine_code_for("bg"), 'a');
        assert_eq!(engine_code_for(""), 'a');
    }
}
