use std::sync::Arc;

use super::catalog::{Gender, VoiceCatalog, VoiceDescriptor};

/// Compiled-in fallback when the catalog is empty
pub const DEFAULT_VOICE: &str = "af_heart";
pub const DEFAULT_LANGUAGE: char = 'a';

/// A concrete voice choice: the asset to load and the engine language code
/// to synthesize with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVoice {
    pub voice: String,
    pub language: char,
}

/// Tiered lookup from (requested name, detected language, requested gender)
/// to a concrete voice asset. Honoring the language outranks honoring the
/// exact voice name: a comprehensible wrong speaker beats the right speaker
/// in the wrong language.
pub struct VoiceResolver {
    catalog: Arc<VoiceCatalog>,
}

impl VoiceResolver {
    pub fn new(catalog: Arc<VoiceCatalog>) -> Self {
        Self { catalog }
    }

    /// Never fails: the tiers degrade down to the first catalog entry, and
    /// finally to the compiled-in default when the catalog is empty.
    pub fn resolve(
        &self,
        requested: &str,
        language: char,
        gender: Option<Gender>,
    ) -> ResolvedVoice {
        let requested = requested.trim().to_lowercase();
        let voices = self.catalog.voices();

        // 1. name + language + gender (gender only if requested)
        if let Some(v) = voices.iter().find(|v| {
            v.name == requested
                && v.language == language
                && gender.map_or(true, |g| v.gender == g)
        }) {
            return Self::pick(v);
        }
        // 2. name + language
        if let Some(v) = voices
            .iter()
            .find(|v| v.name == requested && v.language == language)
        {
            return Self::pick(v);
        }
        // 3. language + gender
        if let Some(g) = gender {
            if let Some(v) = voices
                .iter()
                .find(|v| v.language == language && v.gender == g)
            {
                return Self::pick(v);
            }
        }
        // 4. language only
        if let Some(v) = voices.iter().find(|v| v.language == language) {
            return Self::pick(v);
        }
        // 5. first entry of the entire catalog
        if let Some(v) = self.catalog.first() {
            return Self::pick(v);
        }
        // 6. empty catalog
        ResolvedVoice {
            voice: DEFAULT_VOICE.to_string(),
            language: DEFAULT_LANGUAGE,
        }
    }

    fn pick(v: &VoiceDescriptor) -> ResolvedVoice {
        ResolvedVoice {
            voice: v.full_name.clone(),
            language: v.language,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn resolver(names: &[&str]) -> VoiceResolver {
        VoiceResolver::new(Arc::new(VoiceCatalog::from_names(names.iter().copied())))
    }

    #[test]
    fn test_exact_name_language_gender_match() {
        let r = resolver(&["ff_amelie", "fm_pierre"]);
        let resolved = r.resolve("amelie", 'f', Some(Gender::Female));
        assert_eq!(resolved.voice, "ff_amelie");
        assert_eq!(resolved.language, 'f');
    }

    #[test]
    fn test_name_and_language_ignores_gender_mismatch() {
        let r = resolver(&["fm_pierre"]);
        let resolved = r.resolve("pierre", 'f', Some(Gender::Female));
        assert_eq!(resolved.voice, "fm_pierre");
    }

    #[test]
    fn test_unknown_name_falls_to_language_and_gender() {
        let r = resolver(&["ff_amelie", "fm_pierre"]);
        let resolved = r.resolve("nobody", 'f', Some(Gender::Male));
        assert_eq!(resolved.voice, "fm_pierre");
    }

    #[test]
    fn test_unknown_name_no_gender_falls_to_language() {
        let r = resolver(&["ff_amelie", "fm_pierre"]);
        let resolved = r.resolve("nobody", 'f', None);
        // First f-language entry in stable order
        assert_eq!(resolved.voice, "ff_amelie");
    }

    #[test]
    fn test_unserved_language_falls_to_first_entry() {
        let r = resolver(&["ff_amelie", "am_adam"]);
        let resolved = r.resolve("nobody", 'z', None);
        assert_eq!(resolved.voice, "am_adam");
        assert_eq!(resolved.language, 'a');
    }

    #[test]
    fn test_empty_catalog_uses_compiled_default() {
        let r = resolver(&[]);
        let resolved = r.resolve("anything", 'f', Some(Gender::Female));
        assert_eq!(resolved.voice, DEFAULT_VOICE);
        assert_eq!(resolved.language, DEFAULT_LANGUAGE);
    }

    #[test]
    fn test_requested_name_is_case_insensitive() {
        let r = resolver(&["ff_amelie"]);
        let resolved = r.resolve("  AMELIE ", 'f', None);
        assert_eq!(resolved.voice, "ff_amelie");
    }
}
