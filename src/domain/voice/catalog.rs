use regex::Regex;
use serde::Serialize;

/// Speaker gender encoded in the voice asset name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Gender {
    #[serde(rename = "m")]
    Male,
    #[serde(rename = "f")]
    Female,
}

impl Gender {
    /// Parse a requested gender. Anything other than `m` or `f` is treated
    /// as absent, not as an error.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "m" => Some(Gender::Male),
            "f" => Some(Gender::Female),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            Gender::Male => 'm',
            Gender::Female => 'f',
        }
    }
}

/// One voice asset, derived from a `<lang><gender>_<name>` asset file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceDescriptor {
    /// Unique key, e.g. `af_heart`; also the asset file stem on the hub
    pub full_name: String,
    /// Single-character engine language code
    pub language: char,
    pub gender: Gender,
    /// Lowercase display name, e.g. `heart`
    pub name: String,
}

/// Read-only index of available voices, built once at process start.
/// Entries are stably sorted by (language, gender, name) so fallback
/// resolution scans in a deterministic order.
pub struct VoiceCatalog {
    voices: Vec<VoiceDescriptor>,
}

impl VoiceCatalog {
    /// Build from the asset file stems the hub lists. Malformed names are
    /// discarded.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pattern = Regex::new(r"^([a-z])([mf])_(.+)$").unwrap();
        let mut voices: Vec<VoiceDescriptor> = names
            .into_iter()
            .filter_map(|name| {
                let name = name.as_ref();
                let captures = pattern.captures(name)?;
                let language = captures[1].chars().next()?;
                let gender = Gender::parse(&captures[2])?;
                Some(VoiceDescriptor {
                    full_name: name.to_string(),
                    language,
                    gender,
                    name: captures[3].to_lowercase(),
                })
            })
            .collect();

        voices.sort_by(|a, b| {
            (a.language, a.gender.as_char(), &a.name).cmp(&(
                b.language,
                b.gender.as_char(),
                &b.name,
            ))
        });

        Self { voices }
    }

    pub fn voices(&self) -> &[VoiceDescriptor] {
        &self.voices
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// First entry in stable order, used as the warm-up and last-resort voice
    pub fn first(&self) -> Option<&VoiceDescriptor> {
        self.voices.first()
    }
}
