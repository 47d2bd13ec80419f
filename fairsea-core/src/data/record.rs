//! Model response records and their demographic attributes.

use crate::error::FairseaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Demographic attribute recorded alongside every response.
///
/// The declaration order is the fixed attribute order used when building
/// combination keys (`Gender_Race`, `Gender_Race_Nat`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DemographicAttribute {
    Gender,
    Race,
    Nationality,
}

impl DemographicAttribute {
    pub const ALL: [DemographicAttribute; 3] = [Self::Gender, Self::Race, Self::Nationality];

    /// Column name in the input dataset.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Gender => "Gender",
            Self::Race => "Race",
            Self::Nationality => "Nationality",
        }
    }

    /// Abbreviation used in combination names.
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Gender => "Gender",
            Self::Race => "Race",
            Self::Nationality => "Nat",
        }
    }

    pub fn value<'r>(&self, record: &'r Record) -> &'r str {
        match self {
            Self::Gender => &record.gender,
            Self::Race => &record.race,
            Self::Nationality => &record.nationality,
        }
    }
}

impl fmt::Display for DemographicAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for DemographicAttribute {
    type Err = FairseaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gender" => Ok(Self::Gender),
            "race" => Ok(Self::Race),
            "nationality" | "nat" => Ok(Self::Nationality),
            other => Err(FairseaError::config(format!(
                "unknown demographic attribute '{other}'"
            ))),
        }
    }
}

/// One model response with its prompt and demographic context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "prompt_id_full")]
    pub prompt_id: String,
    pub prompt_text: String,
    pub llm_output: String,
    #[serde(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "Race")]
    pub race: String,
    #[serde(rename = "Nationality")]
    pub nationality: String,
    /// Identity of the model that produced the output, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Record {
    pub fn new(
        prompt_id: impl Into<String>,
        llm_output: impl Into<String>,
        gender: impl Into<String>,
        race: impl Into<String>,
        nationality: impl Into<String>,
    ) -> Self {
        Self {
            prompt_id: prompt_id.into(),
            prompt_text: String::new(),
            llm_output: llm_output.into(),
            gender: gender.into(),
            race: race.into(),
            nationality: nationality.into(),
            model: None,
        }
    }

    pub fn with_prompt_text(mut self, text: impl Into<String>) -> Self {
        self.prompt_text = text.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Family prefix of the prompt id: everything before the first `-`.
    pub fn family_prefix(&self) -> &str {
        self.prompt_id
            .split_once('-')
            .map_or(self.prompt_id.as_str(), |(prefix, _)| prefix)
    }

    /// Copy of this record with a normalized `llm_output`.
    pub fn cleaned(&self) -> Self {
        Self {
            llm_output: clean_output(&self.llm_output),
            ..self.clone()
        }
    }
}

const QUOTES: &[char] = &['\'', '"', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}'];

/// Normalize a raw model output so identical answers compare equal.
///
/// Strips surrounding quotes, removes ellipses and one trailing period,
/// collapses whitespace and lowercases.
pub fn clean_output(text: &str) -> String {
    let unquoted = text.trim().trim_matches(QUOTES);

    let mut without_ellipses = String::with_capacity(unquoted.len());
    let chars: Vec<char> = unquoted.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '.' {
            let run = chars[i..].iter().take_while(|c| **c == '.').count();
            if run == 1 {
                without_ellipses.push('.');
            }
            i += run;
        } else {
            without_ellipses.push(chars[i]);
            i += 1;
        }
    }

    let trimmed = without_ellipses
        .strip_suffix('.')
        .unwrap_or(&without_ellipses);

    trimmed
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_output_quotes_and_period() {
        assert_eq!(clean_output("  \"Too passive.\" "), "too passive");
        assert_eq!(clean_output("\u{201C}Modern\u{201D}"), "modern");
    }

    #[test]
    fn test_clean_output_ellipses_and_whitespace() {
        assert_eq!(clean_output("Well...   maybe\tnot"), "well maybe not");
        assert_eq!(clean_output("Dr. Tan."), "dr. tan");
    }

    #[test]
    fn test_clean_output_empty() {
        assert_eq!(clean_output("   "), "");
        assert_eq!(clean_output("\"\""), "");
    }

    #[test]
    fn test_family_prefix() {
        let record = Record::new("I1-Singaporean-Male-3", "x", "Male", "Chinese", "Singaporean");
        assert_eq!(record.family_prefix(), "I1");
        let bare = Record::new("D2", "x", "Male", "Chinese", "Singaporean");
        assert_eq!(bare.family_prefix(), "D2");
    }

    #[test]
    fn test_attribute_order_and_values() {
        let record = Record::new("D1-1", "x", "Female", "Malay", "Indonesian");
        assert!(DemographicAttribute::Gender < DemographicAttribute::Race);
        assert!(DemographicAttribute::Race < DemographicAttribute::Nationality);
        assert_eq!(DemographicAttribute::Nationality.value(&record), "Indonesian");
        assert_eq!(DemographicAttribute::Nationality.short_name(), "Nat");
    }

    #[test]
    fn test_attribute_from_str() {
        assert_eq!(
            "nationality".parse::<DemographicAttribute>().unwrap(),
            DemographicAttribute::Nationality
        );
        assert!("age".parse::<DemographicAttribute>().is_err());
    }

    #[test]
    fn test_record_serde_column_names() {
        let json = serde_json::json!({
            "prompt_id_full": "D3-7",
            "prompt_text": "Describe",
            "llm_output": "Kind",
            "Gender": "Female",
            "Race": "Indian",
            "Nationality": "Malaysian"
        });
        let record: Record = serde_json::from_value(json).unwrap();
        assert_eq!(record.prompt_id, "D3-7");
        assert_eq!(record.race, "Indian");
        assert!(record.model.is_none());
    }
}
