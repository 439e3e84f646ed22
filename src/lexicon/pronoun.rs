//! Pronoun lexicon and gender/number statistics for coreference.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Neutral,
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Number {
    Singular,
    Plural,
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pronoun {
    pub gender: Gender,
    pub number: Number,
}

impl Pronoun {
    pub fn new(gender: Gender, number: Number) -> Self {
        Self { gender, number }
    }
}

/// Pronouns keyed by the id of their lowercased form.
///
/// Owns its entries; dropping the lexicon releases them.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PronounLexicon {
    entries: HashMap<u32, Pronoun>,
}

impl PronounLexicon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pronoun. Returns false if the form was already known,
    /// in which case the first entry is kept.
    pub fn insert(&mut self, form_lower: u32, pronoun: Pronoun) -> bool {
        if self.entries.contains_key(&form_lower) {
            return false;
        }
        self.entries.insert(form_lower, pronoun);
        true
    }

    pub fn get(&self, form_lower: u32) -> Option<&Pronoun> {
        self.entries.get(&form_lower)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_pronoun(&self, form_lower: u32) -> bool {
        self.entries.contains_key(&form_lower)
    }

    pub fn is_male(&self, form_lower: u32) -> bool {
        self.has_gender(form_lower, Gender::Male)
    }

    pub fn is_female(&self, form_lower: u32) -> bool {
        self.has_gender(form_lower, Gender::Female)
    }

    pub fn is_neutral(&self, form_lower: u32) -> bool {
        self.has_gender(form_lower, Gender::Neutral)
    }

    pub fn is_singular(&self, form_lower: u32) -> bool {
        self.get(form_lower)
            .is_some_and(|p| p.number == Number::Singular)
    }

    pub fn is_plural(&self, form_lower: u32) -> bool {
        self.get(form_lower).is_some_and(|p| p.number == Number::Plural)
    }

    fn has_gender(&self, form_lower: u32, gender: Gender) -> bool {
        self.get(form_lower).is_some_and(|p| p.gender == gender)
    }
}

/// Corpus counts of how often a phrase is referred to as male, female,
/// neutral or plural.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<(Vec<u32>, [u32; 4])>", into = "Vec<(Vec<u32>, [u32; 4])>")]
pub struct GenderNumberStatistics {
    phrase_counts: HashMap<Vec<u32>, [u32; 4]>,
}

impl GenderNumberStatistics {
    const MALE: usize = 0;
    const FEMALE: usize = 1;
    const NEUTRAL: usize = 2;
    const PLURAL: usize = 3;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.phrase_counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrase_counts.is_empty()
    }

    /// Record counts `[male, female, neutral, plural]` for a phrase of word
    /// ids. The first registration of a phrase wins.
    pub fn add_phrase(&mut self, phrase: Vec<u32>, counts: [u32; 4]) -> bool {
        if self.phrase_counts.contains_key(&phrase) {
            return false;
        }
        self.phrase_counts.insert(phrase, counts);
        true
    }

    /// Majority gender of the phrase, backing off to its head word.
    pub fn compute_gender(&self, phrase: &[u32], head_index: usize) -> Gender {
        let Some(counts) = self.counts(phrase, head_index) else {
            return Gender::Unknown;
        };
        let (male, female, neutral) = (
            counts[Self::MALE],
            counts[Self::FEMALE],
            counts[Self::NEUTRAL],
        );
        if male > female && male > neutral {
            Gender::Male
        } else if female > male && female > neutral {
            Gender::Female
        } else if neutral > male && neutral > female {
            Gender::Neutral
        } else {
            Gender::Unknown
        }
    }

    /// Singular if singular mentions outnumber plural ones, and vice versa.
    pub fn compute_number(&self, phrase: &[u32], head_index: usize) -> Number {
        let Some(counts) = self.counts(phrase, head_index) else {
            return Number::Unknown;
        };
        let singular = u64::from(counts[Self::MALE])
            + u64::from(counts[Self::FEMALE])
            + u64::from(counts[Self::NEUTRAL]);
        let plural = u64::from(counts[Self::PLURAL]);
        if singular > plural {
            Number::Singular
        } else if plural > singular {
            Number::Plural
        } else {
            Number::Unknown
        }
    }

    fn counts(&self, phrase: &[u32], head_index: usize) -> Option<&[u32; 4]> {
        self.phrase_counts.get(phrase).or_else(|| {
            let head = *phrase.get(head_index)?;
            self.phrase_counts.get([head].as_slice())
        })
    }
}

impl TryFrom<Vec<(Vec<u32>, [u32; 4])>> for GenderNumberStatistics {
    type Error = Error;

    /// Rebuild persisted statistics. A phrase listed twice is an error.
    fn try_from(entries: Vec<(Vec<u32>, [u32; 4])>) -> Result<Self> {
        let mut stats = GenderNumberStatistics::new();
        for (phrase, counts) in entries {
            if stats.phrase_counts.contains_key(&phrase) {
                return Err(Error::DuplicateKey(format!("phrase {:?}", phrase)));
            }
            stats.phrase_counts.insert(phrase, counts);
        }
        Ok(stats)
    }
}

impl From<GenderNumberStatistics> for Vec<(Vec<u32>, [u32; 4])> {
    fn from(stats: GenderNumberStatistics) -> Self {
        stats.phrase_counts.into_iter().collect()
    }
}
