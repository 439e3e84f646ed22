//! Lexical context shared by feature extraction.
//!
//! [`Lexicon`] is an explicit context object: the pipeline that builds it
//! owns it and hands `&Lexicon` to whatever needs lookups. Growth is
//! controlled in one place and reaches every alphabet it owns.
//!
//! # Usage
//!
//! ```rust
//! use structlearn::lexicon::{Lexicon, TagClass};
//!
//! let mut lexicon = Lexicon::new();
//! let per = lexicon.entities_mut().insert("PER").unwrap();
//! lexicon.add_tag(TagClass::PersonEntity, per);
//! lexicon.stop_growth();
//!
//! assert!(lexicon.has_tag(TagClass::PersonEntity, per));
//! assert_eq!(lexicon.entities_mut().insert("LOC"), None);
//! ```

pub mod alphabet;
pub mod pronoun;

pub use alphabet::Alphabet;
pub use pronoun::{Gender, GenderNumberStatistics, Number, Pronoun, PronounLexicon};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Tag categories coreference features test membership in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagClass {
    NamedEntity,
    PersonEntity,
    NounPhrase,
    ProperNoun,
    Pronominal,
}

/// Alphabets, pronouns and tag sets for one model.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Lexicon {
    entities: Alphabet,
    constituents: Alphabet,
    words: Alphabet,
    words_lower: Alphabet,
    pronouns: PronounLexicon,
    gender_number: GenderNumberStatistics,
    tags: BTreeMap<TagClass, BTreeSet<u32>>,
}

impl Lexicon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entities(&self) -> &Alphabet {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut Alphabet {
        &mut self.entities
    }

    pub fn constituents(&self) -> &Alphabet {
        &self.constituents
    }

    pub fn constituents_mut(&mut self) -> &mut Alphabet {
        &mut self.constituents
    }

    pub fn words(&self) -> &Alphabet {
        &self.words
    }

    pub fn words_mut(&mut self) -> &mut Alphabet {
        &mut self.words
    }

    pub fn words_lower(&self) -> &Alphabet {
        &self.words_lower
    }

    pub fn words_lower_mut(&mut self) -> &mut Alphabet {
        &mut self.words_lower
    }

    pub fn pronouns(&self) -> &PronounLexicon {
        &self.pronouns
    }

    pub fn pronouns_mut(&mut self) -> &mut PronounLexicon {
        &mut self.pronouns
    }

    pub fn gender_number(&self) -> &GenderNumberStatistics {
        &self.gender_number
    }

    pub fn gender_number_mut(&mut self) -> &mut GenderNumberStatistics {
        &mut self.gender_number
    }

    /// Register a word form and its lowercased form, returning both ids.
    pub fn insert_word(&mut self, form: &str) -> (Option<u32>, Option<u32>) {
        let id = self.words.insert(form);
        let lower_id = self.words_lower.insert(&form.to_lowercase());
        (id, lower_id)
    }

    pub fn add_tag(&mut self, class: TagClass, tag: u32) {
        self.tags.entry(class).or_default().insert(tag);
    }

    pub fn has_tag(&self, class: TagClass, tag: u32) -> bool {
        self.tags.get(&class).is_some_and(|set| set.contains(&tag))
    }

    pub fn allow_growth(&mut self) {
        self.entities.allow_growth();
        self.constituents.allow_growth();
        self.words.allow_growth();
        self.words_lower.allow_growth();
    }

    pub fn stop_growth(&mut self) {
        self.entities.stop_growth();
        self.constituents.stop_growth();
        self.words.stop_growth();
        self.words_lower.stop_growth();
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Read a lexicon. Its alphabets come back growing.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Persist to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.to_writer(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Load from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }
}
