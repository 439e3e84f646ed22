//! String ↔ dense id dictionary.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maps strings (words, tags, entity types) to dense ids.
///
/// Ids are assigned in insertion order. Like the parameter store, an
/// alphabet can be frozen: afterwards unseen strings get no id.
/// Only the names are persisted; the reverse map is rebuilt on load.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Alphabet {
    ids: HashMap<String, u32>,
    names: Vec<String>,
    growth_stopped: bool,
}

impl Alphabet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }

    /// Id of `name`, assigning a new one while growth is allowed.
    pub fn insert(&mut self, name: &str) -> Option<u32> {
        if let Some(id) = self.lookup(name) {
            return Some(id);
        }
        if self.growth_stopped {
            return None;
        }
        let id = self.names.len() as u32;
        self.ids.insert(name.to_string(), id);
        self.names.push(name.to_string());
        Some(id)
    }

    pub fn name(&self, id: u32) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    pub fn allow_growth(&mut self) {
        self.growth_stopped = false;
    }

    pub fn stop_growth(&mut self) {
        self.growth_stopped = true;
    }

    pub fn is_growing(&self) -> bool {
        !self.growth_stopped
    }
}

impl TryFrom<Vec<String>> for Alphabet {
    type Error = Error;

    /// Rebuild a persisted alphabet. Ids are stream positions, so a
    /// repeated name is an error.
    fn try_from(names: Vec<String>) -> Result<Self> {
        let mut ids = HashMap::with_capacity(names.len());
        for (id, name) in names.iter().enumerate() {
            if ids.insert(name.clone(), id as u32).is_some() {
                return Err(Error::DuplicateKey(name.clone()));
            }
        }
        Ok(Self {
            ids,
            names,
            growth_stopped: false,
        })
    }
}

impl From<Alphabet> for Vec<String> {
    fn from(alphabet: Alphabet) -> Self {
        alphabet.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut alphabet = Alphabet::new();
        assert_eq!(alphabet.insert("PER"), Some(0));
        assert_eq!(alphabet.insert("ORG"), Some(1));
        assert_eq!(alphabet.insert("PER"), Some(0));

        assert_eq!(alphabet.lookup("ORG"), Some(1));
        assert_eq!(alphabet.name(1), Some("ORG"));
        assert_eq!(alphabet.name(2), None);
        assert_eq!(alphabet.len(), 2);
    }

    #[test]
    fn test_frozen_alphabet() {
        let mut alphabet = Alphabet::new();
        alphabet.insert("NP");
        alphabet.stop_growth();

        assert_eq!(alphabet.insert("VP"), None);
        assert_eq!(alphabet.insert("NP"), Some(0));
        assert_eq!(alphabet.len(), 1);
    }

    #[test]
    fn test_json_round_trip() {
        let mut alphabet = Alphabet::new();
        alphabet.insert("the");
        alphabet.insert("dog");

        let json = serde_json::to_string(&alphabet).unwrap();
        assert_eq!(json, r#"["the","dog"]"#);

        let restored: Alphabet = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.lookup("dog"), Some(1));
        assert_eq!(restored.name(0), Some("the"));
    }

    #[test]
    fn test_repeated_name_is_rejected() {
        let err = serde_json::from_str::<Alphabet>(r#"["a","a","b"]"#).unwrap_err();
        assert!(err.to_string().contains("Duplicate key"));

        assert!(matches!(
            Alphabet::try_from(vec!["x".to_string(), "x".to_string()]),
            Err(Error::DuplicateKey(name)) if name == "x"
        ));
    }
}
