use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{CharacterTag, NewPerson, Person, PersonId};

pub const PERSONS_COLLECTION: &str = "persons";

/// Person as it travels on the wire. `id` is only absent on creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PersonId>,
    pub name: String,
    pub age: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub characters: Vec<CharacterTag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("person record is missing its identifier")]
    MissingId,
}

impl PersonRecord {
    pub fn from_new(person: &NewPerson) -> Self {
        Self {
            id: None,
            name: person.name.clone(),
            age: person.age,
            characters: person.characters.iter().map(CharacterTag::to_bare).collect(),
        }
    }

    /// Full replacement body for an existing person, tags as the caller holds them.
    pub fn from_person(person: &Person) -> Self {
        Self {
            id: Some(person.id),
            name: person.name.clone(),
            age: person.age,
            characters: person.characters.clone(),
        }
    }

    pub fn with_bare_characters(mut self) -> Self {
        self.characters = self.characters.iter().map(CharacterTag::to_bare).collect();
        self
    }
}

impl TryFrom<PersonRecord> for Person {
    type Error = RecordError;

    fn try_from(value: PersonRecord) -> Result<Self, Self::Error> {
        Ok(Person {
            id: value.id.ok_or(RecordError::MissingId)?,
            name: value.name,
            age: value.age,
            characters: value.characters,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListPersonsQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
}
