use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(PersonId);

/// Leading marker carried by keyword-encoded character tags on read.
pub const CHARACTER_MARKER: char = ':';
pub const CHARACTER_NAMESPACE: &str = "person.characters";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Character {
    Violent,
    Weak,
    Clever,
    Dumb,
    Stupid,
}

impl Character {
    pub const ALL: [Character; 5] = [
        Character::Violent,
        Character::Weak,
        Character::Clever,
        Character::Dumb,
        Character::Stupid,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Character::Violent => "violent",
            Character::Weak => "weak",
            Character::Clever => "clever",
            Character::Dumb => "dumb",
            Character::Stupid => "stupid",
        }
    }

    pub fn tag(self) -> CharacterTag {
        CharacterTag(format!("{CHARACTER_NAMESPACE}/{}", self.name()))
    }

    /// Resolves a bare tag (`person.characters/violent`).
    pub fn from_bare_tag(tag: &str) -> Option<Self> {
        let name = tag.strip_prefix(CHARACTER_NAMESPACE)?.strip_prefix('/')?;
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl FromStr for Character {
    type Err = UnknownCharacter;

    /// Accepts a short name (`violent`), a bare tag or a marked tag.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let unmarked = trimmed.strip_prefix(CHARACTER_MARKER).unwrap_or(trimmed);
        Self::from_bare_tag(unmarked)
            .or_else(|| Self::ALL.into_iter().find(|c| c.name() == unmarked))
            .ok_or_else(|| UnknownCharacter(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown character '{0}'")]
pub struct UnknownCharacter(pub String);

/// A character tag exactly as it travelled on the wire.
///
/// Tags read from a keyword-encoding backend keep their leading
/// [`CHARACTER_MARKER`]; writes must use [`CharacterTag::bare`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterTag(String);

impl CharacterTag {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_marked(&self) -> bool {
        self.0.starts_with(CHARACTER_MARKER)
    }

    /// Write form: the tag without its read marker. Unmarked tags are returned as-is.
    pub fn bare(&self) -> &str {
        self.0.strip_prefix(CHARACTER_MARKER).unwrap_or(&self.0)
    }

    pub fn to_bare(&self) -> CharacterTag {
        CharacterTag(self.bare().to_string())
    }

    pub fn to_marked(&self) -> CharacterTag {
        CharacterTag(format!("{CHARACTER_MARKER}{}", self.bare()))
    }

    pub fn character(&self) -> Option<Character> {
        Character::from_bare_tag(self.bare())
    }
}

impl From<Character> for CharacterTag {
    fn from(value: Character) -> Self {
        value.tag()
    }
}

impl fmt::Display for CharacterTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A record the server has assigned an identifier to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub age: u32,
    #[serde(default)]
    pub characters: Vec<CharacterTag>,
}

impl Person {
    /// Attribute equality ignoring the identifier and tag read markers.
    pub fn same_attributes(&self, other: &NewPerson) -> bool {
        self.name == other.name
            && self.age == other.age
            && self
                .characters
                .iter()
                .map(CharacterTag::bare)
                .eq(other.characters.iter().map(CharacterTag::bare))
    }
}

/// A validated record that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPerson {
    pub name: String,
    pub age: u32,
    pub characters: Vec<CharacterTag>,
}

/// Create-form state. Never sent as-is; see [`PersonDraft::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonDraft {
    pub name: String,
    pub age: Option<u32>,
    pub characters: Vec<CharacterTag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("name must not be empty")]
    MissingName,
    #[error("age is required")]
    MissingAge,
}

impl PersonDraft {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.age.is_none() && self.characters.is_empty()
    }

    pub fn validate(&self) -> Result<NewPerson, DraftError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DraftError::MissingName);
        }
        let age = self.age.ok_or(DraftError::MissingAge)?;
        Ok(NewPerson {
            name: name.to_string(),
            age,
            characters: self.characters.iter().map(CharacterTag::to_bare).collect(),
        })
    }
}
