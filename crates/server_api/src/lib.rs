use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{
    domain::{CharacterTag, NewPerson, Person, PersonId},
    error::{ApiError, ErrorCode},
    protocol::PersonRecord,
};
use storage::{PersonFilter, Storage};
use tracing::{debug, info};

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub tag_encoding: TagEncoding,
}

/// How character tags are rendered in read responses. Writes always take bare tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagEncoding {
    /// `:person.characters/violent`
    #[default]
    Keyword,
    /// `person.characters/violent`
    Plain,
}

impl FromStr for TagEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyword" => Ok(Self::Keyword),
            "plain" => Ok(Self::Plain),
            other => Err(format!("unknown tag encoding '{other}'")),
        }
    }
}

impl fmt::Display for TagEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Keyword => "keyword",
            Self::Plain => "plain",
        })
    }
}

pub fn persons_route() -> &'static str {
    "/persons"
}

pub fn person_route() -> &'static str {
    "/persons/:id"
}

pub async fn list_persons(ctx: &ApiContext, q: Option<&str>) -> Result<Vec<PersonRecord>, ApiError> {
    let filter = match q {
        Some(q) => parse_selector(q)?,
        None => PersonFilter::default(),
    };
    let persons = ctx
        .storage
        .list_persons(&filter)
        .await
        .map_err(internal)?;
    Ok(persons
        .iter()
        .map(|person| encode_for_read(ctx.tag_encoding, person))
        .collect())
}

pub async fn get_person(ctx: &ApiContext, person_id: PersonId) -> Result<PersonRecord, ApiError> {
    let person = ctx
        .storage
        .get_person(person_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(person_id))?;
    Ok(encode_for_read(ctx.tag_encoding, &person))
}

/// `POST /persons`. A body that already carries an id replaces that record.
pub async fn create_person(ctx: &ApiContext, record: PersonRecord) -> Result<PersonRecord, ApiError> {
    let person = validate_record(&record)?;
    let stored = match record.id {
        Some(person_id) => {
            let stored = ctx
                .storage
                .upsert_person(person_id, &person)
                .await
                .map_err(internal)?;
            info!(person_id = %stored.id, "person saved over existing id");
            stored
        }
        None => {
            let stored = ctx.storage.insert_person(&person).await.map_err(internal)?;
            info!(person_id = %stored.id, "person created");
            stored
        }
    };
    Ok(encode_for_read(ctx.tag_encoding, &stored))
}

pub async fn update_person(
    ctx: &ApiContext,
    person_id: PersonId,
    record: PersonRecord,
) -> Result<PersonRecord, ApiError> {
    if let Some(body_id) = record.id {
        if body_id != person_id {
            return Err(ApiError::validation(format!(
                "body id {body_id} does not match path id {person_id}"
            )));
        }
    }
    let person = validate_record(&record)?;
    let stored = ctx
        .storage
        .replace_person(person_id, &person)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(person_id))?;
    info!(%person_id, "person updated");
    Ok(encode_for_read(ctx.tag_encoding, &stored))
}

pub async fn delete_person(ctx: &ApiContext, person_id: PersonId) -> Result<(), ApiError> {
    let removed = ctx
        .storage
        .delete_person(person_id)
        .await
        .map_err(internal)?;
    if !removed {
        return Err(not_found(person_id));
    }
    info!(%person_id, "person deleted");
    Ok(())
}

fn validate_record(record: &PersonRecord) -> Result<NewPerson, ApiError> {
    let name = record.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("name must not be empty"));
    }
    for tag in &record.characters {
        if tag.is_marked() {
            return Err(ApiError::validation(format!(
                "character '{tag}' must be sent without its read marker"
            )));
        }
        if tag.character().is_none() {
            return Err(ApiError::validation(format!("unknown character '{tag}'")));
        }
    }
    Ok(NewPerson {
        name: name.to_string(),
        age: record.age,
        characters: record.characters.clone(),
    })
}

fn encode_for_read(encoding: TagEncoding, person: &Person) -> PersonRecord {
    let characters = person
        .characters
        .iter()
        .map(|tag| match encoding {
            TagEncoding::Keyword => tag.to_marked(),
            TagEncoding::Plain => tag.to_bare(),
        })
        .collect::<Vec<CharacterTag>>();
    PersonRecord {
        id: Some(person.id),
        name: person.name.clone(),
        age: person.age,
        characters,
    }
}

/// `q` is opaque to clients. A JSON object is treated as an exact-match selector on
/// `name`/`age`; anything else (for instance a datalog query) selects every person.
fn parse_selector(q: &str) -> Result<PersonFilter, ApiError> {
    let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(q) else {
        debug!(q, "query is not a JSON selector; returning full collection");
        return Ok(PersonFilter::default());
    };

    let mut filter = PersonFilter::default();
    for (key, value) in fields {
        match (key.as_str(), value) {
            ("name", Value::String(name)) => filter.name = Some(name),
            ("age", Value::Number(age)) => {
                let age = age
                    .as_u64()
                    .and_then(|age| u32::try_from(age).ok())
                    .ok_or_else(|| ApiError::validation("age selector must be a non-negative integer"))?;
                filter.age = Some(age);
            }
            (other, _) => {
                return Err(ApiError::validation(format!(
                    "unsupported selector field '{other}'"
                )))
            }
        }
    }
    Ok(filter)
}

fn not_found(person_id: PersonId) -> ApiError {
    ApiError::not_found(format!("person {person_id} not found"))
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}
