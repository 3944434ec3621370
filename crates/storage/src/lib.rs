use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{CharacterTag, NewPerson, Person, PersonId};

const PERSON_COLUMNS: &str = "id, name, age, characters";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// Exact-match selector over the persons table. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonFilter {
    pub name: Option<String>,
    pub age: Option<u32>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let mut pool_options = SqlitePoolOptions::new().max_connections(5);
        if is_in_memory(database_url) {
            // every connection to sqlite::memory: opens its own database
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options.connect_with(connect_options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn list_persons(&self, filter: &PersonFilter) -> Result<Vec<Person>> {
        let rows = sqlx::query(&format!(
            "SELECT {PERSON_COLUMNS} FROM persons
             WHERE (?1 IS NULL OR name = ?1) AND (?2 IS NULL OR age = ?2)
             ORDER BY id ASC"
        ))
        .bind(filter.name.as_deref())
        .bind(filter.age.map(i64::from))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(person_from_row).collect()
    }

    pub async fn get_person(&self, person_id: PersonId) -> Result<Option<Person>> {
        let row = sqlx::query(&format!(
            "SELECT {PERSON_COLUMNS} FROM persons WHERE id = ?"
        ))
        .bind(person_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(person_from_row).transpose()
    }

    pub async fn insert_person(&self, person: &NewPerson) -> Result<Person> {
        let row = sqlx::query(&format!(
            "INSERT INTO persons (name, age, characters) VALUES (?, ?, ?)
             RETURNING {PERSON_COLUMNS}"
        ))
        .bind(&person.name)
        .bind(i64::from(person.age))
        .bind(encode_characters(&person.characters)?)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert person")?;
        person_from_row(&row)
    }

    /// Overwrites an existing row. Returns `None` when no row has `person_id`.
    pub async fn replace_person(
        &self,
        person_id: PersonId,
        person: &NewPerson,
    ) -> Result<Option<Person>> {
        let row = sqlx::query(&format!(
            "UPDATE persons SET name = ?1, age = ?2, characters = ?3 WHERE id = ?4
             RETURNING {PERSON_COLUMNS}"
        ))
        .bind(&person.name)
        .bind(i64::from(person.age))
        .bind(encode_characters(&person.characters)?)
        .bind(person_id.0)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to replace person {person_id}"))?;
        row.as_ref().map(person_from_row).transpose()
    }

    /// Inserts under a caller-chosen id, or overwrites the row that already holds it.
    pub async fn upsert_person(&self, person_id: PersonId, person: &NewPerson) -> Result<Person> {
        let row = sqlx::query(&format!(
            "INSERT INTO persons (id, name, age, characters) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                age = excluded.age,
                characters = excluded.characters
             RETURNING {PERSON_COLUMNS}"
        ))
        .bind(person_id.0)
        .bind(&person.name)
        .bind(i64::from(person.age))
        .bind(encode_characters(&person.characters)?)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to upsert person {person_id}"))?;
        person_from_row(&row)
    }

    pub async fn delete_person(&self, person_id: PersonId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM persons WHERE id = ?")
            .bind(person_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn person_from_row(row: &SqliteRow) -> Result<Person> {
    let id = PersonId(row.try_get::<i64, _>("id")?);
    let age: i64 = row.try_get("age")?;
    let characters: String = row.try_get("characters")?;
    Ok(Person {
        id,
        name: row.try_get("name")?,
        age: u32::try_from(age).with_context(|| format!("person {id} has invalid age {age}"))?,
        characters: serde_json::from_str(&characters)
            .with_context(|| format!("person {id} has malformed characters column"))?,
    })
}

fn encode_characters(characters: &[CharacterTag]) -> Result<String> {
    let bare: Vec<&str> = characters.iter().map(CharacterTag::bare).collect();
    serde_json::to_string(&bare).context("failed to encode characters")
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_in_memory(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
