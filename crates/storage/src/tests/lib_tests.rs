use super::*;

fn new_person(name: &str, age: u32, characters: &[&str]) -> NewPerson {
    NewPerson {
        name: name.to_string(),
        age,
        characters: characters.iter().map(|c| CharacterTag::new(*c)).collect(),
    }
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn inserts_and_lists_persons_in_id_order() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let alice = storage
        .insert_person(&new_person("alice", 30, &["person.characters/clever"]))
        .await
        .expect("insert");
    let bob = storage
        .insert_person(&new_person("bob", 41, &[]))
        .await
        .expect("insert");
    assert!(bob.id > alice.id);

    let persons = storage
        .list_persons(&PersonFilter::default())
        .await
        .expect("list");
    assert_eq!(persons, vec![alice.clone(), bob]);
    assert_eq!(
        alice.characters,
        vec![CharacterTag::new("person.characters/clever")]
    );
}

#[tokio::test]
async fn stores_marked_tags_in_bare_form() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let stored = storage
        .insert_person(&new_person("carl", 22, &[":person.characters/violent"]))
        .await
        .expect("insert");
    assert_eq!(
        stored.characters,
        vec![CharacterTag::new("person.characters/violent")]
    );
}

#[tokio::test]
async fn filters_by_name_and_age() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .insert_person(&new_person("dora", 20, &[]))
        .await
        .expect("insert");
    storage
        .insert_person(&new_person("dora", 25, &[]))
        .await
        .expect("insert");
    storage
        .insert_person(&new_person("eve", 25, &[]))
        .await
        .expect("insert");

    let by_name = storage
        .list_persons(&PersonFilter {
            name: Some("dora".into()),
            age: None,
        })
        .await
        .expect("list");
    assert_eq!(by_name.len(), 2);

    let by_both = storage
        .list_persons(&PersonFilter {
            name: Some("dora".into()),
            age: Some(25),
        })
        .await
        .expect("list");
    assert_eq!(by_both.len(), 1);
    assert_eq!(by_both[0].age, 25);
}

#[tokio::test]
async fn replace_reports_missing_rows() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let missing = storage
        .replace_person(PersonId(404), &new_person("ghost", 1, &[]))
        .await
        .expect("replace");
    assert!(missing.is_none());

    let frank = storage
        .insert_person(&new_person("frank", 50, &[]))
        .await
        .expect("insert");
    let replaced = storage
        .replace_person(frank.id, &new_person("franklin", 51, &["person.characters/weak"]))
        .await
        .expect("replace")
        .expect("row exists");
    assert_eq!(replaced.id, frank.id);
    assert_eq!(replaced.name, "franklin");
    assert_eq!(
        storage.get_person(frank.id).await.expect("get"),
        Some(replaced)
    );
}

#[tokio::test]
async fn upsert_twice_keeps_a_single_row() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let gina = storage
        .insert_person(&new_person("gina", 33, &[]))
        .await
        .expect("insert");

    let update = new_person("gina", 34, &["person.characters/dumb"]);
    storage.upsert_person(gina.id, &update).await.expect("upsert");
    storage.upsert_person(gina.id, &update).await.expect("upsert");

    let persons = storage
        .list_persons(&PersonFilter::default())
        .await
        .expect("list");
    assert_eq!(persons.len(), 1);
    assert_eq!(persons[0].age, 34);
}

#[tokio::test]
async fn delete_reports_whether_a_row_was_removed() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let hank = storage
        .insert_person(&new_person("hank", 60, &[]))
        .await
        .expect("insert");
    assert!(storage.delete_person(hank.id).await.expect("delete"));
    assert!(!storage.delete_person(hank.id).await.expect("delete"));
    assert_eq!(storage.get_person(hank.id).await.expect("get"), None);
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("persons.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    storage.pool().close().await;

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[test]
fn memory_urls_have_no_filesystem_path() {
    assert_eq!(sqlite_path("sqlite::memory:"), None);
    assert_eq!(sqlite_path("sqlite://file:persons?mode=memory"), None);
    assert_eq!(
        sqlite_path("sqlite://./data/persons.db?mode=rwc"),
        Some(PathBuf::from("./data/persons.db"))
    );
}
