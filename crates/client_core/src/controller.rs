use std::{fmt, str::FromStr, sync::Arc};

use shared::{
    domain::{CharacterTag, Person, PersonDraft, PersonId},
    protocol::PersonRecord,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{error::ClientError, transport::PersonTransport};

/// How `update` reaches the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateStrategy {
    /// Native update verb. Outgoing tags lose their read marker.
    #[default]
    ReplaceStrippingTags,
    /// No update verb: the record, id included, goes back through create.
    ResubmitAsCreate,
}

impl FromStr for UpdateStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(Self::ReplaceStrippingTags),
            "resubmit" => Ok(Self::ResubmitAsCreate),
            other => Err(format!("unknown update strategy '{other}'")),
        }
    }
}

impl fmt::Display for UpdateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ReplaceStrippingTags => "replace",
            Self::ResubmitAsCreate => "resubmit",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerConfig {
    pub update_strategy: UpdateStrategy,
    /// Backend-specific `q` sent with every refresh. Passed through untouched.
    pub list_query: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    PersonsRefreshed(Vec<Person>),
    DraftCleared,
    Error(String),
}

#[derive(Default)]
struct ControllerState {
    persons: Vec<Person>,
    draft: PersonDraft,
    issued_refreshes: u64,
    applied_refresh: u64,
}

/// View-model over a remote person collection.
///
/// The displayed list is only ever replaced by a full refresh, issued after
/// each mutation. Refreshes may overlap; a response is applied only when no
/// later-issued refresh has been applied already, so the list never moves
/// back to an older snapshot.
pub struct PersonController {
    transport: Arc<dyn PersonTransport>,
    config: ControllerConfig,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<ControllerEvent>,
}

impl PersonController {
    pub fn new(transport: Arc<dyn PersonTransport>, config: ControllerConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            transport,
            config,
            inner: Mutex::new(ControllerState::default()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub async fn persons(&self) -> Vec<Person> {
        self.inner.lock().await.persons.clone()
    }

    pub async fn draft(&self) -> PersonDraft {
        self.inner.lock().await.draft.clone()
    }

    pub async fn set_draft_name(&self, name: impl Into<String>) {
        self.inner.lock().await.draft.name = name.into();
    }

    pub async fn set_draft_age(&self, age: Option<u32>) {
        self.inner.lock().await.draft.age = age;
    }

    pub async fn add_draft_character(&self, tag: impl Into<CharacterTag>) {
        self.inner.lock().await.draft.characters.push(tag.into());
    }

    pub async fn clear_draft(&self) {
        self.inner.lock().await.draft = PersonDraft::default();
        let _ = self.events.send(ControllerEvent::DraftCleared);
    }

    /// Full refresh using the configured query.
    pub async fn list(&self) -> Result<Vec<Person>, ClientError> {
        self.list_with_query(self.config.list_query.as_deref()).await
    }

    /// Full refresh with an explicit `q`. Returns what this request fetched,
    /// even if a newer refresh already replaced the displayed list.
    pub async fn list_with_query(&self, q: Option<&str>) -> Result<Vec<Person>, ClientError> {
        let seq = {
            let mut guard = self.inner.lock().await;
            guard.issued_refreshes += 1;
            guard.issued_refreshes
        };

        let fetched = match self.fetch_all(q).await {
            Ok(persons) => persons,
            Err(err) => {
                warn!(seq, error = %err, "person refresh failed; keeping displayed list");
                let _ = self.events.send(ControllerEvent::Error(err.to_string()));
                return Err(err);
            }
        };

        let applied = {
            let mut guard = self.inner.lock().await;
            if seq > guard.applied_refresh {
                guard.applied_refresh = seq;
                guard.persons = fetched.clone();
                true
            } else {
                false
            }
        };

        if applied {
            debug!(seq, count = fetched.len(), "person list refreshed");
            let _ = self
                .events
                .send(ControllerEvent::PersonsRefreshed(fetched.clone()));
        } else {
            debug!(seq, "discarding refresh overtaken by a later one");
        }
        Ok(fetched)
    }

    pub async fn get(&self, person_id: PersonId) -> Result<Person, ClientError> {
        let record = self.transport.get(person_id).await?;
        Ok(Person::try_from(record)?)
    }

    /// Submits the current draft. The draft survives a failed submission, and
    /// edits made while the request was in flight survive a successful one.
    pub async fn create(&self) -> Result<Person, ClientError> {
        let draft = self.draft().await;
        let new_person = draft.validate()?;

        let record = PersonRecord::from_new(&new_person);
        let created = self.transport.create(&record).await.map_err(|err| {
            warn!(error = %err, "create failed; draft kept");
            err
        })?;

        // Stored server-side from here on, so the submitted draft must not be resent.
        self.clear_submitted_draft(&draft).await;
        self.refresh_after("create").await;

        let created = Person::try_from(created).map_err(|err| {
            warn!(error = %err, "create stored but reply was unreadable");
            let err = ClientError::from(err);
            let _ = self.events.send(ControllerEvent::Error(err.to_string()));
            err
        })?;
        info!(person_id = %created.id, "person created");
        Ok(created)
    }

    /// Writes `person` back. The refresh runs whether or not the write succeeded,
    /// so a rejected edit is replaced by server state.
    pub async fn update(&self, person: &Person) -> Result<Person, ClientError> {
        let record = PersonRecord::from_person(person).with_bare_characters();
        let result = match self.config.update_strategy {
            UpdateStrategy::ReplaceStrippingTags => self.transport.update(person.id, &record).await,
            UpdateStrategy::ResubmitAsCreate => self.transport.create(&record).await,
        };
        if let Err(err) = &result {
            warn!(person_id = %person.id, error = %err, "update failed");
        }

        self.refresh_after("update").await;

        let updated = Person::try_from(result?)?;
        info!(person_id = %updated.id, strategy = %self.config.update_strategy, "person updated");
        Ok(updated)
    }

    pub async fn remove(&self, person: &Person) -> Result<(), ClientError> {
        self.transport.delete(person.id).await.map_err(|err| {
            warn!(person_id = %person.id, error = %err, "remove failed");
            err
        })?;
        info!(person_id = %person.id, "person removed");

        self.refresh_after("remove").await;
        Ok(())
    }

    async fn clear_submitted_draft(&self, submitted: &PersonDraft) {
        {
            let mut guard = self.inner.lock().await;
            if guard.draft != *submitted {
                debug!("draft edited during create; keeping edits");
                return;
            }
            guard.draft = PersonDraft::default();
        }
        let _ = self.events.send(ControllerEvent::DraftCleared);
    }

    async fn fetch_all(&self, q: Option<&str>) -> Result<Vec<Person>, ClientError> {
        self.transport
            .query(q)
            .await?
            .into_iter()
            .map(|record| Person::try_from(record).map_err(ClientError::from))
            .collect()
    }

    // The mutation already happened; a failed refresh is reported, not returned.
    async fn refresh_after(&self, operation: &'static str) {
        if let Err(err) = self.list().await {
            warn!(operation, error = %err, "refresh after mutation failed");
        }
    }
}
