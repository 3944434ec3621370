use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::PersonId,
    error::ApiError,
    protocol::{ListPersonsQuery, PersonRecord, PERSONS_COLLECTION},
};
use tracing::debug;
use url::Url;

use crate::error::ClientError;

/// CRUD binding for one person collection.
#[async_trait]
pub trait PersonTransport: Send + Sync {
    async fn query(&self, q: Option<&str>) -> Result<Vec<PersonRecord>, ClientError>;
    async fn get(&self, person_id: PersonId) -> Result<PersonRecord, ClientError>;
    async fn create(&self, record: &PersonRecord) -> Result<PersonRecord, ClientError>;
    async fn update(
        &self,
        person_id: PersonId,
        record: &PersonRecord,
    ) -> Result<PersonRecord, ClientError>;
    async fn delete(&self, person_id: PersonId) -> Result<(), ClientError>;
}

/// Where the collection lives: `{base}/{collection}` and `{base}/{collection}/{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: Url,
    collection: String,
}

impl Endpoint {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| ClientError::Validation(format!("invalid server url '{base_url}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::Validation(format!(
                "server url '{base_url}' cannot carry a path"
            )));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            base,
            collection: PERSONS_COLLECTION.to_string(),
        })
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into().trim_matches('/').to_string();
        self
    }

    pub fn collection_url(&self) -> Result<Url, ClientError> {
        self.join(&self.collection)
    }

    pub fn item_url(&self, person_id: PersonId) -> Result<Url, ClientError> {
        self.join(&format!("{}/{}", self.collection, person_id.0))
    }

    fn join(&self, path: &str) -> Result<Url, ClientError> {
        self.base
            .join(path)
            .map_err(|e| ClientError::Validation(format!("invalid resource path '{path}': {e}")))
    }
}

pub struct HttpPersonTransport {
    http: Client,
    endpoint: Endpoint,
}

impl HttpPersonTransport {
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    pub fn with_client(http: Client, endpoint: Endpoint) -> Self {
        Self { http, endpoint }
    }
}

#[async_trait]
impl PersonTransport for HttpPersonTransport {
    async fn query(&self, q: Option<&str>) -> Result<Vec<PersonRecord>, ClientError> {
        let url = self.endpoint.collection_url()?;
        debug!(%url, ?q, "GET persons");
        let response = self
            .http
            .get(url)
            .query(&ListPersonsQuery {
                q: q.map(str::to_string),
            })
            .send()
            .await?;
        decode(response).await
    }

    async fn get(&self, person_id: PersonId) -> Result<PersonRecord, ClientError> {
        let url = self.endpoint.item_url(person_id)?;
        debug!(%url, "GET person");
        let response = self.http.get(url).send().await?;
        decode(response).await
    }

    async fn create(&self, record: &PersonRecord) -> Result<PersonRecord, ClientError> {
        let url = self.endpoint.collection_url()?;
        debug!(%url, person_id = ?record.id, "POST person");
        let response = self.http.post(url).json(record).send().await?;
        decode(response).await
    }

    async fn update(
        &self,
        person_id: PersonId,
        record: &PersonRecord,
    ) -> Result<PersonRecord, ClientError> {
        let url = self.endpoint.item_url(person_id)?;
        debug!(%url, "PUT person");
        let response = self.http.put(url).json(record).send().await?;
        decode(response).await
    }

    async fn delete(&self, person_id: PersonId) -> Result<(), ClientError> {
        let url = self.endpoint.item_url(person_id)?;
        debug!(%url, "DELETE person");
        let response = self.http.delete(url).send().await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let response = check_status(response).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| ClientError::Decode(e.to_string()))
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiError>(&body)
        .map(|err| err.message)
        .unwrap_or_else(|_| {
            if body.is_empty() {
                status.to_string()
            } else {
                body
            }
        });

    Err(match status {
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ClientError::Validation(message)
        }
        _ => ClientError::Server {
            status: status.as_u16(),
            message,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_collection_and_item_paths() {
        let endpoint = Endpoint::new("http://localhost:9000").expect("endpoint");
        assert_eq!(
            endpoint.collection_url().expect("url").as_str(),
            "http://localhost:9000/persons"
        );
        assert_eq!(
            endpoint.item_url(PersonId(7)).expect("url").as_str(),
            "http://localhost:9000/persons/7"
        );
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let endpoint = Endpoint::new("http://localhost:9000/api")
            .expect("endpoint")
            .with_collection("/people/");
        assert_eq!(
            endpoint.item_url(PersonId(3)).expect("url").as_str(),
            "http://localhost:9000/api/people/3"
        );
    }

    #[test]
    fn endpoint_rejects_unparseable_urls() {
        assert!(matches!(
            Endpoint::new("not a url"),
            Err(ClientError::Validation(_))
        ));
        assert!(matches!(
            Endpoint::new("mailto:someone@example.com"),
            Err(ClientError::Validation(_))
        ));
    }
}
