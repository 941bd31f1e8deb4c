use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use tracing::debug;

use crate::dao::{
    game_store::GameStore,
    models::GameEntity,
    storage::{ETag, StorageResult, Versioned},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{CouchGameDocument, PutResponse, game_doc_id},
};

/// [`GameStore`] backed by CouchDB, using document revisions as concurrency tokens.
#[derive(Clone)]
pub struct CouchGameStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchGameStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    fn document_request(&self, method: Method, doc_id: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.database_url(), doc_id);
        self.request(method, &url)
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url();

        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .request(Method::PUT, &url)
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                // 412 means another instance created it in the meantime.
                if create.status().is_success() || create.status() == StatusCode::PRECONDITION_FAILED
                {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document(&self, doc_id: &str) -> CouchResult<CouchGameDocument> {
        let response = self
            .document_request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(CouchDaoError::DocumentMissing {
                path: doc_id.to_string(),
            }),
            status if status.is_success() => response
                .json::<CouchGameDocument>()
                .await
                .map_err(|source| CouchDaoError::DecodeResponse {
                    path: doc_id.to_string(),
                    source,
                }),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// `PUT` a document; CouchDB answers 409 when `_rev` is stale or, on
    /// create, when the document already exists.
    async fn put_document(&self, document: &CouchGameDocument) -> CouchResult<ETag> {
        let doc_id = document.id.as_str();
        let response = self
            .document_request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(put_status_error(status, document.rev.is_some(), doc_id));
        }

        let body = response
            .json::<PutResponse>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse {
                path: doc_id.to_string(),
                source,
            })?;
        debug!(doc_id, rev = %body.rev, "stored CouchDB document");
        Ok(ETag::new(body.rev))
    }
}

/// Classify a failed document `PUT`.
///
/// A `_rev` CouchDB cannot parse (a token minted by another backend, a typo)
/// is answered with 400 and can never match the stored revision, so it is a
/// conflict like a stale one.
fn put_status_error(status: StatusCode, has_rev: bool, doc_id: &str) -> CouchDaoError {
    let path = doc_id.to_string();
    match status {
        StatusCode::CONFLICT => CouchDaoError::RevisionConflict { path },
        StatusCode::BAD_REQUEST if has_rev => CouchDaoError::RevisionConflict { path },
        StatusCode::NOT_FOUND => CouchDaoError::DocumentMissing { path },
        other => CouchDaoError::RequestStatus {
            path,
            status: other,
        },
    }
}

impl GameStore for CouchGameStore {
    fn read(&self, key: &str) -> BoxFuture<'static, StorageResult<Versioned<GameEntity>>> {
        let store = self.clone();
        let doc_id = game_doc_id(key);
        Box::pin(async move {
            let document = store.get_document(&doc_id).await?;
            let rev = document
                .rev
                .ok_or_else(|| CouchDaoError::MissingRevision {
                    path: doc_id.clone(),
                })?;
            Ok(Versioned::new(document.game, ETag::new(rev)))
        })
    }

    fn create(&self, key: &str, entity: GameEntity) -> BoxFuture<'static, StorageResult<ETag>> {
        let store = self.clone();
        let document = CouchGameDocument::new(key, entity, None);
        Box::pin(async move { store.put_document(&document).await.map_err(Into::into) })
    }

    fn replace(
        &self,
        key: &str,
        entity: GameEntity,
        expected: ETag,
    ) -> BoxFuture<'static, StorageResult<ETag>> {
        let store = self.clone();
        let document = CouchGameDocument::new(key, entity, Some(&expected));
        Box::pin(async move { store.put_document(&document).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = store.database_url();
            let response = store
                .request(Method::GET, &url)
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
