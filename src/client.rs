use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::ans_version::AnsVersion;
use crate::content_type::ContentType;
use crate::document::{element_id, get_str, remove_path};
use crate::endpoints;
use crate::resolver::ReferenceKind;

/// Errors from the external fetch/submit layer
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("request to {url} failed with status {status}: {body}")]
    Http { url: String, status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("operation not supported: {0}")]
    Unsupported(String),
}

/// Acknowledgement returned by a successful submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitConfirmation {
    /// Id assigned by the target when it differs from the submitted one.
    pub id: Option<String>,
    pub status: u16,
}

/// One complaint from the target organization's ANS validator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnsViolation {
    /// Location in the document, empty when the validator gave none.
    pub path: String,
    pub message: String,
}

/// External capabilities the transformation core consumes.
///
/// Calls are awaited one at a time; nothing in the core issues them concurrently.
#[allow(async_fn_in_trait)]
pub trait ArcClient {
    /// Read one object. `Ok(None)` when the object does not exist.
    async fn fetch_ans(
        &self,
        org: &str,
        token: &str,
        content_type: ContentType,
        id: &str,
    ) -> Result<Option<Value>, ClientError>;

    /// Read every object of a collection-wide type (author roster, redirects).
    async fn fetch_collection(
        &self,
        org: &str,
        token: &str,
        content_type: ContentType,
    ) -> Result<Vec<Value>, ClientError>;

    async fn fetch_reference(
        &self,
        org: &str,
        token: &str,
        kind: ReferenceKind,
        id: &str,
    ) -> Result<Option<Value>, ClientError>;

    /// Id of a same-named reference record, if the org already has one.
    async fn find_reference_by_name(
        &self,
        org: &str,
        token: &str,
        kind: ReferenceKind,
        name: &str,
    ) -> Result<Option<String>, ClientError>;

    async fn create_reference(
        &self,
        org: &str,
        token: &str,
        kind: ReferenceKind,
        payload: &Value,
    ) -> Result<String, ClientError>;

    /// Redirects that point at `story_id` on `website`.
    async fn fetch_story_redirects(
        &self,
        org: &str,
        token: &str,
        story_id: &str,
        website: &str,
    ) -> Result<Vec<Value>, ClientError>;

    /// Check a document against the organization's ANS schema. An empty
    /// list means the document is accepted.
    async fn validate_ans(
        &self,
        org: &str,
        token: &str,
        version: &AnsVersion,
        document: &Value,
    ) -> Result<Vec<AnsViolation>, ClientError>;

    /// Submit a transformed document. `ClientError::Conflict` on an id collision.
    async fn submit_ans(
        &self,
        org: &str,
        token: &str,
        content_type: ContentType,
        document: &Value,
    ) -> Result<SubmitConfirmation, ClientError>;
}

/// `ArcClient` over the platform's REST APIs.
#[derive(Debug, Clone)]
pub struct HttpArcClient {
    http: reqwest::Client,
    source_website: Option<String>,
    page_size: usize,
}

impl HttpArcClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            source_website: None,
            page_size: 100,
        }
    }

    /// Website used when scanning or looking up redirects in the source org.
    pub fn with_source_website(mut self, website: Option<String>) -> Self {
        self.source_website = website;
        self
    }

    async fn get_json(
        &self,
        url: &str,
        token: &str,
        query: &[(&str, String)],
    ) -> Result<Option<Value>, ClientError> {
        debug!(url, "GET");
        let response = self.http.get(url).bearer_auth(token).query(query).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Http { url: url.to_string(), status: status.as_u16(), body });
        }
        Ok(Some(response.json().await?))
    }

    async fn send_post(
        &self,
        url: &str,
        token: &str,
        query: &[(&str, String)],
        body: &Value,
    ) -> Result<(StatusCode, String), ClientError> {
        debug!(url, "POST");
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .query(query)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        Ok((status, text))
    }

    async fn post_json(
        &self,
        url: &str,
        token: &str,
        query: &[(&str, String)],
        body: &Value,
    ) -> Result<(u16, Value), ClientError> {
        let (status, text) = self.send_post(url, token, query, body).await?;
        if status == StatusCode::CONFLICT {
            return Err(ClientError::Conflict(text));
        }
        if !status.is_success() {
            return Err(ClientError::Http { url: url.to_string(), status: status.as_u16(), body: text });
        }
        let value = if text.is_empty() { Value::Null } else { serde_json::from_str(&text).unwrap_or(Value::String(text)) };
        Ok((status.as_u16(), value))
    }

    /// Published draft revision of a story, with its circulations attached
    /// under a top-level `circulations` key.
    async fn fetch_story(&self, org: &str, token: &str, id: &str) -> Result<Option<Value>, ClientError> {
        let Some(draft) = self.get_json(&endpoints::draft_story_url(org, id), token, &[]).await? else {
            return Ok(None);
        };
        let revision = get_str(&draft, "draft_revision_id")
            .ok_or_else(|| ClientError::Decode(format!("story {id} has no draft_revision_id")))?
            .to_string();
        let Some(revision_doc) = self
            .get_json(&endpoints::draft_revision_url(org, id, &revision), token, &[])
            .await?
        else {
            return Ok(None);
        };
        let mut ans = revision_doc
            .get("ans")
            .cloned()
            .ok_or_else(|| ClientError::Decode(format!("story {id} revision has no ans")))?;
        let circulations = self
            .get_json(&endpoints::draft_circulations_url(org, id), token, &[])
            .await?
            .and_then(|c| c.get("circulations").cloned())
            .unwrap_or_else(|| json!([]));
        if let Value::Object(map) = &mut ans {
            map.insert("circulations".to_string(), circulations);
        }
        Ok(Some(ans))
    }

    async fn fetch_redirect(&self, org: &str, token: &str, website_url: &str) -> Result<Option<Value>, ClientError> {
        let website = self
            .source_website
            .as_deref()
            .ok_or_else(|| ClientError::Unsupported("redirect lookup needs a source website".to_string()))?;
        let found = self
            .get_json(&endpoints::redirect_url(org, website, website_url), token, &[])
            .await?;
        Ok(found.map(|mut redirect| {
            if let Value::Object(map) = &mut redirect {
                map.entry("redirect_url").or_insert_with(|| json!(website_url));
                map.insert("type".to_string(), json!("redirect"));
            }
            redirect
        }))
    }

    async fn scan_redirects(&self, org: &str, token: &str) -> Result<Vec<Value>, ClientError> {
        let website = self
            .source_website
            .clone()
            .ok_or_else(|| ClientError::Unsupported("redirect scan needs a source website".to_string()))?;
        let mut redirects = Vec::new();
        let mut next: Option<Value> = None;
        loop {
            let mut query = vec![
                ("website", website.clone()),
                ("q", "type:redirect".to_string()),
                ("size", self.page_size.to_string()),
            ];
            match &next {
                Some(Value::Number(from)) => query.push(("from", from.to_string())),
                Some(Value::String(scroll_id)) => query.push(("scrollId", scroll_id.clone())),
                _ => {}
            }
            let page = self
                .get_json(&endpoints::content_scan_url(org), token, &query)
                .await?
                .unwrap_or(Value::Null);
            let elements = page
                .get("content_elements")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            if elements.is_empty() {
                break;
            }
            redirects.extend(elements);
            next = page.get("next").cloned().filter(|n| !n.is_null());
            if next.is_none() {
                break;
            }
        }
        Ok(redirects)
    }

    async fn submit_migration(
        &self,
        org: &str,
        token: &str,
        content_type: ContentType,
        document: &Value,
    ) -> Result<SubmitConfirmation, ClientError> {
        let ans_type = endpoints::migration_ans_type(content_type)
            .ok_or_else(|| ClientError::Unsupported(format!("{content_type} is not submitted as ANS")))?;
        let mut ans = document.clone();
        let id = get_str(&ans, "_id")
            .ok_or_else(|| ClientError::Decode("document has no _id".to_string()))?
            .to_string();
        let mut body = json!({ "arcAdditionalProperties": {} });
        if content_type == ContentType::Story {
            let circulations = remove_path(&mut ans, "circulations").unwrap_or_else(|| json!([]));
            body["circulations"] = circulations;
            body["arcAdditionalProperties"] = json!({ "story": { "publish": true } });
        }
        body["ANS"] = ans;
        let query = [("ansId", id.clone()), ("ansType", ans_type.to_string())];
        let (status, _) = self
            .post_json(&endpoints::migration_center_ans_url(org), token, &query, &body)
            .await?;
        Ok(SubmitConfirmation { id: Some(id), status })
    }

    async fn submit_lightbox(&self, org: &str, token: &str, document: &Value) -> Result<SubmitConfirmation, ClientError> {
        let mut lightbox = document.clone();
        let photos: Vec<Value> = remove_path(&mut lightbox, "photos")
            .and_then(|p| p.as_array().cloned())
            .unwrap_or_default()
            .iter()
            .filter_map(|p| element_id(p).map(|id| json!(id)))
            .collect();
        let (status, created) = self
            .post_json(&endpoints::lightbox_url(org, None), token, &[], &lightbox)
            .await?;
        let new_id = get_str(&created, "id")
            .ok_or_else(|| ClientError::Decode("lightbox create returned no id".to_string()))?
            .to_string();
        if !photos.is_empty() {
            self.post_json(&endpoints::lightbox_photos_url(org, &new_id), token, &[], &Value::Array(photos))
                .await?;
        }
        Ok(SubmitConfirmation { id: Some(new_id), status })
    }
}

impl Default for HttpArcClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ArcClient for HttpArcClient {
    async fn fetch_ans(
        &self,
        org: &str,
        token: &str,
        content_type: ContentType,
        id: &str,
    ) -> Result<Option<Value>, ClientError> {
        match content_type {
            ContentType::Story => self.fetch_story(org, token, id).await,
            ContentType::Video => {
                let found = self
                    .get_json(&endpoints::video_url(org), token, &[("uuid", id.to_string())])
                    .await?;
                Ok(found.and_then(|v| match v {
                    Value::Array(mut items) if !items.is_empty() => Some(items.remove(0)),
                    Value::Array(_) => None,
                    other => Some(other),
                }))
            }
            ContentType::Gallery => self.get_json(&endpoints::gallery_url(org, id), token, &[]).await,
            ContentType::Image => self.get_json(&endpoints::photo_url(org, id), token, &[]).await,
            ContentType::Author => {
                self.get_json(&endpoints::author_url(org, "v1"), token, &[("_id", id.to_string())])
                    .await
            }
            ContentType::Redirect => self.fetch_redirect(org, token, id).await,
            ContentType::Lightbox => self.get_json(&endpoints::lightbox_url(org, Some(id)), token, &[]).await,
            ContentType::Collection => {
                let found = self.get_json(&endpoints::collection_url(org, Some(id)), token, &[]).await?;
                Ok(found.and_then(|c| c.get("data").cloned()))
            }
        }
    }

    async fn fetch_collection(
        &self,
        org: &str,
        token: &str,
        content_type: ContentType,
    ) -> Result<Vec<Value>, ClientError> {
        match content_type {
            ContentType::Author => {
                let roster = self
                    .get_json(&endpoints::all_authors_url(org), token, &[])
                    .await?
                    .unwrap_or(Value::Null);
                Ok(roster
                    .get("q_results")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default())
            }
            ContentType::Redirect => self.scan_redirects(org, token).await,
            other => Err(ClientError::Unsupported(format!("no collection listing for {other}"))),
        }
    }

    async fn fetch_reference(
        &self,
        org: &str,
        token: &str,
        kind: ReferenceKind,
        id: &str,
    ) -> Result<Option<Value>, ClientError> {
        self.get_json(&endpoints::reference_url(org, kind, Some(id)), token, &[]).await
    }

    async fn find_reference_by_name(
        &self,
        org: &str,
        token: &str,
        kind: ReferenceKind,
        name: &str,
    ) -> Result<Option<String>, ClientError> {
        let url = endpoints::reference_url(org, kind, None);
        let listing = match kind {
            ReferenceKind::Geographic => {
                self.get_json(&url, token, &[("name", name.to_string()), ("limit", "1".to_string())])
                    .await?
            }
            _ => self.get_json(&url, token, &[]).await?,
        };
        let Some(listing) = listing else {
            return Ok(None);
        };
        let rows = listing
            .get("rows")
            .or_else(|| listing.get("data"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(rows
            .iter()
            .find(|row| get_str(row, "name") == Some(name))
            .and_then(|row| get_str(row, "id"))
            .map(str::to_string))
    }

    async fn create_reference(
        &self,
        org: &str,
        token: &str,
        kind: ReferenceKind,
        payload: &Value,
    ) -> Result<String, ClientError> {
        let (_, created) = self
            .post_json(&endpoints::reference_url(org, kind, None), token, &[], payload)
            .await?;
        get_str(&created, "data.id")
            .or_else(|| get_str(&created, "id"))
            .map(str::to_string)
            .ok_or_else(|| ClientError::Decode(format!("{kind} create returned no id")))
    }

    async fn fetch_story_redirects(
        &self,
        org: &str,
        token: &str,
        story_id: &str,
        website: &str,
    ) -> Result<Vec<Value>, ClientError> {
        let found = self
            .get_json(&endpoints::story_redirects_url(org, story_id, website), token, &[])
            .await?;
        Ok(found
            .and_then(|listing| listing.get("redirects").and_then(Value::as_array).cloned())
            .unwrap_or_default())
    }

    async fn validate_ans(
        &self,
        org: &str,
        token: &str,
        version: &AnsVersion,
        document: &Value,
    ) -> Result<Vec<AnsViolation>, ClientError> {
        let url = endpoints::ans_validation_url(org, version);
        let (status, text) = self.send_post(&url, token, &[], document).await?;
        if status.is_success() {
            return Ok(Vec::new());
        }
        if status != StatusCode::BAD_REQUEST {
            return Err(ClientError::Http { url, status: status.as_u16(), body: text });
        }
        Ok(parse_violations(&text))
    }

    async fn submit_ans(
        &self,
        org: &str,
        token: &str,
        content_type: ContentType,
        document: &Value,
    ) -> Result<SubmitConfirmation, ClientError> {
        match content_type {
            ContentType::Story | ContentType::Video | ContentType::Gallery | ContentType::Image => {
                self.submit_migration(org, token, content_type, document).await
            }
            ContentType::Author => {
                let (status, _) = self
                    .post_json(&endpoints::author_url(org, "v2"), token, &[], document)
                    .await?;
                Ok(SubmitConfirmation { id: get_str(document, "_id").map(str::to_string), status })
            }
            ContentType::Redirect => {
                let website = get_str(document, "website")
                    .ok_or_else(|| ClientError::Decode("redirect has no website".to_string()))?;
                let website_url = get_str(document, "website_url")
                    .ok_or_else(|| ClientError::Decode("redirect has no website_url".to_string()))?;
                let body = json!({ "document_id": get_str(document, "document_id") });
                let (status, _) = self
                    .post_json(&endpoints::redirect_url(org, website, website_url), token, &[], &body)
                    .await?;
                Ok(SubmitConfirmation { id: Some(website_url.to_string()), status })
            }
            ContentType::Lightbox => self.submit_lightbox(org, token, document).await,
            ContentType::Collection => {
                let (status, created) = self
                    .post_json(&endpoints::collection_url(org, None), token, &[], document)
                    .await?;
                let id = get_str(&created, "data.id")
                    .or_else(|| get_str(&created, "id"))
                    .map(str::to_string);
                Ok(SubmitConfirmation { id, status })
            }
        }
    }
}

/// Read the validator's error list. Anything that is not a list of
/// `{dataPath|instancePath, message}` objects becomes a single violation.
fn parse_violations(body: &str) -> Vec<AnsViolation> {
    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(body) else {
        return vec![AnsViolation { path: String::new(), message: body.to_string() }];
    };
    items
        .iter()
        .map(|item| AnsViolation {
            path: get_str(item, "dataPath")
                .or_else(|| get_str(item, "instancePath"))
                .unwrap_or_default()
                .to_string(),
            message: get_str(item, "message")
                .map(str::to_string)
                .unwrap_or_else(|| item.to_string()),
        })
        .collect()
}
