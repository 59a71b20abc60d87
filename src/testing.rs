//! In-memory `ArcClient` for tests. Built with the `testing` feature.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use crate::ans_version::AnsVersion;
use crate::client::{AnsViolation, ArcClient, ClientError, SubmitConfirmation};
use crate::content_type::ContentType;
use crate::document::get_str;
use crate::resolver::ReferenceKind;

/// One call made against a [`MemoryClient`]
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCall {
    FetchAns { org: String, content_type: ContentType, id: String },
    FetchCollection { org: String, content_type: ContentType },
    FetchReference { org: String, kind: ReferenceKind, id: String },
    FindReferenceByName { org: String, kind: ReferenceKind, name: String },
    CreateReference { org: String, kind: ReferenceKind },
    FetchStoryRedirects { org: String, story_id: String, website: String },
    ValidateAns { org: String, id: String, version: String },
    SubmitAns { org: String, content_type: ContentType },
}

impl ClientCall {
    /// True for calls that write to an organization.
    pub fn is_write(&self) -> bool {
        matches!(self, ClientCall::CreateReference { .. } | ClientCall::SubmitAns { .. })
    }
}

#[derive(Debug, Default)]
struct Store {
    documents: HashMap<(String, ContentType, String), Value>,
    collections: HashMap<(String, ContentType), Vec<Value>>,
    references: HashMap<(String, ReferenceKind, String), Value>,
    story_redirects: HashMap<(String, String), Vec<Value>>,
    created: Vec<String>,
    submitted: Vec<(ContentType, Value)>,
    calls: Vec<ClientCall>,
    next_id: usize,
}

/// `ArcClient` backed by maps, recording every call.
#[derive(Debug, Default)]
pub struct MemoryClient {
    store: Mutex<Store>,
    submit_conflicts: HashSet<String>,
    violations: HashMap<String, Vec<AnsViolation>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_document(self, org: &str, content_type: ContentType, id: &str, document: Value) -> Self {
        self.store()
            .documents
            .insert((org.to_string(), content_type, id.to_string()), document);
        self
    }

    pub fn with_collection(self, org: &str, content_type: ContentType, items: Vec<Value>) -> Self {
        self.store().collections.insert((org.to_string(), content_type), items);
        self
    }

    pub fn with_reference(self, org: &str, kind: ReferenceKind, id: &str, record: Value) -> Self {
        self.store()
            .references
            .insert((org.to_string(), kind, id.to_string()), record);
        self
    }

    /// Redirects listed for `story_id` in `org`, whatever the website.
    pub fn with_story_redirects(self, org: &str, story_id: &str, redirects: Vec<Value>) -> Self {
        self.store()
            .story_redirects
            .insert((org.to_string(), story_id.to_string()), redirects);
        self
    }

    /// ANS validation rejects the document with this `_id`.
    pub fn with_ans_violation(mut self, id: &str, path: &str, message: &str) -> Self {
        self.violations.entry(id.to_string()).or_default().push(AnsViolation {
            path: path.to_string(),
            message: message.to_string(),
        });
        self
    }

    /// Submitting a document with this id fails with `ClientError::Conflict`.
    pub fn with_submit_conflict(mut self, id: &str) -> Self {
        self.submit_conflicts.insert(id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<ClientCall> {
        self.store().calls.clone()
    }

    /// Ids of references created, in creation order.
    pub fn created_references(&self) -> Vec<String> {
        self.store().created.clone()
    }

    pub fn submitted(&self) -> Vec<(ContentType, Value)> {
        self.store().submitted.clone()
    }

    pub fn document(&self, org: &str, content_type: ContentType, id: &str) -> Option<Value> {
        self.store()
            .documents
            .get(&(org.to_string(), content_type, id.to_string()))
            .cloned()
    }

    pub fn reference(&self, org: &str, kind: ReferenceKind, id: &str) -> Option<Value> {
        self.store()
            .references
            .get(&(org.to_string(), kind, id.to_string()))
            .cloned()
    }
}

/// Key a submitted document is stored under.
fn submitted_id(content_type: ContentType, document: &Value, fallback: usize) -> String {
    let id = match content_type {
        ContentType::Redirect => get_str(document, "website_url"),
        _ => get_str(document, "_id"),
    };
    id.map(str::to_string)
        .unwrap_or_else(|| format!("{content_type}-{fallback}"))
}

impl ArcClient for MemoryClient {
    async fn fetch_ans(
        &self,
        org: &str,
        _token: &str,
        content_type: ContentType,
        id: &str,
    ) -> Result<Option<Value>, ClientError> {
        let mut store = self.store();
        store.calls.push(ClientCall::FetchAns {
            org: org.to_string(),
            content_type,
            id: id.to_string(),
        });
        Ok(store
            .documents
            .get(&(org.to_string(), content_type, id.to_string()))
            .cloned())
    }

    async fn fetch_collection(
        &self,
        org: &str,
        _token: &str,
        content_type: ContentType,
    ) -> Result<Vec<Value>, ClientError> {
        let mut store = self.store();
        store.calls.push(ClientCall::FetchCollection {
            org: org.to_string(),
            content_type,
        });
        Ok(store
            .collections
            .get(&(org.to_string(), content_type))
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_reference(
        &self,
        org: &str,
        _token: &str,
        kind: ReferenceKind,
        id: &str,
    ) -> Result<Option<Value>, ClientError> {
        let mut store = self.store();
        store.calls.push(ClientCall::FetchReference {
            org: org.to_string(),
            kind,
            id: id.to_string(),
        });
        Ok(store.references.get(&(org.to_string(), kind, id.to_string())).cloned())
    }

    async fn find_reference_by_name(
        &self,
        org: &str,
        _token: &str,
        kind: ReferenceKind,
        name: &str,
    ) -> Result<Option<String>, ClientError> {
        let mut store = self.store();
        store.calls.push(ClientCall::FindReferenceByName {
            org: org.to_string(),
            kind,
            name: name.to_string(),
        });
        Ok(store
            .references
            .iter()
            .find(|((o, k, _), record)| o == org && *k == kind && get_str(record, "name") == Some(name))
            .map(|((_, _, id), _)| id.clone()))
    }

    async fn create_reference(
        &self,
        org: &str,
        _token: &str,
        kind: ReferenceKind,
        payload: &Value,
    ) -> Result<String, ClientError> {
        let mut store = self.store();
        store.calls.push(ClientCall::CreateReference {
            org: org.to_string(),
            kind,
        });
        store.next_id += 1;
        let id = format!("{org}-{kind}-{}", store.next_id);
        let mut record = payload.clone();
        if let Value::Object(map) = &mut record {
            map.insert("id".to_string(), Value::String(id.clone()));
        }
        store.references.insert((org.to_string(), kind, id.clone()), record);
        store.created.push(id.clone());
        Ok(id)
    }

    async fn fetch_story_redirects(
        &self,
        org: &str,
        _token: &str,
        story_id: &str,
        website: &str,
    ) -> Result<Vec<Value>, ClientError> {
        let mut store = self.store();
        store.calls.push(ClientCall::FetchStoryRedirects {
            org: org.to_string(),
            story_id: story_id.to_string(),
            website: website.to_string(),
        });
        Ok(store
            .story_redirects
            .get(&(org.to_string(), story_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn validate_ans(
        &self,
        org: &str,
        _token: &str,
        version: &AnsVersion,
        document: &Value,
    ) -> Result<Vec<AnsViolation>, ClientError> {
        let id = get_str(document, "_id").unwrap_or_default().to_string();
        self.store().calls.push(ClientCall::ValidateAns {
            org: org.to_string(),
            id: id.clone(),
            version: version.to_string(),
        });
        Ok(self.violations.get(&id).cloned().unwrap_or_default())
    }

    async fn submit_ans(
        &self,
        org: &str,
        _token: &str,
        content_type: ContentType,
        document: &Value,
    ) -> Result<SubmitConfirmation, ClientError> {
        let mut store = self.store();
        store.calls.push(ClientCall::SubmitAns {
            org: org.to_string(),
            content_type,
        });
        store.next_id += 1;
        let id = submitted_id(content_type, document, store.next_id);
        if self.submit_conflicts.contains(&id) {
            return Err(ClientError::Conflict(format!("{content_type} {id} already exists in {org}")));
        }
        store.submitted.push((content_type, document.clone()));
        store
            .documents
            .insert((org.to_string(), content_type, id.clone()), document.clone());
        Ok(SubmitConfirmation { id: Some(id), status: 200 })
    }
}
