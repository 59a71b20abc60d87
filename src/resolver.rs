use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::client::{ArcClient, ClientError};
use crate::document::{get_str, remove_path};
use crate::error::{Result, TransferError};
use crate::session::TransformSession;

/// Org-scoped auxiliary records a document can point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Distributor,
    /// Content restriction attached to a distributor.
    Restriction,
    /// Geographic restriction (country / subdivision rules).
    Geographic,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReferenceKind::Distributor => "distributor",
            ReferenceKind::Restriction => "restriction",
            ReferenceKind::Geographic => "geographic",
        })
    }
}

/// How a target reference was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOrigin {
    /// Created in the target org by this session.
    Created,
    /// A same-named record already existed in the target org.
    Reused,
    /// Dry run: nothing was created, the id is a marker.
    Placeholder,
}

/// A source reference mapped to its target-org equivalent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedReference {
    pub kind: ReferenceKind,
    pub source_id: String,
    pub target_id: String,
    pub origin: ResolutionOrigin,
}

/// Result of a `resolve` call.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub reference: ResolvedReference,
    /// The mapping was already known to this session.
    pub cache_hit: bool,
}

/// Audit fields the settings API rejects on create.
const AUDIT_FIELDS: &[&str] = &["id", "createdAt", "createdBy", "modifiedAt", "modifiedBy"];

/// Org-identity fields that are meaningless in another organization.
const ORG_FIELDS: &[&str] = &["organizationId", "organization_id", "organization"];

/// Maps source-org references onto target-org references, creating them
/// in the target on first use. The mapping lives for one session.
#[derive(Debug, Default)]
pub struct ReferenceResolver {
    mappings: HashMap<(ReferenceKind, String), ResolvedReference>,
}

impl ReferenceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached(&self, kind: ReferenceKind, source_id: &str) -> Option<&ResolvedReference> {
        self.mappings.get(&(kind, source_id.to_string()))
    }

    pub fn mapping_count(&self) -> usize {
        self.mappings.len()
    }

    /// Placeholder id used in place of a reference a dry run would create.
    pub fn placeholder_id(kind: ReferenceKind, source_id: &str) -> String {
        format!("dry-run:{kind}:{source_id}")
    }

    pub async fn resolve<C: ArcClient>(
        &mut self,
        client: &C,
        session: &TransformSession,
        kind: ReferenceKind,
        source_id: &str,
    ) -> Result<Resolution> {
        if let Some(existing) = self.cached(kind, source_id) {
            debug!(%kind, source_id, target_id = %existing.target_id, "reference cache hit");
            return Ok(Resolution { reference: existing.clone(), cache_hit: true });
        }
        // Already a target id from this session (document transformed twice).
        if let Some(existing) = self.mappings.values().find(|r| r.kind == kind && r.target_id == source_id) {
            let reference = ResolvedReference {
                source_id: source_id.to_string(),
                ..existing.clone()
            };
            return Ok(Resolution { reference, cache_hit: true });
        }

        let reference = match kind {
            ReferenceKind::Distributor => self.resolve_distributor(client, session, source_id).await?,
            _ => self.resolve_leaf(client, session, kind, source_id).await?,
        };
        Ok(Resolution { reference, cache_hit: false })
    }

    /// Restrictions and geographic restrictions carry no nested references.
    async fn resolve_leaf<C: ArcClient>(
        &mut self,
        client: &C,
        session: &TransformSession,
        kind: ReferenceKind,
        source_id: &str,
    ) -> Result<ResolvedReference> {
        if let Some(existing) = self.cached(kind, source_id) {
            return Ok(existing.clone());
        }
        let record = self.fetch_source(client, session, kind, source_id).await?;
        if let Some(reference) = self.reuse_by_name(client, session, kind, source_id, &record).await? {
            return Ok(reference);
        }
        if session.dry_run {
            return Ok(self.remember_placeholder(kind, source_id));
        }

        let mut payload = record;
        scrub(&mut payload);
        if kind == ReferenceKind::Restriction {
            if let Some(website) = &session.target_website {
                rescope_websites(&mut payload, website);
            }
        }
        self.create(client, session, kind, source_id, &payload).await
    }

    async fn resolve_distributor<C: ArcClient>(
        &mut self,
        client: &C,
        session: &TransformSession,
        source_id: &str,
    ) -> Result<ResolvedReference> {
        let kind = ReferenceKind::Distributor;
        let record = self.fetch_source(client, session, kind, source_id).await?;
        if let Some(reference) = self.reuse_by_name(client, session, kind, source_id, &record).await? {
            return Ok(reference);
        }
        if session.dry_run {
            return Ok(self.remember_placeholder(kind, source_id));
        }

        let mut payload = record;
        scrub(&mut payload);
        let restriction_ids: Vec<String> = payload
            .get("restrictions")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(|r| get_str(r, "id").map(str::to_string)).collect())
            .unwrap_or_default();
        if payload.get("restrictions").is_some() {
            let mut restrictions = Vec::with_capacity(restriction_ids.len());
            for restriction_id in &restriction_ids {
                let resolved = self
                    .resolve_leaf(client, session, ReferenceKind::Restriction, restriction_id)
                    .await?;
                restrictions.push(json!({ "id": resolved.target_id }));
            }
            payload["restrictions"] = Value::Array(restrictions);
        }
        self.create(client, session, kind, source_id, &payload).await
    }

    async fn fetch_source<C: ArcClient>(
        &self,
        client: &C,
        session: &TransformSession,
        kind: ReferenceKind,
        source_id: &str,
    ) -> Result<Value> {
        match client
            .fetch_reference(&session.source_org, &session.source_token, kind, source_id)
            .await
        {
            Ok(Some(record)) => Ok(record),
            Ok(None) | Err(ClientError::NotFound(_)) => Err(TransferError::MissingReference {
                kind,
                id: source_id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn reuse_by_name<C: ArcClient>(
        &mut self,
        client: &C,
        session: &TransformSession,
        kind: ReferenceKind,
        source_id: &str,
        record: &Value,
    ) -> Result<Option<ResolvedReference>> {
        let Some(name) = get_str(record, "name") else {
            return Ok(None);
        };
        let existing = client
            .find_reference_by_name(&session.target_org, &session.target_token, kind, name)
            .await?;
        Ok(existing.map(|target_id| {
            debug!(%kind, source_id, %target_id, "reusing same-named reference in target");
            self.remember(kind, source_id, target_id, ResolutionOrigin::Reused)
        }))
    }

    async fn create<C: ArcClient>(
        &mut self,
        client: &C,
        session: &TransformSession,
        kind: ReferenceKind,
        source_id: &str,
        payload: &Value,
    ) -> Result<ResolvedReference> {
        let target_id = client
            .create_reference(&session.target_org, &session.target_token, kind, payload)
            .await?;
        info!(%kind, source_id, %target_id, target_org = %session.target_org, "created reference in target");
        Ok(self.remember(kind, source_id, target_id, ResolutionOrigin::Created))
    }

    fn remember_placeholder(&mut self, kind: ReferenceKind, source_id: &str) -> ResolvedReference {
        let placeholder = Self::placeholder_id(kind, source_id);
        self.remember(kind, source_id, placeholder, ResolutionOrigin::Placeholder)
    }

    fn remember(
        &mut self,
        kind: ReferenceKind,
        source_id: &str,
        target_id: String,
        origin: ResolutionOrigin,
    ) -> ResolvedReference {
        let reference = ResolvedReference {
            kind,
            source_id: source_id.to_string(),
            target_id,
            origin,
        };
        self.mappings.insert((kind, source_id.to_string()), reference.clone());
        reference
    }
}

fn scrub(payload: &mut Value) {
    for field in AUDIT_FIELDS.iter().chain(ORG_FIELDS) {
        remove_path(payload, field);
    }
}

fn rescope_websites(payload: &mut Value, website: &str) {
    if let Some(sites) = payload.get_mut("websites").and_then(Value::as_array_mut) {
        for site in sites {
            if let Value::Object(site) = site {
                site.insert("siteId".to_string(), json!(website));
            }
        }
    }
}
