//! Returns (devoluciones): opening, evidence, admin decision, cancellation.

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use chrono::Utc;
use sqlx::PgPool;

use domain::models::lead_return::{
    AttachmentKind, EvidenceFile, ListReturnsQuery, RequestReturnBody, ResolveReturnBody,
    SubmitEvidenceBody,
};
use domain::models::{Actor, Attachment, Lead, LeadReturn, Role};
use domain::services::returns;
use domain::LeadError;
use persistence::entities::{AttachmentEntity, LeadReturnEntity};
use persistence::repositories::{LeadRepository, LeadReturnRepository, NewAttachment, ReturnScope};

use crate::middleware::metrics::record_lead_return;
use crate::services::blob_store::{sanitize_file_name, BlobStore};
use crate::services::{load_lead, lost_race};

/// Decodes an uploaded file and checks its size.
fn decode_evidence(file: &EvidenceFile, max_bytes: usize) -> Result<Vec<u8>, LeadError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(file.data.trim())
        .map_err(|_| {
            LeadError::Validation(format!("{} is not valid base64 data", file.file_name))
        })?;
    if bytes.is_empty() {
        return Err(LeadError::Validation(format!("{} is empty", file.file_name)));
    }
    if bytes.len() > max_bytes {
        return Err(LeadError::Validation(format!(
            "{} exceeds the {} byte attachment limit",
            file.file_name, max_bytes
        )));
    }
    Ok(bytes)
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub struct LeadReturnService {
    pool: PgPool,
    blobs: Arc<dyn BlobStore>,
    max_attachment_bytes: usize,
}

impl LeadReturnService {
    pub fn new(pool: PgPool, blobs: Arc<dyn BlobStore>, max_attachment_bytes: usize) -> Self {
        Self {
            pool,
            blobs,
            max_attachment_bytes,
        }
    }

    fn returns(&self) -> LeadReturnRepository {
        LeadReturnRepository::new(self.pool.clone())
    }

    fn leads(&self) -> LeadRepository {
        LeadRepository::new(self.pool.clone())
    }

    async fn load(&self, id: i64) -> Result<LeadReturnEntity, LeadError> {
        self.returns()
            .find_by_id(id)
            .await?
            .ok_or_else(|| LeadError::NotFound(format!("Return {}", id)))
    }

    /// Loads a return with its lead, hiding it from callers who may not
    /// see it.
    async fn load_visible(&self, actor: &Actor, id: i64) -> Result<(LeadReturn, Lead), LeadError> {
        let ret = LeadReturn::from(self.load(id).await?);
        let lead = load_lead(&self.leads(), ret.lead_id).await?;
        if !returns::can_view(&ret, &lead, actor) {
            return Err(LeadError::NotFound(format!("Return {}", id)));
        }
        Ok((ret, lead))
    }

    async fn with_attachments(&self, entity: LeadReturnEntity) -> Result<LeadReturn, LeadError> {
        let attachments = self.returns().attachments_for(&[entity.id]).await?;
        Ok(entity.into_domain(attachments))
    }

    /// Flags a lead for return and opens the return record.
    pub async fn request(
        &self,
        actor: &Actor,
        lead_id: i64,
        body: &RequestReturnBody,
    ) -> Result<LeadReturn, LeadError> {
        let leads = self.leads();
        let lead = load_lead(&leads, lead_id).await?;
        let patch = returns::request_return(&lead, actor)?;

        let opened = self
            .returns()
            .open(&lead, &patch, actor.user_id, trimmed(body.reason.as_deref()), Utc::now())
            .await;

        let entity = match opened {
            Ok(Some(entity)) => entity,
            Ok(None) => return Err(lost_race(&leads, &lead).await),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
                return Err(LeadError::conflict(format!(
                    "Lead {} already has an open return",
                    lead_id
                )))
            }
            Err(e) => return Err(e.into()),
        };

        record_lead_return("pendiente");
        tracing::info!(
            return_id = entity.id,
            lead_id,
            company_id = ?lead.company_id,
            user_id = actor.user_id,
            "Return requested"
        );
        Ok(entity.into())
    }

    pub async fn list(
        &self,
        actor: &Actor,
        query: &ListReturnsQuery,
    ) -> Result<Vec<LeadReturn>, LeadError> {
        let scope = match actor.role {
            Role::Admin => ReturnScope::default(),
            Role::Coordinator => ReturnScope {
                company_id: actor.company_id,
                requested_by: None,
            },
            Role::Agent => ReturnScope {
                company_id: None,
                requested_by: Some(actor.user_id),
            },
        };

        let repo = self.returns();
        let entities = repo.list(scope, query.open_only).await?;
        let ids: Vec<i64> = entities.iter().map(|r| r.id).collect();

        let mut grouped: HashMap<i64, Vec<AttachmentEntity>> = HashMap::new();
        for attachment in repo.attachments_for(&ids).await? {
            grouped.entry(attachment.return_id).or_default().push(attachment);
        }

        Ok(entities
            .into_iter()
            .map(|entity| {
                let attachments = grouped.remove(&entity.id).unwrap_or_default();
                entity.into_domain(attachments)
            })
            .collect())
    }

    pub async fn get(&self, actor: &Actor, id: i64) -> Result<LeadReturn, LeadError> {
        let (ret, _) = self.load_visible(actor, id).await?;
        let attachments = self.returns().attachments_for(&[ret.id]).await?;
        Ok(LeadReturn {
            attachments: attachments.into_iter().map(Attachment::from).collect(),
            ..ret
        })
    }

    /// Stores evidence files and moves the return to `tramite`.
    pub async fn submit_evidence(
        &self,
        actor: &Actor,
        id: i64,
        body: &SubmitEvidenceBody,
    ) -> Result<LeadReturn, LeadError> {
        let (ret, lead) = self.load_visible(actor, id).await?;
        returns::submit_evidence(&ret, &lead, actor)?;

        let files: Vec<(AttachmentKind, &EvidenceFile)> = [
            (AttachmentKind::Audio, body.audio.as_ref()),
            (AttachmentKind::Image, body.image.as_ref()),
        ]
        .into_iter()
        .filter_map(|(kind, file)| file.map(|f| (kind, f)))
        .collect();

        let mut decoded = Vec::with_capacity(files.len());
        for (kind, file) in &files {
            decoded.push((*kind, *file, decode_evidence(file, self.max_attachment_bytes)?));
        }

        let mut stored: Vec<NewAttachment> = Vec::with_capacity(decoded.len());
        for (kind, file, bytes) in &decoded {
            let file_name = sanitize_file_name(&file.file_name);
            let path = format!("{}/{}-{}", id, uuid::Uuid::new_v4(), file_name);
            if let Err(err) = self.blobs.put(kind.bucket(), &path, bytes).await {
                self.discard(&stored).await;
                return Err(err.into());
            }
            stored.push(NewAttachment {
                kind: (*kind).into(),
                bucket: kind.bucket().to_string(),
                path,
                file_name,
                size_bytes: bytes.len() as i64,
            });
        }

        let submitted = self
            .returns()
            .submit_evidence(id, &stored, trimmed(body.reason.as_deref()))
            .await;

        match submitted {
            Ok(Some((entity, added))) => {
                record_lead_return("tramite");
                tracing::info!(
                    return_id = id,
                    lead_id = lead.id,
                    user_id = actor.user_id,
                    files = added.len(),
                    "Return evidence submitted"
                );
                self.with_attachments(entity).await
            }
            Ok(None) => {
                self.discard(&stored).await;
                Err(LeadError::conflict(format!(
                    "Return {} is no longer pendiente",
                    id
                )))
            }
            Err(e) => {
                self.discard(&stored).await;
                Err(e.into())
            }
        }
    }

    /// Best-effort removal of blobs whose metadata was never recorded.
    async fn discard(&self, stored: &[NewAttachment]) {
        for attachment in stored {
            if let Err(e) = self.blobs.delete(&attachment.bucket, &attachment.path).await {
                tracing::warn!(
                    bucket = %attachment.bucket,
                    path = %attachment.path,
                    error = %e,
                    "Failed to remove orphaned evidence file"
                );
            }
        }
    }

    /// Bytes of one evidence file.
    pub async fn download(
        &self,
        actor: &Actor,
        id: i64,
        attachment_id: i64,
    ) -> Result<(Attachment, Vec<u8>), LeadError> {
        self.load_visible(actor, id).await?;
        let attachment = self
            .returns()
            .find_attachment(id, attachment_id)
            .await?
            .map(Attachment::from)
            .ok_or_else(|| LeadError::NotFound(format!("Attachment {}", attachment_id)))?;

        let bytes = self.blobs.get(&attachment.bucket, &attachment.path).await?;
        Ok((attachment, bytes))
    }

    /// Admin decision on a return in `tramite`.
    pub async fn resolve(
        &self,
        actor: &Actor,
        id: i64,
        body: &ResolveReturnBody,
    ) -> Result<LeadReturn, LeadError> {
        let ret = LeadReturn::from(self.load(id).await?);
        let resolution = returns::resolve(&ret, actor, body.decision, body.comment.as_deref())?;

        let entity = self
            .returns()
            .resolve(
                id,
                resolution.status.into(),
                resolution.comment.as_deref(),
                Utc::now(),
            )
            .await?
            .ok_or_else(|| LeadError::conflict(format!("Return {} is no longer in tramite", id)))?;

        record_lead_return(resolution.status.as_str());
        tracing::info!(
            return_id = id,
            lead_id = ret.lead_id,
            user_id = actor.user_id,
            status = resolution.status.as_str(),
            "Return resolved"
        );
        self.with_attachments(entity).await
    }

    /// Cancels an open return and puts its lead back to work.
    pub async fn cancel(&self, actor: &Actor, id: i64) -> Result<LeadReturn, LeadError> {
        let ret = LeadReturn::from(self.load(id).await?);
        let lead = load_lead(&self.leads(), ret.lead_id).await?;
        let patch = returns::cancel(&ret, &lead, actor)?;

        let (entity, _) = self
            .returns()
            .cancel(id, &patch, Utc::now())
            .await?
            .ok_or_else(|| LeadError::conflict(format!("Return {} is no longer open", id)))?;

        record_lead_return("cancelado");
        tracing::info!(
            return_id = id,
            lead_id = lead.id,
            user_id = actor.user_id,
            "Return cancelled; lead restored"
        );
        self.with_attachments(entity).await
    }
}
