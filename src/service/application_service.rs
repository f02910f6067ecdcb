use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::{
    domain::*,
    error::{AppError, Result},
    repository::ApplicationRepository,
};

pub struct ApplicationService {
    repo: Arc<dyn ApplicationRepository>,
}

impl ApplicationService {
    pub fn new(repo: Arc<dyn ApplicationRepository>) -> Self {
        Self { repo }
    }

    /// The caller's application, if one has been started.
    pub async fn load(&self, user_id: Uuid) -> Result<Option<Application>> {
        self.repo.find_by_user(user_id).await
    }

    pub async fn save_section(&self, user_id: Uuid, section: Section, data: Value) -> Result<Application> {
        let update = SectionUpdate::from_payload(section, data)?;
        let application = self.repo.save_section(user_id, &update).await?;
        tracing::debug!("Saved {} for user {}", section.as_str(), user_id);
        Ok(application)
    }

    /// Applies every provided section in order. Used when a submission carries
    /// the form inline instead of saving it step by step.
    pub async fn save_sections(&self, user_id: Uuid, sections: Vec<(Section, Value)>) -> Result<Option<Application>> {
        let mut latest = None;
        for (section, data) in sections {
            latest = Some(self.save_section(user_id, section, data).await?);
        }
        Ok(latest)
    }

    pub async fn progress(&self, user_id: Uuid) -> Result<SectionProgress> {
        Ok(match self.repo.find_by_user(user_id).await? {
            Some(application) => application.progress(),
            None => SectionProgress::empty(),
        })
    }

    pub async fn list_with_owner(&self) -> Result<Vec<ApplicationWithOwner>> {
        self.repo.list_with_owner().await
    }

    pub async fn stats(&self) -> Result<ApplicationStats> {
        self.repo.stats().await
    }

    pub async fn set_approval(&self, id: Uuid, status: ApprovalStatus) -> Result<Application> {
        let application = self
            .repo
            .update_approval(id, status)
            .await?
            .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;
        tracing::info!("Application {} marked {}", id, status.as_str());
        Ok(application)
    }
}
