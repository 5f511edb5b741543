//! Application status service
//!
//! General-purpose status changes made by banks. The backward
//! ACCEPTED -> SUBMITTED edge is reserved for expiration reconciliation and is
//! refused here.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::{Application, ApplicationStatus, ApplicationStatusView, DeclineApplicationRequest};
use crate::audit::{self, AuditAction, AuditEntry, AuditSink};
use crate::error::{DomainError, DomainResult};
use crate::lifecycle;
use crate::notification::{self, NotificationSink, NotificationType};
use crate::offer::OfferStatus;
use crate::store::{ApplicationRepository, OfferRepository};

#[derive(Clone)]
pub struct ApplicationService {
    applications: Arc<dyn ApplicationRepository>,
    offers: Arc<dyn OfferRepository>,
    audit: Arc<dyn AuditSink>,
    notifications: Arc<dyn NotificationSink>,
}

impl ApplicationService {
    pub fn new(
        applications: Arc<dyn ApplicationRepository>,
        offers: Arc<dyn OfferRepository>,
        audit: Arc<dyn AuditSink>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            applications,
            offers,
            audit,
            notifications,
        }
    }

    pub async fn get(&self, id: Uuid) -> DomainResult<Application> {
        self.applications
            .find_application(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Application", id))
    }

    /// Status and progress percentage for the borrower dashboard
    pub async fn status_view(&self, id: Uuid) -> DomainResult<ApplicationStatusView> {
        let application = self.get(id).await?;
        Ok(ApplicationStatusView::from(&application))
    }

    /// Move an application to `target` on behalf of a bank
    pub async fn update_status(
        &self,
        bank_id: Uuid,
        id: Uuid,
        target: ApplicationStatus,
    ) -> DomainResult<Application> {
        let application = self.get(id).await?;
        lifecycle::require_manual_application_transition(application.status, target)?;

        if matches!(
            target,
            ApplicationStatus::Accepted | ApplicationStatus::Completed
        ) {
            self.require_single_accepted_offer(&application, bank_id, target)
                .await?;
        }

        let updated = self
            .applications
            .update_application_status(id, application.status, target, Utc::now())
            .await?;

        tracing::info!(
            application_id = %id,
            bank_id = %bank_id,
            from = %application.status,
            to = %target,
            "Application status updated"
        );

        audit::record(
            self.audit.as_ref(),
            AuditEntry::new("Application", id, AuditAction::ApplicationStatusChanged)
                .with_old(json!({ "status": application.status }))
                .with_new(json!({ "status": target, "bank_id": bank_id })),
        )
        .await;

        notification::send(
            self.notifications.as_ref(),
            updated.borrower_id,
            NotificationType::ApplicationStatusChanged,
            format!("Your application is now {}", target),
            format!(
                "The status of application {} changed from {} to {}.",
                id, application.status, target
            ),
        )
        .await;

        Ok(updated)
    }

    /// Reject an application that has not reached the offer stage yet
    pub async fn decline(
        &self,
        bank_id: Uuid,
        id: Uuid,
        request: DeclineApplicationRequest,
    ) -> DomainResult<Application> {
        request
            .validate()
            .map_err(|e| DomainError::validation("reason", e.to_string()))?;

        let application = self.get(id).await?;
        if !application.status.is_before_offers() {
            return Err(DomainError::invalid_transition(
                application.status,
                ApplicationStatus::Rejected,
            ));
        }
        lifecycle::require_transition(application.status, ApplicationStatus::Rejected)?;

        let updated = self
            .applications
            .update_application_status(
                id,
                application.status,
                ApplicationStatus::Rejected,
                Utc::now(),
            )
            .await?;

        tracing::info!(
            application_id = %id,
            bank_id = %bank_id,
            from = %application.status,
            "Application declined"
        );

        audit::record(
            self.audit.as_ref(),
            AuditEntry::new("Application", id, AuditAction::ApplicationDeclined)
                .with_old(json!({ "status": application.status }))
                .with_new(json!({
                    "status": ApplicationStatus::Rejected,
                    "bank_id": bank_id,
                    "reason": request.reason,
                })),
        )
        .await;

        let body = match &request.reason {
            Some(reason) => format!("Your application {} was declined: {}", id, reason),
            None => format!("Your application {} was declined.", id),
        };
        notification::send(
            self.notifications.as_ref(),
            updated.borrower_id,
            NotificationType::ApplicationDeclined,
            "Your loan application was declined",
            body,
        )
        .await;

        Ok(updated)
    }

    async fn require_single_accepted_offer(
        &self,
        application: &Application,
        bank_id: Uuid,
        target: ApplicationStatus,
    ) -> DomainResult<()> {
        let accepted: Vec<_> = self
            .offers
            .list_offers_for_application(application.id)
            .await?
            .into_iter()
            .filter(|o| o.status == OfferStatus::Accepted)
            .collect();

        match accepted.as_slice() {
            [offer] if offer.bank_id == bank_id => Ok(()),
            [_] => Err(DomainError::Unauthorized(format!(
                "bank {} does not hold the accepted offer for application {}",
                bank_id, application.id
            ))),
            _ => Err(DomainError::Conflict(format!(
                "application {} needs exactly one ACCEPTED offer to move to {}, found {}",
                application.id,
                target,
                accepted.len()
            ))),
        }
    }
}
