//! Subscription listing DTOs.

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{SubscriptionStatus, SubscriptionSummary};

/// One pattern subscription as reported by the REST API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubscriptionDto {
    /// Channel pattern.
    pub pattern: String,
    /// Upstream status: `"subscribed"` or `"unsubscribed"`.
    pub status: String,
    /// Number of bound clients.
    pub clients: usize,
}

impl From<SubscriptionSummary> for SubscriptionDto {
    fn from(summary: SubscriptionSummary) -> Self {
        let status = match summary.status {
            SubscriptionStatus::Subscribed => "subscribed",
            SubscriptionStatus::Unsubscribed => "unsubscribed",
        };
        Self {
            pattern: summary.pattern.to_string(),
            status: status.to_string(),
            clients: summary.clients,
        }
    }
}

/// Response body for `GET /api/v1/subscriptions`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubscriptionListResponse {
    /// Live subscriptions sorted by pattern.
    pub subscriptions: Vec<SubscriptionDto>,
    /// Number of live subscriptions.
    pub total: usize,
}
