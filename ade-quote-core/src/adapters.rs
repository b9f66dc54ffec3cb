//! Contracts of the external collaborators: field extractor, CRM lookup and
//! pricing provider. The core consumes these, the service crate implements
//! them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::{ExtractedFields, SessionContext};
use crate::error::Result;
use crate::offers::TarificationResponse;
use crate::pricing::{ScenarioRecord, TarificationRequest};

/// Structured-field extraction over one chat message.
///
/// Infallible by contract: implementations must degrade to the empty partial
/// on any internal failure (malformed model output, transport errors), never
/// abort the turn.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        message: &str,
        existing: Option<&SessionContext>,
    ) -> ExtractedFields;
}

/// Client record as returned by the CRM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<String>,
    pub postal_code: Option<String>,
    pub professional_category: Option<String>,
}

/// Name-based CRM client search. The core only consumes the first match.
#[async_trait]
pub trait CrmAdapter: Send + Sync {
    async fn search_by_name(&self, name: &str) -> Result<Vec<ClientRecord>>;
}

/// Authenticated pricing provider calls.
#[async_trait]
pub trait PricingAdapter: Send + Sync {
    /// One tarification call, one pricing mode.
    async fn quote(&self, request: &TarificationRequest) -> Result<TarificationResponse>;

    /// Persist the provisionally selected offer as a business record.
    async fn create_business_record(
        &self,
        external_record_id: &str,
        scenario: &ScenarioRecord,
    ) -> Result<()>;
}
