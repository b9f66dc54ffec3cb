//! HTTP client for the in-house CRM, used to prefill identity fields for
//! returning clients.

use ade_quote_core::{ClientRecord, CrmAdapter, QuoteError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

pub struct HttpCrmAdapter {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct CrmEnvelope {
    success: bool,
    #[serde(default)]
    data: Vec<ClientRecord>,
    error: Option<String>,
}

impl HttpCrmAdapter {
    pub fn new(http: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            http,
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl CrmAdapter for HttpCrmAdapter {
    async fn search_by_name(&self, name: &str) -> Result<Vec<ClientRecord>> {
        let response = self
            .http
            .get(format!("{}/clients", self.base_url))
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| QuoteError::Adapter(format!("CRM request failed: {e}")))?
            .error_for_status()
            .map_err(|e| QuoteError::Adapter(format!("CRM returned an error status: {e}")))?;

        let envelope: CrmEnvelope = response
            .json()
            .await
            .map_err(|e| QuoteError::Adapter(format!("CRM payload unreadable: {e}")))?;

        if !envelope.success {
            return Err(QuoteError::Adapter(
                envelope
                    .error
                    .unwrap_or_else(|| "CRM answered success=false".to_string()),
            ));
        }

        let matches: Vec<ClientRecord> = envelope
            .data
            .into_iter()
            .filter(|record| matches_name(record, name))
            .collect();
        debug!(candidates = matches.len(), "CRM name search done");
        Ok(matches)
    }
}

/// The CRM endpoint lists every client; name filtering happens here. The
/// match runs in both directions so "Bidoux" finds "Guillaume Bidoux" and a
/// full name with a typo-free subset still matches.
fn matches_name(record: &ClientRecord, name: &str) -> bool {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return false;
    }
    let full = format!("{} {}", record.first_name, record.last_name).to_lowercase();
    full.contains(&needle) || needle.contains(&full)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(first: &str, last: &str) -> ClientRecord {
        ClientRecord {
            id: "c-1".into(),
            first_name: first.into(),
            last_name: last.into(),
            email: None,
            phone: None,
            birth_date: None,
            postal_code: None,
            professional_category: None,
        }
    }

    #[test]
    fn last_name_alone_matches() {
        assert!(matches_name(&record("Guillaume", "Bidoux"), "bidoux"));
    }

    #[test]
    fn full_name_matches_both_directions() {
        assert!(matches_name(&record("Guillaume", "Bidoux"), "Guillaume Bidoux"));
        assert!(matches_name(
            &record("Guillaume", "Bidoux"),
            "guillaume bidoux de paris"
        ));
    }

    #[test]
    fn unrelated_and_blank_names_do_not_match() {
        assert!(!matches_name(&record("Guillaume", "Bidoux"), "Alice Martin"));
        assert!(!matches_name(&record("Guillaume", "Bidoux"), "   "));
    }

    #[test]
    fn the_crm_envelope_shape_parses() {
        let payload = serde_json::json!({
            "success": true,
            "data": [{
                "id": "c-9",
                "first_name": "Guillaume",
                "last_name": "Bidoux",
                "email": "gbidoux@orange.fr",
                "phone": null,
                "birth_date": "1973-06-28",
                "postal_code": "75013",
                "professional_category": "salarié"
            }]
        });
        let envelope: CrmEnvelope = serde_json::from_value(payload).unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.data.len(), 1);
        assert_eq!(envelope.data[0].birth_date.as_deref(), Some("1973-06-28"));
    }
}
