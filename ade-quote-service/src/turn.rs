//! One chat turn, end to end: extract, prefill, merge, gate, quote.

use std::sync::Arc;

use ade_quote_core::{
    build_coverage_lines, build_tarification_request, default_coverages, merge_context,
    rank_offers, resolve_missing, resolved_coverages, ContextStore, ContextUpdate, CoveragePolicy,
    CrmAdapter, ExtractedFields, Extractor, Offer, PricingAdapter, PricingMode, QuoteError,
    QuoteStage, Result, SessionContext, DEFAULT_ITT_DEDUCTIBLE_DAYS, DEFAULT_QUOTITY,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::messages;

pub struct TurnEngine {
    store: Arc<dyn ContextStore>,
    extractor: Arc<dyn Extractor>,
    crm: Arc<dyn CrmAdapter>,
    pricing: Arc<dyn PricingAdapter>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub message: String,
    pub stage: QuoteStage,
    pub missing_fields: Vec<String>,
    pub offers: Vec<Offer>,
}

impl TurnEngine {
    pub fn new(
        store: Arc<dyn ContextStore>,
        extractor: Arc<dyn Extractor>,
        crm: Arc<dyn CrmAdapter>,
        pricing: Arc<dyn PricingAdapter>,
    ) -> Self {
        Self {
            store,
            extractor,
            crm,
            pricing,
        }
    }

    pub async fn process_message(&self, session_key: &str, message: &str) -> Result<TurnOutcome> {
        let existing = self.store.get(session_key).await?;
        let extracted = self.extractor.extract(message, existing.as_ref()).await;

        let crm_update = self.crm_prefill(existing.as_ref(), &extracted).await;
        let user_update = merge_context(existing.as_ref(), &extracted);
        // The user's own words win over the CRM prefill within the turn.
        let mut update = crm_update.overlay(user_update);

        // Project the post-merge state so the stage lands in the same write.
        let mut projected = existing.clone().unwrap_or_default();
        projected.apply(&update);
        let missing = resolve_missing(Some(&projected));
        let policy = default_coverages(
            projected.property_type.as_deref().unwrap_or_default(),
            projected.loan_type.unwrap_or_default(),
        );
        let stage = QuoteStage::evaluate(&projected, &policy, &missing);
        update.stage = Some(stage);

        let context = self.store.upsert(session_key, &update).await?;

        info!(
            session_key = %session_key,
            stage = ?stage,
            missing_count = missing.len(),
            "turn merged"
        );

        match stage {
            QuoteStage::Collecting => Ok(TurnOutcome {
                message: messages::collecting(&context, &missing),
                stage,
                missing_fields: missing.iter().map(|f| f.key().to_string()).collect(),
                offers: vec![],
            }),
            QuoteStage::CoveragePending => Ok(TurnOutcome {
                message: messages::coverage_pending(&context, &policy),
                stage,
                missing_fields: vec![],
                offers: vec![],
            }),
            QuoteStage::Quoting | QuoteStage::Quoted => {
                self.quote(session_key, &context, &policy).await
            }
        }
    }

    /// CRM lookup for a self-declared returning client, at most once per
    /// session. An outage degrades to a plain conversation.
    async fn crm_prefill(
        &self,
        existing: Option<&SessionContext>,
        extracted: &ExtractedFields,
    ) -> ContextUpdate {
        let already_prefilled = existing.is_some_and(|c| c.crm_snapshot.is_some());
        if extracted.est_client_existant != Some(true) || already_prefilled {
            return ContextUpdate::default();
        }
        let Some(name) = extracted
            .nom_complet
            .clone()
            .or_else(|| existing.and_then(|c| c.full_name.clone()))
        else {
            return ContextUpdate::default();
        };

        match self.crm.search_by_name(&name).await {
            Ok(records) => match records.first() {
                Some(record) => {
                    info!(client_id = %record.id, "CRM client matched, prefilling context");
                    let mut update =
                        merge_context(existing, &ExtractedFields::from_client_record(record));
                    update.crm_snapshot = serde_json::to_value(record).ok();
                    update
                }
                None => {
                    info!(name = %name, "no CRM client matched");
                    ContextUpdate::default()
                }
            },
            Err(e) => {
                warn!(error = %e, "CRM lookup failed, continuing without prefill");
                ContextUpdate::default()
            }
        }
    }

    async fn quote(
        &self,
        session_key: &str,
        context: &SessionContext,
        policy: &CoveragePolicy,
    ) -> Result<TurnOutcome> {
        let codes = resolved_coverages(policy, context.coverage_choice.as_ref());
        let lines = build_coverage_lines(
            &codes,
            context.quotity.unwrap_or(DEFAULT_QUOTITY),
            DEFAULT_ITT_DEDUCTIBLE_DAYS,
        );

        let crd_request =
            build_tarification_request(session_key, context, PricingMode::Crd, lines.clone())?;
        let fixe_request =
            build_tarification_request(session_key, context, PricingMode::Fixe, lines)?;

        // Both modes fly together; one failing leaves the other's offers
        // usable.
        let (crd, fixe) = tokio::join!(
            self.pricing.quote(&crd_request),
            self.pricing.quote(&fixe_request)
        );

        let mut responses = Vec::new();
        for (mode, outcome) in [(PricingMode::Crd, crd), (PricingMode::Fixe, fixe)] {
            match outcome {
                Ok(response) => responses.push((mode, response)),
                Err(e) => warn!(mode = mode.wire(), error = %e, "tarification call failed"),
            }
        }
        // A total provider outage is still a conversational outcome, not a
        // failed turn: the context is saved and the user can retry.
        if responses.is_empty() {
            return Ok(TurnOutcome {
                message: messages::no_offer("le tarificateur est injoignable"),
                stage: QuoteStage::Quoting,
                missing_fields: vec![],
                offers: vec![],
            });
        }

        let ranking = match rank_offers(responses) {
            Ok(ranking) => ranking,
            Err(QuoteError::NoQualifyingOffer(diagnostic)) => {
                info!(session_key = %session_key, "no qualifying offer");
                return Ok(TurnOutcome {
                    message: messages::no_offer(&diagnostic),
                    stage: QuoteStage::Quoting,
                    missing_fields: vec![],
                    offers: vec![],
                });
            }
            Err(e) => return Err(e),
        };

        // Persist the provisionally selected offer; a failure here is
        // reported alongside the offers, never substituted for them.
        let mut record_saved = None;
        if let Some(best) = ranking.cheapest() {
            let scenario = if best.mode == PricingMode::Fixe {
                &fixe_request.scenario_record_data_model
            } else {
                &crd_request.scenario_record_data_model
            };
            let record_id = format!("ADE-{session_key}");
            match self
                .pricing
                .create_business_record(&record_id, scenario)
                .await
            {
                Ok(()) => record_saved = Some(true),
                Err(e) => {
                    warn!(error = %e, "business record creation failed, offers still reported");
                    record_saved = Some(false);
                }
            }
        }

        // Stage-only second write: losing it costs a redundant requote on
        // the next message, never the offers.
        let stage_update = ContextUpdate {
            stage: Some(QuoteStage::Quoted),
            ..ContextUpdate::default()
        };
        if let Err(e) = self.store.upsert(session_key, &stage_update).await {
            warn!(error = %e, "failed to persist the quoted stage");
        }

        let offers: Vec<Offer> = PricingMode::ALL
            .iter()
            .filter_map(|mode| ranking.best_for(*mode).cloned())
            .collect();
        Ok(TurnOutcome {
            message: messages::quoted(&ranking, record_saved),
            stage: QuoteStage::Quoted,
            missing_fields: vec![],
            offers,
        })
    }
}
