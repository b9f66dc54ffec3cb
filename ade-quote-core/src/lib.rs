pub mod adapters;
pub mod context;
pub mod coverage;
pub mod error;
pub mod missing;
pub mod offers;
pub mod pricing;
pub mod stage;
pub mod storage;

// Re-export commonly used types
pub use adapters::{ClientRecord, CrmAdapter, Extractor, PricingAdapter};
pub use context::{
    merge_context, ContextUpdate, CoverageChoice, ExtractedFields, SessionContext, TriState,
};
pub use coverage::{
    build_coverage_lines, default_coverages, format_coverage_explanation, resolved_coverages,
    CoverageCode, CoverageLine, CoveragePolicy, LoanType, DEFAULT_ITT_DEDUCTIBLE_DAYS,
};
pub use error::{QuoteError, Result};
pub use missing::{resolve_missing, RequiredField};
pub use offers::{rank_offers, Offer, OfferRanking, PricingMode, TarificationResponse};
pub use pricing::{build_tarification_request, TarificationRequest, DEFAULT_QUOTITY};
pub use stage::QuoteStage;
pub use storage::{ContextStore, InMemoryContextStore, PostgresContextStore};

#[cfg(test)]
mod tests {
    use super::*;

    fn almost_complete_context() -> SessionContext {
        let mut ctx = SessionContext::new();
        ctx.full_name = Some("Guillaume Bidoux".into());
        ctx.birth_date = Some("1973-06-28".into());
        ctx.email = Some("gbidoux@orange.fr".into());
        ctx.postal_code = Some("75013".into());
        ctx.professional_status = Some("salarié".into());
        ctx.loan_amount = Some(300_000.0);
        ctx.loan_duration_months = Some(300);
        ctx.loan_rate = Some("2.5".into());
        ctx.signing_date = Some("2025-11-25".into());
        ctx.property_type = Some("résidence principale".into());
        ctx.borrower_count = Some(1);
        ctx
    }

    #[test]
    fn smoker_answer_completes_the_checklist() {
        // Everything known except the smoker flag.
        let mut context = almost_complete_context();
        let missing = resolve_missing(Some(&context));
        assert_eq!(missing, vec![RequiredField::Smoker]);

        // The next message answers "non".
        let update = merge_context(
            Some(&context),
            &ExtractedFields {
                fumeur: Some(false),
                ..Default::default()
            },
        );
        context.apply(&update);

        assert!(resolve_missing(Some(&context)).is_empty());
        assert_eq!(context.smoker, TriState::No);
    }

    #[test]
    fn rental_investment_gates_on_coverage_choice_then_unlocks() {
        let mut context = almost_complete_context();
        context.property_type = Some("investissement locatif".into());
        context.smoker = TriState::No;

        let policy = default_coverages(
            context.property_type.as_deref().unwrap_or_default(),
            context.loan_type.unwrap_or_default(),
        );
        let missing = resolve_missing(Some(&context));
        assert_eq!(
            QuoteStage::evaluate(&context, &policy, &missing),
            QuoteStage::CoveragePending
        );

        let update = merge_context(
            Some(&context),
            &ExtractedFields {
                garanties_acceptees: Some(true),
                ..Default::default()
            },
        );
        context.apply(&update);
        assert_eq!(
            QuoteStage::evaluate(&context, &policy, &missing),
            QuoteStage::Quoting
        );

        let codes = resolved_coverages(&policy, context.coverage_choice.as_ref());
        assert_eq!(codes, vec!["DCPTIA", "IPT", "IPP", "ITT"]);
    }

    #[test]
    fn a_full_turn_of_merges_builds_a_quotable_request() {
        let mut context = SessionContext::new();

        for partial in [
            ExtractedFields {
                nom_complet: Some("Guillaume Bidoux".into()),
                type_assurance: Some("pret".into()),
                montant_pret: Some(300_000.0),
                ..Default::default()
            },
            ExtractedFields {
                date_naissance: Some("1973-06-28".into()),
                email: Some("gbidoux@orange.fr".into()),
                code_postal: Some("75013".into()),
                statut_professionnel: Some("salarié".into()),
                ..Default::default()
            },
            ExtractedFields {
                duree_pret: Some(300),
                taux_pret: Some("2.5".into()),
                date_signature: Some("2025-11-25".into()),
                type_bien: Some("résidence principale".into()),
                nombre_emprunteurs: Some(1),
                fumeur: Some(false),
                ..Default::default()
            },
        ] {
            let update = merge_context(Some(&context), &partial);
            context.apply(&update);
        }

        assert!(resolve_missing(Some(&context)).is_empty());
        assert_eq!(context.quotity, Some(100));

        let policy = default_coverages("résidence principale", LoanType::Amortizing);
        let codes = resolved_coverages(&policy, context.coverage_choice.as_ref());
        let lines = build_coverage_lines(
            &codes,
            context.quotity.unwrap_or(DEFAULT_QUOTITY),
            DEFAULT_ITT_DEDUCTIBLE_DAYS,
        );
        assert_eq!(lines.len(), 4);

        let request =
            build_tarification_request("session-1", &context, PricingMode::Crd, lines).unwrap();
        assert_eq!(
            request.scenario_record_data_model.requirements[0].premium_type,
            "CRD"
        );
    }
}
