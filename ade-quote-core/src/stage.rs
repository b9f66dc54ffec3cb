//! Quoting lifecycle of a session.

use serde::{Deserialize, Serialize};

use crate::context::SessionContext;
use crate::coverage::CoveragePolicy;
use crate::missing::RequiredField;

/// Lifecycle stage of a session's quoting flow.
///
/// `Collecting` is initial, `Quoted` is terminal. A message arriving after
/// `Quoted` is re-merged like any other and may re-open `Collecting` when it
/// changes required facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStage {
    #[default]
    Collecting,
    /// All required facts are present but the resolved policy carries
    /// optional coverages the user has not accepted or declined yet.
    CoveragePending,
    Quoting,
    Quoted,
}

impl QuoteStage {
    /// Stage a session is in before any pricing call, given the freshly
    /// merged context. Pure function; `CoveragePending` is a gating state
    /// resolved by the next message carrying a coverage choice, never a loop.
    pub fn evaluate(
        context: &SessionContext,
        policy: &CoveragePolicy,
        missing: &[RequiredField],
    ) -> QuoteStage {
        if !missing.is_empty() {
            QuoteStage::Collecting
        } else if !policy.optional.is_empty() && context.coverage_choice.is_none() {
            QuoteStage::CoveragePending
        } else {
            QuoteStage::Quoting
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CoverageChoice, TriState};
    use crate::coverage::{default_coverages, LoanType};
    use crate::missing::resolve_missing;

    fn complete_context(property_type: &str) -> SessionContext {
        let mut ctx = SessionContext::new();
        ctx.full_name = Some("Alice Martin".into());
        ctx.birth_date = Some("1985-01-15".into());
        ctx.email = Some("alice@example.com".into());
        ctx.postal_code = Some("69002".into());
        ctx.professional_status = Some("cadre".into());
        ctx.loan_amount = Some(200_000.0);
        ctx.loan_duration_months = Some(240);
        ctx.loan_rate = Some("3.1".into());
        ctx.signing_date = Some("2026-01-10".into());
        ctx.property_type = Some(property_type.into());
        ctx.borrower_count = Some(1);
        ctx.smoker = TriState::No;
        ctx
    }

    #[test]
    fn missing_fields_keep_the_session_collecting() {
        let ctx = SessionContext::new();
        let policy = default_coverages("maison", LoanType::Amortizing);
        let missing = resolve_missing(Some(&ctx));
        assert_eq!(
            QuoteStage::evaluate(&ctx, &policy, &missing),
            QuoteStage::Collecting
        );
    }

    #[test]
    fn undecided_optional_coverages_gate_the_quote() {
        let ctx = complete_context("investissement locatif");
        let policy = default_coverages("investissement locatif", LoanType::Amortizing);
        let missing = resolve_missing(Some(&ctx));
        assert!(missing.is_empty());
        assert_eq!(
            QuoteStage::evaluate(&ctx, &policy, &missing),
            QuoteStage::CoveragePending
        );
    }

    #[test]
    fn a_recorded_choice_unlocks_quoting() {
        let mut ctx = complete_context("investissement locatif");
        ctx.coverage_choice = Some(CoverageChoice::DeclineAll);
        let policy = default_coverages("investissement locatif", LoanType::Amortizing);
        assert_eq!(
            QuoteStage::evaluate(&ctx, &policy, &[]),
            QuoteStage::Quoting
        );
    }

    #[test]
    fn no_optional_coverages_skip_the_pending_stage() {
        let ctx = complete_context("résidence principale");
        let policy = default_coverages("résidence principale", LoanType::Amortizing);
        assert_eq!(
            QuoteStage::evaluate(&ctx, &policy, &[]),
            QuoteStage::Quoting
        );
    }
}
