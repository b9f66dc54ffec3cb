//! French chat-message formatting: one function per turn outcome.

use ade_quote_core::{
    format_coverage_explanation, CoveragePolicy, Offer, OfferRanking, PricingMode, RequiredField,
    SessionContext, TriState,
};

pub const SAVE_FAILURE: &str =
    "Désolé, je n'ai pas pu enregistrer vos informations. Pouvez-vous réessayer ?";
pub const GENERIC_FAILURE: &str =
    "Désolé, une erreur technique est survenue. Pouvez-vous réessayer dans un instant ?";

/// Recap of what the session already knows, shown ahead of the next
/// questions so the user can spot a mis-extracted value.
pub fn context_summary(context: &SessionContext) -> String {
    let mut lines = Vec::new();
    if let Some(name) = &context.full_name {
        lines.push(format!("• Nom : {name}"));
    }
    if let Some(date) = &context.birth_date {
        lines.push(format!("• Date de naissance : {date}"));
    }
    if let Some(email) = &context.email {
        lines.push(format!("• Email : {email}"));
    }
    if let Some(phone) = &context.phone {
        lines.push(format!("• Téléphone : {phone}"));
    }
    if let Some(code) = &context.postal_code {
        lines.push(format!("• Code postal : {code}"));
    }
    if let Some(status) = &context.professional_status {
        lines.push(format!("• Statut professionnel : {status}"));
    }
    if let Some(amount) = context.loan_amount {
        lines.push(format!("• Montant du prêt : {} €", format_euros(amount)));
    }
    if let Some(duration) = context.loan_duration_months {
        lines.push(format!("• Durée du prêt : {duration} mois"));
    }
    if let Some(rate) = &context.loan_rate {
        lines.push(format!("• Taux du prêt : {rate}"));
    }
    if let Some(date) = &context.signing_date {
        lines.push(format!("• Date de signature : {date}"));
    }
    if let Some(property) = &context.property_type {
        lines.push(format!("• Type de bien : {property}"));
    }
    if let Some(count) = context.borrower_count {
        lines.push(format!("• Nombre d'emprunteurs : {count}"));
    }
    if let Some(quotity) = context.quotity {
        lines.push(format!("• Quotité : {quotity} %"));
    }
    match context.smoker {
        TriState::Yes => lines.push("• Fumeur : oui".to_string()),
        TriState::No => lines.push("• Fumeur : non".to_string()),
        TriState::Unknown => {}
    }

    if lines.is_empty() {
        String::new()
    } else {
        format!("📝 **Informations enregistrées :**\n{}\n\n", lines.join("\n"))
    }
}

/// Collecting turn: recap plus the ordered list of still-missing facts.
pub fn collecting(context: &SessionContext, missing: &[RequiredField]) -> String {
    let mut message = String::new();
    let summary = context_summary(context);
    if summary.is_empty() {
        message.push_str(
            "Bonjour ! Je vais vous aider à obtenir un devis d'assurance emprunteur.\n\n",
        );
    } else {
        message.push_str(&summary);
    }

    message.push_str("Pour établir votre devis, il me manque encore :\n");
    for field in missing {
        message.push_str(&format!("• {}\n", field.label()));
    }
    message.push_str("\nPouvez-vous me communiquer ces informations ?");
    message
}

/// Coverage-pending turn: recap plus the policy explanation ending with the
/// accept/decline/select question.
pub fn coverage_pending(context: &SessionContext, policy: &CoveragePolicy) -> String {
    format!(
        "{}{}",
        context_summary(context),
        format_coverage_explanation(policy)
    )
}

/// Quoted turn: the comparative presentation of the best offer per mode,
/// with the savings delta when both modes answered.
pub fn quoted(ranking: &OfferRanking, record_saved: Option<bool>) -> String {
    let crd = ranking.best_for(PricingMode::Crd);
    let fixe = ranking.best_for(PricingMode::Fixe);

    let mut message = String::from("🎯 **Votre comparatif d'assurance de prêt**\n");
    match (crd, fixe) {
        (Some(crd), Some(fixe)) => {
            message.push_str(&offer_block(
                "Option 1 : cotisation dégressive (CRD)",
                crd,
            ));
            message.push_str(&offer_block("Option 2 : cotisation constante (FIXE)", fixe));

            let delta = (crd.total_cost - fixe.total_cost).abs();
            if delta > f64::EPSILON {
                let winner = if fixe.total_cost < crd.total_cost {
                    "FIXE"
                } else {
                    "CRD"
                };
                message.push_str(&format!(
                    "\n💰 Économie avec l'option {winner} : {} €\n",
                    format_euros(delta)
                ));
            }
        }
        (Some(offer), None) => {
            message.push_str("\nUne seule formule a pu être tarifée :\n");
            message.push_str(&offer_block("Cotisation dégressive (CRD)", offer));
        }
        (None, Some(offer)) => {
            message.push_str("\nUne seule formule a pu être tarifée :\n");
            message.push_str(&offer_block("Cotisation constante (FIXE)", offer));
        }
        (None, None) => {
            return no_offer("aucune offre retournée par le tarificateur");
        }
    }

    if record_saved == Some(false) {
        message.push_str(
            "\n⚠️ Votre devis n'a pas pu être enregistré auprès de notre partenaire ; un conseiller finalisera l'enregistrement.\n",
        );
    }

    message.push_str("\nSouhaitez-vous ajuster un paramètre (quotité, garanties...) pour recalculer ?");
    message
}

fn offer_block(title: &str, offer: &Offer) -> String {
    let note = match offer.mode {
        PricingMode::Crd => "La cotisation diminue au fil du temps avec le capital restant dû.",
        PricingMode::Fixe => "La cotisation reste identique pendant toute la durée du prêt.",
    };
    format!(
        "\n📊 **{title}**\n   Produit : {}\n   Cotisation mensuelle : {} €\n   Coût total de l'assurance : {} €\n   TAEA : {:.2} %\n   {note}\n",
        offer.display_label(),
        format_euros(offer.monthly_premium),
        format_euros(offer.total_cost),
        offer.annual_effective_rate * 100.0,
    )
}

/// No qualifying offer: the provider's business diagnostics, verbatim.
pub fn no_offer(diagnostic: &str) -> String {
    format!(
        "😕 Aucune offre n'a pu être établie pour votre profil.\n\nDétails du tarificateur : {diagnostic}\n\nVous pouvez ajuster le montant, la durée ou les garanties et réessayer."
    )
}

/// French number formatting: space-grouped thousands, comma decimals.
fn format_euros(value: f64) -> String {
    let formatted = format!("{value:.2}");
    let (int_part, dec_part) = match formatted.split_once('.') {
        Some(parts) => parts,
        None => (formatted.as_str(), "00"),
    };

    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }
    format!("{grouped},{dec_part}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ade_quote_core::{default_coverages, rank_offers, LoanType, TarificationResponse};

    fn quoted_ranking() -> OfferRanking {
        let crd: TarificationResponse = serde_json::from_value(serde_json::json!({
            "tarificationResponseModels": [{
                "productCode": "MAESTRO",
                "productLabel": "Maestro Emprunteur",
                "responseStateModel": { "businessState": "OK" },
                "quoteRateResult": {
                    "primePeriodiqueDevis": 21.4,
                    "primeGlobaleDevis": 6420.0,
                    "taeaDevis": 0.0031
                }
            }]
        }))
        .unwrap();
        let fixe: TarificationResponse = serde_json::from_value(serde_json::json!({
            "tarificationResponseModels": [{
                "productCode": "IRIADE",
                "productLabel": "Iriade",
                "responseStateModel": { "businessState": "OK" },
                "quoteRateResult": {
                    "primePeriodiqueDevis": 22.9,
                    "primeGlobaleDevis": 6890.0,
                    "taeaDevis": 0.0034
                }
            }]
        }))
        .unwrap();
        rank_offers(vec![(PricingMode::Crd, crd), (PricingMode::Fixe, fixe)]).unwrap()
    }

    #[test]
    fn euros_are_grouped_with_comma_decimals() {
        assert_eq!(format_euros(6420.0), "6 420,00");
        assert_eq!(format_euros(300_000.0), "300 000,00");
        assert_eq!(format_euros(21.4), "21,40");
        assert_eq!(format_euros(999.99), "999,99");
    }

    #[test]
    fn collecting_lists_the_missing_questions() {
        let mut context = SessionContext::new();
        context.full_name = Some("Alice Martin".into());
        let message = collecting(
            &context,
            &[RequiredField::BirthDate, RequiredField::Smoker],
        );
        assert!(message.contains("Alice Martin"));
        assert!(message.contains("Votre date de naissance"));
        assert!(message.contains("Êtes-vous fumeur ?"));
    }

    #[test]
    fn first_contact_greets_instead_of_recapping() {
        let message = collecting(&SessionContext::new(), &[RequiredField::FullName]);
        assert!(message.starts_with("Bonjour"));
    }

    #[test]
    fn quoted_shows_both_options_and_the_savings() {
        let message = quoted(&quoted_ranking(), Some(true));
        assert!(message.contains("Option 1 : cotisation dégressive (CRD)"));
        assert!(message.contains("Option 2 : cotisation constante (FIXE)"));
        assert!(message.contains("Maestro Emprunteur"));
        assert!(message.contains("Économie avec l'option CRD : 470,00 €"));
        assert!(!message.contains("n'a pas pu être enregistré"));
    }

    #[test]
    fn quoted_reports_a_failed_record_persistence() {
        let message = quoted(&quoted_ranking(), Some(false));
        assert!(message.contains("n'a pas pu être enregistré"));
    }

    #[test]
    fn taea_is_shown_as_a_percentage() {
        let message = quoted(&quoted_ranking(), None);
        assert!(message.contains("TAEA : 0.31 %"));
    }

    #[test]
    fn coverage_pending_ends_with_the_choice_question() {
        let policy = default_coverages("investissement locatif", LoanType::Amortizing);
        let message = coverage_pending(&SessionContext::new(), &policy);
        assert!(message.contains("Souhaitez-vous ajouter ces garanties optionnelles"));
    }

    #[test]
    fn no_offer_carries_the_provider_diagnostics() {
        let message = no_offer("MAESTRO: ERR_AGE (Âge non éligible)");
        assert!(message.contains("ERR_AGE"));
    }
}
