//! Coverage policy engine: which guarantees a file must or may carry, by
//! property and loan type, plus the wire-level coverage lines sent to the
//! pricing provider.

use serde::{Deserialize, Serialize};

use crate::context::CoverageChoice;

/// ITT waiting period, in days, when the user has not chosen one.
pub const DEFAULT_ITT_DEDUCTIBLE_DAYS: u32 = 90;

/// The four guarantees of the ADE product line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageCode {
    /// Death and total irreversible loss of autonomy. Always mandatory.
    DeathPtia,
    /// Permanent total disability (invalidity above 66%).
    TotalDisability,
    /// Permanent partial disability (invalidity between 33% and 66%).
    PartialDisability,
    /// Temporary work incapacity, with a waiting period in days.
    TempDisability,
}

impl CoverageCode {
    /// Provider wire code.
    pub fn wire(self) -> &'static str {
        match self {
            CoverageCode::DeathPtia => "DCPTIA",
            CoverageCode::TotalDisability => "IPT",
            CoverageCode::PartialDisability => "IPP",
            CoverageCode::TempDisability => "ITT",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "DCPTIA" => Some(CoverageCode::DeathPtia),
            "IPT" => Some(CoverageCode::TotalDisability),
            "IPP" => Some(CoverageCode::PartialDisability),
            "ITT" => Some(CoverageCode::TempDisability),
            _ => None,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            CoverageCode::DeathPtia => {
                "Décès et PTIA (Perte Totale et Irréversible d'Autonomie)"
            }
            CoverageCode::TotalDisability => "IPT (Invalidité Permanente Totale)",
            CoverageCode::PartialDisability => "IPP (Invalidité Permanente Partielle)",
            CoverageCode::TempDisability => "ITT (Incapacité Temporaire de Travail)",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            CoverageCode::DeathPtia => {
                "Garantie obligatoire qui couvre le remboursement du capital restant dû en cas de décès ou si vous perdez totalement et définitivement votre autonomie."
            }
            CoverageCode::TotalDisability => {
                "Couvre le remboursement si vous êtes reconnu invalide à plus de 66% et dans l'incapacité totale d'exercer une activité professionnelle."
            }
            CoverageCode::PartialDisability => {
                "Couvre le remboursement partiel si vous êtes reconnu invalide entre 33% et 66% et que vous ne pouvez plus exercer normalement votre activité professionnelle."
            }
            CoverageCode::TempDisability => {
                "Couvre vos mensualités pendant votre arrêt de travail temporaire suite à une maladie ou un accident, après la franchise choisie (30, 60, 90 ou 180 jours)."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoanType {
    #[default]
    Amortizing,
    InterestOnly,
}

impl LoanType {
    pub fn wire(self) -> &'static str {
        match self {
            LoanType::Amortizing => "IMMO_AMORTISSABLE",
            LoanType::InterestOnly => "IMMO_IN_FINE",
        }
    }

    /// Lenient parse of the extractor's free text ("prêt in fine",
    /// "amortissable", a wire code...).
    pub fn parse(text: &str) -> Option<Self> {
        let normalized = text.trim().to_uppercase().replace('_', " ");
        if normalized.is_empty() {
            return None;
        }
        if normalized.contains("IN FINE") {
            Some(LoanType::InterestOnly)
        } else if normalized.contains("AMORTISSABLE") || normalized.contains("AMORTIZING") {
            Some(LoanType::Amortizing)
        } else {
            None
        }
    }
}

/// Result of the decision table. Recomputed on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoveragePolicy {
    pub mandatory: Vec<CoverageCode>,
    pub optional: Vec<CoverageCode>,
    pub explanation: &'static str,
}

/// Decision table for default coverages, first match wins:
/// 1. interest-only loan: DCPTIA only;
/// 2. rental investment: DCPTIA mandatory, IPT/IPP/ITT optional;
/// 3. everything else: full coverage.
pub fn default_coverages(property_type: &str, loan_type: LoanType) -> CoveragePolicy {
    if loan_type == LoanType::InterestOnly {
        return CoveragePolicy {
            mandatory: vec![CoverageCode::DeathPtia],
            optional: vec![],
            explanation: "Pour un prêt in fine, seule la garantie Décès/PTIA est requise car vous ne remboursez que les intérêts pendant la durée du prêt.",
        };
    }

    let normalized = property_type.to_uppercase();
    if normalized.contains("INVEST") || normalized.contains("LOCATIF") {
        return CoveragePolicy {
            mandatory: vec![CoverageCode::DeathPtia],
            optional: vec![
                CoverageCode::TotalDisability,
                CoverageCode::PartialDisability,
                CoverageCode::TempDisability,
            ],
            explanation: "Pour un investissement locatif, la garantie Décès/PTIA est obligatoire. Les garanties IPT, IPP et ITT sont optionnelles mais recommandées pour vous protéger en cas d'incapacité à percevoir vos revenus locatifs.",
        };
    }

    CoveragePolicy {
        mandatory: vec![
            CoverageCode::DeathPtia,
            CoverageCode::TotalDisability,
            CoverageCode::PartialDisability,
            CoverageCode::TempDisability,
        ],
        optional: vec![],
        explanation: "Pour ce type de financement, nous recommandons une couverture complète incluant toutes les garanties.",
    }
}

/// Expand the user's optional-coverage choice against a policy into the
/// final wire code list. Mandatory coverages are always present.
pub fn resolved_coverages(policy: &CoveragePolicy, choice: Option<&CoverageChoice>) -> Vec<String> {
    let mut codes: Vec<String> = policy.mandatory.iter().map(|c| c.wire().to_string()).collect();
    match choice {
        Some(CoverageChoice::AcceptAll) => {
            codes.extend(policy.optional.iter().map(|c| c.wire().to_string()));
        }
        Some(CoverageChoice::Selection(selected)) => {
            for code in &policy.optional {
                if selected.iter().any(|s| s.eq_ignore_ascii_case(code.wire())) {
                    codes.push(code.wire().to_string());
                }
            }
        }
        Some(CoverageChoice::DeclineAll) | None => {}
    }
    codes
}

/// One coverage entry of a tarification requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageLine {
    pub code: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub percentage: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deductible: Option<u32>,
}

/// Map wire codes to coverage lines. The deductible is only carried by ITT.
/// Unknown codes are dropped silently so an unrecognized code coming back
/// from a stored choice can never break the pipeline.
pub fn build_coverage_lines(
    codes: &[String],
    quotity_percent: i32,
    itt_deductible_days: u32,
) -> Vec<CoverageLine> {
    codes
        .iter()
        .filter_map(|raw| CoverageCode::parse(raw))
        .map(|code| CoverageLine {
            code: code.wire().to_string(),
            kind: "COVERAGE".to_string(),
            percentage: quotity_percent,
            deductible: (code == CoverageCode::TempDisability).then_some(itt_deductible_days),
        })
        .collect()
}

/// Chat message explaining the resolved policy, ending with the
/// accept/decline/select question when optional coverages exist.
pub fn format_coverage_explanation(policy: &CoveragePolicy) -> String {
    let mut message = String::from("📋 **Garanties d'assurance**\n\n");
    message.push_str(policy.explanation);
    message.push_str("\n\n");

    if !policy.mandatory.is_empty() {
        message.push_str("**Garanties incluses :**\n");
        for code in &policy.mandatory {
            message.push_str(&format!(
                "\n✅ **{}**\n   {}\n",
                code.display_name(),
                code.description()
            ));
        }
    }

    if !policy.optional.is_empty() {
        message.push_str("\n**Garanties optionnelles (recommandées) :**\n");
        for code in &policy.optional {
            message.push_str(&format!(
                "\n⚪ **{}**\n   {}\n",
                code.display_name(),
                code.description()
            ));
        }
        message.push_str(
            "\n💡 Souhaitez-vous ajouter ces garanties optionnelles ? (Répondez 'oui' pour toutes les ajouter, 'non' pour les refuser, ou précisez lesquelles vous souhaitez)",
        );
    }

    message
}
