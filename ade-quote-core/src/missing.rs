//! Missing-field resolver: the deterministic checklist that drives the next
//! question to ask. Checklist order is significant and fixed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::SessionContext;

/// A fact required before a tarification request can be built. Fields with a
/// documented default elsewhere (quotity, coverage set, ITT deductible,
/// outstanding-credits flag) are deliberately not listed here: their absence
/// does not block quoting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredField {
    FullName,
    BirthDate,
    Email,
    PostalCode,
    ProfessionalStatus,
    LoanAmount,
    LoanDuration,
    LoanRate,
    SigningDate,
    PropertyType,
    BorrowerCount,
    Smoker,
}

impl RequiredField {
    /// Stable key, matching the extraction prompt's field names.
    pub fn key(self) -> &'static str {
        match self {
            RequiredField::FullName => "nom_complet",
            RequiredField::BirthDate => "date_naissance",
            RequiredField::Email => "email",
            RequiredField::PostalCode => "code_postal",
            RequiredField::ProfessionalStatus => "statut_professionnel",
            RequiredField::LoanAmount => "montant_pret",
            RequiredField::LoanDuration => "duree_pret",
            RequiredField::LoanRate => "taux_pret",
            RequiredField::SigningDate => "date_signature",
            RequiredField::PropertyType => "type_bien",
            RequiredField::BorrowerCount => "nombre_emprunteurs",
            RequiredField::Smoker => "fumeur",
        }
    }

    /// Question label shown to the user when the fact is missing.
    pub fn label(self) -> &'static str {
        match self {
            RequiredField::FullName => "Votre nom complet",
            RequiredField::BirthDate => "Votre date de naissance",
            RequiredField::Email => "Votre adresse email",
            RequiredField::PostalCode => "Votre code postal",
            RequiredField::ProfessionalStatus => {
                "Votre statut professionnel (salarié, cadre, libéral, etc.)"
            }
            RequiredField::LoanAmount => "Le montant du prêt",
            RequiredField::LoanDuration => "La durée du prêt",
            RequiredField::LoanRate => "Le taux du prêt (en %)",
            RequiredField::SigningDate => "La date de signature chez le notaire",
            RequiredField::PropertyType => {
                "Le type de bien (résidence principale, secondaire, investissement locatif...)"
            }
            RequiredField::BorrowerCount => "Empruntez-vous seul ou à deux ?",
            RequiredField::Smoker => "Êtes-vous fumeur ?",
        }
    }
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Required-field list returned before any context exists.
const INITIAL_CHECKLIST: [RequiredField; 9] = [
    RequiredField::FullName,
    RequiredField::BirthDate,
    RequiredField::PostalCode,
    RequiredField::ProfessionalStatus,
    RequiredField::LoanAmount,
    RequiredField::LoanDuration,
    RequiredField::SigningDate,
    RequiredField::PropertyType,
    RequiredField::Smoker,
];

/// Compute the ordered list of facts still required before quoting.
///
/// Pure and deterministic. For the tri-state smoker flag, `Unknown` counts
/// as missing while both `Yes` and `No` count as present.
pub fn resolve_missing(context: Option<&SessionContext>) -> Vec<RequiredField> {
    let Some(context) = context else {
        return INITIAL_CHECKLIST.to_vec();
    };

    let mut missing = Vec::new();

    // Identity
    if context.full_name.is_none() {
        missing.push(RequiredField::FullName);
    }
    if context.birth_date.is_none() {
        missing.push(RequiredField::BirthDate);
    }
    if context.email.is_none() {
        missing.push(RequiredField::Email);
    }
    if context.postal_code.is_none() {
        missing.push(RequiredField::PostalCode);
    }

    // Professional situation
    if context.professional_status.is_none() {
        missing.push(RequiredField::ProfessionalStatus);
    }

    // Loan details
    if context.loan_amount.is_none() {
        missing.push(RequiredField::LoanAmount);
    }
    if context.loan_duration_months.is_none() {
        missing.push(RequiredField::LoanDuration);
    }
    if context.loan_rate.is_none() {
        missing.push(RequiredField::LoanRate);
    }
    if context.signing_date.is_none() {
        missing.push(RequiredField::SigningDate);
    }
    if context.property_type.is_none() {
        missing.push(RequiredField::PropertyType);
    }
    if context.borrower_count.is_none() {
        missing.push(RequiredField::BorrowerCount);
    }

    // Health
    if !context.smoker.is_known() {
        missing.push(RequiredField::Smoker);
    }

    missing
}
