//! Durable session context and the merge engine that feeds it.
//!
//! The extractor is untrusted: it may return empty fields, garbage values or
//! nothing at all. The merge engine copies only the fields that are actually
//! present in a partial, so a noisy extraction can never erase a fact the
//! session already knows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adapters::ClientRecord;
use crate::coverage::LoanType;
use crate::stage::QuoteStage;

/// Default quotity when a single borrower is declared.
pub const QUOTITY_SINGLE_BORROWER: i32 = 100;
/// Default quotity per head for two borrowers. This is a product default the
/// user can adjust afterwards, not a hard business rule.
pub const QUOTITY_TWO_BORROWERS: i32 = 50;

/// Tri-state for facts that may simply never have come up in conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TriState {
    #[default]
    Unknown,
    Yes,
    No,
}

impl TriState {
    pub fn is_known(self) -> bool {
        self != TriState::Unknown
    }

    fn from_flag(flag: bool) -> Self {
        if flag { TriState::Yes } else { TriState::No }
    }
}

/// The user's decision about the optional coverages of the resolved policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "codes", rename_all = "snake_case")]
pub enum CoverageChoice {
    AcceptAll,
    DeclineAll,
    Selection(Vec<String>),
}

/// One durable record per chat session, created lazily on the first message
/// and mutated by every subsequent turn. Never deleted by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    // Identity facts
    pub full_name: Option<String>,
    pub birth_date: Option<String>,
    pub postal_code: Option<String>,
    pub professional_status: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,

    // Loan facts
    pub insurance_type: Option<String>,
    pub loan_amount: Option<f64>,
    pub loan_duration_months: Option<i32>,
    /// Kept textual ("2.5", "2,5 %"): parsed only when building the
    /// tarification request.
    pub loan_rate: Option<String>,
    pub signing_date: Option<String>,
    pub property_type: Option<String>,
    pub loan_type: Option<LoanType>,
    #[serde(default)]
    pub smoker: TriState,
    #[serde(default)]
    pub outstanding_credits: TriState,
    pub borrower_count: Option<i32>,
    pub quotity: Option<i32>,
    pub monthly_income: Option<f64>,

    // Derived / auxiliary
    pub coverage_choice: Option<CoverageChoice>,
    pub crm_snapshot: Option<serde_json::Value>,
    #[serde(default)]
    pub stage: QuoteStage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            full_name: None,
            birth_date: None,
            postal_code: None,
            professional_status: None,
            email: None,
            phone: None,
            insurance_type: None,
            loan_amount: None,
            loan_duration_months: None,
            loan_rate: None,
            signing_date: None,
            property_type: None,
            loan_type: None,
            smoker: TriState::Unknown,
            outstanding_credits: TriState::Unknown,
            borrower_count: None,
            quotity: None,
            monthly_income: None,
            coverage_choice: None,
            crm_snapshot: None,
            stage: QuoteStage::Collecting,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an update set. Only fields present in the update are written.
    pub fn apply(&mut self, update: &ContextUpdate) {
        macro_rules! write_field {
            ($field:ident) => {
                if let Some(value) = &update.$field {
                    self.$field = Some(value.clone());
                }
            };
        }
        write_field!(full_name);
        write_field!(birth_date);
        write_field!(postal_code);
        write_field!(professional_status);
        write_field!(email);
        write_field!(phone);
        write_field!(insurance_type);
        write_field!(loan_amount);
        write_field!(loan_duration_months);
        write_field!(loan_rate);
        write_field!(signing_date);
        write_field!(property_type);
        write_field!(loan_type);
        write_field!(borrower_count);
        write_field!(quotity);
        write_field!(monthly_income);
        write_field!(coverage_choice);
        write_field!(crm_snapshot);
        if let Some(smoker) = update.smoker {
            self.smoker = smoker;
        }
        if let Some(outstanding) = update.outstanding_credits {
            self.outstanding_credits = outstanding;
        }
        if let Some(stage) = update.stage {
            self.stage = stage;
        }
        self.updated_at = Utc::now();
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Sparse update set produced by [`merge_context`]. One update is persisted
/// per turn, atomically, by the context store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextUpdate {
    pub full_name: Option<String>,
    pub birth_date: Option<String>,
    pub postal_code: Option<String>,
    pub professional_status: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub insurance_type: Option<String>,
    pub loan_amount: Option<f64>,
    pub loan_duration_months: Option<i32>,
    pub loan_rate: Option<String>,
    pub signing_date: Option<String>,
    pub property_type: Option<String>,
    pub loan_type: Option<LoanType>,
    pub smoker: Option<TriState>,
    pub outstanding_credits: Option<TriState>,
    pub borrower_count: Option<i32>,
    pub quotity: Option<i32>,
    pub monthly_income: Option<f64>,
    pub coverage_choice: Option<CoverageChoice>,
    pub crm_snapshot: Option<serde_json::Value>,
    pub stage: Option<QuoteStage>,
}

impl ContextUpdate {
    pub fn is_empty(&self) -> bool {
        serde_json::to_value(self)
            .map(|v| {
                v.as_object()
                    .map(|o| o.values().all(|f| f.is_null()))
                    .unwrap_or(true)
            })
            .unwrap_or(true)
    }

    /// Combine two update sets into one write: fields present in `other`
    /// win over fields present in `self`. Used to layer the user's own words
    /// over a CRM prefill.
    pub fn overlay(self, other: ContextUpdate) -> ContextUpdate {
        ContextUpdate {
            full_name: other.full_name.or(self.full_name),
            birth_date: other.birth_date.or(self.birth_date),
            postal_code: other.postal_code.or(self.postal_code),
            professional_status: other.professional_status.or(self.professional_status),
            email: other.email.or(self.email),
            phone: other.phone.or(self.phone),
            insurance_type: other.insurance_type.or(self.insurance_type),
            loan_amount: other.loan_amount.or(self.loan_amount),
            loan_duration_months: other.loan_duration_months.or(self.loan_duration_months),
            loan_rate: other.loan_rate.or(self.loan_rate),
            signing_date: other.signing_date.or(self.signing_date),
            property_type: other.property_type.or(self.property_type),
            loan_type: other.loan_type.or(self.loan_type),
            smoker: other.smoker.or(self.smoker),
            outstanding_credits: other.outstanding_credits.or(self.outstanding_credits),
            borrower_count: other.borrower_count.or(self.borrower_count),
            quotity: other.quotity.or(self.quotity),
            monthly_income: other.monthly_income.or(self.monthly_income),
            coverage_choice: other.coverage_choice.or(self.coverage_choice),
            crm_snapshot: other.crm_snapshot.or(self.crm_snapshot),
            stage: other.stage.or(self.stage),
        }
    }
}

/// Sparse record returned by the field extractor. Keys are the extraction
/// prompt's snake_case names; [`merge_context`] owns the one mapping table
/// from these keys to [`SessionContext`] fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedFields {
    pub nom_complet: Option<String>,
    pub date_naissance: Option<String>,
    pub code_postal: Option<String>,
    pub statut_professionnel: Option<String>,
    pub email: Option<String>,
    pub telephone: Option<String>,
    pub type_assurance: Option<String>,
    pub montant_pret: Option<f64>,
    /// Loan duration in months (the prompt asks the model to convert years).
    pub duree_pret: Option<i32>,
    pub taux_pret: Option<String>,
    pub date_signature: Option<String>,
    pub type_bien: Option<String>,
    pub type_pret: Option<String>,
    pub fumeur: Option<bool>,
    pub encours_credits: Option<bool>,
    pub nombre_emprunteurs: Option<i32>,
    pub quotite: Option<i32>,
    pub revenu_mensuel: Option<f64>,
    pub est_client_existant: Option<bool>,
    pub garanties_acceptees: Option<bool>,
    pub garanties_choisies: Option<Vec<String>>,
}

impl ExtractedFields {
    /// CRM prefill partial, merged with lower precedence than the user's own
    /// words within the same turn.
    pub fn from_client_record(record: &ClientRecord) -> Self {
        Self {
            nom_complet: Some(format!("{} {}", record.first_name, record.last_name)),
            date_naissance: record.birth_date.clone(),
            code_postal: record.postal_code.clone(),
            statut_professionnel: record.professional_category.clone(),
            email: record.email.clone(),
            telephone: record.phone.clone(),
            ..Self::default()
        }
    }
}

/// Merge a sparse partial into the durable context.
///
/// Pure function: the result is an update set the caller persists in one
/// atomic write. A field that is absent (or blank) in the partial is never
/// written, so previously known values survive every merge. The
/// borrower-count quotity default is applied to the update set only when the
/// existing context has no quotity yet; an explicit quotity in the partial
/// always wins.
pub fn merge_context(
    existing: Option<&SessionContext>,
    partial: &ExtractedFields,
) -> ContextUpdate {
    let mut update = ContextUpdate {
        full_name: present(&partial.nom_complet),
        birth_date: present(&partial.date_naissance),
        postal_code: present(&partial.code_postal),
        professional_status: present(&partial.statut_professionnel),
        email: present(&partial.email),
        phone: present(&partial.telephone),
        insurance_type: present(&partial.type_assurance),
        loan_amount: partial.montant_pret,
        loan_duration_months: partial.duree_pret,
        loan_rate: present(&partial.taux_pret),
        signing_date: present(&partial.date_signature),
        property_type: present(&partial.type_bien),
        loan_type: partial.type_pret.as_deref().and_then(LoanType::parse),
        smoker: partial.fumeur.map(TriState::from_flag),
        outstanding_credits: partial.encours_credits.map(TriState::from_flag),
        monthly_income: partial.revenu_mensuel,
        coverage_choice: coverage_choice_from(partial),
        ..ContextUpdate::default()
    };

    if let Some(count) = partial.nombre_emprunteurs {
        update.borrower_count = Some(count);
        let quotity_set = existing.is_some_and(|c| c.quotity.is_some());
        if !quotity_set {
            update.quotity = match count {
                1 => Some(QUOTITY_SINGLE_BORROWER),
                2 => Some(QUOTITY_TWO_BORROWERS),
                _ => None,
            };
        }
    }
    if let Some(quotity) = partial.quotite {
        update.quotity = Some(quotity);
    }

    update
}

/// Blank strings from the extractor count as absent.
fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn coverage_choice_from(partial: &ExtractedFields) -> Option<CoverageChoice> {
    if let Some(codes) = &partial.garanties_choisies {
        let cleaned: Vec<String> = codes
            .iter()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .collect();
        if !cleaned.is_empty() {
            return Some(CoverageChoice::Selection(cleaned));
        }
    }
    match partial.garanties_acceptees {
        Some(true) => Some(CoverageChoice::AcceptAll),
        Some(false) => Some(CoverageChoice::DeclineAll),
        None => None,
    }
}
