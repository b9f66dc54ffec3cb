//! Wire model of the pricing provider's tarification request, and the
//! builder that assembles one from a completed session context.
//!
//! Field names follow the provider's camelCase payloads exactly; everything
//! here is a thin serialization layer with defaults for the facts the
//! conversation does not collect.

use chrono::{Months, Utc};
use serde::{Deserialize, Serialize};

use crate::context::{SessionContext, TriState};
use crate::coverage::CoverageLine;
use crate::error::{QuoteError, Result};
use crate::offers::PricingMode;

/// Product panel queried on every tarification call.
pub const PRODUCT_CODES: [&str; 5] = ["MAESTRO", "AVENIRNAOASSUR", "IRIADE", "MNCAP", "NAOASSUR"];

/// Loan rate applied when the user never stated one, in percent.
pub const DEFAULT_LOAN_RATE: f64 = 2.5;

/// Quotity applied when neither an explicit value nor a borrower-count
/// default is recorded.
pub const DEFAULT_QUOTITY: i32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TarificationRequest {
    pub contract_grouping: String,
    pub tarification_options: TarificationOptions,
    pub product_codes: Vec<String>,
    pub insurance_type: String,
    pub scenario_record_data_model: ScenarioRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TarificationOptions {
    pub calculate_mode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioRecord {
    pub context_type: String,
    pub insureds: Vec<Insured>,
    pub loans: Vec<Loan>,
    pub requirements: Vec<Requirement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insured {
    pub external_insured_id: String,
    pub num_order: u32,
    pub person_data_model: PersonData,
    pub address: Address,
    pub country_of_residence: String,
    pub city_of_birth: String,
    pub professional_category: String,
    pub smoker: bool,
    pub esmoker: bool,
    pub esmoker_no_nicotine: bool,
    pub manual_work: bool,
    pub exact_job: String,
    pub social_regime: String,
    pub manual_work_risk: bool,
    pub work_risk: bool,
    pub dangerous_product: bool,
    pub out_standings: Vec<Outstanding>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonData {
    pub gender: String,
    pub firstname: String,
    pub lastname: String,
    pub date_of_birth: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_phone_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub adr_address_line1: String,
    pub adr_address_line2: String,
    pub adr_zipcode: String,
    pub adr_city: String,
    pub adr_country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outstanding {
    pub context: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub external_loan_id: String,
    pub num_order: u32,
    #[serde(rename = "type")]
    pub loan_type: String,
    pub amount: f64,
    pub duration: i32,
    pub residual_value: f64,
    pub rate: f64,
    pub rate_type: String,
    pub deferred_type: String,
    pub deferred_duration: i32,
    pub effective_date: String,
    pub periodicity_insurance: String,
    pub periodicity_refund: String,
    pub purpose_of_financing: String,
    pub signing_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    pub insured_id: String,
    pub loan_id: String,
    pub premium_type: String,
    pub coverages: Vec<CoverageLine>,
}

/// Assemble a tarification request for one pricing mode.
///
/// The caller is expected to have run the missing-field resolver first; a
/// hole in a required field is still reported as a context error rather
/// than a panic.
pub fn build_tarification_request(
    session_key: &str,
    context: &SessionContext,
    mode: PricingMode,
    coverages: Vec<CoverageLine>,
) -> Result<TarificationRequest> {
    let full_name = require(&context.full_name, "nom_complet")?;
    let (firstname, lastname) = split_full_name(&full_name);
    let birth_date = require(&context.birth_date, "date_naissance")?;
    let email = require(&context.email, "email")?;
    let postal_code = require(&context.postal_code, "code_postal")?;
    let status = require(&context.professional_status, "statut_professionnel")?;
    let amount = context
        .loan_amount
        .ok_or_else(|| QuoteError::Context("montant_pret absent du contexte".into()))?;
    let duration = context
        .loan_duration_months
        .ok_or_else(|| QuoteError::Context("duree_pret absent du contexte".into()))?;
    let signing_date = require(&context.signing_date, "date_signature")?;
    let property_type = require(&context.property_type, "type_bien")?;

    let insured_id = format!("INS-{session_key}");
    let loan_id = format!("LOAN-{session_key}");
    let effective_date = effective_date(&signing_date);
    let tns = is_tns(&status);

    Ok(TarificationRequest {
        contract_grouping: "INITIAL".to_string(),
        tarification_options: TarificationOptions {
            calculate_mode: "DEFAULT".to_string(),
        },
        product_codes: PRODUCT_CODES.iter().map(|c| c.to_string()).collect(),
        insurance_type: "ADE".to_string(),
        scenario_record_data_model: ScenarioRecord {
            context_type: "NEW".to_string(),
            insureds: vec![Insured {
                external_insured_id: insured_id.clone(),
                num_order: 1,
                person_data_model: PersonData {
                    // Civility is not collected conversationally; the
                    // provider requires a value.
                    gender: "MR".to_string(),
                    firstname,
                    lastname,
                    date_of_birth: birth_date,
                    email,
                    mobile_phone_number: context.phone.clone(),
                },
                address: Address {
                    adr_address_line1: String::new(),
                    adr_address_line2: String::new(),
                    adr_zipcode: postal_code,
                    adr_city: String::new(),
                    adr_country: "FRANCE".to_string(),
                },
                country_of_residence: "FRANCE".to_string(),
                city_of_birth: String::new(),
                professional_category: professional_category(&status).to_string(),
                smoker: context.smoker == TriState::Yes,
                esmoker: false,
                esmoker_no_nicotine: false,
                manual_work: false,
                exact_job: if tns { "TNS".to_string() } else { "SALARIE".to_string() },
                social_regime: if tns { "TNS".to_string() } else { "SALARIE".to_string() },
                manual_work_risk: false,
                work_risk: false,
                dangerous_product: false,
                out_standings: vec![],
            }],
            loans: vec![Loan {
                external_loan_id: loan_id.clone(),
                num_order: 1,
                loan_type: context.loan_type.unwrap_or_default().wire().to_string(),
                amount,
                duration,
                residual_value: 0.0,
                rate: parse_rate(context.loan_rate.as_deref()),
                rate_type: "FIXE".to_string(),
                deferred_type: "AUCUN".to_string(),
                deferred_duration: 0,
                effective_date,
                periodicity_insurance: "MENSUELLE".to_string(),
                periodicity_refund: "MENSUELLE".to_string(),
                purpose_of_financing: purpose_of_financing(&property_type).to_string(),
                signing_date,
            }],
            requirements: vec![Requirement {
                insured_id,
                loan_id,
                premium_type: mode.wire().to_string(),
                coverages,
            }],
        },
    })
}

fn require(value: &Option<String>, field: &str) -> Result<String> {
    value
        .clone()
        .ok_or_else(|| QuoteError::Context(format!("{field} absent du contexte")))
}

/// First token is the first name; the remainder is the last name.
fn split_full_name(full_name: &str) -> (String, String) {
    let mut parts = full_name.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let rest: Vec<&str> = parts.collect();
    if rest.is_empty() {
        (first.clone(), first)
    } else {
        (first, rest.join(" "))
    }
}

/// Textual percent to number: "2,5 %" -> 2.5. Falls back to the documented
/// default on anything unparseable.
fn parse_rate(rate: Option<&str>) -> f64 {
    rate.map(|r| r.trim().trim_end_matches('%').trim().replace(',', "."))
        .and_then(|r| r.parse::<f64>().ok())
        .unwrap_or(DEFAULT_LOAN_RATE)
}

/// Map the free-text professional status to the provider's category codes.
fn professional_category(status: &str) -> &'static str {
    let lowered = status.to_lowercase();
    if lowered.contains("cadre") && !lowered.contains("non cadre") {
        "CADRE_SAL"
    } else if is_tns(status) {
        "TNS"
    } else if lowered.contains("fonctionnaire") {
        "FONCTIONNAIRE"
    } else {
        "NON_CADRE_SAL_EMPLOYE"
    }
}

fn is_tns(status: &str) -> bool {
    let lowered = status.to_lowercase();
    lowered.contains("libéral")
        || lowered.contains("liberal")
        || lowered.contains("indépendant")
        || lowered.contains("independant")
        || lowered.contains("tns")
        || lowered.contains("artisan")
        || lowered.contains("commerçant")
        || lowered.contains("commercant")
}

fn purpose_of_financing(property_type: &str) -> &'static str {
    let normalized = property_type.to_uppercase();
    if normalized.contains("INVEST") || normalized.contains("LOCATIF") {
        "INVEST_LOCATIF"
    } else if normalized.contains("SECONDAIRE") {
        "RESI_SECONDAIRE"
    } else if normalized.contains("CONSO") {
        "CREDIT_CONSO"
    } else if normalized.contains("PRO") {
        "PRO"
    } else {
        "RESI_PRINCIPALE"
    }
}

/// Signing date when known, otherwise three months out.
fn effective_date(signing_date: &str) -> String {
    if signing_date.trim().is_empty() {
        (Utc::now().date_naive() + Months::new(3)).to_string()
    } else {
        signing_date.to_string()
    }
}
