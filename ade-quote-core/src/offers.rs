//! Offer normalizer and ranker: turns the raw tarification responses of the
//! two pricing modes into the best offer per mode.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{QuoteError, Result};

/// Premium computation mode of the pricing provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingMode {
    /// Decreasing premium, tied to the outstanding principal.
    Crd,
    /// Flat premium over the whole loan.
    Fixe,
}

impl PricingMode {
    pub fn wire(self) -> &'static str {
        match self {
            PricingMode::Crd => "CRD",
            PricingMode::Fixe => "FIXE",
        }
    }

    pub const ALL: [PricingMode; 2] = [PricingMode::Crd, PricingMode::Fixe];
}

/// Raw tarification response, one per pricing call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TarificationResponse {
    #[serde(default)]
    pub tarification_response_models: Vec<TarificationEntry>,
    pub compare_record_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TarificationEntry {
    pub product_code: String,
    pub product_label: Option<String>,
    pub response_state_model: Option<ResponseState>,
    pub quote_rate_result: Option<QuoteRateResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseState {
    pub business_state: Option<String>,
    #[serde(default)]
    pub business_errors: Vec<BusinessError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessError {
    pub code: Option<String>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRateResult {
    pub prime_periodique_devis: f64,
    pub prime_globale_devis: f64,
    pub taea_devis: f64,
}

/// Normalized offer, discarded after the response message is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub product_code: String,
    pub product_label: Option<String>,
    pub mode: PricingMode,
    pub monthly_premium: f64,
    pub total_cost: f64,
    pub annual_effective_rate: f64,
}

impl Offer {
    pub fn display_label(&self) -> &str {
        self.product_label.as_deref().unwrap_or(&self.product_code)
    }
}

/// Ranking result: every qualifying offer plus the cheapest one per mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferRanking {
    all_offers: Vec<Offer>,
    best: BTreeMap<PricingMode, Offer>,
}

impl OfferRanking {
    pub fn all_offers(&self) -> &[Offer] {
        &self.all_offers
    }

    pub fn best_for(&self, mode: PricingMode) -> Option<&Offer> {
        self.best.get(&mode)
    }

    /// Globally cheapest offer across every mode, used as the provisionally
    /// selected offer for record persistence.
    pub fn cheapest(&self) -> Option<&Offer> {
        self.all_offers
            .iter()
            .fold(None, |best: Option<&Offer>, offer| match best {
                Some(current) if current.total_cost <= offer.total_cost => Some(current),
                _ => Some(offer),
            })
    }
}

/// Rank the raw responses of the modes that answered.
///
/// Only entries with business state "OK" and a rate result qualify. Within
/// each mode the best offer is the minimum total cost, ties broken by
/// first-seen order (the provider's own ordering is not second-guessed).
/// Zero qualifying offers across all modes is an error carrying the
/// rejected entries' business diagnostics in encounter order.
pub fn rank_offers(
    responses: Vec<(PricingMode, TarificationResponse)>,
) -> Result<OfferRanking> {
    let mut all_offers = Vec::new();
    let mut rejections = Vec::new();

    for (mode, response) in &responses {
        for entry in &response.tarification_response_models {
            let state_ok = entry
                .response_state_model
                .as_ref()
                .and_then(|s| s.business_state.as_deref())
                == Some("OK");

            match (&entry.quote_rate_result, state_ok) {
                (Some(rate), true) => all_offers.push(Offer {
                    product_code: entry.product_code.clone(),
                    product_label: entry.product_label.clone(),
                    mode: *mode,
                    monthly_premium: rate.prime_periodique_devis,
                    total_cost: rate.prime_globale_devis,
                    annual_effective_rate: rate.taea_devis,
                }),
                _ => rejections.push(describe_rejection(entry)),
            }
        }
    }

    if all_offers.is_empty() {
        let diagnostic = if rejections.is_empty() {
            "aucune offre retournée par le tarificateur".to_string()
        } else {
            rejections.join(" ; ")
        };
        return Err(QuoteError::NoQualifyingOffer(diagnostic));
    }

    let mut best: BTreeMap<PricingMode, Offer> = BTreeMap::new();
    for offer in &all_offers {
        best.entry(offer.mode)
            .and_modify(|current| {
                if offer.total_cost < current.total_cost {
                    *current = offer.clone();
                }
            })
            .or_insert_with(|| offer.clone());
    }

    Ok(OfferRanking { all_offers, best })
}

fn describe_rejection(entry: &TarificationEntry) -> String {
    let errors: Vec<String> = entry
        .response_state_model
        .iter()
        .flat_map(|s| s.business_errors.iter())
        .map(|e| {
            match (e.code.as_deref(), e.label.as_deref()) {
                (Some(code), Some(label)) => format!("{code} ({label})"),
                (Some(code), None) => code.to_string(),
                (None, Some(label)) => label.to_string(),
                (None, None) => "erreur non détaillée".to_string(),
            }
        })
        .collect();

    if errors.is_empty() {
        format!("{}: refus sans détail", entry.product_code)
    } else {
        format!("{}: {}", entry.product_code, errors.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_entry(code: &str, monthly: f64, total: f64, taea: f64) -> TarificationEntry {
        TarificationEntry {
            product_code: code.to_string(),
            product_label: Some(format!("Produit {code}")),
            response_state_model: Some(ResponseState {
                business_state: Some("OK".to_string()),
                business_errors: vec![],
            }),
            quote_rate_result: Some(QuoteRateResult {
                prime_periodique_devis: monthly,
                prime_globale_devis: total,
                taea_devis: taea,
            }),
        }
    }

    fn ko_entry(code: &str, err_code: &str, err_label: &str) -> TarificationEntry {
        TarificationEntry {
            product_code: code.to_string(),
            product_label: None,
            response_state_model: Some(ResponseState {
                business_state: Some("KO".to_string()),
                business_errors: vec![BusinessError {
                    code: Some(err_code.to_string()),
                    label: Some(err_label.to_string()),
                }],
            }),
            quote_rate_result: None,
        }
    }

    fn response(entries: Vec<TarificationEntry>) -> TarificationResponse {
        TarificationResponse {
            tarification_response_models: entries,
            compare_record_id: Some("CMP-1".to_string()),
        }
    }

    #[test]
    fn picks_the_minimum_total_cost_per_mode() {
        let ranking = rank_offers(vec![
            (
                PricingMode::Crd,
                response(vec![
                    ok_entry("A", 20.0, 500.0, 0.003),
                    ok_entry("B", 18.0, 450.0, 0.002),
                ]),
            ),
            (
                PricingMode::Fixe,
                response(vec![ok_entry("C", 19.0, 480.0, 0.0025)]),
            ),
        ])
        .unwrap();

        assert_eq!(ranking.best_for(PricingMode::Crd).unwrap().total_cost, 450.0);
        assert_eq!(ranking.best_for(PricingMode::Fixe).unwrap().total_cost, 480.0);
        assert_eq!(ranking.all_offers().len(), 3);
    }

    #[test]
    fn ties_keep_the_first_seen_offer() {
        let ranking = rank_offers(vec![(
            PricingMode::Crd,
            response(vec![
                ok_entry("FIRST", 20.0, 500.0, 0.003),
                ok_entry("SECOND", 20.0, 500.0, 0.003),
            ]),
        )])
        .unwrap();

        assert_eq!(
            ranking.best_for(PricingMode::Crd).unwrap().product_code,
            "FIRST"
        );
    }

    #[test]
    fn ko_entries_and_missing_rates_are_filtered_out() {
        let mut no_rate = ok_entry("NORATE", 0.0, 0.0, 0.0);
        no_rate.quote_rate_result = None;

        let ranking = rank_offers(vec![(
            PricingMode::Fixe,
            response(vec![
                ko_entry("KO1", "ERR_AGE", "Âge non éligible"),
                no_rate,
                ok_entry("GOOD", 25.0, 600.0, 0.004),
            ]),
        )])
        .unwrap();

        assert_eq!(ranking.all_offers().len(), 1);
        assert_eq!(
            ranking.best_for(PricingMode::Fixe).unwrap().product_code,
            "GOOD"
        );
    }

    #[test]
    fn one_empty_mode_leaves_the_other_best_intact() {
        let ranking = rank_offers(vec![
            (PricingMode::Crd, response(vec![])),
            (
                PricingMode::Fixe,
                response(vec![ok_entry("ONLY", 19.0, 480.0, 0.0025)]),
            ),
        ])
        .unwrap();

        assert!(ranking.best_for(PricingMode::Crd).is_none());
        assert_eq!(
            ranking.best_for(PricingMode::Fixe).unwrap().total_cost,
            480.0
        );
    }

    #[test]
    fn zero_qualifying_offers_yield_aggregated_diagnostics() {
        let err = rank_offers(vec![
            (
                PricingMode::Crd,
                response(vec![ko_entry("P1", "ERR_AGE", "Âge non éligible")]),
            ),
            (
                PricingMode::Fixe,
                response(vec![ko_entry("P2", "ERR_CAPITAL", "Capital hors borne")]),
            ),
        ])
        .unwrap_err();

        let QuoteError::NoQualifyingOffer(diag) = err else {
            panic!("expected NoQualifyingOffer");
        };
        assert!(diag.contains("P1: ERR_AGE (Âge non éligible)"));
        assert!(diag.contains("P2: ERR_CAPITAL (Capital hors borne)"));
        let p1 = diag.find("P1").unwrap();
        let p2 = diag.find("P2").unwrap();
        assert!(p1 < p2, "diagnostics must keep encounter order");
    }

    #[test]
    fn empty_responses_still_produce_a_diagnostic() {
        let err = rank_offers(vec![(PricingMode::Crd, response(vec![]))]).unwrap_err();
        let QuoteError::NoQualifyingOffer(diag) = err else {
            panic!("expected NoQualifyingOffer");
        };
        assert!(!diag.is_empty());
    }

    #[test]
    fn cheapest_is_the_global_minimum_across_modes() {
        let ranking = rank_offers(vec![
            (
                PricingMode::Crd,
                response(vec![ok_entry("A", 20.0, 500.0, 0.003)]),
            ),
            (
                PricingMode::Fixe,
                response(vec![ok_entry("B", 18.0, 450.0, 0.002)]),
            ),
        ])
        .unwrap();

        assert_eq!(ranking.cheapest().unwrap().product_code, "B");
    }

    #[test]
    fn parses_the_provider_payload_shape() {
        let payload = serde_json::json!({
            "compareRecordId": "CMP-42",
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
        });
        let response: TarificationResponse = serde_json::from_value(payload).unwrap();
        let ranking = rank_offers(vec![(PricingMode::Crd, response)]).unwrap();
        let best = ranking.best_for(PricingMode::Crd).unwrap();
        assert_eq!(best.display_label(), "Maestro Emprunteur");
        assert_eq!(best.total_cost, 6420.0);
    }
}
