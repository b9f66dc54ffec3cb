//! LLM-backed field extraction over one chat message, via OpenRouter.

use ade_quote_core::{ExtractedFields, Extractor, SessionContext};
use async_trait::async_trait;
use rig::{agent::Agent, client::CompletionClient, completion::Chat, providers::openrouter};
use tracing::{debug, warn};

use crate::messages;

const EXTRACTION_MODEL: &str = "openai/gpt-4o-mini";

const EXTRACTION_PROMPT: &str = r#"Tu es un assistant d'extraction pour un courtier en assurance emprunteur.
Analyse le message de l'utilisateur et extrais les informations qu'il contient.

Réponds UNIQUEMENT avec un objet JSON, sans texte autour, contenant les champs
présents dans le message parmi :
{
  "nom_complet": string,
  "date_naissance": string,
  "code_postal": string,
  "statut_professionnel": string,
  "email": string,
  "telephone": string,
  "type_assurance": string,
  "montant_pret": number,
  "duree_pret": number,
  "taux_pret": string,
  "date_signature": string,
  "type_bien": string,
  "type_pret": string,
  "fumeur": boolean,
  "encours_credits": boolean,
  "nombre_emprunteurs": number,
  "quotite": number,
  "revenu_mensuel": number,
  "est_client_existant": boolean,
  "garanties_acceptees": boolean,
  "garanties_choisies": [string]
}

Règles :
- "duree_pret" est TOUJOURS exprimée en mois : convertis les années (ex. "25 ans" -> 300).
- Les dates sont au format AAAA-MM-JJ.
- "garanties_choisies" ne contient que des codes parmi DCPTIA, IPT, IPP, ITT.
- "est_client_existant" vaut true si l'utilisateur dit être déjà client chez nous.
- "garanties_acceptees" vaut true s'il accepte les garanties optionnelles proposées, false s'il les refuse.
- OMETS tout champ non mentionné. N'invente JAMAIS une information absente du message.
"#;

/// Extractor implementation backed by an OpenRouter chat model. Degrades to
/// the empty partial on any failure, as the trait contract requires.
pub struct RigExtractor {
    api_key: String,
}

impl RigExtractor {
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }

    fn agent(&self) -> Agent<openrouter::CompletionModel> {
        openrouter::Client::new(&self.api_key)
            .agent(EXTRACTION_MODEL)
            .preamble(EXTRACTION_PROMPT)
            .build()
    }

    async fn try_extract(
        &self,
        message: &str,
        existing: Option<&SessionContext>,
    ) -> anyhow::Result<ExtractedFields> {
        let mut prompt = String::new();
        if let Some(context) = existing {
            let known = messages::context_summary(context);
            if !known.is_empty() {
                prompt.push_str(
                    "Informations déjà connues (n'extrais que ce qui est nouveau ou corrigé) :\n",
                );
                prompt.push_str(&known);
            }
        }
        prompt.push_str("Message de l'utilisateur :\n");
        prompt.push_str(message);

        let response = self.agent().chat(prompt.as_str(), vec![]).await?;
        debug!(response_length = response.len(), "extraction response received");
        let fields = serde_json::from_str(strip_code_fences(&response))?;
        Ok(fields)
    }
}

#[async_trait]
impl Extractor for RigExtractor {
    async fn extract(&self, message: &str, existing: Option<&SessionContext>) -> ExtractedFields {
        match self.try_extract(message, existing).await {
            Ok(fields) => fields,
            Err(e) => {
                warn!(error = %e, "field extraction failed, continuing with an empty partial");
                ExtractedFields::default()
            }
        }
    }
}

/// Models occasionally wrap the JSON in a markdown fence despite the prompt.
fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_json_is_unwrapped() {
        let fenced = "```json\n{\"fumeur\": false}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"fumeur\": false}");
        assert_eq!(strip_code_fences("{\"fumeur\": true}"), "{\"fumeur\": true}");
    }

    #[test]
    fn a_model_response_parses_into_extracted_fields() {
        let response = r#"```json
        {
            "nom_complet": "Guillaume Bidoux",
            "montant_pret": 300000,
            "duree_pret": 300,
            "fumeur": false,
            "est_client_existant": true
        }
        ```"#;
        let fields: ExtractedFields =
            serde_json::from_str(strip_code_fences(response)).unwrap();
        assert_eq!(fields.nom_complet.as_deref(), Some("Guillaume Bidoux"));
        assert_eq!(fields.montant_pret, Some(300_000.0));
        assert_eq!(fields.duree_pret, Some(300));
        assert_eq!(fields.fumeur, Some(false));
        assert_eq!(fields.est_client_existant, Some(true));
        assert!(fields.email.is_none());
    }

    #[test]
    fn unknown_keys_from_the_model_are_ignored() {
        let fields: ExtractedFields =
            serde_json::from_str(r#"{"nom_complet": "A B", "champ_invente": 42}"#).unwrap();
        assert_eq!(fields.nom_complet.as_deref(), Some("A B"));
    }
}
