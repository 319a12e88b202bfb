//! Card service collaborators: deck resolution and card provisioning.
//!
//! The engine talks to the external service through two narrow traits
//! so the real HTTP client and the dry-run simulation stay
//! interchangeable behind a single engine code path. The engine relies
//! on its own registry cache to avoid duplicate creation, never on any
//! idempotency guarantee of the service.

use crate::config::{ApiConfig, CardsConfig};
use crate::types::VocabUnit;
use crate::{Error, Result};
use uuid::Uuid;

/// A named container for cards in the external service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deck {
    pub id: String,
    pub name: String,
}

/// A created card resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Card {
    pub id: String,
}

/// Resolves or creates a named deck.
pub trait DeckResolver {
    /// Look up an existing deck by name. Returns the first match in
    /// service listing order; name uniqueness is not enforced.
    fn resolve(&self, name: &str) -> Result<Option<Deck>>;

    /// Create a new deck, optionally nested under a parent deck.
    fn create(&self, name: &str, parent_id: Option<&str>) -> Result<Deck>;
}

/// Creates an external card for a single unit.
pub trait CardProvisioner {
    /// Create a card inside `deck_id` and return its stable id.
    fn create_card(&self, deck_id: &str, unit: &VocabUnit) -> Result<Card>;
}

// ---------------------------------------------------------------------------
// HTTP backend
// ---------------------------------------------------------------------------

/// Blocking HTTP client for a JSON card service.
///
/// The engine processes units strictly one at a time, so a blocking
/// client keeps the call structure as flat as the processing model.
#[derive(Debug)]
pub struct HttpBackend {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    cards: CardsConfig,
}

impl HttpBackend {
    /// Build a client from configuration.
    ///
    /// An empty API key is a configuration error here, not a 401 later.
    pub fn new(api: &ApiConfig, cards: &CardsConfig) -> Result<Self> {
        if api.key.is_empty() {
            return Err(Error::Config(
                "api.key is empty; set it in config.toml or run with --dry-run".into(),
            ));
        }
        if cards.template_id.is_empty()
            || cards.term_field_id.is_empty()
            || cards.meaning_field_id.is_empty()
        {
            return Err(Error::Config(
                "cards.template_id, cards.term_field_id and cards.meaning_field_id must all be set".into(),
            ));
        }
        Ok(Self {
            client: reqwest::blocking::Client::new(),
            base_url: api.url.trim_end_matches('/').to_string(),
            api_key: api.key.clone(),
            cards: cards.clone(),
        })
    }

    fn get(&self, path: &str) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .map_err(|e| Error::Provision(format!("GET {path} failed: {e}")))?;
        read_json_response(path, response)
    }

    fn post(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .map_err(|e| Error::Provision(format!("POST {path} failed: {e}")))?;
        read_json_response(path, response)
    }
}

fn read_json_response(
    path: &str,
    response: reqwest::blocking::Response,
) -> Result<serde_json::Value> {
    let status = response.status();
    if !status.is_success() {
        let error_body = response
            .text()
            .unwrap_or_else(|_| "unable to read error body".to_owned());
        return Err(Error::Provision(format!(
            "card service returned {status} for {path}: {error_body}"
        )));
    }
    response
        .json()
        .map_err(|e| Error::Provision(format!("card service response for {path} not JSON: {e}")))
}

impl DeckResolver for HttpBackend {
    fn resolve(&self, name: &str) -> Result<Option<Deck>> {
        let json = self.get("/decks")?;
        let decks = extract_decks(&json)?;
        Ok(decks.into_iter().find(|d| d.name == name))
    }

    fn create(&self, name: &str, parent_id: Option<&str>) -> Result<Deck> {
        let mut body = serde_json::json!({ "name": name });
        if let Some(parent) = parent_id {
            body["parent-id"] = serde_json::Value::String(parent.to_string());
        }
        let json = self.post("/decks", &body)?;
        let deck = extract_deck(&json)?;
        tracing::info!("Created deck '{}' ({})", deck.name, deck.id);
        Ok(deck)
    }
}

impl CardProvisioner for HttpBackend {
    fn create_card(&self, deck_id: &str, unit: &VocabUnit) -> Result<Card> {
        let body = build_card_payload(&self.cards, deck_id, unit);
        let json = self.post("/cards", &body)?;
        let id = extract_card_id(&json)?;
        tracing::info!("Created card {} for chunk '{}'", id, unit.chunk);
        Ok(Card { id })
    }
}

/// Build the card creation payload: template id plus field-id-keyed
/// values for term, meaning, and (when both sides exist) observation.
fn build_card_payload(
    cards: &CardsConfig,
    deck_id: &str,
    unit: &VocabUnit,
) -> serde_json::Value {
    let mut fields = serde_json::Map::new();
    fields.insert(
        cards.term_field_id.clone(),
        serde_json::json!({ "id": cards.term_field_id, "value": unit.chunk }),
    );
    fields.insert(
        cards.meaning_field_id.clone(),
        serde_json::json!({
            "id": cards.meaning_field_id,
            "value": unit.meaning.as_deref().unwrap_or(""),
        }),
    );
    if let (Some(obs_field), Some(obs)) = (&cards.obs_field_id, &unit.obs) {
        fields.insert(
            obs_field.clone(),
            serde_json::json!({ "id": obs_field, "value": obs }),
        );
    }

    serde_json::json!({
        "deck-id": deck_id,
        "template-id": cards.template_id,
        "fields": fields,
    })
}

/// Extract the deck list from a `GET /decks` response.
fn extract_decks(json: &serde_json::Value) -> Result<Vec<Deck>> {
    let decks = json
        .get("decks")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| Error::Provision("deck list response missing 'decks' array".into()))?;
    decks.iter().map(extract_deck).collect()
}

/// Extract a single deck object's id and name.
fn extract_deck(json: &serde_json::Value) -> Result<Deck> {
    let id = json
        .get("id")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| Error::Provision("deck response missing 'id'".into()))?;
    let name = json
        .get("name")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| Error::Provision("deck response missing 'name'".into()))?;
    Ok(Deck {
        id: id.to_string(),
        name: name.to_string(),
    })
}

/// Extract the created card id from a `POST /cards` response.
fn extract_card_id(json: &serde_json::Value) -> Result<String> {
    json.get("id")
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| Error::Provision("card response missing 'id'".into()))
}

// ---------------------------------------------------------------------------
// Dry-run backend
// ---------------------------------------------------------------------------

/// No-op collaborator pair for dry runs.
///
/// Resolution always misses, deck and card ids are fabricated locally,
/// and every would-be creation is logged. Keeping this behind the same
/// traits means the engine has no dry-run branches of its own.
#[derive(Default)]
pub struct SimulatedBackend;

impl DeckResolver for SimulatedBackend {
    fn resolve(&self, _name: &str) -> Result<Option<Deck>> {
        Ok(None)
    }

    fn create(&self, name: &str, parent_id: Option<&str>) -> Result<Deck> {
        let deck = Deck {
            id: format!("sim-deck-{}", Uuid::new_v4()),
            name: name.to_string(),
        };
        tracing::info!(
            "[dry-run] would create deck '{}' (parent: {:?})",
            name,
            parent_id
        );
        Ok(deck)
    }
}

impl CardProvisioner for SimulatedBackend {
    fn create_card(&self, _deck_id: &str, unit: &VocabUnit) -> Result<Card> {
        let card = Card {
            id: format!("sim-{}", Uuid::new_v4()),
        };
        tracing::info!(
            "[dry-run] would create card for chunk '{}' -> {}",
            unit.chunk,
            card.id
        );
        Ok(card)
    }
}
