use serde::{Deserialize, Serialize};

use crate::dao::{models::GameEntity, storage::ETag};

pub const GAME_PREFIX: &str = "game::";

/// Game document as stored in CouchDB, the entity flattened next to `_id`/`_rev`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchGameDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub game: GameEntity,
}

impl CouchGameDocument {
    pub fn new(key: &str, game: GameEntity, rev: Option<&ETag>) -> Self {
        Self {
            id: game_doc_id(key),
            rev: rev.map(|etag| etag.as_str().to_string()),
            game,
        }
    }
}

/// Body returned by CouchDB after a successful document `PUT`.
#[derive(Debug, Deserialize)]
pub struct PutResponse {
    pub rev: String,
}

pub fn game_doc_id(key: &str) -> String {
    format!("{}{}", GAME_PREFIX, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::GameState;

    #[test]
    fn create_document_omits_rev() {
        let document = CouchGameDocument::new("current-game", GameState::default().into(), None);
        let json = serde_json::to_value(&document).unwrap();
        assert_eq!(json["_id"], "game::current-game");
        assert!(json.get("_rev").is_none());
        assert_eq!(json["activePlayerIndex"], -1);
        assert_eq!(json["playerCount"], 4);
    }

    #[test]
    fn stored_document_round_trips_with_rev() {
        let raw = r#"{
            "_id": "game::current-game",
            "_rev": "3-abc",
            "playerCount": 2,
            "players": [
                {"id": 1, "name": "Ann", "accumulatedSeconds": 10},
                {"id": 2, "name": "Bo", "accumulatedSeconds": 0}
            ],
            "activePlayerIndex": 0,
            "timerMode": "count-down",
            "countdownSeconds": 60,
            "isPaused": false,
            "turnStartedAt": "2024-05-01T12:00:00Z",
            "pausedAt": null
        }"#;
        let document: CouchGameDocument = serde_json::from_str(raw).unwrap();
        assert_eq!(document.rev.as_deref(), Some("3-abc"));
        assert_eq!(document.game.players[0].accumulated_seconds, 10);
        assert!(document.game.turn_started_at.is_some());
        assert!(document.game.paused_at.is_none());
    }
}
