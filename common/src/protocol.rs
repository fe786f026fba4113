use serde::{Deserialize, Serialize};

use crate::models::{Cell, Difficulty, GameSetup, Pos};

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "action")]
pub enum ClientMessage {
    #[serde(rename = "reveal")]
    Reveal { pos: Pos },
    #[serde(rename = "flag")]
    Flag { pos: Pos },
    /// Without a setup the server falls back to its configured default.
    #[serde(rename = "restart")]
    Restart {
        #[serde(default)]
        setup: Option<GameSetup>,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CellUpdate {
    pub pos: Pos,
    pub value: Cell,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "init")]
    Init {
        rows: usize,
        cols: usize,
        mines: usize,
        difficulty: Difficulty,
        remaining_mines: usize,
        field: Vec<Vec<Cell>>,
    },
    #[serde(rename = "update")]
    Update {
        updates: Vec<CellUpdate>,
        remaining_mines: usize,
        won: bool,
        lost: bool,
    },
    /// Sent only to the connection whose request was rejected.
    #[serde(rename = "error")]
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GameParams;

    #[test]
    fn client_actions_parse() {
        let message: ClientMessage =
            serde_json::from_str(r#"{"action":"flag","pos":{"row":2,"col":3}}"#).unwrap();
        assert!(matches!(
            message,
            ClientMessage::Flag {
                pos: Pos { row: 2, col: 3 }
            }
        ));

        let message: ClientMessage =
            serde_json::from_str(r#"{"action":"reveal","pos":{"row":-1,"col":0}}"#).unwrap();
        assert!(matches!(
            message,
            ClientMessage::Reveal {
                pos: Pos { row: -1, col: 0 }
            }
        ));
    }

    #[test]
    fn restart_setup_is_optional() {
        let message: ClientMessage = serde_json::from_str(r#"{"action":"restart"}"#).unwrap();
        match message {
            ClientMessage::Restart { setup } => assert_eq!(setup, None),
            other => panic!("unexpected message {other:?}"),
        }

        let message: ClientMessage =
            serde_json::from_str(r#"{"action":"restart","setup":{"rows":3,"cols":3,"mines":1}}"#)
                .unwrap();
        match message {
            ClientMessage::Restart { setup } => assert_eq!(
                setup,
                Some(GameSetup::Custom(GameParams {
                    rows: 3,
                    cols: 3,
                    mines: 1
                }))
            ),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn update_serializes_with_type_tag() {
        let message = ServerMessage::Update {
            updates: vec![CellUpdate {
                pos: Pos { row: 0, col: 1 },
                value: Cell::Flagged,
            }],
            remaining_mines: 4,
            won: false,
            lost: false,
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "update");
        assert_eq!(json["remaining_mines"], 4);
        assert_eq!(json["updates"][0]["value"]["state"], "flagged");
    }
}
