use serde::Serialize;
use serde_json::Value;

use crate::types::{
    Direction, DotsState, GhostId, GhostTag, GhostView, InitialSnapshot, PlayerId, PlayerView,
    TargetTag,
};

#[derive(Clone, Debug, PartialEq)]
pub enum ParsedClientMessage {
    Chat {
        text: String,
    },
    SetHeading {
        dir: Direction,
    },
    Jump,
    ReportPosition {
        x: f64,
        y: f64,
        dir: Direction,
        dot_eaten: bool,
    },
    ReportLives {
        lives: i64,
        invulnerable_window: f64,
    },
    ReportGhostCaptured {
        ghost_id: GhostId,
    },
    Restart,
}

/// Decodes one inbound frame. Anything malformed, out of schema or with an
/// unknown heading yields `None`; callers drop it without replying.
pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "chat" => {
            let text = object.get("text")?.as_str()?.to_string();
            Some(ParsedClientMessage::Chat { text })
        }
        "set_heading" => {
            let dir = parse_direction(object.get("dir")?)?;
            Some(ParsedClientMessage::SetHeading { dir })
        }
        "jump" => Some(ParsedClientMessage::Jump),
        "report_position" => {
            let pos = object.get("pos")?.as_object()?;
            let x = parse_finite(pos.get("x")?)?;
            let y = parse_finite(pos.get("y")?)?;
            let dir = parse_direction(object.get("dir")?)?;
            let dot_eaten = match object.get("dotEaten") {
                None | Some(Value::Null) => false,
                Some(value) => value.as_bool()?,
            };
            Some(ParsedClientMessage::ReportPosition {
                x,
                y,
                dir,
                dot_eaten,
            })
        }
        "report_lives" => {
            let lives = parse_integer(object.get("lives")?)?;
            let invulnerable_window = match object.get("invulnerableWindow") {
                None => 0.0,
                Some(value) => parse_finite(value)?,
            };
            Some(ParsedClientMessage::ReportLives {
                lives,
                invulnerable_window,
            })
        }
        "report_ghost_captured" => {
            let ghost_id = parse_integer(object.get("ghostId")?)?;
            let ghost_id = usize::try_from(ghost_id).ok()?;
            Some(ParsedClientMessage::ReportGhostCaptured { ghost_id })
        }
        "restart" => Some(ParsedClientMessage::Restart),
        _ => None,
    }
}

pub fn is_position_in_bounds(x: f64, y: f64, width: i32, height: i32) -> bool {
    x.is_finite()
        && y.is_finite()
        && x >= 0.0
        && y >= 0.0
        && x < width as f64
        && y < height as f64
}

fn parse_direction(value: &Value) -> Option<Direction> {
    if let Some(name) = value.as_str() {
        return Direction::parse_name(name);
    }
    Direction::from_index(value.as_i64()?)
}

fn parse_finite(value: &Value) -> Option<f64> {
    value.as_f64().filter(|number| number.is_finite())
}

fn parse_integer(value: &Value) -> Option<i64> {
    if let Some(number) = value.as_i64() {
        return Some(number);
    }
    let number = value.as_f64()?;
    if !number.is_finite() || number.fract() != 0.0 || number.abs() > 9_007_199_254_740_991.0 {
        return None;
    }
    Some(number as i64)
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        name: String,
    },
    Initial(Box<InitialSnapshot>),
    PlayerUpdate {
        id: PlayerId,
        data: Option<PlayerView>,
        #[serde(skip_serializing_if = "Option::is_none")]
        dots: Option<DotsState>,
    },
    GhostUpdate {
        id: GhostId,
        data: GhostView,
    },
    GhostTargetChanged {
        ghost: GhostTag,
        target: TargetTag,
    },
    RoundWon,
    Jump {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
    Chat {
        text: String,
    },
}

impl ServerMessage {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"chat","text":""}"#.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Audience {
    All,
    AllExcept(PlayerId),
    Only(PlayerId),
}

impl Audience {
    pub fn includes(&self, player_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::AllExcept(excluded) => excluded != player_id,
            Self::Only(target) => target == player_id,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Outbound {
    pub audience: Audience,
    pub message: ServerMessage,
}

impl Outbound {
    pub fn new(audience: Audience, message: ServerMessage) -> Self {
        Self { audience, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_set_heading_accepts_indices_and_names() {
        assert_eq!(
            parse_client_message(r#"{"type":"set_heading","dir":1}"#),
            Some(ParsedClientMessage::SetHeading { dir: Direction::Up })
        );
        assert_eq!(
            parse_client_message(r#"{"type":"set_heading","dir":"left"}"#),
            Some(ParsedClientMessage::SetHeading {
                dir: Direction::Left
            })
        );
    }

    #[test]
    fn parse_set_heading_rejects_unknown_headings() {
        assert!(parse_client_message(r#"{"type":"set_heading","dir":4}"#).is_none());
        assert!(parse_client_message(r#"{"type":"set_heading","dir":-1}"#).is_none());
        assert!(parse_client_message(r#"{"type":"set_heading","dir":1.5}"#).is_none());
        assert!(parse_client_message(r#"{"type":"set_heading","dir":"north"}"#).is_none());
        assert!(parse_client_message(r#"{"type":"set_heading"}"#).is_none());
    }

    #[test]
    fn parse_report_position() {
        let parsed = parse_client_message(
            r#"{"type":"report_position","pos":{"x":3,"y":4.5},"dir":3,"dotEaten":true}"#,
        )
        .expect("position report should parse");
        assert_eq!(
            parsed,
            ParsedClientMessage::ReportPosition {
                x: 3.0,
                y: 4.5,
                dir: Direction::Down,
                dot_eaten: true,
            }
        );

        let parsed =
            parse_client_message(r#"{"type":"report_position","pos":{"x":1,"y":1},"dir":0}"#);
        assert!(matches!(
            parsed,
            Some(ParsedClientMessage::ReportPosition {
                dot_eaten: false,
                ..
            })
        ));
    }

    #[test]
    fn parse_report_position_rejects_bad_payloads() {
        assert!(parse_client_message(
            r#"{"type":"report_position","pos":{"x":"a","y":1},"dir":0}"#
        )
        .is_none());
        assert!(
            parse_client_message(r#"{"type":"report_position","pos":{"x":1,"y":1},"dir":9}"#)
                .is_none()
        );
        assert!(parse_client_message(
            r#"{"type":"report_position","pos":{"x":1,"y":1},"dir":0,"dotEaten":"yes"}"#
        )
        .is_none());
    }

    #[test]
    fn parse_lives_and_capture_reports() {
        assert_eq!(
            parse_client_message(r#"{"type":"report_lives","lives":4,"invulnerableWindow":1.5}"#),
            Some(ParsedClientMessage::ReportLives {
                lives: 4,
                invulnerable_window: 1.5
            })
        );
        assert_eq!(
            parse_client_message(r#"{"type":"report_ghost_captured","ghostId":2}"#),
            Some(ParsedClientMessage::ReportGhostCaptured { ghost_id: 2 })
        );
        assert!(parse_client_message(r#"{"type":"report_ghost_captured","ghostId":-2}"#).is_none());
        assert!(parse_client_message(r#"{"type":"report_lives","lives":2.5}"#).is_none());
    }

    #[test]
    fn parse_simple_commands_and_garbage() {
        assert_eq!(
            parse_client_message(r#"{"type":"jump"}"#),
            Some(ParsedClientMessage::Jump)
        );
        assert_eq!(
            parse_client_message(r#"{"type":"restart"}"#),
            Some(ParsedClientMessage::Restart)
        );
        assert_eq!(
            parse_client_message(r#"{"type":"chat","text":"hi"}"#),
            Some(ParsedClientMessage::Chat {
                text: "hi".to_string()
            })
        );
        assert!(parse_client_message("not json").is_none());
        assert!(parse_client_message(r#"["jump"]"#).is_none());
        assert!(parse_client_message(r#"{"type":"teleport"}"#).is_none());
    }

    #[test]
    fn bounds_check_is_half_open() {
        assert!(is_position_in_bounds(0.0, 0.0, 20, 15));
        assert!(is_position_in_bounds(19.5, 14.0, 20, 15));
        assert!(!is_position_in_bounds(20.0, 3.0, 20, 15));
        assert!(!is_position_in_bounds(3.0, 15.0, 20, 15));
        assert!(!is_position_in_bounds(-0.1, 3.0, 20, 15));
        assert!(!is_position_in_bounds(f64::NAN, 3.0, 20, 15));
    }

    #[test]
    fn outbound_messages_are_tagged() {
        let json = ServerMessage::RoundWon.to_json();
        assert_eq!(json, r#"{"type":"round_won"}"#);

        let json = ServerMessage::PlayerUpdate {
            id: "player_1".to_string(),
            data: None,
            dots: None,
        }
        .to_json();
        assert_eq!(json, r#"{"type":"player_update","id":"player_1","data":null}"#);

        let json = ServerMessage::Jump {
            player_id: "player_2".to_string(),
        }
        .to_json();
        assert_eq!(json, r#"{"type":"jump","playerId":"player_2"}"#);
    }

    #[test]
    fn audience_membership() {
        let id = "player_1";
        assert!(Audience::All.includes(id));
        assert!(!Audience::AllExcept(id.to_string()).includes(id));
        assert!(Audience::AllExcept(id.to_string()).includes("player_2"));
        assert!(Audience::Only(id.to_string()).includes(id));
        assert!(!Audience::Only(id.to_string()).includes("player_2"));
    }
}
