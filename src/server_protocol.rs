use serde_json::Value;

use crate::engine::Event;
use crate::types::{Position, UnitId};

#[derive(Debug, PartialEq)]
pub enum ParsedClientMessage {
    Hello { name: String },
    Action(Event),
    Ping { t: f64 },
}

/// Parses one inbound frame. `None` means the frame is not JSON or not an
/// object with a `type`; a known action with bad fields parses to
/// `Event::ParserError` so the match can log and drop it.
pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    let action = |parsed: Option<Event>| {
        ParsedClientMessage::Action(parsed.unwrap_or_else(|| {
            Event::ParserError(format!("malformed `{message_type}` message"))
        }))
    };

    match message_type {
        "hello" => {
            let name = object.get("name")?.as_str()?.to_string();
            Some(ParsedClientMessage::Hello { name })
        }
        "pick" => Some(action(parse_unit(object.get("jumon")).map(Event::Pick))),
        "summon" => Some(action(parse_unit(object.get("jumon")).map(Event::Summon))),
        "move" => Some(action(parse_targeted(object).map(|(jumon, target)| {
            Event::Move { jumon, target }
        }))),
        "special_move" => Some(action(
            parse_targeted(object).map(|(jumon, target)| Event::SpecialMove { jumon, target }),
        )),
        "ping" => {
            let t = object.get("t")?.as_f64()?;
            if !t.is_finite() {
                return None;
            }
            Some(ParsedClientMessage::Ping { t })
        }
        other => Some(ParsedClientMessage::Action(Event::ParserError(format!(
            "unknown message type `{other}`"
        )))),
    }
}

fn parse_unit(value: Option<&Value>) -> Option<UnitId> {
    let raw = value?.as_u64()?;
    u32::try_from(raw).ok().map(UnitId)
}

fn parse_coordinate(value: Option<&Value>) -> Option<i32> {
    let raw = value?.as_i64()?;
    i32::try_from(raw).ok()
}

fn parse_targeted(object: &serde_json::Map<String, Value>) -> Option<(UnitId, Position)> {
    let jumon = parse_unit(object.get("jumon"))?;
    let x = parse_coordinate(object.get("x"))?;
    let y = parse_coordinate(object.get("y"))?;
    Some((jumon, Position::new(x, y)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hello_message() {
        let parsed = parse_client_message(r#"{"type":"hello","name":"A"}"#);
        assert_eq!(
            parsed,
            Some(ParsedClientMessage::Hello {
                name: "A".to_string()
            })
        );
    }

    #[test]
    fn parse_pick_and_summon() {
        assert_eq!(
            parse_client_message(r#"{"type":"pick","jumon":4}"#),
            Some(ParsedClientMessage::Action(Event::Pick(UnitId(4))))
        );
        assert_eq!(
            parse_client_message(r#"{"type":"summon","jumon":2}"#),
            Some(ParsedClientMessage::Action(Event::Summon(UnitId(2))))
        );
    }

    #[test]
    fn parse_move_with_target() {
        let parsed = parse_client_message(r#"{"type":"move","jumon":3,"x":1,"y":2}"#);
        assert_eq!(
            parsed,
            Some(ParsedClientMessage::Action(Event::Move {
                jumon: UnitId(3),
                target: Position::new(1, 2),
            }))
        );

        let parsed = parse_client_message(r#"{"type":"special_move","jumon":3,"x":0,"y":4}"#);
        assert!(matches!(
            parsed,
            Some(ParsedClientMessage::Action(Event::SpecialMove { .. }))
        ));
    }

    #[test]
    fn malformed_actions_become_parser_errors() {
        for raw in [
            r#"{"type":"move","jumon":3,"x":1}"#,
            r#"{"type":"pick","jumon":"three"}"#,
            r#"{"type":"summon","jumon":-1}"#,
            r#"{"type":"move","jumon":3,"x":1.5,"y":2}"#,
            r#"{"type":"teleport","jumon":3}"#,
        ] {
            assert!(
                matches!(
                    parse_client_message(raw),
                    Some(ParsedClientMessage::Action(Event::ParserError(_)))
                ),
                "{raw}"
            );
        }
    }

    #[test]
    fn non_json_and_untyped_frames_are_rejected() {
        assert!(parse_client_message("pick 3").is_none());
        assert!(parse_client_message(r#"{"jumon":3}"#).is_none());
        assert!(parse_client_message(r#"{"type":"hello"}"#).is_none());
    }

    #[test]
    fn parse_ping_requires_number() {
        let parsed = parse_client_message(r#"{"type":"ping","t":12.5}"#);
        assert!(matches!(parsed, Some(ParsedClientMessage::Ping { .. })));
        assert!(parse_client_message(r#"{"type":"ping","t":"x"}"#).is_none());
    }
}
