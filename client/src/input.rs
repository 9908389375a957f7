//! Typed console commands and their translation into request packets

use shared::{BallotChoice, ObjectId, Packet, PlayerId, Vec3};

pub const HELP: &str = "\
commands:
  move <x> <z>      report your position
  goto <object>     move onto an object
  interact <object> use an object; again to leave a locker or cameras
  report            call a meeting
  kill <player>     (impostor) eliminate a nearby player
  sabotage          (impostor) turn off the lights
  vote <player>     vote to eject a player
  skip              vote to skip
  restart           (host) start a new round after game over
  status            show the round
  help              show this list
  quit              leave the game";

/// A parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Move { x: f32, z: f32 },
    Goto(ObjectId),
    Interact(ObjectId),
    Report,
    Kill(PlayerId),
    Sabotage,
    Vote(PlayerId),
    Skip,
    Restart,
    Status,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Command, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err("empty command".to_string());
        };
        let args: Vec<&str> = words.collect();

        let number = |index: usize| -> Result<u32, String> {
            args.get(index)
                .ok_or_else(|| format!("`{}` needs an id", verb))?
                .parse::<u32>()
                .map_err(|e| format!("bad id: {}", e))
        };
        let coordinate = |index: usize| -> Result<f32, String> {
            let value = args
                .get(index)
                .ok_or_else(|| "`move` needs <x> <z>".to_string())?
                .parse::<f32>()
                .map_err(|e| format!("bad coordinate: {}", e))?;
            if value.is_finite() {
                Ok(value)
            } else {
                Err("coordinates must be finite".to_string())
            }
        };

        match verb.to_ascii_lowercase().as_str() {
            "move" | "m" => Ok(Command::Move {
                x: coordinate(0)?,
                z: coordinate(1)?,
            }),
            "goto" | "g" => Ok(Command::Goto(number(0)?)),
            "interact" | "use" | "e" => Ok(Command::Interact(number(0)?)),
            "report" => Ok(Command::Report),
            "kill" => Ok(Command::Kill(number(0)?)),
            "sabotage" => Ok(Command::Sabotage),
            "vote" => Ok(Command::Vote(number(0)?)),
            "skip" => Ok(Command::Skip),
            "restart" => Ok(Command::Restart),
            "status" | "s" => Ok(Command::Status),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            other => Err(format!("unknown command `{}` (try `help`)", other)),
        }
    }
}

/// Turns commands into packets and numbers position updates
pub struct InputManager {
    next_sequence: u32,
}

impl InputManager {
    pub fn new() -> Self {
        Self { next_sequence: 1 }
    }

    pub fn position_packet(&mut self, position: Vec3) -> Packet {
        let packet = Packet::Position {
            sequence: self.next_sequence,
            position,
        };
        self.next_sequence += 1;
        packet
    }

    /// The request packet for `command`, if it maps to one. `goto` needs the
    /// object's position from the caller.
    pub fn to_packet(&mut self, command: &Command, goto: Option<Vec3>) -> Option<Packet> {
        match command {
            Command::Move { x, z } => Some(self.position_packet(Vec3::new(*x, 0.0, *z))),
            Command::Goto(_) => goto.map(|position| self.position_packet(position)),
            Command::Interact(object_id) => Some(Packet::Interact {
                object_id: *object_id,
            }),
            Command::Report => Some(Packet::ReportBody),
            Command::Kill(target) => Some(Packet::Kill { target: *target }),
            Command::Sabotage => Some(Packet::SabotageLights),
            Command::Vote(target) => Some(Packet::CastBallot {
                choice: BallotChoice::Player(*target),
            }),
            Command::Skip => Some(Packet::CastBallot {
                choice: BallotChoice::Skip,
            }),
            Command::Restart => Some(Packet::RequestRestart),
            Command::Quit => Some(Packet::Disconnect),
            Command::Status | Command::Help => None,
        }
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse("move 1.5 -2"),
            Ok(Command::Move { x: 1.5, z: -2.0 })
        );
        assert_eq!(Command::parse("  interact 4 "), Ok(Command::Interact(4)));
        assert_eq!(Command::parse("VOTE 3"), Ok(Command::Vote(3)));
        assert_eq!(Command::parse("skip"), Ok(Command::Skip));
        assert_eq!(Command::parse("q"), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Command::parse("").is_err());
        assert!(Command::parse("kill").is_err());
        assert!(Command::parse("kill bob").is_err());
        assert!(Command::parse("move 1").is_err());
        assert!(Command::parse("move nan 0").is_err());
        assert!(Command::parse("dance").is_err());
    }

    #[test]
    fn test_position_sequence_increments() {
        let mut input = InputManager::new();
        let first = input.to_packet(&Command::Move { x: 1.0, z: 2.0 }, None);
        let second = input.to_packet(&Command::Goto(3), Some(Vec3::new(4.0, 0.0, 5.0)));

        assert_eq!(
            first,
            Some(Packet::Position {
                sequence: 1,
                position: Vec3::new(1.0, 0.0, 2.0)
            })
        );
        assert_eq!(
            second,
            Some(Packet::Position {
                sequence: 2,
                position: Vec3::new(4.0, 0.0, 5.0)
            })
        );
        assert_eq!(input.to_packet(&Command::Goto(9), None), None);
    }

    #[test]
    fn test_commands_map_to_requests() {
        let mut input = InputManager::new();
        assert_eq!(
            input.to_packet(&Command::Skip, None),
            Some(Packet::CastBallot {
                choice: BallotChoice::Skip
            })
        );
        assert_eq!(
            input.to_packet(&Command::Kill(2), None),
            Some(Packet::Kill { target: 2 })
        );
        assert_eq!(input.to_packet(&Command::Status, None), None);
    }
}
