// THEORY:
// `Command` is the closed alphabet the drivetrain firmware understands. Every
// decision in the system, per camera or arbitrated, is one of these values. Each
// transmittable command is a single ASCII token followed by a newline on the wire.
//
// `Noop` is the "no opinion" decision: a camera that sees nothing to act on
// returns it, and it is never put on the wire.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Command {
    Forward,
    TurnLeft,
    TurnRight,
    Stop,
    /// Centred on the target: hold heading, stop advancing and realign.
    Align,
    /// Short re-scan kick while searching.
    Nudge,
    /// Sent ahead of every tracking decision.
    TargetAcquired,
    #[default]
    Noop,
}

impl Command {
    /// The wire token, or `None` for `Noop`.
    pub fn token(&self) -> Option<&'static str> {
        match self {
            Command::Forward => Some("w"),
            Command::TurnLeft => Some("q"),
            Command::TurnRight => Some("e"),
            Command::Stop => Some("s"),
            Command::Align => Some("="),
            Command::Nudge => Some("y"),
            Command::TargetAcquired => Some("n"),
            Command::Noop => None,
        }
    }

    /// The newline-terminated frame written to the transport.
    pub fn wire_frame(&self) -> Option<String> {
        self.token().map(|token| format!("{}\n", token))
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Command::Noop)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Forward => "forward",
            Command::TurnLeft => "turn-left",
            Command::TurnRight => "turn-right",
            Command::Stop => "stop",
            Command::Align => "align",
            Command::Nudge => "nudge",
            Command::TargetAcquired => "target-acquired",
            Command::Noop => "no-op",
        };
        f.write_str(name)
    }
}
