//! Liveness beacon lines
//!
//! The agent sends these as unframed text messages next to the binary
//! packet stream:
//!
//! ```text
//! HEARTBEAT|session=<uuid>|uptime_ms=<n>|screen=<name>
//! SCREEN|name=<name>
//! ```
//!
//! They are informational and never answer a command.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Beacon {
    Heartbeat {
        session: String,
        uptime_ms: u64,
        screen: String,
    },
    Screen {
        name: String,
    },
}

/// Strips characters that would break the line format
pub fn sanitize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '|' | '=' | '\r' | '\n'))
        .collect()
}

impl Beacon {
    pub fn heartbeat(session: impl fmt::Display, uptime_ms: u64, screen: &str) -> Self {
        Beacon::Heartbeat {
            session: session.to_string(),
            uptime_ms,
            screen: screen.to_string(),
        }
    }

    pub fn screen(name: &str) -> Self {
        Beacon::Screen {
            name: name.to_string(),
        }
    }

    pub fn to_line(&self) -> String {
        match self {
            Beacon::Heartbeat {
                session,
                uptime_ms,
                screen,
            } => format!(
                "HEARTBEAT|session={}|uptime_ms={}|screen={}",
                sanitize(session),
                uptime_ms,
                sanitize(screen)
            ),
            Beacon::Screen { name } => format!("SCREEN|name={}", sanitize(name)),
        }
    }

    /// Parses a beacon line; unknown kinds and missing fields yield `None`
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut parts = line.split('|');
        let kind = parts.next()?;

        let field = |name: &str| {
            line.split('|')
                .skip(1)
                .filter_map(|part| part.split_once('='))
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        };

        match kind {
            "HEARTBEAT" => Some(Beacon::Heartbeat {
                session: field("session")?,
                uptime_ms: field("uptime_ms")?.parse().ok()?,
                screen: field("screen").unwrap_or_default(),
            }),
            "SCREEN" => Some(Beacon::Screen {
                name: field("name")?,
            }),
            _ => None,
        }
    }

    /// Screen named by the beacon
    pub fn screen_name(&self) -> &str {
        match self {
            Beacon::Heartbeat { screen, .. } => screen,
            Beacon::Screen { name } => name,
        }
    }
}

impl fmt::Display for Beacon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_line() {
        let beacon = Beacon::heartbeat("abc", 1500, "ScreenTitleMenu");
        assert_eq!(
            beacon.to_line(),
            "HEARTBEAT|session=abc|uptime_ms=1500|screen=ScreenTitleMenu"
        );
        assert_eq!(Beacon::parse(&beacon.to_line()), Some(beacon));
    }

    #[test]
    fn test_screen_line() {
        assert_eq!(Beacon::screen("ScreenGameplay").to_line(), "SCREEN|name=ScreenGameplay");
        assert_eq!(
            Beacon::parse("SCREEN|name=ScreenEvaluation\n"),
            Some(Beacon::screen("ScreenEvaluation"))
        );
    }

    #[test]
    fn test_values_are_sanitized() {
        let line = Beacon::screen("Bad|Name=\r\n").to_line();
        assert_eq!(line, "SCREEN|name=BadName");
    }

    #[test]
    fn test_parse_rejects_unknown_and_incomplete() {
        assert_eq!(Beacon::parse("PING|x=1"), None);
        assert_eq!(Beacon::parse("HEARTBEAT|session=abc"), None);
        assert_eq!(Beacon::parse("HEARTBEAT|session=abc|uptime_ms=x"), None);
        assert_eq!(Beacon::parse(""), None);
    }
}
