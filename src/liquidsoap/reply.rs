//! Reply framing and parsing of typed replies.

use std::sync::OnceLock;

use regex::Regex;

/// Substrings that make the engine close a command's reply with `Bye!`.
///
/// Matching is textual on the outgoing command. A command that needs the same
/// framing only has to be added here.
const BYE_COMMAND_MARKERS: &[&str] = &["quit", "exit"];

/// Byte sequence that closes a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// `END\r\n`, closes every ordinary reply.
    End,
    /// `Bye!\r\n`, closes the reply to quit/exit.
    Bye,
}

impl Terminator {
    /// Terminator the engine will use for `command`.
    pub fn for_command(command: &str) -> Self {
        if BYE_COMMAND_MARKERS.iter().any(|m| command.contains(m)) {
            Self::Bye
        } else {
            Self::End
        }
    }

    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::End => b"END\r\n",
            Self::Bye => b"Bye!\r\n",
        }
    }

    /// The terminator that must not show up while waiting for this one.
    pub fn other(self) -> Self {
        match self {
            Self::End => Self::Bye,
            Self::Bye => Self::End,
        }
    }
}

/// Engine version as reported by the `version` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    /// `major.minor.patch`
    pub full: String,
    pub major: String,
    pub minor: String,
    pub patch: String,
}

/// Parse an `uptime` reply such as `2d 03h 14m 05s`.
///
/// Returns `None` when the reply does not start with that shape.
pub fn parse_uptime(reply: &str) -> Option<chrono::Duration> {
    static UPTIME_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = UPTIME_REGEX.get_or_init(|| {
        Regex::new(r"^(\d+)d (\d{1,2})h (\d{1,2})m (\d{1,2})s")
            .expect("failed to compile uptime regex")
    });

    let caps = regex.captures(reply)?;
    let field = |i: usize| caps.get(i)?.as_str().parse::<i64>().ok();

    let days = chrono::Duration::try_days(field(1)?)?;
    let rest = chrono::Duration::try_seconds(field(2)? * 3600 + field(3)? * 60 + field(4)?)?;
    days.checked_add(&rest)
}

/// Parse a `version` reply such as `Liquidsoap 1.4.2`.
///
/// Returns `None` when the reply does not start with `<name> <x>.<y>.<z>`.
pub fn parse_version(reply: &str) -> Option<VersionInfo> {
    static VERSION_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = VERSION_REGEX.get_or_init(|| {
        Regex::new(r"^\S+ (?P<full>(?P<major>\d+)\.(?P<minor>\d+)\.(?P<patch>\d+))")
            .expect("failed to compile version regex")
    });

    let caps = regex.captures(reply)?;
    Some(VersionInfo {
        full: caps["full"].to_string(),
        major: caps["major"].to_string(),
        minor: caps["minor"].to_string(),
        patch: caps["patch"].to_string(),
    })
}
