//! Source discovery from the engine's command listing.

use std::collections::HashSet;

/// Prefix of every entry in the `help` listing.
pub const LISTING_PREFIX: &str = "| ";

/// Extension of the per-source level command (`<source><suffix>.rms`).
pub const LEVEL_COMMAND_EXTENSION: &str = ".rms";

/// Naming convention of the level commands a script registers.
///
/// A script exposing the level of `stream_a` with suffix `_rms` registers the
/// command `stream_a_rms.rms`, listed by `help` as `| stream_a_rms.rms`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelCommands {
    suffix: String,
}

impl LevelCommands {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    /// Command that queries the level of `source`.
    pub fn query(&self, source: &str) -> String {
        format!("{source}{}{LEVEL_COMMAND_EXTENSION}", self.suffix)
    }

    /// Distinct source names listed in a `help` reply, in order of first listing.
    ///
    /// Lines that do not carry the prefix and the full suffix are skipped.
    pub fn discover(&self, listing: &str) -> Vec<String> {
        let marker = format!("{}{LEVEL_COMMAND_EXTENSION}", self.suffix);
        let mut seen = HashSet::new();

        listing
            .lines()
            .map(str::trim_end)
            .filter_map(|line| line.strip_prefix(LISTING_PREFIX)?.strip_suffix(marker.as_str()))
            .filter(|name| !name.is_empty() && !name.contains(char::is_whitespace))
            .filter(|name| seen.insert(*name))
            .map(str::to_owned)
            .collect()
    }
}

impl Default for LevelCommands {
    fn default() -> Self {
        Self::new("_rms")
    }
}
