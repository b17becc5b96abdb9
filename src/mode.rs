//! The four mutually-exclusive panels of the session.
//!
//! A single tagged enum rather than independent visibility flags, so exactly
//! one panel is addressable at a time. The mode gates what the shell shows,
//! never which network operations are possible.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Upload,
    Embed,
    Store,
    Search,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Upload, Mode::Embed, Mode::Store, Mode::Search];

    /// One-line hint shown when the panel becomes active.
    pub fn hint(&self) -> &'static str {
        match self {
            Mode::Upload => "stage files with 'stage <path>...', review with 'files'",
            Mode::Embed => "run 'submit' to start an embedding job, 'status' to check it",
            Mode::Store => "configure with 'db set ...', then 'store add' or 'store update'",
            Mode::Search => "run 'search <text>' against the configured collection",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Upload => "upload",
            Mode::Embed => "embed",
            Mode::Store => "store",
            Mode::Search => "search",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "upload" => Ok(Mode::Upload),
            "embed" => Ok(Mode::Embed),
            "store" => Ok(Mode::Store),
            "search" => Ok(Mode::Search),
            _ => Err(Error::Config(format!(
                "Unknown mode '{}'; expected upload, embed, store or search",
                value
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_modes_case_insensitively() {
        assert_eq!("upload".parse::<Mode>().unwrap(), Mode::Upload);
        assert_eq!("EMBED".parse::<Mode>().unwrap(), Mode::Embed);
        assert_eq!("Store".parse::<Mode>().unwrap(), Mode::Store);
        assert_eq!("search".parse::<Mode>().unwrap(), Mode::Search);
        assert!("browse".parse::<Mode>().is_err());
    }

    #[test]
    fn default_mode_is_upload() {
        assert_eq!(Mode::default(), Mode::Upload);
    }
}
