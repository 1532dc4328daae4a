//! The set of handler kinds a deployment enables.
//!
//! Voice-only deployments ignore plain text, others answer it. Which one a
//! process is comes from configuration, never from the code path.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
    /// `/start` greeting.
    Start,
    /// `/help` command list.
    Help,
    Voice,
    Text,
}

impl HandlerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Voice => "voice",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandlerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "help" => Ok(Self::Help),
            "voice" => Ok(Self::Voice),
            "text" => Ok(Self::Text),
            other => Err(format!("unknown handler kind '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerSet(BTreeSet<HandlerKind>);

impl HandlerSet {
    pub fn new(kinds: impl IntoIterator<Item = HandlerKind>) -> Self {
        Self(kinds.into_iter().collect())
    }

    pub fn all() -> Self {
        Self::new([HandlerKind::Start, HandlerKind::Help, HandlerKind::Voice, HandlerKind::Text])
    }

    /// Parse a comma-separated list such as `"start,voice,text"`.
    pub fn parse_list(list: &str) -> Result<Self, String> {
        list.split(',')
            .filter(|s| !s.trim().is_empty())
            .map(HandlerKind::from_str)
            .collect::<Result<BTreeSet<_>, _>>()
            .map(Self)
    }

    pub fn contains(&self, kind: HandlerKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = HandlerKind> + '_ {
        self.0.iter().copied()
    }
}

/// Greeting plus voice, which is what the bot has always run with.
impl Default for HandlerSet {
    fn default() -> Self {
        Self::new([HandlerKind::Start, HandlerKind::Voice])
    }
}

impl fmt::Display for HandlerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(HandlerKind::as_str).collect();
        write!(f, "{}", names.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_voice_only_with_greeting() {
        let set = HandlerSet::default();
        assert!(set.contains(HandlerKind::Start));
        assert!(set.contains(HandlerKind::Voice));
        assert!(!set.contains(HandlerKind::Text));
        assert!(!set.contains(HandlerKind::Help));
    }

    #[test]
    fn test_parse_list() {
        let set = HandlerSet::parse_list(" Voice, text ,").unwrap();
        assert_eq!(set, HandlerSet::new([HandlerKind::Voice, HandlerKind::Text]));
        assert_eq!(set.to_string(), "voice,text");
    }

    #[test]
    fn test_parse_list_rejects_unknown() {
        let err = HandlerSet::parse_list("voice,photo").unwrap_err();
        assert!(err.contains("photo"));
    }

    #[test]
    fn test_deserialize_kind() {
        let kinds: Vec<HandlerKind> = serde_json::from_str(r#"["start","text"]"#).unwrap();
        assert_eq!(kinds, vec![HandlerKind::Start, HandlerKind::Text]);
    }
}
