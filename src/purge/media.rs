use std::{collections::BTreeSet, fmt, str::FromStr};

use itertools::Itertools;
use snafu::{Snafu, ensure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MediaType {
    /// Any message carrying an attachment, embed or sticker.
    All,
    Attachments,
    Stickers,
    Gifs,
    Emojis,
}

impl MediaType {
    pub const VARIANTS: [MediaType; 5] = [
        MediaType::All,
        MediaType::Attachments,
        MediaType::Stickers,
        MediaType::Gifs,
        MediaType::Emojis,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::All => "all",
            MediaType::Attachments => "attachments",
            MediaType::Stickers => "stickers",
            MediaType::Gifs => "gifs",
            MediaType::Emojis => "emojis",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum ParseMediaError {
    #[snafu(display("`{token}` is not a media type"))]
    UnknownMedia { token: String },
    #[snafu(display("at least one media type is required"))]
    EmptyMedia,
}

impl FromStr for MediaType {
    type Err = ParseMediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(MediaType::All),
            "attachments" | "attachment" | "images" => Ok(MediaType::Attachments),
            "stickers" | "sticker" => Ok(MediaType::Stickers),
            "gifs" | "gif" => Ok(MediaType::Gifs),
            "emojis" | "emoji" => Ok(MediaType::Emojis),
            _ => UnknownMediaSnafu { token: s.trim() }.fail(),
        }
    }
}

/// Non-empty set of requested media types.
///
/// `all` may coexist with other members; it simply subsumes them when a
/// message is classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSet(BTreeSet<MediaType>);

impl MediaSet {
    pub fn new(types: impl IntoIterator<Item = MediaType>) -> Result<Self, ParseMediaError> {
        let set = types.into_iter().collect::<BTreeSet<_>>();
        ensure!(!set.is_empty(), EmptyMediaSnafu);
        Ok(Self(set))
    }

    pub fn contains(&self, kind: MediaType) -> bool {
        self.0.contains(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = MediaType> + '_ {
        self.0.iter().copied()
    }

    /// Canonical comma separated form used for storage.
    pub fn to_stored(&self) -> String {
        self.0.iter().join(",")
    }
}

impl FromStr for MediaSet {
    type Err = ParseMediaError;

    /// Parses a comma separated list such as `attachments, gifs`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let types = s
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(MediaType::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(types)
    }
}

impl fmt::Display for MediaSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.iter().join(", "))
    }
}
