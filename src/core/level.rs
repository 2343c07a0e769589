//! Log level definitions
//!
//! Levels are ordered from most to least severe: `Panic < Fatal < Error <
//! Warning < Info < Debug`. A logger configured at a minimum level `min`
//! accepts a call at `level` iff `level <= min`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum Level {
    Panic = 0,
    Fatal = 1,
    Error = 2,
    Warning = 3,
    #[default]
    Info = 4,
    Debug = 5,
}

const LEVEL_NAMES: [&str; 6] = ["panic", "fatal", "error", "warning", "info", "debug"];

impl Level {
    /// Every level, most severe first
    pub const ALL: [Level; 6] = [
        Level::Panic,
        Level::Fatal,
        Level::Error,
        Level::Warning,
        Level::Info,
        Level::Debug,
    ];

    #[inline]
    pub fn as_str(&self) -> &'static str {
        LEVEL_NAMES[*self as usize]
    }

    /// Whether a call at `self` passes a logger whose minimum level is `min`
    #[inline]
    pub fn is_enabled_for(self, min: Level) -> bool {
        self <= min
    }

    /// Terminal color for this level
    pub fn color_code(&self) -> colored::Color {
        use colored::Color::*;
        match self {
            Level::Panic => BrightBlack,
            Level::Fatal => Red,
            Level::Error => Red,
            Level::Warning => Yellow,
            Level::Info => Blue,
            Level::Debug => Cyan,
        }
    }

    /// Whether the level token is rendered bold on a terminal
    pub fn is_bold(&self) -> bool {
        matches!(self, Level::Panic | Level::Fatal)
    }

    #[inline]
    fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "panic" => Ok(Level::Panic),
            "fatal" => Ok(Level::Fatal),
            "error" => Ok(Level::Error),
            "warning" | "warn" => Ok(Level::Warning),
            "info" => Ok(Level::Info),
            "debug" => Ok(Level::Debug),
            _ => Err(format!("unknown log level: '{}'", s)),
        }
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Bitmask of levels, one bit per [`Level`]
///
/// Used for the per-logger caller/stacktrace enablement sets so that a
/// membership test is a single AND.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct LevelSet(u32);

impl LevelSet {
    pub const EMPTY: LevelSet = LevelSet(0);
    pub const ALL: LevelSet = LevelSet(0b11_1111);

    #[inline]
    pub fn contains(self, level: Level) -> bool {
        self.0 & level.bit() != 0
    }

    #[inline]
    pub fn insert(&mut self, level: Level) {
        self.0 |= level.bit();
    }

    #[must_use]
    pub fn with(mut self, level: Level) -> Self {
        self.insert(level);
        self
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl FromIterator<Level> for LevelSet {
    fn from_iter<I: IntoIterator<Item = Level>>(iter: I) -> Self {
        let mut set = LevelSet::EMPTY;
        for level in iter {
            set.insert(level);
        }
        set
    }
}

impl<'a> FromIterator<&'a Level> for LevelSet {
    fn from_iter<I: IntoIterator<Item = &'a Level>>(iter: I) -> Self {
        iter.into_iter().copied().collect()
    }
}
