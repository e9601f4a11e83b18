//! Genre Selector

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};

/// Genre chosen on the selection screen.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
#[derive(Default)]
pub enum GenreFilter {
    /// Any movie in the catalog.
    #[default]
    Random,
    /// Movies whose genre tag equals this string exactly.
    Tag(String),
}

impl GenreFilter {
    /// Selector label for the unfiltered catalog.
    pub const RANDOM: &'static str = "Random";

    /// Selector for a specific tag.
    pub fn tag(tag: impl Into<String>) -> Self {
        Self::from(tag.into())
    }

    /// Whether a movie with genre `tag` is eligible.
    #[inline]
    pub fn accepts(&self, tag: &str) -> bool {
        match self {
            GenreFilter::Random => true,
            GenreFilter::Tag(t) => t == tag,
        }
    }

    /// Selector label.
    pub fn as_str(&self) -> &str {
        match self {
            GenreFilter::Random => Self::RANDOM,
            GenreFilter::Tag(t) => t,
        }
    }
}

impl From<String> for GenreFilter {
    fn from(s: String) -> Self {
        if s == Self::RANDOM {
            GenreFilter::Random
        } else {
            GenreFilter::Tag(s)
        }
    }
}

impl From<GenreFilter> for String {
    fn from(genre: GenreFilter) -> String {
        match genre {
            GenreFilter::Random => GenreFilter::RANDOM.to_string(),
            GenreFilter::Tag(t) => t,
        }
    }
}

impl FromStr for GenreFilter {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_string()))
    }
}

impl fmt::Display for GenreFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
