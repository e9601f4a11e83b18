//! Movie Records
//!
//! Immutable movie entries as supplied by the catalog source, plus the
//! frame-offset type used to index a movie's seven scene stills.

use std::collections::BTreeMap;
use std::fmt;
use serde::{Serialize, Deserialize};

use super::CatalogError;

// =============================================================================
// FRAME OFFSET
// =============================================================================

/// Offset of the displayed still relative to the scene's middle frame.
///
/// Always within `[FrameOffset::MIN, FrameOffset::MAX]`; one step is
/// [`FrameOffset::STEP_SECONDS`] of film time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub struct FrameOffset(i8);

impl FrameOffset {
    /// Earliest still.
    pub const MIN: FrameOffset = FrameOffset(-3);
    /// Middle still, shown at round start.
    pub const ZERO: FrameOffset = FrameOffset(0);
    /// Latest still.
    pub const MAX: FrameOffset = FrameOffset(3);
    /// Number of stills per movie.
    pub const COUNT: usize = 7;
    /// Film time covered by one offset step.
    pub const STEP_SECONDS: i32 = 20;

    /// Create from a raw value, rejecting anything outside `[-3, 3]`.
    pub fn new(value: i8) -> Option<Self> {
        if (Self::MIN.0..=Self::MAX.0).contains(&value) {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Create from any integer, saturating at the bounds.
    pub fn clamped(value: i32) -> Self {
        Self(value.clamp(Self::MIN.0 as i32, Self::MAX.0 as i32) as i8)
    }

    /// Offset moved by `delta` steps, saturating at the bounds.
    pub fn shifted(self, delta: i32) -> Self {
        Self::clamped((self.0 as i32).saturating_add(delta))
    }

    /// Raw value in `[-3, 3]`.
    #[inline]
    pub fn value(self) -> i8 {
        self.0
    }

    /// Signed film-time shift in seconds (`-60..=60`).
    #[inline]
    pub fn seconds(self) -> i32 {
        self.0 as i32 * Self::STEP_SECONDS
    }

    /// All offsets from earliest to latest.
    pub fn all() -> impl Iterator<Item = FrameOffset> {
        (Self::MIN.0..=Self::MAX.0).map(FrameOffset)
    }

    #[inline]
    fn index(self) -> usize {
        (self.0 - Self::MIN.0) as usize
    }
}

impl TryFrom<i8> for FrameOffset {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("frame offset {} outside [-3, 3]", value))
    }
}

impl From<FrameOffset> for i8 {
    fn from(offset: FrameOffset) -> i8 {
        offset.0
    }
}

impl fmt::Display for FrameOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.seconds() {
            0 => write!(f, "0s"),
            s if s > 0 => write!(f, "+{}s", s),
            s => write!(f, "{}s", s),
        }
    }
}

// =============================================================================
// MOVIE
// =============================================================================

/// Opaque movie identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovieId(pub String);

impl fmt::Display for MovieId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Image references for every frame offset, earliest first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frames([String; FrameOffset::COUNT]);

impl Frames {
    /// Image reference for an offset.
    #[inline]
    pub fn get(&self, offset: FrameOffset) -> &str {
        &self.0[offset.index()]
    }

    fn from_map(id: &str, mut map: BTreeMap<i8, String>) -> Result<Self, CatalogError> {
        if let Some(bad) = map.keys().find(|k| FrameOffset::new(**k).is_none()) {
            return Err(CatalogError::invalid(id, format!("frame offset {} outside [-3, 3]", bad)));
        }

        let mut frames: [String; FrameOffset::COUNT] = Default::default();
        for offset in FrameOffset::all() {
            match map.remove(&offset.value()) {
                Some(image) => frames[offset.index()] = image,
                None => {
                    return Err(CatalogError::invalid(id, format!("missing frame {}", offset.value())));
                }
            }
        }
        Ok(Self(frames))
    }
}

/// Movie record exactly as it appears in a catalog file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MovieRecord {
    /// Opaque identifier
    pub id: String,
    /// Display title, also an accepted answer
    pub title: String,
    /// Lead character name, an alternate accepted answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
    /// Genre tag
    pub genre: String,
    /// Offset -> image reference
    pub frames: BTreeMap<i8, String>,
}

/// A validated movie: non-empty title, frames total over `[-3, 3]`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "MovieRecord")]
pub struct Movie {
    /// Opaque identifier
    pub id: MovieId,
    /// Display title
    pub title: String,
    /// Alternate accepted answer
    pub character: Option<String>,
    /// Genre tag
    pub genre: String,
    frames: Frames,
}

impl Movie {
    /// Build a movie from a raw record, enforcing its invariants.
    pub fn from_record(record: MovieRecord) -> Result<Self, CatalogError> {
        if record.title.trim().is_empty() {
            return Err(CatalogError::invalid(&record.id, "empty title"));
        }

        let frames = Frames::from_map(&record.id, record.frames)?;

        // A blank character name would match a blank guess
        let character = record.character.filter(|c| !c.trim().is_empty());

        Ok(Self {
            id: MovieId(record.id),
            title: record.title,
            character,
            genre: record.genre,
            frames,
        })
    }

    /// Image reference shown at `offset`.
    #[inline]
    pub fn frame(&self, offset: FrameOffset) -> &str {
        self.frames.get(offset)
    }

    /// All frames keyed by offset.
    pub fn frames(&self) -> impl Iterator<Item = (FrameOffset, &str)> {
        FrameOffset::all().map(move |o| (o, self.frames.get(o)))
    }
}

impl TryFrom<MovieRecord> for Movie {
    type Error = CatalogError;

    fn try_from(record: MovieRecord) -> Result<Self, Self::Error> {
        Movie::from_record(record)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn record(frames: BTreeMap<i8, String>) -> MovieRecord {
        MovieRecord {
            id: "m1".to_string(),
            title: "Inception".to_string(),
            character: None,
            genre: "Action".to_string(),
            frames,
        }
    }

    fn full_frames() -> BTreeMap<i8, String> {
        (-3..=3).map(|i| (i, format!("img{}", i))).collect()
    }

    #[test]
    fn test_frame_offset_clamp() {
        assert_eq!(FrameOffset::clamped(10), FrameOffset::MAX);
        assert_eq!(FrameOffset::clamped(-10), FrameOffset::MIN);
        assert_eq!(FrameOffset::clamped(2).value(), 2);
        assert_eq!(FrameOffset::MAX.shifted(1), FrameOffset::MAX);
        assert_eq!(FrameOffset::MIN.shifted(-1), FrameOffset::MIN);
        assert_eq!(FrameOffset::ZERO.shifted(i32::MAX), FrameOffset::MAX);
    }

    #[test]
    fn test_frame_offset_display() {
        assert_eq!(FrameOffset::ZERO.to_string(), "0s");
        assert_eq!(FrameOffset::MAX.to_string(), "+60s");
        assert_eq!(FrameOffset::clamped(-1).to_string(), "-20s");
    }

    #[test]
    fn test_frame_offset_new_rejects_out_of_range() {
        assert!(FrameOffset::new(4).is_none());
        assert!(FrameOffset::new(-4).is_none());
        assert_eq!(FrameOffset::all().count(), FrameOffset::COUNT);
    }

    #[test]
    fn test_movie_valid() {
        let movie = Movie::from_record(record(full_frames())).unwrap();
        assert_eq!(movie.frame(FrameOffset::MIN), "img-3");
        assert_eq!(movie.frame(FrameOffset::ZERO), "img0");
        assert_eq!(movie.frame(FrameOffset::MAX), "img3");
        assert_eq!(movie.frames().count(), 7);
    }

    #[test]
    fn test_movie_missing_frame() {
        let mut frames = full_frames();
        frames.remove(&2);
        let err = Movie::from_record(record(frames)).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidMovie { .. }));
    }

    #[test]
    fn test_movie_extra_frame() {
        let mut frames = full_frames();
        frames.insert(4, "img4".to_string());
        assert!(Movie::from_record(record(frames)).is_err());
    }

    #[test]
    fn test_movie_empty_title() {
        let mut rec = record(full_frames());
        rec.title = "   ".to_string();
        assert!(Movie::from_record(rec).is_err());
    }

    #[test]
    fn test_blank_character_dropped() {
        let mut rec = record(full_frames());
        rec.character = Some(" ".to_string());
        let movie = Movie::from_record(rec).unwrap();
        assert!(movie.character.is_none());
    }

    #[test]
    fn test_movie_from_json() {
        let json = r#"{
            "id": "6", "title": "The Matrix", "character": "Neo", "genre": "Sci-Fi",
            "frames": {"-3": "a", "-2": "b", "-1": "c", "0": "d", "1": "e", "2": "f", "3": "g"}
        }"#;
        let movie: Movie = serde_json::from_str(json).unwrap();
        assert_eq!(movie.character.as_deref(), Some("Neo"));
        assert_eq!(movie.frame(FrameOffset::ZERO), "d");
    }
}
