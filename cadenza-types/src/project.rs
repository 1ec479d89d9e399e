use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Resolution of musical time: ticks per quarter note.
pub const TICKS_PER_QUARTER: i32 = 480;

/// The live project document. Exactly one instance is editable at a time;
/// the command engine owns it and all structural mutation goes through there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub comment: String,
    pub bpm: f64,
    pub beat_per_bar: u8,
    pub beat_unit: u8,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub parts: Vec<Part>,
    /// Where this project lives on disk. Runtime-only; set on save/load.
    #[serde(skip)]
    pub file_path: Option<PathBuf>,
    /// Whether the project has ever been written to `file_path`.
    #[serde(skip)]
    pub saved: bool,
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

impl Project {
    pub fn new() -> Self {
        Self {
            name: "New Project".to_string(),
            comment: String::new(),
            bpm: 120.0,
            beat_per_bar: 4,
            beat_unit: 4,
            tracks: Vec::new(),
            parts: Vec::new(),
            file_path: None,
            saved: false,
        }
    }

    /// Ticks per bar at the project time signature.
    pub fn ticks_per_bar(&self) -> i32 {
        TICKS_PER_QUARTER * 4 * i32::from(self.beat_per_bar) / i32::from(self.beat_unit)
    }

    /// End of the last part, in ticks. Zero for an empty project.
    pub fn end_tick(&self) -> i32 {
        self.parts.iter().map(Part::end_tick).max().unwrap_or(0)
    }

    /// Parts on the given track, in document order.
    pub fn parts_on_track(&self, track_no: usize) -> impl Iterator<Item = &Part> {
        self.parts.iter().filter(move |p| p.track_no == track_no)
    }
}

/// A performance track. `phonemizer` names a capability tag resolved against
/// the extension catalog at validation time; the tag is persisted even when
/// the matching extension is absent on this machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    #[serde(default)]
    pub singer: Option<String>,
    pub phonemizer: String,
    #[serde(default)]
    pub mute: bool,
    pub volume: f64,
}

impl Track {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            singer: None,
            phonemizer: "DEFAULT".to_string(),
            mute: false,
            volume: 1.0,
        }
    }
}

/// A clip of notes placed on a track at an absolute tick position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub name: String,
    pub track_no: usize,
    pub position: i32,
    pub duration: i32,
    #[serde(default)]
    pub notes: Vec<Note>,
}

impl Part {
    pub fn new(name: impl Into<String>, track_no: usize, position: i32) -> Self {
        Self {
            name: name.into(),
            track_no,
            position,
            duration: 0,
            notes: Vec::new(),
        }
    }

    pub fn end_tick(&self) -> i32 {
        self.position + self.duration
    }

    /// End of the last note relative to the part start. Zero when empty.
    pub fn notes_end(&self) -> i32 {
        self.notes.iter().map(|n| n.position + n.duration).max().unwrap_or(0)
    }
}

/// A single note. `phonemes` is derived state, recomputed by validation;
/// it is persisted so a document renders identically before revalidation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub position: i32,
    pub duration: i32,
    pub tone: u8,
    pub lyric: String,
    #[serde(default)]
    pub phonemes: Vec<String>,
}

impl Note {
    pub fn new(position: i32, duration: i32, tone: u8, lyric: impl Into<String>) -> Self {
        Self {
            position,
            duration,
            tone,
            lyric: lyric.into(),
            phonemes: Vec::new(),
        }
    }

    pub fn end(&self) -> i32 {
        self.position + self.duration
    }
}
