use serde::{Deserialize, Serialize};

use crate::StimulusKind;

/// Kinds of events recorded during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    ImageOnset,
    ImageOffset,
    TextOnset,
    TextOffset,
    SoundOnset,
    Response,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ImageOnset => "IMAGE_ONSET",
            EventKind::ImageOffset => "IMAGE_OFFSET",
            EventKind::TextOnset => "TEXT_ONSET",
            EventKind::TextOffset => "TEXT_OFFSET",
            EventKind::SoundOnset => "SOUND_ONSET",
            EventKind::Response => "RESPONSE",
        }
    }

    pub fn onset_of(kind: StimulusKind) -> Option<Self> {
        match kind {
            StimulusKind::Image => Some(EventKind::ImageOnset),
            StimulusKind::Text => Some(EventKind::TextOnset),
            StimulusKind::Sound => Some(EventKind::SoundOnset),
            StimulusKind::End => None,
        }
    }

    /// Sounds have no logged offset; they play out on the mixer.
    pub fn offset_of(kind: StimulusKind) -> Option<Self> {
        match kind {
            StimulusKind::Image => Some(EventKind::ImageOffset),
            StimulusKind::Text => Some(EventKind::TextOffset),
            StimulusKind::Sound | StimulusKind::End => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded event. `intended_ms` is the timeline-prescribed time,
/// `actual_ms` the measured run time once the event was confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub intended_ms: u64,
    pub actual_ms: u64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub label: String,
}

/// Append-only record of everything that happened during a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventLog {
    entries: Vec<EventLogEntry>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Returns false when the log could not grow; the event is then not recorded.
    pub fn append(
        &mut self,
        intended_ms: u64,
        actual_ms: u64,
        kind: EventKind,
        label: impl Into<String>,
    ) -> bool {
        if self.entries.len() == self.entries.capacity() {
            let additional = self.entries.capacity().max(64);
            if self.entries.try_reserve(additional).is_err() {
                tracing::error!(%kind, "event log allocation failed, event dropped");
                return false;
            }
        }
        self.entries.push(EventLogEntry {
            intended_ms,
            actual_ms,
            kind,
            label: label.into(),
        });
        true
    }

    pub fn entries(&self) -> &[EventLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EventLogEntry> {
        self.entries.iter()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a EventLogEntry;
    type IntoIter = std::slice::Iter<'a, EventLogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
