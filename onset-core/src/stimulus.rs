use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Defines stimulus kinds and how they are presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StimulusKind {
    Image,
    Sound,
    Text,
    /// Marks the end of the timeline; carries no payload.
    End,
}

impl StimulusKind {
    /// Hardware trigger line (1-8) marking stimuli of this kind.
    pub fn trigger_line(&self) -> Option<u8> {
        match self {
            StimulusKind::Image => Some(1),
            StimulusKind::Sound => Some(2),
            StimulusKind::Text => Some(3),
            StimulusKind::End => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StimulusKind::Image => "image",
            StimulusKind::Sound => "sound",
            StimulusKind::Text => "text",
            StimulusKind::End => "end",
        }
    }
}

impl std::str::FromStr for StimulusKind {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(StimulusKind::Image),
            "sound" => Ok(StimulusKind::Sound),
            "text" => Ok(StimulusKind::Text),
            "end" => Ok(StimulusKind::End),
            other => Err(TimelineError::UnknownKind(other.to_string())),
        }
    }
}

/// One scheduled stimulus. `payload` is a file path for images and sounds
/// and the literal text for text stimuli.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StimulusEvent {
    pub onset_ms: u64,
    pub duration_ms: u64,
    pub kind: StimulusKind,
    pub payload: String,
}

impl StimulusEvent {
    pub fn new(
        onset_ms: u64,
        duration_ms: u64,
        kind: StimulusKind,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            onset_ms,
            duration_ms,
            kind,
            payload: payload.into(),
        }
    }

    /// Timeline-prescribed offset time.
    pub fn offset_ms(&self) -> u64 {
        self.onset_ms.saturating_add(self.duration_ms)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimelineError {
    #[error("stimulus {index} starts at {onset_ms} ms, before the previous one at {previous_ms} ms")]
    OutOfOrder {
        index: usize,
        onset_ms: u64,
        previous_ms: u64,
    },
    #[error("unknown stimulus kind `{0}`")]
    UnknownKind(String),
}

/// Ordered stimulus sequence, sorted by onset and immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    events: Vec<StimulusEvent>,
}

impl Timeline {
    pub fn new(events: Vec<StimulusEvent>) -> Result<Self, TimelineError> {
        for (index, pair) in events.windows(2).enumerate() {
            if pair[1].onset_ms < pair[0].onset_ms {
                return Err(TimelineError::OutOfOrder {
                    index: index + 1,
                    onset_ms: pair[1].onset_ms,
                    previous_ms: pair[0].onset_ms,
                });
            }
        }
        Ok(Self { events })
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StimulusEvent> {
        self.events.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StimulusEvent> {
        self.events.iter()
    }

    pub fn events(&self) -> &[StimulusEvent] {
        &self.events
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a StimulusEvent;
    type IntoIter = std::slice::Iter<'a, StimulusEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsorted_events() {
        let err = Timeline::new(vec![
            StimulusEvent::new(100, 50, StimulusKind::Image, "a.png"),
            StimulusEvent::new(40, 50, StimulusKind::Text, "x"),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            TimelineError::OutOfOrder {
                index: 1,
                onset_ms: 40,
                previous_ms: 100
            }
        );
    }

    #[test]
    fn equal_onsets_are_allowed() {
        let t = Timeline::new(vec![
            StimulusEvent::new(0, 500, StimulusKind::Image, "a.png"),
            StimulusEvent::new(0, 200, StimulusKind::Sound, "b.wav"),
        ])
        .unwrap();
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn kind_parsing_is_case_insensitive() {
        assert_eq!("IMAGE".parse::<StimulusKind>(), Ok(StimulusKind::Image));
        assert_eq!(" Sound ".parse::<StimulusKind>(), Ok(StimulusKind::Sound));
        assert!(matches!(
            "video".parse::<StimulusKind>(),
            Err(TimelineError::UnknownKind(k)) if k == "video"
        ));
    }

    #[test]
    fn trigger_lines_per_kind() {
        assert_eq!(StimulusKind::Image.trigger_line(), Some(1));
        assert_eq!(StimulusKind::Sound.trigger_line(), Some(2));
        assert_eq!(StimulusKind::Text.trigger_line(), Some(3));
        assert_eq!(StimulusKind::End.trigger_line(), None);
    }
}
