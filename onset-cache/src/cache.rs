use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use onset_core::{PcmBuffer, StimulusKind, Timeline};
pub use string_cache::DefaultAtom as Atom;
use tiny_skia::Pixmap;

/// Decoded, drawable image or rendered text
#[derive(Debug, Clone)]
pub struct Texture {
    pub pixmap: Arc<Pixmap>,
}

impl Texture {
    pub fn new(pixmap: Pixmap) -> Self {
        Self {
            pixmap: Arc::new(pixmap),
        }
    }

    /// Natural width in pixels, before scaling.
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn byte_len(&self) -> usize {
        self.pixmap.data().len()
    }
}

#[derive(Debug, Clone)]
pub enum AssetPayload {
    Visual(Texture),
    Audio(Arc<PcmBuffer>),
}

/// One cache entry, identified by `(kind, source_key)`. A `None` payload
/// records a failed decode so it is not retried.
#[derive(Debug)]
pub struct CachedAsset {
    pub kind: StimulusKind,
    pub source_key: Atom,
    pub payload: Option<AssetPayload>,
}

impl CachedAsset {
    pub fn texture(&self) -> Option<&Texture> {
        match &self.payload {
            Some(AssetPayload::Visual(texture)) => Some(texture),
            _ => None,
        }
    }

    pub fn sound(&self) -> Option<&Arc<PcmBuffer>> {
        match &self.payload {
            Some(AssetPayload::Audio(pcm)) => Some(pcm),
            _ => None,
        }
    }
}

/// Turns timeline payloads into assets. Implementations do the actual
/// file I/O and rasterisation.
pub trait AssetDecoder {
    type Error: Display;

    fn decode_image(&mut self, source: &str) -> Result<Pixmap, Self::Error>;
    fn decode_sound(&mut self, source: &str) -> Result<PcmBuffer, Self::Error>;
    fn render_text(&mut self, text: &str) -> Result<Pixmap, Self::Error>;
}

/// Per-timeline-entry handle. `asset` is `None` for `End` entries.
#[derive(Debug, Clone, Default)]
pub struct ResolvedResource {
    pub asset: Option<Arc<CachedAsset>>,
}

impl ResolvedResource {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn texture(&self) -> Option<&Texture> {
        self.asset.as_deref().and_then(CachedAsset::texture)
    }

    pub fn sound(&self) -> Option<&Arc<PcmBuffer>> {
        self.asset.as_deref().and_then(CachedAsset::sound)
    }

    pub fn is_missing(&self) -> bool {
        self.asset.as_ref().is_some_and(|a| a.payload.is_none())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheSummary {
    pub images: usize,
    pub sounds: usize,
    pub texts: usize,
    pub missing: usize,
    pub bytes: usize,
}

/// Loads every distinct `(kind, path)` pair exactly once
pub struct ResourceCache<D: AssetDecoder> {
    decoder: D,
    entries: HashMap<(StimulusKind, Atom), Arc<CachedAsset>>,
}

impl<D: AssetDecoder> ResourceCache<D> {
    pub fn new(decoder: D) -> Self {
        Self {
            decoder,
            entries: HashMap::new(),
        }
    }

    /// Returns one handle per timeline entry, decoding on first sight.
    pub fn resolve(&mut self, timeline: &Timeline) -> Vec<ResolvedResource> {
        timeline
            .iter()
            .map(|stimulus| match stimulus.kind {
                StimulusKind::End => ResolvedResource::empty(),
                kind => ResolvedResource {
                    asset: Some(self.get_or_load(kind, &stimulus.payload)),
                },
            })
            .collect()
    }

    pub fn get_or_load(&mut self, kind: StimulusKind, source: &str) -> Arc<CachedAsset> {
        let key = (kind, Atom::from(source));
        if let Some(entry) = self.entries.get(&key) {
            return Arc::clone(entry);
        }

        let payload = match self.decode(kind, source) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(kind = kind.as_str(), source, %err, "failed to load stimulus");
                None
            }
        };

        let entry = Arc::new(CachedAsset {
            kind,
            source_key: key.1.clone(),
            payload,
        });
        self.entries.insert(key, Arc::clone(&entry));
        entry
    }

    fn decode(&mut self, kind: StimulusKind, source: &str) -> Result<Option<AssetPayload>, D::Error> {
        Ok(match kind {
            StimulusKind::Image => Some(AssetPayload::Visual(Texture::new(
                self.decoder.decode_image(source)?,
            ))),
            StimulusKind::Text => Some(AssetPayload::Visual(Texture::new(
                self.decoder.render_text(source)?,
            ))),
            StimulusKind::Sound => Some(AssetPayload::Audio(Arc::new(
                self.decoder.decode_sound(source)?,
            ))),
            StimulusKind::End => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn summary(&self) -> CacheSummary {
        let mut summary = CacheSummary::default();
        for asset in self.entries.values() {
            match (&asset.payload, asset.kind) {
                (None, _) => summary.missing += 1,
                (Some(AssetPayload::Visual(t)), StimulusKind::Text) => {
                    summary.texts += 1;
                    summary.bytes += t.byte_len();
                }
                (Some(AssetPayload::Visual(t)), _) => {
                    summary.images += 1;
                    summary.bytes += t.byte_len();
                }
                (Some(AssetPayload::Audio(pcm)), _) => {
                    summary.sounds += 1;
                    summary.bytes += pcm.byte_len();
                }
            }
        }
        summary
    }

    /// Sources whose decode failed, for warning the operator before a run.
    pub fn missing(&self) -> Vec<(StimulusKind, String)> {
        let mut out: Vec<_> = self
            .entries
            .values()
            .filter(|a| a.payload.is_none())
            .map(|a| (a.kind, a.source_key.to_string()))
            .collect();
        out.sort_by(|a, b| a.1.cmp(&b.1));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onset_core::StimulusEvent;

    #[derive(Default)]
    struct CountingDecoder {
        images: usize,
        sounds: usize,
        texts: usize,
    }

    impl AssetDecoder for CountingDecoder {
        type Error = String;

        fn decode_image(&mut self, source: &str) -> Result<Pixmap, String> {
            self.images += 1;
            if source.starts_with("missing") {
                return Err(format!("{source}: not found"));
            }
            Pixmap::new(4, 2).ok_or_else(|| "pixmap".to_string())
        }

        fn decode_sound(&mut self, _source: &str) -> Result<PcmBuffer, String> {
            self.sounds += 1;
            Ok(PcmBuffer::from_interleaved(vec![0; 8]))
        }

        fn render_text(&mut self, _text: &str) -> Result<Pixmap, String> {
            self.texts += 1;
            Pixmap::new(10, 3).ok_or_else(|| "pixmap".to_string())
        }
    }

    fn timeline(events: &[(u64, StimulusKind, &str)]) -> Timeline {
        Timeline::new(
            events
                .iter()
                .map(|(t, k, p)| StimulusEvent::new(*t, 100, *k, *p))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn repeated_key_decodes_once_and_shares_entry() {
        let mut cache = ResourceCache::new(CountingDecoder::default());
        let t = timeline(&[
            (0, StimulusKind::Image, "a.png"),
            (100, StimulusKind::Sound, "b.wav"),
            (200, StimulusKind::Image, "a.png"),
            (300, StimulusKind::Sound, "b.wav"),
        ]);
        let resolved = cache.resolve(&t);

        assert_eq!(cache.decoder().images, 1);
        assert_eq!(cache.decoder().sounds, 1);
        assert_eq!(cache.len(), 2);

        let first = resolved[0].asset.as_ref().unwrap();
        let again = resolved[2].asset.as_ref().unwrap();
        assert!(Arc::ptr_eq(first, again));
        assert!(Arc::ptr_eq(
            resolved[1].sound().unwrap(),
            resolved[3].sound().unwrap()
        ));
    }

    #[test]
    fn kind_is_part_of_the_key() {
        let mut cache = ResourceCache::new(CountingDecoder::default());
        let t = timeline(&[
            (0, StimulusKind::Image, "hello"),
            (0, StimulusKind::Text, "hello"),
        ]);
        let resolved = cache.resolve(&t);
        assert_eq!(cache.len(), 2);
        assert_eq!(resolved[1].texture().unwrap().width(), 10);
    }

    #[test]
    fn failed_decode_is_cached_as_missing() {
        let mut cache = ResourceCache::new(CountingDecoder::default());
        let t = timeline(&[
            (0, StimulusKind::Image, "missing.png"),
            (10, StimulusKind::Image, "missing.png"),
        ]);
        let resolved = cache.resolve(&t);
        assert_eq!(cache.decoder().images, 1);
        assert!(resolved[0].is_missing());
        assert!(resolved[0].texture().is_none());
        assert_eq!(
            cache.missing(),
            vec![(StimulusKind::Image, "missing.png".to_string())]
        );
    }

    #[test]
    fn end_entries_resolve_without_decoding() {
        let mut cache = ResourceCache::new(CountingDecoder::default());
        let t = timeline(&[(0, StimulusKind::End, "")]);
        let resolved = cache.resolve(&t);
        assert!(resolved[0].asset.is_none());
        assert!(!resolved[0].is_missing());
        assert!(cache.is_empty());
    }

    #[test]
    fn summary_counts_by_kind() {
        let mut cache = ResourceCache::new(CountingDecoder::default());
        let t = timeline(&[
            (0, StimulusKind::Image, "a.png"),
            (0, StimulusKind::Text, "hi"),
            (0, StimulusKind::Sound, "b.wav"),
            (0, StimulusKind::Image, "missing.png"),
        ]);
        cache.resolve(&t);
        let s = cache.summary();
        assert_eq!((s.images, s.texts, s.sounds, s.missing), (1, 1, 1, 1));
        assert_eq!(s.bytes, 4 * 2 * 4 + 10 * 3 * 4 + 8 * 2);
    }
}
