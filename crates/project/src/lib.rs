//! The project model: the authoritative, serializable state of an editing
//! session. Pure data plus mutation operations; no I/O and no audio device
//! access. Every operation leaves the model internally consistent before
//! returning, in particular the two views of clip membership (the clip table
//! and each track's ordered `clip_ids` list) always agree.

mod edit;
pub mod doc;

pub use doc::{ProjectDoc, ProjectError, load_project, save_project};

use std::collections::HashMap;

use studio_transport::MediaBuffer;

/// Minimum audible clip length after a trim, in seconds.
pub const MIN_CLIP_LEN: f64 = 0.01;
/// Gap placed between an original and its duplicate, in seconds.
pub const DUPLICATE_GAP: f64 = 0.05;
/// Floor applied to the time-stretch ratio wherever it divides.
pub const MIN_STRETCH: f64 = 1.0e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClipId(pub u64);

impl ClipId {
    /// Sentinel for "not yet assigned"; `add_clip` replaces it.
    pub const UNSET: ClipId = ClipId(0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerId(pub u64);

/// An immutable decoded audio asset registered with the project. Duration,
/// sample rate and channel count are derived from the buffer.
#[derive(Debug, Clone)]
pub struct Media {
    pub id: MediaId,
    pub name: String,
    pub buffer: MediaBuffer,
}

impl Media {
    pub fn duration_secs(&self) -> f64 {
        self.buffer.duration_secs()
    }
}

/// An ordered lane. `clip_ids` insertion order is layering order: the last
/// entry draws on top, but overlapping clips all sound at once.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub armed: bool,
    pub volume_db: f64,
    /// -1 (left) .. 1 (right)
    pub pan: f64,
    pub clip_ids: Vec<ClipId>,
}

/// A placed, trimmed reference into a [`Media`] buffer.
///
/// `source_offset + duration / stretch <= media duration` is the caller's
/// responsibility; the playback and bounce paths clamp reads at the buffer
/// edge so a violated invariant yields silence rather than a panic.
#[derive(Debug, Clone)]
pub struct Clip {
    pub id: ClipId,
    pub track_id: TrackId,
    pub media_id: MediaId,
    pub name: String,
    /// Timeline position in seconds, >= 0.
    pub start: f64,
    /// Audible length on the timeline in seconds, > 0.
    pub duration: f64,
    /// Seconds into the media buffer where playback begins.
    pub source_offset: f64,
    pub gain_db: f64,
    pub fade_in: f64,
    pub fade_out: f64,
    pub reverse: bool,
    /// Time-stretch ratio; 1.0 = unmodified playback rate.
    pub stretch: f64,
    /// Declared but does not affect the scheduler's output.
    pub pitch_cents: f64,
}

impl Clip {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Whether `t` falls strictly inside the clip's span.
    pub fn contains(&self, t: f64) -> bool {
        t > self.start && t < self.end()
    }
}

/// Partial update for [`Project::update_clip`]. Unset fields are left alone;
/// set fields are merged without invariant validation.
#[derive(Debug, Clone, Default)]
pub struct ClipPatch {
    pub name: Option<String>,
    pub start: Option<f64>,
    pub duration: Option<f64>,
    pub source_offset: Option<f64>,
    pub gain_db: Option<f64>,
    pub fade_in: Option<f64>,
    pub fade_out: Option<f64>,
    pub reverse: Option<bool>,
    pub stretch: Option<f64>,
    pub pitch_cents: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopRegion {
    pub enabled: bool,
    pub start: f64,
    pub end: f64,
}

impl Default for LoopRegion {
    fn default() -> Self {
        Self {
            enabled: false,
            start: 0.0,
            end: 0.0,
        }
    }
}

/// Partial update for [`Project::set_loop`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopPatch {
    pub enabled: Option<bool>,
    pub start: Option<f64>,
    pub end: Option<f64>,
}

/// A named point in time. Informational only; no playback effect.
#[derive(Debug, Clone)]
pub struct Marker {
    pub id: MarkerId,
    pub time: f64,
    pub name: String,
}

#[derive(Debug)]
pub struct Project {
    pub name: String,
    media: HashMap<MediaId, Media>,
    tracks: HashMap<TrackId, Track>,
    clips: HashMap<ClipId, Clip>,
    track_order: Vec<TrackId>,
    selection: Vec<ClipId>,
    loop_region: LoopRegion,
    cursor: f64,
    zoom: f64,
    markers: Vec<Marker>,
    next_id: u64,
    track_counter: u64,
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

impl Project {
    pub fn new() -> Self {
        Self {
            name: "Untitled Project".to_string(),
            media: HashMap::new(),
            tracks: HashMap::new(),
            clips: HashMap::new(),
            track_order: Vec::new(),
            selection: Vec::new(),
            loop_region: LoopRegion::default(),
            cursor: 0.0,
            zoom: 1.0,
            markers: Vec::new(),
            next_id: 1,
            track_counter: 0,
        }
    }

    fn fresh_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // --- read access ---

    pub fn track_order(&self) -> &[TrackId] {
        &self.track_order
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.clips.get(&id)
    }

    pub fn media(&self, id: MediaId) -> Option<&Media> {
        self.media.get(&id)
    }

    pub fn media_by_name(&self, name: &str) -> Option<&Media> {
        self.media.values().find(|m| m.name == name)
    }

    /// Tracks in lane order, top to bottom.
    pub fn tracks_ordered(&self) -> impl Iterator<Item = &Track> {
        self.track_order.iter().filter_map(|id| self.tracks.get(id))
    }

    /// Clips of one track in layering order.
    pub fn clips_of(&self, track: &Track) -> impl Iterator<Item = &Clip> {
        track.clip_ids.iter().filter_map(|id| self.clips.get(id))
    }

    pub fn all_clip_ids(&self) -> Vec<ClipId> {
        self.track_order
            .iter()
            .filter_map(|id| self.tracks.get(id))
            .flat_map(|t| t.clip_ids.iter().copied())
            .collect()
    }

    pub fn selection(&self) -> &[ClipId] {
        &self.selection
    }

    pub fn loop_region(&self) -> LoopRegion {
        self.loop_region
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// End of the last clip on the timeline, in seconds.
    pub fn timeline_end(&self) -> f64 {
        self.clips
            .values()
            .map(|c| c.end())
            .fold(0.0f64, f64::max)
    }

    /// Cross-reference check: every id in a track's `clip_ids` resolves to a
    /// clip owned by that track, and every clip appears exactly once in its
    /// owning track's list.
    pub fn is_consistent(&self) -> bool {
        let mut seen = 0usize;
        for track in self.tracks.values() {
            for clip_id in &track.clip_ids {
                match self.clips.get(clip_id) {
                    Some(clip) if clip.track_id == track.id => seen += 1,
                    _ => return false,
                }
            }
        }
        seen == self.clips.len()
            && self.track_order.len() == self.tracks.len()
            && self.track_order.iter().all(|id| self.tracks.contains_key(id))
    }

    // --- mutation operations ---

    /// Append a track with defaults. The default name comes from an
    /// incrementing counter.
    pub fn add_track(&mut self, name: Option<&str>) -> TrackId {
        self.track_counter += 1;
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("Track {}", self.track_counter));
        let id = TrackId(self.fresh_id());
        self.tracks.insert(
            id,
            Track {
                id,
                name,
                armed: false,
                volume_db: 0.0,
                pan: 0.0,
                clip_ids: Vec::new(),
            },
        );
        self.track_order.push(id);
        id
    }

    /// Remove a track and every clip it owns. Returns false (and changes
    /// nothing) when the id is unknown.
    pub fn remove_track(&mut self, id: TrackId) -> bool {
        let Some(track) = self.tracks.remove(&id) else {
            return false;
        };
        for clip_id in &track.clip_ids {
            self.clips.remove(clip_id);
            self.selection.retain(|s| s != clip_id);
        }
        self.track_order.retain(|t| *t != id);
        true
    }

    /// Insert a clip onto its owning track. Assigns an id when the clip
    /// carries [`ClipId::UNSET`]. Returns `None` (and changes nothing) when
    /// the clip's track is unknown.
    pub fn add_clip(&mut self, mut clip: Clip) -> Option<ClipId> {
        if !self.tracks.contains_key(&clip.track_id) {
            return None;
        }
        if clip.id == ClipId::UNSET {
            clip.id = ClipId(self.fresh_id());
        }
        let id = clip.id;
        let track_id = clip.track_id;
        self.clips.insert(id, clip);
        self.tracks
            .get_mut(&track_id)
            .expect("track existence checked above")
            .clip_ids
            .push(id);
        Some(id)
    }

    /// Shallow-merge patch fields into a clip. No validation of the
    /// resulting invariants; that stays with the caller.
    pub fn update_clip(&mut self, id: ClipId, patch: ClipPatch) -> bool {
        let Some(clip) = self.clips.get_mut(&id) else {
            return false;
        };
        if let Some(name) = patch.name {
            clip.name = name;
        }
        if let Some(start) = patch.start {
            clip.start = start;
        }
        if let Some(duration) = patch.duration {
            clip.duration = duration;
        }
        if let Some(source_offset) = patch.source_offset {
            clip.source_offset = source_offset;
        }
        if let Some(gain_db) = patch.gain_db {
            clip.gain_db = gain_db;
        }
        if let Some(fade_in) = patch.fade_in {
            clip.fade_in = fade_in;
        }
        if let Some(fade_out) = patch.fade_out {
            clip.fade_out = fade_out;
        }
        if let Some(reverse) = patch.reverse {
            clip.reverse = reverse;
        }
        if let Some(stretch) = patch.stretch {
            clip.stretch = stretch;
        }
        if let Some(pitch_cents) = patch.pitch_cents {
            clip.pitch_cents = pitch_cents;
        }
        true
    }

    /// Split a clip at `at` seconds. The left clip keeps the original id;
    /// the right clip gets a new id with its source offset advanced by the
    /// split distance divided by the stretch ratio, so the underlying media
    /// content stays continuous across the cut. Selection becomes the pair.
    ///
    /// `at` must fall strictly inside the clip's span; otherwise this is a
    /// no-op returning `None` (never a negative duration).
    pub fn split_clip(&mut self, id: ClipId, at: f64) -> Option<ClipId> {
        let clip = self.clips.get(&id)?.clone();
        if !clip.contains(at) {
            return None;
        }

        let mut right = clip.clone();
        let right_id = ClipId(self.fresh_id());
        right.id = right_id;
        right.start = at;
        right.duration = clip.end() - at;
        right.source_offset = clip.source_offset + (at - clip.start) / clip.stretch.max(MIN_STRETCH);

        let track_id = clip.track_id;
        let left = self.clips.get_mut(&id).expect("clip fetched above");
        left.duration = at - left.start;

        self.clips.insert(right_id, right);
        let track = self
            .tracks
            .get_mut(&track_id)
            .expect("clip's track must exist");
        let idx = track
            .clip_ids
            .iter()
            .position(|c| *c == id)
            .expect("clip listed on its track");
        track.clip_ids.insert(idx + 1, right_id);

        self.selection = vec![id, right_id];
        Some(right_id)
    }

    /// Replace the selection. Ids are not validated.
    pub fn select_clips(&mut self, ids: Vec<ClipId>) {
        self.selection = ids;
    }

    pub fn set_loop(&mut self, patch: LoopPatch) {
        if let Some(enabled) = patch.enabled {
            self.loop_region.enabled = enabled;
        }
        if let Some(start) = patch.start {
            self.loop_region.start = start;
        }
        if let Some(end) = patch.end {
            self.loop_region.end = end;
        }
    }

    pub fn set_cursor(&mut self, t: f64) {
        self.cursor = t;
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom;
    }

    /// Register a decoded buffer. Duration, sample rate and channel count
    /// derive from the buffer itself.
    pub fn add_media(&mut self, name: impl Into<String>, buffer: MediaBuffer) -> MediaId {
        let id = MediaId(self.fresh_id());
        self.media.insert(
            id,
            Media {
                id,
                name: name.into(),
                buffer,
            },
        );
        id
    }

    /// Create a full-length clip of a media on a track: duration = media
    /// duration, zero offset, no fades, stretch 1, pitch 0. Selects the new
    /// clip. Returns `None` (model unchanged) when either id is unknown.
    pub fn import_as_clip(&mut self, track_id: TrackId, media_id: MediaId) -> Option<ClipId> {
        if !self.tracks.contains_key(&track_id) {
            return None;
        }
        let media = self.media.get(&media_id)?;
        let clip = Clip {
            id: ClipId::UNSET,
            track_id,
            media_id,
            name: media.name.clone(),
            start: 0.0,
            duration: media.duration_secs(),
            source_offset: 0.0,
            gain_db: 0.0,
            fade_in: 0.0,
            fade_out: 0.0,
            reverse: false,
            stretch: 1.0,
            pitch_cents: 0.0,
        };
        let id = self.add_clip(clip)?;
        self.selection = vec![id];
        Some(id)
    }

    pub fn add_marker(&mut self, time: f64, name: impl Into<String>) -> MarkerId {
        let id = MarkerId(self.fresh_id());
        self.markers.push(Marker {
            id,
            time,
            name: name.into(),
        });
        id
    }
}

/// Fixture helpers shared by this workspace's test suites.
pub mod test_util {
    use super::*;

    pub fn project_with_track() -> (Project, TrackId) {
        let mut project = Project::new();
        let track = project.add_track(None);
        (project, track)
    }

    pub fn silent_media(project: &mut Project, secs: f64) -> MediaId {
        let frames = (44100.0 * secs) as usize;
        let buffer = MediaBuffer::new(vec![0.0; frames], 44100, 1);
        project.add_media("test media", buffer)
    }

    pub fn place_clip(project: &mut Project, track: TrackId, media: MediaId, start: f64, duration: f64) -> ClipId {
        project
            .add_clip(Clip {
                id: ClipId::UNSET,
                track_id: track,
                media_id: media,
                name: "clip".to_string(),
                start,
                duration,
                source_offset: 0.0,
                gain_db: 0.0,
                fade_in: 0.0,
                fade_out: 0.0,
                reverse: false,
                stretch: 1.0,
                pitch_cents: 0.0,
            })
            .expect("track exists")
    }
}
