//! Immutable copy of the model taken the moment playback starts.
//!
//! Scheduling reads only this snapshot, which makes snapshot-at-play-time a
//! structural guarantee: clips added, removed or edited while playing never
//! retroactively affect already-scheduled audio.

use studio_project::Project;
use studio_transport::MediaBuffer;

#[derive(Debug, Clone)]
pub struct ClipSnapshot {
    pub name: String,
    pub start: f64,
    pub duration: f64,
    pub source_offset: f64,
    pub gain_db: f64,
    pub fade_in: f64,
    pub fade_out: f64,
    pub stretch: f64,
    pub media: MediaBuffer,
}

impl ClipSnapshot {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

#[derive(Debug, Clone)]
pub struct TrackSnapshot {
    pub name: String,
    pub volume_db: f64,
    pub clips: Vec<ClipSnapshot>,
}

#[derive(Debug, Clone, Default)]
pub struct PlaybackSnapshot {
    pub tracks: Vec<TrackSnapshot>,
}

impl PlaybackSnapshot {
    /// Copy tracks in lane order with their clips in layering order. Clips
    /// whose media is not registered are left out, the same way the live
    /// scheduler would skip them.
    pub fn capture(project: &Project) -> Self {
        let tracks = project
            .tracks_ordered()
            .map(|track| TrackSnapshot {
                name: track.name.clone(),
                volume_db: track.volume_db,
                clips: project
                    .clips_of(track)
                    .filter_map(|clip| {
                        let media = project.media(clip.media_id)?;
                        Some(ClipSnapshot {
                            name: clip.name.clone(),
                            start: clip.start,
                            duration: clip.duration,
                            source_offset: clip.source_offset,
                            gain_db: clip.gain_db,
                            fade_in: clip.fade_in,
                            fade_out: clip.fade_out,
                            stretch: clip.stretch,
                            media: media.buffer.clone(),
                        })
                    })
                    .collect(),
            })
            .collect();

        Self { tracks }
    }

    pub fn clip_count(&self) -> usize {
        self.tracks.iter().map(|t| t.clips.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studio_project::{Clip, ClipId, ClipPatch, MediaId};

    fn project_with_clip() -> (Project, ClipId) {
        let mut project = Project::new();
        let track = project.add_track(None);
        let media = project.add_media("tone", MediaBuffer::new(vec![0.1; 44100], 44100, 1));
        let clip = project.import_as_clip(track, media).expect("import");
        (project, clip)
    }

    #[test]
    fn capture_copies_lane_and_layer_order() {
        let (mut project, _) = project_with_clip();
        project.add_track(Some("empty lane"));

        let snapshot = PlaybackSnapshot::capture(&project);
        assert_eq!(snapshot.tracks.len(), 2);
        assert_eq!(snapshot.tracks[0].clips.len(), 1);
        assert_eq!(snapshot.tracks[1].clips.len(), 0);
        assert_eq!(snapshot.clip_count(), 1);
    }

    #[test]
    fn capture_skips_clips_without_media() {
        let mut project = Project::new();
        let track = project.add_track(None);
        project.add_clip(Clip {
            id: ClipId::UNSET,
            track_id: track,
            media_id: MediaId(999),
            name: "dangling".to_string(),
            start: 0.0,
            duration: 1.0,
            source_offset: 0.0,
            gain_db: 0.0,
            fade_in: 0.0,
            fade_out: 0.0,
            reverse: false,
            stretch: 1.0,
            pitch_cents: 0.0,
        });

        let snapshot = PlaybackSnapshot::capture(&project);
        assert_eq!(snapshot.clip_count(), 0);
    }

    #[test]
    fn later_edits_do_not_reach_a_taken_snapshot() {
        let (mut project, clip) = project_with_clip();
        let snapshot = PlaybackSnapshot::capture(&project);

        project.update_clip(
            clip,
            ClipPatch {
                gain_db: Some(-24.0),
                ..Default::default()
            },
        );
        project.select_clips(vec![clip]);
        project.delete_selected();

        assert_eq!(snapshot.clip_count(), 1);
        assert_eq!(snapshot.tracks[0].clips[0].gain_db, 0.0);
    }
}
