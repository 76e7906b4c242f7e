//! The pure scheduling pass: turn a playback snapshot and a start cursor
//! into per-clip source plans, and evaluate the gain envelope that encodes a
//! clip's fades.

use studio_project::MIN_STRETCH;
use studio_transport::{MediaBuffer, db_to_linear};

use crate::snapshot::PlaybackSnapshot;

/// Guard against zero or negative scheduling delays and degenerate
/// durations, in seconds.
pub const SCHED_EPSILON: f64 = 0.01;

/// Amplitude floor for the gain envelope. Exponential ramps to exactly zero
/// are undefined, so every ramp is anchored here instead; this is a hard
/// requirement of the envelope semantics.
pub const GAIN_FLOOR: f32 = 1.0e-4;

/// Time-varying amplitude multiplier for one scheduled source.
///
/// Fade windows are clamped to half the audible length. The fade-in lives in
/// clip-local time (a playback starting past the window applies no ramp);
/// the fade-out is anchored to the end of the audible output.
#[derive(Debug, Clone, PartialEq)]
pub struct GainEnvelope {
    /// Linear amplitude, floored at [`GAIN_FLOOR`].
    pub gain: f32,
    pub fade_in: f64,
    pub fade_out: f64,
    /// Audible output length in seconds.
    pub play_duration: f64,
    /// Seconds into the clip where this playback begins.
    pub clip_offset: f64,
}

impl GainEnvelope {
    pub fn for_clip(
        gain_db: f64,
        fade_in: f64,
        fade_out: f64,
        play_duration: f64,
        clip_offset: f64,
    ) -> Self {
        Self {
            gain: db_to_linear(gain_db).max(GAIN_FLOOR),
            fade_in: fade_in.clamp(0.0, play_duration * 0.5),
            fade_out: fade_out.clamp(0.0, play_duration * 0.5),
            play_duration,
            clip_offset,
        }
    }

    /// Envelope value at `t` seconds of output time.
    pub fn value_at(&self, t: f64) -> f32 {
        if t < 0.0 || t > self.play_duration {
            return GAIN_FLOOR;
        }

        let clip_local = self.clip_offset + t;
        if self.fade_in > 0.0 && clip_local < self.fade_in {
            let x = (clip_local / self.fade_in) as f32;
            return GAIN_FLOOR * (self.gain / GAIN_FLOOR).powf(x);
        }

        let fade_out_start = self.play_duration - self.fade_out;
        if self.fade_out > 0.0 && t > fade_out_start {
            let x = ((t - fade_out_start) / self.fade_out) as f32;
            return self.gain * (GAIN_FLOOR / self.gain).powf(x);
        }

        self.gain
    }
}

/// One clip's share of a playback pass: everything the output layer needs to
/// start a buffered source.
#[derive(Debug, Clone)]
pub struct SourcePlan {
    pub media: MediaBuffer,
    /// `clip.start - cursor`; negative when playback lands mid-clip.
    pub start_delta: f64,
    /// Seconds into the media buffer where reading begins.
    pub source_start: f64,
    /// Audible output length in seconds.
    pub play_duration: f64,
    /// Seconds of source material to read.
    pub source_len: f64,
    /// Playback rate multiplier (the clip's stretch ratio, floored).
    pub rate: f64,
    pub envelope: GainEnvelope,
}

impl SourcePlan {
    /// Realtime scheduling delay from "now": never in the past.
    pub fn delay(&self) -> f64 {
        self.start_delta.max(SCHED_EPSILON)
    }

    /// Bounce-time delay: exact placement, no realtime guard.
    pub fn offline_delay(&self) -> f64 {
        self.start_delta.max(0.0)
    }

    /// Seconds of output actually produced: the clip window, the source
    /// window read at `rate`, or the media remainder, whichever runs out
    /// first. Zero or negative when the source offset is past the media end.
    pub fn audible_duration(&self) -> f64 {
        let media_remainder = self.media.duration_secs() - self.source_start;
        self.play_duration
            .min(self.source_len / self.rate)
            .min(media_remainder / self.rate)
    }
}

/// Compute source plans for every clip still audible at `cursor`, in track
/// order then layering order. Pure; operates only on the snapshot.
pub fn plan_sources(snapshot: &PlaybackSnapshot, cursor: f64) -> Vec<SourcePlan> {
    let mut plans = Vec::new();

    for track in &snapshot.tracks {
        for clip in &track.clips {
            if clip.end() <= cursor {
                continue;
            }

            let rate = clip.stretch.max(MIN_STRETCH);
            let start_delta = clip.start - cursor;
            let offset_into_clip = (cursor - clip.start).max(0.0);
            let source_start = clip.source_offset + offset_into_clip / rate;
            let play_duration = (clip.duration - offset_into_clip).max(SCHED_EPSILON);
            let source_len = play_duration / rate;

            plans.push(SourcePlan {
                media: clip.media.clone(),
                start_delta,
                source_start,
                play_duration,
                source_len,
                rate,
                envelope: GainEnvelope::for_clip(
                    clip.gain_db,
                    clip.fade_in,
                    clip.fade_out,
                    play_duration,
                    offset_into_clip,
                ),
            });
        }
    }

    plans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{ClipSnapshot, TrackSnapshot};

    fn clip(start: f64, duration: f64) -> ClipSnapshot {
        ClipSnapshot {
            name: "clip".to_string(),
            start,
            duration,
            source_offset: 0.0,
            gain_db: 0.0,
            fade_in: 0.0,
            fade_out: 0.0,
            stretch: 1.0,
            media: MediaBuffer::new(vec![0.0; 44100 * 12], 44100, 1),
        }
    }

    fn snapshot(clips: Vec<ClipSnapshot>) -> PlaybackSnapshot {
        PlaybackSnapshot {
            tracks: vec![TrackSnapshot {
                name: "track".to_string(),
                volume_db: 0.0,
                clips,
            }],
        }
    }

    #[test]
    fn play_mid_clip_scenario() {
        // Cursor at 3s into a [0,10) clip with 1s fades at 0 dB: output
        // starts immediately, reads source_offset + 3s, plays 7s, no
        // fade-in, fade-out beginning at local output time 6s.
        let mut c = clip(0.0, 10.0);
        c.source_offset = 0.25;
        c.fade_in = 1.0;
        c.fade_out = 1.0;

        let plans = plan_sources(&snapshot(vec![c]), 3.0);
        assert_eq!(plans.len(), 1);
        let plan = &plans[0];

        assert!((plan.start_delta + 3.0).abs() < 1e-9);
        assert!((plan.delay() - SCHED_EPSILON).abs() < 1e-12, "starts ~now");
        assert!((plan.source_start - 3.25).abs() < 1e-9);
        assert!((plan.play_duration - 7.0).abs() < 1e-9);
        assert_eq!(plan.rate, 1.0);

        let env = &plan.envelope;
        assert!((env.value_at(0.0) - 1.0).abs() < 1e-6, "past the fade-in window");
        assert!((env.value_at(5.9) - 1.0).abs() < 1e-6);
        let mid_fade = env.value_at(6.5);
        assert!(mid_fade < 1.0 && mid_fade > GAIN_FLOOR);
        assert!((env.value_at(7.0) - GAIN_FLOOR).abs() < 1e-7, "near-silent at the end");
    }

    #[test]
    fn clips_ended_before_cursor_are_skipped() {
        let plans = plan_sources(&snapshot(vec![clip(0.0, 2.0), clip(5.0, 2.0)]), 3.0);
        assert_eq!(plans.len(), 1);
        assert!((plans[0].start_delta - 2.0).abs() < 1e-9);
        assert!((plans[0].delay() - 2.0).abs() < 1e-9);
        assert_eq!(plans[0].source_start, 0.0);
    }

    #[test]
    fn clip_ending_exactly_at_cursor_is_skipped() {
        let plans = plan_sources(&snapshot(vec![clip(0.0, 3.0)]), 3.0);
        assert!(plans.is_empty());
    }

    #[test]
    fn stretch_divides_source_mapping() {
        let mut c = clip(0.0, 8.0);
        c.stretch = 2.0;
        c.source_offset = 1.0;

        let plans = plan_sources(&snapshot(vec![c]), 4.0);
        let plan = &plans[0];
        assert_eq!(plan.rate, 2.0);
        assert!((plan.source_start - (1.0 + 4.0 / 2.0)).abs() < 1e-9);
        assert!((plan.play_duration - 4.0).abs() < 1e-9);
        assert!((plan.source_len - 2.0).abs() < 1e-9);
    }

    #[test]
    fn zero_stretch_is_floored() {
        let mut c = clip(0.0, 4.0);
        c.stretch = 0.0;
        let plans = plan_sources(&snapshot(vec![c]), 0.0);
        assert_eq!(plans[0].rate, studio_project::MIN_STRETCH);
    }

    #[test]
    fn degenerate_remainder_is_floored() {
        // Cursor a hair before the clip end still yields a playable sliver.
        let plans = plan_sources(&snapshot(vec![clip(0.0, 4.0)]), 3.9999);
        assert!((plans[0].play_duration - SCHED_EPSILON).abs() < 1e-12);
    }

    #[test]
    fn envelope_never_reaches_zero() {
        let env = GainEnvelope::for_clip(0.0, 0.5, 0.5, 4.0, 0.0);
        assert!(env.value_at(-1.0) >= GAIN_FLOOR);
        assert!(env.value_at(0.0) >= GAIN_FLOOR);
        assert!(env.value_at(99.0) >= GAIN_FLOOR);

        // A silly negative gain clamps to the floor rather than zero.
        let quiet = GainEnvelope::for_clip(-200.0, 0.0, 0.0, 1.0, 0.0);
        assert_eq!(quiet.value_at(0.5), GAIN_FLOOR);
    }

    #[test]
    fn fades_clamp_to_half_duration() {
        let env = GainEnvelope::for_clip(0.0, 10.0, 10.0, 2.0, 0.0);
        assert_eq!(env.fade_in, 1.0);
        assert_eq!(env.fade_out, 1.0);
    }

    #[test]
    fn fade_in_ramps_from_floor() {
        let env = GainEnvelope::for_clip(0.0, 1.0, 0.0, 10.0, 0.0);
        assert!((env.value_at(0.0) - GAIN_FLOOR).abs() < 1e-7);
        let mid = env.value_at(0.5);
        assert!(mid > GAIN_FLOOR && mid < 1.0);
        assert!((env.value_at(1.0) - 1.0).abs() < 1e-4);
        assert!((env.value_at(5.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn gain_scales_the_plateau() {
        let env = GainEnvelope::for_clip(-6.0, 0.0, 0.0, 4.0, 0.0);
        assert!((env.value_at(2.0) - db_to_linear(-6.0)).abs() < 1e-6);
    }

    #[test]
    fn plans_follow_track_then_layer_order() {
        let snapshot = PlaybackSnapshot {
            tracks: vec![
                TrackSnapshot {
                    name: "a".to_string(),
                    volume_db: 0.0,
                    clips: vec![clip(4.0, 1.0), clip(0.0, 1.0)],
                },
                TrackSnapshot {
                    name: "b".to_string(),
                    volume_db: 0.0,
                    clips: vec![clip(2.0, 1.0)],
                },
            ],
        };
        let plans = plan_sources(&snapshot, 0.0);
        let starts: Vec<f64> = plans.iter().map(|p| p.start_delta).collect();
        assert_eq!(starts, vec![4.0, 0.0, 2.0]);
    }
}
