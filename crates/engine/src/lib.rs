//! Playback engine: realtime output for the project model.
//!
//! `play_from_cursor` snapshots the model, runs the pure scheduling pass and
//! hands the resulting voices to a cpal output stream over a lock-free ring.
//! The actual audio timing belongs to the stream callback from then on; the
//! only feedback to the model is the advisory cursor reported by [`Engine::poll`].

pub mod schedule;
pub mod snapshot;

pub use schedule::{GAIN_FLOOR, GainEnvelope, SCHED_EPSILON, SourcePlan, plan_sources};
pub use snapshot::{ClipSnapshot, PlaybackSnapshot, TrackSnapshot};

use basedrop::{Collector, Handle, Shared};
use cpal::{
    FromSample, SizedSample,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use studio_project::Project;
use studio_transport::MediaBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }
}

enum Command {
    Start(u64, Shared<Vec<Voice>>),
    Stop,
}

enum Status {
    /// Seconds of output elapsed since the tagged run's voices started.
    Position(u64, f64),
}

/// Advisory playback position across runs. Every `play_from_cursor` begins a
/// new run; statuses carry the run that produced them, so entries still
/// sitting in the ring from a previous run never move the new cursor.
struct PositionTracker {
    run: u64,
    play_start_cursor: f64,
    elapsed: f64,
}

impl PositionTracker {
    fn new() -> Self {
        Self {
            run: 0,
            play_start_cursor: 0.0,
            elapsed: 0.0,
        }
    }

    fn begin(&mut self, cursor: f64) -> u64 {
        self.run += 1;
        self.play_start_cursor = cursor;
        self.elapsed = 0.0;
        self.run
    }

    fn apply(&mut self, status: Status) {
        let Status::Position(run, secs) = status;
        if run == self.run {
            self.elapsed = secs;
        }
    }

    fn cursor(&self) -> f64 {
        self.play_start_cursor + self.elapsed
    }
}

/// A scheduled source bound to the output stream's frame clock.
#[derive(Debug)]
struct Voice {
    media: MediaBuffer,
    delay_frames: u64,
    out_frames: u64,
    /// Seconds into the media where reading begins.
    source_start: f64,
    rate: f64,
    envelope: GainEnvelope,
}

impl Voice {
    /// Bind a plan to the output clock. Fails on malformed plans (empty
    /// media, non-finite fields, source offset past the buffer end); the
    /// caller logs and skips so one bad clip never aborts the pass.
    fn from_plan(plan: &SourcePlan, out_rate: u32) -> anyhow::Result<Self> {
        if plan.media.is_empty() {
            anyhow::bail!("clip references an empty media buffer");
        }
        let fields = [
            plan.start_delta,
            plan.source_start,
            plan.play_duration,
            plan.source_len,
            plan.rate,
        ];
        if fields.iter().any(|v| !v.is_finite()) {
            anyhow::bail!("clip has non-finite scheduling fields");
        }

        let out_duration = plan.audible_duration();
        if out_duration <= 0.0 {
            anyhow::bail!(
                "source offset {:.3}s is past the end of the media ({:.3}s)",
                plan.source_start,
                plan.media.duration_secs()
            );
        }

        Ok(Self {
            media: plan.media.clone(),
            delay_frames: (plan.delay() * out_rate as f64) as u64,
            out_frames: (out_duration * out_rate as f64) as u64,
            source_start: plan.source_start,
            rate: plan.rate,
            envelope: plan.envelope.clone(),
        })
    }

    /// Sample this voice for output channel `ch` at an absolute frame
    /// position on the output clock. Silent before its delay and after its
    /// audible length.
    fn sample(&self, pos_frames: u64, out_rate: u32, ch: usize) -> f32 {
        if pos_frames < self.delay_frames {
            return 0.0;
        }
        let local = pos_frames - self.delay_frames;
        if local >= self.out_frames {
            return 0.0;
        }
        let t_out = local as f64 / out_rate as f64;
        let source_time = self.source_start + t_out * self.rate;
        let frame_pos = source_time * self.media.sample_rate() as f64;
        self.media.sample_at(frame_pos, ch) * self.envelope.value_at(t_out)
    }
}

fn mix_frame(voices: &[Voice], pos_frames: u64, out_rate: u32, frame: &mut [f32]) {
    frame.fill(0.0);
    for voice in voices {
        for (ch, sample) in frame.iter_mut().enumerate() {
            *sample += voice.sample(pos_frames, out_rate, ch);
        }
    }
}

pub struct Engine {
    commands: rtrb::Producer<Command>,
    status: rtrb::Consumer<Status>,
    collector: Collector,
    handle: Handle,
    sample_rate: u32,
    state: PlaybackState,
    tracker: PositionTracker,
    _stream: cpal::Stream,
}

impl Engine {
    /// Open the default output device and start its stream. Created once
    /// and reused for the whole session; the stream renders silence while
    /// idle.
    pub fn new() -> anyhow::Result<Self> {
        let collector = Collector::new();
        let handle = collector.handle();

        let (command_tx, command_rx) = rtrb::RingBuffer::<Command>::new(64);
        let (status_tx, status_rx) = rtrb::RingBuffer::<Status>::new(64);

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow::anyhow!("no output device found"))?;
        let config = device.default_output_config()?;
        let sample_rate = config.sample_rate().0;

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &config.into(), command_rx, status_tx)?
            }
            sample_format => anyhow::bail!("unsupported sample format '{sample_format}'"),
        };

        stream.play()?;

        log::info!("audio engine started at {sample_rate} Hz");

        Ok(Self {
            commands: command_tx,
            status: status_rx,
            collector,
            handle,
            sample_rate,
            state: PlaybackState::Idle,
            tracker: PositionTracker::new(),
            _stream: stream,
        })
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    /// Snapshot the model at the cursor and schedule every still-audible
    /// clip. Individual voices that fail to bind are logged and skipped.
    /// Returns the number of voices actually scheduled.
    pub fn play_from_cursor(&mut self, project: &Project) -> usize {
        let cursor = project.cursor();
        let snapshot = PlaybackSnapshot::capture(project);
        let plans = plan_sources(&snapshot, cursor);

        let mut voices = Vec::with_capacity(plans.len());
        for plan in &plans {
            match Voice::from_plan(plan, self.sample_rate) {
                Ok(voice) => voices.push(voice),
                Err(e) => log::warn!("skipping unplayable clip: {e}"),
            }
        }
        let scheduled = voices.len();

        let run = self.tracker.begin(cursor);
        let shared = Shared::new(&self.handle, voices);
        if self.commands.push(Command::Start(run, shared)).is_err() {
            log::warn!("engine command ring full; playback request dropped");
            return 0;
        }

        self.state = PlaybackState::Playing;
        scheduled
    }

    /// Discard every active voice. Safe to call repeatedly and from any
    /// state; the cursor value is left wherever playback put it.
    pub fn stop(&mut self) {
        if self.commands.push(Command::Stop).is_err() {
            log::warn!("engine command ring full; stop request dropped");
        }
        self.state = PlaybackState::Idle;
    }

    /// Same observable behavior as [`Engine::stop`]: voices are discarded
    /// and the cursor stays put, so a later `play_from_cursor` resumes from
    /// the pause position.
    pub fn pause(&mut self) {
        self.stop();
    }

    /// Drain status from the stream and, while playing, return the advisory
    /// cursor (`play start cursor + elapsed output time`) for write-back
    /// into the model. This is the only engine-to-model feedback path.
    pub fn poll(&mut self) -> Option<f64> {
        self.collector.collect();
        while let Ok(status) = self.status.pop() {
            self.tracker.apply(status);
        }
        self.state.is_playing().then(|| self.tracker.cursor())
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut command_rx: rtrb::Consumer<Command>,
    mut status_tx: rtrb::Producer<Status>,
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let output_channels = config.channels as usize;
    let sample_rate = config.sample_rate.0;

    let mut active: Option<Shared<Vec<Voice>>> = None;
    let mut run: u64 = 0;
    let mut pos_frames: u64 = 0;
    let mut scratch = vec![0.0f32; output_channels];

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            while let Ok(cmd) = command_rx.pop() {
                match cmd {
                    Command::Start(new_run, voices) => {
                        active = Some(voices);
                        run = new_run;
                        pos_frames = 0;
                    }
                    Command::Stop => {
                        active = None;
                        pos_frames = 0;
                    }
                }
            }

            let _ = status_tx.push(Status::Position(run, pos_frames as f64 / sample_rate as f64));

            for frame in data.chunks_mut(output_channels) {
                match &active {
                    Some(voices) => {
                        mix_frame(voices, pos_frames, sample_rate, &mut scratch);
                        for (ch, sample) in frame.iter_mut().enumerate() {
                            *sample = T::from_sample(scratch[ch]);
                        }
                        pos_frames += 1;
                    }
                    None => {
                        for sample in frame.iter_mut() {
                            *sample = T::from_sample(0.0);
                        }
                    }
                }
            }
        },
        |err| log::error!("stream error: {err}"),
        None,
    )?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{ClipSnapshot, TrackSnapshot};

    const OUT_RATE: u32 = 100;

    fn constant_media(value: f32, frames: usize) -> MediaBuffer {
        MediaBuffer::new(vec![value; frames], OUT_RATE, 1)
    }

    fn plan_for(clip: ClipSnapshot, cursor: f64) -> SourcePlan {
        let snapshot = PlaybackSnapshot {
            tracks: vec![TrackSnapshot {
                name: "t".to_string(),
                volume_db: 0.0,
                clips: vec![clip],
            }],
        };
        plan_sources(&snapshot, cursor).remove(0)
    }

    fn basic_clip() -> ClipSnapshot {
        ClipSnapshot {
            name: "c".to_string(),
            start: 0.0,
            duration: 1.0,
            source_offset: 0.0,
            gain_db: 0.0,
            fade_in: 0.0,
            fade_out: 0.0,
            stretch: 1.0,
            media: constant_media(0.5, 100),
        }
    }

    #[test]
    fn voice_respects_delay_and_length() {
        let voice = Voice::from_plan(&plan_for(basic_clip(), 0.0), OUT_RATE).unwrap();

        // delay() == SCHED_EPSILON == 0.01s == 1 frame at 100 Hz
        assert_eq!(voice.delay_frames, 1);
        assert_eq!(voice.sample(0, OUT_RATE, 0), 0.0);
        assert!((voice.sample(1, OUT_RATE, 0) - 0.5).abs() < 1e-6);
        assert!((voice.sample(50, OUT_RATE, 0) - 0.5).abs() < 1e-6);
        // 1s of audible output, done after out_frames
        assert_eq!(voice.sample(1 + voice.out_frames, OUT_RATE, 0), 0.0);
    }

    #[test]
    fn voice_reads_from_source_offset() {
        // First half silent, second half 0.8; clip trimmed to the loud half.
        let mut samples = vec![0.0f32; 50];
        samples.extend(vec![0.8f32; 50]);
        let mut clip = basic_clip();
        clip.media = MediaBuffer::new(samples, OUT_RATE, 1);
        clip.source_offset = 0.5;
        clip.duration = 0.5;

        let voice = Voice::from_plan(&plan_for(clip, 0.0), OUT_RATE).unwrap();
        assert!((voice.sample(voice.delay_frames, OUT_RATE, 0) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn voice_rate_consumes_source_faster() {
        // 2x stretch over a ramp buffer: after 0.2s of output the source
        // position is 0.4s in, and the audible length truncates at the
        // source-material limit (play_duration / rate^2 here).
        let ramp: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        let mut clip = basic_clip();
        clip.media = MediaBuffer::new(ramp, OUT_RATE, 1);
        clip.stretch = 2.0;

        let voice = Voice::from_plan(&plan_for(clip, 0.0), OUT_RATE).unwrap();
        assert_eq!(voice.out_frames, 25);
        let got = voice.sample(voice.delay_frames + 20, OUT_RATE, 0);
        assert!((got - 0.4).abs() < 0.02, "got {got}");
    }

    #[test]
    fn voice_rejects_offset_past_media_end() {
        let mut clip = basic_clip();
        clip.source_offset = 5.0; // media is 1s long
        let err = Voice::from_plan(&plan_for(clip, 0.0), OUT_RATE).unwrap_err();
        assert!(err.to_string().contains("past the end"));
    }

    #[test]
    fn voice_rejects_empty_media() {
        let mut clip = basic_clip();
        clip.media = MediaBuffer::new(vec![], OUT_RATE, 1);
        assert!(Voice::from_plan(&plan_for(clip, 0.0), OUT_RATE).is_err());
    }

    #[test]
    fn mix_frame_sums_overlapping_voices() {
        let a = Voice::from_plan(&plan_for(basic_clip(), 0.0), OUT_RATE).unwrap();
        let mut second = basic_clip();
        second.media = constant_media(0.25, 100);
        let b = Voice::from_plan(&plan_for(second, 0.0), OUT_RATE).unwrap();

        let mut frame = [0.0f32; 2];
        mix_frame(&[a, b], 10, OUT_RATE, &mut frame);
        assert!((frame[0] - 0.75).abs() < 1e-6);
        // mono media maps onto every output channel
        assert!((frame[1] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn mix_frame_is_silent_with_no_voices() {
        let mut frame = [1.0f32; 2];
        mix_frame(&[], 0, OUT_RATE, &mut frame);
        assert_eq!(frame, [0.0, 0.0]);
    }

    #[test]
    fn stale_positions_from_an_earlier_run_are_ignored() {
        let mut tracker = PositionTracker::new();
        let first = tracker.begin(0.0);
        tracker.apply(Status::Position(first, 1.5));
        assert!((tracker.cursor() - 1.5).abs() < 1e-12);

        // restart from 2s; a report left over from the first run must not
        // jump the new cursor
        let second = tracker.begin(2.0);
        tracker.apply(Status::Position(first, 1.5));
        assert!((tracker.cursor() - 2.0).abs() < 1e-12);

        tracker.apply(Status::Position(second, 0.25));
        assert!((tracker.cursor() - 2.25).abs() < 1e-12);
    }

    #[test]
    fn voice_applies_gain_and_fade() {
        let mut clip = basic_clip();
        clip.gain_db = -6.0;
        clip.fade_out = 0.5;

        let voice = Voice::from_plan(&plan_for(clip, 0.0), OUT_RATE).unwrap();
        let plateau = voice.sample(voice.delay_frames + 10, OUT_RATE, 0);
        assert!((plateau - 0.5 * studio_transport::db_to_linear(-6.0)).abs() < 1e-4);

        let fading = voice.sample(voice.delay_frames + 90, OUT_RATE, 0);
        assert!(fading < plateau);
    }
}
