//! Offline bounce and timeline drawing.
//!
//! The bounce path reuses the engine's scheduling pass so an exported file
//! is sample-for-sample what playback from the same position would produce,
//! minus the realtime start guard. Drawing lives in [`draw`].

pub mod draw;

use std::io::Cursor;
use std::path::Path;

use studio_engine::{PlaybackSnapshot, SourcePlan, TrackSnapshot, plan_sources};
use studio_project::Project;
use studio_transport::{MediaBuffer, db_to_linear};

/// One schedulable source prepared for the offline mixer: media already at
/// the output rate, placement relative to the render start.
struct PreparedSource {
    plan: SourcePlan,
    delay: f64,
    audible: f64,
}

fn prepare_track(track: &TrackSnapshot, start: f64, sample_rate: u32) -> Vec<PreparedSource> {
    let sub = PlaybackSnapshot {
        tracks: vec![track.clone()],
    };

    let mut prepared = Vec::new();
    for mut plan in plan_sources(&sub, start) {
        if plan.media.sample_rate() != sample_rate {
            match plan.media.resample(sample_rate) {
                Ok(media) => plan.media = media,
                Err(err) => {
                    log::warn!("skipping source during bounce, resample failed: {err:#}");
                    continue;
                }
            }
        }
        let delay = plan.offline_delay();
        let audible = plan.audible_duration();
        if audible <= 0.0 {
            continue;
        }
        prepared.push(PreparedSource {
            plan,
            delay,
            audible,
        });
    }
    prepared
}

/// Mix every clip overlapping `[start, end)` into a single buffer at the
/// requested output rate and channel count. Track volume, clip gain, fades
/// and stretch are all applied; the result is what the engine would play
/// from `start`, truncated at `end`.
pub fn render_range(
    project: &Project,
    start: f64,
    end: f64,
    sample_rate: u32,
    channels: u16,
) -> anyhow::Result<MediaBuffer> {
    anyhow::ensure!(channels > 0, "cannot render zero output channels");
    anyhow::ensure!(
        end >= start && start.is_finite() && end.is_finite(),
        "invalid render range {start}..{end}"
    );

    let snapshot = PlaybackSnapshot::capture(project);
    let render_tracks: Vec<(f32, Vec<PreparedSource>)> = snapshot
        .tracks
        .iter()
        .map(|track| {
            (
                db_to_linear(track.volume_db),
                prepare_track(track, start, sample_rate),
            )
        })
        .collect();

    let output_channels = channels as usize;
    let total_frames = ((end - start) * sample_rate as f64).round() as usize;
    let mut samples = vec![0.0f32; total_frames * output_channels];

    for frame_idx in 0..total_frames {
        let t = frame_idx as f64 / sample_rate as f64;

        for (track_gain, sources) in &render_tracks {
            for source in sources {
                let local = t - source.delay;
                if local < 0.0 || local >= source.audible {
                    continue;
                }
                let source_time = source.plan.source_start + local * source.plan.rate;
                let frame_pos = source_time * source.plan.media.sample_rate() as f64;
                let envelope = source.plan.envelope.value_at(local);

                for ch in 0..output_channels {
                    let value = source.plan.media.sample_at(frame_pos, ch);
                    samples[frame_idx * output_channels + ch] += value * envelope * track_gain;
                }
            }
        }
    }

    Ok(MediaBuffer::new(samples, sample_rate, channels))
}

/// Bounce the whole project, from zero to the end of the last clip.
pub fn render_project(
    project: &Project,
    sample_rate: u32,
    channels: u16,
) -> anyhow::Result<MediaBuffer> {
    render_range(project, 0.0, project.timeline_end(), sample_rate, channels)
}

fn wav_spec(buffer: &MediaBuffer) -> hound::WavSpec {
    hound::WavSpec {
        channels: buffer.channels(),
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    }
}

/// Encode a buffer as 32-bit float WAV bytes.
pub fn encode_wav(buffer: &MediaBuffer) -> anyhow::Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, wav_spec(buffer))?;
    for &sample in buffer.samples() {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(cursor.into_inner())
}

/// Encode a buffer straight to a WAV file on disk.
pub fn write_wav(buffer: &MediaBuffer, path: &Path) -> anyhow::Result<()> {
    let mut writer = hound::WavWriter::create(path, wav_spec(buffer))?;
    for &sample in buffer.samples() {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
