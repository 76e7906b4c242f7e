use std::sync::Arc;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Shared, immutable decoded audio.
///
/// Samples are interleaved f32 stored behind an `Arc<[f32]>`, so cloning a
/// `MediaBuffer` only bumps a refcount. A buffer is never mutated after it is
/// created; everything downstream (clips, playback voices, the bounce path)
/// holds cheap clones of the same sample data.
#[derive(Clone)]
pub struct MediaBuffer {
    /// Interleaved samples. For stereo: [L, R, L, R, ...].
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl MediaBuffer {
    /// Create a buffer from owned sample data.
    ///
    /// # Panics
    ///
    /// Panics if `channels` is 0 or if `samples.len()` is not divisible by
    /// `channels`.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        assert!(channels > 0, "channels must be greater than 0");
        assert_eq!(
            samples.len() % channels as usize,
            0,
            "samples.len() must be divisible by channels"
        );
        Self {
            samples: Arc::from(samples),
            sample_rate,
            channels,
        }
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Inner `Arc` for refcount checks and advanced sharing.
    pub fn samples_arc(&self) -> &Arc<[f32]> {
        &self.samples
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (samples per channel).
    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Iterate one channel's samples.
    ///
    /// # Panics
    ///
    /// Panics if `channel >= self.channels()`.
    pub fn channel(&self, channel: usize) -> impl Iterator<Item = f32> + '_ {
        assert!(
            channel < self.channels as usize,
            "channel index out of bounds"
        );
        let channels = self.channels as usize;
        (0..self.frames()).map(move |frame| self.samples[frame * channels + channel])
    }

    /// Linearly interpolated read of one channel at a fractional frame
    /// position. Out-of-range positions read as silence.
    pub fn sample_at(&self, frame_pos: f64, channel: usize) -> f32 {
        if frame_pos < 0.0 {
            return 0.0;
        }
        let channels = self.channels as usize;
        let ch = channel % channels;
        let base = frame_pos.floor() as usize;
        if base >= self.frames() {
            return 0.0;
        }
        let frac = (frame_pos - base as f64) as f32;
        let a = self.samples[base * channels + ch];
        let b = if base + 1 < self.frames() {
            self.samples[(base + 1) * channels + ch]
        } else {
            0.0
        };
        a + (b - a) * frac
    }

    /// Resample to a target rate with sinc interpolation. Returns a cheap
    /// clone when the buffer is already at the target rate.
    pub fn resample(&self, target_sample_rate: u32) -> anyhow::Result<Self> {
        if self.sample_rate == target_sample_rate {
            return Ok(self.clone());
        }

        let channels = self.channels as usize;
        let input_frames = self.frames();
        let resample_ratio = target_sample_rate as f64 / self.sample_rate as f64;

        // rubato wants per-channel (non-interleaved) input
        let mut input_channels = vec![Vec::with_capacity(input_frames); channels];
        for frame_idx in 0..input_frames {
            for ch in 0..channels {
                input_channels[ch].push(self.samples[frame_idx * channels + ch]);
            }
        }

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        let mut resampler =
            SincFixedIn::<f32>::new(resample_ratio, 2.0, params, input_frames, channels)?;
        let output_channels = resampler.process(&input_channels, None)?;

        let output_frames = output_channels[0].len();
        let mut output_samples = Vec::with_capacity(output_frames * channels);
        for frame_idx in 0..output_frames {
            for ch in 0..channels {
                output_samples.push(output_channels[ch][frame_idx]);
            }
        }

        Ok(MediaBuffer::new(
            output_samples,
            target_sample_rate,
            self.channels,
        ))
    }
}

impl std::fmt::Debug for MediaBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaBuffer")
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("duration_secs", &self.duration_secs())
            .finish()
    }
}

/// Convert decibels to a linear amplitude multiplier.
#[inline]
pub fn db_to_linear(db: f64) -> f32 {
    10f32.powf(db as f32 / 20.0)
}

/// Downsampled min/max peaks of a buffer, mixed to mono, for waveform
/// drawing. Computed once per media and cached by the renderer so a cursor
/// move never rescans samples.
#[derive(Debug, Clone)]
pub struct WaveformData {
    pub peaks: Vec<(f32, f32)>,
    pub frames_per_bucket: usize,
}

impl WaveformData {
    pub fn from_media(media: &MediaBuffer, frames_per_bucket: usize) -> Self {
        let frames = media.frames();
        let num_buckets = frames.div_ceil(frames_per_bucket);
        let mut peaks = Vec::with_capacity(num_buckets);
        let channels = media.channels() as usize;
        let samples = media.samples();

        for bucket_idx in 0..num_buckets {
            let start = bucket_idx * frames_per_bucket;
            let end = ((bucket_idx + 1) * frames_per_bucket).min(frames);

            let mut min_val: f32 = 0.0;
            let mut max_val: f32 = 0.0;

            for frame_idx in start..end {
                let mut sum: f32 = 0.0;
                for ch in 0..channels {
                    sum += samples[frame_idx * channels + ch];
                }
                let mono = sum / channels as f32;
                min_val = min_val.min(mono);
                max_val = max_val.max(mono);
            }

            peaks.push((min_val, max_val));
        }

        Self {
            peaks,
            frames_per_bucket,
        }
    }

    /// Min/max over a frame range, combining the buckets it touches.
    pub fn range(&self, start_frame: usize, end_frame: usize) -> (f32, f32) {
        if self.peaks.is_empty() || end_frame <= start_frame {
            return (0.0, 0.0);
        }
        let first = start_frame / self.frames_per_bucket;
        let last = (end_frame.saturating_sub(1) / self.frames_per_bucket).min(self.peaks.len() - 1);
        let mut min_val: f32 = 0.0;
        let mut max_val: f32 = 0.0;
        for (lo, hi) in &self.peaks[first.min(self.peaks.len() - 1)..=last] {
            min_val = min_val.min(*lo);
            max_val = max_val.max(*hi);
        }
        (min_val, max_val)
    }
}
