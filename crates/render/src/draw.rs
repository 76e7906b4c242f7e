//! Timeline draw-command generation.
//!
//! [`render_timeline`] is a pure function from the project and a viewport to
//! an ordered list of [`DrawCmd`]s; a frontend replays them onto whatever
//! surface it has. Waveform columns come from per-media peak caches so a
//! cursor move never rescans sample data.

use std::collections::HashMap;

use studio_project::{ClipId, MediaId, Project};
use studio_transport::WaveformData;

/// Pixels per second at zoom 1.0.
pub const BASE_PX_PER_SEC: f64 = 100.0;
/// Padding between a lane's edge and its clip content, in pixels.
pub const LANE_PAD: f32 = 6.0;
/// Frames folded into one min/max pair in a peak cache.
pub const PEAK_BUCKET_FRAMES: usize = 512;

const MAJOR_TICK_SECS: u64 = 5;

#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

/// Shared pixel mapping for drawing and hit testing. Both directions go
/// through the same scale so pointer positions and drawn rectangles agree.
#[derive(Debug, Clone, Copy)]
pub struct TimelineLayout {
    px_per_sec: f64,
    row_height: f32,
    rows: usize,
}

impl TimelineLayout {
    pub fn new(viewport: Viewport, zoom: f64, track_count: usize) -> Self {
        let rows = track_count.max(1);
        Self {
            px_per_sec: BASE_PX_PER_SEC * zoom,
            row_height: (viewport.height / rows as f32).floor(),
            rows,
        }
    }

    pub fn px_per_sec(&self) -> f64 {
        self.px_per_sec
    }

    pub fn row_height(&self) -> f32 {
        self.row_height
    }

    pub fn x_at(&self, secs: f64) -> f32 {
        (secs * self.px_per_sec).round() as f32
    }

    pub fn time_at(&self, x: f32) -> f64 {
        (x as f64 / self.px_per_sec).max(0.0)
    }

    pub fn secs_per_px(&self) -> f64 {
        1.0 / self.px_per_sec
    }

    /// Row index under a vertical pixel position, if any track is there.
    pub fn row_at(&self, y: f32) -> Option<usize> {
        if y < 0.0 || self.row_height <= 0.0 {
            return None;
        }
        let row = (y / self.row_height) as usize;
        (row < self.rows).then_some(row)
    }

    /// Pixel width of a clip of the given duration, never less than one.
    pub fn clip_width(&self, duration: f64) -> f32 {
        ((duration * self.px_per_sec).round() as f32).max(1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCmd {
    LaneBackground {
        row: usize,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    ClipRect {
        clip: ClipId,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    /// One vertical min/max span of a clip's waveform, one per pixel column.
    WaveColumn {
        x: f32,
        y_min: f32,
        y_max: f32,
    },
    /// Placeholder for a clip whose media has no peak data.
    CenterLine {
        x: f32,
        y: f32,
        width: f32,
    },
    RulerTick {
        x: f32,
        major: bool,
        label: Option<String>,
    },
    /// Always emitted last so it draws on top of all clip content.
    Cursor {
        x: f32,
    },
}

/// Peak data per media entry, computed once and reused across redraws.
#[derive(Debug, Default)]
pub struct PeakCache {
    peaks: HashMap<MediaId, WaveformData>,
}

impl PeakCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build peaks for any registered media that has none yet.
    pub fn ensure(&mut self, project: &Project) {
        for track in project.tracks_ordered() {
            for clip in project.clips_of(track) {
                if self.peaks.contains_key(&clip.media_id) {
                    continue;
                }
                if let Some(media) = project.media(clip.media_id) {
                    self.peaks.insert(
                        clip.media_id,
                        WaveformData::from_media(&media.buffer, PEAK_BUCKET_FRAMES),
                    );
                }
            }
        }
    }

    pub fn get(&self, id: MediaId) -> Option<&WaveformData> {
        self.peaks.get(&id)
    }
}

/// Emit the draw commands for one frame: ruler, lanes top-to-bottom in track
/// order, clip rectangles with waveforms, then the cursor on top.
pub fn render_timeline(project: &Project, viewport: Viewport, peaks: &PeakCache) -> Vec<DrawCmd> {
    let layout = TimelineLayout::new(viewport, project.zoom(), project.track_order().len());
    let mut cmds = Vec::new();

    let visible_secs = layout.time_at(viewport.width).ceil() as u64;
    for s in 0..=visible_secs {
        let major = s % MAJOR_TICK_SECS == 0;
        cmds.push(DrawCmd::RulerTick {
            x: layout.x_at(s as f64),
            major,
            label: major.then(|| format!("{s}s")),
        });
    }

    for (row, track) in project.tracks_ordered().enumerate() {
        let y0 = row as f32 * layout.row_height();
        let lane_y = y0 + LANE_PAD;
        let lane_h = layout.row_height() - LANE_PAD * 2.0;

        cmds.push(DrawCmd::LaneBackground {
            row,
            x: LANE_PAD,
            y: lane_y,
            width: viewport.width - LANE_PAD * 2.0,
            height: lane_h,
        });

        for clip in project.clips_of(track) {
            let x = layout.x_at(clip.start);
            let w = layout.clip_width(clip.duration);
            cmds.push(DrawCmd::ClipRect {
                clip: clip.id,
                x,
                y: lane_y,
                width: w,
                height: lane_h,
            });

            match project.media(clip.media_id).and_then(|m| peaks.get(m.id)) {
                Some(waveform) => {
                    let media_frames = project
                        .media(clip.media_id)
                        .map(|m| m.buffer.frames())
                        .unwrap_or(0);
                    let frames_per_px = (media_frames / w.max(1.0) as usize).max(1);
                    for px in 0..w as usize {
                        let start_frame = px * frames_per_px;
                        let (lo, hi) = waveform.range(start_frame, start_frame + frames_per_px);
                        // amplitude 1.0 spans half the lane, centered
                        let y_min = lane_y + (0.5 - lo * 0.5) * lane_h;
                        let y_max = lane_y + (0.5 - hi * 0.5) * lane_h;
                        cmds.push(DrawCmd::WaveColumn {
                            x: x + px as f32,
                            y_min,
                            y_max,
                        });
                    }
                }
                None => {
                    cmds.push(DrawCmd::CenterLine {
                        x,
                        y: lane_y + lane_h / 2.0,
                        width: w,
                    });
                }
            }
        }
    }

    cmds.push(DrawCmd::Cursor {
        x: layout.x_at(project.cursor()),
    });

    cmds
}
