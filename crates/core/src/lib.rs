pub mod session;

pub use session::{DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE, Session};

pub use studio_decode::{decode_bytes, decode_file};
pub use studio_engine::{Engine, PlaybackState};
pub use studio_project::{
    Clip, ClipId, ClipPatch, LoopPatch, LoopRegion, Marker, Media, MediaId, Project, ProjectError,
    Track, TrackId, load_project, save_project,
};
pub use studio_render::{encode_wav, render_project, render_range, write_wav};
pub use studio_render::draw::{DrawCmd, PeakCache, TimelineLayout, Viewport, render_timeline};
pub use studio_transport::{MediaBuffer, WaveformData, db_to_linear};
pub use studio_view::Controller;
