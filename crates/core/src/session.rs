use std::path::Path;

use studio_engine::Engine;
use studio_project::{ClipId, MediaId, Project, ProjectError, TrackId, load_project, save_project};
use studio_render::{encode_wav, render_project, render_range, write_wav};
use studio_transport::MediaBuffer;

pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
pub const DEFAULT_CHANNELS: u16 = 2;

/// Everything a frontend talks to: the project model, import, playback and
/// export behind one facade.
///
/// The engine is opened lazily on the first `play` call so a session is
/// fully usable for editing, import and bounce on machines with no audio
/// device.
pub struct Session {
    project: Project,
    engine: Option<Engine>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            project: Project::new(),
            engine: None,
        }
    }

    /// Rebuild a session from a saved project file. `resolve` maps each
    /// stored media name back to a decoded buffer; media it cannot produce
    /// is reported as offline and its clips stay silent.
    pub fn open(
        path: &Path,
        resolve: impl FnMut(&str) -> Option<MediaBuffer>,
    ) -> anyhow::Result<Self> {
        let doc = load_project(path)?;
        let (project, offline) = Project::from_doc(&doc, resolve);
        for name in &offline {
            log::warn!("media '{name}' is offline; its clips will not sound");
        }
        Ok(Self {
            project,
            engine: None,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ProjectError> {
        save_project(path, &self.project)
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn project_mut(&mut self) -> &mut Project {
        &mut self.project
    }

    /// Decode an encoded audio byte stream and register it as media.
    pub fn import_bytes(
        &mut self,
        name: &str,
        bytes: Vec<u8>,
        extension_hint: Option<&str>,
    ) -> anyhow::Result<MediaId> {
        let buffer = studio_decode::decode_bytes(bytes, extension_hint)?;
        Ok(self.project.add_media(name, buffer))
    }

    /// Decode an audio file and register it as media, named after the file.
    pub fn import_file(&mut self, path: &Path) -> anyhow::Result<MediaId> {
        let buffer = studio_decode::decode_file(path)?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("import");
        Ok(self.project.add_media(name, buffer))
    }

    /// Place registered media on a track as a full-length clip.
    pub fn import_to_track(&mut self, track: TrackId, media: MediaId) -> Option<ClipId> {
        self.project.import_as_clip(track, media)
    }

    /// Start playback from the model's cursor. Opens the output device on
    /// first use. Returns the number of sources scheduled.
    pub fn play(&mut self) -> anyhow::Result<usize> {
        if self.engine.is_none() {
            self.engine = Some(Engine::new()?);
        }
        let engine = self.engine.as_mut().expect("engine opened above");
        Ok(engine.play_from_cursor(&self.project))
    }

    /// Stop playback, keeping the cursor where it is. Safe from any state.
    pub fn pause(&mut self) {
        if let Some(engine) = &mut self.engine {
            engine.pause();
        }
    }

    /// Identical to [`Session::pause`]: sources are discarded, the cursor
    /// stays put.
    pub fn stop(&mut self) {
        if let Some(engine) = &mut self.engine {
            engine.stop();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.engine.as_ref().is_some_and(|e| e.is_playing())
    }

    /// Drain engine status and write the advisory playback cursor back into
    /// the model. Call from the frontend's tick; a no-op while idle.
    pub fn poll(&mut self) -> Option<f64> {
        let cursor = self.engine.as_mut()?.poll()?;
        self.project.set_cursor(cursor);
        Some(cursor)
    }

    /// Bounce a time range to WAV bytes.
    pub fn bounce_range(&self, start: f64, end: f64) -> anyhow::Result<Vec<u8>> {
        let buffer = render_range(
            &self.project,
            start,
            end,
            DEFAULT_SAMPLE_RATE,
            DEFAULT_CHANNELS,
        )?;
        encode_wav(&buffer)
    }

    /// Bounce the whole project to WAV bytes.
    pub fn bounce_project(&self) -> anyhow::Result<Vec<u8>> {
        let buffer = render_project(&self.project, DEFAULT_SAMPLE_RATE, DEFAULT_CHANNELS)?;
        encode_wav(&buffer)
    }

    /// Bounce the whole project straight to a WAV file.
    pub fn render_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let buffer = render_project(&self.project, DEFAULT_SAMPLE_RATE, DEFAULT_CHANNELS)?;
        write_wav(&buffer, path)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
