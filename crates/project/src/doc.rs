//! Project document save/load. Documents capture everything except decoded
//! media payloads; clips reference media by display name and are re-linked
//! against a resolver on load. Saved as pretty JSON; loading accepts JSON
//! first and falls back to MessagePack.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use studio_transport::MediaBuffer;

use crate::{Clip, ClipId, LoopPatch, Project};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDoc {
    pub name: String,
    pub zoom: f64,
    pub cursor: f64,
    pub loop_region: LoopDoc,
    pub tracks: Vec<TrackDoc>,
    pub markers: Vec<MarkerDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopDoc {
    pub enabled: bool,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackDoc {
    pub name: String,
    pub armed: bool,
    pub volume_db: f64,
    pub pan: f64,
    pub clips: Vec<ClipDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipDoc {
    pub name: String,
    /// Display name of the media this clip reads from.
    pub media: String,
    pub start: f64,
    pub duration: f64,
    pub source_offset: f64,
    pub gain_db: f64,
    pub fade_in: f64,
    pub fade_out: f64,
    pub reverse: bool,
    pub stretch: f64,
    pub pitch_cents: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MessagePack error: {0}")]
    Msgpack(#[from] rmp_serde::decode::Error),
}

pub fn save_project(path: &Path, project: &Project) -> Result<(), ProjectError> {
    let doc = project.to_doc();
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &doc)?;
    Ok(())
}

pub fn load_project(path: &Path) -> Result<ProjectDoc, ProjectError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    match serde_json::from_reader(reader) {
        Ok(doc) => Ok(doc),
        Err(_) => {
            let file = File::open(path)?;
            let reader = BufReader::new(file);
            rmp_serde::decode::from_read(reader).map_err(ProjectError::from)
        }
    }
}

impl Project {
    pub fn to_doc(&self) -> ProjectDoc {
        let loop_region = self.loop_region();
        ProjectDoc {
            name: self.name.clone(),
            zoom: self.zoom(),
            cursor: self.cursor(),
            loop_region: LoopDoc {
                enabled: loop_region.enabled,
                start: loop_region.start,
                end: loop_region.end,
            },
            tracks: self
                .tracks_ordered()
                .map(|track| TrackDoc {
                    name: track.name.clone(),
                    armed: track.armed,
                    volume_db: track.volume_db,
                    pan: track.pan,
                    clips: self
                        .clips_of(track)
                        .map(|clip| ClipDoc {
                            name: clip.name.clone(),
                            media: self
                                .media(clip.media_id)
                                .map(|m| m.name.clone())
                                .unwrap_or_default(),
                            start: clip.start,
                            duration: clip.duration,
                            source_offset: clip.source_offset,
                            gain_db: clip.gain_db,
                            fade_in: clip.fade_in,
                            fade_out: clip.fade_out,
                            reverse: clip.reverse,
                            stretch: clip.stretch,
                            pitch_cents: clip.pitch_cents,
                        })
                        .collect(),
                })
                .collect(),
            markers: self
                .markers()
                .iter()
                .map(|m| MarkerDoc {
                    time: m.time,
                    name: m.name.clone(),
                })
                .collect(),
        }
    }

    /// Rebuild a project from a document. `resolve` maps a media display
    /// name to a decoded buffer; clips whose media cannot be resolved are
    /// skipped and their names returned so the caller can surface them.
    pub fn from_doc(
        doc: &ProjectDoc,
        mut resolve: impl FnMut(&str) -> Option<MediaBuffer>,
    ) -> (Project, Vec<String>) {
        let mut project = Project::new();
        project.name = doc.name.clone();
        project.set_zoom(doc.zoom);
        project.set_cursor(doc.cursor);
        project.set_loop(LoopPatch {
            enabled: Some(doc.loop_region.enabled),
            start: Some(doc.loop_region.start),
            end: Some(doc.loop_region.end),
        });

        let mut offline = Vec::new();

        for track_doc in &doc.tracks {
            let track_id = project.add_track(Some(&track_doc.name));
            {
                let track = project
                    .tracks
                    .get_mut(&track_id)
                    .expect("track just added");
                track.armed = track_doc.armed;
                track.volume_db = track_doc.volume_db;
                track.pan = track_doc.pan;
            }

            for clip_doc in &track_doc.clips {
                let media_id = match project.media_by_name(&clip_doc.media) {
                    Some(media) => media.id,
                    None => match resolve(&clip_doc.media) {
                        Some(buffer) => project.add_media(clip_doc.media.clone(), buffer),
                        None => {
                            offline.push(clip_doc.name.clone());
                            continue;
                        }
                    },
                };
                project.add_clip(Clip {
                    id: ClipId::UNSET,
                    track_id,
                    media_id,
                    name: clip_doc.name.clone(),
                    start: clip_doc.start,
                    duration: clip_doc.duration,
                    source_offset: clip_doc.source_offset,
                    gain_db: clip_doc.gain_db,
                    fade_in: clip_doc.fade_in,
                    fade_out: clip_doc.fade_out,
                    reverse: clip_doc.reverse,
                    stretch: clip_doc.stretch,
                    pitch_cents: clip_doc.pitch_cents,
                });
            }
        }

        for marker_doc in &doc.markers {
            project.add_marker(marker_doc.time, marker_doc.name.clone());
        }

        (project, offline)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerDoc {
    pub time: f64,
    pub name: String,
}
