//! Edit operations: transformations of the model driven by the current
//! selection and cursor. All of them are total over their inputs: an empty
//! selection or a vanished clip id degenerates to a no-op, never an error,
//! so UI bindings can invoke them unconditionally.

use crate::{ClipId, DUPLICATE_GAP, MIN_CLIP_LEN, MIN_STRETCH, Project};

impl Project {
    /// Split every selected clip whose span strictly contains the cursor.
    pub fn split_selected_at_cursor(&mut self) {
        let at = self.cursor();
        for id in self.selection().to_vec() {
            self.split_clip(id, at);
        }
    }

    /// Split every clip in the project at the cursor, selection or not.
    pub fn split_at_cursor_all(&mut self) {
        let at = self.cursor();
        for id in self.all_clip_ids() {
            self.split_clip(id, at);
        }
    }

    /// Move each selected clip's start to the cursor, keeping the retained
    /// audio anchored by advancing the source offset by the trimmed duration
    /// divided by the stretch ratio. Clips not straddling the cursor are
    /// untouched.
    pub fn trim_selected_start_to_cursor(&mut self) {
        let at = self.cursor();
        for id in self.selection().to_vec() {
            let Some(clip) = self.clip_mut(id) else {
                continue;
            };
            if !clip.contains(at) {
                continue;
            }
            let end = clip.end();
            let delta = at - clip.start;
            clip.start = at;
            clip.duration = end - at;
            clip.source_offset += delta / clip.stretch.max(MIN_STRETCH);
        }
    }

    /// Shorten each selected clip so it ends at the cursor. The resulting
    /// duration is clamped to [`MIN_CLIP_LEN`].
    pub fn trim_selected_end_to_cursor(&mut self) {
        let at = self.cursor();
        for id in self.selection().to_vec() {
            let Some(clip) = self.clip_mut(id) else {
                continue;
            };
            if at > clip.start {
                clip.duration = (at - clip.start).max(MIN_CLIP_LEN);
            }
        }
    }

    /// Copy each selected clip onto its own track, placed just after the
    /// original. Selection becomes the set of copies.
    pub fn duplicate_selected(&mut self) {
        let mut copies = Vec::new();
        for id in self.selection().to_vec() {
            let Some(original) = self.clip(id) else {
                continue;
            };
            let mut copy = original.clone();
            copy.id = ClipId::UNSET;
            copy.start = original.start + original.duration + DUPLICATE_GAP;
            if let Some(new_id) = self.add_clip(copy) {
                copies.push(new_id);
            }
        }
        self.select_clips(copies);
    }

    /// Remove every selected clip from the clip table and its track's list.
    /// Selection becomes empty.
    pub fn delete_selected(&mut self) {
        for id in self.selection().to_vec() {
            self.remove_clip(id);
        }
        self.select_clips(Vec::new());
    }

    /// Shift each selected clip's start by `delta` seconds, clamped to >= 0.
    pub fn nudge_selected(&mut self, delta: f64) {
        for id in self.selection().to_vec() {
            if let Some(clip) = self.clip_mut(id) {
                clip.start = (clip.start + delta).max(0.0);
            }
        }
    }

    /// Overwrite both fade fields on every selected clip.
    pub fn set_fade_on_selected(&mut self, fade_in: f64, fade_out: f64) {
        for id in self.selection().to_vec() {
            if let Some(clip) = self.clip_mut(id) {
                clip.fade_in = fade_in;
                clip.fade_out = fade_out;
            }
        }
    }

    /// Reset gain to 0 dB on every selected clip. This is deliberately not a
    /// sample-scanning peak normalization; see DESIGN.md.
    pub fn normalize_selected_peak(&mut self) {
        for id in self.selection().to_vec() {
            if let Some(clip) = self.clip_mut(id) {
                clip.gain_db = 0.0;
            }
        }
    }

    fn clip_mut(&mut self, id: ClipId) -> Option<&mut crate::Clip> {
        self.clips.get_mut(&id)
    }

    fn remove_clip(&mut self, id: ClipId) {
        let Some(clip) = self.clips.remove(&id) else {
            return;
        };
        if let Some(track) = self.tracks.get_mut(&clip.track_id) {
            track.clip_ids.retain(|c| *c != id);
        }
    }
}
