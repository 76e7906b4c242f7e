//! Pointer interaction against the drawn timeline.
//!
//! The controller translates raw pointer events into model operations using
//! the same [`TimelineLayout`] the renderer draws with, so hit tests always
//! agree with what is on screen. Dragging a clip is expressed as repeated
//! `nudge_selected` calls, the same primitive keyboard nudging uses.

use studio_project::{ClipId, Project};
use studio_render::draw::{LANE_PAD, TimelineLayout};

#[derive(Debug, Clone, Copy)]
struct Drag {
    last_x: f32,
}

/// Stateful pointer-gesture handler. One instance per timeline surface;
/// feed it `pointer_down` / `pointer_move` / `pointer_up` in event order.
#[derive(Debug, Default)]
pub struct Controller {
    drag: Option<Drag>,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Hit-test the pointer against clip rectangles. On a hit, select the
    /// clip and begin a drag; on a miss, clear the selection and move the
    /// cursor to the pointer's time. Returns the hit clip, if any.
    pub fn pointer_down(
        &mut self,
        project: &mut Project,
        layout: &TimelineLayout,
        x: f32,
        y: f32,
    ) -> Option<ClipId> {
        let hit = self.hit_test(project, layout, x, y);
        match hit {
            Some(id) => {
                project.select_clips(vec![id]);
                self.drag = Some(Drag { last_x: x });
            }
            None => {
                project.select_clips(Vec::new());
                project.set_cursor(layout.time_at(x));
            }
        }
        hit
    }

    /// While dragging, convert the pixel delta since the last event into a
    /// time delta and nudge the selection by it. No-op when no drag is
    /// active.
    pub fn pointer_move(&mut self, project: &mut Project, layout: &TimelineLayout, x: f32) {
        let Some(drag) = &mut self.drag else {
            return;
        };
        let delta_secs = (x - drag.last_x) as f64 * layout.secs_per_px();
        drag.last_x = x;
        project.nudge_selected(delta_secs);
    }

    /// End the drag, if one is active. The clip stays where it was dropped;
    /// there is no snapping.
    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    /// Later entries in a track's clip list draw on top, so when spans
    /// overlap the last match wins.
    fn hit_test(&self, project: &Project, layout: &TimelineLayout, x: f32, y: f32) -> Option<ClipId> {
        let row = layout.row_at(y)?;
        let track_id = *project.track_order().get(row)?;
        let track = project.track(track_id)?;

        let lane_top = row as f32 * layout.row_height() + LANE_PAD;
        let lane_bottom = (row + 1) as f32 * layout.row_height() - LANE_PAD;
        if y < lane_top || y > lane_bottom {
            return None;
        }

        let mut hit = None;
        for clip in project.clips_of(track) {
            let cx = layout.x_at(clip.start);
            let cw = layout.clip_width(clip.duration);
            if x >= cx && x <= cx + cw {
                hit = Some(clip.id);
            }
        }
        hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studio_project::test_util::{place_clip, project_with_track, silent_media};
    use studio_render::draw::Viewport;

    fn layout(project: &Project) -> TimelineLayout {
        TimelineLayout::new(
            Viewport {
                width: 800.0,
                height: 200.0,
            },
            project.zoom(),
            project.track_order().len(),
        )
    }

    fn one_clip_project() -> (Project, ClipId) {
        let (mut project, track) = project_with_track();
        let media = silent_media(&mut project, 4.0);
        let id = place_clip(&mut project, track, media, 1.0, 2.0);
        project.select_clips(Vec::new());
        (project, id)
    }

    #[test]
    fn down_on_a_clip_selects_it_and_starts_a_drag() {
        let (mut project, id) = one_clip_project();
        let layout = layout(&project);
        let mut controller = Controller::new();

        // clip spans 100..300 px at the default zoom
        let hit = controller.pointer_down(&mut project, &layout, 150.0, 100.0);
        assert_eq!(hit, Some(id));
        assert_eq!(project.selection(), &[id]);
        assert!(controller.is_dragging());
    }

    #[test]
    fn down_on_empty_space_clears_selection_and_seeks() {
        let (mut project, id) = one_clip_project();
        project.select_clips(vec![id]);
        let layout = layout(&project);
        let mut controller = Controller::new();

        let hit = controller.pointer_down(&mut project, &layout, 500.0, 100.0);
        assert_eq!(hit, None);
        assert!(project.selection().is_empty());
        assert!((project.cursor() - 5.0).abs() < 1e-9);
        assert!(!controller.is_dragging());
    }

    #[test]
    fn down_below_all_rows_seeks_instead_of_selecting() {
        let (mut project, _) = one_clip_project();
        let layout = layout(&project);
        let mut controller = Controller::new();

        let hit = controller.pointer_down(&mut project, &layout, 150.0, 500.0);
        assert_eq!(hit, None);
        assert!((project.cursor() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn drag_moves_the_clip_by_the_pixel_delta() {
        let (mut project, id) = one_clip_project();
        let layout = layout(&project);
        let mut controller = Controller::new();

        controller.pointer_down(&mut project, &layout, 150.0, 100.0);
        controller.pointer_move(&mut project, &layout, 250.0);
        // 100 px at 100 px/sec = 1 second
        assert!((project.clip(id).unwrap().start - 2.0).abs() < 1e-9);

        // incremental anchor: a second move adds only its own delta
        controller.pointer_move(&mut project, &layout, 300.0);
        assert!((project.clip(id).unwrap().start - 2.5).abs() < 1e-9);

        controller.pointer_up();
        assert!(!controller.is_dragging());
        controller.pointer_move(&mut project, &layout, 600.0);
        assert!((project.clip(id).unwrap().start - 2.5).abs() < 1e-9);
    }

    #[test]
    fn drag_left_clamps_start_at_zero() {
        let (mut project, id) = one_clip_project();
        let layout = layout(&project);
        let mut controller = Controller::new();

        controller.pointer_down(&mut project, &layout, 150.0, 100.0);
        controller.pointer_move(&mut project, &layout, -700.0);
        assert_eq!(project.clip(id).unwrap().start, 0.0);
    }

    #[test]
    fn move_without_down_does_nothing() {
        let (mut project, id) = one_clip_project();
        project.select_clips(vec![id]);
        let layout = layout(&project);
        let mut controller = Controller::new();

        controller.pointer_move(&mut project, &layout, 400.0);
        assert!((project.clip(id).unwrap().start - 1.0).abs() < 1e-9);
    }

    #[test]
    fn overlapping_clips_hit_the_topmost_layer() {
        let (mut project, track) = project_with_track();
        let media = silent_media(&mut project, 4.0);
        let _under = place_clip(&mut project, track, media, 0.0, 3.0);
        let over = place_clip(&mut project, track, media, 1.0, 1.0);
        let layout = layout(&project);
        let mut controller = Controller::new();

        let hit = controller.pointer_down(&mut project, &layout, 150.0, 100.0);
        assert_eq!(hit, Some(over));
    }

    #[test]
    fn second_row_hits_the_second_track() {
        let (mut project, _) = project_with_track();
        let second = project.add_track(None);
        let media = silent_media(&mut project, 4.0);
        let id = place_clip(&mut project, second, media, 0.0, 2.0);
        let layout = layout(&project);
        let mut controller = Controller::new();

        // y = 150 falls in row 1 of two 100 px rows
        let hit = controller.pointer_down(&mut project, &layout, 50.0, 150.0);
        assert_eq!(hit, Some(id));
    }

    #[test]
    fn lane_padding_is_not_clickable() {
        let (mut project, _) = one_clip_project();
        let layout = layout(&project);
        let mut controller = Controller::new();

        // inside the clip's horizontal span but in the 6 px lane padding
        let hit = controller.pointer_down(&mut project, &layout, 150.0, 2.0);
        assert_eq!(hit, None);
    }
}
