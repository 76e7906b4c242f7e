use std::f32::consts::PI;

use studio_engine::Engine;
use studio_project::Project;
use studio_transport::MediaBuffer;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let sample_rate = 44100u32;
    let samples: Vec<f32> = (0..sample_rate * 2)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * PI * 440.0 * t).sin() * 0.4
        })
        .collect();

    let mut project = Project::new();
    let track = project.add_track(Some("tone"));
    let media = project.add_media("sine 440", MediaBuffer::new(samples, sample_rate, 1));
    let clip = project
        .import_as_clip(track, media)
        .expect("clip on fresh track");

    project.select_clips(vec![clip]);
    project.set_fade_on_selected(0.2, 0.5);

    let mut engine = Engine::new()?;
    let scheduled = engine.play_from_cursor(&project);
    println!("scheduled {scheduled} voice(s)");

    let start = std::time::Instant::now();
    while start.elapsed().as_secs_f64() < 2.5 {
        if let Some(cursor) = engine.poll() {
            project.set_cursor(cursor);
        }
        std::thread::sleep(std::time::Duration::from_millis(16));
    }
    println!("cursor ended at {:.2}s", project.cursor());

    engine.stop();
    Ok(())
}
