mod audio;
mod cli;
mod config;
mod encode;
mod render;
mod scene;
mod session;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use audio::source::{self, SourceLocator};
use cli::Cli;
use encode::ffmpeg::{EncodeSettings, FfmpegEncoder};
use render::camera::{project_to_screen, OrbitCamera};
use render::frame::{FrameRenderer, TEXTURE_FORMAT};
use render::gpu::GpuContext;
use render::pipeline::{SceneBuffers, ScenePipelines, SceneUniforms};
use render::text::{load_font_from_url, TextOverlay};
use scene::cage;
use scene::color::{Color, ColorScheme};
use scene::terrain::TerrainMeshBuilder;
use session::AnalyzerSession;

/// Default terrain color when neither CLI nor config supplies one.
const DEFAULT_COLOR: &str = "#81A596";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect sonoterra.toml / global config
    let config_path = cli.config.clone().or_else(|| {
        let local = PathBuf::from("sonoterra.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("sonoterra").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("sonoterra").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });
    if let Some(ref path) = config_path {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            // Merge: config values apply only when CLI is at its default
            if cli.width == 1280 { cli.width = cfg.output.width; }
            if cli.height == 720 { cli.height = cfg.output.height; }
            if cli.fps == 30 { cli.fps = cfg.output.fps; }
            if cli.crf == 18 { cli.crf = cfg.output.crf; }
            if cli.codec == "libx264" { cli.codec = cfg.output.codec; }
            if cli.size == 10.0 { cli.size = cfg.scene.size; }
            if cli.ticks == 4 { cli.ticks = cfg.scene.ticks; }
            if cli.orbit_speed == 0.04 { cli.orbit_speed = cfg.scene.orbit_speed; }
            if cli.colors.is_empty() && !cfg.scene.colors.is_empty() {
                cli.colors = cfg.scene.colors;
            }
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    let input = cli.input.as_ref().context("Input audio file or URL is required")?;
    let locator = SourceLocator::parse(input);

    log::info!("sonoterra - audio spectrogram terrain renderer");
    log::info!("Input: {locator}");
    log::info!("Output: {}", cli.output.display());
    log::info!("Resolution: {}x{} @ {}fps", cli.width, cli.height, cli.fps);

    // FFmpeg muxes the source audio from a file, so remote clips are
    // materialized to a temp file once and loaded from there.
    let (locator, audio_path, temp_audio) = materialize_source(locator)?;

    let color_specs: Vec<String> = if cli.colors.is_empty() {
        vec![DEFAULT_COLOR.to_string()]
    } else {
        cli.colors.clone()
    };
    let colors = color_specs
        .iter()
        .map(|s| Color::from_hex(s))
        .collect::<Result<Vec<_>>>()?;
    let scheme = ColorScheme::new(&colors)?;

    // 1. Load the clip: fetch, decode and analyze on a background task,
    // pumping the session until the matrix publishes.
    let mut session = AnalyzerSession::new(cli.size);
    session.request_load(locator);
    while !session.has_clip() {
        session.tick(0.0);
        if let Some(err) = session.take_error() {
            return Err(anyhow::Error::new(err).context("failed to load audio"));
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    let duration = session.duration().context("no clip loaded")?;

    // 2. GPU and scene setup
    log::info!("Initializing GPU...");
    let gpu = GpuContext::new()?;
    let pipelines = ScenePipelines::new(&gpu.device, TEXTURE_FORMAT)?;
    let frame_renderer = FrameRenderer::new(&gpu, cli.width, cli.height);

    let cage_geometry = cage::build_cage(cli.size, cli.ticks, Color::WHITE);
    let mut buffers = SceneBuffers::new(&gpu, &pipelines.bind_group_layout, &cage_geometry);
    let camera = OrbitCamera::around_volume(cli.size, cli.orbit_speed);
    let mut terrain_builder = TerrainMeshBuilder::new(cli.size);

    // 3. Text overlay
    let font_bytes = cli.font_url.as_ref().and_then(|url| match load_font_from_url(url) {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            log::warn!("Failed to load font from URL: {err}");
            None
        }
    });
    let overlay_wanted = !cli.no_labels || cli.title.is_some() || cli.show_time;
    let text_overlay = if overlay_wanted {
        let shorter = cli.width.min(cli.height) as f32;
        let font_size = (shorter * 0.022).max(13.0);
        match TextOverlay::new(font_size, cli.font.as_deref(), font_bytes.as_deref()) {
            Ok(overlay) => Some(overlay),
            Err(err) => {
                log::warn!("Text overlays disabled: {err}");
                None
            }
        }
    } else {
        None
    };

    // 4. Encoder
    log::info!("Starting FFmpeg encoder...");
    let settings = EncodeSettings {
        width: cli.width,
        height: cli.height,
        fps: cli.fps,
        codec: cli.codec.clone(),
        pix_fmt: cli.pix_fmt.clone(),
        crf: cli.crf,
        bitrate: cli.bitrate.clone(),
    };
    let mut encoder = FfmpegEncoder::new(&cli.output, &audio_path, &settings)?;

    // 5. Render loop: a fixed-rate scheduler driving tick(now)
    let total_frames = (duration * cli.fps as f64).ceil() as u64;
    log::info!("Rendering {total_frames} frames ({duration:.1}s)");

    let pb = ProgressBar::new(total_frames);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")
            .unwrap()
            .progress_chars("=>-"),
    );

    session.play(0.0);
    let aspect = cli.width as f32 / cli.height as f32;
    let mut uploaded_revision = 0u64;

    for frame_idx in 0..total_frames {
        let now = frame_idx as f64 / cli.fps as f64;
        let state = session.tick(now);

        if state.revision != uploaded_revision {
            if let Some(matrix) = state.matrix {
                let mesh = terrain_builder.build(matrix, &scheme);
                log::debug!(
                    "Terrain bounds: {:?} to {:?}",
                    mesh.bounds_min,
                    mesh.bounds_max
                );
                buffers.upload_terrain(&gpu, mesh);
                uploaded_revision = state.revision;
            }
        }
        buffers.upload_overlay(&gpu, state.overlay.as_ref(), Color::WHITE, Color::WHITE);

        let view_proj = camera.view_proj(now as f32, aspect);
        buffers.write_uniforms(
            &gpu,
            &SceneUniforms {
                view_proj: view_proj.to_cols_array_2d(),
                light_dir: [0.35, 1.0, 0.25],
                time: now as f32,
            },
        );

        let mut pixels = frame_renderer.render_and_readback(&gpu, &pipelines, &buffers)?;

        if let Some(ref overlay) = text_overlay {
            let color = [210u8, 214, 220, 200];
            let shorter = cli.width.min(cli.height) as f32;
            let margin = (shorter * 0.07) as u32;

            if !cli.no_labels {
                for label in &cage_geometry.labels {
                    if let Some((x, y)) =
                        project_to_screen(view_proj, label.position, cli.width, cli.height)
                    {
                        overlay.composite(&mut pixels, cli.width, cli.height, &label.text, x, y, color);
                    }
                }
            }

            if let Some(ref title) = cli.title {
                let tw = overlay.measure_width(title);
                let tx = cli.width.saturating_sub(margin + tw);
                overlay.composite(&mut pixels, cli.width, cli.height, title, tx, margin, color);
            }

            if cli.show_time {
                let total_secs = now as u64;
                let centis = ((now - total_secs as f64) * 100.0) as u64;
                let time_str = format!("{:02}:{:02}.{:02}", total_secs / 60, total_secs % 60, centis);
                let tw = overlay.measure_width(&time_str);
                let tx = cli.width.saturating_sub(margin + tw);
                let ty = cli.height.saturating_sub(margin + overlay.line_height());
                overlay.composite(&mut pixels, cli.width, cli.height, &time_str, tx, ty, color);
            }
        }

        encoder.write_frame(&pixels)?;
        pb.set_position(frame_idx + 1);
    }

    pb.finish_with_message("Rendering complete");

    // 6. Finish encoding
    log::info!("Finishing encoding...");
    encoder.finish()?;

    if let Some(path) = temp_audio {
        let _ = std::fs::remove_file(path);
    }

    log::info!("Done! Output: {}", cli.output.display());
    Ok(())
}

/// Resolve the input to a local audio file ffmpeg can mux from. URLs are
/// fetched once and written to a temp file; local paths are checked for
/// existence up front.
fn materialize_source(
    locator: SourceLocator,
) -> Result<(SourceLocator, PathBuf, Option<PathBuf>)> {
    match locator {
        SourceLocator::Url(url) => {
            let remote = SourceLocator::Url(url);
            let bytes = source::fetch_audio(&remote).context("failed to fetch audio")?;
            let ext = remote.extension_hint().unwrap_or_else(|| "bin".to_string());
            let path = std::env::temp_dir().join(format!("sonoterra-{}.{ext}", std::process::id()));
            std::fs::write(&path, &bytes)
                .with_context(|| format!("failed to write temp audio {}", path.display()))?;
            log::info!("Cached remote audio at {}", path.display());
            Ok((SourceLocator::Path(path.clone()), path.clone(), Some(path)))
        }
        SourceLocator::Path(path) => {
            if !path.exists() {
                anyhow::bail!("Input file not found: {}", path.display());
            }
            Ok((SourceLocator::Path(path.clone()), path.clone(), None))
        }
    }
}
