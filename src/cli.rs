use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "sonoterra",
    about = "Renders an audio clip as a 3D spectrogram terrain flyover video"
)]
pub struct Cli {
    /// Input audio file or http(s) URL (WAV, MP3, FLAC, OGG, AAC)
    pub input: Option<String>,

    /// Output video file
    #[arg(short, long, default_value = "terrain.mp4")]
    pub output: PathBuf,

    /// Config file path (defaults to sonoterra.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Video width in pixels
    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    /// Video height in pixels
    #[arg(long, default_value_t = 720)]
    pub height: u32,

    /// Frames per second of the render loop and output video
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// H.264 CRF quality (0-51, lower = better). Ignored when --bitrate is set.
    #[arg(long, default_value_t = 18)]
    pub crf: u32,

    /// Video bitrate (e.g. 2400k, 5M). When set, uses -b:v instead of -crf.
    #[arg(short, long)]
    pub bitrate: Option<String>,

    /// FFmpeg video codec
    #[arg(long, default_value = "libx264")]
    pub codec: String,

    /// FFmpeg pixel format
    #[arg(long, default_value = "yuv420p")]
    pub pix_fmt: String,

    /// Terrain colors as hex values: one for a flat color, two for a
    /// gradient across the frequency axis
    #[arg(long, value_delimiter = ',')]
    pub colors: Vec<String>,

    /// Edge length of the visualization volume
    #[arg(long, default_value_t = 10.0)]
    pub size: f32,

    /// Gridline ticks per cage axis
    #[arg(long, default_value_t = 4)]
    pub ticks: usize,

    /// Camera orbit speed in radians per second (0 = fixed viewpoint)
    #[arg(long, default_value_t = 0.04)]
    pub orbit_speed: f32,

    /// Title text overlay
    #[arg(long)]
    pub title: Option<String>,

    /// Show elapsed time overlay
    #[arg(long)]
    pub show_time: bool,

    /// Skip numeric axis labels
    #[arg(long)]
    pub no_labels: bool,

    /// Font file for text overlays
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Download the overlay font from a URL
    #[arg(long)]
    pub font_url: Option<String>,
}
