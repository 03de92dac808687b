use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "camtile",
    author,
    version,
    about = "Renders a live webcam feed or an image through a tiled, rotated shader effect"
)]
pub struct Cli {
    /// Fragment shader file to use instead of the bundled mosaic effect.
    #[arg(long, value_name = "PATH")]
    pub shader: Option<PathBuf>,

    /// Start in image mode with this file instead of the webcam.
    #[arg(long, value_name = "PATH")]
    pub image: Option<PathBuf>,

    /// Camera device index to open whenever the webcam is active.
    #[arg(long, value_name = "INDEX")]
    pub camera: Option<u32>,

    /// Initial window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Cap the render loop at this FPS (uncapped by default).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Initial tile size in pixels (2-50).
    #[arg(long, value_name = "PIXELS")]
    pub tile_size: Option<u32>,

    /// Initial sample zoom factor (0-2).
    #[arg(long, value_name = "FACTOR")]
    pub scale: Option<f32>,

    /// Initial grid rotation in degrees (0-20).
    #[arg(long, value_name = "DEGREES")]
    pub rotation: Option<u32>,

    /// Explicit config file (defaults to `camtile.toml` in the user
    /// config dir).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the resolved configuration as TOML and exit.
    #[arg(long)]
    pub print_config: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w.trim().parse().map_err(|_| format!("invalid width '{w}'"))?;
    let height = h
        .trim()
        .parse()
        .map_err(|_| format!("invalid height '{h}'"))?;
    if width == 0 || height == 0 {
        return Err("window dimensions must be non-zero".into());
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_window_sizes() {
        assert_eq!(parse_size("1280x720"), Ok((1280, 720)));
        assert_eq!(parse_size("640X480"), Ok((640, 480)));
    }

    #[test]
    fn rejects_malformed_sizes() {
        assert!(parse_size("1280").is_err());
        assert!(parse_size("axb").is_err());
        assert!(parse_size("0x720").is_err());
    }
}
