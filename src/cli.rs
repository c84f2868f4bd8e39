use clap::Parser;
use std::path::PathBuf;

use crate::core::Point;

// Build version with target info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Image:  image 0.25 (PNG)\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Gap-tolerant flood fill for layered cel animation
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Line art PNG loaded into the LINE layer (sets the canvas size)
    #[arg(value_name = "LINE_PNG")]
    pub line_art: PathBuf,

    /// Seed point in pixels, "X,Y" (can be specified multiple times)
    #[arg(short = 's', long = "seed", value_name = "X,Y", value_parser = parse_seed)]
    pub seeds: Vec<Point>,

    /// Fill color (#RRGGBB, #RGB, rgb(r,g,b)); defaults to the layer's active color
    #[arg(short = 'C', long = "color", value_name = "COLOR")]
    pub color: Option<String>,

    /// Target structural layer: fill, color, shade, line, sketch
    #[arg(short = 'L', long = "layer", value_name = "LAYER", default_value = "fill")]
    pub layer: String,

    /// Gap tolerance in pixels (overrides config)
    #[arg(short = 'g', long = "gap", value_name = "PX")]
    pub gap_px: Option<u32>,

    /// Erase at the seeds instead of filling
    #[arg(short = 'e', long = "erase")]
    pub erase: bool,

    /// With --erase: clear every structural layer, not just --layer
    #[arg(long = "all-layers", requires = "erase")]
    pub all_layers: bool,

    /// Fill every enclosed region of the cel into FILL (ignores seeds)
    #[arg(short = 'w', long = "whole", conflicts_with = "erase")]
    pub whole_cel: bool,

    /// Output PNG with the composited cel
    #[arg(short = 'o', long = "output", value_name = "FILE", default_value = "celpaint_out.png")]
    pub output: PathBuf,

    /// Enable debug logging to file (default: celpaint.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

/// Parse "X,Y" into a seed point.
pub fn parse_seed(s: &str) -> Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{}'", s))?;
    let x: f32 = x.trim().parse().map_err(|_| format!("bad X in '{}'", s))?;
    let y: f32 = y.trim().parse().map_err(|_| format!("bad Y in '{}'", s))?;
    if !x.is_finite() || !y.is_finite() {
        return Err(format!("non-finite seed '{}'", s));
    }
    Ok(Point::new(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seed() {
        assert_eq!(parse_seed("12,34").unwrap(), Point::new(12.0, 34.0));
        assert_eq!(parse_seed(" 1.5 , 2 ").unwrap(), Point::new(1.5, 2.0));
        assert!(parse_seed("12").is_err());
        assert!(parse_seed("a,b").is_err());
        assert!(parse_seed("inf,0").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "celpaint", "line.png", "-s", "3,4", "--seed", "5,6", "-C", "#ff0000", "-g", "0", "-vv",
        ])
        .unwrap();
        assert_eq!(args.seeds.len(), 2);
        assert_eq!(args.color.as_deref(), Some("#ff0000"));
        assert_eq!(args.layer, "fill");
        assert_eq!(args.gap_px, Some(0));
        assert_eq!(args.verbosity, 2);
        assert!(args.log_file.is_none());

        assert!(Args::try_parse_from(["celpaint", "line.png", "--whole", "--erase"]).is_err());
        assert!(Args::try_parse_from(["celpaint", "line.png", "--all-layers"]).is_err());
    }
}
