use celpaint::cli::Args;
use celpaint::config::{self, EngineConfig};
use celpaint::core::{EraseScope, Session};
use celpaint::entities::{ColorKey, StructuralLayer};

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use log::{debug, info, warn};

fn main() -> Result<()> {
    let args = Args::parse();

    // Create path configuration from CLI args and environment
    let path_config = config::PathConfig::from_env_and_cli(args.config_dir.clone());

    if let Err(e) = config::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }

    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .as_ref()
            .cloned()
            .unwrap_or_else(|| config::data_file(config::LOG_FILE, &path_config));

        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging (respects RUST_LOG if set)
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }

    debug!("Command-line args: {:?}", args);

    let config_path = config::config_file(config::CONFIG_FILE, &path_config);
    info!("Config path: {}", config_path.display());
    let mut engine_config = EngineConfig::load_or_default(&config_path);

    let line_art = image::open(&args.line_art)
        .with_context(|| format!("Failed to open line art: {}", args.line_art.display()))?
        .to_rgba8();
    let (width, height) = (line_art.width() as usize, line_art.height() as usize);
    info!("Line art: {} ({}x{})", args.line_art.display(), width, height);

    // Canvas size follows the input
    engine_config.content_width = width;
    engine_config.content_height = height;
    if let Some(gap) = args.gap_px {
        engine_config.gap_px = gap;
    }

    let mut session = Session::new(engine_config);
    session
        .project
        .load_cel(StructuralLayer::Line, ColorKey::BLACK, 0, width, height, line_art.into_raw())?;

    let layer = StructuralLayer::parse(&args.layer)
        .ok_or_else(|| anyhow!("Unknown layer '{}' (fill, color, shade, line, sketch)", args.layer))?;
    let color = match &args.color {
        Some(s) => Some(ColorKey::parse(s).ok_or_else(|| anyhow!("Unparseable color '{}'", s))?),
        None => None,
    };

    let changed = if args.whole_cel {
        session.fill_whole_cel(0)
    } else {
        if args.seeds.is_empty() {
            bail!("No seeds given (use --seed X,Y or --whole)");
        }
        if args.erase {
            let scope = if args.all_layers {
                EraseScope::All
            } else {
                EraseScope::Layer(layer)
            };
            session.erase(0, &args.seeds, scope, color)
        } else {
            let color = color.unwrap_or_else(|| session.context.active_color(layer));
            session.fill(0, &args.seeds, layer.into(), Some(color))
        }
    };

    if !changed {
        warn!("Nothing changed");
    }

    let composite = session.composite(0);
    let output = image::RgbaImage::from_raw(width as u32, height as u32, composite.into_raw())
        .ok_or_else(|| anyhow!("Composite size mismatch"))?;
    output
        .save(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    info!("Wrote {}", args.output.display());

    println!("{}", if changed { "changed" } else { "unchanged" });
    Ok(())
}
