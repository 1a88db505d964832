use crossterm::{
    cursor::{Hide, Show},
    event::{self, Event},
    execute,
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{error, info};
use std::error::Error;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write, stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

mod app;
mod arena;
mod audio;
mod canvas;
mod clock;
mod config;
mod effects;
mod glyphs;
mod overlay;
mod prediction;

use app::{App, Control};
use audio::AudioBackend;
use clap::Parser;
use config::{Args, Config};
use prediction::{GeminiOracle, Oracle};

const FIXED_DT: f32 = 1.0 / 60.0;

fn init_logging(config: &Config) -> Result<(), Box<dyn Error>> {
    let file = OpenOptions::new().create(true).append(true).open(&config.log_file)?;
    env_logger::Builder::new()
        .filter_level(config.log_level)
        .parse_default_env()
        .target(env_logger::Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init()?;
    Ok(())
}

#[cfg(feature = "audio")]
fn audio_backend() -> Box<dyn AudioBackend> {
    Box::new(audio::RodioBackend::new())
}

#[cfg(not(feature = "audio"))]
fn audio_backend() -> Box<dyn AudioBackend> {
    Box::new(audio::NullBackend)
}

fn event_loop<W: Write>(app: &mut App, out: &mut W) -> io::Result<()> {
    let mut last_frame = Instant::now();
    let mut accumulator = 0.0f32;

    loop {
        if event::poll(Duration::from_millis(1))? {
            match event::read()? {
                Event::Key(key) => {
                    if app.handle_key(key, clock::now_ms()) == Control::Quit {
                        break;
                    }
                }
                Event::Resize(cols, rows) => {
                    app.resize(cols, rows);
                    execute!(out, Clear(ClearType::All))?;
                }
                _ => {}
            }
        }

        let now = Instant::now();
        let frame_time = now.duration_since(last_frame).as_secs_f32();
        last_frame = now;

        accumulator += frame_time;
        if accumulator > FIXED_DT * 3.0 {
            accumulator = FIXED_DT * 3.0;
        }

        // Transitions are applied before the frame that shows them.
        let now_ms = clock::now_ms();
        app.tick(now_ms);

        while accumulator >= FIXED_DT {
            app.update(FIXED_DT);
            accumulator -= FIXED_DT;
        }

        app.render(out, now_ms)?;
    }

    Ok(())
}

fn run(app: &mut App) -> io::Result<()> {
    let mut stdout = BufWriter::with_capacity(1024 * 64, stdout());

    terminal::enable_raw_mode()?;
    let result = execute!(stdout, EnterAlternateScreen, Hide, Clear(ClearType::All))
        .and_then(|()| event_loop(app, &mut stdout));

    let restored = execute!(stdout, Show, LeaveAlternateScreen);
    let raw_mode = terminal::disable_raw_mode();
    result.and(restored).and(raw_mode)
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config = match Config::from_args(args, clock::now_ms()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("finale: {e}");
            std::process::exit(1);
        }
    };
    init_logging(&config)?;
    info!(
        "finale {} starting, target {:?}, lead {:?}, poll {:?}",
        env!("CARGO_PKG_VERSION"),
        config.target,
        config.lead,
        config.poll
    );

    let oracle: Arc<dyn Oracle> = Arc::new(GeminiOracle::new(config.api_key.clone(), config.model.clone()));
    let (cols, rows) = terminal::size()?;
    let mut app = App::new(&config, oracle, audio_backend(), cols, rows);

    if let Err(e) = run(&mut app) {
        error!("terminal loop failed: {e}");
        return Err(e.into());
    }
    info!("finale exiting");
    Ok(())
}
