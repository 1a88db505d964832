//! Background music.
//!
//! A playlist is a fixed, ordered list of sources. Starting playback tries
//! them in order with a single backend handle and settles on the first one
//! that loads. When every source fails the player goes quiet for good; when
//! the backend refuses to start, playback waits for a manual toggle.

use log::{error, info, warn};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_TRACK: &str = "luck.mp3";
pub const VOLUME: f32 = 0.5;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output: {0}")]
    NoOutput(String),
    #[error("could not open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not decode {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },
    #[error("playback refused: {0}")]
    Refused(String),
}

pub trait AudioBackend {
    /// Prepares `source` for looped playback, replacing anything loaded
    /// before. Does not start playing.
    fn load(&mut self, source: &Path) -> Result<(), AudioError>;
    fn play(&mut self) -> Result<(), AudioError>;
    fn pause(&mut self);
}

/// Backend for builds without audio support; it accepts nothing.
pub struct NullBackend;

impl AudioBackend for NullBackend {
    fn load(&mut self, _source: &Path) -> Result<(), AudioError> {
        Err(AudioError::NoOutput("built without the `audio` feature".into()))
    }

    fn play(&mut self) -> Result<(), AudioError> {
        Err(AudioError::NoOutput("built without the `audio` feature".into()))
    }

    fn pause(&mut self) {}
}

#[cfg(feature = "audio")]
pub use rodio_backend::RodioBackend;

#[cfg(feature = "audio")]
mod rodio_backend {
    use super::{AudioBackend, AudioError, VOLUME};
    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
    use std::fs::File;
    use std::io::BufReader;
    use std::path::Path;

    #[derive(Default)]
    pub struct RodioBackend {
        // The stream must outlive every sink created from its handle.
        output: Option<(OutputStream, OutputStreamHandle)>,
        sink: Option<Sink>,
    }

    impl RodioBackend {
        pub fn new() -> Self {
            Self::default()
        }

        fn handle(&mut self) -> Result<&OutputStreamHandle, AudioError> {
            if self.output.is_none() {
                let output = OutputStream::try_default().map_err(|e| AudioError::NoOutput(e.to_string()))?;
                self.output = Some(output);
            }
            match &self.output {
                Some((_, handle)) => Ok(handle),
                None => Err(AudioError::NoOutput("output stream unavailable".into())),
            }
        }
    }

    impl AudioBackend for RodioBackend {
        fn load(&mut self, source: &Path) -> Result<(), AudioError> {
            if let Some(old) = self.sink.take() {
                old.stop();
            }
            let file = File::open(source).map_err(|e| AudioError::Open {
                path: source.to_path_buf(),
                source: e,
            })?;
            let decoder = Decoder::new_looped(BufReader::new(file)).map_err(|e| AudioError::Decode {
                path: source.to_path_buf(),
                reason: e.to_string(),
            })?;
            let sink = Sink::try_new(self.handle()?).map_err(|e| AudioError::NoOutput(e.to_string()))?;
            sink.pause();
            sink.set_volume(VOLUME);
            sink.append(decoder);
            self.sink = Some(sink);
            Ok(())
        }

        fn play(&mut self) -> Result<(), AudioError> {
            match &self.sink {
                Some(sink) => {
                    sink.play();
                    Ok(())
                }
                None => Err(AudioError::Refused("nothing loaded".into())),
            }
        }

        fn pause(&mut self) {
            if let Some(sink) = &self.sink {
                sink.pause();
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Nothing attempted yet.
    Idle,
    Playing,
    /// Loaded but not playing; a toggle resumes.
    Paused,
    /// Every source failed to load. Silent, toggling does nothing.
    Exhausted,
}

pub struct MusicPlayer {
    backend: Box<dyn AudioBackend>,
    sources: Vec<PathBuf>,
    index: usize,
    state: PlaybackState,
}

impl MusicPlayer {
    pub fn new(backend: Box<dyn AudioBackend>, sources: Vec<PathBuf>) -> Self {
        Self { backend, sources, index: 0, state: PlaybackState::Idle }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    #[cfg(test)]
    pub fn current_source(&self) -> Option<&Path> {
        match self.state {
            PlaybackState::Playing | PlaybackState::Paused => self.sources.get(self.index).map(PathBuf::as_path),
            PlaybackState::Idle | PlaybackState::Exhausted => None,
        }
    }

    /// Loads the first source that works and tries to start it. Only acts
    /// from [`PlaybackState::Idle`].
    pub fn start(&mut self) -> PlaybackState {
        if self.state != PlaybackState::Idle {
            return self.state;
        }

        while let Some(source) = self.sources.get(self.index) {
            info!("Initializing music player. Trying track [{}]: {}", self.index, source.display());
            match self.backend.load(source) {
                Ok(()) => break,
                Err(e) => {
                    warn!("Track failed to load: {e}");
                    self.index += 1;
                    if self.index < self.sources.len() {
                        info!("Switching to next available source...");
                    }
                }
            }
        }

        if self.index >= self.sources.len() {
            error!("All music sources failed.");
            self.state = PlaybackState::Exhausted;
            return self.state;
        }

        self.state = match self.backend.play() {
            Ok(()) => {
                info!("Playing: {}", self.sources[self.index].display());
                PlaybackState::Playing
            }
            Err(e) => {
                info!("Autoplay prevented ({e}). Waiting for a manual toggle.");
                PlaybackState::Paused
            }
        };
        self.state
    }

    pub fn toggle(&mut self) -> PlaybackState {
        match self.state {
            PlaybackState::Idle => return self.start(),
            PlaybackState::Exhausted => {}
            PlaybackState::Playing => {
                self.backend.pause();
                self.state = PlaybackState::Paused;
            }
            PlaybackState::Paused => match self.backend.play() {
                Ok(()) => self.state = PlaybackState::Playing,
                Err(e) => warn!("Could not resume music: {e}"),
            },
        }
        self.state
    }
}
