pub mod tone;

use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use log::warn;
use rodio::{OutputStream, Sink};

use tone::Tone;

const LOW_HZ: f32 = 620.0;
const HIGH_HZ: f32 = 1244.0;

/// The three audio cues of a reading: a low beep when the finger lands, a
/// shorter low beep partway through, and a high beep when the verdict is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Start,
    Ongoing,
    Complete,
}

impl Cue {
    fn tone(self) -> Tone {
        match self {
            Cue::Start => Tone::new(LOW_HZ, Duration::from_millis(650)),
            Cue::Ongoing => Tone::new(LOW_HZ, Duration::from_millis(350)),
            Cue::Complete => Tone::new(HIGH_HZ, Duration::from_millis(500)),
        }
    }
}

/// Playback seam between the session and whatever produces sound. Playback
/// problems stay on this side of the seam: implementations log and carry on.
pub trait CuePlayer: Send + Sync {
    fn play(&self, cue: Cue);
    fn stop_all(&self);
}

/// No-op player for muted runs.
pub struct SilentCues;

impl CuePlayer for SilentCues {
    fn play(&self, _cue: Cue) {}
    fn stop_all(&self) {}
}

enum AudioCommand {
    Play(Cue),
    StopAll,
    SetVolume(f32),
}

/// Cue playback through rodio. The output stream and sink are not `Send`, so
/// a dedicated thread owns them and takes commands over a channel; the
/// stream is opened lazily on the first cue and dropped again on `stop_all`.
#[derive(Clone)]
pub struct AudioEngineHandle {
    tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
}

impl AudioEngineHandle {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|_| anyhow::anyhow!("audio command channel poisoned"))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();

        // Dedicated thread holding the non-Send rodio objects.
        thread::Builder::new()
            .name("audio-engine".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;
                let mut volume: f32 = 1.0;

                fn ensure_sink(
                    stream: &mut Option<OutputStream>,
                    sink: &mut Option<Sink>,
                    volume: f32,
                ) -> Result<()> {
                    if sink.is_none() {
                        let (s, handle) = OutputStream::try_default()
                            .context("failed to open audio output stream")?;
                        let new_sink =
                            Sink::try_new(&handle).context("failed to create audio sink")?;
                        new_sink.set_volume(volume);
                        *stream = Some(s);
                        *sink = Some(new_sink);
                    }
                    Ok(())
                }

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AudioCommand::Play(cue) => {
                            if let Err(err) = ensure_sink(&mut _stream, &mut sink, volume) {
                                warn!("cue {:?} dropped: {:#}", cue, err);
                                continue;
                            }
                            if let Some(ref s) = sink {
                                s.append(cue.tone());
                            }
                        }
                        AudioCommand::StopAll => {
                            if let Some(old) = sink.take() {
                                old.stop();
                            }
                            _stream = None;
                        }
                        AudioCommand::SetVolume(v) => {
                            volume = v.clamp(0.0, 1.0);
                            if let Some(ref s) = sink {
                                s.set_volume(volume);
                            }
                        }
                    }
                }
            })
            .context("failed to spawn audio engine thread")?;

        let tx_clone = tx.clone();
        *guard = Some(tx);
        Ok(tx_clone)
    }

    pub fn set_volume(&self, volume: f32) {
        match self.ensure_thread() {
            Ok(tx) => {
                let _ = tx.send(AudioCommand::SetVolume(volume));
            }
            Err(err) => warn!("audio engine unavailable: {:#}", err),
        }
    }
}

impl Default for AudioEngineHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CuePlayer for AudioEngineHandle {
    fn play(&self, cue: Cue) {
        match self.ensure_thread() {
            Ok(tx) => {
                if tx.send(AudioCommand::Play(cue)).is_err() {
                    warn!("audio engine thread gone; cue {:?} dropped", cue);
                }
            }
            Err(err) => warn!("audio engine unavailable: {:#}", err),
        }
    }

    fn stop_all(&self) {
        // Never spin the engine up just to stop it.
        if let Ok(guard) = self.tx.lock() {
            if let Some(tx) = guard.as_ref() {
                let _ = tx.send(AudioCommand::StopAll);
            }
        }
    }
}
