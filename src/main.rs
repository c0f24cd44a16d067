//! Terminal shell for the meter: a one-line needle display driven by the
//! keyboard. Space stands in for the finger, `d` for a down-right drag and
//! `g` for tipping the device on its side.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::{
    cursor, execute,
    style::Print,
    terminal::{self, ClearType},
};
use log::warn;
use tokio::sync::mpsc;
use tokio::time::sleep;

use fauxmeter::{
    format_readout, AudioEngineHandle, CuePlayer, GravitySource, GravityVector, MeterConfig,
    MeterController, PanelEvent, SilentCues, TouchPoint, BAD_READ_LABEL, GIVEN_LABEL,
};

#[derive(Parser, Debug)]
#[command(name = "fauxmeter", version)]
#[command(about = "Hold the sensor, listen for the beeps, see how much you give")]
struct Args {
    /// Seed the needle for a repeatable session
    #[arg(long)]
    seed: Option<u64>,

    /// Milliseconds between easing ticks
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Cue volume, 0.0 to 1.0
    #[arg(long, default_value = "1.0")]
    volume: f32,

    /// No cues at all
    #[arg(long)]
    mute: bool,

    /// Pretend the device has no gravity sensor and use the drag heuristic
    #[arg(long)]
    no_sensor: bool,

    /// Emit panel events as JSON lines instead of drawing the needle
    #[arg(long)]
    json: bool,

    /// Run a scripted tour of the three endings and exit
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if args.demo || args.json {
            log::LevelFilter::Info
        } else {
            // The one-line display owns the terminal; keep stderr quiet.
            log::LevelFilter::Warn
        })
        .init();

    let mut config = MeterConfig::from_env();
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(ms) = args.tick_ms {
        config.tick_interval = Duration::from_millis(ms);
    }

    if args.demo {
        run_demo(&args, config).await
    } else {
        run_interactive(&args, config).await
    }
}

/// Console stand-in for the device attitude. `g` flips it on its side; the
/// gravity watch sees whatever the attitude is when it takes its sample.
#[derive(Default)]
struct SimulatedTilt {
    tipped: AtomicBool,
}

impl SimulatedTilt {
    /// Returns the new attitude, true meaning tipped.
    fn toggle(&self) -> bool {
        !self.tipped.fetch_xor(true, Ordering::Relaxed)
    }
}

impl GravitySource for SimulatedTilt {
    fn sample(&self) -> Option<GravityVector> {
        Some(if self.tipped.load(Ordering::Relaxed) {
            GravityVector {
                x: -3.4,
                y: 0.6,
                z: 9.1,
            }
        } else {
            GravityVector {
                x: 0.2,
                y: 0.3,
                z: 9.8,
            }
        })
    }
}

fn build_cues(args: &Args) -> Arc<dyn CuePlayer> {
    if args.mute {
        Arc::new(SilentCues)
    } else {
        let engine = AudioEngineHandle::new();
        engine.set_volume(args.volume.clamp(0.0, 1.0));
        Arc::new(engine)
    }
}

async fn run_interactive(args: &Args, config: MeterConfig) -> Result<()> {
    let (panel_tx, mut panel_rx) = mpsc::unbounded_channel();
    let tilt = Arc::new(SimulatedTilt::default());
    let gravity: Option<Arc<dyn GravitySource>> = if args.no_sensor {
        None
    } else {
        Some(tilt.clone())
    };
    let controller = MeterController::new(config, build_cues(args), gravity, panel_tx);

    println!("fauxmeter {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("  space   press the sensor / lift your finger");
    println!("  d       drag down-right while pressed");
    if !args.no_sensor {
        println!("  g       tip the device on its side");
    }
    println!("  q, esc  quit");
    println!();

    terminal::enable_raw_mode()?;
    let (key_tx, mut key_rx) = mpsc::unbounded_channel();
    let reader = thread::Builder::new()
        .name("key-input".to_string())
        .spawn(move || key_reader(key_tx))?;

    let mut screen = Screen::default();
    let mut finger_down = false;
    let mut swipe = TouchPoint { x: 0.0, y: 0.0 };
    if !args.json {
        screen.redraw()?;
    }

    let outcome: Result<()> = async {
        loop {
            tokio::select! {
                maybe_event = panel_rx.recv() => {
                    let Some(event) = maybe_event else { break };
                    if args.json {
                        print_json_line(&event)?;
                    } else {
                        screen.apply(&event);
                        screen.redraw()?;
                    }
                }
                maybe_key = key_rx.recv() => {
                    let Some(key) = maybe_key else { break };
                    if is_exit(&key) {
                        break;
                    }
                    match key.code {
                        KeyCode::Char(' ') => {
                            if finger_down {
                                controller.release().await?;
                            } else {
                                controller.press().await?;
                            }
                            finger_down = !finger_down;
                            screen.finger_down = finger_down;
                            if !args.json {
                                screen.redraw()?;
                            }
                        }
                        KeyCode::Char('d') if finger_down => {
                            // One keypress is one short down-right swipe.
                            for _ in 0..6 {
                                swipe.x += 3.0;
                                swipe.y += 4.0;
                                controller.drag(swipe).await;
                            }
                        }
                        KeyCode::Char('g') if !args.no_sensor => {
                            screen.tipped = tilt.toggle();
                            if !args.json {
                                screen.redraw()?;
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }
    .await;

    let shutdown = controller.shutdown().await;
    let _ = terminal::disable_raw_mode();
    drop(key_rx);
    let _ = reader.join();
    println!();
    outcome.and(shutdown)
}

/// Scripted run for a quick look (and for muted smoke checks): one steady
/// hold, one early lift, one forced near-zero.
async fn run_demo(args: &Args, config: MeterConfig) -> Result<()> {
    let (panel_tx, panel_rx) = mpsc::unbounded_channel();
    let tilt = Arc::new(SimulatedTilt::default());
    let gravity: Option<Arc<dyn GravitySource>> = if args.no_sensor {
        None
    } else {
        Some(tilt.clone())
    };
    let controller = MeterController::new(config.clone(), build_cues(args), gravity, panel_tx);

    let json = args.json;
    let printer = tokio::spawn(print_events(panel_rx, json));

    // Headers go to stderr in JSON mode so stdout stays machine-readable.
    let section = |title: &str| {
        if json {
            eprintln!("{title}");
        } else {
            println!("{title}");
        }
    };
    let reading_span = config.tick_interval * (config.tick_budget + 2);

    section("-- a steady hold --");
    controller.press().await?;
    sleep(reading_span).await;

    section("-- lifting the finger early --");
    controller.press().await?;
    sleep(config.tick_interval * 3).await;
    controller.release().await?;
    sleep(config.tick_interval).await;

    if args.no_sensor {
        section("-- dragging the needle down and right --");
        controller.press().await?;
        for step in 0..12 {
            controller
                .drag(TouchPoint {
                    x: (step * 3) as f32,
                    y: (step * 4) as f32,
                })
                .await;
        }
        sleep(reading_span).await;
    } else {
        section("-- tipped on its side --");
        tilt.toggle();
        controller.press().await?;
        sleep(reading_span).await;
    }

    controller.shutdown().await?;
    drop(controller);
    printer.await?;
    Ok(())
}

async fn print_events(mut rx: mpsc::UnboundedReceiver<PanelEvent>, json: bool) {
    while let Some(event) = rx.recv().await {
        if json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(err) => warn!("unprintable panel event: {err}"),
            }
        } else {
            match event {
                PanelEvent::Readout { value } => println!("  {}", format_readout(value)),
                PanelEvent::BadRead => println!("  {BAD_READ_LABEL}"),
                PanelEvent::GivenLabel { visible: true } => println!("  {GIVEN_LABEL}"),
                PanelEvent::GivenLabel { visible: false } => {}
            }
        }
    }
}

fn print_json_line(event: &PanelEvent) -> Result<()> {
    let line = serde_json::to_string(event)?;
    let mut out = io::stdout();
    // Raw mode needs the explicit carriage return.
    write!(out, "{line}\r\n")?;
    out.flush()?;
    Ok(())
}

/// Blocking crossterm poll loop on its own thread; key presses go out over
/// the channel, and a closed channel shuts the loop down.
fn key_reader(tx: mpsc::UnboundedSender<KeyEvent>) {
    loop {
        match event::poll(Duration::from_millis(50)) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    if tx.send(key).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            },
            Ok(false) => {
                if tx.is_closed() {
                    break;
                }
            }
            Err(_) => break,
        }
    }
}

fn is_exit(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => true,
        KeyCode::Char('q') | KeyCode::Esc => true,
        _ => false,
    }
}

/// The one-line needle display.
#[derive(Default)]
struct Screen {
    value: Option<f64>,
    given_visible: bool,
    bad_read: bool,
    finger_down: bool,
    tipped: bool,
}

impl Screen {
    fn apply(&mut self, event: &PanelEvent) {
        match event {
            PanelEvent::Readout { value } => {
                self.value = Some(*value);
                self.bad_read = false;
            }
            PanelEvent::BadRead => self.bad_read = true,
            PanelEvent::GivenLabel { visible } => self.given_visible = *visible,
        }
    }

    fn line(&self) -> String {
        let reading = if self.bad_read {
            BAD_READ_LABEL.to_string()
        } else {
            match self.value {
                Some(value) => format_readout(value),
                None => "--".to_string(),
            }
        };
        let hand = if self.finger_down {
            "[finger down]"
        } else {
            "[finger up]  "
        };
        let mut line = format!("{hand} needle: {reading:<10}");
        if self.given_visible {
            line.push_str(&format!("  {GIVEN_LABEL}"));
        }
        if self.tipped {
            line.push_str("  (tipped)");
        }
        line
    }

    fn redraw(&self) -> Result<()> {
        let mut out = io::stdout();
        execute!(
            out,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine),
            Print(self.line())
        )?;
        Ok(())
    }
}
