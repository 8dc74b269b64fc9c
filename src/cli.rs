use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use midi_processor::config::{self, Config};
use midi_processor::midi::{
    self, Event, EventKind, MidiError, MidiEventListener, MidiFile, TempoMap,
};
use midi_processor::player::{self, PlayRange, SongPlayer};

/// Tempo-aware MIDI playback and note extraction
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a config.toml (defaults to ./config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a MIDI file in real time, printing every dispatched event
    Play(PlayArgs),

    /// Extract notes with start times and durations
    Notes(NotesArgs),

    /// Show resolution, tracks and tempo map of a MIDI file
    Info(InfoArgs),
}

#[derive(Parser)]
struct PlayArgs {
    /// Path to the input MIDI file
    #[arg(required = true)]
    midi_file: String,

    /// Seek to this position (seconds) before playing
    #[arg(long)]
    from: Option<f64>,

    /// Stop once this position (seconds) is reached
    #[arg(long)]
    until: Option<f64>,

    /// Also print the raw channel message bytes
    #[arg(short, long)]
    raw: bool,
}

#[derive(Parser)]
struct NotesArgs {
    /// Path to the input MIDI file
    #[arg(required = true)]
    midi_file: String,

    /// Print notes as JSON instead of a table
    #[arg(short, long)]
    json: bool,

    /// Write notes as JSON to this file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Parser)]
struct InfoArgs {
    /// Path to the input MIDI file
    #[arg(required = true)]
    midi_file: String,
}

/// Prints dispatched events to stdout
struct PrintingListener {
    raw: bool,
    resolution: u16,
}

impl MidiEventListener for PrintingListener {
    fn on_event(&mut self, event: &Event) {
        let beat = event.tick as f64 / self.resolution as f64;
        match (self.raw, event.short_message()) {
            (true, Some(message)) => {
                let bytes: Vec<String> = message
                    .to_bytes()
                    .iter()
                    .map(|b| format!("{:02X}", b))
                    .collect();
                println!("{:>8} [{:>8.2}] {}  <{}>", event.tick, beat, event.kind, bytes.join(" "));
            }
            _ => println!("{:>8} [{:>8.2}] {}", event.tick, beat, event.kind),
        }
    }

    fn on_start(&mut self, from_beginning: bool) {
        if from_beginning {
            println!("Playback started");
        } else {
            println!("Playback resumed");
        }
    }

    fn on_stop(&mut self, finished: bool) {
        if finished {
            println!("Playback finished");
        } else {
            println!("Playback stopped");
        }
    }
}

fn load_file(path: &str) -> Result<MidiFile, MidiError> {
    // Check if MIDI file exists with a clear error message
    if !Path::new(path).exists() {
        return Err(MidiError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("MIDI file not found: {}", path),
        )));
    }
    midi::load_midi_file(path)
}

fn run_play_command(args: &PlayArgs, config: &Config) -> Result<(), MidiError> {
    let file = load_file(&args.midi_file)?;
    let duration = player::song_duration_ms(&file, config.playback.default_mpqn);
    println!("Playing {} ({})", args.midi_file, player::format_time(duration));

    let listener = PrintingListener {
        raw: args.raw,
        resolution: file.resolution(),
    };
    let range = PlayRange {
        from: args.from,
        until: args.until,
    };

    SongPlayer::new(config.playback.clone()).play(&file, listener, range, || false)?;
    Ok(())
}

fn run_notes_command(args: &NotesArgs, config: &Config) -> Result<(), MidiError> {
    let file = load_file(&args.midi_file)?;
    let notes = midi::extract_notes_with_tempo(&file, config.playback.default_mpqn);

    if let Some(output) = &args.output {
        midi::export_notes(&notes, output)?;
        println!("Wrote {} notes to {}", notes.len(), output.display());
    } else if args.json {
        let json = midi::notes_to_json(&notes)?;
        io::stdout().write_all(json.as_bytes())?;
        println!();
    } else {
        for line in midi::notes_to_table(&notes) {
            println!("{}", line);
        }
    }

    Ok(())
}

fn run_info_command(args: &InfoArgs, config: &Config) -> Result<(), MidiError> {
    let file = load_file(&args.midi_file)?;
    let tempo_map = TempoMap::from_track(
        file.tracks().first(),
        file.resolution(),
        config.playback.default_mpqn,
    );

    println!("MIDI File Information:");
    println!("----------------------");
    println!("Resolution: {} ticks per quarter note", file.resolution());
    println!(
        "Duration: {}",
        player::format_time(player::song_duration_ms(&file, config.playback.default_mpqn))
    );
    for (index, track) in file.tracks().iter().enumerate() {
        let name = track.events().iter().find_map(|event| match &event.kind {
            EventKind::Text {
                kind: midi::TextKind::TrackName,
                text,
            } => Some(text.as_str()),
            _ => None,
        });
        println!(
            "Track {}: {} events {}",
            index,
            track.len(),
            name.map(|n| format!("({})", n)).unwrap_or_default()
        );
    }

    println!("Tempo map:");
    for change in tempo_map.breakpoints() {
        println!(
            "  tick {:>8}  {:>7} mpqn  {:>7.2} BPM  at {}",
            change.tick,
            change.tempo,
            midi::mpqn_to_bpm(change.tempo),
            player::format_time(midi::ticks_to_ms(change.tick, &tempo_map))
        );
    }

    Ok(())
}

fn run() -> Result<(), MidiError> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };

    match &cli.command {
        Commands::Play(args) => run_play_command(args, &config)?,
        Commands::Notes(args) => run_notes_command(args, &config)?,
        Commands::Info(args) => run_info_command(args, &config)?,
    }

    Ok(())
}

fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "midi_processor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    if let Err(err) = run() {
        eprintln!("\nERROR: {}\n", err);
        if let MidiError::Io(ref io_err) = err {
            if io_err.kind() == io::ErrorKind::NotFound {
                eprintln!("Please check that:");
                eprintln!("1. The file path is correct");
                eprintln!("2. The file exists");
                eprintln!("3. You have permission to read the file");
            }
        }
        process::exit(1);
    }
}
