//! Line-oriented control of the engine from stdin.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use zonesync_core::{
    format_time, AlbumRef, AudioFormat, PlaybackController, PlaybackQuality, RequestOutcome,
    SessionStore, TrackOrigin,
};

/// One parsed console command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    Stop,
    Next,
    Previous,
    Seek(f64),
    Volume(f64),
    Jump(usize),
    Remove(usize),
    PlayAlbum(AlbumRef),
    QueueAlbum(AlbumRef),
    Zone(u64),
    Session(u64),
    Quality(AudioFormat),
    Status,
}

impl Command {
    /// Parses `input`, returning a usage message on failure.
    pub fn parse(input: &str) -> Result<Self, String> {
        let mut parts = input.split_whitespace();
        let verb = parts.next().ok_or_else(|| "empty command".to_string())?;
        let arg = parts.next();

        let command = match verb {
            "play" => Self::Play,
            "pause" => Self::Pause,
            "stop" => Self::Stop,
            "next" => Self::Next,
            "prev" | "previous" => Self::Previous,
            "status" => Self::Status,
            "seek" => Self::Seek(number(arg, "seek <seconds>")?),
            "vol" | "volume" => Self::Volume(number(arg, "volume <0..1>")?),
            "jump" => Self::Jump(number(arg, "jump <index>")?),
            "remove" => Self::Remove(number(arg, "remove <index>")?),
            "zone" => Self::Zone(number(arg, "zone <id>")?),
            "session" => Self::Session(number(arg, "session <id>")?),
            "album" => Self::PlayAlbum(album(arg)?),
            "queue" => Self::QueueAlbum(album(arg)?),
            "quality" => Self::Quality(audio_format(arg)?),
            other => return Err(format!("unknown command '{other}'")),
        };
        Ok(command)
    }
}

fn number<T: std::str::FromStr>(arg: Option<&str>, usage: &str) -> Result<T, String> {
    arg.and_then(|a| a.parse().ok())
        .ok_or_else(|| format!("usage: {usage}"))
}

fn album(arg: Option<&str>) -> Result<AlbumRef, String> {
    const USAGE: &str = "usage: album|queue <library|tidal|qobuz|yt>:<album id>";
    let (origin, id) = arg.and_then(|a| a.split_once(':')).ok_or(USAGE)?;
    let origin = match origin.to_ascii_lowercase().as_str() {
        "library" => TrackOrigin::Library,
        "tidal" => TrackOrigin::Tidal,
        "qobuz" => TrackOrigin::Qobuz,
        "yt" => TrackOrigin::Yt,
        _ => return Err(USAGE.to_string()),
    };
    Ok(AlbumRef::new(origin, id))
}

fn audio_format(arg: Option<&str>) -> Result<AudioFormat, String> {
    match arg.map(str::to_ascii_lowercase).as_deref() {
        Some("aac") => Ok(AudioFormat::Aac),
        Some("flac") => Ok(AudioFormat::Flac),
        Some("mp3") => Ok(AudioFormat::Mp3),
        Some("opus") => Ok(AudioFormat::Opus),
        Some("source") => Ok(AudioFormat::Source),
        _ => Err("usage: quality <aac|flac|mp3|opus|source>".to_string()),
    }
}

/// Reads commands from stdin until EOF or cancellation.
pub async fn run(
    controller: Arc<PlaybackController>,
    store: Arc<SessionStore>,
    cancel: CancellationToken,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::warn!("[Console] Failed to read stdin: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match Command::parse(&line) {
            Ok(command) => execute(&controller, &store, command).await,
            Err(usage) => println!("{usage}"),
        }
    }
    log::debug!("[Console] Stopped");
}

async fn execute(controller: &PlaybackController, store: &SessionStore, command: Command) {
    let outcome = match command {
        Command::Play => controller.play().await,
        Command::Pause => controller.pause().await,
        Command::Stop => controller.stop().await,
        Command::Next => controller.next_track().await,
        Command::Previous => controller.previous_track().await,
        Command::Seek(seconds) => controller.seek(seconds, true).await,
        Command::Volume(volume) => controller.set_volume(volume).await,
        Command::Jump(index) => controller.play_from_playlist_position(index).await,
        Command::Remove(index) => controller.remove_track_from_playlist(index).await,
        Command::Zone(id) => controller.set_current_audio_zone(id).await,
        Command::Quality(format) => {
            controller
                .set_playback_quality(PlaybackQuality::new(format))
                .await
        }
        Command::PlayAlbum(album) => match controller.play_album(&album).await {
            Ok(outcome) => outcome,
            Err(e) => {
                println!("{e}");
                return;
            }
        },
        Command::QueueAlbum(album) => match controller.add_album_to_queue(&album).await {
            Ok(outcome) => outcome,
            Err(e) => {
                println!("{e}");
                return;
            }
        },
        Command::Session(id) => {
            controller.set_current_session(id);
            print_status(store);
            return;
        }
        Command::Status => {
            print_status(store);
            return;
        }
    };
    match outcome {
        RequestOutcome::Ignored => println!("nothing to do"),
        RequestOutcome::SendFailed(e) => println!("not sent: {e}"),
        RequestOutcome::Applied { .. } => {}
    }
}

fn print_status(store: &SessionStore) {
    let client = store.client_state();
    let session = store
        .current_session()
        .map(|s| format!("{} ({})", s.name, s.session_id))
        .unwrap_or_else(|| "none".to_string());
    let zone = store
        .current_zone()
        .map(|z| z.name)
        .unwrap_or_else(|| "none".to_string());
    println!("session: {session}  zone: {zone}");
    match client.current_track {
        Some(ref track) => println!(
            "track {}/{}: {} - {}  [{} / {}]",
            client.position.map_or(0, |p| p + 1),
            client.playlist.len(),
            track.artist,
            track.title,
            format_time(client.displayed_seek()),
            format_time(client.current_track_length),
        ),
        None => println!("no track selected"),
    }
}
