use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use showreel::{
    AudioConfig, AudioPlayer, CpalAudioPlayer, FfmpegVideoOpener, FltkWindow, NullAudioPlayer,
    PlayerConfig, ResourceRoot, SequenceOutcome, Sequencer, media, missing_resources,
    parse_playlist_file,
};

#[derive(Parser, Debug)]
#[command(name = "showreel", version)]
#[command(about = "Play a sequence of video clips with crossfaded audio in a fixed-size window")]
struct Cli {
    /// Playlist file describing the clip sequence.
    #[arg(default_value = "videolist.txt")]
    playlist: PathBuf,

    /// Base directory for media lookups. Defaults to the executable's own
    /// directory when the playlist sits next to it (bundled layout), else
    /// the working directory.
    #[arg(long)]
    resources: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "showreel=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    if !media::is_ffmpeg_on_path() || !media::is_ffprobe_on_path() {
        bail!("ffmpeg and ffprobe are required on PATH for playback");
    }

    // Audio is best-effort: without an output device the whole sequence
    // simply plays silent.
    let mut audio: Box<dyn AudioPlayer> = match CpalAudioPlayer::init(AudioConfig::default()) {
        Ok(player) => Box::new(player),
        Err(e) => {
            warn!("audio output unavailable, playing silent: {e}");
            Box::new(NullAudioPlayer)
        }
    };

    let config = PlayerConfig::default();
    let root = ResourceRoot::locate(cli.resources.clone(), &cli.playlist);
    info!(base = %root.base().display(), "resource root");

    let jobs = parse_playlist_file(&root.resolve(&cli.playlist))?;
    if jobs.is_empty() {
        info!("the playlist is empty, nothing to play");
        return Ok(());
    }

    let missing = missing_resources(&jobs, &root);
    if !missing.is_empty() {
        for item in &missing {
            error!("{item}");
        }
        bail!(
            "{} missing resource(s); check the filenames in the playlist and try again",
            missing.len()
        );
    }

    let mut window = FltkWindow::new(
        config.canvas,
        concat!("showreel v", env!("CARGO_PKG_VERSION")),
    )?;

    let opener = FfmpegVideoOpener;
    let mut sequencer = Sequencer::new(config, root, &opener, audio.as_mut(), &mut window);
    match sequencer.play_all(&jobs)? {
        SequenceOutcome::Completed => info!("sequence finished"),
        SequenceOutcome::Aborted => info!("sequence aborted by user"),
    }

    // Window and audio stream tear down when they drop, on this path and on
    // every early error return above.
    Ok(())
}
