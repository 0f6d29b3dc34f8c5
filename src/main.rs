// Demo driver: records a synthetic test pattern and saves a clip on demand.
//
//   loopcam [--reencode] [config.json] [library-dir]
//
// A missing config file is created with the defaults.
//
// Commands on stdin: save, background, foreground, quit

use anyhow::Context;
use async_trait::async_trait;
use loopcam_lib::capture::{AuthorizationStatus, CameraAuthorization, FfmpegCamera};
use loopcam_lib::config::{load_config, save_config, LoopConfig};
use loopcam_lib::export::FfmpegEngine;
use loopcam_lib::library::{DirectoryLibrary, TempDirStore};
use loopcam_lib::{Collaborators, RecorderEvent, RecordingController};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Desktop capture has no permission prompt
struct DesktopAuthorization;

#[async_trait]
impl CameraAuthorization for DesktopAuthorization {
    fn status(&self) -> AuthorizationStatus {
        AuthorizationStatus::Authorized
    }

    async fn request_access(&self) -> bool {
        true
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    loopcam_lib::init_tracing();
    tracing::info!("Starting Loopcam v{}", env!("CARGO_PKG_VERSION"));

    let (flags, positional): (Vec<String>, Vec<String>) =
        std::env::args().skip(1).partition(|arg| arg.starts_with("--"));
    let reencode = flags.iter().any(|flag| flag == "--reencode");
    let mut args = positional.into_iter();

    let config = match args.next().map(PathBuf::from) {
        Some(path) => {
            let config = load_config(&path)
                .with_context(|| format!("Failed to load config from {:?}", path))?;
            if !path.exists() {
                save_config(&config, &path)
                    .with_context(|| format!("Failed to write config to {:?}", path))?;
                tracing::info!("Wrote default config to {:?}", path);
            }
            config
        }
        None => LoopConfig::default(),
    };
    config.validate().context("Invalid configuration")?;

    let library_dir = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("loopcam-library"));
    tokio::fs::create_dir_all(&library_dir)
        .await
        .with_context(|| format!("Failed to create library at {:?}", library_dir))?;

    let library = DirectoryLibrary::new(library_dir);
    tracing::info!("Saving clips to {:?}", library.root());

    let engine = if reencode {
        FfmpegEngine::reencoding()
    } else {
        FfmpegEngine::new()
    };

    let (handle, task) = RecordingController::spawn(
        config,
        Collaborators {
            camera: Arc::new(FfmpegCamera::test_pattern()),
            authorization: Arc::new(DesktopAuthorization),
            engine: Arc::new(engine),
            library: Arc::new(library),
            scratch: Arc::new(TempDirStore::in_system_temp()),
        },
    );

    let mut events = handle.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                RecorderEvent::Progress(_) => {}
                RecorderEvent::ClipSaved { clip, duration } => {
                    println!("saved {:.1}s clip from {:?}", duration.as_secs_f64(), clip);
                }
                RecorderEvent::StateChanged(state) => println!("state: {:?}", state),
                RecorderEvent::Error(error) => println!("error [{}]: {}", error.code, error.message),
            }
        }
    });

    handle.start_recording();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "save" | "s" => handle.stop_recording(),
            "background" | "bg" => handle.stop_session(),
            "foreground" | "fg" => handle.start_recording(),
            "quit" | "q" => break,
            "" => {}
            other => println!("unknown command: {}", other),
        }
    }

    handle.shutdown().await;
    drop(handle);
    task.await.context("Recording controller panicked")?;

    Ok(())
}
