//! Expiry alert sound

use std::{
    io::Write,
    path::{Path, PathBuf},
};
use tokio::{process::Command, runtime::Handle};
use tracing::{debug, error, info, warn};

use super::AlertDispatcher;

/// Plays a sound file through an external player command
#[derive(Debug, Clone)]
pub struct SoundAlert {
    sound_file: Option<PathBuf>,
    player: String,
    runtime: Handle,
}

impl SoundAlert {
    /// Must be called from within a Tokio runtime
    pub fn new(sound_file: Option<PathBuf>, player: impl Into<String>) -> Self {
        Self {
            sound_file,
            player: player.into(),
            runtime: Handle::current(),
        }
    }
}

impl AlertDispatcher for SoundAlert {
    fn play_alert(&self) {
        let Some(path) = self.sound_file.as_ref().filter(|p| p.exists()).cloned() else {
            warn!("Sound file not found, ringing terminal bell instead");
            ring_terminal_bell();
            return;
        };

        let player = self.player.clone();
        self.runtime.spawn(async move {
            if let Err(e) = play_sound(&player, &path).await {
                error!("Error playing alert sound: {}", e);
                ring_terminal_bell();
            }
        });
    }
}

/// Play a sound file with the given player and wait for it to finish
pub async fn play_sound(player: &str, path: &Path) -> Result<(), String> {
    debug!("Playing {} with {}", path.display(), player);

    let output = Command::new(player)
        .arg(path)
        .output()
        .await
        .map_err(|e| format!("Failed to execute {}: {}", player, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("{} failed: {}", player, stderr));
    }

    info!("Alert sound played");
    Ok(())
}

fn ring_terminal_bell() {
    let mut stdout = std::io::stdout();
    if let Err(e) = stdout.write_all(b"\x07").and_then(|_| stdout.flush()) {
        warn!("Failed to ring terminal bell: {}", e);
    }
}
