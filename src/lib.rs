pub mod ai;
pub mod capture;
pub mod hotkeys;
pub mod notify;
pub mod push;
pub mod relay;
pub mod server;
pub mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::ai::openai::OpenAiClient;
use crate::ai::CompletionProvider;
use crate::hotkeys::{Hotkey, HotkeyAction};
use crate::push::Publisher;
use crate::relay::Relay;
use crate::settings::{Settings, SettingsError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("API key is not set — edit the settings file and restart")]
    MissingApiKey,
    #[error(transparent)]
    Hotkey(#[from] hotkeys::HotkeyParseError),
}

/// The settings file lives next to the executable (portable-tool convention),
/// falling back to the current directory.
fn settings_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("settings.toml")
}

/// Best-effort LAN address for the "open this URL" notification. The socket
/// is never written to; connect() just selects the outbound interface.
fn local_ip() -> String {
    std::net::UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "localhost".into())
}

pub async fn run() -> Result<(), AppError> {
    let path = settings_path();
    let (settings, created) = Settings::load_or_create(&path)?;
    if created {
        notify::toast(&format!(
            "Created default settings at {}. Fill in your API key and restart.",
            path.display()
        ));
    }
    if settings.openai.api_key.is_empty() {
        notify::toast("API key is not set. Edit the settings file and restart.");
        return Err(AppError::MissingApiKey);
    }

    let bindings = vec![
        (
            Hotkey::parse(&settings.hotkeys.recognition)?,
            HotkeyAction::Recognize,
        ),
        (
            Hotkey::parse(&settings.hotkeys.interruption)?,
            HotkeyAction::Interrupt,
        ),
        (Hotkey::parse(&settings.hotkeys.exit)?, HotkeyAction::Exit),
    ];

    let publisher = Publisher::new(64);
    let provider: Arc<dyn CompletionProvider> = Arc::new(OpenAiClient::new(
        settings.openai.base_url.clone(),
        settings.openai.api_key.clone(),
        settings.openai.model.clone(),
    ));
    let relay = Arc::new(Relay::new(
        provider,
        publisher.clone(),
        settings.openai.prompt.clone(),
    ));

    let (action_tx, mut action_rx) = mpsc::unbounded_channel();
    let _listener = hotkeys::spawn_listener(bindings, action_tx);

    let port = settings.server.port;
    let server_publisher = publisher.clone();
    tokio::spawn(async move {
        if let Err(err) = server::serve(port, server_publisher).await {
            log::error!("web front end failed: {err}");
        }
    });

    notify::toast(&format!(
        "Server running — open http://{}:{}",
        local_ip(),
        port
    ));
    log::info!(
        "ready (recognize='{}' interrupt='{}' exit='{}')",
        settings.hotkeys.recognition,
        settings.hotkeys.interruption,
        settings.hotkeys.exit
    );

    while let Some(action) = action_rx.recv().await {
        match action {
            HotkeyAction::Recognize => {
                if relay.is_busy() {
                    log::warn!("recognition already in progress, ignoring trigger");
                    continue;
                }
                log::info!("recognition hotkey pressed, capturing screen");
                publisher.clear("Screenshot captured, contacting the model...");

                let relay = Arc::clone(&relay);
                let publisher = publisher.clone();
                tokio::spawn(async move {
                    match tokio::task::spawn_blocking(capture::grab_png_base64).await {
                        Ok(Ok(image_b64)) => {
                            relay.run(image_b64).await;
                        }
                        Ok(Err(err)) => {
                            log::error!("screenshot failed: {err}");
                            publisher.response(format!("Recognition failed: {err}"));
                        }
                        Err(err) => {
                            log::error!("capture task panicked: {err}");
                            publisher.response("Recognition failed: internal capture error".to_string());
                        }
                    }
                });
            }
            HotkeyAction::Interrupt => relay.cancel(),
            HotkeyAction::Exit => {
                log::info!("exit hotkey pressed, shutting down");
                notify::toast("Exit hotkey pressed, shutting down.");
                std::process::exit(0);
            }
        }
    }

    Ok(())
}
