#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    app::run()
}

#[cfg(not(windows))]
fn main() {
    eprintln!("warkey intercepts Win32 keyboard input and only runs on Windows");
    std::process::exit(1);
}

#[cfg(windows)]
mod app {
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::{Context, Result};
    use crossbeam_channel::select;
    use tracing::{error, info, warn};
    use tracing_subscriber::EnvFilter;

    use warkey::config::{AppConfig, CONFIG_FILE_NAME};
    use warkey::detector::{DetectorOptions, PresenceDetector, WindowSignature};
    use warkey::engine::{NotificationEvent, RemapEngine};
    use warkey::platform::windows::{WindowsBackend, WindowsWindowSource};
    use warkey::profile::{ConfigSnapshot, ProfileStore};
    use warkey::signal;

    fn init_logging(config: &AppConfig) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .init();
    }

    fn report(event: NotificationEvent) {
        match event {
            NotificationEvent::Info(msg) => info!(target: "warkey::notify", "{msg}"),
            NotificationEvent::Warning(msg) => warn!(target: "warkey::notify", "{msg}"),
            NotificationEvent::Error(msg) => error!(target: "warkey::notify", "{msg}"),
        }
    }

    pub fn run() -> Result<()> {
        // Load config or create default if not exists
        let config = AppConfig::load_or_create(CONFIG_FILE_NAME)
            .with_context(|| format!("Failed to load {CONFIG_FILE_NAME}"))?;
        init_logging(&config);

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        signal::set_control_ctrl_handler(shutdown_tx)?;

        let mut store = ProfileStore::open(&config.profile_dir)
            .with_context(|| format!("Failed to open profile directory {}", config.profile_dir))?;
        if let Err(e) = store.set_current(&config.active_profile) {
            warn!("{e}, using {}", store.current_name());
        }
        let profile = store
            .current()
            .cloned()
            .unwrap_or_else(|| ConfigSnapshot::default_named(store.current_name()));

        let engine = RemapEngine::new(Arc::new(WindowsBackend::new()));
        engine.table().import_snapshot(&profile);
        match config.toggle_vk() {
            Ok(toggle) => engine.set_toggle_key(toggle),
            Err(e) => warn!("{e}, toggle key disabled"),
        }
        // Until the game is detected nothing is remapped.
        engine.require_target(true);
        let (notify_tx, notify_rx) = crossbeam_channel::unbounded();
        engine.set_notification_sender(notify_tx);

        let detector = PresenceDetector::new(
            Arc::new(WindowsWindowSource::new()),
            DetectorOptions {
                interval: Duration::from_millis(config.poll_interval_ms),
                signature: WindowSignature {
                    class_name: config.window_class.clone(),
                    title: config.window_title.clone(),
                },
            },
        );
        detector.add_target(&profile.game_process);
        for target in &config.target_processes {
            detector.add_target(target);
        }
        let (presence_tx, presence_rx) = crossbeam_channel::unbounded::<bool>();
        detector.set_callback(move |present, _| {
            let _ = presence_tx.send(present);
        });

        if profile.auto_start
            && let Err(e) = engine.start()
        {
            error!("Auto start failed: {e}");
        }
        detector.start()?;
        info!(profile = %profile.name, "WarKey running, press Ctrl+C to exit");

        loop {
            select! {
                recv(shutdown_rx) -> _ => break,
                recv(presence_rx) -> msg => {
                    let Ok(present) = msg else { break };
                    let window = if present { detector.current_window() } else { None };
                    if let Err(e) = engine.follow_presence(window, !profile.auto_start) {
                        error!("Failed to start remapping: {e}");
                    }
                }
                recv(notify_rx) -> msg => {
                    if let Ok(event) = msg
                        && profile.show_notifications
                    {
                        report(event);
                    }
                }
            }
        }

        info!("Shutting down");
        detector.stop();
        engine.stop();

        let mut snapshot = store.current().cloned().unwrap_or(profile);
        engine.table().export_into(&mut snapshot);
        if let Err(e) = store.save(snapshot) {
            error!("Failed to save profile: {e}");
        }
        Ok(())
    }
}
