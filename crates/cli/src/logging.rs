use std::fs::OpenOptions;

use metalstack_core::AppConfig;
use tracing_subscriber::EnvFilter;

/// Filter used by the dashboard when `RUST_LOG` is unset.
const INTERACTIVE_FILTER: &str = "metalstack=info,metalstack_core=info";

/// Filter used by one-shot commands when `RUST_LOG` is unset.
const COMMAND_FILTER: &str = "warn";

/// Initialize the global tracing subscriber.
///
/// The interactive dashboard owns the terminal, so it appends to
/// `<data_dir>/metalstack.log`. Everything else logs to stderr.
/// `RUST_LOG` overrides the default filter in both modes.
pub fn init_logging(config: &AppConfig, interactive: bool) -> std::io::Result<()> {
    let default_filter = if interactive { INTERACTIVE_FILTER } else { COMMAND_FILTER };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    if interactive {
        std::fs::create_dir_all(&config.data_dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(config.log_path())?;
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}
