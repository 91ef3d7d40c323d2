//! # Startup
//!
//! [`initialize`] turns a config file into a ready [`Client`]:
//!
//! 1. Use the given path, or run [`find_config`] discovery.
//! 2. Load it as a [`SquirrelConfig`].
//! 3. Build the `[backend]` it names; relative paths resolve against the
//!    config file's directory. No `[backend]` means an empty in-memory store.
//! 4. Attach the control layer.
//!
//! Protocol shims are not part of this crate. [`initialize`] attaches
//! [`Disconnected`]; callers with a real provider use [`initialize_with`].

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::api::Client;
use crate::config::{find_config, SquirrelConfig};
use crate::control::{ControlLayer, Disconnected};
use crate::error::Result;
use crate::store::memory::InMemoryStore;
use crate::store::AnyBackend;

pub struct SquirrelContext<C: ControlLayer> {
    pub client: Client<AnyBackend, C>,
    pub config: SquirrelConfig,
    pub config_path: PathBuf,
}

pub fn initialize(config_path: Option<PathBuf>) -> Result<SquirrelContext<Disconnected>> {
    let context = initialize_with(config_path, Disconnected)?;
    let shims = context.config.enabled_shims();
    if !shims.is_empty() {
        warn!(
            shims = %shims.join(", "),
            "control layer shims are not built in; live reads will fail"
        );
    }
    Ok(context)
}

pub fn initialize_with<C: ControlLayer>(
    config_path: Option<PathBuf>,
    control: C,
) -> Result<SquirrelContext<C>> {
    let config_path = match config_path {
        Some(path) => path,
        None => find_config()?,
    };
    debug!(path = %config_path.display(), "loading configuration");
    let config = SquirrelConfig::load(&config_path)?;

    let base_dir = config_path.parent().unwrap_or(Path::new("."));
    let backend = match &config.backend {
        Some(backend) => AnyBackend::from_config(backend, base_dir),
        None => {
            warn!("no backend configured, using an empty in-memory store");
            AnyBackend::Memory(InMemoryStore::new())
        }
    };
    debug!(kind = %backend.kind(), location = %backend.location(), "backend ready");

    Ok(SquirrelContext {
        client: Client::new(backend, control),
        config,
        config_path,
    })
}
