//! Generation Lifecycle Controller
//!
//! Owns generation creation, promotion and garbage collection, and is the
//! only place that knows which generations are current.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{info, warn};
use url::Url;

use crate::cache::{CacheStore, GenerationKind, GenerationNames, ResponsePayload};
use crate::error::{Error, Result};
use crate::lifecycle::StaticManifest;
use crate::network::{cache_key, fetch_within, resolve_url, FetchRequest, Network};

// == Lifecycle State ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Nothing installed yet
    Idle,
    Installing,
    /// Installed and waiting for activation
    Installed,
    Activating,
    Active,
}

// == Generation Pointers ==
/// The current STATIC and DYNAMIC generation names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationPointers {
    pub current_static: Option<String>,
    pub current_dynamic: Option<String>,
}

/// Read access to the current generations.
///
/// While a view is alive no activation can swap pointers or delete the
/// generations it names.
pub struct GenerationView<'a> {
    guard: RwLockReadGuard<'a, GenerationPointers>,
}

impl GenerationView<'_> {
    pub fn current_static(&self) -> Option<&str> {
        self.guard.current_static.as_deref()
    }

    pub fn current_dynamic(&self) -> Option<&str> {
        self.guard.current_dynamic.as_deref()
    }
}

// == Status ==
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleStatus {
    pub state: LifecycleState,
    pub version: String,
    /// Installed generation waiting for activation
    pub waiting: Option<String>,
    pub skip_waiting: bool,
    pub current_static: Option<String>,
    pub current_dynamic: Option<String>,
}

/// Result of a completed activation.
#[derive(Debug, Clone, Serialize)]
pub struct ActivationReport {
    pub current_static: String,
    pub current_dynamic: String,
    /// Superseded generations removed by the sweep
    pub deleted: Vec<String>,
}

#[derive(Debug)]
struct Phase {
    state: LifecycleState,
    waiting: Option<String>,
    /// Configured: every successful install activates at once
    auto_activate: bool,
    /// One-shot request from a skip-waiting message during an install
    skip_requested: bool,
}

impl Phase {
    fn activates_on_install(&self) -> bool {
        self.auto_activate || self.skip_requested
    }
}

// == Lifecycle Controller ==
pub struct LifecycleController {
    store: CacheStore,
    network: Arc<dyn Network>,
    manifest: StaticManifest,
    names: GenerationNames,
    origin: Url,
    timeout: Duration,
    phase: Mutex<Phase>,
    pointers: RwLock<GenerationPointers>,
    install_lock: tokio::sync::Mutex<()>,
}

impl LifecycleController {
    // == Constructor ==
    /// Restores persisted pointers; a controller with pointers starts ACTIVE.
    pub fn load(
        store: CacheStore,
        network: Arc<dyn Network>,
        manifest: StaticManifest,
        names: GenerationNames,
        origin: Url,
        timeout: Duration,
    ) -> Result<Self> {
        let pointers = GenerationPointers {
            current_static: store.load_current(GenerationKind::Static)?,
            current_dynamic: store.load_current(GenerationKind::Dynamic)?,
        };
        let state = if pointers.current_static.is_some() {
            LifecycleState::Active
        } else {
            LifecycleState::Idle
        };

        Ok(Self {
            store,
            network,
            manifest,
            names,
            origin,
            timeout,
            phase: Mutex::new(Phase {
                state,
                waiting: None,
                auto_activate: false,
                skip_requested: false,
            }),
            pointers: RwLock::new(pointers),
            install_lock: tokio::sync::Mutex::new(()),
        })
    }

    // == Accessors ==
    /// Shared view of the current generations.
    pub async fn view(&self) -> GenerationView<'_> {
        GenerationView {
            guard: self.pointers.read().await,
        }
    }

    pub async fn current_static(&self) -> Option<String> {
        self.pointers.read().await.current_static.clone()
    }

    pub async fn current_dynamic(&self) -> Option<String> {
        self.pointers.read().await.current_dynamic.clone()
    }

    pub fn state(&self) -> Result<LifecycleState> {
        Ok(self.phase()?.state)
    }

    pub async fn status(&self) -> Result<LifecycleStatus> {
        let pointers = self.pointers.read().await.clone();
        let phase = self.phase()?;
        Ok(LifecycleStatus {
            state: phase.state,
            version: self.names.version().to_string(),
            waiting: phase.waiting.clone(),
            skip_waiting: phase.activates_on_install(),
            current_static: pointers.current_static,
            current_dynamic: pointers.current_dynamic,
        })
    }

    /// True when the configured version is already the current STATIC generation.
    pub async fn is_current_version(&self) -> bool {
        self.current_static().await.as_deref() == Some(self.names.static_name().as_str())
    }

    // == Install ==
    /// Fetches every manifest asset and writes them into a new STATIC generation.
    ///
    /// Fail-closed: a single failed or non-2xx asset aborts the install and
    /// nothing is written. The previously current generation keeps serving.
    pub async fn install(&self) -> Result<LifecycleStatus> {
        let _install = self.install_lock.lock().await;

        let previous = {
            let mut phase = self.phase()?;
            if phase.state == LifecycleState::Activating {
                return Err(Error::InvalidTransition(
                    "install requested while activating".to_string(),
                ));
            }
            let previous = phase.state;
            phase.state = LifecycleState::Installing;
            previous
        };

        let name = self.names.static_name();
        info!(generation = %name, assets = self.manifest.urls().len(), "Installing static generation");

        match self.fetch_manifest().await {
            Ok(entries) => {
                if let Err(e) =
                    self.store
                        .populate_generation(&name, GenerationKind::Static, &entries)
                {
                    self.restore_phase(previous);
                    return Err(e);
                }
                info!(generation = %name, entries = entries.len(), "Static generation installed");
            }
            Err(e) => {
                warn!(generation = %name, error = %e, "Install failed, keeping previous generation");
                self.restore_phase(previous);
                return Err(e);
            }
        }

        let activate_now = {
            let mut phase = self.phase()?;
            phase.state = LifecycleState::Installed;
            phase.waiting = Some(name);
            phase.activates_on_install()
        };

        if activate_now {
            self.activate().await?;
        }

        self.status().await
    }

    async fn fetch_manifest(&self) -> Result<Vec<(String, ResponsePayload)>> {
        let fetches = self.manifest.urls().iter().map(|raw| self.fetch_asset(raw));
        join_all(fetches).await.into_iter().collect()
    }

    async fn fetch_asset(&self, raw: &str) -> Result<(String, ResponsePayload)> {
        let failed = |reason: String| Error::InstallFailed {
            url: raw.to_string(),
            reason,
        };

        let url = resolve_url(raw, &self.origin).map_err(|e| failed(e.to_string()))?;
        let key = cache_key("GET", &url, &self.origin);
        let response = fetch_within(self.network.as_ref(), FetchRequest::get(url), self.timeout)
            .await
            .map_err(|e| failed(e.to_string()))?;

        if !response.is_ok() {
            return Err(failed(format!("status {}", response.status)));
        }
        Ok((key, response))
    }

    // == Activate ==
    /// Promotes the installed generation and sweeps every other generation.
    pub async fn activate(&self) -> Result<ActivationReport> {
        let new_static = {
            let mut phase = self.phase()?;
            match (phase.state, phase.waiting.clone()) {
                (LifecycleState::Installed, Some(name)) => {
                    phase.state = LifecycleState::Activating;
                    name
                }
                (state, _) => {
                    return Err(Error::InvalidTransition(format!(
                        "activate requested while {:?}",
                        state
                    )))
                }
            }
        };
        let new_dynamic = self.names.dynamic_name();

        // Waits for every in-flight view to drop.
        let mut pointers = self.pointers.write().await;

        let swapped = self.swap_and_sweep(&new_static, &new_dynamic);
        let deleted = match swapped {
            Ok(deleted) => deleted,
            Err(e) => {
                drop(pointers);
                self.restore_phase(LifecycleState::Installed);
                return Err(e);
            }
        };

        pointers.current_static = Some(new_static.clone());
        pointers.current_dynamic = Some(new_dynamic.clone());
        drop(pointers);

        {
            let mut phase = self.phase()?;
            phase.state = LifecycleState::Active;
            phase.waiting = None;
            phase.skip_requested = false;
        }

        info!(
            current_static = %new_static,
            current_dynamic = %new_dynamic,
            deleted = deleted.len(),
            "Activated"
        );

        Ok(ActivationReport {
            current_static: new_static,
            current_dynamic: new_dynamic,
            deleted,
        })
    }

    fn swap_and_sweep(&self, new_static: &str, new_dynamic: &str) -> Result<Vec<String>> {
        let deleted = self.store.promote(new_static, new_dynamic)?;
        for name in &deleted {
            info!(generation = %name, "Deleted superseded generation");
        }
        Ok(deleted)
    }

    // == Skip Waiting ==
    /// Forces promotion of an installed generation without waiting for
    /// the normal activation signal.
    ///
    /// During an install the request is remembered and applied as soon as
    /// the install succeeds.
    pub async fn skip_waiting(&self) -> Result<LifecycleStatus> {
        let installed = {
            let mut phase = self.phase()?;
            match phase.state {
                LifecycleState::Installed => true,
                LifecycleState::Installing => {
                    phase.skip_requested = true;
                    false
                }
                _ => false,
            }
        };

        if installed {
            self.activate().await?;
        }
        self.status().await
    }

    /// Makes every successful install activate immediately.
    pub fn set_skip_waiting(&self, enabled: bool) -> Result<()> {
        self.phase()?.auto_activate = enabled;
        Ok(())
    }

    // == Helpers ==
    fn phase(&self) -> Result<std::sync::MutexGuard<'_, Phase>> {
        self.phase
            .lock()
            .map_err(|e| Error::Internal(format!("Lifecycle lock poisoned: {}", e)))
    }

    fn restore_phase(&self, state: LifecycleState) {
        if let Ok(mut phase) = self.phase.lock() {
            phase.state = state;
        }
    }
}
