//! Adapter configuration.
//!
//! Configs are written in RON:
//!
//! ```ron
//! (
//!     root: "/srv/data",
//!     observe: true,
//! )
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::adapter::Adapter;
use crate::backend::Backend;
use crate::observe::{NoopObserver, Observer, TracingObserver};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
}

/// Settings for building an [`Adapter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Prefix stripped from handle names.
    pub root: String,
    /// Report operations through `tracing`. When false nothing is emitted.
    pub observe: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            root: String::new(),
            observe: true,
        }
    }
}

impl AdapterConfig {
    /// Parse a RON config. Missing fields take their defaults.
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(source)?)
    }

    /// Read and parse a RON config file.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_ron(&source)
    }

    fn observer(&self) -> Arc<dyn Observer> {
        if self.observe {
            Arc::new(TracingObserver)
        } else {
            Arc::new(NoopObserver)
        }
    }
}

impl Adapter {
    /// Adapter over `backend` configured by `config`.
    pub fn from_config(backend: Arc<dyn Backend>, config: &AdapterConfig) -> Adapter {
        Adapter::with_observer(backend, config.root.clone(), config.observer())
    }
}

/// Step-by-step [`Adapter`] construction.
///
/// ```
/// use std::sync::Arc;
/// use fsbridge::{AdapterBuilder, MemoryBackend, NoopObserver};
///
/// let fs = AdapterBuilder::new(Arc::new(MemoryBackend::new()))
///     .root("/data")
///     .observer(Arc::new(NoopObserver))
///     .build();
/// assert_eq!(fs.root(), "/data");
/// ```
#[derive(Debug)]
pub struct AdapterBuilder {
    backend: Arc<dyn Backend>,
    root: String,
    observer: Option<Arc<dyn Observer>>,
}

impl AdapterBuilder {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            root: String::new(),
            observer: None,
        }
    }

    pub fn root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }

    /// Replace the default [`TracingObserver`].
    pub fn observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Apply `config` on top of what has been set so far.
    pub fn config(mut self, config: &AdapterConfig) -> Self {
        self.root = config.root.clone();
        self.observer = Some(config.observer());
        self
    }

    pub fn build(self) -> Adapter {
        let observer = self.observer.unwrap_or_else(|| Arc::new(TracingObserver));
        Adapter::with_observer(self.backend, self.root, observer)
    }
}
