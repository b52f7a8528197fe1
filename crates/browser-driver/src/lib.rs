//! Thin facade over a real Chromium instance.
//!
//! Wraps chromiumoxide with the primitives the rest of the engine needs:
//! the navigation ladder, selector queries, scripted evaluation, click /
//! fill / key / file-upload actions, waits, and screenshots. Fingerprint
//! smoothing is applied once at page creation.

mod driver;
mod stealth;

use thiserror::Error;

use applyflow_core_types::ErrorKind;

pub use driver::{js_string, Driver, DriverOptions};
pub use stealth::{DEFAULT_USER_AGENT, STEALTH_INIT_SCRIPT};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("browser launch failed: {0}")]
    LaunchFailed(String),
    #[error("navigation to {url} timed out after {attempts} attempts")]
    NavTimeout { url: String, attempts: u32 },
    #[error("navigation to {url} failed: {message}")]
    NavFailed { url: String, message: String },
    #[error("element not found: {0}")]
    ElementNotFound(String),
    #[error("script evaluation failed: {0}")]
    EvalFailed(String),
    #[error("wait for {0} timed out")]
    WaitTimeout(String),
    #[error("browser I/O failure: {0}")]
    CdpIo(String),
}

impl DriverError {
    /// The engine-wide error kind this failure maps to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DriverError::NavTimeout { .. } | DriverError::WaitTimeout(_) => ErrorKind::NavTimeout,
            DriverError::LaunchFailed(_) | DriverError::NavFailed { .. } | DriverError::CdpIo(_) => {
                ErrorKind::NavFailed
            }
            DriverError::ElementNotFound(_) => ErrorKind::SelectorNotFound,
            DriverError::EvalFailed(_) => ErrorKind::NavFailed,
        }
    }
}

pub type DriverResult<T> = Result<T, DriverError>;
