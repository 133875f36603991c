//! Browser drivers for the visibility crawler.
//!
//! [`ChromiumDriver`] talks to a real Chromium over CDP; [`ScriptedDriver`]
//! replays canned pages. Both push observed responses into a
//! [`response_tap::ResponseObserver`] and return resource timing snapshots
//! gathered by [`scripts::GATHER_TIMING`].

pub mod chromium;
pub mod config;
pub mod driver;
pub mod error;
pub mod idle;
pub mod ledger;
pub mod scripted;
pub mod scripts;

pub use chromium::ChromiumDriver;
pub use config::{detect_chrome_executable, DriverConfig};
pub use driver::BrowserDriver;
pub use error::{DriverError, DriverErrorKind};
pub use idle::NetworkIdle;
pub use ledger::ResponseLedger;
pub use scripted::{ScriptedDriver, ScriptedNavigation, ScriptedPage};
