pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod retry;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod storage;
pub mod sync;
pub mod timer;

#[cfg(feature = "uniffi")]
uniffi::setup_scaffolding!();
#[cfg(feature = "uniffi")]
pub mod uniffi_interface;
