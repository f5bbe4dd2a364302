// Host platform adapters
// Mobile and Web hosts implement `PlatformAdapter` on their side of the FFI
// boundary; the adapters here cover desktop and in-process use

pub mod image_utils;
pub mod memory;
pub mod storage;

#[cfg(target_os = "linux")]
pub mod linux;

use std::path::Path;
use std::sync::Arc;

use crate::components::platform::{Platform, PlatformAdapter};

pub use memory::{MemoryAdapter, PromptBehavior};
pub use storage::FileTokenSlot;

/// Factory for the adapter matching the current OS
pub struct PlatformAdapterFactory;

impl PlatformAdapterFactory {
    /// Adapter for the current OS, falling back to the in-process adapter
    /// where no native surface is wired up
    pub fn create_default(app_name: &str, data_dir: &Path) -> Arc<dyn PlatformAdapter> {
        #[cfg(target_os = "linux")]
        {
            Arc::new(linux::LinuxAdapter::new(app_name, data_dir))
        }

        #[cfg(not(target_os = "linux"))]
        {
            tracing::debug!(app_name, "No native notification surface, using headless adapter");
            Arc::new(
                MemoryAdapter::new(Platform::Headless).with_token_slot(FileTokenSlot::in_dir(data_dir)),
            )
        }
    }

    /// In-process adapter for `platform`, with the token kept under `data_dir`
    pub fn create_headless(platform: Platform, data_dir: &Path) -> Arc<dyn PlatformAdapter> {
        Arc::new(MemoryAdapter::new(platform).with_token_slot(FileTokenSlot::in_dir(data_dir)))
    }
}
