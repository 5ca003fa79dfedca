// Export modules for use in tests
pub mod panic_handler;
pub mod preview;
pub mod replay;
pub mod settings;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export the controller surface
pub use preview::{
    ControllerState, DocumentController, HostElement, Patch, PatchKind, PreviewError,
    PreviewOptions, RenderMode, RenderSession, Topology,
};
