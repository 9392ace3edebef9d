use thiserror::Error;

/// Misuse of the allocator hook lifecycle.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HookError {
    /// The profiler already owns a hook, or the host's active allocator is
    /// already an interceptor. Installing again would capture the interceptor
    /// as its own "original" allocator.
    #[error("allocator hook for `{profiler}` is already installed")]
    AlreadyInstalled { profiler: &'static str },

    /// Teardown was requested but no hook is held.
    #[error("allocator hook for `{profiler}` is not installed")]
    NotInstalled { profiler: &'static str },
}
