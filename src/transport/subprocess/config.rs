//! Configuration constants for the server subprocess

/// Dangerous environment variables that should not be passed to subprocess
///
/// These variables can affect how the subprocess loads and executes code,
/// so user-supplied values for them are dropped.
pub const DANGEROUS_ENV_VARS: &[&str] = &[
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "DYLD_INSERT_LIBRARIES",
    "DYLD_LIBRARY_PATH",
    "PATH",
    "NODE_OPTIONS",
    "PYTHONPATH",
    "PERL5LIB",
    "RUBYLIB",
];

/// Whether a user-supplied environment variable may reach the server
#[must_use]
pub fn is_allowed_env(key: &str) -> bool {
    !DANGEROUS_ENV_VARS.contains(&key)
}
