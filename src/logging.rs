//! Logging bootstrap.
//!
//! Thin wrapper around [`env_logger`], exactly the way the teacher's examples wire it up
//! at process start. Not called anywhere inside the crate itself — there are no
//! module-level side effects (spec §9: no ambient singletons). Callers decide when and
//! whether to initialize logging.

/// Initialize the global `log` facade from `RUST_LOG`. Safe to call more than once; the
/// second and subsequent calls are no-ops (propagated from `env_logger::try_init`).
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env().try_init();
}
