//! Opt-in `tracing` subscriber wiring for consumers that embed this crate
//! and want a ready-made one, mirroring the donor's own `main.rs`
//! initialization (`env::var("RUST_LOG")` gate, `EnvFilter` + `fmt` layer).
//! The crate itself never installs a global subscriber — only binaries do
//! that — so every `tracing` call here is inert until a caller opts in by
//! calling `init()`.

/// Installs a `tracing_subscriber::fmt` subscriber filtered by
/// `RUST_LOG`, falling back to `tagstudio_core=info` when unset. Safe to
/// call at most once per process; a second call is a no-op (the
/// underlying `try_init` error is swallowed).
pub fn init() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tagstudio_core=info".into());
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
