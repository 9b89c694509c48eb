//! Scope timing for the composition hot paths.
//!
//! Compiled in with `--features perf`; otherwise every span is a zero-sized
//! no-op. Timings land as `tracing` events under target `perf`.

pub struct PerfSpan {
    #[cfg(feature = "perf")]
    name: &'static str,
    #[cfg(feature = "perf")]
    started: std::time::Instant,
}

impl PerfSpan {
    #[inline]
    pub fn new(name: &'static str) -> Self {
        let _ = name;
        Self {
            #[cfg(feature = "perf")]
            name,
            #[cfg(feature = "perf")]
            started: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "perf")]
impl Drop for PerfSpan {
    fn drop(&mut self) {
        let ms = self.started.elapsed().as_secs_f64() * 1e3;
        tracing::info!(target: "perf", span = self.name, ms);
    }
}

#[macro_export]
macro_rules! perf_scope {
    ($name:expr) => {
        $crate::perf::PerfSpan::new($name)
    };
}
