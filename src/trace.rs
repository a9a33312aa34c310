pub(crate) const COMMAND_TRACING_EVENT_TARGET: &str = "mongodb_write::command";
pub(crate) const CONNECTION_TRACING_EVENT_TARGET: &str = "mongodb_write::connection";

#[cfg(feature = "tracing-unstable")]
pub(crate) trait TracingRepresentation {
    type Representation;

    fn tracing_representation(&self) -> Self::Representation;
}

#[cfg(feature = "tracing-unstable")]
impl TracingRepresentation for crate::error::Error {
    type Representation = String;

    fn tracing_representation(&self) -> String {
        self.to_string()
    }
}

/// Emits a debug-level `tracing` event when the `tracing-unstable` feature is enabled, and
/// nothing otherwise.
macro_rules! trace_debug {
    (target: $target:expr, $($arg:tt)+) => {{
        #[cfg(feature = "tracing-unstable")]
        {
            #[allow(unused_imports)]
            use $crate::trace::TracingRepresentation;
            tracing::debug!(target: $target, $($arg)+);
        }
        #[cfg(not(feature = "tracing-unstable"))]
        {
            let _ = $target;
        }
    }};
}
pub(crate) use trace_debug;
