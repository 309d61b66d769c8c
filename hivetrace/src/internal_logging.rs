#![allow(unused_macros)]
//! Logging macros for hivetrace's own diagnostics.
//!
//! `hive_debug!`, `hive_info!`, `hive_warn!` and `hive_error!` are meant for
//! code inside hivetrace and for custom processors and exporters built on top
//! of it, not for application logging. With the `internal-logs` feature of
//! the *calling* crate enabled they emit `tracing` events whose target is the
//! calling crate's name. Under `cfg(test)` they also print to stdout so that
//! `cargo test -- --nocapture` shows the flow of the processor.
//!
//! Every event carries a `name` identifying the operation; extra `key = value`
//! pairs must implement `Display`.
//!
//! ```rust
//! use hivetrace::hive_warn;
//! hive_warn!(name: "BatchSpanProcessor.ExportFailed", reason = "collector unreachable");
//! ```

#[doc(hidden)]
#[macro_export]
macro_rules! __hive_log {
    ($level:ident, name: $name:expr $(,)?) => {
        #[cfg(feature = "internal-logs")]
        {
            $crate::_private::$level!(name: $name, target: env!("CARGO_PKG_NAME"), name = $name);
        }

        #[cfg(test)]
        {
            println!("hive_{}: name={}", stringify!($level), $name);
        }

        #[cfg(all(not(feature = "internal-logs"), not(test)))]
        {
            let _ = $name;
        }
    };
    ($level:ident, name: $name:expr, $($key:ident = $value:expr),+ $(,)?) => {
        #[cfg(feature = "internal-logs")]
        {
            $crate::_private::$level!(
                name: $name,
                target: env!("CARGO_PKG_NAME"),
                name = $name,
                $($key = $value),+
            );
        }

        #[cfg(test)]
        {
            print!("hive_{}: name={}", stringify!($level), $name);
            $(
                print!(", {}={}", stringify!($key), $value);
            )+
            println!();
        }

        #[cfg(all(not(feature = "internal-logs"), not(test)))]
        {
            let _ = ($name, $($value),+);
        }
    };
}

/// Logs a debug-level diagnostic event.
#[macro_export]
macro_rules! hive_debug {
    ($($tt:tt)*) => {
        $crate::__hive_log!(debug, $($tt)*)
    };
}

/// Logs an info-level diagnostic event.
#[macro_export]
macro_rules! hive_info {
    ($($tt:tt)*) => {
        $crate::__hive_log!(info, $($tt)*)
    };
}

/// Logs a warn-level diagnostic event.
#[macro_export]
macro_rules! hive_warn {
    ($($tt:tt)*) => {
        $crate::__hive_log!(warn, $($tt)*)
    };
}

/// Logs an error-level diagnostic event.
///
/// Reserved for conditions an operator has to act on, such as an exporter
/// that keeps failing after every retry.
#[macro_export]
macro_rules! hive_error {
    ($($tt:tt)*) => {
        $crate::__hive_log!(error, $($tt)*)
    };
}
