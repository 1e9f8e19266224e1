//! Logging macros that capture source location.
//!
//! Each macro records `file!()`, `line!()`, and `module_path!()` at the call
//! site and passes them to [`TetherLogger::log_with_metadata`]. Messages are
//! only formatted when the level is enabled.
//!
//! The macros are prefixed with `tetherlog_` to avoid collision with the
//! `log` crate's identically named macros.
//!
//! An optional leading `{ "key": value, ... }` block attaches structured
//! fields; values can be anything implementing `serde::Serialize`.
//!
//! # Examples
//!
//! ```rust,ignore
//! use tetherlog::TetherLogger;
//!
//! let logger = TetherLogger::new("example");
//! tetherlog_info!(logger, "server started on port {}", 8080);
//! tetherlog_error!(logger, { "peer": addr, "attempt": 3 }, "connection failed");
//! ```
//!
//! [`TetherLogger::log_with_metadata`]: crate::TetherLogger::log_with_metadata

/// Log at `DEBUG` level, capturing the call site.
#[macro_export]
macro_rules! tetherlog_debug {
    ($logger:expr, { $($key:literal : $value:expr),* $(,)? }, $($arg:tt)+) => {
        $crate::__tetherlog_impl!($logger, $crate::TetherLevel::Debug, { $($key : $value),* }, $($arg)+)
    };
    ($logger:expr, $($arg:tt)+) => {
        $crate::__tetherlog_impl!($logger, $crate::TetherLevel::Debug, {}, $($arg)+)
    };
}

/// Log at `INFO` level, capturing the call site.
#[macro_export]
macro_rules! tetherlog_info {
    ($logger:expr, { $($key:literal : $value:expr),* $(,)? }, $($arg:tt)+) => {
        $crate::__tetherlog_impl!($logger, $crate::TetherLevel::Info, { $($key : $value),* }, $($arg)+)
    };
    ($logger:expr, $($arg:tt)+) => {
        $crate::__tetherlog_impl!($logger, $crate::TetherLevel::Info, {}, $($arg)+)
    };
}

/// Log at `WARN` level, capturing the call site.
#[macro_export]
macro_rules! tetherlog_warn {
    ($logger:expr, { $($key:literal : $value:expr),* $(,)? }, $($arg:tt)+) => {
        $crate::__tetherlog_impl!($logger, $crate::TetherLevel::Warn, { $($key : $value),* }, $($arg)+)
    };
    ($logger:expr, $($arg:tt)+) => {
        $crate::__tetherlog_impl!($logger, $crate::TetherLevel::Warn, {}, $($arg)+)
    };
}

/// Log at `ERROR` level, capturing the call site.
#[macro_export]
macro_rules! tetherlog_error {
    ($logger:expr, { $($key:literal : $value:expr),* $(,)? }, $($arg:tt)+) => {
        $crate::__tetherlog_impl!($logger, $crate::TetherLevel::Error, { $($key : $value),* }, $($arg)+)
    };
    ($logger:expr, $($arg:tt)+) => {
        $crate::__tetherlog_impl!($logger, $crate::TetherLevel::Error, {}, $($arg)+)
    };
}

/// Internal implementation macro, not part of the public API.
#[doc(hidden)]
#[macro_export]
macro_rules! __tetherlog_impl {
    (@emit $logger:expr, $level:expr, { $($key:literal : $value:expr),* }, $render:block) => {{
        let logger = &$logger;
        let level = $level;
        if logger.is_enabled_for(level) {
            #[allow(unused_mut)]
            let mut fields = $crate::Fields::new();
            $(
                fields.insert(
                    ::std::string::String::from($key),
                    $crate::__serde_json::to_value(&$value)
                        .unwrap_or($crate::__serde_json::Value::Null),
                );
            )*
            let call_site = $crate::CallSite::new(
                ::std::module_path!(),
                ::std::file!(),
                ::std::line!(),
            );
            let message: ::std::borrow::Cow<'_, str> = $render;
            logger.log_with_metadata(level, &message, call_site, fields)
        } else {
            ::std::option::Option::None
        }
    }};
    ($logger:expr, $level:expr, { $($key:literal : $value:expr),* }, $message:expr) => {
        $crate::__tetherlog_impl!(@emit $logger, $level, { $($key : $value),* }, {
            ::std::borrow::Cow::<str>::Borrowed($message)
        })
    };
    ($logger:expr, $level:expr, { $($key:literal : $value:expr),* }, $fmt:expr, $($arg:tt)+) => {
        $crate::__tetherlog_impl!(@emit $logger, $level, { $($key : $value),* }, {
            ::std::borrow::Cow::<str>::Owned(::std::format!($fmt, $($arg)+))
        })
    };
}
