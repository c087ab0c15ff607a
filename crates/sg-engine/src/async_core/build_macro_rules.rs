/// Macro to wrap a code that will be built for async-core feature.
#[macro_export]
macro_rules! async_enabled {
    ($($item:item)*) => {
        $(#[cfg(feature = "async_core")]
        $item)*
    }
}

/// Macro to wrap a code that will be built only if async-core feature is disabled.
#[macro_export]
macro_rules! async_disabled {
    ($($item:item)*) => {
        $(#[cfg(not(feature = "async_core"))]
        $item)*
    }
}

/// Macro to wrap code gated on the `async_core` feature.
///
/// Same as [`async_enabled!`], provided under this name because call sites read
/// more naturally as `async_core! { ... }` next to `async_details_core! { ... }`.
#[macro_export]
macro_rules! async_core {
    ($($item:item)*) => {
        $(#[cfg(feature = "async_core")]
        $item)*
    }
}

/// Macro to wrap a code that will be built only if the `async_details_core` feature is enabled.
#[macro_export]
macro_rules! async_details_core {
    ($($item:item)*) => {
        $(#[cfg(feature = "async_details_core")]
        $item)*
    }
}
