//! Watches the MikroTik download page for new CHR releases and dispatches a GitHub Actions build when one appears.
//!
//! A run is a single pass through [`checker::Checker::run`]: fetch the page, pick the latest stable version, compare it
//! with the stored one, and on change mint a GitHub App installation token, dispatch the workflow, then persist the
//! version.

pub mod checker;
pub mod env;
pub mod framework;
pub mod github;
pub mod release;
pub mod store;
pub mod version;

#[cfg(test)]
mod test_support;

/// A shorthand to define a statically allocated variable using a [`std::sync::LazyLock`].
///
/// # Examples
///
/// ```rust
/// use chr_release_watch::static_lazy_lock;
///
/// static_lazy_lock! {
///     pub VAR_1: String = String::from("a static variable");
/// }
/// // ...equals to...
/// pub static VAR_2: std::sync::LazyLock<String> =
///     std::sync::LazyLock::new(|| String::from("a static variable"));
/// ```
#[macro_export]
macro_rules! static_lazy_lock {
    ($(#[$meta:meta])* $vis:vis $name:ident: $type:ty = $expr:expr $(;)?) => {
        $(#[$meta])*
        $vis static $name: $crate::__priv_macro_use::LazyLock<$type> =
            $crate::__priv_macro_use::LazyLock::new(|| $expr);
    };
}

#[doc(hidden)]
pub mod __priv_macro_use {
    pub use std::sync::LazyLock;
}
