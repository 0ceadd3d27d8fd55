pub use std::backtrace::Backtrace;

pub use anyhow::{anyhow, bail, ensure};
pub use paste::paste;
pub use regex::{Regex, RegexBuilder};
pub use thiserror::Error;

pub type EmptyResult = anyhow::Result<()>;

pub const BUILD_DIR: &str = "/.build/";
pub const RUSTC_DIR: &str = "/rustc/";
pub const CARGO_REGISTRY_DIR: &str = "/.cargo/registry/";
pub const GLIBC: &str = "glibc";

// This macro creates an enum which derives from thiserror::Error, and also
// creates constructor functions in snake case for each of the enum variants.
// The enum is crate-private unless a visibility is given, e.g.
// `err_impl! {pub ConfigError, ...}`, which lets other crates downcast to it.
#[macro_export]
macro_rules! err_impl {
    (@hidden $vis:vis $errtype:ident, $item:ident, String) => {
        paste! {
            $vis fn [<$item:snake>](in_: &str) -> anyhow::Error {
                anyhow!{$errtype::$item(in_.into())}
            }
        }
    };

    (@hidden $vis:vis $errtype:ident, $item:ident, $($dtype:tt)::+) => {
        paste! {
            $vis fn [<$item:snake>](in_: &$($dtype)::+) -> anyhow::Error {
                anyhow!{$errtype::$item(in_.clone())}
            }
        }
    };

    (pub $errtype:ident,
        $(#[$errinfo:meta] $item:ident($($dtype:tt)::+),)+
    ) => {
        #[derive(Debug, Error)]
        pub enum $errtype {
            $(#[$errinfo] $item($($dtype)::+)),+
        }

        impl $errtype {
            $(err_impl! {@hidden pub $errtype, $item, $($dtype)::+})+
        }
    };

    ($errtype:ident,
        $(#[$errinfo:meta] $item:ident($($dtype:tt)::+),)+
    ) => {
        #[derive(Debug, Error)]
        pub(crate) enum $errtype {
            $(#[$errinfo] $item($($dtype)::+)),+
        }

        impl $errtype {
            $(err_impl! {@hidden pub(crate) $errtype, $item, $($dtype)::+})+
        }
    };
}

// Prunes a tokio-heavy backtrace down to the frames that belong to this workspace before
// logging it alongside the error message.  Adapted from
// https://github.com/rust-lang/rust/issues/79676#issuecomment-1502670961.
//
// It's reasonably expensive, so it should only be called from error paths.
#[macro_export]
macro_rules! gserr {
    (@hidden $err:ident, $msg:literal, $($args:expr),*) => {
        let bt = $err.backtrace().to_string();
        let mut skipped_frames = 0;
        let mut filtered_bt = match RegexBuilder::new(r"^\s+\d+(?s:.*?)(\s+at\s+.*:\d+)$").multi_line(true).build() {
            Ok(re) => re.find_iter(&bt).fold(String::new(), |mut acc, frame| {
                let frame = frame.as_str();
                if frame.contains(BUILD_DIR)
                    || frame.contains(RUSTC_DIR)
                    || frame.contains(CARGO_REGISTRY_DIR)
                    || frame.contains(GLIBC)
                {
                    skipped_frames += 1;
                } else if !frame.is_empty() {
                    if skipped_frames == 1 {
                        acc += &format!("      -- <skipped 1 frame> --\n");
                    } else if skipped_frames > 1 {
                        acc += &format!("      -- <skipped {skipped_frames} frames> --\n");
                    }
                    acc += &format!("{frame}\n");
                    skipped_frames = 0;
                }
                acc
            }),
            Err(_) => bt.clone(),
        };

        if skipped_frames == 1 {
            filtered_bt += &format!("      -- <skipped 1 frame> --");
        } else if skipped_frames > 1 {
            filtered_bt += &format!("      -- <skipped {skipped_frames} frames> --");
        }
        error!(concat!($msg, "\n\n{}\n\nPartial Stack Trace:\n\n{}\n\n") $(, $args)*, $err, filtered_bt);
    };

    ($err:ident, $msg:literal) => {
        gserr! {@hidden $err, $msg, };
    };

    ($err:ident, $msg:literal, $($args:expr),*) => {
        gserr! {@hidden $err, $msg, $($args),*};
    };
}

pub use {err_impl, gserr};
