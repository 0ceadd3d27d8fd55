// Builds an `Option<BTreeMap<String, String>>` for labels, annotations, selectors, etc:
//
//   klabel!(APP_KUBERNETES_IO_NAME_KEY => "cluster", "foo" => bar)
#[macro_export]
macro_rules! klabel {
    ($($key:expr => $val:expr),+$(,)?) => {
        Some(BTreeMap::from([$(($key.to_string(), $val.to_string())),+]))
    };
}

// Same as klabel!, without the Option wrapper
#[macro_export]
macro_rules! kmap {
    ($($key:expr => $val:expr),+$(,)?) => {
        BTreeMap::from([$(($key.to_string(), $val.to_string())),+])
    };
}

pub use std::collections::BTreeMap;

pub use {klabel, kmap};
