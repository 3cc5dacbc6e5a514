//! Fixtures for building items and keychains

mod keychain;

pub use keychain::{TEST_KDF, TestKeychain};

use keychain_core::Item;

/// A visible item with a few representative options
pub fn sample_item(identifier: &str) -> Item {
    Item::visible(identifier)
        .with_option("account", format!("{identifier}@example.com"))
        .with_option("port", 993i64)
        .with_option("tls", true)
}

/// `count` sample items named `item-00`, `item-01`, ...
pub fn sample_items(count: usize) -> Vec<Item> {
    (0..count)
        .map(|i| sample_item(&format!("item-{i:02}")))
        .collect()
}
