//! Event groups shipped with the crate.
//!
//! A preset is an ordinary event group with a fixed member list. Enable it
//! from settings with `presets = ["woocommerce"]` or with
//! [`Controller::register_preset`](crate::Controller::register_preset), then
//! list the preset's group name in a profile's events.

use serde::Deserialize;

/// A built-in event group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Any change to WooCommerce products, product categories, tags or
    /// attributes.
    ///
    /// WooCommerce does not report products deleted from the WordPress
    /// dashboard. Hosts fire [`WOOCOMMERCE_PRODUCT_REMOVED`] themselves when
    /// a product post is trashed or deleted.
    WooCommerce,
}

/// Event the host fires when a WooCommerce product post is trashed or
/// deleted.
pub const WOOCOMMERCE_PRODUCT_REMOVED: &str = "fragcache_woocommerce_product_removed";

// Variations, prices and stock all end in a product update
const WOOCOMMERCE_EVENTS: &[&str] = &[
    "create_product_cat",
    "edit_product_cat",
    "delete_product_cat",
    "create_product_tag",
    "edit_product_tag",
    "delete_product_tag",
    "woocommerce_attribute_added",
    "woocommerce_attribute_updated",
    "woocommerce_attribute_deleted",
    "woocommerce_new_product",
    "woocommerce_update_product",
    "woocommerce_delete_product",
    WOOCOMMERCE_PRODUCT_REMOVED,
];

impl Preset {
    /// Every preset.
    pub const ALL: [Preset; 1] = [Preset::WooCommerce];

    /// Returns the group name profiles list to listen to the preset.
    pub fn group_name(self) -> &'static str {
        match self {
            Self::WooCommerce => "fragcache_invalidate_woocommerce",
        }
    }

    /// Returns the member events.
    pub fn events(self) -> &'static [&'static str] {
        match self {
            Self::WooCommerce => WOOCOMMERCE_EVENTS,
        }
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WooCommerce => f.write_str("woocommerce"),
        }
    }
}
