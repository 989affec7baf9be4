//! Dark store directory for display and default configuration
//! Maps store IDs to neighbourhood names and reference coordinates

use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Store reference entry: (name, lat, lon)
pub static DARK_STORES: LazyLock<BTreeMap<&'static str, (&'static str, f64, f64)>> = LazyLock::new(|| {
    let mut m = BTreeMap::new();

    // Bangalore launch network
    m.insert("DS001", ("Koramangala", 12.9716, 77.5946));
    m.insert("DS002", ("Whitefield", 12.9698, 77.7500));
    m.insert("DS003", ("Malleshwaram", 13.0067, 77.5664));
    m.insert("DS004", ("BTM Layout", 12.9279, 77.6271));
    m.insert("DS005", ("Hebbal", 13.0358, 77.5970));

    m
});

/// Product categories stocked by every dark store
pub const DEFAULT_CATEGORIES: [&str; 8] = [
    "Beverages",
    "Dairy",
    "Frozen Foods",
    "Fruits & Vegetables",
    "Household",
    "Personal Care",
    "Snacks",
    "Staples",
];

/// Get store display name, falling back to the raw ID if not mapped
pub fn get_store_name(store_id: &str) -> String {
    DARK_STORES
        .get(store_id)
        .map(|(name, _, _)| name.to_string())
        .unwrap_or_else(|| format!("Store-{}", store_id))
}

/// Format a store as "Koramangala (DS001)"
pub fn format_store(store_id: &str) -> String {
    format!("{} ({})", get_store_name(store_id), store_id)
}
