//! Static Asset Manifest
//!
//! Versioned list of URLs that must be fetchable for an install to succeed.

/// App shell pages, stylesheet, script modules, icons and CDN assets.
const STOREFRONT_ASSETS: &[&str] = &[
    "/",
    "/index.html",
    "/menu.html",
    "/cart.html",
    "/order.html",
    "/contact.html",
    "/confirmation.html",
    "/manifest.json",
    "/css/styles.css",
    "/js/app.js",
    "/js/cart.js",
    "/js/menu.js",
    "/js/order.js",
    "/js/contact.js",
    "/icons/icon-192.svg",
    "/icons/icon-512.svg",
    "https://fonts.googleapis.com/css2?family=Playfair+Display:wght@400;600;700&family=Inter:wght@300;400;500;600&display=swap",
    "https://cdnjs.cloudflare.com/ajax/libs/feather-icons/4.29.0/feather.min.css",
    "https://cdnjs.cloudflare.com/ajax/libs/feather-icons/4.29.0/feather.min.js",
];

// == Static Manifest ==
#[derive(Debug, Clone)]
pub struct StaticManifest {
    version: String,
    urls: Vec<String>,
}

impl StaticManifest {
    pub fn new(version: impl Into<String>, urls: Vec<String>) -> Self {
        Self {
            version: version.into(),
            urls,
        }
    }

    /// The storefront's compiled-in asset list.
    pub fn storefront(version: impl Into<String>) -> Self {
        Self::new(
            version,
            STOREFRONT_ASSETS.iter().map(|s| s.to_string()).collect(),
        )
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }
}
