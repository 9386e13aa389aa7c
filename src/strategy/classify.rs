//! Request Classifier
//!
//! Maps an outbound request to the class that picks its fetch strategy.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use url::Url;

use crate::lifecycle::StaticManifest;
use crate::network::{normalize_url, resolve_url, RequestDescriptor};

/// Hosts whose content is always treated as dynamic (menu photography).
const DYNAMIC_HOSTS: &[&str] = &["pixabay.com"];
const IMAGE_SEGMENT: &str = "images";
const API_PREFIX: &str = "/api/";

// == Request Class ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestClass {
    Navigation,
    StaticAsset,
    DynamicAsset,
    Api,
    Default,
}

impl fmt::Display for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestClass::Navigation => "navigation",
            RequestClass::StaticAsset => "static-asset",
            RequestClass::DynamicAsset => "dynamic-asset",
            RequestClass::Api => "api",
            RequestClass::Default => "default",
        };
        f.write_str(name)
    }
}

// == Request Classifier ==
#[derive(Debug, Clone)]
pub struct RequestClassifier {
    origin: Url,
    /// Normalized manifest URLs
    static_urls: HashSet<String>,
    dynamic_hosts: Vec<String>,
    api_prefix: String,
}

impl RequestClassifier {
    pub fn new(origin: Url, manifest: &StaticManifest) -> Self {
        let static_urls = manifest
            .urls()
            .iter()
            .filter_map(|raw| resolve_url(raw, &origin).ok())
            .map(|url| normalize_url(&url, &origin))
            .collect();

        Self {
            origin,
            static_urls,
            dynamic_hosts: DYNAMIC_HOSTS.iter().map(|h| h.to_string()).collect(),
            api_prefix: API_PREFIX.to_string(),
        }
    }

    // == Classify ==
    /// First match wins: method, navigation flag, exact manifest
    /// membership, dynamic patterns, API prefix.
    ///
    /// Manifest membership is checked before any prefix rule so a shell page
    /// is never taken for an API call.
    pub fn classify(&self, request: &RequestDescriptor) -> RequestClass {
        if !request.is_get() {
            return RequestClass::Default;
        }
        if request.is_navigation {
            return RequestClass::Navigation;
        }

        let url = match request.resolve(&self.origin) {
            Ok(url) => url,
            Err(_) => return RequestClass::Default,
        };

        if self.static_urls.contains(&normalize_url(&url, &self.origin)) {
            RequestClass::StaticAsset
        } else if self.is_dynamic(&url) {
            RequestClass::DynamicAsset
        } else if self.is_api(&url) {
            RequestClass::Api
        } else {
            RequestClass::Default
        }
    }

    /// Path starts with the API prefix.
    pub fn is_api(&self, url: &Url) -> bool {
        url.path().starts_with(&self.api_prefix)
    }

    fn is_dynamic(&self, url: &Url) -> bool {
        let host_match = url.host_str().is_some_and(|host| {
            host.split('.').next() == Some(IMAGE_SEGMENT)
                || self
                    .dynamic_hosts
                    .iter()
                    .any(|h| host == h || host.ends_with(&format!(".{}", h)))
        });
        let path_match = url
            .path_segments()
            .is_some_and(|mut segments| segments.any(|s| s == IMAGE_SEGMENT));

        host_match || path_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> RequestClassifier {
        RequestClassifier::new(
            Url::parse("http://localhost:8080").unwrap(),
            &StaticManifest::storefront("1.0.0"),
        )
    }

    #[test]
    fn test_non_get_is_default_even_for_api() {
        let req = RequestDescriptor::post_json("/api/orders", "{}");
        assert_eq!(classifier().classify(&req), RequestClass::Default);
    }

    #[test]
    fn test_navigation_wins_over_manifest() {
        let req = RequestDescriptor::navigate("/menu.html");
        assert_eq!(classifier().classify(&req), RequestClass::Navigation);
    }

    #[test]
    fn test_manifest_members_are_static() {
        let c = classifier();
        for url in [
            "/css/styles.css",
            "/js/menu.js",
            "http://localhost:8080/icons/icon-192.svg",
            "https://cdnjs.cloudflare.com/ajax/libs/feather-icons/4.29.0/feather.min.js",
        ] {
            assert_eq!(c.classify(&RequestDescriptor::get(url)), RequestClass::StaticAsset, "{}", url);
        }
    }

    #[test]
    fn test_manifest_checked_before_api_prefix() {
        let manifest = StaticManifest::new("1", vec!["/api/help.html".to_string()]);
        let c = RequestClassifier::new(Url::parse("http://localhost:8080").unwrap(), &manifest);
        assert_eq!(
            c.classify(&RequestDescriptor::get("/api/help.html")),
            RequestClass::StaticAsset
        );
        assert_eq!(c.classify(&RequestDescriptor::get("/api/menu")), RequestClass::Api);
    }

    #[test]
    fn test_manifest_match_is_exact() {
        let c = classifier();
        assert_eq!(
            c.classify(&RequestDescriptor::get("/css/styles.css.map")),
            RequestClass::Default
        );
    }

    #[test]
    fn test_dynamic_patterns() {
        let c = classifier();
        for url in [
            "https://cdn.pixabay.com/photo/2017/01/22/19/20/pizza.jpg",
            "/images/tiramisu.jpg",
            "https://images.example.com/pasta.png",
        ] {
            assert_eq!(c.classify(&RequestDescriptor::get(url)), RequestClass::DynamicAsset, "{}", url);
        }
    }

    #[test]
    fn test_api_and_default() {
        let c = classifier();
        assert_eq!(c.classify(&RequestDescriptor::get("/api/menu")), RequestClass::Api);
        assert_eq!(c.classify(&RequestDescriptor::get("/favicon.ico")), RequestClass::Default);
    }
}
