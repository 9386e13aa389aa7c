//! Request Module
//!
//! Outbound request descriptors and request identity.

use serde::Deserialize;
use url::Url;

use crate::error::FetchError;

// == Request Descriptor ==
/// One outbound request as handed over by the application.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestDescriptor {
    /// HTTP method; compared case-insensitively
    pub method: String,
    /// Absolute URL, or a path relative to the configured origin
    pub url: String,
    /// Set for top-level page loads
    #[serde(default)]
    pub is_navigation: bool,
    /// Body for mutating requests
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl RequestDescriptor {
    /// A plain GET.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            is_navigation: false,
            body: None,
            content_type: None,
        }
    }

    /// A navigation GET.
    pub fn navigate(url: impl Into<String>) -> Self {
        Self {
            is_navigation: true,
            ..Self::get(url)
        }
    }

    /// A POST with a JSON body.
    pub fn post_json(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: "POST".to_string(),
            url: url.into(),
            is_navigation: false,
            body: Some(body.into()),
            content_type: Some("application/json".to_string()),
        }
    }

    pub fn method(&self) -> String {
        self.method.to_ascii_uppercase()
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    /// Resolves the URL against `origin`.
    pub fn resolve(&self, origin: &Url) -> Result<Url, FetchError> {
        resolve_url(&self.url, origin)
    }

    /// Request identity within `origin`: `METHOD normalized-url`.
    pub fn cache_key(&self, origin: &Url) -> Result<String, FetchError> {
        let url = self.resolve(origin)?;
        Ok(cache_key(&self.method(), &url, origin))
    }

    /// Builds the network call for this request.
    pub fn to_fetch(&self, origin: &Url) -> Result<FetchRequest, FetchError> {
        Ok(FetchRequest {
            method: self.method(),
            url: self.resolve(origin)?,
            body: self.body.as_ref().map(|b| b.clone().into_bytes()),
            content_type: self.content_type.clone(),
        })
    }
}

// == Fetch Request ==
/// A fully resolved network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub method: String,
    pub url: Url,
    pub body: Option<Vec<u8>>,
    pub content_type: Option<String>,
}

impl FetchRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: "GET".to_string(),
            url,
            body: None,
            content_type: None,
        }
    }
}

// == Normalization ==
/// Parses `raw` as an absolute URL, falling back to joining it onto `origin`.
pub fn resolve_url(raw: &str, origin: &Url) -> Result<Url, FetchError> {
    let mut url = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => origin
            .join(raw)
            .map_err(|e| FetchError::InvalidRequest(format!("{}: {}", raw, e)))?,
        Err(e) => return Err(FetchError::InvalidRequest(format!("{}: {}", raw, e))),
    };
    url.set_fragment(None);
    Ok(url)
}

/// Same-origin URLs collapse to `path[?query]`; others keep the full form.
pub fn normalize_url(url: &Url, origin: &Url) -> String {
    if url.origin() == origin.origin() {
        match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        }
    } else {
        url.as_str().to_string()
    }
}

pub fn cache_key(method: &str, url: &Url, origin: &Url) -> String {
    format!("{} {}", method.to_ascii_uppercase(), normalize_url(url, origin))
}
