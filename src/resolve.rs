/// Import specifier resolution
/// Maps the specifier written in a module to the request path the loader fetches

use crate::BundleError;
use reqwest::Url;

/// Resolve `specifier` as written inside a module whose resolution base is `resolve_dir`
///
/// - absolute `http(s)` URLs are used as-is
/// - `./`, `../` and `/` paths join onto `resolve_dir`, or the registry root
///   for modules without one (the entry)
/// - bare package names join onto the registry
pub fn resolve_specifier(
    specifier: &str,
    resolve_dir: Option<&str>,
    registry: &Url,
) -> Result<String, BundleError> {
    if specifier.starts_with("http://") || specifier.starts_with("https://") {
        return Url::parse(specifier)
            .map(String::from)
            .map_err(|e| BundleError::resolution(specifier, e));
    }

    if is_relative(specifier) {
        let base = match resolve_dir {
            Some(dir) => Url::parse(dir).map_err(|e| BundleError::resolution(dir, e))?,
            None => registry.clone(),
        };
        return base
            .join(specifier)
            .map(String::from)
            .map_err(|e| BundleError::resolution(specifier, e));
    }

    if specifier.is_empty() {
        return Err(BundleError::resolution(specifier, "empty import specifier"));
    }

    registry
        .join(specifier)
        .map(String::from)
        .map_err(|e| BundleError::resolution(specifier, e))
}

fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/')
}

/// Parse a registry base, forcing a trailing slash so joins append to it
pub fn registry_url(raw: &str) -> Result<Url, BundleError> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized).map_err(|e| BundleError::resolution(raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unpkg() -> Url {
        registry_url("https://unpkg.com").unwrap()
    }

    #[test]
    fn test_bare_specifier() {
        assert_eq!(
            resolve_specifier("react", None, &unpkg()).unwrap(),
            "https://unpkg.com/react"
        );
        assert_eq!(
            resolve_specifier("@scope/pkg", None, &unpkg()).unwrap(),
            "https://unpkg.com/@scope/pkg"
        );
    }

    #[test]
    fn test_relative_specifier_uses_resolve_dir() {
        let dir = Some("https://unpkg.com/tiny@1.2.0/lib/");
        assert_eq!(
            resolve_specifier("./util.js", dir, &unpkg()).unwrap(),
            "https://unpkg.com/tiny@1.2.0/lib/util.js"
        );
        assert_eq!(
            resolve_specifier("../package.json", dir, &unpkg()).unwrap(),
            "https://unpkg.com/tiny@1.2.0/package.json"
        );
    }

    #[test]
    fn test_relative_specifier_from_entry() {
        assert_eq!(
            resolve_specifier("./local.js", None, &unpkg()).unwrap(),
            "https://unpkg.com/local.js"
        );
    }

    #[test]
    fn test_absolute_url_passes_through() {
        assert_eq!(
            resolve_specifier("https://cdn.example.com/lib.js", None, &unpkg()).unwrap(),
            "https://cdn.example.com/lib.js"
        );
    }

    #[test]
    fn test_empty_specifier_fails() {
        assert!(resolve_specifier("", None, &unpkg()).unwrap_err().is_resolution());
    }
}
