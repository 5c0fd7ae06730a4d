//! Three-tier namespace resolution and `{Type}.{Namespace}.html` filenames
//! (spec §4.11).

/// Resolves the namespace to look a viewdef up under: a variable's explicit
/// `namespace` property, else its `fallbackNamespace` (ViewList sets
/// `"list-item"`), else `"DEFAULT"`.
pub fn resolve_namespace<'a>(explicit: Option<&'a str>, fallback: Option<&'a str>) -> &'a str {
    explicit.or(fallback).unwrap_or("DEFAULT")
}

/// Parses a viewdef filename (`Contact.DEFAULT.html` or the unqualified
/// `Contact.html`, which defaults to the `DEFAULT` namespace).
pub fn parse_filename(name: &str) -> Option<(String, String)> {
    let stem = name.strip_suffix(".html")?;
    match stem.rsplit_once('.') {
        Some((type_name, namespace)) if !type_name.is_empty() && !namespace.is_empty() => {
            Some((type_name.to_string(), namespace.to_string()))
        }
        _ if !stem.is_empty() => Some((stem.to_string(), "DEFAULT".to_string())),
        _ => None,
    }
}

/// The key used to address the delivered-viewdefs JSON map (`"Type.Namespace"`).
pub fn viewdef_key(type_name: &str, namespace: &str) -> String {
    format!("{type_name}.{namespace}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_qualified_and_unqualified_filenames() {
        assert_eq!(
            parse_filename("Contact.DEFAULT.html"),
            Some(("Contact".to_string(), "DEFAULT".to_string()))
        );
        assert_eq!(
            parse_filename("Contact.html"),
            Some(("Contact".to_string(), "DEFAULT".to_string()))
        );
        assert_eq!(
            parse_filename("ContactPresenter.list-item.html"),
            Some(("ContactPresenter".to_string(), "list-item".to_string()))
        );
    }

    #[test]
    fn resolution_prefers_explicit_then_fallback_then_default() {
        assert_eq!(resolve_namespace(Some("custom"), Some("list-item")), "custom");
        assert_eq!(resolve_namespace(None, Some("list-item")), "list-item");
        assert_eq!(resolve_namespace(None, None), "DEFAULT");
    }
}
