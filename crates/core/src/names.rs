//! Name derivation shared by the roster sync path and the SCIM adapter.

/// Derive a (first, last) name pair from a display name and email address.
///
/// Tried in order: whitespace-separated display name ("Ann Lee"), then a
/// dot-separated display name ("ann.lee"), then the dot-separated email
/// local-part. A bare local-part becomes the first name with an empty last
/// name. Each token is capitalized.
pub fn derive_name(display: &str, email: &str) -> (String, String) {
    let display = display.trim();

    if display.contains(char::is_whitespace) {
        let mut parts = display.split_whitespace();
        let first = capitalize(parts.next().unwrap_or(""));
        let last = parts.map(capitalize).collect::<Vec<_>>().join(" ");
        return (first, last);
    }

    if display.contains('.') {
        return split_dotted(display);
    }

    if let Some((local, _)) = email.split_once('@') {
        if local.contains('.') {
            return split_dotted(local);
        }
        return (capitalize(local), String::new());
    }

    (String::new(), String::new())
}

fn split_dotted(s: &str) -> (String, String) {
    let mut parts = s.split('.');
    let first = capitalize(parts.next().unwrap_or(""));
    let last = capitalize(parts.next().unwrap_or(""));
    (first, last)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}
