//! Path canonicalization into the canonical stored-key form: NFC-normalized,
//! forward-slash separated, no leading `/`, no trailing `/`, no bare `.`
//! components.

use unicode_normalization::UnicodeNormalization;

/// Normalizes a relative path string into the canonical stored-key form.
/// Returns `None` if the path would escape the folder root (a leading
/// `..` component) — such events must be rejected by the caller.
pub fn normalize_rel_path(raw: &str) -> Option<String> {
    let nfc: String = raw.nfc().collect();
    let slash_form = nfc.replace('\\', "/");

    let mut parts = Vec::new();
    for component in slash_form.split('/') {
        match component {
            "" | "." => continue,
            ".." => return None,
            other => parts.push(other),
        }
    }

    Some(parts.join("/"))
}
