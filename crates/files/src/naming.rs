use crate::constants::MAX_EXTENSION_LEN;
use chrono::Utc;
use std::path::Path;

/// Lowercased extension of `original_filename`, if it has a usable one.
///
/// Extensions that are longer than a few characters or contain anything other
/// than ASCII letters and digits are dropped rather than carried into storage.
pub fn extension_of(original_filename: &str) -> Option<String> {
    let ext = Path::new(original_filename).extension()?.to_str()?;
    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.bytes().all(|b| b.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Generates a storage name `<token>-<unix_millis>[.<ext>]`.
///
/// `token` is a v4 UUID in its 32-character simple form.
pub fn generate_file_name(original_filename: &str) -> String {
    let token = uuid::Uuid::new_v4().simple();
    let millis = Utc::now().timestamp_millis();
    match extension_of(original_filename) {
        Some(ext) => format!("{token}-{millis}.{ext}"),
        None => format!("{token}-{millis}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("Cover.JPG").as_deref(), Some("jpg"));
        assert_eq!(extension_of("thesis.final.pdf").as_deref(), Some("pdf"));
        assert_eq!(extension_of("README"), None);
        assert_eq!(extension_of("archive."), None);
        assert_eq!(extension_of("weird.p$f"), None);
        assert_eq!(extension_of("long.abcdefghijk"), None);
    }

    #[test]
    fn test_generated_name_shape() {
        let name = generate_file_name("cover.png");
        let (stem, ext) = name.rsplit_once('.').unwrap();
        assert_eq!(ext, "png");

        let (token, millis) = stem.split_once('-').unwrap();
        assert_eq!(token.len(), 32);
        assert!(token.bytes().all(|b| b.is_ascii_hexdigit()));
        assert!(millis.parse::<i64>().unwrap() > 0);
    }

    #[test]
    fn test_generated_name_without_extension() {
        let name = generate_file_name("Makefile");
        assert!(!name.contains('.'));
    }

    #[test]
    fn test_generated_names_are_unique() {
        let a = generate_file_name("a.pdf");
        let b = generate_file_name("a.pdf");
        assert_ne!(a, b);
    }
}
