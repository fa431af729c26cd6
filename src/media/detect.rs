//! File type detection: magic bytes first, then headers, then the URL path.

use url::Url;

/// Infer a file extension (without the dot) for a fetched payload.
///
/// Detection order:
/// 1. magic-byte sniff of the body,
/// 2. the `Content-Type` response header,
/// 3. the extension segment of the URL path.
pub fn detect_extension(url: &str, content_type: Option<&str>, body: &[u8]) -> Option<String> {
    if let Some(kind) = infer::get(body) {
        return Some(kind.extension().to_string());
    }

    if let Some(content_type) = content_type {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or(content_type)
            .trim()
            .to_ascii_lowercase();
        if let Some(ext) = extension_for_mime(&essence) {
            return Some(ext.to_string());
        }
    }

    url_path_extension(url)
}

/// Map a MIME essence to a file extension.
fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let ext = match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "image/avif" => "avif",
        "image/bmp" => "bmp",
        "image/x-icon" | "image/vnd.microsoft.icon" => "ico",
        "image/heic" => "heic",
        "image/heif" => "heif",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/ogg" => "ogv",
        "video/quicktime" => "mov",
        "audio/mpeg" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/ogg" => "ogg",
        "audio/mp4" => "m4a",
        "application/pdf" => "pdf",
        "application/json" => "json",
        "application/zip" => "zip",
        "text/csv" => "csv",
        "text/plain" => "txt",
        _ => return None,
    };
    Some(ext)
}

/// Take the first maximal alphabetic run of the final extension segment of
/// the URL path.
fn url_path_extension(raw: &str) -> Option<String> {
    let path = match Url::parse(raw) {
        Ok(url) => url.path().to_string(),
        // Relative or otherwise unparseable reference: drop query/fragment by hand.
        Err(_) => raw
            .split(['?', '#'])
            .next()
            .unwrap_or(raw)
            .to_string(),
    };

    let segment = path.rsplit('/').next()?;
    let (_, ext_segment) = segment.rsplit_once('.')?;
    let run: String = ext_segment
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if run.is_empty() {
        None
    } else {
        Some(run.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_win() {
        let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        png.extend_from_slice(&[0u8; 32]);
        // The header and URL both lie; the bytes decide.
        let ext = detect_extension("https://x.example/a.gif", Some("image/jpeg"), &png);
        assert_eq!(ext.as_deref(), Some("png"));
    }

    #[test]
    fn heic_brand_is_sniffed() {
        let mut body = vec![0x00, 0x00, 0x00, 0x18];
        body.extend_from_slice(b"ftypheic");
        body.extend_from_slice(&[0u8; 32]);
        let ext = detect_extension("https://x.example/photo", None, &body);
        assert_eq!(ext.as_deref(), Some("heic"));
    }

    #[test]
    fn content_type_fallback() {
        let ext = detect_extension(
            "https://x.example/download?id=9",
            Some("image/jpeg; charset=binary"),
            &[0u8; 16],
        );
        assert_eq!(ext.as_deref(), Some("jpg"));
    }

    #[test]
    fn url_path_fallback() {
        let ext = detect_extension("https://x.example/dir/photo.GIF?w=100", None, &[0u8; 16]);
        assert_eq!(ext.as_deref(), Some("gif"));
    }

    #[test]
    fn url_extension_takes_leading_alphabetic_run() {
        let ext = detect_extension("https://x.example/pic.jpg2000", None, &[0u8; 4]);
        assert_eq!(ext.as_deref(), Some("jpg"));
    }

    #[test]
    fn no_signal_yields_none() {
        assert_eq!(detect_extension("https://x.example/asset", None, &[0u8; 4]), None);
        assert_eq!(
            detect_extension("https://x.example/v2/asset", Some("application/x-thing"), &[]),
            None
        );
    }

    #[test]
    fn mime_map_covers_the_storage_classes() {
        assert_eq!(extension_for_mime("image/svg+xml"), Some("svg"));
        assert_eq!(extension_for_mime("video/mp4"), Some("mp4"));
        assert_eq!(extension_for_mime("application/pdf"), Some("pdf"));
        assert_eq!(extension_for_mime("application/x-unknown"), None);
    }
}
