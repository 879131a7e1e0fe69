//! Response header values for direct downloads

/// `Content-Type` for a blob.
///
/// When an encoding is declared, any parameters on the MIME type are
/// replaced by a single `charset` parameter.
pub fn content_type(mime_type: Option<&str>, encoding: Option<&str>) -> Option<String> {
    let mime_type = mime_type.map(str::trim).filter(|m| !m.is_empty())?;

    match encoding.map(str::trim).filter(|e| !e.is_empty()) {
        Some(encoding) => {
            let base = match mime_type.find(';') {
                Some(i) => mime_type[..i].trim_end(),
                None => mime_type,
            };
            Some(format!("{}; charset={}", base, encoding))
        }
        None => Some(mime_type.to_string()),
    }
}

/// `Content-Disposition` offering the blob as an attachment.
///
/// The filename uses the RFC 5987 extended notation so that non-ASCII
/// names survive intact.
pub fn content_disposition(filename: &str) -> String {
    format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}
