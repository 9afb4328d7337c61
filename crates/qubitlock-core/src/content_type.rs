//! File-name extension helpers shared by compression selection and content-type detection

/// Lowercased text after the last `.` in `file_name`, or an empty string when there is no dot.
pub fn extension(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// MIME type derived from the file extension. Unknown extensions map to
/// `application/octet-stream`.
pub fn detect_content_type(file_name: &str) -> &'static str {
    match extension(file_name).as_str() {
        "txt" | "log" => "text/plain",
        "json" => "application/json",
        "xml" => "application/xml",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "csv" => "text/csv",
        "md" => "text/markdown",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_uses_last_dot_and_lowercases() {
        assert_eq!(extension("report.TXT"), "txt");
        assert_eq!(extension("backup.tar.gz"), "gz");
        assert_eq!(extension("Makefile"), "");
        assert_eq!(extension("trailing."), "");
    }

    #[test]
    fn known_content_types() {
        assert_eq!(detect_content_type("notes.txt"), "text/plain");
        assert_eq!(detect_content_type("server.log"), "text/plain");
        assert_eq!(detect_content_type("index.HTM"), "text/html");
        assert_eq!(detect_content_type("photo.jpeg"), "image/jpeg");
        assert_eq!(detect_content_type("data.json"), "application/json");
    }

    #[test]
    fn unknown_content_type_falls_back_to_octet_stream() {
        assert_eq!(detect_content_type("disk.img"), "application/octet-stream");
        assert_eq!(detect_content_type("noext"), "application/octet-stream");
    }
}
