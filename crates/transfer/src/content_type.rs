use std::path::Path;

/// Returns the MIME type reported to `set_metadata` for a package file.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "apk" | "aab" => "application/vnd.android.package-archive",
        "msi" => "application/x-msi",
        "plist" => "application/xml",
        "aetx" => "application/c-x509-ca-cert",
        "cer" => "application/pkix-cert",
        "xap" => "application/x-silverlight-app",
        "appx" => "application/x-appx",
        "appxbundle" => "application/x-appxbundle",
        "appxupload" | "appxsym" => "application/x-appxupload",
        "msix" => "application/x-msix",
        "msixbundle" => "application/x-msixbundle",
        "msixupload" | "msixsym" => "application/x-msixupload",
        _ => "application/octet-stream",
    }
}
