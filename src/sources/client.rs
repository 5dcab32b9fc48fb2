// src/sources/client.rs
use crate::sources::models::{DocumentFormat, DocumentSource};
use crate::utils::error::{AppError, FetchError};
use reqwest::header::{self, HeaderMap, HeaderValue};
use scraper::{node::Node, ElementRef, Html};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

// Browser-like identity; the UNFCCC site rejects obvious bots
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const DEFAULT_TIMEOUT_SECS: u64 = 45;
const MAX_REDIRECTS: usize = 10;

// Markers of the site's WAF interstitial page
const BLOCK_MARKERS: &[&str] = &["_Incapsula_Resource", "Request unsuccessful"];

const SKIPPED_ELEMENTS: &[&str] = &["head", "script", "style", "noscript", "template"];
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "caption", "dd", "div", "dl", "dt",
    "figcaption", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li",
    "main", "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Loads cookies from a JSON object of name/value pairs. Non-string values are
/// stringified.
pub fn load_cookies(path: &Path) -> Result<BTreeMap<String, String>, AppError> {
    let raw = std::fs::read_to_string(path)?;
    parse_cookies(&raw).map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))
}

pub fn parse_cookies(raw: &str) -> Result<BTreeMap<String, String>, String> {
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    let object = value
        .as_object()
        .ok_or_else(|| "Cookie file must contain a JSON object of name/value pairs".to_string())?;

    Ok(object
        .iter()
        .map(|(name, value)| {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (name.clone(), value)
        })
        .collect())
}

/// Renders cookies as a `Cookie` header value.
pub fn cookie_header(cookies: &BTreeMap<String, String>) -> String {
    cookies
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Creates a reqwest client with browser headers, cookies and a request timeout.
fn build_http_client(
    cookies: &BTreeMap<String, String>,
    timeout: Duration,
) -> Result<reqwest::Client, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    if !cookies.is_empty() {
        let value = HeaderValue::from_str(&cookie_header(cookies))
            .map_err(|e| FetchError::InvalidHeader(format!("Cookie: {}", e)))?;
        headers.insert(header::COOKIE, value);
    }

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()?;
    Ok(client)
}

/// Downloads remote documents into a cache directory.
pub struct DocumentClient {
    http: reqwest::Client,
    download_dir: PathBuf,
    force_download: bool,
}

impl DocumentClient {
    pub fn new(
        cookies: &BTreeMap<String, String>,
        timeout: Duration,
        download_dir: impl Into<PathBuf>,
        force_download: bool,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            http: build_http_client(cookies, timeout)?,
            download_dir: download_dir.into(),
            force_download,
        })
    }

    /// Returns a local path holding the document, downloading it if needed.
    /// Cached downloads are reused unless the client was built with `force_download`.
    pub async fn fetch(&self, source: &DocumentSource) -> Result<PathBuf, FetchError> {
        if let Some(path) = &source.local_path {
            tracing::info!("Using local document: {}", path.display());
            return Ok(path.clone());
        }

        let guessed = self.download_dir.join(source.download_file_name(None));
        if guessed.is_file() && !self.force_download {
            tracing::info!("Skipping download (exists): {}", guessed.display());
            return Ok(guessed);
        }

        tracing::info!("Downloading document from: {}", source.url);
        let response = self.http.get(&source.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!("HTTP error status: {} for URL: {}", status, source.url);
            if status == reqwest::StatusCode::FORBIDDEN {
                tracing::warn!("Received 403 Forbidden - cookies may be stale.");
                return Err(FetchError::Blocked(source.url.clone()));
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(FetchError::NotFound(source.url.clone()));
            }
            return Err(FetchError::Http {
                status,
                url: source.url.clone(),
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;
        tracing::debug!("Downloaded {} bytes from {}", body.len(), source.url);

        let is_html = content_type.as_deref().is_some_and(|ct| ct.contains("html"));
        if is_html {
            let text = String::from_utf8_lossy(&body);
            if BLOCK_MARKERS.iter().any(|marker| text.contains(marker)) {
                tracing::error!(
                    "Blocked by site protection when requesting {}. Refresh the cookies file from a browser session.",
                    source.url
                );
                return Err(FetchError::Blocked(source.url.clone()));
            }
        }

        tokio::fs::create_dir_all(&self.download_dir).await?;
        let path = self
            .download_dir
            .join(source.download_file_name(content_type.as_deref()));
        tokio::fs::write(&path, &body).await?;
        tracing::info!("Saved download to {}", path.display());
        Ok(path)
    }
}

/// Reads a document from disk and returns its raw text.
/// HTML is reduced to text; PDFs are rejected.
pub async fn load_document_text(path: &Path) -> Result<String, FetchError> {
    let format = DocumentFormat::from_path(path);
    if format == Some(DocumentFormat::Pdf) {
        return Err(FetchError::UnsupportedFormat(format!(
            "PDF text extraction is not supported, convert {} to text first",
            path.display()
        )));
    }

    let bytes = tokio::fs::read(path).await?;
    let raw = String::from_utf8_lossy(&bytes);

    let looks_like_html = format.is_none() && {
        let head = raw.trim_start();
        head.starts_with('<') && head.get(..512).unwrap_or(head).to_ascii_lowercase().contains("<html")
    };

    if format == Some(DocumentFormat::Html) || looks_like_html {
        tracing::debug!("Reducing HTML document {} to text", path.display());
        Ok(html_to_text(&raw))
    } else {
        Ok(raw.into_owned())
    }
}

/// Flattens an HTML document to text, one line per block element.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();
    push_element_text(document.root_element(), &mut out);

    out.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn push_element_text(element: ElementRef, out: &mut String) {
    let name = element.value().name();
    if SKIPPED_ELEMENTS.contains(&name) {
        return;
    }
    if name == "br" {
        out.push('\n');
        return;
    }

    let is_block = BLOCK_ELEMENTS.contains(&name);
    if is_block {
        out.push('\n');
    }

    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            push_element_text(child_element, out);
        } else if let Node::Text(text_node) = child.value() {
            push_collapsed(&text_node.text, out);
        }
    }

    if is_block {
        out.push('\n');
    }
}

// Source-formatting whitespace inside a text node is not a line break
fn push_collapsed(text: &str, out: &mut String) {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        if !text.is_empty() && !out.ends_with(char::is_whitespace) {
            out.push(' ');
        }
        return;
    }
    if text.starts_with(char::is_whitespace) && !out.ends_with(char::is_whitespace) {
        out.push(' ');
    }
    out.push_str(&words.join(" "));
    if text.ends_with(char::is_whitespace) {
        out.push(' ');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_html_to_text_breaks_on_blocks() {
        let html = r#"
            <!DOCTYPE html>
            <html><head><title>Ignored</title><style>p { color: red; }</style></head><body>
            <h2>IV. Key
                barriers</h2>
            <p>Limited <b>technical</b> capacity.<br/>Second line.</p>
            <script>var x = "Main barriers";</script>
            <ul><li>Data gaps</li><li>Funding</li></ul>
            </body></html>
        "#;
        let text = html_to_text(html);
        assert_eq!(
            text,
            "IV. Key barriers\nLimited technical capacity.\nSecond line.\nData gaps\nFunding"
        );
    }

    #[test]
    fn test_parse_cookies() {
        let cookies = parse_cookies(r#"{"visid_incap": "abc", "count": 3, "ok": true}"#).unwrap();
        assert_eq!(cookies.get("visid_incap").map(String::as_str), Some("abc"));
        assert_eq!(cookies.get("count").map(String::as_str), Some("3"));
        assert_eq!(cookie_header(&cookies), "count=3; ok=true; visid_incap=abc");

        assert!(parse_cookies(r#"[["a", "b"]]"#).is_err());
        assert!(parse_cookies("not json").is_err());
    }

    #[test]
    fn test_load_document_text_by_format() {
        let dir = tempfile::tempdir().unwrap();

        let txt = dir.path().join("cuba_bur2.txt");
        std::fs::write(&txt, "Key barriers\nLack of data").unwrap();
        let loaded = tokio_test::block_on(load_document_text(&txt)).unwrap();
        assert_eq!(loaded, "Key barriers\nLack of data");

        let html = dir.path().join("cuba_bur2.html");
        std::fs::write(&html, "<html><body><p>Key barriers</p><p>Lack of data</p></body></html>").unwrap();
        let loaded = tokio_test::block_on(load_document_text(&html)).unwrap();
        assert_eq!(loaded, "Key barriers\nLack of data");

        // No extension, sniffed as HTML
        let sniffed = dir.path().join("624150");
        let mut file = std::fs::File::create(&sniffed).unwrap();
        write!(file, "<!DOCTYPE html><html><body><div>Main barriers</div></body></html>").unwrap();
        let loaded = tokio_test::block_on(load_document_text(&sniffed)).unwrap();
        assert_eq!(loaded, "Main barriers");

        let pdf = dir.path().join("cuba_bur2.pdf");
        std::fs::write(&pdf, b"%PDF-1.7").unwrap();
        let err = tokio_test::block_on(load_document_text(&pdf)).unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_fetch_returns_local_path_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("Kenya_NDC.txt");
        std::fs::write(&doc, "text").unwrap();
        let source = DocumentSource::from_local_path(&doc).unwrap();

        let client = DocumentClient::new(
            &BTreeMap::new(),
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            dir.path().join("downloads"),
            false,
        )
        .unwrap();
        let path = tokio_test::block_on(client.fetch(&source)).unwrap();
        assert_eq!(path, doc.canonicalize().unwrap());
    }

    // Serves the same canned response to every connection
    async fn serve(status: &'static str, content_type: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = vec![0u8; 4096];
                let _ = socket.read(&mut request).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    content_type,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{}", addr)
    }

    fn local_client(download_dir: &Path, force_download: bool) -> DocumentClient {
        DocumentClient {
            http: reqwest::Client::builder()
                .no_proxy()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap(),
            download_dir: download_dir.to_path_buf(),
            force_download,
        }
    }

    async fn fetch_from(
        status: &'static str,
        content_type: &'static str,
        body: &'static str,
        download_dir: &Path,
    ) -> Result<PathBuf, FetchError> {
        let base = serve(status, content_type, body).await;
        let source = DocumentSource::from_url(&format!("{}/files/Cuba_BUR1.txt", base)).unwrap();
        local_client(download_dir, false).fetch(&source).await
    }

    #[test]
    fn test_fetch_maps_error_statuses() {
        let dir = tempfile::tempdir().unwrap();
        tokio_test::block_on(async {
            let err = fetch_from("403 Forbidden", "text/html", "denied", dir.path()).await.unwrap_err();
            assert!(matches!(err, FetchError::Blocked(_)));

            let err = fetch_from("404 Not Found", "text/html", "missing", dir.path()).await.unwrap_err();
            assert!(matches!(err, FetchError::NotFound(_)));

            let err = fetch_from("500 Internal Server Error", "text/plain", "oops", dir.path())
                .await
                .unwrap_err();
            match err {
                FetchError::Http { status, url } => {
                    assert_eq!(status, reqwest::StatusCode::INTERNAL_SERVER_ERROR);
                    assert!(url.ends_with("/files/Cuba_BUR1.txt"));
                }
                other => panic!("expected Http error, got {:?}", other),
            }
        });
        assert!(!dir.path().join("Cuba_BUR1.txt").exists());
    }

    #[test]
    fn test_fetch_detects_waf_page() {
        let dir = tempfile::tempdir().unwrap();
        let body = "<html><head><script src=\"/_Incapsula_Resource?x=1\"></script></head><body></body></html>";
        let err = tokio_test::block_on(fetch_from("200 OK", "text/html; charset=utf-8", body, dir.path()))
            .unwrap_err();
        assert!(matches!(err, FetchError::Blocked(_)));
        assert!(!dir.path().join("Cuba_BUR1.txt").exists());
    }

    #[test]
    fn test_fetch_saves_download_and_forces_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let cached = dir.path().join("Cuba_BUR1.txt");

        tokio_test::block_on(async {
            let base = serve("200 OK", "text/plain", "Key barriers\nfresh body").await;
            let source = DocumentSource::from_url(&format!("{}/files/Cuba_BUR1.txt", base)).unwrap();

            let path = local_client(dir.path(), false).fetch(&source).await.unwrap();
            assert_eq!(path, cached);
            assert_eq!(std::fs::read_to_string(&cached).unwrap(), "Key barriers\nfresh body");

            std::fs::write(&cached, "stale").unwrap();
            local_client(dir.path(), false).fetch(&source).await.unwrap();
            assert_eq!(std::fs::read_to_string(&cached).unwrap(), "stale");

            let path = local_client(dir.path(), true).fetch(&source).await.unwrap();
            assert_eq!(path, cached);
            assert_eq!(std::fs::read_to_string(&cached).unwrap(), "Key barriers\nfresh body");
        });
    }

    #[test]
    fn test_fetch_reuses_cached_download() {
        let dir = tempfile::tempdir().unwrap();
        let cached = dir.path().join("Cuba_BUR2.txt");
        std::fs::write(&cached, "cached").unwrap();
        let source = DocumentSource::from_url("https://unfccc.int/files/Cuba_BUR2.txt").unwrap();

        let client = DocumentClient::new(&BTreeMap::new(), Duration::from_secs(1), dir.path(), false).unwrap();
        let path = tokio_test::block_on(client.fetch(&source)).unwrap();
        assert_eq!(path, cached);
    }
}
