//! HTML pages returned to the browser by the OAuth callback.

const STYLE: &str = "body { font-family: system-ui, -apple-system, sans-serif; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; background: #f4f6f9; color: #222; } .container { text-align: center; padding: 2rem; } h1.ok { color: #0061d5; } h1.err { color: #c62828; } p { color: #555; } .error { font-family: monospace; margin-top: 1rem; padding: 1rem; background: rgba(198,40,40,0.08); border-radius: 0.5rem; }";

/// Page shown after a successful authorization.
pub fn success_page() -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <title>Box MCP - Authorization Successful</title>
  <style>{STYLE}</style>
</head>
<body>
  <div class="container">
    <h1 class="ok">Authorization successful</h1>
    <p>You may now close this tab and return to your MCP client.</p>
  </div>
</body>
</html>"#
    )
}

/// Page shown when the callback could not be completed.
pub fn error_page(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <title>Box MCP - Authorization Failed</title>
  <style>{STYLE}</style>
</head>
<body>
  <div class="container">
    <h1 class="err">Authorization failed</h1>
    <p>Your MCP session is still unauthenticated. Call the authorize tool again to retry.</p>
    <div class="error">{}</div>
  </div>
</body>
</html>"#,
        html_escape(message)
    )
}

/// Escape HTML special characters.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_page_escapes_message() {
        let page = error_page("<script>alert('x')</script>");
        assert!(!page.contains("<script>"));
        assert!(page.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_success_page() {
        assert!(success_page().contains("Authorization successful"));
    }
}
