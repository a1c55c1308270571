//! Integration help page
//!
//! Serves the configured markdown file (the README by default) as HTML.

use crate::api::endpoints::AppState;
use crate::core::constants::message;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use pulldown_cmark::{Options, Parser, html};
use tracing::error;

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Proxai - OpenAI API Proxy</title>
    <script src="https://cdn.tailwindcss.com"></script>
</head>
<body class="bg-gray-100 text-red-900 font-sans">
    <div class="container mx-auto px-4 py-8">"#;

const PAGE_TAIL: &str = r#"</div>
</body>
</html>
"#;

/// Render markdown into the full help page
pub fn render_help_page(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let parser = Parser::new_ext(markdown, options);

    let mut page = String::with_capacity(PAGE_HEAD.len() + markdown.len() * 2);
    page.push_str(PAGE_HEAD);
    html::push_html(&mut page, parser);
    page.push_str(PAGE_TAIL);
    page
}

/// GET /help - Render the help file
pub async fn help(State(state): State<AppState>) -> Response {
    let path = &state.config.help.file;
    match tokio::fs::read_to_string(path).await {
        Ok(markdown) => Html(render_help_page(&markdown)).into_response(),
        Err(e) => {
            error!("Failed to read help file {}: {}", path.display(), e);
            (StatusCode::INTERNAL_SERVER_ERROR, message::INTERNAL_ERROR).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_help_page() {
        let page = render_help_page("# Proxai\n\nPoint your client at `http://localhost:8080/v1`.");
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<title>Proxai - OpenAI API Proxy</title>"));
        assert!(page.contains("<h1>Proxai</h1>"));
        assert!(page.contains("<code>http://localhost:8080/v1</code>"));
        assert!(page.trim_end().ends_with("</html>"));
    }

    #[test]
    fn test_render_table() {
        let page = render_help_page("| flag | default |\n|---|---|\n| --port | 8080 |\n");
        assert!(page.contains("<table>"));
        assert!(page.contains("<td>--port</td>"));
    }
}
