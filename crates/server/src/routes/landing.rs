//! Landing page

use axum::{extract::State, response::Html};

use crate::AppState;

/// GET / - Landing page naming the deployed service and revision
pub async fn index(State(state): State<AppState>) -> Html<String> {
    let service = escape_html(&state.service.service);
    let revision = escape_html(&state.service.revision);

    Html(format!(
        r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>FHIR Proxy</title>
</head>
<body>
  <h1>FHIR Proxy</h1>
  <p>POST a FHIR Patient or Observation as JSON to <code>/fhir-proxy</code>.</p>
  <dl>
    <dt>Service</dt><dd>{service}</dd>
    <dt>Revision</dt><dd>{revision}</dd>
  </dl>
</body>
</html>
"#
    ))
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
