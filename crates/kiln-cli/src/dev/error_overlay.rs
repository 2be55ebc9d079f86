//! HTML pages the dev server shows instead of the application: the build
//! error overlay and the placeholder served while the first compile runs.
//!
//! Both pages listen on the hot-update stream and reload themselves once a
//! good bundle is available.

use super::HOT_PATH;

/// Page listing compile errors. Error text is HTML-escaped.
pub fn render_errors(errors: &[String]) -> String {
    let items: String = errors
        .iter()
        .map(|error| format!("<pre>{}</pre>\n", html_escape(error)))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Failed to compile</title>
<style>
body {{ margin: 0; padding: 2rem; background: #1e1e1e; color: #e8e8e8; font-family: Menlo, Consolas, monospace; }}
h1 {{ color: #ff5555; font-size: 1.25rem; }}
pre {{ background: #2b2b2b; padding: 1rem; border-left: 4px solid #ff5555; overflow-x: auto; white-space: pre-wrap; }}
</style>
</head>
<body>
<h1>Failed to compile ({count} error{plural})</h1>
{items}<p>This page reloads when the build succeeds.</p>
{script}
</body>
</html>
"#,
        count = errors.len(),
        plural = if errors.len() == 1 { "" } else { "s" },
        items = items,
        script = reload_script(),
    )
}

/// Page served while no compilation exists yet.
pub fn render_compiling() -> String {
    COMPILING_PAGE.to_string()
}

const COMPILING_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Compiling...</title></head>
<body>
<p>Compiling... this page reloads when the bundle is ready.</p>
<script>setTimeout(function () { location.reload(); }, 1000);</script>
</body>
</html>
"#;

fn reload_script() -> String {
    format!(
        r#"<script>
(function () {{
  var source = new EventSource("{HOT_PATH}");
  source.onmessage = function (event) {{
    var message = JSON.parse(event.data);
    if (message.action === "built" || message.action === "reload") {{
      location.reload();
    }}
  }};
}})();
</script>"#
    )
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
