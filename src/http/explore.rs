//! Explore mode: render a decrypted appliance document as a browsable HTML
//! page, with every `href` field rewritten into a link back through the
//! gateway's own `/explore/` route.

use serde_json::Value;

// ---------------------------------------------------------------------------
// href rewriting
// ---------------------------------------------------------------------------

/// Rewrite every object field literally named `href` (at any nesting depth)
/// so its string value becomes `/explore/<host><base_path><href>`, resolving
/// the appliance's relative links against the current device path.  Returns
/// the rewritten link targets in traversal order, for linkification.
pub fn rewrite_hrefs(value: &mut Value, host: &str, base_path: &str) -> Vec<String> {
    let mut links = Vec::new();
    walk(value, host, base_path, &mut links);
    links
}

fn walk(value: &mut Value, host: &str, base_path: &str, links: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if key == "href" {
                    if let Value::String(target) = child {
                        let link = format!("/explore/{host}{base_path}{target}");
                        links.push(link.clone());
                        *child = Value::String(link);
                        continue;
                    }
                }
                walk(child, host, base_path, links);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, host, base_path, links);
            }
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// HTML rendering
// ---------------------------------------------------------------------------

/// Escape the five HTML-significant characters.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const PAGE_STYLE: &str = "\
body { font-family: sans-serif; background-color: #f8f9fa; margin: 1em; color: #212529; }\n\
h1 { color: #495057; border-bottom: 1px solid #dee2e6; padding-bottom: 0.5em; }\n\
pre { white-space: pre-wrap; word-wrap: break-word; background-color: #ffffff; \
border: 1px solid #ced4da; padding: 1em; border-radius: 0.25rem; \
font-family: monospace; font-size: 0.9em; }\n\
a { color: #007bff; text-decoration: none; }\n\
a:hover { text-decoration: underline; }\n\
.error { color: #dc3545; background-color: #f8d7da; border: 1px solid #f5c6cb; \
padding: 1em; border-radius: 0.25rem; }\n";

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
         <title>{title}</title>\n<style>\n{PAGE_STYLE}</style>\n</head>\n\
         <body>\n{body}\n</body>\n</html>\n"
    )
}

/// Render the decrypted JSON document, pretty-printed inside `<pre>`, with
/// each rewritten `href` value turned into a clickable anchor.
pub fn render_explore_page(host: &str, path: &str, value: &Value, links: &[String]) -> String {
    let location = escape_html(&format!("{host}{path}"));
    let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    let mut body = escape_html(&pretty);

    let mut seen: Vec<&String> = Vec::new();
    for link in links {
        if seen.contains(&link) {
            continue;
        }
        seen.push(link);
        let escaped = escape_html(link);
        let quoted = format!("&quot;{escaped}&quot;");
        let anchored = format!("&quot;<a href=\"{escaped}\">{escaped}</a>&quot;");
        body = body.replace(&quoted, &anchored);
    }

    page(
        &format!("Explore: {location}"),
        &format!("<h1>{location}</h1>\n<pre>{body}</pre>"),
    )
}

/// Render an empty / no-content appliance response.
pub fn render_empty_page(host: &str, path: &str, status: u16) -> String {
    let location = escape_html(&format!("{host}{path}"));
    page(
        &format!("Explore: {location}"),
        &format!("<h1>{status} No Content</h1>\n<p>Path: {location}</p>"),
    )
}

/// Render a decrypted payload that turned out not to be JSON.
pub fn render_non_json_page(host: &str, path: &str, text: &str) -> String {
    let location = escape_html(&format!("{host}{path}"));
    page(
        "Explore error: response was not valid JSON",
        &format!(
            "<h1>Response was not valid JSON</h1>\n\
             <p class=\"error\">Path: {location}</p>\n<hr>\n<pre>{}</pre>",
            escape_html(text)
        ),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
