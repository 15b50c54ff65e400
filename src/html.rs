//! Renders the self-contained dashboard page.

use crate::payload::Payload;
use anyhow::{Context, Result};

const TEMPLATE: &str = include_str!("../assets/dashboard.html");
const TITLE_SLOT: &str = "__DASHBOARD_TITLE__";
const PAYLOAD_SLOT: &str = "__DASHBOARD_PAYLOAD__";

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

/// The page with `payload` inlined as JSON and `title` in the heading.
pub fn render_dashboard(payload: &Payload, title: &str) -> Result<String> {
    let (head, tail) = TEMPLATE
        .split_once(PAYLOAD_SLOT)
        .context("dashboard template has no payload slot")?;
    let title = escape_html(title);
    let json = payload.to_inline_json()?;
    Ok(format!(
        "{}{}{}",
        head.replace(TITLE_SLOT, &title),
        json,
        tail.replace(TITLE_SLOT, &title)
    ))
}
