//! Self-contained viewer document.
//!
//! The template is embedded in the binary. It decodes the data island at
//! open time (base64, inflate, JSON) and lists the captured records.

use rust_embed::Embed;

use crate::error_handling::types::ReportError;

#[derive(Embed)]
#[folder = "assets/"]
struct ViewerAssets;

pub const TEMPLATE_NAME: &str = "viewer.html";
pub const DATA_PLACEHOLDER: &str = "{{BUGSTREAM_DATA}}";
pub const TITLE_PLACEHOLDER: &str = "{{BUGSTREAM_TITLE}}";

/// Opening tag of the element holding the encoded report.
pub const DATA_ISLAND_OPEN: &str = r#"<script id="bugstream-data" type="application/json">"#;
const DATA_ISLAND_CLOSE: &str = "</script>";

fn template() -> Result<String, ReportError> {
    let file = ViewerAssets::get(TEMPLATE_NAME)
        .ok_or_else(|| ReportError::TemplateMissing(TEMPLATE_NAME.to_string()))?;
    String::from_utf8(file.data.into_owned())
        .map_err(|e| ReportError::TemplateMissing(format!("{}: {}", TEMPLATE_NAME, e)))
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Fills the template with an encoded report and a document title.
pub fn render(encoded_report: &str, title: &str) -> Result<String, ReportError> {
    let template = template()?;
    if !template.contains(DATA_PLACEHOLDER) {
        return Err(ReportError::TemplateMissing(format!(
            "{} has no data placeholder",
            TEMPLATE_NAME
        )));
    }
    Ok(template
        .replacen(DATA_PLACEHOLDER, encoded_report, 1)
        .replacen(TITLE_PLACEHOLDER, &escape_html(title), 1))
}

/// Returns the encoded report embedded in a viewer document.
pub fn extract_data_island(html: &str) -> Result<&str, ReportError> {
    let start = html
        .find(DATA_ISLAND_OPEN)
        .ok_or(ReportError::MissingDataIsland)?
        + DATA_ISLAND_OPEN.len();
    let len = html[start..]
        .find(DATA_ISLAND_CLOSE)
        .ok_or(ReportError::MissingDataIsland)?;
    Ok(html[start..start + len].trim())
}
