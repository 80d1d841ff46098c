//! Script-tag injection into generated pages.

/// Relative URL prefix final scripts are referenced under.
pub const SCRIPT_URL_PREFIX: &str = "./js/items/";

/// Placeholder script tag the page template must contain.
pub const PLACEHOLDER: &str = r#"<script type="text/javascript" src="./js/items/"></script>"#;

/// Script tag referencing the final script `script_name`.
pub fn script_tag(script_name: &str) -> String {
    format!(
        r#"<script type="text/javascript" src="{}{}"></script>"#,
        SCRIPT_URL_PREFIX, script_name
    )
}

/// Point the placeholder script tag at `script_name`.
///
/// Only the first placeholder is replaced. Without a placeholder the page is
/// returned unchanged.
pub fn inject_script(html: &str, script_name: &str) -> String {
    html.replacen(PLACEHOLDER, &script_tag(script_name), 1)
}
