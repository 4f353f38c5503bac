//! Per-recipient body rendering.
use crate::model::{Recipient, TemplateKind};
use crate::template::TemplatePair;

/// Replaced verbatim by the recipient's name; no escaping is applied.
pub const NAME_PLACEHOLDER: &str = "{0}";
/// Content id the inline image part is attached under.
pub const INLINE_IMAGE_CID: &str = "image";
pub const IMAGE_EXTENSION: &str = ".png";

pub fn render(template: &str, name: &str) -> String {
    template.replace(NAME_PLACEHOLDER, name)
}

/// Append the fixed-size inline image reference. Call after substitution.
pub fn with_inline_image(mut body: String) -> String {
    body.push_str(&format!(
        r#"<br><img src="cid:{}" style="max-width:300px;">"#,
        INLINE_IMAGE_CID
    ));
    body
}

/// Image looked up for a recipient: exact name plus the image extension.
pub fn image_file_name(name: &str) -> String {
    format!("{}{}", name, IMAGE_EXTENSION)
}

pub fn render_for(templates: &TemplatePair, recipient: &Recipient) -> String {
    let kind = TemplateKind::for_gender(&recipient.gender);
    render(templates.for_kind(kind), &recipient.name)
}
