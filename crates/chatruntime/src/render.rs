use chatcore::{ContactState, Value, ValueMap};

const FIRST_NAME: &str = "{{contact.firstName}}";
const LAST_NAME: &str = "{{contact.lastName}}";

/// Substitute contact placeholders into the `text` field of message content.
/// Other fields are copied unchanged and unknown placeholders are left as is.
pub fn render(template: &ValueMap, contact: &ContactState) -> ValueMap {
    let mut content = template.clone();
    if let Some(Value::String(text)) = content.get_mut("text") {
        *text = render_text(text, contact);
    }
    content
}

pub fn render_text(text: &str, contact: &ContactState) -> String {
    text.replace(FIRST_NAME, contact.first_name.as_deref().unwrap_or(""))
        .replace(LAST_NAME, contact.last_name.as_deref().unwrap_or(""))
}
