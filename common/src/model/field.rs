use serde::{Deserialize, Serialize};

/// Horizontal anchoring of a field's text relative to its `x` coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// A text slot on a certificate template.
///
/// A field is both a piece of layout (where and how its value is drawn on the
/// template image) and a column of the bulk input: its `label` is the header
/// expected in pasted or uploaded tables.
///
/// `x` and `y` are pixel coordinates on the template image, origin top-left.
/// `x` is the left edge, the centre or the right edge of the text depending on
/// `alignment`; `y` is the top of the text line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub sample_value: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default = "default_font_size")]
    pub font_size: u8,
    /// Font family name; `None` renders with the service's default family.
    #[serde(default)]
    pub font_family: Option<String>,
    /// `#rrggbb`
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub alignment: TextAlign,
}

fn default_visible() -> bool {
    true
}

fn default_font_size() -> u8 {
    24
}

fn default_color() -> String {
    "#000000".to_string()
}

impl Field {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            sample_value: String::new(),
            x: 0.0,
            y: 0.0,
            required: false,
            visible: default_visible(),
            font_size: default_font_size(),
            font_family: None,
            color: default_color(),
            alignment: TextAlign::Left,
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Editable fields are the visible ones: they take part in header
    /// validation and receive per-row values.
    pub fn is_editable(&self) -> bool {
        self.visible
    }
}

/// Returns the editable subset of `fields`, preserving order.
pub fn editable_fields(fields: &[Field]) -> Vec<Field> {
    fields.iter().filter(|f| f.is_editable()).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_defaults() {
        let field: Field =
            serde_json::from_str(r#"{"id":"name","label":"Name","x":10,"y":20}"#).unwrap();
        assert!(field.visible);
        assert_eq!(field.font_size, 24);
        assert_eq!(field.color, "#000000");
        assert_eq!(field.alignment, TextAlign::Left);
        assert_eq!(field.font_family, None);
    }

    #[test]
    fn editable_fields_skips_hidden() {
        let mut hidden = Field::new("sig", "Signature");
        hidden.visible = false;
        let fields = vec![Field::new("name", "Name"), hidden];
        let editable = editable_fields(&fields);
        assert_eq!(editable.len(), 1);
        assert_eq!(editable[0].id, "name");
    }
}
