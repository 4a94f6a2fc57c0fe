//! The record every scenario acts on, and how its text is shaped.
//!
//! Records are attribute/value text objects (`name: value` per line, with
//! continuation lines starting with whitespace or `+`). The history marker is
//! one such attribute.

use serde::{Deserialize, Serialize};

use crate::core::dimension::{RecordState, RequestVariant};

/// Target record description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetRecord {
    /// Object class, also the first attribute name (e.g. `person`).
    pub object_type: String,
    /// Primary key (e.g. a handle).
    pub key: String,
    /// Object text without the history marker.
    pub body: String,
    /// Attribute name of the history marker.
    pub marker_attribute: String,
    /// Value written when the marker is present.
    pub marker_value: String,
}

impl Default for TargetRecord {
    fn default() -> Self {
        Self {
            object_type: "person".to_string(),
            key: "CT1-TEST".to_string(),
            body: [
                "person:  Conformance Tester",
                "address: Singel 258",
                "phone:   +31 20 535 4444",
                "nic-hdl: CT1-TEST",
                "mnt-by:  CONFORMANCE-MNT",
                "source:  TEST",
            ]
            .join("\n"),
            marker_attribute: "changed".to_string(),
            marker_value: "conformance@example.net 20130101".to_string(),
        }
    }
}

impl TargetRecord {
    pub fn marker_line(&self) -> String {
        format!("{}: {}", self.marker_attribute, self.marker_value)
    }

    /// Object text with or without the marker; the marker goes before `source:`.
    pub fn render(&self, with_marker: bool) -> String {
        let mut lines: Vec<String> = self
            .body
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        if with_marker {
            let position = lines
                .iter()
                .position(|line| attribute_name(line).is_some_and(|n| n == "source"))
                .unwrap_or(lines.len());
            lines.insert(position, self.marker_line());
        }
        let mut text = lines.join("\n");
        text.push('\n');
        text
    }

    /// Text submitted for a request variant. Not-applicable keeps whatever
    /// the pre-state carries.
    pub fn payload(&self, request: RequestVariant, pre_state: RecordState) -> String {
        let with_marker = match request {
            RequestVariant::WithMarker => true,
            RequestVariant::WithoutMarker => false,
            RequestVariant::NotApplicable => pre_state.has_marker(),
        };
        self.render(with_marker)
    }

    pub fn carries_marker(&self, text: &str) -> bool {
        let wanted = self.marker_attribute.to_ascii_lowercase();
        text.lines()
            .any(|line| attribute_name(line).is_some_and(|name| name == wanted))
    }

    /// Whether `object` is this record: same class and it names the key.
    pub fn matches(&self, object: &str) -> bool {
        let mut attributes = object.lines().filter_map(split_attribute);
        let Some((first, _)) = attributes.next() else {
            return false;
        };
        if first != self.object_type.to_ascii_lowercase() {
            return false;
        }
        object
            .lines()
            .filter_map(split_attribute)
            .any(|(_, value)| value.eq_ignore_ascii_case(&self.key))
    }

    /// Classify an observed object; `None` means not found.
    pub fn state_of(&self, object: Option<&str>) -> RecordState {
        match object {
            None => RecordState::Absent,
            Some(text) if self.carries_marker(text) => RecordState::ExistsWithMarker,
            Some(_) => RecordState::ExistsWithoutMarker,
        }
    }

    /// Remove marker lines from an object text.
    pub fn strip_marker(&self, text: &str) -> String {
        let wanted = self.marker_attribute.to_ascii_lowercase();
        let mut out = String::new();
        for line in text.lines() {
            if attribute_name(line).is_some_and(|name| name == wanted) {
                continue;
            }
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// Lower-cased attribute name of a line, `None` for continuations and comments.
pub fn attribute_name(line: &str) -> Option<String> {
    split_attribute(line).map(|(name, _)| name)
}

fn split_attribute(line: &str) -> Option<(String, &str)> {
    let first = line.chars().next()?;
    if first.is_whitespace() || first == '+' || first == '%' || first == '#' {
        return None;
    }
    let (name, value) = line.split_once(':')?;
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    Some((name.to_ascii_lowercase(), value.trim()))
}
