//! The `[Content_Types].xml` registry of an OPC package.
//!
//! The first part registered with a given extension decides the extension's default content
//! type. A later part with the same extension but another content type gets an override of its
//! own; existing defaults are never changed, since other parts already rely on them.

use crate::constants::CONTENT_TYPES_NAMESPACE;
use crate::xml::XmlWriter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentTypeRecord {
    /// Extension (lower-case, no leading dot) to content type.
    Default {
        extension: String,
        content_type: String,
    },
    /// Exact part name (with a leading `/`) to content type.
    Override {
        part_name: String,
        content_type: String,
    },
}

#[derive(Debug, Default)]
pub struct ContentTypeRegistry {
    defaults: Vec<(String, String)>,
    overrides: Vec<(String, String)>,
}

/// Lower-cased text after the last `.` of the last path segment.
fn extension_of(part_name: &str) -> Option<String> {
    let file_name = part_name.rsplit(['/', '\\']).next().unwrap_or(part_name);
    match file_name.rsplit_once('.') {
        Some((_, extension)) if !extension.is_empty() => Some(extension.to_lowercase()),
        _ => None,
    }
}

fn normalize_part_name(part_name: &str) -> String {
    let part_name = part_name.replace('\\', "/");
    if part_name.starts_with('/') {
        part_name
    } else {
        format!("/{part_name}")
    }
}

impl ContentTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, part_name: &str, content_type: &str) {
        let extension = match extension_of(part_name) {
            Some(extension) => extension,
            None => {
                self.add_override(part_name, content_type);
                return;
            }
        };

        match self.defaults.iter().find(|(known, _)| *known == extension) {
            Some((_, known_type)) if known_type.eq_ignore_ascii_case(content_type) => {}
            Some(_) => self.add_override(part_name, content_type),
            None => self.defaults.push((extension, content_type.to_owned())),
        }
    }

    fn add_override(&mut self, part_name: &str, content_type: &str) {
        let part_name = normalize_part_name(part_name);
        if !self.overrides.iter().any(|(known, _)| *known == part_name) {
            tracing::trace!("content type override {} -> {}", part_name, content_type);
            self.overrides.push((part_name, content_type.to_owned()));
        }
    }

    /// Defaults then overrides, each in registration order.
    pub fn records(&self) -> impl Iterator<Item = ContentTypeRecord> + '_ {
        let defaults = self
            .defaults
            .iter()
            .map(|(extension, content_type)| ContentTypeRecord::Default {
                extension: extension.clone(),
                content_type: content_type.clone(),
            });
        let overrides = self
            .overrides
            .iter()
            .map(|(part_name, content_type)| ContentTypeRecord::Override {
                part_name: part_name.clone(),
                content_type: content_type.clone(),
            });
        defaults.chain(overrides)
    }

    pub fn to_xml(&self) -> Vec<u8> {
        let mut writer = XmlWriter::new();
        writer.open("Types", &[("xmlns", CONTENT_TYPES_NAMESPACE)]);
        for (extension, content_type) in &self.defaults {
            writer.empty(
                "Default",
                &[("Extension", extension.as_str()), ("ContentType", content_type.as_str())],
            );
        }
        for (part_name, content_type) in &self.overrides {
            writer.empty(
                "Override",
                &[("PartName", part_name.as_str()), ("ContentType", content_type.as_str())],
            );
        }
        writer.close("Types");
        writer.finish()
    }
}
