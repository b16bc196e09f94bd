use serde::{Deserialize, Serialize};

/// Contents of the optional TOML config file.
#[derive(Default, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct Config {
    pub output: OutputDescriptor,
}

#[derive(Default, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct OutputDescriptor {
    /// Spaces per nesting level; tabs when unset.
    pub indent: Option<usize>,
    pub precision: Option<usize>,
}

impl From<OutputDescriptor> for bvh::WriteOptions {
    fn from(desc: OutputDescriptor) -> Self {
        let indent = match desc.indent {
            Some(n) => " ".repeat(n),
            None => "\t".into(),
        };
        Self {
            indent,
            precision: desc.precision,
        }
    }
}
