//! Reading, querying and writing of BVH motion capture files.
//!
//! A [`Bvh`] owns the whole skeleton (joints and channels, addressed by index)
//! together with the `num_frame * num_channel` motion matrix. Every instance
//! is built through one validating seam, so a loaded model always satisfies
//! the tree and channel invariants.

pub mod error;
pub mod query;
pub mod read;
pub mod skeleton;
pub mod write;

use cgmath::Vector3;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

pub use error::{ConsistencyError, Error, Result, SyntaxError};
pub use query::JointRef;
pub use skeleton::SkeletonBuilder;
pub use write::WriteOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    XRotation,
    YRotation,
    ZRotation,
    XPosition,
    YPosition,
    ZPosition,
}

impl ChannelKind {
    pub const ROTATION: [ChannelKind; 3] = [Self::XRotation, Self::YRotation, Self::ZRotation];
    pub const POSITION: [ChannelKind; 3] = [Self::XPosition, Self::YPosition, Self::ZPosition];

    /// Parses the keyword used on a `CHANNELS` line, e.g. `Zrotation`.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        use ChannelKind::*;
        match keyword {
            "Xrotation" => Some(XRotation),
            "Yrotation" => Some(YRotation),
            "Zrotation" => Some(ZRotation),
            "Xposition" => Some(XPosition),
            "Yposition" => Some(YPosition),
            "Zposition" => Some(ZPosition),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        use ChannelKind::*;
        match self {
            XRotation => "Xrotation",
            YRotation => "Yrotation",
            ZRotation => "Zrotation",
            XPosition => "Xposition",
            YPosition => "Yposition",
            ZPosition => "Zposition",
        }
    }

    pub fn short_name(self) -> &'static str {
        use ChannelKind::*;
        match self {
            XRotation => "XR",
            YRotation => "YR",
            ZRotation => "ZR",
            XPosition => "XP",
            YPosition => "YP",
            ZPosition => "ZP",
        }
    }

    pub fn is_rotation(self) -> bool {
        Self::ROTATION.contains(&self)
    }

    pub fn is_position(self) -> bool {
        Self::POSITION.contains(&self)
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ChannelKind::*;
        let name = match self {
            XRotation => "X Rotation",
            YRotation => "Y Rotation",
            ZRotation => "Z Rotation",
            XPosition => "X Position",
            YPosition => "Y Position",
            ZPosition => "Z Position",
        };
        f.write_str(name)
    }
}

/// One animated degree of freedom, i.e. one column of the motion matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub(crate) joint: usize,
    pub(crate) kind: ChannelKind,
    pub(crate) index: usize,
}

impl Channel {
    /// Index of the owning joint.
    pub fn joint(&self) -> usize {
        self.joint
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Column in the motion matrix.
    pub fn index(&self) -> usize {
        self.index
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub(crate) name: String,
    pub(crate) index: usize,
    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,
    pub(crate) offset: Vector3<f64>,
    pub(crate) end_site: Option<Vector3<f64>>,
    pub(crate) channels: Vec<usize>,
}

impl Joint {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Preorder index, stable for the life of the model.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn children(&self) -> &[usize] {
        &self.children
    }

    pub fn offset(&self) -> Vector3<f64> {
        self.offset
    }

    pub fn end_site(&self) -> Option<Vector3<f64>> {
        self.end_site
    }

    pub fn has_end_site(&self) -> bool {
        self.end_site.is_some()
    }

    /// Channel indices in declaration order.
    pub fn channels(&self) -> &[usize] {
        &self.channels
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// A skeleton hierarchy plus its motion matrix.
///
/// The default value is the empty, unloaded model.
#[derive(Debug, Clone, Default)]
pub struct Bvh {
    pub(crate) loaded: bool,
    pub(crate) file_name: Option<PathBuf>,
    pub(crate) motion_name: String,
    pub(crate) joints: Vec<Joint>,
    pub(crate) channels: Vec<Channel>,
    pub(crate) joint_index: HashMap<String, usize>,
    pub(crate) num_frame: usize,
    pub(crate) interval: f64,
    // [frame][channel], row-major
    pub(crate) motion: Vec<f64>,
}
