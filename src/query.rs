use cgmath::Vector3;

use super::*;

use std::path::Path;

/// A joint viewed through the model that owns it, so that parent, children
/// and per-frame channel values can be reached from it.
#[derive(Debug, Clone, Copy)]
pub struct JointRef<'a> {
    bvh: &'a Bvh,
    joint: &'a Joint,
}

impl<'a> JointRef<'a> {
    pub fn data(&self) -> &'a Joint {
        self.joint
    }

    pub fn name(&self) -> &'a str {
        &self.joint.name
    }

    pub fn index(&self) -> usize {
        self.joint.index
    }

    pub fn offset(&self) -> Vector3<f64> {
        self.joint.offset
    }

    pub fn end_site(&self) -> Option<Vector3<f64>> {
        self.joint.end_site
    }

    pub fn parent(&self) -> Option<JointRef<'a>> {
        self.joint.parent.and_then(|p| self.bvh.joint(p))
    }

    pub fn children(&self) -> impl Iterator<Item = JointRef<'a>> + 'a {
        let bvh = self.bvh;
        self.joint.children.iter().filter_map(move |&c| bvh.joint(c))
    }

    pub fn channels(&self) -> impl Iterator<Item = &'a Channel> + 'a {
        let bvh = self.bvh;
        self.joint.channels.iter().filter_map(move |&c| bvh.channel(c))
    }

    /// First channel of the given kind bound to this joint.
    pub fn channel(&self, kind: ChannelKind) -> Option<&'a Channel> {
        self.channels().find(|c| c.kind == kind)
    }

    /// Number of ancestors; the root has depth 0.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cur = self.joint.parent;
        while let Some(p) = cur {
            depth += 1;
            cur = self.bvh.joints.get(p).and_then(|j| j.parent);
        }
        depth
    }

    fn triple(&self, frame: usize, kinds: [ChannelKind; 3]) -> Option<Vector3<f64>> {
        let row = self.bvh.frame(frame)?;
        let [x, y, z] = kinds;
        let x = row[self.channel(x)?.index];
        let y = row[self.channel(y)?.index];
        let z = row[self.channel(z)?.index];
        Some(Vector3::new(x, y, z))
    }

    /// Local rotation `(x, y, z)` at `frame`, regardless of the order the
    /// channels were declared in. `None` unless the frame exists and all three
    /// rotation channels are present.
    pub fn rotation(&self, frame: usize) -> Option<Vector3<f64>> {
        self.triple(frame, ChannelKind::ROTATION)
    }

    /// Local position at `frame`, with the same all-or-nothing rule as
    /// [`rotation`](Self::rotation).
    pub fn position(&self, frame: usize) -> Option<Vector3<f64>> {
        self.triple(frame, ChannelKind::POSITION)
    }
}

impl Bvh {
    pub fn is_load_success(&self) -> bool {
        self.loaded
    }

    pub fn file_name(&self) -> Option<&Path> {
        self.file_name.as_deref()
    }

    pub fn motion_name(&self) -> &str {
        &self.motion_name
    }

    pub fn num_joint(&self) -> usize {
        self.joints.len()
    }

    pub fn num_channel(&self) -> usize {
        self.channels.len()
    }

    /// Row stride of the motion matrix.
    pub fn stride(&self) -> usize {
        self.channels.len()
    }

    pub fn num_frame(&self) -> usize {
        self.num_frame
    }

    /// Seconds between two frames.
    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn fps(&self) -> Option<f64> {
        if self.interval > 0. {
            Some(1. / self.interval)
        } else {
            None
        }
    }

    /// Length of the animation in seconds.
    pub fn duration(&self) -> f64 {
        self.num_frame as f64 * self.interval
    }

    pub fn root(&self) -> Option<JointRef<'_>> {
        self.joint(0)
    }

    pub fn joint(&self, index: usize) -> Option<JointRef<'_>> {
        self.joints.get(index).map(|joint| JointRef { bvh: self, joint })
    }

    pub fn joint_by_name(&self, name: &str) -> Option<JointRef<'_>> {
        self.joint_index.get(name).and_then(|&i| self.joint(i))
    }

    /// Joints in preorder.
    pub fn joints(&self) -> impl Iterator<Item = JointRef<'_>> {
        self.joints.iter().map(move |joint| JointRef { bvh: self, joint })
    }

    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// The whole matrix, `num_frame * num_channel` values in frame-major order.
    pub fn motion(&self) -> &[f64] {
        &self.motion
    }

    pub fn frame(&self, frame: usize) -> Option<&[f64]> {
        if frame >= self.num_frame {
            return None;
        }
        let stride = self.stride();
        self.motion.get(frame * stride..(frame + 1) * stride)
    }

    pub fn frames(&self) -> impl Iterator<Item = &[f64]> {
        (0..self.num_frame).filter_map(move |f| self.frame(f))
    }

    pub fn motion_at(&self, frame: usize, channel: usize) -> Option<f64> {
        self.cell(frame, channel).map(|i| self.motion[i])
    }

    /// Overwrites one cell and returns the previous value, or `None` if the
    /// cell is out of range or `value` is not finite.
    pub fn set_motion_at(&mut self, frame: usize, channel: usize, value: f64) -> Option<f64> {
        if !value.is_finite() {
            return None;
        }
        let i = self.cell(frame, channel)?;
        Some(std::mem::replace(&mut self.motion[i], value))
    }

    fn cell(&self, frame: usize, channel: usize) -> Option<usize> {
        if frame < self.num_frame && channel < self.stride() {
            Some(frame * self.stride() + channel)
        } else {
            None
        }
    }
}
