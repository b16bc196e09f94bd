use cgmath::Vector3;
use log::*;

use super::*;

use std::collections::HashMap;

/// Collects joints and channels before they are validated into a [`Bvh`].
///
/// Joints must be added in preorder (a parent before its children, a subtree
/// complete before its next sibling) and channels in declaration order. The
/// parser builds its skeleton this way, and [`Bvh::new`] rejects anything else.
#[derive(Debug, Clone, Default)]
pub struct SkeletonBuilder {
    joints: Vec<Joint>,
    channels: Vec<Channel>,
}

impl SkeletonBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a joint and returns its index. `None` adds the root.
    pub fn add_joint<S: Into<String>>(&mut self, parent: Option<usize>, name: S) -> usize {
        let index = self.joints.len();
        if let Some(p) = parent.and_then(|p| self.joints.get_mut(p)) {
            p.children.push(index);
        }
        self.joints.push(Joint {
            name: name.into(),
            index,
            parent,
            children: vec![],
            offset: Vector3::new(0., 0., 0.),
            end_site: None,
            channels: vec![],
        });
        index
    }

    pub fn set_offset(&mut self, joint: usize, offset: Vector3<f64>) {
        if let Some(j) = self.joints.get_mut(joint) {
            j.offset = offset;
        }
    }

    pub fn set_end_site(&mut self, joint: usize, end_site: Vector3<f64>) {
        if let Some(j) = self.joints.get_mut(joint) {
            j.end_site = Some(end_site);
        }
    }

    /// Binds a new channel to `joint` and returns its global index.
    pub fn add_channel(&mut self, joint: usize, kind: ChannelKind) -> usize {
        let index = self.channels.len();
        if let Some(j) = self.joints.get_mut(joint) {
            j.channels.push(index);
        }
        self.channels.push(Channel { joint, kind, index });
        index
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub(crate) fn joint(&self, joint: usize) -> Option<&Joint> {
        self.joints.get(joint)
    }

    /// Checks that the joints form a single preorder tree and that the channels
    /// are bound back to their joints, in preorder.
    fn validate(&self) -> Result<(), ConsistencyError> {
        use ConsistencyError::{Empty, Tree};

        if self.joints.is_empty() {
            return Err(Empty);
        }
        for (i, joint) in self.joints.iter().enumerate() {
            if joint.index != i {
                return Err(Tree { joint: i, reason: "index does not match position" });
            }
            if !is_writable_name(&joint.name) {
                return Err(Tree { joint: i, reason: "name is empty or cannot be written" });
            }
            if !is_finite(joint.offset) || !joint.end_site.map_or(true, is_finite) {
                return Err(Tree { joint: i, reason: "offset is not finite" });
            }
            match joint.parent {
                None if i != 0 => return Err(Tree { joint: i, reason: "second root" }),
                Some(_) if i == 0 => return Err(Tree { joint: i, reason: "root has a parent" }),
                Some(p) if p >= i => {
                    return Err(Tree { joint: i, reason: "parent is not declared before child" })
                }
                _ => (),
            }
        }
        for (i, channel) in self.channels.iter().enumerate() {
            if channel.index != i {
                return Err(ConsistencyError::Channel { channel: i, reason: "index does not match position" });
            }
            let bound = self
                .joints
                .get(channel.joint)
                .map_or(false, |j| j.channels.contains(&i));
            if !bound {
                return Err(ConsistencyError::Channel { channel: i, reason: "not bound to its joint" });
            }
        }

        // Walk the tree from the root: the visit order must reproduce both the
        // joint indices and the channel indices.
        let mut stack = vec![0];
        let mut next_joint = 0;
        let mut next_channel = 0;
        while let Some(id) = stack.pop() {
            if id != next_joint {
                return Err(Tree { joint: id, reason: "joints are not in preorder" });
            }
            next_joint += 1;
            let joint = &self.joints[id];
            for &c in &joint.channels {
                if c != next_channel || self.channels.get(c).map(|c| c.joint) != Some(id) {
                    return Err(ConsistencyError::Channel { channel: c, reason: "channels are not in declaration order" });
                }
                next_channel += 1;
            }
            for &child in joint.children.iter().rev() {
                match self.joints.get(child) {
                    Some(c) if c.parent == Some(id) => stack.push(child),
                    _ => return Err(Tree { joint: id, reason: "child does not point back to parent" }),
                }
            }
        }
        if next_joint != self.joints.len() {
            return Err(Tree { joint: next_joint, reason: "joint is unreachable from the root" });
        }
        if next_channel != self.channels.len() {
            return Err(ConsistencyError::Channel { channel: next_channel, reason: "channel is not bound to any joint" });
        }
        Ok(())
    }

    /// Validates the skeleton and attaches a motion matrix to it.
    ///
    /// A `motion` of `None` allocates a zero-filled matrix.
    pub fn build<S: Into<String>>(
        self,
        motion_name: S,
        num_frame: usize,
        interval: f64,
        motion: Option<Vec<f64>>,
    ) -> Result<Bvh> {
        Bvh::new(motion_name, self, num_frame, interval, motion)
    }
}

fn motion_buffer(num_frame: usize, num_channel: usize, motion: Option<Vec<f64>>) -> Result<Vec<f64>> {
    let expected = num_frame
        .checked_mul(num_channel)
        .ok_or(ConsistencyError::MotionSize { num_frame, num_channel })?;
    let motion = motion.unwrap_or_else(|| vec![0.; expected]);
    if motion.len() != expected {
        return Err(ConsistencyError::MotionLength { expected, actual: motion.len() }.into());
    }
    if let Some(i) = motion.iter().position(|v| !v.is_finite()) {
        return Err(ConsistencyError::NonFinite {
            frame: i / num_channel,
            channel: i % num_channel,
        }
        .into());
    }
    Ok(motion)
}

fn check_interval(interval: f64) -> Result<(), ConsistencyError> {
    if interval.is_finite() && interval >= 0. {
        Ok(())
    } else {
        Err(ConsistencyError::Interval(interval))
    }
}

/// A name survives a write and re-read only as single-space separated words
/// without braces.
fn is_writable_name(name: &str) -> bool {
    name.split(' ')
        .all(|w| !w.is_empty() && !w.contains(|c: char| c.is_whitespace() || c == '{' || c == '}'))
}

fn is_finite(v: Vector3<f64>) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

impl Bvh {
    /// The single construction seam: validates the skeleton against itself
    /// and against the motion matrix, then builds the name index.
    pub fn new<S: Into<String>>(
        motion_name: S,
        skeleton: SkeletonBuilder,
        num_frame: usize,
        interval: f64,
        motion: Option<Vec<f64>>,
    ) -> Result<Self> {
        skeleton.validate()?;
        check_interval(interval)?;
        let SkeletonBuilder { joints, channels } = skeleton;
        let motion = motion_buffer(num_frame, channels.len(), motion)?;

        // Later joints overwrite earlier ones with the same name.
        let joint_index = joints
            .iter()
            .map(|j| (j.name.clone(), j.index))
            .collect::<HashMap<_, _>>();
        if joint_index.len() != joints.len() {
            warn!(
                "{} joint name(s) are duplicated, name lookup returns the last one",
                joints.len() - joint_index.len()
            );
        }

        debug!(
            "built skeleton: {} joints, {} channels, {} frames",
            joints.len(),
            channels.len(),
            num_frame
        );
        Ok(Self {
            loaded: true,
            file_name: None,
            motion_name: motion_name.into(),
            joints,
            channels,
            joint_index,
            num_frame,
            interval,
            motion,
        })
    }

    /// Replaces the whole model, or clears it if validation fails.
    pub fn init<S: Into<String>>(
        &mut self,
        motion_name: S,
        skeleton: SkeletonBuilder,
        num_frame: usize,
        interval: f64,
        motion: Option<Vec<f64>>,
    ) -> Result<()> {
        match Self::new(motion_name, skeleton, num_frame, interval, motion) {
            Ok(bvh) => {
                *self = bvh;
                Ok(())
            }
            Err(e) => {
                self.clear();
                Err(e)
            }
        }
    }

    /// Replaces the motion matrix, keeping the skeleton. The model is left
    /// untouched on error.
    pub fn set_motion(&mut self, num_frame: usize, interval: f64, motion: Option<Vec<f64>>) -> Result<()> {
        if !self.loaded {
            return Err(Error::NotLoaded);
        }
        check_interval(interval)?;
        self.motion = motion_buffer(num_frame, self.channels.len(), motion)?;
        self.num_frame = num_frame;
        self.interval = interval;
        Ok(())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
