use cgmath::Vector3;
use cookie_factory::combinator::string;
use cookie_factory::multi::all;
use cookie_factory::sequence::tuple;
use cookie_factory::*;
use log::*;

use super::*;

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

/// Formatting knobs for [`Bvh::write`].
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOptions {
    /// Inserted once per nesting level.
    pub indent: String,
    /// Digits after the decimal point; `None` writes the shortest text that
    /// reads back to the same value.
    pub precision: Option<usize>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            indent: "\t".into(),
            precision: None,
        }
    }
}

impl WriteOptions {
    fn float(&self, v: f64) -> String {
        match self.precision {
            Some(p) => format!("{:.*}", p, v),
            None => format!("{}", v),
        }
    }

    fn vector(&self, v: Vector3<f64>) -> String {
        format!("{} {} {}", self.float(v.x), self.float(v.y), self.float(v.z))
    }
}

fn line<'a, W: io::Write + 'a>(
    opts: &'a WriteOptions,
    depth: usize,
    text: String,
) -> impl SerializeFn<W> + 'a {
    tuple((
        all((0..depth).map(move |_| string(&opts.indent))),
        string(text),
        string("\n"),
    ))
}

fn from_gen_error(e: GenError) -> Error {
    match e {
        GenError::IoError(e) => Error::Write(e),
        e => Error::Write(io::Error::new(io::ErrorKind::Other, format!("{:?}", e))),
    }
}

impl Bvh {
    fn write_joint<W: io::Write>(
        &self,
        opts: &WriteOptions,
        id: usize,
        depth: usize,
        out: WriteContext<W>,
    ) -> GenResult<W> {
        let joint = &self.joints[id];
        let keyword = if joint.is_root() { "ROOT" } else { "JOINT" };
        let channels = joint
            .channels
            .iter()
            .fold(format!("CHANNELS {}", joint.channels.len()), |acc, &c| {
                acc + " " + self.channels[c].kind.keyword()
            });
        let mut out = tuple((
            line(opts, depth, format!("{} {}", keyword, joint.name)),
            line(opts, depth, "{".into()),
            line(opts, depth + 1, format!("OFFSET {}", opts.vector(joint.offset))),
            line(opts, depth + 1, channels),
        ))(out)?;
        for &child in &joint.children {
            out = self.write_joint(opts, child, depth + 1, out)?;
        }
        if let Some(site) = joint.end_site {
            out = tuple((
                line(opts, depth + 1, "End Site".into()),
                line(opts, depth + 1, "{".into()),
                line(opts, depth + 2, format!("OFFSET {}", opts.vector(site))),
                line(opts, depth + 1, "}".into()),
            ))(out)?;
        }
        line(opts, depth, "}".into())(out)
    }

    fn write_motion<'a, W: io::Write + 'a>(&'a self, opts: &'a WriteOptions) -> impl SerializeFn<W> + 'a {
        // `all` needs a cloneable iterator
        let rows = (0..self.num_frame).filter_map(move |f| self.frame(f)).map(move |row| {
            let values = row.iter().map(|&v| opts.float(v)).collect::<Vec<_>>();
            line(opts, 0, values.join(" "))
        });
        tuple((
            line(opts, 0, "MOTION".into()),
            line(opts, 0, format!("Frames: {}", self.num_frame)),
            line(opts, 0, format!("Frame Time: {}", opts.float(self.interval))),
            all(rows),
        ))
    }

    /// Serializes the hierarchy in preorder followed by the motion rows.
    pub fn serialize<'a, W: io::Write + 'a>(&'a self, opts: &'a WriteOptions) -> impl SerializeFn<W> + 'a {
        move |out: WriteContext<W>| {
            let out = line(opts, 0, "HIERARCHY".into())(out)?;
            let out = match self.joints.first() {
                Some(root) => self.write_joint(opts, root.index, 0, out)?,
                None => out,
            };
            self.write_motion(opts)(out)
        }
    }

    /// Writes the model as BVH text and hands the writer back.
    pub fn write<W: io::Write>(&self, writer: W, opts: &WriteOptions) -> Result<W> {
        if !self.loaded {
            return Err(Error::NotLoaded);
        }
        let (writer, len) = gen(self.serialize(opts), writer).map_err(from_gen_error)?;
        debug!("wrote {} bytes of `{}`", len, self.motion_name);
        Ok(writer)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.save_with(path, &WriteOptions::default())
    }

    pub fn save_with<P: AsRef<Path>>(&self, path: P, opts: &WriteOptions) -> Result<()> {
        if !self.loaded {
            return Err(Error::NotLoaded);
        }
        let path = path.as_ref();
        let with_path = |source: io::Error| Error::Save {
            path: path.to_owned(),
            source,
        };
        let file = File::create(path).map_err(with_path)?;
        let mut writer = match self.write(BufWriter::new(file), opts) {
            Err(Error::Write(source)) => return Err(with_path(source)),
            other => other?,
        };
        io::Write::flush(&mut writer).map_err(with_path)
    }

    pub fn to_string_with(&self, opts: &WriteOptions) -> Result<String> {
        let buf = self.write(Vec::new(), opts)?;
        String::from_utf8(buf).map_err(|e| Error::Write(io::Error::new(io::ErrorKind::InvalidData, e)))
    }
}

impl fmt::Display for Bvh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opts = WriteOptions::default();
        let (buf, _) = gen(self.serialize(&opts), Vec::new()).map_err(|_| fmt::Error)?;
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}
