use cgmath::Vector3;
use log::*;
use nom::combinator::all_consuming;
use nom::error::ErrorKind;
use nom::number::complete::double;

use super::*;

use std::fs;
use std::iter::Peekable;
use std::path::Path;
use std::str::FromStr;

mod lexer;

pub use lexer::{Lexer, Token};

fn number(token: &Token) -> Result<f64> {
    match all_consuming(double::<_, (&str, ErrorKind)>)(token.text) {
        Ok((_, n)) if n.is_finite() => Ok(n),
        _ => Err(Error::syntax(
            token.line,
            SyntaxError::InvalidNumber(token.text.to_owned()),
        )),
    }
}

fn count(token: &Token) -> Result<usize> {
    token
        .text
        .parse()
        .map_err(|_| Error::syntax(token.line, SyntaxError::InvalidNumber(token.text.to_owned())))
}

/// Recursive descent over the token stream, hierarchy first, then motion.
struct Parser<'a> {
    tokens: Peekable<Lexer<'a>>,
    line: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            tokens: Lexer::new(input).peekable(),
            line: 1,
        }
    }

    fn next(&mut self, expected: &'static str) -> Result<Token<'a>> {
        match self.tokens.next() {
            Some(token) => {
                self.line = token.line;
                Ok(token)
            }
            None => Err(Error::UnexpectedEof {
                line: self.line,
                expected,
            }),
        }
    }

    fn keyword(&mut self, keyword: &'static str) -> Result<Token<'a>> {
        let token = self.next(keyword)?;
        if token.text == keyword {
            Ok(token)
        } else {
            Err(Error::unexpected(token.line, keyword, token.text))
        }
    }

    fn number(&mut self) -> Result<f64> {
        number(&self.next("a number")?)
    }

    fn vector(&mut self) -> Result<Vector3<f64>> {
        Ok(Vector3::new(self.number()?, self.number()?, self.number()?))
    }

    /// Joint name: every remaining word on the `ROOT`/`JOINT` line.
    fn name(&mut self) -> Result<String> {
        let line = self.line;
        let mut words = vec![];
        while let Some(token) = self.tokens.peek() {
            if token.line != line || token.text == "{" || token.text == "}" {
                break;
            }
            words.push(token.text);
            self.tokens.next();
        }
        if words.is_empty() {
            return Err(Error::syntax(line, SyntaxError::MissingName));
        }
        Ok(words.join(" "))
    }

    fn channels(&mut self, skeleton: &mut SkeletonBuilder, joint: usize) -> Result<()> {
        let n = count(&self.next("a channel count")?)?;
        for _ in 0..n {
            let token = self.next("a channel name")?;
            let kind = ChannelKind::from_keyword(token.text).ok_or_else(|| {
                Error::syntax(token.line, SyntaxError::UnknownChannel(token.text.to_owned()))
            })?;
            let index = skeleton.add_channel(joint, kind);
            trace!("channel {} = {} of joint {}", index, kind, joint);
        }
        Ok(())
    }

    fn end_site(&mut self, skeleton: &mut SkeletonBuilder, joint: usize) -> Result<()> {
        let site = self.keyword("Site")?;
        if let Some(j) = skeleton.joint(joint).filter(|j| j.has_end_site()) {
            return Err(Error::syntax(site.line, SyntaxError::DuplicateEndSite(j.name.clone())));
        }
        self.keyword("{")?;
        self.keyword("OFFSET")?;
        let offset = self.vector()?;
        self.keyword("}")?;
        skeleton.set_end_site(joint, offset);
        Ok(())
    }

    /// `HIERARCHY` up to the closing brace of the root joint.
    fn hierarchy(&mut self) -> Result<SkeletonBuilder> {
        let mut skeleton = SkeletonBuilder::new();
        self.keyword("HIERARCHY")?;

        let root = self.next("ROOT")?;
        match root.text {
            "ROOT" => (),
            "MOTION" => return Err(Error::syntax(root.line, SyntaxError::MissingRoot)),
            found => return Err(Error::unexpected(root.line, "ROOT", found)),
        }
        let mut stack = vec![];
        let mut parent = None;
        loop {
            // `parent` is None for ROOT, else the joint enclosing this JOINT
            let name = self.name()?;
            let joint = skeleton.add_joint(parent, name);
            trace!("joint {} `{}`", joint, &skeleton.joint(joint).map_or("", |j| j.name()));
            self.keyword("{")?;
            stack.push(joint);

            // Read the body of the joint on top of the stack, closing finished
            // blocks, until a child `JOINT` opens or the root closes.
            loop {
                let token = self.next("`}`")?;
                let top = match stack.last() {
                    Some(&top) => top,
                    None => return Err(Error::syntax(token.line, SyntaxError::UnbalancedBrace)),
                };
                match token.text {
                    "OFFSET" => {
                        let offset = self.vector()?;
                        skeleton.set_offset(top, offset);
                    }
                    "CHANNELS" => self.channels(&mut skeleton, top)?,
                    "End" => self.end_site(&mut skeleton, top)?,
                    "JOINT" => {
                        parent = Some(top);
                        break;
                    }
                    "}" => {
                        stack.pop();
                        if stack.is_empty() {
                            return Ok(skeleton);
                        }
                    }
                    "{" => return Err(Error::syntax(token.line, SyntaxError::UnbalancedBrace)),
                    found => return Err(Error::unexpected(token.line, "a joint keyword", found)),
                }
            }
        }
    }

    /// `MOTION`, `Frames:`, `Frame Time:` and the frame rows. Each row is
    /// the set of values on one line.
    fn motion(&mut self, num_channel: usize) -> Result<(usize, f64, Vec<f64>)> {
        let token = self.next("MOTION")?;
        match token.text {
            "MOTION" => (),
            "}" => return Err(Error::syntax(token.line, SyntaxError::UnbalancedBrace)),
            found => return Err(Error::unexpected(token.line, "MOTION", found)),
        }
        self.keyword("Frames:")?;
        let num_frame = count(&self.next("a frame count")?)?;
        self.keyword("Frame")?;
        self.keyword("Time:")?;
        let token = self.next("a frame time")?;
        let interval = number(&token)?;
        if interval < 0. {
            return Err(Error::syntax(token.line, SyntaxError::InvalidNumber(token.text.to_owned())));
        }

        let mut motion = Vec::with_capacity(num_frame.saturating_mul(num_channel).min(1 << 20));
        if num_channel > 0 {
            for frame in 0..num_frame {
                let first = match self.tokens.next() {
                    Some(token) => token,
                    None => {
                        return Err(ConsistencyError::FrameCount {
                            expected: num_frame,
                            actual: frame,
                        }
                        .into())
                    }
                };
                let line = first.line;
                self.line = line;
                let start = motion.len();
                motion.push(number(&first)?);
                while let Some(token) = self.tokens.peek() {
                    if token.line != line {
                        break;
                    }
                    motion.push(number(token)?);
                    self.tokens.next();
                }
                let actual = motion.len() - start;
                if actual != num_channel {
                    return Err(ConsistencyError::RowLength {
                        frame,
                        line,
                        expected: num_channel,
                        actual,
                    }
                    .into());
                }
            }
        }
        if let Some(token) = self.tokens.peek() {
            warn!("ignoring data after the last frame, starting at line {}", token.line);
        }
        Ok((num_frame, interval, motion))
    }
}

/// Parses a whole BVH document.
pub fn parse<S: Into<String>>(input: &str, motion_name: S) -> Result<Bvh> {
    let mut parser = Parser::new(input);
    let skeleton = parser.hierarchy()?;
    let (num_frame, interval, motion) = parser.motion(skeleton.channel_count())?;
    Bvh::new(motion_name, skeleton, num_frame, interval, Some(motion))
}

impl FromStr for Bvh {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse(s, "")
    }
}

impl Bvh {
    /// Reads and parses a file. The motion is named after the file stem.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_owned(),
            source,
        })?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut bvh = parse(&data, name)?;
        bvh.file_name = Some(path.to_owned());
        debug!(
            "loaded {}: {} joints, {} channels, {} frames",
            path.display(),
            bvh.num_joint(),
            bvh.num_channel(),
            bvh.num_frame()
        );
        Ok(bvh)
    }

    /// Replaces the model with the file's contents. On failure the model is
    /// left empty and unloaded.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        match Self::open(path) {
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
}

#[cfg(test)]
mod test {
    use super::*;

    const WALK: &str = include_str!("../../assets/walk.bvh");

    const HIPS: &str = "HIERARCHY
ROOT Hips
{
  OFFSET 0.0 0.0 0.0
  CHANNELS 6 Xposition Yposition Zposition Zrotation Xrotation Yrotation
}
MOTION
Frames: 2
Frame Time: 0.0333
0 0 0 0 0 0
0 1 0 0 0 0
";

    fn syntax_kind(input: &str) -> (usize, SyntaxError) {
        match input.parse::<Bvh>() {
            Err(Error::Syntax { line, kind }) => (line, kind),
            other => panic!("expected a syntax error, got {:?}", other.map(|b| b.num_joint())),
        }
    }

    #[test]
    fn single_root() {
        let bvh: Bvh = HIPS.parse().unwrap();
        assert!(bvh.is_load_success());
        assert_eq!(bvh.num_frame(), 2);
        assert_eq!(bvh.num_channel(), 6);
        assert_eq!(bvh.num_joint(), 1);
        assert_eq!(bvh.interval(), 0.0333);
        let hips = bvh.joint_by_name("Hips").unwrap();
        assert_eq!(hips.index(), 0);
        assert_eq!(hips.channels().count(), 6);
        assert_eq!(hips.position(1), Some(Vector3::new(0., 1., 0.)));
        assert_eq!(hips.rotation(1), Some(Vector3::new(0., 0., 0.)));
        assert_eq!(hips.position(2), None);
        assert!(hips.end_site().is_none());
    }

    #[test]
    fn walk_hierarchy() {
        let bvh: Bvh = WALK.parse().unwrap();
        assert_eq!(bvh.num_joint(), 7);
        assert_eq!(bvh.num_channel(), 6 + 3 * 6);
        assert_eq!(bvh.num_frame(), 3);

        let names = bvh.joints().map(|j| j.name()).collect::<Vec<_>>();
        assert_eq!(
            names,
            ["Hips", "Spine", "Head", "LeftLeg", "LeftFoot", "RightLeg", "RightFoot"]
        );
        let parents = bvh.joints().map(|j| j.data().parent()).collect::<Vec<_>>();
        assert_eq!(
            parents,
            [None, Some(0), Some(1), Some(0), Some(3), Some(0), Some(5)]
        );

        let head = bvh.joint_by_name("Head").unwrap();
        assert_eq!(head.end_site(), Some(Vector3::new(0., 3.5, 0.)));
        assert_eq!(head.offset(), Vector3::new(0., 6.25, -0.5));
        assert!(bvh.joint_by_name("Spine").unwrap().end_site().is_none());

        let foot = bvh.joint_by_name("LeftFoot").unwrap();
        assert_eq!(foot.channels().map(Channel::index).collect::<Vec<_>>(), [15, 16, 17]);
        assert_eq!(foot.rotation(2), Some(Vector3::new(-4.5, 1., 0.25)));
    }

    #[test]
    fn channel_and_joint_indices() {
        let bvh: Bvh = WALK.parse().unwrap();
        let total: usize = bvh.joints().map(|j| j.channels().count()).sum();
        assert_eq!(total, bvh.num_channel());
        assert_eq!(bvh.motion().len(), bvh.num_frame() * bvh.num_channel());
        for (i, joint) in bvh.joints().enumerate() {
            assert_eq!(joint.index(), i);
            assert!(joint.channels().all(|c| c.joint() == i));
        }
        for (i, channel) in bvh.channels().iter().enumerate() {
            assert_eq!(channel.index(), i);
        }
    }

    #[test]
    fn matches_bvh_anim() {
        let other = bvh_anim::from_bytes(WALK.as_bytes()).unwrap();
        let bvh: Bvh = WALK.parse().unwrap();
        assert_eq!(other.joints().count(), bvh.num_joint());
        let channels: usize = other.joints().map(|j| j.data().channels().len()).sum();
        assert_eq!(channels, bvh.num_channel());
        assert_eq!(other.frames().count(), bvh.num_frame());
    }

    #[test]
    fn multi_word_name() {
        let input = HIPS.replace("ROOT Hips", "ROOT Hip  Center");
        let bvh: Bvh = input.parse().unwrap();
        assert_eq!(bvh.root().unwrap().name(), "Hip Center");
        assert!(bvh.joint_by_name("Hip Center").is_some());

        let input = HIPS.replace("ROOT Hips\n", "ROOT\n");
        assert_eq!(syntax_kind(&input), (2, SyntaxError::MissingName));
    }

    #[test]
    fn unbalanced_brace() {
        let input = HIPS.replace("}\nMOTION", "}\n}\nMOTION");
        assert_eq!(syntax_kind(&input), (7, SyntaxError::UnbalancedBrace));

        let input = "HIERARCHY\nROOT Hips\n{\n  OFFSET 0 0 0\n";
        match input.parse::<Bvh>() {
            Err(Error::UnexpectedEof { line, .. }) => assert_eq!(line, 4),
            other => panic!("unexpected {:?}", other.map(|b| b.num_joint())),
        }
    }

    #[test]
    fn unknown_channel() {
        let input = HIPS.replace("Zrotation", "Wrotation");
        assert_eq!(
            syntax_kind(&input),
            (5, SyntaxError::UnknownChannel("Wrotation".into()))
        );
    }

    #[test]
    fn invalid_number() {
        let input = HIPS.replace("OFFSET 0.0 0.0", "OFFSET 0.0 abc");
        assert_eq!(syntax_kind(&input), (4, SyntaxError::InvalidNumber("abc".into())));
    }

    #[test]
    fn missing_root() {
        assert_eq!(
            syntax_kind("HIERARCHY\nMOTION\nFrames: 0\nFrame Time: 0.1\n"),
            (2, SyntaxError::MissingRoot)
        );
    }

    #[test]
    fn duplicate_end_site() {
        let input = "HIERARCHY\nROOT a\n{\nOFFSET 0 0 0\nEnd Site\n{\nOFFSET 0 0 1\n}\nEnd Site\n{\nOFFSET 0 0 1\n}\n}\n";
        assert_eq!(
            syntax_kind(input),
            (9, SyntaxError::DuplicateEndSite("a".into()))
        );
    }

    #[test]
    fn short_row() {
        let input = HIPS.replace("0 1 0 0 0 0", "0 1 0 0 0");
        match input.parse::<Bvh>() {
            Err(Error::Consistency(ConsistencyError::RowLength {
                frame,
                line,
                expected,
                actual,
            })) => assert_eq!((frame, line, expected, actual), (1, 11, 6, 5)),
            other => panic!("unexpected {:?}", other.map(|b| b.num_joint())),
        }
    }

    #[test]
    fn long_row() {
        let input = "HIERARCHY\nROOT a\n{\nOFFSET 0 0 0\nCHANNELS 1 Xrotation\n}\nMOTION\nFrames: 1\nFrame Time: 0.1\n1 2\n";
        match input.parse::<Bvh>() {
            Err(Error::Consistency(ConsistencyError::RowLength {
                frame,
                line,
                expected,
                actual,
            })) => assert_eq!((frame, line, expected, actual), (0, 10, 1, 2)),
            other => panic!("unexpected {:?}", other.map(|b| b.num_joint())),
        }
    }

    #[test]
    fn unicode_separators() {
        let input = HIPS
            .replace("OFFSET 0.0 0.0 0.0", "OFFSET 0.0\u{a0}0.0 0.0\x0c")
            .replace("0 1 0 0 0 0", "0\u{2003}1 0 0 0 0");
        let bvh: Bvh = input.parse().unwrap();
        assert_eq!(bvh.num_channel(), 6);
        assert_eq!(bvh.frame(1), Some(&[0., 1., 0., 0., 0., 0.][..]));

        let input = HIPS.replace("0 1 0 0 0 0", "0 1 0 0 0");
        let spaced = input.replace("Frame Time: 0.0333\n", "Frame Time: 0.0333\x0c\n");
        match spaced.parse::<Bvh>() {
            Err(Error::Consistency(ConsistencyError::RowLength { line, .. })) => assert_eq!(line, 11),
            other => panic!("unexpected {:?}", other.map(|b| b.num_joint())),
        }
    }

    #[test]
    fn missing_rows() {
        let input = HIPS.replace("Frames: 2", "Frames: 3");
        match input.parse::<Bvh>() {
            Err(Error::Consistency(ConsistencyError::FrameCount { expected, actual })) => {
                assert_eq!((expected, actual), (3, 2))
            }
            other => panic!("unexpected {:?}", other.map(|b| b.num_joint())),
        }
    }

    #[test]
    fn trailing_rows_ignored() {
        let input = HIPS.replace("Frames: 2", "Frames: 1");
        let bvh: Bvh = input.parse().unwrap();
        assert_eq!(bvh.num_frame(), 1);
        assert_eq!(bvh.motion().len(), 6);
    }

    #[test]
    fn no_channels() {
        let input = "HIERARCHY\nROOT a\n{\nOFFSET 1 2 3\n}\nMOTION\nFrames: 4\nFrame Time: 0.5\n";
        let bvh: Bvh = input.parse().unwrap();
        assert_eq!(bvh.num_frame(), 4);
        assert_eq!(bvh.num_channel(), 0);
        assert_eq!(bvh.frame(3), Some(&[][..]));
    }

    #[test]
    fn failed_load_clears() {
        let mut bvh: Bvh = HIPS.parse().unwrap();
        let err = bvh.load("assets/does-not-exist.bvh").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert!(!bvh.is_load_success());
        assert_eq!(bvh.num_joint(), 0);
    }

    #[test]
    fn open_names_motion() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("assets/walk.bvh");
        let bvh = Bvh::open(&path).unwrap();
        assert_eq!(bvh.motion_name(), "walk");
        assert_eq!(bvh.file_name(), Some(path.as_path()));
    }
}
