use anyhow::{Context, Result};
use bvh::{Bvh, JointRef};
use log::*;
use structopt::StructOpt;

use std::fs;
use std::path::PathBuf;

mod descriptor;

#[derive(Debug, StructOpt)]
#[structopt(name = "bvh", about = "prints the skeleton and timing of a bvh file")]
struct Opt {
    #[structopt(parse(from_os_str))]
    input: PathBuf,

    /// Re-save the motion here
    #[structopt(short, long, parse(from_os_str))]
    output: Option<PathBuf>,

    #[structopt(short, long, parse(from_os_str), default_value = "./bvh.toml")]
    config: PathBuf,
}

fn describe(joint: &JointRef) -> String {
    let channels: String = joint
        .channels()
        .map(|c| format!("{}({})", c.kind().short_name(), c.index()))
        .collect();
    let o = joint.offset();
    let site = match joint.end_site() {
        Some(s) => format!("site({},{},{})", s.x, s.y, s.z),
        None => String::new(),
    };
    format!(
        "{}\t{}\toffset({},{},{})\t{}\t{}",
        joint.index(),
        joint.name(),
        o.x,
        o.y,
        o.z,
        site,
        channels
    )
}

fn main() -> Result<()> {
    env_logger::init();

    let opt = Opt::from_args();

    let config: descriptor::Config = match fs::read_to_string(&opt.config) {
        Ok(data) => match toml::from_str(&data) {
            Ok(e) => e,
            Err(e) => {
                error!("Failed to parse config file: {}", e);
                Default::default()
            }
        },
        Err(_) => {
            debug!("no config at {}, using defaults", opt.config.display());
            Default::default()
        }
    };

    let bvh = Bvh::open(&opt.input).with_context(|| format!("failed to load {}", opt.input.display()))?;
    info!("loaded BVH file {}", opt.input.display());

    println!("Interval={}s", bvh.interval());
    if let Some(fps) = bvh.fps() {
        println!("FPS={}", fps);
    }
    println!("NumFrame={}", bvh.num_frame());
    println!("AnimationTime={}s", bvh.duration());
    println!(
        "NumFrame={} NumChannel={} Stride={}",
        bvh.num_frame(),
        bvh.num_channel(),
        bvh.stride()
    );

    println!("Joints:");
    for joint in bvh.joints() {
        println!("{}", describe(&joint));
    }

    if let Some(output) = opt.output {
        let opts = config.output.into();
        bvh.save_with(&output, &opts)
            .with_context(|| format!("failed to save {}", output.display()))?;
        info!("saved {}", output.display());
    }

    Ok(())
}
