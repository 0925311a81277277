//! A small CLI that loads a TOML cluster description and replays a
//! scripted sequence of job/reservation placements against it, printing
//! the resulting bitmaps. Meant for exploring the picker and row-packing
//! behavior interactively, not as a stable tool.

use std::path::PathBuf;

use clap::Parser;
use conres::{job_test, ClusterConfig, JobRequest, PartitionState};
use log::error;

#[derive(Parser, Debug)]
#[command(author, version, about = "Replay job placements against a cluster description")]
struct Args {
    /// Path to a TOML cluster description (see `ClusterConfig`).
    cluster: PathBuf,

    /// Number of full-node jobs to place, one after another, reporting
    /// each one's chosen nodes as it lands.
    #[arg(short, long, default_value_t = 1)]
    jobs: u32,

    /// Each placed job's minimum node count.
    #[arg(short, long, default_value_t = 1)]
    min_nodes: u32,

    /// How many overlapping rows the partition may open.
    #[arg(short, long, default_value_t = 1)]
    row_cap: usize,

    /// Enable verbose debug dumps.
    #[arg(short, long)]
    debug: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    conres::set_debug(args.debug);

    let topo = match ClusterConfig::load(&args.cluster).and_then(ClusterConfig::into_topology) {
        Ok(t) => t,
        Err(e) => {
            error!("failed to load cluster description: {e}");
            std::process::exit(1);
        }
    };

    let mut partition = PartitionState::with_row_cap(args.row_cap, topo.total_cores() as usize);
    let mut avail = topo.new_node_bitmap();
    avail.set_all();

    for i in 0..args.jobs {
        let req = JobRequest::full_node(args.min_nodes);
        match job_test(&topo, &mut partition, &req, &mut avail, None) {
            Ok(job) => println!(
                "job {i}: nodes {{{}}} cores {{{}}}",
                job.node_bitmap.bit_fmt(),
                job.to_global_cores(&topo).bit_fmt()
            ),
            Err(e) => {
                println!("job {i}: infeasible ({e})");
                break;
            }
        }
    }

    println!(
        "final layout: {} row(s), {} job(s) total",
        partition.num_rows(),
        partition.total_job_count()
    );
}
