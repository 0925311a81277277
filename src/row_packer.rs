//! Rebuilds a partition's row bitmaps after a job leaves, repacking the
//! survivors into the minimum number of rows that keeps every row
//! conflict-free — and falling back to the unchanged layout whenever a
//! repack cannot place every job.

use std::cmp::Ordering;
use std::rc::Rc;

use log::debug;

use crate::job::JobResources;
use crate::partition::{add_job_to_row, job_fits_into_cores, sort_part_rows, PartitionState};
use crate::topology::ClusterTopology;

/// Orders jobs for first-fit placement by `(jstart, ncpus)`, both
/// ascending. Unlike the source's `_compare_support` — which returns
/// only `{0, 1}` and so is not a valid strict-weak-ordering comparator —
/// this uses proper `<` semantics, per the spec's own recommendation.
fn placement_order(topo: &ClusterTopology, a: &JobResources, b: &JobResources) -> Ordering {
    a.jstart(topo)
        .cmp(&b.jstart(topo))
        .then(a.ncpus.cmp(&b.ncpus))
}

/// Repacks `partition` after `removed` has left it (or, if `removed` is
/// `None`, just rebuilds consistent bitmaps for the current job set).
///
/// - A single-row partition clears or trims its one row directly.
/// - A multi-row partition with no jobs left just clears every row.
/// - Otherwise, every surviving job is pulled out, sorted by
///   `(jstart, ncpus)`, and greedily first-fit placed back into rows
///   0..num_rows, re-densifying the row order between placements. If any
///   job fails to find a row, the whole attempt is discarded and the
///   pre-repack layout (with `removed`'s cores cleared, if applicable)
///   is restored instead — the caller always observes either a
///   strictly-≤-row layout or the unchanged one, never a partially
///   repacked, broken one.
pub fn build_row_bitmaps(topo: &ClusterTopology, partition: &mut PartitionState, removed: Option<&Rc<JobResources>>) {
    if partition.num_rows() == 1 {
        let row = &mut partition.rows[0];
        if row.jobs.is_empty() {
            row.row_bitmap.clear_all();
            return;
        }
        match removed {
            Some(j) => crate::partition::remove_job_from_cores(topo, j, &mut row.row_bitmap),
            None => {
                row.row_bitmap.clear_all();
                for j in &row.jobs {
                    let projected = j.to_global_cores(topo);
                    row.row_bitmap.or(&projected);
                }
            }
        }
        return;
    }

    if partition.total_job_count() == 0 {
        for row in partition.rows.iter_mut() {
            row.row_bitmap.clear_all();
        }
        return;
    }

    // Case C: multi-row, >=1 job. Snapshot for the possible fallback.
    let orig = crate::partition::dup_row_data(&partition.rows);

    let mut all_jobs: Vec<Rc<JobResources>> = partition
        .rows
        .iter_mut()
        .flat_map(|row| {
            row.row_bitmap.clear_all();
            std::mem::take(&mut row.jobs)
        })
        .collect();
    all_jobs.sort_by(|a, b| placement_order(topo, a, b));

    let mut unplaced = Vec::new();
    for job in all_jobs {
        let mut placed = false;
        for row in partition.rows.iter_mut() {
            if job_fits_into_cores(topo, &job, &row.row_bitmap) {
                add_job_to_row(topo, job.clone(), row);
                placed = true;
                break;
            }
        }
        if placed {
            sort_part_rows(partition);
        } else {
            unplaced.push(job);
        }
    }

    if !unplaced.is_empty() {
        debug!(
            "build_row_bitmaps: repack failed to place {} job(s), restoring prior layout",
            unplaced.len()
        );
        partition.rows = orig;
        for row in partition.rows.iter_mut() {
            row.row_bitmap.clear_all();
            for j in &row.jobs {
                let projected = j.to_global_cores(topo);
                row.row_bitmap.or(&projected);
            }
        }
    }
    // else: `orig` is simply dropped here, its ownership never having
    // been transferred anywhere — the repacked `partition.rows` stands.
}
