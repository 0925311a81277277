//! Rows of concurrently-allocating jobs within a partition, and the
//! primitives that keep a row's bitmap consistent with its job list.

use std::rc::Rc;

use log::error;

use crate::bitset::BitSet;
use crate::job::JobResources;
use crate::row_packer::build_row_bitmaps;
use crate::topology::ClusterTopology;

/// A parallel layer within a partition: jobs sharing a row must not
/// share a core. `row_bitmap` is always the OR of its jobs' global core
/// projections (I2); `job_fits_into_cores`/`add_job_to_row` are the only
/// sanctioned way to grow it, so that invariant holds by construction.
///
/// The source additionally tracks a `first_row_bitmap` alias, kept only
/// for O(1) access in the single-row case; since this type has no
/// separate "C struct with two pointers to the same buffer" concern,
/// `row_bitmap` already serves both roles.
#[derive(Clone, Debug)]
pub struct PartitionRow {
    pub jobs: Vec<Rc<JobResources>>,
    pub row_bitmap: BitSet,
}

impl PartitionRow {
    pub fn new(total_cores: usize) -> Self {
        Self {
            jobs: Vec::new(),
            row_bitmap: BitSet::new(total_cores),
        }
    }

    pub fn num_jobs(&self) -> usize {
        self.jobs.len()
    }
}

/// Rows of concurrent jobs for one partition. `num_rows == 1` is the
/// sharing-disabled case: every job lives in the single row, so no two
/// jobs in the partition may ever overlap on a core.
#[derive(Clone, Debug)]
pub struct PartitionState {
    pub rows: Vec<PartitionRow>,
    total_cores: usize,
    max_rows: usize,
}

impl PartitionState {
    pub fn new(num_rows: usize, total_cores: usize) -> Self {
        assert!(num_rows > 0, "a partition needs at least one row");
        Self {
            rows: (0..num_rows).map(|_| PartitionRow::new(total_cores)).collect(),
            total_cores,
            max_rows: num_rows,
        }
    }

    /// Like [`Self::new`], but starts with a single row and allows
    /// [`Self::open_row`] to grow lazily up to `max_rows`, matching how
    /// `job_test` opens rows on demand rather than pre-allocating every
    /// row a partition's configured sharing factor permits.
    pub fn with_row_cap(max_rows: usize, total_cores: usize) -> Self {
        assert!(max_rows > 0, "a partition needs at least one row");
        Self {
            rows: vec![PartitionRow::new(total_cores)],
            total_cores,
            max_rows,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    /// Appends a fresh, empty row if `num_rows` has not yet reached
    /// `max_rows`. Returns the new row's index, or `None` if the
    /// partition is already at its row cap.
    pub fn open_row(&mut self) -> Option<usize> {
        if self.rows.len() >= self.max_rows {
            return None;
        }
        self.rows.push(PartitionRow::new(self.total_cores));
        Some(self.rows.len() - 1)
    }

    pub fn total_cores(&self) -> usize {
        self.total_cores
    }

    pub fn total_job_count(&self) -> usize {
        self.rows.iter().map(PartitionRow::num_jobs).sum()
    }

    /// Adds an already-fitted job to the first existing row that accepts
    /// it. Does not open a new row on its own -- see [`Self::open_row`]
    /// and `job_test` for that. Returns `None` if no existing row has
    /// room.
    pub fn add_job(&mut self, topo: &ClusterTopology, job: Rc<JobResources>) -> Option<usize> {
        for (idx, row) in self.rows.iter_mut().enumerate() {
            if job_fits_into_cores(topo, &job, &row.row_bitmap) {
                add_job_to_row(topo, job, row);
                sort_part_rows(self);
                return Some(idx);
            }
        }
        None
    }

    /// Removes `job` (identified by `Rc` pointer identity) from whichever
    /// row holds it, then repacks via [`build_row_bitmaps`]. Returns
    /// `false` if the job was not found in any row.
    pub fn remove_job(&mut self, topo: &ClusterTopology, job: &Rc<JobResources>) -> bool {
        let found = self.rows.iter_mut().find_map(|row| {
            let pos = row.jobs.iter().position(|j| Rc::ptr_eq(j, job))?;
            row.jobs.remove(pos);
            Some(())
        });
        if found.is_none() {
            return false;
        }
        build_row_bitmaps(topo, self, Some(job));
        true
    }
}

/// True iff the projection of `job`'s cores into global space has empty
/// intersection with `row_bitmap` — i.e. `job` can join a row currently
/// occupying `row_bitmap` without a conflict.
pub fn job_fits_into_cores(topo: &ClusterTopology, job: &JobResources, row_bitmap: &BitSet) -> bool {
    let projected = job.to_global_cores(topo);
    projected.is_disjoint(row_bitmap)
}

/// Appends `job` to `row`, OR-ing its global core projection into the
/// row bitmap. Precondition: `job_fits_into_cores(topo, &job, &row.row_bitmap)`.
///
/// This is the one checkpoint where an internal-invariant violation (a
/// caller adding a job that does not actually fit) would silently
/// corrupt `row_bitmap` going forward, so unlike the `debug_assert!`s
/// elsewhere in this module, the fit check here is a release-mode
/// `assert!`.
pub fn add_job_to_row(topo: &ClusterTopology, job: Rc<JobResources>, row: &mut PartitionRow) {
    if !job_fits_into_cores(topo, &job, &row.row_bitmap) {
        error!(
            "add_job_to_row: job cores {} overlap row cores {}",
            job.to_global_cores(topo).bit_fmt(),
            row.row_bitmap.bit_fmt()
        );
    }
    assert!(
        job_fits_into_cores(topo, &job, &row.row_bitmap),
        "internal invariant violated: job does not fit into row"
    );
    let projected = job.to_global_cores(topo);
    row.row_bitmap.or(&projected);
    row.jobs.push(job);
}

/// Clears, for each global core `job` occupies, the corresponding bit in
/// `row_bitmap`. Safe to call even when other jobs remain in the row,
/// because per-job core ownership within a row is disjoint by I1.
pub fn remove_job_from_cores(topo: &ClusterTopology, job: &JobResources, row_bitmap: &mut BitSet) {
    let projected = job.to_global_cores(topo);
    row_bitmap.and_not(&projected);
}

/// Stable-sorts rows by descending `row_bitmap` popcount, so denser rows
/// come first. `Vec::sort_by` is stable, so ties are broken by the rows'
/// prior relative order, i.e. by row index.
pub fn sort_part_rows(partition: &mut PartitionState) {
    partition
        .rows
        .sort_by(|a, b| b.row_bitmap.count().cmp(&a.row_bitmap.count()));
}

/// A deep copy of a row array, cloning each row's bitmap and the `Rc`
/// references to its jobs (not the job records themselves). Used by the
/// row packer to snapshot a partition before a repack attempt that might
/// have to be undone.
pub fn dup_row_data(rows: &[PartitionRow]) -> Vec<PartitionRow> {
    rows.to_vec()
}
