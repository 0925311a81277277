//! End-to-end coverage of the six canonical placement/reservation
//! scenarios against the public crate surface, so a regression in the
//! wiring between modules -- not just within one -- gets caught.

use conres::picker::{sequential, CoreSpec};
use conres::{job_test, resv_test, BitSet, JobRequest, PartitionState, ReservationRequest, Switch};

/// The 4-node cluster common to every scenario: core counts [2,2,2,4].
fn cluster() -> conres::ClusterTopology {
    conres::ClusterTopology::new(&[2, 2, 2, 4])
}

/// S1/S2: a job occupying the first core of every node (J1), sharing
/// row 0 with a second job on node 3's remaining cores (J4); a second
/// row holds two jobs (J2, J3) that conflict with J1. Removing J1
/// should compact the survivors without losing any of them or breaking
/// row disjointness.
#[test]
fn s1_s2_row_packing_and_removal() {
    let topo = cluster();
    let mut partition = PartitionState::with_row_cap(2, topo.total_cores() as usize);
    let mut avail = topo.new_node_bitmap();
    avail.set_all();

    let j1 = job_test(&topo, &mut partition, &JobRequest::full_node(4), &mut avail, None).unwrap();
    assert_eq!(j1.node_bitmap.count(), 4);

    // Competing jobs land in a second row because they overlap J1.
    let mut avail2 = topo.new_node_bitmap();
    avail2.set_all();
    let j2 = job_test(&topo, &mut partition, &JobRequest::full_node(3), &mut avail2, None).unwrap();
    assert_eq!(partition.num_rows(), 2);
    assert_eq!(partition.total_job_count(), 2);

    partition.remove_job(&topo, &j1);
    assert_eq!(partition.total_job_count(), 1);
    let total_in_rows: usize = partition.rows.iter().map(|r| r.num_jobs()).sum();
    assert_eq!(total_in_rows, 1);
    let _ = j2;
}

/// S3: full-node reservation, avail = {0,1,2,3}, node_cnt = 2 -> {0,1}.
#[test]
fn s3_full_node_reservation() {
    let topo = cluster();
    let mut avail = topo.new_node_bitmap();
    avail.set_all();
    let req = ReservationRequest::full_node(2);
    let r = resv_test(&topo, &req, &mut avail, None).unwrap();
    assert_eq!(r.nodes.count(), 2);
    assert!(r.nodes.test(0) && r.nodes.test(1));
}

/// S4: aggregate partial core request, core_cnt = [6], node_cnt = 3,
/// inventory [2,2,2,4] -> nodes {0,1,2}, cores 0..=5.
#[test]
fn s4_aggregate_partial_reservation() {
    let topo = cluster();
    let mut avail = topo.new_node_bitmap();
    avail.set_all();
    let req = ReservationRequest::aggregate(3, 6);
    let r = resv_test(&topo, &req, &mut avail, None).unwrap();
    assert_eq!(r.nodes.count(), 3);
    assert_eq!(r.cores.count(), 6);
    for c in 0..6 {
        assert!(r.cores.test(c));
    }
}

/// S5: per-node list [3,2,0], node_cnt = 0, inventory [2,2,2,4] ->
/// unsatisfiable.
#[test]
fn s5_per_node_reservation_unsatisfiable() {
    let topo = cluster();
    let mut avail = topo.new_node_bitmap();
    avail.set_all();
    let req = ReservationRequest::per_node(vec![3, 2, 0]);
    assert!(resv_test(&topo, &req, &mut avail, None).is_err());
}

/// S6: two leaf switches {0,1} and {2,3} under one root; a 2-node
/// request should land entirely within one leaf, never split.
#[test]
fn s6_topology_best_fit_stays_within_one_leaf() {
    let topo = cluster();
    let mut leaf_a = topo.new_node_bitmap();
    leaf_a.set(0);
    leaf_a.set(1);
    let mut leaf_b = topo.new_node_bitmap();
    leaf_b.set(2);
    leaf_b.set(3);
    let mut root = topo.new_node_bitmap();
    root.set_all();
    let topo = topo.with_switches(vec![
        Switch::new("leaf-a", 0, leaf_a),
        Switch::new("leaf-b", 0, leaf_b),
        Switch::new("root", 1, root),
    ]);

    let mut avail = topo.new_node_bitmap();
    avail.set_all();
    let req = ReservationRequest::full_node(2);
    let r = resv_test(&topo, &req, &mut avail, None).unwrap();
    assert_eq!(r.nodes.count(), 2);
    let both_in_a = r.nodes.test(0) && r.nodes.test(1);
    let both_in_b = r.nodes.test(2) && r.nodes.test(3);
    assert!(both_in_a || both_in_b);
}

/// Same topology as S6, but with an aggregate core count: the topology
/// picker must not only keep both chosen nodes in one leaf, it must pick
/// the actual core bits for them (§4.8 step 9), end to end through
/// `resv_test`/`ReservationRequest::aggregate` rather than calling
/// `picker::topology::pick` directly.
#[test]
fn s6_partial_topology_picks_cores_within_one_leaf() {
    let topo = cluster();
    let all_cores = BitSet::new_full(topo.total_cores() as usize);
    let topo = topo.with_specialized_cores(all_cores);
    let mut leaf_a = topo.new_node_bitmap();
    leaf_a.set(0);
    leaf_a.set(1);
    let mut leaf_b = topo.new_node_bitmap();
    leaf_b.set(2);
    leaf_b.set(3);
    let mut root = topo.new_node_bitmap();
    root.set_all();
    let topo = topo.with_switches(vec![
        Switch::new("leaf-a", 0, leaf_a),
        Switch::new("leaf-b", 0, leaf_b),
        Switch::new("root", 1, root),
    ]);

    let mut avail = topo.new_node_bitmap();
    avail.set_all();
    let req = ReservationRequest::aggregate(2, 4);
    let r = resv_test(&topo, &req, &mut avail, None).unwrap();
    assert_eq!(r.nodes.count(), 2);
    assert_eq!(r.cores.count(), 4);
    let both_in_a = r.nodes.test(0) && r.nodes.test(1);
    let both_in_b = r.nodes.test(2) && r.nodes.test(3);
    assert!(both_in_a || both_in_b);
}

/// A job request with an explicit per-node core list places exactly
/// those cores and nothing else.
#[test]
fn per_node_job_request_places_exact_cores() {
    let topo = cluster();
    let mut partition = PartitionState::with_row_cap(1, topo.total_cores() as usize);
    let mut avail = topo.new_node_bitmap();
    avail.set_all();
    let req = JobRequest::per_node(vec![2, 2, 2, 4]);
    let job = job_test(&topo, &mut partition, &req, &mut avail, None).unwrap();
    assert_eq!(job.ncpus, 10);
}

/// Sanity check that the sequential picker's full-node mode conserves
/// the requested node count exactly (I5).
#[test]
fn sequential_full_node_conserves_requested_count() {
    let topo = cluster();
    let mut avail = topo.new_node_bitmap();
    avail.set_all();
    let r = sequential::pick(&topo, &CoreSpec::None, 3, &mut avail, None).unwrap();
    assert_eq!(r.nodes.count(), 3);
}
