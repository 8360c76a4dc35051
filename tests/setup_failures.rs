mod util;
use util::*;

use mesh_part::mesh_generation::box_quadrangles;
use mesh_part::prelude::*;

/// Reverse the node order of quadrangle `gid`, turning it inside out.
fn invert(mesh: &mut InMemoryMesh, gid: usize) {
    mesh.zones[0].sections[0].connectivity[4 * gid..4 * gid + 4].reverse();
}

#[test]
fn inverted_cell_fails_both_ranks() {
    let mut mesh = box_quadrangles(4, 1, [4.0, 1.0]);
    invert(&mut mesh, 3);
    let results = on_ranks(2, |comm| build_part(&mesh, &[0, 0, 1, 1], comm, config(1)).err());
    assert!(matches!(results[1], Some(MeshPartError::InvalidMesh(_))));
    assert!(matches!(
        results[0],
        Some(MeshPartError::CommError { neighbor: 1, .. })
    ));
}

#[test]
fn failure_reaches_ranks_two_hops_away() {
    // strips of two cells; the broken cell sits on the last rank, away from any cut
    let mut mesh = box_quadrangles(6, 1, [6.0, 1.0]);
    invert(&mut mesh, 5);
    let assignment = split_along_x(6, 1, &[2, 4]);
    let results = on_ranks(3, |comm| build_part(&mesh, &assignment, comm, config(1)).err());
    assert!(matches!(
        results[0],
        Some(MeshPartError::CommError { neighbor: 1, .. })
    ));
    assert!(matches!(
        results[1],
        Some(MeshPartError::CommError { neighbor: 2, .. })
    ));
    assert!(matches!(results[2], Some(MeshPartError::InvalidMesh(_))));
}

#[test]
fn without_handshake_only_direct_neighbours_fail() {
    let mut mesh = box_quadrangles(6, 1, [6.0, 1.0]);
    invert(&mut mesh, 5);
    let assignment = split_along_x(6, 1, &[2, 4]);
    let no_handshake = PartConfig {
        verify_halo_order: false,
        ..config(1)
    };
    let results = on_ranks(3, |comm| {
        build_part(&mesh, &assignment, comm, no_handshake.clone()).err()
    });
    assert_eq!(results[0], None);
    assert!(matches!(
        results[1],
        Some(MeshPartError::CommError { neighbor: 2, .. })
    ));
    assert!(matches!(results[2], Some(MeshPartError::InvalidMesh(_))));
}
