mod util;
use util::*;

use mesh_part::geometry::vector::{dot, sub};
use mesh_part::mesh_generation::{BOUNDARY_X_MAX, BOUNDARY_X_MIN, box_hexahedra, box_quadrangles};
use mesh_part::prelude::*;

// 10 x 5 x 4 hexahedra, x-major GlobalIds, split at ix = 5
const NX: usize = 10;
const PER_LAYER: usize = 5 * 4;

fn assignment() -> Vec<usize> {
    split_along_x(NX, PER_LAYER, &[5])
}

#[test]
fn ghost_keys_are_the_far_side_of_the_cut() {
    let mesh = box_hexahedra(NX, 5, 4, [10.0, 5.0, 4.0]);
    let keys = on_ranks(2, |comm| {
        let part = build_part(&mesh, &assignment(), comm, config(1)).unwrap();
        assert_eq!(part.count_local_cells(), 100);
        part.ghost_keys().map(GlobalId::get).collect::<Vec<_>>()
    });
    assert_eq!(keys[0], (100..120).collect::<Vec<u64>>());
    assert_eq!(keys[1], (80..100).collect::<Vec<u64>>());
}

#[test]
fn local_cells_partition_the_mesh() {
    let mesh = box_hexahedra(NX, 5, 4, [10.0, 5.0, 4.0]);
    let owned = on_ranks(2, |comm| {
        let part = build_part(&mesh, &assignment(), comm, config(1)).unwrap();
        // LocalIds are dense and follow the section order
        for (i, c) in part.local_cells().enumerate() {
            assert_eq!(c.id(), LocalId::new(i));
        }
        part.local_cells().map(|c| c.global_id().get()).collect::<Vec<_>>()
    });
    let mut all: Vec<u64> = owned.concat();
    all.sort_unstable();
    assert_eq!(all, (0..200).collect::<Vec<u64>>());
    assert_eq!(owned[0], (0..100).collect::<Vec<u64>>());
}

#[test]
fn exchanged_ghosts_carry_their_global_ids() {
    let mesh = box_hexahedra(NX, 5, 4, [10.0, 5.0, 4.0]);
    on_ranks(2, |comm| {
        let mut part = build_part(&mesh, &assignment(), comm, config(2)).unwrap();
        for c in part.local_cells_mut() {
            let g = c.global_id().get() as f64;
            c.coefficients_mut().copy_from_slice(&[g, -g]);
        }
        part.share_coefficients().unwrap();
        let inner: usize = part.inner_cells().count();
        part.update_coefficients().unwrap();
        assert_eq!(inner + part.inter_cells().count(), 100);
        assert_eq!(part.inter_cells().count(), 20);
        for g in part.ghost_cells() {
            let want = g.global_id().get() as f64;
            assert_eq!(g.coefficients(), &[want, -want]);
        }
    });
}

#[test]
fn volumes_and_face_sets() {
    let mesh = box_hexahedra(NX, 5, 4, [10.0, 5.0, 4.0]);
    let stats = on_ranks(2, |comm| {
        let part = build_part(&mesh, &assignment(), comm, config(1)).unwrap();
        for f in part.ghost_faces() {
            assert!(part.cell(f.holder()).unwrap().is_inter());
            let ghost = part.cell(f.sharer().unwrap()).unwrap();
            assert!(part.ghost_by_global(ghost.global_id()).is_some());
            assert!((f.area() - 1.0).abs() < 1e-12);
        }
        for f in part.boundary_faces() {
            let holder = part.cell(f.holder()).unwrap();
            assert!(dot(sub(f.center(), holder.center()), f.normal()) > 0.0);
        }
        let xmin = part.boundary_faces_of(BOUNDARY_X_MIN).unwrap().count();
        let xmax = part.boundary_faces_of(BOUNDARY_X_MAX).unwrap().count();
        (part.volume(), part.ghost_faces().len(), xmin, xmax)
    });
    let total: f64 = stats.iter().map(|s| s.0).sum();
    assert!((total - 200.0).abs() < 1e-9);
    assert_eq!(stats[0].1, 20);
    assert_eq!(stats[1].1, 20);
    assert_eq!((stats[0].2, stats[0].3), (20, 0));
    assert_eq!((stats[1].2, stats[1].3), (0, 20));
}

#[test]
fn interior_normals_point_from_holder_to_sharer() {
    let hexahedra = box_hexahedra(NX, 5, 4, [10.0, 5.0, 4.0]);
    let quadrangles = box_quadrangles(6, 3, [6.0, 3.0]);
    let cases = [
        (&hexahedra, assignment()),
        (&quadrangles, split_along_x(6, 3, &[3])),
    ];
    for (mesh, split) in cases {
        let counts = on_ranks(2, |comm| {
            let part = build_part(mesh, &split, comm, config(1)).unwrap();
            for f in part.local_faces().iter().chain(part.ghost_faces()) {
                assert!(
                    dot(f.normal(), f.holder_to_sharer()) > 0.0,
                    "face at {:?} points back into its holder",
                    f.center()
                );
            }
            (part.local_faces().len(), part.ghost_faces().len())
        });
        assert!(counts.iter().all(|&(local, ghost)| local > 0 && ghost > 0));
    }
}

#[test]
fn building_twice_is_deterministic() {
    let mesh = box_hexahedra(NX, 5, 4, [10.0, 5.0, 4.0]);
    let shape = |comm: LocalComm| {
        let part = build_part(&mesh, &assignment(), comm, config(1)).unwrap();
        (
            part.local_faces().len(),
            part.ghost_faces().len(),
            part.boundary_faces().len(),
            part.ghost_keys().collect::<Vec<_>>(),
        )
    };
    assert_eq!(on_ranks(2, shape), on_ranks(2, shape));
}

#[test]
fn conservation_across_ranks() {
    let mesh = box_hexahedra(NX, 5, 4, [10.0, 5.0, 4.0]);
    let parts = on_ranks(2, |comm| {
        let part = build_part(&mesh, &assignment(), comm, config(1)).unwrap();
        part.measure_integral(|x| x[0] + 2.0 * x[1])
    });
    // ∫ x + 2y over [0,10]x[0,5]x[0,4]
    let exact = 50.0 * 20.0 + 2.0 * 12.5 * 40.0;
    assert!((parts.iter().sum::<f64>() - exact).abs() < 1e-8);
}
