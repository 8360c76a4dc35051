mod util;
use util::*;

use mesh_part::mesh_generation::box_quadrangles;
use mesh_part::prelude::*;

// 6 x 2 quadrangles in three vertical strips
fn strips() -> (InMemoryMesh, Vec<usize>) {
    (
        box_quadrangles(6, 2, [6.0, 2.0]),
        split_along_x(6, 2, &[2, 4]),
    )
}

#[test]
fn share_twice_and_update_first_are_rejected() {
    let (mesh, assignment) = strips();
    on_ranks(3, |comm| {
        let mut part = build_part(&mesh, &assignment, comm, config(1)).unwrap();
        assert_eq!(part.update_coefficients(), Err(MeshPartError::ExchangeIdle));
        part.share_coefficients().unwrap();
        assert_eq!(part.share_coefficients(), Err(MeshPartError::ExchangeInFlight));
        // the rejected call must not have disturbed the exchange in flight
        part.update_coefficients().unwrap();
        assert_eq!(part.update_coefficients(), Err(MeshPartError::ExchangeIdle));
    });
}

#[test]
fn middle_rank_has_two_neighbours() {
    let (mesh, assignment) = strips();
    let neighbours = on_ranks(3, |comm| {
        let part = build_part(&mesh, &assignment, comm, config(1)).unwrap();
        let s = part.schedule();
        assert_eq!(s.count_sent_cells(), s.count_received_cells());
        s.neighbors()
    });
    assert_eq!(neighbours, vec![vec![1], vec![0, 2], vec![1]]);
}

#[test]
fn repeated_exchanges_reuse_the_schedule() {
    let (mesh, assignment) = strips();
    on_ranks(3, |comm| {
        let mut part = build_part(&mesh, &assignment, comm, config(1)).unwrap();
        for step in 0..50u32 {
            for c in part.local_cells_mut() {
                c.coefficients_mut()[0] = c.global_id().get() as f64 * 1000.0 + f64::from(step);
            }
            part.share_coefficients().unwrap();
            part.update_coefficients().unwrap();
            for g in part.ghost_cells() {
                let want = g.global_id().get() as f64 * 1000.0 + f64::from(step);
                assert_eq!(g.coefficients()[0], want);
            }
        }
    });
}

#[test]
fn auxiliary_channels_run_alongside_coefficients() {
    let (mesh, assignment) = strips();
    on_ranks(3, |comm| {
        let mut part = build_part(&mesh, &assignment, comm, config(1)).unwrap();
        let mut viscosity = part.open_channel(3).unwrap();
        let mut flags = part.open_channel(1).unwrap();
        assert_ne!(viscosity.tag(), flags.tag());
        for c in part.local_cells_mut() {
            c.coefficients_mut()[0] = 1.0;
        }

        part.share_coefficients().unwrap();
        part.share_with(&mut viscosity, |c, slot| {
            let g = c.global_id().get() as f64;
            slot.copy_from_slice(&[g, g + 0.5, c.volume()]);
        })
        .unwrap();
        part.share_with(&mut flags, |c, slot| slot[0] = c.id().get() as f64)
            .unwrap();

        // finish in a different order than started
        let mut seen = Vec::new();
        part.update_with(&mut flags, |_, slot| seen.push(slot[0])).unwrap();
        let mut extra = std::collections::BTreeMap::new();
        part.update_with(&mut viscosity, |g, slot| {
            extra.insert(g.global_id(), slot.to_vec());
        })
        .unwrap();
        part.update_coefficients().unwrap();

        assert_eq!(seen.len(), part.count_ghost_cells());
        for g in part.ghost_cells() {
            let x = g.global_id().get() as f64;
            assert_eq!(extra[&g.global_id()], vec![x, x + 0.5, 1.0]);
            assert_eq!(g.coefficients(), &[1.0]);
        }
    });
}

#[test]
fn coefficients_can_be_written_into_ghosts_only_by_update() {
    let (mesh, assignment) = strips();
    on_ranks(3, |comm| {
        let mut part = build_part(&mesh, &assignment, comm, config(1)).unwrap();
        let ghost = part.ghost_cells().next().map(|g| g.id()).unwrap();
        part.cell_mut(ghost).unwrap().coefficients_mut()[0] = -7.0;
        part.share_coefficients().unwrap();
        part.update_coefficients().unwrap();
        assert_eq!(part.cell(ghost).unwrap().coefficients(), &[0.0]);
    });
}
