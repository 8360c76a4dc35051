mod util;
use util::*;

use mesh_part::mesh_generation::box_quadrangles;
use mesh_part::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeMap;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn scatter_then_gather_is_identity(
        nx in 2usize..7,
        ny in 1usize..4,
        width in 1usize..4,
        seed in any::<u64>(),
    ) {
        let mesh = box_quadrangles(nx, ny, [nx as f64, ny as f64]);
        let comm = LocalComm::universe(1).remove(0);
        let mut part = build_part(&mesh, &vec![0; nx * ny], comm, config(width)).unwrap();
        let values: Vec<f64> = (0..nx * ny * width)
            .map(|i| (seed.wrapping_mul(i as u64 + 1) % 1000) as f64)
            .collect();
        part.scatter_coefficients(&values).unwrap();
        prop_assert_eq!(part.gather_coefficients(), values.clone());

        // the field arrays carry the same numbers section by section
        part.gather_fields();
        for cell in part.local_cells_mut() {
            cell.coefficients_mut().fill(0.0);
        }
        part.scatter_fields();
        prop_assert_eq!(part.gather_coefficients(), values);
    }

    #[test]
    fn ghosts_mirror_owners_after_update(
        nx in 3usize..8,
        ny in 1usize..3,
        cut in 1usize..7,
        scale in 1.0f64..100.0,
    ) {
        prop_assume!(cut < nx);
        let mesh = box_quadrangles(nx, ny, [nx as f64, ny as f64]);
        let assignment = split_along_x(nx, ny, &[cut]);
        let views = on_ranks(2, |comm| {
            let mut part = build_part(&mesh, &assignment, comm, config(1)).unwrap();
            for cell in part.local_cells_mut() {
                let g = cell.global_id().get() as f64;
                cell.coefficients_mut()[0] = scale * g;
            }
            part.share_coefficients().unwrap();
            part.update_coefficients().unwrap();
            let owned: BTreeMap<u64, f64> = part
                .local_cells()
                .map(|c| (c.global_id().get(), c.coefficients()[0]))
                .collect();
            let ghosts: BTreeMap<u64, f64> = part
                .ghost_cells()
                .map(|c| (c.global_id().get(), c.coefficients()[0]))
                .collect();
            (owned, ghosts)
        });
        for (rank, (_, ghosts)) in views.iter().enumerate() {
            prop_assert_eq!(ghosts.len(), ny);
            let other = &views[1 - rank].0;
            for (gid, value) in ghosts {
                prop_assert_eq!(other.get(gid), Some(value));
            }
        }
    }
}
