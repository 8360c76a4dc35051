#![allow(dead_code)]
use mesh_part::io::mesh::InMemoryMesh;
use mesh_part::partitioning::describe;
use mesh_part::prelude::*;

/// Run `f` once per rank of a fresh `LocalComm` universe, each on its own
/// thread, and collect the results in rank order.
pub fn on_ranks<R, F>(n: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(LocalComm) -> R + Sync,
{
    std::thread::scope(|s| {
        let handles: Vec<_> = LocalComm::universe(n)
            .into_iter()
            .map(|comm| {
                let f = &f;
                s.spawn(move || f(comm))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("rank thread panicked"))
            .collect()
    })
}

/// Build the part of `comm.rank()` for `mesh` split by `assignment`.
pub fn build_part(
    mesh: &InMemoryMesh,
    assignment: &[usize],
    comm: LocalComm,
    config: PartConfig,
) -> Result<Part<LocalComm>, MeshPartError> {
    let descriptions = describe(mesh, assignment, comm.size())?;
    let d = &descriptions[comm.rank()];
    PartBuilder::new(config, comm)
        .install_defaults(mesh.cell_dim)
        .build(mesh, d)
}

/// `x`-major split of an `nx`-wide structured box with `per_layer` cells
/// per x layer. Layer `i` goes to the number of `cuts` at or below `i`.
pub fn split_along_x(nx: usize, per_layer: usize, cuts: &[usize]) -> Vec<usize> {
    (0..nx * per_layer)
        .map(|g| cuts.iter().filter(|&&c| g / per_layer >= c).count())
        .collect()
}

pub fn config(fields: usize) -> PartConfig {
    PartConfig {
        fields_per_cell: fields,
        ..PartConfig::default()
    }
}
