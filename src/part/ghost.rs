//! Ghost registry: read-only mirrors of remote cells, keyed by GlobalId.

use crate::data::Scalar;
use crate::part::cell::Cell;
use crate::topology::ids::{GlobalId, LocalId};
use hashbrown::HashMap;
use std::collections::BTreeMap;

/// Ghost cells of one part.
///
/// Ghosts take the LocalIds `[first, first + len)` in ascending GlobalId
/// order, so the registry doubles as the receive side of the halo schedule.
#[derive(Clone, Debug)]
pub struct GhostRegistry<T> {
    cells: Vec<Cell<T>>,
    by_gid: HashMap<GlobalId, usize>,
    first: usize,
}

impl<T: Scalar> GhostRegistry<T> {
    /// Take ownership of `cells` and renumber them from `n_local`.
    pub fn from_cells(n_local: usize, cells: BTreeMap<GlobalId, Cell<T>>) -> Self {
        let mut by_gid = HashMap::with_capacity(cells.len());
        let cells: Vec<Cell<T>> = cells
            .into_iter()
            .enumerate()
            .map(|(k, (gid, mut cell))| {
                cell.set_id(LocalId::new(n_local + k));
                by_gid.insert(gid, k);
                cell
            })
            .collect();
        Self {
            cells,
            by_gid,
            first: n_local,
        }
    }

    #[inline]
    fn slot(&self, id: LocalId) -> Option<usize> {
        id.get()
            .checked_sub(self.first)
            .filter(|&k| k < self.cells.len())
    }

    pub fn get(&self, id: LocalId) -> Option<&Cell<T>> {
        self.slot(id).map(|k| &self.cells[k])
    }

    pub fn get_mut(&mut self, id: LocalId) -> Option<&mut Cell<T>> {
        self.slot(id).map(move |k| &mut self.cells[k])
    }

    pub fn by_global(&self, gid: GlobalId) -> Option<&Cell<T>> {
        self.by_gid.get(&gid).map(|&k| &self.cells[k])
    }

    pub fn local_id(&self, gid: GlobalId) -> Option<LocalId> {
        self.by_gid.get(&gid).map(|&k| LocalId::new(self.first + k))
    }

    /// GlobalIds of every ghost, ascending.
    pub fn keys(&self) -> impl Iterator<Item = GlobalId> + '_ {
        self.cells.iter().map(Cell::global_id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cell<T>> {
        self.cells.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Cell<T>> {
        self.cells.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Prototype;
    use crate::topology::element::ElementKind;

    fn triangle(gid: u64) -> Cell<f64> {
        let (c, i) = Prototype::cell(ElementKind::Triangle3)
            .instantiate(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])
            .unwrap();
        Cell::new(c, i, GlobalId::new(gid), LocalId::new(usize::MAX), 2)
    }

    #[test]
    fn ids_follow_ascending_global_ids() {
        let cells: BTreeMap<_, _> = [42, 7, 19]
            .into_iter()
            .map(|g| (GlobalId::new(g), triangle(g)))
            .collect();
        let mut reg = GhostRegistry::from_cells(10, cells);
        assert_eq!(reg.len(), 3);
        let keys: Vec<u64> = reg.keys().map(GlobalId::get).collect();
        assert_eq!(keys, [7, 19, 42]);
        assert_eq!(reg.local_id(GlobalId::new(19)), Some(LocalId::new(11)));
        assert_eq!(reg.get(LocalId::new(12)).map(Cell::global_id), Some(GlobalId::new(42)));
        assert!(reg.get(LocalId::new(9)).is_none());
        assert!(reg.get(LocalId::new(13)).is_none());
        reg.get_mut(LocalId::new(10)).unwrap().coefficients_mut()[1] = 3.5;
        assert_eq!(reg.by_global(GlobalId::new(7)).unwrap().coefficients(), &[0.0, 3.5]);
        assert!(reg.by_global(GlobalId::new(8)).is_none());
    }
}
