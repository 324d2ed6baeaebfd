use std::collections::BTreeMap;

/// A fixed mapping from column index to the keyed worker that owns the column, built once per
/// run so every part of a column reaches the same worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRouter {
    routes: BTreeMap<usize, usize>,
    workers: usize,
}

impl ColumnRouter {
    /// Spreads `columns` over `workers` round robin, in the given order.
    pub fn new(columns: &[usize], workers: usize) -> Self {
        let workers = workers.clamp(1, columns.len().max(1));
        let routes = columns
            .iter()
            .enumerate()
            .map(|(i, &column)| (column, i % workers))
            .collect();

        Self { routes, workers }
    }

    pub fn route(&self, column: usize) -> Option<usize> {
        self.routes.get(&column).copied()
    }

    /// The amount of keyed workers the router spreads the columns over.
    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.routes.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_column_keeps_its_worker() {
        let router = ColumnRouter::new(&[7, 2, 9, 4], 3);

        assert_eq!(router.route(7), Some(0));
        assert_eq!(router.route(2), Some(1));
        assert_eq!(router.route(9), Some(2));
        assert_eq!(router.route(4), Some(0));
        assert_eq!(router.route(5), None);
        assert_eq!(router, ColumnRouter::new(&[7, 2, 9, 4], 3));
    }

    #[test]
    fn never_more_workers_than_columns() {
        let router = ColumnRouter::new(&[1, 3], 8);
        assert_eq!(router.workers(), 2);
        assert_eq!(router.columns().collect::<Vec<_>>(), [1, 3]);
    }
}
