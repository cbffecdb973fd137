/// A single column value. `None` is SQL `NULL`.
pub type Cell = Option<Vec<u8>>;

/// A fetched row: column names with raw bytes, in result-set order.
///
/// Column lookup is by exact name. Values stay as bytes because WordPress
/// tables routinely hold latin1 or binary data next to UTF-8.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    cells: Vec<(String, Cell)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cells(cells: Vec<(String, Cell)>) -> Self {
        Self { cells }
    }

    /// Builder used mostly by tests: appends a text cell.
    pub fn with(mut self, column: &str, value: Option<&str>) -> Self {
        self.push(column, value.map(|v| v.as_bytes().to_vec()));
        self
    }

    pub fn push(&mut self, column: impl Into<String>, value: Cell) {
        self.cells.push((column.into(), value));
    }

    /// Returns the cell for `column`, or `None` when the row has no such column.
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cell)| cell)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Convenience accessor returning the cell as lossy UTF-8 text.
    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column)
            .and_then(|cell| cell.as_ref())
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.cells.iter().map(|(name, cell)| (name.as_str(), cell))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
