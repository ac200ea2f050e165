//! # Table Grids
//!
//! A [`TableMap`] lays the cells of a table out on a row/column grid,
//! accounting for row and column spans. Grid selections and grid merges are
//! both computed against the map rather than the raw child lists.
//!
//! ```text
//!  ┌─────┬─────┬─────┐
//!  │ a   │ b (colspan 2)│
//!  ├─────┼─────┼─────┤        rows[0] = [a, b, b]
//!  │ c   │ d   │ e   │        rows[1] = [c, d, e]
//!  └─────┴─────┴─────┘
//! ```

use crate::error::{ModelError, ModelResult};
use crate::key::NodeKey;
use crate::node::{ElementKind, NodeKind};
use crate::store::NodeStore;
use crate::traversal;

/// Placement of one cell inside the grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridCell {
    pub key: NodeKey,
    pub row: usize,
    pub col: usize,
    pub row_span: usize,
    pub col_span: usize,
}

impl GridCell {
    fn last_row(&self) -> usize {
        self.row + self.row_span - 1
    }

    fn last_col(&self) -> usize {
        self.col + self.col_span - 1
    }
}

#[derive(Debug, Clone, Default)]
pub struct TableMap {
    cells: Vec<GridCell>,
    /// `rows[r][c]` indexes into `cells`
    rows: Vec<Vec<Option<usize>>>,
}

impl TableMap {
    pub fn build(store: &NodeStore, table: &NodeKey) -> ModelResult<Self> {
        let table_node = store.require(table)?;
        if !matches!(table_node.element_kind(), Some(ElementKind::Table)) {
            return Err(ModelError::NotATable(table.clone()));
        }

        let mut map = TableMap::default();
        let row_keys: Vec<&NodeKey> = table_node
            .children()
            .iter()
            .filter(|k| matches!(store.get(k).and_then(|n| n.element_kind()), Some(ElementKind::TableRow)))
            .collect();

        for (r, row_key) in row_keys.iter().enumerate() {
            let row = store.require(row_key)?;
            let mut c = 0;
            for cell_key in row.children() {
                let cell = store.require(cell_key)?;
                let (row_span, col_span) = match &cell.kind {
                    NodeKind::Element(ElementKind::TableCell { row_span, col_span, .. }, _) => {
                        ((*row_span).max(1) as usize, (*col_span).max(1) as usize)
                    }
                    _ => return Err(ModelError::NotATableCell(cell_key.clone())),
                };
                while map.index_at(r, c).is_some() {
                    c += 1;
                }
                let index = map.cells.len();
                map.cells.push(GridCell {
                    key: cell_key.clone(),
                    row: r,
                    col: c,
                    row_span,
                    col_span,
                });
                for rr in r..r + row_span {
                    for cc in c..c + col_span {
                        map.occupy(rr, cc, index);
                    }
                }
                c += col_span;
            }
        }
        Ok(map)
    }

    fn occupy(&mut self, row: usize, col: usize, index: usize) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cols = &mut self.rows[row];
        if cols.len() <= col {
            cols.resize(col + 1, None);
        }
        cols[col] = Some(index);
    }

    fn index_at(&self, row: usize, col: usize) -> Option<usize> {
        self.rows.get(row).and_then(|cols| cols.get(col)).copied().flatten()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn col_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn cell_at(&self, row: usize, col: usize) -> Option<&GridCell> {
        self.index_at(row, col).map(|i| &self.cells[i])
    }

    pub fn position_of(&self, key: &NodeKey) -> Option<&GridCell> {
        self.cells.iter().find(|cell| &cell.key == key)
    }

    /// Smallest rectangle containing both cells, grown until no spanning
    /// cell sticks out of it
    pub fn rectangle(&self, a: &NodeKey, b: &NodeKey) -> ModelResult<GridRange> {
        let ca = self
            .position_of(a)
            .ok_or_else(|| ModelError::NotATableCell(a.clone()))?;
        let cb = self
            .position_of(b)
            .ok_or_else(|| ModelError::NotATableCell(b.clone()))?;

        let mut range = GridRange {
            from_row: ca.row.min(cb.row),
            to_row: ca.last_row().max(cb.last_row()),
            from_col: ca.col.min(cb.col),
            to_col: ca.last_col().max(cb.last_col()),
        };
        loop {
            let mut grown = range;
            for r in range.from_row..=range.to_row {
                for c in range.from_col..=range.to_col {
                    if let Some(cell) = self.cell_at(r, c) {
                        grown.from_row = grown.from_row.min(cell.row);
                        grown.to_row = grown.to_row.max(cell.last_row());
                        grown.from_col = grown.from_col.min(cell.col);
                        grown.to_col = grown.to_col.max(cell.last_col());
                    }
                }
            }
            if grown == range {
                return Ok(range);
            }
            range = grown;
        }
    }

    /// Cells inside `range`, row-major, each listed once
    pub fn cells_in(&self, range: GridRange) -> Vec<NodeKey> {
        let mut seen = Vec::new();
        for r in range.from_row..=range.to_row {
            for c in range.from_col..=range.to_col {
                if let Some(index) = self.index_at(r, c) {
                    if !seen.contains(&index) {
                        seen.push(index);
                    }
                }
            }
        }
        seen.into_iter().map(|i| self.cells[i].key.clone()).collect()
    }
}

/// Inclusive row/column bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridRange {
    pub from_row: usize,
    pub to_row: usize,
    pub from_col: usize,
    pub to_col: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSelection {
    pub grid_key: NodeKey,
    pub anchor_cell_key: NodeKey,
    pub focus_cell_key: NodeKey,
}

impl GridSelection {
    pub fn new(grid_key: NodeKey, anchor_cell_key: NodeKey, focus_cell_key: NodeKey) -> Self {
        Self {
            grid_key,
            anchor_cell_key,
            focus_cell_key,
        }
    }

    pub fn shape(&self, store: &NodeStore) -> ModelResult<GridRange> {
        TableMap::build(store, &self.grid_key)?.rectangle(&self.anchor_cell_key, &self.focus_cell_key)
    }

    pub fn cell_keys(&self, store: &NodeStore) -> ModelResult<Vec<NodeKey>> {
        let map = TableMap::build(store, &self.grid_key)?;
        let range = map.rectangle(&self.anchor_cell_key, &self.focus_cell_key)?;
        Ok(map.cells_in(range))
    }

    /// Selected cells, each followed by its descendants
    pub fn get_nodes(&self, store: &NodeStore) -> ModelResult<Vec<NodeKey>> {
        let mut nodes = Vec::new();
        for cell in self.cell_keys(store)? {
            let inner = traversal::descendants(store, &cell);
            nodes.push(cell);
            nodes.extend(inner);
        }
        Ok(nodes)
    }

    /// Cell text, tab separated within a row, newline separated across rows
    pub fn text_content(&self, store: &NodeStore) -> ModelResult<String> {
        let map = TableMap::build(store, &self.grid_key)?;
        let range = map.rectangle(&self.anchor_cell_key, &self.focus_cell_key)?;
        let mut lines = Vec::new();
        for r in range.from_row..=range.to_row {
            let mut cols = Vec::new();
            for c in range.from_col..=range.to_col {
                if let Some(cell) = map.cell_at(r, c) {
                    if cell.row == r && cell.col == c {
                        cols.push(traversal::text_content(store, &cell.key));
                    }
                }
            }
            lines.push(cols.join("\t"));
        }
        Ok(lines.join("\n"))
    }
}

/// Where one source cell lands when a pasted grid is merged into a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridPlacement {
    pub source_row: usize,
    pub source_col: usize,
    pub target: NodeKey,
}

/// Map a `rows x cols` source grid onto `table` starting at `anchor_cell`.
/// Source cells falling outside the table are dropped; the table never
/// grows. Positions covered by a span land on the spanning cell only once.
pub fn plan_grid_merge(
    store: &NodeStore,
    table: &NodeKey,
    anchor_cell: &NodeKey,
    rows: usize,
    cols: usize,
) -> ModelResult<Vec<GridPlacement>> {
    let map = TableMap::build(store, table)?;
    let anchor = map
        .position_of(anchor_cell)
        .ok_or_else(|| ModelError::NotATableCell(anchor_cell.clone()))?;

    let mut placements = Vec::new();
    for source_row in 0..rows {
        let r = anchor.row + source_row;
        if r >= map.row_count() {
            break;
        }
        for source_col in 0..cols {
            let c = anchor.col + source_col;
            let Some(cell) = map.cell_at(r, c) else {
                break;
            };
            if cell.row == r && cell.col == c {
                placements.push(GridPlacement {
                    source_row,
                    source_col,
                    target: cell.key.clone(),
                });
            }
        }
    }
    Ok(placements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    fn cell(store: &mut NodeStore, row: &str, key: &str, col_span: u32) {
        let mut node = Node::new_element(
            NodeKey::from(key),
            ElementKind::TableCell {
                header: false,
                col_span,
                row_span: 1,
            },
        );
        node.parent = Some(NodeKey::from(row));
        store.insert(node);
        if let Some(data) = store.get_mut(&NodeKey::from(row)).and_then(|n| n.element_mut()) {
            data.children.push(NodeKey::from(key));
        }
    }

    /// | a | b  b |
    /// | c | d | e |
    fn table() -> NodeStore {
        let mut store = NodeStore::new();
        let mut table = Node::new_element(NodeKey::from("table"), ElementKind::Table);
        table.parent = Some(NodeKey::root());
        if let Some(data) = table.element_mut() {
            data.children = vec![NodeKey::from("r0"), NodeKey::from("r1")];
        }
        store.insert(table);
        for row in ["r0", "r1"] {
            let mut node = Node::new_element(NodeKey::from(row), ElementKind::TableRow);
            node.parent = Some(NodeKey::from("table"));
            store.insert(node);
        }
        cell(&mut store, "r0", "a", 1);
        cell(&mut store, "r0", "b", 2);
        cell(&mut store, "r1", "c", 1);
        cell(&mut store, "r1", "d", 1);
        cell(&mut store, "r1", "e", 1);
        store
    }

    #[test]
    fn test_table_map_accounts_for_spans() {
        let store = table();
        let map = TableMap::build(&store, &NodeKey::from("table")).unwrap();
        assert_eq!(map.row_count(), 2);
        assert_eq!(map.col_count(), 3);
        assert_eq!(map.cell_at(0, 2).map(|c| c.key.as_str()), Some("b"));
        assert_eq!(map.cell_at(1, 2).map(|c| c.key.as_str()), Some("e"));
    }

    #[test]
    fn test_rectangle_grows_over_spanning_cells() {
        let store = table();
        let selection = GridSelection::new(NodeKey::from("table"), NodeKey::from("d"), NodeKey::from("b"));
        assert_eq!(
            selection.cell_keys(&store).unwrap(),
            vec![NodeKey::from("b"), NodeKey::from("d"), NodeKey::from("e")]
        );
    }

    #[test]
    fn test_not_a_table() {
        let store = table();
        assert_eq!(
            TableMap::build(&store, &NodeKey::from("r0")).unwrap_err(),
            ModelError::NotATable(NodeKey::from("r0"))
        );
    }

    #[test]
    fn test_grid_merge_clamps_to_table() {
        let store = table();
        let placements =
            plan_grid_merge(&store, &NodeKey::from("table"), &NodeKey::from("d"), 3, 3).unwrap();
        let targets: Vec<&str> = placements.iter().map(|p| p.target.as_str()).collect();
        assert_eq!(targets, vec!["d", "e"]);
    }
}
