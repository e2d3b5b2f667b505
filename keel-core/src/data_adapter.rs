use crate::{Result, Row, RowLabeled, RowNames};

/// Disconnected destination for query results.
pub trait DataAdapter {
    /// Append the rows, returning how many were added.
    fn fill(&mut self, rows: Vec<RowLabeled>) -> Result<usize>;
}

/// In memory table: the labels of the first filled row and every row value.
#[derive(Default, Debug, Clone)]
pub struct DataTable {
    pub labels: Option<RowNames>,
    pub rows: Vec<Row>,
}

impl DataTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.labels.as_ref()?.iter().position(|v| v == name)
    }
}

impl DataAdapter for DataTable {
    fn fill(&mut self, rows: Vec<RowLabeled>) -> Result<usize> {
        let Some(first) = rows.first() else {
            return Ok(0);
        };
        let labels = self.labels.get_or_insert_with(|| first.labels.clone());
        if let Some(row) = rows.iter().find(|row| row.labels != *labels) {
            return Err(crate::Error::msg(format!(
                "Cannot fill a table with columns {:?} using a row with columns {:?}",
                labels, row.labels
            )));
        }
        let count = rows.len();
        self.rows.extend(rows.into_iter().map(Row::from));
        Ok(count)
    }
}
