use crate::error::{AppError, Result};
use crate::types::{Column, RawRow, Value, RAW_COLUMNS};

/// Column-keyed table of cell values, in row display order.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl Frame {
    pub fn from_raw(rows: Vec<RawRow>) -> Self {
        let rows = rows
            .into_iter()
            .map(|r| r.into_cells().into_iter().map(Value::Text).collect())
            .collect();
        Self {
            columns: RAW_COLUMNS.to_vec(),
            rows,
        }
    }

    #[cfg(test)]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    fn position(&self, column: Column) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| *c == column)
            .ok_or(AppError::MissingColumn(column))
    }

    pub fn value(&self, row: usize, column: Column) -> Result<&Value> {
        let idx = self.position(column)?;
        Ok(&self.rows[row][idx])
    }

    /// Removes the named columns; absent ones are ignored.
    pub fn drop_columns(&mut self, columns: &[Column]) {
        let keep: Vec<bool> = self.columns.iter().map(|c| !columns.contains(c)).collect();
        self.columns.retain(|c| !columns.contains(c));
        for row in &mut self.rows {
            let mut flags = keep.iter();
            row.retain(|_| *flags.next().unwrap_or(&true));
        }
    }

    /// Replaces every cell of `column` with `f(cell)`. Stops at the first error.
    pub fn try_map_column(
        &mut self,
        column: Column,
        f: impl Fn(&Value) -> Result<Value>,
    ) -> Result<()> {
        let idx = self.position(column)?;
        for row in &mut self.rows {
            row[idx] = f(&row[idx])?;
        }
        Ok(())
    }

    /// Appends a column, or overwrites it if already present.
    pub fn set_column(&mut self, column: Column, values: Vec<Value>) {
        debug_assert_eq!(values.len(), self.rows.len());
        match self.position(column) {
            Ok(idx) => {
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row[idx] = v;
                }
            }
            Err(_) => {
                self.columns.push(column);
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row.push(v);
                }
            }
        }
    }

    /// Numeric view of a column. Any non-number cell is an error.
    pub fn numbers(&self, column: Column) -> Result<Vec<f64>> {
        let idx = self.position(column)?;
        self.rows
            .iter()
            .map(|row| match &row[idx] {
                Value::Number(n) => Ok(*n),
                _ => Err(AppError::NotNumeric(column)),
            })
            .collect()
    }

    /// Narrows the frame to `columns`, in that order.
    pub fn select(&self, columns: &[Column]) -> Result<Frame> {
        let indices = columns
            .iter()
            .map(|c| self.position(*c))
            .collect::<Result<Vec<_>>>()?;
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Ok(Frame {
            columns: columns.to_vec(),
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CELL_COUNT;
    use crate::types::OUTPUT_COLUMNS;

    fn frame(n: usize) -> Frame {
        let rows = (0..n)
            .map(|r| {
                RawRow::from_cells((0..CELL_COUNT).map(|c| format!("r{r}c{c}")).collect()).unwrap()
            })
            .collect();
        Frame::from_raw(rows)
    }

    #[test]
    fn raw_frame_uses_display_columns() {
        let f = frame(2);
        assert_eq!(f.columns(), &RAW_COLUMNS);
        assert_eq!(f.value(1, Column::CurrentPrice).unwrap(), &Value::from("r1c4"));
    }

    #[test]
    fn drop_columns_keeps_cells_aligned() {
        let mut f = frame(2);
        f.drop_columns(&[Column::Extra, Column::LastPrice]);
        assert_eq!(f.columns().len(), CELL_COUNT - 2);
        assert!(!f.columns().contains(&Column::LastPrice));
        assert_eq!(f.value(0, Column::NameSymbol).unwrap(), &Value::from("r0c3"));
        assert_eq!(f.value(0, Column::VolumeChange).unwrap(), &Value::from("r0c9"));
    }

    #[test]
    fn select_missing_column_fails() {
        let f = frame(1);
        let err = f.select(&OUTPUT_COLUMNS).unwrap_err();
        assert!(matches!(err, AppError::MissingColumn(Column::PercentageChange)), "got {err:?}");
    }

    #[test]
    fn select_is_idempotent() {
        let f = frame(3);
        let cols = [Column::Symbol, Column::Name, Column::MarketCap];
        let once = f.select(&cols).unwrap();
        let twice = once.select(&cols).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.columns(), &cols);
        assert_eq!(once.value(2, Column::Name).unwrap(), &Value::from("r2c0"));
    }

    #[test]
    fn set_column_appends_then_overwrites() {
        let mut f = frame(2);
        f.set_column(Column::RollingAvg, vec![Value::Null, Value::Number(1.0)]);
        assert_eq!(f.columns().last(), Some(&Column::RollingAvg));
        f.set_column(Column::RollingAvg, vec![Value::Number(2.0), Value::Null]);
        assert_eq!(f.value(0, Column::RollingAvg).unwrap(), &Value::Number(2.0));
        assert_eq!(f.columns().len(), CELL_COUNT + 1);
    }

    #[test]
    fn numbers_rejects_text_cells() {
        let f = frame(1);
        assert!(f.numbers(Column::CurrentPrice).is_err());
    }
}
