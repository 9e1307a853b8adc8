/// Cursor Module
///
/// rusqlite's `Rows` borrows the statement that produced it, so a query
/// context cannot hold both. `Cursor` is the owned, forward-only handle a
/// context keeps instead: the statement's rows are fetched once when the
/// query runs and handed out one at a time.

use crate::core::{QueryError, Result};
use rusqlite::types::{FromSql, Value, ValueRef};
use rusqlite::{Params, Statement};
use std::vec;

/// Forward-only row cursor produced by `QueryContext::query_prepared`
#[derive(Debug)]
pub struct Cursor {
    columns: Vec<String>,
    rows: vec::IntoIter<Vec<Value>>,
    current: Option<Vec<Value>>,
}

impl Cursor {
    /// Runs `stmt` with `params` and buffers every row it returns
    pub(crate) fn fetch<P: Params>(stmt: &mut Statement<'_>, params: P) -> rusqlite::Result<Self> {
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let column_count = stmt.column_count();

        let mut rows = stmt.query(params)?;
        let mut buffered = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(Value::from(row.get_ref(i)?));
            }
            buffered.push(values);
        }

        Ok(Cursor {
            columns,
            rows: buffered.into_iter(),
            current: None,
        })
    }

    /// Moves to the next row; false once the rows are exhausted
    pub fn advance(&mut self) -> bool {
        self.current = self.rows.next();
        self.current.is_some()
    }

    /// The row the last successful `advance` moved to
    pub fn current(&self) -> Option<&[Value]> {
        self.current.as_deref()
    }

    /// Column names of the result set
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows not yet advanced to
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

/// Decodes one buffered row into Rust values.
///
/// Implemented for tuples of `FromSql` types (arity 1 to 8, the row must
/// have exactly that many columns) and for `Vec<Value>`, which takes the row
/// as is.
pub trait FromRow: Sized {
    fn from_row(row: &[Value]) -> Result<Self>;
}

impl FromRow for Vec<Value> {
    fn from_row(row: &[Value]) -> Result<Self> {
        Ok(row.to_vec())
    }
}

fn expect_columns(row: &[Value], count: usize) -> Result<()> {
    if row.len() == count {
        Ok(())
    } else {
        Err(QueryError::Scan {
            column: row.len(),
            message: format!("expected {} columns, row has {}", count, row.len()),
        })
    }
}

fn column<T: FromSql>(row: &[Value], idx: usize) -> Result<T> {
    T::column_result(ValueRef::from(&row[idx])).map_err(|e| QueryError::Scan {
        column: idx,
        message: e.to_string(),
    })
}

macro_rules! tuple_from_row {
    ($count:expr; $($name:ident $idx:tt),+) => {
        impl<$($name: FromSql),+> FromRow for ($($name,)+) {
            fn from_row(row: &[Value]) -> Result<Self> {
                expect_columns(row, $count)?;
                Ok(($(column::<$name>(row, $idx)?,)+))
            }
        }
    };
}

tuple_from_row!(1; A 0);
tuple_from_row!(2; A 0, B 1);
tuple_from_row!(3; A 0, B 1, C 2);
tuple_from_row!(4; A 0, B 1, C 2, D 3);
tuple_from_row!(5; A 0, B 1, C 2, D 3, E 4);
tuple_from_row!(6; A 0, B 1, C 2, D 3, E 4, F 5);
tuple_from_row!(7; A 0, B 1, C 2, D 3, E 4, F 5, G 6);
tuple_from_row!(8; A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);
