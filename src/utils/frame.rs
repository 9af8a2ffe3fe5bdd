//! Conversions between polars frames and ndarray matrices

use crate::error::{Result, ScoringError};
use ndarray::Array2;
use polars::prelude::*;

fn is_numeric(dtype: &DataType) -> bool {
    dtype.is_float() || dtype.is_integer() || dtype.is_bool() || matches!(dtype, DataType::Null)
}

/// Numeric view of `columns` of `df`, one matrix column per name.
///
/// Nulls become `NaN`. Non-numeric columns are a schema mismatch.
pub fn to_feature_matrix(df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
    to_input_matrix(df, columns, columns)
}

/// Matrix over `columns` where only the `required` ones must be numeric.
///
/// Other non-numeric columns are filled with a constant `0.0`. A column
/// nothing reads keeps the matrix aligned with the frame and, being constant
/// across every coalition, receives an attribution of exactly zero.
pub fn to_input_matrix(
    df: &DataFrame,
    columns: &[String],
    required: &[String],
) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let mut matrix = Array2::<f64>::zeros((n_rows, columns.len()));

    for (j, name) in columns.iter().enumerate() {
        let column = df.column(name).map_err(|_| {
            ScoringError::SchemaMismatch(format!("column '{}' not found", name))
        })?;
        let series = column.as_materialized_series();
        if !is_numeric(series.dtype()) {
            if required.contains(name) {
                return Err(ScoringError::SchemaMismatch(format!(
                    "column '{}' has non-numeric type {:?}",
                    name,
                    series.dtype()
                )));
            }
            continue;
        }

        let values = series.cast(&DataType::Float64)?;
        let values = values.f64()?;
        for (i, value) in values.into_iter().enumerate() {
            matrix[[i, j]] = value.unwrap_or(f64::NAN);
        }
    }

    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_to_feature_matrix_with_nulls() {
        let df = df!(
            "a" => &[Some(1i64), None, Some(3)],
            "b" => &[0.5, 1.5, 2.5]
        )
        .unwrap();

        let m = to_feature_matrix(&df, &names(&["a", "b"])).unwrap();
        assert_eq!(m.dim(), (3, 2));
        assert_eq!(m[[0, 0]], 1.0);
        assert!(m[[1, 0]].is_nan());
        assert_eq!(m[[2, 1]], 2.5);
    }

    #[test]
    fn test_column_subset_follows_requested_order() {
        let df = df!("a" => &[1.0, 2.0], "b" => &[3.0, 4.0]).unwrap();
        let m = to_feature_matrix(&df, &names(&["b", "a"])).unwrap();
        assert_eq!(m[[0, 0]], 3.0);
        assert_eq!(m[[1, 1]], 2.0);
    }

    #[test]
    fn test_non_numeric_column_rejected() {
        let df = df!("a" => &["x", "y"]).unwrap();
        let err = to_feature_matrix(&df, &names(&["a"])).unwrap_err();
        assert!(matches!(err, ScoringError::SchemaMismatch(_)));
    }

    #[test]
    fn test_unread_text_column_becomes_constant() {
        let df = df!("id" => &["r1", "r2"], "x" => &[1.5, 2.5]).unwrap();
        let m = to_input_matrix(&df, &names(&["id", "x"]), &names(&["x"])).unwrap();
        assert_eq!(m.dim(), (2, 2));
        assert_eq!(m[[0, 0]], 0.0);
        assert_eq!(m[[1, 0]], 0.0);
        assert_eq!(m[[1, 1]], 2.5);

        let err = to_input_matrix(&df, &names(&["id", "x"]), &names(&["id"])).unwrap_err();
        assert!(matches!(err, ScoringError::SchemaMismatch(_)));
    }

    #[test]
    fn test_missing_column_rejected() {
        let df = df!("a" => &[1.0]).unwrap();
        let err = to_feature_matrix(&df, &names(&["z"])).unwrap_err();
        assert!(matches!(err, ScoringError::SchemaMismatch(_)));
    }
}
