//! Row sources: serializable values and polars DataFrames.

use std::io::Cursor;

use polars::prelude::{AnyValue, DataFrame, IpcReader, SerReader};
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::spec::ExcelExportError;

/// Convert serializable records into row objects.
pub fn rows_from_serializable<T: Serialize>(records: &[T]) -> Result<Vec<Value>, ExcelExportError> {
    records
        .iter()
        .map(|record| serde_json::to_value(record).map_err(ExcelExportError::from))
        .collect()
}

/// Convert every DataFrame row into an object keyed by column name.
pub fn rows_from_dataframe(df: &DataFrame) -> Result<Vec<Value>, ExcelExportError> {
    let l_colnames: Vec<String> = df
        .get_column_names_str()
        .into_iter()
        .map(ToString::to_string)
        .collect();
    let l_cols = df.get_columns();

    let mut l_rows = Vec::with_capacity(df.height());
    for n_idx_row in 0..df.height() {
        let mut dict_row = Map::with_capacity(l_colnames.len());
        for (c_name, col) in l_colnames.iter().zip(l_cols) {
            dict_row.insert(c_name.clone(), derive_json_from_any_value(col.get(n_idx_row)?));
        }
        l_rows.push(Value::Object(dict_row));
    }
    Ok(l_rows)
}

/// Decode a polars IPC payload and convert its rows.
pub fn rows_from_ipc_bytes(v_ipc_df: &[u8]) -> Result<Vec<Value>, ExcelExportError> {
    let df = IpcReader::new(Cursor::new(v_ipc_df)).finish()?;
    rows_from_dataframe(&df)
}

fn derive_json_from_any_value(value: AnyValue<'_>) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(val) => Value::Bool(val),
        AnyValue::String(val) => Value::String(val.to_string()),
        AnyValue::StringOwned(val) => Value::String(val.to_string()),
        AnyValue::UInt8(val) => Value::from(val),
        AnyValue::UInt16(val) => Value::from(val),
        AnyValue::UInt32(val) => Value::from(val),
        AnyValue::UInt64(val) => Value::from(val),
        AnyValue::Int8(val) => Value::from(val),
        AnyValue::Int16(val) => Value::from(val),
        AnyValue::Int32(val) => Value::from(val),
        AnyValue::Int64(val) => Value::from(val),
        AnyValue::Float32(val) => derive_json_from_f64(val as f64),
        AnyValue::Float64(val) => derive_json_from_f64(val),
        _ => Value::String(value.to_string()),
    }
}

// NaN reads as a missing value; infinities keep their sign as text.
fn derive_json_from_f64(val: f64) -> Value {
    match Number::from_f64(val) {
        Some(n) => Value::Number(n),
        None if val.is_nan() => Value::Null,
        None if val.is_sign_positive() => Value::String("Infinity".to_string()),
        None => Value::String("-Infinity".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Serialize)]
    struct User {
        name: String,
        age: u32,
        email: Option<String>,
    }

    #[test]
    fn test_rows_from_serializable_keeps_field_names() {
        let l_users = vec![User {
            name: "Ann".to_string(),
            age: 30,
            email: None,
        }];

        assert_eq!(
            rows_from_serializable(&l_users).unwrap(),
            vec![json!({"name": "Ann", "age": 30, "email": null})]
        );
    }

    #[test]
    fn test_rows_from_dataframe_maps_dtypes() {
        let df = polars::df!(
            "name" => ["Ann", "Bob"],
            "age" => [Some(30i64), None],
            "score" => [1.5f64, f64::NAN],
            "active" => [true, false]
        )
        .unwrap();

        assert_eq!(
            rows_from_dataframe(&df).unwrap(),
            vec![
                json!({"name": "Ann", "age": 30, "score": 1.5, "active": true}),
                json!({"name": "Bob", "age": null, "score": null, "active": false}),
            ]
        );
    }

    #[test]
    fn test_derive_json_from_f64_blanks_nan_and_names_infinities() {
        assert_eq!(derive_json_from_f64(f64::NAN), Value::Null);
        assert_eq!(derive_json_from_f64(f64::INFINITY), json!("Infinity"));
        assert_eq!(derive_json_from_f64(f64::NEG_INFINITY), json!("-Infinity"));
        assert_eq!(derive_json_from_f64(0.5), json!(0.5));
    }

    #[test]
    fn test_rows_from_ipc_bytes_rejects_garbage() {
        let err = rows_from_ipc_bytes(b"not an ipc payload").unwrap_err();
        assert!(matches!(err, ExcelExportError::Frame(_)));
    }
}
