use serde_json::{Map, Value};
use std::io;

/// Write output as CSV to stdout.
///
/// A model section (`result` is an array of rows) becomes one CSV row per
/// element; any other result becomes `field,value` pairs.
pub fn print_csv(value: &Value) {
    let mut wtr = csv::Writer::from_writer(io::stdout().lock());
    if let Err(e) = write_value(&mut wtr, value) {
        eprintln!("CSV write error: {}", e);
    }
}

fn write_value<W: io::Write>(wtr: &mut csv::Writer<W>, value: &Value) -> csv::Result<()> {
    match value.get("result") {
        Some(Value::Array(rows)) => write_rows(wtr, rows)?,
        Some(Value::Object(result)) => write_fields(wtr, result)?,
        _ => match value {
            Value::Object(map) => write_fields(wtr, map)?,
            other => wtr.write_record([format_csv_value(other)])?,
        },
    }
    wtr.flush()?;
    Ok(())
}

fn write_fields<W: io::Write>(
    wtr: &mut csv::Writer<W>,
    map: &Map<String, Value>,
) -> csv::Result<()> {
    wtr.write_record(["field", "value"])?;
    for (key, val) in map {
        wtr.write_record([key.as_str(), &format_csv_value(val)])?;
    }
    Ok(())
}

fn write_rows<W: io::Write>(wtr: &mut csv::Writer<W>, rows: &[Value]) -> csv::Result<()> {
    let Some(Value::Object(first)) = rows.first() else {
        for row in rows {
            wtr.write_record([format_csv_value(row)])?;
        }
        return Ok(());
    };

    let headers: Vec<&str> = first.keys().map(String::as_str).collect();
    wtr.write_record(&headers)?;
    for row in rows {
        let record: Vec<String> = headers
            .iter()
            .map(|h| row.get(*h).map(format_csv_value).unwrap_or_default())
            .collect();
        wtr.write_record(&record)?;
    }
    Ok(())
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(value: &Value) -> String {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        write_value(&mut wtr, value).unwrap();
        String::from_utf8(wtr.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_section_rows_become_csv_rows() {
        let out = render(&json!({
            "result": [
                {"asset_id": 1, "date": "2026-01-01", "dscr": null},
                {"asset_id": 2, "date": "2026-01-01", "dscr": "1.42"}
            ],
            "warnings": []
        }));
        assert_eq!(out, "asset_id,date,dscr\n1,2026-01-01,\n2,2026-01-01,1.42\n");
    }

    #[test]
    fn test_scalar_results_become_field_value_pairs() {
        let out = render(&json!({"result": {"flow_count": 2, "xirr": "0.1"}}));
        assert_eq!(out, "field,value\nflow_count,2\nxirr,0.1\n");

        let out = render(&json!({"blended_target": "1.4125"}));
        assert_eq!(out, "field,value\nblended_target,1.4125\n");
    }
}
