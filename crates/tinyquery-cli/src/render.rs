use comfy_table::Table as ComfyTable;
use tinyquery::Context;
use tinyquery_types::{ScalarValue, Value};

/// Renders a query result as a plain-text table, one row of output per
/// result row, columns in their select-list order.
pub(crate) fn render_context(ctx: &Context) -> String {
    let mut table = ComfyTable::new();
    table.set_header(ctx.columns.keys().map(|(_, name)| name.clone()));

    for row in 0..ctx.num_rows {
        let cells = ctx.columns.values().map(|column| stringify(&column.values[row]));
        table.add_row(cells);
    }

    table.to_string()
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Scalar(None) => "NULL".to_string(),
        Value::Scalar(Some(v)) => stringify_scalar(v),
        Value::Repeated(items) => {
            let rendered: Vec<String> = items
                .iter()
                .map(|v| v.as_ref().map_or_else(|| "NULL".to_string(), stringify_scalar))
                .collect();
            format!("[{}]", rendered.join(", "))
        }
    }
}

fn stringify_scalar(value: &ScalarValue) -> String {
    match value {
        ScalarValue::Int(i) => i.to_string(),
        ScalarValue::Float(f) => f.to_string(),
        ScalarValue::Bool(b) => b.to_string(),
        ScalarValue::String(s) => s.clone(),
        ScalarValue::Timestamp(t) => t.to_rfc3339(),
    }
}
