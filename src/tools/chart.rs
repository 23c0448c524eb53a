//! Chart selection for query results, emitted as Plotly figure JSON.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Value, json};

use crate::db::QueryResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Temporal,
    Categorical,
    /// Every value is null.
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartType {
    Bar,
    Line,
    Scatter,
    Histogram,
    Table,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Scatter => "scatter",
            ChartType::Histogram => "histogram",
            ChartType::Table => "table",
        }
    }
}

pub fn classify_column<'a>(values: impl Iterator<Item = &'a Value>) -> ColumnKind {
    let mut kind = ColumnKind::Empty;
    for value in values {
        let this = match value {
            Value::Null => continue,
            Value::Number(_) => ColumnKind::Numeric,
            Value::String(s) if is_temporal(s) => ColumnKind::Temporal,
            _ => return ColumnKind::Categorical,
        };
        if kind == ColumnKind::Empty {
            kind = this;
        } else if kind != this {
            return ColumnKind::Categorical;
        }
    }
    kind
}

fn is_temporal(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").is_ok()
        || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

/// Chart type plus the column indices it plots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartPlan {
    pub chart_type: ChartType,
    pub x: Option<usize>,
    pub y: Vec<usize>,
}

/// Pick a chart from column kinds:
/// - temporal + numeric: line over time
/// - categorical + numeric: bar per category
/// - one numeric column: histogram
/// - several numeric columns: scatter of the first two
/// - anything else: table
pub fn plan_chart(result: &QueryResult) -> ChartPlan {
    let table = ChartPlan {
        chart_type: ChartType::Table,
        x: None,
        y: Vec::new(),
    };
    if result.rows.is_empty() || result.columns.is_empty() {
        return table;
    }

    let kinds: Vec<ColumnKind> = (0..result.columns.len())
        .map(|idx| classify_column(result.column(idx)))
        .collect();
    let of_kind = |wanted: ColumnKind| -> Vec<usize> {
        kinds
            .iter()
            .enumerate()
            .filter(|(_, k)| **k == wanted)
            .map(|(i, _)| i)
            .collect()
    };
    let numeric = of_kind(ColumnKind::Numeric);
    let temporal = of_kind(ColumnKind::Temporal);
    let categorical = of_kind(ColumnKind::Categorical);

    if numeric.is_empty() {
        return table;
    }
    if let Some(&x) = temporal.first() {
        return ChartPlan {
            chart_type: ChartType::Line,
            x: Some(x),
            y: numeric,
        };
    }
    if let Some(&x) = categorical.first() {
        return ChartPlan {
            chart_type: ChartType::Bar,
            x: Some(x),
            y: numeric,
        };
    }
    match numeric.as_slice() {
        [only] => ChartPlan {
            chart_type: ChartType::Histogram,
            x: Some(*only),
            y: Vec::new(),
        },
        [x, y, ..] => ChartPlan {
            chart_type: ChartType::Scatter,
            x: Some(*x),
            y: vec![*y],
        },
        [] => table,
    }
}

/// Build the Plotly figure (`{data, layout}`) for `plan`.
pub fn build_figure(result: &QueryResult, plan: &ChartPlan, title: &str) -> Value {
    let column = |idx: usize| -> Vec<Value> { result.column(idx).cloned().collect() };
    let name = |idx: usize| result.columns[idx].clone();

    let data: Vec<Value> = match (plan.chart_type, plan.x) {
        (ChartType::Bar, Some(x)) => plan
            .y
            .iter()
            .map(|&y| json!({"type": "bar", "name": name(y), "x": column(x), "y": column(y)}))
            .collect(),
        (ChartType::Line, Some(x)) => plan
            .y
            .iter()
            .map(|&y| {
                json!({
                    "type": "scatter",
                    "mode": "lines+markers",
                    "name": name(y),
                    "x": column(x),
                    "y": column(y)
                })
            })
            .collect(),
        (ChartType::Scatter, Some(x)) => plan
            .y
            .iter()
            .map(|&y| {
                json!({
                    "type": "scatter",
                    "mode": "markers",
                    "name": name(y),
                    "x": column(x),
                    "y": column(y)
                })
            })
            .collect(),
        (ChartType::Histogram, Some(x)) => {
            vec![json!({"type": "histogram", "name": name(x), "x": column(x)})]
        }
        _ => {
            let cells: Vec<Vec<Value>> = (0..result.columns.len()).map(column).collect();
            vec![json!({
                "type": "table",
                "header": {"values": result.columns},
                "cells": {"values": cells}
            })]
        }
    };

    let mut layout = json!({ "title": { "text": title } });
    if let Some(x) = plan.x
        && plan.chart_type != ChartType::Table
    {
        layout["xaxis"] = json!({ "title": { "text": name(x) } });
        let y_title = match plan.y.as_slice() {
            [single] => name(*single),
            [] => "count".to_string(),
            _ => "value".to_string(),
        };
        layout["yaxis"] = json!({ "title": { "text": y_title } });
    }
    if plan.chart_type == ChartType::Bar && plan.y.len() > 1 {
        layout["barmode"] = json!("group");
    }

    json!({ "data": data, "layout": layout })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(columns: &[&str], rows: Vec<Vec<Value>>) -> QueryResult {
        QueryResult::new(columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    #[test]
    fn classifies_columns() {
        let vals = [json!(1), Value::Null, json!(2.5)];
        assert_eq!(classify_column(vals.iter()), ColumnKind::Numeric);
        let vals = [json!("2024-01-31"), json!("2024-02-01T10:00:00")];
        assert_eq!(classify_column(vals.iter()), ColumnKind::Temporal);
        let vals = [json!("Acme"), json!("2024-01-31")];
        assert_eq!(classify_column(vals.iter()), ColumnKind::Categorical);
        let vals = [json!(1), json!("x")];
        assert_eq!(classify_column(vals.iter()), ColumnKind::Categorical);
        let vals = [Value::Null];
        assert_eq!(classify_column(vals.iter()), ColumnKind::Empty);
    }

    #[test]
    fn category_and_amount_make_a_bar_chart() {
        let r = result(
            &["vendor", "spend"],
            vec![vec![json!("Acme"), json!(10)], vec![json!("Globex"), json!(5)]],
        );
        let plan = plan_chart(&r);
        assert_eq!(plan.chart_type, ChartType::Bar);
        assert_eq!((plan.x, plan.y.clone()), (Some(0), vec![1]));

        let fig = build_figure(&r, &plan, "Spend by vendor");
        assert_eq!(fig["data"][0]["type"], "bar");
        assert_eq!(fig["data"][0]["x"], json!(["Acme", "Globex"]));
        assert_eq!(fig["layout"]["title"]["text"], "Spend by vendor");
        assert_eq!(fig["layout"]["yaxis"]["title"]["text"], "spend");
    }

    #[test]
    fn dates_and_amounts_make_a_line_chart() {
        let r = result(
            &["month", "total", "count"],
            vec![
                vec![json!("2024-01-01"), json!(100.0), json!(3)],
                vec![json!("2024-02-01"), json!(80.0), json!(2)],
            ],
        );
        let plan = plan_chart(&r);
        assert_eq!(plan.chart_type, ChartType::Line);
        assert_eq!(plan.y, vec![1, 2]);
        let fig = build_figure(&r, &plan, "Trend");
        assert_eq!(fig["data"].as_array().unwrap().len(), 2);
        assert_eq!(fig["data"][0]["mode"], "lines+markers");
    }

    #[test]
    fn numeric_only_results() {
        let single = result(&["total"], vec![vec![json!(1)], vec![json!(2)]]);
        assert_eq!(plan_chart(&single).chart_type, ChartType::Histogram);

        let pair = result(&["qty", "price"], vec![vec![json!(1), json!(2.0)]]);
        let plan = plan_chart(&pair);
        assert_eq!(plan.chart_type, ChartType::Scatter);
        assert_eq!((plan.x, plan.y), (Some(0), vec![1]));
    }

    #[test]
    fn text_only_or_empty_results_fall_back_to_table() {
        let text = result(&["name"], vec![vec![json!("Acme")]]);
        let plan = plan_chart(&text);
        assert_eq!(plan.chart_type, ChartType::Table);
        let fig = build_figure(&text, &plan, "Vendors");
        assert_eq!(fig["data"][0]["type"], "table");
        assert_eq!(fig["data"][0]["cells"]["values"], json!([["Acme"]]));
        assert!(fig["layout"].get("xaxis").is_none());

        let empty = result(&["n"], Vec::new());
        assert_eq!(plan_chart(&empty).chart_type, ChartType::Table);
    }
}
