// src/extract/html.rs

use anyhow::{bail, Result};
use scraper::{node::Node, ElementRef, Html, Selector};
use tracing::{debug, trace};

use super::TableFilter;
use crate::error::{EtlError, EtlResult};
use crate::table::Table;

/// Parse `html` and convert the first `<table>` matching `filter`.
///
/// The header is the first row made only of `<th>` cells; later all-`<th>`
/// rows are treated as extra header rows and skipped. Without any header
/// row the columns are named `0`, `1`, ...
pub fn parse_table(html: &str, filter: &TableFilter, locator: &str) -> EtlResult<Table> {
    let css = filter.to_css();
    let selector = Selector::parse(&css).map_err(|e| EtlError::ParseFailure {
        locator: locator.to_string(),
        reason: format!("invalid table filter {}: {:?}", css, e),
    })?;

    let doc = Html::parse_document(html);
    let table = doc
        .select(&selector)
        .find(|el| el.value().name() == "table")
        .ok_or_else(|| EtlError::NoMatchingTable {
            locator: locator.to_string(),
            filter: css.clone(),
        })?;

    let (headers, rows) = table_records(table).map_err(|e| EtlError::ParseFailure {
        locator: locator.to_string(),
        reason: format!("{:#}", e),
    })?;
    debug!(columns = headers.len(), rows = rows.len(), "parsed table");

    Table::from_records(headers, rows).map_err(|e| EtlError::ParseFailure {
        locator: locator.to_string(),
        reason: format!("{:#}", e),
    })
}

/// Browsers stop honouring spans past these sizes.
const MAX_COLSPAN: usize = 1_000;
const MAX_ROWSPAN: usize = 65_534;

#[derive(Clone)]
struct Cell {
    header: bool,
    text: String,
}

/// A cell whose `rowspan` still covers rows below the current one.
struct Carry {
    col: usize,
    rows_left: usize,
    cell: Cell,
}

fn table_records(table: ElementRef<'_>) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let tr = Selector::parse("tr").expect("selector should parse");

    // rows of nested tables belong to those tables
    let own_rows = table.select(&tr).filter(|row| belongs_to(*row, table));
    let rows: Vec<Vec<Cell>> = expand_spans(own_rows)
        .into_iter()
        .filter(|cells| !cells.is_empty())
        .collect();

    if rows.is_empty() {
        bail!("table has no rows");
    }

    let is_header = |cells: &Vec<Cell>| cells.iter().all(|c| c.header);

    match rows.iter().position(is_header) {
        Some(idx) => {
            let headers = rows[idx].iter().map(|c| c.text.clone()).collect();
            let body = rows[idx + 1..]
                .iter()
                .filter(|cells| !is_header(*cells))
                .map(|cells| cells.iter().map(|c| c.text.clone()).collect())
                .collect();
            Ok((headers, body))
        }
        None => {
            let width = rows.iter().map(Vec::len).max().unwrap_or(0);
            let headers = (0..width).map(|i| i.to_string()).collect();
            let body = rows
                .iter()
                .map(|cells| cells.iter().map(|c| c.text.clone()).collect())
                .collect();
            Ok((headers, body))
        }
    }
}

fn belongs_to(row: ElementRef<'_>, table: ElementRef<'_>) -> bool {
    row.ancestors()
        .find(|n| n.value().as_element().map_or(false, |e| e.name() == "table"))
        .map(|n| n.id())
        == Some(table.id())
}

/// Lay rows out on a grid: a cell with `colspan`/`rowspan` is repeated into
/// every slot it covers. Rowspans running past the last row are cut off.
fn expand_spans<'a>(rows: impl Iterator<Item = ElementRef<'a>>) -> Vec<Vec<Cell>> {
    let mut grid = Vec::new();
    let mut carried: Vec<Carry> = Vec::new();

    for row in rows {
        let mut out: Vec<Cell> = Vec::new();
        let mut next: Vec<Carry> = Vec::new();
        let mut pending = carried.into_iter().peekable();

        for (cell, colspan, rowspan) in row_cells(row) {
            while let Some(carry) = pending.next_if(|c| c.col <= out.len()) {
                place_carry(carry, &mut out, &mut next);
            }
            for _ in 0..colspan {
                if rowspan > 1 {
                    next.push(Carry {
                        col: out.len(),
                        rows_left: rowspan - 1,
                        cell: cell.clone(),
                    });
                }
                out.push(cell.clone());
            }
        }
        for carry in pending {
            place_carry(carry, &mut out, &mut next);
        }

        grid.push(out);
        carried = next;
    }
    grid
}

fn place_carry(carry: Carry, out: &mut Vec<Cell>, next: &mut Vec<Carry>) {
    out.push(carry.cell.clone());
    if carry.rows_left > 1 {
        next.push(Carry {
            rows_left: carry.rows_left - 1,
            ..carry
        });
    }
}

/// `th`/`td` children of a row with their column and row spans.
fn row_cells(row: ElementRef<'_>) -> Vec<(Cell, usize, usize)> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter_map(|el| {
            let header = match el.value().name() {
                "th" => true,
                "td" => false,
                _ => return None,
            };
            let cell = Cell {
                header,
                text: cell_text(el),
            };
            Some((
                cell,
                span(el, "colspan", MAX_COLSPAN),
                span(el, "rowspan", MAX_ROWSPAN),
            ))
        })
        .collect()
}

/// Span attribute value; missing, zero or unparsable counts as 1.
fn span(el: ElementRef<'_>, attr: &str, max: usize) -> usize {
    el.value()
        .attr(attr)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .map_or(1, |n| n.min(max))
}

/// Concatenated text of a cell; `<br>` counts as a space.
fn cell_text(cell: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in cell.descendants() {
        match node.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.name() == "br" => out.push(' '),
            _ => {}
        }
    }
    trace!(cell = %out, "cell text");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::table::ColumnData;

    fn wikitable() -> TableFilter {
        TableFilter::class("wikitable")
    }

    #[test]
    fn header_from_thead_and_body_rows() -> Result<()> {
        let html = r#"<table class="wikitable">
            <thead><tr><th>Rank</th><th>Bank <a href="/x">name</a></th></tr></thead>
            <tbody>
              <tr><td>1</td><td>Industrial and
                  Commercial Bank of China</td></tr>
              <tr><td>2</td><td>Agricultural Bank of China</td></tr>
            </tbody></table>"#;

        let table = parse_table(html, &wikitable(), "test")?;
        assert_eq!(table.column_names(), vec!["Rank", "Bank name"]);
        assert_eq!(
            table.column("Bank name").unwrap().data,
            ColumnData::Text(vec![
                Some("Industrial and Commercial Bank of China".into()),
                Some("Agricultural Bank of China".into()),
            ])
        );
        Ok(())
    }

    #[test]
    fn first_matching_table_wins() -> Result<()> {
        let html = r#"
            <table class="wikitable"><tr><th>first</th></tr><tr><td>a</td></tr></table>
            <table class="wikitable"><tr><th>second</th></tr><tr><td>b</td></tr></table>"#;
        let table = parse_table(html, &wikitable(), "test")?;
        assert_eq!(table.column_names(), vec!["first"]);
        Ok(())
    }

    #[test]
    fn nested_table_rows_are_ignored() -> Result<()> {
        let html = r#"<table class="wikitable">
            <tr><th>A</th><th>B</th></tr>
            <tr><td>1</td><td><table><tr><td>inner</td></tr></table></td></tr>
            </table>"#;
        let table = parse_table(html, &wikitable(), "test")?;
        assert_eq!(table.num_rows(), 1);
        assert_eq!(table.column("A").unwrap().data, ColumnData::Int(vec![Some(1)]));
        Ok(())
    }

    #[test]
    fn headerless_table_gets_positional_names() -> Result<()> {
        let html = r#"<table class="wikitable"><tr><td>x</td><td>1,000</td></tr></table>"#;
        let table = parse_table(html, &wikitable(), "test")?;
        assert_eq!(table.column_names(), vec!["0", "1"]);
        assert_eq!(table.column("1").unwrap().data, ColumnData::Int(vec![Some(1000)]));
        Ok(())
    }

    #[test]
    fn second_header_row_is_skipped() -> Result<()> {
        let html = r#"<table class="wikitable">
            <tr><th>Name</th><th>Value</th></tr>
            <tr><th>(text)</th><th>(US$)</th></tr>
            <tr><td>a</td><td>1.5</td></tr></table>"#;
        let table = parse_table(html, &wikitable(), "test")?;
        assert_eq!(table.num_rows(), 1);
        Ok(())
    }

    #[test]
    fn css_filter_only_accepts_tables() -> Result<()> {
        let html = r#"<div id="t"><p>no</p></div>
            <table id="t"><tr><th>ok</th></tr><tr><td>1</td></tr></table>"#;
        let table = parse_table(html, &TableFilter::Css("#t".into()), "test")?;
        assert_eq!(table.column_names(), vec!["ok"]);
        Ok(())
    }

    #[test]
    fn colspan_header_is_repeated_per_column() -> Result<()> {
        let html = r#"<table class="wikitable">
            <tr><th>Rank</th><th colspan="2">Bank</th><th>Cap</th></tr>
            <tr><td>1</td><td>US</td><td>JPMorgan Chase</td><td>432.92</td></tr>
            <tr><td colspan="2">2</td><td>Bank of America</td><td>231.52</td></tr>
            </table>"#;
        let table = parse_table(html, &wikitable(), "test")?;
        assert_eq!(table.column_names(), vec!["Rank", "Bank", "Bank.1", "Cap"]);
        assert_eq!(
            table.column("Bank").unwrap().data,
            ColumnData::Text(vec![Some("US".into()), Some("2".into())])
        );
        assert_eq!(
            table.column("Cap").unwrap().data,
            ColumnData::Float(vec![Some(432.92), Some(231.52)])
        );
        Ok(())
    }

    #[test]
    fn rowspan_fills_following_rows() -> Result<()> {
        let html = r#"<table class="wikitable">
            <tr><th>Rank</th><th>Bank</th><th>Cap</th></tr>
            <tr><td rowspan="2">1</td><td>A</td><td>10</td></tr>
            <tr><td>B</td><td>20</td></tr>
            <tr><td>3</td><td rowspan="2">C</td><td>30</td></tr>
            <tr><td>4</td><td>40</td></tr>
            </table>"#;
        let table = parse_table(html, &wikitable(), "test")?;
        assert_eq!(
            table.column("Rank").unwrap().data,
            ColumnData::Int(vec![Some(1), Some(1), Some(3), Some(4)])
        );
        assert_eq!(
            table.column("Bank").unwrap().data,
            ColumnData::Text(vec![
                Some("A".into()),
                Some("B".into()),
                Some("C".into()),
                Some("C".into()),
            ])
        );
        assert_eq!(
            table.column("Cap").unwrap().data,
            ColumnData::Int(vec![Some(10), Some(20), Some(30), Some(40)])
        );
        Ok(())
    }

    #[test]
    fn rowspan_past_the_last_row_is_cut_off() -> Result<()> {
        let html = r#"<table class="wikitable">
            <tr><th>a</th><th>b</th></tr>
            <tr><td>1</td><td rowspan="5" colspan="0">x</td></tr>
            </table>"#;
        let table = parse_table(html, &wikitable(), "test")?;
        assert_eq!(table.num_rows(), 1);
        assert_eq!(table.column("b").unwrap().data, ColumnData::Text(vec![Some("x".into())]));
        Ok(())
    }

    #[test]
    fn failure_kinds() {
        let no_table = parse_table("<p>hi</p>", &wikitable(), "test").unwrap_err();
        assert_eq!(no_table.kind(), ErrorKind::NoMatchingTable);

        let no_rows = parse_table(r#"<table class="wikitable"></table>"#, &wikitable(), "test")
            .unwrap_err();
        assert_eq!(no_rows.kind(), ErrorKind::ParseFailure);

        let bad_css = parse_table("<table></table>", &TableFilter::Css("[[".into()), "test")
            .unwrap_err();
        assert_eq!(bad_css.kind(), ErrorKind::ParseFailure);

        let ragged = parse_table(
            r#"<table class="wikitable"><tr><th>a</th></tr><tr><td>1</td><td>2</td></tr></table>"#,
            &wikitable(),
            "test",
        )
        .unwrap_err();
        assert_eq!(ragged.kind(), ErrorKind::ParseFailure);
    }
}
