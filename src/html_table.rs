//! HTML table extraction for the snapshot-driven jobs.

use scraper::{ElementRef, Html, Selector};

lazy_static::lazy_static! {
    static ref TABLE: Selector = Selector::parse("table").unwrap();
    static ref TR: Selector = Selector::parse("tr").unwrap();
    static ref CELL: Selector = Selector::parse("td, th").unwrap();
}

/// Collects a table's rows as trimmed cell text, header row included.
pub fn table_rows(table: ElementRef) -> Vec<Vec<String>> {
    table
        .select(&TR)
        .map(|row| {
            row.select(&CELL)
                .map(|cell| cell.text().collect::<String>().trim().to_string())
                .collect()
        })
        .collect()
}

/// Finds the price table in a snapshot: the first `<table>` with more
/// than `min_rows` rows and at least `min_cols` columns. Exchange pages
/// carry several small navigation tables before the data.
pub fn find_price_table(document: &Html, min_rows: usize, min_cols: usize) -> Option<Vec<Vec<String>>> {
    for table in document.select(&TABLE) {
        let rows = table_rows(table);
        if rows.len() > min_rows && rows.iter().any(|row| row.len() >= min_cols) {
            return Some(rows);
        }
    }
    None
}

/// Rows of the first table under the given CSS selector, header included.
pub fn rows_under(document: &Html, selector: &Selector) -> Option<Vec<Vec<String>>> {
    let scope = document.select(selector).next()?;
    let table = scope.select(&TABLE).next()?;
    Some(table_rows(table))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_table_heuristic_skips_small_tables() {
        let html = r#"
            <html><body>
            <table><tr><td>nav</td></tr></table>
            <table>
              <tr><th>Code</th><th>Name</th><th>Price</th><th>Volume</th></tr>
              <tr><td>A</td><td>Alpha</td><td>1.0</td><td>10</td></tr>
              <tr><td>B</td><td>Beta</td><td>2.0</td><td>20</td></tr>
              <tr><td>C</td><td>Gamma</td><td>3.0</td><td>30</td></tr>
              <tr><td>D</td><td>Delta</td><td>4.0</td><td>40</td></tr>
              <tr><td>E</td><td>Epsilon</td><td>5.0</td><td>50</td></tr>
            </table>
            </body></html>"#;
        let document = Html::parse_document(html);
        let rows = find_price_table(&document, 5, 4).unwrap();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0], vec!["Code", "Name", "Price", "Volume"]);
        assert_eq!(rows[2], vec!["B", "Beta", "2.0", "20"]);
    }

    #[test]
    fn no_qualifying_table_yields_none() {
        let document = Html::parse_document("<html><body><p>no tables</p></body></html>");
        assert!(find_price_table(&document, 5, 4).is_none());
    }

    #[test]
    fn rows_under_scopes_to_the_selector() {
        let html = r#"
            <section id="other"><table><tr><td>wrong</td></tr></table></section>
            <section id="main"><table>
              <tr><th>h</th></tr>
              <tr><td>right</td></tr>
            </table></section>"#;
        let document = Html::parse_document(html);
        let selector = Selector::parse("section#main").unwrap();
        let rows = rows_under(&document, &selector).unwrap();
        assert_eq!(rows[1], vec!["right"]);
    }
}
