//! CSV and printable HTML exports of one month of expenses.
//!
//! Both renderers are pure: the same records in the same order always give
//! byte-identical output.

use std::fmt::Write as _;

use crate::aggregate::Summary;
use crate::locale::Locale;
use crate::models::{ExpenseRecord, MonthRange};

pub const UTF8_BOM: char = '\u{FEFF}';

/// Header plus one row per record, joined by `\n`, BOM first.
pub fn render_csv(records: &[ExpenseRecord], locale: Locale) -> String {
    let labels = locale.labels();
    let mut rows = Vec::with_capacity(records.len() + 1);
    rows.push(format!(
        "{},{},{},{}",
        labels.date, labels.description, labels.category, labels.amount
    ));
    for r in records {
        rows.push(format!(
            "{},{},{},{:.2}",
            locale.format_date(r.date),
            quote(&r.description),
            r.category_name(labels.uncategorized),
            r.amount.round_dp(2),
        ));
    }

    let mut out = String::new();
    out.push(UTF8_BOM);
    out.push_str(&rows.join("\n"));
    out
}

pub fn csv_filename(range: &MonthRange) -> String {
    format!("expenses_{}_{}.csv", range.month, range.year)
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

const STYLE: &str = r#"    body { font-family: Arial, sans-serif; padding: 40px; }
    h1 { color: #3b82f6; }
    table { width: 100%; border-collapse: collapse; margin: 20px 0; }
    th, td { padding: 12px; text-align: left; border-bottom: 1px solid #ddd; }
    th { background-color: #3b82f6; color: white; }
    .summary { background-color: #f0f9ff; padding: 20px; border-radius: 8px; margin: 20px 0; }
    .total { font-size: 24px; font-weight: bold; color: #3b82f6; }
    .swatch { display: inline-block; width: 10px; height: 10px; border-radius: 50%; margin-right: 6px; }
"#;

/// Self-contained report: summary block, per-category table and the full
/// list of records.
pub fn render_html(
    summary: &Summary,
    records: &[ExpenseRecord],
    range: &MonthRange,
    locale: Locale,
) -> String {
    let labels = locale.labels();
    let currency = locale.currency();
    let month = escape_html(&locale.month_title(range.year, range.month));

    let mut html = String::new();
    // writing into a String never fails
    let _ = writeln!(html, "<!DOCTYPE html>");
    let _ = writeln!(html, "<html lang=\"{}\">", locale.html_lang());
    let _ = writeln!(html, "<head>");
    let _ = writeln!(html, "  <meta charset=\"UTF-8\">");
    let _ = writeln!(html, "  <title>{} - {month}</title>", labels.report_title);
    let _ = writeln!(html, "  <style>\n{STYLE}  </style>");
    let _ = writeln!(html, "</head>");
    let _ = writeln!(html, "<body>");
    let _ = writeln!(html, "  <h1>{}</h1>", labels.app_title);
    let _ = writeln!(html, "  <h2>{} - {month}</h2>", labels.report_title);

    let _ = writeln!(html, "  <div class=\"summary\">");
    let _ = writeln!(
        html,
        "    <p><strong>{}:</strong> {} - {}</p>",
        labels.period,
        locale.format_day(range.first_day()),
        locale.format_day(range.last_day()),
    );
    let _ = writeln!(
        html,
        "    <p><strong>{}:</strong> {}</p>",
        labels.expense_count, summary.record_count
    );
    let _ = writeln!(
        html,
        "    <p class=\"total\">{}: {currency} {:.2}</p>",
        labels.total_spent,
        summary.grand_total.round_dp(2)
    );
    let _ = writeln!(html, "  </div>");

    let _ = writeln!(html, "  <h3>{}</h3>", labels.by_category);
    let _ = writeln!(html, "  <table>");
    let _ = writeln!(
        html,
        "    <thead><tr><th>{}</th><th>{}</th><th>{}</th></tr></thead>",
        labels.category, labels.total, labels.percentage
    );
    let _ = writeln!(html, "    <tbody>");
    for agg in &summary.categories {
        let swatch = agg
            .color
            .as_deref()
            .map(|c| {
                format!(
                    "<span class=\"swatch\" style=\"background-color: {}\"></span>",
                    escape_html(c)
                )
            })
            .unwrap_or_default();
        let _ = writeln!(
            html,
            "      <tr><td>{swatch}{}</td><td>{currency} {:.2}</td><td>{:.1}%</td></tr>",
            escape_html(&agg.name),
            agg.total.round_dp(2),
            agg.percentage,
        );
    }
    let _ = writeln!(html, "    </tbody>");
    let _ = writeln!(html, "  </table>");

    let _ = writeln!(html, "  <h3>{}</h3>", labels.details);
    let _ = writeln!(html, "  <table>");
    let _ = writeln!(
        html,
        "    <thead><tr><th>{}</th><th>{}</th><th>{}</th><th>{}</th></tr></thead>",
        labels.date, labels.description, labels.category, labels.amount
    );
    let _ = writeln!(html, "    <tbody>");
    for r in records {
        let _ = writeln!(
            html,
            "      <tr><td>{}</td><td>{}</td><td>{}</td><td>{currency} {:.2}</td></tr>",
            locale.format_date(r.date),
            escape_html(&r.description),
            escape_html(r.category_name(labels.uncategorized)),
            r.amount.round_dp(2),
        );
    }
    let _ = writeln!(html, "    </tbody>");
    let _ = writeln!(html, "  </table>");
    let _ = writeln!(html, "</body>");
    let _ = write!(html, "</html>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::summarize;
    use crate::aggregate::tests::{record, seed_month};

    #[test]
    fn csv_has_bom_header_and_rows() {
        let csv = render_csv(&seed_month(), Locale::PtBr);
        assert!(csv.starts_with('\u{FEFF}'));

        let lines: Vec<&str> = csv.trim_start_matches(UTF8_BOM).split('\n').collect();
        assert_eq!(lines[0], "Data,Descrição,Categoria,Valor");
        assert_eq!(lines[1], "03/10/2025,\"expense 80.00\",Lazer,80.00");
        assert_eq!(lines.len(), 5);
        assert!(!csv.ends_with('\n'));
    }

    #[test]
    fn csv_quotes_descriptions_and_falls_back_on_category() {
        let mut r = record("12.5", None, 9);
        r.description = "pizza, \"grande\"".to_string();
        let csv = render_csv(&[r], Locale::EnUs);
        let row = csv.split('\n').nth(1).unwrap();
        assert_eq!(row, "10/09/2025,\"pizza, \"\"grande\"\"\",No category,12.50");
    }

    #[test]
    fn csv_is_deterministic() {
        let records = seed_month();
        let a = render_csv(&records, Locale::PtBr);
        let b = render_csv(&records, Locale::PtBr);
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn csv_filename_uses_month_and_year() {
        let range = MonthRange::new(2025, 10).unwrap();
        assert_eq!(csv_filename(&range), "expenses_10_2025.csv");
    }

    #[test]
    fn html_contains_summary_breakdown_and_details() {
        let records = seed_month();
        let summary = summarize(&records, Locale::PtBr).unwrap();
        let range = MonthRange::new(2025, 10).unwrap();
        let html = render_html(&summary, &records, &range, Locale::PtBr);

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Relatório de Gastos - outubro de 2025"));
        assert!(html.contains("01/10/2025 - 31/10/2025"));
        assert!(html.contains("Total gasto: R$ 1340.80"));
        assert!(html.contains("<td>R$ 1200.00</td><td>89.5%</td>"));
        assert!(html.contains("<td>expense 45.80</td><td>Alimentação</td><td>R$ 45.80</td>"));
        assert!(html.ends_with("</html>"));
    }

    #[test]
    fn html_escapes_user_text() {
        let mut r = record("1", Some("<b>"), 2);
        r.description = "a & b <script>".to_string();
        let records = vec![r];
        let summary = summarize(&records, Locale::EnUs).unwrap();
        let range = MonthRange::new(2025, 10).unwrap();
        let html = render_html(&summary, &records, &range, Locale::EnUs);

        assert!(html.contains("a &amp; b &lt;script&gt;"));
        assert!(html.contains("&lt;b&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn html_is_deterministic() {
        let records = seed_month();
        let summary = summarize(&records, Locale::EnUs).unwrap();
        let range = MonthRange::new(2025, 10).unwrap();
        assert_eq!(
            render_html(&summary, &records, &range, Locale::EnUs),
            render_html(&summary, &records, &range, Locale::EnUs)
        );
    }
}
