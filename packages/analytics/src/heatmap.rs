//! Annotated SVG heatmap of a correlation matrix.

use std::fmt::Write as _;

use cchf_map_analytics_models::CorrelationMatrix;

const CELL: usize = 90;
const LABEL_WIDTH: usize = 190;
const TITLE_HEIGHT: usize = 40;
const FOOTER_HEIGHT: usize = 150;

/// Diverging blue-white-red fill for a coefficient in `[-1, 1]`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn cell_color(r: f64) -> String {
    let r = if r.is_finite() { r.clamp(-1.0, 1.0) } else { 0.0 };
    let fade = ((1.0 - r.abs()) * 255.0).round() as u8;
    if r >= 0.0 {
        format!("rgb(255,{fade},{fade})")
    } else {
        format!("rgb({fade},{fade},255)")
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Renders `matrix` as a standalone SVG document with each cell
/// annotated by its coefficient.
#[must_use]
pub fn render_svg(title: &str, matrix: &CorrelationMatrix) -> String {
    let n = matrix.size();
    let width = LABEL_WIDTH + n * CELL + 20;
    let height = TITLE_HEIGHT + n * CELL + FOOTER_HEIGHT;

    let mut svg = String::new();
    writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" font-family="sans-serif" font-size="12">"#
    )
    .unwrap();
    writeln!(
        svg,
        r#"  <text x="{}" y="24" text-anchor="middle" font-size="16">{}</text>"#,
        width / 2,
        escape(title)
    )
    .unwrap();

    for (i, row_label) in matrix.columns.iter().enumerate() {
        let y = TITLE_HEIGHT + i * CELL;
        writeln!(
            svg,
            r#"  <text x="{}" y="{}" text-anchor="end">{}</text>"#,
            LABEL_WIDTH - 8,
            y + CELL / 2 + 4,
            escape(row_label.as_ref())
        )
        .unwrap();
        for j in 0..n {
            let x = LABEL_WIDTH + j * CELL;
            let r = matrix.get(i, j);
            writeln!(
                svg,
                r#"  <rect x="{x}" y="{y}" width="{CELL}" height="{CELL}" fill="{}" stroke="white"/>"#,
                cell_color(r)
            )
            .unwrap();
            writeln!(
                svg,
                r#"  <text x="{}" y="{}" text-anchor="middle">{r:.2}</text>"#,
                x + CELL / 2,
                y + CELL / 2 + 4
            )
            .unwrap();
        }
    }

    let label_y = TITLE_HEIGHT + n * CELL + 10;
    for (j, column) in matrix.columns.iter().enumerate() {
        let x = LABEL_WIDTH + j * CELL + CELL / 2;
        writeln!(
            svg,
            r#"  <text x="{x}" y="{label_y}" text-anchor="end" transform="rotate(-45 {x} {label_y})">{}</text>"#,
            escape(column.as_ref())
        )
        .unwrap();
    }

    svg.push_str("</svg>\n");
    svg
}
