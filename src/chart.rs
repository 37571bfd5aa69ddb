//! Minimal static SVG charts for the KPI report.

use std::fmt::Write;

pub const RUBY_RED: &str = "#9B111E";
const SERIES_COLORS: [&str; 4] = ["#9B111E", "#B22222", "#D62728", "#E34234"];

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 500.0;
const LEFT: f64 = 70.0;
const RIGHT: f64 = 30.0;
const TOP: f64 = 50.0;
const BOTTOM: f64 = 110.0;
const Y_TICKS: usize = 5;

/// Titles shared by every chart kind.
#[derive(Debug, Clone, Copy)]
pub struct Labels<'a> {
    pub title: &'a str,
    pub x: &'a str,
    pub y: &'a str,
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn plot_width() -> f64 {
    WIDTH - LEFT - RIGHT
}

fn plot_height() -> f64 {
    HEIGHT - TOP - BOTTOM
}

fn y_max(values: impl Iterator<Item = f64>) -> f64 {
    let max = values.filter(|v| v.is_finite()).fold(0.0_f64, f64::max);
    if max <= 0.0 {
        1.0
    } else {
        max * 1.1
    }
}

fn y_of(value: f64, max: f64) -> f64 {
    TOP + plot_height() - (value.max(0.0) / max) * plot_height()
}

fn open(out: &mut String, labels: &Labels<'_>) {
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="sans-serif">"#
    );
    let _ = writeln!(out, r#"<rect width="100%" height="100%" fill="white"/>"#);
    let _ = writeln!(
        out,
        r#"<text x="{}" y="28" text-anchor="middle" font-size="18">{}</text>"#,
        WIDTH / 2.0,
        escape(labels.title)
    );
}

fn close(out: &mut String) {
    let _ = writeln!(out, "</svg>");
}

fn axes(out: &mut String, labels: &Labels<'_>, max: f64) {
    let bottom = TOP + plot_height();
    let _ = writeln!(
        out,
        r#"<line x1="{LEFT}" y1="{TOP}" x2="{LEFT}" y2="{bottom}" stroke="black"/>"#
    );
    let _ = writeln!(
        out,
        r#"<line x1="{LEFT}" y1="{bottom}" x2="{}" y2="{bottom}" stroke="black"/>"#,
        LEFT + plot_width()
    );

    for tick in 0..=Y_TICKS {
        let value = max * tick as f64 / Y_TICKS as f64;
        let y = y_of(value, max);
        let _ = writeln!(
            out,
            r#"<text x="{}" y="{:.1}" text-anchor="end" font-size="11">{:.1}</text>"#,
            LEFT - 6.0,
            y + 4.0,
            value
        );
    }

    let _ = writeln!(
        out,
        r#"<text x="{}" y="{}" text-anchor="middle" font-size="13">{}</text>"#,
        LEFT + plot_width() / 2.0,
        HEIGHT - 12.0,
        escape(labels.x)
    );
    let _ = writeln!(
        out,
        r#"<text x="18" y="{0}" text-anchor="middle" font-size="13" transform="rotate(-90 18 {0})">{1}</text>"#,
        TOP + plot_height() / 2.0,
        escape(labels.y)
    );
}

fn category_label(out: &mut String, x: f64, text: &str, rotate: bool) {
    let y = TOP + plot_height() + 16.0;
    if rotate {
        let _ = writeln!(
            out,
            r#"<text x="{x:.1}" y="{y:.1}" text-anchor="end" font-size="11" transform="rotate(-45 {x:.1} {y:.1})">{}</text>"#,
            escape(text)
        );
    } else {
        let _ = writeln!(
            out,
            r#"<text x="{x:.1}" y="{y:.1}" text-anchor="middle" font-size="11">{}</text>"#,
            escape(text)
        );
    }
}

fn no_data(out: &mut String) {
    let _ = writeln!(
        out,
        r#"<text x="{}" y="{}" text-anchor="middle" font-size="16" fill="gray">No data</text>"#,
        WIDTH / 2.0,
        HEIGHT / 2.0
    );
}

pub fn bar_chart(labels: Labels<'_>, points: &[(String, f64)], rotate: bool) -> String {
    let mut out = String::new();
    open(&mut out, &labels);

    if points.is_empty() {
        no_data(&mut out);
    } else {
        let max = y_max(points.iter().map(|(_, v)| *v));
        axes(&mut out, &labels, max);
        let slot = plot_width() / points.len() as f64;
        let bar = slot * 0.7;
        for (index, (label, value)) in points.iter().enumerate() {
            let x = LEFT + slot * index as f64 + (slot - bar) / 2.0;
            let y = y_of(*value, max);
            let _ = writeln!(
                out,
                r#"<rect x="{x:.1}" y="{y:.1}" width="{bar:.1}" height="{:.1}" fill="{RUBY_RED}"/>"#,
                TOP + plot_height() - y
            );
            category_label(&mut out, x + bar / 2.0, label, rotate);
        }
    }

    close(&mut out);
    out
}

pub fn line_chart(labels: Labels<'_>, points: &[(String, f64)]) -> String {
    let mut out = String::new();
    open(&mut out, &labels);

    if points.is_empty() {
        no_data(&mut out);
    } else {
        let max = y_max(points.iter().map(|(_, v)| *v));
        axes(&mut out, &labels, max);
        let slot = plot_width() / points.len() as f64;
        let coords: Vec<(f64, f64)> = points
            .iter()
            .enumerate()
            .map(|(index, (_, value))| {
                (LEFT + slot * (index as f64 + 0.5), y_of(*value, max))
            })
            .collect();

        let path = coords
            .iter()
            .map(|(x, y)| format!("{x:.1},{y:.1}"))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(
            out,
            r#"<polyline points="{path}" fill="none" stroke="{RUBY_RED}" stroke-width="2"/>"#
        );
        for ((x, y), (label, _)) in coords.iter().zip(points) {
            let _ = writeln!(
                out,
                r#"<circle cx="{x:.1}" cy="{y:.1}" r="4" fill="{RUBY_RED}"/>"#
            );
            category_label(&mut out, *x, label, false);
        }
    }

    close(&mut out);
    out
}

/// Bars grouped per category, one colour per series. Every series must hold
/// one value per category.
pub fn grouped_bar_chart(
    labels: Labels<'_>,
    categories: &[String],
    series: &[(String, Vec<f64>)],
) -> String {
    let mut out = String::new();
    open(&mut out, &labels);

    if categories.is_empty() || series.is_empty() {
        no_data(&mut out);
        close(&mut out);
        return out;
    }

    let max = y_max(series.iter().flat_map(|(_, v)| v.iter().copied()));
    axes(&mut out, &labels, max);
    let slot = plot_width() / categories.len() as f64;
    let bar = slot * 0.8 / series.len() as f64;

    for (cat_index, category) in categories.iter().enumerate() {
        let start = LEFT + slot * cat_index as f64 + slot * 0.1;
        for (series_index, (_, values)) in series.iter().enumerate() {
            let value = values.get(cat_index).copied().unwrap_or(0.0);
            let x = start + bar * series_index as f64;
            let y = y_of(value, max);
            let _ = writeln!(
                out,
                r#"<rect x="{x:.1}" y="{y:.1}" width="{bar:.1}" height="{:.1}" fill="{}"/>"#,
                TOP + plot_height() - y,
                SERIES_COLORS[series_index % SERIES_COLORS.len()]
            );
        }
        let center = LEFT + slot * (cat_index as f64 + 0.5);
        category_label(&mut out, center, category, false);
    }

    // legend
    for (series_index, (name, _)) in series.iter().enumerate() {
        let y = TOP + 16.0 * series_index as f64;
        let x = LEFT + plot_width() - 150.0;
        let _ = writeln!(
            out,
            r#"<rect x="{x:.1}" y="{y:.1}" width="10" height="10" fill="{}"/><text x="{:.1}" y="{:.1}" font-size="11">{}</text>"#,
            SERIES_COLORS[series_index % SERIES_COLORS.len()],
            x + 14.0,
            y + 9.0,
            escape(name)
        );
    }

    close(&mut out);
    out
}
