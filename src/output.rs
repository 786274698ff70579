use std::fmt;
use std::io;

use anyhow::Result;
use serde::{Serialize, Serializer};
use tabled::{settings::Style, Table, Tabled};

use crate::data::{Side, Zone};
use crate::engine::{PassReport, Selection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

const NAMED_COLORS: &[(&str, (u8, u8, u8))] = &[
    ("black", (0, 0, 0)),
    ("white", (255, 255, 255)),
    ("red", (255, 0, 0)),
    ("lime", (0, 255, 0)),
    ("green", (0, 128, 0)),
    ("blue", (0, 0, 255)),
    ("yellow", (255, 255, 0)),
    ("orange", (255, 165, 0)),
    ("gray", (128, 128, 128)),
    ("grey", (128, 128, 128)),
    ("silver", (192, 192, 192)),
    ("maroon", (128, 0, 0)),
    ("purple", (128, 0, 128)),
    ("fuchsia", (255, 0, 255)),
    ("magenta", (255, 0, 255)),
    ("aqua", (0, 255, 255)),
    ("cyan", (0, 255, 255)),
    ("navy", (0, 0, 128)),
    ("teal", (0, 128, 128)),
    ("olive", (128, 128, 0)),
    ("crimson", (220, 20, 60)),
    ("tomato", (255, 99, 71)),
    ("gold", (255, 215, 0)),
    ("limegreen", (50, 205, 50)),
    ("dodgerblue", (30, 144, 255)),
];

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse a color name (case-insensitive) or `#RRGGBB`. Opaque.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Some(hex) = value.strip_prefix('#') {
            if hex.len() != 6 || !hex.is_ascii() {
                return None;
            }
            let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
            return Some(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?, 255));
        }
        NAMED_COLORS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(value))
            .map(|&(_, (r, g, b))| Self::new(r, g, b, 255))
    }

    /// Replace alpha with `round(255 * percent / 100)`; percent is capped at 100.
    pub fn with_opacity(self, percent: u8) -> Self {
        let percent = f64::from(percent.min(100));
        Self {
            a: (255.0 * percent / 100.0).round() as u8,
            ..self
        }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}{:02X}", self.a, self.r, self.g, self.b)
    }
}

// Written as `#AARRGGBB` so an instruction stays one flat CSV record.
impl Serialize for Rgba {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A filled rectangle from a zone's anchor bar to the current bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawInstruction {
    pub label: String,
    pub from_index: usize,
    pub from_price: f64,
    pub to_index: usize,
    pub to_price: f64,
    pub color: Rgba,
    pub filled: bool,
}

impl DrawInstruction {
    /// `rank` is the zone's 1-based position among the selected zones of its side.
    pub fn for_zone(side: Side, zone: &Zone, rank: usize, current_index: usize, color: Rgba) -> Self {
        let (from_price, to_price) = match side {
            Side::Supply => (zone.high, zone.low),
            Side::Demand => (zone.low, zone.high),
        };
        Self {
            label: format!("{}{} {}", side.label(), zone.anchor_index, rank),
            from_index: zone.anchor_index,
            from_price,
            to_index: current_index,
            to_price,
            color,
            filled: true,
        }
    }
}

pub fn build_instructions(selection: &Selection, supply: Rgba, demand: Rgba) -> Vec<DrawInstruction> {
    let mut out = Vec::new();
    for (side, color) in [(Side::Supply, supply), (Side::Demand, demand)] {
        for (rank, zone) in selection.zones(side).iter().enumerate() {
            out.push(DrawInstruction::for_zone(
                side,
                zone,
                rank + 1,
                selection.current_index,
                color,
            ));
        }
    }
    out
}

/// Sink for draw instructions. Re-issuing a label replaces the earlier drawing.
pub trait Renderer {
    fn draw_rectangle(&mut self, instruction: &DrawInstruction);
}

/// Collects rectangles in draw order and prints them as a table.
#[derive(Debug, Default)]
pub struct TableRenderer {
    drawings: Vec<DrawInstruction>,
}

impl TableRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current drawings in the order their labels were first drawn.
    pub fn drawings(&self) -> &[DrawInstruction] {
        &self.drawings
    }
}

impl Renderer for TableRenderer {
    fn draw_rectangle(&mut self, instruction: &DrawInstruction) {
        match self
            .drawings
            .iter_mut()
            .find(|d| d.label == instruction.label)
        {
            Some(existing) => *existing = instruction.clone(),
            None => self.drawings.push(instruction.clone()),
        }
    }
}

/// Write drawings as CSV records with a header row.
pub fn write_drawings_csv<W: io::Write>(writer: W, drawings: &[DrawInstruction]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for drawing in drawings {
        writer.serialize(drawing)?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Tabled)]
struct ZoneRow {
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "From Bar")]
    from_index: usize,
    #[tabled(rename = "To Bar")]
    to_index: usize,
    #[tabled(rename = "High")]
    high: String,
    #[tabled(rename = "Low")]
    low: String,
    #[tabled(rename = "Distance")]
    distance: String,
    #[tabled(rename = "Color")]
    color: String,
}

pub fn print_report(renderer: &TableRenderer, selection: &Selection, report: &PassReport) {
    println!("\n=== Supply & Demand Zones ===\n");
    println!("Current Price: {:.5}", selection.price);
    println!(
        "Pivots: {} | Stored: {} | Duplicates: {} | Skipped: {} (no match {}, short history {})",
        report.pivots,
        report.inserted,
        report.duplicates,
        report.skipped(),
        report.no_match,
        report.insufficient_history
    );

    if selection.is_empty() {
        println!("No active zones around the current price.");
        return;
    }

    let rows: Vec<ZoneRow> = renderer
        .drawings()
        .iter()
        .map(|d| {
            let high = d.from_price.max(d.to_price);
            let low = d.from_price.min(d.to_price);
            let distance = if low > selection.price {
                low - selection.price
            } else {
                selection.price - high
            };
            ZoneRow {
                label: d.label.clone(),
                from_index: d.from_index,
                to_index: d.to_index,
                high: format!("{high:.5}"),
                low: format!("{low:.5}"),
                distance: format!("{distance:.5}"),
                color: d.color.to_string(),
            }
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("\n{table}\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opacity_rounds_to_nearest_alpha() {
        let red = Rgba::parse("Red").unwrap();
        assert_eq!(red.with_opacity(20).a, 51);
        assert_eq!(red.with_opacity(0).a, 0);
        assert_eq!(red.with_opacity(100).a, 255);
        // 255 * 0.5 = 127.5 rounds up.
        assert_eq!(red.with_opacity(50).a, 128);
    }

    #[test]
    fn parses_names_and_hex() {
        assert_eq!(Rgba::parse("lime"), Some(Rgba::new(0, 255, 0, 255)));
        assert_eq!(Rgba::parse("#1E90ff"), Some(Rgba::new(30, 144, 255, 255)));
        assert_eq!(Rgba::parse("#12345"), None);
        assert_eq!(Rgba::parse("notacolor"), None);
        assert_eq!(Rgba::new(1, 2, 3, 4).to_string(), "#04010203");
    }

    #[test]
    fn instructions_span_anchor_to_current_bar() {
        let selection = Selection {
            price: 100.0,
            current_index: 42,
            supply: vec![Zone::new(7, 106.0, 104.0)],
            demand: vec![Zone::new(3, 97.0, 95.0), Zone::new(1, 94.0, 92.0)],
        };
        let red = Rgba::new(255, 0, 0, 51);
        let lime = Rgba::new(0, 255, 0, 51);
        let out = build_instructions(&selection, red, lime);

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].label, "supply7 1");
        assert_eq!((out[0].from_price, out[0].to_price), (106.0, 104.0));
        assert_eq!(out[0].to_index, 42);
        assert_eq!(out[0].color, red);
        assert_eq!(out[2].label, "demand1 2");
        assert_eq!((out[2].from_price, out[2].to_price), (92.0, 94.0));
        assert!(out.iter().all(|d| d.filled));
    }

    #[test]
    fn redrawing_a_label_overwrites() {
        let zone = Zone::new(5, 2.0, 1.0);
        let color = Rgba::new(0, 0, 0, 255);
        let mut renderer = TableRenderer::new();
        renderer.draw_rectangle(&DrawInstruction::for_zone(Side::Supply, &zone, 1, 10, color));
        renderer.draw_rectangle(&DrawInstruction::for_zone(Side::Supply, &zone, 1, 11, color));

        assert_eq!(renderer.drawings().len(), 1);
        assert_eq!(renderer.drawings()[0].label, "supply5 1");
        assert_eq!(renderer.drawings()[0].to_index, 11);
    }

    #[test]
    fn drawings_keep_side_then_rank_order() {
        let selection = Selection {
            price: 100.0,
            current_index: 20,
            supply: vec![Zone::new(9, 106.0, 104.0), Zone::new(12, 110.0, 108.0)],
            demand: vec![Zone::new(12, 97.0, 95.0), Zone::new(3, 94.0, 92.0)],
        };
        let color = Rgba::new(0, 0, 0, 255);
        let mut renderer = TableRenderer::new();
        for instruction in build_instructions(&selection, color, color) {
            renderer.draw_rectangle(&instruction);
        }

        let labels: Vec<&str> = renderer.drawings().iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, ["supply9 1", "supply12 2", "demand12 1", "demand3 2"]);

        // A redraw replaces in place rather than moving to the end.
        let moved = DrawInstruction::for_zone(Side::Supply, &selection.supply[0], 1, 21, color);
        renderer.draw_rectangle(&moved);
        assert_eq!(renderer.drawings()[0].to_index, 21);
        assert_eq!(renderer.drawings().len(), 4);
    }

    #[test]
    fn drawings_export_as_flat_csv() {
        let zone = Zone::new(4, 2.0, 1.5);
        let drawing = DrawInstruction::for_zone(Side::Demand, &zone, 1, 9, Rgba::new(0, 255, 0, 51));
        let mut buf = Vec::new();
        write_drawings_csv(&mut buf, &[drawing]).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("label,from_index,from_price,to_index,to_price,color,filled")
        );
        assert_eq!(lines.next(), Some("demand4 1,4,1.5,9,2.0,#3300FF00,true"));
        assert_eq!(lines.next(), None);
    }
}
