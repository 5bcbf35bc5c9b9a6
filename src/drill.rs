//! Excellon drill-file import.
//!
//! PCB tools export every through-hole as a drill hit, which is exactly
//! the list of pads a through-hole board needs soldered.  Only the subset
//! CAD exports actually use is understood:
//!
//! ```text
//! ; comment
//! METRIC,TZ            units (or INCH)
//! T01C0.70             tool 1, 0.70 mm
//! T01                  select tool 1
//! X23.25Y-11.0         hit with the selected tool
//! M30                  end of program
//! ```
//!
//! Anything else is ignored.

use log::{debug, info};

use crate::config::ExecutionConfig;
use crate::execution::SolderPoint;

const MM_PER_INCH: f64 = 25.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Units {
    Millimetres,
    Inches,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tool {
    pub number: u16,
    /// As written in the file, in file units.
    pub diameter: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hole {
    pub tool: u16,
    /// Millimetres.
    pub x: f64,
    pub y: f64,
}

/// Parsed drill file.  Coordinates already converted to millimetres.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrillFile {
    pub units: Option<Units>,
    pub tools: Vec<Tool>,
    pub holes: Vec<Hole>,
}

impl DrillFile {
    pub fn parse(text: &str) -> Self {
        let mut file = Self::default();
        let mut current_tool = None;

        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') {
                continue;
            }
            let upper = line.to_ascii_uppercase();

            if upper.contains("METRIC") {
                file.units = Some(Units::Millimetres);
            } else if upper.contains("INCH") {
                file.units = Some(Units::Inches);
            }

            if upper == "M30" {
                break;
            }

            if let Some(rest) = upper.strip_prefix('T') {
                match parse_tool(rest) {
                    Some((number, Some(diameter))) => {
                        file.tools.push(Tool { number, diameter });
                    }
                    Some((number, None)) => current_tool = Some(number),
                    None => debug!("Drill: ignored '{}'", line),
                }
                continue;
            }

            if let Some((x, y)) = parse_hit(&upper) {
                match current_tool {
                    Some(tool) => {
                        let scale = file.scale();
                        file.holes.push(Hole {
                            tool,
                            x: x * scale,
                            y: y * scale,
                        });
                    }
                    None => debug!("Drill: hit before tool selection ignored"),
                }
            }
        }
        file
    }

    /// Diameter of `tool` in millimetres.
    pub fn diameter_mm(&self, tool: u16) -> Option<f64> {
        self.tools
            .iter()
            .find(|t| t.number == tool)
            .map(|t| t.diameter * self.scale())
    }

    fn scale(&self) -> f64 {
        match self.units {
            Some(Units::Inches) => MM_PER_INCH,
            _ => 1.0,
        }
    }
}

/// How drill hits become solder points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrillImport {
    /// Board origin in machine millimetres.
    pub origin_x_mm: f64,
    pub origin_y_mm: f64,
    pub solder_duration_ms: u64,
    /// Holes wider than this (mounting holes) are left out.
    pub max_diameter_mm: Option<f64>,
    pub scale: ExecutionConfig,
}

impl Default for DrillImport {
    fn default() -> Self {
        Self {
            origin_x_mm: 0.0,
            origin_y_mm: 0.0,
            solder_duration_ms: 800,
            max_diameter_mm: Some(2.0),
            scale: ExecutionConfig::default(),
        }
    }
}

/// Parse `text` and turn every hit into a solder point.
pub fn parse_drill(text: &str, import: &DrillImport) -> Vec<SolderPoint> {
    let file = DrillFile::parse(text);
    let points: Vec<SolderPoint> = file
        .holes
        .iter()
        .filter(|hole| match (import.max_diameter_mm, file.diameter_mm(hole.tool)) {
            (Some(max), Some(d)) => d <= max,
            _ => true,
        })
        .map(|hole| {
            SolderPoint::new(
                to_steps(hole.x + import.origin_x_mm, import.scale.x_steps_per_mm),
                to_steps(hole.y + import.origin_y_mm, import.scale.y_steps_per_mm),
                import.scale.soldering_z,
                true,
                import.solder_duration_ms,
            )
        })
        .collect();
    info!(
        "Drill: {} hit(s), {} tool(s), {} solder point(s)",
        file.holes.len(),
        file.tools.len(),
        points.len()
    );
    points
}

fn to_steps(mm: f64, steps_per_mm: f64) -> i32 {
    (mm * steps_per_mm).round() as i32
}

/// Split a leading decimal number off `s`.
fn leading_number(s: &str) -> Option<(f64, &str)> {
    let end = s
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || ((c == '-' || c == '+') && i == 0)))
        .map_or(s.len(), |(i, _)| i);
    let value = s[..end].parse().ok()?;
    Some((value, &s[end..]))
}

/// `01C0.70` → tool 1, 0.70; `01` → tool 1 selection.
fn parse_tool(rest: &str) -> Option<(u16, Option<f64>)> {
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let number = rest[..digits].parse().ok()?;
    let tail = &rest[digits..];
    if tail.is_empty() {
        return Some((number, None));
    }
    let (diameter, _) = leading_number(tail.strip_prefix('C')?)?;
    Some((number, Some(diameter)))
}

/// `X23.25Y-11.0` → (23.25, -11.0)
fn parse_hit(line: &str) -> Option<(f64, f64)> {
    let (x, rest) = leading_number(line.strip_prefix('X')?)?;
    let (y, _) = leading_number(rest.strip_prefix('Y')?)?;
    Some((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOARD: &str = "\
M48
; DRILL file {KiCad 7}
FMAT,2
METRIC,TZ
T01C0.800
T02C3.200
%
G90
G05
T01
X10.0Y20.0
X12.54Y20.0
T02
X2.5Y-2.5
M30
X99.0Y99.0
";

    #[test]
    fn parses_units_tools_and_hits() {
        let file = DrillFile::parse(BOARD);
        assert_eq!(file.units, Some(Units::Millimetres));
        assert_eq!(file.tools.len(), 2);
        assert_eq!(file.holes.len(), 3);
        assert_eq!(
            file.holes[1],
            Hole {
                tool: 1,
                x: 12.54,
                y: 20.0
            }
        );
        assert_eq!(file.diameter_mm(2), Some(3.2));
    }

    #[test]
    fn stops_at_m30() {
        let file = DrillFile::parse(BOARD);
        assert!(file.holes.iter().all(|h| h.x < 99.0));
    }

    #[test]
    fn mounting_holes_are_filtered() {
        let points = parse_drill(BOARD, &DrillImport::default());
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], SolderPoint::new(800, 1_600, 18_000, true, 800));

        let all = parse_drill(
            BOARD,
            &DrillImport {
                max_diameter_mm: None,
                ..DrillImport::default()
            },
        );
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn inch_files_are_converted() {
        let text = "INCH,LZ\nT1C0.04\nT1\nX1.0Y0.5\n";
        let file = DrillFile::parse(text);
        assert_eq!(file.holes[0].x, 25.4);
        assert_eq!(file.holes[0].y, 12.7);
        let d = file.diameter_mm(1).unwrap();
        assert!((d - 1.016).abs() < 1e-9);
    }

    #[test]
    fn origin_offset_applies() {
        let import = DrillImport {
            origin_x_mm: 5.0,
            origin_y_mm: -5.0,
            ..DrillImport::default()
        };
        let points = parse_drill("T1\nX1Y10\n", &import);
        assert_eq!((points[0].x, points[0].y), (480, 400));
    }

    #[test]
    fn hits_before_tool_selection_are_ignored() {
        let file = DrillFile::parse("METRIC\nX1.0Y1.0\nT3\nX2.0Y2.0\n");
        assert_eq!(file.holes.len(), 1);
        assert_eq!(file.holes[0].tool, 3);
    }

    #[test]
    fn garbage_is_ignored() {
        let file = DrillFile::parse("TXYZ\nXabc\n%%%\n\u{1F600}\n");
        assert_eq!(file, DrillFile::default());
    }
}
