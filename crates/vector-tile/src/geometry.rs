//! Geometry command stream decoding.
//!
//! Each feature's geometry is a sequence of command integers
//! (`id = cmd & 0x7`, `count = cmd >> 3`) followed by zig-zag encoded
//! coordinate deltas relative to the previous cursor position.

use crate::proto::GeomType;

const CMD_MOVE_TO: u32 = 1;
const CMD_LINE_TO: u32 = 2;
const CMD_CLOSE_PATH: u32 = 7;

/// A point in tile-local integer coordinates.
pub type Point = (i32, i32);

/// Geometry type tag as declared by the feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryType {
    Unknown,
    Point,
    LineString,
    Polygon,
}

impl From<GeomType> for GeometryType {
    fn from(value: GeomType) -> Self {
        match value {
            GeomType::Unknown => GeometryType::Unknown,
            GeomType::Point => GeometryType::Point,
            GeomType::LineString => GeometryType::LineString,
            GeomType::Polygon => GeometryType::Polygon,
        }
    }
}

/// Decoded geometry with absolute coordinates.
///
/// Polygon rings are closed: their last point repeats the first.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Empty,
    Point(Point),
    MultiPoint(Vec<Point>),
    LineString(Vec<Point>),
    MultiLineString(Vec<Vec<Point>>),
    /// Exterior ring first, then holes
    Polygon(Vec<Vec<Point>>),
    MultiPolygon(Vec<Vec<Vec<Point>>>),
}

impl Geometry {
    /// Every path that can be stroked: line parts and polygon rings.
    /// Points contribute nothing.
    pub fn paths(&self) -> Vec<&[Point]> {
        match self {
            Geometry::Empty | Geometry::Point(_) | Geometry::MultiPoint(_) => Vec::new(),
            Geometry::LineString(line) => vec![line.as_slice()],
            Geometry::MultiLineString(lines) | Geometry::Polygon(lines) => {
                lines.iter().map(Vec::as_slice).collect()
            }
            Geometry::MultiPolygon(polygons) => polygons
                .iter()
                .flat_map(|rings| rings.iter().map(Vec::as_slice))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Geometry::Empty)
    }
}

fn decode_zigzag(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

/// Split a command stream into absolute-coordinate paths.
///
/// A MoveTo starts a new path; ClosePath appends the path's first point.
pub fn decode_paths(commands: &[u32]) -> Result<Vec<Vec<Point>>, String> {
    let mut paths: Vec<Vec<Point>> = Vec::new();
    let mut cursor = 0usize;
    let (mut x, mut y) = (0i32, 0i32);

    while cursor < commands.len() {
        let command = commands[cursor];
        cursor += 1;
        let id = command & 0x7;
        let count = (command >> 3) as usize;

        match id {
            CMD_MOVE_TO | CMD_LINE_TO => {
                let needed = count * 2;
                if commands.len() - cursor < needed {
                    return Err(format!(
                        "command {} wants {} parameters, {} left",
                        id,
                        needed,
                        commands.len() - cursor
                    ));
                }
                if id == CMD_LINE_TO && paths.is_empty() {
                    return Err("LineTo before any MoveTo".to_string());
                }
                for _ in 0..count {
                    x = x.wrapping_add(decode_zigzag(commands[cursor]));
                    y = y.wrapping_add(decode_zigzag(commands[cursor + 1]));
                    cursor += 2;
                    if id == CMD_MOVE_TO {
                        paths.push(vec![(x, y)]);
                    } else if let Some(path) = paths.last_mut() {
                        path.push((x, y));
                    }
                }
            }
            CMD_CLOSE_PATH => {
                if let Some(path) = paths.last_mut() {
                    if let Some(&first) = path.first() {
                        path.push(first);
                    }
                }
            }
            other => return Err(format!("unknown command id {}", other)),
        }
    }

    Ok(paths)
}

/// Twice the signed area of a ring, positive for clockwise rings in
/// y-down tile space.
fn signed_area(ring: &[Point]) -> i64 {
    ring.windows(2)
        .map(|w| {
            let (a, b) = (w[0], w[1]);
            i64::from(a.0) * i64::from(b.1) - i64::from(b.0) * i64::from(a.1)
        })
        .sum()
}

/// Decode a feature's command stream according to its declared type.
pub fn decode_geometry(geom_type: GeometryType, commands: &[u32]) -> Result<Geometry, String> {
    let paths = decode_paths(commands)?;

    let geometry = match geom_type {
        GeometryType::Point => {
            let mut points: Vec<Point> = paths.into_iter().flatten().collect();
            match points.len() {
                0 => Geometry::Empty,
                1 => Geometry::Point(points.remove(0)),
                _ => Geometry::MultiPoint(points),
            }
        }
        GeometryType::LineString => {
            let mut lines: Vec<Vec<Point>> = paths.into_iter().filter(|p| p.len() >= 2).collect();
            match lines.len() {
                0 => Geometry::Empty,
                1 => Geometry::LineString(lines.remove(0)),
                _ => Geometry::MultiLineString(lines),
            }
        }
        GeometryType::Polygon => {
            let mut polygons: Vec<Vec<Vec<Point>>> = Vec::new();
            for ring in paths.into_iter().filter(|r| r.len() >= 4) {
                let area = signed_area(&ring);
                match polygons.last_mut() {
                    Some(rings) if area < 0 => rings.push(ring),
                    _ => polygons.push(vec![ring]),
                }
            }
            match polygons.len() {
                0 => Geometry::Empty,
                1 => Geometry::Polygon(polygons.remove(0)),
                _ => Geometry::MultiPolygon(polygons),
            }
        }
        GeometryType::Unknown => Geometry::Empty,
    };

    Ok(geometry)
}
