//! Street-grid map model.
//!
//! A map is a grid of intersections in raster order (`index = x + y * sx`),
//! each carrying the four building colors around it clockwise from top-left.
//! Maps are parsed once from a PPM image and immutable afterwards.
//!
//! Image conventions: red border, black streets, yellow intersections,
//! buildings pure green, pure blue, or white. Intersection pitch and size
//! are inferred from the first yellow block, so image resolution does not
//! matter.

use crate::color::{BuildingColor, Observation};
use crate::error::{Error, Result};
use crate::pose::Heading;
use crate::ppm::RgbImage;
use log::{debug, info, warn};

/// Largest supported grid (matches the robot's on-board table).
pub const MAX_GRID_CELLS: usize = 400;

const YELLOW: [u8; 3] = [255, 255, 0];
const GREEN: [u8; 3] = [0, 255, 0];
const BLUE: [u8; 3] = [0, 0, 255];
const WHITE: [u8; 3] = [255, 255, 255];

/// Immutable grid of intersections.
#[derive(Debug, Clone)]
pub struct GridMap {
    sx: usize,
    sy: usize,
    cells: Vec<[BuildingColor; 4]>,
}

impl GridMap {
    /// Build a map from explicit cells in raster order.
    ///
    /// Panics if `cells.len() != sx * sy` or the grid exceeds
    /// [`MAX_GRID_CELLS`]; intended for tests and generated maps.
    pub fn new(sx: usize, sy: usize, cells: Vec<[BuildingColor; 4]>) -> Self {
        assert_eq!(cells.len(), sx * sy, "cell count must match grid size");
        assert!(sx * sy <= MAX_GRID_CELLS, "grid too large");
        Self { sx, sy, cells }
    }

    /// Parse a map from a PPM image.
    pub fn from_image(img: &RgbImage) -> Result<Self> {
        let geom = Geometry::infer(img)?;
        info!(
            "intersection geometry: anchor=({}, {}), size={}x{}, pitch={}x{}",
            geom.bx, geom.by, geom.wx, geom.wy, geom.dx, geom.dy
        );

        let sx = geom.count_columns(img);
        let sy = geom.count_rows(img);
        info!("map size: {} x {} intersections", sx, sy);
        if sx == 0 || sy == 0 {
            return Err(Error::MapGeometry);
        }
        if sx * sy > MAX_GRID_CELLS {
            return Err(Error::MapFormat(format!(
                "{}x{} intersections exceed the supported {}",
                sx, sy, MAX_GRID_CELLS
            )));
        }

        let mut cells = Vec::with_capacity(sx * sy);
        for j in 0..sy {
            for i in 0..sx {
                let (cx, cy) = geom.center(i, j);
                let corners = [
                    (cx - geom.wx, cy - geom.wy), // top-left
                    (cx + geom.wx, cy - geom.wy), // top-right
                    (cx + geom.wx, cy + geom.wy), // bottom-right
                    (cx - geom.wx, cy + geom.wy), // bottom-left
                ];
                let mut cell = [BuildingColor::None; 4];
                for (corner, (x, y)) in cell.iter_mut().zip(corners) {
                    *corner = classify_building(img, x, y, i, j);
                }
                debug!("intersection ({}, {}): {:?}", i, j, cell);
                cells.push(cell);
            }
        }

        Ok(Self { sx, sy, cells })
    }

    /// Number of intersections along x.
    pub fn width(&self) -> usize {
        self.sx
    }

    /// Number of intersections along y.
    pub fn height(&self) -> usize {
        self.sy
    }

    /// Total number of intersections.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Raster index of an intersection.
    pub fn index(&self, x: usize, y: usize) -> usize {
        x + y * self.sx
    }

    /// Whether signed cell coordinates fall on the grid.
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.sx && (y as usize) < self.sy
    }

    /// Building colors around an intersection, clockwise from top-left.
    pub fn corners(&self, x: usize, y: usize) -> [BuildingColor; 4] {
        self.cells[self.index(x, y)]
    }

    /// Whether an observation taken while facing `heading` agrees with the
    /// stored corners of the cell at raster index `cell`.
    ///
    /// The robot reads clockwise from its own top-left, which is the map's
    /// tuple rotated by the heading's quarter-turn count.
    pub fn matches_observation(&self, cell: usize, heading: Heading, obs: &Observation) -> bool {
        let corners = self.cells[cell];
        (0..4).all(|k| corners[(k + heading.index()) % 4].matches(obs[k]))
    }
}

/// Pixel geometry of the intersection lattice.
struct Geometry {
    bx: i64,
    by: i64,
    /// Intersection block size.
    wx: i64,
    wy: i64,
    /// Pitch between intersection anchors.
    dx: i64,
    dy: i64,
}

impl Geometry {
    /// Locate the first yellow pixel and derive block size and pitch from
    /// the yellow/non-yellow transitions to its right and below.
    fn infer(img: &RgbImage) -> Result<Self> {
        let (bx, by) = first_yellow(img).ok_or(Error::MapGeometry)?;

        let mut wx = None;
        let mut dx = None;
        for k in bx..img.width() as i64 {
            let yellow = img.pixel(k as usize, by as usize) == YELLOW;
            if wx.is_none() {
                if !yellow {
                    wx = Some(k - bx);
                }
            } else if yellow {
                dx = Some(k - bx);
                break;
            }
        }

        let mut wy = None;
        let mut dy = None;
        for k in by..img.height() as i64 {
            let yellow = img.pixel(bx as usize, k as usize) == YELLOW;
            if wy.is_none() {
                if !yellow {
                    wy = Some(k - by);
                }
            } else if yellow {
                dy = Some(k - by);
                break;
            }
        }

        match (wx, dx, wy, dy) {
            (Some(wx), Some(dx), Some(wy), Some(dy)) => Ok(Self { bx, by, wx, wy, dx, dy }),
            _ => Err(Error::MapGeometry),
        }
    }

    /// Pixel center of intersection `(i, j)`.
    fn center(&self, i: usize, j: usize) -> (i64, i64) {
        (
            self.bx + i as i64 * self.dx + self.wx / 2,
            self.by + j as i64 * self.dy + self.wy / 2,
        )
    }

    fn count_columns(&self, img: &RgbImage) -> usize {
        let mut count = 0;
        let mut x = self.bx + self.wx / 2;
        while x < img.width() as i64 {
            if img.pixel(x as usize, self.by as usize) == YELLOW {
                count += 1;
            }
            x += self.dx;
        }
        count
    }

    fn count_rows(&self, img: &RgbImage) -> usize {
        let mut count = 0;
        let mut y = self.by + self.wy / 2;
        while y < img.height() as i64 {
            if img.pixel(self.bx as usize, y as usize) == YELLOW {
                count += 1;
            }
            y += self.dy;
        }
        count
    }
}

fn first_yellow(img: &RgbImage) -> Option<(i64, i64)> {
    for i in 0..img.width() {
        for j in 0..img.height() {
            if img.pixel(i, j) == YELLOW {
                return Some((i as i64, j as i64));
            }
        }
    }
    None
}

fn classify_building(img: &RgbImage, x: i64, y: i64, i: usize, j: usize) -> BuildingColor {
    match img.pixel_checked(x, y) {
        Some(px) if px == GREEN => BuildingColor::Green,
        Some(px) if px == BLUE => BuildingColor::Blue,
        Some(px) if px == WHITE => BuildingColor::None,
        Some(px) => {
            warn!(
                "unrecognized building color at intersection ({}, {}), pixel ({}, {}): {:?}",
                i, j, x, y, px
            );
            BuildingColor::None
        }
        None => {
            warn!(
                "building sample for intersection ({}, {}) falls outside the image at ({}, {})",
                i, j, x, y
            );
            BuildingColor::None
        }
    }
}
