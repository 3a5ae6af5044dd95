//! Uniform square-cell grids with world-coordinate metadata, the compressed
//! binary interchange codec, and sub-window patches.

use std::io::Read;
use std::io::Write;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tinyvec::TinyVec;

use crate::error::{Error, Result};
use crate::Position;

/// Integer grid indices, row-major (`x` varies fastest).
#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cell {
    pub x: usize,
    pub y: usize,
}

impl Cell {
    pub fn new(x: usize, y: usize) -> Self {
        Cell { x, y }
    }
}

/// Geometry of a uniform grid, as needed by footprint tracing. Modelled as a
/// capability so tracing works over any raster-backed layer.
pub trait GridLayout {
    fn x_width(&self) -> usize;
    fn y_height(&self) -> usize;
    fn x_offset(&self) -> f64;
    fn y_offset(&self) -> f64;
    fn cell_width(&self) -> f64;

    fn is_x_in(&self, x: f64) -> bool {
        let w = self.cell_width();
        self.x_offset() - w / 2.0 <= x && x <= self.x_offset() + w * self.x_width() as f64 - w / 2.0
    }

    fn is_y_in(&self, y: f64) -> bool {
        let w = self.cell_width();
        self.y_offset() - w / 2.0 <= y && y <= self.y_offset() + w * self.y_height() as f64 - w / 2.0
    }

    fn x_index(&self, x_coord: f64) -> usize {
        debug_assert!(self.is_x_in(x_coord));
        // round() sends the half-cell padding at the extent edges to -1 or
        // x_width; clamp back onto the grid
        let i = ((x_coord - self.x_offset()) / self.cell_width()).round();
        (i.max(0.0) as usize).min(self.x_width() - 1)
    }

    fn y_index(&self, y_coord: f64) -> usize {
        debug_assert!(self.is_y_in(y_coord));
        let i = ((y_coord - self.y_offset()) / self.cell_width()).round();
        (i.max(0.0) as usize).min(self.y_height() - 1)
    }

    fn x_coord(&self, x_index: usize) -> f64 {
        self.x_offset() + self.cell_width() * x_index as f64
    }

    fn y_coord(&self, y_index: usize) -> f64 {
        self.y_offset() + self.cell_width() * y_index as f64
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Raster<T> {
    pub data: Vec<T>,
    pub x_width: usize,
    pub y_height: usize,
    pub x_offset: f64,
    pub y_offset: f64,
    pub cell_width: f64,
}

impl<T: Copy> Raster<T> {
    pub fn new(data: Vec<T>, x_width: usize, y_height: usize, x_offset: f64, y_offset: f64, cell_width: f64) -> Self {
        assert_eq!(data.len(), x_width * y_height);
        assert!(cell_width > 0.0);
        Raster { data, x_width, y_height, x_offset, y_offset, cell_width }
    }

    pub fn full(fill: T, x_width: usize, y_height: usize, x_offset: f64, y_offset: f64, cell_width: f64) -> Self {
        Raster::new(vec![fill; x_width * y_height], x_width, y_height, x_offset, y_offset, cell_width)
    }

    /// A raster with the same extent and cell size as `like`, filled with `fill`.
    pub fn like<U>(like: &Raster<U>, fill: T) -> Self {
        Raster::full(fill, like.x_width, like.y_height, like.x_offset, like.y_offset, like.cell_width)
    }

    pub fn value(&self, cell: Cell) -> T {
        assert!(self.contains_cell(cell));
        self.data[cell.x + cell.y * self.x_width]
    }

    pub fn set(&mut self, cell: Cell, value: T) {
        assert!(self.contains_cell(cell));
        self.data[cell.x + cell.y * self.x_width] = value;
    }

    pub fn contains_cell(&self, cell: Cell) -> bool {
        cell.x < self.x_width && cell.y < self.y_height
    }

    /// Whether a world position falls in the half-cell-padded raster extent.
    pub fn is_in(&self, pos: &Position) -> bool {
        self.is_x_in(pos.x) && self.is_y_in(pos.y)
    }

    pub fn as_cell(&self, pos: &Position) -> Cell {
        assert!(self.is_in(pos));
        Cell { x: self.x_index(pos.x), y: self.y_index(pos.y) }
    }

    pub fn as_position(&self, cell: Cell) -> Position {
        assert!(self.contains_cell(cell));
        Position { x: self.x_coord(cell.x), y: self.y_coord(cell.y) }
    }

    pub fn is_like<U>(&self, other: &Raster<U>) -> bool {
        self.x_width == other.x_width
            && self.y_height == other.y_height
            && self.x_offset == other.x_offset
            && self.y_offset == other.y_offset
            && self.cell_width == other.cell_width
    }

    /// 8-connected neighbours, clipped to the grid bounds.
    pub fn neighbours(&self, cell: Cell) -> TinyVec<[Cell; 8]> {
        let mut out: TinyVec<[Cell; 8]> = TinyVec::new();
        for dx in -1i64..=1 {
            for dy in -1i64..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = cell.x as i64 + dx;
                let ny = cell.y as i64 + dy;
                if nx < 0 || ny < 0 || nx >= self.x_width as i64 || ny >= self.y_height as i64 {
                    continue;
                }
                out.push(Cell { x: nx as usize, y: ny as usize });
            }
        }
        out
    }

    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        let w = self.x_width;
        (0..self.x_width * self.y_height).map(move |i| Cell { x: i % w, y: i / w })
    }
}

impl<T> GridLayout for Raster<T> {
    fn x_width(&self) -> usize {
        self.x_width
    }
    fn y_height(&self) -> usize {
        self.y_height
    }
    fn x_offset(&self) -> f64 {
        self.x_offset
    }
    fn y_offset(&self) -> f64 {
        self.y_offset
    }
    fn cell_width(&self) -> f64 {
        self.cell_width
    }
}

const RASTER_MAGIC: [u8; 2] = [0xF1, 0x3E];
const RASTER_HEADER_LEN: usize = 2 + 3 * 8 + 3 * 8;

fn push_header(out: &mut Vec<u8>, raster: &Raster<f64>, epsg_code: u64) {
    out.extend_from_slice(&RASTER_MAGIC);
    out.extend_from_slice(&epsg_code.to_le_bytes());
    out.extend_from_slice(&(raster.x_width as u64).to_le_bytes());
    out.extend_from_slice(&(raster.y_height as u64).to_le_bytes());
    out.extend_from_slice(&raster.x_offset.to_le_bytes());
    out.extend_from_slice(&raster.y_offset.to_le_bytes());
    out.extend_from_slice(&raster.cell_width.to_le_bytes());
}

fn payload_bytes(raster: &Raster<f64>) -> Vec<u8> {
    let mut payload = Vec::with_capacity(raster.data.len() * 8);
    for v in &raster.data {
        payload.extend_from_slice(&v.to_le_bytes());
    }
    payload
}

struct Header {
    epsg_code: u64,
    x_width: usize,
    y_height: usize,
    x_offset: f64,
    y_offset: f64,
    cell_width: f64,
}

fn read_u64(buf: &[u8], at: usize) -> u64 {
    u64::from_le_bytes(buf[at..at + 8].try_into().unwrap())
}

fn read_f64(buf: &[u8], at: usize) -> f64 {
    f64::from_le_bytes(buf[at..at + 8].try_into().unwrap())
}

fn parse_header(encoded: &[u8]) -> Result<Header> {
    if encoded.len() <= RASTER_HEADER_LEN || encoded[0..2] != RASTER_MAGIC {
        return Err(Error::MalformedRaster);
    }
    Ok(Header {
        epsg_code: read_u64(encoded, 2),
        x_width: read_u64(encoded, 10) as usize,
        y_height: read_u64(encoded, 18) as usize,
        x_offset: read_f64(encoded, 26),
        y_offset: read_f64(encoded, 34),
        cell_width: read_f64(encoded, 42),
    })
}

fn cells_from_bytes(header: Header, bytes: &[u8]) -> Result<(Raster<f64>, u64)> {
    if bytes.len() != header.x_width * header.y_height * 8 {
        return Err(Error::MalformedRaster);
    }
    let data = bytes.chunks_exact(8).map(|c| f64::from_le_bytes(c.try_into().unwrap())).collect();
    Ok((
        Raster::new(data, header.x_width, header.y_height, header.x_offset, header.y_offset, header.cell_width),
        header.epsg_code,
    ))
}

impl Raster<f64> {
    /// Binary encoding: magic, EPSG code, dimensions and geometry, then the
    /// zlib-compressed row-major f64 cells.
    pub fn encode(&self, epsg_code: u64) -> Vec<u8> {
        let mut out = Vec::new();
        push_header(&mut out, self, epsg_code);
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload_bytes(self)).unwrap();
        out.extend_from_slice(&encoder.finish().unwrap());
        out
    }

    /// Same header, raw uncompressed payload.
    pub fn encode_uncompressed(&self, epsg_code: u64) -> Vec<u8> {
        let mut out = Vec::new();
        push_header(&mut out, self, epsg_code);
        out.extend_from_slice(&payload_bytes(self));
        out
    }

    /// Decode a compressed raster, returning it with its EPSG code.
    pub fn decode(encoded: &[u8]) -> Result<(Raster<f64>, u64)> {
        let header = parse_header(encoded)?;
        let mut decoder = ZlibDecoder::new(&encoded[RASTER_HEADER_LEN..]);
        let mut bytes = Vec::new();
        decoder.read_to_end(&mut bytes).map_err(|e| Error::Decompression(e.kind()))?;
        cells_from_bytes(header, &bytes)
    }

    /// Decode a raster encoded with [`Raster::encode_uncompressed`].
    pub fn decode_uncompressed(encoded: &[u8]) -> Result<(Raster<f64>, u64)> {
        let header = parse_header(encoded)?;
        cells_from_bytes(header, &encoded[RASTER_HEADER_LEN..])
    }
}

/// A pending update to a sub-window of a parent raster. Applying twice is a
/// typed error.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterPatch<T> {
    pub data: Vec<T>,
    width: usize,
    height: usize,
    offset: Cell,
    applied: bool,
}

impl<T: Copy> RasterPatch<T> {
    pub fn new(data: Vec<T>, width: usize, height: usize, offset: Cell) -> Self {
        assert_eq!(data.len(), width * height);
        RasterPatch { data, width, height, offset, applied: false }
    }

    pub fn offset(&self) -> Cell {
        self.offset
    }

    pub fn applied(&self) -> bool {
        self.applied
    }

    pub fn parent_cell(&self, patch_cell: Cell) -> Cell {
        Cell { x: patch_cell.x + self.offset.x, y: patch_cell.y + self.offset.y }
    }

    pub fn child_cell(&self, parent_cell: Cell) -> Cell {
        Cell { x: parent_cell.x - self.offset.x, y: parent_cell.y - self.offset.y }
    }

    pub fn value(&self, cell: Cell) -> T {
        assert!(cell.x < self.width && cell.y < self.height);
        self.data[cell.x + cell.y * self.width]
    }

    pub fn set(&mut self, cell: Cell, value: T) {
        assert!(cell.x < self.width && cell.y < self.height);
        self.data[cell.x + cell.y * self.width] = value;
    }

    /// Copy the patch window into the parent raster.
    pub fn apply_to(&mut self, parent: &mut Raster<T>) -> Result<()> {
        if self.applied {
            return Err(Error::PatchAlreadyApplied);
        }
        assert!(self.offset.x + self.width <= parent.x_width);
        assert!(self.offset.y + self.height <= parent.y_height);
        for y in 0..self.height {
            for x in 0..self.width {
                parent.set(self.parent_cell(Cell { x, y }), self.data[x + y * self.width]);
            }
        }
        self.applied = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> Raster<f64> {
        Raster::new(vec![1.0, 2.0, 3.0, 4.0], 2, 2, 1.0, 1.0, 5.0)
    }

    #[test]
    fn trivial_round_trip() {
        let r = small();
        let encoded = r.encode(3857);
        assert_eq!(&encoded[0..2], &[0xF1, 0x3E]);
        let (decoded, epsg) = Raster::decode(&encoded).unwrap();
        assert_eq!(decoded, r);
        assert_eq!(epsg, 3857);
    }

    #[test]
    fn uncompressed_round_trip() {
        let r = small();
        let encoded = r.encode_uncompressed(32630);
        assert_eq!(&encoded[0..2], &[0xF1, 0x3E]);
        assert_eq!(encoded.len(), RASTER_HEADER_LEN + 4 * 8);
        let (decoded, epsg) = Raster::decode_uncompressed(&encoded).unwrap();
        assert_eq!(decoded, r);
        assert_eq!(epsg, 32630);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut encoded = small().encode(3857);
        encoded[0] = 0x00;
        assert_eq!(Raster::decode(&encoded), Err(Error::MalformedRaster));
    }

    #[test]
    fn rejects_short_buffer() {
        let encoded = small().encode(3857);
        assert_eq!(Raster::decode(&encoded[..RASTER_HEADER_LEN]), Err(Error::MalformedRaster));
    }

    #[test]
    fn rejects_garbage_payload() {
        let mut encoded = small().encode(3857);
        let n = encoded.len();
        for b in encoded[RASTER_HEADER_LEN..n].iter_mut() {
            *b = 0xAA;
        }
        match Raster::decode(&encoded) {
            Err(Error::Decompression(_)) => {}
            other => panic!("expected decompression error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_truncated_uncompressed_payload() {
        let encoded = small().encode_uncompressed(3857);
        assert_eq!(Raster::decode_uncompressed(&encoded[..encoded.len() - 8]), Err(Error::MalformedRaster));
    }

    #[test]
    fn indexing_is_row_major() {
        let r = small();
        assert_eq!(r.value(Cell::new(0, 0)), 1.0);
        assert_eq!(r.value(Cell::new(1, 0)), 2.0);
        assert_eq!(r.value(Cell::new(0, 1)), 3.0);
        assert_eq!(r.value(Cell::new(1, 1)), 4.0);
    }

    #[test]
    fn position_mapping_uses_half_cell_padding() {
        let r = small();
        // extent is [x_offset - w/2, x_offset + width*w - w/2]
        assert!(r.is_in(&Position::new(-1.5, 1.0)));
        assert!(!r.is_in(&Position::new(-1.6, 1.0)));
        assert!(r.is_in(&Position::new(8.5, 1.0)));
        assert!(!r.is_in(&Position::new(8.6, 1.0)));
        assert_eq!(r.as_cell(&Position::new(3.4, 1.0)), Cell::new(0, 0));
        assert_eq!(r.as_cell(&Position::new(3.6, 1.0)), Cell::new(1, 0));
        assert_eq!(r.as_position(Cell::new(1, 1)), Position::new(6.0, 6.0));
    }

    #[test]
    fn neighbours_are_clipped() {
        let r = Raster::full(0.0, 3, 3, 0.0, 0.0, 1.0);
        assert_eq!(r.neighbours(Cell::new(0, 0)).len(), 3);
        assert_eq!(r.neighbours(Cell::new(1, 1)).len(), 8);
        assert_eq!(r.neighbours(Cell::new(2, 1)).len(), 5);
    }

    #[test]
    fn patch_applies_once() {
        let mut parent = Raster::full(0.0, 4, 4, 0.0, 0.0, 1.0);
        let mut patch = RasterPatch::new(vec![1.0, 2.0, 3.0, 4.0], 2, 2, Cell::new(1, 2));
        patch.apply_to(&mut parent).unwrap();
        assert_eq!(parent.value(Cell::new(1, 2)), 1.0);
        assert_eq!(parent.value(Cell::new(2, 2)), 2.0);
        assert_eq!(parent.value(Cell::new(1, 3)), 3.0);
        assert_eq!(parent.value(Cell::new(2, 3)), 4.0);
        assert_eq!(patch.apply_to(&mut parent), Err(Error::PatchAlreadyApplied));
    }
}
