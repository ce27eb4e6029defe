use std::io::Write;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

pub const NUM_OBSTACLES: usize = 5;
pub const NUM_TARGETS: usize = 5;

/// A positioned entity. Obstacles leave `number` at zero, targets carry a
/// value in `1..=10`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub number: i32,
    pub reached: bool,
}

impl Point {
    pub const SIZE: usize = 24;

    pub fn obstacle(x: f64, y: f64) -> Point {
        Point { x, y, number: 0, reached: false }
    }

    pub fn target(x: f64, y: f64, number: i32) -> Point {
        Point { x, y, number, reached: false }
    }

    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        ((self.x - x).powi(2) + (self.y - y).powi(2)).sqrt()
    }

    pub fn decode(rdr: &mut &[u8]) -> anyhow::Result<Point> {
        let x = rdr.read_f64::<LittleEndian>()?;
        let y = rdr.read_f64::<LittleEndian>()?;
        let number = rdr.read_i32::<LittleEndian>()?;
        let reached = rdr.read_u32::<LittleEndian>()? != 0;
        Ok(Point { x, y, number, reached })
    }

    pub fn pack(&self, wtr: &mut impl Write) -> std::io::Result<()> {
        wtr.write_f64::<LittleEndian>(self.x)?;
        wtr.write_f64::<LittleEndian>(self.y)?;
        wtr.write_i32::<LittleEndian>(self.number)?;
        wtr.write_u32::<LittleEndian>(self.reached as u32)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_size_is_fixed() {
        let mut bytes = Vec::new();
        Point::target(12.0, 40.0, 7).pack(&mut bytes).unwrap();
        assert_eq!(bytes.len(), Point::SIZE);

        let mut rdr = &bytes[..];
        let decoded = Point::decode(&mut rdr).unwrap();
        assert_eq!(decoded, Point::target(12.0, 40.0, 7));
        assert!(rdr.is_empty());
    }

    #[test]
    fn truncated_point_is_rejected() {
        let mut bytes = Vec::new();
        Point::obstacle(1.0, 2.0).pack(&mut bytes).unwrap();
        let mut rdr = &bytes[..Point::SIZE - 1];
        assert!(Point::decode(&mut rdr).is_err());
    }
}
