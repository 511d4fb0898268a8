//! This module has I/O functionality for point clouds in the `bxyz` binary layout: a two byte
//! header (has normals, has colors), a little endian `u32` point count, then per point the
//! X, Y, Z coordinates as `f64`, optionally three `f32` normal components, and optionally
//! three `u8` color channels.

use crate::{Point3, PointCloud, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Color given to points read from a file which carries no colors
const UNCOLORED: [u8; 3] = [255, 255, 255];

/// Upper bound on the points reserved up front from a header's count. Larger files grow as
/// their points are actually read.
const MAX_PREALLOCATED_POINTS: usize = 1 << 20;

pub fn write_bxyz(path: &Path, cloud: &PointCloud) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_bxyz_to(&mut writer, cloud)?;
    writer.flush()?;
    Ok(())
}

/// Write a point cloud to any writer. Clouds produced by the engine always carry colors and
/// never normals.
pub fn write_bxyz_to<W: Write>(writer: &mut W, cloud: &PointCloud) -> Result<()> {
    writer.write_all(&[0u8, 1u8])?;
    writer.write_all(&(cloud.len() as u32).to_le_bytes())?;

    for (point, color) in cloud.points().iter().zip(cloud.colors()) {
        writer.write_all(&point.x.to_le_bytes())?;
        writer.write_all(&point.y.to_le_bytes())?;
        writer.write_all(&point.z.to_le_bytes())?;
        writer.write_all(color)?;
    }

    Ok(())
}

pub fn load_bxyz(path: &Path) -> Result<PointCloud> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    read_bxyz(&mut reader)
}

fn read_f64<R: Read>(reader: &mut R) -> Result<f64> {
    let mut bytes = [0u8; 8];
    reader.read_exact(&mut bytes)?;
    Ok(f64::from_le_bytes(bytes))
}

/// Read a point cloud from any reader. Normals, if present in the file, are skipped.
pub fn read_bxyz<R: Read>(reader: &mut R) -> Result<PointCloud> {
    let mut header = [0u8; 2];
    reader.read_exact(&mut header)?;
    let has_normals = header[0] != 0;
    let has_colors = header[1] != 0;

    let mut count_bytes = [0u8; 4];
    reader.read_exact(&mut count_bytes)?;
    let point_count = u32::from_le_bytes(count_bytes) as usize;

    let mut cloud = PointCloud::with_capacity(point_count.min(MAX_PREALLOCATED_POINTS));
    for _ in 0..point_count {
        let x = read_f64(reader)?;
        let y = read_f64(reader)?;
        let z = read_f64(reader)?;

        if has_normals {
            let mut normal_bytes = [0u8; 12];
            reader.read_exact(&mut normal_bytes)?;
        }

        let color = if has_colors {
            let mut color_bytes = [0u8; 3];
            reader.read_exact(&mut color_bytes)?;
            color_bytes
        } else {
            UNCOLORED
        };

        cloud.push(Point3::new(x, y, z), color);
    }

    Ok(cloud)
}
