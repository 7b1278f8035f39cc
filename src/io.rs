// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::io::Write;
use std::path::Path;

use ndarray::ArrayD;

use crate::error::{EikonalError, Result};
use crate::geometry::{Coord, Point2, Point3};
use crate::mesh::Mesh;

/// Supported file formats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    /// NumPy .npy format.
    Npy,
    /// MATLAB .mat format (Level 5).
    Mat,
    /// Plain text, one record per line.
    Dat,
}

/// Infer file format from extension.
pub fn infer_format(path: &Path) -> Result<FileFormat> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("npy") => Ok(FileFormat::Npy),
        Some("mat") => Ok(FileFormat::Mat),
        Some("dat") | Some("txt") => Ok(FileFormat::Dat),
        Some(ext) => Err(EikonalError::UnsupportedFileFormat(ext.to_string())),
        None => Err(EikonalError::UnsupportedFileFormat(
            "(no extension)".to_string(),
        )),
    }
}

/// Read a float array from a .npy file, promoting f32 to f64.
fn read_npy_f64(path: &Path) -> Result<ArrayD<f64>> {
    match ndarray_npy::read_npy::<_, ArrayD<f64>>(path) {
        Ok(a) => Ok(a),
        Err(_) => {
            let arr32: ArrayD<f32> = ndarray_npy::read_npy(path)
                .map_err(|e| EikonalError::UnsupportedDtype(format!("{}", e)))?;
            Ok(arr32.mapv(|v| v as f64))
        }
    }
}

/// Read an integer array from a .npy file, accepting i64 or i32.
fn read_npy_indices(path: &Path) -> Result<ArrayD<i64>> {
    match ndarray_npy::read_npy::<_, ArrayD<i64>>(path) {
        Ok(a) => Ok(a),
        Err(_) => {
            let arr32: ArrayD<i32> = ndarray_npy::read_npy(path)
                .map_err(|e| EikonalError::UnsupportedDtype(format!("{}", e)))?;
            Ok(arr32.mapv(|v| v as i64))
        }
    }
}

fn rows_of(arr: &ArrayD<f64>, width: usize) -> Result<Vec<Vec<f64>>> {
    let shape: Vec<usize> = arr.shape().to_vec();
    if shape.len() != 2 || shape[1] != width {
        return Err(EikonalError::ShapeMismatch {
            expected: vec![shape.first().copied().unwrap_or(0), width],
            got: shape,
        });
    }
    let flat: Vec<f64> = arr.as_standard_layout().to_owned().into_raw_vec();
    Ok(flat.chunks(width).map(|c| c.to_vec()).collect())
}

/// Load 2D vertex coordinates from an N×2 .npy file.
pub fn load_points2(path: &Path) -> Result<Vec<Point2>> {
    let arr = read_npy_f64(path)?;
    Ok(rows_of(&arr, 2)?
        .into_iter()
        .map(|r| Point2::new(r[0], r[1]))
        .collect())
}

/// Load 3D vertex coordinates from an N×3 .npy file.
pub fn load_points3(path: &Path) -> Result<Vec<Point3>> {
    let arr = read_npy_f64(path)?;
    Ok(rows_of(&arr, 3)?
        .into_iter()
        .map(|r| Point3::new(r[0], r[1], r[2]))
        .collect())
}

fn index_rows(path: &Path, width: usize) -> Result<Vec<Vec<u32>>> {
    let arr = read_npy_indices(path)?;
    let shape: Vec<usize> = arr.shape().to_vec();
    if shape.len() != 2 || shape[1] != width {
        return Err(EikonalError::ShapeMismatch {
            expected: vec![shape.first().copied().unwrap_or(0), width],
            got: shape,
        });
    }
    let flat: Vec<i64> = arr.as_standard_layout().to_owned().into_raw_vec();
    let mut rows = Vec::with_capacity(flat.len() / width);
    for chunk in flat.chunks(width) {
        let mut row = Vec::with_capacity(width);
        for &v in chunk {
            if v < 0 || v > u32::MAX as i64 {
                return Err(EikonalError::Other(format!(
                    "cell index {} out of range in {}",
                    v,
                    path.display()
                )));
            }
            row.push(v as u32);
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Load triangle connectivity from an N×3 integer .npy file.
pub fn load_triangles(path: &Path) -> Result<Vec<[u32; 3]>> {
    Ok(index_rows(path, 3)?
        .into_iter()
        .map(|r| [r[0], r[1], r[2]])
        .collect())
}

/// Load tetrahedron connectivity from an N×4 integer .npy file.
pub fn load_tetrahedra(path: &Path) -> Result<Vec<[u32; 4]>> {
    Ok(index_rows(path, 4)?
        .into_iter()
        .map(|r| [r[0], r[1], r[2], r[3]])
        .collect())
}

/// Load a per-cell slowness vector from a .npy or .mat file.
pub fn load_slowness(path: &Path, num_cells: usize) -> Result<Vec<f64>> {
    let values = match infer_format(path)? {
        FileFormat::Npy => {
            let arr = read_npy_f64(path)?;
            arr.as_standard_layout().to_owned().into_raw_vec()
        }
        FileFormat::Mat => load_mat_vector(path, "slowness")?,
        FileFormat::Dat => {
            return Err(EikonalError::UnsupportedFileFormat("dat".to_string()))
        }
    };
    if values.len() != num_cells {
        return Err(EikonalError::ShapeMismatch {
            expected: vec![num_cells],
            got: vec![values.len()],
        });
    }
    Ok(values)
}

/// Load a per-cell velocity vector and convert to slowness.
pub fn load_velocity_as_slowness(path: &Path, num_cells: usize) -> Result<Vec<f64>> {
    let velocity = match infer_format(path)? {
        FileFormat::Npy => {
            let arr = read_npy_f64(path)?;
            arr.as_standard_layout().to_owned().into_raw_vec()
        }
        FileFormat::Mat => load_mat_vector(path, "velocity")?,
        FileFormat::Dat => {
            return Err(EikonalError::UnsupportedFileFormat("dat".to_string()))
        }
    };
    if velocity.len() != num_cells {
        return Err(EikonalError::ShapeMismatch {
            expected: vec![num_cells],
            got: vec![velocity.len()],
        });
    }
    velocity_to_slowness(&velocity)
}

/// Convert velocity to slowness (element-wise 1/v).
pub fn velocity_to_slowness(velocity: &[f64]) -> Result<Vec<f64>> {
    let mut slowness = Vec::with_capacity(velocity.len());
    for (index, &v) in velocity.iter().enumerate() {
        if !v.is_finite() || v <= 0.0 {
            return Err(EikonalError::InvalidVelocity { index, value: v });
        }
        slowness.push(1.0 / v);
    }
    Ok(slowness)
}

/// Read a numeric vector from a MAT file by variable name.
fn load_mat_vector(path: &Path, variable_name: &str) -> Result<Vec<f64>> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    let mat = matfile::MatFile::parse(&mut reader)
        .map_err(|e| EikonalError::Other(format!("MAT parse error: {}", e)))?;

    let available: Vec<String> = mat.arrays().iter().map(|a| a.name().to_string()).collect();
    let array = mat
        .find_by_name(variable_name)
        .ok_or_else(|| EikonalError::MatVariableNotFound {
            expected: variable_name.to_string(),
            available,
        })?;

    match array.data() {
        matfile::NumericData::Double { real, imag: _ } => Ok(real.clone()),
        matfile::NumericData::Single { real, imag: _ } => {
            Ok(real.iter().map(|&v| v as f64).collect())
        }
        _ => Err(EikonalError::UnsupportedDtype(
            "MAT array is not f64 or f32".to_string(),
        )),
    }
}

/// Save worker `worker`'s traveltime field, format inferred from the
/// extension: `.dat` writes coordinates plus time per node, `.npy` and
/// `.mat` write the bare time vector in node order.
pub fn save_times<M: Mesh>(mesh: &M, worker: usize, path: &Path) -> Result<()> {
    match infer_format(path)? {
        FileFormat::Npy => save_times_npy(mesh, worker, path),
        FileFormat::Mat => save_times_mat(mesh, worker, path, "traveltime"),
        FileFormat::Dat => save_times_dat(mesh, worker, path),
    }
}

/// Plain-text export: one node per line, coordinates then arrival time,
/// tab separated with 12 significant digits.
pub fn save_times_dat<M: Mesh>(mesh: &M, worker: usize, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut w = std::io::BufWriter::new(file);
    for v in 0..mesh.num_vertices() as u32 {
        for c in mesh.vertex(v).to_vec() {
            write!(w, "{:.12}\t", c)?;
        }
        writeln!(w, "{:.12}", mesh.slots().get(v, worker))?;
    }
    w.flush()?;
    Ok(())
}

/// Save the traveltime vector to a 1-D .npy file.
pub fn save_times_npy<M: Mesh>(mesh: &M, worker: usize, path: &Path) -> Result<()> {
    let data: Vec<f64> = mesh.slots().snapshot(worker);
    let arr = ndarray::Array1::from_vec(data);
    ndarray_npy::write_npy(path, &arr)
        .map_err(|e| EikonalError::Other(format!("npy write error: {}", e)))
}

/// Save the traveltime vector to a MATLAB Level 5 .mat file.
///
/// The `matfile` crate only reads MAT files; this is a minimal writer for
/// a single real f64 column vector.
pub fn save_times_mat<M: Mesh>(mesh: &M, worker: usize, path: &Path, var_name: &str) -> Result<()> {
    let data: Vec<f64> = mesh.slots().snapshot(worker);
    write_mat_level5(path, var_name, &[data.len(), 1], &data)
}

/// Write one real f64 array as an uncompressed MAT-File Level 5 element.
fn write_mat_level5(path: &Path, var_name: &str, dimensions: &[usize], data: &[f64]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut w = std::io::BufWriter::new(file);

    // 128-byte header: descriptive text, subsystem offset, version, endian
    let desc = b"MATLAB 5.0 MAT-file, created by eikonal-umesh";
    let mut header_text = [b' '; 116];
    let copy_len = desc.len().min(116);
    header_text[..copy_len].copy_from_slice(&desc[..copy_len]);
    w.write_all(&header_text)?;
    w.write_all(&[0u8; 8])?;
    w.write_all(&0x0100u16.to_le_bytes())?;
    w.write_all(b"IM")?;

    // sub-element sizes, each tag(8) + data padded to 8 bytes
    let array_flags_total: u32 = 16;
    let dims_data_size = (dimensions.len() * 4) as u32;
    let dims_padded = dims_data_size.div_ceil(8) * 8;
    let name_bytes = var_name.as_bytes();
    let name_data_size = name_bytes.len() as u32;
    let name_padded = name_data_size.div_ceil(8) * 8;
    let real_data_size = (data.len() * 8) as u32;

    let matrix_data_size =
        array_flags_total + (8 + dims_padded) + (8 + name_padded) + (8 + real_data_size);

    // miMATRIX tag
    w.write_all(&14u32.to_le_bytes())?;
    w.write_all(&matrix_data_size.to_le_bytes())?;

    // array flags: mxDOUBLE_CLASS, no flags
    w.write_all(&6u32.to_le_bytes())?;
    w.write_all(&8u32.to_le_bytes())?;
    w.write_all(&6u32.to_le_bytes())?;
    w.write_all(&0u32.to_le_bytes())?;

    // dimensions (miINT32)
    w.write_all(&5u32.to_le_bytes())?;
    w.write_all(&dims_data_size.to_le_bytes())?;
    for &d in dimensions {
        w.write_all(&(d as i32).to_le_bytes())?;
    }
    for _ in 0..(dims_padded - dims_data_size) {
        w.write_all(&[0u8])?;
    }

    // array name (miINT8)
    w.write_all(&1u32.to_le_bytes())?;
    w.write_all(&name_data_size.to_le_bytes())?;
    w.write_all(name_bytes)?;
    for _ in 0..(name_padded - name_data_size) {
        w.write_all(&[0u8])?;
    }

    // real part (miDOUBLE), already 8-byte aligned
    w.write_all(&9u32.to_le_bytes())?;
    w.write_all(&real_data_size.to_le_bytes())?;
    for &val in data {
        w.write_all(&val.to_le_bytes())?;
    }

    w.flush()?;
    Ok(())
}

/// Save ray polylines as plain text: coordinates per line, one blank line
/// between consecutive rays.
pub fn save_raypaths_dat<P: Coord>(paths: &[Vec<P>], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut w = std::io::BufWriter::new(file);
    for (k, ray) in paths.iter().enumerate() {
        if k > 0 {
            writeln!(w)?;
        }
        for p in ray {
            let coords = p.to_vec();
            let line: Vec<String> = coords.iter().map(|c| format!("{:.12}", c)).collect();
            writeln!(w, "{}", line.join("\t"))?;
        }
    }
    w.flush()?;
    Ok(())
}
