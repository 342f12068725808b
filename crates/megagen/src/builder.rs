use std::io::{self, Write};

use crate::BuildError;
use crate::compositor::evaluate_layer_row;
use crate::project::Project;
use crate::targa::{TARGA_HEADER_LEN, TargaHeader};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub rows: u32,
    pub bytes_written: u64,
}

/// Composites `project` into an `output_size` square TGA written to
/// `writer`, top row first.
///
/// The scanline accumulator is zeroed once and carried from row to row, so
/// wherever the first layer's mask is below 255 part of the previous row
/// shows through.
pub fn build_project<W: Write + ?Sized>(
    output_size: u32,
    writer: &mut W,
    project: &Project,
) -> Result<BuildStats, BuildError> {
    let edge = u16::try_from(output_size)
        .ok()
        .filter(|edge| *edge > 0)
        .ok_or(BuildError::InvalidOutputSize { size: output_size })?;

    log::info!("[megagen] building {edge}x{edge} from {} layers", project.len());
    writer
        .write_all(&TargaHeader::square(edge).encode())
        .map_err(|error| write_error(error, None))?;
    let mut stats = BuildStats {
        rows: 0,
        bytes_written: TARGA_HEADER_LEN as u64,
    };

    let mut scanline = vec![0u8; output_size as usize * 4];
    for row in 0..output_size {
        for layer in project.layers() {
            evaluate_layer_row(output_size, row, layer, &mut scanline);
        }
        writer
            .write_all(&scanline)
            .map_err(|error| write_error(error, Some(row)))?;
        stats.rows += 1;
        stats.bytes_written += scanline.len() as u64;
        if row % 1024 == 1023 {
            log::debug!("[megagen] wrote scanline {}/{output_size}", row + 1);
        }
    }

    log::info!(
        "[megagen] wrote {} rows, {} bytes",
        stats.rows,
        stats.bytes_written
    );
    Ok(stats)
}

fn write_error(error: io::Error, row: Option<u32>) -> BuildError {
    let error = if error.kind() == io::ErrorKind::WriteZero {
        BuildError::ShortWrite { row }
    } else {
        BuildError::Io(error)
    };
    log::warn!("[megagen] {error}");
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{Layer, LayerImage};

    fn solid_layer(albedo: [u8; 4], mask: u8) -> Layer {
        Layer {
            albedo: LayerImage::solid(3, 3, albedo).unwrap(),
            mask: LayerImage::solid(2, 2, [mask, 0, 0, 255]).unwrap(),
        }
    }

    #[test]
    fn constant_layer_reproduces_swapped_color_everywhere() {
        let project = Project::from_layers(vec![solid_layer([10, 20, 30, 40], 255)]);
        let mut output: Vec<u8> = Vec::new();
        let stats = build_project(16, &mut output, &project)
            .unwrap_or_else(|error| panic!("build failed: {error}"));

        assert_eq!(stats.rows, 16);
        assert_eq!(stats.bytes_written, 18 + 16 * 16 * 4);
        assert_eq!(output.len() as u64, stats.bytes_written);
        assert_eq!(TargaHeader::decode(&output), Some(TargaHeader::square(16)));
        for pixel in output[TARGA_HEADER_LEN..].chunks_exact(4) {
            assert_eq!(pixel, [30, 20, 10, 40]);
        }
    }

    #[test]
    fn later_layers_blend_over_earlier_ones() {
        let project = Project::from_layers(vec![
            solid_layer([0, 0, 0, 0], 255),
            solid_layer([200, 100, 50, 250], 255),
            solid_layer([1, 2, 3, 4], 0),
        ]);
        let mut output: Vec<u8> = Vec::new();
        build_project(4, &mut output, &project).unwrap();
        for pixel in output[TARGA_HEADER_LEN..].chunks_exact(4) {
            assert_eq!(pixel, [50, 100, 200, 250]);
        }
    }

    #[test]
    fn empty_project_writes_zeroed_raster() {
        let mut output: Vec<u8> = Vec::new();
        let stats = build_project(2, &mut output, &Project::default()).unwrap();
        assert_eq!(stats.rows, 2);
        assert!(output[TARGA_HEADER_LEN..].iter().all(|value| *value == 0));
    }

    #[test]
    fn previous_row_shows_through_partial_mask() {
        // Mask covers the top half only, so the bottom rows keep the last
        // fully blended row.
        let albedo = LayerImage::from_rgba(1, 2, vec![9, 9, 9, 9, 5, 5, 5, 5]).unwrap();
        let mask = LayerImage::from_rgba(1, 2, vec![255, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        let project = Project::from_layers(vec![Layer { albedo, mask }]);
        let mut output: Vec<u8> = Vec::new();
        build_project(4, &mut output, &project).unwrap();

        let rows: Vec<&[u8]> = output[TARGA_HEADER_LEN..].chunks_exact(4 * 4).collect();
        assert!(rows[0].iter().all(|value| *value == 9));
        assert!(rows[1].iter().all(|value| *value == 5));
        assert_eq!(rows[2], rows[1]);
        assert_eq!(rows[3], rows[1]);
    }

    #[test]
    fn output_size_must_fit_header() {
        let project = Project::default();
        let mut output: Vec<u8> = Vec::new();
        assert!(matches!(
            build_project(0, &mut output, &project),
            Err(BuildError::InvalidOutputSize { size: 0 })
        ));
        assert!(matches!(
            build_project(70_000, &mut output, &project),
            Err(BuildError::InvalidOutputSize { size: 70_000 })
        ));
        assert!(output.is_empty());
    }

    #[test]
    fn full_writer_reports_short_write() {
        let project = Project::from_layers(vec![solid_layer([1, 2, 3, 4], 255)]);
        let mut buffer = [0u8; 40];
        let mut writer = &mut buffer[..];
        let error = build_project(4, &mut writer, &project).unwrap_err();
        assert!(matches!(error, BuildError::ShortWrite { row: Some(1) }));
    }
}
