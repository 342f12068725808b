use crate::project::Layer;

/// Output channel `c` takes albedo channel `SOURCE_CHANNEL[c]`.
const SOURCE_CHANNEL: [usize; 4] = [2, 1, 0, 3];

pub fn lerp_channel(start: u8, end: u8, weight: u8) -> u8 {
    let t = f32::from(weight) / 255.0;
    ((1.0 - t) * f32::from(start) + t * f32::from(end)) as u8
}

/// Blends one layer into a scanline accumulator of `output_size` RGBA
/// pixels. The albedo repeats across the output while the mask is
/// stretched over it once; mask channel 0 is the blend weight.
pub fn evaluate_layer_row(output_size: u32, row: u32, layer: &Layer, accumulator: &mut [u8]) {
    let albedo = &layer.albedo;
    let mask = &layer.mask;
    let albedo_y = row % albedo.height();
    let mask_y = stretch(row, output_size, mask.height());

    for (column, pixel) in accumulator
        .chunks_exact_mut(4)
        .take(output_size as usize)
        .enumerate()
    {
        let column = column as u32;
        let source = albedo.pixel(column % albedo.width(), albedo_y);
        let weight = mask.pixel(stretch(column, output_size, mask.width()), mask_y)[0];
        for (channel, value) in pixel.iter_mut().enumerate() {
            *value = lerp_channel(*value, source[SOURCE_CHANNEL[channel]], weight);
        }
    }
}

fn stretch(position: u32, output_size: u32, extent: u32) -> u32 {
    let scaled = (position as f32 / output_size as f32 * extent as f32) as u32;
    scaled.min(extent - 1)
}
