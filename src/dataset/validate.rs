use anyhow::{Result, bail, ensure};

use super::properties::DatasetProperties;

/// Reject input/output dimensions too small for the prepared data.
///
/// `input_dims` is `(channels, height, width)` and must cover the largest
/// crop shape divided by `scale_factor`; `output_dims[0]` must fit the
/// longest label plus the start and end tokens.
pub fn validate_input_and_output_dimensions(
    input_dims: &[usize],
    output_dims: &[usize],
    properties: &DatasetProperties,
    scale_factor: u32,
) -> Result<()> {
    let &[_, height, width] = input_dims else {
        bail!("input dims must be (channels, height, width), got {input_dims:?}");
    };
    let Some(&length) = output_dims.first() else {
        bail!("output dims must not be empty");
    };
    ensure!(scale_factor > 0, "image scale factor must be at least 1");

    let [max_height, max_width] = properties.crop_shape.max;
    let needed_height = f64::from(max_height) / f64::from(scale_factor);
    let needed_width = f64::from(max_width) / f64::from(scale_factor);
    ensure!(
        height as f64 >= needed_height && width as f64 >= needed_width,
        "input dims {height}x{width} are smaller than the largest crop \
         {max_height}x{max_width} at scale factor {scale_factor}"
    );

    let needed_length = properties.label_length.max + 2;
    ensure!(
        length >= needed_length,
        "output length {length} cannot hold the longest label ({} characters) \
         plus start and end tokens; need at least {needed_length}",
        properties.label_length.max
    );

    Ok(())
}
