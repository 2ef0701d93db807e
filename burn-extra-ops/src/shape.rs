//! # Output-Size Arithmetic
//!
//! Integer rules for the spatial size produced by convolution and pooling windows.
//! They mirror PyTorch's `conv_output_size` / `pooling_output_shape` so that shape
//! expectations can be computed before any tensor is allocated.

/// Spatial output size of a convolution along one axis.
///
/// Returns `None` when the dilated kernel does not fit into the padded input.
pub const fn conv_output_size(
    input: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
    dilation: usize,
) -> Option<usize> {
    if stride == 0 || kernel == 0 || dilation == 0 {
        return None;
    }
    let padded = input + 2 * padding;
    let span = dilation * (kernel - 1) + 1;
    if padded < span {
        return None;
    }
    Some((padded - span) / stride + 1)
}

/// Spatial output size of a pooling window along one axis.
///
/// With `ceil_mode` the division rounds up, but the last window is dropped when it
/// would start entirely inside the trailing padding.
pub const fn pool_output_size(
    input: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
    ceil_mode: bool,
) -> Option<usize> {
    let padded = input + 2 * padding;
    if stride == 0 || kernel == 0 || padded < kernel {
        return None;
    }
    let numerator = padded - kernel;
    let mut out = if ceil_mode {
        numerator.div_ceil(stride) + 1
    } else {
        numerator / stride + 1
    };
    if ceil_mode && (out - 1) * stride >= input + padding {
        out -= 1;
    }
    Some(out)
}

/// Extra bottom/right padding that makes a floor-mode pool produce the ceil-mode size.
pub const fn ceil_mode_extra_padding(
    input: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
) -> usize {
    match pool_output_size(input, kernel, stride, padding, true) {
        Some(out) => {
            let needed = (out - 1) * stride + kernel;
            let padded = input + 2 * padding;
            needed.saturating_sub(padded)
        }
        None => 0,
    }
}
