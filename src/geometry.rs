use crate::error::{ShowreelError, ShowreelResult};

/// Fixed output canvas, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Where a scaled frame lands on the canvas: top-left offset plus scaled size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Aspect-preserving fit of a `src_width`×`src_height` frame into `canvas`,
/// maximizing one dimension and centering the other.
///
/// Degenerate (zero) dimensions on either side are rejected; the result
/// always has positive width and height.
pub fn fit_to_canvas(src_width: u32, src_height: u32, canvas: Canvas) -> ShowreelResult<Placement> {
    if src_width == 0 || src_height == 0 {
        return Err(ShowreelError::display(format!(
            "source dimensions must be non-zero, got {src_width}x{src_height}"
        )));
    }
    if canvas.width == 0 || canvas.height == 0 {
        return Err(ShowreelError::display(format!(
            "canvas dimensions must be non-zero, got {}x{}",
            canvas.width, canvas.height
        )));
    }

    // Compare aspect ratios by cross-multiplication to stay in integers:
    // src_w/src_h > canvas_w/canvas_h  <=>  src_w*canvas_h > canvas_w*src_h.
    let src_wider = u64::from(src_width) * u64::from(canvas.height)
        > u64::from(canvas.width) * u64::from(src_height);

    let (width, height) = if src_wider {
        let w = canvas.width;
        let h = (u64::from(w) * u64::from(src_height) / u64::from(src_width)).max(1) as u32;
        (w, h)
    } else {
        let h = canvas.height;
        let w = (u64::from(h) * u64::from(src_width) / u64::from(src_height)).max(1) as u32;
        (w, h)
    };

    Ok(Placement {
        x: ((canvas.width - width) / 2) as i32,
        y: ((canvas.height - height) / 2) as i32,
        width,
        height,
    })
}
