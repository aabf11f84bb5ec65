use crate::{geometry::ScreenPoint, render_target::RenderTarget, util::Rgba};

/// Per-thread rendering state.
pub struct Worker {
    id: usize,
    width: u32,
    row_buffer: Vec<Rgba>,
    rendered_rows: usize,
}

impl Worker {
    pub fn new(id: usize, width: u32) -> Self {
        Worker {
            id,
            width,
            row_buffer: Vec::with_capacity(width as usize),
            rendered_rows: 0,
        }
    }

    /// Computes every pixel of the row in order, then hands the whole row to the target.
    /// The row is as wide as the worker was created for.
    pub fn render_row<T, F>(&mut self, target: &T, y: u32, per_pixel: &F)
    where
        T: RenderTarget + ?Sized,
        F: Fn(ScreenPoint) -> Rgba,
    {
        self.row_buffer.clear();
        self.row_buffer
            .extend((0..self.width).map(|x| per_pixel(ScreenPoint::new(x, y))));

        target.write_row(y, &self.row_buffer);
        self.rendered_rows += 1;
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn rendered_rows(&self) -> usize {
        self.rendered_rows
    }
}
