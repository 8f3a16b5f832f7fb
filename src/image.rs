use ::image::{Rgb, RgbImage, Rgba, RgbaImage};

/// Pixel layout of an image. The discriminant is the number of bytes per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Grayscale = 1,
    Rgb = 3,
    Rgba = 4,
}

impl Format {
    pub fn bytes_per_pixel(self) -> usize {
        return self as usize;
    }

    pub fn from_bytes_per_pixel(bytes_per_pixel: usize) -> Option<Format> {
        return match bytes_per_pixel {
            1 => Some(Format::Grayscale),
            3 => Some(Format::Rgb),
            4 => Some(Format::Rgba),
            _ => None,
        };
    }
}

/// Raw pixel value, channels stored in b, g, r, a order.
/// `bytes_per_pixel` tells how many leading channels are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub raw: [u8; 4],
    pub bytes_per_pixel: u8,
}

impl Default for Color {
    fn default() -> Self {
        return Color { raw: [0; 4], bytes_per_pixel: 1 };
    }
}

pub const WHITE: Color = Color::rgba(255, 255, 255, 255);
pub const RED: Color = Color::rgba(255, 0, 0, 255);
pub const GREEN: Color = Color::rgba(0, 255, 0, 255);
pub const BLUE: Color = Color::rgba(0, 0, 255, 255);

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Color {
        return Color { raw: [b, g, r, a], bytes_per_pixel: 4 };
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Color {
        return Color { raw: [b, g, r, 0], bytes_per_pixel: 3 };
    }

    pub const fn gray(value: u8) -> Color {
        return Color { raw: [value, 0, 0, 0], bytes_per_pixel: 1 };
    }

    /// Reads a pixel from its in-memory representation. `bytes` holds 1 to 4 channels.
    pub fn from_bytes(bytes: &[u8]) -> Color {
        let mut raw = [0; 4];
        let n = bytes.len().min(4);
        raw[..n].copy_from_slice(&bytes[..n]);
        return Color { raw, bytes_per_pixel: n as u8 };
    }

    pub fn b(&self) -> u8 {
        return self.raw[0];
    }

    pub fn g(&self) -> u8 {
        return self.raw[1];
    }

    pub fn r(&self) -> u8 {
        return self.raw[2];
    }

    pub fn a(&self) -> u8 {
        return self.raw[3];
    }

    /// Multiplies the color channels by `t`, leaving alpha alone.
    /// t is clamped to [0, 1].
    pub fn scale(self, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        let mut raw = self.raw;
        let channels = match self.bytes_per_pixel {
            4 => 3,
            n => n as usize,
        };
        for channel in raw.iter_mut().take(channels) {
            *channel = (*channel as f32 * t) as u8;
        }
        return Color { raw, bytes_per_pixel: self.bytes_per_pixel };
    }

    /// Color as straight rgba, expanding grayscale and filling missing alpha with 255.
    pub fn to_rgba(&self) -> [u8; 4] {
        return match self.bytes_per_pixel {
            1 => [self.raw[0], self.raw[0], self.raw[0], 255],
            4 => [self.r(), self.g(), self.b(), self.a()],
            _ => [self.r(), self.g(), self.b(), 255],
        };
    }
}

/// Anything triangles can be drawn into.
pub trait PixelSink {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Writes a pixel. Out of range coordinates are ignored and false is returned.
    fn set(&mut self, x: i32, y: i32, color: Color) -> bool;
}

/// Image, holding its width, height, pixel format and private flat array(vec) of pixel data.
/// Rows are stored top to bottom, pixel channels in b, g, r, a order.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) format: Format,
    pub(crate) data: Vec<u8>, // Storing flat array.
}

impl Image {
    /// Generates new zeroed image with specified width, height and format.
    pub fn new(width: u32, height: u32, format: Format) -> Image {
        let capacity = width as usize * height as usize * format.bytes_per_pixel();
        return Image { width, height, format, data: vec![0; capacity] };
    }

    pub(crate) fn from_raw(width: u32, height: u32, format: Format, data: Vec<u8>) -> Image {
        debug_assert_eq!(data.len(), width as usize * height as usize * format.bytes_per_pixel());
        return Image { width, height, format, data };
    }

    pub fn width(&self) -> u32 {
        return self.width;
    }

    pub fn height(&self) -> u32 {
        return self.height;
    }

    pub fn format(&self) -> Format {
        return self.format;
    }

    pub fn bytes_per_pixel(&self) -> usize {
        return self.format.bytes_per_pixel();
    }

    pub fn as_bytes(&self) -> &[u8] {
        return &self.data[..];
    }

    /// Index of the first byte of a pixel, None if the coordinate is out of bounds.
    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        return Some((x as usize + y as usize * self.width as usize) * self.bytes_per_pixel());
    }

    pub fn get(&self, x: i32, y: i32) -> Option<Color> {
        let offset = self.offset(x, y)?;
        return Some(Color::from_bytes(&self.data[offset..offset + self.bytes_per_pixel()]));
    }

    /// Sets all pixel data to zero.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    pub fn fill(&mut self, color: Color) {
        let bytes_per_pixel = self.bytes_per_pixel();
        for pixel in self.data.chunks_exact_mut(bytes_per_pixel) {
            pixel.copy_from_slice(&color.raw[..bytes_per_pixel]);
        }
    }

    /// Mirrors the image around its horizontal axis, swapping rows.
    pub fn flip_vertically(&mut self) {
        let stride = self.width as usize * self.bytes_per_pixel();
        let height = self.height as usize;
        for j in 0..height / 2 {
            let (top, bottom) = self.data.split_at_mut((height - 1 - j) * stride);
            top[j * stride..(j + 1) * stride].swap_with_slice(&mut bottom[..stride]);
        }
    }

    /// Mirrors the image around its vertical axis.
    pub fn flip_horizontally(&mut self) {
        let bytes_per_pixel = self.bytes_per_pixel();
        let width = self.width as usize;
        let stride = width * bytes_per_pixel;
        if stride == 0 {
            return;
        }
        for row in self.data.chunks_exact_mut(stride) {
            for i in 0..width / 2 {
                let j = width - 1 - i;
                for t in 0..bytes_per_pixel {
                    row.swap(i * bytes_per_pixel + t, j * bytes_per_pixel + t);
                }
            }
        }
    }

    /// Nearest neighbour resize. Returns false and leaves the image untouched for an empty
    /// target size.
    pub fn scale(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 || self.data.is_empty() {
            return false;
        }
        let bytes_per_pixel = self.bytes_per_pixel();
        let mut data = Vec::with_capacity(width as usize * height as usize * bytes_per_pixel);
        for y in 0..height as u64 {
            let src_y = (y * self.height as u64 / height as u64) as usize;
            for x in 0..width as u64 {
                let src_x = (x * self.width as u64 / width as u64) as usize;
                let offset = (src_x + src_y * self.width as usize) * bytes_per_pixel;
                data.extend_from_slice(&self.data[offset..offset + bytes_per_pixel]);
            }
        }
        self.width = width;
        self.height = height;
        self.data = data;
        return true;
    }

    /// Converts to an `image` crate buffer, e.g. for saving in formats other than tga.
    pub fn to_rgba_image(&self) -> RgbaImage {
        return RgbaImage::from_fn(self.width, self.height, |x, y| {
            let color = self.get(x as i32, y as i32).unwrap_or_default();
            Rgba(color.to_rgba())
        });
    }
}

impl PixelSink for Image {
    fn width(&self) -> u32 {
        return self.width;
    }

    fn height(&self) -> u32 {
        return self.height;
    }

    fn set(&mut self, x: i32, y: i32, color: Color) -> bool {
        let Some(offset) = self.offset(x, y) else {
            return false;
        };
        let bytes_per_pixel = self.bytes_per_pixel();
        self.data[offset..offset + bytes_per_pixel].copy_from_slice(&color.raw[..bytes_per_pixel]);
        return true;
    }
}

/// Drawing straight into an `image` crate buffer.
impl PixelSink for RgbImage {
    fn width(&self) -> u32 {
        return self.dimensions().0;
    }

    fn height(&self) -> u32 {
        return self.dimensions().1;
    }

    fn set(&mut self, x: i32, y: i32, color: Color) -> bool {
        let (width, height) = (PixelSink::width(self) as i32, PixelSink::height(self) as i32);
        if x < 0 || y < 0 || x >= width || y >= height {
            return false;
        }
        let [r, g, b, _] = color.to_rgba();
        self.put_pixel(x as u32, y as u32, Rgb([r, g, b]));
        return true;
    }
}
