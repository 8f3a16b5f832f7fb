//! Reading and writing of Truevision TGA files.
//!
//! Only true-color and grayscale images are supported, raw or run-length encoded
//! (data type codes 2, 3, 10 and 11). Images read from disk are always returned with
//! row 0 at the top, whatever the origin bits of the file say.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use derive_more::{Display, Error};

use crate::image::{Format, Image};

const HEADER_SIZE: usize = 18;
const DEVELOPER_AREA_REF: [u8; 4] = [0; 4];
const EXTENSION_AREA_REF: [u8; 4] = [0; 4];
const FOOTER: &[u8; 18] = b"TRUEVISION-XFILE.\0";
const MAX_CHUNK_LENGTH: usize = 128;

const DESCRIPTOR_TOP_ORIGIN: u8 = 0x20;
const DESCRIPTOR_RIGHT_ORIGIN: u8 = 0x10;

#[derive(Debug, Display, Error)]
pub enum TgaError {
    #[display("cannot open {}: {error}", path.display())]
    Open { path: PathBuf, error: io::Error },
    #[display("cannot create {}: {error}", path.display())]
    Create { path: PathBuf, error: io::Error },
    #[display("an error occured while reading the header: {error}")]
    Header { error: io::Error },
    #[display("bad bpp (or width/height) value: {width}x{height}/{bits_per_pixel}")]
    BadDimensions { width: i64, height: i64, bits_per_pixel: u8 },
    #[display("unknown file format {_0}")]
    UnknownDataType(#[error(not(source))] u8),
    #[display("an error occured while reading the data: {error}")]
    Data { error: io::Error },
    #[display("too many pixels read")]
    TooManyPixels,
    #[display("can't dump the tga file ({stage}): {error}")]
    Write { stage: WriteStage, error: io::Error },
    #[display("cannot move {} into place: {error}", path.display())]
    Rename { path: PathBuf, error: io::Error },
}

/// The part of the file that was being written when a write failed.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    #[display("header")]
    Header,
    #[display("raw data")]
    RawData,
    #[display("rle data")]
    RleData,
    #[display("footer")]
    Footer,
}

/// Data type codes of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataType {
    RawTrueColor = 2,
    RawGrayscale = 3,
    RleTrueColor = 10,
    RleGrayscale = 11,
}

impl DataType {
    fn from_code(code: u8) -> Option<DataType> {
        return match code {
            2 => Some(DataType::RawTrueColor),
            3 => Some(DataType::RawGrayscale),
            10 => Some(DataType::RleTrueColor),
            11 => Some(DataType::RleGrayscale),
            _ => None,
        };
    }

    fn for_format(format: Format, rle: bool) -> DataType {
        return match (format, rle) {
            (Format::Grayscale, false) => DataType::RawGrayscale,
            (Format::Grayscale, true) => DataType::RleGrayscale,
            (_, false) => DataType::RawTrueColor,
            (_, true) => DataType::RleTrueColor,
        };
    }

    fn is_rle(self) -> bool {
        return matches!(self, DataType::RleTrueColor | DataType::RleGrayscale);
    }
}

/// The fixed size file header. Colormap fields are kept only to skip the colormap on read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Header {
    id_length: u8,
    colormap_type: u8,
    data_type_code: u8,
    colormap_origin: u16,
    colormap_length: u16,
    colormap_depth: u8,
    x_origin: i16,
    y_origin: i16,
    width: i16,
    height: i16,
    bits_per_pixel: u8,
    image_descriptor: u8,
}

impl Header {
    fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Header {
        let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        let i16_at = |i: usize| i16::from_le_bytes([bytes[i], bytes[i + 1]]);
        return Header {
            id_length: bytes[0],
            colormap_type: bytes[1],
            data_type_code: bytes[2],
            colormap_origin: u16_at(3),
            colormap_length: u16_at(5),
            colormap_depth: bytes[7],
            x_origin: i16_at(8),
            y_origin: i16_at(10),
            width: i16_at(12),
            height: i16_at(14),
            bits_per_pixel: bytes[16],
            image_descriptor: bytes[17],
        };
    }

    fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0; HEADER_SIZE];
        bytes[0] = self.id_length;
        bytes[1] = self.colormap_type;
        bytes[2] = self.data_type_code;
        bytes[3..5].copy_from_slice(&self.colormap_origin.to_le_bytes());
        bytes[5..7].copy_from_slice(&self.colormap_length.to_le_bytes());
        bytes[7] = self.colormap_depth;
        bytes[8..10].copy_from_slice(&self.x_origin.to_le_bytes());
        bytes[10..12].copy_from_slice(&self.y_origin.to_le_bytes());
        bytes[12..14].copy_from_slice(&self.width.to_le_bytes());
        bytes[14..16].copy_from_slice(&self.height.to_le_bytes());
        bytes[16] = self.bits_per_pixel;
        bytes[17] = self.image_descriptor;
        return bytes;
    }
}

impl Image {
    /// Loads a tga file from disk.
    pub fn read_tga_file(path: impl AsRef<Path>) -> Result<Image, TgaError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|error| {
            log::error!("can't open file {}", path.display());
            TgaError::Open { path: path.to_path_buf(), error }
        })?;
        return Image::read_tga(&mut BufReader::new(file));
    }

    /// Decodes a tga image from a stream positioned at the start of the header.
    pub fn read_tga(reader: &mut impl Read) -> Result<Image, TgaError> {
        let mut header_bytes = [0; HEADER_SIZE];
        reader.read_exact(&mut header_bytes).map_err(|error| {
            log::error!("an error occured while reading the header");
            TgaError::Header { error }
        })?;
        let header = Header::from_bytes(&header_bytes);

        let format = Format::from_bytes_per_pixel((header.bits_per_pixel >> 3) as usize);
        let format = match format {
            Some(format)
                if header.width > 0 && header.height > 0 && header.bits_per_pixel % 8 == 0 =>
            {
                format
            }
            _ => {
                log::error!("bad bpp (or width/height) value");
                return Err(TgaError::BadDimensions {
                    width: header.width.into(),
                    height: header.height.into(),
                    bits_per_pixel: header.bits_per_pixel,
                });
            }
        };
        let Some(data_type) = DataType::from_code(header.data_type_code) else {
            log::error!("unknown file format {}", header.data_type_code);
            return Err(TgaError::UnknownDataType(header.data_type_code));
        };

        // Image id and colormap sit between the header and the pixel data.
        let colormap_bytes = if header.colormap_type == 0 {
            0
        } else {
            header.colormap_length as u64 * ((header.colormap_depth as u64 + 7) / 8)
        };
        let skip = header.id_length as u64 + colormap_bytes;
        io::copy(&mut reader.by_ref().take(skip), &mut io::sink())
            .map_err(|error| TgaError::Header { error })?;

        let width = header.width as u32;
        let height = header.height as u32;
        let byte_count = width as usize * height as usize * format.bytes_per_pixel();
        let data = if data_type.is_rle() {
            decode_rle(reader, byte_count, format.bytes_per_pixel())?
        } else {
            let mut data = vec![0; byte_count];
            reader.read_exact(&mut data).map_err(|error| {
                log::error!("an error occured while reading the data");
                TgaError::Data { error }
            })?;
            data
        };

        let mut image = Image::from_raw(width, height, format, data);
        if header.image_descriptor & DESCRIPTOR_TOP_ORIGIN == 0 {
            image.flip_vertically();
        }
        if header.image_descriptor & DESCRIPTOR_RIGHT_ORIGIN != 0 {
            image.flip_horizontally();
        }
        log::debug!("{}x{}/{}", width, height, format.bytes_per_pixel() * 8);
        return Ok(image);
    }

    /// Writes the image to `path`. The file is first written next to the target and
    /// renamed into place once complete, so a failed write never leaves a truncated file
    /// under the final name.
    pub fn write_tga_file(&self, path: impl AsRef<Path>, rle: bool) -> Result<(), TgaError> {
        let path = path.as_ref();
        self.tga_dimensions()?;
        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let file = File::create(&tmp_path).map_err(|error| {
            log::error!("can't open file {}", tmp_path.display());
            TgaError::Create { path: tmp_path.clone(), error }
        })?;
        let mut writer = BufWriter::new(file);
        let written = self
            .write_tga(&mut writer, rle)
            .and_then(|()| {
                writer
                    .flush()
                    .map_err(|error| TgaError::Write { stage: WriteStage::Footer, error })
            });
        drop(writer);
        if let Err(error) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(error);
        }

        fs::rename(&tmp_path, path).map_err(|error| {
            let _ = fs::remove_file(&tmp_path);
            TgaError::Rename { path: path.to_path_buf(), error }
        })?;
        return Ok(());
    }

    /// Width and height as stored in the header. Both must be positive i16 values.
    fn tga_dimensions(&self) -> Result<(i16, i16), TgaError> {
        match (i16::try_from(self.width), i16::try_from(self.height)) {
            (Ok(width), Ok(height)) if width > 0 && height > 0 => return Ok((width, height)),
            _ => {
                log::error!("bad bpp (or width/height) value");
                return Err(TgaError::BadDimensions {
                    width: self.width.into(),
                    height: self.height.into(),
                    bits_per_pixel: (self.bytes_per_pixel() << 3) as u8,
                });
            }
        }
    }

    /// Encodes the image as tga into any stream: header, pixel data, developer and
    /// extension area references and the footer. Nothing is written for an image the
    /// format cannot describe.
    pub fn write_tga(&self, writer: &mut impl Write, rle: bool) -> Result<(), TgaError> {
        let (width, height) = self.tga_dimensions()?;
        let write_failed = |stage: WriteStage| {
            move |error: io::Error| {
                log::error!("can't dump the tga file");
                TgaError::Write { stage, error }
            }
        };

        let header = Header {
            data_type_code: DataType::for_format(self.format, rle) as u8,
            width,
            height,
            bits_per_pixel: (self.bytes_per_pixel() << 3) as u8,
            image_descriptor: DESCRIPTOR_TOP_ORIGIN,
            ..Default::default()
        };
        writer.write_all(&header.to_bytes()).map_err(write_failed(WriteStage::Header))?;

        if rle {
            encode_rle(writer, &self.data, self.bytes_per_pixel())
                .map_err(write_failed(WriteStage::RleData))?;
        } else {
            writer.write_all(&self.data).map_err(write_failed(WriteStage::RawData))?;
        }

        writer.write_all(&DEVELOPER_AREA_REF).map_err(write_failed(WriteStage::Footer))?;
        writer.write_all(&EXTENSION_AREA_REF).map_err(write_failed(WriteStage::Footer))?;
        writer.write_all(FOOTER).map_err(write_failed(WriteStage::Footer))?;
        return Ok(());
    }
}

/// Unpacks run-length encoded pixel data. Each chunk starts with a one byte header:
/// below 128 it is followed by header + 1 raw pixels, otherwise by one pixel repeated
/// header - 127 times.
fn decode_rle(
    reader: &mut impl Read,
    byte_count: usize,
    bytes_per_pixel: usize,
) -> Result<Vec<u8>, TgaError> {
    let data_error = |error: io::Error| {
        log::error!("an error occured while reading the data");
        TgaError::Data { error }
    };

    let pixel_count = byte_count / bytes_per_pixel;
    let mut data = Vec::with_capacity(byte_count);
    let mut pixel = [0u8; 4];
    let mut current_pixel = 0;
    while current_pixel < pixel_count {
        let mut chunk_header = [0u8; 1];
        reader.read_exact(&mut chunk_header).map_err(data_error)?;
        let chunk_header = chunk_header[0] as usize;

        let (run_length, repeated) = if chunk_header < 128 {
            (chunk_header + 1, false)
        } else {
            (chunk_header - 127, true)
        };
        if current_pixel + run_length > pixel_count {
            log::error!("Too many pixels read");
            return Err(TgaError::TooManyPixels);
        }

        if repeated {
            reader.read_exact(&mut pixel[..bytes_per_pixel]).map_err(data_error)?;
            for _ in 0..run_length {
                data.extend_from_slice(&pixel[..bytes_per_pixel]);
            }
        } else {
            let start = data.len();
            data.resize(start + run_length * bytes_per_pixel, 0);
            reader.read_exact(&mut data[start..]).map_err(data_error)?;
        }
        current_pixel += run_length;
    }
    return Ok(data);
}

/// Packs pixel data into raw and repeat chunks of at most 128 pixels.
/// Two equal neighbours always start a repeat chunk.
fn encode_rle(writer: &mut impl Write, data: &[u8], bytes_per_pixel: usize) -> io::Result<()> {
    let pixels: Vec<&[u8]> = data.chunks_exact(bytes_per_pixel).collect();
    let pixel_count = pixels.len();
    let mut current = 0;
    while current < pixel_count {
        let mut run_length = 1;
        if current + 1 < pixel_count && pixels[current] == pixels[current + 1] {
            while current + run_length < pixel_count
                && run_length < MAX_CHUNK_LENGTH
                && pixels[current + run_length] == pixels[current]
            {
                run_length += 1;
            }
            writer.write_all(&[(run_length + 127) as u8])?;
            writer.write_all(pixels[current])?;
        } else {
            while current + run_length < pixel_count
                && run_length < MAX_CHUNK_LENGTH
                && !(current + run_length + 1 < pixel_count
                    && pixels[current + run_length] == pixels[current + run_length + 1])
            {
                run_length += 1;
            }
            writer.write_all(&[(run_length - 1) as u8])?;
            let start = current * bytes_per_pixel;
            writer.write_all(&data[start..start + run_length * bytes_per_pixel])?;
        }
        current += run_length;
    }
    return Ok(());
}
