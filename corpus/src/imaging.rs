use crate::pool::{TaskPool, TaskReport};
use crate::{CorpusError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tiff::decoder::Decoder;
use tiff::tags::Tag;
use tiff::TiffResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageInfo {
    pub path: PathBuf,
    pub compression: String,
    /// Horizontal and vertical resolution in dots per inch, when the file states a unit.
    pub dpi: Option<(u32, u32)>,
}

/// How many images use each compression scheme and each resolution.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ImageSummary {
    pub compression: BTreeMap<String, usize>,
    pub dpi: BTreeMap<String, usize>,
}

fn compression_name(code: u32) -> String {
    match code {
        1 => "none".into(),
        2 => "ccitt_rle".into(),
        3 => "group3".into(),
        4 => "group4".into(),
        5 => "lzw".into(),
        6 | 7 => "jpeg".into(),
        8 | 32946 => "deflate".into(),
        32773 => "packbits".into(),
        other => format!("unknown({other})"),
    }
}

fn rational(v: tiff::decoder::ifd::Value) -> Option<f64> {
    match v {
        tiff::decoder::ifd::Value::Rational(n, d) if d != 0 => Some(n as f64 / d as f64),
        tiff::decoder::ifd::Value::Unsigned(n) => Some(n as f64),
        tiff::decoder::ifd::Value::Short(n) => Some(n as f64),
        _ => None,
    }
}

fn read_tags(decoder: &mut Decoder<BufReader<File>>) -> TiffResult<(u32, Option<(u32, u32)>)> {
    let compression = match decoder.find_tag(Tag::Compression)? {
        Some(v) => v.into_u32()?,
        None => 1,
    };
    // 2 = inch, 3 = centimeter; anything else carries no physical unit
    let unit = match decoder.find_tag(Tag::ResolutionUnit)? {
        Some(v) => v.into_u32()?,
        None => 2,
    };
    let scale = match unit {
        2 => Some(1.0),
        3 => Some(2.54),
        _ => None,
    };
    let x = decoder.find_tag(Tag::XResolution)?.and_then(rational);
    let y = decoder.find_tag(Tag::YResolution)?.and_then(rational);
    let dpi = match (scale, x, y) {
        (Some(s), Some(x), Some(y)) => Some(((x * s).round() as u32, (y * s).round() as u32)),
        _ => None,
    };
    Ok((compression, dpi))
}

pub fn image_info(path: &Path) -> Result<ImageInfo> {
    let file = BufReader::new(File::open(path)?);
    let tiff_err = |source: tiff::TiffError| CorpusError::Tiff { path: path.to_path_buf(), source };
    let mut decoder = Decoder::new(file).map_err(tiff_err)?;
    let (code, dpi) = read_tags(&mut decoder).map_err(tiff_err)?;
    Ok(ImageInfo { path: path.to_path_buf(), compression: compression_name(code), dpi })
}

pub fn summarize(infos: &[ImageInfo]) -> ImageSummary {
    let mut summary = ImageSummary::default();
    for info in infos {
        *summary.compression.entry(info.compression.clone()).or_insert(0) += 1;
        let dpi = match info.dpi {
            Some((x, y)) => format!("{x}x{y}"),
            None => "unknown".to_string(),
        };
        *summary.dpi.entry(dpi).or_insert(0) += 1;
    }
    summary
}

/// Read metadata of every image on `pool`; unreadable images become failures.
pub fn collect_image_info(images: &[PathBuf], pool: &TaskPool) -> TaskReport<ImageInfo> {
    let report = pool.map(images, image_info);
    report.log_failures("image_info");
    report
}
