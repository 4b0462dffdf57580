//! XISF reading and writing.
//!
//! This crate has no goal of being a general XISF library — only the
//! monolithic, single-image, `FITSKeyword`-carrying subset that calibration
//! pipelines actually produce and consume. The header is small, known-shape
//! XML, so it's scanned with a couple of tiny attribute-extraction helpers
//! rather than pulling in a full XML parser.

use flatcal_grid::{ImageData, Keywords};

use crate::error::{Error, Result};

const SIGNATURE: &[u8; 8] = b"XISF0100";
const PREAMBLE_LEN: usize = 16;
const HEADER_ALIGN: usize = 4096;

pub fn read_headers(path: &std::path::Path) -> Result<Keywords> {
    let bytes = std::fs::read(path)?;
    let (keywords, _image_elem) = parse(&bytes)?;
    Ok(keywords)
}

pub fn read(path: &std::path::Path) -> Result<ImageData> {
    let bytes = std::fs::read(path)?;
    let (keywords, image_elem) = parse(&bytes)?;

    let data_start = image_elem.location_offset;
    let data_len = image_elem.location_length;
    let data = bytes
        .get(data_start..data_start + data_len)
        .ok_or(Error::TruncatedHeader)?;

    let pixel_count = image_elem.width * image_elem.height * image_elem.channels;
    let pixels = decode_pixels(data, image_elem.sample_format, pixel_count)?;
    Ok(ImageData::new(
        image_elem.width,
        image_elem.height,
        image_elem.channels,
        pixels,
        keywords,
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleFormat {
    UInt8,
    UInt16,
    UInt32,
    Float32,
    Float64,
}

impl SampleFormat {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "uint8" => Some(Self::UInt8),
            "uint16" => Some(Self::UInt16),
            "uint32" => Some(Self::UInt32),
            "float32" => Some(Self::Float32),
            "float64" => Some(Self::Float64),
            _ => None,
        }
    }
}

struct ImageElement {
    width: usize,
    height: usize,
    channels: usize,
    sample_format: SampleFormat,
    location_offset: usize,
    location_length: usize,
}

fn parse(bytes: &[u8]) -> Result<(Keywords, ImageElement)> {
    if bytes.len() < PREAMBLE_LEN || &bytes[0..8] != SIGNATURE {
        return Err(Error::TruncatedHeader);
    }
    let header_len = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;
    let xml_bytes = bytes
        .get(PREAMBLE_LEN..PREAMBLE_LEN + header_len)
        .ok_or(Error::TruncatedHeader)?;
    let xml = std::str::from_utf8(xml_bytes)
        .map_err(|e| Error::MalformedHeader(format!("header is not valid UTF-8: {e}")))?;

    let mut keywords = Keywords::new();
    for tag in iter_tags(xml, "FITSKeyword") {
        let Some(name) = attr(tag, "name") else {
            tracing::warn!("skipping FITSKeyword element with no name attribute");
            continue;
        };
        let value = attr(tag, "value").unwrap_or_default();
        keywords.set(name, strip_fits_quotes(&value));
    }

    let image_tag = iter_tags(xml, "Image")
        .next()
        .ok_or_else(|| Error::MalformedHeader("no Image element found".to_string()))?;

    let geometry = attr(image_tag, "geometry")
        .ok_or_else(|| Error::MalformedHeader("Image element missing geometry".to_string()))?;
    let (width, height, channels) = parse_geometry(&geometry)?;

    let sample_format_str = attr(image_tag, "sampleFormat")
        .ok_or_else(|| Error::MalformedHeader("Image element missing sampleFormat".to_string()))?;
    let sample_format = SampleFormat::parse(&sample_format_str)
        .ok_or_else(|| Error::UnsupportedFormat(sample_format_str.clone()))?;

    let location = attr(image_tag, "location")
        .ok_or_else(|| Error::MalformedHeader("Image element missing location".to_string()))?;
    let (location_offset, location_length) = parse_attachment_location(&location)?;

    Ok((
        keywords,
        ImageElement {
            width,
            height,
            channels,
            sample_format,
            location_offset,
            location_length,
        },
    ))
}

fn parse_geometry(geometry: &str) -> Result<(usize, usize, usize)> {
    let parts: Vec<&str> = geometry.split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(Error::BadGeometry(format!("unparseable geometry {geometry:?}")));
    }
    let width = parts[0]
        .parse()
        .map_err(|_| Error::BadGeometry(format!("bad width in {geometry:?}")))?;
    let height = parts[1]
        .parse()
        .map_err(|_| Error::BadGeometry(format!("bad height in {geometry:?}")))?;
    let channels = match parts.get(2) {
        Some(c) => c
            .parse()
            .map_err(|_| Error::BadGeometry(format!("bad channel count in {geometry:?}")))?,
        None => 1,
    };
    Ok((width, height, channels))
}

fn parse_attachment_location(location: &str) -> Result<(usize, usize)> {
    let mut parts = location.split(':');
    let kind = parts.next().unwrap_or_default();
    if kind != "attachment" {
        return Err(Error::UnsupportedFormat(format!(
            "non-attachment image location: {location:?}"
        )));
    }
    let offset: usize = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::MalformedHeader(format!("bad attachment offset in {location:?}")))?;
    let length: usize = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::MalformedHeader(format!("bad attachment length in {location:?}")))?;
    Ok((offset, length))
}

fn decode_pixels(data: &[u8], format: SampleFormat, count: usize) -> Result<Vec<f64>> {
    let mut out = Vec::with_capacity(count);
    match format {
        SampleFormat::UInt8 => {
            for &b in data.get(..count).ok_or(Error::TruncatedHeader)? {
                out.push(b as f64 / u8::MAX as f64);
            }
        }
        SampleFormat::UInt16 => {
            for chunk in data.get(..count * 2).ok_or(Error::TruncatedHeader)?.chunks_exact(2) {
                let raw = u16::from_le_bytes([chunk[0], chunk[1]]);
                out.push(raw as f64 / u16::MAX as f64);
            }
        }
        SampleFormat::UInt32 => {
            for chunk in data.get(..count * 4).ok_or(Error::TruncatedHeader)?.chunks_exact(4) {
                let raw = u32::from_le_bytes(chunk.try_into().unwrap());
                out.push(raw as f64 / u32::MAX as f64);
            }
        }
        SampleFormat::Float32 => {
            for chunk in data.get(..count * 4).ok_or(Error::TruncatedHeader)?.chunks_exact(4) {
                out.push(f32::from_le_bytes(chunk.try_into().unwrap()) as f64);
            }
        }
        SampleFormat::Float64 => {
            for chunk in data.get(..count * 8).ok_or(Error::TruncatedHeader)?.chunks_exact(8) {
                out.push(f64::from_le_bytes(chunk.try_into().unwrap()));
            }
        }
    }
    Ok(out)
}

/// Writes a monolithic XISF file with a single attached Float32 image.
pub fn write(path: &std::path::Path, image: &ImageData) -> Result<()> {
    let pixel_count = image.pixels().len();
    let data_len = pixel_count * 4;

    let build_xml = |offset: usize| -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str("<xisf version=\"1.0\" xmlns=\"http://www.pixinsight.com/xisf\">\n");
        xml.push_str(&format!(
            "  <Image geometry=\"{}:{}:{}\" sampleFormat=\"Float32\" colorSpace=\"Gray\" location=\"attachment:{}:{}\">\n",
            image.width(),
            image.height(),
            image.channels(),
            offset,
            data_len,
        ));
        for (key, value) in image.keywords().iter() {
            xml.push_str(&format!(
                "    <FITSKeyword name=\"{}\" value=\"{}\" comment=\"\"/>\n",
                escape_xml(key),
                escape_xml(value)
            ));
        }
        xml.push_str("  </Image>\n");
        xml.push_str("</xisf>\n");
        xml
    };

    let xml_pass1 = build_xml(0);
    let padded1 = round_up(xml_pass1.len(), HEADER_ALIGN);
    let offset1 = PREAMBLE_LEN + padded1;

    let xml_pass2 = build_xml(offset1);
    let padded2 = round_up(xml_pass2.len(), HEADER_ALIGN);

    let (final_xml, final_padded) = if padded2 != padded1 {
        let offset2 = PREAMBLE_LEN + padded2;
        let xml_pass3 = build_xml(offset2);
        let padded3 = round_up(xml_pass3.len(), HEADER_ALIGN);
        (xml_pass3, padded3)
    } else {
        (xml_pass2, padded2)
    };

    let mut out = Vec::with_capacity(PREAMBLE_LEN + final_padded + data_len);
    out.extend_from_slice(SIGNATURE);
    out.extend_from_slice(&(final_padded as u32).to_le_bytes());
    out.extend_from_slice(&[0u8; 4]);
    out.extend_from_slice(final_xml.as_bytes());
    out.resize(PREAMBLE_LEN + final_padded, 0x20);

    for &p in image.pixels() {
        out.extend_from_slice(&(p as f32).to_le_bytes());
    }

    std::fs::write(path, out)?;
    Ok(())
}

fn round_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

/// Finds every self-closing or opening occurrence of `<tag ...>` at the top
/// level of `xml` and returns the full tag text (including the angle
/// brackets), for cheap attribute extraction.
fn iter_tags<'a>(xml: &'a str, tag: &str) -> impl Iterator<Item = &'a str> {
    let needle = format!("<{tag}");
    let mut rest = xml;
    std::iter::from_fn(move || loop {
        let rel_start = rest.find(&needle)?;
        let after = rel_start + needle.len();
        let next_char = rest[after..].chars().next();
        let is_boundary = matches!(next_char, Some(c) if c.is_whitespace() || c == '>' || c == '/');
        let rel_end = rest[after..].find('>').map(|i| after + i + 1)?;
        let tag_text = &rest[rel_start..rel_end];
        rest = &rest[rel_end..];
        if is_boundary {
            return Some(tag_text);
        }
    })
}

fn attr(tag_text: &str, name: &str) -> Option<String> {
    let needle = format!("{name}=\"");
    let start = tag_text.find(&needle)? + needle.len();
    let end = tag_text[start..].find('"')? + start;
    Some(unescape_xml(&tag_text[start..end]))
}

fn strip_fits_quotes(value: &str) -> String {
    let trimmed = value.trim();
    if let Some(stripped) = trimmed.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        stripped.trim().to_string()
    } else {
        trimmed.to_string()
    }
}

fn escape_xml(s: &str) -> String {
    s.chars().fold(String::with_capacity(s.len()), |mut acc, c| {
        match c {
            '&' => acc.push_str("&amp;"),
            '<' => acc.push_str("&lt;"),
            '>' => acc.push_str("&gt;"),
            '\'' => acc.push_str("&apos;"),
            '"' => acc.push_str("&quot;"),
            _ => acc.push(c),
        }
        acc
    })
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&apos;", "'")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use flatcal_grid::Keywords;

    #[test]
    fn round_trips_float_plane_with_keywords() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.xisf");
        let mut kw = Keywords::new();
        kw.set("EXPTIME", "1.500");
        kw.set("FILTER", "Ha");
        let image = ImageData::new(3, 2, 1, vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6], kw);
        write(&path, &image).unwrap();
        let back = read(&path).unwrap();
        assert_eq!(back.width(), 3);
        assert_eq!(back.height(), 2);
        assert_eq!(back.keywords().get("FILTER"), Some("Ha"));
        for (a, b) in image.pixels().iter().zip(back.pixels()) {
            assert!((*a as f32 - *b as f32).abs() < 1e-6);
        }
    }

    #[test]
    fn header_grows_past_one_alignment_block() {
        // Enough keywords that the XML header must round up past one 4096
        // byte block, exercising the offset-dependent-length rebuild path.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.xisf");
        let mut kw = Keywords::new();
        for i in 0..400 {
            kw.set(format!("HISTORY{i}"), "x".repeat(20));
        }
        let image = ImageData::new(2, 2, 1, vec![0.0; 4], kw);
        write(&path, &image).unwrap();
        let back = read(&path).unwrap();
        assert_eq!(back.keywords().get("HISTORY399"), Some("xxxxxxxxxxxxxxxxxxxx"));
    }

    #[test]
    fn strips_single_quotes_from_keyword_value() {
        assert_eq!(strip_fits_quotes("'Ha filter '"), "Ha filter");
        assert_eq!(strip_fits_quotes("1.5"), "1.5");
    }

    #[test]
    fn truncated_signature_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.xisf");
        std::fs::write(&path, b"short").unwrap();
        assert!(matches!(read_headers(&path), Err(Error::TruncatedHeader)));
    }

    #[test]
    fn unsupported_sample_format_is_rejected() {
        let xml = "<?xml version=\"1.0\"?><xisf><Image geometry=\"1:1:1\" sampleFormat=\"complex64\" location=\"attachment:100:4\"/></xisf>";
        let mut bytes = Vec::new();
        bytes.extend_from_slice(SIGNATURE);
        bytes.extend_from_slice(&(xml.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&[0u8; 4]);
        bytes.extend_from_slice(xml.as_bytes());
        bytes.extend_from_slice(&[0u8; 4]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unsupported.xisf");
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(read(&path), Err(Error::UnsupportedFormat(_))));
    }
}
