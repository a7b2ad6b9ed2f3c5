//! Reading and writing single arrays in the NumPy `.npy` format.

use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt, LE};

use crate::error::{Error, Result};

const MAGIC: [u8; 6] = *b"\x93NUMPY";

/// Total preamble length is padded to a multiple of this.
const ALIGNMENT: usize = 64;

/// The only element type stored and loaded: little endian `f32`.
///
/// Other dtypes are rejected instead of converted, so that a loaded archive
/// keeps the exact precision it was written with.
pub const DESCR_F32: &str = "<f4";

const F32_SIZE: usize = 4;

/// Longest header dictionary accepted when reading.
const MAX_HEADER_LEN: usize = 1 << 16;

/// The header preceding the data of a `.npy` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// NumPy type string, such as `<f4`.
    pub descr: String,

    /// Only C order arrays are supported.
    pub fortran_order: bool,

    pub shape: Vec<usize>,
}

impl Header {
    /// Number of elements, or `None` if the shape overflows `usize`.
    pub fn element_count(&self) -> Option<usize> {
        self.shape.iter().try_fold(1usize, |n, &d| n.checked_mul(d))
    }

    fn dict(&self) -> String {
        let shape = match self.shape.as_slice() {
            [single] => format!("({single},)"),
            dims => format!(
                "({})",
                dims.iter()
                    .map(usize::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };

        format!(
            "{{'descr': '{}', 'fortran_order': {}, 'shape': {}, }}",
            self.descr,
            if self.fortran_order { "True" } else { "False" },
            shape
        )
    }

    /// Serialize the magic string, version, and padded header dictionary.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut dict = self.dict();

        // magic + version + u16 length
        let preamble = MAGIC.len() + 2 + 2;
        let unpadded = preamble + dict.len() + 1;
        let padding = (ALIGNMENT - unpadded % ALIGNMENT) % ALIGNMENT;
        dict.extend(std::iter::repeat(' ').take(padding));
        dict.push('\n');

        let mut buf = Vec::with_capacity(preamble + dict.len());
        buf.extend_from_slice(&MAGIC);
        buf.extend_from_slice(&[1, 0]);
        buf.extend_from_slice(&(dict.len() as u16).to_le_bytes());
        buf.extend_from_slice(dict.as_bytes());

        buf
    }

    pub fn read_from<T: Read + ReadBytesExt>(input: &mut T) -> Result<Self> {
        let mut magic = [0u8; 6];
        input.read_exact(&mut magic)?;

        if magic != MAGIC {
            return Err(Error::ArchiveCorrupt("missing .npy magic string".into()));
        }

        let major = input.read_u8()?;
        let _minor = input.read_u8()?;
        let length = match major {
            1 => input.read_u16::<LE>()? as usize,
            2 | 3 => input.read_u32::<LE>()? as usize,
            v => {
                return Err(Error::ArchiveCorrupt(format!(
                    "unsupported .npy version {v}"
                )))
            }
        };

        if length > MAX_HEADER_LEN {
            return Err(Error::ArchiveCorrupt(format!(
                "header length {length} is too large"
            )));
        }

        let mut dict = Vec::new();
        input.by_ref().take(length as u64).read_to_end(&mut dict)?;
        if dict.len() != length {
            return Err(Error::ArchiveCorrupt(format!(
                "header is shorter than {length} bytes"
            )));
        }

        let dict = String::from_utf8(dict)
            .map_err(|_| Error::ArchiveCorrupt("header is not valid text".into()))?;

        Self::parse_dict(&dict)
    }

    fn parse_dict(dict: &str) -> Result<Self> {
        let descr = dict_value(dict, "descr")?;
        let descr = descr
            .split(['\'', '"'])
            .nth(1)
            .ok_or_else(|| Error::ArchiveCorrupt(format!("bad descr {descr:?}")))?;

        let fortran_order = match dict_value(dict, "fortran_order")? {
            v if v.starts_with("True") => true,
            v if v.starts_with("False") => false,
            v => return Err(Error::ArchiveCorrupt(format!("bad fortran_order {v:?}"))),
        };

        let shape = dict_value(dict, "shape")?;
        let shape = shape
            .strip_prefix('(')
            .and_then(|s| s.split(')').next())
            .ok_or_else(|| Error::ArchiveCorrupt(format!("bad shape {shape:?}")))?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<usize>()
                    .map_err(|_| Error::ArchiveCorrupt(format!("bad dimension {s:?}")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Header {
            descr: descr.to_string(),
            fortran_order,
            shape,
        })
    }
}

/// The text following `'key':` in a header dictionary.
fn dict_value<'a>(dict: &'a str, key: &str) -> Result<&'a str> {
    let pattern = format!("'{key}'");
    let start = dict
        .find(&pattern)
        .ok_or_else(|| Error::ArchiveCorrupt(format!("header has no {key:?} entry")))?;

    let rest = dict[start + pattern.len()..].trim_start();
    rest.strip_prefix(':')
        .map(str::trim_start)
        .ok_or_else(|| Error::ArchiveCorrupt(format!("malformed {key:?} entry")))
}

/// A C order array of floats.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// Write `data` as a little endian `f32` array of the given shape.
pub fn write_f32<O: Write + WriteBytesExt>(
    output: &mut O,
    shape: &[usize],
    data: &[f32],
) -> Result<()> {
    debug_assert_eq!(shape.iter().product::<usize>(), data.len());

    let header = Header {
        descr: DESCR_F32.to_string(),
        fortran_order: false,
        shape: shape.to_vec(),
    };
    output.write_all(&header.to_bytes())?;

    for &value in data {
        output.write_f32::<LE>(value)?;
    }

    Ok(())
}

/// Read a whole little endian `f32` array.
///
/// The data is read incrementally, so a header claiming more elements than
/// the input holds fails without allocating for the claimed size.
pub fn read_f32<I: Read + ReadBytesExt>(input: &mut I) -> Result<Array> {
    let header = Header::read_from(input)?;

    if header.descr != DESCR_F32 {
        return Err(Error::ArchiveCorrupt(format!(
            "unsupported dtype {:?}, expected {DESCR_F32:?}",
            header.descr
        )));
    }

    if header.fortran_order {
        return Err(Error::ArchiveCorrupt(
            "fortran order arrays are not supported".into(),
        ));
    }

    let (count, length) = header
        .element_count()
        .and_then(|count| Some((count, count.checked_mul(F32_SIZE)?)))
        .ok_or_else(|| {
            Error::ArchiveCorrupt(format!("shape {:?} is too large", header.shape))
        })?;

    let mut raw = Vec::new();
    input.by_ref().take(length as u64).read_to_end(&mut raw)?;
    if raw.len() != length {
        return Err(Error::ArchiveCorrupt(format!(
            "array data is shorter than {count} elements"
        )));
    }

    let mut bytes = raw.as_slice();
    let mut data = Vec::with_capacity(count);
    for _ in 0..count {
        data.push(bytes.read_f32::<LE>()?);
    }

    Ok(Array {
        shape: header.shape,
        data,
    })
}
