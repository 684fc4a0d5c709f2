//! `.DAT` sample file decoder.
//!
//! Binary layouts are little-endian records of
//! `u32 sample, u32 timestamp, analog[..], status words[..]` where analog
//! values are `i16` (BINARY), `i32` (BINARY32) or `f32` (FLOAT32) and status
//! bits are packed sixteen to a `u16` word.

use byteorder::{ByteOrder, LittleEndian};
use tracing::warn;

use super::cfg::{ComtradeConfig, DataFormat};
use super::error::ComtradeError;

const MISSING_I16: i16 = i16::MIN;
const MISSING_I32: i32 = i32::MIN;
const MISSING_TIMESTAMP: u32 = u32::MAX;

/// Decoded sample columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    pub sample_numbers: Vec<u32>,
    /// Raw timestamps in `timemult` ticks, `None` when absent
    pub timestamps: Vec<Option<f64>>,
    /// Scaled analog values per channel (`a * x + b`), NaN when missing
    pub analog: Vec<Vec<f64>>,
    /// Status values per channel (0 or 1)
    pub status: Vec<Vec<u8>>,
}

impl DataTable {
    fn with_channels(analog: usize, status: usize, capacity: usize) -> Self {
        Self {
            sample_numbers: Vec::with_capacity(capacity),
            timestamps: Vec::with_capacity(capacity),
            analog: (0..analog).map(|_| Vec::with_capacity(capacity)).collect(),
            status: (0..status).map(|_| Vec::with_capacity(capacity)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.sample_numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sample_numbers.is_empty()
    }
}

/// Decode a `.DAT` payload according to its configuration
pub fn decode(cfg: &ComtradeConfig, bytes: &[u8]) -> Result<DataTable, ComtradeError> {
    let table = match cfg.data_format {
        DataFormat::Ascii => decode_ascii(cfg, bytes)?,
        format => decode_binary(cfg, format, bytes)?,
    };
    if table.is_empty() {
        return Err(ComtradeError::EmptyData);
    }
    Ok(table)
}

fn analog_width(format: DataFormat) -> usize {
    match format {
        DataFormat::Binary => 2,
        DataFormat::Binary32 | DataFormat::Float32 => 4,
        DataFormat::Ascii => 0,
    }
}

/// Bytes per binary record
pub fn record_size(cfg: &ComtradeConfig, format: DataFormat) -> usize {
    8 + cfg.analog_count() * analog_width(format) + cfg.status_count().div_ceil(16) * 2
}

fn decode_binary(
    cfg: &ComtradeConfig,
    format: DataFormat,
    bytes: &[u8],
) -> Result<DataTable, ComtradeError> {
    let size = record_size(cfg, format);
    let available = bytes.len() / size;
    if bytes.len() % size != 0 {
        warn!(
            trailing_bytes = bytes.len() % size,
            record_size = size,
            "DAT file ends with a partial record"
        );
    }
    let count = limit_samples(cfg, available);
    let width = analog_width(format);
    let mut table = DataTable::with_channels(cfg.analog_count(), cfg.status_count(), count);

    for record in bytes.chunks_exact(size).take(count) {
        table.sample_numbers.push(LittleEndian::read_u32(&record[0..4]));
        let ts = LittleEndian::read_u32(&record[4..8]);
        table
            .timestamps
            .push((ts != MISSING_TIMESTAMP).then_some(ts as f64));

        let analog = &record[8..8 + width * cfg.analog_count()];
        for ((column, channel), raw) in table
            .analog
            .iter_mut()
            .zip(&cfg.analog_channels)
            .zip(analog.chunks_exact(width))
        {
            let value = match format {
                DataFormat::Binary => match LittleEndian::read_i16(raw) {
                    MISSING_I16 => f64::NAN,
                    v => v as f64,
                },
                DataFormat::Binary32 => match LittleEndian::read_i32(raw) {
                    MISSING_I32 => f64::NAN,
                    v => v as f64,
                },
                _ => LittleEndian::read_f32(raw) as f64,
            };
            column.push(channel.multiplier * value + channel.offset);
        }

        let status = &record[8 + width * cfg.analog_count()..];
        for (k, column) in table.status.iter_mut().enumerate() {
            let word = LittleEndian::read_u16(&status[(k / 16) * 2..(k / 16) * 2 + 2]);
            column.push(((word >> (k % 16)) & 1) as u8);
        }
    }
    Ok(table)
}

fn decode_ascii(cfg: &ComtradeConfig, bytes: &[u8]) -> Result<DataTable, ComtradeError> {
    let text = String::from_utf8_lossy(bytes);
    let rows: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let count = limit_samples(cfg, rows.len());
    let expected = 2 + cfg.analog_count() + cfg.status_count();
    let mut table = DataTable::with_channels(cfg.analog_count(), cfg.status_count(), count);

    for (i, row) in rows.iter().take(count).enumerate() {
        let row_no = i + 1;
        let fields: Vec<&str> = row.split(',').map(str::trim).collect();
        if fields.len() < expected {
            return Err(ComtradeError::dat(
                row_no,
                format!("expected {expected} fields, found {}", fields.len()),
            ));
        }
        table.sample_numbers.push(
            fields[0]
                .parse()
                .map_err(|_| ComtradeError::dat(row_no, format!("invalid sample number '{}'", fields[0])))?,
        );
        table.timestamps.push(match fields[1] {
            "" => None,
            ts => Some(
                ts.parse()
                    .map_err(|_| ComtradeError::dat(row_no, format!("invalid timestamp '{ts}'")))?,
            ),
        });

        for ((column, channel), raw) in table
            .analog
            .iter_mut()
            .zip(&cfg.analog_channels)
            .zip(&fields[2..2 + cfg.analog_count()])
        {
            let value = match *raw {
                "" => f64::NAN,
                v => v.parse::<f64>().map_err(|_| {
                    ComtradeError::dat(row_no, format!("invalid value '{v}' for channel {}", channel.id))
                })?,
            };
            column.push(channel.multiplier * value + channel.offset);
        }

        let status = &fields[2 + cfg.analog_count()..expected];
        for ((column, channel), raw) in table.status.iter_mut().zip(&cfg.status_channels).zip(status) {
            let value: u8 = match *raw {
                "" => 0,
                v => v.parse().map_err(|_| {
                    ComtradeError::dat(row_no, format!("invalid status '{v}' for channel {}", channel.id))
                })?,
            };
            column.push(value.min(1));
        }
    }
    Ok(table)
}

/// Cap the number of decoded samples at the count the CFG announces
fn limit_samples(cfg: &ComtradeConfig, available: usize) -> usize {
    match cfg.declared_samples() {
        Some(declared) if declared < available => declared,
        Some(declared) => {
            if declared > available {
                warn!(declared, available, "DAT file holds fewer samples than declared");
            }
            available
        }
        None => available,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comtrade::cfg;
    use byteorder::WriteBytesExt;

    fn config(format: &str, samples: u64) -> ComtradeConfig {
        let text = format!(
            "\
S,D,1999
19,2A,17D
1,IA,A,,A,0.5,1,0,-32767,32767,1,1,S
2,IB,B,,A,2,0,0,-32767,32767,1,1,S
{status}50
1
1000,{samples}
01/01/2024,00:00:00.000000
01/01/2024,00:00:00.000000
{format}
1
",
            status = (1..=17)
                .map(|i| format!("{i},D{i},,,0\n"))
                .collect::<String>(),
        );
        cfg::parse(&text).unwrap()
    }

    fn binary_record(n: u32, ts: u32, analog: [i16; 2], words: [u16; 2]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(n).unwrap();
        buf.write_u32::<LittleEndian>(ts).unwrap();
        for v in analog {
            buf.write_i16::<LittleEndian>(v).unwrap();
        }
        for w in words {
            buf.write_u16::<LittleEndian>(w).unwrap();
        }
        buf
    }

    #[test]
    fn test_record_size() {
        let cfg = config("BINARY", 2);
        assert_eq!(record_size(&cfg, DataFormat::Binary), 8 + 4 + 4);
        assert_eq!(record_size(&cfg, DataFormat::Binary32), 8 + 8 + 4);
    }

    #[test]
    fn test_decode_binary_scales_and_unpacks_bits() {
        let cfg = config("BINARY", 2);
        let mut bytes = binary_record(1, 0, [10, -4], [0b101, 0b1]);
        bytes.extend(binary_record(2, 1000, [MISSING_I16, 3], [0, 0]));

        let table = decode(&cfg, &bytes).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.sample_numbers, vec![1, 2]);
        assert_eq!(table.timestamps, vec![Some(0.0), Some(1000.0)]);
        assert!((table.analog[0][0] - 6.0).abs() < 1e-12);
        assert!(table.analog[0][1].is_nan());
        assert!((table.analog[1][0] + 8.0).abs() < 1e-12);
        assert!((table.analog[1][1] - 6.0).abs() < 1e-12);
        assert_eq!(table.status[0], vec![1, 0]);
        assert_eq!(table.status[1], vec![0, 0]);
        assert_eq!(table.status[2], vec![1, 0]);
        assert_eq!(table.status[16], vec![1, 0]);
    }

    #[test]
    fn test_decode_binary32() {
        let cfg = config("BINARY32", 2);
        let mut bytes = Vec::new();
        for (n, ts, analog, word) in [
            (1u32, 0u32, [100_000i32, -3], 0b10u16),
            (2, MISSING_TIMESTAMP, [-7, MISSING_I32], 0),
        ] {
            bytes.write_u32::<LittleEndian>(n).unwrap();
            bytes.write_u32::<LittleEndian>(ts).unwrap();
            for v in analog {
                bytes.write_i32::<LittleEndian>(v).unwrap();
            }
            bytes.write_u16::<LittleEndian>(word).unwrap();
            bytes.write_u16::<LittleEndian>(0).unwrap();
        }
        assert_eq!(bytes.len(), 2 * record_size(&cfg, DataFormat::Binary32));

        let table = decode(&cfg, &bytes).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.timestamps, vec![Some(0.0), None]);
        // IA: 0.5 * x + 1, IB: 2 * x
        assert!((table.analog[0][0] - 50_001.0).abs() < 1e-9);
        assert!((table.analog[0][1] + 2.5).abs() < 1e-9);
        assert!((table.analog[1][0] + 6.0).abs() < 1e-9);
        assert!(table.analog[1][1].is_nan());
        assert_eq!(table.status[0], vec![0, 0]);
        assert_eq!(table.status[1], vec![1, 0]);
    }

    #[test]
    fn test_decode_float32() {
        let cfg = config("FLOAT32", 1);
        let mut bytes = Vec::new();
        bytes.write_u32::<LittleEndian>(1).unwrap();
        bytes.write_u32::<LittleEndian>(0).unwrap();
        bytes.write_f32::<LittleEndian>(2.5).unwrap();
        bytes.write_f32::<LittleEndian>(-1.0).unwrap();
        bytes.write_u16::<LittleEndian>(0).unwrap();
        bytes.write_u16::<LittleEndian>(0).unwrap();

        let table = decode(&cfg, &bytes).unwrap();
        assert!((table.analog[0][0] - 2.25).abs() < 1e-9);
        assert!((table.analog[1][0] + 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_decode_stops_at_declared_samples() {
        let cfg = config("BINARY", 1);
        let mut bytes = binary_record(1, 0, [0, 0], [0, 0]);
        bytes.extend(binary_record(2, 1000, [0, 0], [0, 0]));
        assert_eq!(decode(&cfg, &bytes).unwrap().len(), 1);
    }

    #[test]
    fn test_decode_ascii() {
        let cfg = config("ASCII", 2);
        let zeros = vec!["0"; 16].join(",");
        let text = format!("1,0,10,-4,1,{zeros}\r\n2,,,3,0,{zeros}\r\n");
        let table = decode(&cfg, text.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.timestamps, vec![Some(0.0), None]);
        assert!((table.analog[0][0] - 6.0).abs() < 1e-12);
        assert!(table.analog[0][1].is_nan());
        assert_eq!(table.status[0], vec![1, 0]);
    }

    #[test]
    fn test_decode_ascii_short_row() {
        let cfg = config("ASCII", 1);
        let err = decode(&cfg, b"1,0,10\n").unwrap_err();
        assert!(matches!(err, ComtradeError::Dat { row: 1, .. }), "{err}");
    }

    #[test]
    fn test_decode_empty_payload() {
        let cfg = config("BINARY", 0);
        assert!(matches!(decode(&cfg, &[]), Err(ComtradeError::EmptyData)));
    }
}
