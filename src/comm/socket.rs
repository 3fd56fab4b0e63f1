// Socket framing for the engine protocol
// Author: Gabriel Demetrios Lafis

use std::io::{BufReader, Read, Write};
use std::net::TcpStream;

use log::{debug, info};

use super::{CommError, Issues, FOUND, GETML_SEP, PROGRESS_TARGET, SUCCESS};

/// Prefix of log lines streamed by the engine during long-running commands
pub const LOG_PREFIX: &str = "log: ";

/// Write a string as a big-endian i32 length followed by its UTF-8 bytes
pub fn write_string<W: Write>(writer: &mut W, string: &str) -> Result<(), CommError> {
    let encoded = string.as_bytes();
    let size = i32::try_from(encoded.len())
        .map_err(|_| CommError::Protocol(format!("String of {} bytes is too long", encoded.len())))?;

    writer.write_all(&size.to_be_bytes())?;
    writer.write_all(encoded)?;
    writer.flush()?;

    Ok(())
}

/// Read a string framed by a big-endian i32 length
pub fn read_string<R: Read>(reader: &mut R) -> Result<String, CommError> {
    let mut size = [0u8; 4];
    reader.read_exact(&mut size)?;

    let size = i32::from_be_bytes(size);

    if size < 0 {
        return Err(CommError::Protocol(format!("Negative string length: {}", size)));
    }

    let data = read_bytes(reader, size as u64)?;

    Ok(String::from_utf8_lossy(&data).into_owned())
}

/// Read raw bytes framed by a big-endian u64 length
pub fn read_bytestring<R: Read>(reader: &mut R) -> Result<Vec<u8>, CommError> {
    let mut size = [0u8; 8];
    reader.read_exact(&mut size)?;

    read_bytes(reader, u64::from_be_bytes(size))
}

/// Read a string column, i.e. a bytestring whose elements are separated by `$GETML_SEP`
pub fn read_string_column<R: Read>(reader: &mut R) -> Result<Vec<String>, CommError> {
    let data = read_bytestring(reader)?;

    if data.is_empty() {
        return Ok(Vec::new());
    }

    Ok(String::from_utf8_lossy(&data)
        .split(GETML_SEP)
        .map(|s| s.to_string())
        .collect())
}

/// Read a float matrix: two big-endian i32 for the shape, then big-endian f64 values row by row
pub fn read_float_matrix<R: Read>(reader: &mut R) -> Result<FloatMatrix, CommError> {
    let mut shape = [0u8; 8];
    reader.read_exact(&mut shape)?;

    let nrows = i32::from_be_bytes([shape[0], shape[1], shape[2], shape[3]]);
    let ncols = i32::from_be_bytes([shape[4], shape[5], shape[6], shape[7]]);

    if nrows < 0 || ncols < 0 {
        return Err(CommError::Protocol(format!(
            "Invalid matrix shape: ({}, {})",
            nrows, ncols
        )));
    }

    let (nrows, ncols) = (nrows as usize, ncols as usize);
    let size = nrows
        .checked_mul(ncols)
        .and_then(|n| n.checked_mul(8))
        .ok_or_else(|| CommError::Protocol(format!("Matrix shape ({}, {}) is too large", nrows, ncols)))?;
    let raw = read_bytes(reader, size as u64)?;

    let data = raw
        .chunks_exact(8)
        .map(|chunk| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            f64::from_be_bytes(bytes)
        })
        .collect();

    Ok(FloatMatrix { nrows, ncols, data })
}

fn read_bytes<R: Read>(reader: &mut R, size: u64) -> Result<Vec<u8>, CommError> {
    let mut data = Vec::new();
    let received = reader.take(size).read_to_end(&mut data)?;

    if (received as u64) < size {
        return Err(CommError::Protocol(format!(
            "The engine closed the connection after {} of {} bytes",
            received, size
        )));
    }

    Ok(data)
}

/// Dense row-major matrix of floats returned by transform and aggregation commands
#[derive(Debug, Clone, PartialEq)]
pub struct FloatMatrix {
    pub nrows: usize,
    pub ncols: usize,
    pub data: Vec<f64>,
}

impl FloatMatrix {
    /// Get a row of the matrix
    pub fn row(&self, i: usize) -> Option<&[f64]> {
        if i >= self.nrows {
            return None;
        }
        Some(&self.data[i * self.ncols..(i + 1) * self.ncols])
    }

    /// Get a column of the matrix
    pub fn column(&self, j: usize) -> Option<Vec<f64>> {
        if j >= self.ncols {
            return None;
        }
        Some((0..self.nrows).map(|i| self.data[i * self.ncols + j]).collect())
    }

    /// Get the shape as (nrows, ncols)
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// Check whether the matrix holds no values
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Connection to the engine carrying exactly one request
///
/// The underlying socket is closed when the value is dropped.
pub struct EngineSocket {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl EngineSocket {
    /// Wrap an established connection
    pub fn new(stream: TcpStream) -> Result<Self, CommError> {
        let writer = stream.try_clone()?;

        Ok(EngineSocket {
            reader: BufReader::new(stream),
            writer,
        })
    }

    /// Send a string
    pub fn send_string(&mut self, string: &str) -> Result<(), CommError> {
        write_string(&mut self.writer, string)
    }

    /// Send a JSON command
    pub fn send_json(&mut self, cmd: &serde_json::Value) -> Result<(), CommError> {
        self.send_string(&serde_json::to_string(cmd)?)
    }

    /// Receive a string
    pub fn recv_string(&mut self) -> Result<String, CommError> {
        read_string(&mut self.reader)
    }

    /// Receive raw bytes
    pub fn recv_bytestring(&mut self) -> Result<Vec<u8>, CommError> {
        read_bytestring(&mut self.reader)
    }

    /// Receive a string column
    pub fn recv_string_column(&mut self) -> Result<Vec<String>, CommError> {
        read_string_column(&mut self.reader)
    }

    /// Receive a float matrix
    pub fn recv_float_matrix(&mut self) -> Result<FloatMatrix, CommError> {
        read_float_matrix(&mut self.reader)
    }

    /// Receive a JSON string and parse it, failing on anything that is not an object
    pub fn recv_json(&mut self) -> Result<serde_json::Value, CommError> {
        let msg = self.recv_string()?;

        if !msg.starts_with('{') {
            return Err(CommError::Engine(msg));
        }

        Ok(serde_json::from_str(&msg)?)
    }

    /// Receive the issues the engine found while processing a command
    pub fn recv_issues(&mut self) -> Result<Issues, CommError> {
        let msg = self.recv_string()?;
        Issues::from_json(&msg)
    }

    /// Receive one reply and require it to equal `token`
    pub fn expect(&mut self, token: &str) -> Result<(), CommError> {
        let msg = self.recv_string()?;

        if msg != token {
            return Err(CommError::Engine(msg));
        }

        Ok(())
    }

    /// Require `"Success!"`
    pub fn expect_success(&mut self) -> Result<(), CommError> {
        self.expect(SUCCESS)
    }

    /// Require `"Found!"`
    pub fn expect_found(&mut self) -> Result<(), CommError> {
        self.expect(FOUND)
    }

    /// Consume progress messages and return the first reply that is not a log line
    pub fn log_loop(&mut self) -> Result<String, CommError> {
        let mut last_progress: Option<u32> = None;

        loop {
            let msg = self.recv_string()?;

            let line = match msg.strip_prefix(LOG_PREFIX) {
                Some(line) => line,
                None => return Ok(msg),
            };

            match parse_progress(line) {
                Some(progress) => {
                    if last_progress != Some(progress) {
                        debug!(target: PROGRESS_TARGET, "{}%", progress);
                        last_progress = Some(progress);
                    }
                }
                None => {
                    info!(target: PROGRESS_TARGET, "{}", line);
                    last_progress = None;
                }
            }
        }
    }

    /// Write an Arrow IPC stream to the socket
    #[cfg(feature = "arrow")]
    pub fn send_arrow_stream(
        &mut self,
        schema: &arrow::datatypes::Schema,
        batches: &[arrow::record_batch::RecordBatch],
    ) -> Result<(), CommError> {
        let mut writer = arrow::ipc::writer::StreamWriter::try_new(&mut self.writer, schema)?;

        for batch in batches {
            writer.write(batch)?;
        }

        writer.finish()?;
        self.writer.flush()?;

        Ok(())
    }

    /// Read one Arrow IPC stream from the socket
    ///
    /// The stream is not length-prefixed and the engine keeps talking after it,
    /// so the IPC messages are delimited by hand before decoding.
    #[cfg(feature = "arrow")]
    pub fn recv_arrow_stream(
        &mut self,
    ) -> Result<Vec<arrow::record_batch::RecordBatch>, CommError> {
        let bytes = read_ipc_stream(&mut self.reader)?;
        let reader = arrow::ipc::reader::StreamReader::try_new(std::io::Cursor::new(bytes), None)?;

        let mut batches = Vec::new();
        for batch in reader {
            batches.push(batch?);
        }

        Ok(batches)
    }
}

/// Extract the percentage from a `Progress: N%` log line
pub fn parse_progress(line: &str) -> Option<u32> {
    let (_, rest) = line.split_once("Progress: ")?;
    let (number, _) = rest.split_once('%')?;
    number.trim().parse().ok()
}

/// Copy exactly one Arrow IPC stream, up to and including its end-of-stream marker
#[cfg(feature = "arrow")]
pub fn read_ipc_stream<R: Read>(reader: &mut R) -> Result<Vec<u8>, CommError> {
    const CONTINUATION: [u8; 4] = [0xFF; 4];

    let mut bytes = Vec::new();

    loop {
        let mut prefix = [0u8; 4];
        reader.read_exact(&mut prefix)?;
        bytes.extend_from_slice(&prefix);

        let meta_len = if prefix == CONTINUATION {
            let mut len = [0u8; 4];
            reader.read_exact(&mut len)?;
            bytes.extend_from_slice(&len);
            i32::from_le_bytes(len)
        } else {
            i32::from_le_bytes(prefix)
        };

        if meta_len == 0 {
            return Ok(bytes);
        }

        if meta_len < 0 {
            return Err(CommError::Protocol(format!(
                "Invalid Arrow metadata length: {}",
                meta_len
            )));
        }

        let meta = read_bytes(reader, meta_len as u64)?;
        let message = arrow::ipc::root_as_message(&meta)
            .map_err(|e| CommError::Protocol(format!("Invalid Arrow message: {}", e)))?;
        let body_len = message.bodyLength();
        bytes.extend_from_slice(&meta);

        if body_len > 0 {
            bytes.extend_from_slice(&read_bytes(reader, body_len as u64)?);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_string_framing() {
        let mut buffer = Vec::new();
        write_string(&mut buffer, "Success!").unwrap();

        assert_eq!(&buffer[..4], &[0, 0, 0, 8]);
        assert_eq!(read_string(&mut Cursor::new(buffer)).unwrap(), "Success!");
    }

    #[test]
    fn test_truncated_string_is_a_protocol_error() {
        let mut buffer = vec![0, 0, 0, 10];
        buffer.extend_from_slice(b"short");

        assert!(matches!(
            read_string(&mut Cursor::new(buffer)),
            Err(CommError::Protocol(_))
        ));
    }

    #[test]
    fn test_string_column() {
        let payload = format!("a{}b{}", GETML_SEP, GETML_SEP);
        let mut buffer = (payload.len() as u64).to_be_bytes().to_vec();
        buffer.extend_from_slice(payload.as_bytes());

        let column = read_string_column(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(column, vec!["a", "b", ""]);

        let empty = read_string_column(&mut Cursor::new(0u64.to_be_bytes().to_vec())).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_float_matrix() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&2i32.to_be_bytes());
        buffer.extend_from_slice(&2i32.to_be_bytes());
        for value in [1.0f64, 2.0, 3.0, 4.0] {
            buffer.extend_from_slice(&value.to_be_bytes());
        }

        let matrix = read_float_matrix(&mut Cursor::new(buffer)).unwrap();

        assert_eq!(matrix.shape(), (2, 2));
        assert_eq!(matrix.row(1).unwrap(), &[3.0, 4.0]);
        assert_eq!(matrix.column(0).unwrap(), vec![1.0, 3.0]);
        assert!(matrix.row(2).is_none());
    }

    #[test]
    fn test_oversized_matrix_shape_is_a_protocol_error() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&i32::MAX.to_be_bytes());
        buffer.extend_from_slice(&i32::MAX.to_be_bytes());

        assert!(matches!(
            read_float_matrix(&mut Cursor::new(buffer)),
            Err(CommError::Protocol(_))
        ));
    }

    #[test]
    fn test_parse_progress() {
        assert_eq!(parse_progress("Progress: 42%."), Some(42));
        assert_eq!(parse_progress("Building features... Progress: 100%"), Some(100));
        assert_eq!(parse_progress("Trained pipeline."), None);
    }

    #[cfg(feature = "arrow")]
    #[test]
    fn test_ipc_stream_is_delimited() {
        use std::sync::Arc;
        use arrow::array::Float64Array;
        use arrow::datatypes::{DataType, Field, Schema};
        use arrow::record_batch::RecordBatch;

        let schema = Schema::new(vec![Field::new("column", DataType::Float64, true)]);
        let batch = RecordBatch::try_new(
            Arc::new(schema.clone()),
            vec![Arc::new(Float64Array::from(vec![1.0, 2.5]))],
        )
        .unwrap();

        let mut buffer = Vec::new();
        {
            let mut writer = arrow::ipc::writer::StreamWriter::try_new(&mut buffer, &schema).unwrap();
            writer.write(&batch).unwrap();
            writer.finish().unwrap();
        }
        let stream_len = buffer.len();
        write_string(&mut buffer, "Success!").unwrap();

        let mut cursor = Cursor::new(buffer);
        let stream = read_ipc_stream(&mut cursor).unwrap();

        assert_eq!(stream.len(), stream_len);
        assert_eq!(read_string(&mut cursor).unwrap(), "Success!");
    }
}
