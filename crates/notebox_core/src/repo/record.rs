//! Binary record codec for the note log.
//!
//! Layout (little endian):
//! - file header: `b"NBL1"`
//! - record: `u32 payload_len | u32 crc32(payload) | u32 crc32(first 8 bytes) | payload`
//! - payload: `u64 id | i64 created_at_ms | u32 content_len | content`
//!
//! The header checksum lets recovery tell a damaged length field apart from
//! a record cut short by a crash.

use crate::error::{NoteError, NoteResult};
use crate::model::note::Note;

pub(crate) const LOG_MAGIC: &[u8; 4] = b"NBL1";
pub(crate) const LOG_HEADER_LEN: u64 = LOG_MAGIC.len() as u64;
pub(crate) const RECORD_HEADER_LEN: usize = 12;
const PAYLOAD_FIXED_LEN: usize = 8 + 8 + 4;
/// Largest content that still fits the `u32` length fields.
pub(crate) const MAX_CONTENT_LEN: usize = u32::MAX as usize - PAYLOAD_FIXED_LEN;

/// Validated record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RecordHeader {
    pub payload_len: u32,
    pub payload_crc: u32,
}

/// Rejects content the record format cannot represent.
pub(crate) fn ensure_content_fits(len: usize) -> NoteResult<()> {
    if len > MAX_CONTENT_LEN {
        return Err(NoteError::ContentTooLarge {
            len,
            max: MAX_CONTENT_LEN,
        });
    }
    Ok(())
}

/// Encodes one note as a complete log record (header + payload).
pub(crate) fn encode_record(note: &Note) -> NoteResult<Vec<u8>> {
    let content = note.content.as_bytes();
    ensure_content_fits(content.len())?;
    let payload_len = PAYLOAD_FIXED_LEN + content.len();
    let mut payload = Vec::with_capacity(payload_len);
    payload.extend_from_slice(&note.id.to_le_bytes());
    payload.extend_from_slice(&note.created_at.to_le_bytes());
    payload.extend_from_slice(&(content.len() as u32).to_le_bytes());
    payload.extend_from_slice(content);

    let mut record = Vec::with_capacity(RECORD_HEADER_LEN + payload_len);
    record.extend_from_slice(&(payload_len as u32).to_le_bytes());
    record.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    let header_crc = crc32fast::hash(&record);
    record.extend_from_slice(&header_crc.to_le_bytes());
    record.extend_from_slice(&payload);
    Ok(record)
}

/// Parses a record header; `None` when its own checksum does not match.
pub(crate) fn parse_header(header: &[u8; RECORD_HEADER_LEN]) -> Option<RecordHeader> {
    let (fields, crc) = header.split_at(8);
    let stored = u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]);
    if crc32fast::hash(fields) != stored {
        return None;
    }
    Some(RecordHeader {
        payload_len: u32::from_le_bytes([header[0], header[1], header[2], header[3]]),
        payload_crc: u32::from_le_bytes([header[4], header[5], header[6], header[7]]),
    })
}

pub(crate) fn checksum_matches(payload: &[u8], expected: u32) -> bool {
    crc32fast::hash(payload) == expected
}

/// Decodes a payload whose checksum has already been verified.
pub(crate) fn decode_payload(payload: &[u8], offset: u64) -> NoteResult<Note> {
    let corrupt = |reason: &str| NoteError::CorruptLog {
        offset,
        reason: reason.to_string(),
    };

    if payload.len() < PAYLOAD_FIXED_LEN {
        return Err(corrupt("payload shorter than fixed fields"));
    }
    let (id_bytes, rest) = payload.split_at(8);
    let (ts_bytes, rest) = rest.split_at(8);
    let (len_bytes, content) = rest.split_at(4);

    let id = u64::from_le_bytes(id_bytes.try_into().map_err(|_| corrupt("bad id field"))?);
    let created_at =
        i64::from_le_bytes(ts_bytes.try_into().map_err(|_| corrupt("bad timestamp field"))?);
    let content_len =
        u32::from_le_bytes(len_bytes.try_into().map_err(|_| corrupt("bad length field"))?);

    if content_len as usize != content.len() {
        return Err(corrupt("content length prefix does not match payload"));
    }
    let content = String::from_utf8(content.to_vec())
        .map_err(|_| corrupt("content is not valid UTF-8"))?;

    Ok(Note {
        id,
        content,
        created_at,
    })
}

/// Decodes a full record (header + payload) read from `offset`.
pub(crate) fn decode_record(record: &[u8], offset: u64) -> NoteResult<Note> {
    let Some((header, payload)) = record.split_first_chunk::<RECORD_HEADER_LEN>() else {
        return Err(NoteError::CorruptLog {
            offset,
            reason: "record shorter than header".to_string(),
        });
    };
    let Some(header) = parse_header(header) else {
        return Err(NoteError::CorruptLog {
            offset,
            reason: "record header checksum mismatch".to_string(),
        });
    };
    if header.payload_len as usize != payload.len()
        || !checksum_matches(payload, header.payload_crc)
    {
        return Err(NoteError::CorruptLog {
            offset,
            reason: "record checksum mismatch".to_string(),
        });
    }
    decode_payload(payload, offset)
}

#[cfg(test)]
mod tests {
    use super::{
        decode_record, encode_record, ensure_content_fits, parse_header, MAX_CONTENT_LEN,
        RECORD_HEADER_LEN,
    };
    use crate::error::NoteError;
    use crate::model::note::Note;

    #[test]
    fn record_decodes_back_to_note() {
        let note = Note::new(3, "multi\nline ✓ content", 1_700_000_000_123);
        let record = encode_record(&note).unwrap();
        assert_eq!(decode_record(&record, 4).unwrap(), note);
    }

    #[test]
    fn flipped_payload_byte_fails_checksum() {
        let mut record = encode_record(&Note::new(1, "hello", 0)).unwrap();
        let last = record.len() - 1;
        record[last] ^= 0xFF;
        let err = decode_record(&record, 4).unwrap_err();
        assert!(matches!(err, NoteError::CorruptLog { offset: 4, .. }));
    }

    #[test]
    fn truncated_record_is_rejected() {
        let record = encode_record(&Note::new(1, "hello", 0)).unwrap();
        assert!(decode_record(&record[..RECORD_HEADER_LEN + 2], 4).is_err());
    }

    #[test]
    fn damaged_length_field_fails_header_checksum() {
        let mut record = encode_record(&Note::new(1, "hello", 0)).unwrap();
        let header: [u8; RECORD_HEADER_LEN] = record[..RECORD_HEADER_LEN].try_into().unwrap();
        assert!(parse_header(&header).is_some());

        record[3] ^= 0x01;
        let header: [u8; RECORD_HEADER_LEN] = record[..RECORD_HEADER_LEN].try_into().unwrap();
        assert!(parse_header(&header).is_none());
        let err = decode_record(&record, 4).unwrap_err();
        assert!(matches!(err, NoteError::CorruptLog { offset: 4, .. }));
    }

    #[test]
    fn content_beyond_length_fields_is_rejected() {
        assert!(ensure_content_fits(MAX_CONTENT_LEN).is_ok());
        let err = ensure_content_fits(MAX_CONTENT_LEN + 1).unwrap_err();
        assert!(matches!(err, NoteError::ContentTooLarge { .. }));
        assert_eq!(err.code(), "content_too_large");
    }
}
