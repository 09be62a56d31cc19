//! Proto — the log record carried on the wire.
//!
//! Field numbers match Docker's `logdriver.LogEntry` so that frames produced
//! by the daemon decode here and frames we export decode in `docker logs`.

use bytes::Bytes;

/// One captured log line.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LogEntry {
    /// Stream name, e.g. `stdout` or `stderr`.
    #[prost(string, tag = "1")]
    pub source: String,
    /// Capture time, Unix nanoseconds.
    #[prost(int64, tag = "2")]
    pub time_nano: i64,
    #[prost(bytes = "bytes", tag = "3")]
    pub line: Bytes,
    /// Fragment of a longer logical line. Carried through unmodified.
    #[prost(bool, tag = "4")]
    pub partial: bool,
    #[prost(message, optional, tag = "5")]
    pub partial_log_metadata: Option<PartialLogEntryMetadata>,
}

/// Reassembly hints attached to partial lines by the daemon.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PartialLogEntryMetadata {
    #[prost(bool, tag = "1")]
    pub last: bool,
    #[prost(string, tag = "2")]
    pub id: String,
    #[prost(int32, tag = "3")]
    pub ordinal: i32,
}

impl LogEntry {
    pub fn new(source: impl Into<String>, line: impl Into<Bytes>, time_nano: i64) -> Self {
        Self {
            source: source.into(),
            time_nano,
            line: line.into(),
            partial: false,
            partial_log_metadata: None,
        }
    }

    /// Line payload as text, lossy for non-UTF8 bytes.
    pub fn line_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_field_tags_match_docker_layout() {
        let mut entry = LogEntry::new("stdout", &b"hi"[..], 1);
        entry.partial = true;

        let encoded = entry.encode_to_vec();
        let expected: Vec<u8> = [
            &[0x0a, 0x06][..], b"stdout", // 1: source
            &[0x10, 0x01][..],            // 2: time_nano
            &[0x1a, 0x02][..], b"hi",     // 3: line
            &[0x20, 0x01][..],            // 4: partial
        ]
        .concat();
        assert_eq!(encoded, expected);
    }

    #[test]
    fn test_partial_metadata_survives_decode() {
        let mut entry = LogEntry::new("stderr", &b"chunk"[..], 42);
        entry.partial = true;
        entry.partial_log_metadata = Some(PartialLogEntryMetadata {
            last: false,
            id: "p-1".to_string(),
            ordinal: 3,
        });

        let decoded = LogEntry::decode(entry.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, entry);
        assert_eq!(decoded.partial_log_metadata.unwrap().ordinal, 3);
    }

    #[test]
    fn test_default_entry_is_empty() {
        let entry = LogEntry::default();
        assert!(entry.source.is_empty());
        assert!(entry.line.is_empty());
        assert!(!entry.partial);
        assert!(entry.encode_to_vec().is_empty());
    }

    #[test]
    fn test_line_lossy_replaces_invalid_utf8() {
        let entry = LogEntry::new("stdout", vec![b'o', b'k', 0xff], 0);
        assert_eq!(entry.line_lossy(), "ok\u{fffd}");
    }
}
