//! # Result Decoding
//!
//! Purpose: Turn response frames into typed results, mapping non-success
//! statuses to errors with the right context.

use serde::de::DeserializeOwned;

use davenport_common::{
    Cas, DavError, DavResult, Document, DocumentId, ResponseFrame, Status,
};

/// Result of a successful mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationResult {
    cas: Cas,
}

impl MutationResult {
    /// Revision of the document after the mutation.
    pub fn cas(&self) -> Cas {
        self.cas
    }
}

/// Result of a counter operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterResult {
    cas: Cas,
    value: u64,
}

impl CounterResult {
    /// Revision of the document after the adjustment.
    pub fn cas(&self) -> Cas {
        self.cas
    }

    /// Counter value after the adjustment.
    pub fn value(&self) -> u64 {
        self.value
    }
}

/// Decoded rows of a query response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    rows: Vec<serde_json::Value>,
}

impl QueryResult {
    /// Raw JSON rows.
    pub fn rows(&self) -> &[serde_json::Value] {
        &self.rows
    }

    /// Deserializes every row into `T`.
    pub fn rows_as<T: DeserializeOwned>(&self) -> DavResult<Vec<T>> {
        self.rows
            .iter()
            .map(|row| serde_json::from_value(row.clone()).map_err(DavError::from))
            .collect()
    }
}

/// Fails with the mapped error unless the frame carries `Status::Ok`.
pub(crate) fn ensure_ok(response: &ResponseFrame, context: &str) -> DavResult<()> {
    if response.status == Status::Ok {
        Ok(())
    } else {
        Err(DavError::from_status(response.status, context))
    }
}

/// Decodes a get response into a document.
///
/// Get responses carry the document format flags as a 4-byte extras
/// section; an empty extras section decodes as zero flags.
pub(crate) fn decode_document(id: &DocumentId, response: ResponseFrame) -> DavResult<Document> {
    ensure_ok(&response, id.as_str())?;
    let flags = match response.extras.len() {
        0 => 0,
        4 => u32::from_be_bytes(response.extras[..4].try_into().expect("4-byte slice")),
        _ => return Err(DavError::Protocol("unexpected get extras length")),
    };
    Ok(Document::from_parts(
        id.clone(),
        response.cas,
        flags,
        response.value,
    ))
}

/// Decodes a mutation response.
pub(crate) fn decode_mutation(response: ResponseFrame, context: &str) -> DavResult<MutationResult> {
    ensure_ok(&response, context)?;
    Ok(MutationResult { cas: response.cas })
}

/// Decodes a counter response; the value section must be 8 bytes.
pub(crate) fn decode_counter(response: ResponseFrame, context: &str) -> DavResult<CounterResult> {
    ensure_ok(&response, context)?;
    let value: [u8; 8] = response
        .value
        .as_slice()
        .try_into()
        .map_err(|_| DavError::Protocol("counter value must be 8 bytes"))?;
    Ok(CounterResult {
        cas: response.cas,
        value: u64::from_be_bytes(value),
    })
}

/// Decodes an exists response: `Ok` means present, `NotFound` absent.
pub(crate) fn decode_exists(response: ResponseFrame, context: &str) -> DavResult<bool> {
    match response.status {
        Status::Ok => Ok(true),
        Status::NotFound => Ok(false),
        status => Err(DavError::from_status(status, context)),
    }
}

/// Decodes a query response body as a JSON array of rows.
pub(crate) fn decode_query(response: ResponseFrame) -> DavResult<QueryResult> {
    ensure_ok(&response, "query")?;
    let rows = if response.value.is_empty() {
        Vec::new()
    } else {
        serde_json::from_slice(&response.value)?
    };
    Ok(QueryResult { rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use davenport_common::{Opcode, DATA_TYPE_RAW};

    fn response(opcode: Opcode, status: Status, cas: u64, extras: Vec<u8>, value: Vec<u8>) -> ResponseFrame {
        ResponseFrame {
            opcode,
            status,
            data_type: DATA_TYPE_RAW,
            opaque: 1,
            cas: Cas::new(cas),
            extras,
            key: Vec::new(),
            value,
        }
    }

    #[test]
    fn test_decode_document() {
        let id = DocumentId::new("doc").unwrap();
        let frame = response(
            Opcode::Get,
            Status::Ok,
            9,
            vec![0, 0, 0, 1],
            br#"{"v":1}"#.to_vec(),
        );
        let doc = decode_document(&id, frame).unwrap();
        assert_eq!(doc.cas, Cas::new(9));
        assert_eq!(doc.flags, 1);
        assert_eq!(doc.content_bytes(), br#"{"v":1}"#);
    }

    #[test]
    fn test_decode_document_not_found() {
        let id = DocumentId::new("missing").unwrap();
        let frame = response(Opcode::Get, Status::NotFound, 0, Vec::new(), Vec::new());
        match decode_document(&id, frame) {
            Err(DavError::DocumentNotFound { id }) => assert_eq!(id, "missing"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_decode_document_bad_extras() {
        let id = DocumentId::new("doc").unwrap();
        let frame = response(Opcode::Get, Status::Ok, 0, vec![1, 2], Vec::new());
        assert!(matches!(
            decode_document(&id, frame),
            Err(DavError::Protocol(_))
        ));
    }

    #[test]
    fn test_decode_counter() {
        let frame = response(
            Opcode::Counter,
            Status::Ok,
            3,
            Vec::new(),
            11u64.to_be_bytes().to_vec(),
        );
        let result = decode_counter(frame, "c").unwrap();
        assert_eq!(result.value(), 11);
        assert_eq!(result.cas(), Cas::new(3));

        let short = response(Opcode::Counter, Status::Ok, 3, Vec::new(), vec![1, 2]);
        assert!(matches!(
            decode_counter(short, "c"),
            Err(DavError::Protocol(_))
        ));
    }

    #[test]
    fn test_decode_exists() {
        let present = response(Opcode::Exists, Status::Ok, 1, Vec::new(), Vec::new());
        assert!(decode_exists(present, "doc").unwrap());

        let absent = response(Opcode::Exists, Status::NotFound, 0, Vec::new(), Vec::new());
        assert!(!decode_exists(absent, "doc").unwrap());

        let busy = response(Opcode::Exists, Status::Busy, 0, Vec::new(), Vec::new());
        assert!(matches!(decode_exists(busy, "doc"), Err(DavError::Busy)));
    }

    #[test]
    fn test_decode_query_rows() {
        let frame = response(
            Opcode::Query,
            Status::Ok,
            0,
            Vec::new(),
            br#"[{"n":1},{"n":2}]"#.to_vec(),
        );
        let result = decode_query(frame).unwrap();
        assert_eq!(result.rows().len(), 2);

        #[derive(serde::Deserialize)]
        struct Row {
            n: u32,
        }
        let rows: Vec<Row> = result.rows_as().unwrap();
        assert_eq!(rows[1].n, 2);
    }

    #[test]
    fn test_decode_query_empty_body() {
        let frame = response(Opcode::Query, Status::Ok, 0, Vec::new(), Vec::new());
        assert!(decode_query(frame).unwrap().rows().is_empty());
    }

    #[test]
    fn test_decode_mutation_cas_conflict() {
        let frame = response(Opcode::Replace, Status::Exists, 0, Vec::new(), Vec::new());
        assert!(matches!(
            decode_mutation(frame, "doc"),
            Err(DavError::CasMismatch { .. })
        ));
    }
}
