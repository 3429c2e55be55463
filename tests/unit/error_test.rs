//! Tests for error types

use std::io;

use htcondor_query::classad::ParseError;
use htcondor_query::QueryError;

#[test]
fn test_parse_error_is_transparent() {
    let err = QueryError::from(ParseError::MissingSeparator {
        line: 3,
        text: "foo".into(),
    });
    assert_eq!(err.to_string(), "invalid classad attribute on line 3: \"foo\"");
}

#[test]
fn test_execution_error_display() {
    let err = QueryError::Execution {
        command: "condor_q -long".into(),
        status: "exit code 1".into(),
        stderr: "schedd unreachable".into(),
        stdout: bytes::Bytes::new(),
    };
    assert_eq!(
        err.to_string(),
        "`condor_q -long` failed (exit code 1): schedd unreachable"
    );
}

#[test]
fn test_decode_error_display() {
    let err = QueryError::decode("bogus", "missing bucket");
    assert_eq!(
        err.to_string(),
        "unable to decode cache key \"bogus\": missing bucket"
    );
}

#[test]
fn test_io_error_converts_and_clones() {
    let err = QueryError::from(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
    let copy = err.clone();
    assert_eq!(copy.to_string(), "i/o error: pipe closed");
    assert!(!copy.is_cancelled());
    assert!(QueryError::Cancelled.is_cancelled());
}

#[test]
fn test_unknown_group_error() {
    let err = QueryError::UnknownGroup("slots".into());
    assert_eq!(err.to_string(), "cache group `slots` is not registered");
}
