//! JSON output for the CLI
//!
//! - One JSON object per command on stdout
//! - `{"status":"ok","data":...}` or `{"status":"error","code":...,"message":...}`

use std::io::{self, Write};

use serde_json::{json, Value};

use super::errors::{CliError, CliResult};

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_response_to(&mut io::stdout(), data)
}

pub fn write_response_to<W: Write>(writer: &mut W, data: Value) -> CliResult<()> {
    let response = json!({
        "status": "ok",
        "data": data
    });
    write_line(writer, &response)
}

/// Write an error response to stdout
pub fn write_error(err: &CliError) -> CliResult<()> {
    write_error_to(&mut io::stdout(), err)
}

pub fn write_error_to<W: Write>(writer: &mut W, err: &CliError) -> CliResult<()> {
    let mut response = json!({
        "status": "error",
        "code": err.code_str(),
        "message": err.message()
    });
    if let Some(cause) = err.cause() {
        response["cause"] = json!(cause);
    }
    write_line(writer, &response)
}

fn write_line<W: Write>(writer: &mut W, value: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_response() {
        let mut buf = Vec::new();
        write_response_to(&mut buf, json!([1, 2])).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "{\"data\":[1,2],\"status\":\"ok\"}\n");
    }

    #[test]
    fn test_write_error_with_cause() {
        let err = CliError::from(crate::expr::ExprError::syntax(3, "unexpected end of input"));
        let mut buf = Vec::new();
        write_error_to(&mut buf, &err).unwrap();
        let value: Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["code"], "DQ_CLI_INVALID_ARGUMENT");
        assert!(value["cause"].is_string());
    }
}
