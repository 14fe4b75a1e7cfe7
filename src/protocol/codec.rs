use std::fmt::Display;

use tokio::io::{self, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Code;

/// Reads one CRLF (or bare LF) terminated line, trimming the line
/// ending and surrounding whitespace. Returns `Ok(None)` on clean EOF.
pub async fn read_line<R: AsyncBufReadExt + Unpin>(reader: &mut R) -> io::Result<Option<String>> {
    let mut buf = String::new();
    let n = reader.read_line(&mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(buf.trim().to_string()))
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\r\n").await?;
    writer.flush().await
}

/// Writes the `+ OK` terminator.
pub async fn write_ok<W: AsyncWrite + Unpin>(writer: &mut W) -> io::Result<()> {
    write_line(writer, "+ OK").await
}

/// Writes `+ OK <value>`.
pub async fn write_ok_value<W: AsyncWrite + Unpin, V: Display>(writer: &mut W, value: V) -> io::Result<()> {
    write_line(writer, &format!("+ OK {}", value)).await
}

/// Writes a bare data line (used before the terminator of list/value responses).
pub async fn write_data<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> io::Result<()> {
    write_line(writer, line).await
}

/// Writes the `- <CODE>` failure terminator.
pub async fn write_err<W: AsyncWrite + Unpin>(writer: &mut W, code: Code) -> io::Result<()> {
    write_line(writer, &format!("- {}", code)).await
}

/// Writes the realm banner sent once, immediately after accept.
pub async fn write_banner<W: AsyncWrite + Unpin>(writer: &mut W, realm: &str) -> io::Result<()> {
    write_line(writer, realm).await
}

/// Writes the `+ BYE` terminator that closes out a `quit`.
pub async fn write_bye<W: AsyncWrite + Unpin>(writer: &mut W) -> io::Result<()> {
    write_line(writer, "+ BYE").await
}
