// ABOUTME: Multi-bulk request encoding — the fast single-buffer path and the slow per-argument path
// ABOUTME: Selection between the two mirrors whether any argument carries raw bytes (buffer_args)

use crate::command::Arg;
use bytes::{BufMut, BytesMut};
use tokio::io::{self, AsyncWrite, AsyncWriteExt};

/// Encodes a multi-bulk request into a single buffer. Used when no argument
/// is a `Arg::Bytes` payload, so the whole request can be sized and written
/// up front without an intermediate copy per argument.
pub fn encode_request(args: &[Arg]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(estimate_size(args));
    write_header(&mut buf, args.len());
    for arg in args {
        write_bulk_header(&mut buf, arg.as_bytes().len());
        buf.put_slice(arg.as_bytes());
        buf.put_slice(b"\r\n");
    }
    buf
}

/// Writes a multi-bulk request directly to the transport, argument by
/// argument. Used when any argument carries raw bytes: large byte payloads
/// are written straight from their `Bytes` handle instead of being copied
/// into a shared buffer first.
pub async fn write_request<W: AsyncWrite + Unpin>(writer: &mut W, args: &[Arg]) -> io::Result<()> {
    let mut header = BytesMut::with_capacity(16);
    write_header(&mut header, args.len());
    writer.write_all(&header).await?;

    for arg in args {
        let bytes = arg.as_bytes();
        let mut bulk_header = BytesMut::with_capacity(bytes.len().to_string().len() + 4);
        write_bulk_header(&mut bulk_header, bytes.len());
        writer.write_all(&bulk_header).await?;
        writer.write_all(bytes).await?;
        writer.write_all(b"\r\n").await?;
    }
    Ok(())
}

fn write_header(buf: &mut BytesMut, argc: usize) {
    buf.put_u8(b'*');
    buf.put_slice(argc.to_string().as_bytes());
    buf.put_slice(b"\r\n");
}

fn write_bulk_header(buf: &mut BytesMut, len: usize) {
    buf.put_u8(b'$');
    buf.put_slice(len.to_string().as_bytes());
    buf.put_slice(b"\r\n");
}

/// A cheap upper-bound estimate so `encode_request`'s buffer rarely needs to
/// reallocate: the `*argc\r\n` header plus, per argument, a `$len\r\n` header
/// (bounded at 16 bytes, comfortably covering any realistic argument length)
/// and the argument bytes plus trailing `\r\n`.
fn estimate_size(args: &[Arg]) -> usize {
    let mut total = 1 + args.len().to_string().len() + 2;
    for arg in args {
        total += 16 + arg.as_bytes().len() + 2;
    }
    total
}
