use crate::scheduler::SchedulerService;
use common::{Request, Response};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Serves newline-delimited JSON requests until the peer hangs up.
///
/// At most `max_request_bytes` are buffered per request. A longer line gets an
/// error response and the connection is closed, since the rest of it cannot be
/// told apart from the next request.
pub async fn serve_connection<S>(
    stream: S,
    service: Arc<SchedulerService>,
    max_request_bytes: usize,
) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        line.clear();
        let limit = max_request_bytes as u64 + 1;
        let read = (&mut reader).take(limit).read_until(b'\n', &mut line).await?;
        if read == 0 {
            break;
        }

        if line.len() > max_request_bytes && line.last() != Some(&b'\n') {
            log::warn!("Rejecting request longer than {} bytes", max_request_bytes);
            let resp = Response::Error(format!("Request exceeds {} bytes", max_request_bytes));
            write_response(&mut writer, &resp).await?;
            break;
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let resp = match serde_json::from_slice::<Request>(&line) {
            Ok(req) => {
                log::debug!("Received request: {}", req.operation());
                service.handle(req, chrono::Utc::now())
            }
            Err(e) => {
                log::error!("failed to deserialize request; err = {:?}", e);
                Response::Error(format!("Malformed request: {}", e))
            }
        };
        write_response(&mut writer, &resp).await?;
    }

    Ok(())
}

async fn write_response<W>(writer: &mut W, resp: &Response) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut resp_bytes = serde_json::to_vec(resp)?;
    resp_bytes.push(b'\n');
    writer.write_all(&resp_bytes).await?;
    writer.flush().await?;
    Ok(())
}
