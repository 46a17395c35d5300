use log::{debug, warn};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use super::OracleService;
use crate::recommender::wire::{self, RpcRequest, RpcResponse};

/// Accepts connections forever, one task each.
pub async fn serve(listener: TcpListener, service: Arc<OracleService>) -> io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!("oracle: connection from {}", peer);
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            if let Err(err) = serve_connection(stream, service).await {
                warn!("oracle: connection from {} failed: {}", peer, err);
            }
        });
    }
}

/// Answers requests on one connection until the peer hangs up.
pub async fn serve_connection(stream: TcpStream, service: Arc<OracleService>) -> io::Result<()> {
    serve_connection_limited(stream, service, wire::MAX_FRAME_BYTES).await
}

/// Like [`serve_connection`], but a request line longer than `max_frame`
/// bytes is skipped and answered with an error instead of being buffered.
pub async fn serve_connection_limited(
    stream: TcpStream,
    service: Arc<OracleService>,
    max_frame: usize,
) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut frame = Vec::new();

    loop {
        frame.clear();
        let read = (&mut reader).take(max_frame as u64 + 1).read_until(b'\n', &mut frame).await?;
        if read == 0 {
            return Ok(());
        }
        let response = if frame.last() != Some(&b'\n') && frame.len() > max_frame {
            warn!("oracle: dropping request longer than {} bytes", max_frame);
            if !skip_line(&mut reader).await? {
                return Ok(());
            }
            RpcResponse::err(String::new(), format!("request exceeds {} bytes", max_frame))
        } else {
            let line = String::from_utf8_lossy(&frame);
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RpcRequest>(line.trim_end()) {
                Ok(request) => service.dispatch(request),
                Err(err) => RpcResponse::err(String::new(), format!("malformed request: {}", err)),
            }
        };
        let reply = wire::encode(&response).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        writer.write_all(&reply).await?;
    }
}

/// Discards input up to and including the next newline. False on EOF.
async fn skip_line<R: AsyncBufReadExt + Unpin>(reader: &mut R) -> io::Result<bool> {
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok(false);
        }
        match buf.iter().position(|byte| *byte == b'\n') {
            Some(end) => {
                reader.consume(end + 1);
                return Ok(true);
            }
            None => {
                let used = buf.len();
                reader.consume(used);
            }
        }
    }
}
