//! Line-delimited JSON transports.
//!
//! Both transports speak the same protocol: one request object per line in, one
//! response object per line out. Blank lines are ignored.

use crate::error::Result;
use crate::tools::ToolServer;
use geohaz_metrics::{metric_defs, metrics};
use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

// ============================================================================
// stdio
// ============================================================================

/// Serve requests from `reader` until end of input. Returns the number of
/// requests handled.
pub fn serve_lines<R: BufRead, W: Write>(
    server: &ToolServer,
    reader: R,
    mut writer: W,
) -> io::Result<usize> {
    let mut handled = 0;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = server.handle_line(&line);
        writeln!(writer, "{}", response)?;
        writer.flush()?;
        handled += 1;
    }
    Ok(handled)
}

/// Serve on stdin/stdout. Logging must go to stderr.
pub fn serve_stdio(server: &ToolServer) -> Result<()> {
    info!("serving on stdio");
    let stdin = io::stdin();
    let stdout = io::stdout();
    let handled = serve_lines(server, stdin.lock(), stdout.lock())?;
    info!(handled, "stdin closed");
    Ok(())
}

// ============================================================================
// TCP
// ============================================================================

/// Bind `addr` and serve connections until the process is stopped.
pub fn serve_tcp(server: ToolServer, addr: SocketAddr) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "serving on tcp");
        run_listener(server, listener).await
    })
}

/// Accept connections on an already bound listener.
pub async fn run_listener(server: ToolServer, listener: TcpListener) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let server = server.clone();
        tokio::spawn(async move {
            metrics::gauge!(metric_defs::SERVER_CONNECTIONS.name).increment(1.0);
            debug!(%peer, "client connected");
            if let Err(e) = handle_connection(server, stream).await {
                warn!(%peer, "connection error: {}", e);
            }
            debug!(%peer, "client disconnected");
            metrics::gauge!(metric_defs::SERVER_CONNECTIONS.name).decrement(1.0);
        });
    }
}

async fn handle_connection(server: ToolServer, stream: TcpStream) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        // Operations block on the gateway.
        let server = server.clone();
        let mut response = tokio::task::spawn_blocking(move || server.handle_line(&line))
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        response.push('\n');
        writer.write_all(response.as_bytes()).await?;
    }
    Ok(())
}
