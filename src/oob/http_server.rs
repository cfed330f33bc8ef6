//! Minimal HTTP callback server for OOB scan confirmation

use super::{callback_channel, CallbackNotifier, CallbackSignal};
use crate::error::{Result, ZuulError};
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

const CALLBACK_PREFIX: &str = "/callback/";

/// Scan ids waiting for a callback, keyed to their notifier
type PendingCallbacks = Arc<Mutex<HashMap<String, CallbackNotifier>>>;

/// HTTP listener that routes `/callback/<scan_id>` requests to the scan
/// registered under that id. The accept loop stops when the listener is dropped.
pub struct CallbackListener {
    local_addr: SocketAddr,
    pending: PendingCallbacks,
    task: JoinHandle<()>,
}

impl CallbackListener {
    /// Binds `addr` and starts serving callbacks in the background
    pub async fn start(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ZuulError::OobError(format!("cannot bind {addr}: {e}")))?;
        let local_addr = listener.local_addr()?;
        info!("OOB callback listener on {local_addr}");

        let pending: PendingCallbacks = Arc::new(Mutex::new(HashMap::new()));
        let task = tokio::spawn(accept_loop(listener, Arc::clone(&pending)));

        Ok(Self {
            local_addr,
            pending,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Registers a scan and returns the signal its callback will fire
    pub async fn register(&self, scan_id: &str) -> Result<CallbackSignal> {
        let (notifier, signal) = callback_channel(1)?;
        self.pending
            .lock()
            .await
            .insert(scan_id.to_string(), notifier);
        Ok(signal)
    }

    /// Stops routing callbacks for a scan
    pub async fn unregister(&self, scan_id: &str) {
        self.pending.lock().await.remove(scan_id);
    }

    /// Callback URL for `scan_id` as reachable by the target through `host`
    pub fn callback_url(&self, host: &str, scan_id: &str) -> String {
        format!(
            "http://{}:{}{}{}",
            host,
            self.local_addr.port(),
            CALLBACK_PREFIX,
            scan_id
        )
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn accept_loop(listener: TcpListener, pending: PendingCallbacks) {
    loop {
        let (stream, remote_addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("OOB callback listener stopped: {e}");
                return;
            }
        };
        let pending = Arc::clone(&pending);
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let pending = Arc::clone(&pending);
                async move { handle_request(req, remote_addr, pending).await }
            });

            if let Err(e) = hyper::server::conn::http1::Builder::new()
                .serve_connection(io, service)
                .await
            {
                debug!("OOB HTTP connection error: {e}");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    remote_addr: SocketAddr,
    pending: PendingCallbacks,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let scan_id = req
        .uri()
        .path()
        .strip_prefix(CALLBACK_PREFIX)
        .map(|id| id.trim_end_matches('/'))
        .filter(|id| !id.is_empty());

    let notifier = match scan_id {
        Some(id) => pending.lock().await.get(id).cloned(),
        None => None,
    };

    match notifier {
        Some(notifier) => {
            info!(
                "Callback received for scan {} from {}",
                scan_id.unwrap_or_default(),
                remote_addr
            );
            notifier.notify();
            Ok(Response::new(Full::new(Bytes::from_static(b"ok"))))
        }
        None => {
            debug!("Ignoring {} {} from {}", req.method(), req.uri(), remote_addr);
            let mut response = Response::new(Full::new(Bytes::from_static(b"not found")));
            *response.status_mut() = StatusCode::NOT_FOUND;
            Ok(response)
        }
    }
}
