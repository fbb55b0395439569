//! Robot handoff server.
//!
//! Serves the planned pick and drop poses to one robot controller over a
//! plain-text TCP protocol, object by object in id order:
//! - `asking_for_data` is answered with `(centerX,centerY,angle)` of the pick pose
//! - `asking_for_drop_point` is answered with `(dropX,dropY,angle)` of the drop pose
//! - anything else is read and discarded
//!
//! An object counts as handed off only when the controller asks for the
//! next one on the same connection; the last object completes once both of
//! its replies are sent. When the controller disconnects the server accepts
//! a new client and continues at the object that was not yet handed off,
//! even if both of its replies had already been sent. There is no
//! resumption handshake: the new client is assumed to be the same
//! controller retrying its last unacknowledged exchange.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::model::{DropPose, HandoffItem, PickPose};

/// Maximum number of bytes taken per read.
pub const READ_BUFFER_SIZE: usize = 1024;

pub const PICK_REQUEST: &str = "asking_for_data";
pub const DROP_REQUEST: &str = "asking_for_drop_point";

/// Request tokens understood by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Request {
    Pick,
    Drop,
    Other,
}

impl Request {
    pub fn parse(token: &str) -> Self {
        match token {
            PICK_REQUEST => Request::Pick,
            DROP_REQUEST => Request::Drop,
            _ => Request::Other,
        }
    }
}

/// Formats a reply as `(AAA,BBB,CCC)`.
///
/// Values are truncated toward zero and right-aligned in a minimum width of
/// three; wider values widen the field.
pub fn format_triple(a: f64, b: f64, c: f64) -> String {
    format!("({:3},{:3},{:3})", a as i64, b as i64, c as i64)
}

pub fn pick_reply(pick: &PickPose) -> String {
    format_triple(pick.center.x, pick.center.y, pick.angle)
}

pub fn drop_reply(drop: &DropPose) -> String {
    format_triple(drop.drop.x, drop.drop.y, drop.angle.degrees())
}

/// Source of controller connections.
pub trait Acceptor {
    type Conn: AsyncRead + AsyncWrite + Unpin;

    /// Waits for the next client.
    fn accept(&mut self) -> impl Future<Output = io::Result<Self::Conn>>;
}

/// Accepts controllers on a bound TCP listener.
pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Acceptor for TcpAcceptor {
    type Conn = TcpStream;

    async fn accept(&mut self) -> io::Result<TcpStream> {
        let (stream, peer) = self.listener.accept().await?;
        info!(%peer, "controller connected");
        Ok(stream)
    }
}

/// Fatal outcome of a handoff run.
#[derive(Debug, Error)]
pub enum HandoffError {
    #[error(
        "retry ceiling reached after {attempts} accept cycles, {served} objects served, {} not delivered",
        .undelivered.len()
    )]
    RetryExhausted {
        attempts: u32,
        served: usize,
        undelivered: Vec<usize>,
    },
}

/// Result of a completed handoff run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandoffSummary {
    pub served: usize,
    pub attempts: u32,
    pub disconnects: u32,
}

enum State<C> {
    Listening,
    Serving(C),
    Disconnected(io::Error),
    Terminal(Result<HandoffSummary, HandoffError>),
}

/// Replies already sent for the object in progress.
#[derive(Clone, Copy, Debug, Default)]
struct ObjectProgress {
    pick_sent: bool,
    drop_sent: bool,
}

impl ObjectProgress {
    fn is_done(&self) -> bool {
        self.pick_sent && self.drop_sent
    }
}

pub struct HandoffServer<A> {
    acceptor: A,
    schedule: Vec<HandoffItem>,
    retry_limit: u32,
}

impl<A: Acceptor> HandoffServer<A> {
    /// Creates a server for a schedule sorted by increasing id.
    ///
    /// # Parameters
    /// * `acceptor` - Source of controller connections
    /// * `schedule` - Pick/drop pairs to serve, in serving order
    /// * `retry_limit` - Maximum number of accept cycles
    pub fn new(acceptor: A, schedule: Vec<HandoffItem>, retry_limit: u32) -> Self {
        Self {
            acceptor,
            schedule,
            retry_limit,
        }
    }

    /// Runs the accept/serve loop until every object is served or the
    /// retry ceiling is reached. The acceptor is dropped on both paths.
    pub async fn run(self) -> Result<HandoffSummary, HandoffError> {
        let HandoffServer {
            mut acceptor,
            schedule,
            retry_limit,
        } = self;

        let mut cursor = 0usize;
        let mut attempts = 0u32;
        let mut disconnects = 0u32;
        let mut state: State<A::Conn> = State::Listening;

        let outcome = loop {
            state = match state {
                State::Listening if cursor >= schedule.len() => State::Terminal(Ok(HandoffSummary {
                    served: cursor,
                    attempts,
                    disconnects,
                })),
                State::Listening if attempts >= retry_limit => {
                    State::Terminal(Err(HandoffError::RetryExhausted {
                        attempts,
                        served: cursor,
                        undelivered: schedule[cursor..].iter().map(HandoffItem::id).collect(),
                    }))
                }
                State::Listening => {
                    attempts += 1;
                    debug!(attempt = attempts, limit = retry_limit, "waiting for controller");
                    match acceptor.accept().await {
                        Ok(conn) => State::Serving(conn),
                        Err(err) => {
                            warn!(attempt = attempts, error = %err, "accept failed");
                            State::Listening
                        }
                    }
                }
                State::Serving(mut conn) => {
                    match serve_connection(&mut conn, &schedule, &mut cursor).await {
                        Ok(()) => {
                            if let Err(err) = conn.shutdown().await {
                                debug!(error = %err, "shutdown after last object failed");
                            }
                            State::Listening
                        }
                        Err(err) => State::Disconnected(err),
                    }
                }
                State::Disconnected(err) => {
                    disconnects += 1;
                    warn!(
                        index = cursor,
                        attempt = attempts,
                        error = %err,
                        "controller connection lost, resuming at the same object"
                    );
                    State::Listening
                }
                State::Terminal(outcome) => break outcome,
            };
        };

        drop(acceptor);
        match &outcome {
            Ok(summary) => info!(
                served = summary.served,
                attempts = summary.attempts,
                "handoff finished"
            ),
            Err(err) => warn!(error = %err, "handoff aborted"),
        }
        outcome
    }
}

/// Serves one connection until the schedule is finished or the connection
/// fails. `cursor` survives the connection and only moves past an object
/// once it is handed off.
async fn serve_connection<C>(
    conn: &mut C,
    schedule: &[HandoffItem],
    cursor: &mut usize,
) -> io::Result<()>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    let mut progress = ObjectProgress::default();
    let mut buf = [0u8; READ_BUFFER_SIZE];

    while *cursor < schedule.len() {
        let n = conn.read(&mut buf).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "controller closed the connection",
            ));
        }

        let chunk = String::from_utf8_lossy(&buf[..n]);
        for token in chunk.split_ascii_whitespace() {
            let request = Request::parse(token);
            if request == Request::Other {
                debug!(token, "unrecognized request ignored");
                continue;
            }

            // A request after both replies acknowledges the finished object.
            if progress.is_done() {
                if let Some(done) = schedule.get(*cursor) {
                    info!(id = done.id(), index = *cursor, "object handed off");
                }
                *cursor += 1;
                progress = ObjectProgress::default();
            }

            let Some(item) = schedule.get(*cursor) else {
                debug!(token, "request after the last object ignored");
                continue;
            };

            let reply = match request {
                Request::Pick => {
                    progress.pick_sent = true;
                    pick_reply(&item.pick)
                }
                Request::Drop => {
                    progress.drop_sent = true;
                    drop_reply(&item.drop)
                }
                Request::Other => continue,
            };
            conn.write_all(reply.as_bytes()).await?;
            conn.flush().await?;
            debug!(id = item.id(), ?request, %reply, "reply sent");

            if progress.is_done() && *cursor + 1 == schedule.len() {
                info!(id = item.id(), index = *cursor, "last object handed off");
                *cursor += 1;
                progress = ObjectProgress::default();
            }
        }
    }

    Ok(())
}
