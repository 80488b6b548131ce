//! # Session Pool
//!
//! Purpose: Reuse authenticated TCP sessions so each operation skips the
//! connect and handshake cost.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Keep a bounded set of reusable sessions.
//! 2. **Authenticated Checkout**: A session leaves `establish` only after
//!    the full Hello / Auth / SelectBucket handshake succeeded.
//! 3. **Minimal Locking**: The mutex guards only idle-list bookkeeping,
//!    never network IO.
//! 4. **Fail Fast**: Exceeding the pool limit returns an error immediately.

use std::collections::VecDeque;
use std::io::{BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::BytesMut;
use tracing::{debug, warn};

use davenport_common::{
    encode_request, read_response, DavError, DavResult, Opcode, RequestFrame, ResponseFrame,
    Status, PROTOCOL_REVISION,
};

/// Pool configuration, extracted from the cluster config.
#[derive(Debug, Clone)]
pub(crate) struct PoolSettings {
    /// Seed node addresses; sessions are opened round-robin across them.
    pub endpoints: Vec<String>,
    /// SASL username. Empty skips the auth step.
    pub username: String,
    /// SASL password.
    pub password: String,
    /// Bucket bound during the handshake.
    pub bucket: String,
    /// Client name announced in the Hello frame.
    pub client_name: String,
    /// Maximum idle sessions to keep.
    pub max_idle: usize,
    /// Maximum total sessions (idle + in-use).
    pub max_total: usize,
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Optional socket read timeout.
    pub read_timeout: Option<Duration>,
    /// Optional socket write timeout.
    pub write_timeout: Option<Duration>,
}

struct PoolState {
    idle: VecDeque<Session>,
    total: usize,
}

struct PoolInner {
    settings: PoolSettings,
    next_endpoint: AtomicUsize,
    state: Mutex<PoolState>,
}

/// Session pool handle.
#[derive(Clone)]
pub(crate) struct SessionPool {
    inner: Arc<PoolInner>,
}

impl SessionPool {
    /// Creates a new pool. No sessions are opened eagerly.
    pub(crate) fn new(settings: PoolSettings) -> DavResult<Self> {
        if settings.endpoints.is_empty() {
            return Err(DavError::InvalidEndpoint(
                "no endpoints configured".to_string(),
            ));
        }
        let state = PoolState {
            idle: VecDeque::with_capacity(settings.max_idle),
            total: 0,
        };
        Ok(SessionPool {
            inner: Arc::new(PoolInner {
                settings,
                next_endpoint: AtomicUsize::new(0),
                state: Mutex::new(state),
            }),
        })
    }

    /// Acquires an authenticated session from the pool.
    pub(crate) fn acquire(&self) -> DavResult<PooledSession> {
        if let Some(session) = self.pop_idle() {
            return Ok(PooledSession::new(self.inner.clone(), session));
        }

        if !self.try_reserve() {
            return Err(DavError::PoolExhausted);
        }

        let endpoint = self.next_endpoint();
        match Session::establish(&self.inner.settings, &endpoint) {
            Ok(session) => Ok(PooledSession::new(self.inner.clone(), session)),
            Err(err) => {
                self.release_slot();
                Err(err)
            }
        }
    }

    fn next_endpoint(&self) -> String {
        let endpoints = &self.inner.settings.endpoints;
        let idx = self.inner.next_endpoint.fetch_add(1, Ordering::Relaxed);
        endpoints[idx % endpoints.len()].clone()
    }

    fn pop_idle(&self) -> Option<Session> {
        let mut state = self.inner.state.lock().expect("pool mutex poisoned");
        state.idle.pop_front()
    }

    fn try_reserve(&self) -> bool {
        let mut state = self.inner.state.lock().expect("pool mutex poisoned");
        if state.total >= self.inner.settings.max_total {
            return false;
        }
        state.total += 1;
        true
    }

    fn release_slot(&self) {
        let mut state = self.inner.state.lock().expect("pool mutex poisoned");
        state.total = state.total.saturating_sub(1);
    }

    fn return_session(&self, session: Session) {
        let mut state = self.inner.state.lock().expect("pool mutex poisoned");
        if state.idle.len() < self.inner.settings.max_idle {
            state.idle.push_back(session);
        } else {
            state.total = state.total.saturating_sub(1);
        }
    }
}

/// RAII wrapper returning a session to the pool on drop.
pub(crate) struct PooledSession {
    pool: Arc<PoolInner>,
    session: Option<Session>,
    valid: bool,
    timeouts_overridden: bool,
}

impl PooledSession {
    fn new(pool: Arc<PoolInner>, session: Session) -> Self {
        PooledSession {
            pool,
            session: Some(session),
            valid: true,
            timeouts_overridden: false,
        }
    }

    /// Sends one request and reads its response.
    pub(crate) fn exec(&mut self, frame: &mut RequestFrame) -> DavResult<ResponseFrame> {
        let session = self.session.as_mut().expect("session exists");
        let response = session.round_trip(frame);
        if response.is_err() {
            // A failed session may have unread bytes in flight; never reuse it.
            self.valid = false;
        }
        response
    }

    /// Overrides the socket read timeout for the current checkout.
    ///
    /// The pool default is restored when the session is returned.
    pub(crate) fn override_read_timeout(&mut self, timeout: Duration) -> DavResult<()> {
        let session = self.session.as_ref().expect("session exists");
        session.set_io_timeouts(Some(timeout), self.pool.settings.write_timeout)?;
        self.timeouts_overridden = true;
        Ok(())
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        let session = match self.session.take() {
            Some(session) => session,
            None => return,
        };

        let mut valid = self.valid;
        if valid && self.timeouts_overridden {
            let settings = &self.pool.settings;
            if session
                .set_io_timeouts(settings.read_timeout, settings.write_timeout)
                .is_err()
            {
                valid = false;
            }
        }

        let pool = SessionPool {
            inner: self.pool.clone(),
        };

        if valid {
            pool.return_session(session);
        } else {
            warn!("discarding failed session");
            pool.release_slot();
        }
    }
}

/// Single authenticated connection with reusable buffers.
pub(crate) struct Session {
    // Buffered reader reduces syscalls while still allowing direct writes.
    reader: BufReader<TcpStream>,
    write_buf: BytesMut,
    next_opaque: u32,
}

impl Session {
    /// Connects and completes the Hello / Auth / SelectBucket handshake.
    fn establish(settings: &PoolSettings, endpoint: &str) -> DavResult<Self> {
        let stream = connect_stream(settings, endpoint)?;
        stream.set_read_timeout(settings.read_timeout)?;
        stream.set_write_timeout(settings.write_timeout)?;
        // Disable Nagle to keep request latency low for small frames.
        stream.set_nodelay(true)?;

        let mut session = Session {
            reader: BufReader::new(stream),
            write_buf: BytesMut::with_capacity(512),
            next_opaque: 1,
        };
        session.handshake(settings)?;
        debug!(endpoint, bucket = %settings.bucket, "session established");
        Ok(session)
    }

    fn handshake(&mut self, settings: &PoolSettings) -> DavResult<()> {
        let mut hello = RequestFrame::new(Opcode::Hello);
        hello.extras = vec![PROTOCOL_REVISION];
        hello.key = settings.client_name.clone().into_bytes();
        let response = self.round_trip(&mut hello)?;
        match response.status {
            Status::Ok => {}
            Status::VersionMismatch => return Err(DavError::VersionMismatch),
            status => return Err(DavError::from_status(status, "hello")),
        }

        if !settings.username.is_empty() {
            let mut auth = RequestFrame::new(Opcode::Auth);
            auth.key = b"PLAIN".to_vec();
            auth.value = plain_sasl_payload(&settings.username, &settings.password);
            let response = self.round_trip(&mut auth)?;
            if response.status != Status::Ok {
                return Err(match response.status {
                    Status::AuthError => DavError::AuthFailed,
                    status => DavError::from_status(status, "auth"),
                });
            }
        }

        let mut select = RequestFrame::new(Opcode::SelectBucket);
        select.key = settings.bucket.clone().into_bytes();
        let response = self.round_trip(&mut select)?;
        if response.status != Status::Ok {
            return Err(DavError::from_status(response.status, settings.bucket.clone()));
        }

        Ok(())
    }

    /// Sends one frame and reads its correlated response.
    fn round_trip(&mut self, frame: &mut RequestFrame) -> DavResult<ResponseFrame> {
        frame.opaque = self.next_opaque;
        self.next_opaque = self.next_opaque.wrapping_add(1);

        self.write_buf.clear();
        encode_request(frame, &mut self.write_buf);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buf)?;
        stream.flush()?;

        let response = read_response(&mut self.reader)?;
        if response.opaque != frame.opaque {
            return Err(DavError::Protocol("response correlation mismatch"));
        }
        if response.opcode != frame.opcode {
            return Err(DavError::Protocol("response opcode mismatch"));
        }
        Ok(response)
    }

    fn set_io_timeouts(&self, read: Option<Duration>, write: Option<Duration>) -> DavResult<()> {
        let stream = self.reader.get_ref();
        stream.set_read_timeout(read)?;
        stream.set_write_timeout(write)?;
        Ok(())
    }
}

fn connect_stream(settings: &PoolSettings, endpoint: &str) -> DavResult<TcpStream> {
    let addr = endpoint
        .to_socket_addrs()
        .map_err(|_| DavError::InvalidEndpoint(endpoint.to_string()))?
        .next()
        .ok_or_else(|| DavError::InvalidEndpoint(endpoint.to_string()))?;

    let stream = match settings.connect_timeout {
        Some(timeout) => TcpStream::connect_timeout(&addr, timeout)?,
        None => TcpStream::connect(addr)?,
    };
    Ok(stream)
}

/// SASL PLAIN message: empty authzid, NUL, user, NUL, password.
fn plain_sasl_payload(username: &str, password: &str) -> Vec<u8> {
    let mut payload = Vec::with_capacity(username.len() + password.len() + 2);
    payload.push(0);
    payload.extend_from_slice(username.as_bytes());
    payload.push(0);
    payload.extend_from_slice(password.as_bytes());
    payload
}
