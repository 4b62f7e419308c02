//! Scripted in-memory transport for unit tests.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::session::{Connector, Session};
use crate::config::ServerAddr;

/// What the next `read` call yields.
#[derive(Debug, Clone)]
pub(crate) enum Incoming {
    Data(Vec<u8>),
    Fail(io::ErrorKind),
    /// Never completes.
    Stall,
}

/// Behaviour of one fake session.
#[derive(Debug, Clone, Default)]
pub(crate) struct SessionScript {
    incoming: Vec<Incoming>,
    availability: Vec<bool>,
    fail_send: Option<io::ErrorKind>,
}

impl SessionScript {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn data(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.incoming.push(Incoming::Data(bytes.as_ref().to_vec()));
        self
    }

    pub(crate) fn fail_read(mut self, kind: io::ErrorKind) -> Self {
        self.incoming.push(Incoming::Fail(kind));
        self
    }

    pub(crate) fn stall(mut self) -> Self {
        self.incoming.push(Incoming::Stall);
        self
    }

    pub(crate) fn fail_send(mut self, kind: io::ErrorKind) -> Self {
        self.fail_send = Some(kind);
        self
    }

    /// Answers for successive `data_available` calls. Once exhausted the
    /// session reports whether another data chunk is queued.
    pub(crate) fn available(mut self, answers: &[bool]) -> Self {
        self.availability.extend_from_slice(answers);
        self
    }
}

#[derive(Debug)]
pub(crate) struct ScriptedSession {
    incoming: VecDeque<Incoming>,
    availability: VecDeque<bool>,
    fail_send: Option<io::ErrorKind>,
    sent: Arc<Mutex<Vec<u8>>>,
    closed: Arc<AtomicBool>,
    closes: Arc<AtomicUsize>,
    pub(crate) reads: usize,
}

impl ScriptedSession {
    pub(crate) fn new(script: SessionScript) -> Self {
        Self::with_counters(
            script,
            Arc::default(),
            Arc::default(),
            Arc::new(AtomicUsize::new(0)),
        )
    }

    fn with_counters(
        script: SessionScript,
        sent: Arc<Mutex<Vec<u8>>>,
        closed: Arc<AtomicBool>,
        closes: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            incoming: script.incoming.into(),
            availability: script.availability.into(),
            fail_send: script.fail_send,
            sent,
            closed,
            closes,
            reads: 0,
        }
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        if let Some(kind) = self.fail_send {
            return Err(io::Error::new(kind, "scripted send failure"));
        }
        self.sent.lock().unwrap().extend_from_slice(bytes);
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads += 1;
        match self.incoming.pop_front() {
            None => Ok(0),
            Some(Incoming::Fail(kind)) => Err(io::Error::new(kind, "scripted read failure")),
            Some(Incoming::Stall) => std::future::pending().await,
            Some(Incoming::Data(mut chunk)) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    // Leftover bytes are already local, like a kernel buffer.
                    let rest = chunk.split_off(n);
                    self.incoming.push_front(Incoming::Data(rest));
                    self.availability.push_front(true);
                }
                Ok(n)
            }
        }
    }

    fn data_available(&mut self) -> io::Result<bool> {
        if let Some(answer) = self.availability.pop_front() {
            return Ok(answer);
        }
        Ok(matches!(self.incoming.front(), Some(Incoming::Data(_))))
    }

    async fn close(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Record of one session handed out by [`FakeConnector`].
#[derive(Debug, Clone)]
pub(crate) struct OpenedSession {
    pub(crate) addr: ServerAddr,
    sent: Arc<Mutex<Vec<u8>>>,
    closed: Arc<AtomicBool>,
}

impl OpenedSession {
    pub(crate) fn sent(&self) -> Vec<u8> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Connector that replays one script per `open`. When the scripts run out
/// every further `open` is refused.
#[derive(Debug, Default)]
pub(crate) struct FakeConnector {
    scripts: Mutex<VecDeque<Result<SessionScript, io::ErrorKind>>>,
    opened: Mutex<Vec<OpenedSession>>,
    attempts: AtomicUsize,
    closes: Arc<AtomicUsize>,
}

impl FakeConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn serving(script: SessionScript) -> Self {
        Self::new().then(script)
    }

    pub(crate) fn then(self, script: SessionScript) -> Self {
        self.scripts.lock().unwrap().push_back(Ok(script));
        self
    }

    pub(crate) fn then_refuse(self) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .push_back(Err(io::ErrorKind::ConnectionRefused));
        self
    }

    /// Number of `open` calls, successful or not.
    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn opened(&self) -> Vec<OpenedSession> {
        self.opened.lock().unwrap().clone()
    }

    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn open(&self, addr: &ServerAddr) -> io::Result<Box<dyn Session>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let next = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(io::ErrorKind::ConnectionRefused));
        let script = next.map_err(|kind| io::Error::new(kind, "scripted connect failure"))?;

        let sent = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        self.opened.lock().unwrap().push(OpenedSession {
            addr: addr.clone(),
            sent: sent.clone(),
            closed: closed.clone(),
        });

        Ok(Box::new(ScriptedSession::with_counters(
            script,
            sent,
            closed,
            self.closes.clone(),
        )))
    }
}
