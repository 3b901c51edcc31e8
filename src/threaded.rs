use std::{
    future::Future as _,
    sync::{mpsc, Mutex, PoisonError},
};

use futures::channel::oneshot;

use crate::{session::Session, Backend, Error, FlushDirective, SessionKind};

type OperationResult = Result<Vec<u8>, Error>;

enum Operation {
    Feed {
        data: Vec<u8>,
        directive: FlushDirective,
    },
    Finish,
    Dispose,
}

/// One queued unit of work. Input is an owned copy, so the caller can
/// reuse its buffer as soon as the operation was submitted.
struct PendingOperation {
    operation: Operation,
    result: Option<oneshot::Sender<OperationResult>>,
}

/// A session whose operations run on a dedicated worker thread.
///
/// Every call returns a [`PendingOutput`] future immediately. Operations
/// execute one at a time in submission order, and their futures resolve in
/// that same order, so concatenating the resolved outputs in submission
/// order gives the complete stream.
///
/// The worker owns the underlying [`Session`]; submitting work only needs
/// a shared reference, so one `ThreadedSession` can be used from several
/// tasks at once.
///
/// ```
/// # fn main() -> Result<(), codec_session::Error> {
/// use codec_session::{Backend, FlushDirective, Session};
///
/// let compressor = Session::compressor(Backend::Zstd).build_threaded()?;
/// let first = compressor.feed(b"hello ", FlushDirective::NoFlush)?;
/// let second = compressor.feed(b"world", FlushDirective::NoFlush)?;
/// let last = compressor.finish();
///
/// let compressed = futures::executor::block_on(async {
///     let mut compressed = first.await?;
///     compressed.extend(second.await?);
///     compressed.extend(last.await?);
///     Ok::<_, codec_session::Error>(compressed)
/// })?;
/// assert_eq!(zstd::decode_all(&compressed[..]).unwrap(), b"hello world");
/// # Ok(())
/// # }
/// ```
pub struct ThreadedSession {
    backend: Backend,
    kind: SessionKind,
    queue: Mutex<Option<mpsc::Sender<PendingOperation>>>,
}

impl ThreadedSession {
    pub(crate) fn spawn(session: Session) -> Result<Self, Error> {
        let backend = session.backend();
        let kind = session.kind();
        let (sender, receiver) = mpsc::channel();

        let name = match kind {
            SessionKind::Compress => format!("{backend}-compress"),
            SessionKind::Decompress => format!("{backend}-decompress"),
        };
        std::thread::Builder::new()
            .name(name)
            .spawn(move || run_worker(session, receiver))
            .map_err(Error::Spawn)?;

        Ok(Self {
            backend,
            kind,
            queue: Mutex::new(Some(sender)),
        })
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    /// Whether operations can still be submitted, i.e. neither
    /// [`finish`](Self::finish) nor [`dispose`](Self::dispose) was called.
    pub fn is_open(&self) -> bool {
        self.lock_queue().is_some()
    }

    /// Queue `data` to be pushed through the codec. The data is copied
    /// before this returns.
    ///
    /// Fails immediately with [`Error::SessionFinalized`] once the session
    /// was finished or disposed. Codec errors surface through the returned
    /// future, and every operation queued after a failed one resolves to
    /// [`Error::SessionFinalized`].
    pub fn feed(&self, data: &[u8], directive: FlushDirective) -> Result<PendingOutput, Error> {
        let queue = self.lock_queue();
        let sender = queue.as_ref().ok_or(Error::SessionFinalized)?;

        let (result, receiver) = oneshot::channel();
        let pending = PendingOperation {
            operation: Operation::Feed {
                data: data.to_vec(),
                directive,
            },
            result: Some(result),
        };
        sender.send(pending).map_err(|_| Error::WorkerStopped)?;

        Ok(PendingOutput::waiting(receiver))
    }

    /// Queue the termination of the stream as the last operation.
    ///
    /// The submission handle is removed before queueing, so nothing can be
    /// scheduled after it. Later calls resolve to empty output.
    pub fn finish(&self) -> PendingOutput {
        let Some(sender) = self.lock_queue().take() else {
            return PendingOutput::ready(Ok(vec![]));
        };

        let (result, receiver) = oneshot::channel();
        let pending = PendingOperation {
            operation: Operation::Finish,
            result: Some(result),
        };
        match sender.send(pending) {
            Ok(()) => PendingOutput::waiting(receiver),
            Err(_) => PendingOutput::ready(Err(Error::WorkerStopped)),
        }
    }

    /// Stop accepting operations and release the codec without flushing
    /// once the already-queued operations have run.
    pub fn dispose(&self) {
        let Some(sender) = self.lock_queue().take() else {
            return;
        };

        let pending = PendingOperation {
            operation: Operation::Dispose,
            result: None,
        };
        if sender.send(pending).is_err() {
            log::debug!("{} {:?} worker already stopped", self.backend, self.kind);
        }
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, Option<mpsc::Sender<PendingOperation>>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ThreadedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadedSession")
            .field("backend", &self.backend)
            .field("kind", &self.kind)
            .field("open", &self.is_open())
            .finish()
    }
}

fn run_worker(mut session: Session, operations: mpsc::Receiver<PendingOperation>) {
    log::debug!(
        "{} {:?} session worker started",
        session.backend(),
        session.kind()
    );

    for pending in operations {
        let result = match pending.operation {
            Operation::Feed { data, directive } => session.feed(&data, directive),
            Operation::Finish => session.finish(),
            Operation::Dispose => {
                session.dispose();
                Ok(vec![])
            }
        };

        if let Some(sender) = pending.result {
            // The caller may have dropped the future
            let _ = sender.send(result);
        }
    }

    log::debug!(
        "{} {:?} session worker stopped ({:?})",
        session.backend(),
        session.kind(),
        session.state()
    );
}

/// The eventual output of one [`ThreadedSession`] operation.
#[must_use = "futures do nothing unless you `.await` or poll them"]
#[derive(Debug)]
pub struct PendingOutput {
    state: PendingState,
}

#[derive(Debug)]
enum PendingState {
    Ready(Option<OperationResult>),
    Waiting(oneshot::Receiver<OperationResult>),
}

impl PendingOutput {
    fn ready(result: OperationResult) -> Self {
        Self {
            state: PendingState::Ready(Some(result)),
        }
    }

    fn waiting(receiver: oneshot::Receiver<OperationResult>) -> Self {
        Self {
            state: PendingState::Waiting(receiver),
        }
    }
}

impl std::future::Future for PendingOutput {
    type Output = OperationResult;

    fn poll(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        let this = self.get_mut();

        match &mut this.state {
            PendingState::Ready(result) => std::task::Poll::Ready(
                result
                    .take()
                    .expect("PendingOutput polled after completion"),
            ),
            PendingState::Waiting(receiver) => {
                let received = ready!(std::pin::Pin::new(receiver).poll(cx));
                let result = received.unwrap_or(Err(Error::WorkerStopped));
                this.state = PendingState::Ready(None);
                std::task::Poll::Ready(result)
            }
        }
    }
}
