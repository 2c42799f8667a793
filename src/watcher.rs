//! Watch session owning the OS notification handle.
//!
//! The backend runs on its own thread and pushes into an [`EventSink`]. The
//! consumer reads from the matching [`EventStreams`]: one channel of
//! normalized [`Event`]s and one of asynchronous [`WatchError`]s. Nothing else
//! is shared between the two sides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::WatchError;
use crate::events::Event;
use crate::registrar::WatchRegistry;

/// Which notification mechanism backs a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Platform events (inotify, FSEvents, ReadDirectoryChangesW)
    #[default]
    Native,
    /// Periodic rescans, for filesystems without native events
    Poll { interval: Duration },
}

/// Producer half, owned by the backend thread.
#[derive(Debug, Clone)]
pub struct EventSink {
    events: UnboundedSender<Event>,
    errors: UnboundedSender<WatchError>,
}

impl EventSink {
    /// Returns false once the consumer has gone away.
    pub fn send_event(&self, event: Event) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn send_error(&self, error: WatchError) -> bool {
        self.errors.send(error).is_ok()
    }

    /// Translates one backend notification and forwards it.
    fn forward(&self, result: notify::Result<notify::Event>) {
        match result {
            Ok(event) => {
                if event.need_rescan() {
                    self.send_error(WatchError::Rescan);
                }
                for event in Event::from_notify(event) {
                    if !self.send_event(event) {
                        return;
                    }
                }
            }
            Err(err) => {
                self.send_error(WatchError::Backend(err));
            }
        }
    }
}

/// Consumer half: FIFO per channel, no ordering across the two.
#[derive(Debug)]
pub struct EventStreams {
    pub(crate) events: UnboundedReceiver<Event>,
    pub(crate) errors: UnboundedReceiver<WatchError>,
}

impl EventStreams {
    /// Creates a connected sink and stream pair.
    pub fn pair() -> (EventSink, EventStreams) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        (
            EventSink {
                events: event_tx,
                errors: error_tx,
            },
            EventStreams {
                events: event_rx,
                errors: error_rx,
            },
        )
    }

    pub async fn recv_event(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    pub async fn recv_error(&mut self) -> Option<WatchError> {
        self.errors.recv().await
    }

    /// Stops both channels and discards anything still buffered.
    fn shut(&mut self) {
        self.events.close();
        self.errors.close();
        while self.events.try_recv().is_ok() {}
        while self.errors.try_recv().is_ok() {}
    }
}

/// A live watch handle plus its delivery channels.
///
/// Dropping the session closes it, so the OS handle is released on every
/// exit path.
pub struct WatchSession {
    watcher: Option<Box<dyn Watcher + Send>>,
    streams: EventStreams,
    watched: Vec<PathBuf>,
}

impl WatchSession {
    /// Acquires a single backend handle.
    pub fn open(backend: Backend) -> Result<Self, WatchError> {
        let (sink, streams) = EventStreams::pair();
        let handler = move |result: notify::Result<notify::Event>| sink.forward(result);

        let watcher: Box<dyn Watcher + Send> = match backend {
            Backend::Native => Box::new(
                RecommendedWatcher::new(handler, Config::default()).map_err(WatchError::Init)?,
            ),
            Backend::Poll { interval } => Box::new(
                PollWatcher::new(handler, Config::default().with_poll_interval(interval))
                    .map_err(WatchError::Init)?,
            ),
        };
        tracing::debug!("opened {:?} watch session", backend);

        Ok(Self {
            watcher: Some(watcher),
            streams,
            watched: Vec::new(),
        })
    }

    /// Registers a single path, without recursing.
    ///
    /// Registering the same path twice is a no-op.
    pub fn add<P: AsRef<Path>>(&mut self, path: P) -> Result<(), WatchError> {
        let path = path.as_ref();
        let watcher = self.watcher.as_mut().ok_or(WatchError::Closed)?;

        if self.watched.iter().any(|p| p == path) {
            tracing::debug!("already watching {}", path.display());
            return Ok(());
        }

        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::PathWatch {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!("watching {}", path.display());
        self.watched.push(path.to_path_buf());
        Ok(())
    }

    pub fn remove<P: AsRef<Path>>(&mut self, path: P) -> Result<(), WatchError> {
        let path = path.as_ref();
        let watcher = self.watcher.as_mut().ok_or(WatchError::Closed)?;
        let index = self
            .watched
            .iter()
            .position(|p| p == path)
            .ok_or_else(|| WatchError::NotWatched {
                path: path.to_path_buf(),
            })?;

        watcher.unwatch(path).map_err(|source| WatchError::Unwatch {
            path: path.to_path_buf(),
            source,
        })?;
        self.watched.remove(index);
        Ok(())
    }

    /// Registered paths, in registration order.
    pub fn watched(&self) -> &[PathBuf] {
        &self.watched
    }

    pub fn streams_mut(&mut self) -> &mut EventStreams {
        &mut self.streams
    }

    pub fn is_closed(&self) -> bool {
        self.watcher.is_none()
    }

    /// Releases the OS handle. Later calls do nothing.
    ///
    /// Receivers are closed before the handle is dropped so a notification
    /// racing the shutdown can't land in the buffer afterwards.
    pub fn close(&mut self) {
        let Some(watcher) = self.watcher.take() else {
            return;
        };
        self.streams.shut();
        drop(watcher);
        self.watched.clear();
        tracing::debug!("watch session closed");
    }
}

impl WatchRegistry for WatchSession {
    fn add(&mut self, path: &Path) -> Result<(), WatchError> {
        WatchSession::add(self, path)
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Op;
    use tempfile::TempDir;

    #[test]
    fn test_sink_forwards_translated_events() {
        let (sink, mut streams) = EventStreams::pair();
        let raw = notify::Event::new(notify::EventKind::Create(notify::event::CreateKind::File))
            .add_path(PathBuf::from("/tmp/new.txt"));

        sink.forward(Ok(raw));
        sink.forward(Err(notify::Error::generic("queue overflow")));

        let event = streams.events.try_recv().unwrap();
        assert_eq!(event.path(), Path::new("/tmp/new.txt"));
        assert_eq!(event.op(), Op::CREATE);

        let err = streams.errors.try_recv().unwrap();
        assert!(matches!(err, WatchError::Backend(_)));
        assert!(err.to_string().contains("queue overflow"));
    }

    #[test]
    fn test_sink_reports_rescan() {
        let (sink, mut streams) = EventStreams::pair();
        let raw = notify::Event::new(notify::EventKind::Other)
            .set_flag(notify::event::Flag::Rescan);

        sink.forward(Ok(raw));

        assert!(matches!(streams.errors.try_recv(), Ok(WatchError::Rescan)));
        assert!(streams.events.try_recv().is_err());
    }

    #[test]
    fn test_sink_reports_closed_consumer() {
        let (sink, streams) = EventStreams::pair();
        drop(streams);
        assert!(!sink.send_event(Event::new("a", Op::WRITE)));
        assert!(!sink.send_error(WatchError::Rescan));
    }

    #[test]
    fn test_duplicate_add_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut session = WatchSession::open(Backend::Native).unwrap();

        session.add(dir.path()).unwrap();
        session.add(dir.path()).unwrap();

        assert_eq!(session.watched(), &[dir.path().to_path_buf()]);
    }

    #[test]
    fn test_add_missing_path_fails() {
        let dir = TempDir::new().unwrap();
        let mut session = WatchSession::open(Backend::Native).unwrap();

        let err = session.add(dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, WatchError::PathWatch { .. }));
        assert!(session.watched().is_empty());
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let mut session = WatchSession::open(Backend::Native).unwrap();
        session.add(dir.path()).unwrap();

        session.remove(dir.path()).unwrap();
        assert!(session.watched().is_empty());

        let err = session.remove(dir.path()).unwrap_err();
        assert!(matches!(err, WatchError::NotWatched { .. }));
    }

    #[test]
    fn test_close_twice_and_add_after_close() {
        let dir = TempDir::new().unwrap();
        let mut session = WatchSession::open(Backend::Native).unwrap();
        session.add(dir.path()).unwrap();

        session.close();
        session.close();

        assert!(session.is_closed());
        assert!(session.watched().is_empty());
        assert!(matches!(session.add(dir.path()), Err(WatchError::Closed)));
    }

    #[tokio::test]
    async fn test_closed_session_delivers_nothing() {
        let dir = TempDir::new().unwrap();
        let mut session = WatchSession::open(Backend::Native).unwrap();
        session.add(dir.path()).unwrap();

        std::fs::write(dir.path().join("before.txt"), "x").unwrap();
        std::thread::sleep(Duration::from_millis(100));
        session.close();
        std::fs::write(dir.path().join("after.txt"), "x").unwrap();

        let streams = session.streams_mut();
        assert!(streams.recv_event().await.is_none());
        assert!(streams.recv_error().await.is_none());
    }

    #[test]
    fn test_poll_backend_opens() {
        let dir = TempDir::new().unwrap();
        let mut session = WatchSession::open(Backend::Poll {
            interval: Duration::from_millis(50),
        })
        .unwrap();
        session.add(dir.path()).unwrap();
        assert_eq!(session.watched().len(), 1);
    }
}
