//! The consumer loop: filter events, render the survivors, report errors.

use std::io::{self, Write};

use tokio_util::sync::CancellationToken;

use crate::error::WatchError;
use crate::events::Event;
use crate::filter::EventFilter;
use crate::render::Renderer;
use crate::watcher::EventStreams;

/// Counters for one dispatch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub accepted: u64,
    pub filtered: u64,
    pub errors: u64,
}

pub struct Dispatcher<O, E> {
    filter: EventFilter,
    renderer: Renderer,
    out: O,
    err: E,
    stats: DispatchStats,
}

impl<O: Write, E: Write> Dispatcher<O, E> {
    pub fn new(filter: EventFilter, renderer: Renderer, out: O, err: E) -> Self {
        Self {
            filter,
            renderer,
            out,
            err,
            stats: DispatchStats::default(),
        }
    }

    /// Consumes both streams until `shutdown` fires or both channels close.
    ///
    /// Only write failures end the loop early; backend errors are reported
    /// and the loop keeps going.
    pub async fn run(
        &mut self,
        streams: &mut EventStreams,
        shutdown: CancellationToken,
    ) -> io::Result<DispatchStats> {
        let mut events_open = true;
        let mut errors_open = true;

        while events_open || errors_open {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("dispatch cancelled");
                    break;
                }
                received = streams.events.recv(), if events_open => match received {
                    Some(event) => self.handle_event(&event)?,
                    None => events_open = false,
                },
                received = streams.errors.recv(), if errors_open => match received {
                    Some(error) => self.handle_error(&error)?,
                    None => errors_open = false,
                },
            }
        }

        tracing::debug!(
            "dispatch finished: {} accepted, {} filtered, {} errors",
            self.stats.accepted,
            self.stats.filtered,
            self.stats.errors
        );
        Ok(self.stats)
    }

    /// Prints the event if its kinds are within the mask; drops it silently
    /// otherwise.
    pub fn handle_event(&mut self, event: &Event) -> io::Result<()> {
        if !self.filter.accepts(event) {
            self.stats.filtered += 1;
            return Ok(());
        }
        self.renderer.write_line(&mut self.out, event)?;
        self.out.flush()?;
        self.stats.accepted += 1;
        Ok(())
    }

    pub fn handle_error(&mut self, error: &WatchError) -> io::Result<()> {
        tracing::debug!("backend error: {:?}", error);
        writeln!(self.err, "{error}")?;
        self.err.flush()?;
        self.stats.errors += 1;
        Ok(())
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn into_writers(self) -> (O, E) {
        (self.out, self.err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Op;
    use crate::render::Template;
    use std::time::Duration;

    fn dispatcher(mask: Op) -> Dispatcher<Vec<u8>, Vec<u8>> {
        Dispatcher::new(
            EventFilter::new(mask),
            Renderer::Template(Template::compile("{{.Op}} {{.Name}}").unwrap()),
            Vec::new(),
            Vec::new(),
        )
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_filters_and_renders_until_channels_close() {
        let (sink, mut streams) = EventStreams::pair();
        sink.send_event(Event::new("/tmp/a", Op::CREATE));
        sink.send_event(Event::new("/tmp/b", Op::WRITE | Op::CHMOD));
        sink.send_event(Event::new("/tmp/c", Op::REMOVE));
        sink.send_error(WatchError::Rescan);
        drop(sink);

        let mut dispatcher = dispatcher(Op::DEFAULT_MASK);
        let stats = dispatcher
            .run(&mut streams, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            stats,
            DispatchStats {
                accepted: 2,
                filtered: 1,
                errors: 1
            }
        );
        let (out, err) = dispatcher.into_writers();
        assert_eq!(String::from_utf8(out).unwrap(), "CREATE /tmp/a\nREMOVE /tmp/c\n");
        assert_eq!(
            String::from_utf8(err).unwrap(),
            format!("{}\n", WatchError::Rescan)
        );
    }

    #[tokio::test]
    async fn test_cancellation_stops_idle_loop() {
        let (_sink, mut streams) = EventStreams::pair();
        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let mut dispatcher = dispatcher(Op::DEFAULT_MASK);
        let stats = tokio::time::timeout(
            Duration::from_secs(5),
            dispatcher.run(&mut streams, shutdown),
        )
        .await
        .expect("dispatcher should stop once cancelled")
        .unwrap();

        assert_eq!(stats, DispatchStats::default());
    }

    #[tokio::test]
    async fn test_errors_do_not_stop_the_loop() {
        let (sink, mut streams) = EventStreams::pair();
        sink.send_error(WatchError::Backend(notify::Error::generic("gone")));
        sink.send_event(Event::new("/tmp/after", Op::WRITE));
        drop(sink);

        let mut dispatcher = dispatcher(Op::WRITE);
        let stats = dispatcher
            .run(&mut streams, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.errors, 1);
        let (out, err) = dispatcher.into_writers();
        assert_eq!(String::from_utf8(out).unwrap(), "WRITE /tmp/after\n");
        assert_eq!(String::from_utf8(err).unwrap(), "gone\n");
    }

    #[tokio::test]
    async fn test_write_failure_ends_run() {
        let (sink, mut streams) = EventStreams::pair();
        sink.send_event(Event::new("/tmp/a", Op::CREATE));

        let mut dispatcher = Dispatcher::new(
            EventFilter::default(),
            Renderer::default(),
            BrokenPipe,
            Vec::new(),
        );
        let err = dispatcher
            .run(&mut streams, CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_filtered_event_writes_nothing() {
        let mut dispatcher = dispatcher(Op::WRITE);
        dispatcher
            .handle_event(&Event::new("/tmp/a", Op::WRITE | Op::CHMOD))
            .unwrap();

        assert_eq!(dispatcher.stats().filtered, 1);
        let (out, err) = dispatcher.into_writers();
        assert!(out.is_empty());
        assert!(err.is_empty());
    }
}
