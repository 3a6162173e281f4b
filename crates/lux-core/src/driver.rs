// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The fixed-rate tick driver.
//!
//! One dedicated thread owns the [`Engine`] and every [`FrameSink`]; nothing
//! else touches them. Between ticks the thread sleeps until the next deadline
//! on the monotonic clock. A wake later than one full period does not replay
//! skipped ticks: the driver runs the next tick immediately and the engine
//! clamps `dt`.
//!
//! Shutdown protocol: [`DriverHandle::stop`] completes the current tick,
//! enqueues the engine-level blackout, runs one final tick (zeroed bundles),
//! and then shuts each sink down — the Art-Net sink emits its per-universe
//! blackout packets there — before the thread exits.

use crate::engine::{Command, Engine};
use crate::frame::FrameSink;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Startup failures of the tick driver.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The OS refused to spawn the driver thread.
    #[error("failed to spawn tick driver thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Handle owned by the embedding process; cloning the command sender is the
/// only way other threads reach the engine.
#[derive(Debug)]
pub struct DriverHandle {
    commands: Sender<Command>,
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl DriverHandle {
    /// Returns a cloneable command sender.
    #[must_use]
    pub fn commands(&self) -> Sender<Command> {
        self.commands.clone()
    }

    /// Enqueues a command for the next drain. Returns false once the driver
    /// has exited.
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Signals shutdown and blocks until the final tick and sink blackout
    /// have completed.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Spawns the tick driver thread.
pub fn spawn(
    mut engine: Engine,
    mut sinks: Vec<Box<dyn FrameSink>>,
) -> Result<DriverHandle, DriverError> {
    let (commands, queue) = mpsc::channel::<Command>();
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);

    let period = Duration::from_secs_f64(engine.period());
    let join = thread::Builder::new()
        .name("lux-tick".into())
        .spawn(move || {
            let mut last = Instant::now();
            let mut deadline = last + period;
            while !stop_flag.load(Ordering::Acquire) {
                let now = Instant::now();
                if now < deadline {
                    thread::sleep(deadline - now);
                }
                let now = Instant::now();
                let dt = now.duration_since(last).as_secs_f64();
                last = now;
                // Late by more than a period: tick immediately, skip nothing.
                deadline = if now > deadline + period {
                    now + period
                } else {
                    deadline + period
                };

                let frame = engine.tick(dt, &queue);
                dispatch(&mut engine, &mut sinks, &frame);
            }

            // Final tick under the blackout override, then sink shutdown.
            engine.apply(Command::Blackout);
            let frame = engine.tick(engine.period(), &queue);
            dispatch(&mut engine, &mut sinks, &frame);
            for sink in &mut sinks {
                sink.shutdown();
            }
        })?;

    Ok(DriverHandle {
        commands,
        stop,
        join: Some(join),
    })
}

/// Feeds one frame to every sink and folds fault reports back into the
/// engine's per-instance error counters.
fn dispatch(engine: &mut Engine, sinks: &mut [Box<dyn FrameSink>], frame: &crate::frame::Frame) {
    let patch = engine.patch();
    for sink in sinks.iter_mut() {
        let feedback = sink.frame(frame, &patch);
        for fixture in feedback.dropped_fixtures {
            if let Some(owner) = frame.sources.get(&fixture) {
                engine.note_soft_error(owner);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::frame::{Frame, SinkFeedback};
    use crate::model::Patch;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        frames: Arc<Mutex<Vec<u64>>>,
        shutdowns: Arc<Mutex<u32>>,
    }

    impl FrameSink for Recorder {
        fn frame(&mut self, frame: &Frame, _patch: &Patch) -> SinkFeedback {
            self.frames.lock().unwrap().push(frame.frame_number);
            SinkFeedback::default()
        }

        fn shutdown(&mut self) {
            *self.shutdowns.lock().unwrap() += 1;
        }
    }

    #[test]
    fn stop_runs_exactly_one_final_tick_and_shuts_sinks_down() {
        let recorder = Recorder::default();
        let frames = Arc::clone(&recorder.frames);
        let shutdowns = Arc::clone(&recorder.shutdowns);

        let handle = spawn(Engine::new(200.0), vec![Box::new(recorder)]).unwrap();
        thread::sleep(Duration::from_millis(50));
        handle.stop();

        let seen = frames.lock().unwrap().clone();
        assert!(!seen.is_empty());
        // Frame numbers are gapless: no tick is emitted twice or skipped.
        for pair in seen.windows(2) {
            assert_eq!(pair[1], pair[0] + 1);
        }
        assert_eq!(*shutdowns.lock().unwrap(), 1);
    }

    #[test]
    fn commands_reach_the_engine_between_ticks() {
        let recorder = Recorder::default();
        let frames = Arc::clone(&recorder.frames);

        let handle = spawn(Engine::new(200.0), vec![Box::new(recorder)]).unwrap();
        assert!(handle.send(Command::SetFader {
            id: crate::ident::InputId::new("f-1"),
            value: 0.5,
        }));
        thread::sleep(Duration::from_millis(30));
        handle.stop();
        assert!(!frames.lock().unwrap().is_empty());
    }
}
