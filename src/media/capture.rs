//! Capture thread: owns the frame source, runs the active tracker.
//!
//! The thread drives the [`Player`] state machine from the command
//! channel and emits [`PlayerEvent`]s back to the UI context. Flow
//! control is an explicit handshake: after a `Frame` event the pump
//! produces nothing until the UI sends `FrameAck`, so at most one frame
//! is ever in flight and frames arrive in strict order.

use std::collections::VecDeque;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use opencv::core::Mat;
use tracing::{debug, warn};

use crate::error::Error;
use crate::tracking::SharedTracker;

use super::messages::{PlayerCommand, PlayerEvent};
use super::player::{PlaybackState, Player};

/// Handle owned by the UI context. Dropping it shuts the thread down.
pub struct CaptureHandle {
    cmd_tx: Sender<PlayerCommand>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureHandle {
    /// Spawn the capture thread. `tracker` is the shared active-tracker
    /// slot; locking it serializes `track`/`paint` against UI input
    /// dispatch on the same instance.
    pub fn spawn(tracker: SharedTracker, event_tx: Sender<PlayerEvent>) -> Self {
        let (cmd_tx, cmd_rx) = unbounded();
        let handle = thread::Builder::new()
            .name("capture".into())
            .spawn(move || Pump::new(tracker, cmd_rx, event_tx).run())
            .expect("failed to spawn capture thread");
        Self {
            cmd_tx,
            handle: Some(handle),
        }
    }

    /// Send a command; safe at any time, including mid-fetch.
    pub fn send(&self, command: PlayerCommand) {
        let _ = self.cmd_tx.send(command);
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(PlayerCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// The capture-thread worker loop.
struct Pump {
    player: Player,
    tracker: SharedTracker,
    cmd_rx: Receiver<PlayerCommand>,
    event_tx: Sender<PlayerEvent>,
    /// Commands drained while a fetched frame was pending; processed
    /// before blocking on the channel again.
    pending: VecDeque<PlayerCommand>,
    fps: f64,
    max_speed: bool,
    /// True while a delivered frame has not been acked yet.
    awaiting_ack: bool,
    /// A produce was requested while a frame was still un-acked; it runs
    /// from the current cursor as soon as the ack arrives (coalescing
    /// rapid seeks into one delivery).
    deferred: bool,
    last_emit: Option<Instant>,
}

impl Pump {
    fn new(tracker: SharedTracker, cmd_rx: Receiver<PlayerCommand>, event_tx: Sender<PlayerEvent>) -> Self {
        Self {
            player: Player::new(),
            tracker,
            cmd_rx,
            event_tx,
            pending: VecDeque::new(),
            fps: 30.0,
            max_speed: false,
            awaiting_ack: false,
            deferred: false,
            last_emit: None,
        }
    }

    fn run(mut self) {
        loop {
            let command = if let Some(c) = self.pending.pop_front() {
                Some(c)
            } else if self.pump_active() {
                match self.cmd_rx.recv_timeout(self.frame_delay()) {
                    Ok(c) => Some(c),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            } else {
                match self.cmd_rx.recv() {
                    Ok(c) => Some(c),
                    Err(_) => return,
                }
            };

            match command {
                Some(PlayerCommand::Shutdown) => return,
                Some(c) => self.handle_command(c),
                // Timer tick: advance while playing.
                None => self.tick(),
            }
        }
    }

    /// Whether the pump should produce frames on its own.
    fn pump_active(&self) -> bool {
        self.player.state() == PlaybackState::Playing && !self.awaiting_ack
    }

    /// Remaining wait until the next frame is due.
    fn frame_delay(&self) -> Duration {
        if self.max_speed {
            return Duration::ZERO;
        }
        let target = Duration::from_secs_f64(1.0 / self.fps.max(1e-3));
        match self.last_emit {
            Some(at) => target.saturating_sub(at.elapsed()),
            None => Duration::ZERO,
        }
    }

    fn handle_command(&mut self, command: PlayerCommand) {
        match command {
            PlayerCommand::LoadMedia(descriptor) => match self.player.load(&descriptor) {
                Ok(info) => {
                    self.fps = info.fps;
                    self.emit(PlayerEvent::MediaOpened(info));
                    self.emit_state(PlaybackState::Stopped);
                    self.produce_current();
                }
                Err(e) => {
                    warn!("failed to open media: {e}");
                    self.emit(PlayerEvent::InvalidFile(e.to_string()));
                }
            },
            PlayerCommand::Play => {
                if self.player.play() {
                    self.emit_state(PlaybackState::Playing);
                    self.produce_current();
                }
            }
            PlayerCommand::Pause => {
                if self.player.pause() {
                    self.emit_state(PlaybackState::Paused);
                }
            }
            PlayerCommand::Stop => {
                if self.player.stop() {
                    self.emit_state(PlaybackState::Stopped);
                }
            }
            PlayerCommand::StepForward => {
                let was = self.player.state();
                let moved = self.player.step_forward();
                if self.player.state() != was {
                    self.emit_state(self.player.state());
                }
                if moved {
                    self.produce_current();
                }
            }
            PlayerCommand::StepBackward => {
                let was = self.player.state();
                let moved = self.player.step_backward();
                if self.player.state() != was {
                    self.emit_state(self.player.state());
                }
                if moved {
                    self.produce_current();
                }
            }
            PlayerCommand::Seek(index) => {
                if self.player.seek(index).is_some() {
                    self.produce_current();
                }
            }
            PlayerCommand::SetFps(fps) => {
                self.fps = fps.max(1e-3);
            }
            PlayerCommand::SetMaxSpeed(enabled) => {
                self.max_speed = enabled;
            }
            PlayerCommand::FrameAck => {
                self.awaiting_ack = false;
                if self.deferred {
                    self.deferred = false;
                    self.produce_current();
                }
            }
            PlayerCommand::Shutdown => unreachable!("handled in run()"),
        }
    }

    /// One pump tick: advance the cursor and deliver the next frame.
    fn tick(&mut self) {
        match self.player.advance() {
            Some(_) => self.produce_current(),
            // End of stream: the machine auto-paused.
            None => self.emit_state(self.player.state()),
        }
    }

    /// Fetch the frame under the cursor, run the tracker over it and
    /// deliver it. A state-invalidating command that arrived during the
    /// fetch discards the frame instead of delivering it stale.
    fn produce_current(&mut self) {
        // One frame in flight at a time; anything requested meanwhile is
        // delivered (from the then-current cursor) after the ack.
        if self.awaiting_ack {
            self.deferred = true;
            return;
        }
        let number = self.player.frame();
        let mut image = match self.player.fetch_current() {
            Ok(image) => image,
            Err(e) => {
                warn!("decode failed at frame {number}: {e}");
                self.emit(PlayerEvent::InvalidFile(e.to_string()));
                if self.player.stop() {
                    self.emit_state(PlaybackState::Stopped);
                }
                return;
            }
        };

        // Drain commands that raced the fetch; Stop/Seek/Load make the
        // fetched frame stale.
        while let Ok(c) = self.cmd_rx.try_recv() {
            self.pending.push_back(c);
        }
        if self.pending.iter().any(|c| {
            matches!(
                c,
                PlayerCommand::Stop
                    | PlayerCommand::Seek(_)
                    | PlayerCommand::LoadMedia(_)
                    | PlayerCommand::Shutdown
            )
        }) {
            debug!("discarding stale frame {number}");
            return;
        }

        self.run_tracker(&mut image, number);

        self.emit(PlayerEvent::Frame { number, image });
        self.awaiting_ack = true;
        self.last_emit = Some(Instant::now());
    }

    /// Invoke the active tracker under the shared lock. Tracker errors
    /// become notifications, never panics or thread-boundary errors.
    fn run_tracker(&mut self, image: &mut Mat, number: u32) {
        let mut guard = self.tracker.lock();
        let Some(tracker) = guard.as_mut() else {
            return;
        };
        if let Err(e) = tracker.track(image, number) {
            warn!("tracker `{}` failed at frame {number}: {e}", tracker.name());
            self.emit(PlayerEvent::Notification(format!(
                "tracker error at frame {number}: {e}"
            )));
        }
        match tracker.paint(image, number) {
            Ok(()) | Err(Error::Unsupported(_)) => {}
            Err(e) => {
                warn!("tracker `{}` paint failed: {e}", tracker.name());
            }
        }
    }

    fn emit_state(&mut self, state: PlaybackState) {
        // Mode changes are forwarded to the tracker under the lock, so a
        // concurrent input dispatch can never interleave.
        if let Some(tracker) = self.tracker.lock().as_mut() {
            tracker.mode_changed(state);
        }
        self.emit(PlayerEvent::StateChanged(state));
    }

    fn emit(&self, event: PlayerEvent) {
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::media::source::testing::{synthetic_info, SyntheticSource};
    use crate::media::source::{MediaInfo, MediaSource};
    use crate::error::Result;

    /// Source whose fetch takes long enough for commands to race it.
    struct SlowSource {
        len: u32,
        delay: Duration,
    }

    impl MediaSource for SlowSource {
        fn len(&self) -> u32 {
            self.len
        }

        fn fetch(&mut self, _index: u32) -> Result<Mat> {
            thread::sleep(self.delay);
            Ok(Mat::default())
        }
    }

    struct Rig {
        cmd_tx: Sender<PlayerCommand>,
        event_rx: Receiver<PlayerEvent>,
        handle: JoinHandle<()>,
    }

    fn spawn_rig(source: Box<dyn MediaSource>, info: MediaInfo) -> Rig {
        let (cmd_tx, cmd_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        let tracker: SharedTracker = Arc::new(Mutex::new(None));
        let mut pump = Pump::new(tracker, cmd_rx, event_tx);
        pump.player.attach(source, info);
        pump.max_speed = true;
        let handle = thread::spawn(move || pump.run());
        Rig {
            cmd_tx,
            event_rx,
            handle,
        }
    }

    fn next_frame(rig: &Rig) -> Option<u32> {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            match rig.event_rx.recv_timeout(Duration::from_millis(100)) {
                Ok(PlayerEvent::Frame { number, .. }) => return Some(number),
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
        None
    }

    #[test]
    fn test_flow_controlled_delivery_no_skip_no_dup() {
        const LEN: u32 = 100;
        let rig = spawn_rig(
            Box::new(SyntheticSource { len: LEN }),
            synthetic_info(LEN),
        );
        rig.cmd_tx.send(PlayerCommand::Play).unwrap();

        let mut seen = Vec::new();
        for _ in 0..LEN {
            let number = next_frame(&rig).expect("frame delivery stalled");

            // Flow control: nothing else may arrive until we ack. Wait a
            // moment and assert no second frame sneaks through.
            thread::sleep(Duration::from_millis(2));
            while let Ok(ev) = rig.event_rx.try_recv() {
                assert!(
                    !matches!(ev, PlayerEvent::Frame { .. }),
                    "frame produced before ack"
                );
            }

            seen.push(number);
            rig.cmd_tx.send(PlayerCommand::FrameAck).unwrap();
        }

        let expected: Vec<u32> = (0..LEN).collect();
        assert_eq!(seen, expected);

        // End of stream auto-pauses.
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut paused = false;
        while Instant::now() < deadline {
            match rig.event_rx.recv_timeout(Duration::from_millis(100)) {
                Ok(PlayerEvent::StateChanged(PlaybackState::Paused)) => {
                    paused = true;
                    break;
                }
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        assert!(paused, "no auto-pause at end of stream");

        rig.cmd_tx.send(PlayerCommand::Shutdown).unwrap();
        rig.handle.join().unwrap();
    }

    #[test]
    fn test_stale_frame_discarded_after_stop() {
        let rig = spawn_rig(
            Box::new(SlowSource {
                len: 10,
                delay: Duration::from_millis(150),
            }),
            synthetic_info(10),
        );
        rig.cmd_tx.send(PlayerCommand::Play).unwrap();

        // Wait for the Playing transition, then stop while the pump is
        // still inside the slow fetch of frame 0.
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            assert!(Instant::now() < deadline, "no Playing transition");
            match rig.event_rx.recv_timeout(Duration::from_millis(100)) {
                Ok(PlayerEvent::StateChanged(PlaybackState::Playing)) => break,
                Ok(_) | Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => panic!("pump died"),
            }
        }
        rig.cmd_tx.send(PlayerCommand::Stop).unwrap();

        // The fetched frame must be discarded: only the Stopped transition
        // may follow, never a Frame event.
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut stopped = false;
        while Instant::now() < deadline {
            match rig.event_rx.recv_timeout(Duration::from_millis(100)) {
                Ok(PlayerEvent::Frame { .. }) => panic!("stale frame delivered"),
                Ok(PlayerEvent::StateChanged(PlaybackState::Stopped)) => {
                    stopped = true;
                    break;
                }
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        assert!(stopped, "stop not processed");

        rig.cmd_tx.send(PlayerCommand::Shutdown).unwrap();
        rig.handle.join().unwrap();
    }

    #[test]
    fn test_step_commands_deliver_single_frames() {
        let rig = spawn_rig(Box::new(SyntheticSource { len: 3 }), synthetic_info(3));

        rig.cmd_tx.send(PlayerCommand::StepForward).unwrap();
        assert_eq!(next_frame(&rig), Some(1));
        rig.cmd_tx.send(PlayerCommand::FrameAck).unwrap();

        rig.cmd_tx.send(PlayerCommand::StepForward).unwrap();
        assert_eq!(next_frame(&rig), Some(2));
        rig.cmd_tx.send(PlayerCommand::FrameAck).unwrap();

        // Clamped at the last frame: no event at all.
        rig.cmd_tx.send(PlayerCommand::StepForward).unwrap();
        thread::sleep(Duration::from_millis(50));
        while let Ok(ev) = rig.event_rx.try_recv() {
            assert!(!matches!(ev, PlayerEvent::Frame { .. }));
        }

        rig.cmd_tx.send(PlayerCommand::Shutdown).unwrap();
        rig.handle.join().unwrap();
    }

    #[test]
    fn test_produce_while_unacked_is_deferred() {
        let rig = spawn_rig(Box::new(SyntheticSource { len: 10 }), synthetic_info(10));

        rig.cmd_tx.send(PlayerCommand::StepForward).unwrap();
        assert_eq!(next_frame(&rig), Some(1));

        // Step again without acking: nothing may be delivered yet.
        rig.cmd_tx.send(PlayerCommand::StepForward).unwrap();
        thread::sleep(Duration::from_millis(50));
        while let Ok(ev) = rig.event_rx.try_recv() {
            assert!(
                !matches!(ev, PlayerEvent::Frame { .. }),
                "frame produced before ack"
            );
        }

        // The ack releases the deferred production from the moved cursor.
        rig.cmd_tx.send(PlayerCommand::FrameAck).unwrap();
        assert_eq!(next_frame(&rig), Some(2));

        rig.cmd_tx.send(PlayerCommand::Shutdown).unwrap();
        rig.handle.join().unwrap();
    }
}
