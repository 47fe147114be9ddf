//! Starts one conversation per new-face signal, never two at once.

use crate::context::{CoordinationContext, Wake};
use greeter_core::ShutdownSignal;
use greeter_voice::{ConversationSession, MicListener, PicoSpeaker, VoiceConfig};
use std::sync::Arc;
use std::time::Duration;

/// Runs one complete conversation. Returns when it has ended.
pub trait SessionRunner: Send {
    fn run_session(&mut self, shutdown: &ShutdownSignal);
}

/// Production runner: Pico TTS out, microphone + recognizer in.
pub struct VoiceSessionRunner {
    config: VoiceConfig,
}

impl VoiceSessionRunner {
    pub fn new(config: VoiceConfig) -> Self {
        Self { config }
    }
}

impl SessionRunner for VoiceSessionRunner {
    fn run_session(&mut self, shutdown: &ShutdownSignal) {
        let speaker = PicoSpeaker::new(self.config.language.clone());
        let listener = MicListener::new(self.config.clone());
        ConversationSession::new(speaker, listener).run(shutdown);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Idle,
    ConversationActive,
}

pub struct Dispatcher<R> {
    ctx: Arc<CoordinationContext>,
    runner: R,
    poll: Duration,
    state: DispatcherState,
    sessions: u64,
}

impl<R: SessionRunner> Dispatcher<R> {
    pub fn new(ctx: Arc<CoordinationContext>, runner: R, poll: Duration) -> Self {
        Self {
            ctx,
            runner,
            poll,
            state: DispatcherState::Idle,
            sessions: 0,
        }
    }

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    /// Conversations started so far.
    pub fn sessions(&self) -> u64 {
        self.sessions
    }

    /// Loop until shutdown.
    pub fn run(&mut self) {
        tracing::info!(poll_ms = self.poll.as_millis() as u64, "dispatcher waiting for new faces");
        while self.step() {}
        tracing::info!(sessions = self.sessions, "dispatcher stopped");
    }

    /// One bounded wait, plus a full conversation if a new face was pending.
    /// Returns `false` once shutdown has been requested.
    pub fn step(&mut self) -> bool {
        match self.ctx.wait_for_new_face(self.poll) {
            Wake::Shutdown => false,
            Wake::TimedOut => true,
            Wake::NewFace => {
                self.converse();
                true
            }
        }
    }

    /// The context has already set the activity flag for us.
    fn converse(&mut self) {
        self.state = DispatcherState::ConversationActive;
        self.sessions += 1;
        tracing::info!(session = self.sessions, "new visitor; starting conversation");

        let shutdown = self.ctx.shutdown().clone();
        let runner = &mut self.runner;
        let outcome = std::thread::scope(|scope| {
            std::thread::Builder::new()
                .name("greeter-session".into())
                .spawn_scoped(scope, move || runner.run_session(&shutdown))
                .map(|handle| handle.join())
        });

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(_)) => tracing::error!(session = self.sessions, "conversation panicked"),
            Err(e) => tracing::error!(error = %e, "failed to spawn conversation thread"),
        }

        self.ctx.finish_conversation();
        self.state = DispatcherState::Idle;
        tracing::info!("conversation finished; waiting for the next new face");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greeter_core::{Embedding, FaceRegistry};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ctx() -> Arc<CoordinationContext> {
        Arc::new(CoordinationContext::new(
            FaceRegistry::new(0.65, Duration::from_secs(20)),
            ShutdownSignal::new(),
        ))
    }

    fn emb(i: usize) -> Embedding {
        let mut v = vec![0.0f32; 16];
        v[i % 16] = 1.0;
        Embedding::new(v)
    }

    /// Observes the flag and overlap from inside each session.
    #[derive(Clone)]
    struct Probe {
        ctx: Arc<CoordinationContext>,
        running: Arc<AtomicUsize>,
        max_running: Arc<AtomicUsize>,
        started: Arc<AtomicUsize>,
        flag_seen_clear: Arc<AtomicUsize>,
        /// Faces registered from inside each session.
        faces_during: usize,
        hold: Duration,
        panic: bool,
    }

    impl Probe {
        fn new(ctx: &Arc<CoordinationContext>) -> Self {
            Self {
                ctx: ctx.clone(),
                running: Arc::default(),
                max_running: Arc::default(),
                started: Arc::default(),
                flag_seen_clear: Arc::default(),
                faces_during: 0,
                hold: Duration::ZERO,
                panic: false,
            }
        }
    }

    impl SessionRunner for Probe {
        fn run_session(&mut self, _shutdown: &ShutdownSignal) {
            let n = self.started.fetch_add(1, Ordering::SeqCst);
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);
            if !self.ctx.is_conversation_active() {
                self.flag_seen_clear.fetch_add(1, Ordering::SeqCst);
            }
            for i in 0..self.faces_during {
                self.ctx.register_face(&emb(100 + n * 10 + i));
            }
            std::thread::sleep(self.hold);
            self.running.fetch_sub(1, Ordering::SeqCst);
            if self.panic {
                panic!("session blew up");
            }
        }
    }

    #[test]
    fn test_idle_step_times_out() {
        let c = ctx();
        let mut d = Dispatcher::new(c.clone(), Probe::new(&c), Duration::from_millis(10));
        assert!(d.step());
        assert_eq!(d.sessions(), 0);
        assert_eq!(d.state(), DispatcherState::Idle);
    }

    #[test]
    fn test_new_face_runs_one_session_and_returns_to_idle() {
        let c = ctx();
        let probe = Probe::new(&c);
        let mut d = Dispatcher::new(c.clone(), probe.clone(), Duration::from_millis(10));

        c.register_face(&emb(0));
        assert!(d.step());

        assert_eq!(probe.started.load(Ordering::SeqCst), 1);
        assert_eq!(probe.flag_seen_clear.load(Ordering::SeqCst), 0);
        assert_eq!(d.state(), DispatcherState::Idle);
        assert!(!c.is_conversation_active());
        assert!(!c.is_face_pending());
    }

    #[test]
    fn test_faces_during_session_are_not_queued() {
        let c = ctx();
        let mut probe = Probe::new(&c);
        probe.faces_during = 3;
        let mut d = Dispatcher::new(c.clone(), probe.clone(), Duration::from_millis(10));

        c.register_face(&emb(0));
        d.step();
        // The three new people seen mid-conversation did not re-arm the latch.
        assert_eq!(c.snapshot().unique_faces, 4);
        assert!(!c.is_face_pending());
        d.step();
        assert_eq!(probe.started.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_session_still_clears_flag() {
        let c = ctx();
        let mut probe = Probe::new(&c);
        probe.panic = true;
        let mut d = Dispatcher::new(c.clone(), probe, Duration::from_millis(10));

        c.register_face(&emb(0));
        assert!(d.step());
        assert!(!c.is_conversation_active());
        assert_eq!(d.state(), DispatcherState::Idle);

        c.register_face(&emb(1));
        assert!(d.step());
        assert_eq!(d.sessions(), 2);
    }

    #[test]
    fn test_never_overlaps_under_concurrent_signals() {
        let c = ctx();
        let mut probe = Probe::new(&c);
        probe.hold = Duration::from_millis(20);
        let observer = probe.clone();

        let dispatcher = {
            let c = c.clone();
            std::thread::spawn(move || {
                let mut d = Dispatcher::new(c, probe, Duration::from_millis(5));
                d.run();
                d.sessions()
            })
        };

        let producers: Vec<_> = (0..4)
            .map(|t| {
                let c = c.clone();
                std::thread::spawn(move || {
                    for i in 0..4 {
                        c.register_face(&emb(t * 4 + i));
                        std::thread::sleep(Duration::from_millis(7));
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }

        std::thread::sleep(Duration::from_millis(100));
        c.request_shutdown();
        let sessions = dispatcher.join().unwrap();

        assert!(sessions >= 1);
        assert_eq!(observer.max_running.load(Ordering::SeqCst), 1);
        assert_eq!(observer.flag_seen_clear.load(Ordering::SeqCst), 0);
        assert!(!c.is_conversation_active());
    }

    #[test]
    fn test_shutdown_stops_run() {
        let c = ctx();
        let probe = Probe::new(&c);
        c.request_shutdown();
        let mut d = Dispatcher::new(c.clone(), probe, Duration::from_secs(10));
        d.run();
        assert!(!d.step());
    }
}
