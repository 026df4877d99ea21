//! Remote control: a single-port, line-oriented, password-gated command
//! protocol that drives the scheduler through the same entry points a local
//! caller uses. One session may be active at a time; further connections
//! are closed until it ends.

use crate::scheduler::SchedulerError;
use crate::MouseButton;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Pause after a listener-level accept error before retrying.
const ACCEPT_RETRY_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub enabled: bool,
    pub port: u16,
    pub password: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 12345,
            password: String::new(),
        }
    }
}

/// Scheduler operations the server is allowed to invoke. The server never
/// touches scheduler internals directly.
pub trait RemoteController: Send + Sync {
    /// Start the scheduler with the last-saved configuration.
    fn start(&self) -> Result<(), SchedulerError>;
    fn stop(&self);
    fn click(&self, button: MouseButton, x: i32, y: i32) -> Result<(), SchedulerError>;
}

pub struct RemoteServer;

/// Handle to a listening server.
pub struct RemoteHandle {
    shutdown: Arc<AtomicBool>,
    port: u16,
    thread: Option<JoinHandle<()>>,
}

impl RemoteHandle {
    /// Actual bound port (useful when the config asked for port 0).
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Stop accepting and join the accept loop. Open sessions run to their
    /// natural end on their own threads.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Poke the blocking accept so the loop observes the flag.
        let _ = TcpStream::connect(("127.0.0.1", self.port));
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl RemoteServer {
    /// Bind the port and start the accept loop on its own thread. A bind
    /// failure is surfaced to the caller; remote control stays disabled.
    pub fn listen(
        config: &RemoteConfig,
        controller: Arc<dyn RemoteController>,
    ) -> io::Result<RemoteHandle> {
        let listener = TcpListener::bind(("0.0.0.0", config.port))?;
        let port = listener.local_addr()?.port();
        let shutdown = Arc::new(AtomicBool::new(false));
        let password = config.password.clone();

        let flag = shutdown.clone();
        let thread = thread::spawn(move || {
            accept_loop(listener, &flag, &password, &controller);
        });

        info!(port, "remote control listening");
        Ok(RemoteHandle {
            shutdown,
            port,
            thread: Some(thread),
        })
    }
}

fn accept_loop(
    listener: TcpListener,
    shutdown: &AtomicBool,
    password: &str,
    controller: &Arc<dyn RemoteController>,
) {
    // One session at a time: a second connection while a session is open is
    // closed without a challenge. The handler still runs on its own thread,
    // so a stalled client never blocks the accept loop itself.
    let session_active = Arc::new(AtomicBool::new(false));
    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, addr)) => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                if session_active
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
                {
                    debug!(%addr, "turning away connection, session already active");
                    continue;
                }
                info!(%addr, "remote connection");
                let password = password.to_string();
                let controller = controller.clone();
                let active = session_active.clone();
                thread::spawn(move || {
                    if let Err(e) = handle_session(stream, &password, controller.as_ref()) {
                        warn!(%addr, error = %e, "remote session ended with I/O error");
                    }
                    active.store(false, Ordering::SeqCst);
                });
            }
            Err(e) => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                error!(error = %e, "accept failed, pausing before retry");
                thread::sleep(ACCEPT_RETRY_PAUSE);
            }
        }
    }
    info!("remote control accept loop exited");
}

fn send_line(stream: &mut TcpStream, message: &str) -> io::Result<()> {
    stream.write_all(message.as_bytes())?;
    stream.write_all(b"\n")
}

fn handle_session(
    mut stream: TcpStream,
    password: &str,
    controller: &dyn RemoteController,
) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();

    send_line(&mut stream, "AUTH_REQUIRED")?;
    if reader.read_line(&mut line)? == 0 {
        return Ok(());
    }
    if line.trim_end_matches(['\r', '\n']) != password {
        warn!("remote authentication failed");
        send_line(&mut stream, "AUTH_FAILED")?;
        return Ok(());
    }
    send_line(&mut stream, "AUTH_SUCCESS")?;

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            debug!("remote peer disconnected");
            return Ok(());
        }
        let command = line.trim();
        debug!(command, "remote command");
        let reply = dispatch(command, controller);
        send_line(&mut stream, reply)?;
    }
}

fn dispatch(command: &str, controller: &dyn RemoteController) -> &'static str {
    let parts: Vec<&str> = command.split_whitespace().collect();
    match parts.as_slice() {
        ["START"] => {
            if let Err(e) = controller.start() {
                warn!(error = %e, "remote START had no effect");
            }
            "STARTED"
        }
        ["STOP"] => {
            controller.stop();
            "STOPPED"
        }
        ["CLICK", button, x, y] => {
            let parsed = (
                button.parse::<MouseButton>(),
                x.parse::<i32>(),
                y.parse::<i32>(),
            );
            match parsed {
                (Ok(button), Ok(x), Ok(y)) => {
                    if let Err(e) = controller.click(button, x, y) {
                        warn!(error = %e, "remote CLICK failed");
                    }
                    "CLICKED"
                }
                _ => "UNKNOWN_COMMAND",
            }
        }
        _ => "UNKNOWN_COMMAND",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{Scheduler, SchedulerState};
    use crate::trigger::{Rgb, TriggerSensors};
    use crate::{ActionExecutor, CursorTracker, Point, PointerAction, SessionConfig, TriggerSet};
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockController {
        calls: Mutex<Vec<String>>,
    }

    impl RemoteController for MockController {
        fn start(&self) -> Result<(), SchedulerError> {
            self.calls.lock().unwrap().push("start".into());
            Ok(())
        }

        fn stop(&self) {
            self.calls.lock().unwrap().push("stop".into());
        }

        fn click(&self, button: MouseButton, x: i32, y: i32) -> Result<(), SchedulerError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("click {button} {x} {y}"));
            Ok(())
        }
    }

    fn spawn_server(password: &str) -> (RemoteHandle, Arc<MockController>) {
        let controller = Arc::new(MockController::default());
        let config = RemoteConfig {
            enabled: true,
            port: 0,
            password: password.to_string(),
        };
        let handle = RemoteServer::listen(&config, controller.clone()).unwrap();
        (handle, controller)
    }

    struct Client {
        reader: BufReader<TcpStream>,
        stream: TcpStream,
    }

    impl Client {
        fn connect(port: u16) -> Self {
            let stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
            stream
                .set_read_timeout(Some(Duration::from_secs(2)))
                .unwrap();
            Self {
                reader: BufReader::new(stream.try_clone().unwrap()),
                stream,
            }
        }

        fn send(&mut self, line: &str) {
            self.stream.write_all(line.as_bytes()).unwrap();
            self.stream.write_all(b"\n").unwrap();
        }

        fn recv(&mut self) -> String {
            let mut line = String::new();
            self.reader.read_line(&mut line).unwrap();
            line.trim_end().to_string()
        }

        /// Read until EOF; returns the number of extra bytes.
        fn read_to_eof(&mut self) -> usize {
            let mut rest = String::new();
            self.reader.read_line(&mut rest).unwrap_or(0)
        }
    }

    #[test]
    fn wrong_password_is_rejected_and_closed() {
        let (handle, controller) = spawn_server("secret");
        let mut client = Client::connect(handle.port());
        assert_eq!(client.recv(), "AUTH_REQUIRED");
        client.send("wrong");
        assert_eq!(client.recv(), "AUTH_FAILED");
        // Connection is closed without reaching the command loop.
        assert_eq!(client.read_to_eof(), 0);
        assert!(controller.calls.lock().unwrap().is_empty());
        handle.shutdown();
    }

    #[test]
    fn command_loop_dispatches_and_acknowledges() {
        let (handle, controller) = spawn_server("secret");
        let mut client = Client::connect(handle.port());
        assert_eq!(client.recv(), "AUTH_REQUIRED");
        client.send("secret");
        assert_eq!(client.recv(), "AUTH_SUCCESS");

        client.send("START");
        assert_eq!(client.recv(), "STARTED");
        client.send("CLICK right 30 40");
        assert_eq!(client.recv(), "CLICKED");
        client.send("STOP");
        assert_eq!(client.recv(), "STOPPED");
        client.send("DANCE");
        assert_eq!(client.recv(), "UNKNOWN_COMMAND");
        client.send("CLICK sideways 1 2");
        assert_eq!(client.recv(), "UNKNOWN_COMMAND");

        assert_eq!(
            *controller.calls.lock().unwrap(),
            vec!["start", "click right 30 40", "stop"]
        );
        handle.shutdown();
    }

    #[test]
    fn second_client_is_served_after_the_first_disconnects() {
        let (handle, _controller) = spawn_server("pw");
        {
            let mut first = Client::connect(handle.port());
            assert_eq!(first.recv(), "AUTH_REQUIRED");
        }
        // The session slot frees once the handler observes the disconnect;
        // retry until the listener hands out a fresh challenge.
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        loop {
            let mut second = Client::connect(handle.port());
            let mut line = String::new();
            if second.reader.read_line(&mut line).unwrap_or(0) > 0 {
                assert_eq!(line.trim_end(), "AUTH_REQUIRED");
                second.send("pw");
                assert_eq!(second.recv(), "AUTH_SUCCESS");
                break;
            }
            assert!(
                std::time::Instant::now() < deadline,
                "session slot never freed"
            );
            thread::sleep(Duration::from_millis(10));
        }
        handle.shutdown();
    }

    #[test]
    fn concurrent_connection_is_turned_away_while_a_session_is_open() {
        let (handle, controller) = spawn_server("pw");
        let mut first = Client::connect(handle.port());
        assert_eq!(first.recv(), "AUTH_REQUIRED");
        first.send("pw");
        assert_eq!(first.recv(), "AUTH_SUCCESS");

        // Closed without a challenge while the first session is open.
        let mut second = Client::connect(handle.port());
        assert_eq!(second.read_to_eof(), 0);

        // The open session is unaffected.
        first.send("START");
        assert_eq!(first.recv(), "STARTED");
        assert_eq!(*controller.calls.lock().unwrap(), vec!["start"]);
        handle.shutdown();
    }

    // Wiring a real scheduler behind the controller trait: the remote START
    // drives the Idle -> Running transition.

    struct NoopExec;

    impl ActionExecutor for NoopExec {
        fn execute(&self, _action: &PointerAction) -> Result<(), String> {
            Ok(())
        }
    }

    struct StillCursor;

    impl CursorTracker for StillCursor {
        fn position(&self) -> Point {
            Point::new(0, 0)
        }
    }

    struct AllowAll;

    impl TriggerSensors for AllowAll {
        fn pixel_color(&self, _x: i32, _y: i32) -> Option<Rgb> {
            Some(Rgb::default())
        }

        fn image_visible(&self, _path: &Path, _confidence: f32) -> Option<bool> {
            Some(true)
        }
    }

    struct SchedulerController {
        scheduler: Arc<Scheduler>,
        config: SessionConfig,
    }

    impl RemoteController for SchedulerController {
        fn start(&self) -> Result<(), SchedulerError> {
            self.scheduler
                .start(self.config.clone(), TriggerSet::default())
        }

        fn stop(&self) {
            self.scheduler.stop();
        }

        fn click(&self, button: MouseButton, x: i32, y: i32) -> Result<(), SchedulerError> {
            self.scheduler.click_once(button, x, y)
        }
    }

    #[test]
    fn remote_start_transitions_the_scheduler_to_running() {
        let scheduler = Arc::new(Scheduler::new(
            Arc::new(NoopExec),
            Arc::new(StillCursor),
            Arc::new(AllowAll),
        ));
        let controller = Arc::new(SchedulerController {
            scheduler: scheduler.clone(),
            config: SessionConfig {
                interval_ms: 10_000,
                ..SessionConfig::default()
            },
        });
        let config = RemoteConfig {
            enabled: true,
            port: 0,
            password: "pw".into(),
        };
        let handle = RemoteServer::listen(&config, controller).unwrap();

        assert_eq!(scheduler.state(), SchedulerState::Idle);
        let mut client = Client::connect(handle.port());
        assert_eq!(client.recv(), "AUTH_REQUIRED");
        client.send("pw");
        assert_eq!(client.recv(), "AUTH_SUCCESS");
        client.send("START");
        assert_eq!(client.recv(), "STARTED");
        assert_eq!(scheduler.state(), SchedulerState::Running);
        client.send("STOP");
        assert_eq!(client.recv(), "STOPPED");

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while scheduler.state() != SchedulerState::Idle && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        handle.shutdown();
    }
}
