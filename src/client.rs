// ABOUTME: The public Client handle and its construction API (create_client equivalent)
// ABOUTME: Client only ever talks to the engine task through an mpsc::Sender<Command>

use crate::command::{Arg, Command};
use crate::commands::RedisCommands;
use crate::endpoint::Endpoint;
use crate::engine::{AsyncDuplex, Engine};
use crate::error::{RedisError, RedisResult};
use crate::events::Event;
use crate::options::ClientOptions;
use crate::value::Value;

use tokio::net::{TcpStream, UnixStream};
use tokio::sync::mpsc;

/// A cheap, `Clone`-able handle to a connection engine running on its own
/// task. Never touches the socket, queues, or engine state directly — every
/// operation crosses into the engine task as a [`Command`] over a bounded
/// `mpsc` channel, matching §5's "single owning task" concurrency model.
#[derive(Clone)]
pub struct Client {
    submissions: mpsc::Sender<Command>,
}

/// How many in-flight submissions may queue in the channel into the engine
/// task before `send_command` itself starts applying backpressure on the
/// sender side, independent of `command_queue_high_water`.
const SUBMISSION_CHANNEL_CAPACITY: usize = 256;

impl Client {
    /// Dials `endpoint` (accepting any of the three forms `Endpoint::parse`
    /// understands: `host:port`, a `redis://` URL, or a unix socket path),
    /// spawns the engine task, and returns the `Client` handle paired with
    /// its event stream. Mirrors the teacher's `ClientBuilder::client`/
    /// `DefaultClient::connect` naming for the construction entry point.
    pub async fn connect(
        endpoint: &str,
        mut options: ClientOptions,
    ) -> RedisResult<(Client, mpsc::UnboundedReceiver<Event>)> {
        let (endpoint, password, db) = Endpoint::parse_with_auth(endpoint)
            .map_err(|e| RedisError::InvalidEndpoint(e.to_string()))?;
        if options.auth_pass.is_none() {
            options.auth_pass = password;
        }

        let (tx, mut rx) = mpsc::channel(SUBMISSION_CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut engine = Engine::new(options.clone());
            let connect = move || dial(endpoint.clone(), options.clone());
            let _ = engine.run(connect, &mut rx, &events_tx).await;
        });

        let client = Client { submissions: tx };
        if let Some(db) = db {
            let mut selector = client.clone();
            selector.select(db).await?;
        }
        Ok((client, events_rx))
    }

    /// Builds a `Command` from `args`, submits it to the engine task, and
    /// awaits its reply. The sole submission path, per §4.4's
    /// `send_command`; a dropped channel (engine task gone) surfaces as
    /// [`RedisError::ConnectionGone`] rather than a panic.
    async fn submit(&self, args: Vec<Arg>) -> RedisResult<Value> {
        let (command, reply) = Command::new(args);
        self.submissions
            .send(command)
            .await
            .map_err(|_| RedisError::ConnectionGone("engine task is gone".into()))?;
        reply
            .await
            .map_err(|_| RedisError::ConnectionGone("engine task dropped the reply".into()))?
    }
}

impl RedisCommands for Client {
    async fn send_command(&mut self, args: Vec<Arg>) -> RedisResult<Value> {
        self.submit(args).await
    }
}

/// Establishes one fresh transport for `endpoint`, applying `socket_nodelay`
/// for TCP. Called once per connect/reconnect attempt by [`Engine::run`];
/// boxed so `Endpoint`'s two transport kinds (`TcpStream`/`UnixStream`)
/// share a single concrete `T` for the engine's generic connect closure.
async fn dial(endpoint: Endpoint, options: ClientOptions) -> std::io::Result<Box<dyn AsyncDuplex>> {
    match endpoint {
        Endpoint::Tcp { host, port } => {
            let stream = TcpStream::connect((host.as_str(), port)).await?;
            stream.set_nodelay(options.socket_nodelay)?;
            Ok(Box::new(stream))
        }
        Endpoint::Unix(path) => {
            let stream = UnixStream::connect(path).await?;
            Ok(Box::new(stream))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ClientOptions;

    #[test]
    fn client_is_clone_and_send() {
        fn assert_clone_send<T: Clone + Send>() {}
        assert_clone_send::<Client>();
    }

    #[tokio::test]
    async fn connect_rejects_invalid_endpoint() {
        let result = Client::connect("redis:///", ClientOptions::default()).await;
        assert!(matches!(result, Err(RedisError::InvalidEndpoint(_))));
    }
}
