//! Process group: rendezvous, barrier, abort
//!
//! The leader holds one TCP connection per member; members hold one connection
//! to the leader. Barriers carry a sequence number so a member can never be
//! released by a stale barrier.
//!
//! Barriers have no timeout. A member that is alive but stuck blocks the whole
//! group; a member whose connection drops, or that sends `Abort`, fails the
//! barrier with [`CoordinationError::PeerFailed`].

use super::protocol::{
    read_message, write_message, AbortMessage, HelloMessage, Message, WelcomeMessage,
    PROTOCOL_VERSION,
};
use super::{device_count, CoordinationError, GroupConfig, WorkerIdentity};
use log::{debug, info, warn};
use std::io;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout, Instant};

const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Connection from the leader to one member
struct PeerLink {
    rank: usize,
    host: String,
    stream: TcpStream,
}

enum Peers {
    /// World size 1: nothing to synchronize with
    Solo,
    /// Rank 0: links to ranks 1..world_size, ordered by rank
    Leader(Vec<PeerLink>),
    /// Rank > 0: link to the leader
    Member(TcpStream),
}

/// An established process group
pub struct ProcessGroup {
    identity: WorkerIdentity,
    peers: Peers,
    next_barrier: u64,
}

impl ProcessGroup {
    /// Join (or, on rank 0, form) the process group
    ///
    /// Blocks until every rank has joined. Members retry connecting to the
    /// leader until `config.rendezvous_timeout` elapses.
    pub async fn bootstrap(config: &GroupConfig) -> Result<Self, CoordinationError> {
        config.validate()?;

        let identity = WorkerIdentity::new(config.rank, config.world_size, device_count());
        info!(
            "[rank {}] joining process group (world size {}, local index {}, rendezvous {})",
            identity.global_rank,
            identity.world_size,
            identity.local_index,
            config.master_endpoint()
        );

        let peers = if identity.world_size == 1 {
            Peers::Solo
        } else if identity.is_leader() {
            Peers::Leader(form_group(config).await?)
        } else {
            Peers::Member(join_group(config).await?)
        };

        info!("[rank {}] process group established", identity.global_rank);

        Ok(Self {
            identity,
            peers,
            next_barrier: 0,
        })
    }

    pub fn identity(&self) -> WorkerIdentity {
        self.identity
    }

    pub fn rank(&self) -> usize {
        self.identity.global_rank
    }

    pub fn world_size(&self) -> usize {
        self.identity.world_size
    }

    pub fn is_leader(&self) -> bool {
        self.identity.is_leader()
    }

    /// Block until every rank has called `barrier` for this synchronization point
    pub async fn barrier(&mut self) -> Result<(), CoordinationError> {
        let barrier = self.next_barrier;
        self.next_barrier += 1;
        debug!("[rank {}] entering barrier {}", self.identity.global_rank, barrier);

        match &mut self.peers {
            Peers::Solo => {}
            Peers::Leader(links) => {
                for link in links.iter_mut() {
                    match read_message(&mut link.stream).await {
                        Ok(Message::Arrive { barrier: b }) if b == barrier => {}
                        Ok(Message::Arrive { barrier: b }) => {
                            return Err(CoordinationError::Protocol(format!(
                                "rank {} arrived at barrier {} while leader is at {}",
                                link.rank, b, barrier
                            )))
                        }
                        Ok(Message::Abort(abort)) => {
                            return Err(CoordinationError::PeerFailed {
                                rank: abort.rank,
                                reason: abort.reason,
                            })
                        }
                        Ok(other) => {
                            return Err(CoordinationError::Protocol(format!(
                                "expected ARRIVE from rank {}, got {:?}",
                                link.rank, other
                            )))
                        }
                        Err(e) => return Err(lost_peer(link.rank, &link.host, e)),
                    }
                }

                for link in links.iter_mut() {
                    write_message(&mut link.stream, &Message::Release { barrier })
                        .await
                        .map_err(|e| lost_peer(link.rank, &link.host, e))?;
                }
            }
            Peers::Member(stream) => {
                write_message(stream, &Message::Arrive { barrier })
                    .await
                    .map_err(|e| lost_peer(0, "leader", e))?;

                match read_message(stream).await {
                    Ok(Message::Release { barrier: b }) if b == barrier => {}
                    Ok(Message::Abort(abort)) => {
                        return Err(CoordinationError::PeerFailed {
                            rank: abort.rank,
                            reason: abort.reason,
                        })
                    }
                    Ok(other) => {
                        return Err(CoordinationError::Protocol(format!(
                            "expected RELEASE({}) from leader, got {:?}",
                            barrier, other
                        )))
                    }
                    Err(e) => return Err(lost_peer(0, "leader", e)),
                }
            }
        }

        debug!("[rank {}] released from barrier {}", self.identity.global_rank, barrier);
        Ok(())
    }

    /// Tell the rest of the group this run cannot complete
    ///
    /// Best effort: delivery failures are logged and ignored. `failed_rank`
    /// is the rank whose failure caused the abort.
    pub async fn abort(&mut self, failed_rank: usize, reason: &str) {
        let msg = Message::Abort(AbortMessage {
            rank: failed_rank,
            reason: reason.to_string(),
        });

        match &mut self.peers {
            Peers::Solo => {}
            Peers::Leader(links) => {
                for link in links.iter_mut() {
                    if let Err(e) = write_message(&mut link.stream, &msg).await {
                        debug!("could not notify rank {} of abort: {}", link.rank, e);
                    }
                }
            }
            Peers::Member(stream) => {
                if let Err(e) = write_message(stream, &msg).await {
                    debug!("could not notify leader of abort: {}", e);
                }
            }
        }
    }
}

fn lost_peer(rank: usize, host: &str, e: io::Error) -> CoordinationError {
    let reason = if e.kind() == io::ErrorKind::UnexpectedEof {
        format!("connection to {} closed", host)
    } else {
        format!("connection to {} failed: {}", host, e)
    };
    CoordinationError::PeerFailed { rank, reason }
}

/// Leader side of the rendezvous
async fn form_group(config: &GroupConfig) -> Result<Vec<PeerLink>, CoordinationError> {
    // MASTER_ADDR names the leader's interface; members connect to the same address
    let listener = TcpListener::bind((config.master_addr.as_str(), config.master_port))
        .await
        .map_err(|e| {
            CoordinationError::bootstrap_io(
                format!("leader could not listen on {}", config.master_endpoint()),
                e,
            )
        })?;

    let expected = config.world_size - 1;
    let mut slots: Vec<Option<PeerLink>> = (0..expected).map(|_| None).collect();

    let accept_all = async {
        let mut joined = 0;
        while joined < expected {
            let (mut stream, addr) = listener
                .accept()
                .await
                .map_err(|e| CoordinationError::bootstrap_io("accept failed", e))?;
            let _ = stream.set_nodelay(true);

            let hello = match read_message(&mut stream).await {
                Ok(Message::Hello(hello)) => hello,
                Ok(other) => {
                    warn!("ignoring connection from {}: expected HELLO, got {:?}", addr, other);
                    continue;
                }
                Err(e) => {
                    warn!("ignoring connection from {}: {}", addr, e);
                    continue;
                }
            };

            if let Err(reason) = check_hello(&hello, config, &slots) {
                reject(&mut stream, &reason).await;
                return Err(CoordinationError::bootstrap(reason));
            }

            debug!("rank {} joined from {} ({})", hello.rank, addr, hello.host);
            slots[hello.rank - 1] = Some(PeerLink {
                rank: hello.rank,
                host: hello.host,
                stream,
            });
            joined += 1;
        }
        Ok::<_, CoordinationError>(())
    };

    timeout(config.rendezvous_timeout, accept_all)
        .await
        .map_err(|_| {
            CoordinationError::bootstrap(format!(
                "timed out after {:?} waiting for {} ranks to join",
                config.rendezvous_timeout, expected
            ))
        })??;

    let mut links: Vec<PeerLink> = slots.into_iter().flatten().collect();
    let welcome = Message::Welcome(WelcomeMessage {
        protocol_version: PROTOCOL_VERSION,
        world_size: config.world_size,
    });
    for link in links.iter_mut() {
        write_message(&mut link.stream, &welcome)
            .await
            .map_err(|e| CoordinationError::bootstrap_io(format!("rank {} left during rendezvous", link.rank), e))?;
    }

    Ok(links)
}

fn check_hello(
    hello: &HelloMessage,
    config: &GroupConfig,
    slots: &[Option<PeerLink>],
) -> Result<(), String> {
    if hello.protocol_version != PROTOCOL_VERSION {
        return Err(format!(
            "protocol version mismatch: leader={}, rank {}={}",
            PROTOCOL_VERSION, hello.rank, hello.protocol_version
        ));
    }
    if hello.world_size != config.world_size {
        return Err(format!(
            "world size mismatch: leader={}, rank {}={}",
            config.world_size, hello.rank, hello.world_size
        ));
    }
    if hello.rank == 0 || hello.rank >= config.world_size {
        return Err(format!("rank {} out of range", hello.rank));
    }
    if slots[hello.rank - 1].is_some() {
        return Err(format!("rank {} joined twice", hello.rank));
    }
    Ok(())
}

async fn reject(stream: &mut TcpStream, reason: &str) {
    let msg = Message::Abort(AbortMessage {
        rank: 0,
        reason: reason.to_string(),
    });
    let _ = write_message(stream, &msg).await;
}

/// Member side of the rendezvous
async fn join_group(config: &GroupConfig) -> Result<TcpStream, CoordinationError> {
    let deadline = Instant::now() + config.rendezvous_timeout;
    let endpoint = config.master_endpoint();

    let mut stream = loop {
        match TcpStream::connect((config.master_addr.as_str(), config.master_port)).await {
            Ok(stream) => break stream,
            Err(e) if Instant::now() >= deadline => {
                return Err(CoordinationError::bootstrap_io(
                    format!("could not reach leader at {}", endpoint),
                    e,
                ))
            }
            Err(_) => sleep(CONNECT_RETRY_INTERVAL).await,
        }
    };
    let _ = stream.set_nodelay(true);

    let hello = Message::Hello(HelloMessage {
        protocol_version: PROTOCOL_VERSION,
        rank: config.rank,
        world_size: config.world_size,
        host: local_host_name(),
    });
    write_message(&mut stream, &hello)
        .await
        .map_err(|e| CoordinationError::bootstrap_io("failed to send HELLO", e))?;

    match read_message(&mut stream).await {
        Ok(Message::Welcome(welcome)) if welcome.world_size == config.world_size => Ok(stream),
        Ok(Message::Welcome(welcome)) => Err(CoordinationError::bootstrap(format!(
            "leader reports world size {}, expected {}",
            welcome.world_size, config.world_size
        ))),
        Ok(Message::Abort(abort)) => Err(CoordinationError::bootstrap(format!(
            "leader rejected rank {}: {}",
            config.rank, abort.reason
        ))),
        Ok(other) => Err(CoordinationError::bootstrap(format!(
            "expected WELCOME from leader, got {:?}",
            other
        ))),
        Err(e) => Err(CoordinationError::bootstrap_io("leader closed the rendezvous", e)),
    }
}

fn local_host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}
