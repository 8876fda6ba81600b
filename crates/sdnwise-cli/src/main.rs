//! SDN-WISE Controller CLI
//!
//! Host wiring for the protocol controller: binds the UDP port sensor
//! traffic arrives on, feeds datagrams to `sdnwise-core`, and carries out
//! the forwarding instructions the controller emits. The core itself
//! performs no socket I/O.

use clap::{Parser, Subcommand};
use dashmap::DashMap;
use sdnwise_core::{
    Controller, ControllerConfig, ControllerError, PacketVerdict, SDNWISE_PORT, WisePacket,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;

/// SDN-WISE wireless sensor network controller
#[derive(Parser)]
#[command(name = "sdnwise")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the controller
    Run {
        /// Bind address for sensor traffic
        #[arg(short, long, default_value_t = SocketAddr::from(([0, 0, 0, 0], SDNWISE_PORT)))]
        bind: SocketAddr,

        /// Only accept packets carrying this network id
        #[arg(long)]
        net_id: Option<u8>,

        /// Stale-node sweep interval in seconds
        #[arg(long, default_value_t = 10)]
        sweep_interval: u64,
    },

    /// Decode a hex-encoded packet and print its fields
    Decode {
        /// Packet bytes as a hex string
        #[arg(required = true)]
        packet: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(if cli.verbose { "debug" } else { "info" })
        .init();

    match cli.command {
        Commands::Run {
            bind,
            net_id,
            sweep_interval,
        } => {
            let config = ControllerConfig {
                listen_addr: bind,
                net_id,
                sweep_interval: Duration::from_secs(sweep_interval),
                ..ControllerConfig::default()
            };
            run_controller(config).await?;
        }
        Commands::Decode { packet } => {
            decode_packet(&packet)?;
        }
    }

    Ok(())
}

/// Wall clock as epoch milliseconds, the timestamp domain the core uses.
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

async fn run_controller(config: ControllerConfig) -> anyhow::Result<()> {
    let controller = Arc::new(Controller::with_config(&config));
    let socket = Arc::new(UdpSocket::bind(config.listen_addr).await?);

    // Last-known UDP endpoint per node, learned from inbound traffic and
    // used to realize forwarding instructions.
    let endpoints: Arc<DashMap<u16, SocketAddr>> = Arc::new(DashMap::new());

    tracing::info!(
        "Listening for SDN-WISE packets on {}",
        socket.local_addr()?
    );

    // Background liveness sweep, independent of packet handling.
    let sweeper = Arc::clone(&controller);
    let sweep_interval = config.sweep_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            sweeper.sweep_stale(now_ms());
        }
    });

    let mut buf = vec![0u8; 2048];
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
            result = socket.recv_from(&mut buf) => {
                let (size, from) = result?;
                handle_datagram(&controller, &socket, &endpoints, &buf[..size], from, config.net_id)
                    .await;
            }
        }
    }

    Ok(())
}

async fn handle_datagram(
    controller: &Controller,
    socket: &UdpSocket,
    endpoints: &DashMap<u16, SocketAddr>,
    data: &[u8],
    from: SocketAddr,
    net_filter: Option<u8>,
) {
    let packet = match WisePacket::decode(data) {
        Ok(packet) => packet,
        Err(e) => {
            tracing::debug!("Dropping malformed datagram from {}: {}", from, e);
            return;
        }
    };

    if let Some(net_id) = net_filter {
        if packet.net_id != net_id {
            tracing::debug!(
                "Ignoring packet from network {} (filtering on {})",
                packet.net_id,
                net_id
            );
            return;
        }
    }

    endpoints.insert(packet.src, from);

    match controller.handle_packet(&packet, now_ms()) {
        PacketVerdict::Forward(instruction) => {
            // Copy out of the map so no guard is held across the await.
            let endpoint = endpoints.get(&instruction.next_hop).map(|e| *e);
            match endpoint {
                Some(endpoint) => {
                    if let Err(e) = socket.send_to(&instruction.data, endpoint).await {
                        tracing::warn!(
                            "Failed to forward to node 0x{:04X} at {}: {}",
                            instruction.next_hop,
                            endpoint,
                            e
                        );
                    }
                }
                None => {
                    tracing::warn!(
                        "No known endpoint for next hop 0x{:04X}, dropping forward",
                        instruction.next_hop
                    );
                }
            }
        }
        PacketVerdict::Handled | PacketVerdict::Dropped => {}
    }
}

fn decode_packet(hex_str: &str) -> anyhow::Result<()> {
    let bytes = hex::decode(hex_str.trim())?;
    let packet = WisePacket::decode(&bytes).map_err(ControllerError::from)?;

    println!("net id:   {}", packet.net_id);
    println!("dst:      0x{:04X}", packet.dst);
    println!("src:      0x{:04X}", packet.src);
    match packet.packet_type() {
        Ok(typ) => println!("type:     {:?}", typ),
        Err(_) => println!("type:     unknown (0x{:02X})", packet.typ),
    }
    println!("ttl:      {}", packet.ttl);
    println!("next hop: 0x{:04X}", packet.nxh);
    println!(
        "payload:  {} bytes{}",
        packet.payload.len(),
        if packet.payload.is_empty() {
            String::new()
        } else {
            format!(" ({})", hex::encode(&packet.payload))
        }
    );

    Ok(())
}
