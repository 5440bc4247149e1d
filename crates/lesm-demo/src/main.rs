use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use lesm_core::{
    ConnId, EngineConfig, LinkEvent, LocalPrivacy, Outcome, P256KeyAgreement, SecurityEngine,
};
use lesm_crypto::{AddressType, BdAddr, Irk};
use tokio::sync::mpsc;
use tracing::{info, warn};

mod sim;

use sim::{ChannelLink, SimulatedPeer};

type Engine = SecurityEngine<ChannelLink, P256KeyAgreement>;

/// Static random identity address of the demo device.
const LOCAL_IDENTITY: BdAddr = BdAddr::new([0x01, 0x00, 0xDE, 0xC0, 0xAD, 0xDE]);

#[derive(Parser)]
#[command(name = "lesm-demo")]
#[command(about = "Pair the LE security engine with a simulated peer")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "lesm_demo={},lesm_core={},lesm_crypto={}",
            args.log_level, args.log_level, args.log_level
        ))
        .init();

    info!("Starting lesm-demo");

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        EngineConfig::load_from_file(config_path)?
    } else {
        EngineConfig::load_from_env()?
    };
    config.register_peer_identities = true;

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let mut engine: Engine =
        SecurityEngine::new(config, ChannelLink::new(command_tx), P256KeyAgreement)?;

    let privacy = match LocalPrivacy::from_config(
        engine.config(),
        AddressType::RandomStatic,
        LOCAL_IDENTITY,
    )? {
        Some(privacy) => privacy,
        None => LocalPrivacy {
            irk: Irk::random(),
            identity_type: AddressType::RandomStatic,
            identity_address: LOCAL_IDENTITY,
            address_timeout: engine.config().private_address_timeout(),
        },
    };
    engine.enable_privacy(privacy)?;
    info!("Advertising as {}", engine.local_resolvable_address()?);

    let peer = tokio::spawn(SimulatedPeer::new(ConnId(1), command_rx, event_tx).run());

    while let Some(event) = event_rx.recv().await {
        dispatch(&mut engine, event)?;
    }

    let reconnect_address = peer.await.context("peer task panicked")??;
    match engine.resolve_peer(&reconnect_address) {
        Some(entry) => info!(
            "{} resolves to {} identity {}",
            reconnect_address, entry.peer_identity_address_type, entry.peer_identity_address
        ),
        None => warn!("{} did not resolve to a known peer", reconnect_address),
    }
    info!(
        "Resolving list holds {} of {} entries",
        engine.resolving_list().len(),
        engine.resolving_list().capacity()
    );

    Ok(())
}

/// Feed one event to the engine and answer what it asks for.
fn dispatch(engine: &mut Engine, event: LinkEvent) -> anyhow::Result<()> {
    let mut outcomes: Vec<Outcome> = Vec::new();
    engine.handle_event(event, &mut outcomes);

    for outcome in outcomes {
        match outcome {
            Outcome::PairingRequested { conn, params } => {
                info!("{}: pairing requested, io {:?}", conn, params.io_capability);
                engine.reply_security_params(conn, true, None)?;
            }
            Outcome::ConfirmationRequested { conn, passkey } => {
                info!("{}: confirming {:06}", conn, passkey);
                engine.confirm_passkey(conn, true)?;
            }
            Outcome::PasskeyRequested { conn } => {
                let passkey = engine.static_passkey().unwrap_or(0);
                engine.reply_passkey(conn, passkey)?;
            }
            Outcome::OobRequested { conn, .. } => {
                warn!("{}: no out-of-band data available", conn);
                engine.cancel_pairing(conn, lesm_core::FailureReason::OobNotAvailable);
            }
            Outcome::LtkRequested { conn, .. } => {
                engine.reply_ltk(conn, None)?;
            }
            Outcome::LocalLtkDistributed { conn, key } => {
                info!("{}: distributed local LTK, {} byte key", conn, key.key_size);
            }
            Outcome::PeerLtkDistributed { conn, key } => {
                info!(
                    "{}: received peer LTK, ediv {:#06x} rand {}",
                    conn,
                    key.ediv,
                    hex::encode(key.rand)
                );
            }
            Outcome::PeerIrkDistributed {
                conn,
                address_type,
                address,
                ..
            } => {
                info!("{}: peer identity {} ({})", conn, address, address_type);
            }
            Outcome::PairingCompleted { conn, role, bonded } => {
                info!("{}: pairing completed as {:?}, bonded: {}", conn, role, bonded);
            }
            Outcome::PairingError { conn, reason } => {
                warn!("{}: pairing failed: {}", conn, reason);
            }
            other => info!("{}: {:?}", other.conn(), other),
        }
    }
    Ok(())
}
