//! Integration tests for the security engine.
//!
//! These tests drive the engine through complete pairing flows:
//! - Responder pairing with key distribution
//! - Timeouts with and without a session
//! - Session pool exhaustion
//! - Peer address resolution against the resolving list

use lesm_core::harness::{
    random_identity, random_irk, responder_params, RecordingStack, StackCommand,
    StaticKeyAgreement,
};
use lesm_core::{
    AuthResult, ConnId, DistributedKey, EngineConfig, ErrorKind, FailureReason, KeyDistribution,
    KeyKind, KeyOrigin, LinkEvent, Outcome, PairingParams, ParamsReply, ResolvingList, Role,
    SecurityEngine, SecurityError, SessionPool, SessionState,
};
use lesm_crypto::{ah, AddressType, BdAddr, EncryptionInfo, Irk, Ltk};

type Engine = SecurityEngine<RecordingStack, StaticKeyAgreement>;

fn engine(config: EngineConfig) -> Engine {
    let mut engine = SecurityEngine::new(config, RecordingStack::new(), StaticKeyAgreement::new())
        .expect("valid config");
    // Drop the local feature setup pushed at construction.
    engine.stack_mut().take_commands();
    engine
}

fn peer_distributes(keys: KeyDistribution) -> PairingParams {
    PairingParams {
        initiator_keys: keys,
        responder_keys: KeyDistribution::empty(),
        ..responder_params(keys)
    }
}

fn auth_status(conn: ConnId, result: AuthResult, keys: KeyDistribution) -> LinkEvent {
    LinkEvent::AuthStatus {
        conn,
        result,
        initiator_keys: keys,
        responder_keys: KeyDistribution::empty(),
    }
}

/// Test: Responder pairing reports each peer key, then completion
#[test]
fn integration_responder_flow() {
    let conn = ConnId(1);
    let enc_id = KeyDistribution::ENC_KEY | KeyDistribution::ID_KEY;
    let mut engine = engine(EngineConfig::default());
    let mut out: Vec<Outcome> = Vec::new();

    engine.handle_event(
        LinkEvent::Connected {
            conn,
            role: Role::Responder,
            peer: BdAddr::new([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]),
            bonded: false,
        },
        &mut out,
    );
    engine.handle_event(
        LinkEvent::SecurityParamsRequested {
            conn,
            params: peer_distributes(enc_id),
        },
        &mut out,
    );
    assert!(matches!(
        out.as_slice(),
        [Outcome::PairingRequested { conn: c, .. }] if *c == conn
    ));
    out.clear();

    engine
        .reply_security_params(conn, true, None)
        .expect("accept pairing");

    let mut ltk = EncryptionInfo::default();
    ltk.ltk = Ltk::from_le_bytes([0x4C; 16]);
    ltk.ediv = 0x2F11;
    ltk.key_size = 16;
    let identity = random_identity([0xA1, 0xA2, 0xA3, 0xA4, 0xA5, 0x0A]);

    engine.handle_event(
        LinkEvent::KeyDistributed {
            conn,
            origin: KeyOrigin::Peer,
            key: DistributedKey::Encryption(ltk.clone()),
        },
        &mut out,
    );
    engine.handle_event(
        LinkEvent::KeyDistributed {
            conn,
            origin: KeyOrigin::Peer,
            key: DistributedKey::Identity(identity.clone()),
        },
        &mut out,
    );
    engine.handle_event(auth_status(conn, AuthResult::Success, enc_id), &mut out);

    assert_eq!(
        out,
        vec![
            Outcome::PeerLtkDistributed { conn, key: ltk },
            Outcome::PeerIrkDistributed {
                conn,
                irk: identity.irk.clone(),
                address_type: AddressType::Public,
                address: identity.address,
            },
            Outcome::PairingCompleted {
                conn,
                role: Role::Responder,
                bonded: true,
            },
        ]
    );
    assert!(engine.session(conn).is_none());
    assert!(engine.link(conn).expect("link context").bonded);
}

/// Test: A timeout without a session is a security request timeout
#[test]
fn integration_timeout_without_session() {
    let mut engine = engine(EngineConfig::default());
    let mut out: Vec<Outcome> = Vec::new();

    engine.handle_event(
        auth_status(ConnId(7), AuthResult::Timeout(None), KeyDistribution::empty()),
        &mut out,
    );

    assert_eq!(out, vec![Outcome::SecurityRequestTimedOut { conn: ConnId(7) }]);
    assert!(engine.sessions().is_empty());
}

/// Test: A timeout with a session releases it and reports a pairing timeout
#[test]
fn integration_timeout_with_session() {
    let mut engine = engine(EngineConfig::default());
    let mut out: Vec<Outcome> = Vec::new();
    engine.authenticate(ConnId(2), None).expect("authenticate");

    engine.handle_event(
        auth_status(ConnId(2), AuthResult::Timeout(None), KeyDistribution::empty()),
        &mut out,
    );

    assert_eq!(out, vec![Outcome::PairingTimedOut { conn: ConnId(2) }]);
    assert!(engine.session(ConnId(2)).is_none());
}

/// Test: Allocation past capacity fails without touching live sessions
#[test]
fn integration_capacity_exhaustion() {
    let mut engine = engine(EngineConfig {
        max_connections: 3,
        ..Default::default()
    });
    let mut out: Vec<Outcome> = Vec::new();

    for n in 0..3 {
        engine.authenticate(ConnId(n), None).expect("authenticate");
    }
    engine.handle_event(
        LinkEvent::KeyRequest {
            conn: ConnId(1),
            kind: KeyKind::Passkey,
        },
        &mut out,
    );

    let err = engine.authenticate(ConnId(3), None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CapacityExceeded);

    assert_eq!(engine.sessions().len(), 3);
    assert_eq!(
        engine.session(ConnId(0)).map(|s| s.state()),
        Some(SessionState::ParamsExchanged)
    );
    assert_eq!(
        engine.session(ConnId(1)).map(|s| s.state()),
        Some(SessionState::KeyExchangeInProgress)
    );
    assert_eq!(
        engine.session(ConnId(2)).map(|s| s.role()),
        Some(Role::Initiator)
    );
}

/// Test: The pool itself refuses the (capacity + 1)-th session
#[test]
fn integration_pool_capacity() {
    let mut pool = SessionPool::new(2);
    pool.allocate(ConnId(1), Role::Initiator).expect("first");
    pool.allocate(ConnId(2), Role::Responder).expect("second");

    let err = pool.allocate(ConnId(3), Role::Initiator).unwrap_err();
    assert!(matches!(err, SecurityError::CapacityExceeded(_)));
    assert_eq!(pool.get(ConnId(2)).map(|s| s.role()), Some(Role::Responder));
}

/// Test: Resolution against a populated resolving list
#[test]
fn integration_resolve_against_list() {
    let mut list = ResolvingList::new(3);
    let irks: Vec<Irk> = (0..3).map(|_| random_irk()).collect();
    for (n, irk) in irks.iter().enumerate() {
        list.add(
            AddressType::Public,
            BdAddr::new([n as u8, 0, 0, 0, 0, 0x0C]),
            irk.clone(),
        )
        .expect("add");
    }

    let address = ah::generate(&irks[1]);
    let entry = list.find_match(&address).expect("second entry resolves");
    assert_eq!(entry.peer_irk, irks[1]);
    assert_eq!(entry.peer_identity_address.raw()[0], 1);

    let err = list
        .add(AddressType::Public, BdAddr::new([9; 6]), random_irk())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CapacityExceeded);
}

/// Test: Removing the middle entry keeps the others in order
#[test]
fn integration_list_remove_keeps_order() {
    let mut list = ResolvingList::new(3);
    for n in 1..=3u8 {
        list.add(AddressType::Public, BdAddr::new([n; 6]), random_irk())
            .expect("add");
    }

    list.remove(AddressType::Public, &BdAddr::new([2; 6]))
        .expect("remove");
    let remaining: Vec<u8> = list
        .entries()
        .iter()
        .map(|e| e.peer_identity_address.raw()[0])
        .collect();
    assert_eq!(remaining, vec![1, 3]);
    assert_eq!(
        list.remove(AddressType::Public, &BdAddr::new([2; 6]))
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
}

/// Test: Failure codes are mapped and the session released
#[test]
fn integration_failure_maps_reason() {
    let mut engine = engine(EngineConfig::default());
    let mut out: Vec<Outcome> = Vec::new();
    engine.authenticate(ConnId(5), None).expect("authenticate");

    engine.handle_event(
        auth_status(ConnId(5), AuthResult::Failed(0x03), KeyDistribution::empty()),
        &mut out,
    );
    engine.handle_event(
        auth_status(ConnId(6), AuthResult::Failed(0x7E), KeyDistribution::empty()),
        &mut out,
    );

    assert_eq!(
        out,
        vec![
            Outcome::PairingError {
                conn: ConnId(5),
                reason: FailureReason::AuthenticationRequirements,
            },
            Outcome::PairingError {
                conn: ConnId(6),
                reason: FailureReason::Unspecified,
            },
        ]
    );
    assert!(engine.sessions().is_empty());
}

/// Test: Initiator flow with passkey entry and identity registration
#[test]
fn integration_initiator_passkey_flow() {
    let conn = ConnId(3);
    let mut engine = engine(EngineConfig {
        register_peer_identities: true,
        ..Default::default()
    });
    let mut out: Vec<Outcome> = Vec::new();

    engine.handle_event(
        LinkEvent::Connected {
            conn,
            role: Role::Initiator,
            peer: BdAddr::new([1, 1, 1, 1, 1, 0x41]),
            bonded: false,
        },
        &mut out,
    );
    engine.authenticate(conn, None).expect("authenticate");

    // Peer's pairing response is answered without the application.
    engine.handle_event(
        LinkEvent::SecurityParamsRequested {
            conn,
            params: responder_params(KeyDistribution::ENC_KEY | KeyDistribution::ID_KEY),
        },
        &mut out,
    );
    assert!(out.is_empty());

    engine.handle_event(
        LinkEvent::KeyRequest {
            conn,
            kind: KeyKind::Passkey,
        },
        &mut out,
    );
    assert_eq!(out, vec![Outcome::PasskeyRequested { conn }]);
    engine.reply_passkey(conn, 123_456).expect("passkey");

    let identity = random_identity([0x0B, 0x0B, 0x0B, 0x0B, 0x0B, 0x0B]);
    engine.handle_event(
        LinkEvent::KeyDistributed {
            conn,
            origin: KeyOrigin::Peer,
            key: DistributedKey::Identity(identity.clone()),
        },
        &mut out,
    );
    out.clear();
    engine.handle_event(
        LinkEvent::AuthStatus {
            conn,
            result: AuthResult::Success,
            initiator_keys: KeyDistribution::ENC_KEY | KeyDistribution::ID_KEY,
            responder_keys: KeyDistribution::ENC_KEY | KeyDistribution::ID_KEY,
        },
        &mut out,
    );

    assert!(matches!(
        out.last(),
        Some(Outcome::PairingCompleted { role: Role::Initiator, bonded: true, .. })
    ));
    let commands = engine.stack().commands();
    assert!(matches!(commands[0], StackCommand::Authenticate { .. }));
    assert!(matches!(
        commands[1],
        StackCommand::ReplySecurityParams {
            reply: ParamsReply::Accept,
            ..
        }
    ));

    // The peer now resolves from any address it generates.
    let rpa = ah::generate(&identity.irk);
    let entry = engine.resolve_peer(&rpa).expect("registered peer");
    assert_eq!(entry.peer_identity_address, identity.address);
}

/// Test: Releasing twice, or releasing an unknown connection, is harmless
#[test]
fn integration_idempotent_release() {
    let mut pool = SessionPool::new(2);
    pool.allocate(ConnId(1), Role::Initiator).expect("allocate");
    pool.allocate(ConnId(2), Role::Initiator).expect("allocate");

    pool.release(ConnId(1));
    pool.release(ConnId(1));
    pool.release(ConnId(40));

    assert!(pool.get(ConnId(1)).is_none());
    assert!(pool.get(ConnId(2)).is_some());
}
