#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use crate::config::EngineConfig;
    use crate::events::{AuthResult, LinkEvent, Outcome};
    use crate::harness::{responder_params, RecordingStack, StaticKeyAgreement};
    use crate::pairing::SecurityEngine;
    use crate::session::SessionPool;
    use crate::types::{ConnId, KeyDistribution, KeyKind, Role};

    #[derive(Debug, Clone)]
    enum PoolOp {
        Allocate(u16),
        Release(u16),
        ReleaseAll,
    }

    fn pool_op() -> impl Strategy<Value = PoolOp> {
        prop_oneof![
            4 => (0u16..8).prop_map(PoolOp::Allocate),
            3 => (0u16..8).prop_map(PoolOp::Release),
            1 => Just(PoolOp::ReleaseAll),
        ]
    }

    fn link_event() -> impl Strategy<Value = LinkEvent> {
        let conn = (0u16..6).prop_map(ConnId);
        prop_oneof![
            conn.clone().prop_map(|conn| LinkEvent::SecurityParamsRequested {
                conn,
                params: responder_params(KeyDistribution::ENC_KEY | KeyDistribution::ID_KEY),
            }),
            conn.clone().prop_map(|conn| LinkEvent::KeyRequest {
                conn,
                kind: KeyKind::Passkey,
            }),
            (conn.clone(), 0u8..4).prop_map(|(conn, n)| LinkEvent::AuthStatus {
                conn,
                result: match n {
                    0 => AuthResult::Success,
                    1 => AuthResult::Timeout(None),
                    _ => AuthResult::Failed(n),
                },
                initiator_keys: KeyDistribution::ENC_KEY,
                responder_keys: KeyDistribution::ENC_KEY,
            }),
            conn.prop_map(|conn| LinkEvent::Disconnected { conn }),
        ]
    }

    proptest! {
        // The pool never exceeds its capacity and never holds two sessions
        // for one connection.
        #[test]
        fn test_pool_bound_and_uniqueness(ops in prop::collection::vec(pool_op(), 0..64)) {
            let mut pool = SessionPool::new(4);
            for op in ops {
                match op {
                    PoolOp::Allocate(n) => {
                        let existed = pool.contains(ConnId(n));
                        let full = pool.len() == pool.capacity();
                        let result = pool.allocate(ConnId(n), Role::Responder);
                        prop_assert_eq!(result.is_ok(), !existed && !full);
                    }
                    PoolOp::Release(n) => {
                        let existed = pool.contains(ConnId(n));
                        prop_assert_eq!(pool.release(ConnId(n)), existed);
                    }
                    PoolOp::ReleaseAll => {
                        pool.release_all();
                    }
                }

                prop_assert!(pool.len() <= pool.capacity());
                let conns: HashSet<ConnId> = pool.iter().map(|s| s.conn()).collect();
                prop_assert_eq!(conns.len(), pool.len());
            }
        }

        // Any event sequence leaves no session behind a terminal outcome.
        #[test]
        fn test_terminal_outcomes_release_sessions(events in prop::collection::vec(link_event(), 0..48)) {
            let config = EngineConfig { max_connections: 3, ..Default::default() };
            let mut engine = SecurityEngine::new(config, RecordingStack::new(), StaticKeyAgreement::new())
                .unwrap();

            for event in events {
                let mut out: Vec<Outcome> = Vec::new();
                engine.handle_event(event, &mut out);

                for outcome in out.iter().filter(|o| o.is_terminal()) {
                    prop_assert!(engine.session(outcome.conn()).is_none());
                }
                prop_assert!(engine.sessions().len() <= 3);
            }
        }
    }
}
