#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::address::BdAddr;
    use crate::ah::{ah, generate, resolve};
    use crate::keys::Irk;

    proptest! {
        // Every generated address resolves with the key that produced it.
        #[test]
        fn test_generate_resolve_round_trip(key in any::<[u8; 16]>()) {
            let irk = Irk::from_le_bytes(key);
            let address = generate(&irk);

            prop_assert!(address.is_resolvable_private());
            prop_assert!(resolve(&address, &irk));
        }

        // ah is a pure function of its inputs.
        #[test]
        fn test_ah_deterministic(key in any::<[u8; 16]>(), prand in any::<[u8; 3]>()) {
            prop_assert_eq!(ah(&key, &prand), ah(&key, &prand));
        }

        // Any single-bit change to the hash half breaks resolution.
        #[test]
        fn test_hash_bit_flip_never_resolves(key in any::<[u8; 16]>(), bit in 0usize..24) {
            let irk = Irk::from_le_bytes(key);
            let address = generate(&irk);

            let mut hash = address.hash_part();
            hash[bit / 8] ^= 1 << (bit % 8);
            let tampered = BdAddr::from_parts(hash, address.prand_part());
            prop_assert!(!resolve(&tampered, &irk));
        }
    }
}
