use rand::RngCore;

use passkey_forge::keys::{Algorithm, Key, generate_keypair};
use passkey_forge::signing::ecdsa::raw_to_der;
use passkey_forge::{EcSignatureFormat, SignatureEngine, sign, verify};

fn random_payload() -> Vec<u8> {
    let mut payload = vec![0u8; 64];
    rand::thread_rng().fill_bytes(&mut payload);
    payload
}

/// One private key per algorithm. RSA generation is slow, so the six RSA
/// algorithms share a single modulus.
fn keys_for_all_algorithms() -> Vec<Key> {
    let rsa = generate_keypair(Algorithm::Rs256, 2048).unwrap();
    Algorithm::ALL
        .into_iter()
        .map(|alg| match (&rsa, alg.is_rsa()) {
            (Key::Rsa(base), true) => {
                let mut key = base.clone();
                key.alg = alg;
                Key::Rsa(key)
            }
            _ => generate_keypair(alg, 0).unwrap(),
        })
        .collect()
}

#[test]
fn test_sign_verify_every_algorithm() {
    for key in keys_for_all_algorithms() {
        let alg = key.alg();
        let payload = random_payload();
        let signature = sign(&key, &payload).unwrap();
        assert!(verify(&key.to_public(), &payload, &signature).unwrap(), "{alg}");

        let mut tampered = payload.clone();
        tampered[0] ^= 0x01;
        assert!(!verify(&key.to_public(), &tampered, &signature).unwrap(), "{alg}: tampered payload");
    }
}

#[test]
fn test_every_single_bit_flip_is_rejected() {
    for key in keys_for_all_algorithms() {
        let alg = key.alg();
        let public = key.to_public();
        let payload = random_payload();
        let signature = sign(&key, &payload).unwrap();

        for bit in 0..signature.len() * 8 {
            let mut flipped = signature.clone();
            flipped[bit / 8] ^= 0x80 >> (bit % 8);
            assert!(
                !verify(&public, &payload, &flipped).unwrap(),
                "{alg}: bit {bit} of {} flipped still verifies",
                signature.len() * 8
            );
        }
    }
}

#[test]
fn test_raw_ec_bit_flips_are_rejected() {
    let engine = SignatureEngine::new(EcSignatureFormat::Raw);
    let key = generate_keypair(Algorithm::Es512, 0).unwrap();
    let signature = engine.sign(&key, b"payload").unwrap();
    for bit in 0..signature.len() * 8 {
        let mut flipped = signature.clone();
        flipped[bit / 8] ^= 0x80 >> (bit % 8);
        assert!(!engine.verify(&key, b"payload", &flipped).unwrap(), "bit {bit}");
    }
}

#[test]
fn test_garbage_signature_is_false() {
    let key = generate_keypair(Algorithm::Es384, 0).unwrap();
    assert!(!verify(&key, b"payload", &[]).unwrap());
    assert!(!verify(&key, b"payload", &[0x30, 0x02, 0x02]).unwrap());
}

#[test]
fn test_raw_engine_emits_fixed_width() {
    let engine = SignatureEngine::new(EcSignatureFormat::Raw);
    for (alg, width) in [(Algorithm::Es256, 64), (Algorithm::Es384, 96), (Algorithm::Es512, 132)] {
        let key = generate_keypair(alg, 0).unwrap();
        let raw = engine.sign(&key, b"payload").unwrap();
        assert_eq!(raw.len(), width, "{alg}");
        assert!(engine.verify(&key, b"payload", &raw).unwrap());

        let der = raw_to_der(&raw, alg.ec_curve().unwrap()).unwrap();
        assert_eq!(der[0], 0x30);
        assert!(verify(&key, b"payload", &der).unwrap(), "{alg}: DER form of raw signature");
    }
}

#[test]
fn test_wrong_key_does_not_verify() {
    let a = generate_keypair(Algorithm::EdDsa, 0).unwrap();
    let b = generate_keypair(Algorithm::EdDsa, 0).unwrap();
    let signature = sign(&a, b"payload").unwrap();
    assert!(!verify(&b, b"payload", &signature).unwrap());
}
