//! Published test vectors exercised end to end across crate boundaries:
//! BIP-32 vector 1, BIP-85 test case 1, and a mnemonic-to-SLIP-0021 chain.

use ltk_derive::bip32::{self, Curve, HARDENED};
use ltk_derive::material::Secret64;
use ltk_derive::slip21::Slip21Node;
use ltk_derive::{bip85, mnemonic};
use secrecy::SecretString;

// (path indices, xprv, xpub) for BIP-32 test vector 1,
// seed 000102030405060708090a0b0c0d0e0f.
const VECTOR_1: &[(&[u32], &str, &str)] = &[
    (
        &[],
        "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi",
        "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8",
    ),
    (
        &[HARDENED],
        "xprv9uHRZZhk6KAJC1avXpDAp4MDc3sQKNxDiPvvkX8Br5ngLNv1TxvUxt4cV1rGL5hj6KCesnDYUhd7oWgT11eZG7XnxHrnYeSvkzY7d2bhkJ7",
        "xpub68Gmy5EdvgibQVfPdqkBBCHxA5htiqg55crXYuXoQRKfDBFA1WEjWgP6LHhwBZeNK1VTsfTFUHCdrfp1bgwQ9xv5ski8PX9rL2dZXvgGDnw",
    ),
    (
        &[HARDENED, 1],
        "xprv9wTYmMFdV23N2TdNG573QoEsfRrWKQgWeibmLntzniatZvR9BmLnvSxqu53Kw1UmYPxLgboyZQaXwTCg8MSY3H2EU4pWcQDnRnrVA1xe8fs",
        "xpub6ASuArnXKPbfEwhqN6e3mwBcDTgzisQN1wXN9BJcM47sSikHjJf3UFHKkNAWbWMiGj7Wf5uMash7SyYq527Hqck2AxYysAA7xmALppuCkwQ",
    ),
    (
        &[HARDENED, 1, 2 | HARDENED],
        "xprv9z4pot5VBttmtdRTWfWQmoH1taj2axGVzFqSb8C9xaxKymcFzXBDptWmT7FwuEzG3ryjH4ktypQSAewRiNMjANTtpgP4mLTj34bhnZX7UiM",
        "xpub6D4BDPcP2GT577Vvch3R8wDkScZWzQzMMUm3PWbmWvVJrZwQY4VUNgqFJPMM3No2dFDFGTsxxpG5uJh7n7epu4trkrX7x7DogT5Uv6fcLW5",
    ),
    (
        &[HARDENED, 1, 2 | HARDENED, 2],
        "xprvA2JDeKCSNNZky6uBCviVfJSKyQ1mDYahRjijr5idH2WwLsEd4Hsb2Tyh8RfQMuPh7f7RtyzTtdrbdqqsunu5Mm3wDvUAKRHSC34sJ7in334",
        "xpub6FHa3pjLCk84BayeJxFW2SP4XRrFd1JYnxeLeU8EqN3vDfZmbqBqaGJAyiLjTAwm6ZLRQUMv1ZACTj37sR62cfN7fe5JnJ7dh8zL4fiyLHV",
    ),
    (
        &[HARDENED, 1, 2 | HARDENED, 2, 1000000000],
        "xprvA41z7zogVVwxVSgdKUHDy1SKmdb533PjDz7J6N6mV6uS3ze1ai8FHa8kmHScGpWmj4WggLyQjgPie1rFSruoUihUZREPSL39UNdE3BBDu76",
        "xpub6H1LXWLaKsWFhvm6RVpEL9P4KfRZSW7abD2ttkWP3SSQvnyA8FSVqNTEcYFgJS2UaFcxupHiYkro49S8yGasTvXEYBVPamhGW6cFJodrTHy",
    ),
];

#[test]
fn bip32_vector_1_chain() {
    let seed = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
    for (indices, xprv, xpub) in VECTOR_1 {
        let node = bip32::derive_path(&seed, Curve::Secp256k1, indices).unwrap();
        assert_eq!(node.serialize_private().unwrap(), *xprv);
        assert_eq!(node.serialize_public(), *xpub);
    }
}

#[test]
fn bip32_serialized_keys_reparse() {
    let seed = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
    for (indices, xprv, xpub) in VECTOR_1 {
        let derived = bip32::derive_path(&seed, Curve::Secp256k1, indices).unwrap();
        let private = bip32::deserialize(xprv, Curve::Secp256k1).unwrap();
        assert_eq!(private.private_key(), derived.private_key());
        assert_eq!(private.chain_code(), derived.chain_code());
        assert_eq!(private.depth(), indices.len() as u8);

        let public = bip32::deserialize(xpub, Curve::Secp256k1).unwrap();
        assert_eq!(public.private_key(), None);
        assert_eq!(public.public_key(), derived.public_key());
    }
}

#[test]
fn bip85_test_case_1() {
    let master = bip32::deserialize(
        "xprv9s21ZrQH143K2LBWUUQRFXhucrQqBpKdRRxNVq2zBqsx8HVqFk2uYo8kmbaLLHRdqtQpUm98uKfu3vca1LqdGhUtyoFnCNkfmXRyPXLjbKb",
        Curve::Secp256k1,
    )
    .unwrap();
    let purpose = bip32::child_node(&master, 83696968 | HARDENED).unwrap();
    let app = bip32::child_node(&purpose, HARDENED).unwrap();
    let index = bip32::child_node(&app, HARDENED).unwrap();
    let entropy = bip85::entropy_from_k(&index, 64).unwrap();
    assert_eq!(
        hex::encode(&*entropy),
        "efecfbccffea313214232d29e71563d941229afb4338c21f9517c41aaa0d16f0\
         0b83d2a09ef747e7a64e8e2bd5a14869e693da66ce94ac2da570ab7ee48618f7"
    );
}

#[test]
fn bip85_requires_purpose_path() {
    let seed = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
    let node = bip32::derive_path(&seed, Curve::Secp256k1, &[HARDENED]).unwrap();
    assert!(bip85::entropy_from_k(&node, 32).is_err());
}

#[test]
fn mnemonic_seed_feeds_slip21_tree() {
    // Trezor vector: all-zero entropy, passphrase "TREZOR".
    let phrase = "abandon abandon abandon abandon abandon abandon abandon abandon \
                  abandon abandon abandon about";
    let seed = mnemonic::seed_from_phrase(phrase, &SecretString::from("TREZOR".to_string()))
        .unwrap();
    assert_eq!(
        hex::encode(seed.as_bytes()),
        "c55257c360c07c72029aebc1b53c05ed0362ada38ead3e3e9efa3708e5349553\
         1f09a6987599d18264c1e1c92f2cf141630c7a3c4ab7c81b2f001698e7463b04"
    );

    let tape = Slip21Node::master(&seed)
        .child("LTO tape encryption")
        .child("0")
        .child("backups")
        .child("0")
        .child("TAPE01L8")
        .child("0");
    assert_eq!(
        tape.path(),
        "m/\"LTO tape encryption\"/\"0\"/\"backups\"/\"0\"/\"TAPE01L8\"/\"0\""
    );
    // Same phrase, different passphrase, different tree.
    let other = mnemonic::seed_from_phrase(phrase, &SecretString::from(String::new())).unwrap();
    assert_ne!(
        Slip21Node::master(&other).child("LTO tape encryption").derivation_key(),
        Slip21Node::master(&seed).child("LTO tape encryption").derivation_key()
    );
}

#[test]
fn p256_master_derivation_differs_from_secp() {
    let seed = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
    let k = bip32::master_node(&seed, Curve::Secp256k1).unwrap();
    let p = bip32::master_node(&seed, Curve::NistP256).unwrap();
    assert_ne!(k.private_key(), p.private_key());
    assert_ne!(k.chain_code(), p.chain_code());
}

#[test]
fn slip21_core_derivation_is_secret64_based() {
    let seed = Secret64::from_bytes([0u8; 64]);
    let node = Slip21Node::master(&seed);
    assert_eq!(node.path(), "m");
    assert_ne!(node.derivation_key(), node.symmetric_key());
}
