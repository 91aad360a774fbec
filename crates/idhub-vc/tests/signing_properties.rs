//! Signing and content-addressing properties over arbitrary subjects.

use idhub_core::Did;
use idhub_crypto::secp256k1::recover;
use idhub_crypto::{RecoverableSignature, Secp256k1KeyPair};
use idhub_vc::{ContentCredential, CredentialStore, MemoryCredentialStore};
use proptest::prelude::*;
use serde_json::{json, Value};

fn subject() -> impl Strategy<Value = Value> {
    (
        "[a-z0-9/:.]{1,30}",
        prop::collection::btree_map("[a-zA-Z]{1,10}", "[ -~]{0,20}", 0..5),
        any::<i32>(),
    )
        .prop_map(|(id, meta, n)| json!({"id": id, "metadata": meta, "revision": n}))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn signed_credential_recovers_to_signer(subj in subject()) {
        let did = Did::new("did:example:abc").unwrap();
        let kp = Secp256k1KeyPair::generate();
        let mut cred = ContentCredential::new(&did, subj);
        cred.sign_secp256k1(&kp, &did, None).unwrap();

        let sig = RecoverableSignature::from_hex(&cred.proof().unwrap().proof_value).unwrap();
        let recovered = recover(&cred.signing_input().unwrap(), &sig).unwrap();
        prop_assert_eq!(recovered, kp.public_key());
    }

    #[test]
    fn stored_credential_is_returned_unchanged(subj in subject()) {
        let did = Did::new("did:example:abc").unwrap();
        let kp = Secp256k1KeyPair::generate();
        let mut cred = ContentCredential::new(&did, subj);
        cred.sign_secp256k1(&kp, &did, None).unwrap();

        let store = MemoryCredentialStore::new();
        let hash = store.add_credential(&cred).unwrap();
        prop_assert_eq!(store.get_credential_by_hash(&hash).unwrap(), cred);
    }
}

#[test]
fn json_roundtrip_preserves_content_hash() {
    let did = Did::new("did:example:abc").unwrap();
    let kp = Secp256k1KeyPair::generate();
    let mut cred = ContentCredential::new(&did, json!({"id": "doc1", "tags": ["a", "b"]}));
    cred.sign_secp256k1(&kp, &did, None).unwrap();

    let pretty = serde_json::to_string_pretty(&cred).unwrap();
    let parsed: ContentCredential = serde_json::from_str(&pretty).unwrap();
    assert_eq!(parsed.content_hash().unwrap(), cred.content_hash().unwrap());
}
