//! A consent request, its approval and the documents that follow, over SQLite.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::RsaPrivateKey;
use serde_json::{json, Value};

use consent_kernel::operator::{MemoryTransport, OperatorEvent};
use consent_kernel::perms::{ApprovedScope, ConsentApproval, ConsentRequestDescription};
use consent_kernel::store::SqliteStore;
use consent_kernel::{Client, ClientConfig, EventResponse, Key, KeyOptions, KernelError};

const REQUESTER: &str = "http://requester.test";

fn config(client_id: &str) -> ClientConfig {
    let mut config = ClientConfig::new(
        client_id,
        "http://operator.test",
        "Requester",
        "Asks for education records",
    );
    config.key_options = KeyOptions {
        temp_key_expiry_ms: 60_000,
        modulus_length: 1024,
    };
    config
}

fn pem_b64(key: &Key) -> anyhow::Result<String> {
    Ok(STANDARD.encode(key.to_public_pem()?))
}

#[tokio::test]
async fn test_consent_flow() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = tempfile::tempdir()?;
    let client_key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048)?;

    let requester = Client::new(
        config(REQUESTER),
        &client_key,
        SqliteStore::open(dir.path().join("requester.db"))?,
        MemoryTransport::new().with_response("{}"),
    )?;
    let peer = Client::new(
        config("http://peer.test"),
        &client_key,
        SqliteStore::open(dir.path().join("peer.db"))?,
        MemoryTransport::new(),
    )?;

    let description: ConsentRequestDescription = serde_json::from_value(json!({
        "scope": [{
            "area": "education",
            "permissions": ["READ", "WRITE"],
            "purpose": "In order to recommend jobs",
            "lawfulBasis": "CONSENT"
        }],
        "expiry": 1_900_000_000_000i64
    }))?;
    let requested = requester.request_consent(&description).await?;
    let own = requester
        .keys()
        .get_key(&requested.request.kid)
        .await?
        .ok_or_else(|| anyhow::anyhow!("requested key is missing"))?;

    let peer_key = peer.keys().generate_persistent_key(consent_kernel::KeyUse::Enc).await?;
    peer.ledger().save_consent_key_id("c1", peer_key.kid.as_str()).await?;

    let approval = ConsentApproval {
        consent_id: "c1".into(),
        keys: BTreeMap::from([
            (own.kid.to_string(), pem_b64(&own)?),
            (peer_key.kid.to_string(), pem_b64(&peer_key)?),
        ]),
        scope: vec![ApprovedScope {
            domain: REQUESTER.into(),
            area: "education".into(),
            access_key_ids: vec![own.kid.to_string(), peer_key.kid.to_string()],
        }],
    };
    let response = requester
        .handle_event(OperatorEvent::ConsentApproved(approval))
        .await?;
    assert_eq!(response, EventResponse::Accepted);
    assert_eq!(requester.ledger().get_consent_key_id("c1").await?, own.kid.as_str());

    let record = json!({"degree": "BSc", "year": 2019});
    let envelope = requester
        .documents()
        .encrypt("c1", REQUESTER, "education", &record)
        .await?;

    let mine: Value = requester
        .documents()
        .decrypt("c1", REQUESTER, "education", &envelope)
        .await?;
    let theirs: Value = peer
        .documents()
        .decrypt("c1", REQUESTER, "education", &envelope)
        .await?;
    assert_eq!(mine, record);
    assert_eq!(theirs, record);

    // A consent the peer never joined.
    assert!(matches!(
        peer.documents()
            .decrypt::<Value>("c2", REQUESTER, "education", &envelope)
            .await,
        Err(KernelError::NoConsentKey(_))
    ));
    Ok(())
}
