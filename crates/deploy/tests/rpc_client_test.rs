//! `RpcChainClient` tests against a local JSON-RPC node stub.
//!
//! The stub answers every request through a handler closure and records the
//! method and params of each call, so the tests can check both how node
//! answers are classified and which transactions were actually sent.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU8, Ordering},
    },
    time::Instant,
};

use ledgerlink_deploy::{
    Address, ArtifactStore, B256, Bytes, ChainClient, ChainConfig, ChainError, ContractCall,
    ContractId, ContractsConfig, DeployConfig, Factory, Orchestrator, RpcChainClient, Token,
    selector,
};
use serde_json::{Value, json};
use tempdir::TempDir;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

const CHAIN_ID: &str = "0x7a69";

/// A JSON-RPC node stub listening on a random local port.
struct StubNode {
    url: String,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl StubNode {
    async fn start<F>(handler: F) -> Self
    where
        F: Fn(&str, &Value) -> Value + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        let calls = Arc::new(Mutex::new(Vec::new()));

        let handler = Arc::new(handler);
        let recorded = calls.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let handler = handler.clone();
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, handler.as_ref(), &recorded).await;
                });
            }
        });

        Self { url, calls }
    }

    fn methods(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(method, _)| method.clone())
            .collect()
    }

    fn params_of(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }

    fn count(&self, method: &str) -> usize {
        self.params_of(method).len()
    }

    fn chain_config(&self) -> ChainConfig {
        ChainConfig {
            rpc_url: self.url.parse().unwrap(),
            chain_id: Some(31337),
            poll_interval_ms: 50,
            confirmation_timeout_secs: 1,
            request_timeout_secs: 2,
            ..ChainConfig::default()
        }
    }

    async fn client(&self) -> RpcChainClient {
        RpcChainClient::connect(&self.chain_config(), ArtifactStore::new("artifacts"))
            .await
            .unwrap()
    }
}

/// Answer one HTTP request with the handler's JSON-RPC response, then close.
async fn serve<F>(
    mut stream: TcpStream,
    handler: &F,
    calls: &Mutex<Vec<(String, Value)>>,
) -> std::io::Result<()>
where
    F: Fn(&str, &Value) -> Value,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let request: Value = buf
        .get(header_end..header_end + content_length)
        .and_then(|body| serde_json::from_slice(body).ok())
        .unwrap_or(Value::Null);
    let method = request["method"].as_str().unwrap_or_default().to_string();
    let params = request["params"].clone();
    calls.lock().unwrap().push((method.clone(), params.clone()));

    let mut response = handler(&method, &params);
    response["jsonrpc"] = json!("2.0");
    response["id"] = request["id"].clone();

    let body = response.to_string();
    let reply = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(reply.as_bytes()).await?;
    stream.shutdown().await
}

fn ok(result: Value) -> Value {
    json!({ "result": result })
}

fn rpc_error(message: &str) -> Value {
    json!({ "error": { "code": -32000, "message": message } })
}

fn sender() -> Address {
    Address::repeat_byte(0x11)
}

fn tx_hash(n: u8) -> B256 {
    B256::with_last_byte(n)
}

fn receipt(hash: &Value, status: &str, contract_address: Option<Address>) -> Value {
    json!({
        "transactionHash": hash,
        "blockNumber": "0x5",
        "status": status,
        "contractAddress": contract_address,
        "logs": []
    })
}

/// Handles the connection handshake; everything else is up to `rest`.
fn node<F>(rest: F) -> impl Fn(&str, &Value) -> Value + Send + Sync + 'static
where
    F: Fn(&str, &Value) -> Value + Send + Sync + 'static,
{
    move |method, params| match method {
        "eth_chainId" => ok(json!(CHAIN_ID)),
        "eth_accounts" => ok(json!([sender()])),
        _ => rest(method, params),
    }
}

fn link_call() -> ContractCall {
    ContractCall::new("setLedgerCore", vec![Token::Address(Address::repeat_byte(0xbb))])
}

#[tokio::test]
async fn test_node_rejection_is_submission_error() {
    let node = StubNode::start(node(|method, _| match method {
        "eth_sendTransaction" => rpc_error("insufficient funds for gas * price + value"),
        _ => ok(Value::Null),
    }))
    .await;
    let client = node.client().await;

    let err = client
        .call(Address::repeat_byte(0xaa), &link_call())
        .await
        .unwrap_err();

    match &err {
        ChainError::Submission { reason } => {
            assert!(reason.contains("insufficient funds"), "{reason}")
        }
        other => panic!("expected a submission error, got {other:?}"),
    }
    assert_eq!(node.count("eth_getTransactionReceipt"), 0);
}

#[tokio::test]
async fn test_reverted_receipt_is_confirmation_error() {
    let node = StubNode::start(node(|method, params| match method {
        "eth_sendTransaction" => ok(json!(tx_hash(1))),
        "eth_getTransactionReceipt" => ok(receipt(&params[0], "0x0", None)),
        _ => ok(Value::Null),
    }))
    .await;
    let client = node.client().await;

    let pending = client
        .call(Address::repeat_byte(0xaa), &link_call())
        .await
        .unwrap();
    assert_eq!(pending.tx_hash, tx_hash(1));

    let err = client.wait(pending).await.unwrap_err();

    match &err {
        ChainError::Confirmation { tx_hash: hash, reason } => {
            assert_eq!(*hash, tx_hash(1));
            assert_eq!(reason, "reverted in block 5");
        }
        other => panic!("expected a confirmation error, got {other:?}"),
    }
    // A revert is final: one receipt read, one transaction.
    assert_eq!(node.count("eth_getTransactionReceipt"), 1);
    assert_eq!(node.count("eth_sendTransaction"), 1);
}

#[tokio::test]
async fn test_unmined_transaction_times_out_without_resubmitting() {
    let node = StubNode::start(node(|method, _| match method {
        "eth_sendTransaction" => ok(json!(tx_hash(7))),
        _ => ok(Value::Null),
    }))
    .await;
    let client = node.client().await;

    let pending = client
        .call(Address::repeat_byte(0xaa), &link_call())
        .await
        .unwrap();

    let started = Instant::now();
    let err = client.wait(pending).await.unwrap_err();
    let elapsed = started.elapsed();

    match &err {
        ChainError::Confirmation { reason, .. } => {
            assert!(reason.starts_with("not confirmed within 1s"), "{reason}")
        }
        other => panic!("expected a confirmation error, got {other:?}"),
    }
    assert!(elapsed.as_millis() >= 900, "gave up after {elapsed:?}");
    assert!(node.count("eth_getTransactionReceipt") > 1);
    assert_eq!(node.count("eth_sendTransaction"), 1);
}

#[tokio::test]
async fn test_chain_id_mismatch_aborts_before_any_transaction() {
    let node = StubNode::start(|method: &str, _: &Value| match method {
        "eth_chainId" => ok(json!("0x1")),
        "eth_accounts" => ok(json!([sender()])),
        _ => ok(Value::Null),
    })
    .await;

    let err = RpcChainClient::connect(&node.chain_config(), ArtifactStore::new("artifacts"))
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("chain 1"), "{err:#}");
    assert_eq!(node.methods(), vec!["eth_chainId".to_string()]);
}

#[tokio::test]
async fn test_connect_uses_first_node_account() {
    let node = StubNode::start(node(|method, _| match method {
        "eth_sendTransaction" => ok(json!(tx_hash(1))),
        _ => ok(Value::Null),
    }))
    .await;
    let client = node.client().await;

    client
        .call(Address::repeat_byte(0xaa), &link_call())
        .await
        .unwrap();

    let sent = node.params_of("eth_sendTransaction");
    let from: Address = serde_json::from_value(sent[0][0]["from"].clone()).unwrap();
    assert_eq!(from, sender());
}

#[tokio::test]
async fn test_deployment_confirms_with_contract_address() {
    let deployed = Address::repeat_byte(0xaa);
    let node = StubNode::start(node(move |method, params| match method {
        "eth_sendTransaction" => ok(json!(tx_hash(1))),
        "eth_getTransactionReceipt" => ok(receipt(&params[0], "0x1", Some(deployed))),
        _ => ok(Value::Null),
    }))
    .await;
    let client = node.client().await;

    let factory = Factory {
        contract: ContractId::from("TL_Evidence_Vault"),
        bytecode: Bytes::from(vec![0x60, 0x80, 0x60, 0x40]),
    };
    let pending = client.deploy(&factory, &[]).await.unwrap();
    let instance = client.wait_for_deployment(pending).await.unwrap();

    assert_eq!(instance.address(), deployed);
    assert_eq!(instance.receipt.block_number, 5);

    // Construction transactions have no recipient.
    let sent = node.params_of("eth_sendTransaction");
    assert!(sent[0][0].get("to").is_none());
    let data: Bytes = serde_json::from_value(sent[0][0]["data"].clone()).unwrap();
    assert_eq!(data, factory.bytecode);
}

#[tokio::test]
async fn test_full_run_against_node() {
    let vault = Address::repeat_byte(0xaa);
    let core = Address::repeat_byte(0xbb);

    let artifacts = TempDir::new("ledgerlink-node").unwrap();
    for name in ["TL_Evidence_Vault", "TL_Ledger_Core"] {
        let dir = artifacts.path().join("contracts").join(format!("{name}.sol"));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(format!("{name}.json")),
            r#"{"abi":[],"bytecode":"0x60806040"}"#,
        )
        .unwrap();
    }

    let nonce = AtomicU8::new(0);
    let node = StubNode::start(node(move |method, params| match method {
        "eth_sendTransaction" => ok(json!(tx_hash(nonce.fetch_add(1, Ordering::SeqCst) + 1))),
        "eth_getTransactionReceipt" => {
            let hash: B256 = serde_json::from_value(params[0].clone()).unwrap();
            let created = match hash[31] {
                1 => Some(vault),
                2 => Some(core),
                _ => None,
            };
            ok(receipt(&params[0], "0x1", created))
        }
        _ => ok(Value::Null),
    }))
    .await;

    let config = DeployConfig {
        chain: node.chain_config(),
        contracts: ContractsConfig {
            artifacts_dir: artifacts.path().to_path_buf(),
            ..ContractsConfig::default()
        },
    };
    let mut orchestrator = Orchestrator::connect(config).await.unwrap();
    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.vault.address, vault);
    assert_eq!(report.core.address, core);

    let sent = node.params_of("eth_sendTransaction");
    assert_eq!(sent.len(), 3);

    // Core's creation data ends with the vault address as its constructor arg.
    let core_data: Bytes = serde_json::from_value(sent[1][0]["data"].clone()).unwrap();
    assert_eq!(&core_data[core_data.len() - 20..], vault.as_slice());

    // The link goes to the vault and carries the core address.
    let link_to: Address = serde_json::from_value(sent[2][0]["to"].clone()).unwrap();
    assert_eq!(link_to, vault);
    let link_data: Bytes = serde_json::from_value(sent[2][0]["data"].clone()).unwrap();
    assert_eq!(&link_data[..4], selector("setLedgerCore(address)").as_slice());
    assert_eq!(&link_data[16..], core.as_slice());
}
