//! HTTP client for the node's JSON-RPC interface.
//!
//! Wraps `reqwest::Client` with the node's URL and credentials and
//! provides a typed method per RPC the scenarios need. Every call is a
//! blocking suspension point for the single execution thread; there is no
//! retry, and failures surface as explicit [`Error`] variants.

use crate::engine::ResignTx;
use crate::error::Error;
use crate::pool::Unspent;
use rbf_tx::{Script, Transaction};
use rbf_types::{Amount, OutPoint, Txid};
use serde::Deserialize;
use std::time::Duration;

/// Node error code for an unknown transaction id.
const RPC_UNKNOWN_TX: i64 = -5;

/// Connection settings for a node, kept separately from the live client so
/// long-sleeping scenarios can reconnect: idle connections may be closed
/// externally while we wait.
#[derive(Clone, Debug)]
pub struct NodeEndpoint {
    pub url: String,
    pub user: Option<String>,
    pub pass: Option<String>,
}

impl NodeEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user: None,
            pass: None,
        }
    }

    pub fn with_auth(mut self, user: impl Into<String>, pass: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.pass = Some(pass.into());
        self
    }

    /// Open a fresh client against this endpoint.
    pub fn connect(&self) -> Result<NodeClient, Error> {
        NodeClient::new(self.clone())
    }
}

/// JSON-RPC client for a running node.
#[derive(Clone)]
pub struct NodeClient {
    http: reqwest::Client,
    endpoint: NodeEndpoint,
}

impl NodeClient {
    pub fn new(endpoint: NodeEndpoint) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Node(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { http, endpoint })
    }

    pub fn url(&self) -> &str {
        &self.endpoint.url
    }

    /// Send a JSON-RPC request and return the `result` field.
    async fn rpc_call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, Error> {
        let body = serde_json::json!({
            "jsonrpc": "1.0",
            "id": "rbf",
            "method": method,
            "params": params,
        });

        let mut request = self.http.post(&self.endpoint.url).json(&body);
        if let Some(user) = &self.endpoint.user {
            request = request.basic_auth(user, self.endpoint.pass.as_deref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Node(format!("request failed: {e}")))?;

        // Nodes report RPC errors with non-2xx statuses and a JSON body;
        // parse the body before considering the status.
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Node(format!("invalid JSON response: {e}")))?;

        if let Some(err) = json.get("error").filter(|e| !e.is_null()) {
            let code = err.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
            let message = err
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown node error")
                .to_string();
            return Err(Error::NodeRpc { code, message });
        }

        json.get("result")
            .cloned()
            .ok_or_else(|| Error::Node("response missing result".into()))
    }

    fn parse<T: serde::de::DeserializeOwned>(
        &self,
        what: &str,
        value: serde_json::Value,
    ) -> Result<T, Error> {
        serde_json::from_value(value).map_err(|e| Error::Node(format!("invalid {what} response: {e}")))
    }

    /// Fetch a transaction with its confirmation count.
    pub async fn get_transaction(&self, txid: &Txid) -> Result<TxInfo, Error> {
        let result = self
            .rpc_call("gettransaction", serde_json::json!([txid.to_string()]))
            .await
            .map_err(|e| match e {
                Error::NodeRpc {
                    code: RPC_UNKNOWN_TX,
                    ..
                } => Error::TxNotFound(*txid),
                other => other,
            })?;

        let raw: TxInfoRaw = self.parse("gettransaction", result)?;
        Ok(TxInfo {
            tx: Transaction::from_hex(&raw.hex)?,
            confirmations: raw.confirmations,
        })
    }

    /// Spendable outputs with at least `min_conf` confirmations.
    pub async fn list_unspent(&self, min_conf: u32) -> Result<Vec<Unspent>, Error> {
        let result = self
            .rpc_call("listunspent", serde_json::json!([min_conf]))
            .await?;
        let raw: Vec<UnspentRaw> = self.parse("listunspent", result)?;
        raw.into_iter()
            .map(|u| {
                Ok(Unspent {
                    outpoint: OutPoint::new(u.txid.parse()?, u.vout),
                    amount: Amount::new(u.amount),
                })
            })
            .collect()
    }

    /// Ask the node to sign; callers must check `complete`.
    pub async fn sign_transaction(
        &self,
        tx: &Transaction,
        sighash: Option<&str>,
    ) -> Result<SignResult, Error> {
        let params = match sighash {
            Some(mode) => serde_json::json!([tx.to_hex(), mode]),
            None => serde_json::json!([tx.to_hex()]),
        };
        let result = self.rpc_call("signtransaction", params).await?;
        let raw: SignRaw = self.parse("signtransaction", result)?;
        Ok(SignResult {
            tx: Transaction::from_hex(&raw.hex)?,
            complete: raw.complete,
        })
    }

    /// Submit to the network; node rejection maps to [`Error::Rejected`].
    pub async fn broadcast(&self, tx: &Transaction) -> Result<Txid, Error> {
        let result = self
            .rpc_call("broadcasttransaction", serde_json::json!([tx.to_hex()]))
            .await
            .map_err(|e| match e {
                Error::NodeRpc { message, .. } => Error::Rejected(message),
                other => other,
            })?;
        let txid: String = self.parse("broadcasttransaction", result)?;
        Ok(txid.parse()?)
    }

    /// Have the node add inputs (and possibly a change output) to cover
    /// fees at its own estimated rate.
    pub async fn fund_transaction(&self, tx: &Transaction) -> Result<Funded, Error> {
        let result = self
            .rpc_call("fundtransaction", serde_json::json!([tx.to_hex()]))
            .await?;
        let raw: FundRaw = self.parse("fundtransaction", result)?;
        Ok(Funded {
            tx: Transaction::from_hex(&raw.hex)?,
            fee: Amount::new(raw.fee),
            change_pos: usize::try_from(raw.changepos).ok(),
        })
    }

    /// Look up an unspent output; `None` if absent (or spent).
    pub async fn get_tx_out(
        &self,
        outpoint: &OutPoint,
        include_mempool: bool,
    ) -> Result<Option<TxOutEntry>, Error> {
        let result = self
            .rpc_call(
                "gettxout",
                serde_json::json!([outpoint.txid.to_string(), outpoint.vout, include_mempool]),
            )
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        let raw: TxOutRaw = self.parse("gettxout", result)?;
        Ok(Some(TxOutEntry {
            value: Amount::new(raw.value),
        }))
    }

    /// Resolve an address to its locking script, with ownership info.
    pub async fn resolve_address(&self, address: &str) -> Result<AddressInfo, Error> {
        let result = self
            .rpc_call("resolveaddress", serde_json::json!([address]))
            .await
            .map_err(|e| match e {
                Error::NodeRpc {
                    code: RPC_UNKNOWN_TX,
                    message,
                } => {
                    Error::InvalidInput(format!("invalid address {address}: {message}"))
                }
                other => other,
            })?;
        let raw: AddressRaw = self.parse("resolveaddress", result)?;
        Ok(AddressInfo {
            script_pubkey: Script::from_hex(&raw.script_pubkey)?,
            is_owned: raw.is_owned,
        })
    }

    /// Whether a locking script pays a key the node's wallet controls.
    pub async fn script_is_owned(&self, script: &Script) -> Result<bool, Error> {
        let result = self
            .rpc_call("scriptinfo", serde_json::json!([script.to_hex()]))
            .await?;
        let raw: ScriptInfoRaw = self.parse("scriptinfo", result)?;
        Ok(raw.is_owned)
    }

    /// A fresh change script from the node's wallet.
    pub async fn new_change_script(&self) -> Result<Script, Error> {
        let result = self.rpc_call("newchangescript", serde_json::json!([])).await?;
        let hex: String = self.parse("newchangescript", result)?;
        Ok(Script::from_hex(&hex)?)
    }

    /// Current mempool transaction ids.
    pub async fn mempool_txids(&self) -> Result<Vec<Txid>, Error> {
        let result = self.rpc_call("mempooltxids", serde_json::json!([])).await?;
        let raw: Vec<String> = self.parse("mempooltxids", result)?;
        raw.into_iter()
            .map(|s| s.parse().map_err(Error::from))
            .collect()
    }
}

impl ResignTx for NodeClient {
    /// Re-sign a draft in place, copying the unlocking scripts from the
    /// node's result; the input set itself must not change.
    async fn resign(&self, tx: &mut Transaction) -> Result<(), Error> {
        let signed = self.sign_transaction(tx, None).await?;
        if !signed.complete {
            return Err(Error::SigningIncomplete);
        }
        if signed.tx.inputs.len() != tx.inputs.len() {
            return Err(Error::InvalidTransaction(
                "input count changed during signing".into(),
            ));
        }
        for (input, signed_input) in tx.inputs.iter_mut().zip(signed.tx.inputs) {
            input.script_sig = signed_input.script_sig;
        }
        Ok(())
    }
}

/// A transaction as known to the node.
#[derive(Debug, Clone)]
pub struct TxInfo {
    pub tx: Transaction,
    pub confirmations: u32,
}

/// Result of a sign request.
#[derive(Debug, Clone)]
pub struct SignResult {
    pub tx: Transaction,
    pub complete: bool,
}

/// Result of a fund request.
#[derive(Debug, Clone)]
pub struct Funded {
    pub tx: Transaction,
    pub fee: Amount,
    pub change_pos: Option<usize>,
}

/// An unspent output as reported by `gettxout`.
#[derive(Debug, Clone, Copy)]
pub struct TxOutEntry {
    pub value: Amount,
}

/// Address lookup result.
#[derive(Debug, Clone)]
pub struct AddressInfo {
    pub script_pubkey: Script,
    pub is_owned: bool,
}

#[derive(Debug, Deserialize)]
struct TxInfoRaw {
    hex: String,
    #[serde(default)]
    confirmations: u32,
}

#[derive(Debug, Deserialize)]
struct UnspentRaw {
    txid: String,
    vout: u32,
    amount: u64,
}

#[derive(Debug, Deserialize)]
struct SignRaw {
    hex: String,
    complete: bool,
}

#[derive(Debug, Deserialize)]
struct FundRaw {
    hex: String,
    fee: u64,
    /// -1 when the funded transaction needed no change output.
    changepos: i64,
}

#[derive(Debug, Deserialize)]
struct TxOutRaw {
    value: u64,
}

#[derive(Debug, Deserialize)]
struct AddressRaw {
    script_pubkey: String,
    #[serde(default)]
    is_owned: bool,
}

#[derive(Debug, Deserialize)]
struct ScriptInfoRaw {
    #[serde(default)]
    is_owned: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_connect() {
        let endpoint = NodeEndpoint::new("http://127.0.0.1:8332")
            .with_auth("user", "pass");
        let client = endpoint.connect().unwrap();
        assert_eq!(client.url(), "http://127.0.0.1:8332");
    }

    #[test]
    fn test_fund_raw_changepos_sentinel() {
        let raw: FundRaw =
            serde_json::from_value(serde_json::json!({"hex": "", "fee": 5, "changepos": -1}))
                .unwrap();
        assert!(usize::try_from(raw.changepos).ok().is_none());

        let raw: FundRaw =
            serde_json::from_value(serde_json::json!({"hex": "", "fee": 5, "changepos": 2}))
                .unwrap();
        assert_eq!(usize::try_from(raw.changepos).ok(), Some(2));
    }
}
